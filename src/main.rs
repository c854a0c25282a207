use std::path::PathBuf;

use chrono::{Datelike, NaiveDate, Weekday};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use cykel_engine::calendar::month_grid;
use cykel_engine::models::{CyclePhase, DailyEntry, SymptomType};
use cykel_engine::session::Session;
use cykel_engine::storage::FileStore;

type CliResult = Result<(), Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(name = "cykel", version, about = "Private, on-device cycle tracker")]
struct Cli {
    /// Directory holding the encrypted data file
    #[arg(long, env = "CYKEL_DATA_DIR", global = true)]
    data_dir: Option<PathBuf>,

    /// Passphrase the data file is sealed with
    #[arg(long, env = "CYKEL_PASSPHRASE", hide_env_values = true, global = true)]
    passphrase: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new, empty encrypted log
    Init,
    /// Log or replace a day
    Log {
        date: NaiveDate,
        /// Bleeding level 0-4
        #[arg(short, long, default_value_t = 0)]
        bleeding: u8,
        /// Mark the day as a period start
        #[arg(long)]
        start: bool,
        /// Symptom tag, repeatable
        #[arg(short, long = "symptom")]
        symptoms: Vec<String>,
        #[arg(long)]
        note: Option<String>,
    },
    /// Mark a period start (defaults to today)
    Start {
        date: Option<NaiveDate>,
        #[arg(short, long, default_value_t = 1)]
        level: u8,
    },
    /// Remove a period start mark
    UndoStart { date: NaiveDate },
    /// Replace the symptoms recorded for a day
    Symptoms { date: NaiveDate, tags: Vec<String> },
    /// Record a sex event
    Sex {
        date: NaiveDate,
        #[arg(long)]
        protected: Option<bool>,
    },
    /// Merge day entries from a JSON file
    Import { file: PathBuf },
    /// Print the derived snapshot as JSON
    Status,
    /// Print a month with phase markers
    Calendar {
        /// Month as YYYY-MM (defaults to the current month)
        #[arg(long, value_parser = parse_month)]
        month: Option<(i32, u32)>,
    },
    /// Print cycle and period statistics
    Stats,
    /// Show or change settings
    Settings {
        #[arg(long)]
        auto_lock: Option<u32>,
        #[arg(long)]
        fertility: Option<bool>,
    },
    /// Print the decrypted log as JSON
    Export,
    /// Delete the data file
    Wipe {
        #[arg(long)]
        yes: bool,
    },
}

fn parse_month(s: &str) -> Result<(i32, u32), String> {
    let (year, month) = s.split_once('-').ok_or("expected YYYY-MM")?;
    let year: i32 = year.parse().map_err(|_| format!("invalid year: {year}"))?;
    let month: u32 = month.parse().map_err(|_| format!("invalid month: {month}"))?;
    if !(1..=12).contains(&month) {
        return Err(format!("invalid month: {month}"));
    }
    Ok((year, month))
}

fn print_json<T: serde::Serialize>(value: &T) -> CliResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn phase_marker(phase: Option<CyclePhase>, show_fertility: bool) -> char {
    match phase {
        Some(CyclePhase::Bleeding) => 'B',
        Some(CyclePhase::Follicular) => 'f',
        Some(CyclePhase::FertileWindow) if show_fertility => 'F',
        Some(CyclePhase::Ovulation) if show_fertility => 'O',
        Some(CyclePhase::Luteal) => 'l',
        _ => ' ',
    }
}

fn print_calendar(session: &Session, year: i32, month: u32) -> CliResult {
    session.show_month(year, month)?;
    let snapshot = session.snapshot();
    let show_fertility = session.settings()?.show_fertility;
    let grid = month_grid(year, month, Weekday::Mon).ok_or("invalid month")?;

    println!("      {year}-{month:02}");
    println!(" Mo  Tu  We  Th  Fr  Sa  Su");
    for week in grid.chunks(7) {
        let line: Vec<String> = week
            .iter()
            .map(|cell| match cell {
                Some(date) => {
                    let marker = phase_marker(snapshot.phases.get(date).copied(), show_fertility);
                    format!("{:>2}{marker}", date.day())
                }
                None => "   ".to_string(),
            })
            .collect();
        println!("{}", line.join(" "));
    }
    println!("B bleeding  f follicular  l luteal{}", if show_fertility { "  F fertile  O ovulation" } else { "" });
    Ok(())
}

fn open_session(session: &Session, passphrase: &str) -> CliResult {
    if !session.is_setup()? {
        return Err("no data yet; run `cykel init` first".into());
    }
    if !session.unlock(passphrase)? {
        return Err("wrong passphrase".into());
    }
    Ok(())
}

fn run(cli: Cli) -> CliResult {
    let store = match cli.data_dir {
        Some(dir) => FileStore::in_dir(dir)?,
        None => FileStore::default_location()?,
    };
    let session = Session::with_system_clock(Box::new(store));
    let passphrase = cli
        .passphrase
        .ok_or("a passphrase is required (--passphrase or CYKEL_PASSPHRASE)")?;

    if !matches!(cli.command, Commands::Init) {
        open_session(&session, &passphrase)?;
    }

    match cli.command {
        Commands::Init => {
            if session.is_setup()? {
                return Err("data already exists; use `cykel wipe --yes` to start over".into());
            }
            session.setup(&passphrase)?;
            println!("created an empty log");
        }
        Commands::Log {
            date,
            bleeding,
            start,
            symptoms,
            note,
        } => {
            let mut entry = if start {
                DailyEntry::period_start(date, bleeding)
            } else {
                DailyEntry::new(date, bleeding)
            };
            entry.symptoms = symptoms.iter().map(|s| SymptomType::from_tag(s)).collect();
            entry.note = note;
            session.add_or_update_entry(entry)?;
        }
        Commands::Start { date, level } => {
            session.start_period(date.unwrap_or_else(|| session.today()), level)?;
        }
        Commands::UndoStart { date } => session.undo_period_start(date)?,
        Commands::Symptoms { date, tags } => {
            let symptoms: Vec<SymptomType> = tags.iter().map(|t| SymptomType::from_tag(t)).collect();
            session.log_symptoms(date, &symptoms)?;
        }
        Commands::Sex { date, protected } => session.add_sex_event(date, protected)?,
        Commands::Import { file } => {
            let entries: Vec<DailyEntry> = serde_json::from_slice(&std::fs::read(file)?)?;
            let count = entries.len();
            session.import_entries(entries)?;
            println!("imported {count} entries");
        }
        Commands::Status => print_json(&*session.snapshot())?,
        Commands::Calendar { month } => {
            let today = session.today();
            let (year, month) = month.unwrap_or((today.year(), today.month()));
            print_calendar(&session, year, month)?;
        }
        Commands::Stats => print_json(&session.analytics()?)?,
        Commands::Settings { auto_lock, fertility } => {
            if let Some(minutes) = auto_lock {
                session.update_settings(minutes)?;
            }
            if let Some(enabled) = fertility {
                session.toggle_fertility(enabled)?;
            }
            print_json(&session.settings()?)?;
        }
        Commands::Export => println!("{}", session.export_json()?),
        Commands::Wipe { yes } => {
            if !yes {
                return Err("refusing to wipe without --yes".into());
            }
            session.wipe()?;
            println!("all data deleted");
        }
    }

    Ok(())
}

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(Cli::parse()) {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
