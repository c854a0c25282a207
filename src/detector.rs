//! Splits the raw day log into bleeding episodes.

use std::collections::BTreeSet;

use chrono::NaiveDate;

use crate::models::{BleedingEpisode, DailyEntry};

/// Default episode length when too few days were logged.
const DEFAULT_EPISODE_DAYS: i64 = 7;
/// Logged bleeding days needed before trusting the last logged day.
const MAJORITY_THRESHOLD: usize = 4;
/// Days of grace after the last logged bleeding day.
const GRACE_AFTER_LAST_LOG: i64 = 4;
/// Absolute cap on an open episode's length.
const MAX_EPISODE_DAYS: i64 = 10;

pub(crate) fn offset(date: NaiveDate, days: i64) -> Option<NaiveDate> {
    date.checked_add_signed(chrono::TimeDelta::try_days(days)?)
}

/// Episode currently being accumulated.
struct OpenEpisode {
    start: NaiveDate,
    days: Vec<DailyEntry>,
    zero_run: u32,
    bleeding_dates: BTreeSet<NaiveDate>,
    last_bleeding: Option<NaiveDate>,
}

impl OpenEpisode {
    fn new(entry: &DailyEntry) -> Self {
        Self {
            start: entry.date,
            days: vec![entry.clone()],
            zero_run: 0,
            bleeding_dates: BTreeSet::new(),
            last_bleeding: None,
        }
    }

    /// Closed by a new explicit start: ends on the last member day.
    fn finalize(self) -> BleedingEpisode {
        let end = self.days.last().map(|d| d.date).unwrap_or(self.start);
        BleedingEpisode::new(self.start, end, self.days)
    }

    /// Closed because the log ran out before two consecutive zero days.
    fn finalize_at_end_of_log(self) -> BleedingEpisode {
        let auto_end = if self.bleeding_dates.len() < MAJORITY_THRESHOLD {
            offset(self.start, DEFAULT_EPISODE_DAYS - 1)
        } else {
            offset(self.last_bleeding.unwrap_or(self.start), GRACE_AFTER_LAST_LOG)
        };
        let max_end = offset(self.start, MAX_EPISODE_DAYS - 1).unwrap_or(self.start);
        let end = auto_end.map_or(max_end, |e| e.min(max_end));

        tracing::trace!(start = %self.start, %end, logged = self.bleeding_dates.len(), "closing open episode at end of log");
        BleedingEpisode::new(self.start, end, self.days)
    }
}

/// Segment `entries` (any order) into episodes ordered by start date.
///
/// An explicit period start always opens a new episode. Bleeding days join
/// the open episode; one zero day is tolerated, the second consecutive zero
/// day closes the episode on that date. Entries outside an episode are
/// ignored.
pub fn segment_episodes(entries: &[DailyEntry]) -> Vec<BleedingEpisode> {
    let mut sorted: Vec<&DailyEntry> = entries.iter().collect();
    sorted.sort_by_key(|e| e.date);

    let mut episodes = Vec::new();
    let mut open: Option<OpenEpisode> = None;

    for entry in sorted {
        if entry.is_period_start {
            if let Some(current) = open.take() {
                episodes.push(current.finalize());
            }
            open = Some(OpenEpisode::new(entry));
            continue;
        }

        let Some(current) = open.as_mut() else {
            continue;
        };

        if entry.bleeding > 0 {
            current.bleeding_dates.insert(entry.date);
            current.last_bleeding = Some(entry.date);
            current.days.push(entry.clone());
            current.zero_run = 0;
            continue;
        }

        // first zero is only noted; the second closes on its own date
        current.zero_run += 1;
        if current.zero_run >= 2 {
            if let Some(done) = open.take() {
                episodes.push(BleedingEpisode::new(done.start, entry.date, done.days));
            }
        }
    }

    if let Some(current) = open {
        episodes.push(current.finalize_at_end_of_log());
    }

    episodes
}
