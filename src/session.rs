use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use chrono::{Datelike, NaiveDate};
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::analytics::{self, AnalyticsReport};
use crate::calendar::month_days;
use crate::models::*;
use crate::snapshot::Snapshot;
use crate::storage::{self, LogStore, StorageError};

/// Source of "today" for recency windows and future-date checks.
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        chrono::Local::now().date_naive()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("app is locked")]
    Locked,
    #[error("refusing to start a period in the future ({0})")]
    FutureStart(NaiveDate),
    #[error("nothing logged on {0}")]
    NothingLogged(NaiveDate),
    #[error("invalid month {0}-{1}")]
    InvalidMonth(i32, u32),
    #[error("session state poisoned")]
    Poisoned,
}

struct Unlocked {
    passphrase: Zeroizing<String>,
    data: AppData,
}

/// Holds the decrypted log while unlocked and publishes a fresh
/// [`Snapshot`] after every change. Writes are serialized by the state
/// lock; the snapshot is swapped whole so readers never see a mix of old
/// and new derived facts.
pub struct Session {
    store: Box<dyn LogStore>,
    clock: Box<dyn Clock>,
    state: Mutex<Option<Unlocked>>,
    visible_month: Mutex<Option<(i32, u32)>>,
    snapshot: RwLock<Arc<Snapshot>>,
}

impl Session {
    pub fn new(store: Box<dyn LogStore>, clock: Box<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            state: Mutex::new(None),
            visible_month: Mutex::new(None),
            snapshot: RwLock::new(Arc::new(Snapshot::default())),
        }
    }

    pub fn with_system_clock(store: Box<dyn LogStore>) -> Self {
        Self::new(store, Box::new(SystemClock))
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    pub fn is_setup(&self) -> Result<bool, SessionError> {
        Ok(self.store.exists()?)
    }

    pub fn is_unlocked(&self) -> bool {
        self.state.lock().map(|s| s.is_some()).unwrap_or(false)
    }

    /// Create an empty store sealed with `passphrase` and unlock it.
    pub fn setup(&self, passphrase: &str) -> Result<(), SessionError> {
        let data = AppData::default();
        storage::save(self.store.as_ref(), passphrase, &data)?;
        self.install(passphrase, data)
    }

    /// Returns `Ok(false)` for a wrong passphrase.
    pub fn unlock(&self, passphrase: &str) -> Result<bool, SessionError> {
        let data = match storage::load(self.store.as_ref(), passphrase) {
            Ok(data) => data,
            Err(StorageError::Crypto(e)) => {
                tracing::warn!(error = %e, "unlock failed");
                return Ok(false);
            }
            Err(e) => return Err(e.into()),
        };
        // rewrite so migrated data is stored under the current schema
        storage::save(self.store.as_ref(), passphrase, &data)?;
        self.install(passphrase, data)?;
        Ok(true)
    }

    fn install(&self, passphrase: &str, data: AppData) -> Result<(), SessionError> {
        let mut state = self.state.lock().map_err(|_| SessionError::Poisoned)?;
        self.publish(&data, "unlock");
        *state = Some(Unlocked {
            passphrase: Zeroizing::new(passphrase.to_string()),
            data,
        });
        Ok(())
    }

    /// Forget the passphrase, the data and the published snapshot.
    pub fn lock(&self) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = None;
        *self.snapshot.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(Snapshot::default());
    }

    /// Lock and delete the stored file.
    pub fn wipe(&self) -> Result<(), SessionError> {
        self.lock();
        Ok(self.store.wipe()?)
    }

    /// Apply `change` to a copy of the data, persist it, then commit and
    /// publish. A failed change or save leaves the session untouched.
    fn mutate<F>(&self, label: &'static str, change: F) -> Result<(), SessionError>
    where
        F: FnOnce(&mut AppData, NaiveDate) -> Result<(), SessionError>,
    {
        let mut state = self.state.lock().map_err(|_| SessionError::Poisoned)?;
        let unlocked = state.as_mut().ok_or(SessionError::Locked)?;

        let mut next = unlocked.data.clone();
        change(&mut next, self.clock.today())?;
        storage::save(self.store.as_ref(), &unlocked.passphrase, &next)?;

        unlocked.data = next;
        self.publish(&unlocked.data, label);
        Ok(())
    }

    fn read<T>(&self, f: impl FnOnce(&AppData) -> T) -> Result<T, SessionError> {
        let state = self.state.lock().map_err(|_| SessionError::Poisoned)?;
        let unlocked = state.as_ref().ok_or(SessionError::Locked)?;
        Ok(f(&unlocked.data))
    }

    fn visible_dates(&self) -> Vec<NaiveDate> {
        let today = self.clock.today();
        let (year, month) = self
            .visible_month
            .lock()
            .ok()
            .and_then(|m| *m)
            .unwrap_or((today.year(), today.month()));
        month_days(year, month).unwrap_or_default()
    }

    fn publish(&self, data: &AppData, label: &str) {
        let next = Snapshot::recompute(&data.entries, &self.visible_dates());
        tracing::debug!(
            label,
            entries = data.entries.len(),
            episodes = next.episodes.len(),
            cycles = next.cycles.len(),
            irregular = next.irregular.len(),
            expected = ?next.prediction.map(|p| p.expected),
            "recomputed"
        );
        if let Ok(mut current) = self.snapshot.write() {
            *current = Arc::new(next);
        }
    }

    /// The latest published snapshot.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.snapshot
            .read()
            .map(|s| Arc::clone(&*s))
            .unwrap_or_default()
    }

    /// Label a different month in the published phase map.
    pub fn show_month(&self, year: i32, month: u32) -> Result<(), SessionError> {
        month_days(year, month).ok_or(SessionError::InvalidMonth(year, month))?;
        let state = self.state.lock().map_err(|_| SessionError::Poisoned)?;
        let unlocked = state.as_ref().ok_or(SessionError::Locked)?;
        if let Ok(mut visible) = self.visible_month.lock() {
            *visible = Some((year, month));
        }
        self.publish(&unlocked.data, "show_month");
        Ok(())
    }

    // Entry log

    /// Insert `entry`, replacing whatever was logged on the same date.
    pub fn add_or_update_entry(&self, entry: DailyEntry) -> Result<(), SessionError> {
        self.mutate("add_or_update_entry", |data, _| {
            upsert(&mut data.entries, entry);
            Ok(())
        })
    }

    /// Merge many entries in one write.
    pub fn import_entries(&self, entries: Vec<DailyEntry>) -> Result<(), SessionError> {
        self.mutate("import_entries", |data, _| {
            for entry in entries {
                upsert(&mut data.entries, entry);
            }
            Ok(())
        })
    }

    pub fn log_bleeding(&self, date: NaiveDate, level: u8) -> Result<(), SessionError> {
        let level = level.min(MAX_BLEEDING);
        self.mutate("log_bleeding", |data, _| {
            match data.entries.iter_mut().find(|e| e.date == date) {
                Some(existing) => existing.bleeding = level,
                None => upsert(&mut data.entries, DailyEntry::new(date, level)),
            }
            Ok(())
        })
    }

    /// Edit the bleeding level of an already logged day.
    pub fn update_bleeding(&self, date: NaiveDate, level: u8) -> Result<(), SessionError> {
        let level = level.min(MAX_BLEEDING);
        self.mutate("update_bleeding", |data, _| {
            let existing = data
                .entries
                .iter_mut()
                .find(|e| e.date == date)
                .ok_or(SessionError::NothingLogged(date))?;
            existing.bleeding = level;
            Ok(())
        })
    }

    /// Mark `date` as an explicit period start. Future dates are refused.
    pub fn start_period(&self, date: NaiveDate, level: u8) -> Result<(), SessionError> {
        let level = level.clamp(1, MAX_BLEEDING);
        self.mutate("start_period", |data, today| {
            if date > today {
                tracing::warn!(%date, %today, "refusing to start period in the future");
                return Err(SessionError::FutureStart(date));
            }
            match data.entries.iter_mut().find(|e| e.date == date) {
                Some(existing) => {
                    existing.is_period_start = true;
                    existing.bleeding = level;
                }
                None => upsert(&mut data.entries, DailyEntry::period_start(date, level)),
            }
            Ok(())
        })
    }

    pub fn undo_period_start(&self, date: NaiveDate) -> Result<(), SessionError> {
        self.mutate("undo_period_start", |data, _| {
            if let Some(existing) = data
                .entries
                .iter_mut()
                .find(|e| e.date == date && e.is_period_start)
            {
                existing.is_period_start = false;
            }
            Ok(())
        })
    }

    // Symptoms and events

    /// Replace the symptoms recorded for `date`.
    pub fn log_symptoms(&self, date: NaiveDate, symptoms: &[SymptomType]) -> Result<(), SessionError> {
        let set: BTreeSet<SymptomType> = symptoms.iter().copied().collect();
        self.mutate("log_symptoms", |data, _| {
            data.symptoms.retain(|s| s.date != date);
            data.symptoms.extend(set.into_iter().map(|symptom_type| Symptom {
                id: Uuid::new_v4(),
                date,
                symptom_type,
                intensity: None,
                note: None,
            }));
            data.symptoms.sort_by_key(|s| s.date);
            Ok(())
        })
    }

    pub fn add_sex_event(&self, date: NaiveDate, protected: Option<bool>) -> Result<(), SessionError> {
        self.mutate("add_sex_event", |data, _| {
            data.sex_events.push(SexEvent {
                id: Uuid::new_v4(),
                date,
                protected,
                notes: None,
            });
            data.sex_events.sort_by_key(|e| e.date);
            Ok(())
        })
    }

    /// Change the protection flag of the first event on `date`.
    pub fn update_sex_event(&self, date: NaiveDate, protected: bool) -> Result<(), SessionError> {
        self.mutate("update_sex_event", |data, _| {
            let event = data
                .sex_events
                .iter_mut()
                .find(|e| e.date == date)
                .ok_or(SessionError::NothingLogged(date))?;
            event.protected = Some(protected);
            Ok(())
        })
    }

    // Settings

    pub fn settings(&self) -> Result<AppSettings, SessionError> {
        self.read(|data| data.settings.clone())
    }

    pub fn update_settings(&self, auto_lock_minutes: u32) -> Result<(), SessionError> {
        self.mutate("update_settings", |data, _| {
            data.settings.auto_lock_minutes = auto_lock_minutes.clamp(1, 60);
            Ok(())
        })
    }

    pub fn toggle_fertility(&self, enabled: bool) -> Result<(), SessionError> {
        self.mutate("toggle_fertility", |data, _| {
            data.settings.show_fertility = enabled;
            Ok(())
        })
    }

    /// Empty the log but keep the store and the session unlocked.
    pub fn delete_all_data(&self) -> Result<(), SessionError> {
        self.mutate("delete_all_data", |data, _| {
            *data = AppData::default();
            Ok(())
        })
    }

    // Queries

    pub fn entries(&self) -> Result<Vec<DailyEntry>, SessionError> {
        self.read(|data| data.entries.clone())
    }

    pub fn is_period_active(&self, date: NaiveDate) -> bool {
        self.snapshot().is_period_active(date)
    }

    pub fn summary(&self, date: NaiveDate) -> Result<DaySummary, SessionError> {
        self.read(|data| {
            let entry = data.entries.iter().find(|e| e.date == date);
            let mut symptoms: BTreeSet<SymptomType> = data
                .symptoms
                .iter()
                .filter(|s| s.date == date)
                .map(|s| s.symptom_type)
                .collect();
            if let Some(entry) = entry {
                symptoms.extend(entry.symptoms.iter().copied());
            }

            DaySummary {
                date,
                bleeding: entry.map(|e| e.bleeding),
                is_period_start: entry.is_some_and(|e| e.is_period_start),
                sex_events: data
                    .sex_events
                    .iter()
                    .filter(|e| e.date == date)
                    .cloned()
                    .collect(),
                symptoms: symptoms.into_iter().collect(),
            }
        })
    }

    pub fn analytics(&self) -> Result<AnalyticsReport, SessionError> {
        if !self.is_unlocked() {
            return Err(SessionError::Locked);
        }
        let snapshot = self.snapshot();
        Ok(analytics::report(
            &snapshot.episodes,
            &snapshot.cycles,
            &snapshot.irregular,
            self.clock.today(),
        ))
    }

    pub fn export_json(&self) -> Result<String, SessionError> {
        let data = self.read(|data| data.clone())?;
        Ok(serde_json::to_string_pretty(&data)?)
    }
}

/// Replace the entry on the same date, or insert keeping date order.
fn upsert(entries: &mut Vec<DailyEntry>, entry: DailyEntry) {
    match entries.iter_mut().find(|e| e.date == entry.date) {
        Some(existing) => *existing = entry,
        None => entries.push(entry),
    }
    entries.sort_by_key(|e| e.date);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    struct FixedClock(NaiveDate);

    impl Clock for FixedClock {
        fn today(&self) -> NaiveDate {
            self.0
        }
    }

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn session(today: &str) -> Session {
        let session = Session::new(Box::new(MemoryStore::new()), Box::new(FixedClock(day(today))));
        session.setup("pass").unwrap();
        session
    }

    fn two_periods() -> Vec<DailyEntry> {
        let mut entries = vec![DailyEntry::period_start(day("2026-01-01"), 3)];
        entries.extend((2..=5).map(|d| DailyEntry::new(NaiveDate::from_ymd_opt(2026, 1, d).unwrap(), 2)));
        entries.push(DailyEntry::period_start(day("2026-01-29"), 3));
        entries.push(DailyEntry::new(day("2026-01-30"), 2));
        entries
    }

    #[test]
    fn locked_session_rejects_changes() {
        let session = Session::new(Box::new(MemoryStore::new()), Box::new(FixedClock(day("2026-02-10"))));
        assert!(!session.is_setup().unwrap());
        assert!(matches!(
            session.log_bleeding(day("2026-02-01"), 2),
            Err(SessionError::Locked)
        ));
        assert!(matches!(session.analytics(), Err(SessionError::Locked)));
    }

    #[test]
    fn lock_forgets_data_after_a_panicked_writer() {
        let session = session("2026-02-10");
        session.import_entries(two_periods()).unwrap();

        let joined = std::thread::scope(|s| {
            s.spawn(|| {
                let _state = session.state.lock().unwrap();
                panic!("writer died holding the state lock");
            })
            .join()
        });
        assert!(joined.is_err());
        assert!(session.state.is_poisoned());

        session.lock();
        let state = session.state.lock().unwrap_or_else(PoisonError::into_inner);
        assert!(state.is_none());
        drop(state);
        assert!(session.snapshot().episodes.is_empty());
    }

    #[test]
    fn import_publishes_a_consistent_snapshot() {
        let session = session("2026-02-10");
        session.import_entries(two_periods()).unwrap();

        let snapshot = session.snapshot();
        assert_eq!(snapshot.episodes.len(), 2);
        assert_eq!(snapshot.cycles.len(), 1);
        assert_eq!(snapshot.prediction.unwrap().expected, day("2026-02-26"));
        // visible range defaults to the clock's month
        assert_eq!(snapshot.phases.len(), 28);
        assert!(session.is_period_active(day("2026-01-30")));
    }

    #[test]
    fn future_period_start_is_refused_without_side_effects() {
        let session = session("2026-02-10");
        let before = session.snapshot();
        let err = session.start_period(day("2026-02-11"), 2).unwrap_err();
        assert!(matches!(err, SessionError::FutureStart(_)));
        assert!(Arc::ptr_eq(&before, &session.snapshot()));
        assert!(session.entries().unwrap().is_empty());
    }

    #[test]
    fn start_and_undo_period() {
        let session = session("2026-02-10");
        session.log_bleeding(day("2026-02-01"), 7).unwrap();
        assert_eq!(session.entries().unwrap()[0].bleeding, MAX_BLEEDING);
        assert!(session.snapshot().episodes.is_empty());

        session.start_period(day("2026-02-01"), 0).unwrap();
        let entry = &session.entries().unwrap()[0];
        assert!(entry.is_period_start);
        assert_eq!(entry.bleeding, 1);
        assert_eq!(session.snapshot().episodes.len(), 1);

        session.undo_period_start(day("2026-02-01")).unwrap();
        assert!(session.snapshot().episodes.is_empty());
        assert!(session.snapshot().prediction.is_none());
    }

    #[test]
    fn update_bleeding_needs_an_existing_day() {
        let session = session("2026-02-10");
        assert!(matches!(
            session.update_bleeding(day("2026-02-01"), 2),
            Err(SessionError::NothingLogged(_))
        ));
    }

    #[test]
    fn summary_merges_day_records() {
        let session = session("2026-02-10");
        session.start_period(day("2026-02-01"), 3).unwrap();
        session
            .log_symptoms(day("2026-02-01"), &[SymptomType::Cramps, SymptomType::Cramps, SymptomType::Fatigue])
            .unwrap();
        session.add_sex_event(day("2026-02-01"), None).unwrap();
        session.update_sex_event(day("2026-02-01"), true).unwrap();

        let summary = session.summary(day("2026-02-01")).unwrap();
        assert!(summary.has_any_data());
        assert!(summary.is_period_start);
        assert_eq!(summary.bleeding, Some(3));
        assert_eq!(summary.symptoms, vec![SymptomType::Cramps, SymptomType::Fatigue]);
        assert_eq!(summary.sex_events[0].protected, Some(true));

        assert!(!session.summary(day("2026-02-02")).unwrap().has_any_data());
    }

    #[test]
    fn data_survives_lock_and_unlock() {
        let session = session("2026-02-10");
        session.import_entries(two_periods()).unwrap();
        session.update_settings(600).unwrap();
        session.lock();

        assert!(!session.is_unlocked());
        assert!(session.snapshot().episodes.is_empty());
        assert!(!session.unlock("nope").unwrap());
        assert!(session.unlock("pass").unwrap());

        assert_eq!(session.settings().unwrap().auto_lock_minutes, 60);
        assert_eq!(session.snapshot().cycles.len(), 1);
    }

    #[test]
    fn analytics_and_other_months() {
        let session = session("2026-02-10");
        session.import_entries(two_periods()).unwrap();

        let report = session.analytics().unwrap();
        assert_eq!(report.episodes.count, 2);
        assert_eq!(report.cycles.average, Some(28.0));
        assert_eq!(report.confidence, 0.2);

        session.show_month(2026, 3).unwrap();
        assert_eq!(session.snapshot().phases.len(), 31);
        assert!(matches!(session.show_month(2026, 13), Err(SessionError::InvalidMonth(2026, 13))));
    }

    #[test]
    fn delete_all_data_keeps_session_open() {
        let session = session("2026-02-10");
        session.import_entries(two_periods()).unwrap();
        session.delete_all_data().unwrap();
        assert!(session.is_unlocked());
        assert!(session.entries().unwrap().is_empty());
        assert_eq!(*session.snapshot(), Snapshot::default());
        assert!(session.export_json().unwrap().contains("\"entries\": []"));

        session.wipe().unwrap();
        assert!(!session.is_setup().unwrap());
    }
}
