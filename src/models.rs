use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Highest bleeding level a day can carry (0 = none, 4 = very heavy).
pub const MAX_BLEEDING: u8 = 4;

/// Namespace for name-based ids of derived records.
const DERIVED_NAMESPACE: Uuid = Uuid::from_u128(0x6b1f_2c0e_93a4_4f57_9d2e_0c1a_7e55_c7e1);

/// Deterministic id for a derived record, so recomputing an unchanged log
/// yields identical output.
pub(crate) fn derived_id(kind: &str, dates: &[NaiveDate]) -> Uuid {
    let mut name = String::from(kind);
    for date in dates {
        name.push(':');
        name.push_str(&date.format("%Y-%m-%d").to_string());
    }
    Uuid::new_v5(&DERIVED_NAMESPACE, name.as_bytes())
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "camelCase")]
pub enum SymptomType {
    Cramps,
    Bloating,
    Headache,
    BackPain,
    TenderBreasts,
    Fatigue,
    MoodSwing,
    Cravings,
    Nausea,
    Acne,
    Insomnia,
    Diarrhea,
    Constipation,
    OvulationPain,
    #[serde(other)]
    Other,
}

impl SymptomType {
    pub const ALL: [SymptomType; 15] = [
        SymptomType::Cramps,
        SymptomType::Bloating,
        SymptomType::Headache,
        SymptomType::BackPain,
        SymptomType::TenderBreasts,
        SymptomType::Fatigue,
        SymptomType::MoodSwing,
        SymptomType::Cravings,
        SymptomType::Nausea,
        SymptomType::Acne,
        SymptomType::Insomnia,
        SymptomType::Diarrhea,
        SymptomType::Constipation,
        SymptomType::OvulationPain,
        SymptomType::Other,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SymptomType::Cramps => "cramps",
            SymptomType::Bloating => "bloating",
            SymptomType::Headache => "headache",
            SymptomType::BackPain => "backPain",
            SymptomType::TenderBreasts => "tenderBreasts",
            SymptomType::Fatigue => "fatigue",
            SymptomType::MoodSwing => "moodSwing",
            SymptomType::Cravings => "cravings",
            SymptomType::Nausea => "nausea",
            SymptomType::Acne => "acne",
            SymptomType::Insomnia => "insomnia",
            SymptomType::Diarrhea => "diarrhea",
            SymptomType::Constipation => "constipation",
            SymptomType::OvulationPain => "ovulationPain",
            SymptomType::Other => "other",
        }
    }

    /// Parse a free-form tag. Anything unrecognised is `Other`.
    pub fn from_tag(tag: &str) -> Self {
        let tag = tag.trim();
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(tag))
            .unwrap_or(SymptomType::Other)
    }
}

/// One user-entered day of the log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DailyEntry {
    pub id: Uuid,
    pub date: NaiveDate,
    /// 0 to 4, none to very heavy.
    pub bleeding: u8,
    #[serde(default)]
    pub is_period_start: bool,
    #[serde(default)]
    pub symptoms: Vec<SymptomType>,
    #[serde(default)]
    pub note: Option<String>,
}

impl DailyEntry {
    pub fn new(date: NaiveDate, bleeding: u8) -> Self {
        Self {
            id: Uuid::new_v4(),
            date,
            bleeding: bleeding.min(MAX_BLEEDING),
            is_period_start: false,
            symptoms: Vec::new(),
            note: None,
        }
    }

    pub fn period_start(date: NaiveDate, bleeding: u8) -> Self {
        Self {
            is_period_start: true,
            ..Self::new(date, bleeding)
        }
    }
}

/// A contiguous run of days treated as one bleeding event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BleedingEpisode {
    pub id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub days: Vec<DailyEntry>,
}

impl BleedingEpisode {
    pub(crate) fn new(start_date: NaiveDate, end_date: NaiveDate, days: Vec<DailyEntry>) -> Self {
        Self {
            id: derived_id("episode", &[start_date]),
            start_date,
            end_date,
            days,
        }
    }

    /// Inclusive length in days.
    pub fn length(&self) -> i64 {
        (self.end_date - self.start_date).num_days() + 1
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }
}

/// Span between two consecutive episode starts, within normal bounds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Cycle {
    pub id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub length: i64,
}

impl Cycle {
    pub(crate) fn new(start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            id: derived_id("cycle", &[start_date, end_date]),
            start_date,
            end_date,
            length: (end_date - start_date).num_days(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum IrregularReason {
    TooShort,
    TooLong,
}

/// Inter-episode gap that fell outside the normal cycle-length band.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IrregularCycle {
    pub id: Uuid,
    pub from_start: NaiveDate,
    pub to_start: NaiveDate,
    pub length: i64,
    pub reason: IrregularReason,
}

impl IrregularCycle {
    pub(crate) fn new(from_start: NaiveDate, to_start: NaiveDate, reason: IrregularReason) -> Self {
        Self {
            id: derived_id("irregular", &[from_start, to_start]),
            from_start,
            to_start,
            length: (to_start - from_start).num_days(),
            reason,
        }
    }
}

/// Forecast of the next episode's onset.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PredictionWindow {
    pub min: NaiveDate,
    pub expected: NaiveDate,
    pub max: NaiveDate,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct FertileWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl FertileWindow {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum CyclePhase {
    Bleeding,
    Follicular,
    FertileWindow,
    Ovulation,
    Luteal,
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Symptom {
    pub id: Uuid,
    pub date: NaiveDate,
    pub symptom_type: SymptomType,
    #[serde(default)]
    pub intensity: Option<u8>, // 1-3
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SexEvent {
    pub id: Uuid,
    pub date: NaiveDate,
    #[serde(default)]
    pub protected: Option<bool>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Everything the host persists. Derived facts are never stored.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct AppData {
    #[serde(default)]
    pub entries: Vec<DailyEntry>,
    #[serde(default)]
    pub symptoms: Vec<Symptom>,
    #[serde(default)]
    pub sex_events: Vec<SexEvent>,
    #[serde(default)]
    pub settings: AppSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppSettings {
    pub auto_lock_minutes: u32,
    #[serde(default)]
    pub show_fertility: bool,
    #[serde(default)]
    pub cycle_length_override: Option<u32>,
    #[serde(default)]
    pub irregular_user: bool,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            auto_lock_minutes: 5,
            show_fertility: false,
            cycle_length_override: None,
            irregular_user: false,
        }
    }
}

/// Everything logged for a single day, for a day popover.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DaySummary {
    pub date: NaiveDate,
    pub bleeding: Option<u8>,
    pub is_period_start: bool,
    pub sex_events: Vec<SexEvent>,
    pub symptoms: Vec<SymptomType>,
}

impl DaySummary {
    pub fn has_any_data(&self) -> bool {
        self.bleeding.is_some() || !self.sex_events.is_empty() || !self.symptoms.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn unknown_symptom_tag_is_other() {
        let parsed: Vec<SymptomType> =
            serde_json::from_str(r#"["cramps", "backPain", "sneezing"]"#).unwrap();
        assert_eq!(
            parsed,
            vec![SymptomType::Cramps, SymptomType::BackPain, SymptomType::Other]
        );
        assert_eq!(SymptomType::from_tag(" Fatigue "), SymptomType::Fatigue);
        assert_eq!(SymptomType::from_tag("hiccups"), SymptomType::Other);
    }

    #[test]
    fn bleeding_is_capped_on_construction() {
        let entry = DailyEntry::new(day("2026-01-01"), 9);
        assert_eq!(entry.bleeding, MAX_BLEEDING);
        assert!(!entry.is_period_start);
    }

    #[test]
    fn derived_ids_are_stable() {
        let a = Cycle::new(day("2026-01-01"), day("2026-01-29"));
        let b = Cycle::new(day("2026-01-01"), day("2026-01-29"));
        let c = Cycle::new(day("2026-01-02"), day("2026-01-29"));
        assert_eq!(a.id, b.id);
        assert_ne!(a.id, c.id);
        assert_eq!(a.length, 28);
    }

    #[test]
    fn settings_fill_missing_fields() {
        let settings: AppSettings = serde_json::from_str(r#"{"auto_lock_minutes": 10}"#).unwrap();
        assert_eq!(settings.auto_lock_minutes, 10);
        assert!(!settings.show_fertility);
        assert_eq!(settings.cycle_length_override, None);
    }
}
