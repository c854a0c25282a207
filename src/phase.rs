//! Per-day phase labels for calendar display.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::models::{BleedingEpisode, CyclePhase, FertileWindow, PredictionWindow};

/// Derived facts a phase is classified against.
#[derive(Debug, Clone, Copy)]
pub struct PhaseInputs<'a> {
    pub episodes: &'a [BleedingEpisode],
    pub last_start: NaiveDate,
    pub window: &'a PredictionWindow,
    pub ovulation: Option<NaiveDate>,
    pub fertile: Option<FertileWindow>,
}

/// Label `date`. First match wins: bleeding, fertile window, ovulation day,
/// luteal (after ovulation, before the expected period), follicular (after
/// the last start, before the earliest predicted onset), then unknown.
///
/// The fertile window contains the ovulation day, so `Ovulation` is only
/// produced when no fertile window is supplied.
pub fn classify_phase(date: NaiveDate, inputs: &PhaseInputs<'_>) -> CyclePhase {
    if inputs.episodes.iter().any(|e| e.contains(date)) {
        return CyclePhase::Bleeding;
    }

    if inputs.fertile.is_some_and(|f| f.contains(date)) {
        return CyclePhase::FertileWindow;
    }

    if let Some(ovulation) = inputs.ovulation {
        if date == ovulation {
            return CyclePhase::Ovulation;
        }
        if date > ovulation && date < inputs.window.expected {
            return CyclePhase::Luteal;
        }
    }

    if date > inputs.last_start && date < inputs.window.min {
        return CyclePhase::Follicular;
    }

    CyclePhase::Unknown
}

pub fn phases_for_dates(dates: &[NaiveDate], inputs: &PhaseInputs<'_>) -> BTreeMap<NaiveDate, CyclePhase> {
    dates
        .iter()
        .map(|&date| (date, classify_phase(date, inputs)))
        .collect()
}

/// Phase map for a log with episodes but no prediction: only days inside a
/// logged episode are labelled.
pub fn bleeding_phases(dates: &[NaiveDate], episodes: &[BleedingEpisode]) -> BTreeMap<NaiveDate, CyclePhase> {
    dates
        .iter()
        .filter(|&&date| episodes.iter().any(|e| e.contains(date)))
        .map(|&date| (date, CyclePhase::Bleeding))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prediction::{fertile_window, predict_ovulation, predict_window};

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    struct Fixture {
        episodes: Vec<BleedingEpisode>,
        window: PredictionWindow,
        ovulation: Option<NaiveDate>,
        fertile: Option<FertileWindow>,
    }

    impl Fixture {
        /// One episode Jan 1-5 and the baseline forecast:
        /// window Jan 26 / Jan 29 / Feb 1, ovulation Jan 15, fertile Jan 10-16.
        fn baseline() -> Self {
            let start = day("2026-01-01");
            let episodes = vec![BleedingEpisode::new(start, day("2026-01-05"), Vec::new())];
            let window = predict_window(start, &[]).unwrap();
            let ovulation = predict_ovulation(window.expected);
            let fertile = ovulation.and_then(fertile_window);
            Self {
                episodes,
                window,
                ovulation,
                fertile,
            }
        }

        fn inputs(&self) -> PhaseInputs<'_> {
            PhaseInputs {
                episodes: &self.episodes,
                last_start: self.episodes[0].start_date,
                window: &self.window,
                ovulation: self.ovulation,
                fertile: self.fertile,
            }
        }
    }

    #[test]
    fn labels_follow_priority_and_boundaries() {
        let fx = Fixture::baseline();
        let inputs = fx.inputs();
        let phase = |s: &str| classify_phase(day(s), &inputs);

        assert_eq!(phase("2026-01-01"), CyclePhase::Bleeding);
        assert_eq!(phase("2026-01-05"), CyclePhase::Bleeding);
        assert_eq!(phase("2026-01-06"), CyclePhase::Follicular);
        assert_eq!(phase("2026-01-09"), CyclePhase::Follicular);
        assert_eq!(phase("2026-01-10"), CyclePhase::FertileWindow);
        assert_eq!(phase("2026-01-15"), CyclePhase::FertileWindow);
        assert_eq!(phase("2026-01-16"), CyclePhase::FertileWindow);
        assert_eq!(phase("2026-01-17"), CyclePhase::Luteal);
        assert_eq!(phase("2026-01-28"), CyclePhase::Luteal);
        assert_eq!(phase("2026-01-29"), CyclePhase::Unknown);
        assert_eq!(phase("2025-12-31"), CyclePhase::Unknown);
    }

    #[test]
    fn ovulation_day_without_fertile_window() {
        let mut fx = Fixture::baseline();
        fx.fertile = None;
        let inputs = fx.inputs();
        assert_eq!(classify_phase(day("2026-01-15"), &inputs), CyclePhase::Ovulation);
        assert_eq!(classify_phase(day("2026-01-14"), &inputs), CyclePhase::Follicular);
    }

    #[test]
    fn last_start_itself_is_not_follicular() {
        let mut fx = Fixture::baseline();
        fx.episodes.clear();
        let inputs = PhaseInputs {
            episodes: &fx.episodes,
            last_start: day("2026-01-01"),
            window: &fx.window,
            ovulation: fx.ovulation,
            fertile: fx.fertile,
        };
        assert_eq!(classify_phase(day("2026-01-01"), &inputs), CyclePhase::Unknown);
        assert_eq!(classify_phase(day("2026-01-02"), &inputs), CyclePhase::Follicular);
    }

    #[test]
    fn month_map_covers_every_date() {
        let fx = Fixture::baseline();
        let dates: Vec<NaiveDate> = (1..=31)
            .map(|d| NaiveDate::from_ymd_opt(2026, 1, d).unwrap())
            .collect();
        let map = phases_for_dates(&dates, &fx.inputs());
        assert_eq!(map.len(), 31);
        assert_eq!(map[&day("2026-01-20")], CyclePhase::Luteal);
    }
}
