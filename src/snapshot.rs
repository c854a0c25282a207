//! The full derived state of a log, recomputed in one pass.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::cycles::build_cycles;
use crate::detector::segment_episodes;
use crate::models::{
    BleedingEpisode, Cycle, CyclePhase, DailyEntry, FertileWindow, IrregularCycle, PredictionWindow,
};
use crate::phase::{bleeding_phases, phases_for_dates, PhaseInputs};
use crate::prediction::{fertile_window, predict_ovulation, predict_window};

/// Derived facts published together. Readers hold an immutable value and a
/// new log state always produces a new snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Snapshot {
    pub episodes: Vec<BleedingEpisode>,
    pub cycles: Vec<Cycle>,
    pub irregular: Vec<IrregularCycle>,
    pub prediction: Option<PredictionWindow>,
    pub ovulation: Option<NaiveDate>,
    pub fertile_window: Option<FertileWindow>,
    pub phases: BTreeMap<NaiveDate, CyclePhase>,
}

impl Snapshot {
    /// Run the whole pipeline over `entries` and label each of `visible`.
    pub fn recompute(entries: &[DailyEntry], visible: &[NaiveDate]) -> Self {
        let episodes = segment_episodes(entries);
        let (cycles, irregular) = build_cycles(&episodes);

        let Some(last_start) = episodes.last().map(|e| e.start_date) else {
            return Self {
                episodes,
                cycles,
                irregular,
                ..Self::default()
            };
        };

        let prediction = predict_window(last_start, &cycles);
        let ovulation = prediction.and_then(|p| predict_ovulation(p.expected));
        let fertile = ovulation.and_then(fertile_window);

        let phases = match prediction.as_ref() {
            Some(window) => phases_for_dates(
                visible,
                &PhaseInputs {
                    episodes: &episodes,
                    last_start,
                    window,
                    ovulation,
                    fertile,
                },
            ),
            None => bleeding_phases(visible, &episodes),
        };

        Self {
            episodes,
            cycles,
            irregular,
            prediction,
            ovulation,
            fertile_window: fertile,
            phases,
        }
    }

    pub fn last_episode_start(&self) -> Option<NaiveDate> {
        self.episodes.last().map(|e| e.start_date)
    }

    pub fn is_period_active(&self, date: NaiveDate) -> bool {
        self.episodes.iter().any(|e| e.contains(date))
    }
}
