//! On-device menstrual cycle inference.
//!
//! Raw day entries flow one way through the engine: episodes, then cycles
//! and irregular gaps, then the next-period window, ovulation, the fertile
//! window and a phase label per calendar day. Every stage is a pure
//! function; [`Snapshot::recompute`] runs them all. [`session::Session`]
//! and [`storage`] are the host side: an encrypted, versioned store and a
//! serialized writer that publishes whole snapshots.

pub mod analytics;
pub mod calendar;
pub mod crypto;
pub mod cycles;
pub mod detector;
pub mod models;
pub mod phase;
pub mod prediction;
pub mod session;
pub mod snapshot;
pub mod stats;
pub mod storage;

pub use analytics::{
    cycle_stats, episode_stats, irregularity_stats, prediction_confidence, AnalyticsReport,
    IrregularStats, LengthStats,
};
pub use cycles::build_cycles;
pub use detector::segment_episodes;
pub use models::{
    BleedingEpisode, Cycle, CyclePhase, DailyEntry, FertileWindow, IrregularCycle,
    IrregularReason, PredictionWindow, SymptomType,
};
pub use phase::{bleeding_phases, classify_phase, phases_for_dates, PhaseInputs};
pub use prediction::{fertile_window, predict_ovulation, predict_window};
pub use snapshot::Snapshot;
