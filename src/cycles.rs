//! Builds cycles from consecutive episode starts and sets aside gaps that
//! are too short or too long to be a cycle.

use crate::models::{BleedingEpisode, Cycle, IrregularCycle, IrregularReason};

pub const MIN_CYCLE_LENGTH: i64 = 12;
pub const MAX_CYCLE_LENGTH: i64 = 90;

/// Split the gaps between consecutive episode starts into regular cycles
/// and irregular gaps. Needs at least two episodes.
pub fn build_cycles(episodes: &[BleedingEpisode]) -> (Vec<Cycle>, Vec<IrregularCycle>) {
    let mut starts: Vec<_> = episodes.iter().map(|e| e.start_date).collect();
    starts.sort();

    let mut cycles = Vec::new();
    let mut irregular = Vec::new();

    for w in starts.windows(2) {
        let (from, to) = (w[0], w[1]);
        let length = (to - from).num_days();

        if length < MIN_CYCLE_LENGTH {
            irregular.push(IrregularCycle::new(from, to, IrregularReason::TooShort));
        } else if length > MAX_CYCLE_LENGTH {
            irregular.push(IrregularCycle::new(from, to, IrregularReason::TooLong));
        } else {
            cycles.push(Cycle::new(from, to));
        }
    }

    (cycles, irregular)
}
