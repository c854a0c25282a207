use chrono::NaiveDate;

use crate::detector::offset;
use crate::models::{Cycle, FertileWindow, PredictionWindow};
use crate::stats::{as_f64, mean, std_deviation_around};

/// Baseline average cycle length (BAvC).
pub const BASELINE_CYCLE_LENGTH: f64 = 28.0;
/// Luteal phase length, ovulation to next period.
pub const LUTEAL_LENGTH: i64 = 14;
/// Spread used when history is too short for a deviation.
pub const FALLBACK_SPREAD: f64 = 3.0;
/// Recent cycles considered by the adaptive estimators.
pub const RECENT_CYCLES: usize = 6;

const MIN_SPREAD: f64 = 2.0;
const MAX_SPREAD: f64 = 10.0;

pub fn baseline_average() -> f64 {
    BASELINE_CYCLE_LENGTH
}

fn recent_lengths(cycles: &[Cycle], max_count: usize) -> Vec<f64> {
    let skip = cycles.len().saturating_sub(max_count);
    let lengths: Vec<i64> = cycles[skip..].iter().map(|c| c.length).collect();
    as_f64(&lengths)
}

/// Adaptive average (PAvC) over the last `max_count` cycles.
/// Requires at least 2 cycles.
pub fn adaptive_average(cycles: &[Cycle], max_count: usize) -> Option<f64> {
    let recent = recent_lengths(cycles, max_count);
    if recent.len() < 2 {
        return None;
    }
    Some(mean(&recent))
}

/// Sample deviation of the last `max_count` cycles around `avg`, or
/// around their own adaptive average when `avg` is not given.
pub fn adaptive_deviation(cycles: &[Cycle], avg: Option<f64>, max_count: usize) -> Option<f64> {
    let recent = recent_lengths(cycles, max_count);
    if recent.len() < 2 {
        return None;
    }
    let avg = avg
        .or_else(|| adaptive_average(cycles, max_count))
        .unwrap_or(BASELINE_CYCLE_LENGTH);
    Some(std_deviation_around(&recent, avg))
}

/// Predict the next episode's onset window from the most recent episode
/// start and the regular cycles seen so far.
///
/// The adaptive average takes over from the baseline at 3 cycles; the
/// measured spread only from 4 cycles.
pub fn predict_window(last_start: NaiveDate, cycles: &[Cycle]) -> Option<PredictionWindow> {
    let avg = match adaptive_average(cycles, RECENT_CYCLES) {
        Some(adaptive) if cycles.len() >= 3 => adaptive,
        _ => baseline_average(),
    };

    if !(avg > 0.0 && avg < 60.0) {
        return None;
    }

    let spread = if cycles.len() >= 4 {
        adaptive_deviation(cycles, Some(avg), RECENT_CYCLES).unwrap_or(FALLBACK_SPREAD)
    } else {
        FALLBACK_SPREAD
    };
    let upper = MAX_SPREAD.min(avg / 2.0).max(MIN_SPREAD);
    let spread = spread.clamp(MIN_SPREAD, upper);

    let expected = offset(last_start, avg.round() as i64)?;
    let min = offset(last_start, (avg - spread).round() as i64)?;
    let max = offset(last_start, (avg + spread).round() as i64)?;

    Some(PredictionWindow { min, expected, max })
}

/// Ovulation is estimated a fixed luteal length before the expected period.
pub fn predict_ovulation(expected: NaiveDate) -> Option<NaiveDate> {
    offset(expected, -LUTEAL_LENGTH)
}

/// Fertile window: five days before ovulation through the day after.
pub fn fertile_window(ovulation: NaiveDate) -> Option<FertileWindow> {
    Some(FertileWindow {
        start: offset(ovulation, -5)?,
        end: offset(ovulation, 1)?,
    })
}
