//! Descriptive statistics over the derived history, and a heuristic
//! confidence score for the next prediction.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::detector::offset;
use crate::models::{BleedingEpisode, Cycle, IrregularCycle, IrregularReason};
use crate::stats::{as_f64, mean, median, std_deviation_around};

/// Default look-back for counting recent irregular gaps.
pub const RECENT_IRREGULAR_DAYS: i64 = 180;

/// Confidence reported when there are fewer than two cycle lengths.
const SPARSE_CONFIDENCE: f64 = 0.2;
/// Coefficient of variation at which confidence bottoms out.
const VARIABILITY_CEILING: f64 = 0.3;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LengthStats {
    pub count: usize,
    pub average: Option<f64>,
    pub median: Option<f64>,
    pub min: Option<i64>,
    pub max: Option<i64>,
    pub std_deviation: Option<f64>,
}

impl LengthStats {
    pub fn from_lengths(lengths: &[i64]) -> Self {
        if lengths.is_empty() {
            return Self {
                count: 0,
                average: None,
                median: None,
                min: None,
                max: None,
                std_deviation: None,
            };
        }

        let values = as_f64(lengths);
        let avg = mean(&values);
        Self {
            count: lengths.len(),
            average: Some(avg),
            median: median(&values),
            min: lengths.iter().copied().min(),
            max: lengths.iter().copied().max(),
            std_deviation: Some(std_deviation_around(&values, avg)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IrregularStats {
    pub total: usize,
    pub too_short: usize,
    pub too_long: usize,
    pub recent: usize,
}

/// Everything the stats view shows, in one value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalyticsReport {
    pub episodes: LengthStats,
    pub cycles: LengthStats,
    pub irregular: IrregularStats,
    pub confidence: f64,
}

/// Episode lengths count both the first and the last day.
pub fn episode_stats(episodes: &[BleedingEpisode]) -> LengthStats {
    let lengths: Vec<i64> = episodes.iter().map(BleedingEpisode::length).collect();
    LengthStats::from_lengths(&lengths)
}

pub fn cycle_stats(cycles: &[Cycle]) -> LengthStats {
    let lengths: Vec<i64> = cycles.iter().map(|c| c.length).collect();
    LengthStats::from_lengths(&lengths)
}

/// Counts irregular gaps by reason, and those whose later start falls
/// within the last `recent_days` before `today`.
pub fn irregularity_stats(irregular: &[IrregularCycle], recent_days: i64, today: NaiveDate) -> IrregularStats {
    let cutoff = recent_days
        .checked_neg()
        .and_then(|back| offset(today, back))
        .unwrap_or(NaiveDate::MIN);
    IrregularStats {
        total: irregular.len(),
        too_short: irregular
            .iter()
            .filter(|i| i.reason == IrregularReason::TooShort)
            .count(),
        too_long: irregular
            .iter()
            .filter(|i| i.reason == IrregularReason::TooLong)
            .count(),
        recent: irregular.iter().filter(|i| i.to_start >= cutoff).count(),
    }
}

/// Heuristic 0.0-1.0 score: the more the cycle lengths vary relative to
/// their mean, the lower the confidence.
pub fn prediction_confidence(cycles: &[Cycle]) -> f64 {
    if cycles.len() < 2 {
        return SPARSE_CONFIDENCE;
    }
    let lengths: Vec<i64> = cycles.iter().map(|c| c.length).collect();
    let values = as_f64(&lengths);
    let avg = mean(&values);
    if avg == 0.0 {
        return 0.0;
    }
    let variability = std_deviation_around(&values, avg) / avg;
    (1.0 - (variability / VARIABILITY_CEILING).min(1.0)).clamp(0.0, 1.0)
}

pub fn report(
    episodes: &[BleedingEpisode],
    cycles: &[Cycle],
    irregular: &[IrregularCycle],
    today: NaiveDate,
) -> AnalyticsReport {
    AnalyticsReport {
        episodes: episode_stats(episodes),
        cycles: cycle_stats(cycles),
        irregular: irregularity_stats(irregular, RECENT_IRREGULAR_DAYS, today),
        confidence: prediction_confidence(cycles),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn make_cycles(lengths: &[i64]) -> Vec<Cycle> {
        let mut start = day("2025-01-01");
        lengths
            .iter()
            .map(|&len| {
                let end = start + chrono::Duration::days(len);
                let cycle = Cycle::new(start, end);
                start = end;
                cycle
            })
            .collect()
    }

    #[test]
    fn empty_stats_only_have_a_count() {
        let stats = cycle_stats(&[]);
        assert_eq!(stats.count, 0);
        assert!(stats.average.is_none());
        assert!(stats.median.is_none());
        assert!(stats.min.is_none());
        assert!(stats.max.is_none());
        assert!(stats.std_deviation.is_none());
    }

    #[test]
    fn cycle_stats_computed() {
        let stats = cycle_stats(&make_cycles(&[24, 18, 22, 20]));
        assert_eq!(stats.count, 4);
        assert_eq!(stats.average, Some(21.0));
        assert_eq!(stats.median, Some(21.0));
        assert_eq!(stats.min, Some(18));
        assert_eq!(stats.max, Some(24));
    }

    #[test]
    fn single_sample_has_zero_deviation() {
        let stats = cycle_stats(&make_cycles(&[28]));
        assert_eq!(stats.std_deviation, Some(0.0));
    }

    #[test]
    fn episode_lengths_are_inclusive() {
        let episodes = vec![
            BleedingEpisode::new(day("2025-01-01"), day("2025-01-05"), Vec::new()),
            BleedingEpisode::new(day("2025-01-29"), day("2025-01-29"), Vec::new()),
        ];
        let stats = episode_stats(&episodes);
        assert_eq!(stats.min, Some(1));
        assert_eq!(stats.max, Some(5));
        assert_eq!(stats.average, Some(3.0));
    }

    #[test]
    fn irregular_counts_by_reason_and_recency() {
        let irregular = vec![
            IrregularCycle::new(day("2025-01-01"), day("2025-01-06"), IrregularReason::TooShort),
            IrregularCycle::new(day("2025-01-06"), day("2025-06-01"), IrregularReason::TooLong),
            IrregularCycle::new(day("2025-09-01"), day("2025-09-05"), IrregularReason::TooShort),
        ];
        let stats = irregularity_stats(&irregular, RECENT_IRREGULAR_DAYS, day("2025-11-28"));
        assert_eq!(stats.total, 3);
        assert_eq!(stats.too_short, 2);
        assert_eq!(stats.too_long, 1);
        // cutoff 2025-06-01 is inclusive
        assert_eq!(stats.recent, 2);
    }

    #[test]
    fn huge_recency_windows_count_everything() {
        let irregular = vec![IrregularCycle::new(
            day("2025-01-01"),
            day("2025-01-06"),
            IrregularReason::TooShort,
        )];
        let today = day("2026-01-01");
        for recent_days in [i64::MAX / 2, i64::MAX, i64::MIN] {
            let stats = irregularity_stats(&irregular, recent_days, today);
            assert_eq!(stats.total, 1);
            assert_eq!(stats.recent, 1);
        }
        assert_eq!(irregularity_stats(&[], i64::MAX / 2, today).recent, 0);
    }

    #[test]
    fn confidence_is_fixed_for_sparse_history() {
        assert_eq!(prediction_confidence(&[]), 0.2);
        assert_eq!(prediction_confidence(&make_cycles(&[28])), 0.2);
    }

    #[test]
    fn confidence_drops_with_variance() {
        let steady = prediction_confidence(&make_cycles(&[28, 28, 28]));
        let mild = prediction_confidence(&make_cycles(&[27, 28, 29]));
        let wild = prediction_confidence(&make_cycles(&[18, 28, 38]));
        assert_eq!(steady, 1.0);
        assert!(mild < steady);
        assert!(wild <= mild);
        // cv = 10/28 > 0.3 bottoms out
        assert_eq!(wild, 0.0);
    }

    #[test]
    fn report_bundles_everything() {
        let cycles = make_cycles(&[28, 30]);
        let report = report(&[], &cycles, &[], day("2025-03-01"));
        assert_eq!(report.cycles.count, 2);
        assert_eq!(report.episodes.count, 0);
        assert_eq!(report.irregular.total, 0);
        assert!(report.confidence > 0.2);
    }
}
