//! Aggregation of one run's probe outcomes and health classification.

use chrono::{DateTime, Utc};

use crate::db::{Status, StatusSample};

/// Summary of one monitoring run over the full probe set.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub success_count: u32,
    pub total: u32,
    pub success_percentage: u8,
    pub packet_loss_percentage: u8,
    pub avg_latency_ms: Option<f64>,
    pub max_latency_ms: Option<f64>,
    pub min_latency_ms: Option<f64>,
}

/// Reduce a run's probe outcomes to a summary.
///
/// `total` is the fixed probe count for the run (targets x probes-per-target);
/// a non-empty target set is enforced at startup, so `total` is never zero
/// here. Percentages use integer floor division so they always sum to 100
/// with the complementary loss figure. Latency stats exist only when at least
/// one probe succeeded; a fully failed run carries no latency at all.
pub fn aggregate(outcomes: &[Option<f64>], total: u32) -> RunSummary {
    debug_assert!(total > 0, "probe total must be validated at startup");
    debug_assert_eq!(outcomes.len() as u32, total);

    let latencies: Vec<f64> = outcomes.iter().flatten().copied().collect();
    let success_count = latencies.len() as u32;

    let success_percentage = (success_count * 100 / total) as u8;
    let packet_loss_percentage = 100 - success_percentage;

    let (avg, max, min) = if latencies.is_empty() {
        (None, None, None)
    } else {
        let sum: f64 = latencies.iter().sum();
        let max = latencies.iter().cloned().fold(f64::MIN, f64::max);
        let min = latencies.iter().cloned().fold(f64::MAX, f64::min);
        (Some(sum / latencies.len() as f64), Some(max), Some(min))
    };

    RunSummary {
        success_count,
        total,
        success_percentage,
        packet_loss_percentage,
        avg_latency_ms: avg,
        max_latency_ms: max,
        min_latency_ms: min,
    }
}

/// Pure per-run classification; no hysteresis, independent of history.
pub fn classify(success_percentage: u8) -> Status {
    match success_percentage {
        100 => Status::Up,
        0 => Status::Down,
        _ => Status::Partial,
    }
}

impl RunSummary {
    /// Materialize the run as an immutable sample row.
    pub fn into_sample(self, timestamp: DateTime<Utc>) -> StatusSample {
        StatusSample {
            timestamp,
            status: classify(self.success_percentage),
            success_percentage: self.success_percentage,
            avg_latency_ms: self.avg_latency_ms,
            max_latency_ms: self.max_latency_ms,
            min_latency_ms: self.min_latency_ms,
            packet_loss_percentage: self.packet_loss_percentage,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcomes(successes: u32, failures: u32) -> Vec<Option<f64>> {
        let mut v: Vec<Option<f64>> = (0..successes).map(|i| Some(10.0 + i as f64)).collect();
        v.extend((0..failures).map(|_| None));
        v
    }

    #[test]
    fn test_all_successes_is_up() {
        let summary = aggregate(&outcomes(15, 0), 15);
        assert_eq!(summary.success_percentage, 100);
        assert_eq!(summary.packet_loss_percentage, 0);
        assert_eq!(classify(summary.success_percentage), Status::Up);
    }

    #[test]
    fn test_partial_uses_floor_division() {
        // 8 of 15 = 53.33% floors to 53.
        let summary = aggregate(&outcomes(8, 7), 15);
        assert_eq!(summary.success_percentage, 53);
        assert_eq!(summary.packet_loss_percentage, 47);
        assert_eq!(classify(summary.success_percentage), Status::Partial);
    }

    #[test]
    fn test_zero_successes_is_down_with_no_latency() {
        let summary = aggregate(&outcomes(0, 15), 15);
        assert_eq!(summary.success_percentage, 0);
        assert_eq!(summary.packet_loss_percentage, 100);
        assert_eq!(summary.avg_latency_ms, None);
        assert_eq!(summary.max_latency_ms, None);
        assert_eq!(summary.min_latency_ms, None);
        assert_eq!(classify(summary.success_percentage), Status::Down);
    }

    #[test]
    fn test_percentages_always_sum_to_100() {
        for successes in 0..=15 {
            let summary = aggregate(&outcomes(successes, 15 - successes), 15);
            assert_eq!(
                summary.success_percentage as u32 + summary.packet_loss_percentage as u32,
                100
            );
            assert_eq!(
                summary.avg_latency_ms.is_some(),
                summary.success_percentage > 0
            );
        }
    }

    #[test]
    fn test_latency_stats() {
        let runs = vec![Some(10.0), Some(20.0), Some(60.0), None];
        let summary = aggregate(&runs, 4);
        assert_eq!(summary.success_count, 3);
        assert_eq!(summary.avg_latency_ms, Some(30.0));
        assert_eq!(summary.max_latency_ms, Some(60.0));
        assert_eq!(summary.min_latency_ms, Some(10.0));
    }

    #[test]
    fn test_classify_boundaries() {
        assert_eq!(classify(100), Status::Up);
        assert_eq!(classify(99), Status::Partial);
        assert_eq!(classify(1), Status::Partial);
        assert_eq!(classify(0), Status::Down);
    }

    #[test]
    fn test_into_sample_preserves_invariants() {
        let ts = Utc::now();
        let sample = aggregate(&outcomes(8, 7), 15).into_sample(ts);
        assert_eq!(sample.status, Status::Partial);
        assert_eq!(
            sample.success_percentage + sample.packet_loss_percentage,
            100
        );
        assert_eq!(sample.timestamp, ts);
    }
}
