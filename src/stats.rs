//! Per-run audit counters.

use serde::{Deserialize, Serialize};

/// Counters describing one pipeline run, exposed for audit alongside the
/// stitched events.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StitchStats {
    /// Events presented to intake.
    pub events_in: u64,

    /// Events dropped at intake for missing required fields.
    pub events_dropped: u64,

    /// Distinct `visitor_id` values across accepted events.
    pub distinct_visitors: u64,

    /// IPs whose distinct-cookie count fell inside the eligibility bounds.
    pub eligible_ips: u64,

    /// Visitors whose `ip_stitched_id` differs from their `visitor_id`.
    pub merged_visitors: u64,

    /// Distinct `ip_stitched_id` partitions windowed.
    pub partitions: u64,

    /// Identity windows observed across all partitions.
    pub identity_windows: u64,

    /// Distinct `stitched_id` values in the output.
    pub distinct_stitched_ids: u64,

    /// Events that hit the lenient-mode orphan fallback in the joiner.
    pub orphan_fallbacks: u64,
}

impl StitchStats {
    /// Distinct stitched identities per distinct cookie (0.0 to 1.0).
    ///
    /// Lower is more compression; 1.0 means stitching merged nothing.
    /// Returns 0.0 for an empty batch.
    #[must_use]
    pub fn compression_ratio(&self) -> f64 {
        if self.distinct_visitors == 0 {
            0.0
        } else {
            self.distinct_stitched_ids as f64 / self.distinct_visitors as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compression_ratio_handles_empty_batch() {
        assert_eq!(StitchStats::default().compression_ratio(), 0.0);
    }

    #[test]
    fn compression_ratio_is_stitched_over_visitors() {
        let stats = StitchStats { distinct_visitors: 10, distinct_stitched_ids: 7, ..Default::default() };
        assert!((stats.compression_ratio() - 0.7).abs() < f64::EPSILON);
    }
}
