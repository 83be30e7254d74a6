//! Run configuration for the stitching pipeline.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// What to do with an event that fails intake validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidEventPolicy {
    /// Drop the event, count it, and log a warning.
    DropAndWarn,

    /// Abort the batch with a validation error.
    Fail,
}

/// Caller-supplied configuration for one pipeline run.
///
/// Validated by [`StitchConfig::validate`] before any data is processed.
/// `workers` and `queue_capacity` govern only the optional partition
/// runtime and never change results: the pipeline output is identical for
/// any worker count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StitchConfig {
    /// Minimum distinct-cookie count for an IP to act as a stitching hub.
    pub min_cluster_size: usize,

    /// Maximum distinct-cookie count for an IP to act as a stitching hub.
    /// IPs above this bound are treated as shared infrastructure and never
    /// merge anyone.
    pub max_cluster_size: usize,

    /// In strict mode an orphaned group key aborts the batch; in lenient
    /// mode the event falls back to its IP-resolved identity and the
    /// occurrence is counted.
    pub strict_mode: bool,

    /// Handling of events that fail intake validation.
    pub invalid_events: InvalidEventPolicy,

    /// Worker threads for the per-partition stage. `1` runs sequentially
    /// on the calling thread.
    pub workers: usize,

    /// Bound on queued partition jobs in the parallel runtime.
    pub queue_capacity: usize,
}

impl Default for StitchConfig {
    fn default() -> Self {
        Self {
            min_cluster_size: 2,
            max_cluster_size: 20,
            strict_mode: true,
            invalid_events: InvalidEventPolicy::DropAndWarn,
            workers: 1,
            queue_capacity: 1024,
        }
    }
}

impl StitchConfig {
    /// Rejects unusable configurations before any data is touched.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidClusterBounds` when the eligibility
    /// interval is empty or includes zero, and
    /// `ValidationError::ZeroQueueCapacity` when the runtime queue bound
    /// is zero.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.min_cluster_size == 0 || self.min_cluster_size > self.max_cluster_size {
            return Err(ValidationError::InvalidClusterBounds {
                min: self.min_cluster_size,
                max: self.max_cluster_size,
            });
        }
        if self.queue_capacity == 0 {
            return Err(ValidationError::ZeroQueueCapacity);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = StitchConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.min_cluster_size, 2);
        assert_eq!(config.max_cluster_size, 20);
        assert!(config.strict_mode);
    }

    #[test]
    fn inverted_bounds_are_rejected() {
        let config = StitchConfig { min_cluster_size: 21, max_cluster_size: 20, ..Default::default() };
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ValidationError::InvalidClusterBounds { min: 21, max: 20 }));
    }

    #[test]
    fn zero_min_is_rejected() {
        let config = StitchConfig { min_cluster_size: 0, ..Default::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_queue_capacity_is_rejected() {
        let config = StitchConfig { queue_capacity: 0, ..Default::default() };
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ValidationError::ZeroQueueCapacity));
    }
}
