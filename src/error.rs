//! Error types for stitchline.
//!
//! All errors are strongly typed using thiserror. Validation errors are
//! raised for configuration and event intake, before or while admitting a
//! batch; execution errors abort a running batch. There is no retry logic
//! anywhere: every stage is a pure function of validated input, so a
//! failure is either locally absorbed (dropped records, counted) or
//! surfaced as a batch-level abort.

use thiserror::Error;

/// Validation errors raised for configuration and event intake.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// An event lacks a required field (or carries it empty).
    #[error("Event at intake position {seq} is missing required field '{field}'")]
    MissingField {
        /// Name of the missing field.
        field: &'static str,
        /// Zero-based position of the offending event in the input batch.
        seq: u64,
    },

    /// The eligibility interval is empty or includes zero.
    #[error("Invalid cluster bounds: [{min}, {max}] must be a non-empty interval of positive sizes")]
    InvalidClusterBounds {
        /// Configured lower bound.
        min: usize,
        /// Configured upper bound.
        max: usize,
    },

    /// The partition runtime cannot operate with a zero-capacity queue.
    #[error("queue_capacity must be at least 1")]
    ZeroQueueCapacity,
}

/// Execution errors that abort a running batch.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// A windowed event's group key has no lookup entry.
    ///
    /// The lookup builder is exhaustive over all observed groups, so this
    /// is an invariant violation. It is fatal in strict mode only; in
    /// lenient mode the joiner falls back and counts the occurrence.
    #[error("No lookup entry for group ({ip_stitched_id}, {id_group})")]
    OrphanGroupKey {
        /// Partition identity of the orphaned group.
        ip_stitched_id: String,
        /// Window ordinal of the orphaned group.
        id_group: u32,
    },

    /// An interior identity window carries no login evidence.
    ///
    /// Every window past the first starts with its login event, so a
    /// login-free window can only be a sole trailing window. Observing one
    /// anywhere else means the windowing invariant was broken upstream.
    #[error("Window ({ip_stitched_id}, {id_group}) carries no login evidence and is neither first nor last")]
    WindowWithoutIdentity {
        /// Partition identity of the empty window.
        ip_stitched_id: String,
        /// Window ordinal of the empty window.
        id_group: u32,
    },

    /// An identity window carries more than one distinct login identifier.
    ///
    /// Each login event starts its own window, so at most one distinct
    /// `user_id` can appear per window.
    #[error("Window ({ip_stitched_id}, {id_group}) carries {count} distinct login identifiers, expected at most 1")]
    AmbiguousWindowIdentity {
        /// Partition identity of the ambiguous window.
        ip_stitched_id: String,
        /// Window ordinal of the ambiguous window.
        id_group: u32,
        /// Number of distinct login identifiers observed.
        count: usize,
    },

    /// The partition runtime's job queue is full.
    #[error("Partition job queue is full (capacity: {capacity})")]
    QueueFull {
        /// Configured queue capacity.
        capacity: usize,
    },

    /// The partition runtime's workers are gone.
    #[error("Partition workers disconnected before completing the batch")]
    WorkerDisconnected,
}

/// Top-level error type for stitchline.
#[derive(Debug, Error)]
pub enum StitchError {
    /// Configuration or intake validation failed.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// A running batch hit an invariant violation.
    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),
}

impl StitchError {
    /// Returns true if this is a validation error.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns true if this is an execution error.
    #[must_use]
    pub const fn is_execution(&self) -> bool {
        matches!(self, Self::Execution(_))
    }
}

/// Result type alias for stitchline operations.
pub type StitchResult<T> = Result<T, StitchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_field_message() {
        let err = ValidationError::MissingField { field: "visitor_id", seq: 7 };
        let msg = format!("{err}");
        assert!(msg.contains("visitor_id"));
        assert!(msg.contains('7'));
    }

    #[test]
    fn test_invalid_cluster_bounds_message() {
        let err = ValidationError::InvalidClusterBounds { min: 5, max: 2 };
        let msg = format!("{err}");
        assert!(msg.contains("[5, 2]"));
    }

    #[test]
    fn test_orphan_group_key_message() {
        let err = ExecutionError::OrphanGroupKey {
            ip_stitched_id: "10.0.0.1".to_string(),
            id_group: 3,
        };
        let msg = format!("{err}");
        assert!(msg.contains("10.0.0.1"));
        assert!(msg.contains('3'));
    }

    #[test]
    fn test_stitch_error_from_validation() {
        let err: StitchError = ValidationError::ZeroQueueCapacity.into();
        assert!(err.is_validation());
        assert!(!err.is_execution());
    }

    #[test]
    fn test_stitch_error_from_execution() {
        let err: StitchError = ExecutionError::WorkerDisconnected.into();
        assert!(err.is_execution());
        assert!(!err.is_validation());
    }
}
