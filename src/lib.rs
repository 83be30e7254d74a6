//! # Stitchline - deterministic identity stitching for event logs
//!
//! Stitchline resolves the anonymous and ambiguous identifiers in a
//! chronological event log (browser cookies, IP addresses, optional login
//! identifiers) into one durable person identity per event, so downstream
//! behavioral analysis can group activity by person instead of by device.
//! Matching is exact-key and rule-based throughout: no similarity scores,
//! no learned models.
//!
//! ## Core Concepts
//!
//! - **Visitor / cookie**: a device-scoped identifier, not unique per person
//! - **Hub IP**: an address seen on a bounded number of distinct cookies,
//!   eligible to merge them into one shared identity
//! - **Identity window**: a contiguous, time-ordered segment of one
//!   identity's events, bounded by login evidence
//! - **Stitched id**: the durable per-person identifier attached to every
//!   event, combining network and login evidence
//!
//! ## Usage
//!
//! ```rust,ignore
//! use stitchline::{RawEvent, StitchConfig, StitchPipeline};
//!
//! let pipeline = StitchPipeline::new(StitchConfig::default())?;
//! let output = pipeline.run(events)?;
//!
//! for event in &output.events {
//!     println!("{} -> {}", event.visitor_id, event.stitched_id);
//! }
//! println!("compression: {:.2}", output.stats.compression_ratio());
//! ```
//!
//! The pipeline is a DAG of pure transforms over an immutable snapshot;
//! a batch either completes fully or fails as a whole, and re-running is
//! always safe.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Records and run plumbing
pub mod config;
pub mod error;
pub mod event;
pub mod stats;

// Stitching stages, in dependency order
pub mod cluster;
pub mod join;
pub mod lookup;
pub mod resolver;
pub mod window;

// Orchestration
pub mod pipeline;
pub mod runtime;

// Re-export primary types at crate root for convenience
pub use cluster::IpEligibility;
pub use config::{InvalidEventPolicy, StitchConfig};
pub use error::{ExecutionError, StitchError, StitchResult, ValidationError};
pub use event::{GroupKey, RawEvent, ResolvedEvent, SequencedEvent, StitchedEvent, WindowedEvent};
pub use join::JoinOutcome;
pub use lookup::IdentityLookupEntry;
pub use pipeline::{StitchOutput, StitchPipeline};
pub use resolver::VisitorResolution;
pub use runtime::{PartitionHandle, PartitionStitch, StitchRuntime};
pub use stats::StitchStats;
