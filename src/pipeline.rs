//! The stitching pipeline: intake → clusters → resolution → windows →
//! lookup → join.
//!
//! Each stage is a pure transform of owned values handed forward from the
//! previous stage; nothing is shared mutably and nothing external is
//! touched, so a failed batch leaves no partial output and re-running a
//! batch is always safe.

use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use crate::cluster::IpEligibility;
use crate::config::{InvalidEventPolicy, StitchConfig};
use crate::error::{StitchResult, ValidationError};
use crate::event::{RawEvent, ResolvedEvent, SequencedEvent, StitchedEvent};
use crate::join::join_events;
use crate::lookup::IdentityLookupEntry;
use crate::resolver::{attach_resolutions, resolve_visitors, VisitorResolution};
use crate::runtime::{stitch_partition, PartitionHandle, PartitionStitch, StitchRuntime};
use crate::stats::StitchStats;
use crate::window::partition_by_identity;

/// Everything one batch run produces.
///
/// `events` is the output contract for downstream consumers; the remaining
/// fields are audit artifacts. All of them are plain serializable values a
/// caller may cache, provided the input snapshot stays immutable between
/// runs.
#[derive(Debug, Clone, PartialEq)]
pub struct StitchOutput {
    /// Stitched events in intake order, minus any dropped at validation.
    pub events: Vec<StitchedEvent>,

    /// Distinct-cookie counts per IP and the eligibility bounds used.
    pub eligibility: IpEligibility,

    /// Per-cookie resolution decisions, sorted by `visitor_id`.
    pub resolutions: Vec<VisitorResolution>,

    /// The identity lookup table, sorted by `(ip_stitched_id, id_group)`.
    pub lookup: Vec<IdentityLookupEntry>,

    /// Audit counters for the run.
    pub stats: StitchStats,
}

/// Deterministic batch stitcher.
///
/// Construction validates the configuration; [`StitchPipeline::run`] then
/// transforms one immutable event snapshot into a [`StitchOutput`]. Running
/// twice over the same snapshot yields identical output, for any worker
/// count.
///
/// # Examples
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use stitchline::{RawEvent, StitchConfig, StitchPipeline};
///
/// let t = |s| Utc.timestamp_opt(s, 0).unwrap();
/// let events = vec![
///     RawEvent::new("cookie-a", "203.0.113.7", t(0)),
///     RawEvent::new("cookie-b", "203.0.113.7", t(10)).with_user_id("alice"),
/// ];
///
/// let pipeline = StitchPipeline::new(StitchConfig::default()).unwrap();
/// let output = pipeline.run(events).unwrap();
///
/// // Both cookies share the hub IP, so both events stitch to alice.
/// assert!(output.events.iter().all(|e| e.stitched_id == "alice"));
/// ```
#[derive(Debug, Clone)]
pub struct StitchPipeline {
    config: StitchConfig,
}

impl StitchPipeline {
    /// Creates a pipeline after validating `config`.
    ///
    /// # Errors
    ///
    /// Returns the configuration's validation error, before any data is
    /// processed.
    pub fn new(config: StitchConfig) -> Result<Self, ValidationError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// The validated configuration this pipeline runs with.
    #[must_use]
    pub const fn config(&self) -> &StitchConfig {
        &self.config
    }

    /// Stitches one batch.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an invalid event under the `Fail`
    /// intake policy, or an execution error for invariant violations
    /// (strict-mode orphan keys, impossible window shapes, worker-pool
    /// failures). On error no output is produced.
    pub fn run(&self, events: Vec<RawEvent>) -> StitchResult<StitchOutput> {
        let mut stats = StitchStats { events_in: events.len() as u64, ..StitchStats::default() };

        let accepted = self.intake(events, &mut stats)?;
        stats.distinct_visitors = distinct_visitors(&accepted);

        let eligibility = IpEligibility::build(
            &accepted,
            self.config.min_cluster_size,
            self.config.max_cluster_size,
        );
        stats.eligible_ips = eligibility.eligible_ips().count() as u64;
        info!(
            distinct_ips = eligibility.len(),
            eligible_ips = stats.eligible_ips,
            "ip clusters built"
        );

        let resolutions = resolve_visitors(&accepted, &eligibility);
        stats.merged_visitors = resolutions.iter().filter(|r| r.is_merged()).count() as u64;
        info!(
            visitors = resolutions.len(),
            merged = stats.merged_visitors,
            "visitors resolved"
        );

        let resolved = attach_resolutions(accepted, &resolutions);
        let partitions = partition_by_identity(resolved);
        stats.partitions = partitions.len() as u64;

        let stitched = self.stitch_partitions(partitions)?;
        let mut windowed = Vec::new();
        let mut lookup = Vec::new();
        for partition in stitched {
            windowed.extend(partition.windowed);
            lookup.extend(partition.entries);
        }
        stats.identity_windows = lookup.len() as u64;
        info!(
            partitions = stats.partitions,
            windows = stats.identity_windows,
            "identity windows assigned"
        );

        let outcome = join_events(windowed, &lookup, self.config.strict_mode)?;
        stats.orphan_fallbacks = outcome.orphan_fallbacks;
        stats.distinct_stitched_ids = outcome
            .events
            .iter()
            .map(|e| e.stitched_id.as_str())
            .collect::<std::collections::BTreeSet<_>>()
            .len() as u64;
        info!(
            events = outcome.events.len(),
            distinct_stitched_ids = stats.distinct_stitched_ids,
            orphan_fallbacks = stats.orphan_fallbacks,
            "batch stitched"
        );

        Ok(StitchOutput {
            events: outcome.events,
            eligibility,
            resolutions,
            lookup,
            stats,
        })
    }

    /// Validates and sequences the input batch.
    fn intake(
        &self,
        events: Vec<RawEvent>,
        stats: &mut StitchStats,
    ) -> StitchResult<Vec<SequencedEvent>> {
        let mut accepted = Vec::with_capacity(events.len());
        for (seq, event) in events.into_iter().enumerate() {
            let seq = seq as u64;
            match event.validate(seq) {
                Ok(()) => accepted.push(SequencedEvent { seq, event }),
                Err(err) => match self.config.invalid_events {
                    InvalidEventPolicy::Fail => return Err(err.into()),
                    InvalidEventPolicy::DropAndWarn => {
                        warn!(%err, "dropping invalid event");
                        stats.events_dropped += 1;
                    }
                },
            }
        }
        info!(
            events_in = stats.events_in,
            accepted = accepted.len(),
            dropped = stats.events_dropped,
            "intake complete"
        );
        Ok(accepted)
    }

    /// Runs the per-partition stage, sequentially or on the worker pool.
    fn stitch_partitions(
        &self,
        partitions: BTreeMap<String, Vec<ResolvedEvent>>,
    ) -> StitchResult<Vec<PartitionStitch>> {
        if self.config.workers <= 1 {
            let mut results = Vec::with_capacity(partitions.len());
            for (key, events) in partitions {
                debug!(partition = %key, events = events.len(), "stitching partition");
                results.push(stitch_partition(&key, events)?);
            }
            return Ok(results);
        }

        let runtime = StitchRuntime::start(self.config.workers, self.config.queue_capacity);
        let mut results = Vec::with_capacity(partitions.len());
        let mut pending: Vec<PartitionHandle> = Vec::new();
        // Dispatch in waves bounded by the queue so submission never
        // overruns capacity; partitions go out in sorted key order and are
        // collected per handle, keeping the result order deterministic.
        for (key, events) in partitions {
            if pending.len() == runtime.queue_capacity() {
                for handle in pending.drain(..) {
                    results.push(handle.join()?);
                }
            }
            pending.push(runtime.try_submit(key, events)?);
        }
        for handle in pending.drain(..) {
            results.push(handle.join()?);
        }
        Ok(results)
    }
}

fn distinct_visitors(events: &[SequencedEvent]) -> u64 {
    events
        .iter()
        .map(|e| e.event.visitor_id.as_str())
        .collect::<std::collections::BTreeSet<_>>()
        .len() as u64
}
