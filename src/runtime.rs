//! Bounded, thread-based runtime for the per-partition stages.
//!
//! Windowing and lookup building are order-sensitive only *within* one
//! `ip_stitched_id` partition, so partitions can be stitched on independent
//! worker threads with no shared mutable state. This module provides a
//! small bounded runtime for that: named worker threads behind a bounded
//! crossbeam channel, per-job reply channels, typed submission errors, and
//! deterministic join-on-drop shutdown.
//!
//! The runtime changes wall-clock time only. Each job is the same pure
//! [`stitch_partition`] the sequential path calls, and the pipeline
//! collects replies in submission order, so output is identical for any
//! worker count.

use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};

use crate::error::{ExecutionError, StitchError, StitchResult};
use crate::event::{ResolvedEvent, WindowedEvent};
use crate::lookup::{build_partition_lookup, IdentityLookupEntry};
use crate::window::assign_windows;

/// Windowing and lookup output for one partition.
#[derive(Debug, Clone, PartialEq)]
pub struct PartitionStitch {
    /// The partition's events with identity windows assigned.
    pub windowed: Vec<WindowedEvent>,

    /// Lookup rows for the partition's observed windows.
    pub entries: Vec<IdentityLookupEntry>,
}

/// Runs the per-partition stage (windowing scan + lookup build) for one
/// partition.
///
/// This is the unit of work the runtime distributes; the sequential path
/// calls it directly.
///
/// # Errors
///
/// Propagates the lookup builder's invariant violations.
pub fn stitch_partition(
    ip_stitched_id: &str,
    events: Vec<ResolvedEvent>,
) -> Result<PartitionStitch, ExecutionError> {
    let windowed = assign_windows(events);
    let entries = build_partition_lookup(ip_stitched_id, &windowed)?;
    Ok(PartitionStitch { windowed, entries })
}

struct Job {
    ip_stitched_id: String,
    events: Vec<ResolvedEvent>,
    reply: Sender<Result<PartitionStitch, ExecutionError>>,
}

/// Handle for one submitted partition job.
pub struct PartitionHandle {
    rx: Receiver<Result<PartitionStitch, ExecutionError>>,
}

impl PartitionHandle {
    /// Waits for the partition's result.
    ///
    /// # Errors
    ///
    /// Returns `ExecutionError::WorkerDisconnected` if the worker died
    /// before replying, otherwise the job's own result.
    pub fn join(self) -> StitchResult<PartitionStitch> {
        let result = self
            .rx
            .recv()
            .map_err(|_| StitchError::Execution(ExecutionError::WorkerDisconnected))?;
        result.map_err(StitchError::Execution)
    }
}

/// A bounded pool of partition workers.
pub struct StitchRuntime {
    tx: Sender<Job>,
    workers: Vec<JoinHandle<()>>,
    queue_capacity: usize,
}

impl StitchRuntime {
    /// Starts `workers` named worker threads behind a queue of
    /// `queue_capacity` jobs. Both are clamped to at least 1.
    #[must_use]
    pub fn start(workers: usize, queue_capacity: usize) -> Self {
        let workers = workers.max(1);
        let queue_capacity = queue_capacity.max(1);
        let (tx, rx) = bounded::<Job>(queue_capacity);

        let mut handles = Vec::with_capacity(workers);
        for idx in 0..workers {
            let rx: Receiver<Job> = rx.clone();
            let thread_name = format!("stitchline-partition-{idx}");
            let handle = thread::Builder::new()
                .name(thread_name)
                .spawn(move || {
                    while let Ok(job) = rx.recv() {
                        let result = stitch_partition(&job.ip_stitched_id, job.events);
                        let _ = job.reply.send(result);
                    }
                })
                .expect("failed to spawn stitchline worker");
            handles.push(handle);
        }

        Self { tx, workers: handles, queue_capacity }
    }

    /// Submits one partition without blocking.
    ///
    /// # Errors
    ///
    /// Returns `ExecutionError::QueueFull` when `queue_capacity` jobs are
    /// already pending and `ExecutionError::WorkerDisconnected` when the
    /// pool is gone.
    pub fn try_submit(
        &self,
        ip_stitched_id: String,
        events: Vec<ResolvedEvent>,
    ) -> StitchResult<PartitionHandle> {
        let (reply, rx) = bounded::<Result<PartitionStitch, ExecutionError>>(1);
        let job = Job { ip_stitched_id, events, reply };
        match self.tx.try_send(job) {
            Ok(()) => Ok(PartitionHandle { rx }),
            Err(TrySendError::Full(_)) => Err(StitchError::Execution(ExecutionError::QueueFull {
                capacity: self.queue_capacity,
            })),
            Err(TrySendError::Disconnected(_)) => {
                Err(StitchError::Execution(ExecutionError::WorkerDisconnected))
            }
        }
    }

    /// Maximum number of pending jobs.
    #[must_use]
    pub const fn queue_capacity(&self) -> usize {
        self.queue_capacity
    }
}

impl Drop for StitchRuntime {
    fn drop(&mut self) {
        // Close the channel so workers drain queued jobs and exit, then
        // join them for deterministic shutdown.
        let _ = std::mem::replace(&mut self.tx, bounded::<Job>(1).0);
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, TimeZone, Utc};

    use crate::event::RawEvent;

    use super::*;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn partition(key: &str, rows: &[(u64, i64, Option<&str>)]) -> Vec<ResolvedEvent> {
        rows.iter()
            .map(|(seq, secs, user)| {
                let mut event = RawEvent::new("v1", "10.0.0.1", at(*secs));
                if let Some(user) = user {
                    event = event.with_user_id(*user);
                }
                ResolvedEvent { seq: *seq, ip_stitched_id: key.to_string(), event }
            })
            .collect()
    }

    #[test]
    fn workers_match_the_sequential_path() {
        let partitions: Vec<(String, Vec<ResolvedEvent>)> = (0..8)
            .map(|p| {
                let key = format!("partition-{p}");
                let rows: Vec<(u64, i64, Option<&str>)> = (0..5)
                    .map(|i| {
                        let user = if i == 2 { Some("u1") } else { None };
                        ((p * 5 + i) as u64, (i * 10) as i64, user)
                    })
                    .collect();
                let events = partition(&key, &rows);
                (key, events)
            })
            .collect();

        let sequential: Vec<PartitionStitch> = partitions
            .iter()
            .map(|(key, events)| stitch_partition(key, events.clone()).unwrap())
            .collect();

        let runtime = StitchRuntime::start(4, 16);
        let handles: Vec<PartitionHandle> = partitions
            .iter()
            .map(|(key, events)| runtime.try_submit(key.clone(), events.clone()).unwrap())
            .collect();
        let parallel: Vec<PartitionStitch> =
            handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(parallel, sequential);
    }

    #[test]
    fn replies_arrive_per_job_not_per_worker() {
        let runtime = StitchRuntime::start(1, 4);
        let a = runtime
            .try_submit("a".to_string(), partition("a", &[(0, 1, Some("u1"))]))
            .unwrap();
        let b = runtime
            .try_submit("b".to_string(), partition("b", &[(1, 1, None)]))
            .unwrap();

        // Joining out of submission order still yields each job's own result.
        let b = b.join().unwrap();
        let a = a.join().unwrap();
        assert_eq!(b.entries[0].stitched_id, "b");
        assert_eq!(a.entries[0].stitched_id, "u1");
    }

    #[test]
    fn zero_workers_clamp_to_one() {
        let runtime = StitchRuntime::start(0, 0);
        let handle = runtime
            .try_submit("p1".to_string(), partition("p1", &[(0, 1, None)]))
            .unwrap();
        let stitch = handle.join().unwrap();
        assert_eq!(stitch.windowed.len(), 1);
        assert_eq!(stitch.entries.len(), 1);
    }
}
