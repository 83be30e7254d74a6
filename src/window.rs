//! Identity windowing: partition each identity's timeline at login events.
//!
//! Within one `ip_stitched_id` partition, events sorted by the documented
//! `(hit_time, seq)` order are folded with a single integer accumulator: a
//! login event increments the counter before its own window is assigned,
//! and every event gets `id_group = max(counter, 1)`. The effect is that
//! all anonymous events preceding the first login share window 1 with that
//! login, anonymous events after a login stay in that login's window until
//! the next login opens a new one, and a partition with no logins at all is
//! a single window 1.
//!
//! The scan needs the whole ordered partition; it is not expressible as a
//! stateless per-event rule. Partitions are independent of each other,
//! which is what the parallel runtime exploits.

use std::collections::BTreeMap;

use crate::event::{ResolvedEvent, WindowedEvent};

/// Groups resolved events by their partition identity.
///
/// Returns partitions in sorted key order so every downstream walk over
/// them is deterministic. Event order within a partition is settled by
/// [`assign_windows`], not here.
#[must_use]
pub fn partition_by_identity(events: Vec<ResolvedEvent>) -> BTreeMap<String, Vec<ResolvedEvent>> {
    let mut partitions: BTreeMap<String, Vec<ResolvedEvent>> = BTreeMap::new();
    for event in events {
        partitions.entry(event.ip_stitched_id.clone()).or_default().push(event);
    }
    partitions
}

/// Assigns ordinal identity windows to one partition's events.
///
/// Sorts the partition by `(hit_time, seq)` and runs the cumulative-counter
/// fold. Output stays in that time order; `id_group` starts at 1 and is
/// monotonically non-decreasing.
#[must_use]
pub fn assign_windows(mut partition: Vec<ResolvedEvent>) -> Vec<WindowedEvent> {
    partition.sort_by_key(ResolvedEvent::order_key);

    let mut counter: u32 = 0;
    partition
        .into_iter()
        .map(|resolved| {
            if resolved.event.user_id.is_some() {
                counter += 1;
            }
            WindowedEvent {
                seq: resolved.seq,
                id_group: counter.max(1),
                ip_stitched_id: resolved.ip_stitched_id,
                event: resolved.event,
            }
        })
        .collect()
}
