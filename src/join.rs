//! Final join: attach the resolved person id to every event.

use std::collections::HashMap;

use tracing::warn;

use crate::error::ExecutionError;
use crate::event::{GroupKey, StitchedEvent, WindowedEvent};
use crate::lookup::IdentityLookupEntry;

/// Joined events plus the audit count of lenient-mode fallbacks.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinOutcome {
    /// Stitched events, in original intake order.
    pub events: Vec<StitchedEvent>,

    /// Windowed events whose group key had no lookup entry and that fell
    /// back to their IP-resolved identity. Always 0 in strict mode.
    pub orphan_fallbacks: u64,
}

/// Joins windowed events against the lookup table on `(ip_stitched_id,
/// id_group)`.
///
/// The lookup builder is exhaustive over observed groups, so a missing
/// entry is an invariant violation: fatal in strict mode, a counted
/// fallback to `ip_stitched_id` in lenient mode. Events come back in
/// intake order regardless of how partitions were processed.
///
/// # Errors
///
/// Returns `ExecutionError::OrphanGroupKey` in strict mode for the first
/// windowed event without a lookup entry.
pub fn join_events(
    mut windowed: Vec<WindowedEvent>,
    lookup: &[IdentityLookupEntry],
    strict_mode: bool,
) -> Result<JoinOutcome, ExecutionError> {
    let by_group: HashMap<GroupKey, &str> = lookup
        .iter()
        .map(|entry| {
            let key = GroupKey {
                ip_stitched_id: entry.ip_stitched_id.clone(),
                id_group: entry.id_group,
            };
            (key, entry.stitched_id.as_str())
        })
        .collect();

    windowed.sort_by_key(|event| event.seq);

    let mut orphan_fallbacks = 0u64;
    let mut events = Vec::with_capacity(windowed.len());
    for event in windowed {
        let stitched_id = match by_group.get(&event.group_key()) {
            Some(stitched_id) => (*stitched_id).to_string(),
            None if strict_mode => {
                return Err(ExecutionError::OrphanGroupKey {
                    ip_stitched_id: event.ip_stitched_id,
                    id_group: event.id_group,
                })
            }
            None => {
                warn!(
                    ip_stitched_id = %event.ip_stitched_id,
                    id_group = event.id_group,
                    "orphan group key, falling back to IP-resolved identity"
                );
                orphan_fallbacks += 1;
                event.ip_stitched_id.clone()
            }
        };
        events.push(StitchedEvent::from_windowed(event, stitched_id));
    }

    Ok(JoinOutcome { events, orphan_fallbacks })
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, TimeZone, Utc};

    use crate::event::RawEvent;

    use super::*;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn windowed(seq: u64, id_group: u32) -> WindowedEvent {
        WindowedEvent {
            seq,
            ip_stitched_id: "p1".to_string(),
            id_group,
            event: RawEvent::new("v1", "10.0.0.1", at(seq as i64)),
        }
    }

    fn entry(id_group: u32, stitched_id: &str) -> IdentityLookupEntry {
        IdentityLookupEntry {
            ip_stitched_id: "p1".to_string(),
            id_group,
            stitched_id: stitched_id.to_string(),
        }
    }

    #[test]
    fn join_attaches_window_identity() {
        let outcome = join_events(
            vec![windowed(0, 1), windowed(1, 1), windowed(2, 2)],
            &[entry(1, "u1"), entry(2, "u2")],
            true,
        )
        .unwrap();

        let ids: Vec<&str> = outcome.events.iter().map(|e| e.stitched_id.as_str()).collect();
        assert_eq!(ids, vec!["u1", "u1", "u2"]);
        assert_eq!(outcome.orphan_fallbacks, 0);
    }

    #[test]
    fn join_restores_intake_order() {
        let outcome = join_events(
            vec![windowed(2, 2), windowed(0, 1), windowed(1, 1)],
            &[entry(1, "u1"), entry(2, "u2")],
            true,
        )
        .unwrap();

        let seqs: Vec<u64> = outcome
            .events
            .iter()
            .map(|e| e.hit_time.timestamp() as u64)
            .collect();
        assert_eq!(seqs, vec![0, 1, 2]);
    }

    #[test]
    fn orphan_group_is_fatal_in_strict_mode() {
        let err = join_events(vec![windowed(0, 2)], &[entry(1, "u1")], true).unwrap_err();
        assert!(matches!(err, ExecutionError::OrphanGroupKey { id_group: 2, .. }));
    }

    #[test]
    fn orphan_group_falls_back_in_lenient_mode() {
        let outcome = join_events(
            vec![windowed(0, 1), windowed(1, 2)],
            &[entry(1, "u1")],
            false,
        )
        .unwrap();

        assert_eq!(outcome.events[0].stitched_id, "u1");
        assert_eq!(outcome.events[1].stitched_id, "p1");
        assert_eq!(outcome.orphan_fallbacks, 1);
    }
}
