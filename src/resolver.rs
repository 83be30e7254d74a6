//! Per-cookie IP resolution: assign each visitor its partition identity.
//!
//! A visitor whose chronologically last event sits on an eligible hub IP
//! adopts that IP as its shared identity; every other visitor keeps its own
//! id. A visitor that moved between eligible and non-eligible IPs over time
//! is always resolved by its most recent IP only. The mapping is then
//! broadcast onto every event of the visitor.
//!
//! Resolution is a monotone compression: it never increases the distinct
//! identity count, because each visitor maps to exactly one identity and
//! identities are only ever shared, never split.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::cluster::IpEligibility;
use crate::event::{ResolvedEvent, SequencedEvent};

/// The resolved partition identity for one cookie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisitorResolution {
    /// The cookie being resolved.
    pub visitor_id: String,

    /// IP of the visitor's last event under the `(hit_time, seq)` order.
    pub last_known_ip: String,

    /// `last_known_ip` when that IP is an eligible hub, else `visitor_id`.
    pub ip_stitched_id: String,
}

impl VisitorResolution {
    /// True when this cookie was merged into a shared IP-derived identity.
    #[must_use]
    pub fn is_merged(&self) -> bool {
        self.ip_stitched_id != self.visitor_id
    }
}

/// Computes one [`VisitorResolution`] per distinct cookie in the batch.
///
/// The winner among a visitor's events is the maximum under the documented
/// `(hit_time, seq)` total order, so identical timestamps resolve by intake
/// position and the result is independent of input map ordering. Output is
/// sorted by `visitor_id`.
#[must_use]
pub fn resolve_visitors(events: &[SequencedEvent], eligibility: &IpEligibility) -> Vec<VisitorResolution> {
    let mut last_event: BTreeMap<&str, &SequencedEvent> = BTreeMap::new();
    for event in events {
        last_event
            .entry(event.event.visitor_id.as_str())
            .and_modify(|current| {
                if event.order_key() > current.order_key() {
                    *current = event;
                }
            })
            .or_insert(event);
    }

    last_event
        .into_iter()
        .map(|(visitor_id, event)| {
            let last_known_ip = event.event.ip.clone();
            let ip_stitched_id = if eligibility.is_eligible(&last_known_ip) {
                last_known_ip.clone()
            } else {
                visitor_id.to_string()
            };
            VisitorResolution {
                visitor_id: visitor_id.to_string(),
                last_known_ip,
                ip_stitched_id,
            }
        })
        .collect()
}

/// Broadcasts the resolved identities onto every event of the batch.
///
/// A visitor absent from `resolutions` keeps its own id, which is exactly
/// the unmerged resolution; over a batch resolved from the same snapshot
/// this branch never fires.
#[must_use]
pub fn attach_resolutions(events: Vec<SequencedEvent>, resolutions: &[VisitorResolution]) -> Vec<ResolvedEvent> {
    let by_visitor: HashMap<&str, &str> = resolutions
        .iter()
        .map(|r| (r.visitor_id.as_str(), r.ip_stitched_id.as_str()))
        .collect();

    events
        .into_iter()
        .map(|sequenced| {
            let ip_stitched_id = by_visitor
                .get(sequenced.event.visitor_id.as_str())
                .map_or_else(|| sequenced.event.visitor_id.clone(), |id| (*id).to_string());
            ResolvedEvent {
                seq: sequenced.seq,
                ip_stitched_id,
                event: sequenced.event,
            }
        })
        .collect()
}
