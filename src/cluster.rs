//! IP hub eligibility: which network addresses may merge cookies.
//!
//! An IP seen on exactly one cookie carries no stitching signal; an IP seen
//! on very many cookies is almost certainly shared infrastructure (an
//! office, carrier NAT) and merging on it would collapse unrelated people.
//! Eligibility is therefore a closed interval over the distinct-cookie
//! count, configured per run.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::event::SequencedEvent;

/// Distinct-visitor counts per IP plus the eligibility bounds they were
/// built under.
///
/// Derived once per batch by [`IpEligibility::build`]; exposed to callers
/// as an audit artifact. A pure value: building it has no side effects and
/// two builds over the same snapshot are identical.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpEligibility {
    counts: BTreeMap<String, usize>,
    min_cluster_size: usize,
    max_cluster_size: usize,
}

impl IpEligibility {
    /// Counts distinct `visitor_id`s per IP over the accepted event set.
    ///
    /// The distinct-count aggregation is associative and commutative, so a
    /// caller splitting the snapshot could compute partial sets and union
    /// them; this builder runs the single-machine reduction.
    #[must_use]
    pub fn build(events: &[SequencedEvent], min_cluster_size: usize, max_cluster_size: usize) -> Self {
        let mut visitors_per_ip: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
        for event in events {
            visitors_per_ip
                .entry(event.event.ip.as_str())
                .or_default()
                .insert(event.event.visitor_id.as_str());
        }

        let counts = visitors_per_ip
            .into_iter()
            .map(|(ip, visitors)| (ip.to_string(), visitors.len()))
            .collect();

        Self { counts, min_cluster_size, max_cluster_size }
    }

    /// Number of distinct cookies ever seen on `ip` (0 if never seen).
    #[must_use]
    pub fn distinct_visitors(&self, ip: &str) -> usize {
        self.counts.get(ip).copied().unwrap_or(0)
    }

    /// True if `ip` is an eligible stitching hub.
    #[must_use]
    pub fn is_eligible(&self, ip: &str) -> bool {
        let count = self.distinct_visitors(ip);
        count >= self.min_cluster_size && count <= self.max_cluster_size
    }

    /// Iterates all eligible IPs in lexicographic order.
    pub fn eligible_ips(&self) -> impl Iterator<Item = &str> {
        self.counts
            .iter()
            .filter(|(_, count)| **count >= self.min_cluster_size && **count <= self.max_cluster_size)
            .map(|(ip, _)| ip.as_str())
    }

    /// Number of distinct IPs observed in the batch.
    #[must_use]
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// True when the batch contained no events.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}
