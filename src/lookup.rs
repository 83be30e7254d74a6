//! Identity lookup: one durable person id per identity window.
//!
//! Each `(ip_stitched_id, id_group)` window resolves to exactly one
//! `stitched_id`:
//!
//! - a window holding login evidence resolves to that login identifier;
//! - a login-free trailing window inherits the previous window's id, so a
//!   logged-in user who keeps browsing without re-authenticating is still
//!   that user;
//! - a partition that never saw a login keeps its IP-resolved identity as
//!   the stand-in person id.
//!
//! Any other login-free window cannot occur under the windowing rule and
//! is reported as an invariant violation instead of being papered over.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ExecutionError;
use crate::event::WindowedEvent;

/// One row of the identity lookup table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityLookupEntry {
    /// Partition identity the window belongs to.
    pub ip_stitched_id: String,

    /// Window ordinal within the partition.
    pub id_group: u32,

    /// Durable per-person identifier resolved for the window. Never absent.
    pub stitched_id: String,
}

/// Builds the lookup rows for one partition's windowed events.
///
/// `windowed` must be the full output of the windowing scan for
/// `ip_stitched_id`. Window ordinals are contiguous from 1 by construction,
/// so rows come back sorted by `id_group`, one per observed window.
///
/// # Errors
///
/// Returns `ExecutionError::AmbiguousWindowIdentity` when a window carries
/// two distinct logins and `ExecutionError::WindowWithoutIdentity` when a
/// login-free window is neither the sole window nor the trailing one. Both
/// are impossible under the windowing rule.
pub fn build_partition_lookup(
    ip_stitched_id: &str,
    windowed: &[WindowedEvent],
) -> Result<Vec<IdentityLookupEntry>, ExecutionError> {
    let mut logins_per_window: BTreeMap<u32, Vec<&str>> = BTreeMap::new();
    for event in windowed {
        let logins = logins_per_window.entry(event.id_group).or_default();
        if let Some(user_id) = event.event.user_id.as_deref() {
            if !logins.contains(&user_id) {
                logins.push(user_id);
            }
        }
    }

    let last_window = logins_per_window.keys().next_back().copied().unwrap_or(0);

    let mut entries = Vec::with_capacity(logins_per_window.len());
    let mut previous: Option<String> = None;
    for (id_group, logins) in &logins_per_window {
        let stitched_id = match logins.as_slice() {
            [user_id] => (*user_id).to_string(),
            [] => match (&previous, *id_group == last_window) {
                (Some(prev), true) => prev.clone(),
                (None, true) => ip_stitched_id.to_string(),
                _ => {
                    return Err(ExecutionError::WindowWithoutIdentity {
                        ip_stitched_id: ip_stitched_id.to_string(),
                        id_group: *id_group,
                    })
                }
            },
            many => {
                return Err(ExecutionError::AmbiguousWindowIdentity {
                    ip_stitched_id: ip_stitched_id.to_string(),
                    id_group: *id_group,
                    count: many.len(),
                })
            }
        };

        previous = Some(stitched_id.clone());
        entries.push(IdentityLookupEntry {
            ip_stitched_id: ip_stitched_id.to_string(),
            id_group: *id_group,
            stitched_id,
        });
    }

    Ok(entries)
}
