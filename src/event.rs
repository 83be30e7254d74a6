//! Event records flowing through the stitching pipeline.
//!
//! A batch moves through four record shapes, each a pure enrichment of the
//! previous one: [`RawEvent`] (caller input) → [`SequencedEvent`] (accepted
//! at intake, stable position assigned) → [`ResolvedEvent`] (IP-derived
//! identity attached) → [`WindowedEvent`] (identity window assigned) →
//! [`StitchedEvent`] (durable person id attached, returned to the caller).
//!
//! ## Event ordering
//!
//! Wherever chronology matters (last-known-IP selection, window boundary
//! placement) events are compared by the total order `(hit_time, seq)`,
//! ascending. `seq` is the zero-based position of the event in the input
//! batch, assigned at intake. Two events can share a `hit_time`; they can
//! never share a `seq`, so the order is total and stable for any immutable
//! input snapshot, independent of incidental map iteration order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ValidationError;

/// A single observed hit, as produced by the ingestion collaborator.
///
/// `visitor_id` is a device- or browser-scoped identifier (a cookie), not
/// guaranteed unique per person. `user_id` is present only on events
/// carrying explicit login evidence. All fields the stitcher does not
/// interpret ride along in `extra` and are emitted unchanged.
///
/// # Examples
///
/// ```
/// use chrono::Utc;
/// use stitchline::RawEvent;
///
/// let event = RawEvent::new("cookie-1", "203.0.113.7", Utc::now());
/// assert!(event.user_id.is_none());
///
/// let login = RawEvent::new("cookie-1", "203.0.113.7", Utc::now())
///     .with_user_id("alice@example.com");
/// assert!(login.user_id.is_some());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEvent {
    /// Cookie identifier for the device/browser that produced the event.
    pub visitor_id: String,

    /// Network address the event was observed from.
    pub ip: String,

    /// Login identifier, present only on events with explicit login evidence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    /// Timestamp of the hit.
    pub hit_time: DateTime<Utc>,

    /// Passthrough fields ignored by stitching and emitted unchanged.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RawEvent {
    /// Creates an anonymous event with no passthrough fields.
    #[must_use]
    pub fn new(visitor_id: impl Into<String>, ip: impl Into<String>, hit_time: DateTime<Utc>) -> Self {
        Self {
            visitor_id: visitor_id.into(),
            ip: ip.into(),
            user_id: None,
            hit_time,
            extra: Map::new(),
        }
    }

    /// Attaches login evidence to the event.
    #[must_use]
    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Attaches a passthrough field to the event.
    #[must_use]
    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// Checks the required fields at intake.
    ///
    /// `hit_time` is structurally present; `visitor_id` and `ip` count as
    /// missing when empty after trimming. `seq` is the event's intake
    /// position, carried into the error for audit.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::MissingField` naming the first missing field.
    pub fn validate(&self, seq: u64) -> Result<(), ValidationError> {
        if self.visitor_id.trim().is_empty() {
            return Err(ValidationError::MissingField { field: "visitor_id", seq });
        }
        if self.ip.trim().is_empty() {
            return Err(ValidationError::MissingField { field: "ip", seq });
        }
        Ok(())
    }
}

/// An accepted event together with its stable intake position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequencedEvent {
    /// Zero-based position of the event in the input batch.
    pub seq: u64,

    /// The accepted event.
    pub event: RawEvent,
}

impl SequencedEvent {
    /// Sort key implementing the documented `(hit_time, seq)` total order.
    #[must_use]
    pub fn order_key(&self) -> (DateTime<Utc>, u64) {
        (self.event.hit_time, self.seq)
    }
}

/// An event with its IP-derived identity attached.
///
/// `ip_stitched_id` is either the visitor's own id (unchanged) or a shared
/// IP-derived id; it is the partition key for windowing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedEvent {
    /// Zero-based position of the event in the input batch.
    pub seq: u64,

    /// IP-resolved identity the event belongs to.
    pub ip_stitched_id: String,

    /// The underlying event.
    pub event: RawEvent,
}

impl ResolvedEvent {
    /// Sort key implementing the documented `(hit_time, seq)` total order.
    #[must_use]
    pub fn order_key(&self) -> (DateTime<Utc>, u64) {
        (self.event.hit_time, self.seq)
    }
}

/// An event with its ordinal identity window assigned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowedEvent {
    /// Zero-based position of the event in the input batch.
    pub seq: u64,

    /// IP-resolved identity the event belongs to.
    pub ip_stitched_id: String,

    /// Ordinal identity window within the partition, starting at 1 and
    /// monotonically non-decreasing along the partition's time order.
    pub id_group: u32,

    /// The underlying event.
    pub event: RawEvent,
}

impl WindowedEvent {
    /// Join key for the identity lookup table.
    #[must_use]
    pub fn group_key(&self) -> GroupKey {
        GroupKey {
            ip_stitched_id: self.ip_stitched_id.clone(),
            id_group: self.id_group,
        }
    }
}

/// Join key identifying one identity window: `(ip_stitched_id, id_group)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupKey {
    /// IP-resolved identity.
    pub ip_stitched_id: String,

    /// Ordinal identity window within that identity.
    pub id_group: u32,
}

/// The terminal, externally consumed artifact: every input field plus the
/// three stitching outputs.
///
/// Downstream consumers treat `stitched_id` as the canonical per-person
/// key, replacing `visitor_id` for all cross-device analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StitchedEvent {
    /// Cookie identifier from the input event.
    pub visitor_id: String,

    /// Network address from the input event.
    pub ip: String,

    /// Login identifier from the input event, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    /// Timestamp from the input event.
    pub hit_time: DateTime<Utc>,

    /// IP-resolved identity the event was partitioned under.
    pub ip_stitched_id: String,

    /// Ordinal identity window the event fell into.
    pub id_group: u32,

    /// Durable per-person identifier.
    pub stitched_id: String,

    /// Passthrough fields from the input event, unchanged.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl StitchedEvent {
    /// Builds the terminal record from a windowed event and its resolved
    /// person identifier.
    #[must_use]
    pub fn from_windowed(windowed: WindowedEvent, stitched_id: String) -> Self {
        let WindowedEvent { ip_stitched_id, id_group, event, .. } = windowed;
        Self {
            visitor_id: event.visitor_id,
            ip: event.ip,
            user_id: event.user_id,
            hit_time: event.hit_time,
            ip_stitched_id,
            id_group,
            stitched_id,
            extra: event.extra,
        }
    }
}
