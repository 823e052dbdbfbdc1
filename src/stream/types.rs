//! # Stream Types
//!
//! Data carried across the stream client boundary. Pure data, no behavior
//! beyond ordering and accessors.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::time::Duration;

/// Field name under which a request payload is stored on a stream entry
pub const BODY_FIELD: &str = "body";

/// Broker-assigned position of an entry in a stream
///
/// Redis formats these as `<milliseconds>-<sequence>`. Ordering compares the
/// numeric parts, so `"10-0"` sorts after `"9-5"`; ids that do not parse fall
/// back to string order after every well-formed id. Equality and hashing
/// follow the same rule, so `"01-0"` and `"1-0"` are the same id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionId(String);

impl PositionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Build from the two numeric components
    pub fn from_parts(millis: u64, seq: u64) -> Self {
        Self(format!("{millis}-{seq}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `(milliseconds, sequence)` when the id is well formed
    pub fn parts(&self) -> Option<(u64, u64)> {
        let (millis, seq) = self.0.split_once('-')?;
        Some((millis.parse().ok()?, seq.parse().ok()?))
    }
}

impl Ord for PositionId {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.parts(), other.parts()) {
            (Some(a), Some(b)) => a.cmp(&b),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => self.0.cmp(&other.0),
        }
    }
}

impl PartialEq for PositionId {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for PositionId {}

impl Hash for PositionId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self.parts() {
            Some(parts) => parts.hash(state),
            None => self.0.hash(state),
        }
    }
}

impl PartialOrd for PositionId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for PositionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for PositionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for PositionId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// One entry read from a stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamEntry {
    pub id: PositionId,
    pub fields: HashMap<String, String>,
}

impl StreamEntry {
    pub fn new(id: PositionId, fields: HashMap<String, String>) -> Self {
        Self { id, fields }
    }

    /// Serialized request payload
    pub fn body(&self) -> Option<&str> {
        self.fields.get(BODY_FIELD).map(String::as_str)
    }
}

/// A claimed-but-unacknowledged entry as reported by the broker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingEntry {
    pub message_id: PositionId,
    /// Consumer currently holding the claim
    pub consumer: String,
    /// Time since the entry was last delivered
    pub time_since_delivered: Duration,
    pub times_delivered: u64,
}

/// A result read back from the correlation store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEntry {
    pub id: PositionId,
    pub body: serde_json::Value,
}

impl ResponseEntry {
    pub fn new(id: PositionId, body: serde_json::Value) -> Self {
        Self { id, body }
    }
}
