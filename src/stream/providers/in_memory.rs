//! # In-Memory Stream Client
//!
//! Thread-safe in-memory implementation of the stream primitives for testing
//! and development.
//!
//! ## Features
//!
//! - **Consumer groups**: per-group delivery cursor and pending-entries list
//! - **Expiring cells**: key/value storage with TTL, checked on read and swept
//!   on every write
//! - **Outage simulation**: [`InMemoryStreamClient::set_available`] makes every
//!   call fail with a connection error
//!
//! Time is read from `tokio::time::Instant`, so tests running with a paused
//! clock see idle times and TTLs advance with the virtual clock.

use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::Instant;

use crate::error::{StreamError, StreamResult};
use crate::stream::traits::StreamClient;
use crate::stream::types::{PendingEntry, PositionId, StreamEntry};

#[derive(Debug, Clone)]
struct PendingRecord {
    consumer: String,
    delivered_at: Instant,
    times_delivered: u64,
}

#[derive(Debug, Default)]
struct ConsumerGroup {
    last_delivered: Option<PositionId>,
    pending: BTreeMap<PositionId, PendingRecord>,
}

#[derive(Debug, Default)]
struct InMemoryStream {
    entries: BTreeMap<PositionId, HashMap<String, String>>,
    last_id: (u64, u64),
    groups: HashMap<String, ConsumerGroup>,
}

impl InMemoryStream {
    fn next_id(&mut self) -> PositionId {
        let now_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();
        let (last_ms, last_seq) = self.last_id;
        self.last_id = if now_ms > last_ms {
            (now_ms, 0)
        } else {
            (last_ms, last_seq + 1)
        };
        PositionId::from_parts(self.last_id.0, self.last_id.1)
    }

    fn group_mut(&mut self, stream: &str, group: &str) -> StreamResult<&mut ConsumerGroup> {
        self.groups
            .get_mut(group)
            .ok_or_else(|| StreamError::group_not_found(stream, group))
    }
}

#[derive(Debug)]
struct Cell {
    value: String,
    expires_at: Instant,
}

#[derive(Debug)]
struct InMemoryState {
    streams: HashMap<String, InMemoryStream>,
    cells: HashMap<String, Cell>,
    available: bool,
}

impl Default for InMemoryState {
    fn default() -> Self {
        Self {
            streams: HashMap::new(),
            cells: HashMap::new(),
            available: true,
        }
    }
}

/// In-memory stream client
///
/// Cloning shares the underlying state, so a test can keep a handle for
/// inspection while the dispatcher and the batch engine use another.
///
/// # Example
///
/// ```rust
/// use dynamic_batcher::stream::{InMemoryStreamClient, StreamClient};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = InMemoryStreamClient::new();
/// client.ensure_group("request", "processor").await?;
///
/// let id = client.append("request", &[("body", "{\"v\":1}")]).await?;
/// let claimed = client.claim("request", "processor", "worker-1", 1, false).await?;
/// assert_eq!(claimed[0].id, id);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemoryStreamClient {
    state: Arc<Mutex<InMemoryState>>,
}

fn lower_bound(id: &str) -> Bound<PositionId> {
    match id {
        "-" => Bound::Unbounded,
        other => Bound::Included(PositionId::new(other)),
    }
}

fn upper_bound(id: &str) -> Bound<PositionId> {
    match id {
        "+" => Bound::Unbounded,
        other => Bound::Included(PositionId::new(other)),
    }
}

fn to_pending(id: &PositionId, record: &PendingRecord, now: Instant) -> PendingEntry {
    PendingEntry {
        message_id: id.clone(),
        consumer: record.consumer.clone(),
        time_since_delivered: now.saturating_duration_since(record.delivered_at),
        times_delivered: record.times_delivered,
    }
}

impl InMemoryStreamClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate a broker outage (`false`) or recovery (`true`)
    pub fn set_available(&self, available: bool) {
        self.state.lock().available = available;
    }

    /// Number of entries currently in a stream
    pub fn stream_len(&self, stream: &str) -> usize {
        self.state
            .lock()
            .streams
            .get(stream)
            .map(|s| s.entries.len())
            .unwrap_or(0)
    }

    /// Number of pending entries for a group
    pub fn pending_count(&self, stream: &str, group: &str) -> usize {
        self.state
            .lock()
            .streams
            .get(stream)
            .and_then(|s| s.groups.get(group))
            .map(|g| g.pending.len())
            .unwrap_or(0)
    }

    /// Whether a consumer group exists on a stream
    pub fn has_group(&self, stream: &str, group: &str) -> bool {
        self.state
            .lock()
            .streams
            .get(stream)
            .map(|s| s.groups.contains_key(group))
            .unwrap_or(false)
    }

    /// Keys of unexpired cells
    pub fn live_keys(&self) -> Vec<String> {
        let now = Instant::now();
        let mut keys: Vec<String> = self
            .state
            .lock()
            .cells
            .iter()
            .filter(|(_, cell)| cell.expires_at > now)
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        keys
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut InMemoryState) -> StreamResult<T>) -> StreamResult<T> {
        let mut state = self.state.lock();
        if !state.available {
            return Err(StreamError::connection("in-memory broker marked unavailable"));
        }
        f(&mut *state)
    }

    fn with_stream<T>(
        &self,
        stream: &str,
        f: impl FnOnce(&mut InMemoryStream) -> StreamResult<T>,
    ) -> StreamResult<T> {
        self.with_state(|state| {
            let entry = state
                .streams
                .get_mut(stream)
                .ok_or_else(|| StreamError::command("XREAD", stream, "no such key"))?;
            f(entry)
        })
    }

    /// Like `with_stream`, reporting a missing stream as a missing group
    fn with_group_stream<T>(
        &self,
        stream: &str,
        group: &str,
        f: impl FnOnce(&mut InMemoryStream) -> StreamResult<T>,
    ) -> StreamResult<T> {
        self.with_state(|state| {
            let entry = state
                .streams
                .get_mut(stream)
                .ok_or_else(|| StreamError::group_not_found(stream, group))?;
            f(entry)
        })
    }
}

#[async_trait]
impl StreamClient for InMemoryStreamClient {
    async fn ensure_group(&self, stream: &str, group: &str) -> StreamResult<()> {
        self.with_state(|state| {
            let entry = state.streams.entry(stream.to_string()).or_default();
            if !entry.groups.contains_key(group) {
                // New groups start at the end of the stream, as with `$`
                let last = entry.entries.keys().next_back().cloned();
                entry.groups.insert(
                    group.to_string(),
                    ConsumerGroup {
                        last_delivered: last,
                        pending: BTreeMap::new(),
                    },
                );
            }
            Ok(())
        })
    }

    async fn append(&self, stream: &str, fields: &[(&str, &str)]) -> StreamResult<PositionId> {
        self.with_state(|state| {
            let entry = state.streams.entry(stream.to_string()).or_default();
            let id = entry.next_id();
            let fields = fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect();
            entry.entries.insert(id.clone(), fields);
            Ok(id)
        })
    }

    async fn range(&self, stream: &str, min: &str, max: &str) -> StreamResult<Vec<StreamEntry>> {
        self.with_state(|state| {
            let Some(entry) = state.streams.get(stream) else {
                return Ok(Vec::new());
            };
            Ok(entry
                .entries
                .range((lower_bound(min), upper_bound(max)))
                .map(|(id, fields)| StreamEntry::new(id.clone(), fields.clone()))
                .collect())
        })
    }

    async fn claim(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        count: usize,
        no_ack: bool,
    ) -> StreamResult<Vec<StreamEntry>> {
        self.with_group_stream(stream, group, |entry| {
            let now = Instant::now();
            let cursor = entry
                .groups
                .get(group)
                .ok_or_else(|| StreamError::group_not_found(stream, group))?
                .last_delivered
                .clone();

            let start = match cursor {
                Some(id) => Bound::Excluded(id),
                None => Bound::Unbounded,
            };
            let claimed: Vec<StreamEntry> = entry
                .entries
                .range((start, Bound::Unbounded))
                .take(count)
                .map(|(id, fields)| StreamEntry::new(id.clone(), fields.clone()))
                .collect();

            let group_state = entry.group_mut(stream, group)?;
            if let Some(last) = claimed.last() {
                group_state.last_delivered = Some(last.id.clone());
            }
            if !no_ack {
                for claimed_entry in &claimed {
                    group_state.pending.insert(
                        claimed_entry.id.clone(),
                        PendingRecord {
                            consumer: consumer.to_string(),
                            delivered_at: now,
                            times_delivered: 1,
                        },
                    );
                }
            }
            Ok(claimed)
        })
    }

    async fn pending_range(
        &self,
        stream: &str,
        group: &str,
        min: &str,
        max: &str,
        count: usize,
    ) -> StreamResult<Vec<PendingEntry>> {
        self.with_group_stream(stream, group, |entry| {
            let now = Instant::now();
            let group_state = entry.group_mut(stream, group)?;
            Ok(group_state
                .pending
                .range((lower_bound(min), upper_bound(max)))
                .take(count)
                .map(|(id, record)| to_pending(id, record, now))
                .collect())
        })
    }

    async fn pending_idle(
        &self,
        stream: &str,
        group: &str,
        min_idle: Duration,
        count: usize,
    ) -> StreamResult<Vec<PendingEntry>> {
        self.with_group_stream(stream, group, |entry| {
            let now = Instant::now();
            let group_state = entry.group_mut(stream, group)?;
            Ok(group_state
                .pending
                .iter()
                .filter(|(_, record)| {
                    now.saturating_duration_since(record.delivered_at) >= min_idle
                })
                .take(count)
                .map(|(id, record)| to_pending(id, record, now))
                .collect())
        })
    }

    async fn pending_for_consumer(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        count: usize,
    ) -> StreamResult<Vec<PendingEntry>> {
        self.with_group_stream(stream, group, |entry| {
            let now = Instant::now();
            let group_state = entry.group_mut(stream, group)?;
            Ok(group_state
                .pending
                .iter()
                .filter(|(_, record)| record.consumer == consumer)
                .take(count)
                .map(|(id, record)| to_pending(id, record, now))
                .collect())
        })
    }

    async fn reclaim(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        min_idle: Duration,
        ids: &[PositionId],
    ) -> StreamResult<Vec<StreamEntry>> {
        self.with_group_stream(stream, group, |entry| {
            let now = Instant::now();
            let InMemoryStream {
                entries, groups, ..
            } = entry;
            let group_state = groups
                .get_mut(group)
                .ok_or_else(|| StreamError::group_not_found(stream, group))?;

            let mut reclaimed = Vec::new();
            for id in ids {
                let Some(record) = group_state.pending.get_mut(id) else {
                    continue;
                };
                if now.saturating_duration_since(record.delivered_at) < min_idle {
                    continue;
                }
                match entries.get(id) {
                    Some(fields) => {
                        record.consumer = consumer.to_string();
                        record.delivered_at = now;
                        record.times_delivered += 1;
                        reclaimed.push(StreamEntry::new(id.clone(), fields.clone()));
                    }
                    None => {
                        group_state.pending.remove(id);
                    }
                }
            }
            Ok(reclaimed)
        })
    }

    async fn ack(&self, stream: &str, group: &str, ids: &[PositionId]) -> StreamResult<u64> {
        self.with_stream(stream, |entry| {
            let group_state = entry.group_mut(stream, group)?;
            Ok(ids
                .iter()
                .filter(|id| group_state.pending.remove(*id).is_some())
                .count() as u64)
        })
    }

    async fn delete_entries(&self, stream: &str, ids: &[PositionId]) -> StreamResult<u64> {
        self.with_stream(stream, |entry| {
            Ok(ids
                .iter()
                .filter(|id| entry.entries.remove(*id).is_some())
                .count() as u64)
        })
    }

    async fn trim(&self, stream: &str, max_len: usize) -> StreamResult<u64> {
        self.with_state(|state| {
            let Some(entry) = state.streams.get_mut(stream) else {
                return Ok(0);
            };
            let mut trimmed = 0;
            while entry.entries.len() > max_len {
                entry.entries.pop_first();
                trimmed += 1;
            }
            Ok(trimmed)
        })
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> StreamResult<()> {
        let ttl = Duration::from_secs(ttl.as_secs().max(1));
        self.with_state(|state| {
            let now = Instant::now();
            state.cells.retain(|_, cell| cell.expires_at > now);
            state.cells.insert(
                key.to_string(),
                Cell {
                    value: value.to_string(),
                    expires_at: now + ttl,
                },
            );
            Ok(())
        })
    }

    async fn get(&self, key: &str) -> StreamResult<Option<String>> {
        self.with_state(|state| {
            let now = Instant::now();
            match state.cells.get(key) {
                Some(cell) if cell.expires_at > now => Ok(Some(cell.value.clone())),
                Some(_) => {
                    state.cells.remove(key);
                    Ok(None)
                }
                None => Ok(None),
            }
        })
    }

    async fn delete(&self, key: &str) -> StreamResult<bool> {
        self.with_state(|state| {
            let now = Instant::now();
            // Streams share the key space with cells, as in Redis
            let stream_removed = state.streams.remove(key).is_some();
            let cell_removed = state
                .cells
                .remove(key)
                .map(|cell| cell.expires_at > now)
                .unwrap_or(false);
            Ok(stream_removed || cell_removed)
        })
    }

    async fn ping(&self) -> StreamResult<bool> {
        self.with_state(|_| Ok(true))
    }

    fn provider_name(&self) -> &'static str {
        "in_memory"
    }
}
