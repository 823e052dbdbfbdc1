//! # Stream Client Trait
//!
//! The broker primitives the batching protocol is built on. Each call is
//! assumed to be atomic at the broker.

use std::time::Duration;

use async_trait::async_trait;

use super::types::{PendingEntry, PositionId, StreamEntry};
use crate::error::StreamResult;

/// Ordered, persistent, multi-consumer log plus expiring key/value cells
///
/// Implemented by [`super::RedisStreamClient`] against Redis streams and by
/// [`super::InMemoryStreamClient`] for tests and local development.
#[async_trait]
pub trait StreamClient: Send + Sync + 'static {
    /// Create the consumer group, creating the stream when missing
    ///
    /// Idempotent: an existing group is not an error.
    async fn ensure_group(&self, stream: &str, group: &str) -> StreamResult<()>;

    /// Append an entry and return its broker-assigned position id
    async fn append(&self, stream: &str, fields: &[(&str, &str)]) -> StreamResult<PositionId>;

    /// Read entries between two ids, inclusive (`-` and `+` are open bounds)
    async fn range(&self, stream: &str, min: &str, max: &str) -> StreamResult<Vec<StreamEntry>>;

    /// Claim up to `count` entries never delivered to this group before
    ///
    /// Claimed entries become pending for `consumer` unless `no_ack` is set.
    async fn claim(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        count: usize,
        no_ack: bool,
    ) -> StreamResult<Vec<StreamEntry>>;

    /// Pending entries with ids between `min` and `max`, inclusive
    async fn pending_range(
        &self,
        stream: &str,
        group: &str,
        min: &str,
        max: &str,
        count: usize,
    ) -> StreamResult<Vec<PendingEntry>>;

    /// Pending entries that have not been delivered for at least `min_idle`
    async fn pending_idle(
        &self,
        stream: &str,
        group: &str,
        min_idle: Duration,
        count: usize,
    ) -> StreamResult<Vec<PendingEntry>>;

    /// Pending entries currently owned by `consumer`
    async fn pending_for_consumer(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        count: usize,
    ) -> StreamResult<Vec<PendingEntry>>;

    /// Transfer idle pending entries to `consumer` and return their contents
    ///
    /// Entries deleted from the stream in the meantime are dropped from the
    /// result.
    async fn reclaim(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        min_idle: Duration,
        ids: &[PositionId],
    ) -> StreamResult<Vec<StreamEntry>>;

    /// Acknowledge entries, removing them from the pending list
    async fn ack(&self, stream: &str, group: &str, ids: &[PositionId]) -> StreamResult<u64>;

    /// Delete entries from the stream
    async fn delete_entries(&self, stream: &str, ids: &[PositionId]) -> StreamResult<u64>;

    /// Trim the stream to at most `max_len` entries, oldest first
    async fn trim(&self, stream: &str, max_len: usize) -> StreamResult<u64>;

    /// Store a value that expires after `ttl` (whole seconds, at least one)
    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> StreamResult<()>;

    async fn get(&self, key: &str) -> StreamResult<Option<String>>;

    /// Delete a key, returning whether it existed
    async fn delete(&self, key: &str) -> StreamResult<bool>;

    /// Check broker connectivity
    async fn ping(&self) -> StreamResult<bool>;

    /// Provider name for logging
    fn provider_name(&self) -> &'static str;
}
