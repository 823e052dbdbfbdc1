//! # Stream Provider Enum
//!
//! Enum dispatch over the stream clients so the dispatcher and the processor
//! stay non-generic.

use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use super::providers::{InMemoryStreamClient, RedisStreamClient};
use super::traits::StreamClient;
use super::types::{PendingEntry, PositionId, StreamEntry};
use crate::config::BrokerConfig;
use crate::error::StreamResult;

/// Provider enum for the stream broker
///
/// # Example
///
/// ```
/// use dynamic_batcher::stream::{InMemoryStreamClient, StreamClient, StreamProvider};
///
/// let provider = StreamProvider::from(InMemoryStreamClient::new());
/// assert_eq!(provider.provider_name(), "in_memory");
/// ```
#[derive(Debug, Clone)]
pub enum StreamProvider {
    /// Redis streams
    Redis(RedisStreamClient),

    /// Process-local broker for tests and local runs
    InMemory(InMemoryStreamClient),
}

impl StreamProvider {
    /// Connect to the Redis server described by `config`
    pub async fn redis(config: &BrokerConfig) -> StreamResult<Self> {
        Ok(Self::Redis(RedisStreamClient::from_config(config).await?))
    }

    pub fn in_memory() -> Self {
        Self::InMemory(InMemoryStreamClient::new())
    }

    /// Create both consumer groups used by the batching protocol
    ///
    /// The processor group reads the request stream; the batcher group is
    /// created on the response stream. Safe to call from every process.
    pub async fn ensure_streams(&self, config: &BrokerConfig) -> StreamResult<()> {
        self.ensure_group(&config.stream_key_request, &config.stream_group_processor)
            .await?;
        self.ensure_group(&config.stream_key_response, &config.stream_group_batcher)
            .await?;
        info!(
            provider = self.provider_name(),
            request_stream = %config.stream_key_request,
            response_stream = %config.stream_key_response,
            "Streams ready"
        );
        Ok(())
    }
}

impl From<RedisStreamClient> for StreamProvider {
    fn from(client: RedisStreamClient) -> Self {
        Self::Redis(client)
    }
}

impl From<InMemoryStreamClient> for StreamProvider {
    fn from(client: InMemoryStreamClient) -> Self {
        Self::InMemory(client)
    }
}

#[async_trait]
impl StreamClient for StreamProvider {
    async fn ensure_group(&self, stream: &str, group: &str) -> StreamResult<()> {
        match self {
            Self::Redis(c) => c.ensure_group(stream, group).await,
            Self::InMemory(c) => c.ensure_group(stream, group).await,
        }
    }

    async fn append(&self, stream: &str, fields: &[(&str, &str)]) -> StreamResult<PositionId> {
        match self {
            Self::Redis(c) => c.append(stream, fields).await,
            Self::InMemory(c) => c.append(stream, fields).await,
        }
    }

    async fn range(&self, stream: &str, min: &str, max: &str) -> StreamResult<Vec<StreamEntry>> {
        match self {
            Self::Redis(c) => c.range(stream, min, max).await,
            Self::InMemory(c) => c.range(stream, min, max).await,
        }
    }

    async fn claim(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        count: usize,
        no_ack: bool,
    ) -> StreamResult<Vec<StreamEntry>> {
        match self {
            Self::Redis(c) => c.claim(stream, group, consumer, count, no_ack).await,
            Self::InMemory(c) => c.claim(stream, group, consumer, count, no_ack).await,
        }
    }

    async fn pending_range(
        &self,
        stream: &str,
        group: &str,
        min: &str,
        max: &str,
        count: usize,
    ) -> StreamResult<Vec<PendingEntry>> {
        match self {
            Self::Redis(c) => c.pending_range(stream, group, min, max, count).await,
            Self::InMemory(c) => c.pending_range(stream, group, min, max, count).await,
        }
    }

    async fn pending_idle(
        &self,
        stream: &str,
        group: &str,
        min_idle: Duration,
        count: usize,
    ) -> StreamResult<Vec<PendingEntry>> {
        match self {
            Self::Redis(c) => c.pending_idle(stream, group, min_idle, count).await,
            Self::InMemory(c) => c.pending_idle(stream, group, min_idle, count).await,
        }
    }

    async fn pending_for_consumer(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        count: usize,
    ) -> StreamResult<Vec<PendingEntry>> {
        match self {
            Self::Redis(c) => c.pending_for_consumer(stream, group, consumer, count).await,
            Self::InMemory(c) => c.pending_for_consumer(stream, group, consumer, count).await,
        }
    }

    async fn reclaim(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        min_idle: Duration,
        ids: &[PositionId],
    ) -> StreamResult<Vec<StreamEntry>> {
        match self {
            Self::Redis(c) => c.reclaim(stream, group, consumer, min_idle, ids).await,
            Self::InMemory(c) => c.reclaim(stream, group, consumer, min_idle, ids).await,
        }
    }

    async fn ack(&self, stream: &str, group: &str, ids: &[PositionId]) -> StreamResult<u64> {
        match self {
            Self::Redis(c) => c.ack(stream, group, ids).await,
            Self::InMemory(c) => c.ack(stream, group, ids).await,
        }
    }

    async fn delete_entries(&self, stream: &str, ids: &[PositionId]) -> StreamResult<u64> {
        match self {
            Self::Redis(c) => c.delete_entries(stream, ids).await,
            Self::InMemory(c) => c.delete_entries(stream, ids).await,
        }
    }

    async fn trim(&self, stream: &str, max_len: usize) -> StreamResult<u64> {
        match self {
            Self::Redis(c) => c.trim(stream, max_len).await,
            Self::InMemory(c) => c.trim(stream, max_len).await,
        }
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> StreamResult<()> {
        match self {
            Self::Redis(c) => c.set_with_ttl(key, value, ttl).await,
            Self::InMemory(c) => c.set_with_ttl(key, value, ttl).await,
        }
    }

    async fn get(&self, key: &str) -> StreamResult<Option<String>> {
        match self {
            Self::Redis(c) => c.get(key).await,
            Self::InMemory(c) => c.get(key).await,
        }
    }

    async fn delete(&self, key: &str) -> StreamResult<bool> {
        match self {
            Self::Redis(c) => c.delete(key).await,
            Self::InMemory(c) => c.delete(key).await,
        }
    }

    async fn ping(&self) -> StreamResult<bool> {
        match self {
            Self::Redis(c) => c.ping().await,
            Self::InMemory(c) => c.ping().await,
        }
    }

    fn provider_name(&self) -> &'static str {
        match self {
            Self::Redis(c) => c.provider_name(),
            Self::InMemory(c) => c.provider_name(),
        }
    }
}
