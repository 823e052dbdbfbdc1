//! # Dynamic Batcher (dispatcher)
//!
//! Client side of the batching protocol. [`DynamicBatcher::asend`] appends one
//! Request Entry to the request stream, then polls in two phases:
//!
//! 1. **Acceptance**: until a batch engine has claimed the entry (a pending
//!    claim exists for its position id) or its result is already stored.
//! 2. **Completion**: until the Result Entry appears, which is then read and
//!    deleted.
//!
//! Each phase polls at a fixed `delay` (never less than
//! [`MIN_POLL_DELAY`]) and gives up after `timeout`. A caller that gives up
//! sends no cancellation: the engine may still process the entry, and its
//! Result Entry then expires unread.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, error, warn};

use crate::config::{BrokerConfig, DispatcherConfig};
use crate::correlation::CorrelationStore;
use crate::error::{BatcherError, Result, WaitPhase};
use crate::stream::{PositionId, ResponseEntry, StreamClient, StreamProvider, BODY_FIELD};

/// Lower bound on the poll interval
pub const MIN_POLL_DELAY: Duration = Duration::from_millis(1);

/// Submits items for batching and waits for their results
#[derive(Debug, Clone)]
pub struct DynamicBatcher {
    provider: Arc<StreamProvider>,
    store: CorrelationStore,
    request_stream: String,
    processor_group: String,
    config: DispatcherConfig,
}

impl DynamicBatcher {
    /// Create a dispatcher over an existing broker handle
    ///
    /// Validates `config` and makes sure both streams and consumer groups
    /// exist before the first request.
    pub async fn new(
        provider: Arc<StreamProvider>,
        broker: &BrokerConfig,
        config: DispatcherConfig,
    ) -> Result<Self> {
        broker.validate()?;
        config.validate()?;
        provider.ensure_streams(broker).await?;

        Ok(Self {
            store: CorrelationStore::new(Arc::clone(&provider)),
            provider,
            request_stream: broker.stream_key_request.clone(),
            processor_group: broker.stream_group_processor.clone(),
            config,
        })
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Submit `payload` and wait for its result
    ///
    /// Returns `None` on any failure: the payload does not serialize, the
    /// broker is unavailable, the result does not deserialize into `R`, or a
    /// deadline passes. The cause is logged; use [`Self::try_send`] to
    /// inspect it.
    pub async fn asend<T, R>(&self, payload: &T) -> Option<R>
    where
        T: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        match self.try_send(payload).await {
            Ok(result) => Some(result),
            Err(err @ BatcherError::DeadlineExceeded { .. }) => {
                warn!(stream = %self.request_stream, error = %err, "No result before deadline");
                None
            }
            Err(err) => {
                error!(stream = %self.request_stream, error = %err, "Request failed");
                None
            }
        }
    }

    /// Submit `payload` and wait for its result, reporting why it failed
    pub async fn try_send<T, R>(&self, payload: &T) -> Result<R>
    where
        T: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let body = serde_json::to_string(payload).map_err(BatcherError::serialization)?;
        let id = self
            .provider
            .append(&self.request_stream, &[(BODY_FIELD, body.as_str())])
            .await?;
        debug!(id = %id, stream = %self.request_stream, "Request appended");

        self.wait_for_start(&id).await?;
        let response = self.wait_for_finish(&id).await?;

        serde_json::from_value(response.body)
            .map_err(|e| BatcherError::deserialization(id.as_str(), e))
    }

    /// Wait until a batch engine has claimed `id`
    pub async fn wait_for_start(&self, id: &PositionId) -> Result<()> {
        self.poll_until(WaitPhase::Acceptance, move || self.accepted(id))
            .await?;
        debug!(id = %id, "Request accepted");
        Ok(())
    }

    async fn accepted(&self, id: &PositionId) -> Result<Option<()>> {
        let pending = self
            .provider
            .pending_range(
                &self.request_stream,
                &self.processor_group,
                id.as_str(),
                id.as_str(),
                1,
            )
            .await?;
        if !pending.is_empty() {
            return Ok(Some(()));
        }
        // Acknowledged and deleted before the first poll
        Ok(self.store.is_ready(id).await?.then_some(()))
    }

    /// Wait for the result of `id`, consuming it
    pub async fn wait_for_finish(&self, id: &PositionId) -> Result<ResponseEntry> {
        let response = self
            .poll_until(WaitPhase::Completion, move || self.store.take(id))
            .await?;
        debug!(id = %id, "Response received");
        Ok(response)
    }

    async fn poll_until<T, F, Fut>(&self, phase: WaitPhase, mut check: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Option<T>>>,
    {
        let timeout = self.config.timeout;
        let delay = self.config.delay.max(MIN_POLL_DELAY);
        let deadline = Instant::now().checked_add(timeout);

        loop {
            if let Some(found) = check().await? {
                return Ok(found);
            }
            let now = Instant::now();
            if deadline.is_some_and(|d| now >= d) {
                return Err(BatcherError::deadline_exceeded(phase, timeout));
            }
            let nap = match deadline {
                Some(d) => delay.min(d.saturating_duration_since(now)),
                None => delay,
            };
            tokio::time::sleep(nap).await;
        }
    }
}
