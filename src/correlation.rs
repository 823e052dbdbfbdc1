//! # Correlation Store
//!
//! Routes each result back to its caller. A Result Entry is an expiring
//! key/value cell keyed by the request's position id, written once by the
//! batch engine and read once by the dispatcher that submitted the request.
//! Cells that are never read expire through their TTL.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::debug;

use crate::error::{BatcherError, Result, StreamResult};
use crate::stream::{PositionId, ResponseEntry, StreamClient, StreamProvider};

/// Keyed, read-once response channel
#[derive(Debug, Clone)]
pub struct CorrelationStore {
    provider: Arc<StreamProvider>,
}

impl CorrelationStore {
    pub fn new(provider: Arc<StreamProvider>) -> Self {
        Self { provider }
    }

    /// Cell key for a position id; the id itself, so keys are unique per request
    pub fn key(id: &PositionId) -> &str {
        id.as_str()
    }

    /// Write the result for `id`, expiring after `ttl`
    pub async fn publish(&self, id: &PositionId, body: &Value, ttl: Duration) -> StreamResult<()> {
        self.provider
            .set_with_ttl(Self::key(id), &body.to_string(), ttl)
            .await
    }

    /// Whether a result is waiting for `id`, without consuming it
    pub async fn is_ready(&self, id: &PositionId) -> StreamResult<bool> {
        Ok(self.provider.get(Self::key(id)).await?.is_some())
    }

    /// Read and delete the result for `id`
    ///
    /// Returns `Ok(None)` when no result is stored, including after a
    /// previous successful `take`. A stored value that is not valid JSON is
    /// removed and reported as a deserialization error.
    pub async fn take(&self, id: &PositionId) -> Result<Option<ResponseEntry>> {
        let key = Self::key(id);
        let Some(raw) = self.provider.get(key).await? else {
            return Ok(None);
        };
        let removed = self.provider.delete(key).await?;
        if !removed {
            debug!(id = %id, "Result cell already removed by a concurrent reader");
        }

        let body: Value =
            serde_json::from_str(&raw).map_err(|e| BatcherError::deserialization(key, e))?;
        Ok(Some(ResponseEntry::new(id.clone(), body)))
    }
}
