//! Shared fixtures for the protocol tests
//!
//! Everything runs against the in-memory provider so tests can use tokio's
//! paused clock.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use proptest::prelude::*;
use serde_json::{json, Value};
use tokio::task::JoinHandle;

use dynamic_batcher::handler::{from_fn, BatchHandler};
use dynamic_batcher::stream::InMemoryStreamClient;
use dynamic_batcher::{
    BatchProcessor, BrokerConfig, DispatcherConfig, DynamicBatcher, ProcessorConfig,
    StreamProvider,
};

/// One in-memory broker shared by every engine and dispatcher of a test
#[derive(Debug, Clone)]
pub struct Harness {
    pub client: InMemoryStreamClient,
    pub provider: Arc<StreamProvider>,
    pub broker: BrokerConfig,
}

impl Harness {
    pub fn new() -> Self {
        let client = InMemoryStreamClient::new();
        Self {
            provider: Arc::new(StreamProvider::from(client.clone())),
            client,
            broker: BrokerConfig::default(),
        }
    }

    pub async fn processor(&self, config: ProcessorConfig) -> BatchProcessor {
        BatchProcessor::new(Arc::clone(&self.provider), &self.broker, config)
            .await
            .expect("processor should start on the in-memory broker")
    }

    /// Processor with its own consumer name within the processor group
    pub async fn processor_named(&self, consumer: &str, config: ProcessorConfig) -> BatchProcessor {
        let broker = self.broker.clone().with_consumer(consumer);
        BatchProcessor::new(Arc::clone(&self.provider), &broker, config)
            .await
            .expect("processor should start on the in-memory broker")
    }

    pub async fn batcher(&self, timeout: Duration) -> DynamicBatcher {
        let config = DispatcherConfig::new()
            .with_delay(Duration::from_millis(10))
            .with_timeout(timeout);
        DynamicBatcher::new(Arc::clone(&self.provider), &self.broker, config)
            .await
            .expect("dispatcher should start on the in-memory broker")
    }
}

/// Batch engine config with a short window so paused-clock tests stay quick
pub fn engine_config(batch_size: usize) -> ProcessorConfig {
    ProcessorConfig::new()
        .with_batch_size(batch_size)
        .with_batch_time(Duration::from_millis(100))
}

/// Run `processor` in the background until the test ends
pub fn spawn_engine(
    processor: BatchProcessor,
    handler: Arc<dyn BatchHandler>,
) -> JoinHandle<()> {
    tokio::spawn(async move { processor.start_daemon(handler.as_ref()).await })
}

/// `{"v": n}` becomes `{"v": n + 1}`
pub fn increment() -> Arc<dyn BatchHandler> {
    Arc::new(from_fn("increment", |inputs: Vec<Value>| {
        Ok(inputs
            .iter()
            .map(|x| json!({"v": x["v"].as_i64().unwrap_or_default() + 1}))
            .collect())
    }))
}

/// Records every batch it receives and answers with `{"v": n * 10}`
pub fn recording() -> (Arc<dyn BatchHandler>, Arc<Mutex<Vec<Vec<Value>>>>) {
    let seen: Arc<Mutex<Vec<Vec<Value>>>> = Arc::default();
    let log = Arc::clone(&seen);
    let handler = from_fn("recording", move |inputs: Vec<Value>| {
        log.lock().push(inputs.clone());
        Ok(inputs
            .iter()
            .map(|x| json!({"v": x["v"].as_i64().unwrap_or_default() * 10}))
            .collect())
    });
    (Arc::new(handler), seen)
}

/// Payloads carrying a distinct `v`
pub fn distinct_payloads(max_len: usize) -> impl Strategy<Value = Vec<Value>> {
    prop::collection::hash_set(0i64..10_000, 1..=max_len)
        .prop_map(|values| values.into_iter().map(|v| json!({"v": v})).collect())
}
