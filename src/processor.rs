//! # Batch Processor (batch engine)
//!
//! Server side of the batching protocol. Each iteration runs three phases:
//!
//! ```text
//!   COLLECTING ──(elapsed ≥ batch_time or len ≥ batch_size)──→ DISPATCHING ──→ TRIM
//!       ↑                                                            │
//!       └────────────────────────────────────────────────────────────┘
//! ```
//!
//! - **Collecting** claims one unclaimed Request Entry at a time, sleeping
//!   `collect_delay` between attempts. On the first iteration and after a
//!   failed one, entries still pending for this consumer are picked up again
//!   first. With `reclaim_idle` set, entries left pending by a crashed engine
//!   for longer than that are reclaimed too.
//! - **Dispatching** (non-empty batches only) sorts the batch by position id,
//!   invokes the handler once, writes one Result Entry per item, then
//!   acknowledges and deletes the Request Entries.
//! - **Trim** caps both streams at `batch_size × 10` entries.
//!
//! A failing handler (error, panic, or wrong result count) writes no results
//! for its batch. The daemon logs it and moves on.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};

use crate::config::{BrokerConfig, ProcessorConfig};
use crate::correlation::CorrelationStore;
use crate::error::{BatcherError, Result};
use crate::handler::BatchHandler;
use crate::stream::{PositionId, StreamClient, StreamEntry, StreamProvider};

/// Pause after an iteration that failed before collecting anything
const ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// How an iteration ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOutcome {
    /// Nothing was collected
    Empty,
    /// Results were written for every item
    Completed,
    /// The handler failed, or no item decoded; no results were written
    Failed,
}

/// Summary of one iteration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchReport {
    pub collected: usize,
    pub outcome: BatchOutcome,
    pub elapsed: Duration,
}

/// Forms batches from the request stream and runs the handler on them
#[derive(Debug, Clone)]
pub struct BatchProcessor {
    provider: Arc<StreamProvider>,
    store: CorrelationStore,
    request_stream: String,
    response_stream: String,
    group: String,
    consumer: String,
    config: ProcessorConfig,
    /// Set when this consumer may own unfinished pending entries
    resume_own: Arc<AtomicBool>,
}

impl BatchProcessor {
    /// Create a batch engine over an existing broker handle
    ///
    /// Validates `config` and makes sure both streams and consumer groups
    /// exist. The consumer identity comes from
    /// [`BrokerConfig::consumer_name`]; engines sharing a stream need
    /// distinct identities for reclaim to tell them apart.
    pub async fn new(
        provider: Arc<StreamProvider>,
        broker: &BrokerConfig,
        config: ProcessorConfig,
    ) -> Result<Self> {
        broker.validate()?;
        config.validate()?;
        provider.ensure_streams(broker).await?;

        Ok(Self {
            store: CorrelationStore::new(Arc::clone(&provider)),
            provider,
            request_stream: broker.stream_key_request.clone(),
            response_stream: broker.stream_key_response.clone(),
            group: broker.stream_group_processor.clone(),
            consumer: broker.consumer_name().to_string(),
            config,
            resume_own: Arc::new(AtomicBool::new(true)),
        })
    }

    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    pub fn consumer(&self) -> &str {
        &self.consumer
    }

    /// Run iterations forever
    pub async fn start_daemon<H>(&self, handler: &H)
    where
        H: BatchHandler + ?Sized,
    {
        self.start_daemon_until(handler, std::future::pending::<()>())
            .await
    }

    /// Run iterations until `shutdown` resolves
    ///
    /// `shutdown` is checked between iterations, so a batch in flight always
    /// finishes before the loop returns.
    pub async fn start_daemon_until<H, S>(&self, handler: &H, shutdown: S)
    where
        H: BatchHandler + ?Sized,
        S: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        info!(
            consumer = %self.consumer,
            handler = handler.name(),
            batch_size = self.config.batch_size,
            batch_time_ms = self.config.batch_time.as_millis() as u64,
            collect_delay_ms = self.config.collect_delay.as_millis() as u64,
            reclaim_idle_ms = self.config.reclaim_idle.map(|d| d.as_millis() as u64),
            "BatchProcessor started"
        );

        loop {
            if (&mut shutdown).now_or_never().is_some() {
                info!(consumer = %self.consumer, "BatchProcessor stopping");
                return;
            }

            match self.run_once(handler).await {
                Ok(report) if report.outcome != BatchOutcome::Empty => {
                    debug!(
                        collected = report.collected,
                        outcome = ?report.outcome,
                        elapsed_ms = report.elapsed.as_millis() as u64,
                        "Iteration finished"
                    );
                }
                Ok(_) => {}
                Err(BatcherError::BrokerUnavailable(e)) if !e.is_transient() => {
                    error!(
                        consumer = %self.consumer,
                        error = %e,
                        "Consumer group missing, recreating"
                    );
                    if let Err(e) = self
                        .provider
                        .ensure_group(&self.request_stream, &self.group)
                        .await
                    {
                        warn!(error = %e, "Unable to recreate consumer group");
                    }
                    tokio::time::sleep(ERROR_BACKOFF).await;
                }
                Err(e) => {
                    warn!(
                        consumer = %self.consumer,
                        error = %e,
                        "Iteration failed, retrying"
                    );
                    tokio::time::sleep(ERROR_BACKOFF).await;
                }
            }
        }
    }

    /// Run a single iteration: collect, dispatch, trim
    ///
    /// Broker failures while collecting are returned only when nothing was
    /// claimed; a partial batch is still dispatched. Trim failures are logged.
    /// After a failed iteration, entries it left pending are dispatched again
    /// by the next one.
    pub async fn run_once<H>(&self, handler: &H) -> Result<BatchReport>
    where
        H: BatchHandler + ?Sized,
    {
        let report = self.iterate(handler).await;
        if report.is_err() {
            self.resume_own.store(true, Ordering::Release);
        }
        report
    }

    async fn iterate<H>(&self, handler: &H) -> Result<BatchReport>
    where
        H: BatchHandler + ?Sized,
    {
        let started = Instant::now();
        let batch = self.collect().await?;
        let collected = batch.len();

        let outcome = if batch.is_empty() {
            BatchOutcome::Empty
        } else {
            debug!(
                collected = collected,
                waited_ms = started.elapsed().as_millis() as u64,
                "Batch start"
            );
            self.dispatch(handler, batch).await?
        };

        if let Err(e) = self.trim().await {
            error!(error = %e, "Error while trimming streams");
        }

        Ok(BatchReport {
            collected,
            outcome,
            elapsed: started.elapsed(),
        })
    }

    /// Trim both streams to the retention length, returning entries removed
    pub async fn trim(&self) -> Result<u64> {
        let max_len = self.config.retention_len();
        let requests = self.provider.trim(&self.request_stream, max_len).await?;
        let responses = self.provider.trim(&self.response_stream, max_len).await?;
        if requests + responses > 0 {
            debug!(
                requests = requests,
                responses = responses,
                max_len = max_len,
                "Trimmed old entries"
            );
        }
        Ok(requests + responses)
    }

    async fn collect(&self) -> Result<Vec<StreamEntry>> {
        let started = Instant::now();
        let batch_size = self.config.batch_size;
        let mut batch = Vec::with_capacity(batch_size);

        if self.resume_own.swap(false, Ordering::AcqRel) {
            batch.extend(self.resume_unfinished(batch_size).await?);
        }
        if let Some(min_idle) = self.config.reclaim_idle {
            let room = batch_size.saturating_sub(batch.len());
            if room > 0 {
                batch.extend(self.reclaim_stale(min_idle, room).await?);
            }
        }

        while batch.len() < batch_size && started.elapsed() < self.config.batch_time {
            match self
                .provider
                .claim(&self.request_stream, &self.group, &self.consumer, 1, false)
                .await
            {
                Ok(entries) => batch.extend(entries),
                Err(e) if batch.is_empty() => return Err(e.into()),
                Err(e) => {
                    warn!(
                        error = %e,
                        collected = batch.len(),
                        "Error while reading requests, dispatching partial batch"
                    );
                    break;
                }
            }
            if batch.len() < batch_size {
                tokio::time::sleep(self.config.collect_delay).await;
            }
        }

        Ok(batch)
    }

    /// Claim again the entries this consumer left pending
    #[instrument(skip(self), fields(consumer = %self.consumer))]
    async fn resume_unfinished(&self, limit: usize) -> Result<Vec<StreamEntry>> {
        let own = self
            .provider
            .pending_for_consumer(&self.request_stream, &self.group, &self.consumer, limit)
            .await?;
        if own.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<PositionId> = own.into_iter().map(|p| p.message_id).collect();
        let resumed = self
            .provider
            .reclaim(
                &self.request_stream,
                &self.group,
                &self.consumer,
                Duration::ZERO,
                &ids,
            )
            .await?;
        info!(
            pending = ids.len(),
            resumed = resumed.len(),
            "Resuming unfinished requests"
        );
        Ok(resumed)
    }

    /// Take over entries another consumer claimed but never finished
    #[instrument(skip(self), fields(consumer = %self.consumer))]
    async fn reclaim_stale(&self, min_idle: Duration, limit: usize) -> Result<Vec<StreamEntry>> {
        let stale = self
            .provider
            .pending_idle(&self.request_stream, &self.group, min_idle, limit)
            .await?;
        if stale.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<PositionId> = stale.into_iter().map(|p| p.message_id).collect();
        let reclaimed = self
            .provider
            .reclaim(&self.request_stream, &self.group, &self.consumer, min_idle, &ids)
            .await?;
        info!(
            stale = ids.len(),
            reclaimed = reclaimed.len(),
            "Reclaimed stale requests"
        );
        Ok(reclaimed)
    }

    async fn dispatch<H>(&self, handler: &H, mut batch: Vec<StreamEntry>) -> Result<BatchOutcome>
    where
        H: BatchHandler + ?Sized,
    {
        batch.sort_by(|a, b| a.id.cmp(&b.id));

        let mut consumed = Vec::with_capacity(batch.len());
        let mut ids = Vec::with_capacity(batch.len());
        let mut inputs = Vec::with_capacity(batch.len());
        for entry in batch {
            consumed.push(entry.id.clone());
            match decode(&entry) {
                Ok(body) => {
                    ids.push(entry.id);
                    inputs.push(body);
                }
                Err(e) => warn!(id = %entry.id, error = %e, "Skipping malformed request"),
            }
        }

        let outcome = if inputs.is_empty() {
            BatchOutcome::Failed
        } else {
            match self.invoke(handler, inputs).await {
                Ok(results) => {
                    // A failed write leaves the batch pending for the next iteration
                    for (id, body) in ids.iter().zip(results.iter()) {
                        self.store
                            .publish(id, body, self.config.response_ttl)
                            .await?;
                    }
                    BatchOutcome::Completed
                }
                Err(e) => {
                    error!(
                        handler = handler.name(),
                        batch_size = ids.len(),
                        error = %e,
                        "Batch function failed, no results written"
                    );
                    BatchOutcome::Failed
                }
            }
        };

        self.provider
            .ack(&self.request_stream, &self.group, &consumed)
            .await?;
        self.provider
            .delete_entries(&self.request_stream, &consumed)
            .await?;

        if outcome == BatchOutcome::Completed {
            info!(
                handler = handler.name(),
                batch_size = consumed.len(),
                "Batch completed"
            );
        }
        Ok(outcome)
    }

    /// Call the handler once, treating panics and miscounted results as errors
    async fn invoke<H>(&self, handler: &H, inputs: Vec<Value>) -> Result<Vec<Value>>
    where
        H: BatchHandler + ?Sized,
    {
        let expected = inputs.len();
        let results = match AssertUnwindSafe(handler.handle(inputs)).catch_unwind().await {
            Ok(Ok(results)) => results,
            Ok(Err(e)) => {
                return Err(BatcherError::user_function(handler.name(), format!("{e:#}")))
            }
            Err(panic) => {
                return Err(BatcherError::user_function(
                    handler.name(),
                    format!("panicked: {}", panic_message(panic.as_ref())),
                ))
            }
        };

        if results.len() != expected {
            return Err(BatcherError::ResultLengthMismatch {
                handler: handler.name().to_string(),
                expected,
                actual: results.len(),
            });
        }
        Ok(results)
    }
}

fn decode(entry: &StreamEntry) -> Result<Value> {
    let id = entry.id.as_str();
    let body = entry
        .body()
        .ok_or_else(|| BatcherError::deserialization(id, "missing body field"))?;
    serde_json::from_str(body).map_err(|e| BatcherError::deserialization(id, e))
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StreamError;
    use crate::handler::from_fn;
    use crate::stream::{InMemoryStreamClient, BODY_FIELD};
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    async fn processor(config: ProcessorConfig) -> (InMemoryStreamClient, BatchProcessor) {
        let client = InMemoryStreamClient::new();
        let provider = Arc::new(StreamProvider::from(client.clone()));
        let processor = BatchProcessor::new(provider, &BrokerConfig::default(), config)
            .await
            .unwrap();
        (client, processor)
    }

    fn fast_config(batch_size: usize) -> ProcessorConfig {
        ProcessorConfig::new()
            .with_batch_size(batch_size)
            .with_batch_time(Duration::from_millis(50))
    }

    async fn submit(client: &InMemoryStreamClient, body: &str) -> PositionId {
        client
            .append("request", &[(BODY_FIELD, body)])
            .await
            .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_iteration_skips_dispatch() {
        let (_client, processor) = processor(fast_config(4)).await;
        let handler = from_fn("never", |_| panic!("must not be called"));

        let report = processor.run_once(&handler).await.unwrap();
        assert_eq!(report.collected, 0);
        assert_eq!(report.outcome, BatchOutcome::Empty);
        assert!(report.elapsed >= Duration::from_millis(50));
    }

    #[tokio::test(start_paused = true)]
    async fn test_results_are_written_in_position_order() {
        let (client, processor) = processor(fast_config(8)).await;
        let first = submit(&client, "{\"v\":1}").await;
        let second = submit(&client, "{\"v\":2}").await;
        let third = submit(&client, "{\"v\":3}").await;

        let handler = from_fn("tag", |inputs| {
            Ok(inputs
                .into_iter()
                .enumerate()
                .map(|(n, v)| json!({"n": n, "v": v["v"]}))
                .collect())
        });
        let report = processor.run_once(&handler).await.unwrap();
        assert_eq!(report.collected, 3);
        assert_eq!(report.outcome, BatchOutcome::Completed);

        for (n, id) in [first, second, third].iter().enumerate() {
            let stored = client.get(id.as_str()).await.unwrap().unwrap();
            let body: Value = serde_json::from_str(&stored).unwrap();
            assert_eq!(body, json!({"n": n, "v": n + 1}));
        }

        assert_eq!(client.stream_len("request"), 0);
        assert_eq!(client.pending_count("request", "processor"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_batch_stops_at_batch_size() {
        let (client, processor) = processor(fast_config(2)).await;
        for v in 0..5 {
            submit(&client, &format!("{{\"v\":{v}}}")).await;
        }
        let handler = from_fn("echo", Ok);

        let report = processor.run_once(&handler).await.unwrap();
        assert_eq!(report.collected, 2);
        assert!(report.elapsed < Duration::from_millis(50));
        assert_eq!(client.stream_len("request"), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_handler_error_writes_no_results() {
        let (client, processor) = processor(fast_config(8)).await;
        for v in 0..3 {
            submit(&client, &format!("{{\"v\":{v}}}")).await;
        }
        let handler = from_fn("boom", |_| Err(anyhow::anyhow!("model unavailable")));

        let report = processor.run_once(&handler).await.unwrap();
        assert_eq!(report.outcome, BatchOutcome::Failed);
        assert!(client.live_keys().is_empty());
        assert_eq!(client.stream_len("request"), 0);
        assert_eq!(client.pending_count("request", "processor"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_handler_panic_is_contained() {
        let (client, processor) = processor(fast_config(8)).await;
        submit(&client, "{\"v\":1}").await;
        let handler = from_fn("panics", |_| panic!("index out of range"));

        let report = processor.run_once(&handler).await.unwrap();
        assert_eq!(report.outcome, BatchOutcome::Failed);
        assert!(client.live_keys().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_short_result_list_fails_whole_batch() {
        let (client, processor) = processor(fast_config(8)).await;
        submit(&client, "{\"v\":1}").await;
        submit(&client, "{\"v\":2}").await;
        let handler = from_fn("short", |inputs| Ok(inputs.into_iter().take(1).collect()));

        let report = processor.run_once(&handler).await.unwrap();
        assert_eq!(report.outcome, BatchOutcome::Failed);
        assert!(client.live_keys().is_empty());
    }

    #[tokio::test]
    async fn test_invoke_reports_length_mismatch() {
        let (_client, processor) = processor(fast_config(8)).await;
        let handler = from_fn("long", |mut inputs: Vec<Value>| {
            inputs.push(json!(null));
            Ok(inputs)
        });

        let err = processor.invoke(&handler, vec![json!(1)]).await.unwrap_err();
        assert!(matches!(
            err,
            BatcherError::ResultLengthMismatch {
                expected: 1,
                actual: 2,
                ..
            }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_request_is_skipped() {
        let (client, processor) = processor(fast_config(8)).await;
        let bad = submit(&client, "not json").await;
        let good = submit(&client, "{\"v\":1}").await;
        let handler = from_fn("echo", Ok);

        let report = processor.run_once(&handler).await.unwrap();
        assert_eq!(report.collected, 2);
        assert_eq!(report.outcome, BatchOutcome::Completed);
        assert!(client.get(bad.as_str()).await.unwrap().is_none());
        assert!(client.get(good.as_str()).await.unwrap().is_some());
        assert_eq!(client.stream_len("request"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_claims_are_reclaimed() {
        let config = fast_config(8).with_reclaim_idle(Duration::from_secs(30));
        let (client, processor) = processor(config).await;
        let id = submit(&client, "{\"v\":1}").await;
        let crashed = client
            .claim("request", "processor", "crashed-engine", 1, false)
            .await
            .unwrap();
        assert_eq!(crashed.len(), 1);

        let handler = from_fn("echo", Ok);
        let report = processor.run_once(&handler).await.unwrap();
        assert_eq!(report.outcome, BatchOutcome::Empty);

        tokio::time::advance(Duration::from_secs(31)).await;
        let report = processor.run_once(&handler).await.unwrap();
        assert_eq!(report.collected, 1);
        assert_eq!(report.outcome, BatchOutcome::Completed);
        assert!(client.get(id.as_str()).await.unwrap().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_result_write_is_retried() {
        let (client, processor) = processor(fast_config(4)).await;
        let id = submit(&client, "{\"v\":1}").await;

        // The broker drops while the first batch is being computed
        let outage = client.clone();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let handler = from_fn("flaky-broker", move |inputs| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                outage.set_available(false);
            }
            Ok(inputs)
        });

        let err = processor.run_once(&handler).await.unwrap_err();
        assert!(matches!(err, BatcherError::BrokerUnavailable(_)));
        client.set_available(true);
        assert_eq!(client.pending_count("request", "processor"), 1);

        let report = processor.run_once(&handler).await.unwrap();
        assert_eq!(report.collected, 1);
        assert_eq!(report.outcome, BatchOutcome::Completed);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(
            client.get(id.as_str()).await.unwrap().as_deref(),
            Some("{\"v\":1}")
        );
        assert_eq!(client.pending_count("request", "processor"), 0);
        assert_eq!(client.stream_len("request"), 0);
    }

    #[tokio::test]
    async fn test_dispatch_sorts_out_of_order_batch() {
        let (client, processor) = processor(fast_config(8)).await;
        for v in 1..=3 {
            submit(&client, &format!("{{\"v\":{v}}}")).await;
        }
        let mut batch = client
            .claim("request", "processor", "processor", 3, false)
            .await
            .unwrap();
        batch.reverse();

        let seen: Arc<parking_lot::Mutex<Vec<Value>>> = Arc::default();
        let log = Arc::clone(&seen);
        let handler = from_fn("record", move |inputs: Vec<Value>| {
            log.lock().extend(inputs.iter().map(|x| x["v"].clone()));
            Ok(inputs)
        });

        let outcome = processor.dispatch(&handler, batch).await.unwrap();
        assert_eq!(outcome, BatchOutcome::Completed);
        assert_eq!(*seen.lock(), vec![json!(1), json!(2), json!(3)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_daemon_recreates_missing_group() {
        let (client, processor) = processor(fast_config(1)).await;
        client.delete("request").await.unwrap();
        assert!(!client.has_group("request", "processor"));

        let handler = from_fn("echo", Ok);
        let err = processor.run_once(&handler).await.unwrap_err();
        assert!(matches!(
            err,
            BatcherError::BrokerUnavailable(StreamError::GroupNotFound { .. })
        ));

        processor
            .start_daemon_until(&handler, tokio::time::sleep(Duration::from_millis(500)))
            .await;
        assert!(client.has_group("request", "processor"));

        let id = submit(&client, "{\"v\":7}").await;
        processor.run_once(&handler).await.unwrap();
        assert!(client.get(id.as_str()).await.unwrap().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_trim_caps_both_streams() {
        let (client, processor) = processor(fast_config(1)).await;
        for v in 0..15 {
            submit(&client, &format!("{{\"v\":{v}}}")).await;
            client.append("response", &[(BODY_FIELD, "{}")]).await.unwrap();
        }

        let trimmed = processor.trim().await.unwrap();
        assert_eq!(trimmed, 10);
        assert_eq!(client.stream_len("request"), 10);
        assert_eq!(client.stream_len("response"), 10);
    }

    #[tokio::test]
    async fn test_broker_outage_fails_iteration() {
        let (client, processor) = processor(fast_config(4)).await;
        client.set_available(false);
        let handler = from_fn("echo", Ok);

        let err = processor.run_once(&handler).await.unwrap_err();
        assert!(matches!(err, BatcherError::BrokerUnavailable(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_daemon_stops_on_shutdown() {
        let (client, processor) = processor(fast_config(1)).await;
        let id = submit(&client, "{\"v\":1}").await;
        let handler = from_fn("echo", Ok);

        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let shutdown = async {
            let _ = rx.await;
        };
        let stopper = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            let _ = tx.send(());
        });

        processor.start_daemon_until(&handler, shutdown).await;
        stopper.await.unwrap();
        assert!(client.get(id.as_str()).await.unwrap().is_some());
    }

    #[test]
    fn test_panic_message_extraction() {
        let boxed: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(boxed.as_ref()), "static");
        let boxed: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(boxed.as_ref()), "owned");
        let boxed: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(boxed.as_ref()), "Unknown panic");
    }
}
