#![allow(clippy::doc_markdown)] // Allow technical terms like XREADGROUP, XPENDING in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Dynamic Batcher
//!
//! Groups individually submitted work items into batches, runs one batch
//! function per batch, and routes each item's result back to its caller.
//!
//! ## Overview
//!
//! Callers and batch engines never talk to each other directly. Both sides
//! share a broker stream with consumer groups (Redis streams in production):
//!
//! ```text
//! DynamicBatcher::asend ──XADD──→ request stream ──XREADGROUP──→ BatchProcessor
//!        ↑                                                             │
//!        └──── GET + DEL ──── result cell (SET EX, keyed by id) ←──────┘
//! ```
//!
//! - The [`dispatcher`] appends one Request Entry, waits until a batch engine
//!   has claimed it, then waits for its Result Entry.
//! - The [`processor`] claims entries until its batch is full or its batch
//!   window closes, calls the [`handler`] once, writes one result per item
//!   through the [`correlation`] store, then acknowledges and deletes the
//!   requests.
//!
//! ## Module Organization
//!
//! - [`stream`] - Broker primitives, Redis and in-memory providers
//! - [`correlation`] - Read-once, expiring result cells
//! - [`dispatcher`] - `DynamicBatcher`, the caller side
//! - [`processor`] - `BatchProcessor`, the batch engine
//! - [`handler`] - Batch function contract and built-in handlers
//! - [`config`] - Layered configuration
//! - [`error`] - Structured error handling
//! - [`logging`] - Tracing setup
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use dynamic_batcher::handler::from_fn;
//! use dynamic_batcher::{
//!     BatchProcessor, BrokerConfig, DispatcherConfig, DynamicBatcher, ProcessorConfig,
//!     StreamProvider,
//! };
//! use serde_json::{json, Value};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let provider = Arc::new(StreamProvider::in_memory());
//! let broker = BrokerConfig::default();
//!
//! let processor = BatchProcessor::new(
//!     Arc::clone(&provider),
//!     &broker,
//!     ProcessorConfig::new()
//!         .with_batch_size(1)
//!         .with_batch_time(Duration::from_millis(20)),
//! )
//! .await?;
//! let batcher = DynamicBatcher::new(provider, &broker, DispatcherConfig::new()).await?;
//!
//! let increment = from_fn("increment", |inputs: Vec<Value>| {
//!     Ok(inputs
//!         .iter()
//!         .map(|x| json!({"v": x["v"].as_i64().unwrap_or_default() + 1}))
//!         .collect())
//! });
//! let engine = tokio::spawn(async move { processor.start_daemon(&increment).await });
//!
//! let result: Option<Value> = batcher.asend(&json!({"v": 1})).await;
//! assert_eq!(result, Some(json!({"v": 2})));
//! engine.abort();
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod correlation;
pub mod dispatcher;
pub mod error;
pub mod handler;
pub mod logging;
pub mod processor;
pub mod stream;

pub use config::{BatcherConfig, BatchingConfig, BrokerConfig, DispatcherConfig, ProcessorConfig};
pub use correlation::CorrelationStore;
pub use dispatcher::DynamicBatcher;
pub use error::{BatcherError, Result, StreamError, StreamResult, WaitPhase};
pub use handler::{BatchHandler, HandlerRegistry};
pub use processor::{BatchOutcome, BatchProcessor, BatchReport};
pub use stream::{StreamClient, StreamProvider};
