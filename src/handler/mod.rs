//! # Batch Handlers
//!
//! The user batch function contract. A handler receives the deserialized
//! payloads of one batch, in ascending position-id order, and returns one
//! result per input in the same order. Returning an error (or panicking)
//! aborts the whole batch: no results are written for any of its items.
//!
//! ## Usage
//!
//! ```rust
//! use dynamic_batcher::handler::{from_fn, BatchHandler};
//! use serde_json::{json, Value};
//!
//! let handler = from_fn("double", |inputs: Vec<Value>| {
//!     Ok(inputs
//!         .into_iter()
//!         .map(|v| json!(v.as_i64().unwrap_or_default() * 2))
//!         .collect())
//! });
//! assert_eq!(handler.name(), "double");
//! ```

pub mod builtin;

use std::collections::HashMap;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// User batch function
///
/// Implementations must be `Send + Sync` so one handler can serve every
/// iteration of the batch engine. Panics are caught by the engine and treated
/// like returned errors.
#[async_trait]
pub trait BatchHandler: Send + Sync + 'static {
    /// Process one batch
    ///
    /// Must return exactly `inputs.len()` results, where result `n`
    /// belongs to input `n`.
    async fn handle(&self, inputs: Vec<Value>) -> anyhow::Result<Vec<Value>>;

    /// Handler name for logging
    fn name(&self) -> &str;
}

#[async_trait]
impl<H: BatchHandler + ?Sized> BatchHandler for Arc<H> {
    async fn handle(&self, inputs: Vec<Value>) -> anyhow::Result<Vec<Value>> {
        (**self).handle(inputs).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Handler backed by a synchronous closure
pub struct FnHandler<F> {
    name: String,
    func: F,
}

impl<F> std::fmt::Debug for FnHandler<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnHandler").field("name", &self.name).finish()
    }
}

#[async_trait]
impl<F> BatchHandler for FnHandler<F>
where
    F: Fn(Vec<Value>) -> anyhow::Result<Vec<Value>> + Send + Sync + 'static,
{
    async fn handle(&self, inputs: Vec<Value>) -> anyhow::Result<Vec<Value>> {
        (self.func)(inputs)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Wrap a synchronous closure as a handler
pub fn from_fn<F>(name: impl Into<String>, func: F) -> FnHandler<F>
where
    F: Fn(Vec<Value>) -> anyhow::Result<Vec<Value>> + Send + Sync + 'static,
{
    FnHandler {
        name: name.into(),
        func,
    }
}

/// Handler backed by a closure returning a future
pub struct AsyncFnHandler<F> {
    name: String,
    func: F,
}

impl<F> std::fmt::Debug for AsyncFnHandler<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncFnHandler")
            .field("name", &self.name)
            .finish()
    }
}

#[async_trait]
impl<F, Fut> BatchHandler for AsyncFnHandler<F>
where
    F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Vec<Value>>> + Send + 'static,
{
    async fn handle(&self, inputs: Vec<Value>) -> anyhow::Result<Vec<Value>> {
        (self.func)(inputs).await
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Wrap an async closure as a handler
pub fn from_async_fn<F, Fut>(name: impl Into<String>, func: F) -> AsyncFnHandler<F>
where
    F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Vec<Value>>> + Send + 'static,
{
    AsyncFnHandler {
        name: name.into(),
        func,
    }
}

/// Handler over typed payloads
///
/// Inputs are decoded into `I` before the closure runs and outputs encoded
/// from `O` afterwards. A payload that does not decode fails the batch.
pub struct TypedHandler<I, O, F> {
    name: String,
    func: F,
    _types: PhantomData<fn(I) -> O>,
}

#[async_trait]
impl<I, O, F> BatchHandler for TypedHandler<I, O, F>
where
    I: DeserializeOwned + Send + 'static,
    O: Serialize + Send + 'static,
    F: Fn(Vec<I>) -> anyhow::Result<Vec<O>> + Send + Sync + 'static,
{
    async fn handle(&self, inputs: Vec<Value>) -> anyhow::Result<Vec<Value>> {
        let typed = inputs
            .into_iter()
            .enumerate()
            .map(|(index, value)| {
                serde_json::from_value::<I>(value).with_context(|| {
                    format!("input {index} does not match handler `{}`", self.name)
                })
            })
            .collect::<anyhow::Result<Vec<I>>>()?;

        (self.func)(typed)?
            .into_iter()
            .map(|output| serde_json::to_value(output).context("result is not serializable"))
            .collect()
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Wrap a closure over typed payloads as a handler
pub fn typed<I, O, F>(name: impl Into<String>, func: F) -> TypedHandler<I, O, F>
where
    I: DeserializeOwned + Send + 'static,
    O: Serialize + Send + 'static,
    F: Fn(Vec<I>) -> anyhow::Result<Vec<O>> + Send + Sync + 'static,
{
    TypedHandler {
        name: name.into(),
        func,
        _types: PhantomData,
    }
}

/// Name-keyed handler lookup
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: RwLock<HashMap<String, Arc<dyn BatchHandler>>>,
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("handlers", &self.registered_handlers())
            .finish()
    }
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register under the handler's own name, replacing any previous entry
    pub fn register(&self, handler: Arc<dyn BatchHandler>) {
        let name = handler.name().to_string();
        self.handlers.write().insert(name, handler);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn BatchHandler>> {
        self.handlers.read().get(name).cloned()
    }

    pub fn handler_available(&self, name: &str) -> bool {
        self.handlers.read().contains_key(name)
    }

    /// Registered names, sorted
    pub fn registered_handlers(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.read().keys().cloned().collect();
        names.sort();
        names
    }
}
