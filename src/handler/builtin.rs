//! Handlers shipped with the CLI, for smoke tests and load tests

use std::sync::Arc;

use anyhow::{anyhow, bail};
use serde_json::Value;
use uuid::Uuid;

use super::{from_fn, BatchHandler, HandlerRegistry};

pub const ECHO: &str = "echo";
pub const ADD_ONE: &str = "add-one";
pub const SET_NAME: &str = "set-name";

/// Registry holding every built-in handler
pub fn registry() -> HandlerRegistry {
    let registry = HandlerRegistry::new();
    registry.register(Arc::new(from_fn(ECHO, echo)));
    registry.register(Arc::new(from_fn(ADD_ONE, add_one)));
    registry.register(Arc::new(from_fn(SET_NAME, set_name)));
    registry
}

/// Look up a built-in handler by name
pub fn lookup(name: &str) -> Option<Arc<dyn BatchHandler>> {
    registry().get(name)
}

/// Returns every payload unchanged
pub fn echo(inputs: Vec<Value>) -> anyhow::Result<Vec<Value>> {
    Ok(inputs)
}

/// Writes `nested.values` incremented by one into `nested.result`
///
/// Payloads without a numeric `nested.values` array fail the batch.
pub fn add_one(inputs: Vec<Value>) -> anyhow::Result<Vec<Value>> {
    inputs
        .into_iter()
        .enumerate()
        .map(|(index, mut body)| {
            let nested = body
                .get_mut("nested")
                .and_then(Value::as_object_mut)
                .ok_or_else(|| anyhow!("input {index}: missing object `nested`"))?;
            let values = nested
                .get("values")
                .and_then(Value::as_array)
                .ok_or_else(|| anyhow!("input {index}: missing array `nested.values`"))?;

            let result = values
                .iter()
                .map(|v| {
                    increment(v).ok_or_else(|| anyhow!("input {index}: non-numeric value {v}"))
                })
                .collect::<anyhow::Result<Vec<Value>>>()?;
            nested.insert("result".to_string(), Value::Array(result));
            Ok(body)
        })
        .collect()
}

fn increment(value: &Value) -> Option<Value> {
    if let Some(i) = value.as_i64() {
        return i.checked_add(1).map(Value::from);
    }
    value.as_f64().map(|f| Value::from(f + 1.0))
}

/// Stamps a fresh UUID v4 into each payload's `name`
pub fn set_name(inputs: Vec<Value>) -> anyhow::Result<Vec<Value>> {
    inputs
        .into_iter()
        .enumerate()
        .map(|(index, mut body)| {
            let Some(object) = body.as_object_mut() else {
                bail!("input {index}: expected a JSON object");
            };
            object.insert("name".to_string(), Value::String(Uuid::new_v4().to_string()));
            Ok(body)
        })
        .collect()
}
