//! # Stream Broker Abstraction
//!
//! The batching protocol needs two broker facilities: an append-only stream
//! with consumer groups and a pending-entries list, and key/value cells that
//! expire. [`StreamClient`] names those primitives, [`StreamProvider`]
//! dispatches over the concrete clients.
//!
//! ## Providers
//!
//! - [`RedisStreamClient`]: Redis streams through a `ConnectionManager`
//! - [`InMemoryStreamClient`]: process-local broker for tests

mod provider;
pub mod providers;
mod traits;
mod types;

pub use provider::StreamProvider;
pub use providers::{InMemoryStreamClient, RedisStreamClient};
pub use traits::StreamClient;
pub use types::{PendingEntry, PositionId, ResponseEntry, StreamEntry, BODY_FIELD};
