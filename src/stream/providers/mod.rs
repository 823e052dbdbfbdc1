//! Stream client implementations

mod in_memory;
mod redis;

pub use self::in_memory::InMemoryStreamClient;
pub use self::redis::RedisStreamClient;
