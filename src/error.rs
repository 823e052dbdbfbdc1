//! # Error Types
//!
//! Structured errors for the broker layer (`StreamError`) and for the
//! batching protocol built on top of it (`BatcherError`).

use std::fmt;
use thiserror::Error;

/// Errors raised by a [`crate::stream::StreamClient`] implementation
#[derive(Error, Debug)]
pub enum StreamError {
    /// The broker could not be reached or the connection dropped
    #[error("Broker connection error: {message}")]
    Connection { message: String },

    /// A broker command was rejected or failed mid-flight
    #[error("Stream command failed: {command} on {key}: {message}")]
    Command {
        command: String,
        key: String,
        message: String,
    },

    /// The consumer group does not exist on the stream
    #[error("Consumer group not found: {group} on stream {stream}")]
    GroupNotFound { stream: String, group: String },
}

impl StreamError {
    /// Create a connection error
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Create a command error
    pub fn command(
        command: impl Into<String>,
        key: impl Into<String>,
        message: impl fmt::Display,
    ) -> Self {
        Self::Command {
            command: command.into(),
            key: key.into(),
            message: message.to_string(),
        }
    }

    /// Create a missing consumer group error
    pub fn group_not_found(stream: impl Into<String>, group: impl Into<String>) -> Self {
        Self::GroupNotFound {
            stream: stream.into(),
            group: group.into(),
        }
    }

    /// Whether retrying the same call later may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Connection { .. } | Self::Command { .. })
    }
}

/// Result type for broker operations
pub type StreamResult<T> = std::result::Result<T, StreamError>;

/// Which half of the dispatcher wait a deadline expired in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitPhase {
    /// Waiting for a batch engine to claim the request
    Acceptance,
    /// Waiting for the result entry to appear
    Completion,
}

impl fmt::Display for WaitPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Acceptance => write!(f, "acceptance"),
            Self::Completion => write!(f, "completion"),
        }
    }
}

/// Errors surfaced by the dispatcher and the batch engine
#[derive(Error, Debug)]
pub enum BatcherError {
    /// The request payload could not be encoded
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// A stored payload could not be decoded
    #[error("Deserialization error for {id}: {message}")]
    Deserialization { id: String, message: String },

    /// Any broker connectivity or command failure
    #[error("Broker unavailable: {0}")]
    BrokerUnavailable(#[from] StreamError),

    /// The dispatcher gave up polling
    #[error("Deadline exceeded during {phase} after {timeout_secs:.3}s")]
    DeadlineExceeded { phase: WaitPhase, timeout_secs: f64 },

    /// The user batch function returned an error or panicked
    #[error("Batch function `{handler}` failed: {message}")]
    UserFunction { handler: String, message: String },

    /// The user batch function returned the wrong number of results
    #[error("Batch function `{handler}` returned {actual} results for {expected} inputs")]
    ResultLengthMismatch {
        handler: String,
        expected: usize,
        actual: usize,
    },

    /// Invalid or unloadable configuration
    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

impl BatcherError {
    /// Create a serialization error
    pub fn serialization(message: impl fmt::Display) -> Self {
        Self::Serialization {
            message: message.to_string(),
        }
    }

    /// Create a deserialization error for a position id
    pub fn deserialization(id: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Deserialization {
            id: id.into(),
            message: message.to_string(),
        }
    }

    /// Create a deadline error
    pub fn deadline_exceeded(phase: WaitPhase, timeout: std::time::Duration) -> Self {
        Self::DeadlineExceeded {
            phase,
            timeout_secs: timeout.as_secs_f64(),
        }
    }

    /// Create a user function error
    pub fn user_function(handler: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::UserFunction {
            handler: handler.into(),
            message: message.to_string(),
        }
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}

impl From<config::ConfigError> for BatcherError {
    fn from(err: config::ConfigError) -> Self {
        Self::configuration(err.to_string())
    }
}

/// Result type for batching operations
pub type Result<T> = std::result::Result<T, BatcherError>;
