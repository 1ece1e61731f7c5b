//! Error types shared by the agent components

use std::time::Duration;
use thiserror::Error;

/// Failures of the underlying publish/subscribe connection
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Broker did not accept the connection within {0:?}")]
    ConnectTimeout(Duration),

    #[error("Publish to {topic} failed: {reason}")]
    Publish { topic: String, reason: String },

    #[error("Subscribe to {topic} failed: {reason}")]
    Subscribe { topic: String, reason: String },

    #[error("No acknowledgment for '{payload}' within {timeout:?}")]
    AckTimeout { payload: String, timeout: Duration },

    #[error("Connection lost before '{payload}' was acknowledged")]
    ConnectionLost { payload: String },

    #[error("Disconnect failed: {0}")]
    Disconnect(String),

    #[error("TLS material unavailable: {0}")]
    Tls(String),
}

/// Inbound traffic the agent does not understand
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Unrecognized command: '{payload}'")]
    UnrecognizedCommand { payload: String },
}

/// Failure while executing a queued task
#[derive(Error, Debug)]
pub enum TaskError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Task panicked: {0}")]
    Panicked(String),
}

/// Failures of the task queue
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueError {
    #[error("Task queue is closed")]
    Closed,

    #[error("Task queue is full")]
    Full,
}
