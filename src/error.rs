//! Error types for the Helios lead bot.

use std::time::Duration;

use crate::flow::NodeId;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Flow error: {0}")]
    Flow(#[from] FlowError),

    #[error("Delivery error: {0}")]
    Delivery(#[from] DeliveryError),

    #[error("Session store error: {0}")]
    Store(#[from] StoreError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required configuration: {key}. {hint}")]
    MissingRequired { key: String, hint: String },

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Dialog engine errors.
///
/// `InvalidTurn` is surfaced to the user as a corrective notice; the other
/// variants are programming-level faults in the node table.
#[derive(Debug, thiserror::Error)]
pub enum FlowError {
    #[error("Node {0} is not defined in the node table")]
    UnknownNode(NodeId),

    #[error("Node {node} references missing node {target}")]
    DanglingTransition { node: NodeId, target: NodeId },

    #[error("Node {0} is unreachable from the start node")]
    Unreachable(NodeId),

    #[error("Node {0} can neither end the conversation nor return to the main menu")]
    NoExit(NodeId),

    #[error("No pitch copy for industry '{0}'")]
    MissingPitch(String),

    #[error("Invalid turn at node {node}: {reason}")]
    InvalidTurn { node: NodeId, reason: String },
}

/// Webhook delivery errors.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("A delivery is already in flight for session {session_id}")]
    InFlight { session_id: String },

    #[error("Webhook request timed out after {timeout:?}")]
    Timeout { timeout: Duration },

    #[error("Webhook responded with HTTP {status}")]
    Status { status: u16 },

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Failed to serialize payload: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Delivery failed after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: Box<DeliveryError> },
}

/// Session identity storage errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt session store: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("Session store lock poisoned")]
    Poisoned,
}

/// Result type alias for the crate.
pub type Result<T> = std::result::Result<T, Error>;
