//! Error types for streaming sessions

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("A session is already open")]
    AlreadyOpen,

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Server error: {0}")]
    Server(String),

    #[error("Connection closed before the session started")]
    ClosedBeforeStart,

    #[error("Session was reset before it started")]
    Cancelled,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Failed to connect to {url}: {message}")]
    Connect { url: String, message: String },

    #[error("Connection error: {0}")]
    Connection(String),
}

/// Problems decoding an inbound frame
#[derive(Error, Debug)]
pub enum EventError {
    #[error("Malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Unknown event type: {0}")]
    UnknownType(String),

    #[error("Event {event_type} is missing field {field}")]
    MissingField {
        event_type: &'static str,
        field: &'static str,
    },
}
