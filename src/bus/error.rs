//! Error types for message bus operations

use std::fmt;

pub type BusResult<T> = Result<T, BusError>;

#[derive(Debug)]
pub enum BusError {
    /// Could not reach the broker
    ConnectionFailed(String),

    /// Broker rejected or failed to accept a message
    PublishFailed(String),

    /// Subscription could not be established
    SubscribeFailed(String),

    /// Payload could not be encoded to JSON
    Encode(serde_json::Error),
}

impl fmt::Display for BusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BusError::ConnectionFailed(msg) => write!(f, "failed to connect to message bus: {msg}"),
            BusError::PublishFailed(msg) => write!(f, "failed to publish message: {msg}"),
            BusError::SubscribeFailed(msg) => write!(f, "failed to subscribe: {msg}"),
            BusError::Encode(err) => write!(f, "failed to encode message: {err}"),
        }
    }
}

impl std::error::Error for BusError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BusError::Encode(err) => Some(err),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for BusError {
    fn from(err: serde_json::Error) -> Self {
        BusError::Encode(err)
    }
}
