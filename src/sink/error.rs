//! Error types for time-series writes

use std::fmt;

pub type SinkResult<T> = Result<T, SinkError>;

#[derive(Debug)]
pub enum SinkError {
    /// HTTP client could not be built or the request could not be sent
    Transport(reqwest::Error),

    /// The store answered with a non-success status
    Rejected { status: u16, body: String },

    /// Invalid sink configuration
    InvalidConfig(String),
}

impl fmt::Display for SinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SinkError::Transport(err) => write!(f, "time-series request failed: {err}"),
            SinkError::Rejected { status, body } => {
                write!(f, "time-series store rejected write ({status}): {body}")
            }
            SinkError::InvalidConfig(msg) => write!(f, "invalid time-series configuration: {msg}"),
        }
    }
}

impl std::error::Error for SinkError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SinkError::Transport(err) => Some(err),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for SinkError {
    fn from(err: reqwest::Error) -> Self {
        SinkError::Transport(err)
    }
}
