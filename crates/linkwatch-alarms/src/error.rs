//! Alarm feed error types.

use thiserror::Error;

/// Failures of the external alarm feed. Never fatal to monitoring.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AlarmFeedError {
    #[error("alarm feed unavailable: {0}")]
    Unavailable(String),

    #[error("malformed alarm feed response: {0}")]
    Malformed(String),
}

pub type AlarmResult<T> = Result<T, AlarmFeedError>;
