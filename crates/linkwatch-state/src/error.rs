//! Error types for linkwatch state and registry access.

use thiserror::Error;

/// Result type alias for state operations.
pub type StateResult<T> = Result<T, StateError>;

/// Errors raised while parsing or validating domain values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("unknown endpoint status: {0}")]
    UnknownStatus(String),

    #[error("unknown endpoint type: {0}")]
    UnknownEndpointType(String),

    #[error("unknown network media: {0}")]
    UnknownMedia(String),
}

/// Failures of the external endpoint registry.
///
/// A registry failure is fatal to starting a monitoring session.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("registry unavailable: {0}")]
    Unavailable(String),

    #[error("malformed registry response: {0}")]
    Malformed(String),

    #[error("inventory i/o error: {0}")]
    Io(#[from] std::io::Error),
}
