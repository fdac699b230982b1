//! Scheduler error types.

use thiserror::Error;

/// Errors that prevent a monitoring session from starting.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("endpoint registry error: {0}")]
    Registry(#[from] linkwatch_state::RegistryError),

    #[error("no endpoints to monitor")]
    NoEndpoints,
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;
