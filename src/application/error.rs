//! Application-level errors

use thiserror::Error;

/// Application errors: configuration problems surfaced to the embedding caller.
///
/// Tree faults stay [`TreeError`](crate::domain::TreeError)s, they are never
/// expected during normal operation.
#[derive(Error, Debug)]
pub enum ApplicationError {
    #[error("config error: {message}")]
    Config { message: String },
}

/// Result type for application layer operations.
pub type ApplicationResult<T> = Result<T, ApplicationError>;
