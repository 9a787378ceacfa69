//! Infrastructure-level errors

use thiserror::Error;

/// Errors reading configuration trees from external representations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InfraError {
    #[error("parse error: {message}")]
    Parse { message: String },

    #[error("invalid node at {at}: {message}")]
    InvalidNode { at: String, message: String },
}

/// Result type for infrastructure layer operations.
pub type InfraResult<T> = Result<T, InfraError>;
