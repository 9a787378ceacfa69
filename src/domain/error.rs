//! Domain-level errors (no external dependencies)

use thiserror::Error;

/// Internal-consistency faults.
///
/// Raised when an event from a source tree provider does not match the shape
/// of the derived tree. These always indicate a defect in the provider or in the
/// tree bookkeeping, never bad user input, and abort the current operation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    #[error("child index out of bounds: {index} (children: {len})")]
    IndexOutOfBounds { index: usize, len: usize },

    #[error("child path is empty")]
    EmptyPath,

    #[error("root being added while one already exists")]
    RootAlreadyExists,

    #[error("{event} event received, but there is no root")]
    RootMissing { event: &'static str },

    #[error("model '{model}' does not store an inlined model child")]
    NotExpanded { model: String },

    #[error("children cannot be added to a removed node")]
    DetachedNode,

    #[error("model provider for '{expected}' reported model '{actual}'")]
    ModelMismatch { expected: String, actual: String },

    #[error("owning model node no longer exists")]
    OwnerDropped,
}

/// Result type for tree operations.
pub type TreeResult<T> = Result<T, TreeError>;
