//! Infrastructure layer: in-memory source trees and model lookup
//!
//! Implements the boundary traits of the domain layer for callers that hold
//! their configuration in memory or as TOML documents.

pub mod error;
pub mod library;
pub mod memory;

pub use error::{InfraError, InfraResult};
pub use library::ModelLibrary;
pub use memory::{MemoryNode, MemoryTree};
