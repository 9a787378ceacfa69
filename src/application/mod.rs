//! Application layer: the tracker facade
//!
//! This layer wires the domain tree to its callers.

pub mod error;
pub mod tracker;

pub use error::{ApplicationError, ApplicationResult};
pub use tracker::ModelTreeTracker;
