//! Recursive configuration tree synchronization with model inlining.
//!
//! A [`ModelTreeTracker`] mirrors a live source configuration tree into a
//! derived tree of [`DeepNode`]s. Every model node of the source gets the
//! configuration tree of the referenced model appended as a hidden trailing
//! child, recursively, and kept in sync while the source trees change.
//!
//! ```
//! use std::rc::Rc;
//! use modeltree::{ChangeListener, MemoryNode, MemoryTree, ModelLibrary, ModelTreeTracker};
//!
//! struct Quiet;
//! impl ChangeListener for Quiet {}
//!
//! let library = Rc::new(ModelLibrary::new());
//! library.insert("wheel", MemoryTree::new().with_root(MemoryNode::new("rim")));
//! let source = Rc::new(MemoryTree::new().with_root(
//!     MemoryNode::new("car").with_child(MemoryNode::model("wheel")),
//! ));
//!
//! let tracker = ModelTreeTracker::new(source, library);
//! tracker.add_listener(Rc::new(Quiet)).unwrap();
//! let wheel = tracker.root().unwrap().child(0).unwrap();
//! assert_eq!(wheel.model_child().unwrap().type_id(), "rim");
//! ```

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod tree_traits;
pub mod util;

pub use application::{ApplicationError, ApplicationResult, ModelTreeTracker};
pub use config::{PathLayout, Settings};
pub use domain::{
    ChangeListener, ChangeType, ConfigPath, DeepNode, ListenerId, ModelResolver, Payload,
    SourceEvent, SourceListener, SourceNode, SourceRef, SourceTreeProvider, Subscription,
    SubscriptionId, TreeError, TreeResult,
};
pub use infrastructure::{InfraError, InfraResult, MemoryNode, MemoryTree, ModelLibrary};
pub use tree_traits::TreeNodeConvert;
