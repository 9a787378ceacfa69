//! Domain layer: the derived tree and its synchronization
//!
//! This layer is independent of external concerns (no I/O, no config loading).

pub(crate) mod context;
pub mod error;
pub mod node;
pub mod path;
pub(crate) mod position;
pub(crate) mod proxy;
pub mod source;

/// Key under which the hidden model child is addressed when a model node
/// has no literal children.
pub const DEFAULT_ATTACHMENTS_KEY: &str = "attachments";

pub use context::ListenerId;
pub use error::{TreeError, TreeResult};
pub use node::DeepNode;
pub use path::{ConfigPath, PathParseError, Segment};
pub use source::{
    ChangeListener, ChangeType, ModelResolver, Payload, SourceEvent, SourceListener, SourceNode,
    SourceRef, SourceTreeProvider, Subscription, SubscriptionId,
};
