//! Boundary traits towards the source tree and the change listeners.
//!
//! The source side is owned by the caller: a [`SourceTreeProvider`] feeds live
//! [`SourceNode`]s and [`SourceEvent`]s, a [`ModelResolver`] maps model names to
//! further providers. The derived side is observed through [`ChangeListener`].

use std::rc::Rc;

use generational_arena::Index;

use crate::domain::error::TreeResult;
use crate::domain::node::DeepNode;
use crate::domain::path::ConfigPath;

/// Opaque key/value payload stored in a configuration node. Never interpreted here.
pub type Payload = toml::Table;

/// Shared handle to a node owned by a source tree provider.
pub type SourceRef = Rc<dyn SourceNode>;

/// Handle identifying one `start_tracking` registration.
pub type SubscriptionId = Index;

/// Read access to a configuration node of a source tree.
pub trait SourceNode {
    fn type_id(&self) -> String;

    fn payload(&self) -> Payload;

    /// Name of the referenced model, `Some` only for model nodes.
    fn model_name(&self) -> Option<String>;

    fn children(&self) -> Vec<SourceRef>;

    /// Index of this node within its parent, as reported by the provider.
    fn child_index(&self) -> usize;

    /// Absolute path from the provider's own root.
    fn path(&self) -> ConfigPath;
}

/// Structural change in a source tree.
///
/// `path` holds zero-based child indices from the provider's root. An empty
/// path addresses the root itself.
#[derive(Clone)]
pub enum SourceEvent {
    Added { path: Vec<usize>, node: SourceRef },
    Removed { path: Vec<usize> },
    Changed { path: Vec<usize> },
}

impl SourceEvent {
    pub fn path(&self) -> &[usize] {
        match self {
            SourceEvent::Added { path, .. }
            | SourceEvent::Removed { path }
            | SourceEvent::Changed { path } => path,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SourceEvent::Added { .. } => "added",
            SourceEvent::Removed { .. } => "removed",
            SourceEvent::Changed { .. } => "changed",
        }
    }
}

impl std::fmt::Debug for SourceEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{:?}", self.name(), self.path())
    }
}

/// Receiver of source tree events.
///
/// Faults are handed back to the provider that delivered the event.
pub trait SourceListener {
    fn on_event(&self, event: &SourceEvent) -> TreeResult<()>;
}

/// Result of subscribing to a source tree provider.
pub struct Subscription {
    pub id: SubscriptionId,
    /// Root that exists at the time of subscribing, if any
    pub root: Option<SourceRef>,
}

/// Live feed of one configuration tree.
pub trait SourceTreeProvider {
    /// Registers a listener and synchronously returns the current root.
    fn start_tracking(&self, listener: Rc<dyn SourceListener>) -> Subscription;

    fn stop_tracking(&self, subscription: SubscriptionId);

    /// Name of the model whose configuration this provider serves, if known.
    fn model_name(&self) -> Option<String> {
        None
    }
}

/// Looks up the configuration tree of a named model.
pub trait ModelResolver {
    /// Returns `None` if no model by this name exists.
    fn resolve(&self, model_name: &str) -> Option<Rc<dyn SourceTreeProvider>>;
}

/// Kind of change reported to a [`ChangeListener`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeType {
    Added,
    Removed,
    Changed,
}

/// Observer of the derived tree.
///
/// Called synchronously, inside the call that delivered the source event.
pub trait ChangeListener {
    fn on_added(&self, _node: &DeepNode) {}

    fn on_removed(&self, _node: &DeepNode) {}

    fn on_changed(&self, _node: &DeepNode) {}
}
