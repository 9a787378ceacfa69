//! Position strategies: how a derived node answers child index and path queries.

use tracing::instrument;

use crate::domain::error::{TreeError, TreeResult};
use crate::domain::node::{DeepNode, WeakNodeRef};
use crate::domain::path::ConfigPath;
use crate::domain::source::SourceNode;

/// Rule for computing the child index and absolute path of a derived node.
///
/// Live positions are recomputed on every query, ancestors can move a node
/// without touching the node itself.
#[derive(Debug, Clone)]
pub(crate) enum Position {
    /// Passes the source node's own index and path through.
    Default,
    /// Root of an inlined model subtree: last slot of the owning model node.
    ModelRoot(WeakNodeRef),
    /// Below an inlined model root: source-local position offset by the
    /// owning model node's model path.
    ModelChild(WeakNodeRef),
    /// Values captured when the node was removed.
    Frozen { index: usize, path: ConfigPath },
}

impl Position {
    pub(crate) fn child_index(&self, source: &dyn SourceNode) -> TreeResult<usize> {
        match self {
            Position::Default | Position::ModelChild(_) => Ok(source.child_index()),
            Position::ModelRoot(owner) => owner_of(owner)?.model_child_index(),
            Position::Frozen { index, .. } => Ok(*index),
        }
    }

    pub(crate) fn path(&self, source: &dyn SourceNode) -> TreeResult<ConfigPath> {
        match self {
            Position::Default => Ok(source.path()),
            Position::ModelRoot(owner) => owner_of(owner)?.model_path(),
            Position::ModelChild(owner) => {
                let base = owner_of(owner)?.model_path()?;
                Ok(base.join(&source.path()))
            }
            Position::Frozen { path, .. } => Ok(path.clone()),
        }
    }

    /// Position to hand to the children of a node using this position.
    pub(crate) fn for_children(&self) -> TreeResult<Position> {
        match self {
            Position::Default => Ok(Position::Default),
            Position::ModelRoot(owner) | Position::ModelChild(owner) => {
                Ok(Position::ModelChild(owner.clone()))
            }
            Position::Frozen { .. } => Err(TreeError::DetachedNode),
        }
    }

    /// Fixed position holding the current values.
    #[instrument(level = "trace", skip_all)]
    pub(crate) fn removed(&self, source: &dyn SourceNode) -> TreeResult<Position> {
        if let Position::Frozen { .. } = self {
            return Ok(self.clone());
        }
        Ok(Position::Frozen {
            index: self.child_index(source)?,
            path: self.path(source)?,
        })
    }

    pub(crate) fn is_frozen(&self) -> bool {
        matches!(self, Position::Frozen { .. })
    }
}

fn owner_of(owner: &WeakNodeRef) -> TreeResult<DeepNode> {
    DeepNode::upgrade(owner).ok_or(TreeError::OwnerDropped)
}
