//! Translation of source tree events into derived tree mutations.

use std::cell::Cell;
use std::rc::{Rc, Weak};

use tracing::{debug, trace};

use crate::domain::context::TreeContext;
use crate::domain::error::{TreeError, TreeResult};
use crate::domain::node::{DeepNode, WeakNodeRef};
use crate::domain::position::Position;
use crate::domain::source::{
    ChangeType, SourceEvent, SourceListener, SourceRef, SourceTreeProvider, SubscriptionId,
};

/// The derived root a proxy governs.
#[derive(Debug)]
pub(crate) enum ProxyAnchor {
    /// Root slot of the tracker
    Tracker,
    /// Hidden child of a model node
    Model(WeakNodeRef),
}

/// Subscription to one source tree provider, mirroring it into a derived root.
pub(crate) struct TreeSyncProxy {
    provider: Rc<dyn SourceTreeProvider>,
    listener: Rc<ProxyListener>,
    subscription: Cell<Option<SubscriptionId>>,
}

impl TreeSyncProxy {
    pub(crate) fn new(
        provider: Rc<dyn SourceTreeProvider>,
        anchor: ProxyAnchor,
        context: Weak<TreeContext>,
    ) -> Self {
        let listener = Rc::new(ProxyListener {
            anchor,
            active: Cell::new(true),
            context,
            provider: Rc::downgrade(&provider),
        });
        Self {
            provider,
            listener,
            subscription: Cell::new(None),
        }
    }

    /// Subscribes and builds the derived root from the provider's current root.
    pub(crate) fn start(&self) -> TreeResult<()> {
        let subscription = self.provider.start_tracking(self.listener.clone());
        self.subscription.set(Some(subscription.id));
        debug!(
            anchor = ?self.listener.anchor,
            has_root = subscription.root.is_some(),
            "proxy started"
        );
        let Some(context) = self.listener.context.upgrade() else {
            return Ok(());
        };
        self.listener.replace_root(&context, subscription.root)?;
        Ok(())
    }

    /// Unsubscribes. A no-op if the proxy was never started.
    ///
    /// Events still on their way from a delivery in progress are dropped.
    pub(crate) fn stop(&self) {
        self.listener.active.set(false);
        if let Some(id) = self.subscription.take() {
            debug!(anchor = ?self.listener.anchor, "proxy stopped");
            self.provider.stop_tracking(id);
        }
    }
}

struct ProxyListener {
    anchor: ProxyAnchor,
    /// Cleared on stop
    active: Cell<bool>,
    context: Weak<TreeContext>,
    provider: Weak<dyn SourceTreeProvider>,
}

impl ProxyListener {
    fn root(&self, context: &TreeContext) -> TreeResult<Option<DeepNode>> {
        match &self.anchor {
            ProxyAnchor::Tracker => Ok(context.root()),
            ProxyAnchor::Model(owner) => Ok(owner_of(owner)?.model_root()),
        }
    }

    /// Wraps `source` as the new derived root, or clears the root for `None`.
    fn replace_root(
        &self,
        context: &Rc<TreeContext>,
        source: Option<SourceRef>,
    ) -> TreeResult<Option<DeepNode>> {
        match &self.anchor {
            ProxyAnchor::Tracker => {
                let root = source
                    .map(|s| DeepNode::create(&Rc::downgrade(context), Position::Default, None, s))
                    .transpose()?;
                context.set_root(root.clone());
                Ok(root)
            }
            ProxyAnchor::Model(owner) => {
                let owner = owner_of(owner)?;
                match source {
                    Some(source) => {
                        self.check_served_model(&owner)?;
                        owner.attach_model_root(source).map(Some)
                    }
                    None => {
                        owner.detach_model_root();
                        Ok(None)
                    }
                }
            }
        }
    }

    fn check_served_model(&self, owner: &DeepNode) -> TreeResult<()> {
        let served = self.provider.upgrade().and_then(|p| p.model_name());
        match (owner.model_name(), served) {
            (Some(expected), Some(actual)) if expected != actual => {
                Err(TreeError::ModelMismatch { expected, actual })
            }
            _ => Ok(()),
        }
    }
}

impl SourceListener for ProxyListener {
    fn on_event(&self, event: &SourceEvent) -> TreeResult<()> {
        if !self.active.get() {
            trace!(anchor = ?self.anchor, ?event, "proxy stopped, event ignored");
            return Ok(());
        }
        let Some(context) = self.context.upgrade() else {
            return Ok(());
        };
        trace!(anchor = ?self.anchor, ?event, "source event");

        let root = self.root(&context)?;
        match event {
            SourceEvent::Added { path, node } if path.is_empty() => {
                if root.is_some() {
                    return Err(TreeError::RootAlreadyExists);
                }
                if let Some(root) = self.replace_root(&context, Some(node.clone()))? {
                    context.notify(ChangeType::Added, &root);
                }
            }
            SourceEvent::Added { path, node } => {
                let root = root.ok_or(TreeError::RootMissing { event: event.name() })?;
                root.add_child_at_path(path, node.clone())?;
            }
            SourceEvent::Removed { path } => {
                let root = root.ok_or(TreeError::RootMissing { event: event.name() })?;
                if path.is_empty() {
                    root.on_removed()?;
                    self.replace_root(&context, None)?;
                    context.notify(ChangeType::Removed, &root);
                } else {
                    root.remove_child_at_path(path)?;
                }
            }
            SourceEvent::Changed { path } => {
                let root = root.ok_or(TreeError::RootMissing { event: event.name() })?;
                if path.is_empty() {
                    context.notify(ChangeType::Changed, &root);
                } else {
                    root.child_changed_at_path(path)?;
                }
            }
        }
        Ok(())
    }
}

fn owner_of(owner: &WeakNodeRef) -> TreeResult<DeepNode> {
    DeepNode::upgrade(owner).ok_or(TreeError::OwnerDropped)
}
