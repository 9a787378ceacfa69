//! State shared by every node of one derived tree.

use std::cell::RefCell;
use std::rc::Rc;

use generational_arena::{Arena, Index};
use tracing::trace;

use crate::domain::node::DeepNode;
use crate::domain::source::{ChangeListener, ChangeType, ModelResolver};

/// Handle returned when registering a [`ChangeListener`].
pub type ListenerId = Index;

/// Everything the nodes and proxies of one tracker need to reach upwards:
/// the resolver for nested models, the registered listeners and the root slot.
pub(crate) struct TreeContext {
    pub(crate) resolver: Rc<dyn ModelResolver>,
    pub(crate) attachments_key: String,
    listeners: RefCell<Arena<Rc<dyn ChangeListener>>>,
    root: RefCell<Option<DeepNode>>,
}

impl TreeContext {
    pub(crate) fn new(resolver: Rc<dyn ModelResolver>, attachments_key: String) -> Self {
        Self {
            resolver,
            attachments_key,
            listeners: RefCell::new(Arena::new()),
            root: RefCell::new(None),
        }
    }

    pub(crate) fn root(&self) -> Option<DeepNode> {
        self.root.borrow().clone()
    }

    pub(crate) fn set_root(&self, root: Option<DeepNode>) {
        *self.root.borrow_mut() = root;
    }

    pub(crate) fn take_root(&self) -> Option<DeepNode> {
        self.root.borrow_mut().take()
    }

    /// Registers a listener, returning its handle and the new listener count.
    pub(crate) fn add_listener(&self, listener: Rc<dyn ChangeListener>) -> (ListenerId, usize) {
        let mut listeners = self.listeners.borrow_mut();
        let id = listeners.insert(listener);
        (id, listeners.len())
    }

    /// Removes a listener, returning the remaining count if it was registered.
    pub(crate) fn remove_listener(&self, id: ListenerId) -> Option<usize> {
        let mut listeners = self.listeners.borrow_mut();
        listeners.remove(id).map(|_| listeners.len())
    }

    pub(crate) fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }

    /// Delivers a change to every listener registered at the time of the call.
    pub(crate) fn notify(&self, change: ChangeType, node: &DeepNode) {
        // Snapshot, listeners may (un)register while being notified
        let listeners: Vec<Rc<dyn ChangeListener>> =
            self.listeners.borrow().iter().map(|(_, l)| l.clone()).collect();
        trace!(?change, listeners = listeners.len(), "notify");
        for listener in listeners {
            match change {
                ChangeType::Added => listener.on_added(node),
                ChangeType::Removed => listener.on_removed(node),
                ChangeType::Changed => listener.on_changed(node),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::source::SourceTreeProvider;

    struct NoModels;

    impl ModelResolver for NoModels {
        fn resolve(&self, _model_name: &str) -> Option<Rc<dyn SourceTreeProvider>> {
            None
        }
    }

    struct Silent;

    impl ChangeListener for Silent {}

    #[test]
    fn given_removed_listener_when_slot_reused_then_stale_handle_is_rejected() {
        let context = TreeContext::new(Rc::new(NoModels), "attachments".to_string());
        let (stale, count) = context.add_listener(Rc::new(Silent));
        assert_eq!(count, 1);
        assert_eq!(context.remove_listener(stale), Some(0));

        let (fresh, _) = context.add_listener(Rc::new(Silent));

        assert_ne!(stale, fresh);
        assert_eq!(context.remove_listener(stale), None);
        assert_eq!(context.listener_count(), 1);
    }
}
