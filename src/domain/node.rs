//! Derived tree nodes.
//!
//! A [`DeepNode`] wraps exactly one source node and owns its derived children.
//! Model nodes additionally inline the configuration of the model they
//! reference as one hidden trailing child, kept in sync by a nested
//! [`TreeSyncProxy`].

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::{debug, instrument};

use crate::domain::context::TreeContext;
use crate::domain::error::{TreeError, TreeResult};
use crate::domain::path::ConfigPath;
use crate::domain::position::Position;
use crate::domain::proxy::{ProxyAnchor, TreeSyncProxy};
use crate::domain::source::{ChangeType, Payload, SourceRef};
use crate::domain::DEFAULT_ATTACHMENTS_KEY;

pub(crate) type NodeRef = Rc<RefCell<NodeInner>>;
pub(crate) type WeakNodeRef = Weak<RefCell<NodeInner>>;

/// Node of the derived tree. Cheap to clone, clones share the node.
#[derive(Clone)]
pub struct DeepNode(NodeRef);

pub(crate) struct NodeInner {
    source: SourceRef,
    /// Lookup only, the parent owns this node through its children
    parent: Option<WeakNodeRef>,
    children: Vec<DeepNode>,
    position: Position,
    kind: NodeKind,
    context: Weak<TreeContext>,
}

enum NodeKind {
    Plain,
    Model(ModelState),
}

struct ModelState {
    name: String,
    /// Inlined model root, always the last child while present
    hidden: Option<DeepNode>,
    proxy: Option<TreeSyncProxy>,
}

impl NodeInner {
    fn hidden(&self) -> Option<&DeepNode> {
        match &self.kind {
            NodeKind::Model(state) => state.hidden.as_ref(),
            NodeKind::Plain => None,
        }
    }

    /// Number of children that mirror source children.
    fn literal_len(&self) -> usize {
        self.children.len() - usize::from(self.hidden().is_some())
    }
}

impl DeepNode {
    /// Wraps a source node, recursively wrapping its children.
    ///
    /// Model source nodes are expanded unless the same model name is already
    /// used by an ancestor or the resolver does not know the model.
    pub(crate) fn create(
        context: &Weak<TreeContext>,
        position: Position,
        parent: Option<&DeepNode>,
        source: SourceRef,
    ) -> TreeResult<DeepNode> {
        let model_name = source.model_name();
        let child_position = position.for_children()?;
        let source_children = source.children();

        let kind = match &model_name {
            Some(name) => NodeKind::Model(ModelState {
                name: name.clone(),
                hidden: None,
                proxy: None,
            }),
            None => NodeKind::Plain,
        };
        let node = DeepNode(Rc::new(RefCell::new(NodeInner {
            source,
            parent: parent.map(DeepNode::downgrade),
            children: Vec::with_capacity(source_children.len() + 1),
            position,
            kind,
            context: context.clone(),
        })));

        let built = node.build(context, child_position, source_children, model_name);
        if let Err(e) = built {
            node.stop_subscriptions();
            return Err(e);
        }
        Ok(node)
    }

    fn build(
        &self,
        context: &Weak<TreeContext>,
        child_position: Position,
        source_children: Vec<SourceRef>,
        model_name: Option<String>,
    ) -> TreeResult<()> {
        for child_source in source_children {
            let child = DeepNode::create(context, child_position.clone(), Some(self), child_source)?;
            self.0.borrow_mut().children.push(child);
        }
        match model_name {
            Some(name) => self.expand_model(&name),
            None => Ok(()),
        }
    }

    fn expand_model(&self, name: &str) -> TreeResult<()> {
        if let Some(parent) = self.parent() {
            if parent.is_model_used(name) {
                debug!(model = name, "model already used by an ancestor, not inlined");
                return Ok(());
            }
        }
        let Some(context) = self.context() else {
            return Ok(());
        };
        let Some(provider) = context.resolver.resolve(name) else {
            debug!(model = name, "model not found, left unexpanded");
            return Ok(());
        };

        let proxy = TreeSyncProxy::new(
            provider,
            ProxyAnchor::Model(self.downgrade()),
            Rc::downgrade(&context),
        );
        if let Err(e) = proxy.start() {
            proxy.stop();
            return Err(e);
        }
        if let NodeKind::Model(state) = &mut self.0.borrow_mut().kind {
            state.proxy = Some(proxy);
        }
        Ok(())
    }

    pub(crate) fn upgrade(weak: &WeakNodeRef) -> Option<DeepNode> {
        weak.upgrade().map(DeepNode)
    }

    pub(crate) fn downgrade(&self) -> WeakNodeRef {
        Rc::downgrade(&self.0)
    }

    fn context(&self) -> Option<Rc<TreeContext>> {
        self.0.borrow().context.upgrade()
    }

    fn notify(&self, change: ChangeType, node: &DeepNode) {
        if let Some(context) = self.context() {
            context.notify(change, node);
        }
    }

    pub fn ptr_eq(&self, other: &DeepNode) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn parent(&self) -> Option<DeepNode> {
        self.0.borrow().parent.as_ref().and_then(DeepNode::upgrade)
    }

    /// Snapshot of the children, the hidden model child included.
    pub fn children(&self) -> Vec<DeepNode> {
        self.0.borrow().children.clone()
    }

    pub fn child(&self, index: usize) -> Option<DeepNode> {
        self.0.borrow().children.get(index).cloned()
    }

    pub fn child_count(&self) -> usize {
        self.0.borrow().children.len()
    }

    pub fn source(&self) -> SourceRef {
        self.0.borrow().source.clone()
    }

    pub fn type_id(&self) -> String {
        self.0.borrow().source.type_id()
    }

    pub fn payload(&self) -> Payload {
        self.0.borrow().source.payload()
    }

    pub fn child_index(&self) -> TreeResult<usize> {
        let (position, source) = self.position_and_source();
        position.child_index(source.as_ref())
    }

    pub fn path(&self) -> TreeResult<ConfigPath> {
        let (position, source) = self.position_and_source();
        position.path(source.as_ref())
    }

    fn position_and_source(&self) -> (Position, SourceRef) {
        let inner = self.0.borrow();
        (inner.position.clone(), inner.source.clone())
    }

    /// True once the node has been detached from the live tree.
    pub fn is_removed(&self) -> bool {
        self.0.borrow().position.is_frozen()
    }

    pub fn is_model(&self) -> bool {
        matches!(self.0.borrow().kind, NodeKind::Model(_))
    }

    pub fn model_name(&self) -> Option<String> {
        match &self.0.borrow().kind {
            NodeKind::Model(state) => Some(state.name.clone()),
            NodeKind::Plain => None,
        }
    }

    /// The hidden child holding the inlined model configuration.
    pub fn model_child(&self) -> Option<DeepNode> {
        self.0.borrow().hidden().cloned()
    }

    /// Whether this node or one of its ancestors is a model node named `name`.
    pub fn is_model_used(&self, name: &str) -> bool {
        let mut current = Some(self.clone());
        while let Some(node) = current {
            if node.model_name().as_deref() == Some(name) {
                return true;
            }
            current = node.parent();
        }
        false
    }

    /// Index of the hidden model child.
    ///
    /// Fails if the model is not inlined, or no longer is after removal.
    pub fn model_child_index(&self) -> TreeResult<usize> {
        let inner = self.0.borrow();
        match &inner.kind {
            NodeKind::Model(state) if state.hidden.is_some() => Ok(inner.children.len() - 1),
            NodeKind::Model(state) => Err(TreeError::NotExpanded {
                model: state.name.clone(),
            }),
            NodeKind::Plain => Err(TreeError::NotExpanded {
                model: inner.source.type_id(),
            }),
        }
    }

    /// Absolute path of the hidden model child.
    ///
    /// Without literal children the hidden child sits at `<path>/attachments/0`.
    /// Otherwise it follows the addressing of the first literal child, keyed
    /// or list, at the hidden child's index.
    pub fn model_path(&self) -> TreeResult<ConfigPath> {
        let index = self.model_child_index()?;
        if index == 0 {
            let key = self
                .context()
                .map(|c| c.attachments_key.clone())
                .unwrap_or_else(|| DEFAULT_ATTACHMENTS_KEY.to_string());
            return Ok(self.path()?.child(key).child("0"));
        }

        let first = self.0.borrow().children[0].clone();
        let sibling = first.path()?;
        if sibling.is_list_element() {
            Ok(sibling.parent().list_child(index))
        } else {
            Ok(sibling.parent().child(index.to_string()))
        }
    }

    /// Inserts a child at the slot addressed by `path`, relative to this node.
    #[instrument(level = "trace", skip(self, source))]
    pub fn add_child_at_path(&self, path: &[usize], source: SourceRef) -> TreeResult<DeepNode> {
        let (parent, index) = self.navigate(path)?;
        parent.add_child(index, source)
    }

    /// Removes the child addressed by `path`, relative to this node.
    #[instrument(level = "trace", skip(self))]
    pub fn remove_child_at_path(&self, path: &[usize]) -> TreeResult<DeepNode> {
        let (parent, index) = self.navigate(path)?;
        parent.remove_child(index)
    }

    /// Reports a payload change of the child addressed by `path`.
    #[instrument(level = "trace", skip(self))]
    pub fn child_changed_at_path(&self, path: &[usize]) -> TreeResult<DeepNode> {
        let (parent, index) = self.navigate(path)?;
        parent.child_changed(index)
    }

    /// Walks all but the last index, returning the parent and the last index.
    fn navigate(&self, path: &[usize]) -> TreeResult<(DeepNode, usize)> {
        let (last, steps) = path.split_last().ok_or(TreeError::EmptyPath)?;
        let mut parent = self.clone();
        for &index in steps {
            let next = {
                let inner = parent.0.borrow();
                if index >= inner.literal_len() {
                    return Err(TreeError::IndexOutOfBounds {
                        index,
                        len: inner.children.len(),
                    });
                }
                inner.children[index].clone()
            };
            parent = next;
        }
        Ok((parent, *last))
    }

    fn add_child(&self, index: usize, source: SourceRef) -> TreeResult<DeepNode> {
        let (position, context) = {
            let inner = self.0.borrow();
            // Inserting past the hidden model child is not allowed
            if index > inner.literal_len() {
                return Err(TreeError::IndexOutOfBounds {
                    index,
                    len: inner.children.len(),
                });
            }
            (inner.position.for_children()?, inner.context.clone())
        };

        let child = DeepNode::create(&context, position, Some(self), source)?;
        self.0.borrow_mut().children.insert(index, child.clone());
        self.notify(ChangeType::Added, &child);
        Ok(child)
    }

    fn remove_child(&self, index: usize) -> TreeResult<DeepNode> {
        let child = self.literal_child(index)?;
        child.on_removed()?;
        self.0.borrow_mut().children.remove(index);
        self.notify(ChangeType::Removed, &child);
        Ok(child)
    }

    fn child_changed(&self, index: usize) -> TreeResult<DeepNode> {
        let child = self.literal_child(index)?;
        self.notify(ChangeType::Changed, &child);
        Ok(child)
    }

    fn literal_child(&self, index: usize) -> TreeResult<DeepNode> {
        let inner = self.0.borrow();
        if index >= inner.literal_len() {
            return Err(TreeError::IndexOutOfBounds {
                index,
                len: inner.children.len(),
            });
        }
        Ok(inner.children[index].clone())
    }

    /// Freezes the position of this node and all descendants, then stops
    /// tracking the model configuration. The hidden child stays in place as
    /// part of the frozen snapshot.
    pub(crate) fn on_removed(&self) -> TreeResult<()> {
        let (position, source) = self.position_and_source();
        let frozen = position.removed(source.as_ref())?;
        self.0.borrow_mut().position = frozen;

        for child in self.children() {
            child.on_removed()?;
        }

        if let Some(proxy) = self.take_proxy() {
            proxy.stop();
            if let NodeKind::Model(state) = &mut self.0.borrow_mut().kind {
                state.hidden = None;
            }
        }
        Ok(())
    }

    fn take_proxy(&self) -> Option<TreeSyncProxy> {
        match &mut self.0.borrow_mut().kind {
            NodeKind::Model(state) => state.proxy.take(),
            NodeKind::Plain => None,
        }
    }

    /// Unsubscribes every nested model proxy below and including this node,
    /// without touching positions. Used when building a subtree failed.
    pub(crate) fn stop_subscriptions(&self) {
        if let Some(proxy) = self.take_proxy() {
            proxy.stop();
        }
        for child in self.children() {
            child.stop_subscriptions();
        }
    }

    pub(crate) fn model_root(&self) -> Option<DeepNode> {
        self.model_child()
    }

    /// Wraps `source` as the hidden model child and appends it.
    pub(crate) fn attach_model_root(&self, source: SourceRef) -> TreeResult<DeepNode> {
        let context = self.0.borrow().context.clone();
        let hidden = DeepNode::create(
            &context,
            Position::ModelRoot(self.downgrade()),
            Some(self),
            source,
        )?;

        let mut inner = self.0.borrow_mut();
        inner.children.push(hidden.clone());
        if let NodeKind::Model(state) = &mut inner.kind {
            state.hidden = Some(hidden.clone());
        }
        Ok(hidden)
    }

    /// Drops the hidden model child from the children.
    pub(crate) fn detach_model_root(&self) {
        let mut inner = self.0.borrow_mut();
        let NodeInner { children, kind, .. } = &mut *inner;
        if let NodeKind::Model(state) = kind {
            if let Some(hidden) = state.hidden.take() {
                if children.last().is_some_and(|last| last.ptr_eq(&hidden)) {
                    children.pop();
                }
            }
        }
    }
}

impl fmt::Debug for DeepNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.0.borrow();
        let mut s = f.debug_struct("DeepNode");
        s.field("type_id", &inner.source.type_id());
        if let NodeKind::Model(state) = &inner.kind {
            s.field("model", &state.name)
                .field("expanded", &state.hidden.is_some());
        }
        s.field("children", &inner.children.len())
            .field("removed", &inner.position.is_frozen())
            .finish()
    }
}
