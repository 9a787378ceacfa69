//! In-memory source tree provider
//!
//! [`MemoryTree`] owns a tree of [`MemoryNode`]s and delivers every mutation
//! synchronously to its subscribers. Used to embed static configurations and
//! to drive the tracker in tests.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use generational_arena::Arena;
use tracing::{instrument, trace};

use crate::config::{PathLayout, Settings};
use crate::domain::{
    ConfigPath, Payload, SourceEvent, SourceListener, SourceNode, SourceRef, SourceTreeProvider,
    Subscription, SubscriptionId, TreeError, TreeResult, DEFAULT_ATTACHMENTS_KEY,
};
use crate::infrastructure::error::{InfraError, InfraResult};

#[derive(Debug, Clone)]
struct PathStyle {
    key: String,
    layout: PathLayout,
}

impl Default for PathStyle {
    fn default() -> Self {
        Self {
            key: DEFAULT_ATTACHMENTS_KEY.to_string(),
            layout: PathLayout::Keyed,
        }
    }
}

/// Configuration node held by a [`MemoryTree`].
#[derive(Debug)]
pub struct MemoryNode {
    type_id: String,
    model_name: Option<String>,
    payload: RefCell<Payload>,
    children: RefCell<Vec<Rc<MemoryNode>>>,
    parent: RefCell<Weak<MemoryNode>>,
    style: RefCell<PathStyle>,
    /// Index and path captured on removal
    detached: RefCell<Option<(usize, ConfigPath)>>,
}

impl MemoryNode {
    pub fn new(type_id: impl Into<String>) -> Self {
        Self {
            type_id: type_id.into(),
            model_name: None,
            payload: RefCell::new(Payload::new()),
            children: RefCell::new(Vec::new()),
            parent: RefCell::new(Weak::new()),
            style: RefCell::new(PathStyle::default()),
            detached: RefCell::new(None),
        }
    }

    /// Node of type `model` referencing the model `name`.
    pub fn model(name: impl Into<String>) -> Self {
        let mut node = Self::new("model");
        node.model_name = Some(name.into());
        node
    }

    pub fn with_payload(self, payload: Payload) -> Self {
        *self.payload.borrow_mut() = payload;
        self
    }

    pub fn with_value(self, key: impl Into<String>, value: impl Into<toml::Value>) -> Self {
        self.payload.borrow_mut().insert(key.into(), value.into());
        self
    }

    pub fn with_child(self, child: MemoryNode) -> Self {
        self.children.borrow_mut().push(Rc::new(child));
        self
    }

    /// Parse a node document.
    ///
    /// `type` is required, `model` marks a model node, the array of tables under
    /// `attachments_key` holds the children and all other keys form the payload.
    pub fn from_toml(content: &str, attachments_key: &str) -> InfraResult<Self> {
        let table: toml::Table = content.parse().map_err(|e: toml::de::Error| InfraError::Parse {
            message: e.to_string(),
        })?;
        Self::from_table(table, attachments_key, &ConfigPath::root())
    }

    fn from_table(mut table: toml::Table, key: &str, at: &ConfigPath) -> InfraResult<Self> {
        let invalid = |message: &str| InfraError::InvalidNode {
            at: at.to_string(),
            message: message.to_string(),
        };

        let type_id = match table.remove("type") {
            Some(toml::Value::String(s)) => s,
            Some(_) => return Err(invalid("'type' must be a string")),
            None => return Err(invalid("missing 'type'")),
        };
        let model_name = match table.remove("model") {
            Some(toml::Value::String(s)) => Some(s),
            Some(_) => return Err(invalid("'model' must be a string")),
            None => None,
        };
        let children = match table.remove(key) {
            Some(toml::Value::Array(items)) => items
                .into_iter()
                .enumerate()
                .map(|(i, item)| match item {
                    toml::Value::Table(t) => Self::from_table(t, key, &at.child(key).list_child(i)),
                    _ => Err(invalid("children must be tables")),
                })
                .collect::<InfraResult<Vec<_>>>()?,
            Some(_) => return Err(invalid("children must be an array of tables")),
            None => Vec::new(),
        };

        let mut node = Self::new(type_id).with_payload(table);
        node.model_name = model_name;
        node.children = RefCell::new(children.into_iter().map(Rc::new).collect());
        Ok(node)
    }

    pub fn is_detached(&self) -> bool {
        self.detached.borrow().is_some()
    }

    pub fn child_nodes(&self) -> Vec<Rc<MemoryNode>> {
        self.children.borrow().clone()
    }

    /// Links the subtree below this node and applies the tree's path style.
    fn adopt(self: &Rc<Self>, style: &PathStyle) {
        *self.style.borrow_mut() = style.clone();
        for child in self.children.borrow().iter() {
            *child.parent.borrow_mut() = Rc::downgrade(self);
            child.adopt(style);
        }
    }

    /// Captures the current index and path of the whole subtree.
    fn freeze(&self) {
        let position = (self.child_index(), self.path());
        *self.detached.borrow_mut() = Some(position);
        for child in self.children.borrow().iter() {
            child.freeze();
        }
    }
}

impl SourceNode for MemoryNode {
    fn type_id(&self) -> String {
        self.type_id.clone()
    }

    fn payload(&self) -> Payload {
        self.payload.borrow().clone()
    }

    fn model_name(&self) -> Option<String> {
        self.model_name.clone()
    }

    fn children(&self) -> Vec<SourceRef> {
        self.children
            .borrow()
            .iter()
            .map(|c| c.clone() as SourceRef)
            .collect()
    }

    fn child_index(&self) -> usize {
        if let Some((index, _)) = &*self.detached.borrow() {
            return *index;
        }
        let Some(parent) = self.parent.borrow().upgrade() else {
            return 0;
        };
        // The parent link is cleared whenever a node leaves its parent's children
        let children = parent.children.borrow();
        children
            .iter()
            .position(|c| std::ptr::eq(c.as_ref(), self))
            .expect("attached node is listed by its parent")
    }

    fn path(&self) -> ConfigPath {
        if let Some((_, path)) = &*self.detached.borrow() {
            return path.clone();
        }
        let Some(parent) = self.parent.borrow().upgrade() else {
            return ConfigPath::root();
        };
        let style = self.style.borrow();
        let base = parent.path().child(style.key.clone());
        match style.layout {
            PathLayout::Keyed => base.child(self.child_index().to_string()),
            PathLayout::List => base.list_child(self.child_index()),
        }
    }
}

/// Source tree provider backed by memory.
///
/// Mutations are applied first and then delivered to a snapshot of the
/// subscribers. The first fault aborts delivery and is returned.
pub struct MemoryTree {
    style: PathStyle,
    model_name: Option<String>,
    root: RefCell<Option<Rc<MemoryNode>>>,
    subscribers: RefCell<Arena<Rc<dyn SourceListener>>>,
}

impl Default for MemoryTree {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTree {
    pub fn new() -> Self {
        Self::with_settings(&Settings::default())
    }

    pub fn with_settings(settings: &Settings) -> Self {
        Self {
            style: PathStyle {
                key: settings.attachments_key.clone(),
                layout: settings.path_layout,
            },
            model_name: None,
            root: RefCell::new(None),
            subscribers: RefCell::new(Arena::new()),
        }
    }

    /// Parse a whole tree, see [`MemoryNode::from_toml`].
    pub fn from_toml(content: &str, settings: &Settings) -> InfraResult<Self> {
        let root = MemoryNode::from_toml(content, &settings.attachments_key)?;
        Ok(Self::with_settings(settings).with_root(root))
    }

    /// Sets the initial root without notifying anyone.
    pub fn with_root(self, root: MemoryNode) -> Self {
        let root = Rc::new(root);
        root.adopt(&self.style);
        *self.root.borrow_mut() = Some(root);
        self
    }

    /// Declares the model whose configuration this tree holds.
    pub fn serving(mut self, model_name: impl Into<String>) -> Self {
        self.model_name = Some(model_name.into());
        self
    }

    pub fn root(&self) -> Option<Rc<MemoryNode>> {
        self.root.borrow().clone()
    }

    pub fn node_at(&self, path: &[usize]) -> Option<Rc<MemoryNode>> {
        self.resolve(path).ok()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.borrow().len()
    }

    fn resolve(&self, path: &[usize]) -> TreeResult<Rc<MemoryNode>> {
        let mut node = self.root().ok_or(TreeError::RootMissing { event: "lookup" })?;
        for &index in path {
            let next = {
                let children = node.children.borrow();
                children
                    .get(index)
                    .cloned()
                    .ok_or(TreeError::IndexOutOfBounds {
                        index,
                        len: children.len(),
                    })?
            };
            node = next;
        }
        Ok(node)
    }

    #[instrument(level = "trace", skip_all)]
    pub fn set_root(&self, root: MemoryNode) -> TreeResult<Rc<MemoryNode>> {
        if self.root.borrow().is_some() {
            return Err(TreeError::RootAlreadyExists);
        }
        let root = Rc::new(root);
        root.adopt(&self.style);
        *self.root.borrow_mut() = Some(root.clone());
        self.emit(&SourceEvent::Added {
            path: Vec::new(),
            node: root.clone(),
        })?;
        Ok(root)
    }

    #[instrument(level = "trace", skip_all)]
    pub fn clear_root(&self) -> TreeResult<Rc<MemoryNode>> {
        let root = self
            .root
            .borrow_mut()
            .take()
            .ok_or(TreeError::RootMissing { event: "removed" })?;
        root.freeze();
        self.emit(&SourceEvent::Removed { path: Vec::new() })?;
        Ok(root)
    }

    /// Inserts `node` as child `index` of the node at `parent_path`.
    #[instrument(level = "trace", skip(self, node))]
    pub fn add_child(
        &self,
        parent_path: &[usize],
        index: usize,
        node: MemoryNode,
    ) -> TreeResult<Rc<MemoryNode>> {
        let parent = self.resolve(parent_path)?;
        let len = parent.children.borrow().len();
        if index > len {
            return Err(TreeError::IndexOutOfBounds { index, len });
        }

        let node = Rc::new(node);
        *node.parent.borrow_mut() = Rc::downgrade(&parent);
        node.adopt(&self.style);
        parent.children.borrow_mut().insert(index, node.clone());

        let mut path = parent_path.to_vec();
        path.push(index);
        self.emit(&SourceEvent::Added {
            path,
            node: node.clone(),
        })?;
        Ok(node)
    }

    #[instrument(level = "trace", skip(self))]
    pub fn remove_child(&self, path: &[usize]) -> TreeResult<Rc<MemoryNode>> {
        let (&index, parent_path) = path.split_last().ok_or(TreeError::EmptyPath)?;
        let parent = self.resolve(parent_path)?;
        let node = {
            let children = parent.children.borrow();
            children
                .get(index)
                .cloned()
                .ok_or(TreeError::IndexOutOfBounds {
                    index,
                    len: children.len(),
                })?
        };

        node.freeze();
        parent.children.borrow_mut().remove(index);
        *node.parent.borrow_mut() = Weak::new();
        self.emit(&SourceEvent::Removed {
            path: path.to_vec(),
        })?;
        Ok(node)
    }

    #[instrument(level = "trace", skip(self, payload))]
    pub fn set_payload(&self, path: &[usize], payload: Payload) -> TreeResult<()> {
        let node = self.resolve(path)?;
        *node.payload.borrow_mut() = payload;
        self.emit(&SourceEvent::Changed {
            path: path.to_vec(),
        })
    }

    /// Delivers an event to all current subscribers as is.
    pub fn emit(&self, event: &SourceEvent) -> TreeResult<()> {
        let subscribers: Vec<Rc<dyn SourceListener>> = self
            .subscribers
            .borrow()
            .iter()
            .map(|(_, s)| s.clone())
            .collect();
        trace!(?event, subscribers = subscribers.len(), "emit");
        for subscriber in subscribers {
            subscriber.on_event(event)?;
        }
        Ok(())
    }
}

impl SourceTreeProvider for MemoryTree {
    fn start_tracking(&self, listener: Rc<dyn SourceListener>) -> Subscription {
        let id: SubscriptionId = self.subscribers.borrow_mut().insert(listener);
        Subscription {
            id,
            root: self.root().map(|r| r as SourceRef),
        }
    }

    fn stop_tracking(&self, subscription: SubscriptionId) {
        self.subscribers.borrow_mut().remove(subscription);
    }

    fn model_name(&self) -> Option<String> {
        self.model_name.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> MemoryTree {
        MemoryTree::new().with_root(
            MemoryNode::new("group")
                .with_child(MemoryNode::new("seat"))
                .with_child(MemoryNode::new("group").with_child(MemoryNode::new("item"))),
        )
    }

    #[test]
    fn given_nested_nodes_when_querying_positions_then_follow_keyed_layout() {
        let tree = sample();
        let item = tree.node_at(&[1, 0]).unwrap();
        assert_eq!(item.child_index(), 0);
        assert_eq!(item.path().to_string(), "/attachments/1/attachments/0");
        assert_eq!(tree.root().unwrap().path(), ConfigPath::root());
    }

    #[test]
    fn given_list_layout_when_querying_path_then_uses_list_indices() {
        let settings = Settings {
            path_layout: PathLayout::List,
            ..Settings::default()
        };
        let tree = MemoryTree::with_settings(&settings)
            .with_root(MemoryNode::new("group").with_child(MemoryNode::new("seat")));
        let seat = tree.node_at(&[0]).unwrap();
        assert_eq!(seat.path().to_string(), "/attachments[0]");
    }

    #[test]
    fn given_removed_node_when_querying_then_keeps_position_at_removal() {
        let tree = sample();
        let group = tree.remove_child(&[1]).unwrap();
        assert!(group.is_detached());
        assert_eq!(group.child_index(), 1);
        let item = group.child_nodes()[0].clone();
        assert_eq!(item.path().to_string(), "/attachments/1/attachments/0");

        tree.add_child(&[], 0, MemoryNode::new("seat")).unwrap();
        assert_eq!(group.path().to_string(), "/attachments/1");
    }

    #[test]
    fn given_earlier_sibling_removed_when_querying_then_index_shifts() {
        let tree = MemoryTree::new().with_root(
            MemoryNode::new("group")
                .with_child(MemoryNode::new("a"))
                .with_child(MemoryNode::new("b"))
                .with_child(MemoryNode::new("c")),
        );
        let c = tree.node_at(&[2]).unwrap();

        tree.remove_child(&[0]).unwrap();

        assert_eq!(c.child_index(), 1);
        assert_eq!(c.path().to_string(), "/attachments/1");
    }

    #[test]
    fn given_toml_document_when_parsing_then_builds_tree() {
        let content = r#"
type = "group"
name = "train"

[[attachments]]
type = "seat"

[[attachments]]
type = "model"
model = "wheel"
scale = 2
"#;
        let tree = MemoryTree::from_toml(content, &Settings::default()).unwrap();
        let root = tree.root().unwrap();
        assert_eq!(root.type_id(), "group");
        assert_eq!(root.payload().get("name").and_then(|v| v.as_str()), Some("train"));
        assert!(!root.payload().contains_key("attachments"));

        let model = tree.node_at(&[1]).unwrap();
        assert_eq!(model.model_name().as_deref(), Some("wheel"));
        assert_eq!(model.payload().get("scale").and_then(|v| v.as_integer()), Some(2));
    }

    #[test]
    fn given_node_without_type_when_parsing_then_reports_location() {
        let content = "type = \"group\"\n[[attachments]]\nname = \"x\"\n";
        let err = MemoryNode::from_toml(content, "attachments").unwrap_err();
        assert!(
            matches!(&err, InfraError::InvalidNode { at, .. } if at == "/attachments[0]"),
            "unexpected error: {err}"
        );
    }

    #[test]
    fn given_invalid_paths_when_mutating_then_errors() {
        let tree = sample();
        assert_eq!(
            tree.add_child(&[0], 1, MemoryNode::new("x")).unwrap_err(),
            TreeError::IndexOutOfBounds { index: 1, len: 0 }
        );
        assert_eq!(tree.remove_child(&[]).unwrap_err(), TreeError::EmptyPath);
        assert!(tree.set_root(MemoryNode::new("group")).is_err());
    }
}
