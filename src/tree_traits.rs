//! Rendering of derived trees for logs and diagnostics.

use termtree::Tree;
use tracing::instrument;

use crate::application::ModelTreeTracker;
use crate::domain::DeepNode;

pub trait TreeNodeConvert {
    fn to_tree_string(&self) -> Tree<String>;
}

impl TreeNodeConvert for DeepNode {
    #[instrument(level = "trace")]
    fn to_tree_string(&self) -> Tree<String> {
        render(self, false)
    }
}

fn render(node: &DeepNode, inlined: bool) -> Tree<String> {
    let path = node
        .path()
        .map(|p| p.to_string())
        .unwrap_or_else(|e| format!("<{e}>"));
    let mut label = format!("{} {}", node.type_id(), path);
    if let Some(model) = node.model_name() {
        match node.model_child() {
            Some(_) => label.push_str(&format!(" [model {model}]")),
            None => label.push_str(&format!(" [model {model}, not inlined]")),
        }
    }
    if inlined {
        label.push_str(" (inlined)");
    }
    if node.is_removed() {
        label.push_str(" (removed)");
    }

    let hidden = node.model_child();
    let leaves: Vec<_> = node
        .children()
        .iter()
        .map(|c| render(c, hidden.as_ref().is_some_and(|h| h.ptr_eq(c))))
        .collect();
    Tree::new(label).with_leaves(leaves)
}

impl TreeNodeConvert for ModelTreeTracker {
    fn to_tree_string(&self) -> Tree<String> {
        match self.root() {
            Some(root) => root.to_tree_string(),
            None => Tree::new("Empty tree".to_string()),
        }
    }
}
