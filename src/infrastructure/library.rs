//! Named collection of model configuration trees.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use tracing::debug;

use crate::domain::{ModelResolver, SourceTreeProvider};
use crate::infrastructure::memory::MemoryTree;

/// Resolves model names to in-memory trees.
#[derive(Default)]
pub struct ModelLibrary {
    models: RefCell<BTreeMap<String, Rc<MemoryTree>>>,
}

impl ModelLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `tree` as the configuration of `name`, replacing any previous one.
    ///
    /// Trees already resolved by a tracker keep being tracked until their
    /// model nodes are rebuilt.
    pub fn insert(&self, name: impl Into<String>, tree: MemoryTree) -> Rc<MemoryTree> {
        let name = name.into();
        let tree = Rc::new(tree.serving(name.clone()));
        debug!(model = %name, "register model");
        self.models.borrow_mut().insert(name, tree.clone());
        tree
    }

    pub fn remove(&self, name: &str) -> Option<Rc<MemoryTree>> {
        self.models.borrow_mut().remove(name)
    }

    pub fn get(&self, name: &str) -> Option<Rc<MemoryTree>> {
        self.models.borrow().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.models.borrow().contains_key(name)
    }

    /// Registered model names, sorted.
    pub fn names(&self) -> Vec<String> {
        self.models.borrow().keys().cloned().collect()
    }
}

impl ModelResolver for ModelLibrary {
    fn resolve(&self, model_name: &str) -> Option<Rc<dyn SourceTreeProvider>> {
        self.get(model_name)
            .map(|tree| tree as Rc<dyn SourceTreeProvider>)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::memory::MemoryNode;

    #[test]
    fn given_registered_models_when_resolving_then_finds_by_name() {
        let library = ModelLibrary::new();
        library.insert("wheel", MemoryTree::new().with_root(MemoryNode::new("rim")));
        library.insert("axle", MemoryTree::new());

        assert_eq!(library.names(), vec!["axle", "wheel"]);
        let wheel = library.resolve("wheel").expect("wheel registered");
        assert_eq!(wheel.model_name().as_deref(), Some("wheel"));
        assert!(library.resolve("door").is_none());

        library.remove("wheel");
        assert!(!library.contains("wheel"));
    }
}
