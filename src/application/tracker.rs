//! Model tree tracker
//!
//! Entry point for callers: owns the derived tree of one source tree provider
//! and ties its lifetime to the registered change listeners.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::{debug, instrument, warn};

use crate::config::Settings;
use crate::domain::context::TreeContext;
use crate::domain::proxy::{ProxyAnchor, TreeSyncProxy};
use crate::domain::{
    ChangeListener, DeepNode, ListenerId, ModelResolver, SourceTreeProvider, TreeResult,
};

/// Tracks a configuration tree with all model nodes transparently inlined.
///
/// Inert until the first listener is added: that subscribes to the provider
/// and builds the derived tree from whatever exists. Removing the last
/// listener freezes the whole tree and unsubscribes; adding a listener again
/// rebuilds from scratch.
pub struct ModelTreeTracker {
    context: Rc<TreeContext>,
    provider: Rc<dyn SourceTreeProvider>,
    proxy: RefCell<Option<TreeSyncProxy>>,
}

impl ModelTreeTracker {
    pub fn new(provider: Rc<dyn SourceTreeProvider>, resolver: Rc<dyn ModelResolver>) -> Self {
        Self::with_settings(provider, resolver, &Settings::default())
    }

    pub fn with_settings(
        provider: Rc<dyn SourceTreeProvider>,
        resolver: Rc<dyn ModelResolver>,
        settings: &Settings,
    ) -> Self {
        Self {
            context: Rc::new(TreeContext::new(resolver, settings.attachments_key.clone())),
            provider,
            proxy: RefCell::new(None),
        }
    }

    /// Registers a listener. The first listener starts tracking.
    ///
    /// A fault while building the initial tree unregisters the listener again.
    #[instrument(level = "debug", skip_all)]
    pub fn add_listener(&self, listener: Rc<dyn ChangeListener>) -> TreeResult<ListenerId> {
        let (id, count) = self.context.add_listener(listener);
        if count == 1 {
            if let Err(e) = self.start_tracking() {
                self.context.remove_listener(id);
                return Err(e);
            }
        }
        Ok(id)
    }

    /// Unregisters a listener. Removing the last one stops tracking.
    ///
    /// Returns `false` if the handle was not registered (anymore).
    #[instrument(level = "debug", skip_all)]
    pub fn remove_listener(&self, id: ListenerId) -> TreeResult<bool> {
        match self.context.remove_listener(id) {
            None => Ok(false),
            Some(0) => {
                self.stop_tracking()?;
                Ok(true)
            }
            Some(_) => Ok(true),
        }
    }

    /// Current derived root, `None` while stopped or when the source is empty.
    pub fn root(&self) -> Option<DeepNode> {
        self.context.root()
    }

    pub fn is_tracking(&self) -> bool {
        self.proxy.borrow().is_some()
    }

    pub fn listener_count(&self) -> usize {
        self.context.listener_count()
    }

    fn start_tracking(&self) -> TreeResult<()> {
        debug!("start tracking");
        let proxy = TreeSyncProxy::new(
            self.provider.clone(),
            ProxyAnchor::Tracker,
            Rc::downgrade(&self.context),
        );
        if let Err(e) = proxy.start() {
            proxy.stop();
            if let Some(root) = self.context.take_root() {
                root.stop_subscriptions();
            }
            return Err(e);
        }
        *self.proxy.borrow_mut() = Some(proxy);
        Ok(())
    }

    fn stop_tracking(&self) -> TreeResult<()> {
        debug!("stop tracking");
        let root = self.context.take_root();
        let frozen = match &root {
            Some(root) => root.on_removed(),
            None => Ok(()),
        };
        if let Some(proxy) = self.proxy.borrow_mut().take() {
            proxy.stop();
        }
        if frozen.is_err() {
            if let Some(root) = &root {
                root.stop_subscriptions();
            }
        }
        frozen
    }
}

impl Drop for ModelTreeTracker {
    fn drop(&mut self) {
        if self.is_tracking() {
            if let Err(e) = self.stop_tracking() {
                warn!("stop tracking on drop: {}", e);
            }
        }
    }
}
