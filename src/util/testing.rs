use std::cell::RefCell;
use std::env;
use std::sync::Once;

use tracing::{debug, info};
use tracing_subscriber::{
    filter::filter_fn,
    fmt::{self, format::FmtSpan},
    prelude::*,
    EnvFilter,
};

use crate::domain::{ChangeListener, ChangeType, DeepNode};

static TEST_SETUP: Once = Once::new();

pub fn init_test_setup() {
    TEST_SETUP.call_once(|| {
        if env::var("RUST_LOG").is_err() {
            env::set_var("RUST_LOG", "trace");
        }
        // global logging subscriber, used by all tracing log macros
        setup_test_logging();
        info!("Test Setup complete");
    });
}

fn setup_test_logging() {
    debug!("INIT: Attempting logger init from testing.rs");

    // Create a filter for noisy modules
    let noisy_modules = ["config"];
    let module_filter = filter_fn(move |metadata| {
        !noisy_modules
            .iter()
            .any(|name| metadata.target().starts_with(name))
    });

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));

    let subscriber = tracing_subscriber::registry().with(
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_names(false)
            .with_span_events(FmtSpan::CLOSE)
            .with_filter(module_filter)
            .with_filter(env_filter),
    );

    // Only set if we haven't already set a global subscriber
    if tracing::dispatcher::has_been_set() {
        debug!("Tracing subscriber already set");
    } else {
        subscriber.try_init().unwrap_or_else(|e| {
            eprintln!("Error: Failed to set up logging: {}", e);
        });
    }
}

/// One notification seen by a [`RecordingListener`].
#[derive(Debug, Clone)]
pub struct Recorded {
    pub change: ChangeType,
    pub node: DeepNode,
    /// Path at notification time, rendered
    pub path: String,
}

/// Change listener remembering every notification in order.
#[derive(Debug, Default)]
pub struct RecordingListener {
    events: RefCell<Vec<Recorded>>,
}

impl RecordingListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Recorded> {
        self.events.borrow().clone()
    }

    /// `(change, path)` pairs, handy for assertions.
    pub fn changes(&self) -> Vec<(ChangeType, String)> {
        self.events
            .borrow()
            .iter()
            .map(|e| (e.change, e.path.clone()))
            .collect()
    }

    pub fn clear(&self) {
        self.events.borrow_mut().clear();
    }

    fn record(&self, change: ChangeType, node: &DeepNode) {
        let path = node
            .path()
            .map(|p| p.to_string())
            .unwrap_or_else(|e| format!("<{e}>"));
        self.events.borrow_mut().push(Recorded {
            change,
            node: node.clone(),
            path,
        });
    }
}

impl ChangeListener for RecordingListener {
    fn on_added(&self, node: &DeepNode) {
        self.record(ChangeType::Added, node);
    }

    fn on_removed(&self, node: &DeepNode) {
        self.record(ChangeType::Removed, node);
    }

    fn on_changed(&self, node: &DeepNode) {
        self.record(ChangeType::Changed, node);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_test_setup() {
        init_test_setup();
    }
}
