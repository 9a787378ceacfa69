//! Model resolution, addressing variants and rendering of derived trees.

use std::rc::Rc;

use rstest::rstest;

use modeltree::util::testing::{self, RecordingListener};
use modeltree::{
    MemoryNode, MemoryTree, ModelLibrary, ModelResolver, ModelTreeTracker, PathLayout, Settings,
    SourceTreeProvider, TreeError, TreeNodeConvert,
};

fn library_with(name: &str, tree: MemoryTree) -> Rc<ModelLibrary> {
    let library = ModelLibrary::new();
    library.insert(name, tree);
    Rc::new(library)
}

fn started(tracker: &ModelTreeTracker) -> Rc<RecordingListener> {
    testing::init_test_setup();
    let listener = Rc::new(RecordingListener::new());
    tracker.add_listener(listener.clone()).expect("start tracking");
    listener
}

// ============================================================
// Addressing
// ============================================================

#[rstest]
#[case::keyed_without_children(PathLayout::Keyed, 0, "/attachments/0/attachments/0")]
#[case::list_without_children(PathLayout::List, 0, "/attachments[0]/attachments/0")]
#[case::keyed_with_children(PathLayout::Keyed, 2, "/attachments/0/attachments/2")]
#[case::list_with_children(PathLayout::List, 2, "/attachments[0]/attachments[2]")]
fn given_path_layout_when_model_inlined_then_model_path_follows_siblings(
    #[case] layout: PathLayout,
    #[case] literal_children: usize,
    #[case] expected: &str,
) {
    let settings = Settings {
        path_layout: layout,
        ..Settings::default()
    };
    let mut model = MemoryNode::model("wheel");
    for _ in 0..literal_children {
        model = model.with_child(MemoryNode::new("bolt"));
    }
    let source = Rc::new(
        MemoryTree::with_settings(&settings).with_root(MemoryNode::new("group").with_child(model)),
    );
    let library = library_with("wheel", MemoryTree::new().with_root(MemoryNode::new("mesh")));
    let tracker = ModelTreeTracker::with_settings(source, library, &settings);
    started(&tracker);

    let model = tracker.root().unwrap().child(0).unwrap();
    assert_eq!(model.model_path().unwrap().to_string(), expected);
    assert_eq!(
        model.model_child().unwrap().path().unwrap().to_string(),
        expected
    );
}

#[rstest]
fn given_custom_attachments_key_when_model_is_root_then_hidden_child_uses_key() {
    let settings = Settings::from_toml("attachments_key = \"parts\"\n").unwrap();
    let source = Rc::new(
        MemoryTree::with_settings(&settings).with_root(MemoryNode::model("wheel")),
    );
    let wheel = MemoryTree::with_settings(&settings)
        .with_root(MemoryNode::new("mesh").with_child(MemoryNode::new("tire")));
    let tracker = ModelTreeTracker::with_settings(source, library_with("wheel", wheel), &settings);
    started(&tracker);

    let hidden = tracker.root().unwrap().model_child().unwrap();
    assert_eq!(hidden.path().unwrap().to_string(), "/parts/0");
    assert_eq!(
        hidden.child(0).unwrap().path().unwrap().to_string(),
        "/parts/0/parts/0"
    );
}

// ============================================================
// Resolution faults
// ============================================================

struct Misdirecting {
    tree: Rc<MemoryTree>,
}

impl ModelResolver for Misdirecting {
    fn resolve(&self, _model_name: &str) -> Option<Rc<dyn SourceTreeProvider>> {
        Some(self.tree.clone() as Rc<dyn SourceTreeProvider>)
    }
}

#[rstest]
fn given_resolver_serving_other_model_when_starting_then_errors_and_cleans_up() {
    testing::init_test_setup();
    let source = Rc::new(
        MemoryTree::new().with_root(MemoryNode::new("group").with_child(MemoryNode::model("wheel"))),
    );
    let axle = Rc::new(MemoryTree::new().with_root(MemoryNode::new("rod")).serving("axle"));
    let resolver = Rc::new(Misdirecting { tree: axle.clone() });
    let tracker = ModelTreeTracker::new(source.clone(), resolver);

    let result = tracker.add_listener(Rc::new(RecordingListener::new()));

    assert_eq!(
        result.unwrap_err(),
        TreeError::ModelMismatch {
            expected: "wheel".to_string(),
            actual: "axle".to_string(),
        }
    );
    assert_eq!(tracker.listener_count(), 0);
    assert!(!tracker.is_tracking());
    assert!(tracker.root().is_none());
    assert_eq!(source.subscriber_count(), 0);
    assert_eq!(axle.subscriber_count(), 0);
}

#[rstest]
fn given_model_registered_later_when_model_node_added_then_inlined() {
    let source = Rc::new(MemoryTree::new().with_root(MemoryNode::new("group")));
    let library = Rc::new(ModelLibrary::new());
    let tracker = ModelTreeTracker::new(source.clone(), library.clone());
    started(&tracker);

    source.add_child(&[], 0, MemoryNode::model("wheel")).unwrap();
    library.insert("wheel", MemoryTree::new().with_root(MemoryNode::new("mesh")));
    source.add_child(&[], 1, MemoryNode::model("wheel")).unwrap();

    let root = tracker.root().unwrap();
    assert!(root.child(0).unwrap().model_child().is_none());
    assert_eq!(
        root.child(1).unwrap().model_child().unwrap().type_id(),
        "mesh"
    );
}

// ============================================================
// TOML sources and rendering
// ============================================================

const CAR: &str = r#"
type = "car"
name = "roadster"

[[attachments]]
type = "seat"

[[attachments]]
type = "model"
model = "wheel"
position = "front-left"
"#;

const WHEEL: &str = r#"
type = "mesh"

[[attachments]]
type = "tire"
pressure = 2.4
"#;

#[rstest]
fn given_toml_trees_when_tracking_then_inlines_and_renders() {
    let settings = Settings::default();
    let source = Rc::new(MemoryTree::from_toml(CAR, &settings).unwrap());
    let library = Rc::new(ModelLibrary::new());
    library.insert("wheel", MemoryTree::from_toml(WHEEL, &settings).unwrap());
    let tracker = ModelTreeTracker::new(source, library);
    started(&tracker);

    let wheel = tracker.root().unwrap().child(1).unwrap();
    assert_eq!(
        wheel.payload().get("position").and_then(|v| v.as_str()),
        Some("front-left")
    );
    let tire = wheel.model_child().unwrap().child(0).unwrap();
    assert_eq!(tire.payload().get("pressure").and_then(|v| v.as_float()), Some(2.4));

    let rendered = tracker.to_tree_string().to_string();
    assert!(rendered.starts_with("car /"), "{rendered}");
    assert!(rendered.contains("model /attachments/1 [model wheel]"), "{rendered}");
    assert!(
        rendered.contains("mesh /attachments/1/attachments/0 (inlined)"),
        "{rendered}"
    );
    assert!(
        rendered.contains("tire /attachments/1/attachments/0/attachments/0"),
        "{rendered}"
    );
}

#[rstest]
fn given_stopped_tracker_when_rendering_then_reports_empty_tree() {
    let tracker = ModelTreeTracker::new(
        Rc::new(MemoryTree::new()),
        Rc::new(ModelLibrary::new()),
    );

    assert_eq!(tracker.to_tree_string().to_string().trim(), "Empty tree");
}
