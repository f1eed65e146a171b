//! Logging integration tests.
//!
//! These tests install a capturing `tracing_subscriber` layer and check that
//! coerced callback failures, decode repairs and bulk index work leave the
//! expected events and spans behind.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use ntree_core::{Node, TraversalOrder, Tree};

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;

// ============================================================================
// Test Infrastructure
// ============================================================================

#[derive(Debug, Clone)]
struct CapturedEvent {
    level: tracing::Level,
    fields: HashMap<String, String>,
}

impl CapturedEvent {
    fn message(&self) -> &str {
        self.fields.get("message").map_or("", String::as_str)
    }
}

/// A tracing Layer that records events and span names.
struct Capture {
    events: Arc<Mutex<Vec<CapturedEvent>>>,
    spans: Arc<Mutex<Vec<String>>>,
}

struct CaptureHandle {
    events: Arc<Mutex<Vec<CapturedEvent>>>,
    spans: Arc<Mutex<Vec<String>>>,
}

impl CaptureHandle {
    fn warnings(&self) -> Vec<CapturedEvent> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|event| event.level == tracing::Level::WARN)
            .cloned()
            .collect()
    }

    fn spans(&self) -> Vec<String> {
        self.spans.lock().unwrap().clone()
    }
}

/// Visitor that extracts event fields.
struct FieldVisitor(Vec<(String, String)>);

impl tracing::field::Visit for FieldVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        self.0.push((field.name().to_string(), format!("{value:?}")));
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        self.0.push((field.name().to_string(), value.to_string()));
    }
}

impl<S> tracing_subscriber::Layer<S> for Capture
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(
        &self,
        attrs: &tracing::span::Attributes<'_>,
        _id: &tracing::span::Id,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        self.spans
            .lock()
            .unwrap()
            .push(attrs.metadata().name().to_string());
    }

    fn on_event(
        &self,
        event: &tracing::Event<'_>,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        let mut visitor = FieldVisitor(Vec::new());
        event.record(&mut visitor);
        self.events.lock().unwrap().push(CapturedEvent {
            level: *event.metadata().level(),
            fields: visitor.0.into_iter().collect(),
        });
    }
}

fn with_capture<F: FnOnce()>(f: F) -> CaptureHandle {
    let events = Arc::new(Mutex::new(Vec::new()));
    let spans = Arc::new(Mutex::new(Vec::new()));
    let layer = Capture {
        events: events.clone(),
        spans: spans.clone(),
    };
    let subscriber = tracing_subscriber::registry().with(layer);
    tracing::subscriber::with_default(subscriber, f);
    CaptureHandle { events, spans }
}

fn sample() -> Tree<&'static str, i32> {
    let mut tree = Tree::new("T");
    tree.set_root(
        &Node::new("A")
            .with_value(1)
            .child(Node::new("B").with_value(2))
            .child(Node::new("C").with_value(3)),
    );
    tree
}

// ============================================================================
// Tests
// ============================================================================

#[test]
fn panicking_predicate_logs_warning_with_site() {
    let tree = sample();
    let handle = with_capture(|| {
        let found = tree.find_first(|n| -> bool {
            if *n.id() == "B" {
                panic!("bad predicate");
            }
            false
        });
        assert!(found.is_none());
    });
    let warnings = handle.warnings();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].fields.get("site").map(String::as_str), Some("find_first"));
    assert_eq!(warnings[0].fields.get("reason").map(String::as_str), Some("bad predicate"));
}

#[test]
fn panicking_key_function_is_logged_and_excluded() {
    let mut tree = sample();
    let handle = with_capture(|| {
        tree.add_index("fragile", |n| -> Option<i32> {
            if *n.id() == "C" {
                panic!("no key for C");
            }
            n.value().copied()
        });
    });
    assert!(!handle.warnings().is_empty());
    assert!(tree.nodes_in_index("fragile", &3).unwrap().is_empty());
    assert_eq!(tree.nodes_in_index("fragile", &2).unwrap().len(), 1);
}

#[test]
fn mutating_traversal_opens_spans() {
    let mut tree = sample();
    tree.add_index("by_value", |n| n.value().copied());
    let handle = with_capture(|| {
        tree.for_each(TraversalOrder::PostOrder, |tree, node| {
            tree.bump_node_revision(node).unwrap();
        });
    });
    let spans = handle.spans();
    assert!(spans.iter().any(|name| name == "for_each"));
    assert!(spans.iter().any(|name| name == "recreate_indexes"));
}

#[test]
fn duplicate_sibling_ids_in_json_are_reported() {
    let text = r#"{"schema_version": 1, "id": "t", "root": {"id": "a", "children": [
        {"id": "b", "value": 1},
        {"id": "b", "value": 2}
    ]}}"#;
    let mut decoded = None;
    let handle = with_capture(|| {
        decoded = Some(Tree::<String, i32>::from_json(text).unwrap());
    });
    let tree = decoded.unwrap();
    assert_eq!(tree.size(), 2);
    assert_eq!(tree.find_first_with_id(&"b".to_owned()).unwrap().value(), Some(&1));
    assert!(
        handle
            .warnings()
            .iter()
            .any(|event| event.message().contains("duplicate sibling id"))
    );
}

#[test]
fn failed_serialization_copy_drops_value() {
    // JSON object keys must be strings, so tuple-keyed maps cannot be encoded.
    type Grid = BTreeMap<(u8, u8), u8>;
    let mut tree: Tree<&'static str, Grid> = Tree::new("T");
    tree.use_value_cloning_by_serialization(Some("Grid"));
    tree.set_root(&Node::new("A").with_value(Grid::new()));
    let cell: Grid = [((0, 0), 1)].into_iter().collect();
    let root = tree.root_identity().unwrap();
    tree.set_value(root, Some(cell)).unwrap();

    let mut copy = None;
    let handle = with_capture(|| copy = Some(tree.clone()));
    let copy = copy.unwrap();
    assert_eq!(copy.root().unwrap().value(), None);
    assert_eq!(copy.root().unwrap().revision(), tree.root().unwrap().revision());
    assert_eq!(handle.warnings().len(), 1);
}
