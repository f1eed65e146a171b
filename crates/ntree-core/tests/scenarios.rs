//! End-to-end scenarios through the public API.

use std::cmp::Ordering;

use ntree_core::{Node, NodeIdentity, TraversalOrder, Tree, TreeError};

type Ids = Vec<&'static str>;

fn ids<'a>(nodes: impl IntoIterator<Item = ntree_core::NodeRef<'a, &'static str, i32>>) -> Ids {
    nodes.into_iter().map(|n| *n.id()).collect()
}

fn find(tree: &Tree<&'static str, i32>, id: &'static str) -> NodeIdentity {
    tree.find_first_with_id(&id).unwrap().identity()
}

// ═══════════════════════════════════════════════════════════════════════════
// Nearest common ancestor
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn nca_through_root() {
    let mut tree = Tree::new("T");
    tree.set_root(
        &Node::new("A1")
            .child(Node::new("B1"))
            .child(Node::new("B2").child(Node::new("C1"))),
    );
    let (b1, c1) = (find(&tree, "B1"), find(&tree, "C1"));

    let nca = tree.nearest_common_ancestor(b1, c1);
    assert_eq!(*nca.common_ancestor().unwrap().id(), "A1");
    assert_eq!(ids(nca.nodes_from_a_to_b().unwrap()), ["B1", "A1", "B2", "C1"]);
    assert_eq!(ids(nca.nodes_from_b_to_a().unwrap()), ["C1", "B2", "A1", "B1"]);

    let root = tree.root_identity().unwrap();
    assert!(!tree.nearest_common_ancestor(root, root).has_common_ancestor());
}

// ═══════════════════════════════════════════════════════════════════════════
// Remove and promote
// ═══════════════════════════════════════════════════════════════════════════

fn promote_tree() -> Tree<&'static str, i32> {
    let mut tree = Tree::new("T");
    tree.set_root(
        &Node::new("A1")
            .child(
                Node::new("B1")
                    .child(Node::new("B2").with_value(2))
                    .child(Node::new("C1")),
            )
            .child(Node::new("B2")),
    );
    tree
}

#[test]
fn promote_child_wins() {
    let mut tree = promote_tree();
    let b1 = find(&tree, "B1");
    let removed = tree.remove_and_promote_children(b1, |_, _| true).unwrap().unwrap();

    let root = tree.root().unwrap();
    assert_eq!(ids(root.children()), ["B2", "C1"]);
    assert_eq!(root.child(&"B2").unwrap().value(), Some(&2));
    let removed: Vec<_> = removed.iter().map(|n| (*n.id(), n.value().copied())).collect();
    assert_eq!(removed, [("B1", None), ("B2", None)]);
}

#[test]
fn promote_uncle_wins() {
    let mut tree = promote_tree();
    let b1 = find(&tree, "B1");
    let removed = tree.remove_and_promote_children(b1, |_, _| false).unwrap().unwrap();

    let root = tree.root().unwrap();
    assert_eq!(ids(root.children()), ["B2", "C1"]);
    assert_eq!(root.child(&"B2").unwrap().value(), None);
    let removed: Vec<_> = removed.iter().map(|n| (*n.id(), n.value().copied())).collect();
    assert_eq!(removed, [("B1", None), ("B2", Some(2))]);
}

// ═══════════════════════════════════════════════════════════════════════════
// Levels and ordering
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn level_boundaries() {
    let tree = promote_tree();
    assert_eq!(tree.height(), 3);
    assert!(matches!(
        tree.nodes_in_level(0),
        Err(TreeError::LevelUnderflow { level: 0 })
    ));
    assert_eq!(ids(tree.nodes_in_level(1).unwrap()), ["A1"]);
    assert!(tree.nodes_in_level(4).unwrap().is_empty());
}

#[test]
fn natural_ordering_is_repeatable() {
    let mut tree = promote_tree();
    tree.use_natural_ordering();
    let first = ids(tree.to_list());
    assert_eq!(first, ids(tree.to_list()));
    assert_eq!(first, ["A1", "B1", "B2", "C1", "B2"]);
}

#[test]
fn panicking_comparator_keeps_walk_alive() {
    let mut tree: Tree<&'static str, i32> = Tree::new("T");
    tree.set_root(
        &Node::new("R")
            .child(Node::new("a"))
            .child(Node::new("b"))
            .child(Node::new("c")),
    );
    tree.use_custom_ordering(|x, y| {
        if (*x.id(), *y.id()) == ("b", "a") || (*x.id(), *y.id()) == ("a", "b") {
            panic!("incomparable");
        }
        x.id().cmp(y.id())
    });
    let list = ids(tree.to_list());
    assert_eq!(list, ["R", "a", "b", "c"]);
    assert_eq!(ids(tree.to_list()), list);
}

#[test]
fn wide_panicking_comparator_keeps_walk_alive() {
    let mut tree: Tree<u16, i32> = Tree::new(0);
    tree.set_root(&(1..=60).fold(Node::new(0), |root, id| {
        root.child(Node::new(id).with_value(i32::from(id)))
    }));
    tree.use_custom_ordering(|x, y| {
        if *x.id() == 30 || *y.id() == 30 {
            panic!("incomparable");
        }
        y.id().cmp(x.id())
    });

    let walk: Vec<u16> = tree.to_list().into_iter().map(|n| *n.id()).collect();
    assert_eq!(walk.len(), 61);
    assert_eq!(walk[0], 0);
    let again: Vec<u16> = tree.to_list().into_iter().map(|n| *n.id()).collect();
    assert_eq!(walk, again);

    assert_eq!(tree.nodes_in_level(2).unwrap().len(), 60);
    assert_eq!(tree.find_first(|n| n.value() == Some(&45)).map(|n| *n.id()), Some(45));

    let mut visited = 0;
    tree.for_each(TraversalOrder::PreOrder, |_, _| visited += 1);
    assert_eq!(visited, 61);
}

// ═══════════════════════════════════════════════════════════════════════════
// Clone and round trip
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn clone_is_equal_but_independent() {
    let mut tree = promote_tree();
    tree.add_index("by_value", |n| n.value().copied());
    let mut copy = tree.clone();
    assert_ne!(copy.identity(), tree.identity());
    assert_eq!(copy, tree);
    assert!(copy.is_clone_of(&tree, &[]));

    let c1 = find(&copy, "C1");
    copy.set_value(c1, Some(9)).unwrap();
    assert_ne!(copy, tree);
    assert_eq!(tree.find_first_with_id(&"C1").unwrap().value(), None);
    assert!(tree.nodes_in_index("by_value", &9).unwrap().is_empty());
    assert_eq!(copy.nodes_in_index("by_value", &9).unwrap().len(), 1);
}

#[test]
fn custom_comparators_are_sampled() {
    let mut tree = promote_tree();
    tree.use_custom_ordering(|a, b| a.id().cmp(b.id()));
    let mut copy = tree.clone();
    let sample: Vec<_> = tree.to_list().iter().map(|n| n.identity()).collect();
    assert!(tree.is_clone_of(&copy, &sample));

    copy.use_custom_ordering(|a, b| match a.id().cmp(b.id()) {
        Ordering::Equal => Ordering::Equal,
        other => other.reverse(),
    });
    assert!(!tree.is_clone_of(&copy, &sample));
}
