//! Read-only view of a node inside a tree.
//!
//! A [`NodeRef`] is a tree borrow plus an identity. It is `Copy`, cheap to
//! pass around, and is what every caller-supplied closure receives. While a
//! `NodeRef` is alive the tree cannot be mutated, so the node it points at
//! always exists.

use std::cmp::Ordering;
use std::fmt;

use crate::arena::{Arena, NodeRecord};
use crate::callback;
use crate::error::TreeError;
use crate::identity::NodeIdentity;
use crate::node::Node;
use crate::order::{TraversalOrder, natural_cmp};

/// Borrowed view of one node.
pub struct NodeRef<'a, K, V> {
    arena: &'a Arena<K, V>,
    identity: NodeIdentity,
}

impl<K, V> Clone for NodeRef<'_, K, V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K, V> Copy for NodeRef<'_, K, V> {}

impl<'a, K: Ord + Clone + 'static, V: 'static> NodeRef<'a, K, V> {
    pub(crate) fn new(arena: &'a Arena<K, V>, identity: NodeIdentity) -> Self {
        debug_assert!(arena.contains(identity));
        Self { arena, identity }
    }

    fn record(&self) -> &'a NodeRecord<K, V> {
        &self.arena.nodes[&self.identity]
    }

    fn wrap(&self, identity: NodeIdentity) -> NodeRef<'a, K, V> {
        NodeRef::new(self.arena, identity)
    }

    fn wrap_all(&self, identities: Vec<NodeIdentity>) -> Vec<NodeRef<'a, K, V>> {
        identities.into_iter().map(|n| self.wrap(n)).collect()
    }

    // ── Fields ──────────────────────────────────────────────────────────

    #[must_use]
    pub fn identity(&self) -> NodeIdentity {
        self.identity
    }

    #[must_use]
    pub fn id(&self) -> &'a K {
        &self.record().id
    }

    #[must_use]
    pub fn value(&self) -> Option<&'a V> {
        self.record().value.as_ref()
    }

    #[must_use]
    pub fn revision(&self) -> u64 {
        self.record().revision
    }

    /// True if both views point at the same node (identity, not equality).
    #[must_use]
    pub fn same_node(&self, other: &NodeRef<'_, K, V>) -> bool {
        self.identity == other.identity
    }

    // ── Children ────────────────────────────────────────────────────────

    #[must_use]
    pub fn parent(&self) -> Option<NodeRef<'a, K, V>> {
        self.record().parent.map(|p| self.wrap(p))
    }

    /// Children in storage order.
    pub fn children(&self) -> impl Iterator<Item = NodeRef<'a, K, V>> + use<'a, K, V> {
        let arena = self.arena;
        self.record()
            .children
            .values()
            .map(move |child| NodeRef::new(arena, *child))
    }

    /// Children in the tree's active sibling order.
    #[must_use]
    pub fn ordered_children(&self) -> Vec<NodeRef<'a, K, V>> {
        self.wrap_all(self.arena.ordered_children(self.identity))
    }

    #[must_use]
    pub fn child(&self, id: &K) -> Option<NodeRef<'a, K, V>> {
        self.record().children.get(id).map(|c| self.wrap(*c))
    }

    #[must_use]
    pub fn has_child(&self, id: &K) -> bool {
        self.record().children.contains_key(id)
    }

    #[must_use]
    pub fn child_count(&self) -> usize {
        self.record().children.len()
    }

    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.record().children.is_empty()
    }

    #[must_use]
    pub fn children_ids(&self) -> Vec<&'a K> {
        self.record().children.keys().collect()
    }

    /// Values of the children in storage order; absent values included.
    #[must_use]
    pub fn children_values(&self) -> Vec<Option<&'a V>> {
        self.children().map(|c| c.value()).collect()
    }

    /// First child, in sibling order, carrying `value`.
    #[must_use]
    pub fn first_child_with_value(&self, value: &V) -> Option<NodeRef<'a, K, V>>
    where
        V: PartialEq,
    {
        self.ordered_children()
            .into_iter()
            .find(|c| c.value() == Some(value))
    }

    /// Children for which `predicate` holds, in sibling order.
    pub fn children_matching(
        &self,
        predicate: impl Fn(NodeRef<'a, K, V>) -> bool,
    ) -> Vec<NodeRef<'a, K, V>> {
        self.ordered_children()
            .into_iter()
            .filter(|c| callback::check("children_matching", &predicate, *c))
            .collect()
    }

    /// Children whose id is in `ids`, in sibling order.
    #[must_use]
    pub fn children_with_ids(&self, ids: &[K]) -> Vec<NodeRef<'a, K, V>> {
        self.ordered_children()
            .into_iter()
            .filter(|c| ids.contains(c.id()))
            .collect()
    }

    /// The other children of this node's parent. `None` without a parent.
    #[must_use]
    pub fn siblings(&self) -> Option<Vec<NodeRef<'a, K, V>>> {
        let parent = self.parent()?;
        Some(
            parent
                .ordered_children()
                .into_iter()
                .filter(|s| s.identity != self.identity)
                .collect(),
        )
    }

    /// This node, its parent, and its direct children.
    #[must_use]
    pub fn neighborhood(&self) -> Vec<NodeRef<'a, K, V>> {
        self.wrap_all(self.arena.neighborhood(self.identity))
    }

    // ── Membership and ancestry ─────────────────────────────────────────

    #[must_use]
    pub fn is_root(&self) -> bool {
        self.arena.is_root(self.identity)
    }

    /// True when the parent chain reaches the tree's root.
    #[must_use]
    pub fn is_in_tree(&self) -> bool {
        self.arena.is_in_tree(self.identity)
    }

    /// True when the node is not part of the tree.
    #[must_use]
    pub fn is_orphan(&self) -> bool {
        !self.is_in_tree()
    }

    /// Topmost ancestor. `None` if this node has no parent.
    #[must_use]
    pub fn farthest_ancestor(&self) -> Option<NodeRef<'a, K, V>> {
        self.record()
            .parent
            .map(|_| self.wrap(self.arena.top(self.identity)))
    }

    /// True if `ancestor` is a strict ancestor of this node.
    #[must_use]
    pub fn has_ancestor(&self, ancestor: NodeIdentity) -> bool {
        ancestor != self.identity && self.arena.is_ancestor_or_self(ancestor, self.identity)
    }

    /// This node up to and including `ancestor`. `None` if it is not a strict ancestor.
    #[must_use]
    pub fn nodes_up_to_ancestor(&self, ancestor: NodeIdentity) -> Option<Vec<NodeRef<'a, K, V>>> {
        if !self.has_ancestor(ancestor) {
            return None;
        }
        let chain = self.arena.ancestry(self.identity);
        let end = chain.iter().position(|n| *n == ancestor)?;
        Some(self.wrap_all(chain[..=end].to_vec()))
    }

    /// Depth counted from the root, which is level 1. `None` outside the tree.
    #[must_use]
    pub fn level_from_root(&self) -> Option<usize> {
        self.is_in_tree()
            .then(|| self.arena.ancestry(self.identity).len())
    }

    /// Depth counted from `ancestor`, which is level 1. `None` if unrelated.
    #[must_use]
    pub fn level_relative_to(&self, ancestor: NodeIdentity) -> Option<usize> {
        let chain = self.arena.ancestry(self.identity);
        chain.iter().position(|n| *n == ancestor).map(|pos| pos + 1)
    }

    // ── Subtree queries ─────────────────────────────────────────────────

    /// Height of the subtree under this node; a leaf has height 1.
    #[must_use]
    pub fn height(&self) -> usize {
        self.arena.height(self.identity)
    }

    /// Number of nodes in the subtree under this node.
    #[must_use]
    pub fn size(&self) -> usize {
        self.arena.subtree(self.identity).len()
    }

    /// Nodes `level` levels down, this node being level 1.
    pub fn nodes_in_level(&self, level: usize) -> Result<Vec<NodeRef<'a, K, V>>, TreeError> {
        if level < 1 {
            return Err(TreeError::LevelUnderflow { level });
        }
        let mut levels = self.arena.levels(self.identity);
        if level > levels.len() {
            return Ok(Vec::new());
        }
        Ok(self.wrap_all(levels.swap_remove(level - 1)))
    }

    /// The subtree under this node, in `order`.
    #[must_use]
    pub fn to_list(&self, order: TraversalOrder) -> Vec<NodeRef<'a, K, V>> {
        self.wrap_all(self.arena.traverse(self.identity, order))
    }

    /// First node in pre-order for which `predicate` holds.
    pub fn find_first(
        &self,
        predicate: impl Fn(NodeRef<'a, K, V>) -> bool,
    ) -> Option<NodeRef<'a, K, V>> {
        self.to_list(TraversalOrder::PreOrder)
            .into_iter()
            .find(|n| callback::check("find_first", &predicate, *n))
    }

    #[must_use]
    pub fn find_first_with_id(&self, id: &K) -> Option<NodeRef<'a, K, V>> {
        self.find_first(|n| n.id() == id)
    }

    #[must_use]
    pub fn find_first_with_value(&self, value: &V) -> Option<NodeRef<'a, K, V>>
    where
        V: PartialEq,
    {
        self.find_first(|n| n.value() == Some(value))
    }

    /// Every node in pre-order for which `predicate` holds.
    pub fn find_all(
        &self,
        predicate: impl Fn(NodeRef<'a, K, V>) -> bool,
    ) -> Vec<NodeRef<'a, K, V>> {
        self.to_list(TraversalOrder::PreOrder)
            .into_iter()
            .filter(|n| callback::check("find_all", &predicate, *n))
            .collect()
    }

    /// Apply `f` to every node in `order`. Entries are `None` where `f` panicked.
    pub fn map_to_list<R>(
        &self,
        order: TraversalOrder,
        f: impl Fn(NodeRef<'a, K, V>) -> R,
    ) -> Vec<Option<R>> {
        self.to_list(order)
            .into_iter()
            .map(|n| callback::apply("map_to_list", |n| Some(f(n)), n))
            .collect()
    }

    /// Owned copy of the subtree with the same identities.
    #[must_use]
    pub fn to_node(&self) -> Node<K, V> {
        self.arena
            .snapshot(self.identity)
            .unwrap_or_else(|| Node::new(self.id().clone()))
    }

    /// Compare two subtrees by id and value, children in storage order.
    #[must_use]
    pub fn eq_subtree(&self, other: &NodeRef<'_, K, V>) -> bool
    where
        V: PartialEq,
    {
        self == other
            && self.child_count() == other.child_count()
            && self
                .children()
                .zip(other.children())
                .all(|(a, b)| a.eq_subtree(&b))
    }

    /// Id first, absent value before present value, then value order.
    #[must_use]
    pub fn natural_cmp(&self, other: &NodeRef<'_, K, V>) -> Ordering
    where
        V: Ord,
    {
        natural_cmp(*self, *other, Some(V::cmp))
    }
}

impl<K: PartialEq, V: PartialEq> PartialEq<NodeRef<'_, K, V>> for NodeRef<'_, K, V> {
    fn eq(&self, other: &NodeRef<'_, K, V>) -> bool {
        let (a, b) = (&self.arena.nodes[&self.identity], &other.arena.nodes[&other.identity]);
        a.id == b.id && a.value == b.value
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for NodeRef<'_, K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let record = &self.arena.nodes[&self.identity];
        f.debug_struct("NodeRef")
            .field("identity", &self.identity)
            .field("id", &record.id)
            .field("value", &record.value)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloning::ValueCloning;
    use crate::order::SiblingOrder;

    // A1(1){B1(2){C1(4), C2(5)}, B2(3)}
    fn arena() -> (Arena<&'static str, i32>, NodeIdentity) {
        let mut arena = Arena::new(SiblingOrder::natural(), ValueCloning::by_copy());
        let root = arena.insert_owned(
            Node::new("A1")
                .with_value(1)
                .child(
                    Node::new("B1")
                        .with_value(2)
                        .child(Node::new("C1").with_value(4))
                        .child(Node::new("C2").with_value(5)),
                )
                .child(Node::new("B2").with_value(3)),
            None,
        );
        arena.root = Some(root);
        (arena, root)
    }

    fn ids(nodes: &[NodeRef<'_, &'static str, i32>]) -> Vec<&'static str> {
        nodes.iter().map(|n| *n.id()).collect()
    }

    #[test]
    fn field_access() {
        let (arena, root) = arena();
        let a1 = arena.view(root).unwrap();
        assert_eq!(*a1.id(), "A1");
        assert_eq!(a1.value(), Some(&1));
        assert_eq!(a1.revision(), 1);
        assert!(a1.is_root());
        assert!(a1.parent().is_none());
        assert_eq!(a1.children_ids(), [&"B1", &"B2"]);
        assert_eq!(a1.children_values(), [Some(&2), Some(&3)]);
    }

    #[test]
    fn children_queries() {
        let (arena, root) = arena();
        let a1 = arena.view(root).unwrap();
        assert_eq!(a1.first_child_with_value(&3).map(|n| *n.id()), Some("B2"));
        assert!(a1.first_child_with_value(&9).is_none());
        assert_eq!(ids(&a1.children_matching(|n| n.value() > Some(&2))), ["B2"]);
        assert_eq!(ids(&a1.children_with_ids(&["B2", "Z"])), ["B2"]);
        let b1 = a1.child(&"B1").unwrap();
        assert_eq!(ids(&b1.siblings().unwrap()), ["B2"]);
        assert!(a1.siblings().is_none());
        assert_eq!(ids(&b1.neighborhood()), ["B1", "A1", "C1", "C2"]);
    }

    #[test]
    fn ancestry_queries() {
        let (arena, root) = arena();
        let a1 = arena.view(root).unwrap();
        let c2 = a1.find_first_with_id(&"C2").unwrap();
        let b1 = c2.parent().unwrap();
        assert_eq!(c2.level_from_root(), Some(3));
        assert_eq!(c2.level_relative_to(b1.identity()), Some(2));
        assert_eq!(c2.level_relative_to(c2.identity()), Some(1));
        assert_eq!(b1.level_relative_to(c2.identity()), None);
        assert!(c2.has_ancestor(root));
        assert!(!c2.has_ancestor(c2.identity()));
        assert_eq!(ids(&c2.nodes_up_to_ancestor(root).unwrap()), ["C2", "B1", "A1"]);
        assert!(b1.nodes_up_to_ancestor(c2.identity()).is_none());
        assert!(c2.farthest_ancestor().unwrap().same_node(&a1));
        assert!(a1.farthest_ancestor().is_none());
    }

    #[test]
    fn levels_and_sizes() {
        let (arena, root) = arena();
        let a1 = arena.view(root).unwrap();
        assert_eq!(a1.height(), 3);
        assert_eq!(a1.size(), 5);
        assert_eq!(ids(&a1.nodes_in_level(1).unwrap()), ["A1"]);
        assert_eq!(ids(&a1.nodes_in_level(3).unwrap()), ["C1", "C2"]);
        assert!(a1.nodes_in_level(4).unwrap().is_empty());
        assert_eq!(
            a1.nodes_in_level(0).unwrap_err(),
            TreeError::LevelUnderflow { level: 0 }
        );
    }

    #[test]
    fn search_swallows_panics() {
        let (arena, root) = arena();
        let a1 = arena.view(root).unwrap();
        let found = a1.find_all(|n| {
            if *n.id() == "B1" {
                panic!("bad node");
            }
            n.value().is_some_and(|v| *v % 2 == 1)
        });
        assert_eq!(ids(&found), ["A1", "C2", "B2"]);
        let mapped = a1.map_to_list(TraversalOrder::PreOrder, |n| {
            assert_ne!(*n.id(), "C1");
            n.value().copied()
        });
        assert_eq!(mapped, [Some(Some(1)), Some(Some(2)), None, Some(Some(5)), Some(Some(3))]);
    }

    #[test]
    fn equality_and_comparison() {
        let (arena, root) = arena();
        let a1 = arena.view(root).unwrap();
        let b1 = a1.child(&"B1").unwrap();
        let b2 = a1.child(&"B2").unwrap();
        assert_eq!(b1, b1);
        assert_ne!(b1, b2);
        assert_eq!(b1.natural_cmp(&b2), Ordering::Less);
        assert!(a1.eq_subtree(&a1));
        assert!(!b1.eq_subtree(&b2));
    }

    #[test]
    fn to_node_keeps_identities() {
        let (arena, root) = arena();
        let a1 = arena.view(root).unwrap();
        let owned = a1.to_node();
        assert_eq!(owned.identity(), root);
        assert_eq!(owned.size(), 5);
    }
}
