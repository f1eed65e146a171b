//! The tree: node arena, root, indexes and configuration.
//!
//! All nodes a tree knows about live in its arena and are addressed by
//! [`NodeIdentity`]. Nodes reachable from the root are in-tree; the rest are
//! orphans created with [`Tree::create_node`] or [`Tree::adopt`] and waiting to
//! be attached. Node-level mutations live in `edit.rs`; this module holds the
//! tree-level surface.
//!
//! Single writer only: a `Tree` is neither `Send` nor `Sync`, and callbacks
//! that mutate it mid-walk force a full index rebuild afterwards.

use std::fmt;
use std::hash::Hash;
use std::rc::Rc;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::arena::Arena;
use crate::callback;
use crate::cloning::ValueCloning;
use crate::error::TreeError;
use crate::identity::{NodeIdentity, TreeIdentity};
use crate::index::{IndexFinding, IndexRegistry, NodeIndex, typed};
use crate::node::{FIRST_REVISION, Node};
use crate::order::{OrderingKind, SiblingOrder, TraversalOrder};
use crate::view::NodeRef;

/// Tree-level configuration.
pub struct TreeConfig<K, V> {
    pub ordering: SiblingOrder<K, V>,
    pub value_cloning: ValueCloning<V>,
}

impl<K, V: Clone> Default for TreeConfig<K, V> {
    fn default() -> Self {
        Self {
            ordering: SiblingOrder::Unordered,
            value_cloning: ValueCloning::by_copy(),
        }
    }
}

impl<K, V> TreeConfig<K, V> {
    #[must_use]
    pub fn new(value_cloning: ValueCloning<V>) -> Self {
        Self {
            ordering: SiblingOrder::Unordered,
            value_cloning,
        }
    }

    #[must_use]
    pub fn with_ordering(mut self, ordering: SiblingOrder<K, V>) -> Self {
        self.ordering = ordering;
        self
    }

    #[must_use]
    pub fn with_value_cloning(mut self, value_cloning: ValueCloning<V>) -> Self {
        self.value_cloning = value_cloning;
        self
    }
}

/// A mutable N-ary tree with unique sibling ids and secondary indexes.
pub struct Tree<K, V> {
    pub(crate) identity: TreeIdentity,
    pub(crate) id: K,
    pub(crate) revision: u64,
    pub(crate) arena: Arena<K, V>,
    pub(crate) indexes: IndexRegistry<K, V>,
}

impl<K: Ord + Clone + 'static, V: Clone + 'static> Tree<K, V> {
    /// Empty tree, unordered, values copied with `Clone`.
    #[must_use]
    pub fn new(id: K) -> Self {
        Self::with_config(id, TreeConfig::default())
    }
}

impl<K: Ord + Clone + 'static, V: 'static> Tree<K, V> {
    #[must_use]
    pub fn with_config(id: K, config: TreeConfig<K, V>) -> Self {
        Self {
            identity: TreeIdentity::fresh(),
            id,
            revision: FIRST_REVISION,
            arena: Arena::new(config.ordering, config.value_cloning),
            indexes: IndexRegistry::new(),
        }
    }

    pub(crate) fn require(
        &self,
        operation: &'static str,
        node: NodeIdentity,
    ) -> Result<(), TreeError> {
        if self.arena.contains(node) {
            Ok(())
        } else {
            Err(TreeError::unknown(operation, node))
        }
    }

    /// Push `identities` through every index.
    pub(crate) fn refresh(&mut self, identities: impl IntoIterator<Item = NodeIdentity>) {
        self.indexes.refresh(&self.arena, identities);
    }

    // ── Identity and configuration ──────────────────────────────────────

    #[must_use]
    pub fn identity(&self) -> TreeIdentity {
        self.identity
    }

    #[must_use]
    pub fn id(&self) -> &K {
        &self.id
    }

    /// Rename the tree. Returns the previous id.
    pub fn replace_tree_id(&mut self, id: K) -> K {
        std::mem::replace(&mut self.id, id)
    }

    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Increment the tree revision and return the new value.
    pub fn bump_revision(&mut self) -> u64 {
        self.revision += 1;
        self.revision
    }

    #[must_use]
    pub fn ordering(&self) -> &SiblingOrder<K, V> {
        &self.arena.order
    }

    #[must_use]
    pub fn ordering_kind(&self) -> OrderingKind {
        self.arena.order.kind()
    }

    pub fn set_ordering(&mut self, ordering: SiblingOrder<K, V>) -> &mut Self {
        self.arena.order = ordering;
        self
    }

    pub fn dont_use_ordering(&mut self) -> &mut Self {
        self.set_ordering(SiblingOrder::Unordered)
    }

    pub fn use_natural_ordering(&mut self) -> &mut Self {
        self.set_ordering(SiblingOrder::natural())
    }

    /// Natural ordering with the value as tie-break.
    pub fn use_natural_value_ordering(&mut self) -> &mut Self
    where
        V: Ord,
    {
        self.set_ordering(SiblingOrder::natural_by_value())
    }

    pub fn use_custom_ordering(
        &mut self,
        comparator: impl Fn(NodeRef<'_, K, V>, NodeRef<'_, K, V>) -> std::cmp::Ordering + 'static,
    ) -> &mut Self {
        self.set_ordering(SiblingOrder::custom(comparator))
    }

    #[must_use]
    pub fn value_cloning(&self) -> &ValueCloning<V> {
        &self.arena.cloning
    }

    pub fn set_value_cloning(&mut self, value_cloning: ValueCloning<V>) -> &mut Self {
        self.arena.cloning = value_cloning;
        self
    }

    pub fn use_value_cloning_by_copy(&mut self) -> &mut Self
    where
        V: Clone,
    {
        self.set_value_cloning(ValueCloning::by_copy())
    }

    pub fn use_value_cloning_by_serialization(&mut self, type_descriptor: Option<&str>) -> &mut Self
    where
        V: Serialize + DeserializeOwned,
    {
        self.set_value_cloning(ValueCloning::by_serialization(type_descriptor))
    }

    // ── Nodes ───────────────────────────────────────────────────────────

    /// Create an orphan node owned by this tree.
    pub fn create_node(&mut self, id: K, value: Option<V>) -> NodeIdentity {
        let mut node = Node::new(id);
        node.value = value;
        self.arena.insert_owned(node, None)
    }

    /// Move an owned hierarchy into this tree as an orphan.
    pub fn adopt(&mut self, node: Node<K, V>) -> NodeIdentity {
        self.arena.insert_owned(node, None)
    }

    /// Move a parentless, non-root hierarchy out of the tree.
    pub fn release(&mut self, node: NodeIdentity) -> Result<Option<Node<K, V>>, TreeError> {
        self.require("release", node)?;
        if self.arena.parent_of(node).is_some() || self.arena.is_root(node) {
            return Ok(None);
        }
        Ok(self.arena.take_subtree(node))
    }

    /// Rebuild parent links for an owned hierarchy and place it under
    /// `parent`, or as an orphan when `parent` is `None`.
    ///
    /// This is the repair pass for decoded input: the tree-shaped encoding has
    /// no back-references. Returns `None` if `parent` already has a child with
    /// the same id.
    pub fn reattach(
        &mut self,
        node: Node<K, V>,
        parent: Option<NodeIdentity>,
    ) -> Result<Option<NodeIdentity>, TreeError> {
        let Some(parent) = parent else {
            return Ok(Some(self.arena.insert_owned(node, None)));
        };
        self.require("reattach", parent)?;
        if self.arena.child_of(parent, &node.id).is_some() {
            return Ok(None);
        }
        let identity = self.arena.insert_owned(node, Some(parent));
        self.arena.link(parent, identity);
        if self.arena.is_in_tree(parent) {
            let mut touched = self.arena.subtree(identity);
            touched.push(parent);
            self.refresh(touched);
        }
        Ok(Some(identity))
    }

    #[must_use]
    pub fn node(&self, node: NodeIdentity) -> Option<NodeRef<'_, K, V>> {
        self.arena.view(node)
    }

    /// True if `node` belongs to this tree, in-tree or orphan.
    #[must_use]
    pub fn contains(&self, node: NodeIdentity) -> bool {
        self.arena.contains(node)
    }

    /// True if `node` is reachable from the root.
    #[must_use]
    pub fn is_in_tree(&self, node: NodeIdentity) -> bool {
        self.arena.is_in_tree(node)
    }

    #[must_use]
    pub fn root(&self) -> Option<NodeRef<'_, K, V>> {
        self.arena.root.map(|root| NodeRef::new(&self.arena, root))
    }

    #[must_use]
    pub fn root_identity(&self) -> Option<NodeIdentity> {
        self.arena.root
    }

    /// Owned copy of the subtree under `node`, identities preserved.
    pub fn snapshot(&self, node: NodeIdentity) -> Result<Node<K, V>, TreeError> {
        self.arena
            .snapshot(node)
            .ok_or(TreeError::unknown("snapshot", node))
    }

    // ── Root ────────────────────────────────────────────────────────────

    /// Make an orphan of this tree the root. False if a root exists, if the
    /// node has a parent, or if it belongs to another tree.
    pub fn add_root(&mut self, node: NodeIdentity) -> bool {
        if self.arena.root.is_some()
            || !self.arena.contains(node)
            || self.arena.parent_of(node).is_some()
        {
            return false;
        }
        self.arena.root = Some(node);
        self.recreate_indexes();
        tracing::debug!(tree = %self.identity, root = %node, "root added");
        true
    }

    /// Replace the whole tree content with a copy of `node`.
    ///
    /// On an empty tree the copy becomes the root and `None` is returned;
    /// otherwise the previous root subtree is returned.
    pub fn set_root(&mut self, node: &Node<K, V>) -> Option<Node<K, V>> {
        match self.arena.root {
            Some(root) => self.replace_subtree(root, node).ok().flatten(),
            None => {
                let copy = self.arena.insert_clone(node, None, true);
                self.arena.root = Some(copy);
                self.recreate_indexes();
                None
            }
        }
    }

    /// Replace only the root with a copy of `node`, keeping the root's children.
    pub fn set_root_single(&mut self, node: &Node<K, V>) -> Option<Node<K, V>> {
        match self.arena.root {
            Some(root) => self.replace_single(root, node).ok().flatten(),
            None => {
                let copy = self.arena.insert_clone(node, None, false);
                self.arena.root = Some(copy);
                self.recreate_indexes();
                None
            }
        }
    }

    /// Drop the root subtree and empty every index. Orphans are kept.
    pub fn clear(&mut self) {
        if let Some(root) = self.arena.root.take() {
            self.arena.take_subtree(root);
        }
        self.indexes.clear_entries();
        tracing::debug!(tree = %self.identity, "tree cleared");
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.arena.root.is_none()
    }

    /// Number of in-tree nodes.
    #[must_use]
    pub fn size(&self) -> usize {
        self.arena.root.map_or(0, |root| self.arena.subtree(root).len())
    }

    /// Height of the tree; 0 when empty.
    #[must_use]
    pub fn height(&self) -> usize {
        self.arena.root.map_or(0, |root| self.arena.height(root))
    }

    // ── Indexes ─────────────────────────────────────────────────────────

    /// Register an index and compute it. False if the name is taken.
    pub fn add_index<R>(
        &mut self,
        name: impl Into<String>,
        key_fn: impl Fn(NodeRef<'_, K, V>) -> Option<R> + 'static,
    ) -> bool
    where
        R: Hash + Eq + Clone + 'static,
    {
        let name = name.into();
        if self.indexes.contains(&name) {
            return false;
        }
        let mut index = NodeIndex::new(name.clone(), Rc::new(key_fn));
        index.compute(&self.arena);
        self.indexes.insert(Box::new(index));
        tracing::debug!(tree = %self.identity, index = %name, "index added");
        true
    }

    pub fn remove_index(&mut self, name: &str) -> bool {
        let removed = self.indexes.remove(name);
        if removed {
            tracing::debug!(tree = %self.identity, index = %name, "index removed");
        }
        removed
    }

    pub fn remove_all_indexes(&mut self) {
        self.indexes.clear();
        tracing::debug!(tree = %self.identity, "indexes removed");
    }

    /// Recompute every index from scratch.
    pub fn recreate_indexes(&mut self) {
        if self.indexes.is_empty() {
            return;
        }
        let _span = tracing::debug_span!("recreate_indexes", tree = %self.identity).entered();
        self.indexes.compute_all(&self.arena);
    }

    #[must_use]
    pub fn index_names(&self) -> Vec<String> {
        self.indexes.names()
    }

    fn typed_index<R>(&self, name: &str) -> Result<&NodeIndex<K, V, R>, TreeError>
    where
        R: Hash + Eq + Clone + 'static,
    {
        let index = self.indexes.get(name).ok_or_else(|| TreeError::UnknownIndex {
            name: name.to_owned(),
        })?;
        typed::<K, V, R>(index).ok_or_else(|| TreeError::IndexKeyType {
            name: name.to_owned(),
            expected: std::any::type_name::<R>(),
        })
    }

    /// Nodes held under `key` in index `name`.
    pub fn nodes_in_index<R>(
        &self,
        name: &str,
        key: &R,
    ) -> Result<Vec<NodeRef<'_, K, V>>, TreeError>
    where
        R: Hash + Eq + Clone + 'static,
    {
        let index = self.typed_index::<R>(name)?;
        Ok(index
            .get(key)
            .into_iter()
            .map(|node| NodeRef::new(&self.arena, node))
            .collect())
    }

    /// First node held under `key` in index `name`.
    pub fn first_node_in_index<R>(
        &self,
        name: &str,
        key: &R,
    ) -> Result<Option<NodeRef<'_, K, V>>, TreeError>
    where
        R: Hash + Eq + Clone + 'static,
    {
        Ok(self.nodes_in_index(name, key)?.into_iter().next())
    }

    /// Keys currently present in index `name`.
    pub fn index_keys<R>(&self, name: &str) -> Result<Vec<R>, TreeError>
    where
        R: Hash + Eq + Clone + 'static,
    {
        Ok(self.typed_index::<R>(name)?.keys())
    }

    /// Number of nodes held in index `name`.
    pub fn index_size(&self, name: &str) -> Result<usize, TreeError> {
        self.indexes
            .get(name)
            .map(|index| index.len())
            .ok_or_else(|| TreeError::UnknownIndex {
                name: name.to_owned(),
            })
    }

    /// Compare index `name` against a fresh key computation for every in-tree node.
    pub fn audit_index(&self, name: &str) -> Result<Vec<IndexFinding>, TreeError> {
        let index = self.indexes.get(name).ok_or_else(|| TreeError::UnknownIndex {
            name: name.to_owned(),
        })?;
        Ok(index.audit(&self.arena))
    }

    // ── Read-only traversal ─────────────────────────────────────────────

    /// In-tree nodes, pre-order.
    #[must_use]
    pub fn to_list(&self) -> Vec<NodeRef<'_, K, V>> {
        self.to_list_in(TraversalOrder::PreOrder)
    }

    #[must_use]
    pub fn to_list_in(&self, order: TraversalOrder) -> Vec<NodeRef<'_, K, V>> {
        self.root().map(|root| root.to_list(order)).unwrap_or_default()
    }

    pub fn find_first(
        &self,
        predicate: impl Fn(NodeRef<'_, K, V>) -> bool,
    ) -> Option<NodeRef<'_, K, V>> {
        self.root().and_then(|root| root.find_first(|n| predicate(n)))
    }

    #[must_use]
    pub fn find_first_with_id(&self, id: &K) -> Option<NodeRef<'_, K, V>> {
        self.root().and_then(|root| root.find_first_with_id(id))
    }

    #[must_use]
    pub fn find_first_with_value(&self, value: &V) -> Option<NodeRef<'_, K, V>>
    where
        V: PartialEq,
    {
        self.root().and_then(|root| root.find_first_with_value(value))
    }

    pub fn find_all(
        &self,
        predicate: impl Fn(NodeRef<'_, K, V>) -> bool,
    ) -> Vec<NodeRef<'_, K, V>> {
        self.root()
            .map(|root| root.find_all(|n| predicate(n)))
            .unwrap_or_default()
    }

    pub fn map_to_list<R>(
        &self,
        order: TraversalOrder,
        f: impl Fn(NodeRef<'_, K, V>) -> R,
    ) -> Vec<Option<R>> {
        self.root()
            .map(|root| root.map_to_list(order, |n| f(n)))
            .unwrap_or_default()
    }

    /// Nodes at `level`, the root being level 1. An empty tree has none.
    pub fn nodes_in_level(&self, level: usize) -> Result<Vec<NodeRef<'_, K, V>>, TreeError> {
        match self.root() {
            Some(root) => root.nodes_in_level(level),
            None => Ok(Vec::new()),
        }
    }

    // ── Mutating traversal ──────────────────────────────────────────────

    fn for_each_listed(
        &mut self,
        site: &'static str,
        nodes: Vec<NodeIdentity>,
        mut f: impl FnMut(&mut Self, NodeIdentity),
    ) {
        let _span = tracing::debug_span!("for_each", tree = %self.identity, site).entered();
        for node in nodes {
            if !self.arena.contains(node) {
                continue;
            }
            callback::run(site, |node| f(self, node), node);
        }
        self.recreate_indexes();
    }

    /// Visit every in-tree node in `order`. `f` may mutate the tree; nodes
    /// removed by an earlier call are skipped. Indexes are rebuilt afterwards.
    pub fn for_each(&mut self, order: TraversalOrder, f: impl FnMut(&mut Self, NodeIdentity)) {
        let nodes = self
            .arena
            .root
            .map(|root| self.arena.traverse(root, order))
            .unwrap_or_default();
        self.for_each_listed("for_each", nodes, f);
    }

    pub fn for_each_pre_order(&mut self, f: impl FnMut(&mut Self, NodeIdentity)) {
        self.for_each(TraversalOrder::PreOrder, f);
    }

    pub fn for_each_post_order(&mut self, f: impl FnMut(&mut Self, NodeIdentity)) {
        self.for_each(TraversalOrder::PostOrder, f);
    }

    pub fn for_each_level_order(&mut self, f: impl FnMut(&mut Self, NodeIdentity)) {
        self.for_each(TraversalOrder::LevelOrder, f);
    }

    pub fn for_each_level_order_from_bottom(&mut self, f: impl FnMut(&mut Self, NodeIdentity)) {
        self.for_each(TraversalOrder::LevelOrderFromBottom, f);
    }

    /// Visit the nodes at `level`, the root being level 1.
    pub fn for_each_at_level(
        &mut self,
        level: usize,
        f: impl FnMut(&mut Self, NodeIdentity),
    ) -> Result<(), TreeError> {
        let nodes = self
            .nodes_in_level(level)?
            .into_iter()
            .map(|n| n.identity())
            .collect();
        self.for_each_listed("for_each_at_level", nodes, f);
        Ok(())
    }

    /// Visit the subtree under `start` in `order`.
    pub fn for_each_from(
        &mut self,
        start: NodeIdentity,
        order: TraversalOrder,
        f: impl FnMut(&mut Self, NodeIdentity),
    ) -> Result<(), TreeError> {
        self.require("for_each_from", start)?;
        let nodes = self.arena.traverse(start, order);
        self.for_each_listed("for_each_from", nodes, f);
        Ok(())
    }

    // ── Cloning ─────────────────────────────────────────────────────────

    /// Deep copy under a new id: fresh tree and node identities, same
    /// configuration and revision, indexes rebuilt. Orphans are not copied.
    #[must_use]
    pub fn clone_tree(&self, id: K) -> Self {
        let mut arena = Arena::new(self.arena.order.clone(), self.arena.cloning.clone());
        if let Some(root) = self.arena.root {
            arena.root = self.arena.copy_into(root, &mut arena, None);
        }
        let mut indexes = self.indexes.empty_copy();
        indexes.compute_all(&arena);
        Self {
            identity: TreeIdentity::fresh(),
            id,
            revision: self.revision,
            arena,
            indexes,
        }
    }

    /// True if `other` is a distinct tree that matches this one in content,
    /// revision, value cloning, ordering and indexes.
    ///
    /// Custom comparators cannot be compared directly; they are compared by
    /// their answers on consecutive pairs of `sample` (handles into this tree).
    #[must_use]
    pub fn is_clone_of(&self, other: &Self, sample: &[NodeIdentity]) -> bool
    where
        V: PartialEq,
    {
        if std::ptr::eq(self, other) || self.identity == other.identity {
            return false;
        }
        if self != other
            || self.revision != other.revision
            || self.arena.cloning != other.arena.cloning
            || self.ordering_kind() != other.ordering_kind()
        {
            return false;
        }
        match (&self.arena.order, &other.arena.order) {
            (SiblingOrder::Natural { by_value: a }, SiblingOrder::Natural { by_value: b })
                if a.is_some() != b.is_some() =>
            {
                return false;
            }
            (SiblingOrder::Custom(_), SiblingOrder::Custom(_)) => {
                let views: Vec<_> = sample.iter().filter_map(|s| self.arena.view(*s)).collect();
                let agree = views.windows(2).all(|pair| {
                    self.arena.order.compare(pair[0], pair[1])
                        == other.arena.order.compare(pair[0], pair[1])
                });
                if !agree {
                    return false;
                }
            }
            _ => {}
        }
        let names = self.indexes.names();
        if names != other.indexes.names() {
            return false;
        }
        self.indexes.iter().all(|mine| {
            other.indexes.get(mine.name()).is_some_and(|theirs| {
                mine.same_entries(&self.arena, theirs, &other.arena, &|a, b| a == b)
            })
        })
    }
}

impl<K: Ord + Clone + 'static, V: 'static> Clone for Tree<K, V> {
    fn clone(&self) -> Self {
        self.clone_tree(self.id.clone())
    }
}

/// Tree id plus root subtree, compared by id and value.
impl<K: Ord + Clone + 'static, V: PartialEq + 'static> PartialEq for Tree<K, V> {
    fn eq(&self, other: &Self) -> bool {
        if self.id != other.id {
            return false;
        }
        match (self.root(), other.root()) {
            (None, None) => true,
            (Some(a), Some(b)) => a.eq_subtree(&b),
            _ => false,
        }
    }
}

impl<K: fmt::Debug, V> fmt::Debug for Tree<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tree")
            .field("identity", &self.identity)
            .field("id", &self.id)
            .field("revision", &self.revision)
            .field("nodes", &self.arena.nodes.len())
            .field("root", &self.arena.root)
            .field("ordering", &self.arena.order)
            .field("value_cloning", &self.arena.cloning)
            .finish_non_exhaustive()
    }
}
