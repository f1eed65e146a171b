//! Secondary indexes over tree nodes.
//!
//! An index maps a caller-supplied key function over in-tree nodes to a
//! multi-valued `key -> {node}` table, with a reverse `node -> key` map so a
//! node's entry can be dropped without knowing its old key.
//!
//! Key functions may read only the node they are given, its parent, and its
//! direct children. The tree refreshes exactly that neighborhood after a
//! mutation; a key function that looks further away goes stale silently.
//! [`Tree::audit_index`](crate::Tree::audit_index) reports such entries.

use std::any::Any;
use std::collections::{BTreeMap, BTreeSet};
use std::hash::Hash;
use std::rc::Rc;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::arena::Arena;
use crate::callback;
use crate::identity::NodeIdentity;
use crate::view::NodeRef;

/// Key function of an index. `None` leaves the node out of the index.
pub type KeyFn<K, V, R> = Rc<dyn Fn(NodeRef<'_, K, V>) -> Option<R>>;

/// Kind of mismatch between an index and a fresh key computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexFindingCode {
    /// In-tree node with a defined key that the index does not hold.
    Missing,
    /// Node held under a key that differs from its current key.
    Stale,
    /// Node held although it is outside the tree or its key is now undefined.
    Unexpected,
    /// Forward table and reverse map disagree.
    Corrupt,
}

/// One index mismatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexFinding {
    pub index: String,
    pub code: IndexFindingCode,
    pub node: NodeIdentity,
}

/// A single named index keyed by `R`.
pub(crate) struct NodeIndex<K, V, R> {
    name: String,
    key_fn: KeyFn<K, V, R>,
    table: FxHashMap<R, BTreeSet<NodeIdentity>>,
    reverse: FxHashMap<NodeIdentity, R>,
}

impl<K, V, R> NodeIndex<K, V, R>
where
    K: Ord + Clone + 'static,
    V: 'static,
    R: Hash + Eq + Clone + 'static,
{
    pub(crate) fn new(name: impl Into<String>, key_fn: KeyFn<K, V, R>) -> Self {
        Self {
            name: name.into(),
            key_fn,
            table: FxHashMap::default(),
            reverse: FxHashMap::default(),
        }
    }

    fn key_of(&self, node: NodeRef<'_, K, V>) -> Option<R> {
        callback::apply("index key function", |n| (self.key_fn)(n), node)
    }

    /// Nodes currently held under `key`.
    pub(crate) fn get(&self, key: &R) -> Vec<NodeIdentity> {
        self.table
            .get(key)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    pub(crate) fn keys(&self) -> Vec<R> {
        self.table.keys().cloned().collect()
    }

    pub(crate) fn put(&mut self, node: NodeRef<'_, K, V>) {
        self.remove(node.identity());
        if let Some(key) = self.key_of(node) {
            tracing::trace!(index = %self.name, node = %node.identity(), "index put");
            self.table.entry(key.clone()).or_default().insert(node.identity());
            self.reverse.insert(node.identity(), key);
        }
    }

    pub(crate) fn remove(&mut self, identity: NodeIdentity) {
        let Some(key) = self.reverse.remove(&identity) else {
            return;
        };
        if let Some(set) = self.table.get_mut(&key) {
            set.remove(&identity);
            if set.is_empty() {
                self.table.remove(&key);
            }
        }
    }

    pub(crate) fn clear(&mut self) {
        self.table.clear();
        self.reverse.clear();
    }

    /// Rebuild from every in-tree node.
    pub(crate) fn compute(&mut self, arena: &Arena<K, V>) {
        self.clear();
        if let Some(root) = arena.root {
            for identity in arena.subtree(root) {
                self.put(NodeRef::new(arena, identity));
            }
        }
    }

    fn multiset_eq(
        &self,
        arena: &Arena<K, V>,
        other: &Self,
        other_arena: &Arena<K, V>,
        node_eq: &dyn Fn(NodeRef<'_, K, V>, NodeRef<'_, K, V>) -> bool,
    ) -> bool {
        if self.reverse.len() != other.reverse.len() || self.table.len() != other.table.len() {
            return false;
        }
        self.table.iter().all(|(key, mine)| {
            let Some(theirs) = other.table.get(key) else {
                return false;
            };
            if mine.len() != theirs.len() {
                return false;
            }
            let mut unmatched: Vec<NodeIdentity> = theirs.iter().copied().collect();
            mine.iter().all(|a| {
                let Some(a) = arena.view(*a) else {
                    return false;
                };
                let hit = unmatched.iter().position(|b| {
                    other_arena
                        .view(*b)
                        .is_some_and(|b| node_eq(a, b))
                });
                hit.map(|pos| unmatched.swap_remove(pos)).is_some()
            })
        })
    }
}

/// Object-safe face of [`NodeIndex`] so indexes with different key types
/// can live in one registry.
pub(crate) trait ErasedIndex<K, V> {
    fn name(&self) -> &str;
    fn len(&self) -> usize;
    fn put(&mut self, node: NodeRef<'_, K, V>);
    fn remove(&mut self, identity: NodeIdentity);
    fn clear(&mut self);
    fn compute(&mut self, arena: &Arena<K, V>);
    fn audit(&self, arena: &Arena<K, V>) -> Vec<IndexFinding>;
    fn same_entries(
        &self,
        arena: &Arena<K, V>,
        other: &dyn ErasedIndex<K, V>,
        other_arena: &Arena<K, V>,
        node_eq: &dyn Fn(NodeRef<'_, K, V>, NodeRef<'_, K, V>) -> bool,
    ) -> bool;
    /// Same name and key function, empty table.
    fn empty_copy(&self) -> Box<dyn ErasedIndex<K, V>>;
    fn as_any(&self) -> &dyn Any;
}

impl<K, V, R> ErasedIndex<K, V> for NodeIndex<K, V, R>
where
    K: Ord + Clone + 'static,
    V: 'static,
    R: Hash + Eq + Clone + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn len(&self) -> usize {
        self.reverse.len()
    }

    fn put(&mut self, node: NodeRef<'_, K, V>) {
        NodeIndex::put(self, node);
    }

    fn remove(&mut self, identity: NodeIdentity) {
        NodeIndex::remove(self, identity);
    }

    fn clear(&mut self) {
        NodeIndex::clear(self);
    }

    fn compute(&mut self, arena: &Arena<K, V>) {
        NodeIndex::compute(self, arena);
    }

    fn audit(&self, arena: &Arena<K, V>) -> Vec<IndexFinding> {
        let finding = |code, node| IndexFinding {
            index: self.name.clone(),
            code,
            node,
        };
        let mut findings = Vec::new();
        let in_tree: BTreeSet<NodeIdentity> = arena
            .root
            .map(|r| arena.subtree(r))
            .unwrap_or_default()
            .into_iter()
            .collect();
        for identity in &in_tree {
            let fresh = self.key_of(NodeRef::new(arena, *identity));
            match (fresh, self.reverse.get(identity)) {
                (Some(_), None) => findings.push(finding(IndexFindingCode::Missing, *identity)),
                (Some(key), Some(held)) if key != *held => {
                    findings.push(finding(IndexFindingCode::Stale, *identity));
                }
                (None, Some(_)) => findings.push(finding(IndexFindingCode::Unexpected, *identity)),
                _ => {}
            }
        }
        for (identity, key) in &self.reverse {
            if !in_tree.contains(identity) {
                findings.push(finding(IndexFindingCode::Unexpected, *identity));
            }
            if !self.table.get(key).is_some_and(|set| set.contains(identity)) {
                findings.push(finding(IndexFindingCode::Corrupt, *identity));
            }
        }
        for (key, set) in &self.table {
            for identity in set {
                if self.reverse.get(identity) != Some(key) {
                    findings.push(finding(IndexFindingCode::Corrupt, *identity));
                }
            }
        }
        findings
    }

    fn same_entries(
        &self,
        arena: &Arena<K, V>,
        other: &dyn ErasedIndex<K, V>,
        other_arena: &Arena<K, V>,
        node_eq: &dyn Fn(NodeRef<'_, K, V>, NodeRef<'_, K, V>) -> bool,
    ) -> bool {
        self.name == other.name()
            && other
                .as_any()
                .downcast_ref::<Self>()
                .is_some_and(|other| self.multiset_eq(arena, other, other_arena, node_eq))
    }

    fn empty_copy(&self) -> Box<dyn ErasedIndex<K, V>> {
        Box::new(NodeIndex::new(self.name.clone(), Rc::clone(&self.key_fn)))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Every index registered on a tree, by name.
pub(crate) struct IndexRegistry<K, V> {
    by_name: BTreeMap<String, Box<dyn ErasedIndex<K, V>>>,
}

impl<K: Ord + Clone + 'static, V: 'static> IndexRegistry<K, V> {
    pub(crate) fn new() -> Self {
        Self {
            by_name: BTreeMap::new(),
        }
    }

    pub(crate) fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub(crate) fn insert(&mut self, index: Box<dyn ErasedIndex<K, V>>) {
        self.by_name.insert(index.name().to_owned(), index);
    }

    pub(crate) fn remove(&mut self, name: &str) -> bool {
        self.by_name.remove(name).is_some()
    }

    pub(crate) fn clear(&mut self) {
        self.by_name.clear();
    }

    pub(crate) fn names(&self) -> Vec<String> {
        self.by_name.keys().cloned().collect()
    }

    pub(crate) fn get(&self, name: &str) -> Option<&dyn ErasedIndex<K, V>> {
        self.by_name.get(name).map(|index| index.as_ref())
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &dyn ErasedIndex<K, V>> {
        self.by_name.values().map(|index| index.as_ref())
    }

    /// Recompute every index from scratch.
    pub(crate) fn compute_all(&mut self, arena: &Arena<K, V>) {
        for index in self.by_name.values_mut() {
            index.compute(arena);
        }
    }

    /// Empty every table, keeping the registrations.
    pub(crate) fn clear_entries(&mut self) {
        for index in self.by_name.values_mut() {
            index.clear();
        }
    }

    /// Bring the entries of `identities` up to date: in-tree nodes are
    /// (re)inserted, everything else is dropped.
    pub(crate) fn refresh(
        &mut self,
        arena: &Arena<K, V>,
        identities: impl IntoIterator<Item = NodeIdentity>,
    ) {
        if self.by_name.is_empty() {
            return;
        }
        for identity in identities {
            let view = arena.is_in_tree(identity).then(|| NodeRef::new(arena, identity));
            for index in self.by_name.values_mut() {
                match view {
                    Some(node) => index.put(node),
                    None => index.remove(identity),
                }
            }
        }
    }

    /// Drop the entries of `identities` from every index.
    pub(crate) fn forget(&mut self, identities: &[NodeIdentity]) {
        for index in self.by_name.values_mut() {
            for identity in identities {
                index.remove(*identity);
            }
        }
    }

    /// Same registrations with empty tables.
    pub(crate) fn empty_copy(&self) -> Self {
        Self {
            by_name: self
                .by_name
                .iter()
                .map(|(name, index)| (name.clone(), index.empty_copy()))
                .collect(),
        }
    }
}

/// Downcast a registered index to its concrete key type.
pub(crate) fn typed<'i, K, V, R>(index: &'i dyn ErasedIndex<K, V>) -> Option<&'i NodeIndex<K, V, R>>
where
    K: Ord + Clone + 'static,
    V: 'static,
    R: Hash + Eq + Clone + 'static,
{
    index.as_any().downcast_ref::<NodeIndex<K, V, R>>()
}
