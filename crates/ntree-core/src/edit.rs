//! Node-level mutations.
//!
//! Every operation is addressed by [`NodeIdentity`] and keeps indexes current
//! under the locality contract: after a change, only the touched node, its
//! parent and its direct children are re-keyed. Whole-subtree insertions and
//! removals re-key or drop every node of the affected subtree.
//!
//! Handles that do not resolve in the tree are errors. Removing or replacing
//! a detached node (one not reachable from the root), replacing a node with itself and sibling id
//! collisions are not: they return `None`, `false` or an empty collection and
//! leave the tree untouched.

use std::collections::{BTreeMap, BTreeSet};

use crate::callback;
use crate::error::TreeError;
use crate::identity::NodeIdentity;
use crate::node::Node;
use crate::tree::Tree;
use crate::view::NodeRef;

impl<K: Ord + Clone + 'static, V: 'static> Tree<K, V> {
    /// Not reachable from the root.
    fn is_detached(&self, node: NodeIdentity) -> bool {
        !self.arena.is_in_tree(node)
    }

    fn refresh_neighborhood(&mut self, node: NodeIdentity) {
        let touched = self.arena.neighborhood(node);
        self.refresh(touched);
    }

    /// Unlink `node` from its parent and move its subtree out of the arena.
    fn detach_child(&mut self, node: NodeIdentity) -> Option<Node<K, V>> {
        let ids = self.arena.subtree(node);
        self.indexes.forget(&ids);
        let parent = self.arena.unlink(node);
        let taken = self.arena.take_subtree(node);
        if let Some(parent) = parent {
            self.refresh_neighborhood(parent);
        }
        taken
    }

    /// True if replacing `target` with a node called `id` would collide with a sibling.
    fn sibling_collision(&self, target: NodeIdentity, id: &K) -> bool {
        self.arena
            .parent_of(target)
            .and_then(|parent| self.arena.child_of(parent, id))
            .is_some_and(|sibling| sibling != target)
    }

    // ── Replacement ─────────────────────────────────────────────────────

    /// Swap `target` for a copy of `other`, keeping `target`'s children.
    ///
    /// Returns the old node with its children cleared, or `None` if `other`
    /// is the target itself, the target is detached, or a sibling already
    /// uses `other`'s id.
    pub fn replace_single(
        &mut self,
        target: NodeIdentity,
        other: &Node<K, V>,
    ) -> Result<Option<Node<K, V>>, TreeError> {
        self.require("replace_single", target)?;
        if other.identity == target
            || self.is_detached(target)
            || self.sibling_collision(target, &other.id)
        {
            return Ok(None);
        }
        let parent = self.arena.parent_of(target);
        let replacement = self.arena.insert_clone(other, parent, false);
        let children = self
            .arena
            .record_mut(target)
            .map(|record| std::mem::take(&mut record.children))
            .unwrap_or_default();
        for child in children.values() {
            if let Some(record) = self.arena.record_mut(*child) {
                record.parent = Some(replacement);
            }
        }
        if let Some(record) = self.arena.record_mut(replacement) {
            record.children = children;
        }
        match parent {
            Some(parent) => {
                self.arena.unlink(target);
                self.arena.link(parent, replacement);
            }
            None => self.arena.root = Some(replacement),
        }
        self.indexes.forget(&[target]);
        let old = self.arena.take_single(target);
        self.refresh_neighborhood(replacement);
        tracing::debug!(tree = %self.identity, old = %target, new = %replacement, "node replaced");
        Ok(old)
    }

    /// Swap `target` and its whole subtree for a deep copy of `other`.
    ///
    /// Same preconditions as [`Tree::replace_single`]. Returns the old subtree.
    pub fn replace_subtree(
        &mut self,
        target: NodeIdentity,
        other: &Node<K, V>,
    ) -> Result<Option<Node<K, V>>, TreeError> {
        self.require("replace_subtree", target)?;
        if other.identity == target
            || self.is_detached(target)
            || self.sibling_collision(target, &other.id)
        {
            return Ok(None);
        }
        let removed = self.arena.subtree(target);
        self.indexes.forget(&removed);
        let parent = self.arena.unlink(target);
        let old = self.arena.take_subtree(target);
        let replacement = self.arena.insert_clone(other, parent, true);
        let mut touched = self.arena.subtree(replacement);
        match parent {
            Some(parent) => {
                self.arena.link(parent, replacement);
                touched.push(parent);
            }
            None => self.arena.root = Some(replacement),
        }
        self.refresh(touched);
        tracing::debug!(
            tree = %self.identity,
            old = %target,
            new = %replacement,
            "subtree replaced"
        );
        Ok(old)
    }

    // ── Removal ─────────────────────────────────────────────────────────

    /// Detach `target` and its subtree. Removing the root empties the tree.
    pub fn remove(&mut self, target: NodeIdentity) -> Result<Option<Node<K, V>>, TreeError> {
        self.require("remove", target)?;
        if self.is_detached(target) {
            return Ok(None);
        }
        if self.arena.is_root(target) {
            self.arena.root = None;
            self.indexes.clear_entries();
            tracing::debug!(tree = %self.identity, node = %target, "root removed");
            return Ok(self.arena.take_subtree(target));
        }
        let old = self.detach_child(target);
        tracing::debug!(tree = %self.identity, node = %target, "node removed");
        Ok(old)
    }

    /// Remove `target` and hand its children to its parent.
    ///
    /// When a child's id is already used by one of `target`'s siblings, the
    /// tie-break decides: `true` keeps the child and drops the sibling, `false`
    /// drops the child. A panicking tie-break counts as `false`. Returns the
    /// removed node followed by every discarded subtree, or `None` for the
    /// root or a detached node.
    pub fn remove_and_promote_children(
        &mut self,
        target: NodeIdentity,
        mut tie_break: impl FnMut(NodeRef<'_, K, V>, NodeRef<'_, K, V>) -> bool,
    ) -> Result<Option<Vec<Node<K, V>>>, TreeError> {
        self.require("remove_and_promote_children", target)?;
        if self.is_detached(target) {
            return Ok(None);
        }
        let Some(parent) = self.arena.parent_of(target) else {
            return Ok(None);
        };
        self.arena.unlink(target);
        let mut discarded = Vec::new();
        for child in self.arena.children_of(target) {
            let Some(key) = self.arena.record(child).map(|record| record.id.clone()) else {
                continue;
            };
            let child_wins = match self.arena.child_of(parent, &key) {
                Some(uncle) => {
                    let keep_child = callback::check2(
                        "remove_and_promote_children",
                        |c, u| tie_break(c, u),
                        NodeRef::new(&self.arena, child),
                        NodeRef::new(&self.arena, uncle),
                    );
                    let loser = if keep_child { uncle } else { child };
                    discarded.extend(self.detach_child(loser));
                    keep_child
                }
                None => true,
            };
            if child_wins {
                self.arena.unlink(child);
                self.arena.link(parent, child);
            }
        }
        self.indexes.forget(&[target]);
        let mut removed: Vec<Node<K, V>> = self.arena.take_single(target).into_iter().collect();
        removed.append(&mut discarded);
        self.refresh_neighborhood(parent);
        tracing::debug!(
            tree = %self.identity,
            node = %target,
            discarded = removed.len() - 1,
            "node removed, children promoted"
        );
        Ok(Some(removed))
    }

    /// [`Tree::remove_and_promote_children`] where siblings always win.
    pub fn remove_and_promote_children_keep_uncles(
        &mut self,
        target: NodeIdentity,
    ) -> Result<Option<Vec<Node<K, V>>>, TreeError> {
        self.remove_and_promote_children(target, |_, _| false)
    }

    // ── Children ────────────────────────────────────────────────────────

    /// Attach parentless nodes of this tree under `parent`.
    ///
    /// Nodes that already have a parent, the root, `parent`'s own ancestors
    /// and nodes whose id is already taken among `parent`'s children are
    /// skipped. Among inputs with the same id the first wins.
    pub fn add_children(
        &mut self,
        parent: NodeIdentity,
        nodes: impl IntoIterator<Item = NodeIdentity>,
    ) -> Result<&mut Self, TreeError> {
        self.require("add_children", parent)?;
        let nodes: Vec<NodeIdentity> = nodes.into_iter().collect();
        for node in &nodes {
            self.require("add_children", *node)?;
        }
        let mut added = Vec::new();
        for node in nodes {
            let Some(key) = self.arena.record(node).map(|record| record.id.clone()) else {
                continue;
            };
            if self.arena.parent_of(node).is_some()
                || self.arena.is_root(node)
                || self.arena.is_ancestor_or_self(node, parent)
                || self.arena.child_of(parent, &key).is_some()
            {
                continue;
            }
            self.arena.link(parent, node);
            added.push(node);
        }
        if !added.is_empty() && self.arena.is_in_tree(parent) {
            let mut touched = self.arena.neighborhood(parent);
            for node in &added {
                touched.extend(self.arena.subtree(*node));
            }
            self.refresh(touched);
        }
        tracing::debug!(
            tree = %self.identity,
            parent = %parent,
            added = added.len(),
            "children added"
        );
        Ok(self)
    }

    /// Place a deep copy of `node` under `parent`, replacing any child with
    /// the same id. Returns the replaced child.
    ///
    /// Fails with [`TreeError::SelfInsertion`] if `node` is already a child of `parent`.
    pub fn set_child(
        &mut self,
        parent: NodeIdentity,
        node: &Node<K, V>,
    ) -> Result<Option<Node<K, V>>, TreeError> {
        self.require("set_child", parent)?;
        if self.arena.children_of(parent).contains(&node.identity) {
            return Err(TreeError::SelfInsertion {
                parent,
                child: node.identity,
            });
        }
        let replaced = match self.arena.child_of(parent, &node.id) {
            Some(existing) => self.detach_child(existing),
            None => None,
        };
        self.insert_child_copy(parent, node);
        Ok(replaced)
    }

    fn insert_child_copy(&mut self, parent: NodeIdentity, node: &Node<K, V>) -> NodeIdentity {
        let copy = self.arena.insert_clone(node, Some(parent), true);
        self.arena.link(parent, copy);
        let mut touched = self.arena.neighborhood(parent);
        touched.extend(self.arena.subtree(copy));
        self.refresh(touched);
        tracing::debug!(tree = %self.identity, parent = %parent, child = %copy, "child set");
        copy
    }

    /// [`Tree::set_child`] for several nodes. Inputs are deduplicated by
    /// identity. Returns the replaced children by id.
    pub fn set_children<'n>(
        &mut self,
        parent: NodeIdentity,
        nodes: impl IntoIterator<Item = &'n Node<K, V>>,
    ) -> Result<BTreeMap<K, Node<K, V>>, TreeError>
    where
        K: 'n,
        V: 'n,
    {
        self.require("set_children", parent)?;
        let nodes = dedupe(nodes);
        let current = self.arena.children_of(parent);
        if let Some(node) = nodes.iter().find(|node| current.contains(&node.identity)) {
            return Err(TreeError::SelfInsertion {
                parent,
                child: node.identity,
            });
        }
        let mut replaced = BTreeMap::new();
        for node in nodes {
            if let Some(old) = self.set_child(parent, node)? {
                replaced.insert(old.id.clone(), old);
            }
        }
        Ok(replaced)
    }

    /// Place a deep copy of `node` under `parent` unless the id is taken.
    pub fn set_child_if_absent(
        &mut self,
        parent: NodeIdentity,
        node: &Node<K, V>,
    ) -> Result<bool, TreeError> {
        self.require("set_child_if_absent", parent)?;
        if self.arena.child_of(parent, &node.id).is_some() {
            return Ok(false);
        }
        self.insert_child_copy(parent, node);
        Ok(true)
    }

    /// [`Tree::set_child_if_absent`] for several nodes. True if every node was added.
    pub fn set_children_if_absent<'n>(
        &mut self,
        parent: NodeIdentity,
        nodes: impl IntoIterator<Item = &'n Node<K, V>>,
    ) -> Result<bool, TreeError>
    where
        K: 'n,
        V: 'n,
    {
        self.require("set_children_if_absent", parent)?;
        let mut all = true;
        for node in dedupe(nodes) {
            all &= self.set_child_if_absent(parent, node)?;
        }
        Ok(all)
    }

    /// Remove the child of `parent` called `id`.
    pub fn remove_child(
        &mut self,
        parent: NodeIdentity,
        id: &K,
    ) -> Result<Option<Node<K, V>>, TreeError> {
        self.require("remove_child", parent)?;
        let Some(child) = self.arena.child_of(parent, id) else {
            return Ok(None);
        };
        let removed = self.detach_child(child);
        tracing::debug!(tree = %self.identity, parent = %parent, child = %child, "child removed");
        Ok(removed)
    }

    fn remove_listed(
        &mut self,
        parent: NodeIdentity,
        children: Vec<NodeIdentity>,
    ) -> BTreeMap<K, Node<K, V>> {
        let mut removed = BTreeMap::new();
        for child in children {
            if let Some(node) = self.detach_child(child) {
                removed.insert(node.id.clone(), node);
            }
        }
        if !removed.is_empty() {
            tracing::debug!(
                tree = %self.identity,
                parent = %parent,
                removed = removed.len(),
                "children removed"
            );
        }
        removed
    }

    fn children_where(
        &self,
        parent: NodeIdentity,
        keep: impl Fn(NodeRef<'_, K, V>) -> bool,
    ) -> Vec<NodeIdentity> {
        self.arena
            .children_of(parent)
            .into_iter()
            .filter(|child| keep(NodeRef::new(&self.arena, *child)))
            .collect()
    }

    /// Remove every child of `parent` matching `predicate`. A panicking
    /// predicate keeps the child.
    pub fn remove_children(
        &mut self,
        parent: NodeIdentity,
        predicate: impl Fn(NodeRef<'_, K, V>) -> bool,
    ) -> Result<BTreeMap<K, Node<K, V>>, TreeError> {
        self.require("remove_children", parent)?;
        let doomed =
            self.children_where(parent, |n| callback::check("remove_children", &predicate, n));
        Ok(self.remove_listed(parent, doomed))
    }

    pub fn remove_children_with_ids(
        &mut self,
        parent: NodeIdentity,
        ids: &[K],
    ) -> Result<BTreeMap<K, Node<K, V>>, TreeError> {
        self.require("remove_children_with_ids", parent)?;
        let ids: BTreeSet<&K> = ids.iter().collect();
        let doomed = self.children_where(parent, |n| ids.contains(n.id()));
        Ok(self.remove_listed(parent, doomed))
    }

    pub fn remove_all_children(
        &mut self,
        parent: NodeIdentity,
    ) -> Result<BTreeMap<K, Node<K, V>>, TreeError> {
        self.require("remove_all_children", parent)?;
        let doomed = self.arena.children_of(parent);
        Ok(self.remove_listed(parent, doomed))
    }

    /// Keep only the children of `parent` matching `predicate`. A panicking
    /// predicate drops the child.
    pub fn retain_children(
        &mut self,
        parent: NodeIdentity,
        predicate: impl Fn(NodeRef<'_, K, V>) -> bool,
    ) -> Result<BTreeMap<K, Node<K, V>>, TreeError> {
        self.require("retain_children", parent)?;
        let doomed =
            self.children_where(parent, |n| !callback::check("retain_children", &predicate, n));
        Ok(self.remove_listed(parent, doomed))
    }

    pub fn retain_children_with_ids(
        &mut self,
        parent: NodeIdentity,
        ids: &[K],
    ) -> Result<BTreeMap<K, Node<K, V>>, TreeError> {
        self.require("retain_children_with_ids", parent)?;
        let ids: BTreeSet<&K> = ids.iter().collect();
        let doomed = self.children_where(parent, |n| !ids.contains(n.id()));
        Ok(self.remove_listed(parent, doomed))
    }

    // ── Fields ──────────────────────────────────────────────────────────

    /// Rename `node`. False if the id is unchanged or a sibling already uses it.
    pub fn replace_id(&mut self, node: NodeIdentity, id: K) -> Result<bool, TreeError> {
        self.require("replace_id", node)?;
        let Some(old) = self.arena.record(node).map(|record| record.id.clone()) else {
            return Ok(false);
        };
        if old == id {
            return Ok(false);
        }
        let parent = self.arena.parent_of(node);
        if let Some(parent) = parent {
            if self.arena.child_of(parent, &id).is_some() {
                return Ok(false);
            }
            if let Some(record) = self.arena.record_mut(parent) {
                record.children.remove(&old);
                record.children.insert(id.clone(), node);
            }
        }
        if let Some(record) = self.arena.record_mut(node) {
            record.id = id;
        }
        self.refresh_neighborhood(node);
        Ok(true)
    }

    /// Set or clear the value of `node`.
    pub fn set_value(
        &mut self,
        node: NodeIdentity,
        value: Option<V>,
    ) -> Result<&mut Self, TreeError> {
        self.require("set_value", node)?;
        if let Some(record) = self.arena.record_mut(node) {
            record.value = value;
        }
        self.refresh_neighborhood(node);
        Ok(self)
    }

    /// Increment the revision of `node` and return the new value.
    pub fn bump_node_revision(&mut self, node: NodeIdentity) -> Result<u64, TreeError> {
        self.require("bump_node_revision", node)?;
        let revision = match self.arena.record_mut(node) {
            Some(record) => {
                record.revision += 1;
                record.revision
            }
            None => return Err(TreeError::unknown("bump_node_revision", node)),
        };
        self.refresh_neighborhood(node);
        Ok(revision)
    }
}

fn dedupe<'n, K: 'n, V: 'n>(
    nodes: impl IntoIterator<Item = &'n Node<K, V>>,
) -> Vec<&'n Node<K, V>> {
    let mut seen = BTreeSet::new();
    nodes.into_iter().filter(|node| seen.insert(node.identity)).collect()
}
