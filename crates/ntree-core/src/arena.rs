//! Node storage.
//!
//! Every node a tree knows about lives in its arena, keyed by identity. The
//! parent link is a plain identity, children are an owning `id -> identity`
//! map, so a record never holds a reference into another record. Nodes whose
//! parent chain ends at `root` are in-tree; everything else (freshly created
//! nodes and hierarchies built from them) is an orphan.

use std::collections::{BTreeMap, VecDeque};

use rustc_hash::FxHashMap;

use crate::cloning::ValueCloning;
use crate::identity::NodeIdentity;
use crate::node::Node;
use crate::order::{SiblingOrder, TraversalOrder};
use crate::view::NodeRef;

#[derive(Debug)]
pub(crate) struct NodeRecord<K, V> {
    pub(crate) id: K,
    pub(crate) value: Option<V>,
    pub(crate) revision: u64,
    pub(crate) parent: Option<NodeIdentity>,
    pub(crate) children: BTreeMap<K, NodeIdentity>,
}

pub(crate) struct Arena<K, V> {
    pub(crate) nodes: FxHashMap<NodeIdentity, NodeRecord<K, V>>,
    pub(crate) root: Option<NodeIdentity>,
    pub(crate) order: SiblingOrder<K, V>,
    pub(crate) cloning: ValueCloning<V>,
}

impl<K: Ord + Clone + 'static, V: 'static> Arena<K, V> {
    pub(crate) fn new(order: SiblingOrder<K, V>, cloning: ValueCloning<V>) -> Self {
        Self {
            nodes: FxHashMap::default(),
            root: None,
            order,
            cloning,
        }
    }

    pub(crate) fn contains(&self, identity: NodeIdentity) -> bool {
        self.nodes.contains_key(&identity)
    }

    pub(crate) fn record(&self, identity: NodeIdentity) -> Option<&NodeRecord<K, V>> {
        self.nodes.get(&identity)
    }

    pub(crate) fn record_mut(&mut self, identity: NodeIdentity) -> Option<&mut NodeRecord<K, V>> {
        self.nodes.get_mut(&identity)
    }

    pub(crate) fn view(&self, identity: NodeIdentity) -> Option<NodeRef<'_, K, V>> {
        self.contains(identity).then(|| NodeRef::new(self, identity))
    }

    pub(crate) fn parent_of(&self, identity: NodeIdentity) -> Option<NodeIdentity> {
        self.nodes.get(&identity).and_then(|record| record.parent)
    }

    /// Topmost node reached by following parent links.
    pub(crate) fn top(&self, identity: NodeIdentity) -> NodeIdentity {
        let mut current = identity;
        while let Some(parent) = self.parent_of(current) {
            current = parent;
        }
        current
    }

    pub(crate) fn is_root(&self, identity: NodeIdentity) -> bool {
        self.root == Some(identity)
    }

    pub(crate) fn is_in_tree(&self, identity: NodeIdentity) -> bool {
        self.contains(identity) && self.root.is_some_and(|root| self.top(identity) == root)
    }

    /// True when `ancestor` is `identity` or lies on its parent chain.
    pub(crate) fn is_ancestor_or_self(
        &self,
        ancestor: NodeIdentity,
        identity: NodeIdentity,
    ) -> bool {
        let mut current = Some(identity);
        while let Some(node) = current {
            if node == ancestor {
                return true;
            }
            current = self.parent_of(node);
        }
        false
    }

    /// `identity` followed by its ancestors, nearest first.
    pub(crate) fn ancestry(&self, identity: NodeIdentity) -> Vec<NodeIdentity> {
        let mut chain = vec![identity];
        let mut current = identity;
        while let Some(parent) = self.parent_of(current) {
            chain.push(parent);
            current = parent;
        }
        chain
    }

    pub(crate) fn child_of(&self, parent: NodeIdentity, id: &K) -> Option<NodeIdentity> {
        self.nodes
            .get(&parent)
            .and_then(|record| record.children.get(id).copied())
    }

    pub(crate) fn children_of(&self, identity: NodeIdentity) -> Vec<NodeIdentity> {
        self.nodes
            .get(&identity)
            .map(|record| record.children.values().copied().collect())
            .unwrap_or_default()
    }

    /// Children sorted by the active sibling order.
    pub(crate) fn ordered_children(&self, identity: NodeIdentity) -> Vec<NodeIdentity> {
        let mut children = self.children_of(identity);
        self.order.sort(self, &mut children);
        children
    }

    /// Node, its parent and its direct children: everything a key function may read.
    pub(crate) fn neighborhood(&self, identity: NodeIdentity) -> Vec<NodeIdentity> {
        let Some(record) = self.nodes.get(&identity) else {
            return Vec::new();
        };
        let mut out = Vec::with_capacity(record.children.len() + 2);
        out.push(identity);
        out.extend(record.parent);
        out.extend(record.children.values().copied());
        out
    }

    /// Subtree identities in storage order, pre-order. Cheap; used for bookkeeping.
    pub(crate) fn subtree(&self, identity: NodeIdentity) -> Vec<NodeIdentity> {
        if !self.contains(identity) {
            return Vec::new();
        }
        let mut out = Vec::new();
        let mut stack = vec![identity];
        while let Some(node) = stack.pop() {
            out.push(node);
            if let Some(record) = self.nodes.get(&node) {
                stack.extend(record.children.values().rev().copied());
            }
        }
        out
    }

    /// Levels of the subtree under `identity`, top level first, each in sibling order.
    pub(crate) fn levels(&self, identity: NodeIdentity) -> Vec<Vec<NodeIdentity>> {
        let mut levels = Vec::new();
        if !self.contains(identity) {
            return levels;
        }
        let mut current = vec![identity];
        while !current.is_empty() {
            let next = current
                .iter()
                .flat_map(|node| self.ordered_children(*node))
                .collect();
            levels.push(std::mem::replace(&mut current, next));
        }
        levels
    }

    /// Walk the subtree under `identity` in `order`, honouring the sibling order.
    pub(crate) fn traverse(
        &self,
        identity: NodeIdentity,
        order: TraversalOrder,
    ) -> Vec<NodeIdentity> {
        if !self.contains(identity) {
            return Vec::new();
        }
        match order {
            TraversalOrder::PreOrder => {
                let mut out = Vec::new();
                let mut stack = vec![identity];
                while let Some(node) = stack.pop() {
                    out.push(node);
                    stack.extend(self.ordered_children(node).into_iter().rev());
                }
                out
            }
            TraversalOrder::PostOrder => {
                let mut out = Vec::new();
                let mut stack = vec![(identity, false)];
                while let Some((node, expanded)) = stack.pop() {
                    if expanded {
                        out.push(node);
                    } else {
                        stack.push((node, true));
                        stack.extend(
                            self.ordered_children(node)
                                .into_iter()
                                .rev()
                                .map(|child| (child, false)),
                        );
                    }
                }
                out
            }
            TraversalOrder::LevelOrder => {
                let mut out = Vec::new();
                let mut queue = VecDeque::from([identity]);
                while let Some(node) = queue.pop_front() {
                    out.push(node);
                    queue.extend(self.ordered_children(node));
                }
                out
            }
            TraversalOrder::LevelOrderFromBottom => {
                self.levels(identity).into_iter().rev().flatten().collect()
            }
        }
    }

    pub(crate) fn height(&self, identity: NodeIdentity) -> usize {
        let mut height = 0;
        let mut current = vec![identity];
        while !current.is_empty() {
            height += 1;
            current = current
                .iter()
                .flat_map(|node| self.children_of(*node))
                .collect();
        }
        if self.contains(identity) { height } else { 0 }
    }

    /// Attach `child` under `parent`. The caller has checked the key is free.
    pub(crate) fn link(&mut self, parent: NodeIdentity, child: NodeIdentity) {
        let Some(key) = self.nodes.get(&child).map(|record| record.id.clone()) else {
            return;
        };
        if let Some(record) = self.nodes.get_mut(&parent) {
            record.children.insert(key, child);
        }
        if let Some(record) = self.nodes.get_mut(&child) {
            record.parent = Some(parent);
        }
    }

    /// Detach `child` from its parent, if it has one.
    pub(crate) fn unlink(&mut self, child: NodeIdentity) -> Option<NodeIdentity> {
        let record = self.nodes.get_mut(&child)?;
        let parent = record.parent.take()?;
        let key = record.id.clone();
        if let Some(parent_record) = self.nodes.get_mut(&parent) {
            if parent_record.children.get(&key) == Some(&child) {
                parent_record.children.remove(&key);
            }
        }
        Some(parent)
    }

    /// Move the subtree under `identity` out of the arena. The caller unlinks it first.
    pub(crate) fn take_subtree(&mut self, identity: NodeIdentity) -> Option<Node<K, V>> {
        let record = self.nodes.remove(&identity)?;
        let mut children = BTreeMap::new();
        for (key, child) in record.children {
            if let Some(node) = self.take_subtree(child) {
                children.insert(key, node);
            }
        }
        Some(Node {
            identity,
            id: record.id,
            value: record.value,
            revision: record.revision,
            children,
        })
    }

    /// Move a single record out of the arena, leaving its children parentless.
    pub(crate) fn take_single(&mut self, identity: NodeIdentity) -> Option<Node<K, V>> {
        let record = self.nodes.remove(&identity)?;
        for child in record.children.values() {
            if let Some(child_record) = self.nodes.get_mut(child) {
                child_record.parent = None;
            }
        }
        Some(Node {
            identity,
            id: record.id,
            value: record.value,
            revision: record.revision,
            children: BTreeMap::new(),
        })
    }

    /// Move an owned hierarchy into the arena under `parent` (unlinked).
    ///
    /// Identities are kept unless they already exist here, in which case the
    /// node gets a fresh one.
    pub(crate) fn insert_owned(
        &mut self,
        node: Node<K, V>,
        parent: Option<NodeIdentity>,
    ) -> NodeIdentity {
        let identity = if self.contains(node.identity) {
            tracing::warn!(
                identity = %node.identity,
                "identity already present, assigning a fresh one"
            );
            NodeIdentity::fresh()
        } else {
            node.identity
        };
        self.nodes.insert(
            identity,
            NodeRecord {
                id: node.id,
                value: node.value,
                revision: node.revision,
                parent,
                children: BTreeMap::new(),
            },
        );
        for (key, child) in node.children {
            let child_identity = self.insert_owned(child, Some(identity));
            if let Some(record) = self.nodes.get_mut(&identity) {
                record.children.insert(key, child_identity);
            }
        }
        identity
    }

    /// Insert a copy of `node` with fresh identities. With `deep == false` only
    /// the node itself is copied.
    pub(crate) fn insert_clone(
        &mut self,
        node: &Node<K, V>,
        parent: Option<NodeIdentity>,
        deep: bool,
    ) -> NodeIdentity {
        let identity = NodeIdentity::fresh();
        let value = self.cloning.copy_optional(node.value.as_ref());
        self.nodes.insert(
            identity,
            NodeRecord {
                id: node.id.clone(),
                value,
                revision: node.revision,
                parent,
                children: BTreeMap::new(),
            },
        );
        if deep {
            for (key, child) in &node.children {
                let child_identity = self.insert_clone(child, Some(identity), true);
                if let Some(record) = self.nodes.get_mut(&identity) {
                    record.children.insert(key.clone(), child_identity);
                }
            }
        }
        identity
    }

    /// Owned copy of the subtree under `identity`, identities preserved.
    pub(crate) fn snapshot(&self, identity: NodeIdentity) -> Option<Node<K, V>> {
        let record = self.nodes.get(&identity)?;
        let children = record
            .children
            .iter()
            .filter_map(|(key, child)| self.snapshot(*child).map(|node| (key.clone(), node)))
            .collect();
        Some(Node {
            identity,
            id: record.id.clone(),
            value: self.cloning.copy_optional(record.value.as_ref()),
            revision: record.revision,
            children,
        })
    }

    /// Copy of the subtree under `identity` placed into `target`, fresh identities.
    pub(crate) fn copy_into(
        &self,
        identity: NodeIdentity,
        target: &mut Arena<K, V>,
        parent: Option<NodeIdentity>,
    ) -> Option<NodeIdentity> {
        let record = self.nodes.get(&identity)?;
        let copy = NodeIdentity::fresh();
        target.nodes.insert(
            copy,
            NodeRecord {
                id: record.id.clone(),
                value: self.cloning.copy_optional(record.value.as_ref()),
                revision: record.revision,
                parent,
                children: BTreeMap::new(),
            },
        );
        for (key, child) in &record.children {
            if let Some(child_copy) = self.copy_into(*child, target, Some(copy)) {
                if let Some(copy_record) = target.nodes.get_mut(&copy) {
                    copy_record.children.insert(key.clone(), child_copy);
                }
            }
        }
        Some(copy)
    }
}
