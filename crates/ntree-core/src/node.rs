//! Owned, detached nodes.
//!
//! [`Node`] is the portable form of a node and its subtree: it owns its
//! children outright and knows nothing about parents or trees. It is what a
//! tree hands back when a node is removed or replaced, what callers pass in
//! when grafting copies, and the shape used for JSON encoding.
//!
//! # Example
//!
//! ```
//! use ntree_core::Node;
//!
//! let a1: Node<&str, u32> = Node::new("A1")
//!     .with_value(1)
//!     .child(Node::new("B1").with_value(2))
//!     .child(Node::new("B2"));
//!
//! assert_eq!(a1.size(), 3);
//! assert_eq!(a1.get_child(&"B1").and_then(|b| b.value()), Some(&2));
//! ```

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use serde::{Deserialize, Serialize};

use crate::identity::NodeIdentity;

pub(crate) const FIRST_REVISION: u64 = 1;

fn first_revision() -> u64 {
    FIRST_REVISION
}

/// A detached node with its whole subtree.
///
/// Equality (`==`) is domain equality on `id` and `value` only, children and
/// identity are ignored. Use [`Node::eq_subtree`] to compare whole subtrees and
/// [`Node::identity`] for bookkeeping identity.
///
/// `Clone` produces an independent copy with fresh identities for the node and
/// every descendant.
#[derive(Debug, Serialize, Deserialize)]
#[serde(bound(
    serialize = "K: Serialize, V: Serialize",
    deserialize = "K: Ord + Clone + Deserialize<'de>, V: Deserialize<'de>"
))]
pub struct Node<K, V> {
    #[serde(default = "NodeIdentity::fresh")]
    pub(crate) identity: NodeIdentity,
    pub(crate) id: K,
    #[serde(default)]
    pub(crate) value: Option<V>,
    #[serde(default = "first_revision")]
    pub(crate) revision: u64,
    #[serde(default, with = "children_seq")]
    pub(crate) children: BTreeMap<K, Node<K, V>>,
}

impl<K: Ord + Clone, V> Node<K, V> {
    /// Create a leaf without a value.
    #[must_use]
    pub fn new(id: K) -> Self {
        Self {
            identity: NodeIdentity::fresh(),
            id,
            value: None,
            revision: FIRST_REVISION,
            children: BTreeMap::new(),
        }
    }

    /// Set the value.
    #[must_use]
    pub fn with_value(mut self, value: V) -> Self {
        self.value = Some(value);
        self
    }

    /// Add a child. A child whose id is already taken is dropped.
    #[must_use]
    pub fn child(mut self, node: Node<K, V>) -> Self {
        self.push_child(node);
        self
    }

    /// Add several children, first occurrence of an id wins.
    #[must_use]
    pub fn with_children(mut self, nodes: impl IntoIterator<Item = Node<K, V>>) -> Self {
        for node in nodes {
            self.push_child(node);
        }
        self
    }

    /// Add a child in place. Returns false if the id was already taken.
    pub fn push_child(&mut self, node: Node<K, V>) -> bool {
        match self.children.entry(node.id.clone()) {
            Entry::Vacant(slot) => {
                slot.insert(node);
                true
            }
            Entry::Occupied(_) => false,
        }
    }

    /// Remove and return the child with `id`.
    pub fn take_child(&mut self, id: &K) -> Option<Node<K, V>> {
        self.children.remove(id)
    }

    #[must_use]
    pub fn identity(&self) -> NodeIdentity {
        self.identity
    }

    #[must_use]
    pub fn id(&self) -> &K {
        &self.id
    }

    #[must_use]
    pub fn value(&self) -> Option<&V> {
        self.value.as_ref()
    }

    pub fn set_value(&mut self, value: Option<V>) -> Option<V> {
        std::mem::replace(&mut self.value, value)
    }

    #[must_use]
    pub fn into_value(self) -> Option<V> {
        self.value
    }

    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Children in key order.
    pub fn children(&self) -> impl Iterator<Item = &Node<K, V>> {
        self.children.values()
    }

    /// Look up a child by id.
    #[must_use]
    pub fn get_child(&self, id: &K) -> Option<&Node<K, V>> {
        self.children.get(id)
    }

    #[must_use]
    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Number of nodes in this subtree, including this one.
    #[must_use]
    pub fn size(&self) -> usize {
        1 + self.children.values().map(Node::size).sum::<usize>()
    }

    /// Height of this subtree; a leaf has height 1.
    #[must_use]
    pub fn height(&self) -> usize {
        1 + self.children.values().map(Node::height).max().unwrap_or(0)
    }

    /// Identities of this node and every descendant, pre-order.
    #[must_use]
    pub fn identities(&self) -> Vec<NodeIdentity> {
        let mut out = Vec::with_capacity(self.size());
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            out.push(node.identity);
            stack.extend(node.children.values().rev());
        }
        out
    }
}

impl<K: PartialEq, V: PartialEq> Node<K, V> {
    /// Compare whole subtrees by id and value.
    #[must_use]
    pub fn eq_subtree(&self, other: &Node<K, V>) -> bool {
        self == other
            && self.children.len() == other.children.len()
            && self
                .children
                .values()
                .zip(other.children.values())
                .all(|(a, b)| a.eq_subtree(b))
    }
}

impl<K: PartialEq, V: PartialEq> PartialEq for Node<K, V> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.value == other.value
    }
}

impl<K: Ord + Clone, V: Clone> Clone for Node<K, V> {
    fn clone(&self) -> Self {
        Self {
            identity: NodeIdentity::fresh(),
            id: self.id.clone(),
            value: self.value.clone(),
            revision: self.revision,
            children: self
                .children
                .iter()
                .map(|(key, child)| (key.clone(), child.clone()))
                .collect(),
        }
    }
}

/// Children are encoded as a JSON array; keys are recovered from each child's id.
mod children_seq {
    use std::collections::BTreeMap;
    use std::collections::btree_map::Entry;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use super::Node;

    pub(super) fn serialize<K, V, S>(
        children: &BTreeMap<K, Node<K, V>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error>
    where
        K: Serialize,
        V: Serialize,
        S: Serializer,
    {
        serializer.collect_seq(children.values())
    }

    pub(super) fn deserialize<'de, K, V, D>(
        deserializer: D,
    ) -> Result<BTreeMap<K, Node<K, V>>, D::Error>
    where
        K: Ord + Clone + Deserialize<'de>,
        V: Deserialize<'de>,
        D: Deserializer<'de>,
    {
        let list = Vec::<Node<K, V>>::deserialize(deserializer)?;
        let mut children = BTreeMap::new();
        for node in list {
            match children.entry(node.id.clone()) {
                Entry::Vacant(slot) => {
                    slot.insert(node);
                }
                Entry::Occupied(_) => {
                    tracing::warn!(
                        identity = %node.identity,
                        "duplicate sibling id in input, keeping first"
                    );
                }
            }
        }
        Ok(children)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Node<String, i32> {
        Node::new("A1".to_string())
            .with_value(1)
            .child(
                Node::new("B1".to_string())
                    .with_value(2)
                    .child(Node::new("C1".to_string()).with_value(4))
                    .child(Node::new("C2".to_string()).with_value(5)),
            )
            .child(Node::new("B2".to_string()).with_value(3))
    }

    #[test]
    fn builder_basics() {
        let node = sample();
        assert_eq!(node.id(), "A1");
        assert_eq!(node.value(), Some(&1));
        assert_eq!(node.revision(), 1);
        assert_eq!(node.child_count(), 2);
        assert_eq!(node.size(), 5);
        assert_eq!(node.height(), 3);
        assert!(!node.is_leaf());
    }

    #[test]
    fn duplicate_child_ids_keep_first() {
        let node: Node<&str, i32> = Node::new("A")
            .child(Node::new("B").with_value(1))
            .child(Node::new("B").with_value(2));
        assert_eq!(node.child_count(), 1);
        assert_eq!(node.get_child(&"B").and_then(Node::value), Some(&1));
    }

    #[test]
    fn equality_is_id_and_value() {
        let a: Node<&str, i32> = Node::new("A").with_value(1).child(Node::new("X"));
        let b: Node<&str, i32> = Node::new("A").with_value(1);
        assert_eq!(a, b);
        assert!(!a.eq_subtree(&b));
        assert_ne!(a.identity(), b.identity());
        assert_ne!(a, Node::new("A").with_value(2));
    }

    #[test]
    fn clone_has_fresh_identities() {
        let original = sample();
        let copy = original.clone();
        assert!(copy.eq_subtree(&original));
        let before = original.identities();
        for identity in copy.identities() {
            assert!(!before.contains(&identity));
        }
    }

    #[test]
    fn identities_are_pre_order() {
        let node = sample();
        let b1 = node.get_child(&"B1".to_string()).unwrap();
        let ids = node.identities();
        assert_eq!(ids[0], node.identity());
        assert_eq!(ids[1], b1.identity());
        assert_eq!(ids.len(), 5);
    }

    #[test]
    fn json_children_are_an_array() {
        let node: Node<String, i32> = Node::new("A".to_string())
            .child(Node::new("B".to_string()).with_value(2));
        let json = serde_json::to_value(&node).unwrap();
        assert!(json["children"].is_array());
        assert_eq!(json["children"][0]["id"], "B");
        let back: Node<String, i32> = serde_json::from_value(json).unwrap();
        assert!(back.eq_subtree(&node));
        assert_eq!(back.identities(), node.identities());
    }

    #[test]
    fn json_defaults_fill_missing_fields() {
        let back: Node<String, i32> =
            serde_json::from_str(r#"{"id":"A","children":[{"id":"B"},{"id":"B","value":3}]}"#)
                .unwrap();
        assert_eq!(back.revision(), 1);
        assert_eq!(back.child_count(), 1);
        assert_eq!(back.get_child(&"B".to_string()).unwrap().value(), None);
    }
}
