//! JSON encoding of values, nodes and trees.
//!
//! Nodes encode tree-shaped: each node carries its children as an array and
//! no back-references. Decoding a tree therefore rebuilds parent links by
//! moving the decoded root through [`Tree::reattach`]-style adoption.
//!
//! Not encoded: the tree identity (a decoded tree is a new instance), indexes
//! and custom comparators.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::cloning::{ValueCloning, ValueCloningConfig};
use crate::error::CodecError;
use crate::identity::NodeIdentity;
use crate::node::{FIRST_REVISION, Node};
use crate::order::{OrderingKind, SiblingOrder};
use crate::tree::{Tree, TreeConfig};

/// Version written into every [`TreeSnapshot`].
pub const TREE_SCHEMA_VERSION: u16 = 1;

pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<String, CodecError> {
    serde_json::to_string(value).map_err(CodecError::Encode)
}

/// Decode `text` as `T`. The descriptor only labels errors.
pub fn decode<T: DeserializeOwned>(
    text: &str,
    type_descriptor: Option<&str>,
) -> Result<T, CodecError> {
    serde_json::from_str(text).map_err(|source| CodecError::Decode {
        type_descriptor: type_descriptor.map(str::to_owned),
        source,
    })
}

/// Copy a value by encoding and decoding it.
pub fn deep_copy<T: Serialize + DeserializeOwned>(value: &T) -> Result<T, CodecError> {
    let value = serde_json::to_value(value).map_err(CodecError::Encode)?;
    Ok(serde_json::from_value(value)?)
}

/// Copy a value with its `Clone` implementation.
pub fn deep_copy_via_clone<T: Clone>(value: &T) -> T {
    value.clone()
}

/// Serialized form of a tree.
#[derive(Debug, Serialize, Deserialize)]
#[serde(bound(
    serialize = "K: Serialize, V: Serialize",
    deserialize = "K: Ord + Clone + Deserialize<'de>, V: Deserialize<'de>"
))]
pub struct TreeSnapshot<K, V> {
    pub schema_version: u16,
    pub id: K,
    #[serde(default = "first_revision")]
    pub revision: u64,
    #[serde(default)]
    pub ordering: OrderingKind,
    #[serde(default)]
    pub value_cloning: ValueCloningConfig,
    #[serde(default)]
    pub root: Option<Node<K, V>>,
}

fn first_revision() -> u64 {
    FIRST_REVISION
}

impl<K: Ord + Clone + 'static, V: 'static> Tree<K, V> {
    /// Serializable copy of the tree. Values are copied with the tree's
    /// value cloning strategy; node identities are kept.
    #[must_use]
    pub fn to_snapshot(&self) -> TreeSnapshot<K, V> {
        TreeSnapshot {
            schema_version: TREE_SCHEMA_VERSION,
            id: self.id.clone(),
            revision: self.revision,
            ordering: self.ordering_kind(),
            value_cloning: self.value_cloning().config().clone(),
            root: self.root_identity().and_then(|root| self.arena.snapshot(root)),
        }
    }

    pub fn to_json(&self) -> Result<String, CodecError>
    where
        K: Serialize,
        V: Serialize,
    {
        encode(&self.to_snapshot())
    }
}

impl<K, V> Tree<K, V>
where
    K: Ord + Clone + 'static,
    V: Clone + Serialize + DeserializeOwned + 'static,
{
    /// Build a tree from a snapshot.
    ///
    /// The tree gets a fresh identity and no indexes. A custom ordering cannot
    /// be restored and falls back to unordered.
    pub fn from_snapshot(snapshot: TreeSnapshot<K, V>) -> Result<Self, CodecError> {
        if snapshot.schema_version != TREE_SCHEMA_VERSION {
            return Err(CodecError::UnsupportedSchemaVersion {
                version: snapshot.schema_version,
            });
        }
        let ordering = match snapshot.ordering {
            OrderingKind::Unordered => SiblingOrder::Unordered,
            OrderingKind::Natural => SiblingOrder::natural(),
            OrderingKind::Custom => {
                tracing::warn!("custom ordering is not encoded, decoding as unordered");
                SiblingOrder::Unordered
            }
        };
        let config = TreeConfig::new(ValueCloning::from_config(&snapshot.value_cloning))
            .with_ordering(ordering);
        let mut tree = Self::with_config(snapshot.id, config);
        tree.revision = snapshot.revision;
        if let Some(root) = snapshot.root {
            let root = tree.adopt(root);
            tree.add_root(root);
        }
        tracing::debug!(tree = %tree.identity, size = tree.size(), "tree decoded");
        Ok(tree)
    }

    pub fn from_json(text: &str) -> Result<Self, CodecError>
    where
        K: DeserializeOwned,
    {
        Self::from_snapshot(decode(text, Some("TreeSnapshot"))?)
    }

    /// Decode a node hierarchy and adopt it as an orphan of this tree.
    pub fn adopt_json(&mut self, text: &str) -> Result<NodeIdentity, CodecError>
    where
        K: DeserializeOwned,
    {
        let node: Node<K, V> = decode(text, self.value_cloning().type_descriptor())?;
        Ok(self.adopt(node))
    }
}
