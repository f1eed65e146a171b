//! Opaque identity tokens.
//!
//! Identities are bookkeeping only. They address nodes inside a tree's arena
//! and key index entries, but never take part in domain equality.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity token of a single node.
///
/// Assigned when a node is created or cloned, kept across JSON round-trips.
/// Within a [`Tree`](crate::Tree) it is also the handle used to address the node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeIdentity(Uuid);

impl NodeIdentity {
    /// Generate a fresh, globally unique identity.
    #[must_use]
    pub fn fresh() -> Self {
        Self(Uuid::new_v4())
    }

    /// Raw UUID behind this identity.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for NodeIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node:{}", self.0.simple())
    }
}

/// Identity token of a tree instance. Fresh for every construction, clone and decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TreeIdentity(Uuid);

impl TreeIdentity {
    #[must_use]
    pub fn fresh() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for TreeIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tree:{}", self.0.simple())
    }
}
