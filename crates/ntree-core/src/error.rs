//! Error types.
//!
//! Only caller mistakes that cannot be part of a normal editing workflow are
//! reported as errors: handles that do not belong to the tree, inserting a
//! node under itself, unknown or mistyped indexes, and level underflow.
//! Structural preconditions (orphans, sibling id collisions, replacing a node
//! with itself) are answered with `None`/`false`/empty results instead.

use std::fmt;

use crate::identity::NodeIdentity;

/// Errors raised by tree operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    /// A handle passed to `operation` does not resolve in this tree.
    UnknownNode {
        operation: &'static str,
        node: NodeIdentity,
    },
    /// `child` is already a literal child of `parent`.
    SelfInsertion {
        parent: NodeIdentity,
        child: NodeIdentity,
    },
    /// Levels are 1-based; `level` was below 1.
    LevelUnderflow { level: usize },
    /// No index is registered under `name`.
    UnknownIndex { name: String },
    /// The index exists but was queried with a different key type.
    IndexKeyType {
        name: String,
        expected: &'static str,
    },
}

impl TreeError {
    pub(crate) fn unknown(operation: &'static str, node: NodeIdentity) -> Self {
        Self::UnknownNode { operation, node }
    }
}

impl fmt::Display for TreeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownNode { operation, node } => {
                write!(f, "{operation}: {node} does not belong to this tree")
            }
            Self::SelfInsertion { parent, child } => {
                write!(f, "set_child: {child} is already a child of {parent}")
            }
            Self::LevelUnderflow { level } => {
                write!(f, "level {level} is invalid, levels start at 1")
            }
            Self::UnknownIndex { name } => write!(f, "no index named {name:?}"),
            Self::IndexKeyType { name, expected } => {
                write!(f, "index {name:?} is not keyed by {expected}")
            }
        }
    }
}

impl std::error::Error for TreeError {}

/// Errors raised while encoding or decoding.
#[derive(Debug)]
pub enum CodecError {
    /// The value or tree could not be encoded.
    Encode(serde_json::Error),
    /// The text could not be decoded into the requested type.
    Decode {
        type_descriptor: Option<String>,
        source: serde_json::Error,
    },
    /// The decoded snapshot uses a schema this crate does not understand.
    UnsupportedSchemaVersion { version: u16 },
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Encode(source) => write!(f, "encode failed: {source}"),
            Self::Decode {
                type_descriptor: Some(descriptor),
                source,
            } => write!(f, "decode as {descriptor} failed: {source}"),
            Self::Decode {
                type_descriptor: None,
                source,
            } => write!(f, "decode failed: {source}"),
            Self::UnsupportedSchemaVersion { version } => write!(
                f,
                "unsupported tree schema version {version} (expected {})",
                crate::codec::TREE_SCHEMA_VERSION
            ),
        }
    }
}

impl std::error::Error for CodecError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Encode(source) | Self::Decode { source, .. } => Some(source),
            Self::UnsupportedSchemaVersion { .. } => None,
        }
    }
}

impl From<serde_json::Error> for CodecError {
    fn from(source: serde_json::Error) -> Self {
        Self::Decode {
            type_descriptor: None,
            source,
        }
    }
}
