#![forbid(unsafe_code)]

//! Public facade for the ntree crates.
//!
//! Re-exports the tree model from `ntree-core`, the diagram renderer from
//! `ntree-graph` (feature `graph`, on by default) and a prelude.
//!
//! ```
//! use ntree::prelude::*;
//!
//! fn build() -> Result<Tree<&'static str, u32>> {
//!     let mut tree = Tree::new("inventory");
//!     tree.set_root(&Node::new("shelf"));
//!     let shelf = tree.root_identity().ok_or(Error::EmptyTree)?;
//!     tree.set_child(shelf, &Node::new("bolts").with_value(40))?;
//!     Ok(tree)
//! }
//!
//! let tree = build().unwrap();
//! assert_eq!(tree.size(), 2);
//! ```

use std::fmt;

// --- Core re-exports -------------------------------------------------------

pub use ntree_core::{
    CodecError, Comparator, InvariantCode, InvariantIssue, InvariantReport, InvariantSeverity,
    IndexFinding, IndexFindingCode, NearestCommonAncestor, Node, NodeIdentity, NodeRef,
    OrderingKind, SiblingOrder, TREE_SCHEMA_VERSION, TraversalOrder, Tree, TreeConfig, TreeError,
    TreeIdentity, TreeSnapshot, ValueCloning, ValueCloningConfig, ValueCloningMode,
};

// --- Graph re-exports ------------------------------------------------------

#[cfg(feature = "graph")]
pub use ntree_graph::{GraphConfig, Guides, TreeGraph};

// --- Errors ---------------------------------------------------------------

/// Top-level error type.
#[derive(Debug)]
pub enum Error {
    /// A tree operation was rejected.
    Tree(TreeError),
    /// Encoding or decoding failed.
    Codec(CodecError),
    /// The operation needs a root and the tree has none.
    EmptyTree,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tree(err) => write!(f, "{err}"),
            Self::Codec(err) => write!(f, "{err}"),
            Self::EmptyTree => write!(f, "tree is empty"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Tree(err) => Some(err),
            Self::Codec(err) => Some(err),
            Self::EmptyTree => None,
        }
    }
}

impl From<TreeError> for Error {
    fn from(err: TreeError) -> Self {
        Self::Tree(err)
    }
}

impl From<CodecError> for Error {
    fn from(err: CodecError) -> Self {
        Self::Codec(err)
    }
}

/// Standard result type for ntree APIs.
pub type Result<T> = std::result::Result<T, Error>;

// --- Prelude --------------------------------------------------------------

pub mod prelude {
    pub use crate::{
        Error, NearestCommonAncestor, Node, NodeIdentity, NodeRef, Result, SiblingOrder,
        TraversalOrder, Tree, TreeConfig, ValueCloning,
    };

    #[cfg(feature = "graph")]
    pub use crate::{GraphConfig, Guides, TreeGraph};

    pub use crate::core;
    #[cfg(feature = "graph")]
    pub use crate::graph;
}

pub use ntree_core as core;
#[cfg(feature = "graph")]
pub use ntree_graph as graph;

#[cfg(test)]
mod tests {
    use super::prelude::*;
    use super::{CodecError, TreeError};

    #[test]
    fn errors_convert() {
        let mut tree: Tree<&str, ()> = Tree::new("T");
        let err: Error = tree.remove(NodeIdentity::fresh()).unwrap_err().into();
        assert!(matches!(err, Error::Tree(TreeError::UnknownNode { .. })));
        assert!(std::error::Error::source(&err).is_some());

        let err: Error = Tree::<String, u8>::from_json("{").unwrap_err().into();
        assert!(matches!(err, Error::Codec(CodecError::Decode { .. })));
        assert_eq!(Error::EmptyTree.to_string(), "tree is empty");
    }

    #[test]
    fn prelude_renders() {
        let mut tree: Tree<&str, ()> = Tree::new("T");
        tree.set_root(&Node::new("a").child(Node::new("b")));
        let text = TreeGraph::new(GraphConfig::default().height(1)).render(&tree);
        assert_eq!(text, "a\n└───b\n");
    }
}
