#![forbid(unsafe_code)]

//! Core: a mutable N-ary tree with unique sibling ids, optional values and
//! secondary indexes that stay current as the tree is edited.
//!
//! # Model
//!
//! A [`Tree`] owns every node it knows about in an arena. Nodes are
//! addressed by [`NodeIdentity`] handles and read through [`NodeRef`] views;
//! [`Node`] is the owned, portable form used for building hierarchies,
//! receiving removed subtrees and JSON encoding.
//!
//! ```
//! use ntree_core::{Node, Tree};
//!
//! let mut tree: Tree<&str, u32> = Tree::new("inventory");
//! let root = tree.adopt(
//!     Node::new("warehouse")
//!         .child(Node::new("shelf-a").with_value(12))
//!         .child(Node::new("shelf-b").with_value(7)),
//! );
//! assert!(tree.add_root(root));
//! tree.add_index("stock", |n| n.value().copied());
//!
//! let shelf_b = tree.find_first_with_id(&"shelf-b").unwrap().identity();
//! tree.set_value(shelf_b, Some(3)).unwrap();
//! assert_eq!(tree.nodes_in_index("stock", &3u32).unwrap().len(), 1);
//! ```
//!
//! # Index locality
//!
//! After an edit only the edited node, its parent and its direct children
//! are re-keyed. A key function must therefore read nothing beyond that
//! neighborhood. Violations are not detected at edit time; use
//! [`Tree::audit_index`] or [`Tree::invariant_report`] to find stale entries
//! and [`Tree::recreate_indexes`] to repair them.
//!
//! # Threading
//!
//! Trees are single-writer and neither `Send` nor `Sync`.

mod arena;
pub mod callback;
pub mod cloning;
pub mod codec;
mod edit;
pub mod error;
pub mod identity;
pub mod index;
pub mod invariants;
pub mod nca;
pub mod node;
pub mod order;
pub mod tree;
pub mod view;

pub use cloning::{ValueCloning, ValueCloningConfig, ValueCloningMode};
pub use codec::{TREE_SCHEMA_VERSION, TreeSnapshot};
pub use error::{CodecError, TreeError};
pub use identity::{NodeIdentity, TreeIdentity};
pub use index::{IndexFinding, IndexFindingCode, KeyFn};
pub use invariants::{InvariantCode, InvariantIssue, InvariantReport, InvariantSeverity};
pub use nca::NearestCommonAncestor;
pub use node::Node;
pub use order::{Comparator, OrderingKind, SiblingOrder, TraversalOrder};
pub use tree::{Tree, TreeConfig};
pub use view::NodeRef;
