//! Nearest common ancestor of two nodes and the paths through it.
//!
//! Both nodes must hang below the same top node: a root, or a node without
//! a parent is never part of a valid pair. When one node descends from the
//! other, the common ancestor is the *parent* of the upper node, so the pair
//! still has two distinct arms. Otherwise it is the lowest node shared by both
//! ancestor chains, compared by identity.

use rustc_hash::FxHashSet;

use crate::identity::NodeIdentity;
use crate::tree::Tree;
use crate::view::NodeRef;

/// Paths between two nodes of one tree, computed once at construction.
///
/// An invalid pair stays invalid: every accessor returns `None`.
pub struct NearestCommonAncestor<'a, K, V> {
    tree: &'a Tree<K, V>,
    paths: Option<Paths>,
}

struct Paths {
    a_to_ancestor: Vec<NodeIdentity>,
    b_to_ancestor: Vec<NodeIdentity>,
    a_to_b: Vec<NodeIdentity>,
}

impl<'a, K: Ord + Clone + 'static, V: 'static> NearestCommonAncestor<'a, K, V> {
    #[must_use]
    pub fn new(tree: &'a Tree<K, V>, a: NodeIdentity, b: NodeIdentity) -> Self {
        let paths = Self::compute(tree, a, b);
        if paths.is_none() {
            tracing::trace!(tree = %tree.identity, %a, %b, "no common ancestor");
        }
        Self { tree, paths }
    }

    fn compute(tree: &Tree<K, V>, a: NodeIdentity, b: NodeIdentity) -> Option<Paths> {
        let arena = &tree.arena;
        let (Some(parent_a), Some(parent_b)) = (arena.parent_of(a), arena.parent_of(b)) else {
            return None;
        };
        if arena.top(a) != arena.top(b) {
            return None;
        }
        let chain_a = arena.ancestry(a);
        let chain_b = arena.ancestry(b);
        let upto = |chain: &[NodeIdentity], end: NodeIdentity| -> Vec<NodeIdentity> {
            let stop = chain.iter().position(|n| *n == end).unwrap_or(chain.len() - 1);
            chain[..=stop].to_vec()
        };

        if a != b && chain_b.contains(&a) {
            let mut a_to_b = upto(&chain_b, a);
            a_to_b.reverse();
            return Some(Paths {
                a_to_ancestor: vec![a, parent_a],
                b_to_ancestor: upto(&chain_b, parent_a),
                a_to_b,
            });
        }
        if a != b && chain_a.contains(&b) {
            return Some(Paths {
                a_to_ancestor: upto(&chain_a, parent_b),
                b_to_ancestor: vec![b, parent_b],
                a_to_b: upto(&chain_a, b),
            });
        }

        let on_b: FxHashSet<NodeIdentity> = chain_b.iter().copied().collect();
        let ancestor = chain_a.iter().copied().find(|n| on_b.contains(n))?;
        let a_to_ancestor = upto(&chain_a, ancestor);
        let b_to_ancestor = upto(&chain_b, ancestor);
        let mut a_to_b = a_to_ancestor[..a_to_ancestor.len() - 1].to_vec();
        a_to_b.extend(b_to_ancestor.iter().rev());
        Some(Paths {
            a_to_ancestor,
            b_to_ancestor,
            a_to_b,
        })
    }

    fn views(&self, identities: impl IntoIterator<Item = NodeIdentity>) -> Vec<NodeRef<'a, K, V>> {
        identities
            .into_iter()
            .filter_map(|n| self.tree.node(n))
            .collect()
    }

    #[must_use]
    pub fn has_common_ancestor(&self) -> bool {
        self.paths.is_some()
    }

    #[must_use]
    pub fn common_ancestor(&self) -> Option<NodeRef<'a, K, V>> {
        let paths = self.paths.as_ref()?;
        paths.a_to_ancestor.last().and_then(|n| self.tree.node(*n))
    }

    /// A, its ancestors, ending at the common ancestor.
    #[must_use]
    pub fn nodes_from_a_to_ancestor(&self) -> Option<Vec<NodeRef<'a, K, V>>> {
        let paths = self.paths.as_ref()?;
        Some(self.views(paths.a_to_ancestor.iter().copied()))
    }

    /// B, its ancestors, ending at the common ancestor.
    #[must_use]
    pub fn nodes_from_b_to_ancestor(&self) -> Option<Vec<NodeRef<'a, K, V>>> {
        let paths = self.paths.as_ref()?;
        Some(self.views(paths.b_to_ancestor.iter().copied()))
    }

    #[must_use]
    pub fn nodes_from_ancestor_to_a(&self) -> Option<Vec<NodeRef<'a, K, V>>> {
        let paths = self.paths.as_ref()?;
        Some(self.views(paths.a_to_ancestor.iter().rev().copied()))
    }

    #[must_use]
    pub fn nodes_from_ancestor_to_b(&self) -> Option<Vec<NodeRef<'a, K, V>>> {
        let paths = self.paths.as_ref()?;
        Some(self.views(paths.b_to_ancestor.iter().rev().copied()))
    }

    /// Shortest path from A to B.
    #[must_use]
    pub fn nodes_from_a_to_b(&self) -> Option<Vec<NodeRef<'a, K, V>>> {
        let paths = self.paths.as_ref()?;
        Some(self.views(paths.a_to_b.iter().copied()))
    }

    #[must_use]
    pub fn nodes_from_b_to_a(&self) -> Option<Vec<NodeRef<'a, K, V>>> {
        let paths = self.paths.as_ref()?;
        Some(self.views(paths.a_to_b.iter().rev().copied()))
    }
}

impl<K: Ord + Clone + 'static, V: 'static> Tree<K, V> {
    /// Nearest common ancestor of `a` and `b`. Handles that do not resolve in
    /// this tree give an invalid result.
    #[must_use]
    pub fn nearest_common_ancestor(
        &self,
        a: NodeIdentity,
        b: NodeIdentity,
    ) -> NearestCommonAncestor<'_, K, V> {
        NearestCommonAncestor::new(self, a, b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Node;

    type T = Tree<&'static str, ()>;

    // A1{B1{C1, C2{D1}}, B2{C3}}
    fn tree() -> T {
        let mut tree = Tree::new("T");
        let root = tree.adopt(
            Node::new("A1")
                .child(
                    Node::new("B1")
                        .child(Node::new("C1"))
                        .child(Node::new("C2").child(Node::new("D1"))),
                )
                .child(Node::new("B2").child(Node::new("C3"))),
        );
        assert!(tree.add_root(root));
        tree
    }

    fn find(tree: &T, id: &'static str) -> NodeIdentity {
        tree.find_first_with_id(&id).unwrap().identity()
    }

    fn ids(nodes: Option<Vec<NodeRef<'_, &'static str, ()>>>) -> Vec<&'static str> {
        nodes.unwrap().iter().map(|n| *n.id()).collect()
    }

    #[test]
    fn divergent_nodes() {
        let tree = tree();
        let nca = tree.nearest_common_ancestor(find(&tree, "D1"), find(&tree, "C3"));
        assert!(nca.has_common_ancestor());
        assert_eq!(*nca.common_ancestor().unwrap().id(), "A1");
        assert_eq!(ids(nca.nodes_from_a_to_ancestor()), ["D1", "C2", "B1", "A1"]);
        assert_eq!(ids(nca.nodes_from_b_to_ancestor()), ["C3", "B2", "A1"]);
        assert_eq!(ids(nca.nodes_from_ancestor_to_a()), ["A1", "B1", "C2", "D1"]);
        assert_eq!(ids(nca.nodes_from_ancestor_to_b()), ["A1", "B2", "C3"]);
        assert_eq!(ids(nca.nodes_from_a_to_b()), ["D1", "C2", "B1", "A1", "B2", "C3"]);
        assert_eq!(ids(nca.nodes_from_b_to_a()), ["C3", "B2", "A1", "B1", "C2", "D1"]);
    }

    #[test]
    fn cousins_meet_below_root() {
        let tree = tree();
        let nca = tree.nearest_common_ancestor(find(&tree, "D1"), find(&tree, "C1"));
        assert_eq!(*nca.common_ancestor().unwrap().id(), "B1");
        assert_eq!(ids(nca.nodes_from_a_to_b()), ["D1", "C2", "B1", "C1"]);
    }

    #[test]
    fn descendant_pair_uses_parent_of_upper_node() {
        let tree = tree();
        let nca = tree.nearest_common_ancestor(find(&tree, "D1"), find(&tree, "B1"));
        assert_eq!(*nca.common_ancestor().unwrap().id(), "A1");
        assert_eq!(ids(nca.nodes_from_a_to_ancestor()), ["D1", "C2", "B1", "A1"]);
        assert_eq!(ids(nca.nodes_from_b_to_ancestor()), ["B1", "A1"]);
        assert_eq!(ids(nca.nodes_from_a_to_b()), ["D1", "C2", "B1"]);

        let nca = tree.nearest_common_ancestor(find(&tree, "B1"), find(&tree, "D1"));
        assert_eq!(ids(nca.nodes_from_a_to_ancestor()), ["B1", "A1"]);
        assert_eq!(ids(nca.nodes_from_b_to_ancestor()), ["D1", "C2", "B1", "A1"]);
        assert_eq!(ids(nca.nodes_from_a_to_b()), ["B1", "C2", "D1"]);
    }

    #[test]
    fn siblings_through_root() {
        let mut tree: T = Tree::new("T");
        let root = tree.adopt(
            Node::new("A1")
                .child(Node::new("B1"))
                .child(Node::new("B2").child(Node::new("C1"))),
        );
        tree.add_root(root);
        let nca = tree.nearest_common_ancestor(find(&tree, "B1"), find(&tree, "C1"));
        assert_eq!(*nca.common_ancestor().unwrap().id(), "A1");
        assert_eq!(ids(nca.nodes_from_a_to_b()), ["B1", "A1", "B2", "C1"]);
    }

    #[test]
    fn invalid_pairs() {
        let mut tree = tree();
        let root = tree.root_identity().unwrap();
        let nca = tree.nearest_common_ancestor(root, root);
        assert!(!nca.has_common_ancestor());
        assert!(nca.common_ancestor().is_none());
        assert!(nca.nodes_from_a_to_b().is_none());

        let b1 = find(&tree, "B1");
        assert!(!tree.nearest_common_ancestor(root, b1).has_common_ancestor());
        assert!(!tree.nearest_common_ancestor(b1, NodeIdentity::fresh()).has_common_ancestor());

        let orphan = tree.adopt(Node::new("X").child(Node::new("Y")));
        let y = tree.node(orphan).unwrap().child(&"Y").unwrap().identity();
        assert!(!tree.nearest_common_ancestor(y, b1).has_common_ancestor());
    }

    #[test]
    fn same_inner_node_is_its_own_ancestor() {
        let tree = tree();
        let c2 = find(&tree, "C2");
        let nca = tree.nearest_common_ancestor(c2, c2);
        assert!(nca.has_common_ancestor());
        assert_eq!(*nca.common_ancestor().unwrap().id(), "C2");
        assert_eq!(ids(nca.nodes_from_a_to_b()), ["C2"]);
    }

    #[test]
    fn works_inside_detached_hierarchy() {
        let mut tree = tree();
        let top = tree.adopt(Node::new("X").child(Node::new("Y")).child(Node::new("Z")));
        let y = tree.node(top).unwrap().child(&"Y").unwrap().identity();
        let z = tree.node(top).unwrap().child(&"Z").unwrap().identity();
        let nca = tree.nearest_common_ancestor(y, z);
        assert_eq!(*nca.common_ancestor().unwrap().id(), "X");
    }
}
