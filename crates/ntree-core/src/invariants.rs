//! Structural self-check.
//!
//! [`Tree::invariant_report`] inspects the arena and every index and returns
//! a sorted list of findings. A tree built only through the public API
//! reports nothing; index findings point at key functions that read beyond
//! a node's neighborhood.

use serde::{Deserialize, Serialize};

use crate::identity::NodeIdentity;
use crate::index::IndexFindingCode;
use crate::tree::Tree;

/// Severity for one invariant finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvariantSeverity {
    Error,
    Warning,
}

/// Stable code for invariant findings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvariantCode {
    MissingRoot,
    RootHasParent,
    MissingParent,
    MissingChild,
    ParentMismatch,
    UnlistedChild,
    ChildKeyMismatch,
    CycleDetected,
    IndexMissingEntry,
    IndexStaleEntry,
    IndexUnexpectedEntry,
    IndexCorrupt,
}

/// One invariant finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvariantIssue {
    pub code: InvariantCode,
    pub severity: InvariantSeverity,
    pub node: Option<NodeIdentity>,
    pub related_node: Option<NodeIdentity>,
    pub message: String,
}

/// Every finding of one [`Tree::invariant_report`] call.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct InvariantReport {
    pub issues: Vec<InvariantIssue>,
}

impl InvariantReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    /// Return true if any error-level finding exists.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.issues
            .iter()
            .any(|issue| issue.severity == InvariantSeverity::Error)
    }

    /// Codes present in the report, deduplicated, in code order.
    #[must_use]
    pub fn codes(&self) -> Vec<InvariantCode> {
        let mut codes: Vec<_> = self.issues.iter().map(|issue| issue.code).collect();
        codes.dedup();
        codes
    }
}

fn push_issue(
    issues: &mut Vec<InvariantIssue>,
    code: InvariantCode,
    severity: InvariantSeverity,
    node: Option<NodeIdentity>,
    related_node: Option<NodeIdentity>,
    message: impl Into<String>,
) {
    issues.push(InvariantIssue {
        code,
        severity,
        node,
        related_node,
        message: message.into(),
    });
}

impl<K: Ord + Clone + 'static, V: 'static> Tree<K, V> {
    /// Inspect arena links and index tables.
    #[must_use]
    pub fn invariant_report(&self) -> InvariantReport {
        use InvariantSeverity::{Error, Warning};

        let arena = &self.arena;
        let mut issues = Vec::new();

        if let Some(root) = arena.root {
            match arena.record(root) {
                None => push_issue(
                    &mut issues,
                    InvariantCode::MissingRoot,
                    Error,
                    Some(root),
                    None,
                    format!("root {root} is not in the arena"),
                ),
                Some(record) => {
                    if let Some(parent) = record.parent {
                        push_issue(
                            &mut issues,
                            InvariantCode::RootHasParent,
                            Error,
                            Some(root),
                            Some(parent),
                            format!("root {root} must not have parent {parent}"),
                        );
                    }
                }
            }
        }

        for (&identity, record) in &arena.nodes {
            for (key, &child) in &record.children {
                let Some(child_record) = arena.record(child) else {
                    push_issue(
                        &mut issues,
                        InvariantCode::MissingChild,
                        Error,
                        Some(identity),
                        Some(child),
                        format!("{identity} lists child {child} which is not in the arena"),
                    );
                    continue;
                };
                if child_record.parent != Some(identity) {
                    push_issue(
                        &mut issues,
                        InvariantCode::ParentMismatch,
                        Error,
                        Some(child),
                        Some(identity),
                        format!("{child} is listed by {identity} but points elsewhere"),
                    );
                }
                if child_record.id != *key {
                    push_issue(
                        &mut issues,
                        InvariantCode::ChildKeyMismatch,
                        Error,
                        Some(child),
                        Some(identity),
                        format!("{child} is filed under a key that differs from its id"),
                    );
                }
            }

            if let Some(parent) = record.parent {
                match arena.record(parent) {
                    None => push_issue(
                        &mut issues,
                        InvariantCode::MissingParent,
                        Error,
                        Some(identity),
                        Some(parent),
                        format!("{identity} points at parent {parent} which is not in the arena"),
                    ),
                    Some(parent_record) => {
                        if parent_record.children.get(&record.id) != Some(&identity) {
                            push_issue(
                                &mut issues,
                                InvariantCode::UnlistedChild,
                                Error,
                                Some(identity),
                                Some(parent),
                                format!("{identity} points at {parent} which does not list it"),
                            );
                        }
                    }
                }
            }

            let mut steps = 0;
            let mut current = record.parent;
            while let Some(node) = current {
                steps += 1;
                if node == identity || steps > arena.nodes.len() {
                    push_issue(
                        &mut issues,
                        InvariantCode::CycleDetected,
                        Error,
                        Some(identity),
                        None,
                        format!("parent chain of {identity} loops"),
                    );
                    break;
                }
                current = arena.parent_of(node);
            }
        }

        for index in self.indexes.iter() {
            for finding in index.audit(arena) {
                let (code, severity) = match finding.code {
                    IndexFindingCode::Missing => (InvariantCode::IndexMissingEntry, Warning),
                    IndexFindingCode::Stale => (InvariantCode::IndexStaleEntry, Warning),
                    IndexFindingCode::Unexpected => (InvariantCode::IndexUnexpectedEntry, Warning),
                    IndexFindingCode::Corrupt => (InvariantCode::IndexCorrupt, Error),
                };
                push_issue(
                    &mut issues,
                    code,
                    severity,
                    Some(finding.node),
                    None,
                    format!(
                        "index {:?}: {:?} entry for {}",
                        finding.index, finding.code, finding.node
                    ),
                );
            }
        }

        issues.sort_by(|left, right| {
            (left.code, left.node, left.related_node, &left.message).cmp(&(
                right.code,
                right.node,
                right.related_node,
                &right.message,
            ))
        });
        InvariantReport { issues }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Node;

    fn tree() -> Tree<&'static str, i32> {
        let mut tree = Tree::new("T");
        let root = tree.adopt(
            Node::new("A")
                .with_value(1)
                .child(Node::new("B").with_value(2).child(Node::new("C").with_value(3))),
        );
        tree.add_root(root);
        tree
    }

    #[test]
    fn api_built_tree_is_clean() {
        let mut tree = tree();
        tree.add_index("by_value", |n| n.value().copied());
        let b = tree.find_first_with_id(&"B").unwrap().identity();
        tree.set_child(b, &Node::new("D").with_value(4)).unwrap();
        tree.remove_child(b, &"C").unwrap();
        assert!(tree.invariant_report().is_clean());
    }

    #[test]
    fn locality_violation_shows_up_as_stale_entry() {
        let mut tree = tree();
        tree.add_index("grandparent", |n| {
            n.parent().and_then(|p| p.parent()).map(|g| *g.id())
        });
        let root = tree.root_identity().unwrap();
        assert!(tree.replace_id(root, "Z").unwrap());

        let report = tree.invariant_report();
        assert!(!report.has_errors());
        assert_eq!(report.codes(), [InvariantCode::IndexStaleEntry]);
        let c = tree.find_first_with_id(&"C").unwrap().identity();
        assert_eq!(report.issues[0].node, Some(c));

        tree.recreate_indexes();
        assert!(tree.invariant_report().is_clean());
    }

    #[test]
    fn broken_links_are_reported() {
        let mut tree = tree();
        let b = tree.find_first_with_id(&"B").unwrap().identity();
        let c = tree.find_first_with_id(&"C").unwrap().identity();
        tree.arena.record_mut(c).unwrap().parent = None;
        tree.arena.record_mut(b).unwrap().id = "X";

        let report = tree.invariant_report();
        assert!(report.has_errors());
        assert_eq!(
            report.codes(),
            [
                InvariantCode::ParentMismatch,
                InvariantCode::UnlistedChild,
                InvariantCode::ChildKeyMismatch,
            ]
        );
    }

    #[test]
    fn dangling_handles_are_reported() {
        let mut tree = tree();
        let b = tree.find_first_with_id(&"B").unwrap().identity();
        let ghost = NodeIdentity::fresh();
        tree.arena.record_mut(b).unwrap().children.insert("G", ghost);
        tree.arena.record_mut(b).unwrap().parent = Some(NodeIdentity::fresh());

        let codes = tree.invariant_report().codes();
        assert!(codes.contains(&InvariantCode::MissingChild));
        assert!(codes.contains(&InvariantCode::MissingParent));
    }
}
