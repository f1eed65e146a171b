//! Sibling ordering and traversal orders.

use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::arena::Arena;
use crate::callback;
use crate::identity::NodeIdentity;
use crate::view::NodeRef;

/// Caller-supplied three-way comparison between two sibling nodes.
pub type Comparator<K, V> = Rc<dyn Fn(NodeRef<'_, K, V>, NodeRef<'_, K, V>) -> Ordering>;

/// Order in which a walk visits nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TraversalOrder {
    /// A node, then its children.
    #[default]
    PreOrder,
    /// A node's children, then the node.
    PostOrder,
    /// Level by level, starting at the top.
    LevelOrder,
    /// Level by level, starting at the deepest level.
    LevelOrderFromBottom,
}

/// Which sibling ordering is active, without the comparator itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderingKind {
    #[default]
    Unordered,
    Natural,
    Custom,
}

/// How siblings are ordered during traversal and search.
pub enum SiblingOrder<K, V> {
    /// Storage order. Stable for a given in-memory state, unspecified otherwise.
    Unordered,
    /// By id; ties broken by value when `by_value` is set.
    Natural {
        by_value: Option<fn(&V, &V) -> Ordering>,
    },
    /// By a caller-supplied comparator. A comparator that panics counts as `Equal`.
    Custom(Comparator<K, V>),
}

impl<K, V> SiblingOrder<K, V> {
    /// Natural order by id only.
    #[must_use]
    pub fn natural() -> Self {
        Self::Natural { by_value: None }
    }

    /// Natural order by id, then by value.
    #[must_use]
    pub fn natural_by_value() -> Self
    where
        V: Ord,
    {
        Self::Natural {
            by_value: Some(V::cmp),
        }
    }

    /// Order siblings with `comparator`.
    #[must_use]
    pub fn custom(
        comparator: impl Fn(NodeRef<'_, K, V>, NodeRef<'_, K, V>) -> Ordering + 'static,
    ) -> Self {
        Self::Custom(Rc::new(comparator))
    }

    #[must_use]
    pub fn kind(&self) -> OrderingKind {
        match self {
            Self::Unordered => OrderingKind::Unordered,
            Self::Natural { .. } => OrderingKind::Natural,
            Self::Custom(_) => OrderingKind::Custom,
        }
    }
}

impl<K: Ord + Clone + 'static, V: 'static> SiblingOrder<K, V> {
    /// Compare two nodes under this ordering.
    pub fn compare(&self, a: NodeRef<'_, K, V>, b: NodeRef<'_, K, V>) -> Ordering {
        match self {
            Self::Unordered => Ordering::Equal,
            Self::Natural { by_value } => natural_cmp(a, b, *by_value),
            Self::Custom(comparator) => {
                callback::compare("sibling comparator", |x, y| comparator(x, y), a, b)
            }
        }
    }

    /// Stable sort of sibling identities. Unordered leaves storage order alone.
    ///
    /// A comparator that is not a total order (for example one that panics for
    /// some pairs, which then compare `Equal`) still yields a permutation of the
    /// input. The result is deterministic for the same input, and pairs compared
    /// `Equal` keep their storage order.
    pub(crate) fn sort(&self, arena: &Arena<K, V>, identities: &mut [NodeIdentity]) {
        if matches!(self, Self::Unordered) {
            return;
        }
        merge_sort(identities, |a, b| {
            self.compare(NodeRef::new(arena, a), NodeRef::new(arena, b))
        });
    }
}

// ── Merge sort ──

/// Bottom-up merge sort. Unlike `slice::sort_by`, it never checks the
/// comparator for consistency, so it cannot panic on a partial order.
fn merge_sort<F>(items: &mut [NodeIdentity], mut cmp: F)
where
    F: FnMut(NodeIdentity, NodeIdentity) -> Ordering,
{
    let len = items.len();
    if len < 2 {
        return;
    }
    let mut scratch = items.to_vec();
    let mut width = 1;
    while width < len {
        let mut start = 0;
        while start < len {
            let mid = (start + width).min(len);
            let end = (start + 2 * width).min(len);
            let (mut left, mut right) = (start, mid);
            for slot in &mut scratch[start..end] {
                let take_right = right < end
                    && (left >= mid || cmp(items[left], items[right]) == Ordering::Greater);
                if take_right {
                    *slot = items[right];
                    right += 1;
                } else {
                    *slot = items[left];
                    left += 1;
                }
            }
            start = end;
        }
        items.copy_from_slice(&scratch);
        width *= 2;
    }
}

/// Id first, then absent value before present value, then `by_value` if given.
pub(crate) fn natural_cmp<K: Ord + Clone + 'static, V: 'static>(
    a: NodeRef<'_, K, V>,
    b: NodeRef<'_, K, V>,
    by_value: Option<fn(&V, &V) -> Ordering>,
) -> Ordering {
    a.id().cmp(b.id()).then_with(|| match (a.value(), b.value()) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(x), Some(y)) => by_value.map_or(Ordering::Equal, |cmp| cmp(x, y)),
    })
}

impl<K, V> Clone for SiblingOrder<K, V> {
    fn clone(&self) -> Self {
        match self {
            Self::Unordered => Self::Unordered,
            Self::Natural { by_value } => Self::Natural {
                by_value: *by_value,
            },
            Self::Custom(comparator) => Self::Custom(Rc::clone(comparator)),
        }
    }
}

impl<K, V> Default for SiblingOrder<K, V> {
    fn default() -> Self {
        Self::Unordered
    }
}

impl<K, V> fmt::Debug for SiblingOrder<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unordered => f.write_str("Unordered"),
            Self::Natural { by_value } => f
                .debug_struct("Natural")
                .field("by_value", &by_value.is_some())
                .finish(),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}
