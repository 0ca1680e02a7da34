//! Ordered index: a left-leaning red-black tree with order statistics.
//!
//! Responsibilities:
//! - keep keys ordered by an injected comparator
//! - answer rank/select/floor/ceil in O(log n) using subtree sizes
//! - expose a cached flattened snapshot for repeated iteration between mutations
//!
//! The index knows nothing about rendering; batchers key it by `scene::SortKey`.

mod node;
mod tree;

use core::cmp::Ordering;

pub use tree::{Iter, OrderedIndex};

/// Total order used by an [`OrderedIndex`].
///
/// Implementations must be a strict total order: antisymmetric, transitive and
/// returning `Equal` only for keys that identify the same entry.
pub trait Comparator<K: ?Sized> {
    fn compare(&self, a: &K, b: &K) -> Ordering;
}

/// Comparator delegating to the key's `Ord` implementation.
#[derive(Debug, Copy, Clone, Default)]
pub struct Natural;

impl<K: Ord + ?Sized> Comparator<K> for Natural {
    #[inline]
    fn compare(&self, a: &K, b: &K) -> Ordering {
        a.cmp(b)
    }
}

impl<K: ?Sized, F> Comparator<K> for F
where
    F: Fn(&K, &K) -> Ordering,
{
    #[inline]
    fn compare(&self, a: &K, b: &K) -> Ordering {
        self(a, b)
    }
}

/// Visiting order for [`OrderedIndex::traverse`].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum TraversalOrder {
    /// Node, then left subtree, then right subtree.
    PreOrder,
    /// Ascending key order.
    InOrder,
    /// Left subtree, right subtree, then node.
    PostOrder,
}
