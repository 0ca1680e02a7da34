use core::cmp::Ordering;

use super::node::{
    balance, delete_min, is_left_red, is_red, move_red_left, move_red_right, rotate_right, size,
    Link, Node,
};
use super::{Comparator, Natural, TraversalOrder};

/// Keyed ordered container backed by a left-leaning red-black tree.
///
/// Performance characteristics:
/// - `insert`/`remove`/`find`/`rank`/`select`/`floor`/`ceil` are O(log n)
/// - `snapshot()` is O(n) after a mutation and O(1) until the next one
///
/// Keys must be unique under the comparator. Inserting a key that compares
/// `Equal` to a stored key replaces that entry's value.
pub struct OrderedIndex<K, V, C = Natural> {
    root: Link<K, V>,
    cmp: C,

    snapshot: Vec<(K, V)>,
    snapshot_dirty: bool,
}

impl<K: Ord, V> OrderedIndex<K, V, Natural> {
    #[inline]
    pub fn new() -> Self {
        Self::with_comparator(Natural)
    }
}

impl<K: Ord, V> Default for OrderedIndex<K, V, Natural> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, C: Comparator<K>> OrderedIndex<K, V, C> {
    pub fn with_comparator(cmp: C) -> Self {
        Self {
            root: None,
            cmp,
            snapshot: Vec::new(),
            snapshot_dirty: false,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        size(&self.root)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Removes every entry. Keeps the snapshot allocation for reuse.
    pub fn clear(&mut self) {
        self.root = None;
        self.snapshot.clear();
        self.snapshot_dirty = false;
    }

    /// Inserts `key -> value`. Returns the previous value if the key was present.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        let (mut root, replaced) = insert_at(self.root.take(), key, value, &self.cmp);
        root.red = false;
        self.root = Some(root);
        self.snapshot_dirty = true;
        replaced
    }

    /// Removes `key`. Returns `false` (and leaves the tree untouched) if absent.
    pub fn remove(&mut self, key: &K) -> bool {
        self.take(key).is_some()
    }

    /// Removes `key` and returns its value.
    pub fn take(&mut self, key: &K) -> Option<V> {
        if !self.contains(key) {
            return None;
        }
        let mut root = self.root.take()?;
        if !is_red(&root.left) && !is_red(&root.right) {
            root.red = true;
        }
        let (rest, removed) = delete_at(root, key, &self.cmp);
        self.root = rest;
        if let Some(r) = self.root.as_mut() {
            r.red = false;
        }
        self.snapshot_dirty = true;
        removed
    }

    pub fn find(&self, key: &K) -> Option<&V> {
        let mut link = &self.root;
        while let Some(n) = link {
            match self.cmp.compare(key, &n.key) {
                Ordering::Less => link = &n.left,
                Ordering::Greater => link = &n.right,
                Ordering::Equal => return Some(&n.value),
            }
        }
        None
    }

    #[inline]
    pub fn contains(&self, key: &K) -> bool {
        self.find(key).is_some()
    }

    /// Number of stored keys strictly less than `key`.
    pub fn rank(&self, key: &K) -> usize {
        let mut rank = 0;
        let mut link = &self.root;
        while let Some(n) = link {
            match self.cmp.compare(key, &n.key) {
                Ordering::Less => link = &n.left,
                Ordering::Greater => {
                    rank += 1 + size(&n.left);
                    link = &n.right;
                }
                Ordering::Equal => return rank + size(&n.left),
            }
        }
        rank
    }

    /// The key with exactly `rank` smaller keys, if `rank < len()`.
    pub fn select(&self, rank: usize) -> Option<&K> {
        let mut rank = rank;
        let mut link = &self.root;
        while let Some(n) = link {
            let left = size(&n.left);
            match rank.cmp(&left) {
                Ordering::Less => link = &n.left,
                Ordering::Greater => {
                    rank -= left + 1;
                    link = &n.right;
                }
                Ordering::Equal => return Some(&n.key),
            }
        }
        None
    }

    pub fn smallest(&self) -> Option<&K> {
        let mut n = self.root.as_ref()?;
        while let Some(l) = n.left.as_ref() {
            n = l;
        }
        Some(&n.key)
    }

    pub fn largest(&self) -> Option<&K> {
        let mut n = self.root.as_ref()?;
        while let Some(r) = n.right.as_ref() {
            n = r;
        }
        Some(&n.key)
    }

    /// Largest stored key less than or equal to `key`.
    pub fn floor(&self, key: &K) -> Option<&K> {
        let mut best = None;
        let mut link = &self.root;
        while let Some(n) = link {
            match self.cmp.compare(key, &n.key) {
                Ordering::Equal => return Some(&n.key),
                Ordering::Less => link = &n.left,
                Ordering::Greater => {
                    best = Some(&n.key);
                    link = &n.right;
                }
            }
        }
        best
    }

    /// Smallest stored key greater than or equal to `key`.
    pub fn ceil(&self, key: &K) -> Option<&K> {
        let mut best = None;
        let mut link = &self.root;
        while let Some(n) = link {
            match self.cmp.compare(key, &n.key) {
                Ordering::Equal => return Some(&n.key),
                Ordering::Greater => link = &n.right,
                Ordering::Less => {
                    best = Some(&n.key);
                    link = &n.left;
                }
            }
        }
        best
    }

    /// Calls `visitor` for every entry in the requested order.
    pub fn traverse<F>(&self, order: TraversalOrder, mut visitor: F)
    where
        F: FnMut(&K, &V),
    {
        walk(&self.root, order, &mut visitor);
    }

    /// In-order iterator. Does not touch the snapshot.
    pub fn iter(&self) -> Iter<'_, K, V> {
        let mut it = Iter {
            stack: Vec::new(),
            remaining: self.len(),
        };
        it.push_left(&self.root);
        it
    }

    /// Entries in ascending order, flattened.
    ///
    /// The buffer is owned by the index and rebuilt only after a mutation, so
    /// repeated iteration between mutations costs nothing.
    pub fn snapshot(&mut self) -> &[(K, V)]
    where
        K: Clone,
        V: Clone,
    {
        if self.snapshot_dirty {
            self.snapshot.clear();
            self.snapshot.reserve(self.len());
            walk(&self.root, TraversalOrder::InOrder, &mut |k: &K, v: &V| {
                self.snapshot.push((k.clone(), v.clone()));
            });
            self.snapshot_dirty = false;
        }
        &self.snapshot
    }

    #[cfg(test)]
    pub(super) fn root(&self) -> &Link<K, V> {
        &self.root
    }

    #[cfg(test)]
    pub(super) fn comparator(&self) -> &C {
        &self.cmp
    }
}

fn insert_at<K, V, C: Comparator<K>>(
    link: Link<K, V>,
    key: K,
    value: V,
    cmp: &C,
) -> (Box<Node<K, V>>, Option<V>) {
    let Some(mut h) = link else {
        return (Node::leaf(key, value), None);
    };

    let replaced = match cmp.compare(&key, &h.key) {
        Ordering::Less => {
            let (child, replaced) = insert_at(h.left.take(), key, value, cmp);
            h.left = Some(child);
            replaced
        }
        Ordering::Greater => {
            let (child, replaced) = insert_at(h.right.take(), key, value, cmp);
            h.right = Some(child);
            replaced
        }
        Ordering::Equal => Some(core::mem::replace(&mut h.value, value)),
    };

    (balance(h), replaced)
}

/// Top-down deletion. `key` must be present in the subtree.
fn delete_at<K, V, C: Comparator<K>>(
    mut h: Box<Node<K, V>>,
    key: &K,
    cmp: &C,
) -> (Link<K, V>, Option<V>) {
    let removed;

    if cmp.compare(key, &h.key) == Ordering::Less {
        if !is_red(&h.left) && !is_left_red(&h.left) {
            h = move_red_left(h);
        }
        let Some(left) = h.left.take() else {
            return (Some(h), None);
        };
        let (rest, value) = delete_at(left, key, cmp);
        h.left = rest;
        removed = value;
    } else {
        if is_red(&h.left) {
            h = rotate_right(h);
        }
        if cmp.compare(key, &h.key) == Ordering::Equal && h.right.is_none() {
            let node = *h;
            return (node.left, Some(node.value));
        }
        if !is_red(&h.right) && !is_left_red(&h.right) {
            h = move_red_right(h);
        }
        if cmp.compare(key, &h.key) == Ordering::Equal {
            let Some(right) = h.right.take() else {
                return (Some(h), None);
            };
            let (rest, (succ_key, succ_value)) = delete_min(right);
            h.right = rest;
            h.key = succ_key;
            removed = Some(core::mem::replace(&mut h.value, succ_value));
        } else {
            let Some(right) = h.right.take() else {
                return (Some(h), None);
            };
            let (rest, value) = delete_at(right, key, cmp);
            h.right = rest;
            removed = value;
        }
    }

    (Some(balance(h)), removed)
}

fn walk<K, V, F>(link: &Link<K, V>, order: TraversalOrder, visitor: &mut F)
where
    F: FnMut(&K, &V),
{
    let Some(n) = link else { return };
    match order {
        TraversalOrder::PreOrder => {
            visitor(&n.key, &n.value);
            walk(&n.left, order, visitor);
            walk(&n.right, order, visitor);
        }
        TraversalOrder::InOrder => {
            walk(&n.left, order, visitor);
            visitor(&n.key, &n.value);
            walk(&n.right, order, visitor);
        }
        TraversalOrder::PostOrder => {
            walk(&n.left, order, visitor);
            walk(&n.right, order, visitor);
            visitor(&n.key, &n.value);
        }
    }
}

/// In-order iterator over an [`OrderedIndex`].
pub struct Iter<'a, K, V> {
    stack: Vec<&'a Node<K, V>>,
    remaining: usize,
}

impl<'a, K, V> Iter<'a, K, V> {
    fn push_left(&mut self, mut link: &'a Link<K, V>) {
        while let Some(n) = link {
            self.stack.push(n);
            link = &n.left;
        }
    }
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let n = self.stack.pop()?;
        self.push_left(&n.right);
        self.remaining -= 1;
        Some((&n.key, &n.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::seq::SliceRandom;
    use rand::{Rng, SeedableRng};

    /// Checks every LLRB invariant and returns the black height.
    fn check_node<K, V, C: Comparator<K>>(
        link: &Link<K, V>,
        cmp: &C,
        parent_red: bool,
    ) -> usize {
        let Some(n) = link else { return 1 };
        assert!(!is_red(&n.right), "right-leaning red link");
        assert!(!(parent_red && n.red), "two red links in a row");
        assert_eq!(n.size, 1 + size(&n.left) + size(&n.right), "stale subtree size");
        if let Some(l) = n.left.as_ref() {
            assert_eq!(cmp.compare(&l.key, &n.key), Ordering::Less);
        }
        if let Some(r) = n.right.as_ref() {
            assert_eq!(cmp.compare(&r.key, &n.key), Ordering::Greater);
        }
        let lh = check_node(&n.left, cmp, n.red);
        let rh = check_node(&n.right, cmp, n.red);
        assert_eq!(lh, rh, "unequal black heights");
        lh + usize::from(!n.red)
    }

    fn check<K, V, C: Comparator<K>>(index: &OrderedIndex<K, V, C>) {
        assert!(!is_red(index.root()), "root must be black");
        check_node(index.root(), index.comparator(), false);
        let keys: Vec<&K> = index.iter().map(|(k, _)| k).collect();
        for pair in keys.windows(2) {
            assert_eq!(index.comparator().compare(pair[0], pair[1]), Ordering::Less);
        }
    }

    // ── basic operations ──────────────────────────────────────────────────

    #[test]
    fn empty_index() {
        let index: OrderedIndex<i32, ()> = OrderedIndex::new();
        assert!(index.is_empty());
        assert_eq!(index.len(), 0);
        assert_eq!(index.smallest(), None);
        assert_eq!(index.largest(), None);
        assert_eq!(index.select(0), None);
        assert_eq!(index.rank(&5), 0);
        assert!(!index.contains(&5));
    }

    #[test]
    fn insert_find_and_replace() {
        let mut index = OrderedIndex::new();
        assert_eq!(index.insert(3, "three"), None);
        assert_eq!(index.insert(1, "one"), None);
        assert_eq!(index.insert(3, "THREE"), Some("three"));
        assert_eq!(index.len(), 2);
        assert_eq!(index.find(&3), Some(&"THREE"));
        assert_eq!(index.find(&2), None);
        check(&index);
    }

    #[test]
    fn remove_absent_key_is_noop() {
        let mut index = OrderedIndex::new();
        for k in [5, 2, 8] {
            index.insert(k, ());
        }
        assert!(!index.remove(&7));
        assert_eq!(index.len(), 3);
        check(&index);
    }

    #[test]
    fn remove_until_empty() {
        let mut index = OrderedIndex::new();
        for k in 0..32 {
            index.insert(k, k * 10);
        }
        for k in (0..32).rev() {
            assert_eq!(index.take(&k), Some(k * 10));
            check(&index);
        }
        assert!(index.is_empty());
    }

    #[test]
    fn smallest_largest_floor_ceil() {
        let mut index = OrderedIndex::new();
        for k in [10, 20, 30, 40] {
            index.insert(k, ());
        }
        assert_eq!(index.smallest(), Some(&10));
        assert_eq!(index.largest(), Some(&40));
        assert_eq!(index.floor(&25), Some(&20));
        assert_eq!(index.floor(&30), Some(&30));
        assert_eq!(index.floor(&5), None);
        assert_eq!(index.ceil(&25), Some(&30));
        assert_eq!(index.ceil(&10), Some(&10));
        assert_eq!(index.ceil(&45), None);
    }

    #[test]
    fn traversal_orders() {
        let mut index = OrderedIndex::new();
        for k in [2, 1, 3] {
            index.insert(k, ());
        }
        let mut seen = Vec::new();
        index.traverse(TraversalOrder::InOrder, |k, _| seen.push(*k));
        assert_eq!(seen, [1, 2, 3]);

        seen.clear();
        index.traverse(TraversalOrder::PreOrder, |k, _| seen.push(*k));
        assert_eq!(seen, [2, 1, 3]);

        seen.clear();
        index.traverse(TraversalOrder::PostOrder, |k, _| seen.push(*k));
        assert_eq!(seen, [1, 3, 2]);
    }

    #[test]
    fn custom_comparator_reverses_order() {
        let mut index = OrderedIndex::with_comparator(|a: &i32, b: &i32| b.cmp(a));
        for k in [1, 5, 3] {
            index.insert(k, ());
        }
        let keys: Vec<i32> = index.iter().map(|(k, _)| *k).collect();
        assert_eq!(keys, [5, 3, 1]);
        assert_eq!(index.rank(&3), 1);
        check(&index);
    }

    // ── snapshot ──────────────────────────────────────────────────────────

    #[test]
    fn snapshot_tracks_mutations() {
        let mut index = OrderedIndex::new();
        index.insert(2, 'b');
        index.insert(1, 'a');
        assert_eq!(index.snapshot(), &[(1, 'a'), (2, 'b')]);

        index.insert(3, 'c');
        assert_eq!(index.snapshot().len(), 3);

        index.remove(&1);
        assert_eq!(index.snapshot(), &[(2, 'b'), (3, 'c')]);

        index.clear();
        assert!(index.snapshot().is_empty());
    }

    // ── order statistics ──────────────────────────────────────────────────

    #[test]
    fn rank_select_round_trip() {
        let mut index = OrderedIndex::new();
        let mut rng = SmallRng::seed_from_u64(7);
        for _ in 0..500 {
            index.insert(rng.gen_range(-10_000..10_000), ());
        }
        for i in 0..index.len() {
            let key = *index.select(i).unwrap();
            assert_eq!(index.rank(&key), i);
        }
        assert_eq!(index.select(index.len()), None);
    }

    #[test]
    fn select_of_rank_for_present_keys() {
        let mut index = OrderedIndex::new();
        let mut rng = SmallRng::seed_from_u64(11);
        let keys: Vec<i64> = (0..300).map(|_| rng.gen_range(0..1_000_000)).collect();
        for &k in &keys {
            index.insert(k, ());
        }
        for k in &keys {
            assert_eq!(index.select(index.rank(k)), Some(k));
        }
    }

    #[test]
    fn rank_of_absent_key_counts_smaller() {
        let mut index = OrderedIndex::new();
        for k in [10, 20, 30] {
            index.insert(k, ());
        }
        assert_eq!(index.rank(&5), 0);
        assert_eq!(index.rank(&25), 2);
        assert_eq!(index.rank(&99), 3);
    }

    // ── randomized invariants ─────────────────────────────────────────────

    #[test]
    fn random_insert_remove_keeps_invariants() {
        let mut rng = SmallRng::seed_from_u64(0x5eed);
        let mut index = OrderedIndex::new();
        let mut model = std::collections::BTreeMap::new();

        for step in 0..4_000 {
            let key: u16 = rng.gen_range(0..512);
            if rng.gen_bool(0.6) {
                index.insert(key, step);
                model.insert(key, step);
            } else {
                assert_eq!(index.remove(&key), model.remove(&key).is_some());
            }
            if step % 97 == 0 {
                check(&index);
            }
        }

        check(&index);
        assert_eq!(index.len(), model.len());
        let ours: Vec<(u16, i32)> = index.iter().map(|(k, v)| (*k, *v)).collect();
        let theirs: Vec<(u16, i32)> = model.into_iter().collect();
        assert_eq!(ours, theirs);
    }

    #[test]
    fn shuffled_removal_keeps_invariants() {
        let mut rng = SmallRng::seed_from_u64(99);
        let mut keys: Vec<u32> = (0..256).collect();
        let mut index = OrderedIndex::new();
        for &k in &keys {
            index.insert(k, ());
        }
        keys.shuffle(&mut rng);
        for (i, k) in keys.iter().enumerate() {
            assert!(index.remove(k));
            assert_eq!(index.len(), 255 - i);
            check(&index);
        }
    }
}
