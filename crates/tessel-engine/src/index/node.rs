//! LLRB node and the local transformations that keep the tree balanced.
//!
//! Every helper takes and returns owned boxes so rotations are plain moves.
//! Subtree sizes are recomputed on every structural change.

pub(super) type Link<K, V> = Option<Box<Node<K, V>>>;

#[derive(Debug)]
pub(super) struct Node<K, V> {
    pub key: K,
    pub value: V,
    pub left: Link<K, V>,
    pub right: Link<K, V>,
    /// Color of the link from the parent. `true` = red.
    pub red: bool,
    /// Number of nodes in this subtree, including this one.
    pub size: usize,
}

impl<K, V> Node<K, V> {
    /// New nodes are always red leaves.
    #[inline]
    pub fn leaf(key: K, value: V) -> Box<Self> {
        Box::new(Self {
            key,
            value,
            left: None,
            right: None,
            red: true,
            size: 1,
        })
    }

    #[inline]
    pub fn update_size(&mut self) {
        self.size = 1 + size(&self.left) + size(&self.right);
    }
}

#[inline]
pub(super) fn is_red<K, V>(link: &Link<K, V>) -> bool {
    link.as_ref().is_some_and(|n| n.red)
}

/// `true` if the left child of `link` exists and is red.
#[inline]
pub(super) fn is_left_red<K, V>(link: &Link<K, V>) -> bool {
    link.as_ref().is_some_and(|n| is_red(&n.left))
}

#[inline]
pub(super) fn size<K, V>(link: &Link<K, V>) -> usize {
    link.as_ref().map_or(0, |n| n.size)
}

/// Turns a right-leaning red link into a left-leaning one.
pub(super) fn rotate_left<K, V>(mut h: Box<Node<K, V>>) -> Box<Node<K, V>> {
    let Some(mut x) = h.right.take() else { return h };
    h.right = x.left.take();
    x.red = h.red;
    h.red = true;
    x.size = h.size;
    h.update_size();
    x.left = Some(h);
    x
}

/// Mirror of [`rotate_left`].
pub(super) fn rotate_right<K, V>(mut h: Box<Node<K, V>>) -> Box<Node<K, V>> {
    let Some(mut x) = h.left.take() else { return h };
    h.left = x.right.take();
    x.red = h.red;
    h.red = true;
    x.size = h.size;
    h.update_size();
    x.right = Some(h);
    x
}

/// Inverts the colors of `h` and both children (split or merge a 4-node).
pub(super) fn flip_colors<K, V>(h: &mut Node<K, V>) {
    h.red = !h.red;
    if let Some(l) = h.left.as_mut() {
        l.red = !l.red;
    }
    if let Some(r) = h.right.as_mut() {
        r.red = !r.red;
    }
}

/// Restores the LLRB shape on the way up from an insertion or deletion.
pub(super) fn balance<K, V>(mut h: Box<Node<K, V>>) -> Box<Node<K, V>> {
    if is_red(&h.right) && !is_red(&h.left) {
        h = rotate_left(h);
    }
    if is_red(&h.left) && is_left_red(&h.left) {
        h = rotate_right(h);
    }
    if is_red(&h.left) && is_red(&h.right) {
        flip_colors(&mut h);
    }
    h.update_size();
    h
}

/// Makes `h.left` or one of its children red, assuming `h` is red and both
/// `h.left` and `h.left.left` are black.
pub(super) fn move_red_left<K, V>(mut h: Box<Node<K, V>>) -> Box<Node<K, V>> {
    flip_colors(&mut h);
    if h.right.as_ref().is_some_and(|r| is_red(&r.left)) {
        if let Some(r) = h.right.take() {
            h.right = Some(rotate_right(r));
        }
        h = rotate_left(h);
        flip_colors(&mut h);
    }
    h
}

/// Makes `h.right` or one of its children red, assuming `h` is red and both
/// `h.right` and `h.right.left` are black.
pub(super) fn move_red_right<K, V>(mut h: Box<Node<K, V>>) -> Box<Node<K, V>> {
    flip_colors(&mut h);
    if is_left_red(&h.left) {
        h = rotate_right(h);
        flip_colors(&mut h);
    }
    h
}

/// Removes the smallest node of the subtree rooted at `h`.
///
/// Returns the new subtree and the removed entry.
pub(super) fn delete_min<K, V>(mut h: Box<Node<K, V>>) -> (Link<K, V>, (K, V)) {
    if h.left.is_none() {
        // Left-leaning: a node without a left child has no right child either.
        let node = *h;
        return (node.right, (node.key, node.value));
    }
    if !is_red(&h.left) && !is_left_red(&h.left) {
        h = move_red_left(h);
    }
    match h.left.take() {
        Some(left) => {
            let (rest, min) = delete_min(left);
            h.left = rest;
            (Some(balance(h)), min)
        }
        None => {
            let node = *h;
            (node.right, (node.key, node.value))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain() -> Box<Node<i32, ()>> {
        // 1 with a red right child 2.
        let mut h = Node::leaf(1, ());
        h.red = false;
        h.right = Some(Node::leaf(2, ()));
        h.update_size();
        h
    }

    #[test]
    fn rotate_left_preserves_size_and_color() {
        let h = chain();
        let x = rotate_left(h);
        assert_eq!(x.key, 2);
        assert!(!x.red);
        assert_eq!(x.size, 2);
        let l = x.left.as_ref().unwrap();
        assert_eq!(l.key, 1);
        assert!(l.red);
        assert_eq!(l.size, 1);
    }

    #[test]
    fn rotate_right_undoes_rotate_left() {
        let x = rotate_right(rotate_left(chain()));
        assert_eq!(x.key, 1);
        assert_eq!(x.size, 2);
        assert_eq!(x.right.as_ref().unwrap().key, 2);
    }

    #[test]
    fn rotate_without_child_is_noop() {
        let h = Node::leaf(7, ());
        let h = rotate_left(h);
        let h = rotate_right(h);
        assert_eq!(h.key, 7);
        assert_eq!(h.size, 1);
    }

    #[test]
    fn flip_colors_inverts_three_nodes() {
        let mut h = Node::leaf(2, ());
        h.red = false;
        h.left = Some(Node::leaf(1, ()));
        h.right = Some(Node::leaf(3, ()));
        flip_colors(&mut h);
        assert!(h.red);
        assert!(!is_red(&h.left));
        assert!(!is_red(&h.right));
    }
}
