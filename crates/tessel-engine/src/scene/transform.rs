//! Hierarchical transforms stored in an arena.
//!
//! Parents own the list of their children's handles; children keep a plain
//! handle back to the parent. Nothing owns anything else's lifetime, so the
//! graph has no reference cycles. World matrices are cached and recomputed
//! lazily after a local matrix or the parent chain changes.

use glam::Mat4;
use slotmap::{new_key_type, SlotMap};

use crate::error::{BatchError, Result};

new_key_type! {
    /// Handle to a node in a [`TransformArena`].
    pub struct TransformId;
}

#[derive(Debug, Clone)]
struct TransformNode {
    local: Mat4,
    parent: Option<TransformId>,
    children: Vec<TransformId>,
    world: Mat4,
    world_dirty: bool,
}

#[derive(Debug, Default)]
pub struct TransformArena {
    nodes: SlotMap<TransformId, TransformNode>,
}

impl TransformArena {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    #[inline]
    pub fn contains(&self, id: TransformId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Creates a root transform.
    pub fn create(&mut self, local: Mat4) -> TransformId {
        self.nodes.insert(TransformNode {
            local,
            parent: None,
            children: Vec::new(),
            world: local,
            world_dirty: true,
        })
    }

    /// Releases `id`. Its children become roots; their world matrices are
    /// recomputed from their local matrices alone.
    pub fn remove(&mut self, id: TransformId) -> Result<()> {
        let node = self.nodes.remove(id).ok_or(BatchError::UnknownTransform(id))?;
        if let Some(parent) = node.parent.and_then(|p| self.nodes.get_mut(p)) {
            parent.children.retain(|&c| c != id);
        }
        for child in node.children {
            if let Some(c) = self.nodes.get_mut(child) {
                c.parent = None;
            }
            self.mark_dirty(child);
        }
        Ok(())
    }

    pub fn local(&self, id: TransformId) -> Option<Mat4> {
        self.nodes.get(id).map(|n| n.local)
    }

    pub fn set_local(&mut self, id: TransformId, local: Mat4) -> Result<()> {
        let node = self.nodes.get_mut(id).ok_or(BatchError::UnknownTransform(id))?;
        if node.local == local {
            return Ok(());
        }
        node.local = local;
        self.mark_dirty(id);
        Ok(())
    }

    pub fn parent(&self, id: TransformId) -> Option<TransformId> {
        self.nodes.get(id).and_then(|n| n.parent)
    }

    pub fn children(&self, id: TransformId) -> &[TransformId] {
        self.nodes.get(id).map_or(&[], |n| n.children.as_slice())
    }

    /// Re-parents `child`. `None` detaches it into a root.
    ///
    /// Fails with [`BatchError::TransformCycle`] if `parent` is `child` or one of
    /// its descendants.
    pub fn set_parent(&mut self, child: TransformId, parent: Option<TransformId>) -> Result<()> {
        if !self.nodes.contains_key(child) {
            return Err(BatchError::UnknownTransform(child));
        }
        if let Some(p) = parent {
            if !self.nodes.contains_key(p) {
                return Err(BatchError::UnknownTransform(p));
            }
            if self.is_ancestor_or_self(child, p) {
                return Err(BatchError::TransformCycle { child, parent: p });
            }
        }

        let old = self.nodes[child].parent;
        if old == parent {
            return Ok(());
        }
        if let Some(old) = old.and_then(|o| self.nodes.get_mut(o)) {
            old.children.retain(|&c| c != child);
        }
        if let Some(p) = parent {
            self.nodes[p].children.push(child);
        }
        self.nodes[child].parent = parent;
        self.mark_dirty(child);
        Ok(())
    }

    /// World matrix of `id` (parent chain applied), recomputed if stale.
    pub fn world(&mut self, id: TransformId) -> Result<Mat4> {
        let node = self.nodes.get(id).ok_or(BatchError::UnknownTransform(id))?;
        if !node.world_dirty {
            return Ok(node.world);
        }

        // Collect the stale part of the chain, then resolve it top-down.
        let mut chain = vec![id];
        let mut cursor = node.parent;
        while let Some(p) = cursor {
            let n = &self.nodes[p];
            if !n.world_dirty {
                break;
            }
            chain.push(p);
            cursor = n.parent;
        }

        let mut parent_world = cursor.map_or(Mat4::IDENTITY, |p| self.nodes[p].world);
        for &t in chain.iter().rev() {
            let n = &mut self.nodes[t];
            n.world = parent_world * n.local;
            n.world_dirty = false;
            parent_world = n.world;
        }
        Ok(parent_world)
    }

    fn is_ancestor_or_self(&self, ancestor: TransformId, mut node: TransformId) -> bool {
        loop {
            if node == ancestor {
                return true;
            }
            match self.nodes.get(node).and_then(|n| n.parent) {
                Some(p) => node = p,
                None => return false,
            }
        }
    }

    fn mark_dirty(&mut self, root: TransformId) {
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let Some(n) = self.nodes.get_mut(id) else { continue };
            n.world_dirty = true;
            stack.extend_from_slice(&n.children);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn translate(x: f32, y: f32) -> Mat4 {
        Mat4::from_translation(Vec3::new(x, y, 0.0))
    }

    #[test]
    fn world_composes_parent_chain() {
        let mut arena = TransformArena::new();
        let root = arena.create(translate(10.0, 0.0));
        let child = arena.create(translate(0.0, 5.0));
        arena.set_parent(child, Some(root)).unwrap();

        let p = arena.world(child).unwrap().transform_point3(Vec3::ZERO);
        assert_eq!(p, Vec3::new(10.0, 5.0, 0.0));
        assert_eq!(arena.children(root), &[child]);
        assert_eq!(arena.parent(child), Some(root));
    }

    #[test]
    fn parent_change_propagates_to_descendants() {
        let mut arena = TransformArena::new();
        let a = arena.create(Mat4::IDENTITY);
        let b = arena.create(translate(1.0, 0.0));
        let c = arena.create(translate(1.0, 0.0));
        arena.set_parent(b, Some(a)).unwrap();
        arena.set_parent(c, Some(b)).unwrap();
        assert_eq!(arena.world(c).unwrap().transform_point3(Vec3::ZERO).x, 2.0);

        arena.set_local(a, translate(5.0, 0.0)).unwrap();
        assert_eq!(arena.world(c).unwrap().transform_point3(Vec3::ZERO).x, 7.0);
    }

    #[test]
    fn cycles_are_rejected() {
        let mut arena = TransformArena::new();
        let a = arena.create(Mat4::IDENTITY);
        let b = arena.create(Mat4::IDENTITY);
        arena.set_parent(b, Some(a)).unwrap();

        assert!(matches!(arena.set_parent(a, Some(b)), Err(BatchError::TransformCycle { .. })));
        assert!(matches!(arena.set_parent(a, Some(a)), Err(BatchError::TransformCycle { .. })));
    }

    #[test]
    fn removing_parent_orphans_children() {
        let mut arena = TransformArena::new();
        let a = arena.create(translate(3.0, 0.0));
        let b = arena.create(translate(1.0, 0.0));
        arena.set_parent(b, Some(a)).unwrap();
        assert_eq!(arena.world(b).unwrap().transform_point3(Vec3::ZERO).x, 4.0);

        arena.remove(a).unwrap();
        assert_eq!(arena.parent(b), None);
        assert_eq!(arena.world(b).unwrap().transform_point3(Vec3::ZERO).x, 1.0);
        assert!(arena.remove(a).is_err());
    }

    #[test]
    fn detach_moves_child_out_of_parent_list() {
        let mut arena = TransformArena::new();
        let a = arena.create(Mat4::IDENTITY);
        let b = arena.create(Mat4::IDENTITY);
        arena.set_parent(b, Some(a)).unwrap();
        arena.set_parent(b, None).unwrap();
        assert!(arena.children(a).is_empty());
    }
}
