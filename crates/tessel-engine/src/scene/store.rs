use glam::Mat4;
use slotmap::SlotMap;

use crate::config::EngineConfig;
use crate::error::{BatchError, Result};

use super::context::RenderContext;
use super::drawable::{Drawable, DrawableId, Vertex};
use super::state::{RenderState, StateAttr};
use super::transform::{TransformArena, TransformId};

/// Owns every drawable and transform of one render context.
///
/// Batchers only reference drawables by [`DrawableId`]. Destroying a drawable
/// that is still registered with batchers goes through
/// `RenderPass::destroy_drawable` so the indexes stay consistent.
#[derive(Debug, Default)]
pub struct Scene {
    context: RenderContext,
    transforms: TransformArena,
    drawables: SlotMap<DrawableId, Drawable>,
    /// Drawables with staged state waiting for the next sync.
    pending: Vec<DrawableId>,
}

impl Scene {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            context: RenderContext::new(config),
            ..Default::default()
        }
    }

    #[inline]
    pub fn context(&self) -> &RenderContext {
        &self.context
    }

    #[inline]
    pub fn context_mut(&mut self) -> &mut RenderContext {
        &mut self.context
    }

    #[inline]
    pub fn transforms(&self) -> &TransformArena {
        &self.transforms
    }

    #[inline]
    pub fn transforms_mut(&mut self) -> &mut TransformArena {
        &mut self.transforms
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.drawables.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.drawables.is_empty()
    }

    /// Creates a drawable with its own root transform (identity).
    pub fn create_drawable(&mut self, vertices: Vec<Vertex>, state: RenderState) -> DrawableId {
        let transform = self.transforms.create(Mat4::IDENTITY);
        self.insert_drawable(vertices, state, transform)
    }

    /// Creates a drawable whose transform is parented under `parent`.
    pub fn create_child_drawable(
        &mut self,
        vertices: Vec<Vertex>,
        state: RenderState,
        local: Mat4,
        parent: TransformId,
    ) -> Result<DrawableId> {
        if !self.transforms.contains(parent) {
            return Err(BatchError::UnknownTransform(parent));
        }
        let transform = self.transforms.create(local);
        self.transforms.set_parent(transform, Some(parent))?;
        Ok(self.insert_drawable(vertices, state, transform))
    }

    fn insert_drawable(
        &mut self,
        vertices: Vec<Vertex>,
        state: RenderState,
        transform: TransformId,
    ) -> DrawableId {
        let instance_id = self.context.next_instance_id();
        let sequence = self.context.next_sequence();
        let timestamp = self.context.timestamp();
        self.drawables
            .insert(Drawable::new(instance_id, sequence, timestamp, vertices, state, transform))
    }

    #[inline]
    pub fn drawable(&self, id: DrawableId) -> Option<&Drawable> {
        self.drawables.get(id)
    }

    /// Mutable access for geometry and flags. Render state goes through
    /// [`Scene::set_state`].
    #[inline]
    pub fn drawable_mut(&mut self, id: DrawableId) -> Option<&mut Drawable> {
        self.drawables.get_mut(id)
    }

    pub fn drawable_ids(&self) -> impl Iterator<Item = DrawableId> + '_ {
        self.drawables.keys()
    }

    /// Stages one render-state write.
    ///
    /// Returns `true` if the write made the drawable dirty. Writing the value
    /// that is already staged changes nothing.
    pub fn set_state(&mut self, id: DrawableId, attr: StateAttr) -> Result<bool> {
        let d = self.drawables.get_mut(id).ok_or(BatchError::UnknownDrawable(id))?;
        let became_dirty = d.stage(attr);
        if became_dirty {
            self.pending.push(id);
        }
        Ok(became_dirty)
    }

    /// Stages several writes; they are published together.
    pub fn set_states<I>(&mut self, id: DrawableId, attrs: I) -> Result<bool>
    where
        I: IntoIterator<Item = StateAttr>,
    {
        let mut dirtied = false;
        for attr in attrs {
            dirtied |= self.set_state(id, attr)?;
        }
        Ok(dirtied)
    }

    /// World matrix of a drawable's transform.
    pub fn world_matrix(&mut self, id: DrawableId) -> Result<Mat4> {
        let t = self.drawables.get(id).ok_or(BatchError::UnknownDrawable(id))?.transform();
        self.transforms.world(t)
    }

    /// Drawable plus its resolved world matrix, borrowed together.
    pub(crate) fn drawable_with_world(&mut self, id: DrawableId) -> Option<(&mut Drawable, Mat4)> {
        let t = self.drawables.get(id)?.transform();
        let world = self.transforms.world(t).ok()?;
        Some((self.drawables.get_mut(id)?, world))
    }

    pub(crate) fn take_pending(&mut self) -> Vec<DrawableId> {
        std::mem::take(&mut self.pending)
    }

    /// Removes the drawable and releases its transform.
    pub(crate) fn remove_drawable(&mut self, id: DrawableId) -> Option<Drawable> {
        let d = self.drawables.remove(id)?;
        if let Err(e) = self.transforms.remove(d.transform()) {
            log::warn!("drawable {id:?}: {e}");
        }
        Some(d)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paint::Color;
    use crate::scene::quad;
    use glam::Vec3;

    #[test]
    fn drawables_get_increasing_sequences() {
        let mut scene = Scene::default();
        let a = scene.create_drawable(Vec::new(), RenderState::default());
        let b = scene.create_drawable(Vec::new(), RenderState::default());
        let ka = scene.drawable(a).unwrap().sort_key();
        let kb = scene.drawable(b).unwrap().sort_key();
        assert!(ka.sequence < kb.sequence);
        assert_ne!(ka.instance_id, kb.instance_id);
        assert!(ka < kb);
    }

    #[test]
    fn idempotent_write_is_not_queued() {
        let mut scene = Scene::default();
        let id = scene.create_drawable(Vec::new(), RenderState::default().with_depth(1.0));
        assert!(!scene.set_state(id, StateAttr::Depth(1.0)).unwrap());
        assert!(scene.take_pending().is_empty());
    }

    #[test]
    fn repeated_writes_queue_once() {
        let mut scene = Scene::default();
        let id = scene.create_drawable(Vec::new(), RenderState::default());
        let dirtied = scene
            .set_states(id, [StateAttr::Depth(2.0), StateAttr::Depth(3.0), StateAttr::Group(1)])
            .unwrap();
        assert!(dirtied);
        assert_eq!(scene.take_pending(), vec![id]);
    }

    #[test]
    fn child_drawable_inherits_parent_world() {
        let mut scene = Scene::default();
        let parent = scene.create_drawable(Vec::new(), RenderState::default());
        let pt = scene.drawable(parent).unwrap().transform();
        scene
            .transforms_mut()
            .set_local(pt, Mat4::from_translation(Vec3::new(3.0, 0.0, 0.0)))
            .unwrap();

        let child = scene
            .create_child_drawable(
                quad(0.0, 0.0, 1.0, 1.0, Color::WHITE),
                RenderState::default(),
                Mat4::from_translation(Vec3::new(0.0, 2.0, 0.0)),
                pt,
            )
            .unwrap();
        let p = scene.world_matrix(child).unwrap().transform_point3(Vec3::ZERO);
        assert_eq!(p, Vec3::new(3.0, 2.0, 0.0));
    }

    #[test]
    fn unknown_ids_are_errors() {
        let mut scene = Scene::default();
        let id = scene.create_drawable(Vec::new(), RenderState::default());
        scene.remove_drawable(id).unwrap();
        assert!(matches!(
            scene.set_state(id, StateAttr::Group(1)),
            Err(BatchError::UnknownDrawable(_))
        ));
        assert!(scene.transforms().is_empty());
    }
}
