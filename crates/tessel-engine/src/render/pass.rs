use slotmap::{new_key_type, SlotMap};

use crate::config::BatcherConfig;
use crate::error::{BatchError, Result};
use crate::scene::{DrawableId, Scene};

use super::backend::GpuBackend;
use super::batcher::Batcher;
use super::stats::FrameStats;

new_key_type! {
    /// Handle to a [`Batcher`] owned by a [`RenderPass`].
    pub struct BatcherId;
}

/// Owns the batchers of one render target and drives them once per frame.
///
/// Batchers are drawn by ascending `(layer, creation order)`. A frame first
/// syncs staged drawable state into every index, then batches each batcher
/// in order.
#[derive(Default)]
pub struct RenderPass {
    batchers: SlotMap<BatcherId, Batcher>,
    order: Vec<BatcherId>,
    next_creation: u64,
    frame: u64,
}

impl RenderPass {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of frames rendered to completion. Aborted frames are not counted.
    #[inline]
    pub fn frame_index(&self) -> u64 {
        self.frame
    }

    pub fn create_batcher(&mut self, config: BatcherConfig) -> BatcherId {
        let creation = self.next_creation;
        self.next_creation += 1;
        let id = self
            .batchers
            .insert_with_key(|id| Batcher::new(id, config, creation));
        self.rebuild_order();
        log::debug!("batcher {id:?} created (layer {})", self.batchers[id].layer());
        id
    }

    /// Creates a batcher from the scene's configured default.
    pub fn create_default_batcher(&mut self, scene: &Scene) -> BatcherId {
        self.create_batcher(scene.context().config().default_batcher.clone())
    }

    /// Destroys a batcher, unregistering its drawables and releasing its buffers.
    pub fn remove_batcher<B: GpuBackend + ?Sized>(
        &mut self,
        scene: &mut Scene,
        backend: &mut B,
        id: BatcherId,
    ) -> bool {
        let Some(mut batcher) = self.batchers.remove(id) else {
            return false;
        };
        for d in batcher.drain() {
            if let Some(drawable) = scene.drawable_mut(d) {
                drawable.leave(id);
            }
        }
        batcher.release(backend);
        self.rebuild_order();
        true
    }

    #[inline]
    pub fn batcher(&self, id: BatcherId) -> Option<&Batcher> {
        self.batchers.get(id)
    }

    #[inline]
    pub fn batcher_mut(&mut self, id: BatcherId) -> Option<&mut Batcher> {
        self.batchers.get_mut(id)
    }

    /// Batcher handles in draw order.
    pub fn batcher_order(&self) -> &[BatcherId] {
        &self.order
    }

    pub fn set_layer(&mut self, id: BatcherId, layer: i32) -> Result<()> {
        let batcher = self.batchers.get_mut(id).ok_or(BatchError::UnknownBatcher(id))?;
        if batcher.layer() != layer {
            batcher.set_layer(layer);
            self.rebuild_order();
        }
        Ok(())
    }

    /// Registers a drawable with a batcher. Returns `false` if already registered.
    pub fn attach(&mut self, scene: &mut Scene, drawable: DrawableId, batcher: BatcherId) -> Result<bool> {
        let b = self.batchers.get_mut(batcher).ok_or(BatchError::UnknownBatcher(batcher))?;
        let d = scene.drawable_mut(drawable).ok_or(BatchError::UnknownDrawable(drawable))?;
        Ok(b.add(drawable, d))
    }

    /// Unregisters a drawable from a batcher. Returns `false` if it was not registered.
    pub fn detach(&mut self, scene: &mut Scene, drawable: DrawableId, batcher: BatcherId) -> Result<bool> {
        let b = self.batchers.get_mut(batcher).ok_or(BatchError::UnknownBatcher(batcher))?;
        let d = scene.drawable_mut(drawable).ok_or(BatchError::UnknownDrawable(drawable))?;
        Ok(b.remove(d))
    }

    /// Publishes staged render state and moves drawables whose sort key changed.
    ///
    /// Returns the number of reindexed drawables.
    pub fn sync(&mut self, scene: &mut Scene) -> usize {
        let mut moved = 0;
        for id in scene.take_pending() {
            let Some(drawable) = scene.drawable_mut(id) else { continue };
            let Some((old, new)) = drawable.commit() else { continue };
            for &b in drawable.batchers() {
                if let Some(batcher) = self.batchers.get_mut(b) {
                    batcher.reindex(id, &old, new);
                }
            }
            moved += 1;
        }
        moved
    }

    /// Syncs, then batches every batcher in draw order.
    ///
    /// Immediate drawables that no batcher references any more are destroyed.
    /// The first batching error aborts the rest of the frame and leaves
    /// [`frame_index`](Self::frame_index) unchanged.
    pub fn render_frame<B: GpuBackend + ?Sized>(
        &mut self,
        scene: &mut Scene,
        backend: &mut B,
    ) -> Result<FrameStats> {
        let moved = self.sync(scene);

        let mut total = FrameStats::default();
        for i in 0..self.order.len() {
            let id = self.order[i];
            let Some(batcher) = self.batchers.get_mut(id) else { continue };
            total += batcher.batch(scene, backend)?;

            for d in batcher.take_expired() {
                let orphaned = scene.drawable(d).is_some_and(|d| d.batchers().is_empty());
                if orphaned {
                    self.destroy_drawable(scene, backend, d);
                }
            }
        }
        self.frame += 1;

        if scene.context().config().log_frame_stats {
            log::debug!(
                "frame {}: {} draws, {} vertices, {} reindexed, {} overflow flushes",
                self.frame,
                total.draw_calls,
                total.vertices,
                moved,
                total.overflow_flushes
            );
        }
        Ok(total)
    }

    /// Removes a drawable from every batcher and from the scene, releasing its
    /// static buffer if it has one.
    pub fn destroy_drawable<B: GpuBackend + ?Sized>(
        &mut self,
        scene: &mut Scene,
        backend: &mut B,
        id: DrawableId,
    ) -> bool {
        let Some(drawable) = scene.drawable_mut(id) else {
            return false;
        };
        for b in drawable.batchers().to_vec() {
            if let Some(batcher) = self.batchers.get_mut(b) {
                batcher.remove(drawable);
            }
        }
        if let Some(upload) = drawable.static_upload.take() {
            backend.destroy_buffer(upload.buffer);
        }
        scene.remove_drawable(id).is_some()
    }

    fn rebuild_order(&mut self) {
        self.order = self.batchers.keys().collect();
        let batchers = &self.batchers;
        self.order
            .sort_by_key(|&id| (batchers[id].layer(), batchers[id].creation()));
    }
}
