use glam::Mat4;

use crate::config::BatcherConfig;
use crate::error::{BatchError, Result};
use crate::index::OrderedIndex;
use crate::scene::{
    Drawable, DrawableId, PrimitiveType, Scene, SortKey, StateChanges, StateDiff, StaticUpload,
};

use super::backend::{BufferHandle, BufferUsage, GpuBackend};
use super::pass::BatcherId;
use super::staging::VertexStreams;
use super::stats::FrameStats;

/// Sorted set of drawables packed into shared vertex buffers each frame.
///
/// Every flush issues exactly one draw call covering one maximal contiguous run
/// (in sort order) of drawables with identical texture, shader, primitive type,
/// clip and group. Runs are split early only when the staging arrays fill up,
/// when a locked drawable interrupts them, or for strip primitives.
pub struct Batcher {
    id: BatcherId,
    config: BatcherConfig,
    creation: u64,

    index: OrderedIndex<SortKey, DrawableId>,
    index_changed: bool,

    packer: Packer,
    expired: Vec<DrawableId>,
    stats: FrameStats,
}

impl Batcher {
    pub(crate) fn new(id: BatcherId, config: BatcherConfig, creation: u64) -> Self {
        let config = config.validated();
        let packer = Packer::new(&config);
        Self {
            id,
            config,
            creation,
            index: OrderedIndex::new(),
            index_changed: false,
            packer,
            expired: Vec::new(),
            stats: FrameStats::default(),
        }
    }

    #[inline]
    pub fn id(&self) -> BatcherId {
        self.id
    }

    #[inline]
    pub fn config(&self) -> &BatcherConfig {
        &self.config
    }

    #[inline]
    pub fn layer(&self) -> i32 {
        self.config.layer
    }

    pub(crate) fn set_layer(&mut self, layer: i32) {
        self.config.layer = layer;
    }

    /// Creation sequence within the owning pass; breaks layer ties.
    #[inline]
    pub fn creation(&self) -> u64 {
        self.creation
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// `true` if drawables were added or removed since the last `batch()`.
    #[inline]
    pub fn index_changed(&self) -> bool {
        self.index_changed
    }

    /// Counters of the most recent `batch()`.
    #[inline]
    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    /// Registers `drawable` under its current sort key.
    ///
    /// Returns `false` if it was already registered.
    pub fn add(&mut self, id: DrawableId, drawable: &mut Drawable) -> bool {
        if !drawable.join(self.id) {
            return false;
        }
        self.index.insert(drawable.sort_key(), id);
        self.index_changed = true;
        true
    }

    /// Unregisters `drawable`. Returns `false` if it was not registered.
    pub fn remove(&mut self, drawable: &mut Drawable) -> bool {
        let removed = self.index.remove(&drawable.sort_key());
        drawable.leave(self.id);
        self.index_changed |= removed;
        removed
    }

    pub fn contains(&self, drawable: &Drawable) -> bool {
        self.index.contains(&drawable.sort_key())
    }

    /// Position of `drawable` in paint order.
    pub fn paint_position(&self, drawable: &Drawable) -> Option<usize> {
        let key = drawable.sort_key();
        self.index.contains(&key).then(|| self.index.rank(&key))
    }

    /// The drawable at paint position `n`.
    pub fn nth(&self, n: usize) -> Option<DrawableId> {
        let key = self.index.select(n)?;
        self.index.find(key).copied()
    }

    /// Drawables in paint order (back-to-front).
    pub fn drawables(&self) -> impl Iterator<Item = DrawableId> + '_ {
        self.index.iter().map(|(_, &id)| id)
    }

    /// Moves `id` from `old` to `new` after its render state changed.
    pub(crate) fn reindex(&mut self, id: DrawableId, old: &SortKey, new: SortKey) {
        if self.index.remove(old) {
            self.index.insert(new, id);
            self.index_changed = true;
        } else {
            log::warn!("batcher '{}': reindex of unregistered drawable {id:?}", self.config.label);
        }
    }

    /// Draws every registered drawable in sort order.
    ///
    /// Immediate drawables are unregistered once the traversal ends; the pass
    /// collects them with `take_expired`. On error the pending staging data is
    /// discarded and the frame is aborted for this batcher.
    pub fn batch<B>(&mut self, scene: &mut Scene, backend: &mut B) -> Result<FrameStats>
    where
        B: GpuBackend + ?Sized,
    {
        self.packer.begin(backend)?;

        let entries = self.index.snapshot();
        let packed = self.packer.pack(entries, scene, backend, &mut self.expired);
        let result = packed.and_then(|()| self.packer.flush(backend));

        if let Err(e) = result {
            self.packer.abort();
            self.expired.clear();
            self.stats = self.packer.stats;
            log::error!("batcher '{}': frame aborted: {e}", self.config.label);
            return Err(e);
        }

        // The traversal is over, so the index may change again.
        for &id in &self.expired {
            if let Some(d) = scene.drawable_mut(id) {
                self.index.remove(&d.sort_key());
                d.leave(self.id);
            }
        }

        self.index_changed = false;
        self.stats = self.packer.stats;
        Ok(self.stats)
    }

    pub(crate) fn take_expired(&mut self) -> Vec<DrawableId> {
        std::mem::take(&mut self.expired)
    }

    /// Unregisters every drawable (without touching the scene) and returns them.
    pub(crate) fn drain(&mut self) -> Vec<DrawableId> {
        let ids = self.drawables().collect();
        self.index.clear();
        self.index_changed = true;
        ids
    }

    /// Destroys the batcher's dynamic buffers.
    pub fn release<B: GpuBackend + ?Sized>(&mut self, backend: &mut B) {
        for buffer in self.packer.buffers.drain(..) {
            backend.destroy_buffer(buffer);
        }
    }
}

/// Staging arrays, buffer rotation and the state diff of one batcher.
struct Packer {
    label: String,
    staging: VertexStreams,
    pending_primitive: PrimitiveType,
    scratch: VertexStreams,

    buffers: Vec<BufferHandle>,
    buffer_count: usize,
    next_buffer: usize,

    diff: StateDiff,
    stats: FrameStats,
}

impl Packer {
    fn new(config: &BatcherConfig) -> Self {
        Self {
            label: config.label.clone(),
            staging: VertexStreams::with_capacity(config.max_vertices),
            pending_primitive: PrimitiveType::Triangles,
            scratch: VertexStreams::default(),
            buffers: Vec::with_capacity(config.buffer_count),
            buffer_count: config.buffer_count,
            next_buffer: 0,
            diff: StateDiff::new(),
            stats: FrameStats::default(),
        }
    }

    fn begin<B: GpuBackend + ?Sized>(&mut self, backend: &mut B) -> Result<()> {
        if self.buffers.is_empty() {
            for _ in 0..self.buffer_count {
                let buffer = backend.create_buffer(BufferUsage::Dynamic, self.staging.capacity())?;
                self.buffers.push(buffer);
            }
            log::debug!(
                "batcher '{}': created {} dynamic buffers of {} vertices",
                self.label,
                self.buffer_count,
                self.staging.capacity()
            );
        }
        self.staging.clear();
        self.diff.reset();
        self.stats = FrameStats::default();
        Ok(())
    }

    fn abort(&mut self) {
        self.staging.clear();
        self.diff.reset();
    }

    fn pack<B: GpuBackend + ?Sized>(
        &mut self,
        entries: &[(SortKey, DrawableId)],
        scene: &mut Scene,
        backend: &mut B,
        expired: &mut Vec<DrawableId>,
    ) -> Result<()> {
        for &(_, id) in entries {
            let Some((drawable, world)) = scene.drawable_with_world(id) else {
                log::warn!("batcher '{}': drawable {id:?} no longer exists; skipped", self.label);
                continue;
            };

            let count = drawable.vertex_count();
            if count == 0 {
                if drawable.is_immediate() {
                    expired.push(id);
                }
                continue;
            }
            if count > self.staging.capacity() {
                return Err(BatchError::DrawableTooLarge {
                    id,
                    vertices: count,
                    capacity: self.staging.capacity(),
                });
            }

            let (needs_flush, primitive) = {
                let state = drawable.state();
                (self.diff.update(state) || !state.primitive.merges(), state.primitive)
            };
            if drawable.is_locked() || needs_flush {
                self.flush(backend)?;
            }
            self.apply_hooks(backend);

            if drawable.is_locked() {
                self.draw_static(drawable, world, primitive, backend)?;
            } else {
                if let Some(stale) = drawable.static_upload.take() {
                    backend.destroy_buffer(stale.buffer);
                }
                if self.staging.remaining() < count {
                    log::debug!(
                        "batcher '{}': staging full ({} vertices), flushing early",
                        self.label,
                        self.staging.vertex_count()
                    );
                    self.flush(backend)?;
                    self.stats.overflow_flushes += 1;
                }
                self.staging.append(drawable.vertices(), &world);
                self.pending_primitive = primitive;
                self.stats.dynamic_batched += 1;
            }

            if drawable.is_immediate() {
                expired.push(id);
            }
        }
        Ok(())
    }

    /// Activates the GPU hooks whose state changed in the last diff update.
    fn apply_hooks<B: GpuBackend + ?Sized>(&mut self, backend: &mut B) {
        let changes = self.diff.changes();
        if !changes.intersects(StateChanges::FLUSH) {
            return;
        }
        let Some(state) = self.diff.current() else { return };

        if changes.contains(StateChanges::GROUP) {
            backend.set_group(state.group);
        }
        if changes.contains(StateChanges::SHADER) {
            backend.use_shader(state.shader);
        }
        if changes.contains(StateChanges::TEXTURE) {
            backend.bind_texture(state.texture);
        }
        if changes.contains(StateChanges::CLIP) {
            backend.set_scissor(state.clip_rect);
        }
        self.stats.state_changes += 1;
    }

    /// Issues one draw call for everything staged since the last flush.
    fn flush<B: GpuBackend + ?Sized>(&mut self, backend: &mut B) -> Result<()> {
        let count = self.staging.vertex_count();
        if count == 0 {
            return Ok(());
        }

        let buffer = self.buffers[self.next_buffer];
        self.next_buffer = (self.next_buffer + 1) % self.buffers.len();

        backend.update_buffer(buffer, &self.staging)?;
        backend.bind_buffer(buffer);
        backend.draw(self.pending_primitive, 0, count as u32);

        log::trace!(
            "batcher '{}': flush {count} vertices ({:?}) via {buffer:?}",
            self.label,
            self.pending_primitive
        );

        self.stats.draw_calls += 1;
        self.stats.vertices += count;
        self.staging.clear();
        Ok(())
    }

    /// Draws a locked drawable from its private buffer, uploading first if the
    /// geometry or world matrix changed since the last upload.
    fn draw_static<B: GpuBackend + ?Sized>(
        &mut self,
        drawable: &mut Drawable,
        world: Mat4,
        primitive: PrimitiveType,
        backend: &mut B,
    ) -> Result<()> {
        let count = drawable.vertex_count();
        let revision = drawable.revision();

        let upload = match drawable.static_upload {
            Some(u) if u.revision == revision && u.world == world && u.capacity >= count => u,
            previous => {
                let (buffer, capacity) = match previous {
                    Some(u) if u.capacity >= count => (u.buffer, u.capacity),
                    Some(u) => {
                        backend.destroy_buffer(u.buffer);
                        (backend.create_buffer(BufferUsage::Static, count)?, count)
                    }
                    None => (backend.create_buffer(BufferUsage::Static, count)?, count),
                };

                if self.scratch.capacity() < count {
                    self.scratch = VertexStreams::with_capacity(count);
                } else {
                    self.scratch.clear();
                }
                self.scratch.append(drawable.vertices(), &world);
                backend.update_buffer(buffer, &self.scratch)?;

                let upload = StaticUpload { buffer, capacity, revision, world };
                drawable.static_upload = Some(upload);
                self.stats.static_uploads += 1;
                upload
            }
        };

        backend.bind_buffer(upload.buffer);
        backend.draw(primitive, 0, count as u32);

        self.stats.draw_calls += 1;
        self.stats.vertices += count;
        self.stats.static_batched += 1;
        Ok(())
    }
}
