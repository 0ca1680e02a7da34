use glam::{Mat4, Vec2, Vec3};
use slotmap::new_key_type;

use crate::paint::Color;
use crate::render::{BatcherId, BufferHandle};

use super::key::SortKey;
use super::state::{RenderState, StagedState, StateAttr};
use super::transform::TransformId;

new_key_type! {
    /// Handle to a drawable owned by a [`Scene`](super::Scene).
    pub struct DrawableId;
}

/// One vertex in model space.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Vertex {
    pub position: Vec3,
    pub color: Color,
    pub texcoord: Vec2,
    pub normal: Vec3,
}

impl Vertex {
    #[inline]
    pub const fn new(position: Vec3, color: Color, texcoord: Vec2) -> Self {
        Self {
            position,
            color,
            texcoord,
            normal: Vec3::Z,
        }
    }

    #[inline]
    pub fn with_normal(mut self, normal: Vec3) -> Self {
        self.normal = normal;
        self
    }
}

/// Builds the six vertices (two triangles) of an axis-aligned quad in the XY plane.
pub fn quad(x: f32, y: f32, w: f32, h: f32, color: Color) -> Vec<Vertex> {
    let v = |px: f32, py: f32, u: f32, t: f32| {
        Vertex::new(Vec3::new(px, py, 0.0), color, Vec2::new(u, t))
    };
    vec![
        v(x, y, 0.0, 0.0),
        v(x + w, y, 1.0, 0.0),
        v(x + w, y + h, 1.0, 1.0),
        v(x, y, 0.0, 0.0),
        v(x + w, y + h, 1.0, 1.0),
        v(x, y + h, 0.0, 1.0),
    ]
}

/// Private static buffer of a locked drawable, with what was uploaded into it.
#[derive(Debug, Copy, Clone)]
pub(crate) struct StaticUpload {
    pub buffer: BufferHandle,
    pub capacity: usize,
    pub revision: u64,
    pub world: Mat4,
}

/// A piece of geometry plus the state it is drawn with.
///
/// Geometry is edited freely through [`Drawable::vertices_mut`]. Render state is
/// staged through [`Scene::set_state`](super::Scene::set_state) and published by
/// `RenderPass::sync`, which reinserts the drawable where ordering changed.
#[derive(Debug)]
pub struct Drawable {
    instance_id: u64,
    sequence: u64,
    timestamp: f32,

    vertices: Vec<Vertex>,
    revision: u64,
    transform: TransformId,

    state: StagedState,
    /// Key this drawable is currently stored under in every batcher it joined.
    key: SortKey,

    locked: bool,
    immediate: bool,
    batchers: Vec<BatcherId>,
    pub(crate) static_upload: Option<StaticUpload>,
}

impl Drawable {
    pub(crate) fn new(
        instance_id: u64,
        sequence: u64,
        timestamp: f32,
        vertices: Vec<Vertex>,
        state: RenderState,
        transform: TransformId,
    ) -> Self {
        let key = make_key(instance_id, sequence, timestamp, &state);
        Self {
            instance_id,
            sequence,
            timestamp,
            vertices,
            revision: 0,
            transform,
            state: StagedState::new(state),
            key,
            locked: false,
            immediate: false,
            batchers: Vec::new(),
            static_upload: None,
        }
    }

    #[inline]
    pub fn instance_id(&self) -> u64 {
        self.instance_id
    }

    #[inline]
    pub fn sort_key(&self) -> SortKey {
        self.key
    }

    #[inline]
    pub fn transform(&self) -> TransformId {
        self.transform
    }

    #[inline]
    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Mutable geometry access. Marks a locked drawable's static buffer stale.
    pub fn vertices_mut(&mut self) -> &mut Vec<Vertex> {
        self.revision = self.revision.wrapping_add(1);
        &mut self.vertices
    }

    pub fn set_vertices(&mut self, vertices: Vec<Vertex>) {
        *self.vertices_mut() = vertices;
    }

    /// Geometry revision, bumped on every mutable access.
    #[inline]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Committed state (what the batcher draws with this frame).
    #[inline]
    pub fn state(&self) -> &RenderState {
        self.state.committed()
    }

    /// State including writes not yet synced.
    #[inline]
    pub fn staged_state(&self) -> &RenderState {
        self.state.staged()
    }

    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.state.is_dirty()
    }

    #[inline]
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Locked drawables are drawn from a private static buffer instead of the
    /// shared staging arrays.
    pub fn set_locked(&mut self, locked: bool) {
        self.locked = locked;
    }

    #[inline]
    pub fn is_immediate(&self) -> bool {
        self.immediate
    }

    /// Immediate drawables are drawn once and then dropped.
    pub fn set_immediate(&mut self, immediate: bool) {
        self.immediate = immediate;
    }

    /// Batchers this drawable is registered with.
    #[inline]
    pub fn batchers(&self) -> &[BatcherId] {
        &self.batchers
    }

    pub(crate) fn stage(&mut self, attr: StateAttr) -> bool {
        self.state.stage(attr)
    }

    /// Publishes staged state. Returns `(old_key, new_key)` if the index key moved.
    pub(crate) fn commit(&mut self) -> Option<(SortKey, SortKey)> {
        if !self.state.commit() {
            return None;
        }
        let old = self.key;
        self.key = make_key(self.instance_id, self.sequence, self.timestamp, self.state.committed());
        Some((old, self.key))
    }

    /// Returns `false` if already a member.
    pub(crate) fn join(&mut self, batcher: BatcherId) -> bool {
        if self.batchers.contains(&batcher) {
            return false;
        }
        self.batchers.push(batcher);
        true
    }

    pub(crate) fn leave(&mut self, batcher: BatcherId) -> bool {
        let before = self.batchers.len();
        self.batchers.retain(|&b| b != batcher);
        self.batchers.len() != before
    }
}

fn make_key(instance_id: u64, sequence: u64, timestamp: f32, state: &RenderState) -> SortKey {
    SortKey {
        instance_id,
        depth: state.depth,
        shader: state.shader,
        texture: state.texture,
        primitive: state.primitive,
        clip: state.is_clipped(),
        timestamp,
        sequence,
    }
}
