use crate::coords::ClipRect;
use crate::error::Result;
use crate::scene::{PrimitiveType, ShaderId, TextureId};

use super::staging::VertexStreams;

/// Opaque handle to a vertex buffer owned by a [`GpuBackend`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct BufferHandle(pub u32);

/// How a buffer is expected to be written.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum BufferUsage {
    /// Rewritten every flush (shared staging).
    Dynamic,
    /// Written once and reused across frames (locked drawables).
    Static,
}

/// GPU sink the batcher talks to.
///
/// The batcher calls this only at flush points and state-hook boundaries.
/// Implementations may record commands and replay them later; they must
/// preserve call order.
pub trait GpuBackend {
    /// Allocates a buffer able to hold `capacity` vertices in every stream.
    fn create_buffer(&mut self, usage: BufferUsage, capacity: usize) -> Result<BufferHandle>;

    /// Replaces the contents of `buffer` with `streams`.
    fn update_buffer(&mut self, buffer: BufferHandle, streams: &VertexStreams) -> Result<()>;

    fn destroy_buffer(&mut self, buffer: BufferHandle);

    fn bind_buffer(&mut self, buffer: BufferHandle);

    /// `None` binds the backend's untextured (white) fallback.
    fn bind_texture(&mut self, texture: Option<TextureId>);

    fn use_shader(&mut self, shader: ShaderId);

    /// `None` disables scissoring.
    fn set_scissor(&mut self, clip: Option<ClipRect>);

    /// Paint-order group hook. Backends without group semantics ignore it.
    fn set_group(&mut self, group: u32) {
        let _ = group;
    }

    /// Rasterizes `count` vertices of the bound buffer starting at `first`.
    fn draw(&mut self, primitive: PrimitiveType, first: u32, count: u32);
}
