use std::collections::HashMap;

use crate::coords::ClipRect;
use crate::error::{BatchError, Result};
use crate::scene::{PrimitiveType, ShaderId, TextureId};

use super::backend::{BufferHandle, BufferUsage, GpuBackend};
use super::staging::{VertexStreams, POSITION_COMPONENTS};

/// One call received by a [`RecordingBackend`].
#[derive(Debug, Clone, PartialEq)]
pub enum GpuCommand {
    CreateBuffer { buffer: BufferHandle, usage: BufferUsage, capacity: usize },
    UpdateBuffer { buffer: BufferHandle, vertices: usize },
    DestroyBuffer(BufferHandle),
    BindBuffer(BufferHandle),
    BindTexture(Option<TextureId>),
    UseShader(ShaderId),
    SetScissor(Option<ClipRect>),
    SetGroup(u32),
    Draw { primitive: PrimitiveType, first: u32, count: u32 },
}

/// A draw call together with the state bound when it was issued.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawRecord {
    pub buffer: Option<BufferHandle>,
    pub primitive: PrimitiveType,
    pub first: u32,
    pub count: u32,
    pub texture: Option<TextureId>,
    pub shader: ShaderId,
    pub scissor: Option<ClipRect>,
    pub group: u32,
    /// Vertex positions covered by the draw, copied out of the buffer.
    pub positions: Vec<f32>,
}

#[derive(Debug)]
struct RecordedBuffer {
    usage: BufferUsage,
    capacity: usize,
    positions: Vec<f32>,
}

/// Headless [`GpuBackend`] that records every call.
///
/// Used by tests and tools that need to inspect what a frame would submit
/// without a GPU.
#[derive(Debug, Default)]
pub struct RecordingBackend {
    commands: Vec<GpuCommand>,
    draws: Vec<DrawRecord>,
    buffers: HashMap<BufferHandle, RecordedBuffer>,
    next_buffer: u32,

    bound_buffer: Option<BufferHandle>,
    texture: Option<TextureId>,
    shader: ShaderId,
    scissor: Option<ClipRect>,
    group: u32,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn commands(&self) -> &[GpuCommand] {
        &self.commands
    }

    #[inline]
    pub fn draws(&self) -> &[DrawRecord] {
        &self.draws
    }

    /// Number of live buffers of the given usage.
    pub fn live_buffers(&self, usage: BufferUsage) -> usize {
        self.buffers.values().filter(|b| b.usage == usage).count()
    }

    /// Drops recorded commands and draws; keeps buffers and bound state.
    pub fn clear(&mut self) {
        self.commands.clear();
        self.draws.clear();
    }

    /// Total vertices across all recorded draws.
    pub fn drawn_vertices(&self) -> usize {
        self.draws.iter().map(|d| d.count as usize).sum()
    }
}

impl GpuBackend for RecordingBackend {
    fn create_buffer(&mut self, usage: BufferUsage, capacity: usize) -> Result<BufferHandle> {
        let buffer = BufferHandle(self.next_buffer);
        self.next_buffer += 1;
        self.buffers.insert(
            buffer,
            RecordedBuffer {
                usage,
                capacity,
                positions: Vec::new(),
            },
        );
        self.commands.push(GpuCommand::CreateBuffer { buffer, usage, capacity });
        Ok(buffer)
    }

    fn update_buffer(&mut self, buffer: BufferHandle, streams: &VertexStreams) -> Result<()> {
        let b = self
            .buffers
            .get_mut(&buffer)
            .ok_or_else(|| BatchError::Backend(format!("update of unknown buffer {buffer:?}")))?;
        if streams.vertex_count() > b.capacity {
            return Err(BatchError::Backend(format!(
                "buffer {buffer:?} holds {} vertices, got {}",
                b.capacity,
                streams.vertex_count()
            )));
        }
        b.positions.clear();
        b.positions.extend_from_slice(streams.positions());
        self.commands.push(GpuCommand::UpdateBuffer {
            buffer,
            vertices: streams.vertex_count(),
        });
        Ok(())
    }

    fn destroy_buffer(&mut self, buffer: BufferHandle) {
        self.buffers.remove(&buffer);
        if self.bound_buffer == Some(buffer) {
            self.bound_buffer = None;
        }
        self.commands.push(GpuCommand::DestroyBuffer(buffer));
    }

    fn bind_buffer(&mut self, buffer: BufferHandle) {
        self.bound_buffer = Some(buffer);
        self.commands.push(GpuCommand::BindBuffer(buffer));
    }

    fn bind_texture(&mut self, texture: Option<TextureId>) {
        self.texture = texture;
        self.commands.push(GpuCommand::BindTexture(texture));
    }

    fn use_shader(&mut self, shader: ShaderId) {
        self.shader = shader;
        self.commands.push(GpuCommand::UseShader(shader));
    }

    fn set_scissor(&mut self, clip: Option<ClipRect>) {
        self.scissor = clip;
        self.commands.push(GpuCommand::SetScissor(clip));
    }

    fn set_group(&mut self, group: u32) {
        self.group = group;
        self.commands.push(GpuCommand::SetGroup(group));
    }

    fn draw(&mut self, primitive: PrimitiveType, first: u32, count: u32) {
        let positions = self
            .bound_buffer
            .and_then(|b| self.buffers.get(&b))
            .map(|b| {
                let start = (first as usize * POSITION_COMPONENTS).min(b.positions.len());
                let end = ((first + count) as usize * POSITION_COMPONENTS).min(b.positions.len());
                b.positions[start..end].to_vec()
            })
            .unwrap_or_default();

        self.draws.push(DrawRecord {
            buffer: self.bound_buffer,
            primitive,
            first,
            count,
            texture: self.texture,
            shader: self.shader,
            scissor: self.scissor,
            group: self.group,
            positions,
        });
        self.commands.push(GpuCommand::Draw { primitive, first, count });
    }
}
