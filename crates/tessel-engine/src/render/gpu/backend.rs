use std::collections::HashMap;

use crate::config::WgpuBackendConfig;
use crate::coords::ClipRect;
use crate::error::{BatchError, Result};
use crate::render::backend::{BufferHandle, BufferUsage, GpuBackend};
use crate::render::staging::VertexStreams;
use crate::scene::{PrimitiveType, ShaderId, TextureId};

use super::ctx::{RenderCtx, RenderTarget};
use super::pipeline::{create_pipeline, Layouts, ViewportUniform, BUILTIN_SHADER, F32};

/// CPU copy of the three vertex streams.
#[derive(Debug, Default)]
struct Streams {
    positions: Vec<f32>,
    colors: Vec<f32>,
    texcoords: Vec<f32>,
}

impl Streams {
    fn vertex_count(&self) -> usize {
        self.positions.len() / crate::render::staging::POSITION_COMPONENTS
    }

    fn push(&mut self, streams: &VertexStreams) {
        self.positions.extend_from_slice(streams.positions());
        self.colors.extend_from_slice(streams.colors());
        self.texcoords.extend_from_slice(streams.texcoords());
    }

    fn clear(&mut self) {
        self.positions.clear();
        self.colors.clear();
        self.texcoords.clear();
    }
}

/// GPU side of [`Streams`]: one vertex buffer per stream.
struct GpuStreams {
    positions: wgpu::Buffer,
    colors: wgpu::Buffer,
    texcoords: wgpu::Buffer,
    capacity: usize,
}

impl GpuStreams {
    fn new(device: &wgpu::Device, capacity: usize, label: &str) -> Self {
        use crate::render::staging::{COLOR_COMPONENTS, POSITION_COMPONENTS, TEXCOORD_COMPONENTS};

        let buffer = |name: &str, components: usize| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(&format!("{label} {name}")),
                size: (capacity * components) as u64 * F32,
                usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        };
        Self {
            positions: buffer("positions", POSITION_COMPONENTS),
            colors: buffer("colors", COLOR_COMPONENTS),
            texcoords: buffer("texcoords", TEXCOORD_COMPONENTS),
            capacity,
        }
    }

    fn write(&self, queue: &wgpu::Queue, streams: &Streams) {
        queue.write_buffer(&self.positions, 0, bytemuck::cast_slice(&streams.positions));
        queue.write_buffer(&self.colors, 0, bytemuck::cast_slice(&streams.colors));
        queue.write_buffer(&self.texcoords, 0, bytemuck::cast_slice(&streams.texcoords));
    }

    fn bind(&self, rpass: &mut wgpu::RenderPass<'_>) {
        rpass.set_vertex_buffer(0, self.positions.slice(..));
        rpass.set_vertex_buffer(1, self.colors.slice(..));
        rpass.set_vertex_buffer(2, self.texcoords.slice(..));
    }
}

enum Slot {
    /// Uploads land in the per-frame arena; `offset` is the latest one.
    Dynamic { capacity: usize, offset: Option<u32> },
    Static {
        capacity: usize,
        data: Streams,
        gpu: Option<GpuStreams>,
        dirty: bool,
    },
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum Source {
    Arena { offset: u32 },
    Static(BufferHandle),
}

#[derive(Debug, Copy, Clone)]
struct PendingDraw {
    source: Source,
    primitive: PrimitiveType,
    first: u32,
    count: u32,
    texture: Option<TextureId>,
    shader: ShaderId,
    scissor: Option<ClipRect>,
}

/// [`GpuBackend`] over wgpu.
///
/// Calls made while batching are recorded; [`WgpuBackend::encode`] uploads the
/// frame's vertex data and replays the draws into one render pass. Every
/// dynamic upload is appended to a per-frame arena, so a dynamic buffer that is
/// rewritten several times in one frame still feeds each draw the data it had
/// when that draw was issued.
pub struct WgpuBackend {
    config: WgpuBackendConfig,

    slots: HashMap<BufferHandle, Slot>,
    retired: Vec<BufferHandle>,
    next_handle: u32,

    bound: Option<BufferHandle>,
    texture: Option<TextureId>,
    shader: ShaderId,
    scissor: Option<ClipRect>,

    arena: Streams,
    arena_gpu: Option<GpuStreams>,
    draws: Vec<PendingDraw>,

    shader_sources: HashMap<ShaderId, String>,
    modules: HashMap<ShaderId, wgpu::ShaderModule>,
    pipelines: HashMap<(ShaderId, PrimitiveType), wgpu::RenderPipeline>,
    pipeline_format: Option<wgpu::TextureFormat>,

    layouts: Option<Layouts>,
    viewport_ubo: Option<wgpu::Buffer>,
    viewport_bind: Option<wgpu::BindGroup>,
    sampler: Option<wgpu::Sampler>,
    white: Option<wgpu::BindGroup>,
    textures: HashMap<TextureId, wgpu::BindGroup>,
}

impl WgpuBackend {
    pub fn new(config: WgpuBackendConfig) -> Self {
        Self {
            config,
            slots: HashMap::new(),
            retired: Vec::new(),
            next_handle: 0,
            bound: None,
            texture: None,
            shader: ShaderId::DEFAULT,
            scissor: None,
            arena: Streams::default(),
            arena_gpu: None,
            draws: Vec::new(),
            shader_sources: HashMap::new(),
            modules: HashMap::new(),
            pipelines: HashMap::new(),
            pipeline_format: None,
            layouts: None,
            viewport_ubo: None,
            viewport_bind: None,
            sampler: None,
            white: None,
            textures: HashMap::new(),
        }
    }

    #[inline]
    pub fn config(&self) -> &WgpuBackendConfig {
        &self.config
    }

    /// Draws recorded since the last `encode`.
    #[inline]
    pub fn pending_draws(&self) -> usize {
        self.draws.len()
    }

    /// Registers WGSL source for `id`. The module must expose `vs_main` and
    /// `fs_main` and use the built-in bind group and vertex layout.
    pub fn register_shader(&mut self, id: ShaderId, wgsl: impl Into<String>) {
        self.shader_sources.insert(id, wgsl.into());
        self.modules.remove(&id);
        self.pipelines.retain(|(shader, _), _| *shader != id);
    }

    /// Makes `view` available as `id`.
    pub fn register_texture(&mut self, ctx: &RenderCtx<'_>, id: TextureId, view: &wgpu::TextureView) {
        self.ensure_resources(ctx);
        let (Some(layouts), Some(sampler)) = (self.layouts.as_ref(), self.sampler.as_ref()) else {
            return;
        };
        let bind_group = texture_bind_group(ctx.device, layouts, view, sampler, &self.config.label);
        self.textures.insert(id, bind_group);
    }

    /// Uploads premultiplied RGBA8 pixels as texture `id`.
    pub fn upload_texture_rgba8(
        &mut self,
        ctx: &RenderCtx<'_>,
        id: TextureId,
        width: u32,
        height: u32,
        pixels: &[u8],
    ) -> Result<()> {
        let expected = width as usize * height as usize * 4;
        if width == 0 || height == 0 || pixels.len() != expected {
            return Err(BatchError::Backend(format!(
                "texture {id:?}: expected {expected} bytes for {width}x{height}, got {}",
                pixels.len()
            )));
        }
        let view = rgba8_texture(ctx, width, height, pixels, &format!("{} texture", self.config.label));
        self.register_texture(ctx, id, &view);
        Ok(())
    }

    pub fn unregister_texture(&mut self, id: TextureId) -> bool {
        self.textures.remove(&id).is_some()
    }

    /// Uploads the recorded frame and replays it into `target`.
    ///
    /// Returns the number of draw calls encoded.
    pub fn encode(&mut self, ctx: &RenderCtx<'_>, target: &mut RenderTarget<'_>) -> usize {
        self.ensure_resources(ctx);
        let keys: Vec<_> = self.draws.iter().map(|d| (d.shader, d.primitive)).collect();
        for (shader, primitive) in keys {
            self.ensure_pipeline(ctx, shader, primitive);
        }
        self.upload(ctx);

        let encoded = if self.draws.is_empty() && self.config.clear_color.is_none() {
            0
        } else {
            self.replay(ctx, target)
        };

        self.arena.clear();
        self.draws.clear();
        for handle in self.retired.drain(..) {
            self.slots.remove(&handle);
        }
        for slot in self.slots.values_mut() {
            if let Slot::Dynamic { offset, .. } = slot {
                *offset = None;
            }
        }
        encoded
    }

    // ── resources ─────────────────────────────────────────────────────────

    fn ensure_resources(&mut self, ctx: &RenderCtx<'_>) {
        if ctx.invalidates(self.pipeline_format) {
            self.pipelines.clear();
            self.pipeline_format = Some(ctx.target_format);
        }
        if self.layouts.is_some() {
            return;
        }

        let label = &self.config.label;
        let layouts = Layouts::new(ctx.device, label);

        let viewport_ubo = ctx.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(&format!("{label} viewport ubo")),
            size: std::mem::size_of::<ViewportUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let viewport_bind = ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&format!("{label} viewport bind group")),
            layout: &layouts.viewport,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: viewport_ubo.as_entire_binding(),
            }],
        });

        let sampler = ctx.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some(&format!("{label} sampler")),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let white_view = rgba8_texture(ctx, 1, 1, &[255; 4], &format!("{label} white texture"));
        let white = texture_bind_group(ctx.device, &layouts, &white_view, &sampler, label);

        log::debug!("{label}: gpu resources created");

        self.layouts = Some(layouts);
        self.viewport_ubo = Some(viewport_ubo);
        self.viewport_bind = Some(viewport_bind);
        self.sampler = Some(sampler);
        self.white = Some(white);
    }

    fn ensure_pipeline(&mut self, ctx: &RenderCtx<'_>, shader: ShaderId, primitive: PrimitiveType) {
        if self.pipelines.contains_key(&(shader, primitive)) {
            return;
        }
        let Some(layouts) = self.layouts.as_ref() else { return };

        let label = &self.config.label;
        let module = self.modules.entry(shader).or_insert_with(|| {
            let source = match self.shader_sources.get(&shader) {
                Some(src) => src.clone(),
                None => {
                    if shader != ShaderId::DEFAULT {
                        log::warn!("{label}: shader {shader:?} not registered; using built-in");
                    }
                    BUILTIN_SHADER.to_string()
                }
            };
            ctx.device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(&format!("{label} shader {}", shader.0)),
                source: wgpu::ShaderSource::Wgsl(source.into()),
            })
        });

        let pipeline = create_pipeline(
            ctx.device,
            layouts,
            module,
            ctx.target_format,
            primitive,
            &format!("{label} pipeline {}/{primitive:?}", shader.0),
        );
        log::debug!("{label}: pipeline created for shader {} / {primitive:?}", shader.0);
        self.pipelines.insert((shader, primitive), pipeline);
    }

    fn upload(&mut self, ctx: &RenderCtx<'_>) {
        if let Some(ubo) = self.viewport_ubo.as_ref() {
            let u = ctx.viewport_uniform();
            ctx.queue.write_buffer(ubo, 0, bytemuck::bytes_of(&u));
        }

        let needed = self.arena.vertex_count();
        if needed > 0 {
            let too_small = self.arena_gpu.as_ref().is_none_or(|g| g.capacity < needed);
            if too_small {
                let capacity = needed.next_power_of_two().max(self.config.initial_arena_vertices);
                log::debug!("{}: upload arena grown to {capacity} vertices", self.config.label);
                self.arena_gpu = Some(GpuStreams::new(
                    ctx.device,
                    capacity,
                    &format!("{} arena", self.config.label),
                ));
            }
            if let Some(gpu) = self.arena_gpu.as_ref() {
                gpu.write(ctx.queue, &self.arena);
            }
        }

        for (handle, slot) in &mut self.slots {
            let Slot::Static {
                capacity,
                data,
                gpu,
                dirty,
            } = slot
            else {
                continue;
            };
            if !*dirty {
                continue;
            }
            let stream = gpu.get_or_insert_with(|| {
                GpuStreams::new(
                    ctx.device,
                    *capacity,
                    &format!("{} static {}", self.config.label, handle.0),
                )
            });
            stream.write(ctx.queue, data);
            *dirty = false;
        }
    }

    // ── replay ────────────────────────────────────────────────────────────

    fn replay(&self, ctx: &RenderCtx<'_>, target: &mut RenderTarget<'_>) -> usize {
        let (Some(viewport_bind), Some(white)) = (self.viewport_bind.as_ref(), self.white.as_ref())
        else {
            return 0;
        };

        let label = format!("{} batch pass", self.config.label);
        let mut rpass = target.begin_pass(&label, self.config.clear_color);
        rpass.set_bind_group(0, viewport_bind, &[]);

        let mut pipeline = None;
        let mut texture = None;
        let mut bound: Option<Option<BufferHandle>> = None;
        let mut encoded = 0;

        for d in &self.draws {
            let Some((sx, sy, sw, sh)) = ctx.scissor(d.scissor) else { continue };

            let key = (d.shader, d.primitive);
            if pipeline != Some(key) {
                let Some(p) = self.pipelines.get(&key) else { continue };
                rpass.set_pipeline(p);
                pipeline = Some(key);
            }

            if texture != Some(d.texture) {
                let bind_group = match d.texture {
                    Some(t) => self.textures.get(&t).unwrap_or_else(|| {
                        log::warn!("{}: texture {t:?} not registered; drawing untextured", self.config.label);
                        white
                    }),
                    None => white,
                };
                rpass.set_bind_group(1, bind_group, &[]);
                texture = Some(d.texture);
            }

            let (buffer, base) = match d.source {
                Source::Arena { offset } => (None, offset),
                Source::Static(h) => (Some(h), 0),
            };
            if bound != Some(buffer) {
                let streams = match buffer {
                    None => self.arena_gpu.as_ref(),
                    Some(h) => match self.slots.get(&h) {
                        Some(Slot::Static { gpu, .. }) => gpu.as_ref(),
                        _ => None,
                    },
                };
                let Some(streams) = streams else { continue };
                streams.bind(&mut rpass);
                bound = Some(buffer);
            }

            rpass.set_scissor_rect(sx, sy, sw, sh);
            let start = base + d.first;
            rpass.draw(start..start + d.count, 0..1);
            encoded += 1;
        }
        encoded
    }
}

impl GpuBackend for WgpuBackend {
    fn create_buffer(&mut self, usage: BufferUsage, capacity: usize) -> Result<BufferHandle> {
        let handle = BufferHandle(self.next_handle);
        self.next_handle = self
            .next_handle
            .checked_add(1)
            .ok_or_else(|| BatchError::Backend("buffer handles exhausted".into()))?;

        let slot = match usage {
            BufferUsage::Dynamic => Slot::Dynamic {
                capacity,
                offset: None,
            },
            BufferUsage::Static => Slot::Static {
                capacity,
                data: Streams::default(),
                gpu: None,
                dirty: false,
            },
        };
        self.slots.insert(handle, slot);
        Ok(handle)
    }

    fn update_buffer(&mut self, buffer: BufferHandle, streams: &VertexStreams) -> Result<()> {
        let count = streams.vertex_count();
        let slot = self
            .slots
            .get_mut(&buffer)
            .ok_or_else(|| BatchError::Backend(format!("update of unknown buffer {buffer:?}")))?;

        match slot {
            Slot::Dynamic { capacity, offset } => {
                if count > *capacity {
                    return Err(BatchError::Backend(format!(
                        "buffer {buffer:?} holds {capacity} vertices, got {count}"
                    )));
                }
                *offset = Some(self.arena.vertex_count() as u32);
                self.arena.push(streams);
            }
            Slot::Static {
                capacity,
                data,
                dirty,
                ..
            } => {
                if count > *capacity {
                    return Err(BatchError::Backend(format!(
                        "buffer {buffer:?} holds {capacity} vertices, got {count}"
                    )));
                }
                data.clear();
                data.push(streams);
                *dirty = true;
            }
        }
        Ok(())
    }

    fn destroy_buffer(&mut self, buffer: BufferHandle) {
        if self.bound == Some(buffer) {
            self.bound = None;
        }
        // Recorded draws may still read it; dropped after the next encode.
        if self.slots.contains_key(&buffer) {
            self.retired.push(buffer);
        }
    }

    fn bind_buffer(&mut self, buffer: BufferHandle) {
        self.bound = Some(buffer);
    }

    fn bind_texture(&mut self, texture: Option<TextureId>) {
        self.texture = texture;
    }

    fn use_shader(&mut self, shader: ShaderId) {
        self.shader = shader;
    }

    fn set_scissor(&mut self, clip: Option<ClipRect>) {
        self.scissor = clip;
    }

    fn draw(&mut self, primitive: PrimitiveType, first: u32, count: u32) {
        let Some(handle) = self.bound else {
            log::warn!("{}: draw without a bound buffer ignored", self.config.label);
            return;
        };
        let source = match self.slots.get(&handle) {
            Some(Slot::Dynamic {
                offset: Some(offset),
                ..
            }) => Source::Arena { offset: *offset },
            Some(Slot::Static { .. }) => Source::Static(handle),
            _ => {
                log::warn!("{}: draw from empty buffer {handle:?} ignored", self.config.label);
                return;
            }
        };
        self.draws.push(PendingDraw {
            source,
            primitive,
            first,
            count,
            texture: self.texture,
            shader: self.shader,
            scissor: self.scissor,
        });
    }
}

fn texture_bind_group(
    device: &wgpu::Device,
    layouts: &Layouts,
    view: &wgpu::TextureView,
    sampler: &wgpu::Sampler,
    label: &str,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some(&format!("{label} texture bind group")),
        layout: &layouts.texture,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
        ],
    })
}

fn rgba8_texture(
    ctx: &RenderCtx<'_>,
    width: u32,
    height: u32,
    pixels: &[u8],
    label: &str,
) -> wgpu::TextureView {
    let size = wgpu::Extent3d {
        width,
        height,
        depth_or_array_layers: 1,
    };
    let texture = ctx.device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8Unorm,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    ctx.queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        pixels,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(4 * width),
            rows_per_image: Some(height),
        },
        size,
    );
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paint::Color;
    use crate::scene::quad;
    use glam::Mat4;

    fn streams(quads: usize) -> VertexStreams {
        let mut s = VertexStreams::with_capacity(quads * 6);
        for i in 0..quads {
            s.append(&quad(i as f32, 0.0, 1.0, 1.0, Color::WHITE), &Mat4::IDENTITY);
        }
        s
    }

    // ── recording ─────────────────────────────────────────────────────────

    #[test]
    fn rewritten_dynamic_buffer_keeps_each_upload() {
        let mut gpu = WgpuBackend::new(WgpuBackendConfig::default());
        let b = gpu.create_buffer(BufferUsage::Dynamic, 64).unwrap();

        gpu.update_buffer(b, &streams(1)).unwrap();
        gpu.bind_buffer(b);
        gpu.draw(PrimitiveType::Triangles, 0, 6);
        gpu.update_buffer(b, &streams(2)).unwrap();
        gpu.draw(PrimitiveType::Triangles, 0, 12);

        assert_eq!(gpu.arena.vertex_count(), 18);
        let sources: Vec<_> = gpu.draws.iter().map(|d| d.source).collect();
        assert_eq!(sources, vec![Source::Arena { offset: 0 }, Source::Arena { offset: 6 }]);
    }

    #[test]
    fn draws_capture_bound_state() {
        let mut gpu = WgpuBackend::new(WgpuBackendConfig::default());
        let b = gpu.create_buffer(BufferUsage::Static, 6).unwrap();
        gpu.update_buffer(b, &streams(1)).unwrap();
        gpu.bind_buffer(b);
        gpu.bind_texture(Some(TextureId(3)));
        gpu.use_shader(ShaderId(2));
        gpu.draw(PrimitiveType::Lines, 0, 6);

        let d = gpu.draws[0];
        assert_eq!(d.source, Source::Static(b));
        assert_eq!(d.texture, Some(TextureId(3)));
        assert_eq!(d.shader, ShaderId(2));
        assert_eq!(d.primitive, PrimitiveType::Lines);
    }

    #[test]
    fn draw_without_data_is_ignored() {
        let mut gpu = WgpuBackend::new(WgpuBackendConfig::default());
        gpu.draw(PrimitiveType::Triangles, 0, 3);
        let b = gpu.create_buffer(BufferUsage::Dynamic, 6).unwrap();
        gpu.bind_buffer(b);
        gpu.draw(PrimitiveType::Triangles, 0, 3);
        assert_eq!(gpu.pending_draws(), 0);
    }

    #[test]
    fn capacity_is_enforced() {
        let mut gpu = WgpuBackend::new(WgpuBackendConfig::default());
        let b = gpu.create_buffer(BufferUsage::Dynamic, 6).unwrap();
        assert!(matches!(gpu.update_buffer(b, &streams(2)), Err(BatchError::Backend(_))));
        assert!(gpu.update_buffer(BufferHandle(99), &streams(1)).is_err());
    }

    #[test]
    fn destroyed_buffers_are_retired_until_encode() {
        let mut gpu = WgpuBackend::new(WgpuBackendConfig::default());
        let b = gpu.create_buffer(BufferUsage::Static, 6).unwrap();
        gpu.update_buffer(b, &streams(1)).unwrap();
        gpu.bind_buffer(b);
        gpu.draw(PrimitiveType::Triangles, 0, 6);
        gpu.destroy_buffer(b);

        assert!(gpu.slots.contains_key(&b));
        assert_eq!(gpu.retired, vec![b]);
        assert!(gpu.bound.is_none());
    }

    #[test]
    fn registering_a_shader_drops_its_module() {
        let mut gpu = WgpuBackend::new(WgpuBackendConfig::default());
        gpu.register_shader(ShaderId(7), BUILTIN_SHADER);
        assert!(gpu.shader_sources.contains_key(&ShaderId(7)));
        assert!(!gpu.modules.contains_key(&ShaderId(7)));
    }
}
