use anyhow::{Context, Result};

use crate::coords::Viewport;

use super::ctx::RenderCtx;

/// Initialization parameters for [`HeadlessGpu`].
#[derive(Debug, Clone)]
pub struct HeadlessInit {
    /// Offscreen target size in physical pixels.
    pub width: u32,
    pub height: u32,

    /// Logical-to-physical scale applied to the viewport.
    pub scale_factor: f32,

    pub format: wgpu::TextureFormat,

    /// Use a software adapter when no hardware one is available.
    pub allow_fallback_adapter: bool,

    /// Limits requested from the adapter/device.
    pub required_limits: wgpu::Limits,
}

impl Default for HeadlessInit {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            scale_factor: 1.0,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            allow_fallback_adapter: true,
            required_limits: wgpu::Limits::downlevel_defaults(),
        }
    }
}

/// Device, queue and an offscreen color target. No window or surface.
pub struct HeadlessGpu {
    device: wgpu::Device,
    queue: wgpu::Queue,
    target: wgpu::Texture,
    view: wgpu::TextureView,
    format: wgpu::TextureFormat,
    viewport: Viewport,
}

impl HeadlessGpu {
    /// Acquires an adapter and device. Asynchronous under wgpu; block on it
    /// with `pollster` in binaries.
    pub async fn new(init: HeadlessInit) -> Result<Self> {
        anyhow::ensure!(init.width > 0 && init.height > 0, "offscreen target has zero size");
        anyhow::ensure!(init.scale_factor > 0.0, "scale factor must be positive");

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = match instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
        {
            Ok(adapter) => adapter,
            Err(e) if init.allow_fallback_adapter => {
                log::warn!("no hardware adapter ({e}); trying fallback adapter");
                instance
                    .request_adapter(&wgpu::RequestAdapterOptions {
                        power_preference: wgpu::PowerPreference::LowPower,
                        compatible_surface: None,
                        force_fallback_adapter: true,
                    })
                    .await
                    .context("failed to find a fallback GPU adapter")?
            }
            Err(e) => return Err(e).context("failed to find a suitable GPU adapter"),
        };
        log::info!("adapter: {:?}", adapter.get_info().name);

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("tessel headless device"),
                required_features: wgpu::Features::empty(),
                required_limits: init.required_limits,
                experimental_features: wgpu::ExperimentalFeatures::disabled(),
                memory_hints: wgpu::MemoryHints::Performance,
                trace: wgpu::Trace::Off,
            })
            .await
            .context("failed to create wgpu device/queue")?;

        let target = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("tessel offscreen target"),
            size: wgpu::Extent3d {
                width: init.width,
                height: init.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: init.format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = target.create_view(&wgpu::TextureViewDescriptor::default());

        let viewport = Viewport::new(
            init.width as f32 / init.scale_factor,
            init.height as f32 / init.scale_factor,
            init.scale_factor,
        );

        Ok(Self {
            device,
            queue,
            target,
            view,
            format: init.format,
            viewport,
        })
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub fn target(&self) -> &wgpu::Texture {
        &self.target
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    /// Viewport in logical pixels.
    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn ctx(&self) -> RenderCtx<'_> {
        RenderCtx::new(&self.device, &self.queue, self.format, self.viewport)
    }

    pub fn create_encoder(&self) -> wgpu::CommandEncoder {
        self.device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("tessel frame encoder"),
            })
    }

    pub fn submit(&self, encoder: wgpu::CommandEncoder) {
        self.queue.submit(std::iter::once(encoder.finish()));
    }
}
