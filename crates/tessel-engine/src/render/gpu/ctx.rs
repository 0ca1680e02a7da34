//! Per-frame handles the wgpu adapter encodes against, and the translation of
//! batcher state (clip, clear color) into what a render pass needs.

use crate::coords::{ClipRect, Viewport};
use crate::paint::Color;

use super::pipeline::ViewportUniform;

/// Pixel rectangle handed to `set_scissor_rect`: `(x, y, width, height)`.
pub(super) type Scissor = (u32, u32, u32, u32);

/// Device handles plus the viewport and format of the target being drawn.
pub struct RenderCtx<'a> {
    pub device: &'a wgpu::Device,
    pub queue: &'a wgpu::Queue,
    pub target_format: wgpu::TextureFormat,
    pub viewport: Viewport,
}

impl<'a> RenderCtx<'a> {
    pub fn new(
        device: &'a wgpu::Device,
        queue: &'a wgpu::Queue,
        target_format: wgpu::TextureFormat,
        viewport: Viewport,
    ) -> Self {
        Self {
            device,
            queue,
            target_format,
            viewport,
        }
    }

    /// Pipelines built for `built` cannot draw into this target.
    pub(super) fn invalidates(&self, built: Option<wgpu::TextureFormat>) -> bool {
        built != Some(self.target_format)
    }

    /// `None` means the draw covers no pixels and is skipped.
    pub(super) fn scissor(&self, clip: Option<ClipRect>) -> Option<Scissor> {
        scissor_in(self.viewport, clip)
    }

    pub(super) fn viewport_uniform(&self) -> ViewportUniform {
        ViewportUniform::new(self.viewport)
    }
}

fn scissor_in(viewport: Viewport, clip: Option<ClipRect>) -> Option<Scissor> {
    match clip {
        None => {
            let (w, h) = viewport.physical_size();
            Some((0, 0, w, h))
        }
        Some(clip) => clip.to_scissor(viewport),
    }
}

/// Encoder plus the color view a frame is drawn into.
pub struct RenderTarget<'a> {
    pub encoder: &'a mut wgpu::CommandEncoder,
    pub color_view: &'a wgpu::TextureView,
}

impl<'a> RenderTarget<'a> {
    pub fn new(encoder: &'a mut wgpu::CommandEncoder, color_view: &'a wgpu::TextureView) -> Self {
        Self { encoder, color_view }
    }

    /// Opens the single color pass a frame is replayed into. Without a clear
    /// color the previous contents are kept.
    pub(super) fn begin_pass(&mut self, label: &str, clear: Option<Color>) -> wgpu::RenderPass<'_> {
        self.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(label),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: self.color_view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: load_op(clear),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        })
    }
}

fn load_op(clear: Option<Color>) -> wgpu::LoadOp<wgpu::Color> {
    match clear {
        Some(c) => wgpu::LoadOp::Clear(wgpu::Color {
            r: c.r as f64,
            g: c.g as f64,
            b: c.b as f64,
            a: c.a as f64,
        }),
        None => wgpu::LoadOp::Load,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── scissor ───────────────────────────────────────────────────────────

    #[test]
    fn unclipped_draws_cover_the_physical_target() {
        let vp = Viewport::new(320.0, 240.0, 2.0);
        assert_eq!(scissor_in(vp, None), Some((0, 0, 640, 480)));
    }

    #[test]
    fn clip_is_scaled_to_physical_pixels() {
        let vp = Viewport::new(320.0, 240.0, 2.0);
        let clip = ClipRect::new(10.0, 20.0, 30.0, 40.0);
        assert_eq!(scissor_in(vp, Some(clip)), Some((20, 40, 60, 80)));
    }

    #[test]
    fn empty_or_offscreen_clip_yields_no_scissor() {
        let vp = Viewport::new(320.0, 240.0, 1.0);
        assert_eq!(scissor_in(vp, Some(ClipRect::new(4.0, 4.0, 0.0, 0.0))), None);
        assert_eq!(scissor_in(vp, Some(ClipRect::new(400.0, 0.0, 50.0, 50.0))), None);
    }

    // ── load op ───────────────────────────────────────────────────────────

    #[test]
    fn clear_color_becomes_a_clear_load() {
        let c = Color::from_straight(1.0, 0.0, 0.0, 1.0);
        match load_op(Some(c)) {
            wgpu::LoadOp::Clear(w) => {
                assert_eq!(w.r, c.r as f64);
                assert_eq!(w.a, 1.0);
            }
            other => panic!("expected clear, got {other:?}"),
        }
        assert!(matches!(load_op(None), wgpu::LoadOp::Load));
    }
}
