//! wgpu adapter for the batcher.
//!
//! Convention:
//! - vertex positions are world space in logical pixels (top-left origin, +Y down)
//! - the vertex shader converts to NDC using a viewport uniform
//! - colors are premultiplied; blending is `One, OneMinusSrcAlpha`

mod backend;
mod ctx;
mod device;
mod pipeline;

pub use backend::WgpuBackend;
pub use ctx::{RenderCtx, RenderTarget};
pub use device::{HeadlessGpu, HeadlessInit};
