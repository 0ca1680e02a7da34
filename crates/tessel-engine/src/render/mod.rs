//! Batching and GPU submission.
//!
//! A [`RenderPass`] owns [`Batcher`]s. Each batcher keeps its drawables in an
//! [`OrderedIndex`](crate::index::OrderedIndex) keyed by [`SortKey`](crate::scene::SortKey),
//! packs consecutive drawables with identical render state into shared vertex
//! streams and issues one draw call per run through a [`GpuBackend`].
//!
//! Backends:
//! - [`RecordingBackend`]: headless, records every call (tests, tools)
//! - [`gpu::WgpuBackend`]: records, then replays into a wgpu render pass

mod backend;
mod batcher;
mod pass;
mod recording;
mod staging;
mod stats;

pub mod gpu;

pub use backend::{BufferHandle, BufferUsage, GpuBackend};
pub use batcher::Batcher;
pub use pass::{BatcherId, RenderPass};
pub use recording::{DrawRecord, GpuCommand, RecordingBackend};
pub use staging::{VertexStreams, COLOR_COMPONENTS, POSITION_COMPONENTS, TEXCOORD_COMPONENTS};
pub use stats::FrameStats;
