//! Coordinate types shared by the batcher and GPU backends.
//!
//! Canonical CPU space for clip rects:
//! - logical pixels (DPI-aware)
//! - origin top-left, +X right, +Y down
//!
//! Vertex math (positions, texcoords, matrices) uses `glam`.

mod clip;
mod viewport;

pub use clip::ClipRect;
pub use viewport::Viewport;
