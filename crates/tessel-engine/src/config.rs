//! Engine and batcher configuration.
//!
//! Configuration is plain data with conservative defaults. Add fields only when a
//! concrete backend or workload requires them.

use crate::paint::Color;

/// Per-batcher configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct BatcherConfig {
    /// Debug label used in log output and GPU object labels.
    pub label: String,

    /// Paint layer. Batchers on lower layers are drawn first.
    pub layer: i32,

    /// Capacity of the shared staging arrays, in vertices.
    ///
    /// This is the hardware-dependent maximum a single flush may carry. A single
    /// drawable larger than this cannot be batched.
    pub max_vertices: usize,

    /// Number of dynamic GPU buffers used round-robin across flushes.
    ///
    /// Two is the minimum: the CPU writes one while the GPU consumes the other.
    pub buffer_count: usize,
}

impl Default for BatcherConfig {
    fn default() -> Self {
        Self {
            label: "batcher".to_string(),
            layer: 0,
            max_vertices: 65_535,
            buffer_count: 2,
        }
    }
}

impl BatcherConfig {
    pub const MIN_BUFFERS: usize = 2;
    /// One triangle.
    pub const MIN_VERTICES: usize = 3;

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_layer(mut self, layer: i32) -> Self {
        self.layer = layer;
        self
    }

    pub fn with_max_vertices(mut self, max_vertices: usize) -> Self {
        self.max_vertices = max_vertices;
        self
    }

    /// Returns a copy with out-of-range values clamped to usable minimums.
    pub fn validated(&self) -> Self {
        let mut out = self.clone();
        if out.buffer_count < Self::MIN_BUFFERS {
            log::warn!(
                "batcher '{}': buffer_count {} raised to {}",
                out.label,
                out.buffer_count,
                Self::MIN_BUFFERS
            );
            out.buffer_count = Self::MIN_BUFFERS;
        }
        if out.max_vertices < Self::MIN_VERTICES {
            log::warn!(
                "batcher '{}': max_vertices {} raised to {}",
                out.label,
                out.max_vertices,
                Self::MIN_VERTICES
            );
            out.max_vertices = Self::MIN_VERTICES;
        }
        out
    }
}

/// Shared engine configuration, carried by the render context.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Template for batchers created without an explicit config.
    pub default_batcher: BatcherConfig,

    /// Emit a `debug!` line with the frame statistics after every frame.
    pub log_frame_stats: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_batcher: BatcherConfig::default(),
            log_frame_stats: false,
        }
    }
}

/// Configuration of the wgpu adapter (`render::gpu::WgpuBackend`).
#[derive(Debug, Clone, PartialEq)]
pub struct WgpuBackendConfig {
    /// Prefix for GPU object labels.
    pub label: String,

    /// Initial capacity of the per-frame upload arena, in vertices. The arena
    /// grows to the next power of two when a frame needs more.
    pub initial_arena_vertices: usize,

    /// Clear color for the pass (`None` loads the existing contents).
    pub clear_color: Option<Color>,
}

impl Default for WgpuBackendConfig {
    fn default() -> Self {
        Self {
            label: "tessel".to_string(),
            initial_arena_vertices: 4096,
            clear_color: Some(Color::TRANSPARENT),
        }
    }
}
