use core::ops::AddAssign;

/// Per-frame batching counters.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct FrameStats {
    pub draw_calls: usize,
    /// Vertices submitted across all draw calls.
    pub vertices: usize,
    /// Drawables packed into the shared staging arrays.
    pub dynamic_batched: usize,
    /// Locked drawables drawn from their private buffers.
    pub static_batched: usize,
    /// Flushes forced because the staging arrays were full.
    pub overflow_flushes: usize,
    /// Drawables that required at least one GPU state hook.
    pub state_changes: usize,
    /// Static buffers (re)uploaded this frame.
    pub static_uploads: usize,
}

impl AddAssign for FrameStats {
    fn add_assign(&mut self, rhs: FrameStats) {
        self.draw_calls += rhs.draw_calls;
        self.vertices += rhs.vertices;
        self.dynamic_batched += rhs.dynamic_batched;
        self.static_batched += rhs.static_batched;
        self.overflow_flushes += rhs.overflow_flushes;
        self.state_changes += rhs.state_changes;
        self.static_uploads += rhs.static_uploads;
    }
}
