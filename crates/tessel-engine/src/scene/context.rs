use std::time::Instant;

use crate::config::EngineConfig;

/// Explicit render context: identity counters, timestamp epoch and shared config.
///
/// One context is owned by each [`Scene`](super::Scene). Nothing in the engine
/// uses global state, so several independent scenes can coexist.
#[derive(Debug)]
pub struct RenderContext {
    config: EngineConfig,
    next_instance: u64,
    next_sequence: u64,
    epoch: Instant,
}

impl RenderContext {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            next_instance: 1,
            next_sequence: 0,
            epoch: Instant::now(),
        }
    }

    #[inline]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[inline]
    pub fn config_mut(&mut self) -> &mut EngineConfig {
        &mut self.config
    }

    /// Unique per-drawable identity. Never reused within a context.
    pub fn next_instance_id(&mut self) -> u64 {
        let id = self.next_instance;
        self.next_instance += 1;
        id
    }

    /// Monotonic insertion sequence.
    pub fn next_sequence(&mut self) -> u64 {
        let seq = self.next_sequence;
        self.next_sequence += 1;
        seq
    }

    /// Seconds since the context was created.
    pub fn timestamp(&self) -> f32 {
        self.epoch.elapsed().as_secs_f32()
    }
}

impl Default for RenderContext {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}
