use bitflags::bitflags;

use super::state::RenderState;

bitflags! {
    /// Render-state fields that changed between two consecutive drawables.
    #[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
    pub struct StateChanges: u8 {
        const DEPTH     = 1 << 0;
        const GROUP     = 1 << 1;
        const TEXTURE   = 1 << 2;
        const SHADER    = 1 << 3;
        const PRIMITIVE = 1 << 4;
        /// Clip presence or clip rect changed.
        const CLIP      = 1 << 5;
    }
}

impl StateChanges {
    /// Changes that need a GPU state transition. Depth only affects order.
    pub const FLUSH: StateChanges = StateChanges::GROUP
        .union(StateChanges::TEXTURE)
        .union(StateChanges::SHADER)
        .union(StateChanges::PRIMITIVE)
        .union(StateChanges::CLIP);

    /// Field-by-field comparison.
    pub fn between(last: &RenderState, current: &RenderState) -> StateChanges {
        let mut changes = StateChanges::empty();
        changes.set(StateChanges::DEPTH, last.depth.to_bits() != current.depth.to_bits());
        changes.set(StateChanges::GROUP, last.group != current.group);
        changes.set(StateChanges::TEXTURE, last.texture != current.texture);
        changes.set(StateChanges::SHADER, last.shader != current.shader);
        changes.set(StateChanges::PRIMITIVE, last.primitive != current.primitive);
        changes.set(StateChanges::CLIP, last.clip_rect != current.clip_rect);
        changes
    }
}

/// Tracks the render state of the previously processed drawable.
///
/// A batcher feeds every drawable's state through [`StateDiff::update`] in sort
/// order; the result tells it whether pending vertices must be flushed and which
/// GPU hooks to re-activate.
#[derive(Debug, Default, Clone)]
pub struct StateDiff {
    last: Option<RenderState>,
    current: Option<RenderState>,
    changes: StateChanges,
}

impl StateDiff {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forgets all history. The next update reports every field as changed.
    pub fn reset(&mut self) {
        self.last = None;
        self.current = None;
        self.changes = StateChanges::empty();
    }

    /// Moves `current` to `last` and overwrites `current` with `state`.
    ///
    /// Returns whether a flush is required before drawing with `state`.
    pub fn update(&mut self, state: &RenderState) -> bool {
        self.last = self.current.take();
        self.changes = match &self.last {
            Some(last) => StateChanges::between(last, state),
            None => StateChanges::all(),
        };
        self.current = Some(state.clone());
        self.requires_flush()
    }

    /// `true` if any field changed in the last update, depth included.
    #[inline]
    pub fn is_dirty(&self) -> bool {
        !self.changes.is_empty()
    }

    #[inline]
    pub fn requires_flush(&self) -> bool {
        self.changes.intersects(StateChanges::FLUSH)
    }

    #[inline]
    pub fn changes(&self) -> StateChanges {
        self.changes
    }

    #[inline]
    pub fn current(&self) -> Option<&RenderState> {
        self.current.as_ref()
    }

    #[inline]
    pub fn last(&self) -> Option<&RenderState> {
        self.last.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::ClipRect;
    use crate::scene::{PrimitiveType, ShaderId, TextureId};

    #[test]
    fn first_update_requires_flush() {
        let mut diff = StateDiff::new();
        assert!(diff.update(&RenderState::default()));
        assert_eq!(diff.changes(), StateChanges::all());
        assert!(diff.last().is_none());
    }

    #[test]
    fn identical_state_is_clean() {
        let mut diff = StateDiff::new();
        diff.update(&RenderState::default());
        assert!(!diff.update(&RenderState::default()));
        assert!(!diff.is_dirty());
    }

    #[test]
    fn depth_only_change_is_dirty_but_does_not_flush() {
        let mut diff = StateDiff::new();
        diff.update(&RenderState::default());
        assert!(!diff.update(&RenderState::default().with_depth(3.0)));
        assert!(diff.is_dirty());
        assert_eq!(diff.changes(), StateChanges::DEPTH);
    }

    #[test]
    fn each_flush_field_is_detected() {
        let base = RenderState::default();
        let variants = [
            (base.clone().with_group(1), StateChanges::GROUP),
            (base.clone().with_texture(TextureId(2)), StateChanges::TEXTURE),
            (base.clone().with_shader(ShaderId(5)), StateChanges::SHADER),
            (base.clone().with_primitive(PrimitiveType::Lines), StateChanges::PRIMITIVE),
            (base.clone().with_clip(ClipRect::new(0.0, 0.0, 4.0, 4.0)), StateChanges::CLIP),
        ];
        for (state, expected) in variants {
            let mut diff = StateDiff::new();
            diff.update(&base);
            assert!(diff.update(&state), "{expected:?} should flush");
            assert_eq!(diff.changes(), expected);
            assert_eq!(diff.last(), Some(&base));
            assert_eq!(diff.current(), Some(&state));
        }
    }

    #[test]
    fn reset_forgets_history() {
        let mut diff = StateDiff::new();
        diff.update(&RenderState::default());
        diff.reset();
        assert!(diff.update(&RenderState::default()));
    }
}
