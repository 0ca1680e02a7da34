use crate::coords::ClipRect;

use super::key::{PrimitiveType, ShaderId, TextureId};

/// Render-relevant attributes of a drawable.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderState {
    /// Paint order. Lower values are drawn first (further back).
    pub depth: f32,
    /// Paint-order sub-bucket. Does not affect sorting but forces a flush.
    pub group: u32,
    pub texture: Option<TextureId>,
    pub shader: ShaderId,
    pub primitive: PrimitiveType,
    /// Scissor rect in logical pixels. `None` = no clipping.
    pub clip_rect: Option<ClipRect>,
}

impl Default for RenderState {
    fn default() -> Self {
        Self {
            depth: 0.0,
            group: 0,
            texture: None,
            shader: ShaderId::DEFAULT,
            primitive: PrimitiveType::Triangles,
            clip_rect: None,
        }
    }
}

impl RenderState {
    #[inline]
    pub fn with_depth(mut self, depth: f32) -> Self {
        self.depth = depth;
        self
    }

    #[inline]
    pub fn with_texture(mut self, texture: TextureId) -> Self {
        self.texture = Some(texture);
        self
    }

    #[inline]
    pub fn with_shader(mut self, shader: ShaderId) -> Self {
        self.shader = shader;
        self
    }

    #[inline]
    pub fn with_primitive(mut self, primitive: PrimitiveType) -> Self {
        self.primitive = primitive;
        self
    }

    #[inline]
    pub fn with_clip(mut self, clip: ClipRect) -> Self {
        self.clip_rect = Some(clip);
        self
    }

    #[inline]
    pub fn with_group(mut self, group: u32) -> Self {
        self.group = group;
        self
    }

    #[inline]
    pub fn is_clipped(&self) -> bool {
        self.clip_rect.is_some()
    }

    /// `true` if `other` would index under a different `SortKey`.
    pub fn orders_differently(&self, other: &RenderState) -> bool {
        self.depth.to_bits() != other.depth.to_bits()
            || self.shader != other.shader
            || self.texture != other.texture
            || self.primitive != other.primitive
            || self.is_clipped() != other.is_clipped()
    }

    /// Writes one attribute. Returns `false` if the value was already set.
    pub fn apply(&mut self, attr: StateAttr) -> bool {
        match attr {
            StateAttr::Depth(v) => replace_if_changed(&mut self.depth, v),
            StateAttr::Group(v) => replace_if_changed(&mut self.group, v),
            StateAttr::Texture(v) => replace_if_changed(&mut self.texture, v),
            StateAttr::Shader(v) => replace_if_changed(&mut self.shader, v),
            StateAttr::Primitive(v) => replace_if_changed(&mut self.primitive, v),
            StateAttr::Clip(v) => replace_if_changed(&mut self.clip_rect, v),
        }
    }
}

fn replace_if_changed<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        return false;
    }
    *slot = value;
    true
}

/// One attribute write, dispatched by [`RenderState::apply`].
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum StateAttr {
    Depth(f32),
    Group(u32),
    Texture(Option<TextureId>),
    Shader(ShaderId),
    Primitive(PrimitiveType),
    Clip(Option<ClipRect>),
}

/// Committed render state plus a shadow copy collecting this frame's writes.
///
/// Writes go to the shadow. `commit` publishes it once per frame, so any number
/// of writes costs at most one index reinsertion.
#[derive(Debug, Clone)]
pub struct StagedState {
    committed: RenderState,
    staged: RenderState,
    dirty: bool,
}

impl StagedState {
    pub fn new(state: RenderState) -> Self {
        Self {
            staged: state.clone(),
            committed: state,
            dirty: false,
        }
    }

    /// State the drawable is currently indexed and drawn with.
    #[inline]
    pub fn committed(&self) -> &RenderState {
        &self.committed
    }

    /// State that will apply after the next commit.
    #[inline]
    pub fn staged(&self) -> &RenderState {
        &self.staged
    }

    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Stages one write. Returns `true` if this write made the state dirty.
    ///
    /// Writing the current value is a no-op and never raises the dirty flag.
    /// NaN depths are rejected.
    pub fn stage(&mut self, attr: StateAttr) -> bool {
        if matches!(attr, StateAttr::Depth(d) if d.is_nan()) {
            log::warn!("ignoring NaN depth");
            return false;
        }
        if !self.staged.apply(attr) {
            return false;
        }
        let was_dirty = self.dirty;
        self.dirty = self.staged != self.committed;
        self.dirty && !was_dirty
    }

    /// Publishes the shadow state.
    ///
    /// Returns `true` if the published state orders differently, i.e. the owner
    /// must be removed and reinserted in every index it belongs to.
    pub fn commit(&mut self) -> bool {
        if !self.dirty {
            return false;
        }
        self.dirty = false;
        let reorder = self.committed.orders_differently(&self.staged);
        self.committed = self.staged.clone();
        reorder
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn staging_current_value_is_not_dirty() {
        let mut s = StagedState::new(RenderState::default().with_depth(2.0));
        assert!(!s.stage(StateAttr::Depth(2.0)));
        assert!(!s.is_dirty());
        assert!(!s.commit());
    }

    #[test]
    fn multiple_writes_raise_dirty_once() {
        let mut s = StagedState::new(RenderState::default());
        assert!(s.stage(StateAttr::Depth(1.0)));
        assert!(!s.stage(StateAttr::Texture(Some(TextureId(4)))));
        assert!(s.is_dirty());
        assert_eq!(s.committed().depth, 0.0);
        assert!(s.commit());
        assert_eq!(s.committed().texture, Some(TextureId(4)));
        assert!(!s.is_dirty());
    }

    #[test]
    fn reverting_a_write_clears_dirty() {
        let mut s = StagedState::new(RenderState::default());
        s.stage(StateAttr::Shader(ShaderId(3)));
        s.stage(StateAttr::Shader(ShaderId::DEFAULT));
        assert!(!s.is_dirty());
    }

    #[test]
    fn group_change_commits_without_reorder() {
        let mut s = StagedState::new(RenderState::default());
        assert!(s.stage(StateAttr::Group(7)));
        assert!(!s.commit());
        assert_eq!(s.committed().group, 7);
    }

    #[test]
    fn clip_rect_move_does_not_reorder() {
        let clip = ClipRect::new(0.0, 0.0, 10.0, 10.0);
        let mut s = StagedState::new(RenderState::default().with_clip(clip));
        s.stage(StateAttr::Clip(Some(ClipRect::new(5.0, 5.0, 10.0, 10.0))));
        assert!(!s.commit());

        s.stage(StateAttr::Clip(None));
        assert!(s.commit());
    }

    #[test]
    fn nan_depth_is_rejected() {
        let mut s = StagedState::new(RenderState::default());
        assert!(!s.stage(StateAttr::Depth(f32::NAN)));
        assert_eq!(s.staged().depth, 0.0);
    }
}
