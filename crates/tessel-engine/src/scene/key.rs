use core::cmp::Ordering;

/// Shader program identity. `ShaderId::DEFAULT` is the backend's built-in program.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Default)]
pub struct ShaderId(pub u32);

impl ShaderId {
    pub const DEFAULT: ShaderId = ShaderId(0);
}

/// Texture identity. Drawables without a texture use `None` and sort first.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct TextureId(pub u32);

/// Rasterized primitive topology.
///
/// List topologies can be concatenated across drawables inside one draw call.
/// Strip topologies cannot: each strip drawable is drawn on its own.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Default)]
pub enum PrimitiveType {
    #[default]
    Triangles,
    TriangleStrip,
    Lines,
    LineStrip,
    Points,
}

impl PrimitiveType {
    /// `true` if consecutive drawables of this type may share one draw call.
    #[inline]
    pub const fn merges(self) -> bool {
        matches!(self, Self::Triangles | Self::Lines | Self::Points)
    }
}

/// Composite key a drawable is indexed under inside a batcher.
///
/// Ordering rules (ascending):
/// 1) same `instance_id`: equal
/// 2) `depth` (back-to-front)
/// 3) `shader`
/// 4) `texture` (untextured first)
/// 5) `primitive`
/// 6) `clip` (unclipped first)
/// 7) `timestamp`
/// 8) `sequence`, then `instance_id`, so distinct drawables never compare equal
#[derive(Debug, Copy, Clone)]
pub struct SortKey {
    pub instance_id: u64,
    pub depth: f32,
    pub shader: ShaderId,
    pub texture: Option<TextureId>,
    pub primitive: PrimitiveType,
    pub clip: bool,
    /// Seconds since the owning context was created, taken at construction.
    pub timestamp: f32,
    /// Monotonic per-context insertion counter.
    pub sequence: u64,
}

impl Ord for SortKey {
    fn cmp(&self, other: &Self) -> Ordering {
        if self.instance_id == other.instance_id {
            return Ordering::Equal;
        }
        self.depth
            .total_cmp(&other.depth)
            .then_with(|| self.shader.cmp(&other.shader))
            .then_with(|| self.texture.cmp(&other.texture))
            .then_with(|| self.primitive.cmp(&other.primitive))
            .then_with(|| self.clip.cmp(&other.clip))
            .then_with(|| self.timestamp.total_cmp(&other.timestamp))
            .then_with(|| self.sequence.cmp(&other.sequence))
            .then_with(|| self.instance_id.cmp(&other.instance_id))
    }
}

impl PartialOrd for SortKey {
    #[inline]
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for SortKey {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for SortKey {}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(instance_id: u64, depth: f32, sequence: u64) -> SortKey {
        SortKey {
            instance_id,
            depth,
            shader: ShaderId::DEFAULT,
            texture: None,
            primitive: PrimitiveType::Triangles,
            clip: false,
            timestamp: 0.0,
            sequence,
        }
    }

    #[test]
    fn same_instance_is_equal_regardless_of_fields() {
        let a = key(1, 0.0, 1);
        let b = key(1, 5.0, 9);
        assert_eq!(a.cmp(&b), Ordering::Equal);
    }

    #[test]
    fn depth_dominates() {
        let back = key(1, 0.0, 9);
        let front = key(2, 1.0, 1);
        assert!(back < front);
    }

    #[test]
    fn shader_then_texture_then_primitive() {
        let base = key(1, 0.0, 1);
        let shader = SortKey { instance_id: 2, shader: ShaderId(1), ..base };
        let texture = SortKey { instance_id: 3, texture: Some(TextureId(0)), ..base };
        let lines = SortKey { instance_id: 4, primitive: PrimitiveType::Lines, ..base };
        assert!(base < texture);
        assert!(texture < shader);
        assert!(base < lines);
        assert!(lines < texture);
    }

    #[test]
    fn unclipped_sorts_before_clipped() {
        let clipped = SortKey { clip: true, ..key(1, 0.0, 0) };
        let open = key(2, 0.0, 5);
        assert!(open < clipped);
    }

    #[test]
    fn full_tie_is_antisymmetric() {
        let a = key(1, 0.0, 3);
        let b = key(2, 0.0, 4);
        assert_eq!(a.cmp(&b), Ordering::Less);
        assert_eq!(b.cmp(&a), Ordering::Greater);

        // Same sequence from two contexts still orders by instance.
        let c = key(3, 0.0, 3);
        assert_eq!(a.cmp(&c), c.cmp(&a).reverse());
        assert_ne!(a.cmp(&c), Ordering::Equal);
    }

    #[test]
    fn strips_do_not_merge() {
        assert!(PrimitiveType::Triangles.merges());
        assert!(!PrimitiveType::TriangleStrip.merges());
        assert!(!PrimitiveType::LineStrip.merges());
    }
}
