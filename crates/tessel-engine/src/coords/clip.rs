use super::Viewport;

/// Axis-aligned clip rectangle in logical pixels (top-left origin, +Y down).
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct ClipRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl ClipRect {
    #[inline]
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    #[inline]
    pub fn right(self) -> f32 {
        self.x + self.width
    }

    #[inline]
    pub fn bottom(self) -> f32 {
        self.y + self.height
    }

    /// Overlap of two rects, or `None` when they only touch or are disjoint.
    pub fn intersect(self, other: ClipRect) -> Option<ClipRect> {
        let x0 = self.x.max(other.x);
        let y0 = self.y.max(other.y);
        let x1 = self.right().min(other.right());
        let y1 = self.bottom().min(other.bottom());

        if x1 <= x0 || y1 <= y0 {
            None
        } else {
            Some(ClipRect::new(x0, y0, x1 - x0, y1 - y0))
        }
    }

    /// Physical scissor `(x, y, w, h)` clamped to the viewport.
    ///
    /// Returns `None` for a zero-area result; the caller should skip the draw.
    pub fn to_scissor(self, viewport: Viewport) -> Option<(u32, u32, u32, u32)> {
        let (vw, vh) = viewport.physical_size();
        let s = viewport.scale_factor;

        let x = ((self.x * s).max(0.0) as u32).min(vw);
        let y = ((self.y * s).max(0.0) as u32).min(vh);
        let x2 = ((self.right() * s).max(0.0) as u32).min(vw);
        let y2 = ((self.bottom() * s).max(0.0) as u32).min(vh);

        let (w, h) = (x2.saturating_sub(x), y2.saturating_sub(y));
        if w == 0 || h == 0 { None } else { Some((x, y, w, h)) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(x: f32, y: f32, w: f32, h: f32) -> ClipRect {
        ClipRect::new(x, y, w, h)
    }

    // ── intersect ─────────────────────────────────────────────────────────

    #[test]
    fn intersect_overlapping() {
        let i = r(0.0, 0.0, 10.0, 10.0).intersect(r(5.0, 5.0, 10.0, 10.0));
        assert_eq!(i, Some(r(5.0, 5.0, 5.0, 5.0)));
    }

    #[test]
    fn intersect_touching_edge_is_none() {
        assert!(r(0.0, 0.0, 10.0, 10.0).intersect(r(10.0, 0.0, 5.0, 5.0)).is_none());
    }

    // ── to_scissor ────────────────────────────────────────────────────────

    #[test]
    fn scissor_scales_to_physical_pixels() {
        let vp = Viewport::new(100.0, 100.0, 2.0);
        assert_eq!(r(10.0, 5.0, 20.0, 10.0).to_scissor(vp), Some((20, 10, 40, 20)));
    }

    #[test]
    fn scissor_clamps_to_viewport() {
        let vp = Viewport::new(50.0, 50.0, 1.0);
        assert_eq!(r(-10.0, 40.0, 100.0, 100.0).to_scissor(vp), Some((0, 40, 50, 10)));
    }

    #[test]
    fn scissor_outside_viewport_is_none() {
        let vp = Viewport::new(50.0, 50.0, 1.0);
        assert_eq!(r(60.0, 0.0, 10.0, 10.0).to_scissor(vp), None);
    }
}
