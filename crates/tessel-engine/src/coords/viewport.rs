/// Render target size in logical pixels plus the logical-to-physical scale.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
    pub scale_factor: f32,
}

impl Viewport {
    #[inline]
    pub const fn new(width: f32, height: f32, scale_factor: f32) -> Self {
        Self { width, height, scale_factor }
    }

    /// Size in physical pixels, never smaller than 1x1.
    #[inline]
    pub fn physical_size(self) -> (u32, u32) {
        (
            (self.width * self.scale_factor).max(1.0) as u32,
            (self.height * self.scale_factor).max(1.0) as u32,
        )
    }

    #[inline]
    pub fn is_valid(self) -> bool {
        self.width > 0.0
            && self.height > 0.0
            && self.scale_factor > 0.0
            && self.width.is_finite()
            && self.height.is_finite()
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(1.0, 1.0, 1.0)
    }
}
