//! Render target sizing shared by every pass

use crate::foundation::math::Vec2;

/// Pixel size of the area the frame pipeline renders into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(800, 600)
    }
}

impl Viewport {
    /// Create a viewport
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Width and height as floats
    pub fn resolution(&self) -> Vec2 {
        Vec2::new(self.width as f32, self.height as f32)
    }

    /// Reciprocal resolution, used as texel size in filters
    pub fn inverse_resolution(&self) -> Vec2 {
        Vec2::new(1.0 / self.width.max(1) as f32, 1.0 / self.height.max(1) as f32)
    }

    /// Width over height; 1.0 for degenerate viewports
    pub fn aspect(&self) -> f32 {
        if self.width == 0 || self.height == 0 {
            1.0
        } else {
            self.width as f32 / self.height as f32
        }
    }

    /// Size scaled by `factor`, never collapsing below one pixel
    pub fn scaled(&self, factor: f32) -> Self {
        Self {
            width: ((self.width as f32 * factor) as u32).max(1),
            height: ((self.height as f32 * factor) as u32).max(1),
        }
    }

    /// Whether both dimensions are non-zero
    pub const fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}
