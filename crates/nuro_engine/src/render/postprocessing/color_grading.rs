//! Colour grading
//!
//! Exposure, contrast and gamma. Always runs: it is also the tonemapping
//! step from HDR into display range.

use super::profile::ColorGrading;
use super::stage::FullscreenStage;
use crate::render::device::{FramebufferId, GraphicsDevice, TextureId};
use crate::render::shader::ShaderLibrary;
use crate::render::viewport::Viewport;

/// Exposure, contrast and gamma stage
#[derive(Debug)]
pub struct ColorGradingStage {
    stage: FullscreenStage,
}

impl Default for ColorGradingStage {
    fn default() -> Self {
        Self::new()
    }
}

impl ColorGradingStage {
    /// Stage with no resources yet
    pub const fn new() -> Self {
        Self {
            stage: FullscreenStage::new("color grading", "color_grading"),
        }
    }

    /// Allocate the target
    pub fn create(&mut self, device: &mut dyn GraphicsDevice, shaders: &mut ShaderLibrary, viewport: Viewport) {
        let shader = self.stage.create(device, shaders, viewport);
        shader.bind(device);
        shader.set_int(device, "hdrInput", 0);
    }

    /// Release the target
    pub fn destroy(&mut self, device: &mut dyn GraphicsDevice) {
        self.stage.destroy(device);
    }

    /// Grade `input`
    pub fn render(&self, device: &mut dyn GraphicsDevice, input: TextureId, settings: &ColorGrading) -> TextureId {
        let Some(shader) = self.stage.begin(device) else {
            return input;
        };
        shader.set_float(device, "exposure", settings.exposure);
        shader.set_float(device, "contrast", settings.contrast);
        shader.set_float(device, "gamma", settings.gamma);
        device.bind_texture(0, input);
        device.draw_fullscreen_quad();
        self.stage.output()
    }

    /// Output framebuffer
    pub fn framebuffer(&self) -> FramebufferId {
        self.stage.framebuffer()
    }
}
