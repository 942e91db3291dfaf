//! Chromatic aberration

use super::profile::ChromaticAberration;
use super::stage::FullscreenStage;
use crate::render::device::{FramebufferId, GraphicsDevice, TextureId};
use crate::render::shader::ShaderLibrary;
use crate::render::viewport::Viewport;

/// Radial colour fringing
#[derive(Debug)]
pub struct ChromaticAberrationStage {
    stage: FullscreenStage,
}

impl Default for ChromaticAberrationStage {
    fn default() -> Self {
        Self::new()
    }
}

impl ChromaticAberrationStage {
    /// Stage with no resources yet
    pub const fn new() -> Self {
        Self {
            stage: FullscreenStage::new("chromatic aberration", "chromatic_aberration"),
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

    /// Apply the fringing, or pass `input` through when disabled
    pub fn render(
        &self,
        device: &mut dyn GraphicsDevice,
        input: TextureId,
        settings: &ChromaticAberration,
    ) -> TextureId {
        if !settings.enabled {
            return input;
        }
        let Some(shader) = self.stage.begin(device) else {
            return input;
        };
        shader.set_float(device, "intensity", settings.intensity);
        shader.set_int(device, "iterations", settings.iterations);
        device.bind_texture(0, input);
        device.draw_fullscreen_quad();
        self.stage.output()
    }

    /// Output framebuffer
    pub fn framebuffer(&self) -> FramebufferId {
        self.stage.framebuffer()
    }
}
