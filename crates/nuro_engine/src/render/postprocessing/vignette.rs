//! Vignette

use super::profile::Vignette;
use super::stage::FullscreenStage;
use crate::render::device::{FramebufferId, GraphicsDevice, TextureId};
use crate::render::shader::ShaderLibrary;
use crate::render::viewport::Viewport;

/// Darkened, optionally tinted screen edges
#[derive(Debug)]
pub struct VignetteStage {
    stage: FullscreenStage,
    viewport: Viewport,
}

impl VignetteStage {
    /// Stage with no resources yet
    pub const fn new(viewport: Viewport) -> Self {
        Self {
            stage: FullscreenStage::new("vignette", "vignette"),
            viewport,
        }
    }

    /// Allocate the target
    pub fn create(&mut self, device: &mut dyn GraphicsDevice, shaders: &mut ShaderLibrary) {
        let shader = self.stage.create(device, shaders, self.viewport);
        shader.bind(device);
        shader.set_int(device, "hdrInput", 0);
    }

    /// Release the target
    pub fn destroy(&mut self, device: &mut dyn GraphicsDevice) {
        self.stage.destroy(device);
    }

    /// Apply the vignette, or pass `input` through when disabled
    pub fn render(&self, device: &mut dyn GraphicsDevice, input: TextureId, settings: &Vignette) -> TextureId {
        if !settings.enabled {
            return input;
        }
        let Some(shader) = self.stage.begin(device) else {
            return input;
        };
        shader.set_vec2(device, "resolution", self.viewport.resolution());
        shader.set_float(device, "intensity", settings.intensity);
        shader.set_vec3(device, "color", settings.color);
        shader.set_float(device, "radius", settings.radius);
        shader.set_float(device, "softness", settings.softness);
        shader.set_float(device, "roundness", settings.roundness);
        device.bind_texture(0, input);
        device.draw_fullscreen_quad();
        self.stage.output()
    }

    /// Output framebuffer
    pub fn framebuffer(&self) -> FramebufferId {
        self.stage.framebuffer()
    }
}
