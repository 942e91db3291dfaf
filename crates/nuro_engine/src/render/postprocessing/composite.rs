//! Bloom composite
//!
//! Adds the accumulated bloom (tinted and scaled) and optional lens dirt on
//! top of the HDR image.

use slotmap::Key;

use super::profile::Bloom;
use super::stage::FullscreenStage;
use crate::render::device::{sampler_unit, FramebufferId, GraphicsDevice, TextureId};
use crate::render::shader::ShaderLibrary;
use crate::render::viewport::Viewport;

const HDR_UNIT: u32 = 0;
const BLOOM_UNIT: u32 = 1;
const LENS_DIRT_UNIT: u32 = 2;

/// HDR plus bloom
#[derive(Debug)]
pub struct BloomComposite {
    stage: FullscreenStage,
}

impl Default for BloomComposite {
    fn default() -> Self {
        Self::new()
    }
}

impl BloomComposite {
    /// Stage with no resources yet
    pub const fn new() -> Self {
        Self {
            stage: FullscreenStage::new("bloom composite", "bloom_composite"),
        }
    }

    /// Allocate the target and set sampler units
    pub fn create(&mut self, device: &mut dyn GraphicsDevice, shaders: &mut ShaderLibrary, viewport: Viewport) {
        let shader = self.stage.create(device, shaders, viewport);
        shader.bind(device);
        shader.set_int(device, "hdrInput", sampler_unit(HDR_UNIT));
        shader.set_int(device, "bloomInput", sampler_unit(BLOOM_UNIT));
        shader.set_int(device, "lensDirtInput", sampler_unit(LENS_DIRT_UNIT));
    }

    /// Release the target
    pub fn destroy(&mut self, device: &mut dyn GraphicsDevice) {
        self.stage.destroy(device);
    }

    /// Composite `bloom` over `hdr`; passes `hdr` through when bloom is off
    /// or produced nothing
    pub fn render(
        &self,
        device: &mut dyn GraphicsDevice,
        hdr: TextureId,
        bloom: TextureId,
        lens_dirt: TextureId,
        settings: &Bloom,
    ) -> TextureId {
        if !settings.enabled || bloom.is_null() {
            return hdr;
        }
        let Some(shader) = self.stage.begin(device) else {
            return hdr;
        };
        let lens_dirt_enabled = settings.lens_dirt_enabled && !lens_dirt.is_null();
        shader.set_float(device, "bloomIntensity", settings.intensity);
        shader.set_vec3(device, "bloomColor", settings.color);
        shader.set_bool(device, "lensDirtEnabled", lens_dirt_enabled);
        shader.set_float(device, "lensDirtIntensity", settings.lens_dirt_intensity);
        device.bind_texture(HDR_UNIT, hdr);
        device.bind_texture(BLOOM_UNIT, bloom);
        device.bind_texture(LENS_DIRT_UNIT, lens_dirt);
        device.draw_fullscreen_quad();
        self.stage.output()
    }

    /// Output framebuffer
    pub fn framebuffer(&self) -> FramebufferId {
        self.stage.framebuffer()
    }
}
