//! Motion blur
//!
//! Two sources of motion, both optional: the camera (reprojecting depth
//! with the previous view-projection) and objects (the velocity buffer).

use super::profile::MotionBlur;
use super::stage::FullscreenStage;
use crate::foundation::math::Mat4;
use crate::render::camera::CameraView;
use crate::render::device::{sampler_unit, FramebufferId, GraphicsDevice, TextureId};
use crate::render::shader::ShaderLibrary;
use crate::render::viewport::Viewport;

const HDR_UNIT: u32 = 0;
const DEPTH_UNIT: u32 = 1;
const VELOCITY_UNIT: u32 = 2;

/// Inputs of the motion blur stage
#[derive(Debug, Clone, Copy)]
pub struct MotionBlurInputs {
    /// Image to blur
    pub color: TextureId,
    /// Pre-pass depth
    pub depth: TextureId,
    /// Velocity buffer
    pub velocity: TextureId,
}

/// Camera and object motion blur
#[derive(Debug)]
pub struct MotionBlurStage {
    stage: FullscreenStage,
    viewport: Viewport,
    previous_view_projection: Option<Mat4>,
}

impl MotionBlurStage {
    /// Stage with no resources yet
    pub const fn new(viewport: Viewport) -> Self {
        Self {
            stage: FullscreenStage::new("motion blur", "motion_blur"),
            viewport,
            previous_view_projection: None,
        }
    }

    /// Allocate the target and set sampler units
    pub fn create(&mut self, device: &mut dyn GraphicsDevice, shaders: &mut ShaderLibrary) {
        let shader = self.stage.create(device, shaders, self.viewport);
        shader.bind(device);
        shader.set_int(device, "hdrInput", sampler_unit(HDR_UNIT));
        shader.set_int(device, "depthInput", sampler_unit(DEPTH_UNIT));
        shader.set_int(device, "velocityBufferInput", sampler_unit(VELOCITY_UNIT));
    }

    /// Release the target and forget camera history
    pub fn destroy(&mut self, device: &mut dyn GraphicsDevice) {
        self.stage.destroy(device);
        self.previous_view_projection = None;
    }

    /// Camera matrix the next frame will reproject with
    pub const fn previous_view_projection(&self) -> Option<Mat4> {
        self.previous_view_projection
    }

    /// Blur `inputs.color`; the camera history advances even when disabled
    pub fn render(
        &mut self,
        device: &mut dyn GraphicsDevice,
        inputs: MotionBlurInputs,
        camera: &CameraView,
        settings: &MotionBlur,
    ) -> TextureId {
        let previous = self.previous_view_projection.unwrap_or(camera.view_projection);
        self.previous_view_projection = Some(camera.view_projection);

        if !settings.enabled {
            return inputs.color;
        }
        let Some(shader) = self.stage.begin(device) else {
            return inputs.color;
        };

        let inverse_view_projection = camera.view_projection.try_inverse().unwrap_or_else(Mat4::identity);
        shader.set_vec2(device, "resolution", self.viewport.resolution());
        shader.set_bool(device, "cameraEnabled", settings.camera_enabled);
        shader.set_float(device, "cameraIntensity", settings.camera_intensity);
        shader.set_int(device, "cameraSamples", settings.camera_samples);
        shader.set_mat4(device, "inverseViewProjectionMatrix", inverse_view_projection);
        shader.set_mat4(device, "previousViewProjectionMatrix", previous);
        shader.set_bool(device, "objectEnabled", settings.object_enabled);
        shader.set_int(device, "objectSamples", settings.object_samples);
        device.bind_texture(HDR_UNIT, inputs.color);
        device.bind_texture(DEPTH_UNIT, inputs.depth);
        device.bind_texture(VELOCITY_UNIT, inputs.velocity);
        device.draw_fullscreen_quad();
        self.stage.output()
    }

    /// Output framebuffer
    pub fn framebuffer(&self) -> FramebufferId {
        self.stage.framebuffer()
    }
}
