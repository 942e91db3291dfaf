//! Full-screen stage helper
//!
//! Most post-processing stages are one shader drawn over a viewport-sized
//! RGBA16F target. [`FullscreenStage`] owns that pair.

use std::rc::Rc;

use slotmap::Key;

use crate::render::device::{BufferBits, Filter, FramebufferId, GraphicsDevice, TextureFormat, TextureId, Wrap};
use crate::render::framebuffer::RenderTarget;
use crate::render::shader::{Shader, ShaderLibrary};
use crate::render::viewport::Viewport;

/// One shader plus its output target
#[derive(Debug)]
pub struct FullscreenStage {
    label: &'static str,
    shader_name: &'static str,
    target: Option<RenderTarget>,
    shader: Option<Rc<Shader>>,
}

impl FullscreenStage {
    /// Stage drawing `shader_name` into a target labelled `label`
    pub const fn new(label: &'static str, shader_name: &'static str) -> Self {
        Self {
            label,
            shader_name,
            target: None,
            shader: None,
        }
    }

    /// Allocate the target and resolve the shader; returns the shader so the
    /// caller can upload sampler units
    pub fn create(
        &mut self,
        device: &mut dyn GraphicsDevice,
        shaders: &mut ShaderLibrary,
        viewport: Viewport,
    ) -> Rc<Shader> {
        if self.target.is_none() {
            self.target = Some(
                RenderTarget::builder(self.label, viewport)
                    .with_color(TextureFormat::Rgba16F, Filter::Linear, Wrap::ClampToEdge)
                    .build(device),
            );
        }
        let shader = shaders.get(device, self.shader_name);
        self.shader = Some(Rc::clone(&shader));
        shader
    }

    /// Release the target
    pub fn destroy(&mut self, device: &mut dyn GraphicsDevice) {
        if let Some(mut target) = self.target.take() {
            target.destroy(device);
        }
        self.shader = None;
    }

    /// Bind the target and shader with blending, depth and culling off
    ///
    /// Returns `None` when the stage was never created or its target is
    /// incomplete; the caller then passes its input through.
    pub fn begin(&self, device: &mut dyn GraphicsDevice) -> Option<&Shader> {
        let target = self.target.as_ref().filter(|t| t.is_complete())?;
        let shader = self.shader.as_deref()?;
        target.bind(device);
        device.set_depth_test(None);
        device.set_cull_back(false);
        device.set_blend(None);
        device.set_clear_color([0.0, 0.0, 0.0, 1.0]);
        device.clear(BufferBits::COLOR);
        shader.bind(device);
        Some(shader)
    }

    /// Output texture, null before `create` or when incomplete
    pub fn output(&self) -> TextureId {
        self.target.as_ref().map_or_else(TextureId::null, RenderTarget::color)
    }

    /// Output framebuffer, null before `create`
    pub fn framebuffer(&self) -> FramebufferId {
        self.target.as_ref().map_or_else(FramebufferId::null, RenderTarget::framebuffer)
    }

    /// Framebuffer label
    pub const fn label(&self) -> &'static str {
        self.label
    }
}
