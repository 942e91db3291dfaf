//! Depth and normal pre-pass
//!
//! Renders scene depth and view-space normals for every bound queue entry.
//! As a side effect it recomputes `model` and `mvp` on every queued
//! transform; this is the point in the frame after which those caches are
//! valid.

use std::rc::Rc;

use log::trace;

use super::graph::{Attachment, PassDescriptor, PassKind};
use super::RenderPass;
use crate::ecs::components::{MeshRendererComponent, TransformComponent};
use crate::ecs::World;
use crate::render::camera::CameraView;
use crate::render::device::{BufferBits, CompareFunc, Filter, GraphicsDevice, TextureFormat, TextureId, Wrap};
use crate::render::framebuffer::RenderTarget;
use crate::render::render_queue::RenderQueue;
use crate::render::shader::{Shader, ShaderLibrary};
use crate::render::transformation;
use crate::render::viewport::Viewport;

/// Framebuffer label of the pre-pass target
pub const LABEL: &str = "pre pass";

/// Textures produced by the pre-pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PrePassOutput {
    /// Scene depth
    pub depth: TextureId,
    /// View-space normals
    pub normal: TextureId,
}

/// Depth plus view-space normal pass
#[derive(Debug)]
pub struct PrePass {
    viewport: Viewport,
    target: Option<RenderTarget>,
    shader: Option<Rc<Shader>>,
}

impl PrePass {
    /// Pass sized to `viewport`; nothing is allocated until `create`
    pub const fn new(viewport: Viewport) -> Self {
        Self {
            viewport,
            target: None,
            shader: None,
        }
    }

    /// Render every bound queue entry and return depth and normals
    pub fn render(
        &mut self,
        device: &mut dyn GraphicsDevice,
        world: &mut World,
        queue: &RenderQueue,
        camera: &CameraView,
    ) -> PrePassOutput {
        let (Some(target), Some(shader)) = (&self.target, &self.shader) else {
            return PrePassOutput::default();
        };

        target.bind(device);
        device.set_clear_color([0.0, 0.0, 0.0, 0.0]);
        device.clear(BufferBits::COLOR | BufferBits::DEPTH);
        device.set_depth_test(Some(CompareFunc::Less));
        device.set_cull_back(true);
        shader.bind(device);

        let mut drawn = 0usize;
        for entry in queue.entries() {
            if !transformation::evaluate(world, entry.entity, &camera.view_projection) {
                continue;
            }
            if entry.key.is_none() {
                continue;
            }
            let (Some(transform), Some(renderer)) = (
                world.get_component::<TransformComponent>(entry.entity),
                world.get_component::<MeshRendererComponent>(entry.entity),
            ) else {
                continue;
            };
            let Some(mesh) = &renderer.mesh else {
                continue;
            };
            shader.set_mat4(device, "mvpMatrix", transform.mvp);
            shader.set_mat3(
                device,
                "viewNormalMatrix",
                camera.view_normal * transformation::normal(&transform.model),
            );
            mesh.draw(device);
            drawn += 1;
        }
        trace!("Pre-pass drew {drawn} meshes");

        PrePassOutput {
            depth: target.depth(),
            normal: target.color(),
        }
    }
}

impl RenderPass for PrePass {
    fn descriptor(&self) -> PassDescriptor {
        PassDescriptor::new(PassKind::PrePass).writes(&[Attachment::Depth, Attachment::Normal])
    }

    fn create(&mut self, device: &mut dyn GraphicsDevice, shaders: &mut ShaderLibrary) {
        if self.target.is_some() {
            return;
        }
        self.target = Some(
            RenderTarget::builder(LABEL, self.viewport)
                .with_color(TextureFormat::Rgb16F, Filter::Nearest, Wrap::ClampToEdge)
                .with_depth_texture()
                .build(device),
        );
        self.shader = Some(shaders.get(device, "pre_pass"));
    }

    fn destroy(&mut self, device: &mut dyn GraphicsDevice) {
        if let Some(mut target) = self.target.take() {
            target.destroy(device);
        }
        self.shader = None;
    }

    fn is_created(&self) -> bool {
        self.target.is_some()
    }
}
