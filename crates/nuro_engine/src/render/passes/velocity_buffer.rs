//! Screen-space motion vectors
//!
//! Every bound queue entry is drawn twice-transformed: once with this
//! frame's MVP and once with last frame's view-projection applied to the
//! previous model matrix. Entities carrying a [`VelocityComponent`] remember
//! their previous model matrix and scale the vector by its intensity;
//! everything else contributes camera motion only.

use std::rc::Rc;

use log::trace;
use slotmap::Key;

use super::graph::{Attachment, PassDescriptor, PassKind};
use super::RenderPass;
use crate::ecs::components::{MeshRendererComponent, TransformComponent, VelocityComponent};
use crate::ecs::{Entity, World};
use crate::foundation::math::Mat4;
use crate::render::camera::CameraView;
use crate::render::device::{BufferBits, Filter, GraphicsDevice, TextureFormat, TextureId, Wrap};
use crate::render::framebuffer::RenderTarget;
use crate::render::render_queue::RenderQueue;
use crate::render::shader::{Shader, ShaderLibrary};
use crate::render::transformation;
use crate::render::viewport::Viewport;

/// Framebuffer label of the velocity target
pub const LABEL: &str = "velocity buffer";

/// Motion vector pass
#[derive(Debug)]
pub struct VelocityBuffer {
    viewport: Viewport,
    target: Option<RenderTarget>,
    shader: Option<Rc<Shader>>,
    previous_view_projection: Option<Mat4>,
}

impl VelocityBuffer {
    /// Pass sized to `viewport`; nothing is allocated until `create`
    pub const fn new(viewport: Viewport) -> Self {
        Self {
            viewport,
            target: None,
            shader: None,
            previous_view_projection: None,
        }
    }

    /// View-projection used as "previous" on the next frame
    pub const fn previous_view_projection(&self) -> Option<Mat4> {
        self.previous_view_projection
    }

    /// Render motion vectors for every bound queue entry
    ///
    /// Expects the pre-pass to have refreshed `model` on every transform.
    pub fn render(
        &mut self,
        device: &mut dyn GraphicsDevice,
        world: &mut World,
        queue: &RenderQueue,
        camera: &CameraView,
    ) -> TextureId {
        let previous_vp = self.previous_view_projection.unwrap_or(camera.view_projection);
        self.previous_view_projection = Some(camera.view_projection);

        let (Some(target), Some(shader)) = (&self.target, &self.shader) else {
            return TextureId::null();
        };

        target.bind(device);
        device.set_clear_color([0.0, 0.0, 0.0, 0.0]);
        device.clear(BufferBits::COLOR);
        device.set_depth_test(None);
        device.set_cull_back(true);
        shader.bind(device);

        let mut drawn = 0usize;
        for entry in queue.entries() {
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

            let model = transform.model;
            let (last_model, intensity) = world
                .get_component::<VelocityComponent>(entry.entity)
                .map_or((model, 1.0), |v| (v.last_model.unwrap_or(model), v.intensity));

            shader.set_mat4(device, "mvpMatrix", transform.mvp);
            shader.set_mat4(device, "previousMvpMatrix", previous_vp * last_model);
            shader.set_float(device, "intensity", intensity);
            mesh.draw(device);
            drawn += 1;

            if let Some(velocity) = world.get_component_mut::<VelocityComponent>(entry.entity) {
                velocity.last_model = Some(model);
            }
        }
        trace!("Velocity buffer drew {drawn} meshes");

        target.color()
    }

    /// Forget the previous camera so the next frame writes no camera motion
    pub fn reset_history(&mut self) {
        self.previous_view_projection = None;
    }
}

impl RenderPass for VelocityBuffer {
    fn descriptor(&self) -> PassDescriptor {
        // Ordered after the pre-pass, which refreshes the model matrices.
        PassDescriptor::new(PassKind::Velocity)
            .reads(&[Attachment::Depth])
            .writes(&[Attachment::Velocity])
    }

    fn create(&mut self, device: &mut dyn GraphicsDevice, shaders: &mut ShaderLibrary) {
        if self.target.is_some() {
            return;
        }
        self.target = Some(
            RenderTarget::builder(LABEL, self.viewport)
                .with_color(TextureFormat::Rg16F, Filter::Linear, Wrap::ClampToEdge)
                .build(device),
        );
        self.shader = Some(shaders.get(device, "velocity"));
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

/// Make an entity's previous model equal to its current one
///
/// Call after teleporting an entity so its next frame writes no motion.
pub fn reset_object_history(world: &mut World, entity: Entity) {
    let Some(model) = transformation::model(world, entity) else {
        return;
    };
    if let Some(velocity) = world.get_component_mut::<VelocityComponent>(entity) {
        velocity.last_model = Some(model);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec3;
    use crate::render::camera::FlyCamera;
    use crate::render::device::UniformValue;
    use crate::render::headless::HeadlessDevice;
    use crate::render::material::UnlitMaterial;
    use crate::render::mesh::Mesh;
    use crate::render::render_queue::UnboundPolicy;
    use approx::assert_relative_eq;

    struct Scene {
        device: HeadlessDevice,
        shaders: ShaderLibrary,
        world: World,
        queue: RenderQueue,
        moving: Entity,
    }

    fn scene() -> Scene {
        let mut device = HeadlessDevice::new();
        let mut shaders = ShaderLibrary::new();
        let mut world = World::new();
        let material = Rc::new(UnlitMaterial::new(shaders.get(&mut device, "unlit")));
        let mesh = Rc::new(Mesh::cube());

        let moving = world.create_entity();
        world.add_component(moving, TransformComponent::identity());
        world.add_component(moving, MeshRendererComponent::new(mesh.clone(), material.clone()));
        world.add_component(
            moving,
            VelocityComponent {
                intensity: 0.5,
                ..VelocityComponent::default()
            },
        );

        let still = world.create_entity();
        world.add_component(still, TransformComponent::from_position(Vec3::new(3.0, 0.0, 0.0)));
        world.add_component(still, MeshRendererComponent::new(mesh, material));

        let mut queue = RenderQueue::new(UnboundPolicy::SortFirst);
        queue.build(&world);
        Scene {
            device,
            shaders,
            world,
            queue,
            moving,
        }
    }

    #[test]
    fn test_first_frame_uses_current_camera_as_previous() {
        let mut s = scene();
        let camera = CameraView::from_fly(&FlyCamera::default(), &Viewport::new(64, 64));
        transformation::evaluate_all(&mut s.world, &camera.view_projection);

        let mut pass = VelocityBuffer::new(Viewport::new(64, 64));
        pass.create(&mut s.device, &mut s.shaders);
        let out = pass.render(&mut s.device, &mut s.world, &s.queue, &camera);

        assert_eq!(s.device.texture_desc(out).unwrap().format, TextureFormat::Rg16F);
        assert_eq!(s.device.draws_into(LABEL).count(), 2);
        assert_eq!(pass.previous_view_projection(), Some(camera.view_projection));
    }

    #[test]
    fn test_object_history_tracks_last_model() {
        let mut s = scene();
        let camera = CameraView::from_fly(&FlyCamera::default(), &Viewport::new(64, 64));
        let mut pass = VelocityBuffer::new(Viewport::new(64, 64));
        pass.create(&mut s.device, &mut s.shaders);

        transformation::evaluate_all(&mut s.world, &camera.view_projection);
        pass.render(&mut s.device, &mut s.world, &s.queue, &camera);

        s.world
            .get_component_mut::<TransformComponent>(s.moving)
            .unwrap()
            .position = Vec3::new(0.0, 1.0, 0.0);
        transformation::evaluate_all(&mut s.world, &camera.view_projection);
        s.device.clear_log();
        pass.render(&mut s.device, &mut s.world, &s.queue, &camera);

        // The last upload comes from the entity without a velocity component.
        let velocity = s.world.get_component::<VelocityComponent>(s.moving).unwrap();
        assert_relative_eq!(velocity.last_model.unwrap()[(1, 3)], 1.0);
        assert_eq!(s.device.uniform("velocity", "intensity"), Some(UniformValue::Float(1.0)));
    }

    #[test]
    fn test_reset_object_history() {
        let mut s = scene();
        s.world
            .get_component_mut::<TransformComponent>(s.moving)
            .unwrap()
            .position = Vec3::new(5.0, 0.0, 0.0);
        reset_object_history(&mut s.world, s.moving);
        let velocity = s.world.get_component::<VelocityComponent>(s.moving).unwrap();
        assert_relative_eq!(velocity.last_model.unwrap()[(0, 3)], 5.0);
    }

    #[test]
    fn test_first_frame_writes_no_object_motion() {
        let mut s = scene();
        s.world
            .get_component_mut::<TransformComponent>(s.moving)
            .unwrap()
            .position = Vec3::new(4.0, -2.0, 1.0);
        let camera = CameraView::from_fly(&FlyCamera::default(), &Viewport::new(64, 64));
        transformation::evaluate_all(&mut s.world, &camera.view_projection);
        assert!(s.world.get_component::<VelocityComponent>(s.moving).unwrap().last_model.is_none());

        let mut pass = VelocityBuffer::new(Viewport::new(64, 64));
        pass.create(&mut s.device, &mut s.shaders);
        pass.render(&mut s.device, &mut s.world, &s.queue, &camera);

        let mvp = s.world.get_component::<TransformComponent>(s.moving).unwrap().mvp;
        let draw = s
            .device
            .draws_into(LABEL)
            .find(|d| d.uniform("intensity") == Some(UniformValue::Float(0.5)))
            .unwrap();
        let Some(UniformValue::Mat4(previous)) = draw.uniform("previousMvpMatrix") else {
            panic!("previousMvpMatrix not uploaded");
        };
        assert_eq!(draw.uniform("mvpMatrix"), Some(UniformValue::Mat4(mvp)));
        assert_relative_eq!(previous, mvp, epsilon = 1e-5);

        let model = s.world.get_component::<TransformComponent>(s.moving).unwrap().model;
        let velocity = s.world.get_component::<VelocityComponent>(s.moving).unwrap();
        assert_eq!(velocity.last_model, Some(model));
    }

    #[test]
    fn test_incomplete_target_returns_null() {
        let mut s = scene();
        s.device.fail_framebuffer(LABEL);
        let camera = CameraView::from_fly(&FlyCamera::default(), &Viewport::new(64, 64));
        let mut pass = VelocityBuffer::new(Viewport::new(64, 64));
        pass.create(&mut s.device, &mut s.shaders);
        let out = pass.render(&mut s.device, &mut s.world, &s.queue, &camera);
        assert!(slotmap::Key::is_null(&out));
        pass.destroy(&mut s.device);
        assert_eq!(s.device.framebuffer_count(), 0);
    }
}
