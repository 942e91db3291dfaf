//! Camera selection
//!
//! Exactly one camera drives a frame. An explicit fly camera (editor scene
//! view) always wins; otherwise the first enabled [`CameraComponent`] in
//! registry iteration order is used.

use log::trace;

use super::transformation;
use super::viewport::Viewport;
use crate::ecs::components::{CameraComponent, TransformComponent};
use crate::ecs::World;
use crate::foundation::math::{Mat3, Mat4, Quat, Vec3};

/// Free camera owned by the view rather than the scene
#[derive(Debug, Clone, PartialEq)]
pub struct FlyCamera {
    /// World position
    pub position: Vec3,
    /// World rotation
    pub rotation: Quat,
    /// Lens settings
    pub lens: CameraComponent,
}

impl Default for FlyCamera {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 0.0, 5.0),
            rotation: Quat::identity(),
            lens: CameraComponent::default(),
        }
    }
}

/// Matrices of the camera rendering the current frame
#[derive(Debug, Clone, PartialEq)]
pub struct CameraView {
    /// World position
    pub position: Vec3,
    /// World rotation
    pub rotation: Quat,
    /// Vertical field of view in degrees
    pub fov: f32,
    /// Near clip plane
    pub near: f32,
    /// Far clip plane
    pub far: f32,
    /// World to view
    pub view: Mat4,
    /// View to clip
    pub projection: Mat4,
    /// `projection * view`
    pub view_projection: Mat4,
    /// Inverse of `projection`
    pub inverse_projection: Mat4,
    /// Inverse-transpose of the view rotation, for view-space normals
    pub view_normal: Mat3,
}

impl CameraView {
    /// Derive every matrix from a pose and lens
    pub fn new(position: Vec3, rotation: Quat, lens: &CameraComponent, viewport: &Viewport) -> Self {
        let view = transformation::view(&position, &rotation);
        let projection = transformation::projection(lens.fov, lens.near, lens.far, viewport);
        Self {
            position,
            rotation,
            fov: lens.fov,
            near: lens.near,
            far: lens.far,
            view,
            projection,
            view_projection: projection * view,
            inverse_projection: projection.try_inverse().unwrap_or_else(Mat4::identity),
            view_normal: transformation::normal(&view),
        }
    }

    /// View of a fly camera
    pub fn from_fly(camera: &FlyCamera, viewport: &Viewport) -> Self {
        Self::new(camera.position, camera.rotation, &camera.lens, viewport)
    }
}

/// Pick the camera for this frame
///
/// Returns `None` when there is no override and no enabled scene camera.
pub fn select(world: &World, fly: Option<&FlyCamera>, viewport: &Viewport) -> Option<CameraView> {
    if let Some(camera) = fly {
        return Some(CameraView::from_fly(camera, viewport));
    }
    for entity in world.view2::<CameraComponent, TransformComponent>() {
        let Some(lens) = world.get_component::<CameraComponent>(entity) else {
            continue;
        };
        if !lens.enabled {
            continue;
        }
        let Some((position, rotation)) = transformation::world_pose(world, entity) else {
            continue;
        };
        trace!("Rendering through camera {entity}");
        return Some(CameraView::new(position, rotation, lens, viewport));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn camera(world: &mut World, position: Vec3, enabled: bool) -> crate::ecs::Entity {
        let e = world.create_entity();
        world.add_component(e, TransformComponent::from_position(position));
        world.add_component(
            e,
            CameraComponent {
                enabled,
                ..CameraComponent::default()
            },
        );
        e
    }

    #[test]
    fn test_first_enabled_camera_wins() {
        let mut world = World::new();
        camera(&mut world, Vec3::new(1.0, 0.0, 0.0), false);
        camera(&mut world, Vec3::new(2.0, 0.0, 0.0), true);
        camera(&mut world, Vec3::new(3.0, 0.0, 0.0), true);

        let view = select(&world, None, &Viewport::new(100, 100)).unwrap();
        assert_relative_eq!(view.position, Vec3::new(2.0, 0.0, 0.0));
    }

    #[test]
    fn test_fly_camera_override() {
        let mut world = World::new();
        camera(&mut world, Vec3::new(2.0, 0.0, 0.0), true);
        let fly = FlyCamera::default();

        let view = select(&world, Some(&fly), &Viewport::new(100, 100)).unwrap();
        assert_relative_eq!(view.position, fly.position);
    }

    #[test]
    fn test_no_camera() {
        let mut world = World::new();
        camera(&mut world, Vec3::zeros(), false);
        assert!(select(&world, None, &Viewport::new(100, 100)).is_none());
    }

    #[test]
    fn test_matrices_consistent() {
        let fly = FlyCamera {
            position: Vec3::new(0.0, 2.0, 8.0),
            ..FlyCamera::default()
        };
        let view = CameraView::from_fly(&fly, &Viewport::new(640, 480));
        assert_relative_eq!(view.view_projection, view.projection * view.view, epsilon = 1e-5);
        assert_relative_eq!(
            view.inverse_projection * view.projection,
            Mat4::identity(),
            epsilon = 1e-4
        );
        // Pure rotation: normal matrix equals the rotation block
        assert_relative_eq!(view.view_normal, Mat3::identity(), epsilon = 1e-6);
    }
}
