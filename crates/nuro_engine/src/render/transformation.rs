//! # Transform Evaluator
//!
//! Computes model, view, projection and normal matrices. The pre-pass calls
//! [`evaluate`] for every renderable each frame; that is the only point at
//! which `TransformComponent::model` and `mvp` become valid for the rest of
//! the frame.
//!
//! ## Design Notes
//!
//! Parents are followed through the registry. A parent that is dead, lacks
//! a transform, or closes a cycle terminates the chain: the entity is then
//! treated as a root from that link on.

use nalgebra::{Isometry3, Perspective3, Translation3};

use crate::ecs::components::TransformComponent;
use crate::ecs::{Entity, World};
use crate::foundation::math::{utils, Mat3, Mat4, Quat, Vec3};
use crate::render::viewport::Viewport;

/// Upper bound on hierarchy depth before a chain is considered cyclic
pub const MAX_HIERARCHY_DEPTH: usize = 256;

/// Collect the local matrices from `entity` up to its root (child first)
fn chain(world: &World, entity: Entity) -> Vec<&TransformComponent> {
    let mut links = Vec::new();
    let mut visited: Vec<Entity> = Vec::new();
    let mut current = Some(entity);

    while let Some(e) = current {
        if visited.contains(&e) || visited.len() >= MAX_HIERARCHY_DEPTH {
            log::warn!("transform hierarchy of {entity} loops back to {e}; treating as root");
            break;
        }
        let Some(transform) = world.get_component::<TransformComponent>(e) else {
            if e != entity {
                log::debug!("parent {e} of {entity} has no transform; treating as root");
            }
            break;
        };
        visited.push(e);
        links.push(transform);
        current = transform.parent;
    }
    links
}

/// World matrix of `entity` (parent chain times local T * R * S)
pub fn model(world: &World, entity: Entity) -> Option<Mat4> {
    let links = chain(world, entity);
    if links.is_empty() {
        return None;
    }
    Some(
        links
            .iter()
            .rev()
            .fold(Mat4::identity(), |acc, t| acc * t.local_matrix()),
    )
}

/// World position and rotation of `entity`, ignoring scale
pub fn world_pose(world: &World, entity: Entity) -> Option<(Vec3, Quat)> {
    let links = chain(world, entity);
    let m = model(world, entity)?;
    let rotation = links
        .iter()
        .rev()
        .fold(Quat::identity(), |acc, t| acc * t.rotation);
    Some((Vec3::new(m.m14, m.m24, m.m34), rotation))
}

/// View matrix for a camera at `position` looking down its rotated -Z
pub fn view(position: &Vec3, rotation: &Quat) -> Mat4 {
    Isometry3::from_parts(Translation3::from(*position), *rotation)
        .inverse()
        .to_homogeneous()
}

/// Perspective projection (`fov` in degrees) for `viewport`
///
/// Degenerate planes are nudged apart instead of producing a NaN matrix.
pub fn projection(fov: f32, near: f32, far: f32, viewport: &Viewport) -> Mat4 {
    let near = if near > 0.0 { near } else { 1.0e-3 };
    let far = if far > near { far } else { near + 1.0e-3 };
    let fovy = utils::deg_to_rad(fov.clamp(1.0e-2, 179.0));
    Perspective3::new(viewport.aspect(), fovy, near, far).to_homogeneous()
}

/// Inverse-transpose of the upper 3x3; identity for singular matrices
pub fn normal(model: &Mat4) -> Mat3 {
    let upper: Mat3 = model.fixed_view::<3, 3>(0, 0).into_owned();
    upper
        .try_inverse()
        .map_or_else(Mat3::identity, |inverse| inverse.transpose())
}

/// Recompute `model` and `mvp` on one entity's transform
pub fn evaluate(world: &mut World, entity: Entity, view_projection: &Mat4) -> bool {
    let Some(model) = model(world, entity) else {
        return false;
    };
    match world.get_component_mut::<TransformComponent>(entity) {
        Some(transform) => {
            transform.model = model;
            transform.mvp = view_projection * model;
            true
        }
        None => false,
    }
}

/// Recompute `model` and `mvp` for every transform in the registry
pub fn evaluate_all(world: &mut World, view_projection: &Mat4) {
    for entity in world.view::<TransformComponent>() {
        evaluate(world, entity, view_projection);
    }
}
