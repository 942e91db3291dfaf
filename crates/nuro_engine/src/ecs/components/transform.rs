//! Transform component for the ECS system
//!
//! Local position/rotation/scale plus the matrices the transform evaluator
//! caches on it. The cached `model` and `mvp` are only meaningful for the
//! frame in which the pre-pass last evaluated them.

use crate::ecs::{Component, Entity};
use crate::foundation::math::{compose_trs, Mat4, Quat, Vec3};

/// ECS Transform component
#[derive(Debug, Clone, PartialEq)]
pub struct TransformComponent {
    /// Position relative to the parent (or world when unparented)
    pub position: Vec3,

    /// Rotation relative to the parent
    pub rotation: Quat,

    /// Scale relative to the parent
    pub scale: Vec3,

    /// Non-owning parent reference
    pub parent: Option<Entity>,

    /// Cached world matrix
    pub model: Mat4,

    /// Cached model-view-projection matrix
    pub mvp: Mat4,
}

impl Component for TransformComponent {}

impl Default for TransformComponent {
    fn default() -> Self {
        Self {
            position: Vec3::zeros(),
            rotation: Quat::identity(),
            scale: Vec3::new(1.0, 1.0, 1.0),
            parent: None,
            model: Mat4::identity(),
            mvp: Mat4::identity(),
        }
    }
}

impl TransformComponent {
    /// Create identity transform
    pub fn identity() -> Self {
        Self::default()
    }

    /// Create from position only
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    /// Local matrix (TRS order), ignoring the parent
    pub fn local_matrix(&self) -> Mat4 {
        compose_trs(&self.position, &self.rotation, &self.scale)
    }

    /// Builder pattern: Set position
    pub fn with_position(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    /// Builder pattern: Set rotation from quaternion
    pub fn with_rotation(mut self, rotation: Quat) -> Self {
        self.rotation = rotation;
        self
    }

    /// Builder pattern: Set rotation from Euler angles (radians, XYZ order)
    pub fn with_rotation_euler(mut self, x: f32, y: f32, z: f32) -> Self {
        self.rotation = Quat::from_euler_angles(x, y, z);
        self
    }

    /// Builder pattern: Set scale (uniform)
    pub fn with_uniform_scale(mut self, scale: f32) -> Self {
        self.scale = Vec3::new(scale, scale, scale);
        self
    }

    /// Builder pattern: Set scale (non-uniform)
    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    /// Builder pattern: Set parent
    pub fn with_parent(mut self, parent: Option<Entity>) -> Self {
        self.parent = parent;
        self
    }

    /// Local forward direction (-Z rotated)
    pub fn forward(&self) -> Vec3 {
        self.rotation * Vec3::new(0.0, 0.0, -1.0)
    }

    /// Local right direction (+X rotated)
    pub fn right(&self) -> Vec3 {
        self.rotation * Vec3::new(1.0, 0.0, 0.0)
    }

    /// Local up direction (+Y rotated)
    pub fn up(&self) -> Vec3 {
        self.rotation * Vec3::new(0.0, 1.0, 0.0)
    }

    /// World-space position taken from the cached model matrix
    pub fn world_position(&self) -> Vec3 {
        Vec3::new(self.model.m14, self.model.m24, self.model.m34)
    }
}
