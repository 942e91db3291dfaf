//! Camera component

use crate::ecs::Component;

/// Perspective camera; the owning entity's transform positions it
#[derive(Debug, Clone, PartialEq)]
pub struct CameraComponent {
    /// Vertical field of view in degrees
    pub fov: f32,
    /// Near clip plane
    pub near: f32,
    /// Far clip plane
    pub far: f32,
    /// Disabled cameras are never selected for rendering
    pub enabled: bool,
}

impl Component for CameraComponent {}

impl Default for CameraComponent {
    fn default() -> Self {
        Self {
            fov: 70.0,
            near: 0.3,
            far: 1000.0,
            enabled: true,
        }
    }
}
