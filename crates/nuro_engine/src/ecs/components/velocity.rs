//! Per-object motion component read by the velocity buffer pass

use crate::ecs::Component;
use crate::foundation::math::Mat4;

/// Marks an entity for object motion blur and remembers last frame's model
#[derive(Debug, Clone, PartialEq)]
pub struct VelocityComponent {
    /// Scales the written motion vector
    pub intensity: f32,
    /// Model matrix from the previous velocity pass, `None` until the
    /// entity has been drawn once
    pub last_model: Option<Mat4>,
}

impl Component for VelocityComponent {}

impl Default for VelocityComponent {
    fn default() -> Self {
        Self {
            intensity: 1.0,
            last_model: None,
        }
    }
}
