//! Lighting component for ECS
//!
//! Pure data component. Position and direction come from the owning
//! entity's transform; the lit material reads the gathered set through
//! the per-frame render context.

use crate::ecs::Component;
use crate::foundation::math::Vec3;

/// Types of lights supported by the lighting system
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightType {
    /// Directional light (like sunlight) with parallel rays
    Directional,
    /// Point light that radiates in all directions from a position
    Point,
    /// Spot light that creates a cone of light from a position
    Spot,
}

/// Pure data component for lights
#[derive(Debug, Clone, PartialEq)]
pub struct LightComponent {
    /// The type of light (directional, point, or spot)
    pub light_type: LightType,
    /// RGB color values for the light (0.0 to 1.0 range)
    pub color: Vec3,
    /// Light intensity multiplier
    pub intensity: f32,
    /// Maximum range for point/spot lights
    pub range: f32,
    /// Attenuation falloff for point/spot lights
    pub falloff: f32,
    /// Full inner cone angle for spot lights in degrees
    pub inner_angle: f32,
    /// Full outer cone angle for spot lights in degrees
    pub outer_angle: f32,
    /// Whether the light is currently enabled/active
    pub enabled: bool,
}

impl Component for LightComponent {}

/// Factory functions for creating light components
pub struct LightFactory;

impl LightFactory {
    /// Create a directional light component
    pub fn directional(color: Vec3, intensity: f32) -> LightComponent {
        LightComponent {
            light_type: LightType::Directional,
            color,
            intensity,
            range: 0.0,
            falloff: 0.0,
            inner_angle: 0.0,
            outer_angle: 0.0,
            enabled: true,
        }
    }

    /// Create a point light component
    pub fn point(color: Vec3, intensity: f32, range: f32) -> LightComponent {
        LightComponent {
            light_type: LightType::Point,
            color,
            intensity,
            range,
            falloff: 5.0,
            inner_angle: 0.0,
            outer_angle: 0.0,
            enabled: true,
        }
    }

    /// Create a spot light component (angles in degrees)
    pub fn spot(color: Vec3, intensity: f32, range: f32, inner_angle: f32, outer_angle: f32) -> LightComponent {
        LightComponent {
            light_type: LightType::Spot,
            color,
            intensity,
            range,
            falloff: 5.0,
            inner_angle,
            outer_angle,
            enabled: true,
        }
    }
}
