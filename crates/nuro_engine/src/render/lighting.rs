//! # Light Gathering
//!
//! Collects enabled lights from the registry once per frame into fixed-cap
//! arrays matching the lit shader's uniform arrays, and uploads them.
//!
//! ## Design Notes
//!
//! Lights beyond a cap are dropped in registry iteration order. Positions and
//! directions come from the world pose of the owning entity; a light points
//! down its transform's forward (-Z) axis.

use log::debug;

use super::device::GraphicsDevice;
use super::shader::Shader;
use super::transformation;
use crate::ecs::components::{LightComponent, LightType, TransformComponent};
use crate::ecs::World;
use crate::foundation::math::{utils, Vec3};

/// Directional lights the lit shader accepts
pub const MAX_DIRECTIONAL_LIGHTS: usize = 1;
/// Point lights the lit shader accepts
pub const MAX_POINT_LIGHTS: usize = 15;
/// Spotlights the lit shader accepts
pub const MAX_SPOT_LIGHTS: usize = 8;

/// A light resolved to world space
#[derive(Debug, Clone, PartialEq)]
pub struct GatheredLight {
    /// World position
    pub position: Vec3,
    /// World direction (unit)
    pub direction: Vec3,
    /// Light settings
    pub light: LightComponent,
}

/// Lights visible to the lit shader this frame
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LightSet {
    /// Directional lights
    pub directional: Vec<GatheredLight>,
    /// Point lights
    pub point: Vec<GatheredLight>,
    /// Spotlights
    pub spot: Vec<GatheredLight>,
}

impl LightSet {
    /// Gather every enabled light, respecting the per-type caps
    pub fn gather(world: &World) -> Self {
        let mut set = Self::default();
        let mut dropped = 0usize;
        for entity in world.view2::<LightComponent, TransformComponent>() {
            let Some(light) = world.get_component::<LightComponent>(entity) else {
                continue;
            };
            if !light.enabled {
                continue;
            }
            let Some((position, rotation)) = transformation::world_pose(world, entity) else {
                continue;
            };
            let (list, cap) = match light.light_type {
                LightType::Directional => (&mut set.directional, MAX_DIRECTIONAL_LIGHTS),
                LightType::Point => (&mut set.point, MAX_POINT_LIGHTS),
                LightType::Spot => (&mut set.spot, MAX_SPOT_LIGHTS),
            };
            if list.len() >= cap {
                dropped += 1;
                continue;
            }
            list.push(GatheredLight {
                position,
                direction: rotation * Vec3::new(0.0, 0.0, -1.0),
                light: light.clone(),
            });
        }
        if dropped > 0 {
            debug!("{dropped} lights over the shader caps were skipped");
        }
        set
    }

    /// Total gathered lights
    pub fn len(&self) -> usize {
        self.directional.len() + self.point.len() + self.spot.len()
    }

    /// Whether nothing was gathered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Upload counts and light arrays to a lit shader
    pub fn upload(&self, shader: &Shader, device: &mut dyn GraphicsDevice) {
        shader.set_int(device, "configuration.numDirectionalLights", count(self.directional.len()));
        shader.set_int(device, "configuration.numPointLights", count(self.point.len()));
        shader.set_int(device, "configuration.numSpotLights", count(self.spot.len()));

        for (i, l) in self.directional.iter().enumerate() {
            let p = format!("directionalLights[{i}]");
            shader.set_float(device, &format!("{p}.intensity"), l.light.intensity);
            shader.set_vec3(device, &format!("{p}.direction"), l.direction);
            shader.set_vec3(device, &format!("{p}.color"), l.light.color);
            shader.set_vec3(device, &format!("{p}.position"), l.position);
        }

        for (i, l) in self.point.iter().enumerate() {
            let p = format!("pointLights[{i}]");
            shader.set_vec3(device, &format!("{p}.position"), l.position);
            shader.set_vec3(device, &format!("{p}.color"), l.light.color);
            shader.set_float(device, &format!("{p}.intensity"), l.light.intensity);
            shader.set_float(device, &format!("{p}.range"), l.light.range);
            shader.set_float(device, &format!("{p}.falloff"), l.light.falloff);
        }

        for (i, l) in self.spot.iter().enumerate() {
            let p = format!("spotlights[{i}]");
            shader.set_vec3(device, &format!("{p}.position"), l.position);
            shader.set_vec3(device, &format!("{p}.direction"), l.direction);
            shader.set_vec3(device, &format!("{p}.color"), l.light.color);
            shader.set_float(device, &format!("{p}.intensity"), l.light.intensity);
            shader.set_float(device, &format!("{p}.range"), l.light.range);
            shader.set_float(device, &format!("{p}.falloff"), l.light.falloff);
            shader.set_float(device, &format!("{p}.innerCos"), half_angle_cos(l.light.inner_angle));
            shader.set_float(device, &format!("{p}.outerCos"), half_angle_cos(l.light.outer_angle));
        }
    }
}

/// Cosine of half a full cone angle given in degrees
pub fn half_angle_cos(angle_degrees: f32) -> f32 {
    utils::deg_to_rad(angle_degrees * 0.5).cos()
}

fn count(n: usize) -> i32 {
    i32::try_from(n).unwrap_or(i32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::components::LightFactory;
    use crate::render::device::UniformValue;
    use crate::render::headless::HeadlessDevice;
    use crate::render::shader::ShaderLibrary;
    use approx::assert_relative_eq;

    fn add_light(world: &mut World, light: LightComponent, position: Vec3) {
        let e = world.create_entity();
        world.add_component(e, TransformComponent::from_position(position));
        world.add_component(e, light);
    }

    #[test]
    fn test_caps_and_disabled_lights() {
        let mut world = World::new();
        for i in 0..20 {
            add_light(&mut world, LightFactory::point(Vec3::new(1.0, 1.0, 1.0), 1.0, 10.0), Vec3::new(i as f32, 0.0, 0.0));
        }
        add_light(&mut world, LightFactory::directional(Vec3::new(1.0, 1.0, 1.0), 1.0), Vec3::zeros());
        add_light(&mut world, LightFactory::directional(Vec3::new(1.0, 0.0, 0.0), 2.0), Vec3::zeros());
        let mut off = LightFactory::spot(Vec3::new(1.0, 1.0, 1.0), 1.0, 10.0, 20.0, 40.0);
        off.enabled = false;
        add_light(&mut world, off, Vec3::zeros());

        let set = LightSet::gather(&world);
        assert_eq!(set.point.len(), MAX_POINT_LIGHTS);
        assert_eq!(set.directional.len(), MAX_DIRECTIONAL_LIGHTS);
        assert_relative_eq!(set.directional[0].light.intensity, 1.0);
        assert!(set.spot.is_empty());
        // Registry order decides which point lights survive
        assert_relative_eq!(set.point[14].position.x, 14.0);
    }

    #[test]
    fn test_direction_follows_rotation() {
        let mut world = World::new();
        let e = world.create_entity();
        world.add_component(e, TransformComponent::identity().with_rotation_euler(0.0, std::f32::consts::FRAC_PI_2, 0.0));
        world.add_component(e, LightFactory::directional(Vec3::new(1.0, 1.0, 1.0), 1.0));

        let set = LightSet::gather(&world);
        assert_relative_eq!(set.directional[0].direction, Vec3::new(-1.0, 0.0, 0.0), epsilon = 1e-5);
    }

    #[test]
    fn test_upload_uniforms() {
        let mut world = World::new();
        add_light(&mut world, LightFactory::spot(Vec3::new(1.0, 1.0, 1.0), 3.5, 25.0, 25.0, 40.0), Vec3::new(0.0, 2.0, 0.0));
        let set = LightSet::gather(&world);

        let mut device = HeadlessDevice::new();
        let mut library = ShaderLibrary::new();
        let shader = library.get(&mut device, "lit");
        set.upload(&shader, &mut device);

        assert_eq!(device.uniform("lit", "configuration.numSpotLights"), Some(UniformValue::Int(1)));
        assert_eq!(device.uniform("lit", "configuration.numPointLights"), Some(UniformValue::Int(0)));
        let Some(UniformValue::Float(inner)) = device.uniform("lit", "spotlights[0].innerCos") else {
            panic!("innerCos missing");
        };
        assert_relative_eq!(inner, half_angle_cos(25.0));
        assert_relative_eq!(half_angle_cos(40.0), 20.0_f32.to_radians().cos());
    }
}
