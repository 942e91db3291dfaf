//! Lit (PBR) material
//!
//! Uploads, on every bind: frame configuration (camera, gamma, viewport),
//! the gathered light arrays, shadow inputs, the SSAO input, and its own
//! surface parameters. Texture maps are optional; a missing roughness or
//! metallic map falls back to the scalar value.

use std::rc::Rc;

use slotmap::Key;

use super::{Material, MaterialId};
use crate::foundation::math::{Vec2, Vec3, Vec4};
use crate::render::context::FrameContext;
use crate::render::device::{sampler_unit, GraphicsDevice, TextureId};
use crate::render::shader::Shader;

/// Sampler units of the lit shader
pub mod units {
    /// Shadow map
    pub const SHADOW_MAP: u32 = 0;
    /// Shadow disk
    pub const SHADOW_DISK: u32 = 1;
    /// SSAO input
    pub const SSAO: u32 = 2;
    /// Albedo map
    pub const ALBEDO: u32 = 3;
    /// Normal map
    pub const NORMAL: u32 = 4;
    /// Roughness map
    pub const ROUGHNESS: u32 = 5;
    /// Metallic map
    pub const METALLIC: u32 = 6;
    /// Ambient occlusion map
    pub const OCCLUSION: u32 = 7;
    /// Emission map
    pub const EMISSION: u32 = 8;
    /// Height map
    pub const HEIGHT: u32 = 9;
}

/// Surface parameters of a lit material
#[derive(Debug, Clone, PartialEq)]
pub struct LitMaterialParams {
    /// Base colour (RGBA)
    pub base_color: Vec4,
    /// UV tiling
    pub tiling: Vec2,
    /// UV offset
    pub offset: Vec2,
    /// Roughness when no roughness map is set
    pub roughness: f32,
    /// Metallic when no metallic map is set
    pub metallic: f32,
    /// Normal map strength
    pub normal_map_intensity: f32,
    /// Parallax height scale
    pub height_map_scale: f32,
    /// Emission switch
    pub emission: bool,
    /// Emission strength
    pub emission_intensity: f32,
    /// Emission colour
    pub emission_color: Vec3,
}

impl Default for LitMaterialParams {
    fn default() -> Self {
        Self {
            base_color: Vec4::new(1.0, 1.0, 1.0, 1.0),
            tiling: Vec2::new(1.0, 1.0),
            offset: Vec2::zeros(),
            roughness: 0.0,
            metallic: 0.0,
            normal_map_intensity: 1.0,
            height_map_scale: 0.1,
            emission: false,
            emission_intensity: 0.0,
            emission_color: Vec3::new(1.0, 1.0, 1.0),
        }
    }
}

/// Optional texture maps
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MaterialMaps {
    /// Albedo
    pub albedo: Option<TextureId>,
    /// Tangent-space normals
    pub normal: Option<TextureId>,
    /// Roughness
    pub roughness: Option<TextureId>,
    /// Metallic
    pub metallic: Option<TextureId>,
    /// Baked ambient occlusion
    pub occlusion: Option<TextureId>,
    /// Emission
    pub emission: Option<TextureId>,
    /// Height (parallax)
    pub height: Option<TextureId>,
}

/// PBR material driven by the frame's lights
#[derive(Debug)]
pub struct LitMaterial {
    id: MaterialId,
    shader: Rc<Shader>,
    /// Surface parameters
    pub params: LitMaterialParams,
    /// Texture maps
    pub maps: MaterialMaps,
}

impl LitMaterial {
    /// Lit material with default parameters
    pub fn new(shader: Rc<Shader>) -> Self {
        Self {
            id: MaterialId::next(),
            shader,
            params: LitMaterialParams::default(),
            maps: MaterialMaps::default(),
        }
    }

    /// Builder pattern: set surface parameters
    pub fn with_params(mut self, params: LitMaterialParams) -> Self {
        self.params = params;
        self
    }

    /// Builder pattern: set texture maps
    pub fn with_maps(mut self, maps: MaterialMaps) -> Self {
        self.maps = maps;
        self
    }

    fn bind_map(&self, device: &mut dyn GraphicsDevice, flag: &str, map: Option<TextureId>, unit: u32) -> bool {
        let enabled = map.is_some_and(|t| !t.is_null());
        self.shader.set_bool(device, flag, enabled);
        if let Some(texture) = map.filter(|_| enabled) {
            device.bind_texture(unit, texture);
        }
        enabled
    }

    fn bind_configuration(&self, device: &mut dyn GraphicsDevice, context: &FrameContext<'_>) {
        let shader = &self.shader;
        shader.set_vec3(device, "configuration.cameraPosition", context.camera.position);
        shader.set_float(device, "configuration.gamma", context.profile.color.gamma);
        shader.set_vec2(device, "configuration.viewportResolution", context.viewport.resolution());

        let cast_shadows = context.cast_shadows();
        shader.set_bool(device, "configuration.castShadows", cast_shadows);
        if let (true, Some(shadows)) = (cast_shadows, context.shadows) {
            shader.set_mat4(device, "lightSpaceMatrix", shadows.light_space);
            shader.set_int(device, "configuration.shadowMap", sampler_unit(units::SHADOW_MAP));
            shader.set_int(device, "configuration.shadowDisk", sampler_unit(units::SHADOW_DISK));
            device.bind_texture(units::SHADOW_MAP, shadows.shadow_map);
            device.bind_texture(units::SHADOW_DISK, shadows.shadow_disk);
            shader.set_float(device, "configuration.shadowMapResolutionWidth", shadows.map_width as f32);
            shader.set_float(device, "configuration.shadowMapResolutionHeight", shadows.map_height as f32);
            shader.set_float(device, "configuration.shadowDiskWindowSize", shadows.disk_window_size);
            shader.set_float(device, "configuration.shadowDiskFilterSize", shadows.disk_filter_size);
            shader.set_float(device, "configuration.shadowDiskRadius", shadows.disk_radius);
        }

        let ssao = context.ssao_enabled();
        shader.set_bool(device, "configuration.enableSSAO", ssao);
        if ssao {
            shader.set_int(device, "configuration.ssaoBuffer", sampler_unit(units::SSAO));
            device.bind_texture(units::SSAO, context.ssao_input);
        }
    }

    fn bind_surface(&self, device: &mut dyn GraphicsDevice) {
        let shader = &self.shader;
        let p = &self.params;
        shader.set_vec4(device, "material.baseColor", p.base_color);
        shader.set_vec2(device, "material.tiling", p.tiling);
        shader.set_vec2(device, "material.offset", p.offset);

        self.bind_map(device, "material.enableAlbedoMap", self.maps.albedo, units::ALBEDO);
        if self.bind_map(device, "material.enableNormalMap", self.maps.normal, units::NORMAL) {
            shader.set_float(device, "material.normalMapIntensity", p.normal_map_intensity);
        }
        if !self.bind_map(device, "material.enableRoughnessMap", self.maps.roughness, units::ROUGHNESS) {
            shader.set_float(device, "material.roughness", p.roughness);
        }
        if !self.bind_map(device, "material.enableMetallicMap", self.maps.metallic, units::METALLIC) {
            shader.set_float(device, "material.metallic", p.metallic);
        }
        self.bind_map(device, "material.enableAmbientOcclusionMap", self.maps.occlusion, units::OCCLUSION);
        if self.bind_map(device, "material.enableHeightMap", self.maps.height, units::HEIGHT) {
            shader.set_float(device, "material.heightMapScale", p.height_map_scale);
        }

        shader.set_bool(device, "material.emission", p.emission);
        shader.set_float(device, "material.emissionIntensity", p.emission_intensity);
        shader.set_vec3(device, "material.emissionColor", p.emission_color);
        self.bind_map(device, "material.enableEmissionMap", self.maps.emission, units::EMISSION);
    }

    fn bind_samplers(&self, device: &mut dyn GraphicsDevice) {
        let samplers = [
            ("material.albedoMap", units::ALBEDO),
            ("material.normalMap", units::NORMAL),
            ("material.roughnessMap", units::ROUGHNESS),
            ("material.metallicMap", units::METALLIC),
            ("material.ambientOcclusionMap", units::OCCLUSION),
            ("material.emissionMap", units::EMISSION),
            ("material.heightMap", units::HEIGHT),
        ];
        for (name, unit) in samplers {
            self.shader.set_int(device, name, sampler_unit(unit));
        }
    }
}

impl Material for LitMaterial {
    fn bind(&self, device: &mut dyn GraphicsDevice, context: &FrameContext<'_>) {
        self.bind_samplers(device);
        self.bind_configuration(device, context);
        context.lights.upload(&self.shader, device);
        self.bind_surface(device);
    }

    fn id(&self) -> MaterialId {
        self.id
    }

    fn shader(&self) -> &Rc<Shader> {
        &self.shader
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::components::{LightFactory, TransformComponent};
    use crate::ecs::World;
    use crate::render::camera::{CameraView, FlyCamera};
    use crate::render::context::ShadowInputs;
    use crate::render::device::{TextureDesc, TextureFormat, UniformValue};
    use crate::render::headless::HeadlessDevice;
    use crate::render::lighting::LightSet;
    use crate::render::postprocessing::Profile;
    use crate::render::shader::ShaderLibrary;
    use crate::render::viewport::Viewport;

    fn lights() -> LightSet {
        let mut world = World::new();
        let e = world.create_entity();
        world.add_component(e, TransformComponent::identity());
        world.add_component(e, LightFactory::point(Vec3::new(0.0, 0.78, 0.95), 2.0, 10.0));
        LightSet::gather(&world)
    }

    #[test]
    fn test_bind_uploads_scalars_without_maps() {
        let mut device = HeadlessDevice::new();
        let mut library = ShaderLibrary::new();
        let material = LitMaterial::new(library.get(&mut device, "lit")).with_params(LitMaterialParams {
            roughness: 0.4,
            metallic: 0.9,
            ..LitMaterialParams::default()
        });

        let viewport = Viewport::new(320, 200);
        let camera = CameraView::from_fly(&FlyCamera::default(), &viewport);
        let profile = Profile::default();
        let lights = lights();
        let context = FrameContext {
            viewport,
            camera: &camera,
            profile: &profile,
            ssao_input: TextureId::null(),
            lights: &lights,
            shadows: None,
        };
        material.bind(&mut device, &context);

        assert_eq!(device.program_switches(), 0);
        assert_eq!(device.uniform("lit", "material.roughness"), Some(UniformValue::Float(0.4)));
        assert_eq!(device.uniform("lit", "material.metallic"), Some(UniformValue::Float(0.9)));
        assert_eq!(device.uniform("lit", "material.enableAlbedoMap"), Some(UniformValue::Bool(false)));
        assert_eq!(device.uniform("lit", "configuration.castShadows"), Some(UniformValue::Bool(false)));
        assert_eq!(device.uniform("lit", "configuration.enableSSAO"), Some(UniformValue::Bool(false)));
        assert_eq!(device.uniform("lit", "configuration.numPointLights"), Some(UniformValue::Int(1)));
        assert_eq!(
            device.uniform("lit", "configuration.viewportResolution"),
            Some(UniformValue::Vec2(Vec2::new(320.0, 200.0)))
        );
    }

    #[test]
    fn test_bind_with_maps_shadows_and_ssao() {
        let mut device = HeadlessDevice::new();
        let mut library = ShaderLibrary::new();
        let texture = device
            .create_texture(&TextureDesc::new(4, 4, TextureFormat::Rgba8), None)
            .unwrap();
        let material = LitMaterial::new(library.get(&mut device, "lit")).with_maps(MaterialMaps {
            roughness: Some(texture),
            ..MaterialMaps::default()
        });

        let viewport = Viewport::new(64, 64);
        let camera = CameraView::from_fly(&FlyCamera::default(), &viewport);
        let mut profile = Profile::default();
        profile.ambient_occlusion.enabled = true;
        let lights = LightSet::default();
        let shadows = ShadowInputs {
            light_space: crate::foundation::math::Mat4::identity(),
            shadow_map: texture,
            map_width: 2048,
            map_height: 2048,
            shadow_disk: texture,
            disk_window_size: 4.0,
            disk_filter_size: 8.0,
            disk_radius: 3.0,
        };
        let context = FrameContext {
            viewport,
            camera: &camera,
            profile: &profile,
            ssao_input: texture,
            lights: &lights,
            shadows: Some(&shadows),
        };
        material.bind(&mut device, &context);

        assert_eq!(device.uniform("lit", "material.enableRoughnessMap"), Some(UniformValue::Bool(true)));
        assert_eq!(device.uniform("lit", "material.roughness"), None);
        assert_eq!(device.bound_texture(units::ROUGHNESS), Some(texture));
        assert_eq!(device.uniform("lit", "configuration.castShadows"), Some(UniformValue::Bool(true)));
        assert_eq!(
            device.uniform("lit", "configuration.shadowMapResolutionWidth"),
            Some(UniformValue::Float(2048.0))
        );
        assert_eq!(device.uniform("lit", "configuration.enableSSAO"), Some(UniformValue::Bool(true)));
        assert_eq!(device.bound_texture(units::SSAO), Some(texture));
    }
}
