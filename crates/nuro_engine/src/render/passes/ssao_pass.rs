//! # Screen-Space Ambient Occlusion
//!
//! Consumes pre-pass depth and normals and writes a single-channel
//! occlusion buffer at a fraction of the viewport size.
//!
//! ## Architecture
//!
//! - **Kernel**: generated once at creation from a seeded RNG. Samples lie
//!   in the unit hemisphere around +Z and are scaled by
//!   `lerp(0.1, 1.0, (i / n)^2)` so more of them sit close to the origin.
//! - **Noise**: a small tiled texture of random XY rotations, repeated over
//!   the screen to decorrelate banding.
//! - **Blur**: an optional separable blur, horizontal into one full-size
//!   target and then vertical into a second one. It is off by default; with
//!   it off the raw occlusion buffer is returned.

use std::rc::Rc;

use log::{debug, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use slotmap::Key;

use super::graph::{Attachment, PassDescriptor, PassKind};
use super::RenderPass;
use crate::core::config::SsaoConfig;
use crate::foundation::math::{utils, Vec2, Vec3};
use crate::render::camera::CameraView;
use crate::render::device::{
    sampler_unit, BufferBits, Filter, GraphicsDevice, TextureDesc, TextureFormat, TextureId, Wrap,
};
use crate::render::framebuffer::RenderTarget;
use crate::render::postprocessing::profile::AmbientOcclusion;
use crate::render::shader::{Shader, ShaderLibrary};
use crate::render::viewport::Viewport;

/// Upper bound on kernel samples, matching the shader's array size
pub const MAX_KERNEL_SAMPLES: u32 = 64;
/// Upper bound on the noise texture edge length
pub const MAX_NOISE_RESOLUTION: u32 = 64;

/// Framebuffer label of the occlusion target
pub const LABEL: &str = "ssao";
/// Framebuffer label of the horizontal blur target
pub const BLUR_H_LABEL: &str = "ssao blur h";
/// Framebuffer label of the vertical blur target
pub const BLUR_V_LABEL: &str = "ssao blur v";

const DEPTH_UNIT: u32 = 0;
const NORMAL_UNIT: u32 = 1;
const NOISE_UNIT: u32 = 2;
const BLUR_INPUT_UNIT: u32 = 0;

/// Hemisphere sample kernel, denser towards the origin
pub fn generate_kernel(rng: &mut impl Rng, samples: u32) -> Vec<Vec3> {
    let n = samples.max(1) as f32;
    (0..samples)
        .map(|i| {
            let direction = Vec3::new(
                rng.gen::<f32>() * 2.0 - 1.0,
                rng.gen::<f32>() * 2.0 - 1.0,
                rng.gen::<f32>(),
            );
            let direction = direction.try_normalize(f32::EPSILON).unwrap_or_else(Vec3::z);
            let t = i as f32 / n;
            direction * rng.gen::<f32>() * utils::lerp(0.1, 1.0, t * t)
        })
        .collect()
}

/// RGBA noise texels: random XY rotation vectors, Z and W zero
///
/// Empty if `resolution * resolution` overflows.
pub fn generate_noise(rng: &mut impl Rng, resolution: u32) -> Vec<f32> {
    let texels = resolution
        .checked_mul(resolution)
        .and_then(|t| usize::try_from(t).ok())
        .unwrap_or_default();
    let mut data = Vec::with_capacity(texels * 4);
    for _ in 0..texels {
        data.push(rng.gen::<f32>() * 2.0 - 1.0);
        data.push(rng.gen::<f32>() * 2.0 - 1.0);
        data.push(0.0);
        data.push(0.0);
    }
    data
}

/// Ambient occlusion pass
#[derive(Debug)]
pub struct SsaoPass {
    viewport: Viewport,
    config: SsaoConfig,
    kernel: Vec<Vec3>,
    noise: TextureId,
    target: Option<RenderTarget>,
    blur_targets: Option<[RenderTarget; 2]>,
    shader: Option<Rc<Shader>>,
    blur_shader: Option<Rc<Shader>>,
}

impl SsaoPass {
    /// Pass sized to `viewport`; nothing is allocated until `create`
    pub fn new(viewport: Viewport, config: SsaoConfig) -> Self {
        Self {
            viewport,
            config,
            kernel: Vec::new(),
            noise: TextureId::null(),
            target: None,
            blur_targets: None,
            shader: None,
            blur_shader: None,
        }
    }

    /// Kernel generated at creation
    pub fn kernel(&self) -> &[Vec3] {
        &self.kernel
    }

    /// Size of the occlusion buffer
    pub fn occlusion_size(&self) -> Viewport {
        self.viewport.scaled(self.config.resolution_scale)
    }

    /// Edge length of the noise texture, clamped to `1..=MAX_NOISE_RESOLUTION`
    pub fn noise_resolution(&self) -> u32 {
        self.config.noise_resolution.clamp(1, MAX_NOISE_RESOLUTION)
    }

    /// Number of kernel samples a frame uses for `settings`
    pub fn sample_count(&self, settings: &AmbientOcclusion) -> i32 {
        let available = i32::try_from(self.kernel.len()).unwrap_or(i32::MAX);
        settings.samples.clamp(0, available)
    }

    /// Render occlusion from pre-pass depth and normals
    ///
    /// Returns the blurred buffer when blur is configured, the raw buffer
    /// otherwise, and the null texture if the target is incomplete.
    pub fn render(
        &mut self,
        device: &mut dyn GraphicsDevice,
        depth: TextureId,
        normal: TextureId,
        camera: &CameraView,
        settings: &AmbientOcclusion,
    ) -> TextureId {
        let (Some(target), Some(shader)) = (&self.target, &self.shader) else {
            return TextureId::null();
        };

        target.bind(device);
        device.set_depth_test(None);
        device.set_cull_back(false);
        device.set_clear_color([1.0, 1.0, 1.0, 1.0]);
        device.clear(BufferBits::COLOR);

        shader.bind(device);
        shader.set_vec2(device, "resolution", self.occlusion_size().resolution());
        shader.set_mat4(device, "projectionMatrix", camera.projection);
        shader.set_mat4(device, "inverseProjectionMatrix", camera.inverse_projection);
        shader.set_int(device, "nSamples", self.sample_count(settings));
        shader.set_float(device, "radius", settings.radius);
        shader.set_float(device, "bias", settings.bias);
        shader.set_float(device, "power", settings.power);

        device.bind_texture(DEPTH_UNIT, depth);
        device.bind_texture(NORMAL_UNIT, normal);
        device.bind_texture(NOISE_UNIT, self.noise);
        device.draw_fullscreen_quad();

        let occlusion = target.color();
        if !self.config.blur {
            return occlusion;
        }

        let (Some([horizontal, vertical]), Some(blur_shader)) = (&self.blur_targets, &self.blur_shader) else {
            return occlusion;
        };
        blur_shader.bind(device);
        let steps = [
            (horizontal, occlusion, Vec2::new(1.0, 0.0), self.occlusion_size()),
            (vertical, horizontal.color(), Vec2::new(0.0, 1.0), self.viewport),
        ];
        for (target, input, direction, input_size) in steps {
            target.bind(device);
            device.clear(BufferBits::COLOR);
            blur_shader.set_vec2(device, "direction", direction);
            blur_shader.set_vec2(device, "inversedResolution", input_size.inverse_resolution());
            device.bind_texture(BLUR_INPUT_UNIT, input);
            device.draw_fullscreen_quad();
        }
        vertical.color()
    }

    fn upload_static_uniforms(&self, device: &mut dyn GraphicsDevice) {
        if let Some(shader) = &self.shader {
            shader.bind(device);
            shader.set_int(device, "depthInput", sampler_unit(DEPTH_UNIT));
            shader.set_int(device, "normalInput", sampler_unit(NORMAL_UNIT));
            shader.set_int(device, "noiseTexture", sampler_unit(NOISE_UNIT));
            shader.set_float(device, "noiseSize", self.noise_resolution() as f32);
            for (i, sample) in self.kernel.iter().enumerate() {
                shader.set_vec3(device, &format!("samples[{i}]"), *sample);
            }
        }
        if let Some(shader) = &self.blur_shader {
            shader.bind(device);
            shader.set_int(device, "ssaoInput", sampler_unit(BLUR_INPUT_UNIT));
        }
    }
}

impl RenderPass for SsaoPass {
    fn descriptor(&self) -> PassDescriptor {
        PassDescriptor::new(PassKind::Ssao)
            .reads(&[Attachment::Depth, Attachment::Normal])
            .writes(&[Attachment::Ssao])
    }

    fn create(&mut self, device: &mut dyn GraphicsDevice, shaders: &mut ShaderLibrary) {
        if self.target.is_some() {
            return;
        }

        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let samples = self.config.kernel_samples.min(MAX_KERNEL_SAMPLES);
        self.kernel = generate_kernel(&mut rng, samples);

        let resolution = self.noise_resolution();
        let noise_desc = TextureDesc::new(resolution, resolution, TextureFormat::Rgba16F)
            .with_filter(Filter::Nearest)
            .with_wrap(Wrap::Repeat);
        self.noise = match device.create_texture(&noise_desc, Some(&generate_noise(&mut rng, resolution))) {
            Ok(texture) => texture,
            Err(e) => {
                warn!("SSAO noise texture: {e}");
                TextureId::null()
            }
        };

        self.target = Some(
            RenderTarget::builder(LABEL, self.occlusion_size())
                .with_color(TextureFormat::R16F, Filter::Linear, Wrap::ClampToEdge)
                .build(device),
        );
        let viewport = self.viewport;
        let blur_target = |label: &str| {
            RenderTarget::builder(label, viewport)
                .with_color(TextureFormat::R16F, Filter::Linear, Wrap::ClampToEdge)
        };
        self.blur_targets = Some([
            blur_target(BLUR_H_LABEL).build(device),
            blur_target(BLUR_V_LABEL).build(device),
        ]);
        self.shader = Some(shaders.get(device, "ssao"));
        self.blur_shader = Some(shaders.get(device, "ssao_blur"));
        self.upload_static_uniforms(device);
        debug!("SSAO pass created with {} kernel samples", self.kernel.len());
    }

    fn destroy(&mut self, device: &mut dyn GraphicsDevice) {
        if let Some(mut target) = self.target.take() {
            target.destroy(device);
        }
        for mut target in self.blur_targets.take().into_iter().flatten() {
            target.destroy(device);
        }
        if !self.noise.is_null() {
            device.destroy_texture(self.noise);
            self.noise = TextureId::null();
        }
        self.kernel.clear();
        self.shader = None;
        self.blur_shader = None;
    }

    fn is_created(&self) -> bool {
        self.target.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::camera::FlyCamera;
    use crate::render::device::UniformValue;
    use crate::render::headless::HeadlessDevice;

    fn pass(blur: bool) -> SsaoPass {
        SsaoPass::new(
            Viewport::new(128, 64),
            SsaoConfig {
                blur,
                ..SsaoConfig::default()
            },
        )
    }

    #[test]
    fn test_kernel_in_hemisphere_and_biased_to_origin() {
        let mut rng = StdRng::seed_from_u64(7);
        let kernel = generate_kernel(&mut rng, 64);
        assert_eq!(kernel.len(), 64);
        for (i, s) in kernel.iter().enumerate() {
            assert!(s.z >= 0.0);
            let t = i as f32 / 64.0;
            assert!(s.norm() <= utils::lerp(0.1, 1.0, t * t) + 1e-6);
        }
    }

    #[test]
    fn test_kernel_is_deterministic_per_seed() {
        let a = generate_kernel(&mut StdRng::seed_from_u64(1), 16);
        let b = generate_kernel(&mut StdRng::seed_from_u64(1), 16);
        let c = generate_kernel(&mut StdRng::seed_from_u64(2), 16);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_noise_covers_every_texel() {
        let noise = generate_noise(&mut StdRng::seed_from_u64(3), 4);
        assert_eq!(noise.len(), 4 * 4 * 4);
        assert!(noise.chunks(4).all(|t| t[2] == 0.0 && t[0].abs() <= 1.0 && t[1].abs() <= 1.0));
    }

    #[test]
    fn test_create_uploads_kernel_and_sizes_target() {
        let mut device = HeadlessDevice::new();
        let mut shaders = ShaderLibrary::new();
        let mut ssao = pass(false);
        ssao.create(&mut device, &mut shaders);

        assert_eq!(ssao.kernel().len(), MAX_KERNEL_SAMPLES as usize);
        assert_eq!(ssao.occlusion_size(), Viewport::new(64, 32));
        let first = ssao.kernel()[0];
        assert_eq!(device.uniform("ssao", "samples[0]"), Some(UniformValue::Vec3(first)));
        assert_eq!(device.uniform("ssao", "noiseTexture"), Some(UniformValue::Int(2)));
    }

    #[test]
    fn test_sample_count_capped_by_kernel() {
        let mut device = HeadlessDevice::new();
        let mut shaders = ShaderLibrary::new();
        let mut ssao = SsaoPass::new(
            Viewport::new(32, 32),
            SsaoConfig {
                kernel_samples: 16,
                ..SsaoConfig::default()
            },
        );
        ssao.create(&mut device, &mut shaders);

        let settings = AmbientOcclusion {
            samples: 64,
            ..AmbientOcclusion::default()
        };
        assert_eq!(ssao.sample_count(&settings), 16);
    }

    #[test]
    fn test_render_returns_raw_or_blurred() {
        let mut device = HeadlessDevice::new();
        let mut shaders = ShaderLibrary::new();
        let camera = CameraView::from_fly(&FlyCamera::default(), &Viewport::new(128, 64));
        let settings = AmbientOcclusion::default();

        let mut raw = pass(false);
        raw.create(&mut device, &mut shaders);
        let out = raw.render(&mut device, TextureId::null(), TextureId::null(), &camera, &settings);
        assert_eq!(device.texture_desc(out).unwrap().format, TextureFormat::R16F);
        assert_eq!(device.texture_desc(out).unwrap().width, 64);
        assert_eq!(device.draws_into(BLUR_H_LABEL).count(), 0);
        assert_eq!(device.draws_into(BLUR_V_LABEL).count(), 0);

        let mut blurred = pass(true);
        blurred.create(&mut device, &mut shaders);
        let out = blurred.render(&mut device, TextureId::null(), TextureId::null(), &camera, &settings);
        assert_eq!(device.texture_desc(out).unwrap().width, 128);
        assert_eq!(device.draws_into(BLUR_H_LABEL).count(), 1);
        assert_eq!(device.draws_into(BLUR_V_LABEL).count(), 1);
    }

    #[test]
    fn test_blur_is_separable() {
        let mut device = HeadlessDevice::new();
        let mut shaders = ShaderLibrary::new();
        let camera = CameraView::from_fly(&FlyCamera::default(), &Viewport::new(128, 64));
        let mut ssao = pass(true);
        ssao.create(&mut device, &mut shaders);
        let out = ssao.render(
            &mut device,
            TextureId::null(),
            TextureId::null(),
            &camera,
            &AmbientOcclusion::default(),
        );

        let draws = device.draws();
        assert_eq!(draws.len(), 3);
        let (occlusion, horizontal, vertical) = (&draws[0], &draws[1], &draws[2]);
        assert_eq!(occlusion.framebuffer_label, LABEL);

        assert_eq!(horizontal.framebuffer_label, BLUR_H_LABEL);
        assert_eq!(horizontal.program.as_deref(), Some("ssao_blur"));
        assert_eq!(horizontal.uniform("direction"), Some(UniformValue::Vec2(Vec2::new(1.0, 0.0))));
        assert_eq!(
            horizontal.uniform("inversedResolution"),
            Some(UniformValue::Vec2(Viewport::new(64, 32).inverse_resolution()))
        );

        assert_eq!(vertical.framebuffer_label, BLUR_V_LABEL);
        assert_eq!(vertical.uniform("direction"), Some(UniformValue::Vec2(Vec2::new(0.0, 1.0))));
        assert_eq!(
            vertical.uniform("inversedResolution"),
            Some(UniformValue::Vec2(Viewport::new(128, 64).inverse_resolution()))
        );

        assert_ne!(horizontal.color_target, vertical.color_target);
        assert_eq!(vertical.color_target, Some(out));
        assert_eq!(device.bound_texture(BLUR_INPUT_UNIT), horizontal.color_target);
    }

    #[test]
    fn test_noise_size_is_bounded() {
        assert!(generate_noise(&mut StdRng::seed_from_u64(3), u32::MAX).is_empty());

        let mut device = HeadlessDevice::new();
        let mut shaders = ShaderLibrary::new();
        let mut ssao = SsaoPass::new(
            Viewport::new(32, 32),
            SsaoConfig {
                noise_resolution: 1 << 20,
                ..SsaoConfig::default()
            },
        );
        assert_eq!(ssao.noise_resolution(), MAX_NOISE_RESOLUTION);
        ssao.create(&mut device, &mut shaders);
        assert_eq!(
            device.uniform("ssao", "noiseSize"),
            Some(UniformValue::Float(MAX_NOISE_RESOLUTION as f32))
        );
    }

    #[test]
    fn test_destroy_then_recreate() {
        let mut device = HeadlessDevice::new();
        let mut shaders = ShaderLibrary::new();
        let mut ssao = pass(true);
        ssao.create(&mut device, &mut shaders);
        ssao.destroy(&mut device);
        ssao.destroy(&mut device);
        assert_eq!(device.texture_count(), 0);
        assert_eq!(device.framebuffer_count(), 0);

        ssao.create(&mut device, &mut shaders);
        assert!(ssao.is_created());
        assert_eq!(device.texture_count(), 4);
    }
}
