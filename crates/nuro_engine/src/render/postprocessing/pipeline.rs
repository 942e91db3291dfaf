//! Post-processing chain
//!
//! Runs, in order: bloom, bloom composite, motion blur, colour grading,
//! vignette and chromatic aberration. Each stage reads the previous stage's
//! output. Disabled stages hand their input on untouched; colour grading
//! always runs. The final framebuffer can be blitted to the screen.

use log::{debug, trace};
use slotmap::Key;

use super::bloom::BloomPass;
use super::chromatic_aberration::ChromaticAberrationStage;
use super::color_grading::ColorGradingStage;
use super::composite::BloomComposite;
use super::motion_blur::{MotionBlurInputs, MotionBlurStage};
use super::profile::Profile;
use super::vignette::VignetteStage;
use crate::render::camera::CameraView;
use crate::render::device::{BufferBits, FramebufferId, GraphicsDevice, TextureId};
use crate::render::shader::ShaderLibrary;
use crate::render::viewport::Viewport;

/// Textures the chain reads
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PostInputs {
    /// Resolved forward pass colour
    pub hdr: TextureId,
    /// Pre-pass depth
    pub depth: TextureId,
    /// Velocity buffer
    pub velocity: TextureId,
}

/// Textures the chain produced
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PostOutputs {
    /// Bloom mip 0, null when bloom is off
    pub bloom: TextureId,
    /// Final image
    pub output: TextureId,
}

/// Every post-processing stage of a view
#[derive(Debug)]
pub struct PostProcessingPipeline {
    viewport: Viewport,
    present: bool,
    bloom: BloomPass,
    composite: BloomComposite,
    motion_blur: MotionBlurStage,
    color_grading: ColorGradingStage,
    vignette: VignetteStage,
    chromatic_aberration: ChromaticAberrationStage,
    lens_dirt: TextureId,
    created: bool,
}

impl PostProcessingPipeline {
    /// Chain for `viewport` with a bloom chain of `bloom_mip_depth` mips
    pub fn new(viewport: Viewport, bloom_mip_depth: u32, present: bool) -> Self {
        Self {
            viewport,
            present,
            bloom: BloomPass::new(viewport, bloom_mip_depth),
            composite: BloomComposite::new(),
            motion_blur: MotionBlurStage::new(viewport),
            color_grading: ColorGradingStage::new(),
            vignette: VignetteStage::new(viewport),
            chromatic_aberration: ChromaticAberrationStage::new(),
            lens_dirt: TextureId::null(),
            created: false,
        }
    }

    /// Allocate every stage
    pub fn create(&mut self, device: &mut dyn GraphicsDevice, shaders: &mut ShaderLibrary) {
        if self.created {
            return;
        }
        self.bloom.create(device, shaders);
        self.composite.create(device, shaders, self.viewport);
        self.motion_blur.create(device, shaders);
        self.color_grading.create(device, shaders, self.viewport);
        self.vignette.create(device, shaders);
        self.chromatic_aberration.create(device, shaders, self.viewport);
        self.created = true;
        debug!(
            "Post-processing created at {}x{}",
            self.viewport.width, self.viewport.height
        );
    }

    /// Release every stage
    pub fn destroy(&mut self, device: &mut dyn GraphicsDevice) {
        self.bloom.destroy(device);
        self.composite.destroy(device);
        self.motion_blur.destroy(device);
        self.color_grading.destroy(device);
        self.vignette.destroy(device);
        self.chromatic_aberration.destroy(device);
        self.created = false;
    }

    /// Whether `create` ran more recently than `destroy`
    pub const fn is_created(&self) -> bool {
        self.created
    }

    /// Lens dirt texture used by the bloom composite; not owned
    pub fn set_lens_dirt(&mut self, texture: TextureId) {
        self.lens_dirt = texture;
    }

    /// Blit the final image to the default framebuffer after rendering
    pub fn set_present(&mut self, present: bool) {
        self.present = present;
    }

    /// Bloom chain, for inspection
    pub const fn bloom(&self) -> &BloomPass {
        &self.bloom
    }

    /// Motion blur stage, for inspection
    pub const fn motion_blur(&self) -> &MotionBlurStage {
        &self.motion_blur
    }

    /// Run the chain over `inputs`
    pub fn render(
        &mut self,
        device: &mut dyn GraphicsDevice,
        inputs: PostInputs,
        camera: &CameraView,
        profile: &Profile,
    ) -> PostOutputs {
        let mut last_framebuffer = FramebufferId::null();
        let mut track = |before: TextureId, after: TextureId, framebuffer: FramebufferId| {
            if after != before {
                last_framebuffer = framebuffer;
            }
            after
        };

        let bloom = if profile.bloom.enabled {
            self.bloom.render(device, inputs.hdr, &profile.bloom)
        } else {
            TextureId::null()
        };

        let mut color = inputs.hdr;
        color = track(
            color,
            self.composite
                .render(device, color, bloom, self.lens_dirt, &profile.bloom),
            self.composite.framebuffer(),
        );
        color = track(
            color,
            self.motion_blur.render(
                device,
                MotionBlurInputs {
                    color,
                    depth: inputs.depth,
                    velocity: inputs.velocity,
                },
                camera,
                &profile.motion_blur,
            ),
            self.motion_blur.framebuffer(),
        );
        color = track(
            color,
            self.color_grading.render(device, color, &profile.color),
            self.color_grading.framebuffer(),
        );
        color = track(
            color,
            self.vignette.render(device, color, &profile.vignette),
            self.vignette.framebuffer(),
        );
        color = track(
            color,
            self.chromatic_aberration
                .render(device, color, &profile.chromatic_aberration),
            self.chromatic_aberration.framebuffer(),
        );

        if self.present && !last_framebuffer.is_null() {
            device.blit(
                last_framebuffer,
                None,
                self.viewport.width,
                self.viewport.height,
                BufferBits::COLOR,
            );
        }
        device.bind_framebuffer(None);
        device.set_viewport(self.viewport.width, self.viewport.height);
        trace!("Post-processing finished");

        PostOutputs { bloom, output: color }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::camera::FlyCamera;
    use crate::render::device::{TextureDesc, TextureFormat};
    use crate::render::headless::HeadlessDevice;

    fn setup(present: bool) -> (HeadlessDevice, PostProcessingPipeline, CameraView, TextureId) {
        let viewport = Viewport::new(128, 64);
        let mut device = HeadlessDevice::new();
        let mut shaders = ShaderLibrary::new();
        let mut post = PostProcessingPipeline::new(viewport, 4, present);
        post.create(&mut device, &mut shaders);
        let hdr = device
            .create_texture(&TextureDesc::new(128, 64, TextureFormat::Rgba16F), None)
            .unwrap();
        (device, post, CameraView::from_fly(&FlyCamera::default(), &viewport), hdr)
    }

    fn programs(device: &HeadlessDevice) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for draw in device.draws() {
            let name = draw.program.clone().unwrap_or_default();
            if names.last() != Some(&name) {
                names.push(name);
            }
        }
        names
    }

    #[test]
    fn test_neutral_profile_only_grades() {
        let (mut device, mut post, camera, hdr) = setup(false);
        let out = post.render(
            &mut device,
            PostInputs {
                hdr,
                ..PostInputs::default()
            },
            &camera,
            &Profile::neutral(),
        );
        assert_eq!(programs(&device), vec!["color_grading".to_string()]);
        assert!(out.bloom.is_null());
        assert_ne!(out.output, hdr);
        assert!(device.blits().is_empty());
    }

    #[test]
    fn test_stage_order_with_every_effect() {
        let (mut device, mut post, camera, hdr) = setup(true);
        let mut profile = Profile::default();
        profile.motion_blur.enabled = true;
        profile.vignette.enabled = true;
        profile.chromatic_aberration.enabled = true;
        let out = post.render(
            &mut device,
            PostInputs {
                hdr,
                ..PostInputs::default()
            },
            &camera,
            &profile,
        );

        assert_eq!(
            programs(&device),
            vec![
                "bloom_prefilter",
                "bloom_downsampling",
                "bloom_upsampling",
                "bloom_composite",
                "motion_blur",
                "color_grading",
                "vignette",
                "chromatic_aberration",
            ]
        );
        assert_eq!(out.bloom, post.bloom().mip_texture(0));

        let blit = device.blits().last().unwrap();
        assert_eq!(blit.destination, None);
        assert_eq!(device.framebuffer_label(blit.source), Some("chromatic aberration"));
    }

    #[test]
    fn test_motion_blur_history_advances_when_disabled() {
        let (mut device, mut post, camera, hdr) = setup(false);
        assert!(post.motion_blur().previous_view_projection().is_none());
        post.render(
            &mut device,
            PostInputs {
                hdr,
                ..PostInputs::default()
            },
            &camera,
            &Profile::neutral(),
        );
        assert_eq!(
            post.motion_blur().previous_view_projection(),
            Some(camera.view_projection)
        );
    }

    #[test]
    fn test_incomplete_stage_passes_through() {
        let viewport = Viewport::new(32, 32);
        let mut device = HeadlessDevice::new();
        device.fail_framebuffer("color grading");
        let mut shaders = ShaderLibrary::new();
        let mut post = PostProcessingPipeline::new(viewport, 2, false);
        post.create(&mut device, &mut shaders);
        let hdr = device
            .create_texture(&TextureDesc::new(32, 32, TextureFormat::Rgba16F), None)
            .unwrap();
        let camera = CameraView::from_fly(&FlyCamera::default(), &viewport);

        let out = post.render(
            &mut device,
            PostInputs {
                hdr,
                ..PostInputs::default()
            },
            &camera,
            &Profile::neutral(),
        );
        assert_eq!(out.output, hdr);
    }

    #[test]
    fn test_destroy_releases_everything() {
        let (mut device, mut post, _, hdr) = setup(false);
        post.destroy(&mut device);
        device.destroy_texture(hdr);
        assert_eq!(device.texture_count(), 0);
        assert_eq!(device.framebuffer_count(), 0);
        assert!(!post.is_created());
    }
}
