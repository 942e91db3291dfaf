//! # Bloom
//!
//! Physically-based bloom over a progressively halved mip chain.
//!
//! ## Algorithm
//!
//! 1. **Prefilter**: threshold the HDR input with a soft knee into a
//!    viewport-sized texture.
//! 2. **Downsample**: render mip 0 from the prefiltered image, then every
//!    following mip from the previous one, passing the source texel size
//!    as the filter scale. That is one draw per mip.
//! 3. **Upsample**: walk back from the smallest mip, additively blending a
//!    tent-filtered copy of each mip onto the next larger one. That is one
//!    draw per mip but the last.
//!
//! The result accumulates in mip 0, whose texture is returned. It stays
//! owned by the pass and is valid until the next `render` or `destroy`.

use std::rc::Rc;

use log::{debug, warn};
use slotmap::Key;

use super::profile::Bloom;
use crate::render::device::{
    sampler_unit, AttachmentPoint, BlendMode, Filter, FramebufferId, FramebufferStatus, GraphicsDevice, TextureDesc,
    TextureFormat, TextureId, Wrap,
};
use crate::render::shader::{Shader, ShaderLibrary};
use crate::render::viewport::Viewport;

/// Framebuffer label of the bloom chain
pub const LABEL: &str = "bloom";

const INPUT_UNIT: u32 = 0;

#[derive(Debug, Clone, Copy)]
struct Mip {
    texture: TextureId,
    size: Viewport,
}

#[derive(Debug)]
struct BloomShaders {
    prefilter: Rc<Shader>,
    downsample: Rc<Shader>,
    upsample: Rc<Shader>,
}

/// Bloom mip chain and its three shaders
#[derive(Debug)]
pub struct BloomPass {
    viewport: Viewport,
    mip_depth: u32,
    framebuffer: FramebufferId,
    prefilter: TextureId,
    mips: Vec<Mip>,
    shaders: Option<BloomShaders>,
    complete: bool,
}

/// Sizes of a chain of `depth` mips below `viewport`, each half the last
pub fn mip_sizes(viewport: Viewport, depth: u32) -> Vec<Viewport> {
    let mut sizes = Vec::with_capacity(depth as usize);
    let mut size = viewport;
    for _ in 0..depth {
        size = Viewport::new((size.width / 2).max(1), (size.height / 2).max(1));
        sizes.push(size);
    }
    sizes
}

fn chain_texture(device: &mut dyn GraphicsDevice, size: Viewport) -> TextureId {
    let desc = TextureDesc::new(size.width, size.height, TextureFormat::Rgba16F)
        .with_filter(Filter::Linear)
        .with_wrap(Wrap::ClampToEdge);
    device.create_texture(&desc, None).unwrap_or_else(|e| {
        warn!("Bloom texture {}x{}: {e}", size.width, size.height);
        TextureId::null()
    })
}

impl BloomPass {
    /// Chain of `mip_depth` mips for `viewport`; nothing is allocated until
    /// `create`
    pub fn new(viewport: Viewport, mip_depth: u32) -> Self {
        Self {
            viewport,
            mip_depth: mip_depth.max(1),
            framebuffer: FramebufferId::null(),
            prefilter: TextureId::null(),
            mips: Vec::new(),
            shaders: None,
            complete: false,
        }
    }

    /// Number of mips in the chain
    pub const fn mip_depth(&self) -> u32 {
        self.mip_depth
    }

    /// Texture of mip `index`, null if absent
    pub fn mip_texture(&self, index: usize) -> TextureId {
        self.mips.get(index).map_or_else(TextureId::null, |m| m.texture)
    }

    /// Whether the chain was created and passed the completeness check
    pub const fn is_complete(&self) -> bool {
        self.complete
    }

    /// Allocate the chain and resolve shaders
    pub fn create(&mut self, device: &mut dyn GraphicsDevice, shaders: &mut ShaderLibrary) {
        if !self.framebuffer.is_null() {
            return;
        }

        self.framebuffer = match device.create_framebuffer(LABEL) {
            Ok(fb) => fb,
            Err(e) => {
                warn!("Bloom framebuffer: {e}");
                return;
            }
        };

        self.prefilter = chain_texture(device, self.viewport);
        self.mips = mip_sizes(self.viewport, self.mip_depth)
            .into_iter()
            .map(|size| Mip {
                texture: chain_texture(device, size),
                size,
            })
            .collect();

        device.attach_texture(self.framebuffer, AttachmentPoint::Color0, self.mip_texture(0));
        let status = device.framebuffer_status(self.framebuffer);
        self.complete = status == FramebufferStatus::Complete && !self.prefilter.is_null();
        if !self.complete {
            warn!("Bloom framebuffer is incomplete: {status:?}");
        }

        let prefilter = shaders.get(device, "bloom_prefilter");
        let downsample = shaders.get(device, "bloom_downsampling");
        let upsample = shaders.get(device, "bloom_upsampling");
        for shader in [&prefilter, &downsample, &upsample] {
            shader.bind(device);
            shader.set_int(device, "inputTexture", sampler_unit(INPUT_UNIT));
        }
        self.shaders = Some(BloomShaders {
            prefilter,
            downsample,
            upsample,
        });
        debug!("Bloom chain created with {} mips", self.mips.len());
    }

    /// Release the chain
    pub fn destroy(&mut self, device: &mut dyn GraphicsDevice) {
        if !self.prefilter.is_null() {
            device.destroy_texture(self.prefilter);
        }
        for mip in self.mips.drain(..) {
            if !mip.texture.is_null() {
                device.destroy_texture(mip.texture);
            }
        }
        if !self.framebuffer.is_null() {
            device.destroy_framebuffer(self.framebuffer);
        }
        self.prefilter = TextureId::null();
        self.framebuffer = FramebufferId::null();
        self.shaders = None;
        self.complete = false;
    }

    /// Run prefilter, downsample and upsample; returns mip 0
    pub fn render(&self, device: &mut dyn GraphicsDevice, hdr_input: TextureId, settings: &Bloom) -> TextureId {
        let Some(shaders) = self.shaders.as_ref().filter(|_| self.complete) else {
            return TextureId::null();
        };

        device.bind_framebuffer(Some(self.framebuffer));
        device.set_depth_test(None);
        device.set_cull_back(false);
        device.set_blend(None);

        // Prefilter
        shaders.prefilter.bind(device);
        shaders.prefilter.set_float(device, "threshold", settings.threshold);
        shaders.prefilter.set_float(device, "softThreshold", settings.soft_threshold);
        device.bind_texture(INPUT_UNIT, hdr_input);
        device.attach_texture(self.framebuffer, AttachmentPoint::Color0, self.prefilter);
        device.set_viewport(self.viewport.width, self.viewport.height);
        device.draw_fullscreen_quad();

        // Downsample
        shaders.downsample.bind(device);
        shaders
            .downsample
            .set_vec2(device, "inversedResolution", self.viewport.inverse_resolution());
        device.bind_texture(INPUT_UNIT, self.prefilter);
        for mip in &self.mips {
            device.set_viewport(mip.size.width, mip.size.height);
            device.attach_texture(self.framebuffer, AttachmentPoint::Color0, mip.texture);
            device.draw_fullscreen_quad();
            shaders
                .downsample
                .set_vec2(device, "inversedResolution", mip.size.inverse_resolution());
            device.bind_texture(INPUT_UNIT, mip.texture);
        }

        // Upsample
        shaders.upsample.bind(device);
        shaders.upsample.set_float(device, "filterRadius", settings.filter_radius);
        shaders.upsample.set_float(device, "aspectRatio", self.viewport.aspect());
        device.set_blend(Some(BlendMode::Additive));
        for pair in self.mips.windows(2).rev() {
            let (target, source) = (pair[0], pair[1]);
            device.bind_texture(INPUT_UNIT, source.texture);
            device.set_viewport(target.size.width, target.size.height);
            device.attach_texture(self.framebuffer, AttachmentPoint::Color0, target.texture);
            device.draw_fullscreen_quad();
        }
        device.set_blend(None);

        device.set_viewport(self.viewport.width, self.viewport.height);
        self.mip_texture(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::headless::HeadlessDevice;

    fn created(depth: u32) -> (HeadlessDevice, BloomPass) {
        let mut device = HeadlessDevice::new();
        let mut shaders = ShaderLibrary::new();
        let mut bloom = BloomPass::new(Viewport::new(256, 128), depth);
        bloom.create(&mut device, &mut shaders);
        (device, bloom)
    }

    #[test]
    fn test_mip_sizes_halve_down_to_one() {
        let sizes = mip_sizes(Viewport::new(8, 4), 4);
        assert_eq!(
            sizes,
            vec![
                Viewport::new(4, 2),
                Viewport::new(2, 1),
                Viewport::new(1, 1),
                Viewport::new(1, 1)
            ]
        );
    }

    #[test]
    fn test_draw_counts_and_output() {
        for depth in [1, 2, 6] {
            let (mut device, bloom) = created(depth);
            let input = device
                .create_texture(&TextureDesc::new(256, 128, TextureFormat::Rgba16F), None)
                .unwrap();
            let out = bloom.render(&mut device, input, &Bloom::default());

            let count = |program: &str| {
                device
                    .draws()
                    .iter()
                    .filter(|d| d.program.as_deref() == Some(program))
                    .count()
            };
            assert_eq!(count("bloom_prefilter"), 1);
            assert_eq!(count("bloom_downsampling"), depth as usize);
            assert_eq!(count("bloom_upsampling"), depth as usize - 1);
            assert_eq!(out, bloom.mip_texture(0));
        }
    }

    #[test]
    fn test_upsample_is_additive_into_larger_mip() {
        let (mut device, bloom) = created(3);
        bloom.render(&mut device, TextureId::null(), &Bloom::default());

        let ups: Vec<_> = device
            .draws()
            .iter()
            .filter(|d| d.program.as_deref() == Some("bloom_upsampling"))
            .collect();
        assert!(ups.iter().all(|d| d.blend == Some(BlendMode::Additive)));
        assert_eq!(ups[0].color_target, Some(bloom.mip_texture(1)));
        assert_eq!(ups[1].color_target, Some(bloom.mip_texture(0)));

        let downs: Vec<_> = device
            .draws()
            .iter()
            .filter(|d| d.program.as_deref() == Some("bloom_downsampling"))
            .collect();
        assert!(downs.iter().all(|d| d.blend.is_none()));
        assert_eq!(downs[2].color_target, Some(bloom.mip_texture(2)));
    }

    #[test]
    fn test_repeated_render_keeps_output() {
        let (mut device, bloom) = created(4);
        let first = bloom.render(&mut device, TextureId::null(), &Bloom::default());
        let second = bloom.render(&mut device, TextureId::null(), &Bloom::default());
        assert_eq!(first, second);
    }

    #[test]
    fn test_incomplete_chain_returns_null() {
        let mut device = HeadlessDevice::new();
        device.fail_framebuffer(LABEL);
        let mut shaders = ShaderLibrary::new();
        let mut bloom = BloomPass::new(Viewport::new(64, 64), 4);
        bloom.create(&mut device, &mut shaders);
        assert!(bloom.render(&mut device, TextureId::null(), &Bloom::default()).is_null());
        assert!(device.draws().is_empty());

        bloom.destroy(&mut device);
        assert_eq!(device.texture_count(), 0);
        assert_eq!(device.framebuffer_count(), 0);
    }
}
