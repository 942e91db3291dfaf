//! Offscreen render targets
//!
//! Every pass builds its framebuffers through [`RenderTargetBuilder`], which
//! runs the completeness check right after construction. A target that fails
//! the check is logged and kept around in a degraded state: its texture
//! accessors return the null id so downstream passes sample nothing instead
//! of crashing.

use log::{trace, warn};
use slotmap::Key;

use super::device::{
    AttachmentPoint, Filter, FramebufferId, FramebufferStatus, GraphicsDevice, RenderbufferId, TextureDesc,
    TextureFormat, TextureId, Wrap,
};
use super::viewport::Viewport;

/// Framebuffer plus the attachments it owns
#[derive(Debug, Default)]
pub struct RenderTarget {
    label: String,
    framebuffer: FramebufferId,
    color: TextureId,
    depth: TextureId,
    depth_stencil: RenderbufferId,
    size: Viewport,
    complete: bool,
}

impl RenderTarget {
    /// Start describing a target of the given size
    pub fn builder(label: &str, size: Viewport) -> RenderTargetBuilder {
        RenderTargetBuilder {
            label: label.to_string(),
            size,
            color: None,
            depth_texture: false,
            depth_stencil_samples: None,
        }
    }

    /// Framebuffer handle (null if creation failed)
    pub const fn framebuffer(&self) -> FramebufferId {
        self.framebuffer
    }

    /// Colour attachment, null when the target is incomplete
    pub fn color(&self) -> TextureId {
        if self.complete {
            self.color
        } else {
            TextureId::null()
        }
    }

    /// Depth texture attachment, null when absent or incomplete
    pub fn depth(&self) -> TextureId {
        if self.complete {
            self.depth
        } else {
            TextureId::null()
        }
    }

    /// Whether the completeness check passed
    pub const fn is_complete(&self) -> bool {
        self.complete
    }

    /// Target size
    pub const fn size(&self) -> Viewport {
        self.size
    }

    /// Debug label
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Bind for drawing and set the viewport to the target size
    pub fn bind(&self, device: &mut dyn GraphicsDevice) {
        device.bind_framebuffer(Some(self.framebuffer));
        device.set_viewport(self.size.width, self.size.height);
    }

    /// Release every owned object; safe to call more than once
    pub fn destroy(&mut self, device: &mut dyn GraphicsDevice) {
        if !self.framebuffer.is_null() {
            device.destroy_framebuffer(self.framebuffer);
        }
        if !self.color.is_null() {
            device.destroy_texture(self.color);
        }
        if !self.depth.is_null() {
            device.destroy_texture(self.depth);
        }
        if !self.depth_stencil.is_null() {
            device.destroy_renderbuffer(self.depth_stencil);
        }
        trace!("Destroyed render target '{}'", self.label);
        self.framebuffer = FramebufferId::null();
        self.color = TextureId::null();
        self.depth = TextureId::null();
        self.depth_stencil = RenderbufferId::null();
        self.complete = false;
    }
}

/// Builder for [`RenderTarget`]
#[derive(Debug, Clone)]
pub struct RenderTargetBuilder {
    label: String,
    size: Viewport,
    color: Option<TextureDesc>,
    depth_texture: bool,
    depth_stencil_samples: Option<u32>,
}

impl RenderTargetBuilder {
    /// Add a colour attachment
    pub fn with_color(mut self, format: TextureFormat, filter: Filter, wrap: Wrap) -> Self {
        self.color = Some(
            TextureDesc::new(self.size.width, self.size.height, format)
                .with_filter(filter)
                .with_wrap(wrap),
        );
        self
    }

    /// Make the colour attachment multisampled
    pub fn with_samples(mut self, samples: u32) -> Self {
        if let Some(desc) = self.color {
            self.color = Some(desc.with_samples(samples));
        }
        self
    }

    /// Add a sampleable 24-bit depth texture
    pub fn with_depth_texture(mut self) -> Self {
        self.depth_texture = true;
        self
    }

    /// Add a depth/stencil renderbuffer with `samples` samples
    pub fn with_depth_stencil(mut self, samples: u32) -> Self {
        self.depth_stencil_samples = Some(samples);
        self
    }

    /// Create every object and check completeness
    ///
    /// Never fails: creation errors and incompleteness are logged and leave
    /// a degraded target behind.
    pub fn build(self, device: &mut dyn GraphicsDevice) -> RenderTarget {
        let mut target = RenderTarget {
            label: self.label,
            size: self.size,
            ..RenderTarget::default()
        };

        target.framebuffer = match device.create_framebuffer(&target.label) {
            Ok(fb) => fb,
            Err(e) => {
                warn!("Render target '{}': {e}", target.label);
                return target;
            }
        };

        if let Some(desc) = self.color {
            match device.create_texture(&desc, None) {
                Ok(texture) => {
                    device.attach_texture(target.framebuffer, AttachmentPoint::Color0, texture);
                    target.color = texture;
                }
                Err(e) => warn!("Render target '{}' colour: {e}", target.label),
            }
        }

        if self.depth_texture {
            let desc = TextureDesc::new(self.size.width, self.size.height, TextureFormat::Depth24);
            match device.create_texture(&desc, None) {
                Ok(texture) => {
                    device.attach_texture(target.framebuffer, AttachmentPoint::Depth, texture);
                    target.depth = texture;
                }
                Err(e) => warn!("Render target '{}' depth: {e}", target.label),
            }
        }

        if let Some(samples) = self.depth_stencil_samples {
            let desc = TextureDesc::new(self.size.width, self.size.height, TextureFormat::Depth24Stencil8)
                .with_samples(samples);
            match device.create_renderbuffer(&desc) {
                Ok(rb) => {
                    device.attach_renderbuffer(target.framebuffer, AttachmentPoint::DepthStencil, rb);
                    target.depth_stencil = rb;
                }
                Err(e) => warn!("Render target '{}' depth/stencil: {e}", target.label),
            }
        }

        let status = device.framebuffer_status(target.framebuffer);
        target.complete = status == FramebufferStatus::Complete;
        if target.complete {
            trace!(
                "Render target '{}' complete at {}x{}",
                target.label,
                target.size.width,
                target.size.height
            );
        } else {
            warn!("Render target '{}' is incomplete: {status:?}", target.label);
        }
        target
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::headless::HeadlessDevice;

    #[test]
    fn test_complete_target() {
        let mut device = HeadlessDevice::new();
        let target = RenderTarget::builder("pre pass", Viewport::new(32, 16))
            .with_color(TextureFormat::Rgb16F, Filter::Nearest, Wrap::ClampToEdge)
            .with_depth_texture()
            .build(&mut device);

        assert!(target.is_complete());
        assert!(!target.color().is_null());
        assert!(!target.depth().is_null());
        assert_eq!(device.texture_desc(target.color()).unwrap().format, TextureFormat::Rgb16F);
    }

    #[test]
    fn test_incomplete_target_degrades_to_null() {
        let mut device = HeadlessDevice::new();
        device.fail_framebuffer("ssao");
        let mut target = RenderTarget::builder("ssao", Viewport::new(8, 8))
            .with_color(TextureFormat::R16F, Filter::Linear, Wrap::ClampToEdge)
            .build(&mut device);

        assert!(!target.is_complete());
        assert!(target.color().is_null());

        // Owned objects still get released
        target.destroy(&mut device);
        assert_eq!(device.texture_count(), 0);
        assert_eq!(device.framebuffer_count(), 0);
    }

    #[test]
    fn test_destroy_is_idempotent() {
        let mut device = HeadlessDevice::new();
        let mut target = RenderTarget::builder("forward msaa", Viewport::new(16, 16))
            .with_color(TextureFormat::Rgba16F, Filter::Nearest, Wrap::ClampToEdge)
            .with_samples(4)
            .with_depth_stencil(4)
            .build(&mut device);
        assert!(target.is_complete());
        assert_eq!(device.renderbuffer_count(), 1);

        target.destroy(&mut device);
        target.destroy(&mut device);
        assert_eq!(device.renderbuffer_count(), 0);
        assert_eq!(device.texture_count(), 0);
        assert_eq!(device.framebuffer_count(), 0);
    }
}
