//! # Graphics Device Seam
//!
//! Everything a pass needs from the GPU: textures, renderbuffers,
//! framebuffers with completeness status, fixed-function state, programs
//! with name-addressed uniforms, meshes and blits.
//!
//! ## Design Notes
//!
//! Handles are opaque slotmap keys. The default (null) key plays the role of
//! the zero texture id: passes return it when a target failed to build, and
//! every device method accepts it and ignores it.

use bitflags::bitflags;

use super::RenderError;
use crate::foundation::math::{Mat3, Mat4, Vec2, Vec3, Vec4};

slotmap::new_key_type! {
    /// Handle to a 2D texture (single or multisampled)
    pub struct TextureId;
    /// Handle to a renderbuffer
    pub struct RenderbufferId;
    /// Handle to a framebuffer object
    pub struct FramebufferId;
    /// Handle to a linked shader program
    pub struct ProgramId;
    /// Handle to uploaded vertex/index data
    pub struct MeshId;
}

/// Result type for device operations
pub type DeviceResult<T> = Result<T, RenderError>;

/// Texel formats used by the frame pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    /// 8-bit RGBA
    Rgba8,
    /// Half-float RGBA (HDR colour)
    Rgba16F,
    /// Half-float RGB (view-space normals)
    Rgb16F,
    /// Half-float RG (motion vectors)
    Rg16F,
    /// Half-float single channel (occlusion)
    R16F,
    /// 24-bit depth
    Depth24,
    /// Packed 24-bit depth plus 8-bit stencil
    Depth24Stencil8,
}

impl TextureFormat {
    /// Components per texel, used to validate initial data
    pub const fn channels(self) -> usize {
        match self {
            Self::R16F | Self::Depth24 => 1,
            Self::Rg16F | Self::Depth24Stencil8 => 2,
            Self::Rgb16F => 3,
            Self::Rgba8 | Self::Rgba16F => 4,
        }
    }

    /// Whether the format can back a depth attachment
    pub const fn is_depth(self) -> bool {
        matches!(self, Self::Depth24 | Self::Depth24Stencil8)
    }
}

/// Texture sampling filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Filter {
    /// Point sampling
    Nearest,
    /// Bilinear sampling
    Linear,
}

/// Texture addressing mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Wrap {
    /// Clamp to the edge texel
    ClampToEdge,
    /// Tile
    Repeat,
}

/// Texture or renderbuffer description
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureDesc {
    /// Width in texels
    pub width: u32,
    /// Height in texels
    pub height: u32,
    /// Texel format
    pub format: TextureFormat,
    /// Sampling filter
    pub filter: Filter,
    /// Addressing mode
    pub wrap: Wrap,
    /// MSAA sample count, 1 for a regular texture
    pub samples: u32,
}

impl TextureDesc {
    /// Single-sampled, nearest, clamped texture
    pub const fn new(width: u32, height: u32, format: TextureFormat) -> Self {
        Self {
            width,
            height,
            format,
            filter: Filter::Nearest,
            wrap: Wrap::ClampToEdge,
            samples: 1,
        }
    }

    /// Set the sampling filter
    pub const fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    /// Set the addressing mode
    pub const fn with_wrap(mut self, wrap: Wrap) -> Self {
        self.wrap = wrap;
        self
    }

    /// Set the MSAA sample count
    pub const fn with_samples(mut self, samples: u32) -> Self {
        self.samples = samples;
        self
    }

    /// Number of `f32` components in tightly packed initial data
    pub const fn component_count(&self) -> usize {
        self.width as usize * self.height as usize * self.format.channels()
    }
}

/// Framebuffer attachment slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttachmentPoint {
    /// First colour attachment
    Color0,
    /// Depth only
    Depth,
    /// Combined depth and stencil
    DepthStencil,
}

/// Result of a framebuffer completeness check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramebufferStatus {
    /// Ready for rendering
    Complete,
    /// No attachment at all
    MissingAttachment,
    /// An attachment refers to a destroyed object or has the wrong format
    InvalidAttachment,
    /// Attachments disagree in size
    SizeMismatch,
    /// Attachments disagree in sample count
    SampleMismatch,
    /// The framebuffer handle itself is unknown
    Unknown,
}

bitflags! {
    /// Buffers affected by clears and blits
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BufferBits: u32 {
        /// Colour attachment
        const COLOR = 1 << 0;
        /// Depth attachment
        const DEPTH = 1 << 1;
        /// Stencil attachment
        const STENCIL = 1 << 2;
    }
}

/// Depth and stencil comparison functions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareFunc {
    /// Never passes
    Never,
    /// Always passes
    Always,
    /// Passes if incoming < stored
    Less,
    /// Passes if incoming <= stored
    LessEqual,
    /// Passes if equal
    Equal,
    /// Passes if not equal
    NotEqual,
    /// Passes if incoming > stored
    Greater,
}

/// Stencil test and write configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StencilState {
    /// Comparison against the reference value
    pub func: CompareFunc,
    /// Reference value; written on pass when `write_mask` is non-zero
    pub reference: u8,
    /// Bits that may be written
    pub write_mask: u8,
}

impl StencilState {
    /// Test only, never write
    pub const fn test(func: CompareFunc, reference: u8) -> Self {
        Self {
            func,
            reference,
            write_mask: 0x00,
        }
    }

    /// Always pass and replace the stored value with `reference`
    pub const fn write(reference: u8) -> Self {
        Self {
            func: CompareFunc::Always,
            reference,
            write_mask: 0xFF,
        }
    }
}

/// Colour blending equations in use
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendMode {
    /// `ONE, ONE`: accumulate
    Additive,
    /// `SRC_ALPHA, ONE_MINUS_SRC_ALPHA`
    Alpha,
}

/// Rasterisation fill mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PolygonMode {
    /// Filled triangles
    #[default]
    Fill,
    /// Wireframe
    Line,
}

/// Location of a uniform inside a program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UniformLocation(pub i32);

/// Uniform payload
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    /// `bool`
    Bool(bool),
    /// `int` or sampler unit
    Int(i32),
    /// `float`
    Float(f32),
    /// `vec2`
    Vec2(Vec2),
    /// `vec3`
    Vec3(Vec3),
    /// `vec4`
    Vec4(Vec4),
    /// `mat3`
    Mat3(Mat3),
    /// `mat4`
    Mat4(Mat4),
}

/// Sampler uniform value for texture `unit`
pub fn sampler_unit(unit: u32) -> i32 {
    i32::try_from(unit).unwrap_or_default()
}

/// Immediate-mode graphics device used by every pass
///
/// Object creation is fallible and checked by the caller. Per-frame state
/// calls are infallible: stale or null handles are ignored by the device.
pub trait GraphicsDevice {
    /// Create a texture, optionally with tightly packed initial texels
    ///
    /// Initial data is given as `f32` components and converted to the
    /// texture's format by the device.
    fn create_texture(&mut self, desc: &TextureDesc, data: Option<&[f32]>) -> DeviceResult<TextureId>;
    /// Release a texture
    fn destroy_texture(&mut self, texture: TextureId);
    /// Description of a live texture
    fn texture_desc(&self, texture: TextureId) -> Option<TextureDesc>;

    /// Create a renderbuffer
    fn create_renderbuffer(&mut self, desc: &TextureDesc) -> DeviceResult<RenderbufferId>;
    /// Release a renderbuffer
    fn destroy_renderbuffer(&mut self, renderbuffer: RenderbufferId);

    /// Create an empty framebuffer; `label` names it in logs
    fn create_framebuffer(&mut self, label: &str) -> DeviceResult<FramebufferId>;
    /// Attach a texture (null detaches)
    fn attach_texture(&mut self, framebuffer: FramebufferId, point: AttachmentPoint, texture: TextureId);
    /// Attach a renderbuffer
    fn attach_renderbuffer(&mut self, framebuffer: FramebufferId, point: AttachmentPoint, renderbuffer: RenderbufferId);
    /// Completeness check
    fn framebuffer_status(&self, framebuffer: FramebufferId) -> FramebufferStatus;
    /// Release a framebuffer (attachments are not released)
    fn destroy_framebuffer(&mut self, framebuffer: FramebufferId);
    /// Bind a framebuffer for drawing; `None` is the default framebuffer
    fn bind_framebuffer(&mut self, framebuffer: Option<FramebufferId>);

    /// Set the viewport rectangle
    fn set_viewport(&mut self, width: u32, height: u32);
    /// Colour used by subsequent clears
    fn set_clear_color(&mut self, color: [f32; 4]);
    /// Clear buffers of the bound framebuffer
    fn clear(&mut self, buffers: BufferBits);
    /// Enable the depth test with `func`, or disable it
    fn set_depth_test(&mut self, func: Option<CompareFunc>);
    /// Enable or disable back-face culling
    fn set_cull_back(&mut self, enabled: bool);
    /// Rasterisation fill mode
    fn set_polygon_mode(&mut self, mode: PolygonMode);
    /// Enable the stencil test with `state`, or disable it
    fn set_stencil(&mut self, state: Option<StencilState>);
    /// Enable blending with `mode`, or disable it
    fn set_blend(&mut self, mode: Option<BlendMode>);
    /// Bind a texture to a sampler unit
    fn bind_texture(&mut self, unit: u32, texture: TextureId);

    /// Look up a linked program by name
    fn program(&mut self, name: &str) -> DeviceResult<ProgramId>;
    /// Make a program current
    fn use_program(&mut self, program: ProgramId);
    /// Resolve a uniform name; `None` if the program has no such uniform
    fn uniform_location(&mut self, program: ProgramId, name: &str) -> Option<UniformLocation>;
    /// Upload a uniform value
    fn set_uniform(&mut self, program: ProgramId, location: UniformLocation, value: UniformValue);

    /// Upload interleaved vertex bytes and indices
    fn upload_mesh(&mut self, vertices: &[u8], stride: usize, indices: &[u32]) -> DeviceResult<MeshId>;
    /// Release mesh buffers
    fn destroy_mesh(&mut self, mesh: MeshId);
    /// Draw a mesh with the current program and state
    fn draw_mesh(&mut self, mesh: MeshId);
    /// Draw the shared full-screen quad
    fn draw_fullscreen_quad(&mut self);

    /// Copy (and resolve) buffers between framebuffers of equal size
    fn blit(
        &mut self,
        source: FramebufferId,
        destination: Option<FramebufferId>,
        width: u32,
        height: u32,
        buffers: BufferBits,
    );
}
