//! # Headless Device
//!
//! A [`GraphicsDevice`] that keeps every object in CPU-side tables and
//! records what the passes ask of it: draws with the state they were issued
//! under, clears, blits and uniform values.
//!
//! ## Architecture
//!
//! - **Object tables**: one slotmap per handle type, so stale handles are
//!   detected exactly like on a real driver.
//! - **Completeness**: a framebuffer is complete when it has at least one
//!   attachment, every attachment is alive and of a suitable format, and all
//!   attachments agree in size and sample count.
//! - **Fault injection**: framebuffers can be forced incomplete by label and
//!   programs can be made unavailable by name, which is how the degraded
//!   paths of the pipeline are exercised.
//!
//! The scene viewer renders through this device as well; statistics from
//! the frame log are what it reports.

use std::collections::{HashMap, HashSet};

use log::{debug, trace};
use slotmap::{Key, SlotMap};

use super::device::{
    AttachmentPoint, BlendMode, BufferBits, CompareFunc, DeviceResult, FramebufferId, FramebufferStatus,
    GraphicsDevice, MeshId, PolygonMode, ProgramId, RenderbufferId, StencilState, TextureDesc, TextureFormat,
    TextureId, UniformLocation, UniformValue,
};
use super::RenderError;

/// Something a framebuffer attachment slot can hold
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Attachment {
    Texture(TextureId),
    Renderbuffer(RenderbufferId),
}

#[derive(Debug, Default)]
struct FramebufferState {
    label: String,
    attachments: HashMap<AttachmentPoint, Attachment>,
}

#[derive(Debug, Default)]
struct ProgramState {
    name: String,
    locations: HashMap<String, UniformLocation>,
    values: HashMap<UniformLocation, UniformValue>,
}

#[derive(Debug, Clone, Copy)]
struct MeshState {
    vertex_count: usize,
    index_count: usize,
}

/// What a recorded draw call rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawKind {
    /// An uploaded mesh
    Mesh(MeshId),
    /// The full-screen quad
    FullscreenQuad,
}

/// One draw call and the state it was issued under
#[derive(Debug, Clone, PartialEq)]
pub struct DrawRecord {
    /// Bound framebuffer, `None` for the default one
    pub framebuffer: Option<FramebufferId>,
    /// Label of the bound framebuffer
    pub framebuffer_label: String,
    /// Texture on the colour attachment at draw time
    pub color_target: Option<TextureId>,
    /// Name of the current program
    pub program: Option<String>,
    /// Blend mode
    pub blend: Option<BlendMode>,
    /// Stencil state
    pub stencil: Option<StencilState>,
    /// Depth test function
    pub depth_test: Option<CompareFunc>,
    /// Back-face culling
    pub cull_back: bool,
    /// Fill mode
    pub polygon_mode: PolygonMode,
    /// Geometry
    pub kind: DrawKind,
    /// Uniform values of the current program, by name
    pub uniforms: HashMap<String, UniformValue>,
}

impl DrawRecord {
    /// Value a uniform held when this draw was issued
    pub fn uniform(&self, name: &str) -> Option<UniformValue> {
        self.uniforms.get(name).copied()
    }
}

/// One clear call
#[derive(Debug, Clone, PartialEq)]
pub struct ClearRecord {
    /// Label of the bound framebuffer
    pub framebuffer_label: String,
    /// Clear colour in effect
    pub color: [f32; 4],
    /// Cleared buffers
    pub buffers: BufferBits,
}

/// One blit call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlitRecord {
    /// Source framebuffer
    pub source: FramebufferId,
    /// Destination framebuffer, `None` for the default one
    pub destination: Option<FramebufferId>,
    /// Copied buffers
    pub buffers: BufferBits,
}

/// Recording, CPU-only graphics device
#[derive(Debug, Default)]
pub struct HeadlessDevice {
    textures: SlotMap<TextureId, TextureDesc>,
    renderbuffers: SlotMap<RenderbufferId, TextureDesc>,
    framebuffers: SlotMap<FramebufferId, FramebufferState>,
    programs: SlotMap<ProgramId, ProgramState>,
    program_names: HashMap<String, ProgramId>,
    meshes: SlotMap<MeshId, MeshState>,

    bound_framebuffer: Option<FramebufferId>,
    viewport: (u32, u32),
    clear_color: [f32; 4],
    depth_test: Option<CompareFunc>,
    cull_back: bool,
    polygon_mode: PolygonMode,
    stencil: Option<StencilState>,
    blend: Option<BlendMode>,
    current_program: Option<ProgramId>,
    texture_units: HashMap<u32, TextureId>,

    draws: Vec<DrawRecord>,
    clears: Vec<ClearRecord>,
    blits: Vec<BlitRecord>,
    location_lookups: usize,
    program_switches: usize,

    failing_framebuffers: HashSet<String>,
    missing_programs: HashSet<String>,
}

impl HeadlessDevice {
    /// Fresh device with an empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Report every framebuffer labelled `label` as incomplete
    pub fn fail_framebuffer(&mut self, label: &str) {
        self.failing_framebuffers.insert(label.to_string());
    }

    /// Make `program` lookups for `name` fail
    pub fn remove_program(&mut self, name: &str) {
        self.missing_programs.insert(name.to_string());
    }

    /// Forget recorded draws, clears and blits
    pub fn clear_log(&mut self) {
        self.draws.clear();
        self.clears.clear();
        self.blits.clear();
        self.program_switches = 0;
    }

    /// `use_program` calls on a valid program since the last
    /// [`clear_log`](Self::clear_log)
    pub const fn program_switches(&self) -> usize {
        self.program_switches
    }

    /// Recorded draws since the last [`clear_log`](Self::clear_log)
    pub fn draws(&self) -> &[DrawRecord] {
        &self.draws
    }

    /// Recorded draws into framebuffers labelled `label`
    pub fn draws_into<'a>(&'a self, label: &'a str) -> impl Iterator<Item = &'a DrawRecord> + 'a {
        self.draws.iter().filter(move |d| d.framebuffer_label == label)
    }

    /// Recorded clears
    pub fn clears(&self) -> &[ClearRecord] {
        &self.clears
    }

    /// Recorded blits
    pub fn blits(&self) -> &[BlitRecord] {
        &self.blits
    }

    /// How many uniform names were resolved so far
    pub const fn location_lookups(&self) -> usize {
        self.location_lookups
    }

    /// Live texture count
    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    /// Live renderbuffer count
    pub fn renderbuffer_count(&self) -> usize {
        self.renderbuffers.len()
    }

    /// Live framebuffer count
    pub fn framebuffer_count(&self) -> usize {
        self.framebuffers.len()
    }

    /// Live mesh count
    pub fn mesh_count(&self) -> usize {
        self.meshes.len()
    }

    /// Whether a texture handle is live
    pub fn is_texture_alive(&self, texture: TextureId) -> bool {
        self.textures.contains_key(texture)
    }

    /// Label of a framebuffer
    pub fn framebuffer_label(&self, framebuffer: FramebufferId) -> Option<&str> {
        self.framebuffers.get(framebuffer).map(|f| f.label.as_str())
    }

    /// Texture currently attached at `point`
    pub fn attached_texture(&self, framebuffer: FramebufferId, point: AttachmentPoint) -> Option<TextureId> {
        match self.framebuffers.get(framebuffer)?.attachments.get(&point)? {
            Attachment::Texture(t) => Some(*t),
            Attachment::Renderbuffer(_) => None,
        }
    }

    /// Last value uploaded to `uniform` of program `program`
    pub fn uniform(&self, program: &str, uniform: &str) -> Option<UniformValue> {
        let state = self.programs.get(*self.program_names.get(program)?)?;
        let location = state.locations.get(uniform)?;
        state.values.get(location).copied()
    }

    /// Texture bound to a sampler unit
    pub fn bound_texture(&self, unit: u32) -> Option<TextureId> {
        self.texture_units.get(&unit).copied()
    }

    /// Current viewport size
    pub const fn viewport(&self) -> (u32, u32) {
        self.viewport
    }

    fn attachment_desc(&self, attachment: Attachment) -> Option<TextureDesc> {
        match attachment {
            Attachment::Texture(t) => self.textures.get(t).copied(),
            Attachment::Renderbuffer(r) => self.renderbuffers.get(r).copied(),
        }
    }

    fn color_target(&self) -> Option<TextureId> {
        let fb = self.framebuffers.get(self.bound_framebuffer?)?;
        match fb.attachments.get(&AttachmentPoint::Color0)? {
            Attachment::Texture(t) => Some(*t),
            Attachment::Renderbuffer(_) => None,
        }
    }

    fn bound_label(&self) -> String {
        self.bound_framebuffer
            .and_then(|fb| self.framebuffers.get(fb))
            .map_or_else(|| "default".to_string(), |f| f.label.clone())
    }

    fn record_draw(&mut self, kind: DrawKind) {
        let state = self.current_program.and_then(|p| self.programs.get(p));
        let program = state.map(|p| p.name.clone());
        let uniforms = state
            .map(|p| {
                p.locations
                    .iter()
                    .filter_map(|(name, location)| Some((name.clone(), *p.values.get(location)?)))
                    .collect()
            })
            .unwrap_or_default();
        self.draws.push(DrawRecord {
            framebuffer: self.bound_framebuffer,
            framebuffer_label: self.bound_label(),
            color_target: self.color_target(),
            program,
            blend: self.blend,
            stencil: self.stencil,
            depth_test: self.depth_test,
            cull_back: self.cull_back,
            polygon_mode: self.polygon_mode,
            kind,
            uniforms,
        });
    }
}

impl GraphicsDevice for HeadlessDevice {
    fn create_texture(&mut self, desc: &TextureDesc, data: Option<&[f32]>) -> DeviceResult<TextureId> {
        if desc.width == 0 || desc.height == 0 || desc.samples == 0 {
            return Err(RenderError::ResourceCreationFailed(format!(
                "texture {}x{} with {} samples",
                desc.width, desc.height, desc.samples
            )));
        }
        if let Some(components) = data {
            if components.len() != desc.component_count() {
                return Err(RenderError::ResourceCreationFailed(format!(
                    "texture data has {} components, expected {}",
                    components.len(),
                    desc.component_count()
                )));
            }
        }
        Ok(self.textures.insert(*desc))
    }

    fn destroy_texture(&mut self, texture: TextureId) {
        self.textures.remove(texture);
    }

    fn texture_desc(&self, texture: TextureId) -> Option<TextureDesc> {
        self.textures.get(texture).copied()
    }

    fn create_renderbuffer(&mut self, desc: &TextureDesc) -> DeviceResult<RenderbufferId> {
        if desc.width == 0 || desc.height == 0 || desc.samples == 0 {
            return Err(RenderError::ResourceCreationFailed(format!(
                "renderbuffer {}x{} with {} samples",
                desc.width, desc.height, desc.samples
            )));
        }
        Ok(self.renderbuffers.insert(*desc))
    }

    fn destroy_renderbuffer(&mut self, renderbuffer: RenderbufferId) {
        self.renderbuffers.remove(renderbuffer);
    }

    fn create_framebuffer(&mut self, label: &str) -> DeviceResult<FramebufferId> {
        Ok(self.framebuffers.insert(FramebufferState {
            label: label.to_string(),
            attachments: HashMap::new(),
        }))
    }

    fn attach_texture(&mut self, framebuffer: FramebufferId, point: AttachmentPoint, texture: TextureId) {
        if let Some(fb) = self.framebuffers.get_mut(framebuffer) {
            if texture.is_null() {
                fb.attachments.remove(&point);
            } else {
                fb.attachments.insert(point, Attachment::Texture(texture));
            }
        }
    }

    fn attach_renderbuffer(&mut self, framebuffer: FramebufferId, point: AttachmentPoint, renderbuffer: RenderbufferId) {
        if let Some(fb) = self.framebuffers.get_mut(framebuffer) {
            fb.attachments.insert(point, Attachment::Renderbuffer(renderbuffer));
        }
    }

    fn framebuffer_status(&self, framebuffer: FramebufferId) -> FramebufferStatus {
        let Some(fb) = self.framebuffers.get(framebuffer) else {
            return FramebufferStatus::Unknown;
        };
        if self.failing_framebuffers.contains(&fb.label) {
            return FramebufferStatus::InvalidAttachment;
        }
        if fb.attachments.is_empty() {
            return FramebufferStatus::MissingAttachment;
        }

        let mut first: Option<TextureDesc> = None;
        for (point, attachment) in &fb.attachments {
            let Some(desc) = self.attachment_desc(*attachment) else {
                return FramebufferStatus::InvalidAttachment;
            };
            let format_ok = match point {
                AttachmentPoint::Color0 => !desc.format.is_depth(),
                AttachmentPoint::Depth => desc.format.is_depth(),
                AttachmentPoint::DepthStencil => desc.format == TextureFormat::Depth24Stencil8,
            };
            if !format_ok {
                return FramebufferStatus::InvalidAttachment;
            }
            if let Some(reference) = first {
                if (reference.width, reference.height) != (desc.width, desc.height) {
                    return FramebufferStatus::SizeMismatch;
                }
                if reference.samples != desc.samples {
                    return FramebufferStatus::SampleMismatch;
                }
            } else {
                first = Some(desc);
            }
        }
        FramebufferStatus::Complete
    }

    fn destroy_framebuffer(&mut self, framebuffer: FramebufferId) {
        if self.bound_framebuffer == Some(framebuffer) {
            self.bound_framebuffer = None;
        }
        self.framebuffers.remove(framebuffer);
    }

    fn bind_framebuffer(&mut self, framebuffer: Option<FramebufferId>) {
        self.bound_framebuffer = framebuffer.filter(|fb| self.framebuffers.contains_key(*fb));
    }

    fn set_viewport(&mut self, width: u32, height: u32) {
        self.viewport = (width, height);
    }

    fn set_clear_color(&mut self, color: [f32; 4]) {
        self.clear_color = color;
    }

    fn clear(&mut self, buffers: BufferBits) {
        self.clears.push(ClearRecord {
            framebuffer_label: self.bound_label(),
            color: self.clear_color,
            buffers,
        });
    }

    fn set_depth_test(&mut self, func: Option<CompareFunc>) {
        self.depth_test = func;
    }

    fn set_cull_back(&mut self, enabled: bool) {
        self.cull_back = enabled;
    }

    fn set_polygon_mode(&mut self, mode: PolygonMode) {
        self.polygon_mode = mode;
    }

    fn set_stencil(&mut self, state: Option<StencilState>) {
        self.stencil = state;
    }

    fn set_blend(&mut self, mode: Option<BlendMode>) {
        self.blend = mode;
    }

    fn bind_texture(&mut self, unit: u32, texture: TextureId) {
        self.texture_units.insert(unit, texture);
    }

    fn program(&mut self, name: &str) -> DeviceResult<ProgramId> {
        if self.missing_programs.contains(name) {
            return Err(RenderError::ProgramUnavailable(name.to_string()));
        }
        if let Some(id) = self.program_names.get(name) {
            return Ok(*id);
        }
        let id = self.programs.insert(ProgramState {
            name: name.to_string(),
            ..ProgramState::default()
        });
        debug!("Linked program '{name}'");
        self.program_names.insert(name.to_string(), id);
        Ok(id)
    }

    fn use_program(&mut self, program: ProgramId) {
        self.current_program = self.programs.contains_key(program).then_some(program);
        if self.current_program.is_some() {
            self.program_switches += 1;
        }
    }

    fn uniform_location(&mut self, program: ProgramId, name: &str) -> Option<UniformLocation> {
        self.location_lookups += 1;
        let state = self.programs.get_mut(program)?;
        let next = i32::try_from(state.locations.len()).ok()?;
        Some(*state.locations.entry(name.to_string()).or_insert(UniformLocation(next)))
    }

    fn set_uniform(&mut self, program: ProgramId, location: UniformLocation, value: UniformValue) {
        if let Some(state) = self.programs.get_mut(program) {
            state.values.insert(location, value);
        }
    }

    fn upload_mesh(&mut self, vertices: &[u8], stride: usize, indices: &[u32]) -> DeviceResult<MeshId> {
        if stride == 0 || vertices.len() % stride != 0 {
            return Err(RenderError::ResourceCreationFailed(format!(
                "{} vertex bytes do not divide into stride {stride}",
                vertices.len()
            )));
        }
        let vertex_count = vertices.len() / stride;
        if let Some(bad) = indices.iter().find(|i| **i as usize >= vertex_count) {
            return Err(RenderError::ResourceCreationFailed(format!(
                "index {bad} out of range for {vertex_count} vertices"
            )));
        }
        Ok(self.meshes.insert(MeshState {
            vertex_count,
            index_count: indices.len(),
        }))
    }

    fn destroy_mesh(&mut self, mesh: MeshId) {
        self.meshes.remove(mesh);
    }

    fn draw_mesh(&mut self, mesh: MeshId) {
        let Some(state) = self.meshes.get(mesh).copied() else {
            return;
        };
        trace!(
            "draw mesh {mesh:?}: {} vertices, {} indices",
            state.vertex_count,
            state.index_count
        );
        self.record_draw(DrawKind::Mesh(mesh));
    }

    fn draw_fullscreen_quad(&mut self) {
        self.record_draw(DrawKind::FullscreenQuad);
    }

    fn blit(
        &mut self,
        source: FramebufferId,
        destination: Option<FramebufferId>,
        _width: u32,
        _height: u32,
        buffers: BufferBits,
    ) {
        if !self.framebuffers.contains_key(source) {
            return;
        }
        self.blits.push(BlitRecord {
            source,
            destination,
            buffers,
        });
    }
}
