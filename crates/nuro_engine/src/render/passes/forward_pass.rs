//! # Forward Pass
//!
//! Lit rendering of the whole render queue into a multisampled HDR target,
//! resolved into a single-sample texture at the end of the pass.
//!
//! ## State Changes
//!
//! The queue is sorted by `(shader, material)`, so the pass only binds a
//! shader when the shader id changes and only binds a material when the
//! material id changes. [`ForwardPassStats`] reports how many binds that
//! took.
//!
//! ## Selection Outline
//!
//! A selected entity is left out of the queue walk and drawn last, twice:
//!
//! 1. normally, writing 1 into the stencil buffer
//! 2. scaled outward with the unlit outline material, only where the
//!    stencil is not 1, alpha blended
//!
//! Its scale is restored and its matrices re-evaluated afterwards.

use std::rc::Rc;

use log::{debug, trace};
use slotmap::Key;

use super::graph::{Attachment, PassDescriptor, PassKind};
use super::RenderPass;
use crate::core::config::OutlineConfig;
use crate::ecs::components::{MeshRendererComponent, TransformComponent};
use crate::ecs::{Entity, World};
use crate::foundation::math::{Vec3, Vec4};
use crate::render::context::FrameContext;
use crate::render::device::{
    BlendMode, BufferBits, CompareFunc, Filter, GraphicsDevice, PolygonMode, StencilState, TextureFormat, TextureId,
    Wrap,
};
use crate::render::framebuffer::RenderTarget;
use crate::render::material::{Material, MaterialId, UnlitMaterial};
use crate::render::mesh::Mesh;
use crate::render::render_queue::RenderQueue;
use crate::render::shader::{ShaderId, ShaderLibrary};
use crate::render::transformation;
use crate::render::viewport::Viewport;

/// Label of the multisampled target
pub const MSAA_LABEL: &str = "forward msaa";
/// Label of the resolved output target
pub const OUTPUT_LABEL: &str = "forward output";

/// Bind and draw counts of one forward pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ForwardPassStats {
    /// Queue entries drawn, the selected entity included
    pub draws: usize,
    /// Program switches, the selection outline included
    pub shader_binds: usize,
    /// Material uniform uploads, the selection outline included
    pub material_binds: usize,
    /// Queue entries without mesh or material
    pub skipped_unbound: usize,
    /// Whether the selection outline was drawn
    pub outline_drawn: bool,
}

/// Lit forward pass with MSAA resolve and selection outline
#[derive(Debug)]
pub struct ForwardPass {
    viewport: Viewport,
    samples: u32,
    outline: OutlineConfig,
    wireframe: bool,
    msaa: Option<RenderTarget>,
    output: Option<RenderTarget>,
    outline_material: Option<UnlitMaterial>,
    stats: ForwardPassStats,
}

impl ForwardPass {
    /// Pass sized to `viewport` with `samples` MSAA samples
    pub fn new(viewport: Viewport, samples: u32, outline: OutlineConfig) -> Self {
        Self {
            viewport,
            samples: samples.max(1),
            outline,
            wireframe: false,
            msaa: None,
            output: None,
            outline_material: None,
            stats: ForwardPassStats::default(),
        }
    }

    /// MSAA sample count used on the next `create`
    pub const fn samples(&self) -> u32 {
        self.samples
    }

    /// Change the sample count; takes effect on the next `create`
    pub fn set_samples(&mut self, samples: u32) {
        self.samples = samples.max(1);
    }

    /// Render lines instead of filled triangles
    pub fn set_wireframe(&mut self, wireframe: bool) {
        self.wireframe = wireframe;
    }

    /// Whether wireframe mode is on
    pub const fn wireframe(&self) -> bool {
        self.wireframe
    }

    /// Whether both the MSAA and the resolve target are usable
    pub fn is_complete(&self) -> bool {
        let complete = |t: &Option<RenderTarget>| t.as_ref().is_some_and(RenderTarget::is_complete);
        complete(&self.msaa) && complete(&self.output)
    }

    /// Counts from the last `render`
    pub const fn stats(&self) -> ForwardPassStats {
        self.stats
    }

    /// Render the queue and return the resolved HDR colour
    pub fn render(
        &mut self,
        device: &mut dyn GraphicsDevice,
        world: &mut World,
        queue: &RenderQueue,
        context: &FrameContext<'_>,
        selected: Option<Entity>,
    ) -> TextureId {
        self.stats = ForwardPassStats::default();
        let Some(msaa) = &self.msaa else {
            return TextureId::null();
        };

        msaa.bind(device);
        if self.wireframe {
            device.set_clear_color([1.0, 1.0, 1.0, 1.0]);
        } else {
            device.set_clear_color([0.0, 0.0, 0.0, 1.0]);
        }
        device.clear(BufferBits::COLOR | BufferBits::DEPTH | BufferBits::STENCIL);
        device.set_cull_back(true);
        device.set_depth_test(Some(CompareFunc::Less));
        device.set_stencil(Some(StencilState::test(CompareFunc::Always, 0)));
        device.set_blend(None);
        if self.wireframe {
            device.set_polygon_mode(PolygonMode::Line);
            device.set_cull_back(false);
        }

        let mut stats = ForwardPassStats::default();
        let mut current_shader: Option<ShaderId> = None;
        let mut current_material: Option<MaterialId> = None;
        for item in queue.iter(world) {
            let Some((mesh, material)) = item.bound() else {
                stats.skipped_unbound += 1;
                continue;
            };
            if Some(item.entity) == selected {
                continue;
            }

            let shader_id = material.shader_id();
            if current_shader != Some(shader_id) {
                material.shader().bind(device);
                current_shader = Some(shader_id);
                stats.shader_binds += 1;
            }
            let material_id = material.id();
            if current_material != Some(material_id) {
                material.bind(device, context);
                current_material = Some(material_id);
                stats.material_binds += 1;
            }

            draw_mesh(device, material.as_ref(), item.transform, mesh);
            stats.draws += 1;
        }

        if let Some(entity) = selected {
            if self.render_selected(device, world, context, entity, &mut stats) {
                stats.draws += 1;
                stats.outline_drawn = true;
            }
        }

        if self.wireframe {
            device.set_polygon_mode(PolygonMode::Fill);
        }
        device.set_cull_back(false);
        device.set_stencil(None);

        if let Some(output) = &self.output {
            device.blit(
                msaa.framebuffer(),
                Some(output.framebuffer()),
                self.viewport.width,
                self.viewport.height,
                BufferBits::COLOR,
            );
        }
        trace!(
            "Forward pass: {} draws, {} shader binds, {} material binds",
            stats.draws,
            stats.shader_binds,
            stats.material_binds
        );
        self.stats = stats;

        if msaa.is_complete() {
            self.output.as_ref().map_or_else(TextureId::default, RenderTarget::color)
        } else {
            TextureId::default()
        }
    }

    fn render_selected(
        &self,
        device: &mut dyn GraphicsDevice,
        world: &mut World,
        context: &FrameContext<'_>,
        entity: Entity,
        stats: &mut ForwardPassStats,
    ) -> bool {
        let Some(outline) = &self.outline_material else {
            return false;
        };
        let Some((mesh, material)) = world
            .get_component::<MeshRendererComponent>(entity)
            .and_then(|r| Some((r.mesh.clone()?, r.material.clone()?)))
        else {
            trace!("Selected entity {entity:?} has nothing to draw");
            return false;
        };
        let view_projection = context.camera.view_projection;
        if !transformation::evaluate(world, entity, &view_projection) {
            return false;
        }

        device.set_stencil(Some(StencilState::write(1)));
        bind_material(device, material.as_ref(), context, stats);
        if let Some(transform) = world.get_component::<TransformComponent>(entity) {
            draw_mesh(device, material.as_ref(), transform, &mesh);
        }

        device.set_stencil(Some(StencilState::test(CompareFunc::NotEqual, 1)));
        device.set_depth_test(Some(CompareFunc::LessEqual));
        device.set_blend(Some(BlendMode::Alpha));

        let increase = Vec3::repeat(self.outline.scale_increase);
        if let Some(transform) = world.get_component_mut::<TransformComponent>(entity) {
            transform.scale += increase;
        }
        transformation::evaluate(world, entity, &view_projection);
        bind_material(device, outline, context, stats);
        if let Some(transform) = world.get_component::<TransformComponent>(entity) {
            draw_mesh(device, outline, transform, &mesh);
        }

        if let Some(transform) = world.get_component_mut::<TransformComponent>(entity) {
            transform.scale -= increase;
        }
        transformation::evaluate(world, entity, &view_projection);

        device.set_blend(None);
        device.set_depth_test(Some(CompareFunc::Less));
        device.set_stencil(Some(StencilState::test(CompareFunc::Always, 0)));
        true
    }
}

fn bind_material(
    device: &mut dyn GraphicsDevice,
    material: &dyn Material,
    context: &FrameContext<'_>,
    stats: &mut ForwardPassStats,
) {
    material.shader().bind(device);
    material.bind(device, context);
    stats.shader_binds += 1;
    stats.material_binds += 1;
}

fn draw_mesh(device: &mut dyn GraphicsDevice, material: &dyn Material, transform: &TransformComponent, mesh: &Mesh) {
    let shader = material.shader();
    shader.set_mat4(device, "mvpMatrix", transform.mvp);
    shader.set_mat4(device, "modelMatrix", transform.model);
    shader.set_mat3(device, "normalMatrix", transformation::normal(&transform.model));
    mesh.draw(device);
}

impl RenderPass for ForwardPass {
    fn descriptor(&self) -> PassDescriptor {
        PassDescriptor::new(PassKind::Forward)
            .reads(&[Attachment::Depth])
            .optionally_reads(&[Attachment::Ssao])
            .writes(&[Attachment::Hdr])
    }

    fn create(&mut self, device: &mut dyn GraphicsDevice, shaders: &mut ShaderLibrary) {
        if self.msaa.is_some() {
            return;
        }
        self.msaa = Some(
            RenderTarget::builder(MSAA_LABEL, self.viewport)
                .with_color(TextureFormat::Rgba16F, Filter::Nearest, Wrap::ClampToEdge)
                .with_samples(self.samples)
                .with_depth_stencil(self.samples)
                .build(device),
        );
        self.output = Some(
            RenderTarget::builder(OUTPUT_LABEL, self.viewport)
                .with_color(TextureFormat::Rgba16F, Filter::Nearest, Wrap::ClampToEdge)
                .build(device),
        );
        self.outline_material =
            Some(UnlitMaterial::new(shaders.get(device, "unlit")).with_color(Vec4::from(self.outline.color)));
        debug!(
            "Forward pass created at {}x{} with {}x MSAA",
            self.viewport.width, self.viewport.height, self.samples
        );
    }

    fn destroy(&mut self, device: &mut dyn GraphicsDevice) {
        if let Some(mut target) = self.msaa.take() {
            target.destroy(device);
        }
        if let Some(mut target) = self.output.take() {
            target.destroy(device);
        }
        self.outline_material = None;
    }

    fn is_created(&self) -> bool {
        self.msaa.is_some()
    }
}
