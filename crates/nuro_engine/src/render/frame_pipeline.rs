//! # Frame Pipeline
//!
//! Owns every pass of a view and runs one frame through them:
//!
//! ```text
//! pre-pass -> SSAO (profile-gated) -> velocity buffer -> forward -> post-processing
//! ```
//!
//! The order is not hard-coded in `render`: the pipeline is built from an
//! ordered list of pass descriptors that [`FrameGraph`] validates up front,
//! and `render` dispatches in graph order.
//!
//! ## Per-Frame Steps
//!
//! 1. Pick the camera: the fly camera override, else the first enabled
//!    scene camera, else a default fly camera (with a one-time warning).
//! 2. Pick the profile: the neutral default unless profile effects are on
//!    and wireframe is off.
//! 3. Rebuild the render queue and gather lights once.
//! 4. Run the passes, threading attachment ids from producers to
//!    consumers through [`FrameOutputs`].
//!
//! ## Lifecycle
//!
//! `create`, `destroy` and `resize` are idempotent. A viewport change
//! rebuilds every pass; an MSAA change rebuilds only the forward pass.

use log::{debug, info, warn};
use slotmap::Key;

use super::camera::{self, CameraView, FlyCamera};
use super::context::{FrameContext, ShadowInputs};
use super::device::{GraphicsDevice, TextureId};
use super::lighting::LightSet;
use super::passes::{
    Attachment, ForwardPass, ForwardPassStats, FrameGraph, PassDescriptor, PassKind, PipelineError, PrePass,
    RenderPass, SsaoPass, VelocityBuffer,
};
use super::postprocessing::{PostInputs, PostProcessingPipeline, Profile};
use super::render_queue::RenderQueue;
use super::shader::ShaderLibrary;
use super::viewport::Viewport;
use crate::core::config::RenderConfig;
use crate::ecs::{Entity, World};

/// Default pass order
pub const DEFAULT_ORDER: [PassKind; 5] = [
    PassKind::PrePass,
    PassKind::Ssao,
    PassKind::Velocity,
    PassKind::Forward,
    PassKind::PostProcessing,
];

/// Every attachment a frame produced, null where a pass did not run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameOutputs {
    /// Pre-pass depth
    pub depth: TextureId,
    /// Pre-pass view-space normals
    pub normal: TextureId,
    /// Ambient occlusion, null when disabled by the profile
    pub ssao: TextureId,
    /// Motion vectors
    pub velocity: TextureId,
    /// Resolved forward pass colour
    pub hdr: TextureId,
    /// Bloom mip 0, null when bloom is off
    pub bloom: TextureId,
    /// Final image
    pub output: TextureId,
    /// Forward pass counts
    pub stats: ForwardPassStats,
}

/// All passes of one view
#[derive(Debug)]
pub struct FramePipeline {
    config: RenderConfig,
    viewport: Viewport,
    graph: FrameGraph,
    shaders: ShaderLibrary,
    queue: RenderQueue,

    pre_pass: PrePass,
    ssao: SsaoPass,
    velocity: VelocityBuffer,
    forward: ForwardPass,
    post: PostProcessingPipeline,

    default_profile: Profile,
    profile: Profile,
    use_profile_effects: bool,
    fly_camera: Option<FlyCamera>,
    shadows: Option<ShadowInputs>,
    lens_dirt: TextureId,
    created: bool,
    warned_no_camera: bool,
    last_outputs: FrameOutputs,
}

impl FramePipeline {
    /// Pipeline with the default pass order
    pub fn new(config: &RenderConfig) -> Result<Self, PipelineError> {
        Self::with_order(config, &DEFAULT_ORDER)
    }

    /// Pipeline running its passes in `order`
    ///
    /// Fails if a pass would read an attachment before it is produced.
    pub fn with_order(config: &RenderConfig, order: &[PassKind]) -> Result<Self, PipelineError> {
        let viewport = Viewport::new(config.width, config.height);
        let mut pipeline = Self {
            config: config.clone(),
            viewport,
            graph: FrameGraph::build(Vec::new())?,
            shaders: ShaderLibrary::new(),
            queue: RenderQueue::new(config.unbound_policy),
            pre_pass: PrePass::new(viewport),
            ssao: SsaoPass::new(viewport, config.ssao.clone()),
            velocity: VelocityBuffer::new(viewport),
            forward: ForwardPass::new(viewport, config.msaa_samples, config.outline.clone()),
            post: PostProcessingPipeline::new(viewport, config.bloom_mip_depth, config.present_to_screen),
            default_profile: Profile::neutral(),
            profile: Profile::default(),
            use_profile_effects: false,
            fly_camera: None,
            shadows: None,
            lens_dirt: TextureId::null(),
            created: false,
            warned_no_camera: false,
            last_outputs: FrameOutputs::default(),
        };
        let descriptors = order.iter().map(|kind| pipeline.descriptor(*kind)).collect();
        pipeline.graph = FrameGraph::build(descriptors)?;
        debug!("Frame graph: {:?}", pipeline.graph.order().collect::<Vec<_>>());
        Ok(pipeline)
    }

    fn descriptor(&self, kind: PassKind) -> PassDescriptor {
        match kind {
            PassKind::PrePass => self.pre_pass.descriptor(),
            PassKind::Ssao => self.ssao.descriptor(),
            PassKind::Velocity => self.velocity.descriptor(),
            PassKind::Forward => self.forward.descriptor(),
            PassKind::PostProcessing => PassDescriptor::new(PassKind::PostProcessing)
                .reads(&[Attachment::Hdr])
                .optionally_reads(&[Attachment::Depth, Attachment::Velocity])
                .writes(&[Attachment::Bloom, Attachment::Output]),
        }
    }

    /// Allocate every pass
    pub fn create(&mut self, device: &mut dyn GraphicsDevice) {
        if self.created {
            return;
        }
        self.pre_pass.create(device, &mut self.shaders);
        self.forward.create(device, &mut self.shaders);
        self.ssao.create(device, &mut self.shaders);
        self.velocity.create(device, &mut self.shaders);
        self.post.create(device, &mut self.shaders);
        self.post.set_lens_dirt(self.lens_dirt);
        self.created = true;
        info!(
            "Frame pipeline created at {}x{} ({}x MSAA)",
            self.viewport.width,
            self.viewport.height,
            self.forward.samples()
        );
    }

    /// Release every pass
    pub fn destroy(&mut self, device: &mut dyn GraphicsDevice) {
        self.pre_pass.destroy(device);
        self.forward.destroy(device);
        self.ssao.destroy(device);
        self.velocity.destroy(device);
        self.post.destroy(device);
        self.created = false;
        self.last_outputs = FrameOutputs::default();
    }

    /// Whether the passes are allocated
    pub const fn is_created(&self) -> bool {
        self.created
    }

    /// Whether the forward pass, which every later pass depends on, has
    /// usable targets
    pub fn core_targets_complete(&self) -> bool {
        self.created && self.forward.is_complete()
    }

    /// Rebuild every pass for a new viewport size
    pub fn resize(&mut self, device: &mut dyn GraphicsDevice, viewport: Viewport) {
        if !viewport.is_valid() {
            warn!("Ignoring resize to {}x{}", viewport.width, viewport.height);
            return;
        }
        let was_created = self.created;
        self.destroy(device);

        let wireframe = self.forward.wireframe();
        let samples = self.forward.samples();
        self.viewport = viewport;
        self.config.width = viewport.width;
        self.config.height = viewport.height;
        self.pre_pass = PrePass::new(viewport);
        self.ssao = SsaoPass::new(viewport, self.config.ssao.clone());
        self.velocity = VelocityBuffer::new(viewport);
        self.forward = ForwardPass::new(viewport, samples, self.config.outline.clone());
        self.forward.set_wireframe(wireframe);
        self.post = PostProcessingPipeline::new(viewport, self.config.bloom_mip_depth, self.config.present_to_screen);

        if was_created {
            self.create(device);
        }
        info!("Resized frame pipeline to {}x{}", viewport.width, viewport.height);
    }

    /// Change the MSAA sample count; only the forward pass is rebuilt
    pub fn update_msaa(&mut self, device: &mut dyn GraphicsDevice, samples: u32) {
        self.config.msaa_samples = samples;
        self.forward.destroy(device);
        self.forward.set_samples(samples);
        if self.created {
            self.forward.create(device, &mut self.shaders);
        }
        info!("MSAA set to {samples}x");
    }

    /// User profile, used when profile effects are on
    pub fn set_profile(&mut self, profile: Profile) {
        self.profile = profile;
    }

    /// User profile
    pub const fn profile(&self) -> &Profile {
        &self.profile
    }

    /// Render with the user profile instead of the neutral default
    pub fn use_profile_effects(&mut self, enabled: bool) {
        self.use_profile_effects = enabled;
    }

    /// Render lines; also forces the neutral profile
    pub fn set_wireframe(&mut self, wireframe: bool) {
        self.forward.set_wireframe(wireframe);
    }

    /// Whether wireframe mode is on
    pub const fn wireframe(&self) -> bool {
        self.forward.wireframe()
    }

    /// Profile the next frame will render with
    pub const fn active_profile(&self) -> &Profile {
        if self.use_profile_effects && !self.forward.wireframe() {
            &self.profile
        } else {
            &self.default_profile
        }
    }

    /// Render through `camera` instead of a scene camera
    pub fn set_fly_camera(&mut self, camera: Option<FlyCamera>) {
        self.fly_camera = camera;
    }

    /// Shadow map and disk produced outside the pipeline
    pub fn set_shadow_inputs(&mut self, shadows: Option<ShadowInputs>) {
        self.shadows = shadows;
    }

    /// Lens dirt texture for the bloom composite; not owned
    pub fn set_lens_dirt(&mut self, texture: TextureId) {
        self.lens_dirt = texture;
        self.post.set_lens_dirt(texture);
    }

    /// Current viewport
    pub const fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Current MSAA sample count
    pub const fn msaa_samples(&self) -> u32 {
        self.forward.samples()
    }

    /// Validated pass order
    pub const fn graph(&self) -> &FrameGraph {
        &self.graph
    }

    /// Render queue of the last frame
    pub const fn queue(&self) -> &RenderQueue {
        &self.queue
    }

    /// Post-processing chain
    pub const fn post(&self) -> &PostProcessingPipeline {
        &self.post
    }

    /// Shader pool shared by every pass
    pub fn shaders(&mut self) -> &mut ShaderLibrary {
        &mut self.shaders
    }

    /// Outputs of the last frame
    pub const fn last_outputs(&self) -> FrameOutputs {
        self.last_outputs
    }

    /// Render one frame of `world`
    ///
    /// `selected` is drawn with an outline. Never fails: problems are
    /// logged and show up as null attachments.
    pub fn render(
        &mut self,
        device: &mut dyn GraphicsDevice,
        world: &mut World,
        selected: Option<Entity>,
    ) -> FrameOutputs {
        if !self.created {
            warn!("Frame pipeline rendered before create");
            return FrameOutputs::default();
        }

        let viewport = self.viewport;
        let camera = self.select_camera(world);
        let profile = *self.active_profile();
        let selected = selected.filter(|e| world.is_alive(*e));

        self.queue.build(world);
        let lights = LightSet::gather(world);

        let mut outputs = FrameOutputs::default();
        let order: Vec<PassKind> = self.graph.order().collect();
        for kind in order {
            match kind {
                PassKind::PrePass => {
                    let out = self.pre_pass.render(device, world, &self.queue, &camera);
                    outputs.depth = out.depth;
                    outputs.normal = out.normal;
                }
                PassKind::Ssao => {
                    if profile.ambient_occlusion.enabled {
                        outputs.ssao = self.ssao.render(
                            device,
                            outputs.depth,
                            outputs.normal,
                            &camera,
                            &profile.ambient_occlusion,
                        );
                    }
                }
                PassKind::Velocity => {
                    outputs.velocity = self.velocity.render(device, world, &self.queue, &camera);
                }
                PassKind::Forward => {
                    let context = FrameContext {
                        viewport,
                        camera: &camera,
                        profile: &profile,
                        ssao_input: outputs.ssao,
                        lights: &lights,
                        shadows: self.shadows.as_ref(),
                    };
                    outputs.hdr = self.forward.render(device, world, &self.queue, &context, selected);
                    outputs.stats = self.forward.stats();
                }
                PassKind::PostProcessing => {
                    let post = self.post.render(
                        device,
                        PostInputs {
                            hdr: outputs.hdr,
                            depth: outputs.depth,
                            velocity: outputs.velocity,
                        },
                        &camera,
                        &profile,
                    );
                    outputs.bloom = post.bloom;
                    outputs.output = post.output;
                }
            }
        }

        self.last_outputs = outputs;
        outputs
    }

    fn select_camera(&mut self, world: &World) -> CameraView {
        if let Some(view) = camera::select(world, self.fly_camera.as_ref(), &self.viewport) {
            return view;
        }
        if !self.warned_no_camera {
            warn!("No enabled camera in the scene, rendering through a default fly camera");
            self.warned_no_camera = true;
        }
        CameraView::from_fly(&FlyCamera::default(), &self.viewport)
    }
}
