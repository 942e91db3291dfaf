//! Core engine implementation
//!
//! [`Engine`] owns the scene, the physics bridge, the frame pipeline, the
//! graphics device and the resource manager, and runs one frame as:
//!
//! 1. run a pending loader context task
//! 2. step physics on the fixed timestep and sync transforms
//! 3. render the frame pipeline

use std::time::Instant;

use log::{info, warn};
use thiserror::Error;

use crate::application::Application;
use crate::core::config::{Config, ConfigError, EngineConfig, SUPPORTED_MSAA_SAMPLES};
use crate::ecs::{Entity, World};
use crate::foundation::time::Timer;
use crate::physics::{PhysicsBridge, PhysicsError, PhysicsWorld};
use crate::render::frame_pipeline::{FrameOutputs, FramePipeline};
use crate::render::passes::PipelineError;
use crate::render::{GraphicsDevice, RenderError, Viewport};
use crate::resources::ResourceManager;

/// What one frame did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameReport {
    /// Frame number, starting at 1
    pub frame: u64,
    /// Fixed physics ticks run this frame
    pub physics_steps: u32,
    /// Whether a loader context task ran this frame
    pub context_task_ran: bool,
    /// Attachments and forward pass counts
    pub outputs: FrameOutputs,
}

/// Main engine struct
///
/// The engine coordinates all subsystems and manages the main loop.
pub struct Engine {
    /// ECS world containing all entities and components
    pub world: World,

    /// Fixed-step physics driver
    pub physics: PhysicsBridge,

    /// Frame pipeline
    pipeline: FramePipeline,

    /// Device every pass renders through
    device: Box<dyn GraphicsDevice>,

    /// Resource table and loader
    resources: ResourceManager,

    /// Frame timing
    timer: Timer,

    /// Engine configuration
    config: EngineConfig,

    selection: Option<Entity>,
    fixed_delta: Option<f32>,
    last_report: FrameReport,

    /// Whether the engine should continue running
    running: bool,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("entities", &self.world.entity_count())
            .field("pipeline", &self.pipeline.viewport())
            .field("resources", &self.resources)
            .field("running", &self.running)
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Create a new engine instance
    ///
    /// Fails on an invalid configuration, a physics world that cannot be
    /// driven, an invalid pass order, or a forward pass whose targets are
    /// incomplete.
    pub fn new(
        config: EngineConfig,
        mut device: Box<dyn GraphicsDevice>,
        physics: Box<dyn PhysicsWorld>,
    ) -> Result<Self, EngineError> {
        info!("Initializing engine...");
        config.validate()?;

        let physics = PhysicsBridge::new(physics, &config.physics)?;
        let mut pipeline = FramePipeline::new(&config.render)?;
        pipeline.create(device.as_mut());
        if !pipeline.core_targets_complete() {
            pipeline.destroy(device.as_mut());
            return Err(EngineError::Render(RenderError::InitializationFailed(
                "forward pass targets are incomplete".into(),
            )));
        }
        let resources = ResourceManager::new(&config.loader);

        info!(
            "Engine ready: {}x{}, {}x MSAA",
            config.render.width, config.render.height, config.render.msaa_samples
        );
        Ok(Self {
            world: World::new(),
            physics,
            pipeline,
            device,
            resources,
            timer: Timer::new(),
            config,
            selection: None,
            fixed_delta: None,
            last_report: FrameReport::default(),
            running: true,
        })
    }

    /// Load configuration from a TOML or RON file, then create the engine
    pub fn from_config_file(
        path: &str,
        device: Box<dyn GraphicsDevice>,
        physics: Box<dyn PhysicsWorld>,
    ) -> Result<Self, EngineError> {
        let config = EngineConfig::load_from_file(path)?;
        Self::new(config, device, physics)
    }

    /// Run one frame of `delta` seconds
    pub fn frame(&mut self, delta: f32) -> FrameReport {
        self.timer.advance(delta.max(0.0));
        let context_task_ran = self.resources.update_context();
        let physics_steps = self.physics.step(&mut self.world, delta);
        let outputs = self
            .pipeline
            .render(self.device.as_mut(), &mut self.world, self.selection);

        self.last_report = FrameReport {
            frame: self.timer.frame_count(),
            physics_steps,
            context_task_ran,
            outputs,
        };
        self.last_report
    }

    /// Run the main loop until [`quit`](Self::quit) is called
    ///
    /// Frames advance by the fixed delta if one is set, by wall-clock time
    /// otherwise.
    pub fn run<T: Application>(&mut self, app: &mut T) -> Result<(), EngineError> {
        app.initialize(self)
            .map_err(|e| EngineError::Application(format!("App initialization: {e}")))?;

        info!("Starting main loop...");
        self.running = true;
        let mut last = Instant::now();
        let result = loop {
            if !self.running {
                break Ok(());
            }
            let now = Instant::now();
            let delta = self
                .fixed_delta
                .unwrap_or_else(|| now.duration_since(last).as_secs_f32());
            last = now;

            if let Err(e) = app.update(self, delta) {
                break Err(EngineError::Application(format!("App update: {e}")));
            }
            let report = self.frame(delta);
            if let Err(e) = app.frame_rendered(self, &report) {
                break Err(EngineError::Application(format!("App frame: {e}")));
            }
        };

        app.cleanup(self);
        self.pipeline.destroy(self.device.as_mut());
        info!(
            "Engine shutdown complete after {} frames ({:.1} fps average)",
            self.timer.frame_count(),
            self.timer.average_fps()
        );
        result
    }

    /// Request engine shutdown
    pub fn quit(&mut self) {
        info!("Engine shutdown requested");
        self.running = false;
    }

    /// Whether the main loop keeps going
    pub const fn is_running(&self) -> bool {
        self.running
    }

    /// Advance every frame of [`run`](Self::run) by `delta` instead of
    /// wall-clock time
    pub fn set_fixed_delta(&mut self, delta: Option<f32>) {
        self.fixed_delta = delta.filter(|d| d.is_finite() && *d >= 0.0);
    }

    /// Resize every render target
    pub fn resize(&mut self, width: u32, height: u32) {
        let viewport = Viewport::new(width, height);
        if !viewport.is_valid() {
            warn!("Ignoring resize to {width}x{height}");
            return;
        }
        self.config.render.width = width;
        self.config.render.height = height;
        self.pipeline.resize(self.device.as_mut(), viewport);
    }

    /// Change the forward pass sample count
    pub fn set_msaa_samples(&mut self, samples: u32) -> Result<(), EngineError> {
        if !SUPPORTED_MSAA_SAMPLES.contains(&samples) {
            return Err(ConfigError::Invalid(format!(
                "msaa samples {samples} not in {SUPPORTED_MSAA_SAMPLES:?}"
            ))
            .into());
        }
        self.config.render.msaa_samples = samples;
        self.pipeline.update_msaa(self.device.as_mut(), samples);
        Ok(())
    }

    /// Entity drawn with the selection outline
    pub fn set_selection(&mut self, entity: Option<Entity>) {
        self.selection = entity;
    }

    /// Selected entity
    pub const fn selection(&self) -> Option<Entity> {
        self.selection
    }

    /// Report of the last frame
    pub const fn last_report(&self) -> FrameReport {
        self.last_report
    }

    /// Frame pipeline
    pub const fn pipeline(&self) -> &FramePipeline {
        &self.pipeline
    }

    /// Mutable frame pipeline
    pub fn pipeline_mut(&mut self) -> &mut FramePipeline {
        &mut self.pipeline
    }

    /// Graphics device
    pub fn device(&self) -> &dyn GraphicsDevice {
        self.device.as_ref()
    }

    /// Graphics device and frame pipeline together, for resource setup
    pub fn graphics_mut(&mut self) -> (&mut dyn GraphicsDevice, &mut FramePipeline) {
        (self.device.as_mut(), &mut self.pipeline)
    }

    /// Resource manager
    pub const fn resources(&self) -> &ResourceManager {
        &self.resources
    }

    /// Mutable resource manager
    pub fn resources_mut(&mut self) -> &mut ResourceManager {
        &mut self.resources
    }

    /// Frame timer
    pub const fn timer(&self) -> &Timer {
        &self.timer
    }

    /// Active configuration
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }
}

/// Fatal engine errors
#[derive(Error, Debug)]
pub enum EngineError {
    /// Configuration could not be loaded or is invalid
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Physics world setup failed
    #[error("Physics error: {0}")]
    Physics(#[from] PhysicsError),

    /// Pass order is invalid
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// Core render targets could not be created
    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    /// Application callback failed
    #[error("Application error: {0}")]
    Application(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use slotmap::Key;

    use crate::application::AppError;
    use crate::core::config::LoaderConfig;
    use crate::ecs::components::{MeshRendererComponent, RigidbodyComponent, TransformComponent};
    use crate::physics::mock::MockPhysicsWorld;
    use crate::physics::SimplePhysicsWorld;
    use crate::render::{HeadlessDevice, Mesh, UnlitMaterial};
    use crate::foundation::math::Vec3;
    use crate::resources::ResourcePipe;
    use approx::assert_relative_eq;

    fn small_config() -> EngineConfig {
        let mut config = EngineConfig::default();
        config.render.width = 96;
        config.render.height = 64;
        config.loader = LoaderConfig { async_enabled: false };
        config
    }

    fn engine(config: EngineConfig) -> Engine {
        let (physics, _) = MockPhysicsWorld::new();
        Engine::new(config, Box::new(HeadlessDevice::new()), Box::new(physics)).unwrap()
    }

    #[test]
    fn test_invalid_config_is_fatal() {
        let mut config = small_config();
        config.physics.fixed_time_step = -1.0;
        let (physics, _) = MockPhysicsWorld::new();
        let err = Engine::new(config, Box::new(HeadlessDevice::new()), Box::new(physics)).unwrap_err();
        assert!(matches!(err, EngineError::Config(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_incomplete_forward_targets_are_fatal() {
        let mut device = HeadlessDevice::new();
        device.fail_framebuffer("forward msaa");
        let (physics, _) = MockPhysicsWorld::new();
        let err = Engine::new(small_config(), Box::new(device), Box::new(physics)).unwrap_err();
        assert!(matches!(err, EngineError::Render(RenderError::InitializationFailed(_))));
    }

    #[test]
    fn test_frame_steps_physics_and_renders() {
        let mut engine = engine(small_config());
        let step = engine.physics.fixed_time_step();
        let entity = engine.world.create_entity();
        engine.world.add_component(entity, TransformComponent::identity());
        let report = engine.frame(step * 2.5);
        assert_eq!(report.physics_steps, 2);
        assert_eq!(report.frame, 1);
        assert!(!report.outputs.output.is_null());
        assert_relative_eq!(engine.physics.accumulated_time(), step * 0.5, epsilon = 1e-5);
        assert_eq!(engine.last_report(), report);
    }

    #[test]
    fn test_frame_runs_context_tasks() {
        let mut config = small_config();
        config.loader.async_enabled = true;
        let mut engine = engine(config);
        let done = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&done);
        engine.resources_mut().exec(ResourcePipe::new("upload").then_on_context(move || {
            flag.store(true, Ordering::SeqCst);
            true
        }));

        let deadline = Instant::now() + std::time::Duration::from_secs(5);
        while !done.load(Ordering::SeqCst) {
            engine.frame(0.0);
            assert!(Instant::now() < deadline);
        }
    }

    #[test]
    fn test_msaa_and_resize() {
        let mut engine = engine(small_config());
        assert!(engine.set_msaa_samples(3).is_err());
        engine.set_msaa_samples(8).unwrap();
        assert_eq!(engine.pipeline().msaa_samples(), 8);
        assert_eq!(engine.config().render.msaa_samples, 8);

        engine.resize(0, 100);
        assert_eq!(engine.pipeline().viewport(), Viewport::new(96, 64));
        engine.resize(200, 100);
        assert_eq!(engine.pipeline().viewport(), Viewport::new(200, 100));
        assert!(!engine.frame(0.01).outputs.hdr.is_null());
    }

    #[test]
    fn test_selection_is_outlined() {
        let mut engine = engine(small_config());
        let (device, pipeline) = engine.graphics_mut();
        let shader = pipeline.shaders().get(device, "lit");
        let entity = engine.world.create_entity();
        engine.world.add_component(entity, TransformComponent::identity());
        engine.world.add_component(
            entity,
            MeshRendererComponent::new(Rc::new(Mesh::cube()), Rc::new(UnlitMaterial::new(shader))),
        );
        engine.set_selection(Some(entity));
        assert!(engine.frame(0.0).outputs.stats.outline_drawn);
    }

    struct FallingScene {
        body: Option<Entity>,
        frames: u32,
        start_height: f32,
        cleaned_up: bool,
    }

    impl Application for FallingScene {
        fn initialize(&mut self, engine: &mut Engine) -> Result<(), AppError> {
            let entity = engine.world.create_entity();
            engine.world.add_component(
                entity,
                TransformComponent::from_position(Vec3::new(0.0, self.start_height, 0.0)),
            );
            engine
                .physics
                .add_rigidbody(&mut engine.world, entity, RigidbodyComponent::default())
                .map_err(|e| AppError::Scene(e.to_string()))?;
            self.body = Some(entity);
            Ok(())
        }

        fn update(&mut self, engine: &mut Engine, _delta_time: f32) -> Result<(), AppError> {
            if self.frames == 30 {
                engine.quit();
            }
            Ok(())
        }

        fn frame_rendered(&mut self, _engine: &mut Engine, _report: &FrameReport) -> Result<(), AppError> {
            self.frames += 1;
            Ok(())
        }

        fn cleanup(&mut self, _engine: &mut Engine) {
            self.cleaned_up = true;
        }
    }

    #[test]
    fn test_run_drives_application() {
        let config = small_config();
        let physics = SimplePhysicsWorld::new(&config.physics).unwrap();
        let mut engine = Engine::new(config, Box::new(HeadlessDevice::new()), Box::new(physics)).unwrap();
        engine.set_fixed_delta(Some(1.0 / 60.0));

        let mut app = FallingScene {
            body: None,
            frames: 0,
            start_height: 10.0,
            cleaned_up: false,
        };
        engine.run(&mut app).unwrap();

        assert_eq!(app.frames, 30);
        assert!(app.cleaned_up);
        assert!(!engine.pipeline().is_created());
        let body = app.body.unwrap();
        let height = engine.world.get_component::<TransformComponent>(body).unwrap().position.y;
        assert!(height < 10.0);
    }

    struct FailingApp;

    impl Application for FailingApp {
        fn initialize(&mut self, _engine: &mut Engine) -> Result<(), AppError> {
            Ok(())
        }

        fn update(&mut self, _engine: &mut Engine, _delta_time: f32) -> Result<(), AppError> {
            Err(AppError::Custom("boom".into()))
        }

        fn cleanup(&mut self, _engine: &mut Engine) {}
    }

    #[test]
    fn test_update_error_stops_loop_after_cleanup() {
        let mut engine = engine(small_config());
        let err = engine.run(&mut FailingApp).unwrap_err();
        assert!(matches!(err, EngineError::Application(_)));
        assert!(!engine.pipeline().is_created());
    }
}
