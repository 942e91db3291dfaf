//! Scene viewer
//!
//! Builds a small physics scene (a static ground plane and a stack of
//! falling bodies), runs it headlessly through the frame pipeline for a
//! number of frames and reports what the engine did.

use std::rc::Rc;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use nuro_engine::foundation::logging;
use nuro_engine::prelude::*;
use nuro_engine::render::device::{Filter, TextureDesc, TextureFormat};
use nuro_engine::render::material::LitMaterialParams;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const LENS_DIRT_SIZE: u32 = 64;

#[derive(Parser, Debug)]
#[command(name = "scene_viewer", about = "Run a physics scene through the frame pipeline")]
struct Args {
    /// Engine configuration (TOML or RON)
    #[arg(short, long)]
    config: Option<String>,

    /// Number of frames to render
    #[arg(short, long, default_value_t = 120)]
    frames: u64,

    /// Seconds per frame
    #[arg(short, long, default_value_t = 1.0 / 60.0)]
    delta: f32,

    /// Number of falling bodies
    #[arg(long, default_value_t = 8)]
    bodies: usize,

    /// Render with the full post-processing profile
    #[arg(long)]
    effects: bool,

    /// Render lines instead of filled triangles
    #[arg(long)]
    wireframe: bool,
}

type PixelSlot = Arc<Mutex<Option<Vec<f32>>>>;

struct SceneViewer {
    frames: u64,
    bodies: usize,
    effects: bool,
    wireframe: bool,
    rng: StdRng,
    lens_dirt: Option<(ResourceId, PixelSlot)>,
    total_steps: u64,
    total_draws: usize,
}

impl SceneViewer {
    fn new(args: &Args) -> Self {
        Self {
            frames: args.frames,
            bodies: args.bodies,
            effects: args.effects,
            wireframe: args.wireframe,
            rng: StdRng::seed_from_u64(7),
            lens_dirt: None,
            total_steps: 0,
            total_draws: 0,
        }
    }

    fn build_scene(&mut self, engine: &mut Engine) -> Result<(), AppError> {
        let (device, pipeline) = engine.graphics_mut();
        let lit = pipeline.shaders().get(device, "lit");
        let cube = Rc::new(Mesh::cube());
        let plane = Rc::new(Mesh::plane());

        let camera = engine.world.create_entity();
        engine.world.add_component(
            camera,
            TransformComponent::from_position(Vec3::new(0.0, 4.0, 14.0)).with_rotation_euler(-0.2, 0.0, 0.0),
        );
        engine.world.add_component(camera, CameraComponent::default());

        let sun = engine.world.create_entity();
        engine
            .world
            .add_component(sun, TransformComponent::identity().with_rotation_euler(-0.8, 0.4, 0.0));
        engine
            .world
            .add_component(sun, LightFactory::directional(Vec3::new(1.0, 0.95, 0.9), 1.2));

        let lamp = engine.world.create_entity();
        engine
            .world
            .add_component(lamp, TransformComponent::from_position(Vec3::new(-3.0, 3.0, 2.0)));
        engine
            .world
            .add_component(lamp, LightFactory::point(Vec3::new(1.0, 0.6, 0.3), 4.0, 12.0));

        let ground_material: Rc<dyn Material> = Rc::new(LitMaterial::new(Rc::clone(&lit)).with_params(
            LitMaterialParams {
                base_color: Vec4::new(0.4, 0.4, 0.45, 1.0),
                roughness: 0.9,
                ..LitMaterialParams::default()
            },
        ));
        let ground = engine.world.create_entity();
        engine.world.add_component(
            ground,
            TransformComponent::identity().with_scale(Vec3::new(20.0, 1.0, 20.0)),
        );
        engine
            .world
            .add_component(ground, MeshRendererComponent::new(plane, ground_material));
        engine
            .physics
            .add_box_collider(
                &mut engine.world,
                ground,
                BoxColliderComponent::new(Vec3::new(1.0, 0.1, 1.0)),
            )
            .map_err(|e| AppError::Scene(format!("ground collider: {e}")))?;

        let body_material: Rc<dyn Material> = Rc::new(LitMaterial::new(lit).with_params(LitMaterialParams {
            base_color: Vec4::new(0.8, 0.3, 0.2, 1.0),
            roughness: 0.4,
            metallic: 0.2,
            ..LitMaterialParams::default()
        }));

        let mut first = None;
        for i in 0..self.bodies {
            let position = Vec3::new(
                self.rng.gen_range(-3.0..3.0),
                2.0 + i as f32 * 1.5,
                self.rng.gen_range(-3.0..3.0),
            );
            let entity = engine.world.create_entity();
            engine.world.add_component(
                entity,
                TransformComponent::from_position(position).with_rotation_euler(
                    self.rng.gen_range(0.0..1.0),
                    self.rng.gen_range(0.0..1.0),
                    0.0,
                ),
            );
            engine
                .world
                .add_component(entity, MeshRendererComponent::new(Rc::clone(&cube), Rc::clone(&body_material)));
            engine.world.add_component(entity, VelocityComponent::default());

            let collider = if i % 2 == 0 {
                engine
                    .physics
                    .add_box_collider(&mut engine.world, entity, BoxColliderComponent::new(Vec3::new(1.0, 1.0, 1.0)))
            } else {
                engine
                    .physics
                    .add_sphere_collider(&mut engine.world, entity, SphereColliderComponent::new(0.5))
            };
            collider.map_err(|e| AppError::Scene(format!("body {i} collider: {e}")))?;
            engine
                .physics
                .add_rigidbody(&mut engine.world, entity, RigidbodyComponent::default().with_mass(1.0 + i as f32))
                .map_err(|e| AppError::Scene(format!("body {i} rigidbody: {e}")))?;
            first.get_or_insert(entity);
        }
        engine.set_selection(first);

        log::info!(
            "Scene built: {} entities, {} physics bodies",
            engine.world.entity_count(),
            engine.physics.tracked_entities()
        );
        Ok(())
    }

    /// Queue lens dirt generation on the loader
    fn queue_lens_dirt(&mut self, engine: &mut Engine) {
        let slot: Mutex<Option<Vec<f32>>> = Mutex::new(None);
        let (id, slot) = engine.resources_mut().create("lens dirt", slot);
        let seed = self.rng.gen::<u64>();

        let pixels = Arc::clone(&slot);
        let pipe = ResourcePipe::new("lens dirt").then(move || {
            let mut rng = StdRng::seed_from_u64(seed);
            let texels = (LENS_DIRT_SIZE * LENS_DIRT_SIZE) as usize;
            let mut data = Vec::with_capacity(texels * 4);
            for _ in 0..texels {
                let speck = if rng.gen_bool(0.05) { rng.gen_range(0.3..1.0) } else { 0.0 };
                data.extend_from_slice(&[speck, speck, speck, 1.0]);
            }
            *pixels.lock() = Some(data);
            true
        });
        if engine.resources_mut().exec(pipe) {
            self.lens_dirt = Some((id, slot));
        } else {
            log::warn!("Lens dirt generation could not be queued");
            engine.resources_mut().release(id);
        }
    }

    /// Upload lens dirt once the loader produced it
    fn upload_lens_dirt(&mut self, engine: &mut Engine) {
        let Some((id, slot)) = &self.lens_dirt else {
            return;
        };
        let Some(pixels) = slot.lock().take() else {
            return;
        };
        let id = *id;
        let desc = TextureDesc::new(LENS_DIRT_SIZE, LENS_DIRT_SIZE, TextureFormat::Rgba8).with_filter(Filter::Linear);
        let (device, pipeline) = engine.graphics_mut();
        match device.create_texture(&desc, Some(&pixels)) {
            Ok(texture) => {
                pipeline.set_lens_dirt(texture);
                log::info!("Lens dirt uploaded");
            }
            Err(e) => log::warn!("Lens dirt upload failed: {e}"),
        }
        engine.resources_mut().release(id);
        self.lens_dirt = None;
    }
}

impl Application for SceneViewer {
    fn initialize(&mut self, engine: &mut Engine) -> Result<(), AppError> {
        self.build_scene(engine)?;

        let pipeline = engine.pipeline_mut();
        let mut profile = Profile::default();
        profile.ambient_occlusion.enabled = true;
        profile.motion_blur.enabled = true;
        profile.vignette.enabled = true;
        profile.bloom.lens_dirt_enabled = true;
        pipeline.set_profile(profile);
        pipeline.use_profile_effects(self.effects);
        pipeline.set_wireframe(self.wireframe);

        self.queue_lens_dirt(engine);
        Ok(())
    }

    fn update(&mut self, engine: &mut Engine, _delta_time: f32) -> Result<(), AppError> {
        if engine.timer().frame_count() >= self.frames {
            engine.quit();
            return Ok(());
        }
        self.upload_lens_dirt(engine);
        Ok(())
    }

    fn frame_rendered(&mut self, _engine: &mut Engine, report: &FrameReport) -> Result<(), AppError> {
        self.total_steps += u64::from(report.physics_steps);
        self.total_draws += report.outputs.stats.draws;
        if report.frame % 30 == 0 {
            log::info!(
                "Frame {}: {} physics steps, {} draws, {} shader binds, {} material binds",
                report.frame,
                report.physics_steps,
                report.outputs.stats.draws,
                report.outputs.stats.shader_binds,
                report.outputs.stats.material_binds
            );
        }
        Ok(())
    }

    fn cleanup(&mut self, engine: &mut Engine) {
        log::info!(
            "Rendered {} frames: {} physics steps, {} draws",
            engine.timer().frame_count(),
            self.total_steps,
            self.total_draws
        );
        if let Some(selected) = engine.selection() {
            if let Some(transform) = engine.world.get_component::<TransformComponent>(selected) {
                let p = transform.position;
                log::info!("Selected body came to rest at ({:.2}, {:.2}, {:.2})", p.x, p.y, p.z);
            }
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => EngineConfig::load_from_file(path).with_context(|| format!("loading {path}"))?,
        None => EngineConfig::default(),
    };
    logging::init(&config.log_level);

    let physics = SimplePhysicsWorld::new(&config.physics).context("creating physics world")?;
    let mut engine = Engine::new(config, Box::new(HeadlessDevice::new()), Box::new(physics))
        .context("starting engine")?;
    engine.set_fixed_delta(Some(args.delta));

    let mut viewer = SceneViewer::new(&args);
    engine.run(&mut viewer).context("running scene")?;
    Ok(())
}
