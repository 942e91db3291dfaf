//! # Nuro Engine
//!
//! Scene graph, physics integration and multi-pass frame pipeline of a
//! real-time 3D engine.
//!
//! ## Features
//!
//! - **ECS**: generational entity handles over sparse-set component storage
//! - **Physics bridge**: fixed-timestep stepping against an injected
//!   physics world, with pose interpolation and explicit collider lifecycle
//! - **Render queue**: per-frame draw list sorted by shader and material
//! - **Frame pipeline**: pre-pass, SSAO, velocity buffer, forward pass with
//!   selection outline, and a post-processing chain, ordered by a validated
//!   pass graph
//! - **Resource loader**: background pipes with main-thread context tasks
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use nuro_engine::prelude::*;
//!
//! struct MyApp;
//!
//! impl Application for MyApp {
//!     fn initialize(&mut self, engine: &mut Engine) -> Result<(), AppError> {
//!         let entity = engine.world.spawn(None);
//!         engine.set_selection(Some(entity));
//!         Ok(())
//!     }
//!
//!     fn update(&mut self, engine: &mut Engine, _delta_time: f32) -> Result<(), AppError> {
//!         if engine.timer().frame_count() >= 60 {
//!             engine.quit();
//!         }
//!         Ok(())
//!     }
//!
//!     fn cleanup(&mut self, _engine: &mut Engine) {}
//! }
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = EngineConfig::default();
//!     let physics = SimplePhysicsWorld::new(&config.physics)?;
//!     let mut engine = Engine::new(config, Box::new(HeadlessDevice::new()), Box::new(physics))?;
//!     engine.run(&mut MyApp)?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;

pub mod ecs;
pub mod foundation;
pub mod physics;
pub mod render;
pub mod resources;

mod application;
mod engine;

pub use application::{AppError, Application};
pub use engine::{Engine, EngineError, FrameReport};

/// Common imports for engine users
pub mod prelude {
    pub use crate::{
        core::config::{Config, EngineConfig, PhysicsConfig, RenderConfig},
        ecs::{
            components::{
                BoxColliderComponent, CameraComponent, LightComponent, LightFactory, MeshRendererComponent,
                RigidbodyComponent, SphereColliderComponent, TransformComponent, VelocityComponent,
            },
            Component, Entity, World,
        },
        foundation::math::{Mat4, Quat, Vec3, Vec4},
        physics::{PhysicsBridge, PhysicsWorld, SimplePhysicsWorld},
        render::{
            FlyCamera, FrameOutputs, FramePipeline, GraphicsDevice, HeadlessDevice, LitMaterial, Material, Mesh,
            Profile, UnlitMaterial,
        },
        resources::{ResourceId, ResourceManager, ResourcePipe},
        AppError, Application, Engine, EngineError, FrameReport,
    };
}
