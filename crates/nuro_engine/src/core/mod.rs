//! # Core Engine Module
//!
//! Engine-wide configuration shared by the physics bridge, the frame
//! pipeline and the resource loader.

pub mod config;

pub use config::{
    Config, ConfigError, EngineConfig, LoaderConfig, OutlineConfig, PhysicsConfig, RenderConfig,
    SsaoConfig,
};
