//! # Engine Configuration
//!
//! All tunables the engine reads at startup, grouped per subsystem. Every
//! section has defaults matching the stock editor scene, so an empty file (or
//! no file at all) yields a working engine.
//!
//! ## Validation
//!
//! [`EngineConfig::validate`] runs before any subsystem is created. A config
//! that fails validation is a fatal startup error.

use serde::{Deserialize, Serialize};

use crate::foundation::math::Vec3;
use crate::render::passes::ssao_pass::{MAX_KERNEL_SAMPLES, MAX_NOISE_RESOLUTION};
use crate::render::render_queue::UnboundPolicy;

pub use crate::config::{Config, ConfigError};

/// MSAA sample counts the forward pass accepts
pub const SUPPORTED_MSAA_SAMPLES: [u32; 5] = [1, 2, 4, 8, 16];

/// Fixed-step physics settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    /// Length of one simulation step in seconds
    pub fixed_time_step: f32,
    /// World gravity
    pub gravity: Vec3,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            fixed_time_step: 1.0 / 60.0,
            gravity: Vec3::new(0.0, -9.81, 0.0),
        }
    }
}

/// Ambient occlusion resources created once per pass construction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SsaoConfig {
    /// Occlusion buffer size relative to the viewport
    pub resolution_scale: f32,
    /// Number of kernel samples generated at creation
    pub kernel_samples: u32,
    /// Edge length of the tiled rotation-noise texture
    pub noise_resolution: u32,
    /// Run the blur stage after the occlusion stage
    pub blur: bool,
    /// Seed for kernel and noise generation
    pub seed: u64,
}

impl Default for SsaoConfig {
    fn default() -> Self {
        Self {
            resolution_scale: 0.5,
            kernel_samples: MAX_KERNEL_SAMPLES,
            noise_resolution: 4,
            blur: false,
            seed: 0x55a0,
        }
    }
}

/// Selection outline look
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutlineConfig {
    /// Added to every scale axis for the highlight silhouette
    pub scale_increase: f32,
    /// RGBA highlight color
    pub color: [f32; 4],
}

impl Default for OutlineConfig {
    fn default() -> Self {
        Self {
            scale_increase: 0.025,
            color: [1.0, 0.25, 0.0, 0.7],
        }
    }
}

/// Frame pipeline settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Viewport width in pixels
    pub width: u32,
    /// Viewport height in pixels
    pub height: u32,
    /// Forward pass multisample count
    pub msaa_samples: u32,
    /// Ambient occlusion pass
    pub ssao: SsaoConfig,
    /// Bloom mip chain depth
    pub bloom_mip_depth: u32,
    /// What to do with renderers that lack a mesh or material
    pub unbound_policy: UnboundPolicy,
    /// Selection outline
    pub outline: OutlineConfig,
    /// Blit the final post-processing output to the default framebuffer
    pub present_to_screen: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            msaa_samples: 4,
            ssao: SsaoConfig::default(),
            bloom_mip_depth: 6,
            unbound_policy: UnboundPolicy::default(),
            outline: OutlineConfig::default(),
            present_to_screen: true,
        }
    }
}

/// Background loader settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Spawn the background processor thread
    pub async_enabled: bool,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self { async_enabled: true }
    }
}

/// Top-level engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Default `log` level filter (overridden by `RUST_LOG`)
    pub log_level: String,
    /// Physics settings
    pub physics: PhysicsConfig,
    /// Render settings
    pub render: RenderConfig,
    /// Loader settings
    pub loader: LoaderConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            physics: PhysicsConfig::default(),
            render: RenderConfig::default(),
            loader: LoaderConfig::default(),
        }
    }
}

impl Config for EngineConfig {}

impl EngineConfig {
    /// Check every value that would otherwise fail deep inside a subsystem
    pub fn validate(&self) -> Result<(), ConfigError> {
        let step = self.physics.fixed_time_step;
        if !step.is_finite() || step <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "physics.fixed_time_step must be positive, got {step}"
            )));
        }
        if self.physics.gravity.iter().any(|c| !c.is_finite()) {
            return Err(ConfigError::Invalid("physics.gravity must be finite".into()));
        }

        let render = &self.render;
        if render.width == 0 || render.height == 0 {
            return Err(ConfigError::Invalid(format!(
                "render viewport must be non-empty, got {}x{}",
                render.width, render.height
            )));
        }
        if !SUPPORTED_MSAA_SAMPLES.contains(&render.msaa_samples) {
            return Err(ConfigError::Invalid(format!(
                "render.msaa_samples {} not in {SUPPORTED_MSAA_SAMPLES:?}",
                render.msaa_samples
            )));
        }
        if render.ssao.kernel_samples == 0 || render.ssao.kernel_samples > MAX_KERNEL_SAMPLES {
            return Err(ConfigError::Invalid(format!(
                "render.ssao.kernel_samples must be in 1..={MAX_KERNEL_SAMPLES}"
            )));
        }
        if render.ssao.noise_resolution == 0 || render.ssao.noise_resolution > MAX_NOISE_RESOLUTION {
            return Err(ConfigError::Invalid(format!(
                "render.ssao.noise_resolution must be in 1..={MAX_NOISE_RESOLUTION}"
            )));
        }
        let scale = render.ssao.resolution_scale;
        if !(scale > 0.0 && scale <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "render.ssao.resolution_scale must be in (0, 1], got {scale}"
            )));
        }
        if render.bloom_mip_depth == 0 {
            return Err(ConfigError::Invalid("render.bloom_mip_depth must be > 0".into()));
        }
        Ok(())
    }
}
