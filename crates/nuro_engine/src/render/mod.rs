//! # Rendering System
//!
//! Multi-pass frame pipeline over an abstract graphics device.
//!
//! ## Architecture
//!
//! - **Device seam**: [`GraphicsDevice`] is everything a pass needs from the
//!   GPU. [`HeadlessDevice`] implements it on the CPU for tests and tools.
//! - **Resources**: render targets, shaders with cached uniform locations,
//!   materials and meshes.
//! - **Render queue**: per-frame draw list sorted by shader and material.
//! - **Passes**: pre-pass, SSAO, velocity buffer and forward pass, ordered
//!   by a validated frame graph.
//! - **Post-processing**: bloom, composite, motion blur, colour grading,
//!   vignette and chromatic aberration.
//! - **Frame pipeline**: owns all of the above and runs one frame.
//!
//! ## Failure Model
//!
//! Object creation is checked immediately. A failed or incomplete target is
//! logged and leaves its pass returning the null texture, so a broken
//! resource shows up as a black buffer instead of a crash. Only pipeline
//! construction (an invalid pass order) is a hard error.

use thiserror::Error;

pub mod camera;
pub mod context;
pub mod device;
pub mod frame_pipeline;
pub mod framebuffer;
pub mod headless;
pub mod lighting;
pub mod material;
pub mod mesh;
pub mod passes;
pub mod postprocessing;
pub mod render_queue;
pub mod shader;
pub mod transformation;
pub mod viewport;

#[cfg(test)]
mod frame_pipeline_tests;

pub use camera::{CameraView, FlyCamera};
pub use context::{FrameContext, ShadowInputs};
pub use device::{GraphicsDevice, TextureId};
pub use frame_pipeline::{FrameOutputs, FramePipeline};
pub use headless::HeadlessDevice;
pub use lighting::LightSet;
pub use material::{LitMaterial, Material, MaterialId, UnlitMaterial};
pub use mesh::{Mesh, Vertex};
pub use passes::{ForwardPassStats, PipelineError};
pub use postprocessing::Profile;
pub use render_queue::{RenderQueue, UnboundPolicy};
pub use shader::{Shader, ShaderId, ShaderLibrary};
pub use viewport::Viewport;

/// Graphics device error types
///
/// Returned by object creation on the device seam. Passes catch these, log
/// them and degrade; they only escape as fatal errors during engine startup.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    /// Device initialization failed during setup
    #[error("Renderer initialization failed: {0}")]
    InitializationFailed(String),

    /// A texture, renderbuffer, framebuffer or mesh could not be created
    #[error("Resource creation failed: {0}")]
    ResourceCreationFailed(String),

    /// A rendering operation failed during execution
    #[error("Rendering failed: {0}")]
    RenderingFailed(String),

    /// No linked program with this name
    #[error("Shader program unavailable: {0}")]
    ProgramUnavailable(String),

    /// A handle refers to an object that does not exist
    #[error("Invalid handle: {0}")]
    InvalidHandle(String),
}
