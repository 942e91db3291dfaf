//! # Post-Processing
//!
//! Full-screen stages run after the forward pass, driven by a [`Profile`].
//!
//! ## Stages
//!
//! - [`bloom`]: prefilter, mip-chain downsample and additive upsample
//! - [`composite`]: bloom and lens dirt over the HDR image
//! - [`motion_blur`]: camera reprojection and per-object velocity
//! - [`color_grading`]: exposure, contrast and gamma
//! - [`vignette`] and [`chromatic_aberration`]: lens effects
//!
//! [`PostProcessingPipeline`] owns one of each and runs them in that order.

pub mod bloom;
pub mod chromatic_aberration;
pub mod color_grading;
pub mod composite;
pub mod motion_blur;
pub mod pipeline;
pub mod profile;
pub mod stage;
pub mod vignette;

pub use bloom::BloomPass;
pub use pipeline::{PostInputs, PostOutputs, PostProcessingPipeline};
pub use profile::{
    AmbientOcclusion, Bloom, ChromaticAberration, ColorGrading, MotionBlur, Profile, Vignette,
};
