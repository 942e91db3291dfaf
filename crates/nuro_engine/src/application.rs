//! Application trait and lifecycle management

use thiserror::Error;

use crate::engine::{Engine, EngineError, FrameReport};

/// Application lifecycle trait
///
/// Implement this trait to drive a scene with [`Engine::run`].
pub trait Application {
    /// Initialize the application
    ///
    /// Called once before the first frame. Build the initial scene here.
    fn initialize(&mut self, engine: &mut Engine) -> Result<(), AppError>;

    /// Update the application
    ///
    /// Called every frame before physics and rendering.
    ///
    /// # Arguments
    /// * `engine` - Mutable reference to the engine
    /// * `delta_time` - Time since last frame in seconds
    fn update(&mut self, engine: &mut Engine, delta_time: f32) -> Result<(), AppError>;

    /// Called after each frame was rendered
    fn frame_rendered(&mut self, _engine: &mut Engine, _report: &FrameReport) -> Result<(), AppError> {
        Ok(())
    }

    /// Cleanup the application
    ///
    /// Called once after the last frame, before the engine releases its
    /// render targets.
    fn cleanup(&mut self, engine: &mut Engine);
}

/// Application-level errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Engine error propagated to application level
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    /// Scene construction failed
    #[error("Scene error: {0}")]
    Scene(String),

    /// Custom application error
    #[error("Application error: {0}")]
    Custom(String),
}
