//! # Render Passes
//!
//! The geometry passes of a frame plus the graph that orders them.
//!
//! ## Lifecycle
//!
//! Every pass follows the same contract: `create` allocates its targets and
//! resolves its shaders, `destroy` releases them, and both are idempotent so
//! a pass can be torn down and rebuilt on viewport or MSAA changes. Target
//! construction failures are logged by the pass and leave it rendering into
//! (and returning) null textures rather than failing the frame.

pub mod forward_pass;
pub mod graph;
pub mod pre_pass;
pub mod ssao_pass;
pub mod velocity_buffer;

pub use forward_pass::{ForwardPass, ForwardPassStats};
pub use graph::{Attachment, FrameGraph, PassDescriptor, PassKind, PipelineError};
pub use pre_pass::{PrePass, PrePassOutput};
pub use ssao_pass::SsaoPass;
pub use velocity_buffer::VelocityBuffer;

use super::device::GraphicsDevice;
use super::shader::ShaderLibrary;

/// Create/destroy contract shared by every pass
pub trait RenderPass {
    /// Inputs and outputs of this pass
    fn descriptor(&self) -> PassDescriptor;

    /// Allocate targets and resolve shaders; no-op if already created
    fn create(&mut self, device: &mut dyn GraphicsDevice, shaders: &mut ShaderLibrary);

    /// Release every owned object; no-op if not created
    fn destroy(&mut self, device: &mut dyn GraphicsDevice);

    /// Whether `create` ran more recently than `destroy`
    fn is_created(&self) -> bool;
}
