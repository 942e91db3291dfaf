//! Per-frame render context
//!
//! Everything a material or pass reads that is not owned by it: the
//! viewport, the camera, the active profile, inputs produced by earlier
//! passes and the gathered lights. Built once per frame by the pipeline and
//! passed by reference into every `bind`.

use slotmap::Key;

use super::camera::CameraView;
use super::device::TextureId;
use super::lighting::LightSet;
use super::postprocessing::Profile;
use super::viewport::Viewport;
use crate::foundation::math::Mat4;

/// Shadow resources produced outside the frame pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct ShadowInputs {
    /// World to light clip space
    pub light_space: Mat4,
    /// Depth map rendered from the light
    pub shadow_map: TextureId,
    /// Shadow map width in texels
    pub map_width: u32,
    /// Shadow map height in texels
    pub map_height: u32,
    /// Poisson disk texture for soft shadows
    pub shadow_disk: TextureId,
    /// Disk window size
    pub disk_window_size: f32,
    /// Disk filter size
    pub disk_filter_size: f32,
    /// Disk radius
    pub disk_radius: f32,
}

/// Read-only state shared by all draws of a frame
#[derive(Debug, Clone, Copy)]
pub struct FrameContext<'a> {
    /// Output size
    pub viewport: Viewport,
    /// Camera rendering the frame
    pub camera: &'a CameraView,
    /// Profile in effect
    pub profile: &'a Profile,
    /// Occlusion buffer from the SSAO pass, null when the pass did not run
    pub ssao_input: TextureId,
    /// Lights gathered for this frame
    pub lights: &'a LightSet,
    /// Shadow inputs, if a shadow pass ran
    pub shadows: Option<&'a ShadowInputs>,
}

impl FrameContext<'_> {
    /// Whether lit materials should sample the occlusion buffer
    pub fn ssao_enabled(&self) -> bool {
        self.profile.ambient_occlusion.enabled && !self.ssao_input.is_null()
    }

    /// Whether lit materials should sample the shadow map
    pub fn cast_shadows(&self) -> bool {
        self.shadows.is_some_and(|s| !s.shadow_map.is_null())
    }
}
