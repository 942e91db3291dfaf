//! Post-processing profile
//!
//! Plain value types, freely copied and swapped between frames. The game
//! view renders with the user profile; the scene view uses
//! [`Profile::neutral`] unless profile effects are switched on.

use serde::{Deserialize, Serialize};

use crate::foundation::math::Vec3;

/// Exposure, contrast and gamma
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorGrading {
    /// Linear exposure multiplier
    pub exposure: f32,
    /// Contrast around mid grey
    pub contrast: f32,
    /// Display gamma
    pub gamma: f32,
}

impl Default for ColorGrading {
    fn default() -> Self {
        Self {
            exposure: 1.0,
            contrast: 1.004,
            gamma: 2.2,
        }
    }
}

/// Camera and per-object motion blur
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionBlur {
    /// Master switch
    pub enabled: bool,
    /// Blur from camera movement (previous view-projection)
    pub camera_enabled: bool,
    /// Strength of camera blur
    pub camera_intensity: f32,
    /// Taps along the camera motion vector
    pub camera_samples: i32,
    /// Blur from the velocity buffer
    pub object_enabled: bool,
    /// Taps along the object motion vector
    pub object_samples: i32,
}

impl Default for MotionBlur {
    fn default() -> Self {
        Self {
            enabled: true,
            camera_enabled: true,
            camera_intensity: 0.8,
            camera_samples: 32,
            object_enabled: false,
            object_samples: 16,
        }
    }
}

/// Threshold bloom with optional lens dirt
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Bloom {
    /// Master switch
    pub enabled: bool,
    /// Strength of the bloom contribution
    pub intensity: f32,
    /// Tint of the bloom contribution
    pub color: Vec3,
    /// Brightness cutoff of the prefilter
    pub threshold: f32,
    /// Width of the soft knee around the threshold
    pub soft_threshold: f32,
    /// Tent filter radius of the upsample chain
    pub filter_radius: f32,
    /// Modulate bloom with the lens dirt texture
    pub lens_dirt_enabled: bool,
    /// Strength of the lens dirt modulation
    pub lens_dirt_intensity: f32,
}

impl Default for Bloom {
    fn default() -> Self {
        Self {
            enabled: true,
            intensity: 0.075,
            color: Vec3::new(1.0, 1.0, 1.0),
            threshold: 0.465,
            soft_threshold: 0.0,
            filter_radius: 0.0,
            lens_dirt_enabled: false,
            lens_dirt_intensity: 0.0,
        }
    }
}

/// Radial colour fringing
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChromaticAberration {
    /// Master switch
    pub enabled: bool,
    /// Signed fringe strength
    pub intensity: f32,
    /// Taps along the fringe
    pub iterations: i32,
}

impl Default for ChromaticAberration {
    fn default() -> Self {
        Self {
            enabled: true,
            intensity: -0.155,
            iterations: 12,
        }
    }
}

/// Edge darkening
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Vignette {
    /// Master switch
    pub enabled: bool,
    /// Strength
    pub intensity: f32,
    /// Colour faded towards
    pub color: Vec3,
    /// Distance from the centre where the fade starts
    pub radius: f32,
    /// Width of the fade
    pub softness: f32,
    /// Shape exponent, 2 is circular
    pub roundness: f32,
}

impl Default for Vignette {
    fn default() -> Self {
        Self {
            enabled: true,
            intensity: 1.0,
            color: Vec3::zeros(),
            radius: 0.74,
            softness: 0.42,
            roundness: 1.8,
        }
    }
}

/// Screen-space ambient occlusion
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AmbientOcclusion {
    /// Master switch; gates the whole pass
    pub enabled: bool,
    /// Sampling hemisphere radius in view space
    pub radius: f32,
    /// Kernel samples used per fragment
    pub samples: i32,
    /// Occlusion exponent
    pub power: f32,
    /// Depth comparison bias
    pub bias: f32,
}

impl Default for AmbientOcclusion {
    fn default() -> Self {
        Self {
            enabled: false,
            radius: 0.2,
            samples: 64,
            power: 20.0,
            bias: 0.03,
        }
    }
}

/// Every post-processing setting of a view
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Profile {
    /// Colour grading
    pub color: ColorGrading,
    /// Motion blur
    pub motion_blur: MotionBlur,
    /// Bloom
    pub bloom: Bloom,
    /// Chromatic aberration
    pub chromatic_aberration: ChromaticAberration,
    /// Vignette
    pub vignette: Vignette,
    /// Ambient occlusion
    pub ambient_occlusion: AmbientOcclusion,
}

impl Profile {
    /// Neutral grading with every optional effect off
    pub fn neutral() -> Self {
        let mut profile = Self::default();
        profile.color.contrast = 1.0;
        profile.motion_blur.enabled = false;
        profile.bloom.enabled = false;
        profile.chromatic_aberration.enabled = false;
        profile.vignette.enabled = false;
        profile.ambient_occlusion.enabled = false;
        profile
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_defaults() {
        let profile = Profile::default();
        assert_relative_eq!(profile.color.contrast, 1.004);
        assert!(profile.bloom.enabled);
        assert_relative_eq!(profile.bloom.threshold, 0.465);
        assert!(!profile.ambient_occlusion.enabled);
        assert_eq!(profile.ambient_occlusion.samples, 64);
        assert_eq!(profile.chromatic_aberration.iterations, 12);
    }

    #[test]
    fn test_neutral_disables_effects() {
        let neutral = Profile::neutral();
        assert!(!neutral.bloom.enabled);
        assert!(!neutral.motion_blur.enabled);
        assert!(!neutral.vignette.enabled);
        assert!(!neutral.chromatic_aberration.enabled);
        assert_relative_eq!(neutral.color.exposure, 1.0);
        assert_relative_eq!(neutral.color.contrast, 1.0);
        assert_relative_eq!(neutral.color.gamma, 2.2);
    }

    #[test]
    fn test_partial_ron_profile() {
        let profile: Profile = ron::from_str("(bloom: (intensity: 0.5), vignette: (enabled: false))").unwrap();
        assert_relative_eq!(profile.bloom.intensity, 0.5);
        assert_relative_eq!(profile.bloom.threshold, 0.465);
        assert!(!profile.vignette.enabled);
        assert!(profile.motion_blur.enabled);
    }
}
