//! Math utilities and types
//!
//! Thin aliases over nalgebra plus the handful of helpers the renderer and
//! physics bridge share.

pub use nalgebra::{Matrix3, Matrix4, Quaternion, Unit, Vector2, Vector3, Vector4};

/// 2D vector type
pub type Vec2 = Vector2<f32>;

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4D vector type
pub type Vec4 = Vector4<f32>;

/// 3x3 matrix type
pub type Mat3 = Matrix3<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// 3D point type
pub type Point3 = nalgebra::Point3<f32>;

/// Quaternion type for rotations
pub type Quat = Unit<Quaternion<f32>>;

/// Compose translation, rotation and scale into a single matrix (T * R * S)
pub fn compose_trs(position: &Vec3, rotation: &Quat, scale: &Vec3) -> Mat4 {
    Mat4::new_translation(position) * rotation.to_homogeneous() * Mat4::new_nonuniform_scaling(scale)
}

/// Blend two rotations, falling back to normalized lerp when the slerp is
/// numerically undefined (nearly opposite or identical rotations).
pub fn blend_rotation(from: &Quat, to: &Quat, t: f32) -> Quat {
    from.try_slerp(to, t, 1.0e-6)
        .unwrap_or_else(|| from.nlerp(to, t))
}

/// Math constants
pub mod constants {
    /// Pi constant
    pub const PI: f32 = std::f32::consts::PI;

    /// Degrees to radians conversion factor
    pub const DEG_TO_RAD: f32 = PI / 180.0;
}

/// Math utility functions
pub mod utils {
    use super::constants;

    /// Convert degrees to radians
    pub fn deg_to_rad(degrees: f32) -> f32 {
        degrees * constants::DEG_TO_RAD
    }

    /// Linear interpolation
    pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
        a + (b - a) * t
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_compose_trs_order() {
        let m = compose_trs(
            &Vec3::new(1.0, 2.0, 3.0),
            &Quat::from_axis_angle(&Vec3::y_axis(), constants::PI * 0.5),
            &Vec3::new(2.0, 2.0, 2.0),
        );
        // Unit X is scaled, rotated onto -Z, then translated.
        let p = m.transform_point(&Point3::new(1.0, 0.0, 0.0));
        assert_relative_eq!(p, Point3::new(1.0, 2.0, 1.0), epsilon = 1e-5);
    }

    #[test]
    fn test_blend_rotation_endpoints() {
        let a = Quat::identity();
        let b = Quat::from_axis_angle(&Vec3::z_axis(), 1.0);
        assert_relative_eq!(blend_rotation(&a, &b, 0.0), a, epsilon = 1e-6);
        assert_relative_eq!(blend_rotation(&a, &b, 1.0), b, epsilon = 1e-6);
        assert_relative_eq!(blend_rotation(&a, &a, 0.5), a, epsilon = 1e-6);
    }
}
