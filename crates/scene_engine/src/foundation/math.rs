//! Math utilities and types
//!
//! Provides the fundamental math types for scene-graph evaluation and
//! draw-command generation.

pub use nalgebra::{
    Matrix3, Matrix4,
    Quaternion,
    Unit,
    Vector2, Vector3, Vector4,
};

/// 2D vector type
pub type Vec2 = Vector2<f32>;

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4D vector type
pub type Vec4 = Vector4<f32>;

/// 3D vector type with double precision (animation channel values)
pub type DVec3 = Vector3<f64>;

/// 4D vector type with double precision (animation channel values)
pub type DVec4 = Vector4<f64>;

/// 3x3 matrix type
pub type Mat3 = Matrix3<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// Quaternion type for rotations
pub type Quat = Unit<Quaternion<f32>>;

/// Math utility functions
pub mod utils {
    /// Linear interpolation
    pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
        a + (b - a) * t
    }
}

/// Extension trait for Mat4 with the transform constructors the scene
/// evaluation passes are built from.
///
/// The projection matrices keep the viewer's conventions: Y flipped inside
/// the projection itself and view-space Z increasing toward the camera, so
/// geometry in front of the camera has negative view-space Z.
pub trait Mat4Ext {
    /// Create a translation matrix
    fn translation(t: Vec3) -> Mat4;

    /// Create a rotation matrix from an (x, y, z, w) quaternion
    fn rotation_quat(q: Vec4) -> Mat4;

    /// Create a rotation matrix from an axis and angle
    fn rotation_axis(axis: Vec3, angle: f32) -> Mat4;

    /// Create a non-uniform scaling matrix
    fn scaling(s: Vec3) -> Mat4;

    /// Create a perspective projection matrix with a finite far plane
    fn perspective_vk(aspect: f32, vertical_fov: f32, near: f32, far: f32) -> Mat4;

    /// Create a perspective projection matrix with the far plane at infinity
    fn infinite_perspective_vk(aspect: f32, vertical_fov: f32, near: f32) -> Mat4;
}

impl Mat4Ext for Mat4 {
    fn translation(t: Vec3) -> Mat4 {
        Mat4::new_translation(&t)
    }

    fn rotation_quat(q: Vec4) -> Mat4 {
        let quat = Quaternion::new(q.w, q.x, q.y, q.z);
        Unit::new_normalize(quat).to_homogeneous()
    }

    fn rotation_axis(axis: Vec3, angle: f32) -> Mat4 {
        Mat4::from_axis_angle(&Unit::new_normalize(axis), angle)
    }

    fn scaling(s: Vec3) -> Mat4 {
        Mat4::new_nonuniform_scaling(&s)
    }

    fn perspective_vk(aspect: f32, vertical_fov: f32, near: f32, far: f32) -> Mat4 {
        // Adapted from the gluPerspective reference formula, with the Y flip
        // folded into the projection.
        let f = 1.0 / (vertical_fov * 0.5).tan();

        let mut m = Mat4::zeros();
        m[(0, 0)] = f / aspect;
        m[(1, 1)] = -f;
        m[(2, 2)] = (near + far) / (near - far);
        m[(2, 3)] = 2.0 * far * near / (near - far);
        m[(3, 2)] = -1.0;
        m
    }

    fn infinite_perspective_vk(aspect: f32, vertical_fov: f32, near: f32) -> Mat4 {
        // Limit of the finite projection as the far plane goes to infinity
        // (Lengyel, "Projection Matrix Tricks").
        let f = 1.0 / (vertical_fov * 0.5).tan();

        let mut m = Mat4::zeros();
        m[(0, 0)] = f / aspect;
        m[(1, 1)] = -f;
        m[(2, 2)] = -1.0;
        m[(2, 3)] = -2.0 * near;
        m[(3, 2)] = -1.0;
        m
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::relative_eq;

    #[test]
    fn test_rotation_quat_identity() {
        let m = Mat4::rotation_quat(Vec4::new(0.0, 0.0, 0.0, 1.0));
        assert!(relative_eq!(m, Mat4::identity(), epsilon = 1e-6));
    }

    #[test]
    fn test_rotation_quat_inverse_is_negated_w() {
        let q = Vec4::new(0.2, -0.4, 0.1, 0.88).normalize();
        let m = Mat4::rotation_quat(q);
        let mi = Mat4::rotation_quat(Vec4::new(q.x, q.y, q.z, -q.w));
        assert!(relative_eq!(m * mi, Mat4::identity(), epsilon = 1e-5));
    }

    #[test]
    fn test_perspective_depth_range() {
        let near = 0.1;
        let far = 100.0;
        let m = Mat4::perspective_vk(1.0, std::f32::consts::FRAC_PI_2, near, far);

        // Points in front of the camera sit at negative view-space Z; the
        // near and far planes map to the ends of the clip depth range.
        let p = m * Vec4::new(0.0, 0.0, -near, 1.0);
        assert!(relative_eq!(p.z / p.w, -1.0, epsilon = 1e-4));

        let p = m * Vec4::new(0.0, 0.0, -far, 1.0);
        assert!(relative_eq!(p.z / p.w, 1.0, epsilon = 1e-4));
    }

    #[test]
    fn test_infinite_perspective_depth_bounded() {
        let m = Mat4::infinite_perspective_vk(1.5, 1.0, 0.1);
        let p = m * Vec4::new(0.0, 0.0, -1000.0, 1.0);
        let depth = p.z / p.w;
        assert!(depth.is_finite());
        assert!(depth <= 1.0);
    }
}
