//! View-space frustum culling.
//!
//! A mesh is culled by transforming its 8 precomputed local-space bounding
//! corners into view space, reducing them to an axis-aligned box, and
//! rejecting the box against the near/far planes and the FOV-derived
//! horizontal/vertical extents. View-space Z is negated during the
//! reduction so that "distance in front of the camera" compares directly
//! against the near/far plane values.

use crate::foundation::math::{Mat4, Vec3, Vec4};
use crate::scene::camera::Camera;
use crate::scene::light::ShaderLight;

/// The camera parameters culling needs: a world-to-view matrix plus the
/// frustum shape. Built from the active camera for the main pass, or
/// synthesized from a shader light for shadow passes.
#[derive(Debug, Clone)]
pub struct CullingVolume {
    /// World-to-view matrix (the camera's user-offset transform)
    pub view: Mat4,
    /// Near plane distance
    pub near: f32,
    /// Far plane distance; may be infinite
    pub far: f32,
    /// `tan(vertical_fov / 2)`
    pub fov_tan: f32,
    /// Aspect ratio (width / height)
    pub aspect: f32,
}

impl CullingVolume {
    /// Culling volume of a scene camera
    pub fn from_camera(camera: &Camera) -> Self {
        Self {
            view: camera.user_offset,
            near: camera.near_plane,
            far: camera.far_plane,
            fov_tan: camera.vertical_fov_tan,
            aspect: camera.aspect_ratio,
        }
    }

    /// Synthetic culling volume for rendering one shadow map: square
    /// aspect, the light's cone as FOV, near at the source radius, far at
    /// the distance limit.
    pub fn from_shader_light(light: &ShaderLight) -> Self {
        Self {
            view: Mat4::from(light.world_to_light),
            near: light.radius,
            far: light.limit,
            fov_tan: (light.fov * 0.5).tan(),
            aspect: 1.0,
        }
    }

    /// Whether a mesh with the given world transform and bounding corners
    /// lies entirely outside the view volume.
    pub fn culls(&self, world: &Mat4, corners: &[Vec3; 8]) -> bool {
        let to_view = self.view * world;

        // Reduce the transformed corners to a view-space box, seeding the
        // running min/max from the first corner.
        let first = to_view * Vec4::new(corners[0].x, corners[0].y, corners[0].z, 1.0);
        let mut min_pos = Vec3::new(first.x, first.y, -first.z);
        let mut max_pos = min_pos;

        for corner in &corners[1..] {
            let pos = to_view * Vec4::new(corner.x, corner.y, corner.z, 1.0);
            min_pos = Vec3::new(
                pos.x.min(min_pos.x),
                pos.y.min(min_pos.y),
                (-pos.z).min(min_pos.z),
            );
            max_pos = Vec3::new(
                pos.x.max(max_pos.x),
                pos.y.max(max_pos.y),
                (-pos.z).max(max_pos.z),
            );
        }

        if max_pos.z < self.near || min_pos.z > self.far {
            return true;
        }

        // At the box's clamped-far depth, the frustum's half-extents follow
        // from the FOV and aspect ratio.
        let z = max_pos.z.min(self.far);
        let y = self.fov_tan * z;
        let x = y * self.aspect;
        max_pos.y < -y || min_pos.y > y || max_pos.x < -x || min_pos.x > x
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Mat4Ext;

    fn unit_corners() -> [Vec3; 8] {
        let mut corners = [Vec3::zeros(); 8];
        for i in 0..2 {
            for j in 0..2 {
                for k in 0..2 {
                    corners[i * 4 + j * 2 + k] = Vec3::new(
                        if i == 0 { -0.5 } else { 0.5 },
                        if j == 0 { -0.5 } else { 0.5 },
                        if k == 0 { -0.5 } else { 0.5 },
                    );
                }
            }
        }
        corners
    }

    fn forward_volume(near: f32, far: f32) -> CullingVolume {
        // Identity view: the camera sits at the origin looking down -Z.
        CullingVolume {
            view: Mat4::identity(),
            near,
            far,
            fov_tan: (std::f32::consts::FRAC_PI_2 * 0.5).tan(),
            aspect: 1.0,
        }
    }

    #[test]
    fn test_box_in_front_is_kept() {
        let volume = forward_volume(0.1, 100.0);
        let world = Mat4::translation(Vec3::new(0.0, 0.0, -5.0));
        assert!(!volume.culls(&world, &unit_corners()));
    }

    #[test]
    fn test_box_beyond_far_plane_is_culled() {
        let volume = forward_volume(0.1, 100.0);
        let world = Mat4::translation(Vec3::new(0.0, 0.0, -200.0));
        assert!(volume.culls(&world, &unit_corners()));
    }

    #[test]
    fn test_box_behind_camera_is_culled() {
        let volume = forward_volume(0.1, 100.0);
        let world = Mat4::translation(Vec3::new(0.0, 0.0, 10.0));
        assert!(volume.culls(&world, &unit_corners()));
    }

    #[test]
    fn test_box_outside_horizontal_extent_is_culled() {
        let volume = forward_volume(0.1, 100.0);
        // At depth 5 the half-extent is 5 * tan(45 deg) = 5; x = 20 is far
        // outside.
        let world = Mat4::translation(Vec3::new(20.0, 0.0, -5.0));
        assert!(volume.culls(&world, &unit_corners()));

        let world = Mat4::translation(Vec3::new(4.0, 0.0, -5.0));
        assert!(!volume.culls(&world, &unit_corners()));
    }

    #[test]
    fn test_infinite_far_plane_never_culls_by_distance() {
        let volume = forward_volume(0.1, f32::INFINITY);
        let world = Mat4::translation(Vec3::new(0.0, 0.0, -1.0e7));
        assert!(!volume.culls(&world, &unit_corners()));
    }

    #[test]
    fn test_box_straddling_near_plane_is_kept() {
        let volume = forward_volume(1.0, 100.0);
        // Box from z = 0.5 to z = 1.5 in front of the camera crosses the
        // near plane; its far extent is beyond near, so it stays.
        let world = Mat4::translation(Vec3::new(0.0, 0.0, -1.0));
        assert!(!volume.culls(&world, &unit_corners()));
    }
}
