//! # Scene cameras
//!
//! A camera couples three independent sources of transform state:
//!
//! - **Intrinsics** (aspect, vertical FOV, near/far planes) from the
//!   document, producing the perspective matrix.
//! - **Base transforms** written by the transform propagator each frame:
//!   where the owning node places the camera in the world.
//! - **User state** (position offset, incremental rotation, zoom) mutated
//!   only by live input, never by the document.
//!
//! The derived matrices compose user state *inside* the animated camera
//! frame: moving the camera with the keyboard moves it relative to wherever
//! its node currently is, not relative to the world origin.

use crate::foundation::math::{Mat4, Mat4Ext, Vec3};

/// Perspective camera with live user offset state
#[derive(Debug, Clone)]
pub struct Camera {
    /// Camera name (document name, or "default"/"debug" for built-ins)
    pub name: String,

    /// Aspect ratio (width / height)
    pub aspect_ratio: f32,
    /// Vertical field of view in radians, before zoom
    pub vertical_fov: f32,
    /// Near plane distance
    pub near_plane: f32,
    /// Far plane distance; may be `f32::INFINITY`
    pub far_plane: f32,

    /// Projection matrix derived from the intrinsics and zoom
    pub perspective: Mat4,
    /// `vertical_fov + zoom`, cached for culling
    pub vertical_fov_scaled: f32,
    /// `tan(vertical_fov_scaled / 2)`, cached for culling
    pub vertical_fov_tan: f32,

    /// World-to-camera-base matrix (set by the transform propagator)
    pub world_to_base: Mat4,
    /// Camera-base-to-world matrix (set by the transform propagator)
    pub base_to_world: Mat4,

    /// User position offset within the camera's base frame
    pub position: Vec3,
    /// Incremental user rotation
    pub rotation: Mat4,
    /// Inverse of the user rotation, maintained alongside it
    pub rotation_inverse: Mat4,
    /// Movement speed in units per second
    pub speed: f32,
    /// FOV delta applied by scroll zoom, in radians
    pub zoom: f32,

    /// World-to-view matrix including the user offset
    pub user_offset: Mat4,
    /// View-to-world matrix for the user-offset camera position
    pub pos_transform: Mat4,
    /// Projection times `user_offset`
    pub full_transform: Mat4,
}

impl Camera {
    /// Create a camera from intrinsics. Pass `f32::INFINITY` as `far_plane`
    /// for an infinite projection.
    pub fn new(name: &str, aspect_ratio: f32, vertical_fov: f32, near_plane: f32, far_plane: f32) -> Self {
        let mut camera = Self {
            name: name.to_string(),
            aspect_ratio,
            vertical_fov,
            near_plane,
            far_plane,
            perspective: Mat4::identity(),
            vertical_fov_scaled: vertical_fov,
            vertical_fov_tan: (vertical_fov * 0.5).tan(),
            world_to_base: Mat4::identity(),
            base_to_world: Mat4::identity(),
            position: Vec3::zeros(),
            rotation: Mat4::identity(),
            rotation_inverse: Mat4::identity(),
            speed: 10.0,
            zoom: 0.0,
            user_offset: Mat4::identity(),
            pos_transform: Mat4::identity(),
            full_transform: Mat4::identity(),
        };
        camera.compute_projection();
        camera
    }

    /// Recompute the projection matrix and the cached FOV terms.
    ///
    /// Called at construction and whenever intrinsics or zoom change.
    pub fn compute_projection(&mut self) {
        let fov = self.vertical_fov + self.zoom;

        self.perspective = if self.far_plane.is_infinite() {
            Mat4::infinite_perspective_vk(self.aspect_ratio, fov, self.near_plane)
        } else {
            Mat4::perspective_vk(self.aspect_ratio, fov, self.near_plane, self.far_plane)
        };

        self.vertical_fov_scaled = fov;
        self.vertical_fov_tan = (fov * 0.5).tan();
    }

    /// Recompute the derived view matrices from the base transforms and the
    /// user offset state.
    ///
    /// The composition order keeps user movement relative to the camera's
    /// animated frame:
    /// `user_offset = rotation * translate(-position) * world_to_base`.
    pub fn update_transform(&mut self) {
        self.user_offset =
            self.rotation * Mat4::translation(-self.position) * self.world_to_base;
        self.pos_transform =
            self.base_to_world * Mat4::translation(self.position) * self.rotation_inverse;
        self.full_transform = self.perspective * self.user_offset;
    }

    /// Change the zoom delta and refresh the projection
    pub fn set_zoom(&mut self, zoom: f32) {
        self.zoom = zoom;
        self.compute_projection();
    }

    /// Reset position, rotation and zoom to the document pose
    pub fn reset_user_state(&mut self) {
        self.position = Vec3::zeros();
        self.rotation = Mat4::identity();
        self.rotation_inverse = Mat4::identity();
        self.zoom = 0.0;
        self.compute_projection();
    }

    /// Copy intrinsics, base transforms and user pose from another camera.
    ///
    /// Used when entering the debug camera, which starts wherever the main
    /// camera currently is.
    pub fn copy_pose_from(&mut self, other: &Camera) {
        self.aspect_ratio = other.aspect_ratio;
        self.vertical_fov = other.vertical_fov;
        self.near_plane = other.near_plane;
        self.far_plane = other.far_plane;
        self.world_to_base = other.world_to_base;
        self.base_to_world = other.base_to_world;
        self.position = other.position;
        self.rotation = other.rotation;
        self.rotation_inverse = other.rotation_inverse;
        self.speed = other.speed;
        self.zoom = other.zoom;
        self.compute_projection();
        self.update_transform();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::relative_eq;

    #[test]
    fn test_infinite_far_plane_selects_infinite_projection() {
        let finite = Camera::new("a", 1.5, 1.0, 0.1, 100.0);
        let infinite = Camera::new("b", 1.5, 1.0, 0.1, f32::INFINITY);
        assert!(!relative_eq!(finite.perspective, infinite.perspective, epsilon = 1e-6));
        assert!(relative_eq!(infinite.perspective[(2, 2)], -1.0, epsilon = 1e-6));
    }

    #[test]
    fn test_user_offset_composes_inside_camera_frame() {
        let mut camera = Camera::new("c", 1.0, 1.0, 0.1, 100.0);

        // Put the camera base at x = 5 in the world.
        camera.base_to_world = Mat4::translation(Vec3::new(5.0, 0.0, 0.0));
        camera.world_to_base = Mat4::translation(Vec3::new(-5.0, 0.0, 0.0));
        camera.position = Vec3::new(0.0, 0.0, 2.0);
        camera.update_transform();

        // The world position of the camera is the base position plus the
        // user offset in base coordinates.
        let pos = camera.pos_transform * nalgebra::Vector4::new(0.0, 0.0, 0.0, 1.0);
        assert!(relative_eq!(pos.x, 5.0, epsilon = 1e-6));
        assert!(relative_eq!(pos.z, 2.0, epsilon = 1e-6));
    }

    #[test]
    fn test_zoom_changes_cached_fov_tan() {
        let mut camera = Camera::new("z", 1.0, 1.0, 0.1, 100.0);
        let base_tan = camera.vertical_fov_tan;
        camera.set_zoom(0.4);
        assert!(camera.vertical_fov_tan > base_tan);
        assert!(relative_eq!(
            camera.vertical_fov_tan,
            (1.4_f32 * 0.5).tan(),
            epsilon = 1e-6
        ));
    }
}
