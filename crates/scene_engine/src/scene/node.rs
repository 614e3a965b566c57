//! Scene graph nodes.

use crate::foundation::math::{Mat4, Mat4Ext, Vec3, Vec4};

use super::{
    CameraKey, EnvironmentKey, LightKey, MeshKey, NodeKey, RotationDriverKey, ScaleDriverKey,
    TranslationDriverKey,
};

/// One node of the scene tree: a local TRS transform plus optional
/// attachments. A node is owned by exactly one parent (or listed as a
/// scene root); attachments are non-owning references into the arenas.
#[derive(Debug, Clone)]
pub struct Node {
    /// Node name from the document
    pub name: String,

    /// Local translation
    pub translation: Vec3,
    /// Local rotation as an (x, y, z, w) quaternion
    pub rotation: Vec4,
    /// Local scale
    pub scale: Vec3,

    /// Local transform (T * R * S), derived from the TRS
    pub transform: Mat4,
    /// Inverse local transform, derived alongside [`Node::transform`]
    pub inv_transform: Mat4,

    /// Translation animation channel, overriding the static value
    pub translation_driver: Option<TranslationDriverKey>,
    /// Rotation animation channel
    pub rotation_driver: Option<RotationDriverKey>,
    /// Scale animation channel
    pub scale_driver: Option<ScaleDriverKey>,

    /// Owned children, in document order
    pub children: Vec<NodeKey>,
    /// Attached camera
    pub camera: Option<CameraKey>,
    /// Attached mesh
    pub mesh: Option<MeshKey>,
    /// Attached environment
    pub environment: Option<EnvironmentKey>,
    /// Attached light
    pub light: Option<LightKey>,
}

impl Node {
    /// Create a node from its static TRS
    pub fn new(name: String, translation: Vec3, rotation: Vec4, scale: Vec3) -> Self {
        let mut node = Self {
            name,
            translation,
            rotation,
            scale,
            transform: Mat4::identity(),
            inv_transform: Mat4::identity(),
            translation_driver: None,
            rotation_driver: None,
            scale_driver: None,
            children: Vec::new(),
            camera: None,
            mesh: None,
            environment: None,
            light: None,
        };
        node.compute_transform();
        node
    }

    /// Rebuild the local transform pair from the current TRS.
    ///
    /// The inverse is assembled factor-by-factor in reverse order rather
    /// than by matrix inversion; negating the quaternion's w undoes the
    /// rotation.
    pub fn compute_transform(&mut self) {
        self.transform = Mat4::translation(self.translation)
            * Mat4::rotation_quat(self.rotation)
            * Mat4::scaling(self.scale);

        self.inv_transform = Mat4::scaling(Vec3::new(
            1.0 / self.scale.x,
            1.0 / self.scale.y,
            1.0 / self.scale.z,
        )) * Mat4::rotation_quat(Vec4::new(
            self.rotation.x,
            self.rotation.y,
            self.rotation.z,
            -self.rotation.w,
        )) * Mat4::translation(-self.translation);
    }

    /// Whether any animation channel is attached
    pub fn has_drivers(&self) -> bool {
        self.translation_driver.is_some()
            || self.rotation_driver.is_some()
            || self.scale_driver.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::relative_eq;

    #[test]
    fn test_local_inverse_with_nonuniform_scale() {
        let node = Node::new(
            "n".to_string(),
            Vec3::new(1.0, -2.0, 3.0),
            Vec4::new(0.1, 0.2, -0.3, 0.95).normalize(),
            Vec3::new(2.0, 0.5, 3.0),
        );

        let product = node.transform * node.inv_transform;
        assert!(relative_eq!(product, Mat4::identity(), epsilon = 1e-4));
    }

    #[test]
    fn test_identity_trs_gives_identity_transform() {
        let node = Node::new(
            "n".to_string(),
            Vec3::zeros(),
            Vec4::new(0.0, 0.0, 0.0, 1.0),
            Vec3::new(1.0, 1.0, 1.0),
        );
        assert!(relative_eq!(node.transform, Mat4::identity(), epsilon = 1e-6));
        assert!(relative_eq!(node.inv_transform, Mat4::identity(), epsilon = 1e-6));
    }
}
