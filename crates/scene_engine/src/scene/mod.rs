//! Scene document model and per-frame evaluation passes.
//!
//! Entities live in slotmap arenas owned by [`graph::Scene`]; all
//! cross-references are typed keys. The document linker resolves the flat
//! record array into these arenas in two passes.

pub mod animation;
pub mod camera;
pub mod document;
pub mod environment;
pub mod graph;
pub mod light;
pub mod material;
pub mod mesh;
pub mod node;

pub use animation::{Driver, Interpolation};
pub use camera::Camera;
pub use document::{load_scene, DocumentError};
pub use environment::Environment;
pub use graph::Scene;
pub use light::{Light, LightKind, ShaderLight, ShadowMapSlot};
pub use material::{Material, MaterialKind, MaterialTypeRegistry, MaterialTypeTag};
pub use mesh::{Attribute, AttributeFormat, Mesh, Topology};
pub use node::Node;

slotmap::new_key_type! {
    /// Stable handle to a [`Node`]
    pub struct NodeKey;
    /// Stable handle to a [`Mesh`]
    pub struct MeshKey;
    /// Stable handle to a [`Camera`]
    pub struct CameraKey;
    /// Stable handle to an [`Environment`]
    pub struct EnvironmentKey;
    /// Stable handle to a [`Material`]
    pub struct MaterialKey;
    /// Stable handle to a [`Light`]
    pub struct LightKey;
    /// Stable handle to a translation [`Driver`]
    pub struct TranslationDriverKey;
    /// Stable handle to a rotation [`Driver`]
    pub struct RotationDriverKey;
    /// Stable handle to a scale [`Driver`]
    pub struct ScaleDriverKey;
}
