//! Environment lighting sources.

use crate::assets::TextureData;
use crate::foundation::math::{Mat4, Vec3};
use crate::render::backend::TextureHandle;

/// A cube-mapped environment with prefiltered radiance for the PBR path and
/// a single-level irradiance map for the Lambertian path.
#[derive(Debug, Clone)]
pub struct Environment {
    /// Environment name from the document
    pub name: String,
    /// Prefiltered radiance cube (mip chain)
    pub texture_pbr: TextureData,
    /// Irradiance cube
    pub texture_lambertian: TextureData,
    /// World-to-environment transform, written by the transform propagator
    pub world_to_environment: Mat4,
    /// Uploaded radiance cube, created at renderer init
    pub pbr_handle: Option<TextureHandle>,
    /// Uploaded irradiance cube, created at renderer init
    pub lambertian_handle: Option<TextureHandle>,
}

impl Environment {
    /// Create an environment from its two decoded cube textures
    pub fn new(name: String, texture_pbr: TextureData, texture_lambertian: TextureData) -> Self {
        Self {
            name,
            texture_pbr,
            texture_lambertian,
            world_to_environment: Mat4::identity(),
            pbr_handle: None,
            lambertian_handle: None,
        }
    }

    /// The all-black fallback used when the document has no environment
    pub fn default_black() -> Self {
        Self::new(
            "default".to_string(),
            TextureData::solid(Vec3::zeros(), true),
            TextureData::solid(Vec3::zeros(), true),
        )
    }
}
