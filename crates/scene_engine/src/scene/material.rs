//! Materials and the material-type registry.
//!
//! Materials are a closed set of kinds, each carrying its own texture set.
//! Every kind maps to a material *type*: a pair of pipelines (main pass and
//! depth-only shadow pass) plus the vertex layout they expect. The registry
//! is built explicitly at renderer initialization and passed by reference
//! wherever pipelines are needed.

use crate::assets::TextureData;
use crate::foundation::math::Vec3;
use crate::render::backend::{
    MaterialBindingHandle, PipelineDesc, PipelineHandle, RenderBackend, RenderError,
};

/// The closed set of material types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MaterialTypeTag {
    /// Untextured vertex-color material; also the shadow-pass geometry type
    Simple,
    /// Full PBR: albedo, roughness, metalness
    Pbr,
    /// Diffuse-only albedo
    Lambertian,
    /// Environment-mirroring surface
    Mirror,
    /// Environment-lit surface
    Environment,
}

impl MaterialTypeTag {
    /// All material types, in registry order
    pub const ALL: [Self; 5] = [
        Self::Simple,
        Self::Pbr,
        Self::Lambertian,
        Self::Mirror,
        Self::Environment,
    ];

    /// Number of sampled textures this type binds
    pub fn texture_count(self) -> u32 {
        match self {
            Self::Simple => 0,
            Self::Pbr => 4,
            Self::Lambertian => 2,
            Self::Mirror | Self::Environment => 1,
        }
    }

    /// Byte stride of the vertex layout this type's pipelines consume.
    ///
    /// Simple geometry is position + normal + color; the shaded types add
    /// tangent and texture coordinates.
    pub fn vertex_stride(self) -> u32 {
        match self {
            Self::Simple => 28,
            _ => 52,
        }
    }

    /// Registry name, used for pipeline labels and diagnostics
    pub fn label(self) -> &'static str {
        match self {
            Self::Simple => "simple",
            Self::Pbr => "pbr",
            Self::Lambertian => "lambertian",
            Self::Mirror => "mirror",
            Self::Environment => "environment",
        }
    }
}

/// Kind-specific material data
#[derive(Debug, Clone)]
pub enum MaterialKind {
    /// Untextured
    Simple,
    /// PBR texture set
    Pbr {
        /// Base color
        albedo: TextureData,
        /// Roughness (may be a constant expanded to 1x1)
        roughness: TextureData,
        /// Metalness (may be a constant expanded to 1x1)
        metalness: TextureData,
    },
    /// Diffuse albedo only
    Lambertian {
        /// Base color
        albedo: TextureData,
    },
    /// Mirror of the environment
    Mirror,
    /// Lit by the environment
    Environment,
}

/// A document material: a kind plus the shared normal map
#[derive(Debug, Clone)]
pub struct Material {
    /// Material name from the document
    pub name: String,
    /// Normal map; a flat default when the document omits one
    pub normal_map: TextureData,
    /// Kind-specific textures
    pub kind: MaterialKind,
    /// Backend texture binding, created at renderer init
    pub binding: Option<MaterialBindingHandle>,
}

impl Material {
    /// The default material used by meshes without one
    pub fn default_simple() -> Self {
        Self {
            name: "default".to_string(),
            normal_map: TextureData::solid(Vec3::new(0.5, 0.5, 1.0), false),
            kind: MaterialKind::Simple,
            binding: None,
        }
    }

    /// Material type of this material
    pub fn type_tag(&self) -> MaterialTypeTag {
        match self.kind {
            MaterialKind::Simple => MaterialTypeTag::Simple,
            MaterialKind::Pbr { .. } => MaterialTypeTag::Pbr,
            MaterialKind::Lambertian { .. } => MaterialTypeTag::Lambertian,
            MaterialKind::Mirror => MaterialTypeTag::Mirror,
            MaterialKind::Environment => MaterialTypeTag::Environment,
        }
    }

    /// Textures to bind, in shader binding order, dispatched on the kind.
    ///
    /// The normal map always comes first for textured kinds; the simple
    /// material binds nothing.
    pub fn texture_set(&self) -> Vec<&TextureData> {
        match &self.kind {
            MaterialKind::Simple => Vec::new(),
            MaterialKind::Pbr {
                albedo,
                roughness,
                metalness,
            } => vec![&self.normal_map, albedo, roughness, metalness],
            MaterialKind::Lambertian { albedo } => vec![&self.normal_map, albedo],
            MaterialKind::Mirror | MaterialKind::Environment => vec![&self.normal_map],
        }
    }
}

/// Pipelines and layout info for one material type
#[derive(Debug, Clone, Copy)]
pub struct MaterialTypeInfo {
    /// Main color-pass pipeline
    pub pipeline: PipelineHandle,
    /// Depth-only shadow-pass pipeline
    pub shadow_pipeline: PipelineHandle,
    /// Vertex stride the pipelines consume
    pub vertex_stride: u32,
}

/// Registry of per-type pipelines, built once at renderer initialization
#[derive(Debug)]
pub struct MaterialTypeRegistry {
    types: Vec<(MaterialTypeTag, MaterialTypeInfo)>,
}

impl MaterialTypeRegistry {
    /// Create the pipelines for every material type
    pub fn new<B: RenderBackend>(backend: &mut B) -> Result<Self, RenderError> {
        let mut types = Vec::with_capacity(MaterialTypeTag::ALL.len());

        for tag in MaterialTypeTag::ALL {
            let pipeline = backend.create_pipeline(&PipelineDesc {
                label: tag.label(),
                vertex_stride: tag.vertex_stride(),
                texture_count: tag.texture_count(),
                depth_only: false,
            })?;
            let shadow_pipeline = backend.create_pipeline(&PipelineDesc {
                label: tag.label(),
                vertex_stride: tag.vertex_stride(),
                texture_count: tag.texture_count(),
                depth_only: true,
            })?;

            types.push((
                tag,
                MaterialTypeInfo {
                    pipeline,
                    shadow_pipeline,
                    vertex_stride: tag.vertex_stride(),
                },
            ));
        }

        Ok(Self { types })
    }

    /// Look up the info for a material type
    pub fn info(&self, tag: MaterialTypeTag) -> MaterialTypeInfo {
        // The registry always holds every tag.
        self.types
            .iter()
            .find(|(t, _)| *t == tag)
            .map(|(_, info)| *info)
            .unwrap_or_else(|| unreachable!("registry holds all material types"))
    }

    /// Pipeline for a material type in the given pass
    pub fn pipeline(&self, tag: MaterialTypeTag, drawing_shadow: bool) -> PipelineHandle {
        let info = self.info(tag);
        if drawing_shadow {
            info.shadow_pipeline
        } else {
            info.pipeline
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::backend::RecordingBackend;

    #[test]
    fn test_registry_creates_pipeline_pair_per_type() {
        let mut backend = RecordingBackend::new(1280, 720);
        let registry = MaterialTypeRegistry::new(&mut backend).unwrap();

        for tag in MaterialTypeTag::ALL {
            let info = registry.info(tag);
            assert_ne!(info.pipeline, info.shadow_pipeline);
            assert_eq!(
                registry.pipeline(tag, true),
                info.shadow_pipeline,
            );
        }
    }

    #[test]
    fn test_texture_set_dispatches_on_kind() {
        let pbr = Material {
            name: "m".to_string(),
            normal_map: TextureData::solid(Vec3::new(0.5, 0.5, 1.0), false),
            kind: MaterialKind::Pbr {
                albedo: TextureData::solid(Vec3::new(1.0, 0.0, 0.0), false),
                roughness: TextureData::solid_scalar(0.4),
                metalness: TextureData::solid_scalar(0.0),
            },
            binding: None,
        };
        assert_eq!(pbr.texture_set().len(), 4);
        assert_eq!(pbr.type_tag(), MaterialTypeTag::Pbr);

        let simple = Material::default_simple();
        assert!(simple.texture_set().is_empty());
        assert_eq!(simple.type_tag(), MaterialTypeTag::Simple);
    }
}
