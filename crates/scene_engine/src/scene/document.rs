//! Scene document linking.
//!
//! A document is a flat array: element 0 is the `"s72-v1"` format tag,
//! elements 1..N are typed records that reference each other by array
//! index, in arbitrary order. Linking therefore runs in two passes:
//!
//! 1. **Construct** — every record becomes an arena entity in isolation;
//!    side tables map record index to arena key.
//! 2. **Link** — index-valued fields resolve through the side tables into
//!    typed keys.
//!
//! Any malformed record is a hard error carrying the offending index and
//! field; no partial scene is ever returned.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde_json::Value;
use thiserror::Error;

use crate::assets::{AssetError, FileCache, TextureData};
use crate::foundation::math::{DVec3, DVec4, Vec3, Vec4};

use super::animation::{Driver, Interpolation};
use super::camera::Camera;
use super::environment::Environment;
use super::graph::Scene;
use super::light::{Light, LightKind};
use super::material::{Material, MaterialKind};
use super::mesh::{Attribute, AttributeFormat, Mesh, Topology};
use super::node::Node;
use super::{
    CameraKey, EnvironmentKey, LightKey, MaterialKey, MeshKey, NodeKey, RotationDriverKey,
    ScaleDriverKey, TranslationDriverKey,
};

/// The format tag the first document element must carry
pub const FORMAT_TAG: &str = "s72-v1";

/// Number of prefiltered radiance mip files accompanying an environment
const ENVIRONMENT_EXTRA_MIPS: usize = 4;

/// Document loading and linking errors
#[derive(Error, Debug)]
pub enum DocumentError {
    /// The document root is not an array
    #[error("scene document is not an array")]
    NotAnArray,

    /// Element 0 is not the expected format tag
    #[error("document does not start with the \"s72-v1\" format tag")]
    FormatTag,

    /// The document has no SCENE record
    #[error("document contains no SCENE record")]
    MissingScene,

    /// A required field is absent
    #[error("record {index}: missing required field \"{field}\"")]
    MissingField {
        /// Offending record index
        index: usize,
        /// Missing field name
        field: &'static str,
    },

    /// A field is present with the wrong JSON type or shape
    #[error("record {index}: field \"{field}\" has the wrong type")]
    WrongType {
        /// Offending record index
        index: usize,
        /// Offending field name
        field: &'static str,
    },

    /// An index-valued field does not resolve to a record of the expected
    /// type
    #[error(
        "record {index}: field \"{field}\" references record {target}, \
         which is not a {expected} record"
    )]
    BadReference {
        /// Offending record index
        index: usize,
        /// Referencing field name
        field: &'static str,
        /// The unresolvable index
        target: usize,
        /// Expected record type
        expected: &'static str,
    },

    /// An enumerated string field has an unrecognized value
    #[error("record {index}: unknown {what} \"{value}\"")]
    UnknownTag {
        /// Offending record index
        index: usize,
        /// What kind of tag was being parsed
        what: &'static str,
        /// The unrecognized value
        value: String,
    },

    /// A driver has no keyframes
    #[error("record {index}: driver has no keyframes")]
    EmptyDriver {
        /// Offending record index
        index: usize,
    },

    /// A referenced texture could not be loaded
    #[error("record {index}: {source}")]
    Texture {
        /// Offending record index
        index: usize,
        /// Underlying asset error
        source: AssetError,
    },

    /// The requested camera name matched nothing; lists what exists
    #[error(
        "no camera named \"{requested}\"; available cameras: {}",
        .available.join(", ")
    )]
    CameraNotFound {
        /// The name that was requested
        requested: String,
        /// Every camera name the document declares
        available: Vec<String>,
    },
}

/// Which channel arena a driver record landed in
enum DriverRef {
    Translation(TranslationDriverKey),
    Rotation(RotationDriverKey),
    Scale(ScaleDriverKey),
}

/// Side tables mapping record indices to arena keys during linking.
///
/// An index absent from the relevant table is an unresolved reference; the
/// link pass turns every lookup failure into a [`DocumentError::BadReference`].
#[derive(Default)]
struct IndexTables {
    nodes: BTreeMap<usize, NodeKey>,
    meshes: BTreeMap<usize, MeshKey>,
    cameras: BTreeMap<usize, CameraKey>,
    environments: BTreeMap<usize, EnvironmentKey>,
    materials: BTreeMap<usize, MaterialKey>,
    lights: BTreeMap<usize, LightKey>,
    drivers: BTreeMap<usize, DriverRef>,
}

/// Link a scene document into a [`Scene`].
///
/// `camera_filter` selects the current camera by name; the first matching
/// CAMERA record wins. Without a filter, the first camera encountered is
/// selected (the detached camera when there are none). A filter that
/// matches nothing is an error that enumerates every declared camera.
pub fn load_scene(
    document: &Value,
    cache: &mut FileCache,
    camera_filter: Option<&str>,
) -> Result<Scene, DocumentError> {
    let records = document.as_array().ok_or(DocumentError::NotAnArray)?;

    match records.first().and_then(Value::as_str) {
        Some(FORMAT_TAG) => {}
        _ => return Err(DocumentError::FormatTag),
    }

    let mut scene = Scene::new("");
    let mut tables = IndexTables::default();
    let mut scene_seen = false;
    let mut active_environment: Option<EnvironmentKey> = None;
    let mut camera_names: Vec<String> = Vec::new();
    let mut selected_camera: Option<(usize, CameraKey)> = None;

    // Pass 1: construct every record in isolation.
    for (index, value) in records.iter().enumerate().skip(1) {
        let record = as_object(value, index)?;
        let record_type = require_str(record, index, "type")?;

        match record_type {
            "SCENE" => {
                scene.name = require_str(record, index, "name")?.to_string();
                scene_seen = true;
            }
            "NODE" => {
                let name = require_str(record, index, "name")?.to_string();
                let translation =
                    optional_vec3(record, index, "translation")?.unwrap_or_else(Vec3::zeros);
                let rotation = optional_vec4(record, index, "rotation")?
                    .unwrap_or_else(|| Vec4::new(0.0, 0.0, 0.0, 1.0));
                let scale = optional_vec3(record, index, "scale")?
                    .unwrap_or_else(|| Vec3::new(1.0, 1.0, 1.0));

                let key = scene.nodes.insert(Node::new(name, translation, rotation, scale));
                tables.nodes.insert(index, key);
            }
            "CAMERA" => {
                let name = require_str(record, index, "name")?.to_string();
                let perspective = as_object(require(record, index, "perspective")?, index)?;
                let aspect = require_f32(perspective, index, "aspect")?;
                let vfov = require_f32(perspective, index, "vfov")?;
                let near = require_f32(perspective, index, "near")?;
                let far = optional_f32(perspective, index, "far")?.unwrap_or(f32::INFINITY);

                camera_names.push(name.clone());
                let key = scene.cameras.insert(Camera::new(&name, aspect, vfov, near, far));
                tables.cameras.insert(index, key);
                scene.cameras_enumerated.push(key);

                let matches = match camera_filter {
                    None => true,
                    Some(filter) => filter == name,
                };
                if matches && selected_camera.is_none() {
                    selected_camera = Some((scene.cameras_enumerated.len() - 1, key));
                }
            }
            "MESH" => {
                let name = require_str(record, index, "name")?.to_string();
                let count = require_u32(record, index, "count")?;
                let topology = match record.get("topology").and_then(Value::as_str) {
                    None => Topology::default(),
                    Some(tag) => Topology::parse(tag).ok_or_else(|| DocumentError::UnknownTag {
                        index,
                        what: "topology",
                        value: tag.to_string(),
                    })?,
                };

                let mut mesh = Mesh::new(name, count, topology);

                let attributes = as_object(require(record, index, "attributes")?, index)?;
                for (attr_name, attr_value) in attributes {
                    let attr = as_object(attr_value, index)?;
                    let format_tag = require_str(attr, index, "format")?;
                    let format = AttributeFormat::parse(format_tag).ok_or_else(|| {
                        DocumentError::UnknownTag {
                            index,
                            what: "attribute format",
                            value: format_tag.to_string(),
                        }
                    })?;

                    mesh.attributes.insert(
                        attr_name.clone(),
                        Attribute {
                            src: PathBuf::from(require_str(attr, index, "src")?),
                            offset: require_usize(attr, index, "offset")?,
                            stride: require_usize(attr, index, "stride")?,
                            format,
                            data: None,
                        },
                    );
                }

                let key = scene.meshes.insert(mesh);
                tables.meshes.insert(index, key);
            }
            "DRIVER" => {
                let driver_ref = construct_driver(&mut scene, record, index)?;
                tables.drivers.insert(index, driver_ref);
            }
            "MATERIAL" => {
                let key = scene
                    .materials
                    .insert(construct_material(cache, record, index)?);
                tables.materials.insert(index, key);
            }
            "ENVIRONMENT" => {
                let key = scene
                    .environments
                    .insert(construct_environment(cache, record, index)?);
                tables.environments.insert(index, key);
                active_environment = Some(key);
            }
            "LIGHT" => {
                let key = scene.lights.insert(construct_light(record, index)?);
                tables.lights.insert(index, key);
            }
            other => {
                log::warn!("record {index}: ignoring unknown record type \"{other}\"");
            }
        }
    }

    if !scene_seen {
        return Err(DocumentError::MissingScene);
    }

    // Pass 2: resolve index-valued fields through the side tables.
    for (index, value) in records.iter().enumerate().skip(1) {
        let record = as_object(value, index)?;
        let record_type = require_str(record, index, "type")?;

        match record_type {
            "SCENE" => {
                for target in index_array(record, index, "roots")? {
                    let key = *tables.nodes.get(&target).ok_or(DocumentError::BadReference {
                        index,
                        field: "roots",
                        target,
                        expected: "NODE",
                    })?;
                    scene.roots.push(key);
                }
            }
            "NODE" => {
                let node_key = tables.nodes[&index];

                if record.contains_key("children") {
                    for target in index_array(record, index, "children")? {
                        let key =
                            *tables.nodes.get(&target).ok_or(DocumentError::BadReference {
                                index,
                                field: "children",
                                target,
                                expected: "NODE",
                            })?;
                        scene.nodes[node_key].children.push(key);
                    }
                }

                if let Some(target) = optional_index(record, index, "camera")? {
                    let key = *tables.cameras.get(&target).ok_or(DocumentError::BadReference {
                        index,
                        field: "camera",
                        target,
                        expected: "CAMERA",
                    })?;
                    scene.nodes[node_key].camera = Some(key);
                }

                if let Some(target) = optional_index(record, index, "mesh")? {
                    let key = *tables.meshes.get(&target).ok_or(DocumentError::BadReference {
                        index,
                        field: "mesh",
                        target,
                        expected: "MESH",
                    })?;
                    scene.nodes[node_key].mesh = Some(key);
                }

                if let Some(target) = optional_index(record, index, "environment")? {
                    let key = *tables
                        .environments
                        .get(&target)
                        .ok_or(DocumentError::BadReference {
                            index,
                            field: "environment",
                            target,
                            expected: "ENVIRONMENT",
                        })?;
                    scene.nodes[node_key].environment = Some(key);
                }

                if let Some(target) = optional_index(record, index, "light")? {
                    let key = *tables.lights.get(&target).ok_or(DocumentError::BadReference {
                        index,
                        field: "light",
                        target,
                        expected: "LIGHT",
                    })?;
                    scene.nodes[node_key].light = Some(key);
                }
            }
            "DRIVER" => {
                let target = require_usize(record, index, "node")?;
                let node_key = *tables.nodes.get(&target).ok_or(DocumentError::BadReference {
                    index,
                    field: "node",
                    target,
                    expected: "NODE",
                })?;

                let node = &mut scene.nodes[node_key];
                match &tables.drivers[&index] {
                    DriverRef::Translation(key) => node.translation_driver = Some(*key),
                    DriverRef::Rotation(key) => node.rotation_driver = Some(*key),
                    DriverRef::Scale(key) => node.scale_driver = Some(*key),
                }
            }
            "MESH" => {
                if let Some(target) = optional_index(record, index, "material")? {
                    let key = *tables
                        .materials
                        .get(&target)
                        .ok_or(DocumentError::BadReference {
                            index,
                            field: "material",
                            target,
                            expected: "MATERIAL",
                        })?;
                    scene.meshes[tables.meshes[&index]].material = Some(key);
                }
            }
            _ => {}
        }
    }

    if let Some(env) = active_environment {
        scene.environment = env;
    }

    match (selected_camera, camera_filter) {
        (Some((enumerated_index, key)), _) => {
            scene.current_camera = key;
            scene.current_camera_index = enumerated_index;
        }
        (None, Some(requested)) => {
            return Err(DocumentError::CameraNotFound {
                requested: requested.to_string(),
                available: camera_names,
            });
        }
        (None, None) => {}
    }

    log::info!(
        "linked scene \"{}\": {} nodes, {} meshes, {} cameras, {} lights",
        scene.name,
        scene.nodes.len(),
        scene.meshes.len(),
        scene.cameras.len() - 2,
        scene.lights.len()
    );
    Ok(scene)
}

fn construct_driver(
    scene: &mut Scene,
    record: &serde_json::Map<String, Value>,
    index: usize,
) -> Result<DriverRef, DocumentError> {
    let name = require_str(record, index, "name")?.to_string();
    let channel = require_str(record, index, "channel")?;
    let interpolation_tag = require_str(record, index, "interpolation")?;
    let interpolation =
        Interpolation::parse(interpolation_tag).ok_or_else(|| DocumentError::UnknownTag {
            index,
            what: "interpolation",
            value: interpolation_tag.to_string(),
        })?;

    let times = number_array(record, index, "times")?;
    if times.is_empty() {
        return Err(DocumentError::EmptyDriver { index });
    }
    let values = number_array(record, index, "values")?;

    let components = match channel {
        "translation" | "scale" => 3,
        "rotation" => 4,
        other => {
            return Err(DocumentError::UnknownTag {
                index,
                what: "driver channel",
                value: other.to_string(),
            })
        }
    };
    if values.len() < times.len() * components {
        return Err(DocumentError::WrongType {
            index,
            field: "values",
        });
    }

    Ok(match channel {
        "translation" | "scale" => {
            let grouped: Vec<DVec3> = values
                .chunks_exact(3)
                .take(times.len())
                .map(|c| DVec3::new(c[0], c[1], c[2]))
                .collect();
            let driver = Driver::new(name, times, grouped, interpolation);
            if channel == "translation" {
                DriverRef::Translation(scene.translation_drivers.insert(driver))
            } else {
                DriverRef::Scale(scene.scale_drivers.insert(driver))
            }
        }
        _ => {
            let grouped: Vec<DVec4> = values
                .chunks_exact(4)
                .take(times.len())
                .map(|c| DVec4::new(c[0], c[1], c[2], c[3]))
                .collect();
            DriverRef::Rotation(
                scene
                    .rotation_drivers
                    .insert(Driver::new(name, times, grouped, interpolation)),
            )
        }
    })
}

fn construct_material(
    cache: &mut FileCache,
    record: &serde_json::Map<String, Value>,
    index: usize,
) -> Result<Material, DocumentError> {
    let name = require_str(record, index, "name")?.to_string();

    let normal_map = match record.get("normalMap") {
        Some(value) => texture_from_value(cache, index, value)?,
        // Flat +Z normal when the document provides none.
        None => TextureData::solid(Vec3::new(0.5, 0.5, 1.0), false),
    };

    let kind = if let Some(pbr) = record.get("pbr") {
        let pbr = as_object(pbr, index)?;
        MaterialKind::Pbr {
            albedo: texture_from_value(cache, index, require(pbr, index, "albedo")?)?,
            roughness: texture_from_value(cache, index, require(pbr, index, "roughness")?)?,
            metalness: texture_from_value(cache, index, require(pbr, index, "metalness")?)?,
        }
    } else if let Some(lambertian) = record.get("lambertian") {
        let lambertian = as_object(lambertian, index)?;
        MaterialKind::Lambertian {
            albedo: texture_from_value(cache, index, require(lambertian, index, "albedo")?)?,
        }
    } else if record.contains_key("mirror") {
        MaterialKind::Mirror
    } else if record.contains_key("environment") {
        MaterialKind::Environment
    } else {
        MaterialKind::Simple
    };

    Ok(Material {
        name,
        normal_map,
        kind,
        binding: None,
    })
}

fn construct_environment(
    cache: &mut FileCache,
    record: &serde_json::Map<String, Value>,
    index: usize,
) -> Result<Environment, DocumentError> {
    let name = require_str(record, index, "name")?.to_string();
    let radiance = as_object(require(record, index, "radiance")?, index)?;

    let src = require_str(radiance, index, "src")?;
    let cube = radiance.get("type").and_then(Value::as_str) == Some("cube");
    let rgbe = radiance.get("format").and_then(Value::as_str) == Some("rgbe");

    let texture_pbr =
        TextureData::from_file_with_mips(cache, Path::new(src), cube, rgbe, ENVIRONMENT_EXTRA_MIPS)
            .map_err(|source| DocumentError::Texture { index, source })?;

    // The irradiance cube sits next to the radiance file with a ".l.png"
    // suffix.
    let lambertian_src = format!("{src}.l.png");
    let texture_lambertian = TextureData::from_file(cache, Path::new(&lambertian_src), cube, rgbe)
        .map_err(|source| DocumentError::Texture { index, source })?;

    Ok(Environment::new(name, texture_pbr, texture_lambertian))
}

fn construct_light(
    record: &serde_json::Map<String, Value>,
    index: usize,
) -> Result<Light, DocumentError> {
    let name = require_str(record, index, "name")?.to_string();
    let tint = required_vec3(record, index, "tint")?;
    let shadow_resolution = optional_u32(record, index, "shadow")?.unwrap_or(0);

    if let Some(sun) = record.get("sun") {
        let sun = as_object(sun, index)?;
        return Ok(Light {
            name,
            tint,
            power: require_f32(sun, index, "strength")?,
            kind: LightKind::Sun {
                angle: require_f32(sun, index, "angle")?,
            },
        });
    }

    if let Some(sphere) = record.get("sphere") {
        let sphere = as_object(sphere, index)?;
        return Ok(Light {
            name,
            tint,
            power: require_f32(sphere, index, "power")?,
            kind: LightKind::Spot {
                radius: require_f32(sphere, index, "radius")?,
                limit: optional_f32(sphere, index, "limit")?.unwrap_or(f32::INFINITY),
                fov: -1.0,
                blend: -1.0,
                shadow_resolution,
            },
        });
    }

    if let Some(spot) = record.get("spot") {
        let spot = as_object(spot, index)?;
        return Ok(Light {
            name,
            tint,
            power: require_f32(spot, index, "power")?,
            kind: LightKind::Spot {
                radius: require_f32(spot, index, "radius")?,
                limit: optional_f32(spot, index, "limit")?.unwrap_or(f32::INFINITY),
                fov: require_f32(spot, index, "fov")?,
                blend: require_f32(spot, index, "blend")?,
                shadow_resolution,
            },
        });
    }

    Err(DocumentError::MissingField {
        index,
        field: "sun|sphere|spot",
    })
}

/// Inline texture constant (color array or scalar) or `{src, type?, format?}`
/// file reference.
fn texture_from_value(
    cache: &mut FileCache,
    index: usize,
    value: &Value,
) -> Result<TextureData, DocumentError> {
    match value {
        Value::Array(_) => {
            let color = vec3_from_value(value, index, "texture")?;
            Ok(TextureData::solid(color, false))
        }
        Value::Number(n) => Ok(TextureData::solid_scalar(
            n.as_f64().unwrap_or_default() as f32
        )),
        Value::Object(object) => {
            let src = require_str(object, index, "src")?;
            let cube = object.get("type").and_then(Value::as_str) == Some("cube");
            let rgbe = object.get("format").and_then(Value::as_str) == Some("rgbe");
            TextureData::from_file(cache, Path::new(src), cube, rgbe)
                .map_err(|source| DocumentError::Texture { index, source })
        }
        _ => Err(DocumentError::WrongType {
            index,
            field: "texture",
        }),
    }
}

// --- JSON accessor helpers -------------------------------------------------

fn as_object<'a>(
    value: &'a Value,
    index: usize,
) -> Result<&'a serde_json::Map<String, Value>, DocumentError> {
    value.as_object().ok_or(DocumentError::WrongType {
        index,
        field: "(object)",
    })
}

fn require<'a>(
    object: &'a serde_json::Map<String, Value>,
    index: usize,
    field: &'static str,
) -> Result<&'a Value, DocumentError> {
    object
        .get(field)
        .ok_or(DocumentError::MissingField { index, field })
}

fn require_str<'a>(
    object: &'a serde_json::Map<String, Value>,
    index: usize,
    field: &'static str,
) -> Result<&'a str, DocumentError> {
    require(object, index, field)?
        .as_str()
        .ok_or(DocumentError::WrongType { index, field })
}

fn require_f32(
    object: &serde_json::Map<String, Value>,
    index: usize,
    field: &'static str,
) -> Result<f32, DocumentError> {
    require(object, index, field)?
        .as_f64()
        .map(|v| v as f32)
        .ok_or(DocumentError::WrongType { index, field })
}

fn require_u32(
    object: &serde_json::Map<String, Value>,
    index: usize,
    field: &'static str,
) -> Result<u32, DocumentError> {
    require(object, index, field)?
        .as_u64()
        .map(|v| v as u32)
        .ok_or(DocumentError::WrongType { index, field })
}

fn require_usize(
    object: &serde_json::Map<String, Value>,
    index: usize,
    field: &'static str,
) -> Result<usize, DocumentError> {
    require(object, index, field)?
        .as_u64()
        .map(|v| v as usize)
        .ok_or(DocumentError::WrongType { index, field })
}

fn optional_f32(
    object: &serde_json::Map<String, Value>,
    index: usize,
    field: &'static str,
) -> Result<Option<f32>, DocumentError> {
    match object.get(field) {
        None => Ok(None),
        Some(value) => value
            .as_f64()
            .map(|v| Some(v as f32))
            .ok_or(DocumentError::WrongType { index, field }),
    }
}

fn optional_u32(
    object: &serde_json::Map<String, Value>,
    index: usize,
    field: &'static str,
) -> Result<Option<u32>, DocumentError> {
    match object.get(field) {
        None => Ok(None),
        Some(value) => value
            .as_u64()
            .map(|v| Some(v as u32))
            .ok_or(DocumentError::WrongType { index, field }),
    }
}

fn optional_index(
    object: &serde_json::Map<String, Value>,
    index: usize,
    field: &'static str,
) -> Result<Option<usize>, DocumentError> {
    match object.get(field) {
        None => Ok(None),
        Some(value) => value
            .as_u64()
            .map(|v| Some(v as usize))
            .ok_or(DocumentError::WrongType { index, field }),
    }
}

fn number_array(
    object: &serde_json::Map<String, Value>,
    index: usize,
    field: &'static str,
) -> Result<Vec<f64>, DocumentError> {
    require(object, index, field)?
        .as_array()
        .ok_or(DocumentError::WrongType { index, field })?
        .iter()
        .map(|v| v.as_f64().ok_or(DocumentError::WrongType { index, field }))
        .collect()
}

fn index_array(
    object: &serde_json::Map<String, Value>,
    index: usize,
    field: &'static str,
) -> Result<Vec<usize>, DocumentError> {
    require(object, index, field)?
        .as_array()
        .ok_or(DocumentError::WrongType { index, field })?
        .iter()
        .map(|v| {
            v.as_u64()
                .map(|n| n as usize)
                .ok_or(DocumentError::WrongType { index, field })
        })
        .collect()
}

fn vec3_from_value(value: &Value, index: usize, field: &'static str) -> Result<Vec3, DocumentError> {
    let array = value
        .as_array()
        .ok_or(DocumentError::WrongType { index, field })?;
    if array.len() < 3 {
        return Err(DocumentError::WrongType { index, field });
    }

    let mut components = [0.0f32; 3];
    for (slot, v) in components.iter_mut().zip(array) {
        *slot = v
            .as_f64()
            .ok_or(DocumentError::WrongType { index, field })? as f32;
    }
    Ok(Vec3::new(components[0], components[1], components[2]))
}

fn required_vec3(
    object: &serde_json::Map<String, Value>,
    index: usize,
    field: &'static str,
) -> Result<Vec3, DocumentError> {
    vec3_from_value(require(object, index, field)?, index, field)
}

fn optional_vec3(
    object: &serde_json::Map<String, Value>,
    index: usize,
    field: &'static str,
) -> Result<Option<Vec3>, DocumentError> {
    match object.get(field) {
        None => Ok(None),
        Some(value) => vec3_from_value(value, index, field).map(Some),
    }
}

fn optional_vec4(
    object: &serde_json::Map<String, Value>,
    index: usize,
    field: &'static str,
) -> Result<Option<Vec4>, DocumentError> {
    let Some(value) = object.get(field) else {
        return Ok(None);
    };
    let array = value
        .as_array()
        .ok_or(DocumentError::WrongType { index, field })?;
    if array.len() < 4 {
        return Err(DocumentError::WrongType { index, field });
    }

    let mut components = [0.0f32; 4];
    for (slot, v) in components.iter_mut().zip(array) {
        *slot = v
            .as_f64()
            .ok_or(DocumentError::WrongType { index, field })? as f32;
    }
    Ok(Some(Vec4::new(
        components[0],
        components[1],
        components[2],
        components[3],
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cache() -> FileCache {
        FileCache::new()
    }

    #[test]
    fn test_format_tag_is_checked() {
        let doc = json!(["not-the-tag", { "type": "SCENE", "name": "s", "roots": [] }]);
        assert!(matches!(
            load_scene(&doc, &mut cache(), None),
            Err(DocumentError::FormatTag)
        ));
    }

    #[test]
    fn test_dangling_child_reference_fails() {
        let doc = json!([
            "s72-v1",
            { "type": "SCENE", "name": "s", "roots": [1] },
            { "type": "NODE", "name": "n", "children": [7] }
        ]);

        let err = load_scene(&doc, &mut cache(), None).unwrap_err();
        assert!(matches!(
            err,
            DocumentError::BadReference {
                field: "children",
                target: 7,
                ..
            }
        ));
    }

    #[test]
    fn test_forward_references_link() {
        // The node references a mesh declared after it; pass 2 resolves it
        // regardless of declaration order.
        let doc = json!([
            "s72-v1",
            { "type": "NODE", "name": "n", "mesh": 3 },
            { "type": "SCENE", "name": "s", "roots": [1] },
            { "type": "MESH", "name": "m", "count": 3, "attributes": {
                "POSITION": { "src": "p.bin", "offset": 0, "stride": 12,
                              "format": "R32G32B32_SFLOAT" }
            }}
        ]);

        let scene = load_scene(&doc, &mut cache(), None).unwrap();
        let node = &scene.nodes[scene.roots[0]];
        assert!(node.mesh.is_some());
        assert_eq!(scene.meshes[node.mesh.unwrap()].name, "m");
    }

    #[test]
    fn test_missing_required_field_fails() {
        let doc = json!([
            "s72-v1",
            { "type": "SCENE", "name": "s", "roots": [] },
            { "type": "CAMERA", "name": "c", "perspective": { "aspect": 1.0, "vfov": 1.0 } }
        ]);

        let err = load_scene(&doc, &mut cache(), None).unwrap_err();
        assert!(matches!(
            err,
            DocumentError::MissingField { index: 2, field: "near" }
        ));
    }

    #[test]
    fn test_unmatched_camera_filter_lists_names() {
        let doc = json!([
            "s72-v1",
            { "type": "SCENE", "name": "s", "roots": [] },
            { "type": "CAMERA", "name": "main",
              "perspective": { "aspect": 1.0, "vfov": 1.0, "near": 0.1 } },
            { "type": "CAMERA", "name": "side",
              "perspective": { "aspect": 1.0, "vfov": 1.0, "near": 0.1 } }
        ]);

        let err = load_scene(&doc, &mut cache(), Some("front")).unwrap_err();
        match err {
            DocumentError::CameraNotFound { requested, available } => {
                assert_eq!(requested, "front");
                assert_eq!(available, vec!["main".to_string(), "side".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_first_camera_selected_without_filter() {
        let doc = json!([
            "s72-v1",
            { "type": "SCENE", "name": "s", "roots": [] },
            { "type": "CAMERA", "name": "first",
              "perspective": { "aspect": 1.0, "vfov": 1.0, "near": 0.1 } },
            { "type": "CAMERA", "name": "second",
              "perspective": { "aspect": 1.0, "vfov": 1.0, "near": 0.1 } }
        ]);

        let scene = load_scene(&doc, &mut cache(), None).unwrap();
        assert_eq!(scene.cameras[scene.current_camera].name, "first");
        // The detached camera occupies enumeration slot 0.
        assert_eq!(scene.current_camera_index, 1);
    }

    #[test]
    fn test_camera_filter_selects_matching_camera() {
        let doc = json!([
            "s72-v1",
            { "type": "SCENE", "name": "s", "roots": [] },
            { "type": "CAMERA", "name": "first",
              "perspective": { "aspect": 1.0, "vfov": 1.0, "near": 0.1 } },
            { "type": "CAMERA", "name": "second",
              "perspective": { "aspect": 1.0, "vfov": 1.0, "near": 0.1, "far": 50.0 } }
        ]);

        let scene = load_scene(&doc, &mut cache(), Some("second")).unwrap();
        let camera = &scene.cameras[scene.current_camera];
        assert_eq!(camera.name, "second");
        assert_eq!(camera.far_plane, 50.0);
    }

    #[test]
    fn test_driver_links_to_node_channel() {
        let doc = json!([
            "s72-v1",
            { "type": "SCENE", "name": "s", "roots": [1] },
            { "type": "NODE", "name": "n" },
            { "type": "DRIVER", "name": "d", "node": 1, "channel": "rotation",
              "times": [0.0, 1.0],
              "values": [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0],
              "interpolation": "SLERP" }
        ]);

        let scene = load_scene(&doc, &mut cache(), None).unwrap();
        let node = &scene.nodes[scene.roots[0]];
        assert!(node.rotation_driver.is_some());
        assert!(node.translation_driver.is_none());
        assert_eq!(scene.rotation_drivers.len(), 1);
    }

    #[test]
    fn test_driver_without_keyframes_fails() {
        let doc = json!([
            "s72-v1",
            { "type": "SCENE", "name": "s", "roots": [1] },
            { "type": "NODE", "name": "n" },
            { "type": "DRIVER", "name": "d", "node": 1, "channel": "translation",
              "times": [], "values": [], "interpolation": "LINEAR" }
        ]);

        assert!(matches!(
            load_scene(&doc, &mut cache(), None),
            Err(DocumentError::EmptyDriver { index: 2 })
        ));
    }

    #[test]
    fn test_material_kinds_construct() {
        let doc = json!([
            "s72-v1",
            { "type": "SCENE", "name": "s", "roots": [] },
            { "type": "MATERIAL", "name": "plain" },
            { "type": "MATERIAL", "name": "shiny", "mirror": {} },
            { "type": "MATERIAL", "name": "matte",
              "lambertian": { "albedo": [0.8, 0.2, 0.2] } },
            { "type": "MATERIAL", "name": "full",
              "pbr": { "albedo": [1.0, 1.0, 1.0], "roughness": 0.5, "metalness": 0.0 } }
        ]);

        let scene = load_scene(&doc, &mut cache(), None).unwrap();
        // The four document materials plus the built-in default.
        assert_eq!(scene.materials.len(), 5);

        let kinds: Vec<_> = scene
            .materials
            .values()
            .map(|m| m.type_tag())
            .collect();
        assert!(kinds.contains(&crate::scene::MaterialTypeTag::Mirror));
        assert!(kinds.contains(&crate::scene::MaterialTypeTag::Pbr));
        assert!(kinds.contains(&crate::scene::MaterialTypeTag::Lambertian));
    }

    #[test]
    fn test_sphere_light_is_omni_with_optional_limit() {
        let doc = json!([
            "s72-v1",
            { "type": "SCENE", "name": "s", "roots": [] },
            { "type": "LIGHT", "name": "bulb", "tint": [1.0, 0.5, 0.2],
              "sphere": { "radius": 0.05, "power": 20.0 } }
        ]);

        let scene = load_scene(&doc, &mut cache(), None).unwrap();
        let light = scene.lights.values().next().unwrap();
        match light.kind {
            LightKind::Spot { limit, fov, .. } => {
                assert!(limit.is_infinite());
                assert!(fov <= 0.0);
            }
            _ => panic!("expected a sphere light"),
        }
    }
}
