//! Meshes: vertex attribute tables, bounding corners, GPU upload.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::rc::Rc;

use crate::assets::{AssetError, FileCache};
use crate::foundation::math::Vec3;
use crate::render::backend::{RenderBackend, RenderError, VertexBufferHandle};

use super::MaterialKey;

/// Primitive topology of a mesh
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Topology {
    /// Isolated points
    PointList,
    /// Isolated line segments
    LineList,
    /// Connected line strip
    LineStrip,
    /// Isolated triangles
    #[default]
    TriangleList,
    /// Connected triangle strip
    TriangleStrip,
    /// Triangle fan around the first vertex
    TriangleFan,
}

impl Topology {
    /// Parse a document topology tag
    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "POINT_LIST" => Some(Self::PointList),
            "LINE_LIST" => Some(Self::LineList),
            "LINE_STRIP" => Some(Self::LineStrip),
            "TRIANGLE_LIST" => Some(Self::TriangleList),
            "TRIANGLE_STRIP" => Some(Self::TriangleStrip),
            "TRIANGLE_FAN" => Some(Self::TriangleFan),
            _ => None,
        }
    }
}

/// Component layout of one vertex attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeFormat {
    /// Two 32-bit floats
    Rg32Sfloat,
    /// Three 32-bit floats
    Rgb32Sfloat,
    /// Four 32-bit floats
    Rgba32Sfloat,
    /// Four normalized bytes
    Rgba8Unorm,
}

impl AttributeFormat {
    /// Parse a document format tag
    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "R32G32_SFLOAT" => Some(Self::Rg32Sfloat),
            "R32G32B32_SFLOAT" => Some(Self::Rgb32Sfloat),
            "R32G32B32A32_SFLOAT" => Some(Self::Rgba32Sfloat),
            "R8G8B8A8_UNORM" => Some(Self::Rgba8Unorm),
            _ => None,
        }
    }
}

/// One vertex attribute stream: a byte range inside a buffer file
#[derive(Debug, Clone)]
pub struct Attribute {
    /// Buffer file path
    pub src: PathBuf,
    /// Byte offset of the first element
    pub offset: usize,
    /// Byte stride between elements
    pub stride: usize,
    /// Component layout
    pub format: AttributeFormat,
    /// Backing bytes, resolved through the file cache at load
    pub data: Option<Rc<[u8]>>,
}

/// A drawable mesh instance
#[derive(Debug, Clone)]
pub struct Mesh {
    /// Mesh name from the document
    pub name: String,
    /// Vertex count
    pub count: u32,
    /// Primitive topology
    pub topology: Topology,
    /// Attribute streams by name (POSITION is required)
    pub attributes: BTreeMap<String, Attribute>,
    /// Material reference; the default material is used when absent
    pub material: Option<MaterialKey>,
    /// The 8 corners of the local-space bounding box, computed at load from
    /// the POSITION stream's per-axis min/max
    pub corners: [Vec3; 8],
    /// Backend vertex buffer, created at renderer init
    pub buffer: Option<VertexBufferHandle>,
}

impl Mesh {
    /// Create a mesh shell; attribute data and corners are filled by
    /// [`Mesh::load_data`].
    pub fn new(name: String, count: u32, topology: Topology) -> Self {
        Self {
            name,
            count,
            topology,
            attributes: BTreeMap::new(),
            material: None,
            corners: [Vec3::zeros(); 8],
            buffer: None,
        }
    }

    /// Resolve attribute byte ranges through the file cache and precompute
    /// the bounding corners from the POSITION stream.
    pub fn load_data(&mut self, cache: &mut FileCache) -> Result<(), AssetError> {
        for attribute in self.attributes.values_mut() {
            attribute.data = Some(cache.read(&attribute.src)?);
        }

        self.compute_corners();
        Ok(())
    }

    /// Upload the interleaved vertex range to the backend
    pub fn upload<B: RenderBackend>(&mut self, backend: &mut B) -> Result<(), RenderError> {
        let Some(position) = self.attributes.get("POSITION") else {
            return Err(RenderError::Backend(format!(
                "mesh \"{}\" has no POSITION attribute",
                self.name
            )));
        };
        let Some(data) = &position.data else {
            return Err(RenderError::Backend(format!(
                "mesh \"{}\" uploaded before its data was loaded",
                self.name
            )));
        };

        let len = (position.stride * self.count as usize).min(data.len());
        self.buffer = Some(backend.create_vertex_buffer(&data[..len])?);
        Ok(())
    }

    /// Per-axis min/max of the POSITION stream, expanded to 8 box corners.
    ///
    /// Corner `[i][j][k]` (flattened as `i*4 + j*2 + k`) selects min (0) or
    /// max (1) per axis, matching the culling loop's iteration order.
    fn compute_corners(&mut self) {
        let Some(position) = self.attributes.get("POSITION") else {
            return;
        };
        let Some(data) = &position.data else {
            return;
        };

        let mut min = Vec3::repeat(f32::INFINITY);
        let mut max = Vec3::repeat(f32::NEG_INFINITY);

        let len = (position.stride * self.count as usize).min(data.len());
        let mut i = position.offset;
        while i + 12 <= len {
            let x = read_f32(data, i);
            let y = read_f32(data, i + 4);
            let z = read_f32(data, i + 8);

            min.x = min.x.min(x);
            min.y = min.y.min(y);
            min.z = min.z.min(z);
            max.x = max.x.max(x);
            max.y = max.y.max(y);
            max.z = max.z.max(z);

            i += position.stride;
        }

        for ci in 0..2 {
            for cj in 0..2 {
                for ck in 0..2 {
                    self.corners[ci * 4 + cj * 2 + ck] = Vec3::new(
                        if ci == 0 { min.x } else { max.x },
                        if cj == 0 { min.y } else { max.y },
                        if ck == 0 { min.z } else { max.z },
                    );
                }
            }
        }
    }
}

fn read_f32(data: &[u8], offset: usize) -> f32 {
    let bytes: [u8; 4] = data[offset..offset + 4]
        .try_into()
        .unwrap_or([0; 4]);
    f32::from_le_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position_bytes(points: &[[f32; 3]]) -> Vec<u8> {
        let mut bytes = Vec::new();
        for p in points {
            for c in p {
                bytes.extend_from_slice(&c.to_le_bytes());
            }
        }
        bytes
    }

    fn test_mesh(points: &[[f32; 3]]) -> Mesh {
        let mut cache = FileCache::new();
        cache.preload("p.bin", position_bytes(points));

        let mut mesh = Mesh::new("m".to_string(), points.len() as u32, Topology::TriangleList);
        mesh.attributes.insert(
            "POSITION".to_string(),
            Attribute {
                src: PathBuf::from("p.bin"),
                offset: 0,
                stride: 12,
                format: AttributeFormat::Rgb32Sfloat,
                data: None,
            },
        );
        mesh.load_data(&mut cache).unwrap();
        mesh
    }

    #[test]
    fn test_corners_span_position_extents() {
        let mesh = test_mesh(&[
            [-1.0, 0.0, 2.0],
            [3.0, -2.0, 0.0],
            [0.0, 1.0, -4.0],
        ]);

        // corners[0] selects min on every axis, corners[7] max on every axis
        assert_eq!(mesh.corners[0], Vec3::new(-1.0, -2.0, -4.0));
        assert_eq!(mesh.corners[7], Vec3::new(3.0, 1.0, 2.0));
    }

    #[test]
    fn test_upload_uses_stride_times_count() {
        use crate::render::backend::{RecordingBackend, RenderCommand};

        let mut mesh = test_mesh(&[[0.0, 0.0, 0.0], [1.0, 1.0, 1.0], [2.0, 2.0, 2.0]]);
        let mut backend = RecordingBackend::new(64, 64);
        mesh.upload(&mut backend).unwrap();
        assert!(mesh.buffer.is_some());

        let sizes: Vec<usize> = backend
            .commands()
            .iter()
            .filter_map(|c| match c {
                RenderCommand::CreateVertexBuffer { bytes } => Some(*bytes),
                _ => None,
            })
            .collect();
        assert_eq!(sizes, vec![36]);
    }
}
