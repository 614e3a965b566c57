//! Texture decoding.
//!
//! Materials and environments reference textures either as inline constants
//! (a color or a scalar, expanded to a 1x1 texture) or as image files.
//! Everything is expanded to linear RGBA f32 pixels before upload; RGBE
//! shared-exponent images get their exponent applied here.

use std::path::Path;

use crate::foundation::math::Vec3;

use super::{AssetError, FileCache};

/// Decoded texture: one or more mip levels of linear RGBA f32 pixels
#[derive(Debug, Clone)]
pub struct TextureData {
    /// Width of the top mip level in pixels
    pub width: u32,
    /// Height of the top mip level in pixels
    pub height: u32,
    /// Whether the image stacks six cube faces vertically
    pub is_cube: bool,
    /// Mip chain, outermost level first; each level is RGBA f32
    pub levels: Vec<Vec<f32>>,
}

impl TextureData {
    /// Expand a constant color into a 1x1 texture (or 1x6 for a cube)
    pub fn solid(color: Vec3, cube: bool) -> Self {
        let faces = if cube { 6 } else { 1 };
        let mut pixels = Vec::with_capacity(4 * faces);
        for _ in 0..faces {
            pixels.extend_from_slice(&[color.x, color.y, color.z, 1.0]);
        }

        Self {
            width: 1,
            height: faces as u32,
            is_cube: cube,
            levels: vec![pixels],
        }
    }

    /// Expand a constant scalar (roughness/metalness style) into a texture
    pub fn solid_scalar(value: f32) -> Self {
        Self::solid(Vec3::new(value, value, value), false)
    }

    /// Decode an image file through the cache.
    ///
    /// `rgbe` images store a shared exponent in the alpha channel; those are
    /// expanded to linear float here, everything else is normalized from
    /// 8-bit.
    pub fn from_file(
        cache: &mut FileCache,
        path: &Path,
        cube: bool,
        rgbe: bool,
    ) -> Result<Self, AssetError> {
        let bytes = cache.read(path)?;
        let decoded = image::load_from_memory(&bytes)
            .map_err(|source| AssetError::ImageDecode {
                path: path.to_path_buf(),
                source,
            })?
            .to_rgba8();

        let (width, height) = decoded.dimensions();
        let pixels = convert_rgba8(decoded.as_raw(), rgbe);

        Ok(Self {
            width,
            height,
            is_cube: cube,
            levels: vec![pixels],
        })
    }

    /// Decode an image plus `extra_mips` pre-filtered levels stored next to
    /// it as `<path>.<i>.png`.
    pub fn from_file_with_mips(
        cache: &mut FileCache,
        path: &Path,
        cube: bool,
        rgbe: bool,
        extra_mips: usize,
    ) -> Result<Self, AssetError> {
        let mut texture = Self::from_file(cache, path, cube, rgbe)?;

        for i in 0..extra_mips {
            let mip_path = format!("{}.{}.png", path.display(), i);
            let mip = Self::from_file(cache, Path::new(&mip_path), cube, rgbe)?;
            texture.levels.push(mip.levels.into_iter().next().unwrap_or_default());
        }

        Ok(texture)
    }
}

fn convert_rgba8(data: &[u8], rgbe: bool) -> Vec<f32> {
    let mut out = Vec::with_capacity(data.len());
    for px in data.chunks_exact(4) {
        let (r, g, b, a) = (px[0], px[1], px[2], px[3]);

        if rgbe {
            let mut e = 2.0_f32.powi(i32::from(a) - 128);
            if r == 0 && g == 0 && b == 0 && a == 0 {
                e = 0.0;
            }

            out.push((f32::from(r) + 0.5) / 256.0 * e);
            out.push((f32::from(g) + 0.5) / 256.0 * e);
            out.push((f32::from(b) + 0.5) / 256.0 * e);
            out.push(1.0);
        } else {
            out.push(f32::from(r) / 255.0);
            out.push(f32::from(g) / 255.0);
            out.push(f32::from(b) / 255.0);
            out.push(f32::from(a) / 255.0);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_solid_cube_has_six_faces() {
        let tex = TextureData::solid(Vec3::new(0.5, 0.5, 1.0), true);
        assert_eq!(tex.height, 6);
        assert_eq!(tex.levels[0].len(), 6 * 4);
        assert_eq!(tex.levels[0][2], 1.0);
    }

    #[test]
    fn test_rgbe_zero_pixel_decodes_to_black() {
        let pixels = convert_rgba8(&[0, 0, 0, 0], true);
        assert_eq!(&pixels[..3], &[0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_rgbe_exponent_applied() {
        // a = 129 gives an exponent of 2^1
        let pixels = convert_rgba8(&[128, 0, 0, 129], true);
        let expected = (128.0 + 0.5) / 256.0 * 2.0;
        assert!((pixels[0] - expected).abs() < 1e-6);
    }
}
