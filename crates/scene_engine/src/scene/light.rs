//! Light sources and their GPU-visible projection.
//!
//! Document lights come in two shapes: suns (directional, optionally soft
//! via an angular radius) and spot/sphere lights (positional, with an
//! optional cone and an optional shadow map). Each frame the light
//! collector flattens every light-bearing node into a [`ShaderLight`].

use bytemuck::{Pod, Zeroable};

use crate::foundation::math::{Mat4, Mat4Ext, Vec3};
use crate::render::backend::ShadowMapHandle;

/// A light source as owned by the scene
#[derive(Debug, Clone)]
pub struct Light {
    /// Light name from the document
    pub name: String,
    /// Light color
    pub tint: Vec3,
    /// Emitted power (sun strength or spot/sphere power)
    pub power: f32,
    /// Shape-specific parameters
    pub kind: LightKind,
}

/// Shape-specific light parameters
#[derive(Debug, Clone)]
pub enum LightKind {
    /// Directional light with an angular radius
    Sun {
        /// Angular radius in radians
        angle: f32,
    },
    /// Positional light. A `fov <= 0` means an omnidirectional (sphere)
    /// light; a positive `fov` opens a cone, which is also what makes the
    /// light eligible for a shadow map.
    Spot {
        /// Source radius (also the shadow projection's near plane)
        radius: f32,
        /// Distance limit; `f32::INFINITY` if unlimited
        limit: f32,
        /// Cone full angle in radians, or a non-positive value for omni
        fov: f32,
        /// Cone edge blend fraction
        blend: f32,
        /// Shadow map resolution in pixels; 0 disables shadowing
        shadow_resolution: u32,
    },
}

impl Light {
    /// Shadow map resolution, 0 for lights that never cast shadow maps
    pub fn shadow_resolution(&self) -> u32 {
        match self.kind {
            LightKind::Sun { .. } => 0,
            LightKind::Spot {
                fov,
                shadow_resolution,
                ..
            } => {
                if fov > 0.0 {
                    shadow_resolution
                } else {
                    0
                }
            }
        }
    }
}

/// Flattened, GPU-uploadable light record.
///
/// Rebuilt from scratch every frame, then stably partitioned so that
/// shadow-casting entries precede all others; the shader indexes shadow
/// maps by position in this array.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ShaderLight {
    /// World-to-light transform of the owning node
    pub world_to_light: [[f32; 4]; 4],
    /// Shadow projection matrix (identity for suns and omni lights)
    pub projection: [[f32; 4]; 4],
    /// Tint in xyz, power in w
    pub tint_power: [f32; 4],
    /// Source radius (sun: angular radius)
    pub radius: f32,
    /// Distance limit (-1 for suns)
    pub limit: f32,
    /// Cone angle (-1 for suns)
    pub fov: f32,
    /// Cone blend (-1 for suns)
    pub blend: f32,
    /// 1 for sun lights
    pub is_sun: i32,
    /// Shadow map resolution, 0 when not shadow casting
    pub shadow_res: i32,
    /// Explicit padding to a 16-byte multiple
    pub _pad: [i32; 2],
}

impl ShaderLight {
    /// Flatten a light with its current world-to-light transform.
    ///
    /// Cone lights get a perspective shadow projection from the light's
    /// position (aspect 1, near at the source radius, far at the distance
    /// limit, infinite when the limit is unbounded).
    pub fn from_light(light: &Light, world_to_light: &Mat4) -> Self {
        let tint_power = [light.tint.x, light.tint.y, light.tint.z, light.power];

        match light.kind {
            LightKind::Sun { angle } => Self {
                world_to_light: (*world_to_light).into(),
                projection: Mat4::identity().into(),
                tint_power,
                radius: angle,
                limit: -1.0,
                fov: -1.0,
                blend: -1.0,
                is_sun: 1,
                shadow_res: 0,
                _pad: [0; 2],
            },
            LightKind::Spot {
                radius,
                limit,
                fov,
                blend,
                shadow_resolution,
            } => {
                let mut projection = Mat4::identity();
                let mut shadow_res = 0;

                if fov > 0.0 {
                    projection = if limit.is_infinite() {
                        Mat4::infinite_perspective_vk(1.0, fov, radius)
                    } else {
                        Mat4::perspective_vk(1.0, fov, radius, limit)
                    };
                    shadow_res = shadow_resolution as i32;
                }

                Self {
                    world_to_light: (*world_to_light).into(),
                    projection: projection.into(),
                    tint_power,
                    radius,
                    limit,
                    fov,
                    blend,
                    is_sun: 0,
                    shadow_res,
                    _pad: [0; 2],
                }
            }
        }
    }
}

/// One shadow map allocation, created once per shadow-casting light at
/// first collection and indexed by discovery order ever after.
#[derive(Debug, Clone)]
pub struct ShadowMapSlot {
    /// Square resolution in pixels
    pub resolution: u32,
    /// Backend depth target, created by the frame renderer at init
    pub handle: Option<ShadowMapHandle>,
}

impl ShadowMapSlot {
    /// Record a slot for a light discovered during the initial collection
    pub fn new(resolution: u32) -> Self {
        Self {
            resolution,
            handle: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sun_flattens_with_sentinel_fields() {
        let light = Light {
            name: "sun".to_string(),
            tint: Vec3::new(1.0, 0.9, 0.8),
            power: 2.0,
            kind: LightKind::Sun { angle: 0.01 },
        };

        let sl = ShaderLight::from_light(&light, &Mat4::identity());
        assert_eq!(sl.is_sun, 1);
        assert_eq!(sl.shadow_res, 0);
        assert_eq!(sl.limit, -1.0);
        assert_eq!(sl.radius, 0.01);
        assert_eq!(sl.tint_power[3], 2.0);
    }

    #[test]
    fn test_omni_spot_gets_no_projection_or_shadow() {
        let light = Light {
            name: "bulb".to_string(),
            tint: Vec3::new(1.0, 1.0, 1.0),
            power: 5.0,
            kind: LightKind::Spot {
                radius: 0.1,
                limit: 10.0,
                fov: -1.0,
                blend: -1.0,
                shadow_resolution: 512,
            },
        };

        let sl = ShaderLight::from_light(&light, &Mat4::identity());
        assert_eq!(sl.shadow_res, 0);
        assert_eq!(sl.projection, <[[f32; 4]; 4]>::from(Mat4::identity()));
        assert_eq!(light.shadow_resolution(), 0);
    }

    #[test]
    fn test_cone_spot_with_shadow_resolution() {
        let light = Light {
            name: "spot".to_string(),
            tint: Vec3::new(1.0, 1.0, 1.0),
            power: 5.0,
            kind: LightKind::Spot {
                radius: 0.1,
                limit: f32::INFINITY,
                fov: 1.0,
                blend: 0.2,
                shadow_resolution: 1024,
            },
        };

        let sl = ShaderLight::from_light(&light, &Mat4::identity());
        assert_eq!(sl.shadow_res, 1024);
        assert_ne!(sl.projection, <[[f32; 4]; 4]>::from(Mat4::identity()));
        assert_eq!(light.shadow_resolution(), 1024);
    }

    #[test]
    fn test_shader_light_size_is_16_byte_multiple() {
        assert_eq!(std::mem::size_of::<ShaderLight>() % 16, 0);
    }
}
