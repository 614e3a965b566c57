//! Keyframe animation drivers.
//!
//! A driver is a named channel of `(time, value)` keyframes targeting one
//! TRS component of one node. Sampling clamps at both ends and blends
//! between the surrounding keyframes according to the channel's
//! interpolation mode.

use crate::foundation::math::{DVec3, DVec4};

/// How values between two keyframes are blended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interpolation {
    /// Hold the earlier keyframe until the next one is reached
    Step,
    /// Component-wise linear blend
    Linear,
    /// Spherical blend along the shortest quaternion arc
    Slerp,
}

impl Interpolation {
    /// Parse a document interpolation tag
    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "STEP" => Some(Self::Step),
            "LINEAR" => Some(Self::Linear),
            "SLERP" => Some(Self::Slerp),
            _ => None,
        }
    }
}

/// Value types a driver can animate
pub trait DriverValue:
    Copy
    + std::ops::Add<Output = Self>
    + std::ops::Mul<f64, Output = Self>
    + std::ops::Div<f64, Output = Self>
{
    /// Dot product, used by the spherical interpolation path
    fn dot(&self, other: &Self) -> f64;
}

impl DriverValue for DVec3 {
    fn dot(&self, other: &Self) -> f64 {
        nalgebra::Vector3::dot(self, other)
    }
}

impl DriverValue for DVec4 {
    fn dot(&self, other: &Self) -> f64 {
        nalgebra::Vector4::dot(self, other)
    }
}

/// A keyframe animation channel. Immutable after construction.
#[derive(Debug, Clone)]
pub struct Driver<V> {
    /// Channel name from the document
    pub name: String,
    times: Vec<f64>,
    values: Vec<V>,
    interpolation: Interpolation,
}

impl<V: DriverValue> Driver<V> {
    /// Create a driver from parallel keyframe arrays, strictly ordered by
    /// time. Empty channels are rejected during document linking.
    pub fn new(
        name: String,
        times: Vec<f64>,
        values: Vec<V>,
        interpolation: Interpolation,
    ) -> Self {
        debug_assert_eq!(times.len(), values.len());
        debug_assert!(!times.is_empty());
        Self {
            name,
            times,
            values,
            interpolation,
        }
    }

    /// Sample the channel at `time`.
    ///
    /// Finds the latest keyframe at or before `time` and the earliest after
    /// it; before the first keyframe or past the last, the boundary value is
    /// returned unchanged.
    pub fn sample(&self, time: f64) -> V {
        let mut before: Option<(f64, V)> = None;
        let mut after: Option<(f64, V)> = None;

        for (&t, &v) in self.times.iter().zip(&self.values) {
            if t <= time {
                before = Some((t, v));
            } else {
                after = Some((t, v));
                break;
            }
        }

        match (before, after) {
            (Some((_, v)), None) | (None, Some((_, v))) => v,
            (Some((before_time, before_value)), Some((after_time, after_value))) => {
                let frac = (time - before_time) / (after_time - before_time);
                match self.interpolation {
                    Interpolation::Step => before_value,
                    Interpolation::Linear => before_value * (1.0 - frac) + after_value * frac,
                    Interpolation::Slerp => slerp(before_value, after_value, frac),
                }
            }
            // Construction requires at least one keyframe.
            (None, None) => self.values[0],
        }
    }
}

/// Shortest-arc spherical interpolation with a linear fallback for
/// near-parallel endpoints, where the sine denominator would vanish.
fn slerp<V: DriverValue>(before: V, mut after: V, frac: f64) -> V {
    let mut cos_theta = before.dot(&after);
    if cos_theta < 0.0 {
        cos_theta = -cos_theta;
        after = after * -1.0;
    }

    if cos_theta > 0.99999 {
        before * (1.0 - frac) + after * frac
    } else {
        let angle = cos_theta.acos();
        (before * ((1.0 - frac) * angle).sin() + after * (frac * angle).sin()) / angle.sin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear_driver() -> Driver<DVec3> {
        Driver::new(
            "t".to_string(),
            vec![0.0, 1.0, 2.0],
            vec![
                DVec3::new(0.0, 0.0, 0.0),
                DVec3::new(10.0, 0.0, 0.0),
                DVec3::new(30.0, 0.0, 0.0),
            ],
            Interpolation::Linear,
        )
    }

    #[test]
    fn test_sample_clamps_before_first_keyframe() {
        assert_eq!(linear_driver().sample(-1.0).x, 0.0);
    }

    #[test]
    fn test_sample_clamps_after_last_keyframe() {
        assert_eq!(linear_driver().sample(3.0).x, 30.0);
    }

    #[test]
    fn test_linear_blend_between_keyframes() {
        assert_eq!(linear_driver().sample(0.5).x, 5.0);
        assert_eq!(linear_driver().sample(1.5).x, 20.0);
    }

    #[test]
    fn test_step_holds_previous_value() {
        let driver = Driver::new(
            "s".to_string(),
            vec![0.0, 1.0],
            vec![DVec3::new(1.0, 2.0, 3.0), DVec3::new(9.0, 9.0, 9.0)],
            Interpolation::Step,
        );
        assert_eq!(driver.sample(0.999), DVec3::new(1.0, 2.0, 3.0));
        assert_eq!(driver.sample(1.0), DVec3::new(9.0, 9.0, 9.0));
    }

    #[test]
    fn test_slerp_near_parallel_falls_back_to_linear() {
        let a = DVec4::new(0.0, 0.0, 0.0, 1.0);
        let b = DVec4::new(1e-5, 0.0, 0.0, 1.0).normalize();
        let driver = Driver::new(
            "r".to_string(),
            vec![0.0, 1.0],
            vec![a, b],
            Interpolation::Slerp,
        );

        let mid = driver.sample(0.5);
        assert!(mid.iter().all(|c| c.is_finite()));
        assert!((mid.w - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_slerp_takes_shortest_path() {
        // q and -q describe the same rotation; blending must negate the
        // second endpoint rather than swing the long way around.
        let a = DVec4::new(0.0, 0.0, 0.0, 1.0);
        let b = DVec4::new(0.0, 0.0, 0.0, -1.0);
        let driver = Driver::new(
            "r".to_string(),
            vec![0.0, 1.0],
            vec![a, b],
            Interpolation::Slerp,
        );

        let mid = driver.sample(0.5);
        assert!((mid.w - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_slerp_halfway_between_perpendicular_quats() {
        let a = DVec4::new(0.0, 0.0, 0.0, 1.0);
        let b = DVec4::new(1.0, 0.0, 0.0, 0.0);
        let driver = Driver::new(
            "r".to_string(),
            vec![0.0, 1.0],
            vec![a, b],
            Interpolation::Slerp,
        );

        let mid = driver.sample(0.5);
        let expected = (2.0_f64).sqrt() / 2.0;
        assert!((mid.w - expected).abs() < 1e-6);
        assert!((mid.x - expected).abs() < 1e-6);
    }
}
