//! Camera and viewer controls.
//!
//! Consumes one [`InputState`] snapshot per frame and mutates the live
//! camera-offset state, the animation clock rate, and the scene's camera
//! selection. Window plumbing is external; whatever produces the snapshot
//! decides how keys and mouse deltas are captured.

use std::collections::HashSet;

use crate::foundation::math::{Mat4, Mat4Ext, Vec3, Vec4};
use crate::foundation::time::AnimationClock;
use crate::scene::Scene;

/// Mouse rotation sensitivity divisor
const MOUSE_SENSITIVITY: f32 = 500.0;

/// Keys the viewer reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    /// Move forward
    W,
    /// Move left
    A,
    /// Move backward
    S,
    /// Move right
    D,
    /// Move up
    Space,
    /// Move down
    LeftShift,
    /// Modifier turning mouse drag into roll
    LeftControl,
    /// Reset the camera offset (or re-sync the debug camera)
    Enter,
    /// Slow the animation rate
    N,
    /// Speed up the animation rate
    M,
    /// Restore normal animation rate
    Comma,
    /// Pause the animation
    Semicolon,
    /// Rewind the animation to time zero
    Period,
    /// Toggle the debug camera
    Digit0,
    /// Commit the debug camera pose back to the main camera
    Digit9,
    /// Cycle to the next camera
    Equal,
    /// Cycle to the previous camera
    Minus,
}

/// One frame's input: pressed keys plus the mouse state
#[derive(Debug, Clone, Default)]
pub struct InputState {
    /// Keys currently held (one-shot keys are consumed by the controls)
    pub pressed: HashSet<Key>,
    /// Mouse movement since the previous frame, in pixels
    pub mouse_delta: (f32, f32),
    /// Whether the mouse is grabbed for camera rotation
    pub mouse_grabbed: bool,
    /// Whether the right mouse button is held (roll modifier)
    pub right_mouse_down: bool,
}

impl InputState {
    /// Whether a key is held this frame
    pub fn key_down(&self, key: Key) -> bool {
        self.pressed.contains(&key)
    }

    /// Consume a one-shot key: true exactly once per press
    fn take(&mut self, key: Key) -> bool {
        self.pressed.remove(&key)
    }
}

/// Apply one frame of controls to the scene and clock.
pub fn apply_controls(
    scene: &mut Scene,
    clock: &mut AnimationClock,
    input: &mut InputState,
    frame_time: f32,
) {
    let active_key = if scene.debug_camera_mode {
        scene.debug_camera
    } else {
        scene.current_camera
    };

    // Snapshot of the main camera's pose, for re-syncing the debug camera.
    let main_pose = scene.cameras[scene.current_camera].clone();

    {
        let camera = &mut scene.cameras[active_key];

        // Movement axes follow the user rotation, so forward is always
        // where the camera currently looks.
        let x = (camera.rotation_inverse * Vec4::new(1.0, 0.0, 0.0, 1.0)).xyz();
        let y = (camera.rotation_inverse * Vec4::new(0.0, 1.0, 0.0, 1.0)).xyz();
        let z = (camera.rotation_inverse * Vec4::new(0.0, 0.0, 1.0, 1.0)).xyz();
        let step = camera.speed * frame_time;

        if input.key_down(Key::W) {
            camera.position -= z * step;
        }
        if input.key_down(Key::S) {
            camera.position += z * step;
        }
        if input.key_down(Key::A) {
            camera.position -= x * step;
        }
        if input.key_down(Key::D) {
            camera.position += x * step;
        }
        if input.key_down(Key::Space) {
            camera.position += y * step;
        }
        if input.key_down(Key::LeftShift) {
            camera.position -= y * step;
        }

        if input.key_down(Key::Enter) {
            if scene.debug_camera_mode {
                camera.position = main_pose.position;
                camera.rotation = main_pose.rotation;
                camera.rotation_inverse = main_pose.rotation_inverse;
                camera.zoom = main_pose.zoom;
                camera.compute_projection();
            } else {
                camera.reset_user_state();
            }
        }

        if input.mouse_grabbed {
            let (dx, dy) = input.mouse_delta;
            let scale = ((camera.vertical_fov + camera.zoom) * 0.5).tan();

            if input.key_down(Key::LeftControl) || input.right_mouse_down {
                camera.rotation =
                    Mat4::rotation_axis(Vec3::new(0.0, 0.0, 1.0), dx / MOUSE_SENSITIVITY)
                        * camera.rotation;
                camera.rotation_inverse = camera.rotation_inverse
                    * Mat4::rotation_axis(Vec3::new(0.0, 0.0, 1.0), -dx / MOUSE_SENSITIVITY);
            } else {
                camera.rotation =
                    Mat4::rotation_axis(Vec3::new(0.0, 1.0, 0.0), scale * dx / MOUSE_SENSITIVITY)
                        * Mat4::rotation_axis(
                            Vec3::new(1.0, 0.0, 0.0),
                            scale * dy / MOUSE_SENSITIVITY,
                        )
                        * camera.rotation;
                camera.rotation_inverse = camera.rotation_inverse
                    * Mat4::rotation_axis(
                        Vec3::new(1.0, 0.0, 0.0),
                        scale * -dy / MOUSE_SENSITIVITY,
                    )
                    * Mat4::rotation_axis(
                        Vec3::new(0.0, 1.0, 0.0),
                        scale * -dx / MOUSE_SENSITIVITY,
                    );
            }
        }
    }

    // Animation rate controls.
    if input.key_down(Key::N) {
        clock.set_rate(clock.rate() - frame_time);
    }
    if input.key_down(Key::M) {
        clock.set_rate(clock.rate() + frame_time);
    }
    if input.key_down(Key::Comma) {
        clock.set_rate(1.0);
    }
    if input.key_down(Key::Semicolon) {
        clock.set_rate(0.0);
    }
    if input.take(Key::Period) {
        clock.set_current(0.0);
    }

    // Debug camera toggle: the debug camera starts wherever the main
    // camera currently is.
    if input.take(Key::Digit0) {
        scene.debug_camera_mode = !scene.debug_camera_mode;
        let pose = scene.cameras[scene.current_camera].clone();
        scene.cameras[scene.debug_camera].copy_pose_from(&pose);

        if scene.debug_camera_mode {
            log::info!("entered debug camera");
        } else {
            log::info!("exited debug camera");
        }
    }

    if input.take(Key::Digit9) && scene.debug_camera_mode {
        scene.debug_camera_mode = false;
        let pose = scene.cameras[scene.debug_camera].clone();
        scene.cameras[scene.current_camera].copy_pose_from(&pose);
        log::info!("exited debug camera");
    }

    // Camera cycling, disabled while debugging.
    if input.take(Key::Equal) && !scene.debug_camera_mode {
        scene.current_camera_index =
            (scene.current_camera_index + 1) % scene.cameras_enumerated.len();
        scene.current_camera = scene.cameras_enumerated[scene.current_camera_index];
        log::info!(
            "switched to camera \"{}\"",
            scene.cameras[scene.current_camera].name
        );
    }

    if input.take(Key::Minus) && !scene.debug_camera_mode {
        let count = scene.cameras_enumerated.len();
        scene.current_camera_index = (scene.current_camera_index + count - 1) % count;
        scene.current_camera = scene.cameras_enumerated[scene.current_camera_index];
        log::info!(
            "switched to camera \"{}\"",
            scene.cameras[scene.current_camera].name
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pressed(keys: &[Key]) -> InputState {
        InputState {
            pressed: keys.iter().copied().collect(),
            ..InputState::default()
        }
    }

    #[test]
    fn test_forward_movement_follows_rotation() {
        let mut scene = Scene::new("s");
        let mut clock = AnimationClock::new();
        let mut input = pressed(&[Key::W]);

        apply_controls(&mut scene, &mut clock, &mut input, 0.1);

        // With identity rotation, forward is -Z at speed 10.
        let camera = &scene.cameras[scene.current_camera];
        assert!((camera.position.z - -1.0).abs() < 1e-5);
        assert_eq!(camera.position.x, 0.0);
    }

    #[test]
    fn test_debug_toggle_copies_main_pose() {
        let mut scene = Scene::new("s");
        let mut clock = AnimationClock::new();
        scene.cameras[scene.current_camera].position = Vec3::new(3.0, 1.0, 2.0);

        let mut input = pressed(&[Key::Digit0]);
        apply_controls(&mut scene, &mut clock, &mut input, 0.016);

        assert!(scene.debug_camera_mode);
        assert_eq!(
            scene.cameras[scene.debug_camera].position,
            Vec3::new(3.0, 1.0, 2.0)
        );
        // One-shot: the key press was consumed.
        assert!(!input.key_down(Key::Digit0));
    }

    #[test]
    fn test_camera_cycling_wraps() {
        let mut scene = Scene::new("s");
        let mut clock = AnimationClock::new();
        let extra = scene
            .cameras
            .insert(crate::scene::Camera::new("doc", 1.0, 1.0, 0.1, 100.0));
        scene.cameras_enumerated.push(extra);

        let mut input = pressed(&[Key::Equal]);
        apply_controls(&mut scene, &mut clock, &mut input, 0.016);
        assert_eq!(scene.current_camera, extra);

        let mut input = pressed(&[Key::Equal]);
        apply_controls(&mut scene, &mut clock, &mut input, 0.016);
        assert_eq!(scene.current_camera, scene.detached_camera);
    }

    #[test]
    fn test_rate_keys_drive_clock() {
        let mut scene = Scene::new("s");
        let mut clock = AnimationClock::new();

        let mut input = pressed(&[Key::Semicolon]);
        apply_controls(&mut scene, &mut clock, &mut input, 0.016);
        assert_eq!(clock.rate(), 0.0);

        let mut input = pressed(&[Key::Comma]);
        apply_controls(&mut scene, &mut clock, &mut input, 0.016);
        assert_eq!(clock.rate(), 1.0);
    }
}
