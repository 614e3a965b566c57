//! Per-frame input snapshots and the camera/viewer controls they drive.

pub mod controls;

pub use controls::{apply_controls, InputState, Key};
