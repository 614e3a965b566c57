//! # Scene Engine
//!
//! Scene-graph evaluation and GPU draw-command generation for s72 scene
//! documents.
//!
//! ## Pipeline
//!
//! - **Document linking**: a two-pass linker resolves the flat, indexed
//!   record array into arena-backed entities
//! - **Animation**: per-channel keyframe drivers with STEP/LINEAR/SLERP
//!   interpolation
//! - **Transform propagation**: recursive world-transform accumulation,
//!   forward and inverse
//! - **Light collection**: per-frame flattening of lights with stable
//!   shadow-map slot allocation
//! - **Visibility & draw emission**: view-space bounding-box culling and
//!   material-dispatched draw recording
//! - **Frame orchestration**: one depth-only pass per shadow map, then the
//!   main color pass
//!
//! The GPU itself is an external collaborator behind the
//! [`render::backend::RenderBackend`] trait; the bundled
//! [`render::backend::RecordingBackend`] captures the command stream for
//! headless runs and tests.

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod assets;
pub mod foundation;
pub mod headless;
pub mod input;
pub mod render;
pub mod scene;

use thiserror::Error;

/// Engine-level errors
#[derive(Error, Debug)]
pub enum EngineError {
    /// Document linking failed
    #[error("document error: {0}")]
    Document(#[from] scene::DocumentError),

    /// Asset loading failed
    #[error("asset error: {0}")]
    Asset(#[from] assets::AssetError),

    /// A backend operation failed
    #[error("render error: {0}")]
    Render(#[from] render::RenderError),

    /// A headless event file was malformed
    #[error("headless error: {0}")]
    Headless(#[from] headless::HeadlessError),
}

/// Common imports for engine users
pub mod prelude {
    pub use crate::assets::FileCache;
    pub use crate::foundation::{
        math::{Mat4, Mat4Ext, Vec3, Vec4},
        time::{AnimationClock, Timer},
    };
    pub use crate::headless::{parse_events, HeadlessPlayback};
    pub use crate::input::{apply_controls, InputState, Key};
    pub use crate::render::{
        FrameRenderer, FrameStats, RecordingBackend, RenderBackend, RendererConfig,
    };
    pub use crate::scene::{load_scene, Scene};
    pub use crate::EngineError;
}
