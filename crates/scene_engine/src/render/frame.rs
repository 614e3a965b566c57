//! Frame orchestration.
//!
//! A frame is two phases over one evaluated scene snapshot: a depth-only
//! pass per shadow map, then the main color pass. All shared intra-frame
//! state (bound-pipeline memo, current shadow-map index, counters) lives in
//! a [`FrameContext`] value passed into the traversals, never in hidden
//! renderer fields.

use crate::assets::FileCache;
use crate::foundation::math::Vec4;
use crate::render::backend::{
    BackendResult, FrameUniforms, PipelineHandle, RenderBackend, RenderError,
};
use crate::render::culling::CullingVolume;
use crate::scene::material::{MaterialTypeRegistry, MaterialTypeTag};
use crate::scene::Scene;
use crate::EngineError;

// Depth bias constants recommended by the Sascha Willems shadow-mapping
// sample.
const SHADOW_DEPTH_BIAS_CONSTANT: f32 = 1.25;
const SHADOW_DEPTH_BIAS_SLOPE: f32 = 1.75;

/// Renderer behavior switches from the command line
#[derive(Debug, Clone, Copy)]
pub struct RendererConfig {
    /// Whether frustum culling runs before draw emission
    pub culling_enabled: bool,
    /// Whether the swapchain is HDR
    pub hdr: bool,
    /// Whether per-frame draw statistics are logged
    pub log_stats: bool,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            culling_enabled: true,
            hdr: false,
            log_stats: false,
        }
    }
}

/// Per-frame draw counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Meshes drawn across all passes
    pub meshes_drawn: usize,
    /// Meshes rejected by culling across all passes
    pub meshes_culled: usize,
}

impl FrameStats {
    fn accumulate(&mut self, other: &FrameStats) {
        self.meshes_drawn += other.meshes_drawn;
        self.meshes_culled += other.meshes_culled;
    }
}

/// Mutable state shared across one traversal of one render pass.
///
/// Owned exclusively by the frame renderer for the duration of the pass;
/// draw emission is pure with respect to everything else.
pub struct FrameContext<'a, B: RenderBackend> {
    /// Backend commands are recorded through
    pub backend: &'a mut B,
    /// Pipeline registry for material-type dispatch
    pub registry: &'a MaterialTypeRegistry,
    /// Whether meshes are culled before drawing
    pub culling_enabled: bool,
    /// Whether this is a depth-only shadow pass
    pub drawing_shadow: bool,
    /// Shadow map being rendered, or -1 during the main pass
    pub shadow_map_index: i32,
    /// One-slot memo of the currently bound pipeline; avoids redundant
    /// binds across consecutive same-material draws. Reset at pass start.
    pub current_pipeline: Option<PipelineHandle>,
    /// Draw counters for this pass
    pub stats: FrameStats,
}

/// Sequences the shadow and main phases of each frame against a backend.
pub struct FrameRenderer<B: RenderBackend> {
    backend: B,
    registry: MaterialTypeRegistry,
    config: RendererConfig,
}

impl<B: RenderBackend> FrameRenderer<B> {
    /// Create the renderer and its material-type registry
    pub fn new(mut backend: B, config: RendererConfig) -> Result<Self, RenderError> {
        let registry = MaterialTypeRegistry::new(&mut backend)?;
        Ok(Self {
            backend,
            registry,
            config,
        })
    }

    /// Access the backend (tests inspect recorded commands through this)
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Mutable access to the backend
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Upload every GPU-resident resource of a freshly linked scene and
    /// allocate its shadow maps.
    ///
    /// Runs the initial light collection; shadow-map slots discovered there
    /// keep their indices for the life of the scene.
    pub fn initialize_scene(
        &mut self,
        scene: &mut Scene,
        cache: &mut FileCache,
    ) -> Result<(), EngineError> {
        for mesh in scene.meshes.values_mut() {
            mesh.load_data(cache)?;
            mesh.upload(&mut self.backend)?;
        }

        for material in scene.materials.values_mut() {
            let pipeline = self.registry.pipeline(material.type_tag(), false);

            let textures = material.texture_set();
            let mut handles = Vec::with_capacity(textures.len());
            for texture in textures {
                handles.push(self.backend.create_texture(texture)?);
            }

            material.binding = Some(self.backend.create_material_binding(pipeline, &handles)?);
        }

        for environment in scene.environments.values_mut() {
            environment.pbr_handle = Some(self.backend.create_texture(&environment.texture_pbr)?);
            environment.lambertian_handle =
                Some(self.backend.create_texture(&environment.texture_lambertian)?);
        }

        scene.collect_lights();
        for slot in &mut scene.shadow_maps {
            slot.handle = Some(self.backend.create_shadow_map(slot.resolution)?);
        }
        scene.initialized = true;

        log::info!(
            "scene \"{}\" initialized: {} meshes, {} materials, {} shadow maps",
            scene.name,
            scene.meshes.len(),
            scene.materials.len(),
            scene.shadow_maps.len()
        );
        Ok(())
    }

    /// Evaluate and render one frame at the given animation time.
    ///
    /// A stale presentation surface skips the frame (the backend recreates
    /// its swapchain resources); every other backend failure propagates.
    pub fn render_frame(&mut self, scene: &mut Scene, time: f32) -> BackendResult<FrameStats> {
        let mut stats = FrameStats::default();

        scene.apply_animation(time);

        // The detached camera has no owning node, so the propagator never
        // reaches it; same for the debug camera while active.
        let detached = scene.detached_camera;
        scene.cameras[detached].update_transform();
        if scene.debug_camera_mode {
            let debug = scene.debug_camera;
            scene.cameras[debug].update_transform();
        }

        scene.propagate_transforms();
        scene.collect_lights();
        scene.reorder_shader_lights();

        self.backend.upload_lights(&scene.shader_lights)?;
        self.upload_frame_uniforms(scene)?;

        // Shadow phase: one depth-only pass per map, in discovery order.
        // After the reorder, shadow caster i in the light array owns map i.
        for index in 0..scene.shadow_maps.len() {
            let Some(handle) = scene.shadow_maps[index].handle else {
                continue;
            };
            let resolution = scene.shadow_maps[index].resolution;

            self.backend.begin_shadow_pass(handle)?;
            self.backend
                .set_viewport(0.0, 0.0, resolution as f32, resolution as f32);
            self.backend.set_scissor(resolution, resolution);
            self.backend
                .set_depth_bias(SHADOW_DEPTH_BIAS_CONSTANT, SHADOW_DEPTH_BIAS_SLOPE);

            let simple = self.registry.pipeline(MaterialTypeTag::Simple, true);
            self.backend.bind_pipeline(simple);

            let volume = CullingVolume::from_shader_light(&scene.shader_lights[index]);
            let mut ctx = FrameContext {
                backend: &mut self.backend,
                registry: &self.registry,
                culling_enabled: self.config.culling_enabled,
                drawing_shadow: true,
                shadow_map_index: index as i32,
                current_pipeline: Some(simple),
                stats: FrameStats::default(),
            };
            scene.emit_draws(&mut ctx, &volume);
            stats.accumulate(&ctx.stats);

            self.backend.end_pass()?;
        }

        // Main phase.
        let clear_color = if scene.debug_camera_mode {
            [0.2, 0.0, 0.0, 1.0]
        } else {
            [0.0, 0.0, 0.0, 1.0]
        };

        match self.backend.begin_main_pass(clear_color) {
            Err(RenderError::SurfaceOutOfDate) => {
                log::debug!("surface out of date, skipping frame");
                return Ok(stats);
            }
            other => other?,
        }

        let simple = self.registry.pipeline(MaterialTypeTag::Simple, false);
        self.backend.bind_pipeline(simple);

        let camera = &scene.cameras[scene.active_camera()];
        let volume = CullingVolume::from_camera(camera);

        let extent = self.backend.swapchain_extent();
        let (x, y, width, height) = letterboxed_viewport(extent, camera.aspect_ratio);
        self.backend.set_viewport(x, y, width, height);
        self.backend.set_scissor(extent.0, extent.1);

        let mut ctx = FrameContext {
            backend: &mut self.backend,
            registry: &self.registry,
            culling_enabled: self.config.culling_enabled,
            drawing_shadow: false,
            shadow_map_index: -1,
            current_pipeline: Some(simple),
            stats: FrameStats::default(),
        };
        scene.emit_draws(&mut ctx, &volume);
        stats.accumulate(&ctx.stats);

        self.backend.end_pass()?;

        if self.config.log_stats {
            log::info!(
                "drew {} meshes ({} culled)",
                stats.meshes_drawn,
                stats.meshes_culled
            );
        }
        Ok(stats)
    }

    fn upload_frame_uniforms(&mut self, scene: &Scene) -> BackendResult<()> {
        let camera = &scene.cameras[scene.active_camera()];
        let camera_pos = camera.pos_transform * Vec4::new(0.0, 0.0, 0.0, 1.0);
        let environment = &scene.environments[scene.environment];

        let uniforms = FrameUniforms {
            proj: camera.perspective.into(),
            camera: camera.user_offset.into(),
            camera_pos: [camera_pos.x, camera_pos.y, camera_pos.z, camera_pos.w],
            environment: environment.world_to_environment.into(),
            hdr: u32::from(self.config.hdr),
            _pad: [0; 3],
        };
        self.backend.upload_frame_uniforms(&uniforms)
    }
}

/// Viewport letterboxed to the camera's aspect ratio within the swapchain
/// extent: the larger axis is shrunk and centered.
fn letterboxed_viewport(extent: (u32, u32), aspect_ratio: f32) -> (f32, f32, f32, f32) {
    let (mut x, mut y) = (0.0, 0.0);
    let mut width = extent.0 as f32;
    let mut height = extent.1 as f32;

    if width > aspect_ratio * height {
        width = aspect_ratio * height;
        x = (extent.0 as f32 - width) / 2.0;
    } else {
        height = width / aspect_ratio;
        y = (extent.1 as f32 - height) / 2.0;
    }

    (x, y, width, height)
}
