//! Backend abstraction for the rendering system.
//!
//! The scene evaluation passes never talk to a GPU API directly; they
//! record work through [`RenderBackend`]. Resources are opaque handles:
//! upload bytes, get a handle back. A real device implementation lives
//! outside this crate; [`RecordingBackend`] captures the command stream for
//! headless runs and tests.

use bytemuck::{Pod, Zeroable};
use thiserror::Error;

use crate::assets::TextureData;
use crate::scene::light::ShaderLight;

/// Result type for backend operations
pub type BackendResult<T> = Result<T, RenderError>;

/// Rendering errors
#[derive(Error, Debug)]
pub enum RenderError {
    /// Resource creation or submission failed; fatal from the core's
    /// perspective, there is no retry path
    #[error("render backend failure: {0}")]
    Backend(String),

    /// The presentation surface is stale; the frame is skipped and
    /// swapchain-dependent resources are recreated, never surfaced as an
    /// error to the user
    #[error("presentation surface out of date")]
    SurfaceOutOfDate,
}

/// Handle to an uploaded vertex buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexBufferHandle(pub u64);

/// Handle to an uploaded texture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureHandle(pub u64);

/// Handle to a compiled graphics pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PipelineHandle(pub u64);

/// Handle to a material's texture binding set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MaterialBindingHandle(pub u64);

/// Handle to a shadow-map depth target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShadowMapHandle(pub u64);

/// Description of a graphics pipeline to create
#[derive(Debug, Clone, Copy)]
pub struct PipelineDesc<'a> {
    /// Material-type label, for diagnostics
    pub label: &'a str,
    /// Byte stride of the vertex layout
    pub vertex_stride: u32,
    /// Number of sampled textures in the material binding set
    pub texture_count: u32,
    /// Whether this is the depth-only shadow variant
    pub depth_only: bool,
}

/// Per-draw push constant block
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct PushConstants {
    /// Model-view matrix of the draw
    pub model_view: [[f32; 4]; 4],
    /// Shadow map being rendered, or -1 during the main pass
    pub shadow_map_index: i32,
    /// Explicit padding to a 16-byte multiple
    pub _pad: [i32; 3],
}

/// Per-frame uniform block
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct FrameUniforms {
    /// Active camera projection
    pub proj: [[f32; 4]; 4],
    /// Active camera world-to-view matrix (including the user offset)
    pub camera: [[f32; 4]; 4],
    /// Active camera world position
    pub camera_pos: [f32; 4],
    /// World-to-environment transform
    pub environment: [[f32; 4]; 4],
    /// Whether the swapchain is HDR
    pub hdr: u32,
    /// Explicit padding to a 16-byte multiple
    pub _pad: [u32; 3],
}

/// Main rendering backend trait.
///
/// All fallible calls fail fatally from the caller's perspective except
/// [`RenderBackend::begin_main_pass`], which may report
/// [`RenderError::SurfaceOutOfDate`] for local recovery.
pub trait RenderBackend {
    /// Current swapchain extent (width, height)
    fn swapchain_extent(&self) -> (u32, u32);

    /// Upload an interleaved vertex byte range
    fn create_vertex_buffer(&mut self, data: &[u8]) -> BackendResult<VertexBufferHandle>;

    /// Upload a decoded texture
    fn create_texture(&mut self, texture: &TextureData) -> BackendResult<TextureHandle>;

    /// Compile a graphics pipeline
    fn create_pipeline(&mut self, desc: &PipelineDesc<'_>) -> BackendResult<PipelineHandle>;

    /// Build a material's texture binding set for a pipeline
    fn create_material_binding(
        &mut self,
        pipeline: PipelineHandle,
        textures: &[TextureHandle],
    ) -> BackendResult<MaterialBindingHandle>;

    /// Allocate a square shadow-map depth target
    fn create_shadow_map(&mut self, resolution: u32) -> BackendResult<ShadowMapHandle>;

    /// Upload the per-frame uniform block
    fn upload_frame_uniforms(&mut self, uniforms: &FrameUniforms) -> BackendResult<()>;

    /// Upload the flattened light array (the backend prepends the count
    /// header the shader expects)
    fn upload_lights(&mut self, lights: &[ShaderLight]) -> BackendResult<()>;

    /// Begin a depth-only pass targeting a shadow map
    fn begin_shadow_pass(&mut self, map: ShadowMapHandle) -> BackendResult<()>;

    /// Begin the color+depth main pass
    fn begin_main_pass(&mut self, clear_color: [f32; 4]) -> BackendResult<()>;

    /// End the current pass
    fn end_pass(&mut self) -> BackendResult<()>;

    /// Set the viewport rectangle
    fn set_viewport(&mut self, x: f32, y: f32, width: f32, height: f32);

    /// Set the scissor rectangle
    fn set_scissor(&mut self, width: u32, height: u32);

    /// Set the depth bias for the current pass
    fn set_depth_bias(&mut self, constant: f32, slope: f32);

    /// Bind a graphics pipeline
    fn bind_pipeline(&mut self, pipeline: PipelineHandle);

    /// Bind a material's texture binding set
    fn bind_material(&mut self, binding: MaterialBindingHandle);

    /// Bind a vertex buffer
    fn bind_vertex_buffer(&mut self, buffer: VertexBufferHandle);

    /// Push per-draw constants
    fn push_constants(&mut self, constants: &PushConstants);

    /// Issue a non-indexed draw
    fn draw(&mut self, vertex_count: u32);
}

/// One recorded backend command
#[derive(Debug, Clone, PartialEq)]
pub enum RenderCommand {
    /// Vertex buffer upload of `bytes` bytes
    CreateVertexBuffer {
        /// Uploaded byte count
        bytes: usize,
    },
    /// Texture upload
    CreateTexture {
        /// Top level width
        width: u32,
        /// Top level height
        height: u32,
        /// Mip level count
        levels: usize,
    },
    /// Pipeline compilation
    CreatePipeline {
        /// Material-type label
        label: String,
        /// Depth-only shadow variant
        depth_only: bool,
    },
    /// Material binding set creation
    CreateMaterialBinding {
        /// Pipeline the set targets
        pipeline: PipelineHandle,
        /// Number of bound textures
        textures: usize,
    },
    /// Shadow map allocation
    CreateShadowMap {
        /// Square resolution
        resolution: u32,
    },
    /// Per-frame uniform upload
    UploadFrameUniforms {
        /// Uploaded block
        uniforms: FrameUniforms,
    },
    /// Light array upload
    UploadLights {
        /// Uploaded lights, in shader order
        lights: Vec<ShaderLight>,
    },
    /// Shadow pass begin
    BeginShadowPass {
        /// Target shadow map
        map: ShadowMapHandle,
    },
    /// Main pass begin
    BeginMainPass {
        /// Clear color
        clear_color: [f32; 4],
    },
    /// Pass end
    EndPass,
    /// Viewport change
    SetViewport {
        /// Left edge
        x: f32,
        /// Top edge
        y: f32,
        /// Width
        width: f32,
        /// Height
        height: f32,
    },
    /// Scissor change
    SetScissor {
        /// Width
        width: u32,
        /// Height
        height: u32,
    },
    /// Depth bias change
    SetDepthBias {
        /// Constant factor
        constant: f32,
        /// Slope factor
        slope: f32,
    },
    /// Pipeline bind
    BindPipeline(PipelineHandle),
    /// Material binding set bind
    BindMaterial(MaterialBindingHandle),
    /// Vertex buffer bind
    BindVertexBuffer(VertexBufferHandle),
    /// Push constant update
    PushConstants(PushConstants),
    /// Non-indexed draw
    Draw {
        /// Vertex count
        vertex_count: u32,
    },
}

/// Backend that records the command stream instead of submitting it.
///
/// Used for headless runs and for asserting on emitted draw sequences in
/// tests.
#[derive(Debug)]
pub struct RecordingBackend {
    extent: (u32, u32),
    commands: Vec<RenderCommand>,
    next_handle: u64,
}

impl RecordingBackend {
    /// Create a recording backend with a fixed drawing extent
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            extent: (width, height),
            commands: Vec::new(),
            next_handle: 1,
        }
    }

    /// The recorded command stream
    pub fn commands(&self) -> &[RenderCommand] {
        &self.commands
    }

    /// Drop all recorded commands (between frames)
    pub fn clear_commands(&mut self) {
        self.commands.clear();
    }

    /// Count of recorded draw calls
    pub fn draw_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, RenderCommand::Draw { .. }))
            .count()
    }

    fn next(&mut self) -> u64 {
        let handle = self.next_handle;
        self.next_handle += 1;
        handle
    }
}

impl RenderBackend for RecordingBackend {
    fn swapchain_extent(&self) -> (u32, u32) {
        self.extent
    }

    fn create_vertex_buffer(&mut self, data: &[u8]) -> BackendResult<VertexBufferHandle> {
        self.commands.push(RenderCommand::CreateVertexBuffer { bytes: data.len() });
        Ok(VertexBufferHandle(self.next()))
    }

    fn create_texture(&mut self, texture: &TextureData) -> BackendResult<TextureHandle> {
        self.commands.push(RenderCommand::CreateTexture {
            width: texture.width,
            height: texture.height,
            levels: texture.levels.len(),
        });
        Ok(TextureHandle(self.next()))
    }

    fn create_pipeline(&mut self, desc: &PipelineDesc<'_>) -> BackendResult<PipelineHandle> {
        self.commands.push(RenderCommand::CreatePipeline {
            label: desc.label.to_string(),
            depth_only: desc.depth_only,
        });
        Ok(PipelineHandle(self.next()))
    }

    fn create_material_binding(
        &mut self,
        pipeline: PipelineHandle,
        textures: &[TextureHandle],
    ) -> BackendResult<MaterialBindingHandle> {
        self.commands.push(RenderCommand::CreateMaterialBinding {
            pipeline,
            textures: textures.len(),
        });
        Ok(MaterialBindingHandle(self.next()))
    }

    fn create_shadow_map(&mut self, resolution: u32) -> BackendResult<ShadowMapHandle> {
        self.commands.push(RenderCommand::CreateShadowMap { resolution });
        Ok(ShadowMapHandle(self.next()))
    }

    fn upload_frame_uniforms(&mut self, uniforms: &FrameUniforms) -> BackendResult<()> {
        self.commands.push(RenderCommand::UploadFrameUniforms {
            uniforms: *uniforms,
        });
        Ok(())
    }

    fn upload_lights(&mut self, lights: &[ShaderLight]) -> BackendResult<()> {
        self.commands.push(RenderCommand::UploadLights {
            lights: lights.to_vec(),
        });
        Ok(())
    }

    fn begin_shadow_pass(&mut self, map: ShadowMapHandle) -> BackendResult<()> {
        self.commands.push(RenderCommand::BeginShadowPass { map });
        Ok(())
    }

    fn begin_main_pass(&mut self, clear_color: [f32; 4]) -> BackendResult<()> {
        self.commands.push(RenderCommand::BeginMainPass { clear_color });
        Ok(())
    }

    fn end_pass(&mut self) -> BackendResult<()> {
        self.commands.push(RenderCommand::EndPass);
        Ok(())
    }

    fn set_viewport(&mut self, x: f32, y: f32, width: f32, height: f32) {
        self.commands.push(RenderCommand::SetViewport {
            x,
            y,
            width,
            height,
        });
    }

    fn set_scissor(&mut self, width: u32, height: u32) {
        self.commands.push(RenderCommand::SetScissor { width, height });
    }

    fn set_depth_bias(&mut self, constant: f32, slope: f32) {
        self.commands.push(RenderCommand::SetDepthBias { constant, slope });
    }

    fn bind_pipeline(&mut self, pipeline: PipelineHandle) {
        self.commands.push(RenderCommand::BindPipeline(pipeline));
    }

    fn bind_material(&mut self, binding: MaterialBindingHandle) {
        self.commands.push(RenderCommand::BindMaterial(binding));
    }

    fn bind_vertex_buffer(&mut self, buffer: VertexBufferHandle) {
        self.commands.push(RenderCommand::BindVertexBuffer(buffer));
    }

    fn push_constants(&mut self, constants: &PushConstants) {
        self.commands.push(RenderCommand::PushConstants(*constants));
    }

    fn draw(&mut self, vertex_count: u32) {
        self.commands.push(RenderCommand::Draw { vertex_count });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handles_are_unique() {
        let mut backend = RecordingBackend::new(64, 64);
        let a = backend.create_vertex_buffer(&[0; 16]).unwrap();
        let b = backend.create_vertex_buffer(&[0; 16]).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_push_constants_is_16_byte_multiple() {
        assert_eq!(std::mem::size_of::<PushConstants>() % 16, 0);
        assert_eq!(std::mem::size_of::<FrameUniforms>() % 16, 0);
    }
}
