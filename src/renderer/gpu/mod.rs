//! Graphics context abstraction
//!
//! Every draw operation in the renderer receives an explicit `&mut dyn GraphicsContext`.
//! The context owns the binding state (current framebuffer, program, vertex array, cull
//! mode, enabled capabilities) and the GPU resources behind opaque handles.
//!
//! Two backends are provided:
//! - [`WgpuContext`] renders to a window surface with wgpu
//! - [`RecordingContext`] is headless, simulates the binding state and logs every command
//!
//! # Shader conventions
//!
//! Programs are WGSL modules with `vs_main` / `fs_main` entry points. Group 0 holds:
//! - binding 0: the program's uniform block (`uniform_size` bytes)
//! - binding 1: a linear clamp sampler
//! - binding 2 + n: a `texture_2d<f32>` for texture unit `n`

use std::borrow::Cow;
use std::ops::{Deref, DerefMut};

mod recording;
mod wgpu_backend;

pub use recording::{DrawCall, GpuCommand, RecordingContext};
pub use wgpu_backend::WgpuContext;

/// Maximum number of texture units a program may sample.
pub const MAX_TEXTURE_UNITS: u32 = 8;

/// Multisample counts every backend accepts
pub const SAMPLE_COUNTS: [u32; 4] = [1, 2, 4, 8];

macro_rules! gpu_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u32);

        impl $name {
            /// Get the raw handle value.
            #[must_use]
            #[inline]
            pub const fn raw(self) -> u32 {
                self.0
            }
        }
    };
}

gpu_handle!(
    /// Handle to a texture owned by a graphics context
    TextureId
);
gpu_handle!(
    /// Handle to an offscreen framebuffer
    FramebufferId
);
gpu_handle!(
    /// Handle to a compiled shader program
    ProgramId
);
gpu_handle!(
    /// Handle to uploaded vertex data
    VertexArrayId
);

/// Texel formats the pipeline allocates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    /// 8-bit normalized color
    Rgba8Unorm,
    /// Half-float HDR color
    Rgba16Float,
    /// 32-bit float depth
    Depth32Float,
}

impl TextureFormat {
    /// Whether this is a depth format
    #[must_use]
    pub const fn is_depth(self) -> bool {
        matches!(self, Self::Depth32Float)
    }
}

/// Texture allocation parameters
#[derive(Debug, Clone)]
pub struct TextureDesc {
    pub label: &'static str,
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    /// Sample count (1 for a regular texture)
    pub samples: u32,
}

impl TextureDesc {
    /// Single-sample texture
    #[must_use]
    pub fn new(label: &'static str, width: u32, height: u32, format: TextureFormat) -> Self {
        Self {
            label,
            width,
            height,
            format,
            samples: 1,
        }
    }

    /// Set the sample count
    #[must_use]
    pub fn with_samples(mut self, samples: u32) -> Self {
        self.samples = samples;
        self
    }
}

/// Framebuffer attachments
#[derive(Debug, Clone)]
pub struct FramebufferDesc<'a> {
    pub label: &'static str,
    /// Color attachments, in shader output order
    pub color: &'a [TextureId],
    pub depth: Option<TextureId>,
}

/// Which framebuffer draws go to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FramebufferBinding {
    /// The window surface
    Default,
    /// An offscreen framebuffer
    Offscreen(FramebufferId),
}

/// Vertex formats understood by the backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexLayout {
    /// position (vec3), normal (vec3), uv (vec2)
    Mesh,
    /// position (vec2), uv (vec2)
    Screen,
}

impl VertexLayout {
    /// Size of one vertex in bytes
    #[must_use]
    pub const fn stride(self) -> u64 {
        match self {
            Self::Mesh => 32,
            Self::Screen => 16,
        }
    }
}

/// Primitive assembly mode for a draw
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    Triangles,
    TriangleStrip,
}

/// Which faces are culled while culling is enabled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CullFace {
    Front,
    Back,
}

/// Toggleable fixed-function state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    DepthTest,
    CullFace,
    Multisample,
}

/// Shader program description
#[derive(Debug, Clone)]
pub struct ShaderSource {
    pub label: &'static str,
    /// WGSL source with `vs_main` and `fs_main`
    pub wgsl: Cow<'static, str>,
    /// Vertex format consumed by `vs_main`
    pub vertex_layout: VertexLayout,
    /// Size in bytes of the uniform block at binding 0
    pub uniform_size: u64,
    /// Number of sampled texture units
    pub texture_count: u32,
}

impl ShaderSource {
    /// Describe a program over built-in WGSL
    #[must_use]
    pub fn new(
        label: &'static str,
        wgsl: &'static str,
        vertex_layout: VertexLayout,
        uniform_size: u64,
    ) -> Self {
        Self {
            label,
            wgsl: Cow::Borrowed(wgsl),
            vertex_layout,
            uniform_size,
            texture_count: 0,
        }
    }

    /// Set the number of sampled textures
    #[must_use]
    pub fn with_textures(mut self, count: u32) -> Self {
        self.texture_count = count;
        self
    }

    /// Check the parts of the description both backends rely on
    pub(crate) fn validate(&self) -> Result<(), GpuError> {
        if self.wgsl.trim().is_empty() {
            return Err(GpuError::ShaderCompilation {
                label: self.label.to_string(),
                message: "empty shader source".to_string(),
            });
        }
        if self.uniform_size == 0 || self.uniform_size % 16 != 0 {
            return Err(GpuError::ShaderCompilation {
                label: self.label.to_string(),
                message: format!(
                    "uniform block size {} is not a non-zero multiple of 16",
                    self.uniform_size
                ),
            });
        }
        if self.texture_count > MAX_TEXTURE_UNITS {
            return Err(GpuError::ShaderCompilation {
                label: self.label.to_string(),
                message: format!("{} texture units requested", self.texture_count),
            });
        }
        Ok(())
    }
}

/// Stateful graphics context.
///
/// Binding state set through this trait persists until changed, the same way a
/// GL context behaves. Uniform blocks are stored per program: writing a program's
/// uniforms does not affect any other program, and a draw uses the block as it was
/// when the draw was issued.
pub trait GraphicsContext {
    /// Allocate a texture
    ///
    /// # Errors
    ///
    /// Returns an error if the texture cannot be allocated
    fn create_texture(&mut self, desc: &TextureDesc) -> Result<TextureId, GpuError>;

    /// Assemble a framebuffer from existing textures
    ///
    /// # Errors
    ///
    /// Returns an error if the attachments are missing or do not agree in size,
    /// sample count or kind
    fn create_framebuffer(&mut self, desc: &FramebufferDesc<'_>) -> Result<FramebufferId, GpuError>;

    /// Compile a shader program
    ///
    /// # Errors
    ///
    /// Returns an error if the source fails to compile
    fn create_program(&mut self, source: &ShaderSource) -> Result<ProgramId, GpuError>;

    /// Upload vertex data
    ///
    /// # Errors
    ///
    /// Returns an error if the data does not match the layout or allocation fails
    fn create_vertex_array(
        &mut self,
        layout: VertexLayout,
        data: &[u8],
        vertex_count: u32,
    ) -> Result<VertexArrayId, GpuError>;

    /// Make a framebuffer the draw target
    fn bind_framebuffer(&mut self, binding: FramebufferBinding);

    /// Clear color and depth of the bound framebuffer
    fn clear(&mut self, color: [f32; 4]);

    /// Select the program used by subsequent draws
    fn use_program(&mut self, program: Option<ProgramId>);

    /// Replace a program's uniform block
    fn write_uniforms(&mut self, program: ProgramId, data: &[u8]);

    /// Bind a texture to a sampling unit
    fn bind_texture(&mut self, unit: u32, texture: TextureId);

    /// Select which faces are culled
    fn set_cull_face(&mut self, face: CullFace);

    /// Currently culled faces
    fn cull_face(&self) -> CullFace;

    /// Enable or disable a capability
    fn set_capability(&mut self, capability: Capability, enabled: bool);

    /// Whether a capability is enabled
    fn is_enabled(&self, capability: Capability) -> bool;

    /// Select the vertex data used by subsequent draws
    fn bind_vertex_array(&mut self, vertex_array: Option<VertexArrayId>);

    /// Draw `count` vertices starting at `first`
    fn draw_arrays(&mut self, primitive: Primitive, first: u32, count: u32);

    /// Copy (resolving samples if needed) the first color attachment of `source`
    /// into the first color attachment of `destination`
    fn blit_framebuffer(&mut self, source: FramebufferId, destination: FramebufferId);

    /// Finish the frame and show the default framebuffer
    ///
    /// # Errors
    ///
    /// Returns an error if the surface could not be acquired or presented
    fn present(&mut self) -> Result<(), GpuError>;
}

/// Scoped cull mode.
///
/// Sets the requested cull face on creation and sets the restore face when
/// dropped. Dereferences to the wrapped context so draws can be issued through it.
pub struct CullFaceScope<'a> {
    ctx: &'a mut dyn GraphicsContext,
    restore: CullFace,
}

impl<'a> CullFaceScope<'a> {
    /// Switch the cull face until the scope ends, then return to the current one
    pub fn new(ctx: &'a mut dyn GraphicsContext, face: CullFace) -> Self {
        let restore = ctx.cull_face();
        Self::reset_to(ctx, face, restore)
    }

    /// Switch the cull face until the scope ends, then set `restore` regardless of
    /// the face that was active before
    pub fn reset_to(ctx: &'a mut dyn GraphicsContext, face: CullFace, restore: CullFace) -> Self {
        if ctx.cull_face() != face {
            ctx.set_cull_face(face);
        }
        Self { ctx, restore }
    }
}

impl<'a> Deref for CullFaceScope<'a> {
    type Target = dyn GraphicsContext + 'a;

    fn deref(&self) -> &Self::Target {
        &*self.ctx
    }
}

impl<'a> DerefMut for CullFaceScope<'a> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut *self.ctx
    }
}

impl Drop for CullFaceScope<'_> {
    fn drop(&mut self) {
        if self.ctx.cull_face() != self.restore {
            self.ctx.set_cull_face(self.restore);
        }
    }
}

/// Errors raised by graphics contexts
#[derive(Debug, Clone)]
pub enum GpuError {
    /// No adapter compatible with the surface
    AdapterUnavailable,
    /// Device request failed
    DeviceRequest(String),
    /// Window surface could not be created or acquired
    Surface(String),
    /// Texture or buffer allocation failed
    AllocationFailed(String),
    /// Framebuffer attachments are inconsistent
    IncompleteFramebuffer(String),
    /// Program failed to compile
    ShaderCompilation { label: String, message: String },
    /// A handle does not name a live resource
    UnknownHandle(String),
}

impl std::fmt::Display for GpuError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AdapterUnavailable => write!(f, "no compatible GPU adapter"),
            Self::DeviceRequest(e) => write!(f, "device request failed: {e}"),
            Self::Surface(e) => write!(f, "surface error: {e}"),
            Self::AllocationFailed(e) => write!(f, "allocation failed: {e}"),
            Self::IncompleteFramebuffer(e) => write!(f, "incomplete framebuffer: {e}"),
            Self::ShaderCompilation { label, message } => {
                write!(f, "shader '{label}' failed to compile: {message}")
            }
            Self::UnknownHandle(e) => write!(f, "unknown handle: {e}"),
        }
    }
}

impl std::error::Error for GpuError {}
