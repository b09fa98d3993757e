//! Screen-space passes
//!
//! Everything after scene geometry runs on a fullscreen quad: bloom, the deferred
//! shading pass, and the final composite onto the window surface.

mod bloom;
mod deferred;

pub use bloom::{Bloom, BloomSettings, BlurUniform, ExtractUniform};
pub use deferred::{DeferredShading, DeferredUniform, GBUFFER_TARGETS};

use bytemuck::{Pod, Zeroable};

use super::gpu::{
    GpuError, GraphicsContext, Primitive, ProgramId, ShaderSource, TextureId, VertexArrayId,
    VertexLayout,
};

/// Fullscreen quad vertex
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct QuadVertex {
    pub position: [f32; 2],
    pub uv: [f32; 2],
}

/// Triangle strip covering clip space, uv origin at the top left
pub const QUAD_VERTICES: [QuadVertex; 4] = [
    QuadVertex {
        position: [-1.0, -1.0],
        uv: [0.0, 1.0],
    },
    QuadVertex {
        position: [1.0, -1.0],
        uv: [1.0, 1.0],
    },
    QuadVertex {
        position: [-1.0, 1.0],
        uv: [0.0, 0.0],
    },
    QuadVertex {
        position: [1.0, 1.0],
        uv: [1.0, 0.0],
    },
];

/// Full-screen quad for post-processing
#[derive(Debug)]
pub struct ScreenQuad {
    vertex_array: VertexArrayId,
}

impl ScreenQuad {
    /// Upload the quad
    ///
    /// # Errors
    ///
    /// Returns an error if the vertex data cannot be uploaded
    pub fn new(ctx: &mut dyn GraphicsContext) -> Result<Self, GpuError> {
        let vertex_array = ctx.create_vertex_array(
            VertexLayout::Screen,
            bytemuck::cast_slice(&QUAD_VERTICES),
            QUAD_VERTICES.len() as u32,
        )?;
        Ok(Self { vertex_array })
    }

    #[must_use]
    pub fn vertex_array(&self) -> VertexArrayId {
        self.vertex_array
    }

    /// Draw with whatever program and textures are bound
    pub fn draw(&self, ctx: &mut dyn GraphicsContext) {
        ctx.bind_vertex_array(Some(self.vertex_array));
        ctx.draw_arrays(Primitive::TriangleStrip, 0, QUAD_VERTICES.len() as u32);
    }
}

/// Compile a screen-space program, logging failures.
///
/// A pass whose program is missing is skipped at render time.
pub(crate) fn compile_screen_program(
    ctx: &mut dyn GraphicsContext,
    source: &ShaderSource,
) -> Option<ProgramId> {
    match ctx.create_program(source) {
        Ok(program) => Some(program),
        Err(e) => {
            log::error!("Screen pass '{}' disabled: {e}", source.label);
            None
        }
    }
}

/// Flags of the final composite
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct CompositeUniform {
    pub bloom_enabled: f32,
    pub hdr_enabled: f32,
    pub gamma_correction_enabled: f32,
    pub gamma: f32,
}

/// Final pass: adds bloom, tone maps and gamma corrects the scene onto the surface
#[derive(Debug)]
pub struct Composite {
    program: Option<ProgramId>,
    uniform: CompositeUniform,
}

impl Composite {
    pub const GAMMA: f32 = 2.2;

    /// Compile the composite program with every effect enabled
    pub fn new(ctx: &mut dyn GraphicsContext) -> Self {
        let source = ShaderSource::new(
            "composite",
            include_str!("../shaders/composite.wgsl"),
            VertexLayout::Screen,
            std::mem::size_of::<CompositeUniform>() as u64,
        )
        .with_textures(2);

        let mut composite = Self {
            program: compile_screen_program(ctx, &source),
            uniform: CompositeUniform {
                bloom_enabled: 1.0,
                hdr_enabled: 1.0,
                gamma_correction_enabled: 1.0,
                gamma: Self::GAMMA,
            },
        };
        composite.upload(ctx);
        composite
    }

    #[must_use]
    pub fn program(&self) -> Option<ProgramId> {
        self.program
    }

    #[must_use]
    pub fn uniform(&self) -> CompositeUniform {
        self.uniform
    }

    /// Update the flags and upload them immediately
    pub fn set_flags(&mut self, ctx: &mut dyn GraphicsContext, bloom: bool, hdr: bool, gamma: bool) {
        self.uniform.bloom_enabled = super::material::flag(bloom);
        self.uniform.hdr_enabled = super::material::flag(hdr);
        self.uniform.gamma_correction_enabled = super::material::flag(gamma);
        self.upload(ctx);
    }

    fn upload(&self, ctx: &mut dyn GraphicsContext) {
        if let Some(program) = self.program {
            ctx.write_uniforms(program, bytemuck::bytes_of(&self.uniform));
        }
    }

    /// Draw `scene` plus `bloom` to the bound framebuffer
    pub fn draw(
        &self,
        ctx: &mut dyn GraphicsContext,
        quad: &ScreenQuad,
        scene: TextureId,
        bloom: TextureId,
    ) {
        let Some(program) = self.program else {
            return;
        };
        ctx.use_program(Some(program));
        ctx.bind_texture(0, scene);
        ctx.bind_texture(1, bloom);
        quad.draw(ctx);
        ctx.use_program(None);
    }
}
