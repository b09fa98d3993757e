//! Material system
//!
//! A material owns one shader program and the CPU-side copy of its uniform block.
//! Setters only stage values; [`Material::set_uniforms`] uploads the block when it
//! changed. Each model keeps one material per [`MaterialType`] so the forward and
//! deferred passes can draw the same geometry with different programs.

mod deferred;
mod pbr;
mod skybox;
mod standard;

pub use deferred::{DeferredMaterial, GeometryUniform, ShadingModel};
pub use pbr::DeferredPbrMaterial;
pub use skybox::{GradientSky, SkyboxMaterial, SkyboxTarget, SkyboxUniform};
pub use standard::{StandardMaterial, StandardUniform};

use bytemuck::Pod;
use glam::{Mat4, Vec3};

use super::gpu::{CullFace, GpuError, GraphicsContext, ProgramId};
use super::lights::GpuLight;

/// Pass a material variant is drawn in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MaterialType {
    /// Forward shading
    Standard,
    /// G-buffer writer for Phong / Blinn-Phong shading
    Deferred,
    /// G-buffer writer for physically based shading
    DeferredPbr,
    /// Environment background
    Skybox,
}

/// Which side of a surface is rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Side {
    #[default]
    Front,
    Back,
}

impl Side {
    /// Faces that must be culled to show this side
    #[must_use]
    pub const fn cull_face(self) -> CullFace {
        match self {
            Self::Front => CullFace::Back,
            Self::Back => CullFace::Front,
        }
    }
}

/// Shader program plus the uniforms it consumes
pub trait Material {
    /// Compile the program
    ///
    /// # Errors
    ///
    /// Returns an error if the program fails to compile
    fn create(&mut self, ctx: &mut dyn GraphicsContext) -> Result<(), GpuError>;

    fn set_color(&mut self, color: Vec3);
    fn set_shininess(&mut self, shininess: f32);
    fn set_lights(&mut self, lights: &[GpuLight]);

    fn set_emissive_color_and_strength(&mut self, color: Vec3, strength: f32);
    fn set_emissive_color(&mut self, color: Vec3);
    fn set_emissive_strength(&mut self, strength: f32);
    fn toggle_emissive(&mut self, enabled: bool);

    fn toggle_blinn_phong_shading(&mut self, enabled: bool);

    fn set_model_matrix(&mut self, model: Mat4);
    fn set_projection_and_view_matrices(&mut self, projection: Mat4, view: Mat4);

    /// Upload staged uniforms to the program
    fn set_uniforms(&mut self, ctx: &mut dyn GraphicsContext);

    /// Compiled program, if `create` succeeded
    fn program(&self) -> Option<ProgramId>;

    /// Side to render
    fn side(&self) -> Side {
        Side::Front
    }

    /// Number of lights last received
    fn light_count(&self) -> usize {
        0
    }

    /// Staged uniform block
    fn uniform_data(&self) -> &[u8];
}

/// Compile a material's program and box it.
///
/// A failed compile is logged and the material is kept; models skip drawing it.
pub fn prepare<M: Material + 'static>(ctx: &mut dyn GraphicsContext, mut material: M) -> Box<dyn Material> {
    if let Err(e) = material.create(ctx) {
        log::error!("Material disabled: {e}");
    }
    Box::new(material)
}

/// CPU copy of a uniform block with a change flag
#[derive(Debug, Clone)]
pub struct UniformBlock<T: Pod> {
    value: T,
    dirty: bool,
}

impl<T: Pod> UniformBlock<T> {
    pub fn new(value: T) -> Self {
        Self { value, dirty: true }
    }

    #[must_use]
    pub fn get(&self) -> &T {
        &self.value
    }

    /// Modify the block and mark it for upload
    pub fn update(&mut self, f: impl FnOnce(&mut T)) {
        f(&mut self.value);
        self.dirty = true;
    }

    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        bytemuck::bytes_of(&self.value)
    }

    /// Write the block to `program` if it changed since the last flush
    pub fn flush(&mut self, ctx: &mut dyn GraphicsContext, program: Option<ProgramId>) {
        let Some(program) = program else {
            return;
        };
        if self.dirty {
            ctx.write_uniforms(program, bytemuck::bytes_of(&self.value));
            self.dirty = false;
        }
    }
}

/// Inverse transpose of the upper 3x3, padded to a 4x4 for uniform layout
pub(crate) fn normal_matrix(model: Mat4) -> [[f32; 4]; 4] {
    let inverse_transpose = model.inverse().transpose();
    let mut normal = Mat4::from_mat3(glam::Mat3::from_mat4(inverse_transpose));
    if !normal.is_finite() {
        normal = Mat4::IDENTITY;
    }
    normal.to_cols_array_2d()
}

pub(crate) fn flag(enabled: bool) -> f32 {
    if enabled { 1.0 } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::gpu::{GpuCommand, RecordingContext, ShaderSource, VertexLayout};

    #[test]
    fn test_back_side_culls_front_faces() {
        assert_eq!(Side::Back.cull_face(), CullFace::Front);
        assert_eq!(Side::Front.cull_face(), CullFace::Back);
    }

    #[test]
    fn test_uniform_block_flushes_only_when_changed() {
        let mut ctx = RecordingContext::new();
        let program = ctx
            .create_program(&ShaderSource::new("p", "x", VertexLayout::Mesh, 16))
            .unwrap();
        let mut block = UniformBlock::new([0.0f32; 4]);

        block.flush(&mut ctx, Some(program));
        block.flush(&mut ctx, Some(program));
        block.update(|v| v[0] = 2.0);
        block.flush(&mut ctx, Some(program));

        let writes = ctx
            .commands()
            .iter()
            .filter(|c| matches!(c, GpuCommand::WriteUniforms { .. }))
            .count();
        assert_eq!(writes, 2);
        assert_eq!(&ctx.uniforms(program).unwrap()[..4], &2.0f32.to_ne_bytes());
    }

    #[test]
    fn test_normal_matrix_of_uniform_scale_is_scaled_rotation() {
        let model = Mat4::from_scale(Vec3::splat(2.0));
        let normal = Mat4::from_cols_array_2d(&normal_matrix(model));
        assert!(normal.abs_diff_eq(Mat4::from_scale(Vec3::splat(0.5)), 1e-6));
    }

    #[test]
    fn test_singular_model_matrix_falls_back_to_identity() {
        let model = Mat4::from_scale(Vec3::ZERO);
        assert_eq!(normal_matrix(model), Mat4::IDENTITY.to_cols_array_2d());
    }
}
