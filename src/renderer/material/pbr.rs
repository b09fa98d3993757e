//! Physically based G-buffer material
//!
//! Writes roughness and metalness instead of Phong terms; the deferred pass shades
//! these texels with a Cook-Torrance BRDF.

use glam::{Mat4, Vec3};

use super::deferred::{DeferredMaterial, GeometryUniform, ShadingModel};
use super::{Material, UniformBlock};
use crate::renderer::gpu::{GpuError, GraphicsContext, ProgramId};
use crate::renderer::lights::GpuLight;

/// Metallic-roughness surface written to the G-buffer
#[derive(Debug, Clone)]
pub struct DeferredPbrMaterial {
    inner: DeferredMaterial,
}

impl DeferredPbrMaterial {
    #[must_use]
    pub fn new(color: Vec3, roughness: f32, metallic: f32) -> Self {
        Self {
            inner: DeferredMaterial {
                program: None,
                uniforms: UniformBlock::new(GeometryUniform::new(
                    color,
                    roughness.clamp(0.0, 1.0),
                    0.0,
                    ShadingModel::Pbr,
                    metallic.clamp(0.0, 1.0),
                )),
                light_count: 0,
            },
        }
    }

    pub fn set_roughness(&mut self, roughness: f32) {
        self.inner
            .uniforms
            .update(|u| u.albedo[3] = roughness.clamp(0.0, 1.0));
    }

    pub fn set_metallic(&mut self, metallic: f32) {
        self.inner
            .uniforms
            .update(|u| u.params[3] = metallic.clamp(0.0, 1.0));
    }

    #[must_use]
    pub fn uniform(&self) -> &GeometryUniform {
        self.inner.uniform()
    }
}

impl Material for DeferredPbrMaterial {
    fn create(&mut self, ctx: &mut dyn GraphicsContext) -> Result<(), GpuError> {
        self.inner.compile(ctx, "deferred_pbr_geometry")
    }

    fn set_color(&mut self, color: Vec3) {
        self.inner.set_color(color);
    }

    // No specular exponent in the metallic-roughness model.
    fn set_shininess(&mut self, _shininess: f32) {}

    fn set_lights(&mut self, lights: &[GpuLight]) {
        self.inner.set_lights(lights);
    }

    fn set_emissive_color_and_strength(&mut self, color: Vec3, strength: f32) {
        self.inner.set_emissive_color_and_strength(color, strength);
    }

    fn set_emissive_color(&mut self, color: Vec3) {
        self.inner.set_emissive_color(color);
    }

    fn set_emissive_strength(&mut self, strength: f32) {
        self.inner.set_emissive_strength(strength);
    }

    fn toggle_emissive(&mut self, enabled: bool) {
        self.inner.toggle_emissive(enabled);
    }

    fn toggle_blinn_phong_shading(&mut self, _enabled: bool) {}

    fn set_model_matrix(&mut self, model: Mat4) {
        self.inner.set_model_matrix(model);
    }

    fn set_projection_and_view_matrices(&mut self, projection: Mat4, view: Mat4) {
        self.inner.set_projection_and_view_matrices(projection, view);
    }

    fn set_uniforms(&mut self, ctx: &mut dyn GraphicsContext) {
        self.inner.set_uniforms(ctx);
    }

    fn program(&self) -> Option<ProgramId> {
        self.inner.program()
    }

    fn light_count(&self) -> usize {
        self.inner.light_count()
    }

    fn uniform_data(&self) -> &[u8] {
        self.inner.uniform_data()
    }
}
