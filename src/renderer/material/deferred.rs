//! G-buffer material for the deferred path

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};

use super::{Material, UniformBlock, flag, normal_matrix};
use crate::renderer::gpu::{GpuError, GraphicsContext, ProgramId, ShaderSource, VertexLayout};
use crate::renderer::lights::{GpuLight, MAX_LIGHTS};

pub(super) const GEOMETRY_SHADER: &str = include_str!("../shaders/deferred_geometry.wgsl");

/// Lighting model the deferred pass applies to a G-buffer texel.
///
/// Stored in the alpha channel of the position target; zero marks an empty texel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ShadingModel {
    Phong = 1,
    Pbr = 2,
    Unlit = 3,
}

impl ShadingModel {
    #[must_use]
    pub const fn id(self) -> f32 {
        self as u32 as f32
    }
}

/// Uniform block shared by the G-buffer writers
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct GeometryUniform {
    pub model: [[f32; 4]; 4],
    pub view: [[f32; 4]; 4],
    pub projection: [[f32; 4]; 4],
    pub normal_matrix: [[f32; 4]; 4],
    /// Albedo in rgb; specular strength (Phong) or roughness (PBR) in w
    pub albedo: [f32; 4],
    /// Emissive color in rgb, strength in w
    pub emissive: [f32; 4],
    /// shininess, emissive enabled, shading model, metallic
    pub params: [f32; 4],
}

impl GeometryUniform {
    pub(super) fn new(albedo: Vec3, w: f32, shininess: f32, model: ShadingModel, metallic: f32) -> Self {
        let identity = Mat4::IDENTITY.to_cols_array_2d();
        Self {
            model: identity,
            view: identity,
            projection: identity,
            normal_matrix: identity,
            albedo: albedo.extend(w).into(),
            emissive: [0.0; 4],
            params: [shininess, 0.0, model.id(), metallic],
        }
    }
}

/// Phong surface attributes written to the G-buffer
#[derive(Debug, Clone)]
pub struct DeferredMaterial {
    pub(super) program: Option<ProgramId>,
    pub(super) uniforms: UniformBlock<GeometryUniform>,
    pub(super) light_count: usize,
}

impl DeferredMaterial {
    #[must_use]
    pub fn new(color: Vec3, specular: f32, shininess: f32) -> Self {
        Self {
            program: None,
            uniforms: UniformBlock::new(GeometryUniform::new(
                color,
                specular,
                shininess,
                ShadingModel::Phong,
                0.0,
            )),
            light_count: 0,
        }
    }

    #[must_use]
    pub fn uniform(&self) -> &GeometryUniform {
        self.uniforms.get()
    }

    pub(super) fn compile(
        &mut self,
        ctx: &mut dyn GraphicsContext,
        label: &'static str,
    ) -> Result<(), GpuError> {
        let source = ShaderSource::new(
            label,
            GEOMETRY_SHADER,
            VertexLayout::Mesh,
            std::mem::size_of::<GeometryUniform>() as u64,
        );
        self.program = Some(ctx.create_program(&source)?);
        Ok(())
    }
}

impl Default for DeferredMaterial {
    fn default() -> Self {
        Self::new(Vec3::splat(0.8), 0.5, 32.0)
    }
}

impl Material for DeferredMaterial {
    fn create(&mut self, ctx: &mut dyn GraphicsContext) -> Result<(), GpuError> {
        self.compile(ctx, "deferred_geometry")
    }

    fn set_color(&mut self, color: Vec3) {
        self.uniforms.update(|u| {
            u.albedo[0] = color.x;
            u.albedo[1] = color.y;
            u.albedo[2] = color.z;
        });
    }

    fn set_shininess(&mut self, shininess: f32) {
        self.uniforms.update(|u| u.params[0] = shininess);
    }

    // Lights are applied by the deferred shading pass.
    fn set_lights(&mut self, lights: &[GpuLight]) {
        self.light_count = lights.len().min(MAX_LIGHTS);
    }

    fn set_emissive_color_and_strength(&mut self, color: Vec3, strength: f32) {
        self.uniforms.update(|u| u.emissive = color.extend(strength).into());
    }

    fn set_emissive_color(&mut self, color: Vec3) {
        self.uniforms.update(|u| {
            u.emissive[0] = color.x;
            u.emissive[1] = color.y;
            u.emissive[2] = color.z;
        });
    }

    fn set_emissive_strength(&mut self, strength: f32) {
        self.uniforms.update(|u| u.emissive[3] = strength);
    }

    fn toggle_emissive(&mut self, enabled: bool) {
        self.uniforms.update(|u| u.params[1] = flag(enabled));
    }

    // The shading pass owns the Blinn-Phong switch.
    fn toggle_blinn_phong_shading(&mut self, _enabled: bool) {}

    fn set_model_matrix(&mut self, model: Mat4) {
        self.uniforms.update(|u| {
            u.model = model.to_cols_array_2d();
            u.normal_matrix = normal_matrix(model);
        });
    }

    fn set_projection_and_view_matrices(&mut self, projection: Mat4, view: Mat4) {
        self.uniforms.update(|u| {
            u.projection = projection.to_cols_array_2d();
            u.view = view.to_cols_array_2d();
        });
    }

    fn set_uniforms(&mut self, ctx: &mut dyn GraphicsContext) {
        self.uniforms.flush(ctx, self.program);
    }

    fn program(&self) -> Option<ProgramId> {
        self.program
    }

    fn light_count(&self) -> usize {
        self.light_count
    }

    fn uniform_data(&self) -> &[u8] {
        self.uniforms.bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geometry_uniform_is_aligned() {
        assert_eq!(std::mem::size_of::<GeometryUniform>() % 16, 0);
    }

    #[test]
    fn test_writes_phong_shading_model() {
        let material = DeferredMaterial::default();
        assert_eq!(material.uniform().params[2], ShadingModel::Phong.id());
    }

    #[test]
    fn test_emissive_setters_stage_values() {
        let mut material = DeferredMaterial::default();
        material.set_emissive_color_and_strength(Vec3::new(1.0, 0.5, 0.0), 3.0);
        material.set_emissive_strength(2.0);
        material.toggle_emissive(true);

        assert_eq!(material.uniform().emissive, [1.0, 0.5, 0.0, 2.0]);
        assert_eq!(material.uniform().params[1], 1.0);
    }
}
