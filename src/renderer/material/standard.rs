//! Forward Phong / Blinn-Phong material

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};

use super::{Material, UniformBlock, flag, normal_matrix};
use crate::renderer::gpu::{GpuError, GraphicsContext, ProgramId, ShaderSource, VertexLayout};
use crate::renderer::lights::{GpuLight, MAX_LIGHTS, light_array};

const SHADER: &str = include_str!("../shaders/standard.wgsl");

/// Uniform block of the standard program
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct StandardUniform {
    pub model: [[f32; 4]; 4],
    pub view: [[f32; 4]; 4],
    pub projection: [[f32; 4]; 4],
    pub normal_matrix: [[f32; 4]; 4],
    /// Base color in rgb, specular strength in w
    pub color: [f32; 4],
    /// Emissive color in rgb, strength in w
    pub emissive: [f32; 4],
    /// shininess, emissive enabled, blinn-phong enabled, light count
    pub params: [f32; 4],
    /// Camera position in world space
    pub eye: [f32; 4],
    pub lights: [GpuLight; MAX_LIGHTS],
}

impl StandardUniform {
    fn new(color: Vec3, specular: f32, shininess: f32) -> Self {
        let identity = Mat4::IDENTITY.to_cols_array_2d();
        Self {
            model: identity,
            view: identity,
            projection: identity,
            normal_matrix: identity,
            color: color.extend(specular).into(),
            emissive: [0.0; 4],
            params: [shininess, 0.0, 0.0, 0.0],
            eye: [0.0, 0.0, 0.0, 1.0],
            lights: [GpuLight::zeroed(); MAX_LIGHTS],
        }
    }
}

/// Lit forward material
#[derive(Debug, Clone)]
pub struct StandardMaterial {
    program: Option<ProgramId>,
    uniforms: UniformBlock<StandardUniform>,
    light_count: usize,
}

impl StandardMaterial {
    /// Create a material; `specular` scales highlights, `shininess` is the Phong exponent
    #[must_use]
    pub fn new(color: Vec3, specular: f32, shininess: f32) -> Self {
        Self {
            program: None,
            uniforms: UniformBlock::new(StandardUniform::new(color, specular, shininess)),
            light_count: 0,
        }
    }

    #[must_use]
    pub fn uniform(&self) -> &StandardUniform {
        self.uniforms.get()
    }
}

impl Default for StandardMaterial {
    fn default() -> Self {
        Self::new(Vec3::splat(0.8), 0.5, 32.0)
    }
}

impl Material for StandardMaterial {
    fn create(&mut self, ctx: &mut dyn GraphicsContext) -> Result<(), GpuError> {
        let source = ShaderSource::new(
            "standard",
            SHADER,
            VertexLayout::Mesh,
            std::mem::size_of::<StandardUniform>() as u64,
        );
        self.program = Some(ctx.create_program(&source)?);
        Ok(())
    }

    fn set_color(&mut self, color: Vec3) {
        self.uniforms.update(|u| {
            u.color[0] = color.x;
            u.color[1] = color.y;
            u.color[2] = color.z;
        });
    }

    fn set_shininess(&mut self, shininess: f32) {
        self.uniforms.update(|u| u.params[0] = shininess);
    }

    fn set_lights(&mut self, lights: &[GpuLight]) {
        let count = lights.len().min(MAX_LIGHTS);
        self.light_count = count;
        self.uniforms.update(|u| {
            u.lights = light_array(lights);
            u.params[3] = count as f32;
        });
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

    fn toggle_blinn_phong_shading(&mut self, enabled: bool) {
        self.uniforms.update(|u| u.params[2] = flag(enabled));
    }

    fn set_model_matrix(&mut self, model: Mat4) {
        self.uniforms.update(|u| {
            u.model = model.to_cols_array_2d();
            u.normal_matrix = normal_matrix(model);
        });
    }

    fn set_projection_and_view_matrices(&mut self, projection: Mat4, view: Mat4) {
        let eye = view.inverse().w_axis;
        self.uniforms.update(|u| {
            u.projection = projection.to_cols_array_2d();
            u.view = view.to_cols_array_2d();
            u.eye = eye.into();
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
    use crate::renderer::gpu::RecordingContext;
    use crate::renderer::lights::PointLight;

    #[test]
    fn test_uniform_size_is_aligned() {
        assert_eq!(std::mem::size_of::<StandardUniform>(), 1088);
        assert_eq!(std::mem::size_of::<StandardUniform>() % 16, 0);
    }

    #[test]
    fn test_create_compiles_program() {
        let mut ctx = RecordingContext::new();
        let mut material = StandardMaterial::default();
        assert!(material.program().is_none());

        material.create(&mut ctx).unwrap();
        let program = material.program().unwrap();
        assert_eq!(ctx.program_label(program), Some("standard"));
    }

    #[test]
    fn test_set_lights_records_count() {
        let mut material = StandardMaterial::default();
        let lights = [
            PointLight::new(Vec3::X, Vec3::ONE, 1.0).to_gpu(),
            PointLight::new(Vec3::Y, Vec3::ONE, 1.0).to_gpu(),
        ];

        material.set_lights(&lights);

        assert_eq!(material.light_count(), 2);
        assert_eq!(material.uniform().params[3], 2.0);
        assert_eq!(material.uniform().lights[1].position[1], 1.0);
    }

    #[test]
    fn test_eye_taken_from_view() {
        let mut material = StandardMaterial::default();
        let view = Mat4::look_at_rh(Vec3::new(0.0, 0.0, 10.0), Vec3::ZERO, Vec3::Y);

        material.set_projection_and_view_matrices(Mat4::IDENTITY, view);

        let eye = Vec3::from_slice(&material.uniform().eye);
        assert!(eye.abs_diff_eq(Vec3::new(0.0, 0.0, 10.0), 1e-5));
    }

    #[test]
    fn test_toggles_set_flags() {
        let mut material = StandardMaterial::default();
        material.toggle_emissive(true);
        material.toggle_blinn_phong_shading(true);
        assert_eq!(material.uniform().params[1], 1.0);
        assert_eq!(material.uniform().params[2], 1.0);

        material.toggle_blinn_phong_shading(false);
        assert_eq!(material.uniform().params[2], 0.0);
    }
}
