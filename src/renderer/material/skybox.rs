//! Procedural gradient skybox
//!
//! Drawn on a cube around the camera: translation is stripped from the view and
//! depth is pinned just inside the far plane, so the sky sits behind everything.
//! The sky is unlit; lighting setters are accepted and ignored.

use bytemuck::{Pod, Zeroable};
use glam::{Mat3, Mat4, Vec3};

use super::{Material, Side, UniformBlock};
use crate::renderer::gpu::{GpuError, GraphicsContext, ProgramId, ShaderSource, VertexLayout};
use crate::renderer::lights::GpuLight;

const FORWARD_SHADER: &str = include_str!("../shaders/skybox.wgsl");
const GBUFFER_SHADER: &str = include_str!("../shaders/skybox_gbuffer.wgsl");

/// Gradient skybox colors
#[derive(Debug, Clone)]
pub struct GradientSky {
    /// Top/zenith color
    pub zenith_color: Vec3,
    /// Horizon color
    pub horizon_color: Vec3,
    /// Ground/nadir color
    pub ground_color: Vec3,
}

impl Default for GradientSky {
    fn default() -> Self {
        Self {
            zenith_color: Vec3::new(0.1, 0.2, 0.5),
            horizon_color: Vec3::new(0.5, 0.7, 1.0),
            ground_color: Vec3::new(0.3, 0.25, 0.2),
        }
    }
}

/// Uniform block of the skybox programs
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct SkyboxUniform {
    /// Projection times the rotation-only view
    pub view_projection: [[f32; 4]; 4],
    pub zenith_color: [f32; 4],
    pub horizon_color: [f32; 4],
    pub ground_color: [f32; 4],
}

impl From<&GradientSky> for SkyboxUniform {
    fn from(sky: &GradientSky) -> Self {
        Self {
            view_projection: Mat4::IDENTITY.to_cols_array_2d(),
            zenith_color: sky.zenith_color.extend(1.0).into(),
            horizon_color: sky.horizon_color.extend(1.0).into(),
            ground_color: sky.ground_color.extend(1.0).into(),
        }
    }
}

/// Framebuffer layout the skybox program writes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkyboxTarget {
    /// Single HDR color target
    Forward,
    /// The deferred G-buffer
    GBuffer,
}

/// Unlit gradient sky seen from inside a cube
#[derive(Debug, Clone)]
pub struct SkyboxMaterial {
    target: SkyboxTarget,
    program: Option<ProgramId>,
    uniforms: UniformBlock<SkyboxUniform>,
}

impl SkyboxMaterial {
    /// Sky for the forward pass
    #[must_use]
    pub fn new(sky: &GradientSky) -> Self {
        Self::with_target(sky, SkyboxTarget::Forward)
    }

    /// Sky written into the G-buffer as unlit texels
    #[must_use]
    pub fn gbuffer(sky: &GradientSky) -> Self {
        Self::with_target(sky, SkyboxTarget::GBuffer)
    }

    fn with_target(sky: &GradientSky, target: SkyboxTarget) -> Self {
        Self {
            target,
            program: None,
            uniforms: UniformBlock::new(SkyboxUniform::from(sky)),
        }
    }

    #[must_use]
    pub fn target(&self) -> SkyboxTarget {
        self.target
    }

    #[must_use]
    pub fn uniform(&self) -> &SkyboxUniform {
        self.uniforms.get()
    }
}

impl Material for SkyboxMaterial {
    fn create(&mut self, ctx: &mut dyn GraphicsContext) -> Result<(), GpuError> {
        let (label, wgsl) = match self.target {
            SkyboxTarget::Forward => ("skybox", FORWARD_SHADER),
            SkyboxTarget::GBuffer => ("skybox_gbuffer", GBUFFER_SHADER),
        };
        let source = ShaderSource::new(
            label,
            wgsl,
            VertexLayout::Mesh,
            std::mem::size_of::<SkyboxUniform>() as u64,
        );
        self.program = Some(ctx.create_program(&source)?);
        Ok(())
    }

    fn set_color(&mut self, _color: Vec3) {}

    fn set_shininess(&mut self, _shininess: f32) {}

    fn set_lights(&mut self, _lights: &[GpuLight]) {}

    fn set_emissive_color_and_strength(&mut self, _color: Vec3, _strength: f32) {}

    fn set_emissive_color(&mut self, _color: Vec3) {}

    fn set_emissive_strength(&mut self, _strength: f32) {}

    fn toggle_emissive(&mut self, _enabled: bool) {}

    fn toggle_blinn_phong_shading(&mut self, _enabled: bool) {}

    fn set_model_matrix(&mut self, _model: Mat4) {}

    fn set_projection_and_view_matrices(&mut self, projection: Mat4, view: Mat4) {
        let rotation_only = Mat4::from_mat3(Mat3::from_mat4(view));
        self.uniforms
            .update(|u| u.view_projection = (projection * rotation_only).to_cols_array_2d());
    }

    fn set_uniforms(&mut self, ctx: &mut dyn GraphicsContext) {
        self.uniforms.flush(ctx, self.program);
    }

    fn program(&self) -> Option<ProgramId> {
        self.program
    }

    fn side(&self) -> Side {
        Side::Back
    }

    fn uniform_data(&self) -> &[u8] {
        self.uniforms.bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::gpu::RecordingContext;

    #[test]
    fn test_renders_back_side() {
        assert_eq!(SkyboxMaterial::new(&GradientSky::default()).side(), Side::Back);
    }

    #[test]
    fn test_view_translation_is_stripped() {
        let mut sky = SkyboxMaterial::new(&GradientSky::default());
        let view = Mat4::look_at_rh(Vec3::new(3.0, 4.0, 5.0), Vec3::ZERO, Vec3::Y);

        sky.set_projection_and_view_matrices(Mat4::IDENTITY, view);

        let view_projection = Mat4::from_cols_array_2d(&sky.uniform().view_projection);
        assert_eq!(view_projection.w_axis.truncate(), Vec3::ZERO);
    }

    #[test]
    fn test_lit_setters_do_not_touch_uniforms() {
        let mut sky = SkyboxMaterial::new(&GradientSky::default());
        let before = sky.uniform_data().to_vec();

        sky.set_color(Vec3::X);
        sky.set_lights(&[GpuLight::zeroed()]);
        sky.toggle_emissive(true);
        sky.set_model_matrix(Mat4::from_translation(Vec3::ONE));

        assert_eq!(sky.uniform_data(), before.as_slice());
        assert_eq!(sky.light_count(), 0);
    }

    #[test]
    fn test_gbuffer_variant_uses_its_own_program() {
        let mut ctx = RecordingContext::new();
        let mut sky = SkyboxMaterial::gbuffer(&GradientSky::default());
        sky.create(&mut ctx).unwrap();
        assert_eq!(ctx.program_label(sky.program().unwrap()), Some("skybox_gbuffer"));
    }
}
