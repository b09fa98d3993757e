//! Deferred shading
//!
//! The geometry pass writes surface attributes into the G-buffer; the shading pass
//! then lights every texel once against the full light list.
//!
//! G-buffer layout (all `Rgba16Float`):
//! - 0: world position, shading model in w (0 marks an empty texel)
//! - 1: world normal, metallic in w
//! - 2: albedo, specular strength or roughness in a
//! - 3: emissive color premultiplied by strength, shininess in a

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};

use super::{ScreenQuad, compile_screen_program};
use crate::renderer::gpu::{
    FramebufferBinding, FramebufferDesc, FramebufferId, GpuError, GraphicsContext, ProgramId,
    ShaderSource, TextureDesc, TextureFormat, TextureId, VertexLayout,
};
use crate::renderer::lights::{GpuLight, MAX_LIGHTS, light_array};
use crate::renderer::material::flag;

/// Number of G-buffer color targets
pub const GBUFFER_TARGETS: usize = 4;

const GBUFFER_FORMAT: TextureFormat = TextureFormat::Rgba16Float;
const DEFAULT_AMBIENT: f32 = 0.05;

const GBUFFER_LABELS: [&str; GBUFFER_TARGETS] = [
    "gbuffer_position",
    "gbuffer_normal",
    "gbuffer_albedo",
    "gbuffer_emissive",
];

/// Uniform block of the shading pass
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct DeferredUniform {
    pub view: [[f32; 4]; 4],
    /// Camera position in world space
    pub eye: [f32; 4],
    /// blinn-phong enabled, light count, ambient, unused
    pub params: [f32; 4],
    pub lights: [GpuLight; MAX_LIGHTS],
}

/// G-buffer plus the pass that shades it
#[derive(Debug)]
pub struct DeferredShading {
    program: Option<ProgramId>,
    uniform: DeferredUniform,
    gbuffer: FramebufferId,
    gbuffer_textures: [TextureId; GBUFFER_TARGETS],
    output_framebuffer: FramebufferId,
    output_texture: TextureId,
}

impl DeferredShading {
    /// Allocate the G-buffer and output target
    ///
    /// # Errors
    ///
    /// Returns an error if a texture or framebuffer cannot be allocated. A shading
    /// program that fails to compile is logged and the pass is skipped.
    pub fn new(ctx: &mut dyn GraphicsContext, width: u32, height: u32) -> Result<Self, GpuError> {
        let mut gbuffer_textures = Vec::with_capacity(GBUFFER_TARGETS);
        for label in GBUFFER_LABELS {
            gbuffer_textures.push(ctx.create_texture(&TextureDesc::new(
                label,
                width,
                height,
                GBUFFER_FORMAT,
            ))?);
        }
        let depth = ctx.create_texture(&TextureDesc::new(
            "gbuffer_depth",
            width,
            height,
            TextureFormat::Depth32Float,
        ))?;
        let gbuffer = ctx.create_framebuffer(&FramebufferDesc {
            label: "gbuffer",
            color: &gbuffer_textures,
            depth: Some(depth),
        })?;

        let output_texture = ctx.create_texture(&TextureDesc::new(
            "deferred_output",
            width,
            height,
            GBUFFER_FORMAT,
        ))?;
        let output_framebuffer = ctx.create_framebuffer(&FramebufferDesc {
            label: "deferred_output",
            color: &[output_texture],
            depth: None,
        })?;

        let program = compile_screen_program(
            ctx,
            &ShaderSource::new(
                "deferred_lighting",
                include_str!("../shaders/deferred_lighting.wgsl"),
                VertexLayout::Screen,
                std::mem::size_of::<DeferredUniform>() as u64,
            )
            .with_textures(GBUFFER_TARGETS as u32),
        );

        let gbuffer_textures = [
            gbuffer_textures[0],
            gbuffer_textures[1],
            gbuffer_textures[2],
            gbuffer_textures[3],
        ];

        let mut uniform = DeferredUniform::zeroed();
        uniform.view = Mat4::IDENTITY.to_cols_array_2d();
        uniform.params[2] = DEFAULT_AMBIENT;

        log::debug!("Created {width}x{height} G-buffer");

        Ok(Self {
            program,
            uniform,
            gbuffer,
            gbuffer_textures,
            output_framebuffer,
            output_texture,
        })
    }

    /// Framebuffer the geometry pass draws into
    #[must_use]
    pub fn framebuffer(&self) -> FramebufferId {
        self.gbuffer
    }

    #[must_use]
    pub fn gbuffer_textures(&self) -> &[TextureId; GBUFFER_TARGETS] {
        &self.gbuffer_textures
    }

    /// Shaded scene, input of bloom and the composite
    #[must_use]
    pub fn output_texture(&self) -> TextureId {
        self.output_texture
    }

    #[must_use]
    pub fn program(&self) -> Option<ProgramId> {
        self.program
    }

    #[must_use]
    pub fn uniform(&self) -> &DeferredUniform {
        &self.uniform
    }

    pub fn set_view_matrix(&mut self, view: Mat4) {
        self.uniform.view = view.to_cols_array_2d();
        let eye = view.inverse().w_axis.truncate();
        self.uniform.eye = if eye.is_finite() {
            eye.extend(1.0).into()
        } else {
            Vec3::ZERO.extend(1.0).into()
        };
    }

    pub fn set_lights(&mut self, lights: &[GpuLight]) {
        self.uniform.lights = light_array(lights);
        self.uniform.params[1] = lights.len().min(MAX_LIGHTS) as f32;
    }

    pub fn toggle_blinn_phong_shading(&mut self, enabled: bool) {
        self.uniform.params[0] = flag(enabled);
    }

    pub fn set_ambient(&mut self, ambient: f32) {
        self.uniform.params[2] = ambient;
    }

    /// Shade the G-buffer into the output texture
    pub fn render(&self, ctx: &mut dyn GraphicsContext, quad: &ScreenQuad) {
        let Some(program) = self.program else {
            log::warn!("Deferred shading skipped: no program");
            return;
        };

        ctx.bind_framebuffer(FramebufferBinding::Offscreen(self.output_framebuffer));
        ctx.clear([0.0; 4]);
        ctx.use_program(Some(program));
        ctx.write_uniforms(program, bytemuck::bytes_of(&self.uniform));
        for (unit, texture) in self.gbuffer_textures.iter().enumerate() {
            ctx.bind_texture(unit as u32, *texture);
        }
        quad.draw(ctx);
        ctx.use_program(None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::gpu::{GpuCommand, RecordingContext};
    use crate::renderer::lights::PointLight;

    #[test]
    fn test_uniform_is_aligned() {
        assert_eq!(std::mem::size_of::<DeferredUniform>(), 864);
    }

    #[test]
    fn test_gbuffer_has_all_targets() {
        let mut ctx = RecordingContext::new();
        let deferred = DeferredShading::new(&mut ctx, 128, 72).unwrap();

        let attachments = ctx.framebuffer_attachments(deferred.framebuffer()).unwrap();
        assert_eq!(attachments, &deferred.gbuffer_textures()[..]);
        assert_eq!(attachments.len(), GBUFFER_TARGETS);
    }

    #[test]
    fn test_render_samples_every_target() {
        let mut ctx = RecordingContext::new();
        let deferred = DeferredShading::new(&mut ctx, 128, 72).unwrap();
        let quad = ScreenQuad::new(&mut ctx).unwrap();
        ctx.clear_commands();

        deferred.render(&mut ctx, &quad);

        let bound: Vec<(u32, TextureId)> = ctx
            .commands()
            .iter()
            .filter_map(|c| match c {
                GpuCommand::BindTexture { unit, texture } => Some((*unit, *texture)),
                _ => None,
            })
            .collect();
        let expected: Vec<(u32, TextureId)> = deferred
            .gbuffer_textures()
            .iter()
            .enumerate()
            .map(|(i, t)| (i as u32, *t))
            .collect();
        assert_eq!(bound, expected);
        assert_eq!(ctx.draw_calls().len(), 1);
    }

    #[test]
    fn test_lights_and_blinn_reach_uniform() {
        let mut ctx = RecordingContext::new();
        let mut deferred = DeferredShading::new(&mut ctx, 16, 16).unwrap();
        let light = PointLight::new(Vec3::ONE, Vec3::X, 2.0);

        deferred.set_lights(&[light.to_gpu(), light.to_gpu()]);
        deferred.toggle_blinn_phong_shading(true);

        assert_eq!(deferred.uniform().params[0], 1.0);
        assert_eq!(deferred.uniform().params[1], 2.0);
        assert_eq!(deferred.uniform().lights[1], light.to_gpu());

        deferred.toggle_blinn_phong_shading(false);
        assert_eq!(deferred.uniform().params[0], 0.0);
    }

    #[test]
    fn test_view_matrix_sets_eye() {
        let mut ctx = RecordingContext::new();
        let mut deferred = DeferredShading::new(&mut ctx, 16, 16).unwrap();

        deferred.set_view_matrix(Mat4::look_at_rh(Vec3::new(0.0, 0.0, 10.0), Vec3::ZERO, Vec3::Y));

        let eye = deferred.uniform().eye;
        assert!((eye[2] - 10.0).abs() < 1e-4);
        assert!(eye[0].abs() < 1e-4 && eye[1].abs() < 1e-4);
    }

    #[test]
    fn test_failed_program_skips_pass() {
        let mut ctx = RecordingContext::new();
        ctx.fail_program("deferred_lighting");
        let deferred = DeferredShading::new(&mut ctx, 16, 16).unwrap();
        let quad = ScreenQuad::new(&mut ctx).unwrap();

        deferred.render(&mut ctx, &quad);

        assert!(deferred.program().is_none());
        assert!(ctx.draw_calls().is_empty());
    }
}
