//! Bloom
//!
//! Bright regions of the scene are extracted into their own texture, then blurred
//! with a separable Gaussian, alternating horizontal and vertical passes between
//! two framebuffers.

use bytemuck::{Pod, Zeroable};

use super::{ScreenQuad, compile_screen_program};
use crate::renderer::gpu::{
    FramebufferBinding, FramebufferDesc, FramebufferId, GpuError, GraphicsContext, ProgramId,
    ShaderSource, TextureDesc, TextureFormat, TextureId, VertexLayout,
};

const BLOOM_FORMAT: TextureFormat = TextureFormat::Rgba16Float;

/// Bloom tuning
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BloomSettings {
    /// Luminance above which pixels bloom
    pub threshold: f32,
    /// Number of horizontal + vertical blur pairs
    pub blur_passes: u32,
}

impl Default for BloomSettings {
    fn default() -> Self {
        Self {
            threshold: 1.0,
            blur_passes: 5,
        }
    }
}

/// Uniform block of the extraction program
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ExtractUniform {
    pub threshold: f32,
    _padding: [f32; 3],
}

/// Uniform block of the blur program
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct BlurUniform {
    /// One texel in uv units
    pub texel_size: [f32; 2],
    /// 1 for a horizontal pass, 0 for vertical
    pub horizontal: f32,
    _padding: f32,
}

#[derive(Debug, Clone, Copy)]
struct Buffer {
    framebuffer: FramebufferId,
    texture: TextureId,
}

impl Buffer {
    fn new(
        ctx: &mut dyn GraphicsContext,
        label: &'static str,
        width: u32,
        height: u32,
    ) -> Result<Self, GpuError> {
        let texture = ctx.create_texture(&TextureDesc::new(label, width, height, BLOOM_FORMAT))?;
        let framebuffer = ctx.create_framebuffer(&FramebufferDesc {
            label,
            color: &[texture],
            depth: None,
        })?;
        Ok(Self {
            framebuffer,
            texture,
        })
    }
}

/// Bright-pass extraction plus ping-pong Gaussian blur
#[derive(Debug)]
pub struct Bloom {
    width: u32,
    height: u32,
    settings: BloomSettings,
    extract_program: Option<ProgramId>,
    blur_program: Option<ProgramId>,
    bright: Buffer,
    ping_pong: [Buffer; 2],
    scene_texture: Option<TextureId>,
}

impl Bloom {
    /// Allocate the bloom buffers
    ///
    /// # Errors
    ///
    /// Returns an error if a buffer cannot be allocated. Program compile failures
    /// are logged and leave the effect disabled.
    pub fn new(
        ctx: &mut dyn GraphicsContext,
        width: u32,
        height: u32,
        settings: BloomSettings,
    ) -> Result<Self, GpuError> {
        let bright = Buffer::new(ctx, "bloom_bright", width, height)?;
        let ping_pong = [
            Buffer::new(ctx, "bloom_ping", width, height)?,
            Buffer::new(ctx, "bloom_pong", width, height)?,
        ];

        let extract_program = compile_screen_program(
            ctx,
            &ShaderSource::new(
                "bloom_extract",
                include_str!("../shaders/bloom_extract.wgsl"),
                VertexLayout::Screen,
                std::mem::size_of::<ExtractUniform>() as u64,
            )
            .with_textures(1),
        );
        let blur_program = compile_screen_program(
            ctx,
            &ShaderSource::new(
                "bloom_blur",
                include_str!("../shaders/bloom_blur.wgsl"),
                VertexLayout::Screen,
                std::mem::size_of::<BlurUniform>() as u64,
            )
            .with_textures(1),
        );

        Ok(Self {
            width,
            height,
            settings,
            extract_program,
            blur_program,
            bright,
            ping_pong,
            scene_texture: None,
        })
    }

    /// Texture the next `render` reads from
    pub fn set_scene_texture(&mut self, texture: TextureId) {
        self.scene_texture = Some(texture);
    }

    #[must_use]
    pub fn settings(&self) -> BloomSettings {
        self.settings
    }

    /// Texture holding the result of the last blur pass
    #[must_use]
    pub fn blur_texture(&self) -> TextureId {
        if self.settings.blur_passes == 0 {
            self.bright.texture
        } else {
            self.ping_pong[1].texture
        }
    }

    /// Run extraction and blur
    pub fn render(&self, ctx: &mut dyn GraphicsContext, quad: &ScreenQuad) {
        let (Some(extract), Some(blur), Some(scene)) =
            (self.extract_program, self.blur_program, self.scene_texture)
        else {
            log::warn!("Bloom skipped: missing program or scene texture");
            return;
        };

        ctx.bind_framebuffer(FramebufferBinding::Offscreen(self.bright.framebuffer));
        ctx.clear([0.0; 4]);
        ctx.use_program(Some(extract));
        let extract_uniform = ExtractUniform {
            threshold: self.settings.threshold,
            _padding: [0.0; 3],
        };
        ctx.write_uniforms(extract, bytemuck::bytes_of(&extract_uniform));
        ctx.bind_texture(0, scene);
        quad.draw(ctx);

        ctx.use_program(Some(blur));
        let texel_size = [1.0 / self.width as f32, 1.0 / self.height as f32];
        let mut source = self.bright.texture;
        for pass in 0..self.settings.blur_passes * 2 {
            let horizontal = pass % 2 == 0;
            let target = self.ping_pong[(pass % 2) as usize];

            ctx.bind_framebuffer(FramebufferBinding::Offscreen(target.framebuffer));
            ctx.clear([0.0; 4]);
            let blur_uniform = BlurUniform {
                texel_size,
                horizontal: if horizontal { 1.0 } else { 0.0 },
                _padding: 0.0,
            };
            ctx.write_uniforms(blur, bytemuck::bytes_of(&blur_uniform));
            ctx.bind_texture(0, source);
            quad.draw(ctx);

            source = target.texture;
        }
        ctx.use_program(None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::gpu::{GpuCommand, RecordingContext};

    fn bloom(ctx: &mut RecordingContext, blur_passes: u32) -> (Bloom, ScreenQuad, TextureId) {
        let settings = BloomSettings {
            threshold: 1.0,
            blur_passes,
        };
        let bloom = Bloom::new(ctx, 64, 32, settings).unwrap();
        let quad = ScreenQuad::new(ctx).unwrap();
        let scene = ctx
            .create_texture(&TextureDesc::new("scene", 64, 32, TextureFormat::Rgba16Float))
            .unwrap();
        (bloom, quad, scene)
    }

    #[test]
    fn test_extract_then_alternating_blur() {
        let mut ctx = RecordingContext::new();
        let (mut bloom, quad, scene) = bloom(&mut ctx, 2);
        bloom.set_scene_texture(scene);

        bloom.render(&mut ctx, &quad);

        // One extraction plus two pairs of blur passes
        assert_eq!(ctx.draw_calls().len(), 5);

        let sampled: Vec<TextureId> = ctx
            .commands()
            .iter()
            .filter_map(|c| match c {
                GpuCommand::BindTexture { texture, .. } => Some(*texture),
                _ => None,
            })
            .collect();
        assert_eq!(sampled[0], scene);
        assert_eq!(sampled[1], bloom.bright.texture);
        assert_eq!(sampled[2], bloom.ping_pong[0].texture);
        assert_eq!(sampled[3], bloom.ping_pong[1].texture);
        assert_eq!(bloom.blur_texture(), bloom.ping_pong[1].texture);
    }

    #[test]
    fn test_blur_direction_alternates() {
        let mut ctx = RecordingContext::new();
        let (mut bloom, quad, scene) = bloom(&mut ctx, 1);
        bloom.set_scene_texture(scene);
        let blur = ctx.program_by_label("bloom_blur").unwrap();

        bloom.render(&mut ctx, &quad);

        let directions: Vec<f32> = ctx
            .commands()
            .iter()
            .filter_map(|c| match c {
                GpuCommand::WriteUniforms { program, data } if *program == blur => {
                    Some(bytemuck::pod_read_unaligned::<BlurUniform>(data).horizontal)
                }
                _ => None,
            })
            .collect();
        assert_eq!(directions, vec![1.0, 0.0]);
    }

    #[test]
    fn test_no_scene_texture_skips_render() {
        let mut ctx = RecordingContext::new();
        let (bloom, quad, _) = bloom(&mut ctx, 2);

        bloom.render(&mut ctx, &quad);

        assert!(ctx.draw_calls().is_empty());
    }

    #[test]
    fn test_zero_passes_exposes_bright_texture() {
        let mut ctx = RecordingContext::new();
        let (bloom, _, _) = bloom(&mut ctx, 0);
        assert_eq!(bloom.blur_texture(), bloom.bright.texture);
    }
}
