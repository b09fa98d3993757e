//! Multisampled scene target

use super::gpu::{
    FramebufferDesc, FramebufferId, GpuError, GraphicsContext, TextureDesc, TextureFormat,
    TextureId,
};

/// HDR scene color format
pub const SCENE_FORMAT: TextureFormat = TextureFormat::Rgba16Float;

/// Framebuffer pair for antialiased scene rendering.
///
/// The scene is drawn into the multisample framebuffer, then resolved into the
/// output framebuffer whose color texture feeds post-processing. Both have the
/// same fixed size; a new target is needed to change it.
#[derive(Debug)]
pub struct RenderTarget {
    width: u32,
    height: u32,
    samples: u32,
    multisample_framebuffer: FramebufferId,
    output_framebuffer: FramebufferId,
    texture: TextureId,
}

impl RenderTarget {
    /// Allocate both framebuffers
    ///
    /// # Errors
    ///
    /// Returns an error if a texture or framebuffer cannot be created
    pub fn new(
        ctx: &mut dyn GraphicsContext,
        width: u32,
        height: u32,
        samples: u32,
    ) -> Result<Self, GpuError> {
        let ms_color = ctx.create_texture(
            &TextureDesc::new("scene_ms_color", width, height, SCENE_FORMAT).with_samples(samples),
        )?;
        let ms_depth = ctx.create_texture(
            &TextureDesc::new("scene_ms_depth", width, height, TextureFormat::Depth32Float)
                .with_samples(samples),
        )?;
        let multisample_framebuffer = ctx.create_framebuffer(&FramebufferDesc {
            label: "scene_ms",
            color: &[ms_color],
            depth: Some(ms_depth),
        })?;

        let texture = ctx.create_texture(&TextureDesc::new(
            "scene_color",
            width,
            height,
            SCENE_FORMAT,
        ))?;
        let depth = ctx.create_texture(&TextureDesc::new(
            "scene_depth",
            width,
            height,
            TextureFormat::Depth32Float,
        ))?;
        let output_framebuffer = ctx.create_framebuffer(&FramebufferDesc {
            label: "scene_output",
            color: &[texture],
            depth: Some(depth),
        })?;

        log::debug!("Created {width}x{height} scene target with {samples} samples");

        Ok(Self {
            width,
            height,
            samples,
            multisample_framebuffer,
            output_framebuffer,
            texture,
        })
    }

    /// Framebuffer the scene is drawn into
    #[must_use]
    pub fn multisample_framebuffer(&self) -> FramebufferId {
        self.multisample_framebuffer
    }

    /// Single-sample framebuffer holding the resolved scene
    #[must_use]
    pub fn output_framebuffer(&self) -> FramebufferId {
        self.output_framebuffer
    }

    /// Resolved scene color
    #[must_use]
    pub fn texture(&self) -> TextureId {
        self.texture
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[must_use]
    pub fn samples(&self) -> u32 {
        self.samples
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::gpu::RecordingContext;

    #[test]
    fn test_output_texture_is_output_attachment() {
        let mut ctx = RecordingContext::new();
        let target = RenderTarget::new(&mut ctx, 320, 240, 4).unwrap();

        assert_eq!(
            ctx.framebuffer_attachments(target.output_framebuffer()),
            Some(&[target.texture()][..])
        );
        assert_ne!(target.multisample_framebuffer(), target.output_framebuffer());
        assert_eq!((target.width(), target.height()), (320, 240));
    }

    #[test]
    fn test_allocation_failure_is_reported() {
        let mut ctx = RecordingContext::new();
        assert!(RenderTarget::new(&mut ctx, 0, 240, 4).is_err());
        assert!(RenderTarget::new(&mut ctx, 320, 240, 3).is_err());
    }
}
