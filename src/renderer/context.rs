//! Frame orchestration
//!
//! The [`Renderer`] owns the camera, the scene target and the screen-space effects,
//! and shares models and lights with whoever built the scene. Each frame it pushes
//! camera and light state into the models, draws them, then runs bloom and the
//! final composite.

use glam::{Mat4, Vec3};

use super::camera::Camera;
use super::gpu::{
    Capability, CullFace, FramebufferBinding, GpuError, GraphicsContext, TextureId,
};
use super::lights::{LightRef, MAX_LIGHTS, pack_lights};
use super::material::MaterialType;
use super::model::ModelRef;
use super::postprocess::{Bloom, BloomSettings, Composite, DeferredShading, ScreenQuad};
use super::target::RenderTarget;

/// Clear color of offscreen targets; zero alpha marks empty G-buffer texels
const OFFSCREEN_CLEAR: [f32; 4] = [0.0, 0.0, 0.0, 0.0];

/// Construction parameters of a [`Renderer`]
#[derive(Debug, Clone)]
pub struct RenderSettings {
    /// Offscreen target size in pixels
    pub width: u32,
    pub height: u32,
    /// Sample count of the scene target
    pub samples: u32,
    pub bloom: BloomSettings,
    pub bloom_enabled: bool,
    pub hdr_enabled: bool,
    pub gamma_correction_enabled: bool,
    pub msaa_enabled: bool,
    pub blinn_phong_enabled: bool,
    /// Clear color of the window surface
    pub clear_color: [f32; 4],
}

impl RenderSettings {
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..Default::default()
        }
    }
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            samples: 4,
            bloom: BloomSettings::default(),
            bloom_enabled: true,
            hdr_enabled: true,
            gamma_correction_enabled: true,
            msaa_enabled: true,
            blinn_phong_enabled: false,
            clear_color: [0.0, 0.0, 0.0, 1.0],
        }
    }
}

/// Renderer errors
#[derive(Debug, Clone)]
pub enum RenderError {
    /// Offscreen targets cannot have a zero dimension
    InvalidViewport { width: u32, height: u32 },
    /// The graphics context failed
    Gpu(GpuError),
}

impl std::fmt::Display for RenderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidViewport { width, height } => {
                write!(f, "invalid viewport size {width}x{height}")
            }
            Self::Gpu(e) => write!(f, "graphics error: {e}"),
        }
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Gpu(e) => Some(e),
            Self::InvalidViewport { .. } => None,
        }
    }
}

impl From<GpuError> for RenderError {
    fn from(e: GpuError) -> Self {
        Self::Gpu(e)
    }
}

/// Forward and deferred scene renderer
pub struct Renderer<G: GraphicsContext> {
    gpu: G,
    camera: Camera,
    target: RenderTarget,
    quad: ScreenQuad,
    composite: Composite,
    bloom: Bloom,
    deferred: DeferredShading,
    models: Vec<ModelRef>,
    lights: Vec<LightRef>,
    bloom_enabled: bool,
    hdr_enabled: bool,
    gamma_correction_enabled: bool,
    msaa_enabled: bool,
    blinn_phong_enabled: bool,
    deferred_material: MaterialType,
    clear_color: [f32; 4],
}

impl<G: GraphicsContext> Renderer<G> {
    /// Allocate targets and effects on `gpu`
    ///
    /// # Errors
    ///
    /// Returns an error if the viewport is empty or a target cannot be allocated.
    /// Effects whose program fails to compile are logged and skipped each frame.
    pub fn new(mut gpu: G, settings: RenderSettings, camera: Camera) -> Result<Self, RenderError> {
        let RenderSettings { width, height, .. } = settings;
        if width == 0 || height == 0 {
            return Err(RenderError::InvalidViewport { width, height });
        }

        gpu.set_capability(Capability::DepthTest, true);
        gpu.set_capability(Capability::CullFace, true);
        gpu.set_capability(Capability::Multisample, settings.msaa_enabled);
        gpu.set_cull_face(CullFace::Back);

        let target = RenderTarget::new(&mut gpu, width, height, settings.samples)?;
        let quad = ScreenQuad::new(&mut gpu)?;
        let mut composite = Composite::new(&mut gpu);
        composite.set_flags(
            &mut gpu,
            settings.bloom_enabled,
            settings.hdr_enabled,
            settings.gamma_correction_enabled,
        );
        let bloom = Bloom::new(&mut gpu, width, height, settings.bloom)?;
        let mut deferred = DeferredShading::new(&mut gpu, width, height)?;
        deferred.toggle_blinn_phong_shading(settings.blinn_phong_enabled);
        deferred.set_view_matrix(camera.view_matrix());

        log::info!(
            "Renderer ready: {width}x{height}, {} samples",
            settings.samples
        );

        Ok(Self {
            gpu,
            camera,
            target,
            quad,
            composite,
            bloom,
            deferred,
            models: Vec::new(),
            lights: Vec::new(),
            bloom_enabled: settings.bloom_enabled,
            hdr_enabled: settings.hdr_enabled,
            gamma_correction_enabled: settings.gamma_correction_enabled,
            msaa_enabled: settings.msaa_enabled,
            blinn_phong_enabled: settings.blinn_phong_enabled,
            deferred_material: MaterialType::Deferred,
            clear_color: settings.clear_color,
        })
    }

    /// Register a model, priming it with the current camera and lights
    pub fn add_model(&mut self, model: ModelRef) {
        {
            let mut m = model.borrow_mut();
            m.set_projection_and_view_matrices(
                self.camera.projection_matrix(),
                self.camera.view_matrix(),
            );
            m.set_lights(&pack_lights(&self.lights));
            m.toggle_blinn_phong_shading(self.blinn_phong_enabled);
        }
        self.models.push(model);
    }

    /// Register a light and re-broadcast the list to every model.
    ///
    /// Shaders evaluate at most [`MAX_LIGHTS`] lights. Later lights stay registered
    /// but are not shaded.
    pub fn add_light(&mut self, light: LightRef) {
        self.lights.push(light);
        if self.lights.len() == MAX_LIGHTS + 1 {
            log::warn!("More than {MAX_LIGHTS} lights registered, later lights are not shaded");
        }
        self.broadcast_lights();
    }

    /// Add `delta` (radians, per axis) to the camera orbit; flushed on the next frame
    pub fn update_camera_rotation(&mut self, delta: Vec3) {
        self.camera.add_rotation(delta);
    }

    /// Draw one frame with the forward pipeline
    ///
    /// # Errors
    ///
    /// Returns an error if the frame could not be presented
    pub fn render(&mut self) -> Result<(), RenderError> {
        self.gpu
            .bind_framebuffer(FramebufferBinding::Offscreen(self.target.multisample_framebuffer()));
        self.gpu.clear(OFFSCREEN_CLEAR);

        self.flush_camera();
        self.broadcast_lights();

        for model in &self.models {
            let mut model = model.borrow_mut();
            model.apply_model_matrix();
            model.draw(&mut self.gpu, MaterialType::Standard);
        }

        self.gpu.blit_framebuffer(
            self.target.multisample_framebuffer(),
            self.target.output_framebuffer(),
        );

        self.finish_frame(self.target.texture())
    }

    /// Draw one frame with the deferred pipeline
    ///
    /// # Errors
    ///
    /// Returns an error if the frame could not be presented
    pub fn render_deferred(&mut self) -> Result<(), RenderError> {
        self.gpu
            .bind_framebuffer(FramebufferBinding::Offscreen(self.deferred.framebuffer()));
        self.gpu.clear(OFFSCREEN_CLEAR);

        self.flush_camera();
        self.broadcast_lights();

        for model in &self.models {
            let mut model = model.borrow_mut();
            model.apply_model_matrix();
            model.draw(&mut self.gpu, self.deferred_material);
        }

        self.deferred.render(&mut self.gpu, &self.quad);

        self.finish_frame(self.deferred.output_texture())
    }

    /// Bloom, composite onto the window and present
    fn finish_frame(&mut self, scene: TextureId) -> Result<(), RenderError> {
        if self.bloom_enabled {
            self.bloom.set_scene_texture(scene);
            self.bloom.render(&mut self.gpu, &self.quad);
        }

        self.gpu.bind_framebuffer(FramebufferBinding::Default);
        self.gpu.clear(self.clear_color);
        self.composite
            .draw(&mut self.gpu, &self.quad, scene, self.bloom.blur_texture());

        self.gpu.present()?;
        Ok(())
    }

    /// Push camera matrices into every model if the camera moved since the last frame
    fn flush_camera(&mut self) {
        if !self.camera.is_dirty() {
            return;
        }
        let projection: Mat4 = self.camera.projection_matrix();
        let view = self.camera.view_matrix();
        for model in &self.models {
            model
                .borrow_mut()
                .set_projection_and_view_matrices(projection, view);
        }
        self.deferred.set_view_matrix(view);
        self.camera.set_dirty(false);
    }

    // Lights are not change-tracked; the whole list goes out every time.
    fn broadcast_lights(&mut self) {
        let lights = pack_lights(&self.lights);
        for model in &self.models {
            model.borrow_mut().set_lights(&lights);
        }
        self.deferred.set_lights(&lights);
    }

    /// Flip bloom. The composite flag is uploaded immediately and the bloom passes
    /// stop running while it is off.
    pub fn toggle_bloom(&mut self) {
        self.bloom_enabled = !self.bloom_enabled;
        self.upload_composite_flags();
        log::debug!("Bloom {}", on_off(self.bloom_enabled));
    }

    /// Flip Reinhard tone mapping in the composite
    pub fn toggle_hdr(&mut self) {
        self.hdr_enabled = !self.hdr_enabled;
        self.upload_composite_flags();
        log::debug!("HDR {}", on_off(self.hdr_enabled));
    }

    /// Flip gamma correction in the composite
    pub fn toggle_gamma_correction(&mut self) {
        self.gamma_correction_enabled = !self.gamma_correction_enabled;
        self.upload_composite_flags();
        log::debug!("Gamma correction {}", on_off(self.gamma_correction_enabled));
    }

    /// Flip the multisample capability
    pub fn toggle_msaa(&mut self) {
        self.msaa_enabled = !self.msaa_enabled;
        self.gpu
            .set_capability(Capability::Multisample, self.msaa_enabled);
        log::debug!("MSAA {}", on_off(self.msaa_enabled));
    }

    /// Switch between Phong and Blinn-Phong specular on every model and the
    /// deferred pass
    pub fn toggle_blinn_phong_shading(&mut self) {
        self.blinn_phong_enabled = !self.blinn_phong_enabled;
        for model in &self.models {
            model
                .borrow_mut()
                .toggle_blinn_phong_shading(self.blinn_phong_enabled);
        }
        self.deferred
            .toggle_blinn_phong_shading(self.blinn_phong_enabled);
        log::debug!("Blinn-Phong {}", on_off(self.blinn_phong_enabled));
    }

    fn upload_composite_flags(&mut self) {
        self.composite.set_flags(
            &mut self.gpu,
            self.bloom_enabled,
            self.hdr_enabled,
            self.gamma_correction_enabled,
        );
    }

    /// Material variant drawn by the deferred geometry pass
    pub fn set_deferred_material(&mut self, variant: MaterialType) {
        if matches!(variant, MaterialType::Standard | MaterialType::Skybox) {
            log::warn!("{variant:?} does not write a G-buffer");
        }
        self.deferred_material = variant;
    }

    #[must_use]
    pub fn deferred_material(&self) -> MaterialType {
        self.deferred_material
    }

    #[must_use]
    pub fn is_bloom_enabled(&self) -> bool {
        self.bloom_enabled
    }

    #[must_use]
    pub fn is_hdr_enabled(&self) -> bool {
        self.hdr_enabled
    }

    #[must_use]
    pub fn is_gamma_correction_enabled(&self) -> bool {
        self.gamma_correction_enabled
    }

    #[must_use]
    pub fn is_msaa_enabled(&self) -> bool {
        self.msaa_enabled
    }

    #[must_use]
    pub fn is_blinn_phong_enabled(&self) -> bool {
        self.blinn_phong_enabled
    }

    #[must_use]
    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    /// Camera access; mutations through this are picked up by the next frame
    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    #[must_use]
    pub fn gpu(&self) -> &G {
        &self.gpu
    }

    /// Graphics context, for creating meshes and materials
    pub fn gpu_mut(&mut self) -> &mut G {
        &mut self.gpu
    }

    #[must_use]
    pub fn target(&self) -> &RenderTarget {
        &self.target
    }

    #[must_use]
    pub fn deferred_shading(&self) -> &DeferredShading {
        &self.deferred
    }

    #[must_use]
    pub fn models(&self) -> &[ModelRef] {
        &self.models
    }

    #[must_use]
    pub fn lights(&self) -> &[LightRef] {
        &self.lights
    }
}

fn on_off(enabled: bool) -> &'static str {
    if enabled { "on" } else { "off" }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::renderer::gpu::{GpuCommand, RecordingContext};
    use crate::renderer::lights::PointLight;
    use crate::renderer::material::Material;
    use crate::renderer::model::tests::{CountingMaterial, Counts, counting_model};
    use crate::renderer::postprocess::CompositeUniform;

    fn camera() -> Camera {
        Camera::new(16.0 / 9.0, 45f32.to_radians(), 10.0, Vec3::ZERO)
    }

    fn renderer() -> Renderer<RecordingContext> {
        Renderer::new(RecordingContext::new(), RenderSettings::new(64, 36), camera()).unwrap()
    }

    fn add_counting_model(renderer: &mut Renderer<RecordingContext>) -> Rc<Counts> {
        let (model, counts) = counting_model(renderer.gpu_mut());
        renderer.add_model(model.shared());
        counts
    }

    fn light() -> LightRef {
        PointLight::new(Vec3::Y, Vec3::ONE, 1.0).shared()
    }

    fn composite_uniform(renderer: &Renderer<RecordingContext>) -> CompositeUniform {
        let gpu = renderer.gpu();
        let program = gpu.program_by_label("composite").unwrap();
        bytemuck::pod_read_unaligned(gpu.uniforms(program).unwrap())
    }

    #[test]
    fn test_initial_gpu_state() {
        let renderer = renderer();
        let gpu = renderer.gpu();

        assert!(gpu.is_enabled(Capability::DepthTest));
        assert!(gpu.is_enabled(Capability::CullFace));
        assert!(gpu.is_enabled(Capability::Multisample));
        assert_eq!(gpu.cull_face(), CullFace::Back);
        assert_eq!(renderer.deferred_material(), MaterialType::Deferred);
    }

    #[test]
    fn test_empty_viewport_is_rejected() {
        let result = Renderer::new(RecordingContext::new(), RenderSettings::new(0, 36), camera());
        assert!(matches!(
            result,
            Err(RenderError::InvalidViewport { width: 0, height: 36 })
        ));
    }

    #[test]
    fn test_add_model_primes_camera_and_lights() {
        let mut renderer = renderer();
        renderer.add_light(light());
        renderer.add_light(light());

        let counts = add_counting_model(&mut renderer);

        assert_eq!(counts.camera.get(), 1);
        assert_eq!(counts.lights.get(), 1);
        assert_eq!(counts.light_count.get(), 2);
    }

    #[test]
    fn test_add_light_reaches_existing_models() {
        let mut renderer = renderer();
        let first = add_counting_model(&mut renderer);
        let second = add_counting_model(&mut renderer);

        renderer.add_light(light());

        assert_eq!(first.light_count.get(), 1);
        assert_eq!(second.light_count.get(), 1);
        assert_eq!(renderer.deferred_shading().uniform().params[1], 1.0);
    }

    #[test]
    fn test_lights_past_capacity_stay_registered_but_unshaded() {
        let mut renderer = renderer();
        let counts = add_counting_model(&mut renderer);

        for _ in 0..=MAX_LIGHTS {
            renderer.add_light(light());
        }

        assert_eq!(renderer.lights().len(), MAX_LIGHTS + 1);
        assert_eq!(counts.light_count.get(), MAX_LIGHTS);
        assert_eq!(
            renderer.deferred_shading().uniform().params[1],
            MAX_LIGHTS as f32
        );

        renderer.render().unwrap();
        assert_eq!(counts.light_count.get(), MAX_LIGHTS);
    }

    #[test]
    fn test_camera_flushed_once_per_frame() {
        let mut renderer = renderer();
        let counts = add_counting_model(&mut renderer);
        renderer.render().unwrap();
        let after_first_frame = counts.camera.get();
        assert!(!renderer.camera().is_dirty());

        renderer.update_camera_rotation(Vec3::new(0.1, 0.0, 0.0));
        renderer.update_camera_rotation(Vec3::new(0.0, 0.2, 0.0));
        renderer.camera_mut().set_distance(4.0);
        assert!(renderer.camera().is_dirty());

        renderer.render().unwrap();
        assert_eq!(counts.camera.get(), after_first_frame + 1);
        assert!(!renderer.camera().is_dirty());

        renderer.render().unwrap();
        assert_eq!(counts.camera.get(), after_first_frame + 1);
    }

    #[test]
    fn test_lights_rebroadcast_every_frame() {
        let mut renderer = renderer();
        let counts = add_counting_model(&mut renderer);
        let primed = counts.lights.get();

        renderer.render().unwrap();
        renderer.render().unwrap();

        assert_eq!(counts.lights.get(), primed + 2);
    }

    #[test]
    fn test_model_matrix_applied_before_draw() {
        let mut renderer = renderer();
        let counts = add_counting_model(&mut renderer);

        renderer.render().unwrap();
        renderer.render().unwrap();

        assert_eq!(counts.model_matrix.get(), 1);
    }

    #[test]
    fn test_forward_frame_order() {
        let mut renderer = renderer();
        add_counting_model(&mut renderer);
        let ms = renderer.target().multisample_framebuffer();
        let output = renderer.target().output_framebuffer();
        renderer.gpu_mut().clear_commands();

        renderer.render().unwrap();

        let gpu = renderer.gpu();
        let draws = gpu.draw_calls();
        assert_eq!(draws[0].framebuffer, FramebufferBinding::Offscreen(ms));
        assert_eq!(draws.last().unwrap().framebuffer, FramebufferBinding::Default);
        assert_eq!(
            draws.last().unwrap().program,
            gpu.program_by_label("composite")
        );

        let commands = gpu.commands();
        let blit = commands
            .iter()
            .position(|c| {
                matches!(c, GpuCommand::Blit { source, destination }
                    if *source == ms && *destination == output)
            })
            .unwrap();
        let first_draw = commands
            .iter()
            .position(|c| matches!(c, GpuCommand::DrawArrays { .. }))
            .unwrap();
        assert!(first_draw < blit);
        assert!(matches!(commands.last(), Some(GpuCommand::Present)));
        assert_eq!(gpu.frames_presented(), 1);
    }

    #[test]
    fn test_bloom_passes_only_when_enabled() {
        let mut renderer = renderer();
        add_counting_model(&mut renderer);
        let passes = BloomSettings::default().blur_passes as usize;

        renderer.render().unwrap();
        // model, extract, blur passes, composite
        assert_eq!(renderer.gpu().draw_calls().len(), 3 + passes * 2);

        renderer.toggle_bloom();
        renderer.gpu_mut().clear_commands();
        renderer.render().unwrap();
        assert_eq!(renderer.gpu().draw_calls().len(), 2);
    }

    #[test]
    fn test_composite_toggles_round_trip() {
        let mut renderer = renderer();
        let original = composite_uniform(&renderer);
        assert_eq!(original.hdr_enabled, 1.0);

        renderer.toggle_hdr();
        renderer.toggle_gamma_correction();
        renderer.toggle_bloom();
        let toggled = composite_uniform(&renderer);
        assert_eq!(toggled.hdr_enabled, 0.0);
        assert_eq!(toggled.gamma_correction_enabled, 0.0);
        assert_eq!(toggled.bloom_enabled, 0.0);

        renderer.toggle_hdr();
        renderer.toggle_gamma_correction();
        renderer.toggle_bloom();
        assert_eq!(composite_uniform(&renderer), original);
    }

    #[test]
    fn test_msaa_toggle_round_trip() {
        let mut renderer = renderer();

        renderer.toggle_msaa();
        assert!(!renderer.gpu().is_enabled(Capability::Multisample));
        assert!(!renderer.is_msaa_enabled());

        renderer.toggle_msaa();
        assert!(renderer.gpu().is_enabled(Capability::Multisample));
    }

    #[test]
    fn test_blinn_phong_reaches_models_and_deferred_pass() {
        let mut renderer = renderer();
        let counts = add_counting_model(&mut renderer);

        renderer.toggle_blinn_phong_shading();
        assert!(counts.blinn_phong.get());
        assert_eq!(renderer.deferred_shading().uniform().params[0], 1.0);

        renderer.toggle_blinn_phong_shading();
        assert!(!counts.blinn_phong.get());
        assert_eq!(renderer.deferred_shading().uniform().params[0], 0.0);

        // Late models pick up the current setting
        renderer.toggle_blinn_phong_shading();
        let late = add_counting_model(&mut renderer);
        assert!(late.blinn_phong.get());
    }

    fn add_deferred_model(
        renderer: &mut Renderer<RecordingContext>,
        variant: MaterialType,
    ) -> Rc<Counts> {
        let (mut model, _) = counting_model(renderer.gpu_mut());
        let counts = Rc::new(Counts::default());
        let mut material = CountingMaterial::new(counts.clone());
        material.create(renderer.gpu_mut()).unwrap();
        model.add_material(variant, Box::new(material));
        renderer.add_model(model.shared());
        counts
    }

    #[test]
    fn test_deferred_frame_order() {
        let mut renderer = renderer();
        add_deferred_model(&mut renderer, MaterialType::Deferred);
        let gbuffer = renderer.deferred_shading().framebuffer();
        renderer.toggle_bloom();
        renderer.gpu_mut().clear_commands();

        renderer.render_deferred().unwrap();

        let gpu = renderer.gpu();
        let draws = gpu.draw_calls();
        assert_eq!(draws.len(), 3);
        assert_eq!(draws[0].framebuffer, FramebufferBinding::Offscreen(gbuffer));
        assert_eq!(
            draws[1].program.and_then(|p| gpu.program_label(p)),
            Some("deferred_lighting")
        );
        assert_eq!(draws[2].framebuffer, FramebufferBinding::Default);
        assert!(!gpu
            .commands()
            .iter()
            .any(|c| matches!(c, GpuCommand::Blit { .. })));
        assert!(matches!(gpu.commands().last(), Some(GpuCommand::Present)));
    }

    #[test]
    fn test_deferred_material_selection() {
        let mut renderer = renderer();
        let counts = add_deferred_model(&mut renderer, MaterialType::DeferredPbr);
        renderer.set_deferred_material(MaterialType::DeferredPbr);
        let program = renderer
            .models()[0]
            .borrow()
            .material(MaterialType::DeferredPbr)
            .and_then(|material| material.program());
        renderer.gpu_mut().clear_commands();

        renderer.render_deferred().unwrap();

        assert_eq!(renderer.gpu().draw_calls()[0].program, program);
        assert_eq!(counts.model_matrix.get(), 1);
    }

    #[test]
    #[should_panic(expected = "model has no Deferred material")]
    fn test_deferred_requires_registered_variant() {
        let mut renderer = renderer();
        add_counting_model(&mut renderer);
        let _ = renderer.render_deferred();
    }

    #[test]
    fn test_failed_effect_programs_do_not_stop_frames() {
        let mut gpu = RecordingContext::new();
        gpu.fail_program("composite");
        gpu.fail_program("bloom_blur");
        let mut renderer = Renderer::new(gpu, RenderSettings::new(64, 36), camera()).unwrap();
        add_counting_model(&mut renderer);

        renderer.render().unwrap();

        let gpu = renderer.gpu();
        assert_eq!(gpu.draw_calls().len(), 1);
        assert_eq!(gpu.frames_presented(), 1);
    }

    #[test]
    fn test_back_side_models_restore_culling_between_draws() {
        let mut renderer = renderer();
        let (model, _) = counting_model(renderer.gpu_mut());
        let model = model.shared();
        renderer.add_model(model);
        let mut sky = CountingMaterial::new(Rc::new(Counts::default()));
        sky.side = crate::renderer::material::Side::Back;
        sky.create(renderer.gpu_mut()).unwrap();
        let mesh = renderer.models()[0].borrow().mesh().clone();
        renderer.add_model(crate::renderer::model::Model::new(mesh, Box::new(sky)).shared());
        let (last, _) = counting_model(renderer.gpu_mut());
        renderer.add_model(last.shared());
        renderer.toggle_bloom();

        renderer.render().unwrap();

        let draws = renderer.gpu().draw_calls();
        assert_eq!(draws[0].cull_face, CullFace::Back);
        assert_eq!(draws[1].cull_face, CullFace::Front);
        assert_eq!(draws[2].cull_face, CullFace::Back);
        assert_eq!(renderer.gpu().cull_face(), CullFace::Back);
    }
}
