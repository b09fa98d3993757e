//! Renderable models
//!
//! A model pairs a shared mesh with one material per [`MaterialType`] and a local
//! transform. The transform is uploaded lazily: setters mark the model dirty and
//! [`Model::apply_model_matrix`] pushes the matrix to every material once.

use std::cell::RefCell;
use std::rc::Rc;

use glam::{EulerRot, Mat4, Vec3};
use rustc_hash::FxHashMap;

use super::gpu::{CullFace, CullFaceScope, GraphicsContext, Primitive};
use super::lights::GpuLight;
use super::material::{Material, MaterialType};
use super::mesh::GpuMesh;

/// Shared handle to a model
pub type ModelRef = Rc<RefCell<Model>>;

/// Mesh instance with per-pass materials
pub struct Model {
    mesh: Rc<GpuMesh>,
    materials: FxHashMap<MaterialType, Box<dyn Material>>,
    position: Vec3,
    /// Euler angles in radians, applied Y, then X, then Z
    rotation: Vec3,
    scale: Vec3,
    dirty: bool,
}

impl Model {
    /// Create a model whose forward material is `material`
    #[must_use]
    pub fn new(mesh: Rc<GpuMesh>, material: Box<dyn Material>) -> Self {
        let mut materials: FxHashMap<MaterialType, Box<dyn Material>> = FxHashMap::default();
        materials.insert(MaterialType::Standard, material);
        Self {
            mesh,
            materials,
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            scale: Vec3::ONE,
            dirty: true,
        }
    }

    /// Wrap the model in a shared handle
    #[must_use]
    pub fn shared(self) -> ModelRef {
        Rc::new(RefCell::new(self))
    }

    /// Register (or replace) the material drawn for `variant`.
    ///
    /// The model is marked dirty so the new material receives the transform.
    pub fn add_material(&mut self, variant: MaterialType, material: Box<dyn Material>) {
        self.materials.insert(variant, material);
        self.dirty = true;
    }

    #[must_use]
    pub fn has_material(&self, variant: MaterialType) -> bool {
        self.materials.contains_key(&variant)
    }

    #[must_use]
    pub fn material(&self, variant: MaterialType) -> Option<&dyn Material> {
        self.materials.get(&variant).map(|m| m.as_ref())
    }

    #[must_use]
    pub fn mesh(&self) -> &Rc<GpuMesh> {
        &self.mesh
    }

    /// Move the model; the matrix is rebuilt on the next apply
    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
        self.dirty = true;
    }

    /// Euler angles in radians, applied Y, then X, then Z
    pub fn set_rotation(&mut self, rotation: Vec3) {
        self.rotation = rotation;
        self.dirty = true;
    }

    /// Per-axis scale
    pub fn set_scale(&mut self, scale: Vec3) {
        self.scale = scale;
        self.dirty = true;
    }

    pub fn set_uniform_scale(&mut self, scale: f32) {
        self.set_scale(Vec3::splat(scale));
    }

    #[must_use]
    pub fn position(&self) -> Vec3 {
        self.position
    }

    #[must_use]
    pub fn rotation(&self) -> Vec3 {
        self.rotation
    }

    #[must_use]
    pub fn scale(&self) -> Vec3 {
        self.scale
    }

    /// Whether the transform changed since it was last applied
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Translation, then scale, then rotation
    #[must_use]
    pub fn model_matrix(&self) -> Mat4 {
        Mat4::from_translation(self.position)
            * Mat4::from_scale(self.scale)
            * Mat4::from_euler(EulerRot::YXZ, self.rotation.y, self.rotation.x, self.rotation.z)
    }

    /// Push the model matrix to every material if the transform changed.
    ///
    /// Returns whether anything was pushed.
    pub fn apply_model_matrix(&mut self) -> bool {
        if !self.dirty {
            return false;
        }
        let model = self.model_matrix();
        for material in self.materials.values_mut() {
            material.set_model_matrix(model);
        }
        self.dirty = false;
        true
    }

    /// Draw the mesh with the material registered for `variant`.
    ///
    /// Culling follows the material's side and is reset to back faces afterwards.
    ///
    /// # Panics
    ///
    /// Panics if no material is registered for `variant`.
    pub fn draw(&mut self, ctx: &mut dyn GraphicsContext, variant: MaterialType) {
        let Some(material) = self.materials.get_mut(&variant) else {
            panic!("model has no {variant:?} material");
        };
        let Some(program) = material.program() else {
            log::debug!("Skipping draw: {variant:?} material has no program");
            return;
        };

        ctx.use_program(Some(program));
        material.set_uniforms(ctx);

        {
            let mut scope =
                CullFaceScope::reset_to(ctx, material.side().cull_face(), CullFace::Back);
            scope.bind_vertex_array(Some(self.mesh.vertex_array()));
            scope.draw_arrays(Primitive::Triangles, 0, self.mesh.vertex_count());
        }

        ctx.use_program(None);
    }

    fn for_each_material(&mut self, mut f: impl FnMut(&mut dyn Material)) {
        for material in self.materials.values_mut() {
            f(material.as_mut());
        }
    }

    /// Camera matrices for every material variant
    pub fn set_projection_and_view_matrices(&mut self, projection: Mat4, view: Mat4) {
        self.for_each_material(|m| m.set_projection_and_view_matrices(projection, view));
    }

    /// Packed light list for every material variant
    pub fn set_lights(&mut self, lights: &[GpuLight]) {
        self.for_each_material(|m| m.set_lights(lights));
    }

    /// Base color of every variant, kept consistent across pipelines
    pub fn set_color(&mut self, color: Vec3) {
        self.for_each_material(|m| m.set_color(color));
    }

    pub fn set_shininess(&mut self, shininess: f32) {
        self.for_each_material(|m| m.set_shininess(shininess));
    }

    /// Glow color and strength; only visible while emissive is enabled
    pub fn set_emissive_color_and_strength(&mut self, color: Vec3, strength: f32) {
        self.for_each_material(|m| m.set_emissive_color_and_strength(color, strength));
    }

    pub fn set_emissive_color(&mut self, color: Vec3) {
        self.for_each_material(|m| m.set_emissive_color(color));
    }

    pub fn set_emissive_strength(&mut self, strength: f32) {
        self.for_each_material(|m| m.set_emissive_strength(strength));
    }

    /// Enable or disable the emissive term on every variant
    pub fn toggle_emissive(&mut self, enabled: bool) {
        self.for_each_material(|m| m.toggle_emissive(enabled));
    }

    /// Select Blinn-Phong (`true`) or Phong specular on every variant
    pub fn toggle_blinn_phong_shading(&mut self, enabled: bool) {
        self.for_each_material(|m| m.toggle_blinn_phong_shading(enabled));
    }
}

impl std::fmt::Debug for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Model")
            .field("mesh", &self.mesh)
            .field("materials", &self.materials.keys().collect::<Vec<_>>())
            .field("position", &self.position)
            .field("rotation", &self.rotation)
            .field("scale", &self.scale)
            .field("dirty", &self.dirty)
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::cell::Cell;

    use bytemuck::Zeroable;

    use super::*;
    use crate::renderer::gpu::{GpuError, ProgramId, RecordingContext};
    use crate::renderer::material::{GradientSky, Side, SkyboxMaterial, StandardMaterial, prepare};
    use crate::renderer::mesh::Mesh;

    /// Calls observed by a [`CountingMaterial`]
    #[derive(Debug, Default)]
    pub(crate) struct Counts {
        pub model_matrix: Cell<u32>,
        pub camera: Cell<u32>,
        pub lights: Cell<u32>,
        pub light_count: Cell<usize>,
        pub blinn_phong: Cell<bool>,
        pub emissive: Cell<bool>,
    }

    /// Material that only counts calls
    pub(crate) struct CountingMaterial {
        pub counts: Rc<Counts>,
        pub program: Option<ProgramId>,
        pub side: Side,
    }

    impl CountingMaterial {
        pub fn new(counts: Rc<Counts>) -> Self {
            Self {
                counts,
                program: None,
                side: Side::Front,
            }
        }
    }

    impl Material for CountingMaterial {
        fn create(&mut self, ctx: &mut dyn GraphicsContext) -> Result<(), GpuError> {
            let source = crate::renderer::gpu::ShaderSource::new(
                "counting",
                "x",
                crate::renderer::gpu::VertexLayout::Mesh,
                16,
            );
            self.program = Some(ctx.create_program(&source)?);
            Ok(())
        }
        fn set_color(&mut self, _color: Vec3) {}
        fn set_shininess(&mut self, _shininess: f32) {}
        fn set_lights(&mut self, lights: &[GpuLight]) {
            self.counts.lights.set(self.counts.lights.get() + 1);
            self.counts.light_count.set(lights.len());
        }
        fn set_emissive_color_and_strength(&mut self, _color: Vec3, _strength: f32) {}
        fn set_emissive_color(&mut self, _color: Vec3) {}
        fn set_emissive_strength(&mut self, _strength: f32) {}
        fn toggle_emissive(&mut self, enabled: bool) {
            self.counts.emissive.set(enabled);
        }
        fn toggle_blinn_phong_shading(&mut self, enabled: bool) {
            self.counts.blinn_phong.set(enabled);
        }
        fn set_model_matrix(&mut self, _model: Mat4) {
            self.counts.model_matrix.set(self.counts.model_matrix.get() + 1);
        }
        fn set_projection_and_view_matrices(&mut self, _projection: Mat4, _view: Mat4) {
            self.counts.camera.set(self.counts.camera.get() + 1);
        }
        fn set_uniforms(&mut self, _ctx: &mut dyn GraphicsContext) {}
        fn program(&self) -> Option<ProgramId> {
            self.program
        }
        fn side(&self) -> Side {
            self.side
        }
        fn light_count(&self) -> usize {
            self.counts.light_count.get()
        }
        fn uniform_data(&self) -> &[u8] {
            &[]
        }
    }

    pub(crate) fn counting_model(ctx: &mut RecordingContext) -> (Model, Rc<Counts>) {
        let mesh = Mesh::cube().upload(ctx).unwrap();
        let counts = Rc::new(Counts::default());
        let mut material = CountingMaterial::new(counts.clone());
        material.create(ctx).unwrap();
        (Model::new(mesh, Box::new(material)), counts)
    }

    #[test]
    fn test_model_matrix_applied_once_until_changed() {
        let mut ctx = RecordingContext::new();
        let (mut model, counts) = counting_model(&mut ctx);

        assert!(model.apply_model_matrix());
        assert!(!model.apply_model_matrix());
        assert_eq!(counts.model_matrix.get(), 1);

        model.set_position(Vec3::X);
        model.set_scale(Vec3::splat(2.0));
        assert!(model.apply_model_matrix());
        assert_eq!(counts.model_matrix.get(), 2);
    }

    #[test]
    fn test_model_matrix_composition() {
        let mut ctx = RecordingContext::new();
        let (mut model, _) = counting_model(&mut ctx);
        model.set_position(Vec3::new(1.0, 2.0, 3.0));
        model.set_uniform_scale(2.0);
        model.set_rotation(Vec3::new(0.0, std::f32::consts::FRAC_PI_2, 0.0));

        // Local +X rotates to -Z, is doubled, then offset
        let point = model.model_matrix().transform_point3(Vec3::X);
        assert!(point.abs_diff_eq(Vec3::new(1.0, 2.0, 1.0), 1e-5));
    }

    #[test]
    fn test_models_share_one_mesh() {
        let mut ctx = RecordingContext::new();
        let mesh = Mesh::cube().upload(&mut ctx).unwrap();

        let mut a = Model::new(mesh.clone(), prepare(&mut ctx, StandardMaterial::default()));
        let mut b = Model::new(mesh.clone(), prepare(&mut ctx, StandardMaterial::default()));
        assert_eq!(Rc::strong_count(&mesh), 3);

        a.draw(&mut ctx, MaterialType::Standard);
        b.draw(&mut ctx, MaterialType::Standard);

        let draws = ctx.draw_calls();
        assert_eq!(draws.len(), 2);
        assert_eq!(draws[0].vertex_array, Some(mesh.vertex_array()));
        assert_eq!(draws[1].vertex_array, Some(mesh.vertex_array()));
        assert_ne!(draws[0].program, draws[1].program);
        assert_eq!(draws[0].count, 36);
    }

    #[test]
    fn test_back_side_material_culls_front_then_restores() {
        let mut ctx = RecordingContext::new();
        let mesh = Mesh::cube().upload(&mut ctx).unwrap();
        let sky = prepare(
            &mut ctx,
            SkyboxMaterial::new(&GradientSky::default()),
        );
        let mut model = Model::new(mesh, sky);

        model.draw(&mut ctx, MaterialType::Standard);

        assert_eq!(ctx.draw_calls()[0].cull_face, CullFace::Front);
        assert_eq!(ctx.cull_face(), CullFace::Back);
    }

    #[test]
    fn test_draw_resets_culling_to_back_faces() {
        let mut ctx = RecordingContext::new();
        let (mut model, _) = counting_model(&mut ctx);
        ctx.set_cull_face(CullFace::Front);

        model.draw(&mut ctx, MaterialType::Standard);

        assert_eq!(ctx.draw_calls()[0].cull_face, CullFace::Back);
        assert_eq!(ctx.cull_face(), CullFace::Back);
    }

    #[test]
    fn test_front_side_draw_leaves_culling_untouched() {
        let mut ctx = RecordingContext::new();
        let (mut model, _) = counting_model(&mut ctx);
        ctx.clear_commands();

        model.draw(&mut ctx, MaterialType::Standard);

        assert_eq!(ctx.draw_calls()[0].cull_face, CullFace::Back);
        assert!(
            !ctx.commands()
                .iter()
                .any(|c| matches!(c, crate::renderer::gpu::GpuCommand::SetCullFace(_)))
        );
    }

    #[test]
    #[should_panic(expected = "no Deferred material")]
    fn test_drawing_unregistered_variant_panics() {
        let mut ctx = RecordingContext::new();
        let (mut model, _) = counting_model(&mut ctx);
        model.draw(&mut ctx, MaterialType::Deferred);
    }

    #[test]
    fn test_material_without_program_is_skipped() {
        let mut ctx = RecordingContext::new();
        let mesh = Mesh::cube().upload(&mut ctx).unwrap();
        let counts = Rc::new(Counts::default());
        let mut model = Model::new(mesh, Box::new(CountingMaterial::new(counts)));

        model.draw(&mut ctx, MaterialType::Standard);

        assert!(ctx.draw_calls().is_empty());
    }

    #[test]
    fn test_setters_reach_every_variant() {
        let mut ctx = RecordingContext::new();
        let (mut model, standard) = counting_model(&mut ctx);
        let deferred = Rc::new(Counts::default());
        model.add_material(
            MaterialType::Deferred,
            Box::new(CountingMaterial::new(deferred.clone())),
        );

        model.set_lights(&[GpuLight::zeroed(); 3]);
        model.toggle_blinn_phong_shading(true);
        model.toggle_emissive(true);
        model.apply_model_matrix();

        for counts in [&standard, &deferred] {
            assert_eq!(counts.light_count.get(), 3);
            assert!(counts.blinn_phong.get());
            assert!(counts.emissive.get());
            assert_eq!(counts.model_matrix.get(), 1);
        }
    }
}
