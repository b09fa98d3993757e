//! Visible light sources
//!
//! A lamp is an emissive model and a point light kept in sync: moving, tinting or
//! switching the lamp updates both.

use std::rc::Rc;

use glam::Vec3;

use super::gpu::GraphicsContext;
use super::lights::{DEFAULT_MAX_RADIUS, DEFAULT_MIN_RADIUS, LightRef, PointLight};
use super::material::{
    DeferredMaterial, DeferredPbrMaterial, MaterialType, StandardMaterial, prepare,
};
use super::mesh::GpuMesh;
use super::model::{Model, ModelRef};

const LAMP_SPECULAR: f32 = 0.5;
const LAMP_SHININESS: f32 = 8.0;
const LAMP_ROUGHNESS: f32 = 0.2;
const LAMP_METALLIC: f32 = 1.0;

/// Emissive model paired with a point light
#[derive(Debug, Clone)]
pub struct Lamp {
    model: ModelRef,
    light: LightRef,
    active: bool,
}

impl Lamp {
    /// Build a lamp with forward, deferred and PBR materials at `position`
    pub fn new(
        ctx: &mut dyn GraphicsContext,
        mesh: Rc<GpuMesh>,
        position: Vec3,
        color: Vec3,
        intensity: f32,
    ) -> Self {
        let mut model = Model::new(
            mesh,
            prepare(ctx, StandardMaterial::new(color, LAMP_SPECULAR, LAMP_SHININESS)),
        );
        model.add_material(
            MaterialType::Deferred,
            prepare(ctx, DeferredMaterial::new(color, LAMP_SPECULAR, LAMP_SHININESS)),
        );
        model.add_material(
            MaterialType::DeferredPbr,
            prepare(ctx, DeferredPbrMaterial::new(color, LAMP_ROUGHNESS, LAMP_METALLIC)),
        );
        model.set_emissive_color_and_strength(color, intensity);
        model.toggle_emissive(true);
        model.set_position(position);

        let light = PointLight::new(position, color, intensity)
            .with_radii(DEFAULT_MIN_RADIUS, DEFAULT_MAX_RADIUS)
            .shared();

        Self {
            model: model.shared(),
            light,
            active: true,
        }
    }

    /// Model to register with the renderer
    #[must_use]
    pub fn model(&self) -> ModelRef {
        self.model.clone()
    }

    /// Light to register with the renderer
    #[must_use]
    pub fn light(&self) -> LightRef {
        self.light.clone()
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Switch the light and the glow on or off together
    pub fn toggle(&mut self) {
        self.light.borrow_mut().toggle();
        self.active = !self.active;
        self.model.borrow_mut().toggle_emissive(self.active);
    }

    pub fn set_color(&mut self, color: Vec3) {
        let mut model = self.model.borrow_mut();
        model.set_color(color);
        model.set_emissive_color(color);
        self.light.borrow_mut().set_color(color);
    }

    pub fn set_intensity(&mut self, intensity: f32) {
        self.model.borrow_mut().set_emissive_strength(intensity);
        self.light.borrow_mut().set_intensity(intensity);
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.model.borrow_mut().set_position(position);
        self.light.borrow_mut().set_position(position);
    }

    pub fn set_rotation(&mut self, rotation: Vec3) {
        self.model.borrow_mut().set_rotation(rotation);
    }

    pub fn set_scale(&mut self, scale: Vec3) {
        self.model.borrow_mut().set_scale(scale);
    }

    pub fn set_uniform_scale(&mut self, scale: f32) {
        self.model.borrow_mut().set_uniform_scale(scale);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::gpu::RecordingContext;
    use crate::renderer::material::StandardUniform;
    use crate::renderer::mesh::Mesh;

    fn lamp(ctx: &mut RecordingContext) -> Lamp {
        let mesh = Mesh::sphere(0.1, 8, 4).upload(ctx).unwrap();
        Lamp::new(ctx, mesh, Vec3::new(1.0, 2.0, 3.0), Vec3::new(1.0, 0.5, 0.2), 3.0)
    }

    fn standard_uniform(lamp: &Lamp) -> StandardUniform {
        let model = lamp.model.borrow();
        let material = model.material(MaterialType::Standard).unwrap();
        *bytemuck::from_bytes::<StandardUniform>(material.uniform_data())
    }

    #[test]
    fn test_lamp_registers_all_pass_materials() {
        let mut ctx = RecordingContext::new();
        let lamp = lamp(&mut ctx);
        let model = lamp.model();
        let model = model.borrow();

        assert!(model.has_material(MaterialType::Standard));
        assert!(model.has_material(MaterialType::Deferred));
        assert!(model.has_material(MaterialType::DeferredPbr));
        assert_eq!(model.position(), Vec3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn test_lamp_starts_glowing() {
        let mut ctx = RecordingContext::new();
        let lamp = lamp(&mut ctx);

        let uniform = standard_uniform(&lamp);
        assert_eq!(uniform.params[1], 1.0);
        assert_eq!(uniform.emissive, [1.0, 0.5, 0.2, 3.0]);
        assert!(lamp.light().borrow().is_active());
    }

    #[test]
    fn test_toggle_switches_light_and_glow() {
        let mut ctx = RecordingContext::new();
        let mut lamp = lamp(&mut ctx);

        lamp.toggle();
        assert!(!lamp.is_active());
        assert!(!lamp.light().borrow().is_active());
        assert_eq!(standard_uniform(&lamp).params[1], 0.0);

        lamp.toggle();
        assert!(lamp.light().borrow().is_active());
        assert_eq!(standard_uniform(&lamp).params[1], 1.0);
    }

    #[test]
    fn test_move_updates_model_and_light() {
        let mut ctx = RecordingContext::new();
        let mut lamp = lamp(&mut ctx);
        lamp.model().borrow_mut().apply_model_matrix();

        lamp.set_position(Vec3::new(-1.0, 0.0, 0.0));

        assert_eq!(lamp.light().borrow().position, Vec3::new(-1.0, 0.0, 0.0));
        assert!(lamp.model().borrow().is_dirty());
    }

    #[test]
    fn test_color_and_intensity_reach_light() {
        let mut ctx = RecordingContext::new();
        let mut lamp = lamp(&mut ctx);

        lamp.set_color(Vec3::Z);
        lamp.set_intensity(7.0);

        let light = lamp.light();
        assert_eq!(light.borrow().color, Vec3::Z);
        assert_eq!(light.borrow().intensity, 7.0);
        let uniform = standard_uniform(&lamp);
        assert_eq!(uniform.emissive, [0.0, 0.0, 1.0, 7.0]);
        assert_eq!(&uniform.color[..3], &[0.0, 0.0, 1.0]);
    }
}
