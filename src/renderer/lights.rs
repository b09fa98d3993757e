//! Point lights
//!
//! Lights are shared between the scene and the renderer through [`LightRef`]. Every
//! frame the renderer packs the list into [`GpuLight`] records and hands the same
//! slice to every material.

use std::cell::RefCell;
use std::rc::Rc;

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

/// Maximum number of lights a shader evaluates
pub const MAX_LIGHTS: usize = 16;

/// Default radius inside which a light stops getting brighter
pub const DEFAULT_MIN_RADIUS: f32 = 0.01;
/// Default radius beyond which a light contributes nothing
pub const DEFAULT_MAX_RADIUS: f32 = 5.0;

/// Shared handle to a light
pub type LightRef = Rc<RefCell<PointLight>>;

/// GPU-compatible light data
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GpuLight {
    /// World position (w unused)
    pub position: [f32; 4],
    /// Linear color in rgb, intensity in w
    pub color: [f32; 4],
    /// min radius, max radius, active (0 or 1), unused
    pub falloff: [f32; 4],
}

/// Omnidirectional light with a smooth windowed falloff
#[derive(Debug, Clone)]
pub struct PointLight {
    /// World position
    pub position: Vec3,
    /// Light color
    pub color: Vec3,
    /// Intensity
    pub intensity: f32,
    /// Distances closer than this are clamped when computing falloff
    pub min_radius: f32,
    /// Distance at which the light fades to zero
    pub max_radius: f32,
    active: bool,
}

impl PointLight {
    /// Create an active point light with default radii
    #[must_use]
    pub fn new(position: Vec3, color: Vec3, intensity: f32) -> Self {
        Self {
            position,
            color,
            intensity,
            min_radius: DEFAULT_MIN_RADIUS,
            max_radius: DEFAULT_MAX_RADIUS,
            active: true,
        }
    }

    /// Set falloff radii
    #[must_use]
    pub fn with_radii(mut self, min_radius: f32, max_radius: f32) -> Self {
        self.min_radius = min_radius;
        self.max_radius = max_radius;
        self
    }

    /// Wrap the light in a shared handle
    #[must_use]
    pub fn shared(self) -> LightRef {
        Rc::new(RefCell::new(self))
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
    }

    pub fn set_color(&mut self, color: Vec3) {
        self.color = color;
    }

    pub fn set_intensity(&mut self, intensity: f32) {
        self.intensity = intensity;
    }

    /// Switch the light on or off
    pub fn toggle(&mut self) {
        self.active = !self.active;
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Convert to GPU light
    #[must_use]
    pub fn to_gpu(&self) -> GpuLight {
        GpuLight {
            position: self.position.extend(1.0).into(),
            color: self.color.extend(self.intensity).into(),
            falloff: [
                self.min_radius,
                self.max_radius,
                if self.active { 1.0 } else { 0.0 },
                0.0,
            ],
        }
    }

    /// Contribution scale at `distance`, matching the shaders
    #[must_use]
    pub fn attenuation(&self, distance: f32) -> f32 {
        let window = (1.0 - (distance / self.max_radius).powi(4)).clamp(0.0, 1.0);
        let clamped = distance.max(self.min_radius);
        window * window / (clamped * clamped) * self.intensity
    }
}

/// Pack shared lights for upload, keeping list order.
///
/// Only the first [`MAX_LIGHTS`] are packed.
#[must_use]
pub fn pack_lights(lights: &[LightRef]) -> Vec<GpuLight> {
    lights
        .iter()
        .take(MAX_LIGHTS)
        .map(|light| light.borrow().to_gpu())
        .collect()
}

/// Fixed-size light array as laid out in uniform blocks
#[must_use]
pub fn light_array(lights: &[GpuLight]) -> [GpuLight; MAX_LIGHTS] {
    let mut array = [GpuLight::zeroed(); MAX_LIGHTS];
    for (slot, light) in array.iter_mut().zip(lights) {
        *slot = *light;
    }
    array
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gpu_light_is_three_vec4() {
        assert_eq!(std::mem::size_of::<GpuLight>(), 48);
    }

    #[test]
    fn test_toggle_clears_active_flag() {
        let mut light = PointLight::new(Vec3::ZERO, Vec3::ONE, 2.0);
        assert_eq!(light.to_gpu().falloff[2], 1.0);

        light.toggle();
        assert!(!light.is_active());
        assert_eq!(light.to_gpu().falloff[2], 0.0);
    }

    #[test]
    fn test_attenuation_reaches_zero_at_max_radius() {
        let light = PointLight::new(Vec3::ZERO, Vec3::ONE, 1.0);
        assert_eq!(light.attenuation(DEFAULT_MAX_RADIUS), 0.0);
        assert_eq!(light.attenuation(10.0), 0.0);
        assert!(light.attenuation(1.0) > light.attenuation(2.0));
    }

    #[test]
    fn test_attenuation_clamped_inside_min_radius() {
        let light = PointLight::new(Vec3::ZERO, Vec3::ONE, 1.0).with_radii(0.5, 5.0);
        assert_eq!(light.attenuation(0.0), 4.0);
        assert!(light.attenuation(0.0).is_finite());
    }

    #[test]
    fn test_pack_keeps_order_and_caps_count() {
        let lights: Vec<LightRef> = (0..20)
            .map(|i| PointLight::new(Vec3::new(i as f32, 0.0, 0.0), Vec3::ONE, 1.0).shared())
            .collect();

        let packed = pack_lights(&lights);
        assert_eq!(packed.len(), MAX_LIGHTS);
        assert_eq!(packed[3].position[0], 3.0);
    }

    #[test]
    fn test_shared_light_changes_are_visible() {
        let light = PointLight::new(Vec3::ZERO, Vec3::ONE, 1.0).shared();
        let lights = vec![light.clone()];

        light.borrow_mut().set_intensity(4.0);

        assert_eq!(pack_lights(&lights)[0].color[3], 4.0);
    }
}
