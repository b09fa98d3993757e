//! Viewer configuration
//!
//! Loaded from a RON file; every field has a default, so a file only needs the
//! values it changes:
//!
//! ```ron
//! (
//!     window: (title: "Viewer", width: 1600, height: 900),
//!     render: (pipeline: Deferred, bloom: false),
//!     camera: (fov_degrees: 60.0),
//! )
//! ```

use std::fs;
use std::path::Path;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::EngineConfig;
use crate::renderer::gpu::SAMPLE_COUNTS;
use crate::renderer::{BloomSettings, Camera, MaterialType, RenderSettings};

/// Which frame pipeline the viewer starts with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Pipeline {
    #[default]
    Forward,
    Deferred,
}

/// Surface model drawn by the deferred geometry pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DeferredShadingModel {
    #[default]
    Phong,
    Pbr,
}

impl DeferredShadingModel {
    #[must_use]
    pub fn material_type(self) -> MaterialType {
        match self {
            Self::Phong => MaterialType::Deferred,
            Self::Pbr => MaterialType::DeferredPbr,
        }
    }
}

/// Renderer section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub pipeline: Pipeline,
    pub deferred_shading: DeferredShadingModel,
    /// Sample count of the scene target
    pub msaa_samples: u32,
    pub msaa: bool,
    pub bloom: bool,
    pub hdr: bool,
    pub gamma_correction: bool,
    pub blinn_phong: bool,
    pub bloom_threshold: f32,
    pub bloom_blur_passes: u32,
    pub clear_color: [f32; 4],
}

impl Default for RenderConfig {
    fn default() -> Self {
        let settings = RenderSettings::default();
        Self {
            pipeline: Pipeline::Forward,
            deferred_shading: DeferredShadingModel::Phong,
            msaa_samples: settings.samples,
            msaa: settings.msaa_enabled,
            bloom: settings.bloom_enabled,
            hdr: settings.hdr_enabled,
            gamma_correction: settings.gamma_correction_enabled,
            blinn_phong: settings.blinn_phong_enabled,
            bloom_threshold: settings.bloom.threshold,
            bloom_blur_passes: settings.bloom.blur_passes,
            clear_color: settings.clear_color,
        }
    }
}

/// Camera section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Vertical field of view
    pub fov_degrees: f32,
    pub near: f32,
    pub far: f32,
    /// Orbit distance from the target
    pub distance: f32,
    pub target: Vec3,
    /// Initial orbit rotation in radians
    pub rotation: Vec3,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov_degrees: 45.0,
            near: crate::renderer::DEFAULT_NEAR,
            far: crate::renderer::DEFAULT_FAR,
            distance: 10.0,
            target: Vec3::ZERO,
            rotation: Vec3::ZERO,
        }
    }
}

/// Complete viewer configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub window: EngineConfig,
    pub render: RenderConfig,
    pub camera: CameraConfig,
}

impl ViewerConfig {
    /// Load and validate a RON file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or holds invalid values
    pub fn load_ron(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        Self::from_ron_str(&content)
    }

    /// Parse and validate RON text
    ///
    /// # Errors
    ///
    /// Returns an error if the text cannot be parsed or holds invalid values
    pub fn from_ron_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = ron::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Write the configuration as pretty RON
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails
    pub fn save_ron(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let content = ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| ConfigError::Serialize(e.to_string()))?;
        fs::write(path, content).map_err(|e| ConfigError::Io(e.to_string()))
    }

    /// Check value ranges
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first bad field
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |message: String| Err(ConfigError::Invalid(message));

        if self.window.width == 0 || self.window.height == 0 {
            return invalid(format!(
                "window size {}x{} is empty",
                self.window.width, self.window.height
            ));
        }
        let samples = self.render.msaa_samples;
        if !SAMPLE_COUNTS.contains(&samples) {
            return invalid(format!(
                "msaa_samples {samples} is not one of {SAMPLE_COUNTS:?}"
            ));
        }
        let fov = self.camera.fov_degrees;
        if !(fov > 0.0 && fov < 180.0) {
            return invalid(format!("fov_degrees {fov} is outside (0, 180)"));
        }
        if !(self.camera.near > 0.0 && self.camera.far > self.camera.near) {
            return invalid(format!(
                "clip planes near {} far {} are not 0 < near < far",
                self.camera.near, self.camera.far
            ));
        }
        if self.camera.distance <= 0.0 {
            return invalid(format!("camera distance {} is not positive", self.camera.distance));
        }
        Ok(())
    }

    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.window.title = title.into();
        self
    }

    #[must_use]
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.window.width = width;
        self.window.height = height;
        self
    }

    #[must_use]
    pub fn with_pipeline(mut self, pipeline: Pipeline) -> Self {
        self.render.pipeline = pipeline;
        self
    }

    #[must_use]
    pub fn with_msaa_samples(mut self, samples: u32) -> Self {
        self.render.msaa_samples = samples;
        self
    }

    /// Renderer settings for a surface of `width` x `height`
    #[must_use]
    pub fn render_settings(&self, width: u32, height: u32) -> RenderSettings {
        let render = &self.render;
        RenderSettings {
            width,
            height,
            samples: render.msaa_samples,
            bloom: BloomSettings {
                threshold: render.bloom_threshold,
                blur_passes: render.bloom_blur_passes,
            },
            bloom_enabled: render.bloom,
            hdr_enabled: render.hdr,
            gamma_correction_enabled: render.gamma_correction,
            msaa_enabled: render.msaa,
            blinn_phong_enabled: render.blinn_phong,
            clear_color: render.clear_color,
        }
    }

    /// Orbit camera for a surface of the given aspect ratio
    #[must_use]
    pub fn camera(&self, aspect: f32) -> Camera {
        let camera = &self.camera;
        Camera::new(
            aspect,
            camera.fov_degrees.to_radians(),
            camera.distance,
            camera.target,
        )
        .with_clip_planes(camera.near, camera.far)
        .with_rotation(camera.rotation)
    }
}

/// Errors raised while loading configuration
#[derive(Debug, Clone)]
pub enum ConfigError {
    /// File could not be read or written
    Io(String),
    /// RON syntax or type error
    Parse(String),
    /// Serialization failed
    Serialize(String),
    /// A value is out of range
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "config IO error: {e}"),
            Self::Parse(e) => write!(f, "config parse error: {e}"),
            Self::Serialize(e) => write!(f, "config serialize error: {e}"),
            Self::Invalid(e) => write!(f, "invalid config: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = ViewerConfig::from_ron_str(
            "(window: (width: 800, height: 600), render: (pipeline: Deferred, bloom: false))",
        )
        .unwrap();

        assert_eq!(config.window.width, 800);
        assert_eq!(config.render.pipeline, Pipeline::Deferred);
        assert!(!config.render.bloom);
        assert!(config.render.hdr);
        assert_eq!(config.camera, CameraConfig::default());
        assert_eq!(config.window.title, EngineConfig::default().title);
    }

    #[test]
    fn test_empty_file_is_default() {
        assert_eq!(ViewerConfig::from_ron_str("()").unwrap(), ViewerConfig::default());
    }

    #[test]
    fn test_pretty_output_parses_back() {
        let config = ViewerConfig::default()
            .with_title("Lamps")
            .with_pipeline(Pipeline::Deferred);
        let text = ron::ser::to_string_pretty(&config, ron::ser::PrettyConfig::default()).unwrap();

        assert_eq!(ViewerConfig::from_ron_str(&text).unwrap(), config);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let bad_samples = ViewerConfig::default().with_msaa_samples(3);
        assert!(matches!(bad_samples.validate(), Err(ConfigError::Invalid(_))));
        let too_many_samples = ViewerConfig::default().with_msaa_samples(16);
        assert!(too_many_samples.validate().is_err());
        assert!(ViewerConfig::default().with_msaa_samples(8).validate().is_ok());

        let empty = ViewerConfig::default().with_size(0, 600);
        assert!(empty.validate().is_err());

        let mut planes = ViewerConfig::default();
        planes.camera.far = planes.camera.near;
        assert!(planes.validate().is_err());

        assert!(matches!(
            ViewerConfig::from_ron_str("(render: (msaa_samples: \"four\"))"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_render_settings_follow_config() {
        let mut config = ViewerConfig::default();
        config.render.bloom_threshold = 0.7;
        config.render.msaa = false;
        config.render.blinn_phong = true;

        let settings = config.render_settings(640, 480);

        assert_eq!((settings.width, settings.height), (640, 480));
        assert_eq!(settings.bloom.threshold, 0.7);
        assert!(!settings.msaa_enabled);
        assert!(settings.blinn_phong_enabled);
    }

    #[test]
    fn test_camera_uses_radians() {
        let config = ViewerConfig::default();
        let camera = config.camera(16.0 / 9.0);

        let expected = glam::Mat4::perspective_rh(45f32.to_radians(), 16.0 / 9.0, 0.01, 100.0);
        assert!(camera.projection_matrix().abs_diff_eq(expected, 1e-6));
        assert_eq!(camera.distance(), 10.0);
    }

    #[test]
    fn test_deferred_shading_model_maps_to_material() {
        assert_eq!(DeferredShadingModel::Phong.material_type(), MaterialType::Deferred);
        assert_eq!(DeferredShadingModel::Pbr.material_type(), MaterialType::DeferredPbr);
    }
}
