//! Rendering module
//!
//! Scene rendering over an explicit [`GraphicsContext`]: camera, models with
//! per-pipeline materials, point lights, and the forward and deferred frame
//! pipelines with bloom and HDR composite.

mod camera;
mod context;
pub mod gpu;
mod lamp;
mod lights;
pub mod material;
mod mesh;
mod model;
mod postprocess;
mod target;

pub use camera::{Camera, DEFAULT_FAR, DEFAULT_NEAR};
pub use context::{RenderError, RenderSettings, Renderer};
pub use gpu::{GpuError, GraphicsContext, RecordingContext, WgpuContext};
pub use lamp::Lamp;
pub use lights::{
    DEFAULT_MAX_RADIUS, DEFAULT_MIN_RADIUS, GpuLight, LightRef, MAX_LIGHTS, PointLight,
    pack_lights,
};
pub use material::{Material, MaterialType, Side};
pub use mesh::{GpuMesh, Mesh, Vertex};
pub use model::{Model, ModelRef};
pub use postprocess::{
    Bloom, BloomSettings, Composite, CompositeUniform, DeferredShading, GBUFFER_TARGETS,
    ScreenQuad,
};
pub use target::{RenderTarget, SCENE_FORMAT};
