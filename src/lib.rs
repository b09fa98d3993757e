//! A real-time 3D model viewer built in Rust
//!
//! This crate provides:
//! - Forward and deferred render pipelines over an explicit graphics context
//! - Orbit camera, point lights, emissive lamps and a gradient skybox
//! - Bloom, Reinhard tone mapping and gamma correction
//! - A wgpu backend for windows and a recording backend for headless use

pub mod core;
pub mod input;
pub mod renderer;

// Re-exports for convenience
pub use glam;
pub use wgpu;
pub use winit;

/// Prelude module for common imports
pub mod prelude {
    pub use crate::core::{
        Engine, EngineConfig, FrameStats, Pipeline, Viewer, ViewerConfig, ViewerContext,
    };
    pub use crate::input::{Input, KeyBindings, ViewerAction};
    pub use crate::renderer::material::{
        DeferredMaterial, DeferredPbrMaterial, GradientSky, SkyboxMaterial, StandardMaterial,
        prepare,
    };
    pub use crate::renderer::{
        Camera, GraphicsContext, Lamp, LightRef, Material, MaterialType, Mesh, Model, ModelRef,
        PointLight, RenderError, RenderSettings, Renderer,
    };
    pub use glam::{Mat4, Vec2, Vec3, Vec4};
    pub use winit::keyboard::KeyCode;
}
