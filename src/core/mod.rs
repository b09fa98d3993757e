//! Core viewer module
//!
//! Window and event loop, frame timing, statistics and configuration.

mod config;
mod debug;
mod engine;
mod time;

pub use config::{CameraConfig, ConfigError, DeferredShadingModel, Pipeline, RenderConfig, ViewerConfig};
pub use debug::FrameStats;
pub use engine::{Engine, EngineConfig, Viewer, ViewerContext};
pub use time::Time;
