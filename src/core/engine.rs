//! Event loop and window lifecycle

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    window::{Window, WindowId},
};

use crate::core::{FrameStats, Time, ViewerConfig};
use crate::input::Input;
use crate::renderer::{RenderError, Renderer, WgpuContext};

const STATS_INTERVAL: Duration = Duration::from_secs(5);

/// Window configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Window title
    pub title: String,
    /// Initial window width
    pub width: u32,
    /// Initial window height
    pub height: u32,
    /// Enable VSync
    pub vsync: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            title: String::from("Model Viewer"),
            width: 1280,
            height: 720,
            vsync: true,
        }
    }
}

impl EngineConfig {
    /// Set the window title
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Set window dimensions
    #[must_use]
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Enable or disable VSync
    #[must_use]
    pub fn with_vsync(mut self, vsync: bool) -> Self {
        self.vsync = vsync;
        self
    }
}

/// Application driven by the engine
pub trait Viewer: 'static {
    /// Build the scene once the renderer exists
    ///
    /// # Errors
    ///
    /// An error aborts startup
    fn init(&mut self, ctx: &mut ViewerContext) -> Result<(), RenderError>;

    /// Per-frame logic, before rendering
    fn update(&mut self, ctx: &mut ViewerContext);

    /// Render the frame
    fn render(&mut self, ctx: &mut ViewerContext);

    /// Called when the window is resized
    fn on_resize(&mut self, _ctx: &mut ViewerContext, _width: u32, _height: u32) {}

    /// Called before the event loop exits
    fn shutdown(&mut self, _ctx: &mut ViewerContext) {}
}

/// State handed to viewer callbacks
pub struct ViewerContext {
    pub time: Time,
    pub input: Input,
    pub stats: FrameStats,
    renderer: Renderer<WgpuContext>,
    config: ViewerConfig,
    window_size: PhysicalSize<u32>,
    should_quit: bool,
}

impl ViewerContext {
    fn new(renderer: Renderer<WgpuContext>, config: ViewerConfig, size: PhysicalSize<u32>) -> Self {
        Self {
            time: Time::new(),
            input: Input::new(),
            stats: FrameStats::new(),
            renderer,
            config,
            window_size: size,
            should_quit: false,
        }
    }

    pub fn renderer(&self) -> &Renderer<WgpuContext> {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut Renderer<WgpuContext> {
        &mut self.renderer
    }

    /// Configuration the viewer was started with
    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    pub fn width(&self) -> u32 {
        self.window_size.width
    }

    pub fn height(&self) -> u32 {
        self.window_size.height
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.window_size.width as f32 / self.window_size.height.max(1) as f32
    }

    /// Request shutdown after this frame
    pub fn quit(&mut self) {
        self.should_quit = true;
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }
}

/// Owns the window, the renderer and the viewer
pub struct Engine<V: Viewer> {
    config: ViewerConfig,
    viewer: V,
    context: Option<ViewerContext>,
    window: Option<Arc<Window>>,
    startup_error: Option<Box<dyn std::error::Error>>,
}

impl<V: Viewer> Engine<V> {
    pub fn new(config: ViewerConfig, viewer: V) -> Self {
        Self {
            config,
            viewer,
            context: None,
            window: None,
            startup_error: None,
        }
    }

    /// Run until the window closes
    ///
    /// # Errors
    ///
    /// Returns an error if the event loop, window, GPU or scene fails to start
    pub fn run(mut self) -> Result<(), Box<dyn std::error::Error>> {
        env_logger::init();
        log::info!("Starting {}", self.config.window.title);

        let event_loop = EventLoop::new()?;
        event_loop.set_control_flow(ControlFlow::Poll);
        event_loop.run_app(&mut self)?;

        match self.startup_error.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn start(&mut self, event_loop: &ActiveEventLoop) -> Result<(), Box<dyn std::error::Error>> {
        let window_config = &self.config.window;
        let attributes = Window::default_attributes()
            .with_title(&window_config.title)
            .with_inner_size(PhysicalSize::new(window_config.width, window_config.height));
        let window = Arc::new(event_loop.create_window(attributes)?);

        let gpu = pollster::block_on(WgpuContext::new(Arc::clone(&window), window_config.vsync))?;

        let size = window.inner_size();
        let size = PhysicalSize::new(size.width.max(1), size.height.max(1));
        let camera = self.config.camera(size.width as f32 / size.height as f32);
        let renderer = Renderer::new(
            gpu,
            self.config.render_settings(size.width, size.height),
            camera,
        )?;

        let mut context = ViewerContext::new(renderer, self.config.clone(), size);
        self.viewer.init(&mut context)?;

        self.context = Some(context);
        self.window = Some(window);
        log::info!("Viewer initialized");
        Ok(())
    }
}

impl<V: Viewer> ApplicationHandler for Engine<V> {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() || self.startup_error.is_some() {
            return;
        }
        if let Err(e) = self.start(event_loop) {
            log::error!("Startup failed: {e}");
            self.startup_error = Some(e);
            event_loop.exit();
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        let Some(context) = self.context.as_mut() else {
            return;
        };

        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested, shutting down");
                self.viewer.shutdown(context);
                event_loop.exit();
            }

            WindowEvent::Resized(new_size) => {
                if new_size.width > 0 && new_size.height > 0 {
                    context.window_size = new_size;
                    context
                        .renderer
                        .gpu_mut()
                        .resize(new_size.width, new_size.height);
                    self.viewer
                        .on_resize(context, new_size.width, new_size.height);
                }
            }

            WindowEvent::KeyboardInput { event, .. } => {
                if let winit::keyboard::PhysicalKey::Code(key_code) = event.physical_key {
                    context.input.process_keyboard(key_code, event.state);
                }
            }

            WindowEvent::MouseInput { state, button, .. } => {
                context.input.process_mouse_button(button, state);
            }

            WindowEvent::CursorMoved { position, .. } => {
                context
                    .input
                    .process_cursor(glam::Vec2::new(position.x as f32, position.y as f32));
            }

            WindowEvent::CursorLeft { .. } => context.input.cursor_left(),

            WindowEvent::MouseWheel { delta, .. } => {
                let scroll = match delta {
                    winit::event::MouseScrollDelta::LineDelta(x, y) => glam::Vec2::new(x, y),
                    winit::event::MouseScrollDelta::PixelDelta(pos) => {
                        glam::Vec2::new(pos.x as f32, pos.y as f32) / 40.0
                    }
                };
                context.input.process_scroll(scroll);
            }

            WindowEvent::RedrawRequested => {
                context.time.update();
                context.stats.record_frame(context.time.delta());
                if let Some(report) = context.stats.take_report(STATS_INTERVAL) {
                    log::info!("{report}");
                }

                self.viewer.update(context);

                if context.should_quit() {
                    self.viewer.shutdown(context);
                    event_loop.exit();
                    return;
                }

                self.viewer.render(context);
                context.input.end_frame();

                if let Some(window) = &self.window {
                    window.request_redraw();
                }
            }

            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }
}
