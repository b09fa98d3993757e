//! Demo viewer: a few objects lit by colored lamps under a gradient sky
//!
//! Pass a RON config path as the first argument to override the defaults.

use std::f32::consts::PI;
use std::rc::Rc;

use model_viewer::prelude::*;
use model_viewer::renderer::GpuMesh;
use winit::event::MouseButton;

const ORBIT_SPEED: f32 = 1.5;
const DRAG_SENSITIVITY: f32 = 0.005;
const ZOOM_STEP: f32 = 0.5;
const MIN_DISTANCE: f32 = 2.0;
const MAX_DISTANCE: f32 = 40.0;

struct DemoViewer {
    bindings: KeyBindings,
    pipeline: Pipeline,
    lamps: Vec<Lamp>,
    spinner: Option<ModelRef>,
    spin: f32,
}

impl DemoViewer {
    fn new(pipeline: Pipeline) -> Self {
        Self {
            bindings: KeyBindings::with_defaults(),
            pipeline,
            lamps: Vec::new(),
            spinner: None,
            spin: 0.0,
        }
    }
}

/// Model with forward, deferred and PBR materials sharing one color
fn surface(
    gpu: &mut dyn GraphicsContext,
    mesh: Rc<GpuMesh>,
    color: Vec3,
    shininess: f32,
    roughness: f32,
    metallic: f32,
) -> Model {
    let mut model = Model::new(mesh, prepare(gpu, StandardMaterial::new(color, 0.5, shininess)));
    model.add_material(
        MaterialType::Deferred,
        prepare(gpu, DeferredMaterial::new(color, 0.5, shininess)),
    );
    model.add_material(
        MaterialType::DeferredPbr,
        prepare(gpu, DeferredPbrMaterial::new(color, roughness, metallic)),
    );
    model
}

fn skybox(gpu: &mut dyn GraphicsContext, mesh: Rc<GpuMesh>) -> Model {
    let sky = GradientSky::default();
    let mut model = Model::new(mesh, prepare(gpu, SkyboxMaterial::new(&sky)));
    model.add_material(MaterialType::Deferred, prepare(gpu, SkyboxMaterial::gbuffer(&sky)));
    model.add_material(MaterialType::DeferredPbr, prepare(gpu, SkyboxMaterial::gbuffer(&sky)));
    model
}

impl Viewer for DemoViewer {
    fn init(&mut self, ctx: &mut ViewerContext) -> Result<(), RenderError> {
        let deferred_material = ctx.config().render.deferred_shading.material_type();
        let renderer = ctx.renderer_mut();
        renderer.set_deferred_material(deferred_material);

        let gpu = renderer.gpu_mut();
        let cube = Mesh::cube().upload(gpu)?;
        let sphere = Mesh::sphere(0.5, 32, 16).upload(gpu)?;
        let plane = Mesh::plane(20.0).upload(gpu)?;
        let lamp_mesh = Mesh::sphere(0.1, 12, 6).upload(gpu)?;

        let sky = skybox(gpu, cube.clone());

        let mut ground = surface(gpu, plane, Vec3::splat(0.6), 16.0, 0.8, 0.0);
        ground.set_position(Vec3::new(0.0, -1.0, 0.0));

        let mut spinner = surface(gpu, cube.clone(), Vec3::new(0.8, 0.3, 0.2), 32.0, 0.4, 0.0);
        spinner.set_position(Vec3::new(-1.5, 0.0, 0.0));

        let mut ball = surface(gpu, sphere.clone(), Vec3::new(0.9, 0.8, 0.5), 64.0, 0.25, 1.0);
        ball.set_position(Vec3::new(1.5, 0.0, 0.0));

        let mut pebble = surface(gpu, sphere, Vec3::new(0.2, 0.5, 0.9), 8.0, 0.6, 0.0);
        pebble.set_position(Vec3::new(0.0, -0.5, 2.0));
        pebble.set_uniform_scale(0.5);

        let lamp_specs = [
            (Vec3::new(-3.0, 2.0, 2.0), Vec3::new(1.0, 0.6, 0.3), 6.0),
            (Vec3::new(3.0, 2.5, -1.0), Vec3::new(0.3, 0.6, 1.0), 6.0),
            (Vec3::new(0.0, 3.0, 3.0), Vec3::new(1.0, 1.0, 1.0), 4.0),
        ];
        for (position, color, intensity) in lamp_specs {
            self.lamps
                .push(Lamp::new(gpu, lamp_mesh.clone(), position, color, intensity));
        }

        let spinner = spinner.shared();
        self.spinner = Some(spinner.clone());

        renderer.add_model(sky.shared());
        renderer.add_model(ground.shared());
        renderer.add_model(spinner);
        renderer.add_model(ball.shared());
        renderer.add_model(pebble.shared());
        for lamp in &self.lamps {
            renderer.add_model(lamp.model());
            renderer.add_light(lamp.light());
        }

        log::info!(
            "Scene ready: {} models, {} lights, {:?} pipeline",
            renderer.models().len(),
            renderer.lights().len(),
            self.pipeline
        );
        Ok(())
    }

    fn update(&mut self, ctx: &mut ViewerContext) {
        let dt = ctx.time.delta_seconds();
        let bindings = &self.bindings;
        let input = &ctx.input;

        if bindings.triggered(input, ViewerAction::Quit) {
            ctx.quit();
            return;
        }

        let toggle_bloom = bindings.triggered(input, ViewerAction::ToggleBloom);
        let toggle_hdr = bindings.triggered(input, ViewerAction::ToggleHdr);
        let toggle_gamma = bindings.triggered(input, ViewerAction::ToggleGammaCorrection);
        let toggle_msaa = bindings.triggered(input, ViewerAction::ToggleMsaa);
        let toggle_blinn = bindings.triggered(input, ViewerAction::ToggleBlinnPhong);
        let toggle_pipeline = bindings.triggered(input, ViewerAction::TogglePipeline);
        let toggle_material = bindings.triggered(input, ViewerAction::ToggleDeferredMaterial);
        let toggle_lamps = bindings.triggered(input, ViewerAction::ToggleLamps);

        let mut orbit = Vec3::ZERO;
        if bindings.held(input, ViewerAction::OrbitLeft) {
            orbit.y -= ORBIT_SPEED * dt;
        }
        if bindings.held(input, ViewerAction::OrbitRight) {
            orbit.y += ORBIT_SPEED * dt;
        }
        if bindings.held(input, ViewerAction::OrbitUp) {
            orbit.x -= ORBIT_SPEED * dt;
        }
        if bindings.held(input, ViewerAction::OrbitDown) {
            orbit.x += ORBIT_SPEED * dt;
        }
        let drag = input.drag_delta(MouseButton::Left);
        orbit += Vec3::new(-drag.y, -drag.x, 0.0) * DRAG_SENSITIVITY;

        let mut zoom = -input.scroll_delta().y * ZOOM_STEP;
        if bindings.triggered(input, ViewerAction::ZoomIn) {
            zoom -= ZOOM_STEP;
        }
        if bindings.triggered(input, ViewerAction::ZoomOut) {
            zoom += ZOOM_STEP;
        }

        let renderer = ctx.renderer_mut();
        if toggle_bloom {
            renderer.toggle_bloom();
        }
        if toggle_hdr {
            renderer.toggle_hdr();
        }
        if toggle_gamma {
            renderer.toggle_gamma_correction();
        }
        if toggle_msaa {
            renderer.toggle_msaa();
        }
        if toggle_blinn {
            renderer.toggle_blinn_phong_shading();
        }
        if toggle_pipeline {
            self.pipeline = match self.pipeline {
                Pipeline::Forward => Pipeline::Deferred,
                Pipeline::Deferred => Pipeline::Forward,
            };
            log::info!("{:?} pipeline", self.pipeline);
        }
        if toggle_material {
            let next = match renderer.deferred_material() {
                MaterialType::DeferredPbr => MaterialType::Deferred,
                _ => MaterialType::DeferredPbr,
            };
            renderer.set_deferred_material(next);
            log::info!("Deferred pass draws {next:?} materials");
        }
        if toggle_lamps {
            for lamp in &mut self.lamps {
                lamp.toggle();
            }
        }

        if orbit != Vec3::ZERO {
            renderer.update_camera_rotation(orbit);
        }
        if zoom != 0.0 {
            let camera = renderer.camera_mut();
            let distance = (camera.distance() + zoom).clamp(MIN_DISTANCE, MAX_DISTANCE);
            camera.set_distance(distance);
        }

        self.spin = (self.spin + dt * 0.5) % (2.0 * PI);
        if let Some(spinner) = &self.spinner {
            spinner
                .borrow_mut()
                .set_rotation(Vec3::new(self.spin * 0.5, self.spin, 0.0));
        }
    }

    fn render(&mut self, ctx: &mut ViewerContext) {
        let renderer = ctx.renderer_mut();
        let result = match self.pipeline {
            Pipeline::Forward => renderer.render(),
            Pipeline::Deferred => renderer.render_deferred(),
        };
        if let Err(e) = result {
            log::warn!("Frame skipped: {e}");
        }
    }
}

fn main() {
    let config = match std::env::args().nth(1) {
        Some(path) => match ViewerConfig::load_ron(&path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Failed to load {path}: {e}");
                std::process::exit(1);
            }
        },
        None => ViewerConfig::default().with_title("Model Viewer Demo"),
    };

    let viewer = DemoViewer::new(config.render.pipeline);
    let engine = Engine::new(config, viewer);

    if let Err(e) = engine.run() {
        eprintln!("Viewer error: {e}");
        std::process::exit(1);
    }
}
