//! wgpu graphics context
//!
//! Calls made through [`GraphicsContext`] are recorded into a frame and replayed as
//! wgpu render passes when the frame is presented. Every contiguous run of draws into
//! the same framebuffer becomes one render pass; uniform blocks are snapshotted per
//! draw into a frame-wide buffer and bound with dynamic offsets.

use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use wgpu::util::DeviceExt;
use winit::window::Window;

use super::{
    Capability, CullFace, FramebufferBinding, FramebufferDesc, FramebufferId, GpuError,
    GraphicsContext, MAX_TEXTURE_UNITS, Primitive, ProgramId, SAMPLE_COUNTS, ShaderSource,
    TextureDesc, TextureFormat, TextureId, VertexArrayId, VertexLayout,
};

const MESH_ATTRIBUTES: [wgpu::VertexAttribute; 3] =
    wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3, 2 => Float32x2];
const SCREEN_ATTRIBUTES: [wgpu::VertexAttribute; 2] =
    wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32x2];

const SURFACE_DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
const INITIAL_UNIFORM_CAPACITY: u64 = 64 * 1024;

fn wgpu_format(format: TextureFormat) -> wgpu::TextureFormat {
    match format {
        TextureFormat::Rgba8Unorm => wgpu::TextureFormat::Rgba8Unorm,
        TextureFormat::Rgba16Float => wgpu::TextureFormat::Rgba16Float,
        TextureFormat::Depth32Float => wgpu::TextureFormat::Depth32Float,
    }
}

fn wgpu_face(face: CullFace) -> wgpu::Face {
    match face {
        CullFace::Front => wgpu::Face::Front,
        CullFace::Back => wgpu::Face::Back,
    }
}

fn vertex_buffer_layout(layout: VertexLayout) -> wgpu::VertexBufferLayout<'static> {
    wgpu::VertexBufferLayout {
        array_stride: layout.stride(),
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: match layout {
            VertexLayout::Mesh => &MESH_ATTRIBUTES,
            VertexLayout::Screen => &SCREEN_ATTRIBUTES,
        },
    }
}

fn align_to(value: u64, alignment: u64) -> u64 {
    value.div_ceil(alignment) * alignment
}

/// Run `f` inside validation and out-of-memory error scopes
fn scoped<T>(device: &wgpu::Device, f: impl FnOnce() -> T) -> Result<T, String> {
    device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let value = f();
    let validation = pollster::block_on(device.pop_error_scope());
    let out_of_memory = pollster::block_on(device.pop_error_scope());
    match validation.or(out_of_memory) {
        Some(error) => Err(error.to_string()),
        None => Ok(value),
    }
}

struct GpuTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    format: TextureFormat,
    width: u32,
    height: u32,
    samples: u32,
}

struct Framebuffer {
    color: SmallVec<[TextureId; 4]>,
    depth: Option<TextureId>,
}

struct Program {
    label: &'static str,
    module: wgpu::ShaderModule,
    vertex_layout: VertexLayout,
    uniform_size: u64,
    texture_count: u32,
    bind_group_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    uniforms: Vec<u8>,
}

struct VertexArray {
    buffer: wgpu::Buffer,
    layout: VertexLayout,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct PipelineKey {
    program: ProgramId,
    color_formats: SmallVec<[wgpu::TextureFormat; 4]>,
    depth_format: Option<wgpu::TextureFormat>,
    samples: u32,
    primitive: Primitive,
    cull: Option<CullFace>,
    depth_test: bool,
}

struct DrawCommand {
    program: ProgramId,
    vertex_array: VertexArrayId,
    primitive: Primitive,
    first: u32,
    count: u32,
    cull: Option<CullFace>,
    depth_test: bool,
    textures: SmallVec<[Option<TextureId>; 4]>,
    uniform_offset: u64,
}

struct DrawPass {
    target: FramebufferBinding,
    clear: Option<[f32; 4]>,
    draws: Vec<DrawCommand>,
}

impl DrawPass {
    fn new(target: FramebufferBinding) -> Self {
        Self {
            target,
            clear: None,
            draws: Vec::new(),
        }
    }
}

enum RecordedPass {
    Draw(DrawPass),
    Blit {
        source: FramebufferId,
        destination: FramebufferId,
        all_samples: bool,
    },
}

#[derive(Default)]
struct Frame {
    passes: Vec<RecordedPass>,
    uniforms: Vec<u8>,
}

struct PreparedDraw {
    key: PipelineKey,
    bind_group: wgpu::BindGroup,
}

enum BlitPlan {
    Resolve {
        format: wgpu::TextureFormat,
        bind_group: wgpu::BindGroup,
        destination: TextureId,
    },
    Copy {
        source: TextureId,
        destination: TextureId,
    },
}

enum PreparedPass {
    Draw(Vec<Option<PreparedDraw>>),
    Blit(Option<BlitPlan>),
}

/// Parameters of the multisample resolve program
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct ResolveUniform {
    sample_count: u32,
    all_samples: u32,
    _padding: [u32; 2],
}

/// Built-in program that resolves multisampled color attachments
struct Resolver {
    module: wgpu::ShaderModule,
    bind_group_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    pipelines: FxHashMap<wgpu::TextureFormat, wgpu::RenderPipeline>,
}

impl Resolver {
    fn new(device: &wgpu::Device) -> Self {
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Resolve Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../shaders/resolve.wgsl").into()),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Resolve Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: false },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: true,
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Resolve Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        Self {
            module,
            bind_group_layout,
            pipeline_layout,
            pipelines: FxHashMap::default(),
        }
    }

    fn ensure_pipeline(&mut self, device: &wgpu::Device, format: wgpu::TextureFormat) {
        if self.pipelines.contains_key(&format) {
            return;
        }

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Resolve Pipeline"),
            layout: Some(&self.pipeline_layout),
            vertex: wgpu::VertexState {
                module: &self.module,
                entry_point: Some("vs_main"),
                buffers: &[],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &self.module,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        self.pipelines.insert(format, pipeline);
    }
}

/// Graphics context backed by wgpu and a winit window surface
pub struct WgpuContext {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    adapter_name: String,
    surface_depth: wgpu::TextureView,
    sampler: wgpu::Sampler,
    fallback_texture: wgpu::TextureView,
    uniform_buffer: wgpu::Buffer,
    uniform_capacity: u64,
    uniform_alignment: u64,
    resolver: Resolver,
    textures: FxHashMap<TextureId, GpuTexture>,
    framebuffers: FxHashMap<FramebufferId, Framebuffer>,
    programs: FxHashMap<ProgramId, Program>,
    vertex_arrays: FxHashMap<VertexArrayId, VertexArray>,
    pipelines: FxHashMap<PipelineKey, Option<wgpu::RenderPipeline>>,
    next_handle: u32,
    framebuffer: FramebufferBinding,
    program: Option<ProgramId>,
    vertex_array: Option<VertexArrayId>,
    bound_textures: [Option<TextureId>; MAX_TEXTURE_UNITS as usize],
    cull_face: CullFace,
    depth_test: bool,
    culling: bool,
    multisample: bool,
    open_pass: Option<DrawPass>,
    frame: Frame,
}

impl WgpuContext {
    /// Create a context rendering into `window`
    ///
    /// # Errors
    ///
    /// Returns an error if the surface, adapter or device cannot be created
    pub async fn new(window: Arc<Window>, vsync: bool) -> Result<Self, GpuError> {
        let size = window.inner_size();
        let (width, height) = (size.width.max(1), size.height.max(1));

        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = instance
            .create_surface(window)
            .map_err(|e| GpuError::Surface(e.to_string()))?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or(GpuError::AdapterUnavailable)?;

        let adapter_name = adapter.get_info().name;
        log::info!("Using GPU: {adapter_name}");

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Viewer Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    memory_hints: Default::default(),
                },
                None,
            )
            .await
            .map_err(|e| GpuError::DeviceRequest(e.to_string()))?;

        // Gamma is applied by the composite shader, so the surface must not re-encode.
        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| !f.is_srgb())
            .or_else(|| surface_caps.formats.first())
            .copied()
            .ok_or_else(|| GpuError::Surface("surface reports no formats".to_string()))?;

        let present_mode = if vsync {
            wgpu::PresentMode::AutoVsync
        } else {
            wgpu::PresentMode::AutoNoVsync
        };

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width,
            height,
            present_mode,
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let surface_depth = Self::create_surface_depth(&device, width, height);

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Linear Clamp Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let fallback_texture = device
            .create_texture(&wgpu::TextureDescriptor {
                label: Some("Fallback Texture"),
                size: wgpu::Extent3d {
                    width: 1,
                    height: 1,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba16Float,
                usage: wgpu::TextureUsages::TEXTURE_BINDING,
                view_formats: &[],
            })
            .create_view(&wgpu::TextureViewDescriptor::default());

        let uniform_buffer = Self::create_uniform_buffer(&device, INITIAL_UNIFORM_CAPACITY);
        let uniform_alignment = u64::from(device.limits().min_uniform_buffer_offset_alignment);
        let resolver = Resolver::new(&device);

        Ok(Self {
            surface,
            device,
            queue,
            config,
            adapter_name,
            surface_depth,
            sampler,
            fallback_texture,
            uniform_buffer,
            uniform_capacity: INITIAL_UNIFORM_CAPACITY,
            uniform_alignment,
            resolver,
            textures: FxHashMap::default(),
            framebuffers: FxHashMap::default(),
            programs: FxHashMap::default(),
            vertex_arrays: FxHashMap::default(),
            pipelines: FxHashMap::default(),
            next_handle: 1,
            framebuffer: FramebufferBinding::Default,
            program: None,
            vertex_array: None,
            bound_textures: [None; MAX_TEXTURE_UNITS as usize],
            cull_face: CullFace::Back,
            depth_test: false,
            culling: false,
            multisample: true,
            open_pass: None,
            frame: Frame::default(),
        })
    }

    fn create_surface_depth(device: &wgpu::Device, width: u32, height: u32) -> wgpu::TextureView {
        device
            .create_texture(&wgpu::TextureDescriptor {
                label: Some("Surface Depth Texture"),
                size: wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: SURFACE_DEPTH_FORMAT,
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
                view_formats: &[],
            })
            .create_view(&wgpu::TextureViewDescriptor::default())
    }

    fn create_uniform_buffer(device: &wgpu::Device, size: u64) -> wgpu::Buffer {
        device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Frame Uniform Buffer"),
            size,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    /// Reconfigure the window surface.
    ///
    /// Offscreen framebuffers keep their size.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.config.width = width;
        self.config.height = height;
        self.surface.configure(&self.device, &self.config);
        self.surface_depth = Self::create_surface_depth(&self.device, width, height);
        log::debug!("Surface resized to {width}x{height}");
    }

    /// Surface size in pixels
    #[must_use]
    pub fn size(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    /// Name of the adapter in use
    #[must_use]
    pub fn adapter_name(&self) -> &str {
        &self.adapter_name
    }

    fn allocate(&mut self) -> u32 {
        let handle = self.next_handle;
        self.next_handle += 1;
        handle
    }

    fn texture(&self, id: TextureId) -> Result<&GpuTexture, GpuError> {
        self.textures
            .get(&id)
            .ok_or_else(|| GpuError::UnknownHandle(format!("texture {}", id.raw())))
    }

    fn close_pass(&mut self) {
        if let Some(pass) = self.open_pass.take() {
            if pass.clear.is_some() || !pass.draws.is_empty() {
                self.frame.passes.push(RecordedPass::Draw(pass));
            }
        }
    }

    fn current_pass(&mut self) -> &mut DrawPass {
        let target = self.framebuffer;
        self.open_pass.get_or_insert_with(|| DrawPass::new(target))
    }

    /// Attachment formats and sample count of a framebuffer binding
    fn target_signature(
        &self,
        target: FramebufferBinding,
    ) -> Option<(SmallVec<[wgpu::TextureFormat; 4]>, Option<wgpu::TextureFormat>, u32)> {
        match target {
            FramebufferBinding::Default => Some((
                SmallVec::from_slice(&[self.config.format]),
                Some(SURFACE_DEPTH_FORMAT),
                1,
            )),
            FramebufferBinding::Offscreen(id) => {
                let framebuffer = self.framebuffers.get(&id)?;
                let mut samples = 1;
                let mut formats = SmallVec::new();
                for texture in &framebuffer.color {
                    let texture = self.textures.get(texture)?;
                    samples = texture.samples;
                    formats.push(wgpu_format(texture.format));
                }
                let depth = match framebuffer.depth {
                    Some(id) => Some(wgpu_format(self.textures.get(&id)?.format)),
                    None => None,
                };
                Some((formats, depth, samples))
            }
        }
    }

    fn build_pipeline(&self, key: &PipelineKey) -> Option<wgpu::RenderPipeline> {
        let program = self.programs.get(&key.program)?;

        let targets: SmallVec<[Option<wgpu::ColorTargetState>; 4]> = key
            .color_formats
            .iter()
            .map(|&format| {
                Some(wgpu::ColorTargetState {
                    format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })
            })
            .collect();

        // Screen-space passes never test against depth.
        let depth_test = key.depth_test && program.vertex_layout == VertexLayout::Mesh;
        let depth_stencil = key.depth_format.map(|format| wgpu::DepthStencilState {
            format,
            depth_write_enabled: depth_test,
            depth_compare: if depth_test {
                wgpu::CompareFunction::Less
            } else {
                wgpu::CompareFunction::Always
            },
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        });

        let topology = match key.primitive {
            Primitive::Triangles => wgpu::PrimitiveTopology::TriangleList,
            Primitive::TriangleStrip => wgpu::PrimitiveTopology::TriangleStrip,
        };

        let buffers = [vertex_buffer_layout(program.vertex_layout)];
        let descriptor = wgpu::RenderPipelineDescriptor {
            label: Some(program.label),
            layout: Some(&program.pipeline_layout),
            vertex: wgpu::VertexState {
                module: &program.module,
                entry_point: Some("vs_main"),
                buffers: &buffers,
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &program.module,
                entry_point: Some("fs_main"),
                targets: &targets,
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: key.cull.map(wgpu_face),
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil,
            multisample: wgpu::MultisampleState {
                count: key.samples,
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            multiview: None,
            cache: None,
        };

        match scoped(&self.device, || self.device.create_render_pipeline(&descriptor)) {
            Ok(pipeline) => {
                log::debug!("Created pipeline for '{}'", program.label);
                Some(pipeline)
            }
            Err(message) => {
                log::error!("Pipeline for '{}' rejected: {message}", program.label);
                None
            }
        }
    }

    fn ensure_pipeline(&mut self, key: &PipelineKey) -> bool {
        if let Some(pipeline) = self.pipelines.get(key) {
            return pipeline.is_some();
        }
        let pipeline = self.build_pipeline(key);
        let built = pipeline.is_some();
        self.pipelines.insert(key.clone(), pipeline);
        built
    }

    fn upload_uniforms(&mut self, data: &[u8]) {
        if data.is_empty() {
            return;
        }
        let required = data.len() as u64;
        if required > self.uniform_capacity {
            self.uniform_capacity = required.next_power_of_two();
            self.uniform_buffer = Self::create_uniform_buffer(&self.device, self.uniform_capacity);
            log::debug!("Frame uniform buffer grown to {} bytes", self.uniform_capacity);
        }
        self.queue.write_buffer(&self.uniform_buffer, 0, data);
    }

    fn prepare_draw(&mut self, target: FramebufferBinding, draw: &DrawCommand) -> Option<PreparedDraw> {
        let (color_formats, depth_format, samples) = self.target_signature(target)?;
        let key = PipelineKey {
            program: draw.program,
            color_formats,
            depth_format,
            samples,
            primitive: draw.primitive,
            cull: draw.cull,
            depth_test: draw.depth_test,
        };
        if !self.ensure_pipeline(&key) {
            return None;
        }

        let program = self.programs.get(&draw.program)?;
        let views: SmallVec<[&wgpu::TextureView; 4]> = draw
            .textures
            .iter()
            .map(|bound| match bound.and_then(|id| self.textures.get(&id)) {
                Some(texture) if texture.samples == 1 && !texture.format.is_depth() => {
                    &texture.view
                }
                Some(_) => {
                    log::warn!("'{}' samples an unsupported texture", program.label);
                    &self.fallback_texture
                }
                None => &self.fallback_texture,
            })
            .collect();

        let mut entries = vec![
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: &self.uniform_buffer,
                    offset: 0,
                    size: wgpu::BufferSize::new(program.uniform_size),
                }),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(&self.sampler),
            },
        ];
        for (unit, view) in views.iter().enumerate() {
            entries.push(wgpu::BindGroupEntry {
                binding: 2 + unit as u32,
                resource: wgpu::BindingResource::TextureView(view),
            });
        }

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(program.label),
            layout: &program.bind_group_layout,
            entries: &entries,
        });

        Some(PreparedDraw { key, bind_group })
    }

    fn prepare_blit(
        &mut self,
        source: FramebufferId,
        destination: FramebufferId,
        all_samples: bool,
    ) -> Option<BlitPlan> {
        let source_id = *self.framebuffers.get(&source)?.color.first()?;
        let destination_id = *self.framebuffers.get(&destination)?.color.first()?;
        let source_texture = self.textures.get(&source_id)?;
        let destination_texture = self.textures.get(&destination_id)?;

        if source_texture.width != destination_texture.width
            || source_texture.height != destination_texture.height
            || destination_texture.samples != 1
        {
            log::warn!("Blit between incompatible framebuffers skipped");
            return None;
        }

        if source_texture.samples == 1 {
            if source_texture.format != destination_texture.format {
                log::warn!("Blit between different formats skipped");
                return None;
            }
            return Some(BlitPlan::Copy {
                source: source_id,
                destination: destination_id,
            });
        }

        let format = wgpu_format(destination_texture.format);
        let params = ResolveUniform {
            sample_count: source_texture.samples,
            all_samples: u32::from(all_samples),
            _padding: [0; 2],
        };
        let params_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Resolve Params"),
                contents: bytemuck::bytes_of(&params),
                usage: wgpu::BufferUsages::UNIFORM,
            });
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Resolve Bind Group"),
            layout: &self.resolver.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: params_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&source_texture.view),
                },
            ],
        });

        self.resolver.ensure_pipeline(&self.device, format);

        Some(BlitPlan::Resolve {
            format,
            bind_group,
            destination: destination_id,
        })
    }

    fn prepare(&mut self, frame: &Frame) -> Vec<PreparedPass> {
        let mut prepared = Vec::with_capacity(frame.passes.len());
        for pass in &frame.passes {
            match pass {
                RecordedPass::Draw(pass) => {
                    let draws = pass
                        .draws
                        .iter()
                        .map(|draw| self.prepare_draw(pass.target, draw))
                        .collect();
                    prepared.push(PreparedPass::Draw(draws));
                }
                RecordedPass::Blit {
                    source,
                    destination,
                    all_samples,
                } => {
                    prepared.push(PreparedPass::Blit(self.prepare_blit(
                        *source,
                        *destination,
                        *all_samples,
                    )));
                }
            }
        }
        prepared
    }

    fn encode_draw_pass(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        pass: &DrawPass,
        draws: &[Option<PreparedDraw>],
        surface_view: &wgpu::TextureView,
    ) {
        let (color_views, depth_view): (SmallVec<[&wgpu::TextureView; 4]>, _) = match pass.target {
            FramebufferBinding::Default => {
                (SmallVec::from_slice(&[surface_view]), Some(&self.surface_depth))
            }
            FramebufferBinding::Offscreen(id) => {
                let Some(framebuffer) = self.framebuffers.get(&id) else {
                    return;
                };
                let colors = framebuffer
                    .color
                    .iter()
                    .filter_map(|texture| self.textures.get(texture).map(|t| &t.view))
                    .collect();
                let depth = framebuffer
                    .depth
                    .and_then(|texture| self.textures.get(&texture))
                    .map(|t| &t.view);
                (colors, depth)
            }
        };

        let (color_load, depth_load) = match pass.clear {
            Some([r, g, b, a]) => (
                wgpu::LoadOp::Clear(wgpu::Color {
                    r: f64::from(r),
                    g: f64::from(g),
                    b: f64::from(b),
                    a: f64::from(a),
                }),
                wgpu::LoadOp::Clear(1.0),
            ),
            None => (wgpu::LoadOp::Load, wgpu::LoadOp::Load),
        };

        let color_attachments: SmallVec<[Option<wgpu::RenderPassColorAttachment>; 4]> =
            color_views
                .iter()
                .map(|&view| {
                    Some(wgpu::RenderPassColorAttachment {
                        view,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: color_load,
                            store: wgpu::StoreOp::Store,
                        },
                    })
                })
                .collect();

        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Recorded Pass"),
            color_attachments: &color_attachments,
            depth_stencil_attachment: depth_view.map(|view| {
                wgpu::RenderPassDepthStencilAttachment {
                    view,
                    depth_ops: Some(wgpu::Operations {
                        load: depth_load,
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        for (draw, prepared) in pass.draws.iter().zip(draws) {
            let Some(prepared) = prepared else {
                continue;
            };
            let Some(Some(pipeline)) = self.pipelines.get(&prepared.key) else {
                continue;
            };
            let Some(vertex_array) = self.vertex_arrays.get(&draw.vertex_array) else {
                continue;
            };

            render_pass.set_pipeline(pipeline);
            render_pass.set_bind_group(0, &prepared.bind_group, &[draw.uniform_offset as u32]);
            render_pass.set_vertex_buffer(0, vertex_array.buffer.slice(..));
            render_pass.draw(draw.first..draw.first + draw.count, 0..1);
        }
    }

    fn encode_blit(&self, encoder: &mut wgpu::CommandEncoder, plan: &BlitPlan) {
        match plan {
            BlitPlan::Copy {
                source,
                destination,
            } => {
                let (Some(source), Some(destination)) =
                    (self.textures.get(source), self.textures.get(destination))
                else {
                    return;
                };
                encoder.copy_texture_to_texture(
                    source.texture.as_image_copy(),
                    destination.texture.as_image_copy(),
                    wgpu::Extent3d {
                        width: source.width,
                        height: source.height,
                        depth_or_array_layers: 1,
                    },
                );
            }
            BlitPlan::Resolve {
                format,
                bind_group,
                destination,
            } => {
                let (Some(pipeline), Some(destination)) = (
                    self.resolver.pipelines.get(format),
                    self.textures.get(destination),
                ) else {
                    return;
                };
                let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("Resolve Pass"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: &destination.view,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                            store: wgpu::StoreOp::Store,
                        },
                    })],
                    depth_stencil_attachment: None,
                    timestamp_writes: None,
                    occlusion_query_set: None,
                });
                render_pass.set_pipeline(pipeline);
                render_pass.set_bind_group(0, bind_group, &[]);
                render_pass.draw(0..3, 0..1);
            }
        }
    }
}

impl GraphicsContext for WgpuContext {
    fn create_texture(&mut self, desc: &TextureDesc) -> Result<TextureId, GpuError> {
        let max = self.device.limits().max_texture_dimension_2d;
        if desc.width == 0 || desc.height == 0 || desc.width > max || desc.height > max {
            return Err(GpuError::AllocationFailed(format!(
                "{}: invalid size {}x{}",
                desc.label, desc.width, desc.height
            )));
        }
        if !SAMPLE_COUNTS.contains(&desc.samples) {
            return Err(GpuError::AllocationFailed(format!(
                "{}: unsupported sample count {}",
                desc.label, desc.samples
            )));
        }

        let format = wgpu_format(desc.format);
        let mut usage =
            wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING;
        if desc.samples == 1 && !desc.format.is_depth() {
            usage |= wgpu::TextureUsages::COPY_SRC | wgpu::TextureUsages::COPY_DST;
        }

        let texture = scoped(&self.device, || {
            self.device.create_texture(&wgpu::TextureDescriptor {
                label: Some(desc.label),
                size: wgpu::Extent3d {
                    width: desc.width,
                    height: desc.height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: desc.samples,
                dimension: wgpu::TextureDimension::D2,
                format,
                usage,
                view_formats: &[],
            })
        })
        .map_err(|e| GpuError::AllocationFailed(format!("{}: {e}", desc.label)))?;

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let id = TextureId(self.allocate());
        self.textures.insert(
            id,
            GpuTexture {
                texture,
                view,
                format: desc.format,
                width: desc.width,
                height: desc.height,
                samples: desc.samples,
            },
        );
        log::debug!(
            "Created texture '{}' {}x{} ({:?}, {} samples)",
            desc.label,
            desc.width,
            desc.height,
            desc.format,
            desc.samples
        );
        Ok(id)
    }

    fn create_framebuffer(&mut self, desc: &FramebufferDesc<'_>) -> Result<FramebufferId, GpuError> {
        let Some(&first) = desc.color.first() else {
            return Err(GpuError::IncompleteFramebuffer(format!(
                "{}: no color attachment",
                desc.label
            )));
        };
        let reference = self.texture(first)?;
        let (width, height, samples) = (reference.width, reference.height, reference.samples);

        for &id in desc.color.iter().chain(desc.depth.iter()) {
            let texture = self.texture(id)?;
            if texture.width != width || texture.height != height || texture.samples != samples {
                return Err(GpuError::IncompleteFramebuffer(format!(
                    "{}: attachment sizes or sample counts differ",
                    desc.label
                )));
            }
        }
        for &id in desc.color {
            if self.texture(id)?.format.is_depth() {
                return Err(GpuError::IncompleteFramebuffer(format!(
                    "{}: depth texture used as color",
                    desc.label
                )));
            }
        }
        if let Some(depth) = desc.depth {
            if !self.texture(depth)?.format.is_depth() {
                return Err(GpuError::IncompleteFramebuffer(format!(
                    "{}: color texture used as depth",
                    desc.label
                )));
            }
        }

        let id = FramebufferId(self.allocate());
        self.framebuffers.insert(
            id,
            Framebuffer {
                color: SmallVec::from_slice(desc.color),
                depth: desc.depth,
            },
        );
        Ok(id)
    }

    fn create_program(&mut self, source: &ShaderSource) -> Result<ProgramId, GpuError> {
        source.validate()?;

        let module = scoped(&self.device, || {
            self.device
                .create_shader_module(wgpu::ShaderModuleDescriptor {
                    label: Some(source.label),
                    source: wgpu::ShaderSource::Wgsl(source.wgsl.clone()),
                })
        })
        .map_err(|message| GpuError::ShaderCompilation {
            label: source.label.to_string(),
            message,
        })?;

        let mut entries = vec![
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: wgpu::BufferSize::new(source.uniform_size),
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
        ];
        for unit in 0..source.texture_count {
            entries.push(wgpu::BindGroupLayoutEntry {
                binding: 2 + unit,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            });
        }

        let bind_group_layout = self
            .device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some(source.label),
                entries: &entries,
            });
        let pipeline_layout = self
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(source.label),
                bind_group_layouts: &[&bind_group_layout],
                push_constant_ranges: &[],
            });

        let id = ProgramId(self.allocate());
        self.programs.insert(
            id,
            Program {
                label: source.label,
                module,
                vertex_layout: source.vertex_layout,
                uniform_size: source.uniform_size,
                texture_count: source.texture_count,
                bind_group_layout,
                pipeline_layout,
                uniforms: vec![0; source.uniform_size as usize],
            },
        );
        log::debug!("Compiled program '{}'", source.label);
        Ok(id)
    }

    fn create_vertex_array(
        &mut self,
        layout: VertexLayout,
        data: &[u8],
        vertex_count: u32,
    ) -> Result<VertexArrayId, GpuError> {
        if vertex_count == 0 || data.len() as u64 != layout.stride() * u64::from(vertex_count) {
            return Err(GpuError::AllocationFailed(format!(
                "{} bytes for {} vertices of stride {}",
                data.len(),
                vertex_count,
                layout.stride()
            )));
        }

        let buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Vertex Buffer"),
                contents: data,
                usage: wgpu::BufferUsages::VERTEX,
            });

        let id = VertexArrayId(self.allocate());
        self.vertex_arrays.insert(id, VertexArray { buffer, layout });
        Ok(id)
    }

    fn bind_framebuffer(&mut self, binding: FramebufferBinding) {
        if self.framebuffer != binding {
            self.close_pass();
        }
        self.framebuffer = binding;
    }

    fn clear(&mut self, color: [f32; 4]) {
        if self.open_pass.as_ref().is_some_and(|pass| !pass.draws.is_empty()) {
            self.close_pass();
        }
        self.current_pass().clear = Some(color);
    }

    fn use_program(&mut self, program: Option<ProgramId>) {
        self.program = program;
    }

    fn write_uniforms(&mut self, program: ProgramId, data: &[u8]) {
        let Some(program) = self.programs.get_mut(&program) else {
            log::warn!("Uniform write to unknown program {}", program.raw());
            return;
        };
        if data.len() != program.uniforms.len() {
            log::warn!(
                "'{}' expects {} uniform bytes, got {}",
                program.label,
                program.uniforms.len(),
                data.len()
            );
        }
        let len = data.len().min(program.uniforms.len());
        program.uniforms[..len].copy_from_slice(&data[..len]);
    }

    fn bind_texture(&mut self, unit: u32, texture: TextureId) {
        match self.bound_textures.get_mut(unit as usize) {
            Some(slot) => *slot = Some(texture),
            None => log::warn!("Texture unit {unit} out of range"),
        }
    }

    fn set_cull_face(&mut self, face: CullFace) {
        self.cull_face = face;
    }

    fn cull_face(&self) -> CullFace {
        self.cull_face
    }

    fn set_capability(&mut self, capability: Capability, enabled: bool) {
        match capability {
            Capability::DepthTest => self.depth_test = enabled,
            Capability::CullFace => self.culling = enabled,
            Capability::Multisample => self.multisample = enabled,
        }
    }

    fn is_enabled(&self, capability: Capability) -> bool {
        match capability {
            Capability::DepthTest => self.depth_test,
            Capability::CullFace => self.culling,
            Capability::Multisample => self.multisample,
        }
    }

    fn bind_vertex_array(&mut self, vertex_array: Option<VertexArrayId>) {
        self.vertex_array = vertex_array;
    }

    fn draw_arrays(&mut self, primitive: Primitive, first: u32, count: u32) {
        let (Some(program_id), Some(vertex_array)) = (self.program, self.vertex_array) else {
            log::warn!("Draw issued without a program and vertex array bound");
            return;
        };
        let Some(program) = self.programs.get(&program_id) else {
            return;
        };
        match self.vertex_arrays.get(&vertex_array) {
            Some(array) if array.layout == program.vertex_layout => {}
            _ => {
                log::warn!("'{}' drawn with an incompatible vertex array", program.label);
                return;
            }
        }

        let uniform_offset = align_to(self.frame.uniforms.len() as u64, self.uniform_alignment);
        self.frame.uniforms.resize(uniform_offset as usize, 0);
        self.frame.uniforms.extend_from_slice(&program.uniforms);

        let textures = self.bound_textures[..program.texture_count as usize]
            .iter()
            .copied()
            .collect();

        let command = DrawCommand {
            program: program_id,
            vertex_array,
            primitive,
            first,
            count,
            cull: self.culling.then_some(self.cull_face),
            depth_test: self.depth_test,
            textures,
            uniform_offset,
        };
        self.current_pass().draws.push(command);
    }

    fn blit_framebuffer(&mut self, source: FramebufferId, destination: FramebufferId) {
        self.close_pass();
        self.frame.passes.push(RecordedPass::Blit {
            source,
            destination,
            all_samples: self.multisample,
        });
    }

    fn present(&mut self) -> Result<(), GpuError> {
        self.close_pass();
        let frame = std::mem::take(&mut self.frame);

        let output = match self.surface.get_current_texture() {
            Ok(output) => output,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.surface.configure(&self.device, &self.config);
                return Err(GpuError::Surface("surface lost; reconfigured".to_string()));
            }
            Err(e) => return Err(GpuError::Surface(e.to_string())),
        };
        let surface_view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        self.upload_uniforms(&frame.uniforms);
        let prepared = self.prepare(&frame);

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });

        for (pass, plan) in frame.passes.iter().zip(&prepared) {
            match (pass, plan) {
                (RecordedPass::Draw(pass), PreparedPass::Draw(draws)) => {
                    self.encode_draw_pass(&mut encoder, pass, draws, &surface_view);
                }
                (RecordedPass::Blit { .. }, PreparedPass::Blit(Some(plan))) => {
                    self.encode_blit(&mut encoder, plan);
                }
                _ => {}
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        Ok(())
    }
}
