//! Headless graphics context
//!
//! Simulates the binding state of a real context, validates resource creation the
//! same way the wgpu backend does, and records every state-changing call. The
//! command log is what the renderer's tests assert against.

use rustc_hash::{FxHashMap, FxHashSet};

use super::{
    Capability, CullFace, FramebufferBinding, FramebufferDesc, FramebufferId, GpuError,
    GraphicsContext, Primitive, ProgramId, SAMPLE_COUNTS, ShaderSource, TextureDesc, TextureId,
    VertexArrayId, VertexLayout,
};

/// A recorded context call
#[derive(Debug, Clone, PartialEq)]
pub enum GpuCommand {
    BindFramebuffer(FramebufferBinding),
    Clear([f32; 4]),
    UseProgram(Option<ProgramId>),
    WriteUniforms { program: ProgramId, data: Vec<u8> },
    BindTexture { unit: u32, texture: TextureId },
    SetCullFace(CullFace),
    SetCapability { capability: Capability, enabled: bool },
    BindVertexArray(Option<VertexArrayId>),
    DrawArrays { primitive: Primitive, first: u32, count: u32 },
    Blit { source: FramebufferId, destination: FramebufferId },
    Present,
}

/// Snapshot of the binding state at the time of a draw
#[derive(Debug, Clone, PartialEq)]
pub struct DrawCall {
    pub framebuffer: FramebufferBinding,
    pub program: Option<ProgramId>,
    pub vertex_array: Option<VertexArrayId>,
    pub cull_face: CullFace,
    pub culling: bool,
    pub primitive: Primitive,
    pub count: u32,
}

#[derive(Debug)]
struct TextureInfo {
    width: u32,
    height: u32,
    format: super::TextureFormat,
    samples: u32,
}

#[derive(Debug)]
struct ProgramInfo {
    label: &'static str,
    uniform_size: u64,
    uniforms: Vec<u8>,
}

/// Headless context that records commands
#[derive(Debug)]
pub struct RecordingContext {
    commands: Vec<GpuCommand>,
    draws: Vec<DrawCall>,
    textures: FxHashMap<TextureId, TextureInfo>,
    framebuffers: FxHashMap<FramebufferId, Vec<TextureId>>,
    programs: FxHashMap<ProgramId, ProgramInfo>,
    vertex_arrays: FxHashMap<VertexArrayId, (VertexLayout, u32)>,
    failing_programs: FxHashSet<&'static str>,
    next_handle: u32,
    framebuffer: FramebufferBinding,
    program: Option<ProgramId>,
    vertex_array: Option<VertexArrayId>,
    cull_face: CullFace,
    capabilities: FxHashSet<Capability>,
    frames_presented: u64,
}

impl RecordingContext {
    /// Create a context in the default GL state: only multisampling enabled,
    /// back faces selected for culling
    #[must_use]
    pub fn new() -> Self {
        let mut capabilities = FxHashSet::default();
        capabilities.insert(Capability::Multisample);
        Self {
            commands: Vec::new(),
            draws: Vec::new(),
            textures: FxHashMap::default(),
            framebuffers: FxHashMap::default(),
            programs: FxHashMap::default(),
            vertex_arrays: FxHashMap::default(),
            failing_programs: FxHashSet::default(),
            next_handle: 1,
            framebuffer: FramebufferBinding::Default,
            program: None,
            vertex_array: None,
            cull_face: CullFace::Back,
            capabilities,
            frames_presented: 0,
        }
    }

    /// Make every later `create_program` call with this label fail
    pub fn fail_program(&mut self, label: &'static str) {
        self.failing_programs.insert(label);
    }

    /// All recorded commands
    #[must_use]
    pub fn commands(&self) -> &[GpuCommand] {
        &self.commands
    }

    /// All recorded draws
    #[must_use]
    pub fn draw_calls(&self) -> &[DrawCall] {
        &self.draws
    }

    /// Forget recorded commands and draws
    pub fn clear_commands(&mut self) {
        self.commands.clear();
        self.draws.clear();
    }

    /// Current uniform block of a program
    #[must_use]
    pub fn uniforms(&self, program: ProgramId) -> Option<&[u8]> {
        self.programs.get(&program).map(|p| p.uniforms.as_slice())
    }

    /// Label a program was created with
    #[must_use]
    pub fn program_label(&self, program: ProgramId) -> Option<&'static str> {
        self.programs.get(&program).map(|p| p.label)
    }

    /// First program created with a label
    #[must_use]
    pub fn program_by_label(&self, label: &str) -> Option<ProgramId> {
        self.programs
            .iter()
            .filter(|(_, info)| info.label == label)
            .map(|(id, _)| *id)
            .min()
    }

    /// Color attachments of a framebuffer
    #[must_use]
    pub fn framebuffer_attachments(&self, framebuffer: FramebufferId) -> Option<&[TextureId]> {
        self.framebuffers.get(&framebuffer).map(Vec::as_slice)
    }

    /// Number of completed frames
    #[must_use]
    pub fn frames_presented(&self) -> u64 {
        self.frames_presented
    }

    /// Currently bound program
    #[must_use]
    pub fn current_program(&self) -> Option<ProgramId> {
        self.program
    }

    /// Currently bound framebuffer
    #[must_use]
    pub fn current_framebuffer(&self) -> FramebufferBinding {
        self.framebuffer
    }

    fn allocate(&mut self) -> u32 {
        let handle = self.next_handle;
        self.next_handle += 1;
        handle
    }

    fn texture(&self, id: TextureId) -> Result<&TextureInfo, GpuError> {
        self.textures
            .get(&id)
            .ok_or_else(|| GpuError::UnknownHandle(format!("texture {}", id.raw())))
    }
}

impl Default for RecordingContext {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphicsContext for RecordingContext {
    fn create_texture(&mut self, desc: &TextureDesc) -> Result<TextureId, GpuError> {
        if desc.width == 0 || desc.height == 0 {
            return Err(GpuError::AllocationFailed(format!(
                "{}: zero-sized texture {}x{}",
                desc.label, desc.width, desc.height
            )));
        }
        if !SAMPLE_COUNTS.contains(&desc.samples) {
            return Err(GpuError::AllocationFailed(format!(
                "{}: unsupported sample count {}",
                desc.label, desc.samples
            )));
        }

        let id = TextureId(self.allocate());
        self.textures.insert(
            id,
            TextureInfo {
                width: desc.width,
                height: desc.height,
                format: desc.format,
                samples: desc.samples,
            },
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
            let info = self.texture(id)?;
            if info.width != width || info.height != height || info.samples != samples {
                return Err(GpuError::IncompleteFramebuffer(format!(
                    "{}: attachment {} is {}x{}x{}, expected {}x{}x{}",
                    desc.label,
                    id.raw(),
                    info.width,
                    info.height,
                    info.samples,
                    width,
                    height,
                    samples
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
        self.framebuffers.insert(id, desc.color.to_vec());
        Ok(id)
    }

    fn create_program(&mut self, source: &ShaderSource) -> Result<ProgramId, GpuError> {
        source.validate()?;
        if self.failing_programs.contains(source.label) {
            return Err(GpuError::ShaderCompilation {
                label: source.label.to_string(),
                message: "compilation failure requested".to_string(),
            });
        }

        let id = ProgramId(self.allocate());
        self.programs.insert(
            id,
            ProgramInfo {
                label: source.label,
                uniform_size: source.uniform_size,
                uniforms: vec![0; source.uniform_size as usize],
            },
        );
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
        let id = VertexArrayId(self.allocate());
        self.vertex_arrays.insert(id, (layout, vertex_count));
        Ok(id)
    }

    fn bind_framebuffer(&mut self, binding: FramebufferBinding) {
        self.framebuffer = binding;
        self.commands.push(GpuCommand::BindFramebuffer(binding));
    }

    fn clear(&mut self, color: [f32; 4]) {
        self.commands.push(GpuCommand::Clear(color));
    }

    fn use_program(&mut self, program: Option<ProgramId>) {
        self.program = program;
        self.commands.push(GpuCommand::UseProgram(program));
    }

    fn write_uniforms(&mut self, program: ProgramId, data: &[u8]) {
        if let Some(info) = self.programs.get_mut(&program) {
            let len = data.len().min(info.uniform_size as usize);
            info.uniforms[..len].copy_from_slice(&data[..len]);
        }
        self.commands.push(GpuCommand::WriteUniforms {
            program,
            data: data.to_vec(),
        });
    }

    fn bind_texture(&mut self, unit: u32, texture: TextureId) {
        self.commands.push(GpuCommand::BindTexture { unit, texture });
    }

    fn set_cull_face(&mut self, face: CullFace) {
        self.cull_face = face;
        self.commands.push(GpuCommand::SetCullFace(face));
    }

    fn cull_face(&self) -> CullFace {
        self.cull_face
    }

    fn set_capability(&mut self, capability: Capability, enabled: bool) {
        if enabled {
            self.capabilities.insert(capability);
        } else {
            self.capabilities.remove(&capability);
        }
        self.commands.push(GpuCommand::SetCapability {
            capability,
            enabled,
        });
    }

    fn is_enabled(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    fn bind_vertex_array(&mut self, vertex_array: Option<VertexArrayId>) {
        self.vertex_array = vertex_array;
        self.commands.push(GpuCommand::BindVertexArray(vertex_array));
    }

    fn draw_arrays(&mut self, primitive: Primitive, first: u32, count: u32) {
        self.draws.push(DrawCall {
            framebuffer: self.framebuffer,
            program: self.program,
            vertex_array: self.vertex_array,
            cull_face: self.cull_face,
            culling: self.is_enabled(Capability::CullFace),
            primitive,
            count,
        });
        self.commands.push(GpuCommand::DrawArrays {
            primitive,
            first,
            count,
        });
    }

    fn blit_framebuffer(&mut self, source: FramebufferId, destination: FramebufferId) {
        self.commands.push(GpuCommand::Blit {
            source,
            destination,
        });
    }

    fn present(&mut self) -> Result<(), GpuError> {
        self.frames_presented += 1;
        self.commands.push(GpuCommand::Present);
        Ok(())
    }
}
