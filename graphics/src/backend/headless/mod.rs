//! Headless GPU backend.
//!
//! [`HeadlessBackend`] implements [`GpuBackend`] without touching a GPU. It
//! allocates handles, keeps buffer contents and uniform values in memory and
//! appends every state-changing call to a log of [`DeviceCall`]s that tests
//! can inspect.
//!
//! Program introspection scans the GLSL of each stage for declarations. Tests
//! that need exact driver output can queue it with
//! [`HeadlessBackend::queue_introspection`], and
//! [`HeadlessBackend::fail_next`] makes the next call fail.

mod introspect;

use std::collections::{HashMap, VecDeque};

use parking_lot::Mutex;

use super::{
    BackendError, DrawCall, FramebufferSpec, GpuBackend, Handle, RawProgramInfo, ResourceKind,
    VertexBindingSpec,
};
use crate::shader::ProgramDescriptor;
use crate::types::{
    BlendEquation, BlendFunc, BufferDescriptor, EnableFlags, TextureDescriptor,
};

/// One recorded backend call.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCall {
    CreateBuffer {
        handle: Handle,
        size: u64,
        dynamic: bool,
    },
    WriteBuffer {
        buffer: Handle,
        offset: u64,
        len: usize,
    },
    OrphanBuffer {
        buffer: Handle,
        size: u64,
    },
    CreateProgram {
        handle: Handle,
        stages: usize,
    },
    CreateTexture {
        handle: Handle,
        width: u32,
        height: u32,
    },
    CreateFramebuffer {
        handle: Handle,
        spec: FramebufferSpec,
    },
    CreateVertexBinding {
        handle: Handle,
        spec: VertexBindingSpec,
    },
    Draw(DrawCall),
    Release {
        kind: ResourceKind,
        handle: Handle,
    },
    UseProgram(Option<Handle>),
    SetUniform {
        program: Handle,
        location: i32,
        data: Vec<u8>,
    },
    BindFramebuffer(Option<Handle>),
    BindTexture {
        slot: u32,
        texture: Option<Handle>,
    },
    SetEnabled(EnableFlags),
    SetBlendFunc(BlendFunc),
    SetBlendEquation(BlendEquation),
    Clear {
        color: glam::Vec4,
        depth: f32,
    },
}

enum Object {
    Buffer(Vec<u8>),
    Program { uniforms: HashMap<i32, Vec<u8>> },
    Texture,
    Framebuffer,
    VertexBinding(VertexBindingSpec),
}

impl Object {
    fn kind(&self) -> ResourceKind {
        match self {
            Self::Buffer(_) => ResourceKind::Buffer,
            Self::Program { .. } => ResourceKind::Program,
            Self::Texture => ResourceKind::Texture,
            Self::Framebuffer => ResourceKind::Framebuffer,
            Self::VertexBinding(_) => ResourceKind::VertexBinding,
        }
    }
}

#[derive(Default)]
struct HeadlessState {
    next_handle: u32,
    objects: HashMap<Handle, Object>,
    calls: Vec<DeviceCall>,
    introspection: VecDeque<RawProgramInfo>,
    fail_next: Option<BackendError>,
}

impl HeadlessState {
    fn check_failure(&mut self) -> Result<(), BackendError> {
        match self.fail_next.take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn allocate(&mut self, object: Object) -> Handle {
        self.next_handle += 1;
        let handle = Handle::new(self.next_handle);
        self.objects.insert(handle, object);
        handle
    }

    fn expect_kind(&self, handle: Handle, kind: ResourceKind) -> Result<(), BackendError> {
        match self.objects.get(&handle) {
            Some(object) if object.kind() == kind => Ok(()),
            _ => Err(BackendError::InvalidHandle(handle)),
        }
    }

    fn buffer_mut(&mut self, handle: Handle) -> Result<&mut Vec<u8>, BackendError> {
        match self.objects.get_mut(&handle) {
            Some(Object::Buffer(bytes)) => Ok(bytes),
            _ => Err(BackendError::InvalidHandle(handle)),
        }
    }
}

/// GPU backend that records calls instead of executing them.
pub struct HeadlessBackend {
    state: Mutex<HeadlessState>,
}

impl Default for HeadlessBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessBackend {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(HeadlessState::default()),
        }
    }

    /// A copy of the call log.
    pub fn calls(&self) -> Vec<DeviceCall> {
        self.state.lock().calls.clone()
    }

    /// Drain the call log.
    pub fn take_calls(&self) -> Vec<DeviceCall> {
        std::mem::take(&mut self.state.lock().calls)
    }

    /// Only the draws from the call log, in order.
    pub fn draw_calls(&self) -> Vec<DrawCall> {
        self.state
            .lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                DeviceCall::Draw(draw) => Some(*draw),
                _ => None,
            })
            .collect()
    }

    /// Last value uploaded to a uniform location.
    pub fn uniform_value(&self, program: Handle, location: i32) -> Option<Vec<u8>> {
        match self.state.lock().objects.get(&program) {
            Some(Object::Program { uniforms }) => uniforms.get(&location).cloned(),
            _ => None,
        }
    }

    /// Current contents of a buffer.
    pub fn buffer_contents(&self, buffer: Handle) -> Option<Vec<u8>> {
        match self.state.lock().objects.get(&buffer) {
            Some(Object::Buffer(bytes)) => Some(bytes.clone()),
            _ => None,
        }
    }

    /// The spec a vertex binding was created from.
    pub fn vertex_binding(&self, binding: Handle) -> Option<VertexBindingSpec> {
        match self.state.lock().objects.get(&binding) {
            Some(Object::VertexBinding(spec)) => Some(spec.clone()),
            _ => None,
        }
    }

    /// Number of objects not yet released.
    pub fn live_objects(&self) -> usize {
        self.state.lock().objects.len()
    }

    /// Report `info` for the next created program instead of scanning its
    /// sources.
    pub fn queue_introspection(&self, info: RawProgramInfo) {
        self.state.lock().introspection.push_back(info);
    }

    /// Make the next backend call fail with `error`.
    pub fn fail_next(&self, error: BackendError) {
        self.state.lock().fail_next = Some(error);
    }
}

impl GpuBackend for HeadlessBackend {
    fn name(&self) -> &'static str {
        "Headless Backend"
    }

    fn create_buffer(
        &self,
        descriptor: &BufferDescriptor,
        data: Option<&[u8]>,
    ) -> Result<Handle, BackendError> {
        let mut state = self.state.lock();
        state.check_failure()?;
        log::trace!(
            "HeadlessBackend: creating buffer {:?} (size: {})",
            descriptor.label,
            descriptor.size
        );

        let size = usize::try_from(descriptor.size).map_err(|_| BackendError::OutOfMemory)?;
        let mut bytes = vec![0u8; size];
        if let Some(data) = data {
            let len = data.len().min(size);
            bytes[..len].copy_from_slice(&data[..len]);
        }
        let handle = state.allocate(Object::Buffer(bytes));
        state.calls.push(DeviceCall::CreateBuffer {
            handle,
            size: descriptor.size,
            dynamic: descriptor.dynamic,
        });
        Ok(handle)
    }

    fn write_buffer(&self, buffer: Handle, offset: u64, data: &[u8]) -> Result<(), BackendError> {
        let mut state = self.state.lock();
        state.check_failure()?;
        log::trace!(
            "HeadlessBackend: writing {} bytes to buffer {buffer} at {offset}",
            data.len()
        );

        let bytes = state.buffer_mut(buffer)?;
        let start = usize::try_from(offset).map_err(|_| out_of_bounds(buffer))?;
        let end = start
            .checked_add(data.len())
            .filter(|end| *end <= bytes.len())
            .ok_or_else(|| out_of_bounds(buffer))?;
        bytes[start..end].copy_from_slice(data);

        state.calls.push(DeviceCall::WriteBuffer {
            buffer,
            offset,
            len: data.len(),
        });
        Ok(())
    }

    fn read_buffer(
        &self,
        buffer: Handle,
        offset: u64,
        size: u64,
    ) -> Result<Vec<u8>, BackendError> {
        let mut state = self.state.lock();
        state.check_failure()?;

        let bytes = state.buffer_mut(buffer)?;
        let start = usize::try_from(offset).map_err(|_| out_of_bounds(buffer))?;
        let len = usize::try_from(size).map_err(|_| out_of_bounds(buffer))?;
        start
            .checked_add(len)
            .filter(|end| *end <= bytes.len())
            .map(|end| bytes[start..end].to_vec())
            .ok_or_else(|| out_of_bounds(buffer))
    }

    fn orphan_buffer(&self, buffer: Handle, size: u64) -> Result<(), BackendError> {
        let mut state = self.state.lock();
        state.check_failure()?;
        log::trace!("HeadlessBackend: orphaning buffer {buffer} (size: {size})");

        let new_size = usize::try_from(size).map_err(|_| BackendError::OutOfMemory)?;
        *state.buffer_mut(buffer)? = vec![0u8; new_size];
        state.calls.push(DeviceCall::OrphanBuffer { buffer, size });
        Ok(())
    }

    fn create_program(
        &self,
        descriptor: &ProgramDescriptor,
    ) -> Result<(Handle, RawProgramInfo), BackendError> {
        let mut state = self.state.lock();
        state.check_failure()?;
        log::trace!(
            "HeadlessBackend: creating program {:?} ({} stages)",
            descriptor.label,
            descriptor.stages.len()
        );

        if descriptor.stages.is_empty() {
            return Err(BackendError::CompilationFailed(
                "program has no shader stages".into(),
            ));
        }
        let info = match state.introspection.pop_front() {
            Some(info) => info,
            None => introspect::introspect(descriptor)?,
        };

        let handle = state.allocate(Object::Program {
            uniforms: HashMap::new(),
        });
        state.calls.push(DeviceCall::CreateProgram {
            handle,
            stages: descriptor.stages.len(),
        });
        Ok((handle, info))
    }

    fn create_texture(
        &self,
        descriptor: &TextureDescriptor,
        data: Option<&[u8]>,
    ) -> Result<Handle, BackendError> {
        let mut state = self.state.lock();
        state.check_failure()?;
        log::trace!(
            "HeadlessBackend: creating texture {:?} ({}x{})",
            descriptor.label,
            descriptor.width,
            descriptor.height
        );

        if let Some(data) = data {
            if data.len() as u64 != descriptor.byte_size() {
                return Err(BackendError::ResourceCreationFailed(format!(
                    "texture data is {} bytes, expected {}",
                    data.len(),
                    descriptor.byte_size()
                )));
            }
        }
        let handle = state.allocate(Object::Texture);
        state.calls.push(DeviceCall::CreateTexture {
            handle,
            width: descriptor.width,
            height: descriptor.height,
        });
        Ok(handle)
    }

    fn create_framebuffer(&self, spec: &FramebufferSpec) -> Result<Handle, BackendError> {
        let mut state = self.state.lock();
        state.check_failure()?;
        log::trace!(
            "HeadlessBackend: creating framebuffer ({} color attachments)",
            spec.color.len()
        );

        for texture in spec.color.iter().chain(spec.depth.iter()) {
            state.expect_kind(*texture, ResourceKind::Texture)?;
        }
        let handle = state.allocate(Object::Framebuffer);
        state.calls.push(DeviceCall::CreateFramebuffer {
            handle,
            spec: spec.clone(),
        });
        Ok(handle)
    }

    fn create_vertex_binding(&self, spec: &VertexBindingSpec) -> Result<Handle, BackendError> {
        let mut state = self.state.lock();
        state.check_failure()?;
        log::trace!(
            "HeadlessBackend: creating vertex binding for program {} ({} locations)",
            spec.program,
            spec.attributes.len()
        );

        state.expect_kind(spec.program, ResourceKind::Program)?;
        for attribute in &spec.attributes {
            state.expect_kind(attribute.buffer, ResourceKind::Buffer)?;
        }
        if let Some((index, _)) = spec.index {
            state.expect_kind(index, ResourceKind::Buffer)?;
        }
        let handle = state.allocate(Object::VertexBinding(spec.clone()));
        state.calls.push(DeviceCall::CreateVertexBinding {
            handle,
            spec: spec.clone(),
        });
        Ok(handle)
    }

    fn draw(&self, call: &DrawCall) -> Result<(), BackendError> {
        let mut state = self.state.lock();
        state.check_failure()?;
        log::trace!(
            "HeadlessBackend: draw {:?} count={} first={} instances={}",
            call.mode,
            call.count,
            call.first,
            call.instances
        );

        state.expect_kind(call.binding, ResourceKind::VertexBinding)?;
        state.calls.push(DeviceCall::Draw(*call));
        Ok(())
    }

    fn release(&self, kind: ResourceKind, handle: Handle) -> Result<(), BackendError> {
        let mut state = self.state.lock();
        state.check_failure()?;
        log::trace!("HeadlessBackend: releasing {kind} {handle}");

        state.expect_kind(handle, kind)?;
        state.objects.remove(&handle);
        state.calls.push(DeviceCall::Release { kind, handle });
        Ok(())
    }

    fn use_program(&self, program: Option<Handle>) -> Result<(), BackendError> {
        let mut state = self.state.lock();
        state.check_failure()?;
        if let Some(program) = program {
            state.expect_kind(program, ResourceKind::Program)?;
        }
        state.calls.push(DeviceCall::UseProgram(program));
        Ok(())
    }

    fn set_uniform(&self, program: Handle, location: i32, data: &[u8]) -> Result<(), BackendError> {
        let mut state = self.state.lock();
        state.check_failure()?;
        match state.objects.get_mut(&program) {
            Some(Object::Program { uniforms }) => {
                uniforms.insert(location, data.to_vec());
            }
            _ => return Err(BackendError::InvalidHandle(program)),
        }
        state.calls.push(DeviceCall::SetUniform {
            program,
            location,
            data: data.to_vec(),
        });
        Ok(())
    }

    fn bind_framebuffer(&self, framebuffer: Option<Handle>) -> Result<(), BackendError> {
        let mut state = self.state.lock();
        state.check_failure()?;
        if let Some(framebuffer) = framebuffer {
            state.expect_kind(framebuffer, ResourceKind::Framebuffer)?;
        }
        state.calls.push(DeviceCall::BindFramebuffer(framebuffer));
        Ok(())
    }

    fn bind_texture(&self, slot: u32, texture: Option<Handle>) -> Result<(), BackendError> {
        let mut state = self.state.lock();
        state.check_failure()?;
        if let Some(texture) = texture {
            state.expect_kind(texture, ResourceKind::Texture)?;
        }
        state.calls.push(DeviceCall::BindTexture { slot, texture });
        Ok(())
    }

    fn set_enabled(&self, flags: EnableFlags) -> Result<(), BackendError> {
        let mut state = self.state.lock();
        state.check_failure()?;
        state.calls.push(DeviceCall::SetEnabled(flags));
        Ok(())
    }

    fn set_blend_func(&self, func: BlendFunc) -> Result<(), BackendError> {
        let mut state = self.state.lock();
        state.check_failure()?;
        state.calls.push(DeviceCall::SetBlendFunc(func));
        Ok(())
    }

    fn set_blend_equation(&self, equation: BlendEquation) -> Result<(), BackendError> {
        let mut state = self.state.lock();
        state.check_failure()?;
        state.calls.push(DeviceCall::SetBlendEquation(equation));
        Ok(())
    }

    fn clear(&self, color: glam::Vec4, depth: f32) -> Result<(), BackendError> {
        let mut state = self.state.lock();
        state.check_failure()?;
        state.calls.push(DeviceCall::Clear { color, depth });
        Ok(())
    }
}

fn out_of_bounds(buffer: Handle) -> BackendError {
    BackendError::Internal(format!("access out of bounds of buffer {buffer}"))
}
