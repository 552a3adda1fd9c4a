//! Graphics device.
//!
//! The [`GraphicsDevice`] owns the backend, creates resources and tracks the
//! device-wide binding state: the bound framebuffer, the enabled
//! capabilities, the blend mode and the current program.
//!
//! Every device object is registered under its [`Handle`] until it is
//! released. Releasing a handle the registry does not know is an error.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::backend::headless::HeadlessBackend;
use crate::backend::{
    DrawCall, FramebufferSpec, GpuBackend, Handle, ResourceKind, VertexBindingSpec,
};
use crate::config::{DeviceCapabilities, DeviceConfig};
use crate::error::GraphicsError;
use crate::reflect::reflect;
use crate::resources::{Buffer, DeviceObject, Framebuffer, Program, Texture};
use crate::shader::ProgramDescriptor;
use crate::types::{
    BlendEquation, BlendFunc, BufferDescriptor, EnableFlags, FramebufferDescriptor,
    TextureDescriptor,
};

/// Device-wide binding state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceState {
    /// `None` is the default target.
    pub bound_framebuffer: Option<Handle>,
    pub enabled: EnableFlags,
    pub blend_func: BlendFunc,
    pub blend_equation: BlendEquation,
    pub current_program: Option<Handle>,
}

/// A graphics device for creating GPU resources.
///
/// # Thread Safety
///
/// `GraphicsDevice` is `Send + Sync`. Rendering itself is single threaded:
/// command execution and draws are issued from the thread that drives the
/// device.
///
/// # Example
///
/// ```ignore
/// let (device, _backend) = GraphicsDevice::headless()?;
///
/// let buffer = device.create_buffer_with_data(bytemuck::cast_slice(&vertices), false)?;
/// let program = device.create_program(&descriptor)?;
/// ```
pub struct GraphicsDevice {
    name: String,
    backend: Arc<dyn GpuBackend>,
    capabilities: DeviceCapabilities,
    state: RwLock<DeviceState>,
    live: RwLock<HashMap<Handle, ResourceKind>>,
}

impl GraphicsDevice {
    /// Create a device on top of `backend` and apply the initial state from
    /// `config`.
    pub fn new(
        backend: Arc<dyn GpuBackend>,
        config: DeviceConfig,
    ) -> Result<Arc<Self>, GraphicsError> {
        backend.set_enabled(config.enabled)?;
        backend.set_blend_func(config.blend_func)?;
        backend.set_blend_equation(config.blend_equation)?;

        log::info!(
            "GraphicsDevice: created \"{}\" on {}",
            config.name,
            backend.name()
        );

        Ok(Arc::new(Self {
            name: config.name,
            backend,
            capabilities: config.capabilities,
            state: RwLock::new(DeviceState {
                bound_framebuffer: None,
                enabled: config.enabled,
                blend_func: config.blend_func,
                blend_equation: config.blend_equation,
                current_program: None,
            }),
            live: RwLock::new(HashMap::new()),
        }))
    }

    /// Create a device on a fresh [`HeadlessBackend`].
    pub fn headless() -> Result<(Arc<Self>, Arc<HeadlessBackend>), GraphicsError> {
        Self::headless_with(DeviceConfig::default())
    }

    pub fn headless_with(
        config: DeviceConfig,
    ) -> Result<(Arc<Self>, Arc<HeadlessBackend>), GraphicsError> {
        let backend = Arc::new(HeadlessBackend::new());
        let device = Self::new(backend.clone(), config)?;
        Ok((device, backend))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn backend(&self) -> &Arc<dyn GpuBackend> {
        &self.backend
    }

    pub fn capabilities(&self) -> &DeviceCapabilities {
        &self.capabilities
    }

    /// A snapshot of the binding state.
    pub fn state(&self) -> DeviceState {
        *self.state.read()
    }

    // ========================================================================
    // Resource creation
    // ========================================================================

    /// Create a GPU buffer, optionally filled with `data`.
    ///
    /// # Errors
    ///
    /// Returns an error if the size is zero, exceeds device limits, is
    /// smaller than `data`, or allocation fails.
    pub fn create_buffer(
        self: &Arc<Self>,
        descriptor: &BufferDescriptor,
        data: Option<&[u8]>,
    ) -> Result<Arc<Buffer>, GraphicsError> {
        if descriptor.size == 0 {
            return Err(GraphicsError::InvalidParameter(
                "buffer size cannot be zero".to_string(),
            ));
        }
        if descriptor.size > self.capabilities.max_buffer_size {
            return Err(GraphicsError::InvalidParameter(format!(
                "buffer size {} exceeds maximum {}",
                descriptor.size, self.capabilities.max_buffer_size
            )));
        }
        if let Some(data) = data {
            if data.len() as u64 > descriptor.size {
                return Err(GraphicsError::InvalidParameter(format!(
                    "initial data of {} bytes does not fit a buffer of {} bytes",
                    data.len(),
                    descriptor.size
                )));
            }
        }

        let handle = self.backend.create_buffer(descriptor, data)?;
        self.register(ResourceKind::Buffer, handle);

        log::trace!(
            "GraphicsDevice: created buffer {handle} {:?}, size={}",
            descriptor.label,
            descriptor.size
        );

        Ok(Arc::new(Buffer::new(
            DeviceObject::new(self, ResourceKind::Buffer, handle),
            descriptor,
        )))
    }

    /// Create a buffer sized to and filled with `data`.
    pub fn create_buffer_with_data(
        self: &Arc<Self>,
        data: &[u8],
        dynamic: bool,
    ) -> Result<Arc<Buffer>, GraphicsError> {
        let descriptor = BufferDescriptor::new(data.len() as u64).with_dynamic(dynamic);
        self.create_buffer(&descriptor, Some(data))
    }

    /// Compile, link and reflect a program.
    ///
    /// # Errors
    ///
    /// Device errors from compilation, reflection errors, and attributes
    /// placed beyond the device's attribute limit. The device program is
    /// released again when reflection fails.
    pub fn create_program(
        self: &Arc<Self>,
        descriptor: &ProgramDescriptor,
    ) -> Result<Arc<Program>, GraphicsError> {
        let (handle, raw) = self.backend.create_program(descriptor)?;

        let reflection = reflect(&raw).and_then(|reflection| {
            let limit = self.capabilities.max_vertex_attributes;
            match reflection
                .attributes
                .iter()
                .find(|a| a.locations().end > limit)
            {
                Some(attribute) => Err(GraphicsError::InvalidParameter(format!(
                    "attribute \"{}\" uses locations {:?}, device supports {limit}",
                    attribute.name,
                    attribute.locations()
                ))),
                None => Ok(reflection),
            }
        });
        let reflection = match reflection {
            Ok(reflection) => reflection,
            Err(err) => {
                if let Err(release_err) = self.backend.release(ResourceKind::Program, handle) {
                    log::warn!(
                        "GraphicsDevice: failed to release rejected program {handle}: {release_err}"
                    );
                }
                return Err(err);
            }
        };
        self.register(ResourceKind::Program, handle);

        log::trace!(
            "GraphicsDevice: created program {handle} {:?} ({} attributes, {} uniforms)",
            descriptor.label,
            reflection.attributes.len(),
            reflection.uniforms.len()
        );

        Ok(Arc::new(Program::new(
            DeviceObject::new(self, ResourceKind::Program, handle),
            descriptor.label.clone(),
            Arc::new(reflection),
        )))
    }

    /// Create a 2D texture, optionally filled with pixel data.
    ///
    /// # Errors
    ///
    /// Returns an error if the dimensions or sample count are outside the
    /// device limits, or allocation fails.
    pub fn create_texture(
        self: &Arc<Self>,
        descriptor: &TextureDescriptor,
        data: Option<&[u8]>,
    ) -> Result<Arc<Texture>, GraphicsError> {
        let max_dim = self.capabilities.max_texture_size;
        if descriptor.width == 0 || descriptor.height == 0 {
            return Err(GraphicsError::InvalidParameter(
                "texture dimensions cannot be zero".to_string(),
            ));
        }
        if descriptor.width > max_dim || descriptor.height > max_dim {
            return Err(GraphicsError::InvalidParameter(format!(
                "texture dimension exceeds maximum {max_dim}"
            )));
        }
        if descriptor.samples == 0 || descriptor.samples > self.capabilities.max_samples {
            return Err(GraphicsError::InvalidParameter(format!(
                "sample count {} is outside 1..={}",
                descriptor.samples, self.capabilities.max_samples
            )));
        }

        let handle = self.backend.create_texture(descriptor, data)?;
        self.register(ResourceKind::Texture, handle);

        log::trace!(
            "GraphicsDevice: created texture {handle} {:?}, size={}x{}",
            descriptor.label,
            descriptor.width,
            descriptor.height
        );

        Ok(Arc::new(Texture::new(
            DeviceObject::new(self, ResourceKind::Texture, handle),
            descriptor.clone(),
        )))
    }

    /// Create a framebuffer from existing textures.
    ///
    /// # Errors
    ///
    /// Returns an error if there are no attachments, too many color
    /// attachments, mismatched sizes, a depth texture used for color (or
    /// the reverse), or a released texture.
    pub fn create_framebuffer(
        self: &Arc<Self>,
        descriptor: &FramebufferDescriptor,
    ) -> Result<Arc<Framebuffer>, GraphicsError> {
        let colors = &descriptor.color_attachments;
        if colors.len() > self.capabilities.max_color_attachments as usize {
            return Err(GraphicsError::InvalidParameter(format!(
                "{} color attachments exceed maximum {}",
                colors.len(),
                self.capabilities.max_color_attachments
            )));
        }
        if colors.iter().any(|t| t.format().is_depth()) {
            return Err(GraphicsError::InvalidParameter(
                "depth texture used as a color attachment".to_string(),
            ));
        }
        if let Some(depth) = &descriptor.depth_attachment {
            if !depth.format().is_depth() {
                return Err(GraphicsError::InvalidParameter(
                    "depth attachment needs a depth format".to_string(),
                ));
            }
        }

        let mut attachments = colors.iter().chain(descriptor.depth_attachment.iter());
        let first = attachments.next().ok_or_else(|| {
            GraphicsError::InvalidParameter("framebuffer needs at least one attachment".to_string())
        })?;
        let (width, height) = (first.width(), first.height());
        if attachments.any(|t| t.width() != width || t.height() != height) {
            return Err(GraphicsError::InvalidParameter(
                "framebuffer attachments differ in size".to_string(),
            ));
        }

        let spec = FramebufferSpec {
            color: colors
                .iter()
                .map(|t| t.live_handle())
                .collect::<Result<_, _>>()?,
            depth: descriptor
                .depth_attachment
                .as_ref()
                .map(|t| t.live_handle())
                .transpose()?,
            width,
            height,
        };

        let handle = self.backend.create_framebuffer(&spec)?;
        self.register(ResourceKind::Framebuffer, handle);

        log::trace!(
            "GraphicsDevice: created framebuffer {handle} {:?}, size={width}x{height}",
            descriptor.label
        );

        Ok(Arc::new(Framebuffer::new(
            DeviceObject::new(self, ResourceKind::Framebuffer, handle),
            descriptor.clone(),
            width,
            height,
        )))
    }

    /// Create the native object behind a vertex binding.
    pub(crate) fn create_vertex_binding(
        &self,
        spec: &VertexBindingSpec,
    ) -> Result<Handle, GraphicsError> {
        let handle = self.backend.create_vertex_binding(spec)?;
        self.register(ResourceKind::VertexBinding, handle);
        Ok(handle)
    }

    // ========================================================================
    // Binding state
    // ========================================================================

    /// Replace the set of enabled capabilities.
    pub fn set_enabled(&self, flags: EnableFlags) -> Result<(), GraphicsError> {
        self.backend.set_enabled(flags)?;
        self.state.write().enabled = flags;
        Ok(())
    }

    /// Enable capabilities in addition to the current ones.
    pub fn enable(&self, flags: EnableFlags) -> Result<(), GraphicsError> {
        let enabled = self.enabled() | flags;
        self.set_enabled(enabled)
    }

    /// Disable capabilities, keeping the others.
    pub fn disable(&self, flags: EnableFlags) -> Result<(), GraphicsError> {
        let enabled = self.enabled() - flags;
        self.set_enabled(enabled)
    }

    pub fn enabled(&self) -> EnableFlags {
        self.state.read().enabled
    }

    pub fn set_blend_func(&self, func: BlendFunc) -> Result<(), GraphicsError> {
        self.backend.set_blend_func(func)?;
        self.state.write().blend_func = func;
        Ok(())
    }

    pub fn blend_func(&self) -> BlendFunc {
        self.state.read().blend_func
    }

    pub fn set_blend_equation(&self, equation: BlendEquation) -> Result<(), GraphicsError> {
        self.backend.set_blend_equation(equation)?;
        self.state.write().blend_equation = equation;
        Ok(())
    }

    pub fn blend_equation(&self) -> BlendEquation {
        self.state.read().blend_equation
    }

    /// Bind a framebuffer, or the default target with `None`.
    pub fn bind_framebuffer(&self, framebuffer: Option<&Framebuffer>) -> Result<(), GraphicsError> {
        let handle = framebuffer.map(|f| f.live_handle()).transpose()?;
        self.backend.bind_framebuffer(handle)?;
        self.state.write().bound_framebuffer = handle;
        Ok(())
    }

    pub fn bound_framebuffer(&self) -> Option<Handle> {
        self.state.read().bound_framebuffer
    }

    /// Clear the bound target.
    pub fn clear(&self, color: glam::Vec4, depth: f32) -> Result<(), GraphicsError> {
        self.backend.clear(color, depth)?;
        Ok(())
    }

    /// Bind a texture to a sampler slot, or unbind the slot with `None`.
    pub fn bind_texture(&self, slot: u32, texture: Option<&Texture>) -> Result<(), GraphicsError> {
        if slot >= self.capabilities.max_texture_units {
            return Err(GraphicsError::InvalidParameter(format!(
                "texture slot {slot} exceeds maximum {}",
                self.capabilities.max_texture_units
            )));
        }
        let handle = texture.map(|t| t.live_handle()).transpose()?;
        self.backend.bind_texture(slot, handle)?;
        Ok(())
    }

    /// Unbind every texture slot in `start..end`.
    pub fn clear_samplers(&self, start: u32, end: u32) -> Result<(), GraphicsError> {
        let end = end.min(self.capabilities.max_texture_units);
        for slot in start..end {
            self.backend.bind_texture(slot, None)?;
        }
        Ok(())
    }

    /// Make a program current, or unbind with `None`.
    pub fn use_program(&self, program: Option<&Program>) -> Result<(), GraphicsError> {
        let handle = program.map(|p| p.live_handle()).transpose()?;
        self.backend.use_program(handle)?;
        self.state.write().current_program = handle;
        Ok(())
    }

    pub fn current_program(&self) -> Option<Handle> {
        self.state.read().current_program
    }

    pub(crate) fn draw(&self, call: &DrawCall) -> Result<(), GraphicsError> {
        self.backend.draw(call)?;
        Ok(())
    }

    // ========================================================================
    // Handle registry
    // ========================================================================

    fn register(&self, kind: ResourceKind, handle: Handle) {
        self.live.write().insert(handle, kind);
    }

    /// Destroy a registered device object.
    pub(crate) fn release(&self, kind: ResourceKind, handle: Handle) -> Result<(), GraphicsError> {
        match self.live.read().get(&handle) {
            Some(registered) if *registered == kind => {}
            _ => return Err(GraphicsError::UnknownHandle { kind, handle }),
        }
        self.backend.release(kind, handle)?;
        self.live.write().remove(&handle);

        let mut state = self.state.write();
        if state.current_program == Some(handle) {
            state.current_program = None;
        }
        if state.bound_framebuffer == Some(handle) {
            state.bound_framebuffer = None;
        }

        log::trace!("GraphicsDevice: released {kind} {handle}");
        Ok(())
    }

    /// Whether `handle` is a live object of `kind`.
    pub fn is_live(&self, kind: ResourceKind, handle: Handle) -> bool {
        self.live.read().get(&handle) == Some(&kind)
    }

    /// Number of live device objects.
    pub fn live_resources(&self) -> usize {
        self.live.read().len()
    }

    /// Number of live device objects of one kind.
    pub fn live_count(&self, kind: ResourceKind) -> usize {
        self.live.read().values().filter(|k| **k == kind).count()
    }
}

impl std::fmt::Debug for GraphicsDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphicsDevice")
            .field("name", &self.name)
            .field("backend", &self.backend.name())
            .field("capabilities", &self.capabilities)
            .finish()
    }
}

// Ensure GraphicsDevice is Send + Sync
static_assertions::assert_impl_all!(GraphicsDevice: Send, Sync);
