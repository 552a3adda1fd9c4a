//! GPU backend abstraction layer.
//!
//! Everything above this module talks to the device through the
//! [`GpuBackend`] trait. A backend owns the native objects behind opaque
//! [`Handle`]s, performs state changes and draws, and reports raw program
//! introspection data that [`crate::reflect`] turns into typed tables.
//!
//! # Available Backends
//!
//! - [`headless::HeadlessBackend`]: records every call and never touches a GPU.
//!   Used by tests, benchmarks and tooling.
//!
//! Calls are synchronous. A failing call returns a [`BackendError`] which the
//! layers above surface unchanged.

pub mod error;
pub mod headless;

use std::fmt;

use crate::shader::{ProgramDescriptor, ShaderStage};
use crate::types::{
    BlendEquation, BlendFunc, BufferDescriptor, DrawMode, EnableFlags, TextureDescriptor,
};
use crate::vertex::ComponentType;

pub use error::BackendError;

/// Opaque identifier of a device object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle(u32);

impl Handle {
    /// Wrap a raw backend identifier.
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// The raw backend identifier.
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The kind of object a [`Handle`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Buffer,
    Program,
    Texture,
    Framebuffer,
    VertexBinding,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Buffer => "buffer",
            Self::Program => "program",
            Self::Texture => "texture",
            Self::Framebuffer => "framebuffer",
            Self::VertexBinding => "vertex binding",
        };
        f.write_str(name)
    }
}

// ============================================================================
// Program introspection records
// ============================================================================

/// An active attribute or uniform as the driver reports it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResource {
    /// Name as reported, possibly with an `[0]` suffix.
    pub name: String,
    /// Native type enumeration value.
    pub type_code: u32,
    /// Binding location, negative when the resource has none.
    pub location: i32,
    /// Array length (1 for non-arrays).
    pub array_length: u32,
}

impl RawResource {
    pub fn new(name: impl Into<String>, type_code: u32, location: i32, array_length: u32) -> Self {
        Self {
            name: name.into(),
            type_code,
            location,
            array_length,
        }
    }
}

/// An active uniform block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawUniformBlock {
    pub name: String,
    pub index: u32,
    /// Size of the block's backing storage in bytes.
    pub data_size: u32,
}

/// A transform-feedback output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawVarying {
    pub name: String,
    pub type_code: u32,
    pub array_length: u32,
}

/// A subroutine function available in one stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSubroutine {
    pub name: String,
    pub index: u32,
    pub stage: ShaderStage,
}

/// Everything a backend reports about a linked program.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawProgramInfo {
    pub attributes: Vec<RawResource>,
    pub uniforms: Vec<RawResource>,
    pub uniform_blocks: Vec<RawUniformBlock>,
    pub varyings: Vec<RawVarying>,
    pub subroutines: Vec<RawSubroutine>,
}

// ============================================================================
// Vertex bindings and draws
// ============================================================================

/// How an attribute location reads its data.
///
/// The three modes map to distinct native entry points and are never
/// interchangeable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeMode {
    /// Converted to float in the shader (optionally normalized).
    Float,
    /// 64-bit floats passed through unchanged.
    Double,
    /// Signed or unsigned integers passed through unchanged.
    Integer,
}

/// One enabled attribute location of a vertex binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttributeBinding {
    pub location: u32,
    pub buffer: Handle,
    /// Number of components read at this location (1..=4).
    pub components: u32,
    pub component_type: ComponentType,
    pub normalize: bool,
    pub stride: u32,
    pub offset: u32,
    pub divisor: u32,
    pub mode: AttributeMode,
}

/// Width of the elements in an index buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexFormat {
    U8,
    U16,
    U32,
}

impl IndexFormat {
    /// Map an element size in bytes to a format. Only 1, 2 and 4 are valid.
    pub fn from_element_size(size: u32) -> Option<Self> {
        match size {
            1 => Some(Self::U8),
            2 => Some(Self::U16),
            4 => Some(Self::U32),
            _ => None,
        }
    }

    /// Element size in bytes.
    pub fn size(self) -> u32 {
        match self {
            Self::U8 => 1,
            Self::U16 => 2,
            Self::U32 => 4,
        }
    }
}

/// Fully resolved description of a device-level vertex binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexBindingSpec {
    pub program: Handle,
    pub attributes: Vec<AttributeBinding>,
    pub index: Option<(Handle, IndexFormat)>,
}

/// A single draw against a vertex binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DrawCall {
    pub binding: Handle,
    pub mode: DrawMode,
    pub count: u32,
    /// First vertex, or first index element for indexed bindings.
    pub first: u32,
    pub instances: u32,
}

/// Attachments of a framebuffer at the backend level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FramebufferSpec {
    pub color: Vec<Handle>,
    pub depth: Option<Handle>,
    pub width: u32,
    pub height: u32,
}

// ============================================================================
// Backend trait
// ============================================================================

/// GPU backend trait for abstracting different graphics APIs.
pub trait GpuBackend: Send + Sync + 'static {
    /// Get the backend name.
    fn name(&self) -> &'static str;

    /// Allocate a buffer, optionally filled with initial contents.
    fn create_buffer(
        &self,
        descriptor: &BufferDescriptor,
        data: Option<&[u8]>,
    ) -> Result<Handle, BackendError>;

    /// Write bytes into a buffer at `offset`.
    fn write_buffer(&self, buffer: Handle, offset: u64, data: &[u8]) -> Result<(), BackendError>;

    /// Read `size` bytes from a buffer at `offset`.
    fn read_buffer(&self, buffer: Handle, offset: u64, size: u64)
        -> Result<Vec<u8>, BackendError>;

    /// Replace a buffer's storage with `size` fresh bytes.
    fn orphan_buffer(&self, buffer: Handle, size: u64) -> Result<(), BackendError>;

    /// Compile and link a program and report its active resources.
    fn create_program(
        &self,
        descriptor: &ProgramDescriptor,
    ) -> Result<(Handle, RawProgramInfo), BackendError>;

    /// Allocate a texture, optionally filled with pixel data.
    fn create_texture(
        &self,
        descriptor: &TextureDescriptor,
        data: Option<&[u8]>,
    ) -> Result<Handle, BackendError>;

    /// Create a framebuffer from existing texture handles.
    fn create_framebuffer(&self, spec: &FramebufferSpec) -> Result<Handle, BackendError>;

    /// Build a native vertex binding object.
    fn create_vertex_binding(&self, spec: &VertexBindingSpec) -> Result<Handle, BackendError>;

    /// Issue a draw.
    fn draw(&self, call: &DrawCall) -> Result<(), BackendError>;

    /// Destroy a device object.
    fn release(&self, kind: ResourceKind, handle: Handle) -> Result<(), BackendError>;

    /// Make a program current, or unbind with `None`.
    fn use_program(&self, program: Option<Handle>) -> Result<(), BackendError>;

    /// Upload uniform data to a program location.
    fn set_uniform(&self, program: Handle, location: i32, data: &[u8]) -> Result<(), BackendError>;

    /// Bind a framebuffer, `None` selects the default target.
    fn bind_framebuffer(&self, framebuffer: Option<Handle>) -> Result<(), BackendError>;

    /// Bind a texture to a sampler slot, `None` unbinds the slot.
    fn bind_texture(&self, slot: u32, texture: Option<Handle>) -> Result<(), BackendError>;

    /// Apply the complete set of enabled capabilities.
    fn set_enabled(&self, flags: EnableFlags) -> Result<(), BackendError>;

    /// Set the blend factors.
    fn set_blend_func(&self, func: BlendFunc) -> Result<(), BackendError>;

    /// Set the blend equations.
    fn set_blend_equation(&self, equation: BlendEquation) -> Result<(), BackendError>;

    /// Clear the bound target.
    fn clear(&self, color: glam::Vec4, depth: f32) -> Result<(), BackendError>;
}
