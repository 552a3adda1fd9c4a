//! Graphics error types.

use thiserror::Error;

use crate::backend::{BackendError, Handle, ResourceKind};

/// Broad class of a [`GraphicsError`].
///
/// Validation and reflection errors are raised before any device state is
/// touched. State-usage errors are programming mistakes. Device errors come
/// straight from the backend and are never retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Structural problem with the caller's inputs.
    Validation,
    /// The program uses a construct the type tables do not know.
    Reflection,
    /// A resource or the render state was used incorrectly.
    StateUsage,
    /// The backend call itself failed.
    Device,
}

/// Errors that can occur in the graphics system.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphicsError {
    /// A layout string could not be parsed.
    #[error("malformed layout \"{layout}\": {reason}")]
    MalformedLayout { layout: String, reason: String },

    /// A buffer's attribute list does not match its layout.
    #[error("vertex buffer {buffer}: layout has {elements} attribute elements but {attributes} names were given")]
    LayoutMismatch {
        buffer: usize,
        elements: usize,
        attributes: usize,
    },

    /// A buffer was supplied without any attribute names.
    #[error("vertex buffer {buffer}: attribute list must not be empty")]
    EmptyAttributeList { buffer: usize },

    /// A named attribute is not part of the program.
    #[error("vertex buffer {buffer}: program has no attribute named \"{name}\"")]
    UnknownAttribute { buffer: usize, name: String },

    /// The same attribute is supplied by more than one buffer element.
    #[error("attribute \"{name}\" is supplied more than once")]
    DuplicateAttribute { name: String },

    /// A program attribute is not supplied by any buffer.
    #[error("missing buffer mapping for attribute \"{name}\"")]
    MissingBufferMapping { name: String },

    /// A layout element cannot be split across the rows of its attribute.
    #[error("attribute \"{name}\": {components} components cannot be split across {rows} locations")]
    AttributeShapeMismatch {
        name: String,
        components: u32,
        rows: u32,
    },

    /// Index elements must be 1, 2 or 4 bytes wide.
    #[error("index element size must be 1, 2 or 4 bytes, got {0}")]
    InvalidIndexElementSize(u32),

    /// The program has no uniform with this name.
    #[error("program has no uniform named \"{0}\"")]
    UnknownUniform(String),

    /// Uniform data does not fit the reflected uniform.
    #[error("uniform \"{name}\": expected a multiple of {element_size} bytes up to {max_size}, got {actual}")]
    UniformSizeMismatch {
        name: String,
        element_size: usize,
        max_size: usize,
        actual: usize,
    },

    /// A shader source could not be prepared.
    #[error("shader source error: {0}")]
    ShaderSource(String),

    /// An invalid parameter was provided.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// An introspected resource has a type code outside the lookup tables.
    #[error("reflection error: \"{name}\" has unsupported type code {code:#06x}")]
    UnknownTypeCode { name: String, code: u32 },

    /// Two attributes claim overlapping locations.
    #[error("reflection error: attribute \"{name}\" overlaps location {location}")]
    LocationConflict { name: String, location: u32 },

    /// The resource was already released.
    #[error("{kind} {handle} has been released")]
    Released { kind: ResourceKind, handle: Handle },

    /// A second release of the same resource.
    #[error("{kind} {handle} released twice")]
    AlreadyReleased { kind: ResourceKind, handle: Handle },

    /// The device does not know this handle.
    #[error("{kind} {handle} is not a live device object")]
    UnknownHandle { kind: ResourceKind, handle: Handle },

    /// A draw was recorded while no shader was enabled.
    #[error("draw issued with no shader enabled")]
    NoShaderEnabled,

    /// A draw with an implicit count on a binding that cannot derive one.
    #[error("cannot detect the number of vertices")]
    UndetectableVertexCount,

    /// The backend reported a failure.
    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl GraphicsError {
    /// The broad class this error belongs to.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::MalformedLayout { .. }
            | Self::LayoutMismatch { .. }
            | Self::EmptyAttributeList { .. }
            | Self::UnknownAttribute { .. }
            | Self::DuplicateAttribute { .. }
            | Self::MissingBufferMapping { .. }
            | Self::AttributeShapeMismatch { .. }
            | Self::InvalidIndexElementSize(_)
            | Self::UnknownUniform(_)
            | Self::UniformSizeMismatch { .. }
            | Self::ShaderSource(_)
            | Self::InvalidParameter(_) => ErrorCategory::Validation,
            Self::UnknownTypeCode { .. } | Self::LocationConflict { .. } => {
                ErrorCategory::Reflection
            }
            Self::Released { .. }
            | Self::AlreadyReleased { .. }
            | Self::UnknownHandle { .. }
            | Self::NoShaderEnabled
            | Self::UndetectableVertexCount => ErrorCategory::StateUsage,
            Self::Backend(_) => ErrorCategory::Device,
        }
    }

    pub(crate) fn malformed(layout: &str, reason: impl Into<String>) -> Self {
        Self::MalformedLayout {
            layout: layout.to_string(),
            reason: reason.into(),
        }
    }
}
