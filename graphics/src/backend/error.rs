//! Backend error types.

use thiserror::Error;

use super::Handle;

/// Errors that can occur in backend operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// Failed to create a resource.
    #[error("resource creation failed: {0}")]
    ResourceCreationFailed(String),
    /// A shader stage failed to compile or the program failed to link.
    #[error("program compilation failed: {0}")]
    CompilationFailed(String),
    /// The backend does not recognise the handle.
    #[error("invalid handle {0}")]
    InvalidHandle(Handle),
    /// Out of GPU memory.
    #[error("out of GPU memory")]
    OutOfMemory,
    /// The device was lost.
    #[error("GPU device lost")]
    DeviceLost,
    /// Internal backend error.
    #[error("internal backend error: {0}")]
    Internal(String),
}
