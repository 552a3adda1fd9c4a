//! # Lattice Graphics
//!
//! A GPU abstraction layer: typed device resources, shader reflection,
//! vertex binding and a batching render-command queue.
//!
//! ## Overview
//!
//! This crate provides:
//! - [`GraphicsDevice`] - Creates and tracks device objects and binding state
//! - [`vertex::BufferLayout`] - The buffer layout mini-language
//! - [`reflect`] - Typed attribute, uniform and varying tables of a program
//! - [`vertex::VertexBinder`] - Matches buffers against program attributes
//! - [`render::RenderScript`] - Recorded commands with automatic draw batching
//! - [`backend::headless::HeadlessBackend`] - A recording backend for tests and tools
//!
//! ## Example
//!
//! ```ignore
//! use lattice_graphics::{GraphicsDevice, ProgramDescriptor, ShaderSource};
//! use lattice_graphics::render::{DrawRequest, RenderContext, RenderScript};
//! use lattice_graphics::vertex::VertexSource;
//!
//! let (device, _backend) = GraphicsDevice::headless()?;
//! let program = device.create_program(&ProgramDescriptor::from_source(&ShaderSource::parse(SOURCE)?, &[]))?;
//! let vertices = device.create_buffer_with_data(bytemuck::cast_slice(&positions), false)?;
//! let mesh = Arc::new(VertexSource::single(vertices, "3f", ["in_vert"])?);
//!
//! let mut script = RenderScript::new();
//! script.enable_shader(program.clone());
//! script.draw(DrawRequest::new(mesh.clone(), DrawMode::Triangles));
//! script.execute(&mut RenderContext::new(device.clone()))?;
//! ```

pub mod backend;
pub mod config;
pub mod device;
pub mod error;
pub mod profiling;
pub mod reflect;
pub mod render;
pub mod resources;
pub mod shader;
pub mod types;
pub mod vertex;

// Re-export main types for convenience
pub use backend::{BackendError, GpuBackend, Handle, ResourceKind};
pub use config::{DeviceCapabilities, DeviceConfig};
pub use device::GraphicsDevice;
pub use error::{ErrorCategory, GraphicsError};
pub use resources::{Buffer, Framebuffer, Program, Texture};
pub use shader::{ProgramDescriptor, ShaderComposer, ShaderDef, ShaderSource, ShaderStage};
pub use types::{
    BlendEquation, BlendEquationMode, BlendFactor, BlendFunc, BufferDescriptor, DrawMode,
    EnableFlags, FramebufferDescriptor, TextureDescriptor, TextureFormat,
};

/// Graphics library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the graphics subsystem.
///
/// Only announces the crate on the `log` facade; devices are created
/// explicitly.
pub fn init() {
    log::info!("Lattice Graphics v{} initialized", VERSION);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_headless_device() {
        let (device, backend) = GraphicsDevice::headless().unwrap();
        assert_eq!(backend.name(), "Headless Backend");
        assert_eq!(device.live_resources(), 0);
    }
}
