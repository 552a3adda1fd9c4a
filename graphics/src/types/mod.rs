//! Common types and descriptors for graphics resources.
//!
//! This module contains descriptor structs used to create device objects and
//! the enums and flags that make up the device's fixed-function state.

mod buffer;
mod framebuffer;
mod state;
mod texture;

pub use buffer::BufferDescriptor;
pub use framebuffer::FramebufferDescriptor;
pub use state::{BlendEquation, BlendEquationMode, BlendFactor, BlendFunc, DrawMode, EnableFlags};
pub use texture::{TextureDescriptor, TextureFormat};
