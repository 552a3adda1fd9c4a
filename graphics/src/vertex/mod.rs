//! Vertex data description and binding.
//!
//! - [`BufferLayout`] parses the layout mini-language describing one record
//!   of a vertex buffer.
//! - [`VertexBinder`] matches buffers and layouts against a program's
//!   reflected attributes and creates a [`VertexBinding`].
//! - [`VertexSource`] owns a set of buffers and caches one binding per
//!   program, which is what render commands and batches draw from.

mod binder;
mod binding;
mod layout;
mod source;

pub use binder::{AttributeTarget, IndexSource, ResolvedBinding, VertexBinder, VertexBufferBinding};
pub use binding::VertexBinding;
pub use layout::{BufferLayout, ComponentType, Divisor, ElementKind, LayoutElement};
pub use source::VertexSource;
