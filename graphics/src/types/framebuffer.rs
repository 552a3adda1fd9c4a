//! Framebuffer descriptors.

use std::sync::Arc;

use crate::resources::Texture;

/// Descriptor for creating a framebuffer from existing textures.
///
/// All attachments must share the same size. Depth textures can only be
/// used as the depth attachment.
#[derive(Debug, Clone, Default)]
pub struct FramebufferDescriptor {
    /// Debug label for the framebuffer.
    pub label: Option<String>,
    pub color_attachments: Vec<Arc<Texture>>,
    pub depth_attachment: Option<Arc<Texture>>,
}

impl FramebufferDescriptor {
    /// Create an empty descriptor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a color attachment.
    pub fn with_color(mut self, texture: Arc<Texture>) -> Self {
        self.color_attachments.push(texture);
        self
    }

    /// Set the depth attachment.
    pub fn with_depth(mut self, texture: Arc<Texture>) -> Self {
        self.depth_attachment = Some(texture);
        self
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}
