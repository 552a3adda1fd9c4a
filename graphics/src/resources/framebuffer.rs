//! Framebuffer resource.

use std::sync::Arc;

use super::{DeviceObject, Texture};
use crate::backend::Handle;
use crate::device::GraphicsDevice;
use crate::error::GraphicsError;
use crate::types::FramebufferDescriptor;

/// A render target built from textures.
///
/// The framebuffer keeps its attachments alive. Releasing the framebuffer
/// does not release them.
pub struct Framebuffer {
    object: DeviceObject,
    label: Option<String>,
    color_attachments: Vec<Arc<Texture>>,
    depth_attachment: Option<Arc<Texture>>,
    width: u32,
    height: u32,
}

impl Framebuffer {
    pub(crate) fn new(
        object: DeviceObject,
        descriptor: FramebufferDescriptor,
        width: u32,
        height: u32,
    ) -> Self {
        Self {
            object,
            label: descriptor.label,
            color_attachments: descriptor.color_attachments,
            depth_attachment: descriptor.depth_attachment,
            width,
            height,
        }
    }

    pub fn handle(&self) -> Handle {
        self.object.handle()
    }

    pub(crate) fn live_handle(&self) -> Result<Handle, GraphicsError> {
        self.object.live_handle()
    }

    pub fn device(&self) -> Result<Arc<GraphicsDevice>, GraphicsError> {
        self.object.device()
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Width and height shared by all attachments.
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn color_attachments(&self) -> &[Arc<Texture>] {
        &self.color_attachments
    }

    pub fn depth_attachment(&self) -> Option<&Arc<Texture>> {
        self.depth_attachment.as_ref()
    }

    pub fn is_released(&self) -> bool {
        self.object.is_released()
    }

    /// Make this framebuffer the render target.
    pub fn use_target(&self) -> Result<(), GraphicsError> {
        self.object.device()?.bind_framebuffer(Some(self))
    }

    /// Destroy the device framebuffer.
    pub fn release(&self) -> Result<(), GraphicsError> {
        self.object.release()
    }
}

impl std::fmt::Debug for Framebuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Framebuffer")
            .field("handle", &self.handle())
            .field("size", &self.size())
            .field("color_attachments", &self.color_attachments.len())
            .field("depth", &self.depth_attachment.is_some())
            .field("label", &self.label)
            .finish()
    }
}

// Ensure Framebuffer is Send + Sync
static_assertions::assert_impl_all!(Framebuffer: Send, Sync);

#[cfg(test)]
mod tests {
    use crate::types::{FramebufferDescriptor, TextureDescriptor, TextureFormat};
    use crate::GraphicsDevice;

    #[test]
    fn test_use_target() {
        let (device, _backend) = GraphicsDevice::headless().unwrap();
        let color = device
            .create_texture(&TextureDescriptor::new_2d(16, 16, TextureFormat::Rgba8Unorm), None)
            .unwrap();
        let framebuffer = device
            .create_framebuffer(&FramebufferDescriptor::new().with_color(color.clone()))
            .unwrap();

        framebuffer.use_target().unwrap();
        assert_eq!(device.bound_framebuffer(), Some(framebuffer.handle()));

        framebuffer.release().unwrap();
        assert_eq!(device.bound_framebuffer(), None);
        assert!(!color.is_released());
        assert!(framebuffer.use_target().is_err());
    }
}
