//! GPU texture resource.

use std::sync::Arc;

use super::DeviceObject;
use crate::backend::Handle;
use crate::device::GraphicsDevice;
use crate::error::GraphicsError;
use crate::types::{TextureDescriptor, TextureFormat};

/// A GPU texture resource.
///
/// Textures are created by [`GraphicsDevice::create_texture`] and are
/// reference-counted. Framebuffers keep their attachments alive through
/// these `Arc`s.
///
/// # Example
///
/// ```ignore
/// let texture = device.create_texture(
///     &TextureDescriptor::new_2d(256, 256, TextureFormat::Rgba8Unorm),
///     Some(&pixels),
/// )?;
/// texture.use_slot(0)?;
/// ```
pub struct Texture {
    object: DeviceObject,
    descriptor: TextureDescriptor,
}

impl Texture {
    pub(crate) fn new(object: DeviceObject, descriptor: TextureDescriptor) -> Self {
        Self { object, descriptor }
    }

    pub fn handle(&self) -> Handle {
        self.object.handle()
    }

    pub(crate) fn live_handle(&self) -> Result<Handle, GraphicsError> {
        self.object.live_handle()
    }

    /// Get the parent device, if the texture is still usable.
    pub fn device(&self) -> Result<Arc<GraphicsDevice>, GraphicsError> {
        self.object.device()
    }

    /// Get the texture descriptor.
    pub fn descriptor(&self) -> &TextureDescriptor {
        &self.descriptor
    }

    pub fn width(&self) -> u32 {
        self.descriptor.width
    }

    pub fn height(&self) -> u32 {
        self.descriptor.height
    }

    pub fn format(&self) -> TextureFormat {
        self.descriptor.format
    }

    pub fn samples(&self) -> u32 {
        self.descriptor.samples
    }

    /// Get the texture label, if set.
    pub fn label(&self) -> Option<&str> {
        self.descriptor.label.as_deref()
    }

    pub fn is_released(&self) -> bool {
        self.object.is_released()
    }

    /// Bind the texture to a sampler slot.
    pub fn use_slot(&self, slot: u32) -> Result<(), GraphicsError> {
        self.object.device()?.bind_texture(slot, Some(self))
    }

    /// Destroy the device texture.
    pub fn release(&self) -> Result<(), GraphicsError> {
        self.object.release()
    }
}

impl std::fmt::Debug for Texture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Texture")
            .field("handle", &self.handle())
            .field("width", &self.descriptor.width)
            .field("height", &self.descriptor.height)
            .field("format", &self.descriptor.format)
            .field("label", &self.descriptor.label)
            .finish()
    }
}

// Ensure Texture is Send + Sync
static_assertions::assert_impl_all!(Texture: Send, Sync);

#[cfg(test)]
mod tests {
    use crate::backend::headless::DeviceCall;
    use crate::error::GraphicsError;
    use crate::types::{TextureDescriptor, TextureFormat};
    use crate::GraphicsDevice;

    #[test]
    fn test_texture_debug() {
        let (device, _backend) = GraphicsDevice::headless().unwrap();
        let texture = device
            .create_texture(&TextureDescriptor::new_2d(1920, 1080, TextureFormat::Rgba8Unorm), None)
            .unwrap();
        let debug = format!("{:?}", texture);
        assert!(debug.contains("Texture"));
        assert!(debug.contains("1920"));
    }

    #[test]
    fn test_pixel_data_size() {
        let (device, _backend) = GraphicsDevice::headless().unwrap();
        let desc = TextureDescriptor::new_2d(2, 2, TextureFormat::Rgba8Unorm);
        assert!(device.create_texture(&desc, Some(&[0u8; 16])).is_ok());
        assert!(matches!(
            device.create_texture(&desc, Some(&[0u8; 12])),
            Err(GraphicsError::Backend(_))
        ));
    }

    #[test]
    fn test_use_slot() {
        let (device, backend) = GraphicsDevice::headless().unwrap();
        let texture = device
            .create_texture(&TextureDescriptor::new_2d(4, 4, TextureFormat::R8Unorm), None)
            .unwrap();
        texture.use_slot(3).unwrap();
        assert_eq!(
            backend.calls().last(),
            Some(&DeviceCall::BindTexture {
                slot: 3,
                texture: Some(texture.handle())
            })
        );

        texture.release().unwrap();
        assert!(matches!(
            texture.use_slot(0),
            Err(GraphicsError::Released { .. })
        ));
    }
}
