//! GPU resources.
//!
//! This module contains the GPU resource types that are created by [`GraphicsDevice`]:
//! - [`Buffer`] - GPU memory buffer
//! - [`Program`] - Linked shader program with its reflection tables
//! - [`Texture`] - 2D texture
//! - [`Framebuffer`] - Render target built from textures
//!
//! Resources are reference-counted with [`Arc`] and hold a weak reference
//! back to their parent device. Device storage is freed only by an explicit
//! `release()`, never on drop. Once released, every other operation on the
//! resource fails with [`GraphicsError::Released`].
//!
//! [`GraphicsDevice`]: crate::GraphicsDevice
//! [`Arc`]: std::sync::Arc

mod buffer;
mod framebuffer;
mod program;
mod texture;

pub use buffer::Buffer;
pub use framebuffer::Framebuffer;
pub use program::Program;
pub use texture::Texture;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use crate::backend::{Handle, ResourceKind};
use crate::device::GraphicsDevice;
use crate::error::GraphicsError;

/// Handle, owning device and release flag shared by every resource type.
pub(crate) struct DeviceObject {
    device: Weak<GraphicsDevice>,
    kind: ResourceKind,
    handle: Handle,
    released: AtomicBool,
}

impl DeviceObject {
    pub(crate) fn new(device: &Arc<GraphicsDevice>, kind: ResourceKind, handle: Handle) -> Self {
        Self {
            device: Arc::downgrade(device),
            kind,
            handle,
            released: AtomicBool::new(false),
        }
    }

    pub(crate) fn handle(&self) -> Handle {
        self.handle
    }

    pub(crate) fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    fn released_error(&self) -> GraphicsError {
        GraphicsError::Released {
            kind: self.kind,
            handle: self.handle,
        }
    }

    /// The handle, if the object has not been released.
    pub(crate) fn live_handle(&self) -> Result<Handle, GraphicsError> {
        if self.is_released() {
            return Err(self.released_error());
        }
        Ok(self.handle)
    }

    /// The owning device, if the object is still usable.
    pub(crate) fn device(&self) -> Result<Arc<GraphicsDevice>, GraphicsError> {
        if self.is_released() {
            return Err(self.released_error());
        }
        self.device.upgrade().ok_or_else(|| self.released_error())
    }

    /// Destroy the device object. Fails on a second call.
    ///
    /// When the device call fails the object stays live and the release can
    /// be retried.
    pub(crate) fn release(&self) -> Result<(), GraphicsError> {
        if self
            .released
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(GraphicsError::AlreadyReleased {
                kind: self.kind,
                handle: self.handle,
            });
        }
        match self.device.upgrade() {
            Some(device) => {
                let result = device.release(self.kind, self.handle);
                if result.is_err() {
                    self.released.store(false, Ordering::Release);
                }
                result
            }
            None => {
                log::warn!(
                    "{} {} released after its device was dropped",
                    self.kind,
                    self.handle
                );
                Ok(())
            }
        }
    }
}

impl std::fmt::Debug for DeviceObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceObject")
            .field("kind", &self.kind)
            .field("handle", &self.handle)
            .field("released", &self.is_released())
            .finish()
    }
}
