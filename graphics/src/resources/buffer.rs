//! GPU buffer resource.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytemuck::Pod;

use super::DeviceObject;
use crate::backend::Handle;
use crate::device::GraphicsDevice;
use crate::error::GraphicsError;
use crate::types::BufferDescriptor;

/// A GPU buffer resource.
///
/// Buffers are created by [`GraphicsDevice::create_buffer`] and are reference-counted.
/// They hold a weak reference back to their parent device.
///
/// Resizing orphans the storage and bumps [`Buffer::generation`], which
/// cached vertex bindings compare against to notice the change.
///
/// # Example
///
/// ```ignore
/// let buffer = device.create_buffer(&BufferDescriptor::new(1024).with_dynamic(true), None)?;
/// buffer.write_pod(0, &[0.0f32, 1.0, 2.0])?;
/// ```
pub struct Buffer {
    object: DeviceObject,
    label: Option<String>,
    dynamic: bool,
    size: AtomicU64,
    generation: AtomicU64,
}

impl Buffer {
    pub(crate) fn new(object: DeviceObject, descriptor: &BufferDescriptor) -> Self {
        Self {
            object,
            label: descriptor.label.clone(),
            dynamic: descriptor.dynamic,
            size: AtomicU64::new(descriptor.size),
            generation: AtomicU64::new(0),
        }
    }

    pub fn handle(&self) -> Handle {
        self.object.handle()
    }

    pub(crate) fn live_handle(&self) -> Result<Handle, GraphicsError> {
        self.object.live_handle()
    }

    /// Get the parent device, if the buffer is still usable.
    pub fn device(&self) -> Result<Arc<GraphicsDevice>, GraphicsError> {
        self.object.device()
    }

    /// Get the buffer size in bytes.
    pub fn size(&self) -> u64 {
        self.size.load(Ordering::Acquire)
    }

    /// Number of times the storage has been replaced.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Get the buffer label, if set.
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn is_dynamic(&self) -> bool {
        self.dynamic
    }

    pub fn is_released(&self) -> bool {
        self.object.is_released()
    }

    fn check_range(&self, offset: u64, len: u64) -> Result<(), GraphicsError> {
        let size = self.size();
        match offset.checked_add(len) {
            Some(end) if end <= size => Ok(()),
            _ => Err(GraphicsError::InvalidParameter(format!(
                "range {offset}..{} is outside buffer of {size} bytes",
                offset.saturating_add(len)
            ))),
        }
    }

    /// Write raw bytes at `offset`.
    pub fn write(&self, offset: u64, data: &[u8]) -> Result<(), GraphicsError> {
        let device = self.object.device()?;
        self.check_range(offset, data.len() as u64)?;
        device.backend().write_buffer(self.handle(), offset, data)?;
        Ok(())
    }

    /// Write a slice of plain-old-data values at `offset`.
    pub fn write_pod<T: Pod>(&self, offset: u64, data: &[T]) -> Result<(), GraphicsError> {
        self.write(offset, bytemuck::cast_slice(data))
    }

    /// Read `len` bytes starting at `offset`.
    pub fn read(&self, offset: u64, len: u64) -> Result<Vec<u8>, GraphicsError> {
        let device = self.object.device()?;
        self.check_range(offset, len)?;
        Ok(device.backend().read_buffer(self.handle(), offset, len)?)
    }

    /// Replace the storage with `new_size` zeroed bytes.
    pub fn resize(&self, new_size: u64) -> Result<(), GraphicsError> {
        let device = self.object.device()?;
        if new_size == 0 || new_size > device.capabilities().max_buffer_size {
            return Err(GraphicsError::InvalidParameter(format!(
                "buffer size {new_size} is outside 1..={}",
                device.capabilities().max_buffer_size
            )));
        }
        device.backend().orphan_buffer(self.handle(), new_size)?;
        self.size.store(new_size, Ordering::Release);
        self.generation.fetch_add(1, Ordering::AcqRel);
        log::debug!(
            "Buffer: {} resized to {new_size} bytes (generation {})",
            self.handle(),
            self.generation()
        );
        Ok(())
    }

    /// Destroy the device storage.
    pub fn release(&self) -> Result<(), GraphicsError> {
        self.object.release()
    }
}

impl std::fmt::Debug for Buffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Buffer")
            .field("handle", &self.handle())
            .field("size", &self.size())
            .field("dynamic", &self.dynamic)
            .field("label", &self.label)
            .finish()
    }
}

// Ensure Buffer is Send + Sync
static_assertions::assert_impl_all!(Buffer: Send, Sync);
