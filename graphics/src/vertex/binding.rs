//! Device-side vertex binding.

use std::sync::{Arc, Weak};

use crate::backend::{AttributeBinding, DrawCall, Handle, IndexFormat, ResourceKind};
use crate::error::GraphicsError;
use crate::resources::{Buffer, DeviceObject, Program};
use crate::types::DrawMode;

use super::ResolvedBinding;

/// A program's attribute locations bound to vertex buffers.
///
/// Created by [`super::VertexBinder::bind`]. The binding remembers the
/// vertex and instance counts derived from its buffers, which `render` uses
/// when the caller passes zero.
pub struct VertexBinding {
    object: DeviceObject,
    program: Weak<Program>,
    program_handle: Handle,
    buffers: Vec<(Handle, Weak<Buffer>)>,
    attributes: Vec<AttributeBinding>,
    index: Option<(Handle, IndexFormat)>,
    vertex_count: Option<u32>,
    instance_count: u32,
}

impl VertexBinding {
    pub(crate) fn new<'a>(
        object: DeviceObject,
        program: &Arc<Program>,
        buffers: impl IntoIterator<Item = &'a Arc<Buffer>>,
        resolved: ResolvedBinding,
    ) -> Self {
        Self {
            object,
            program: Arc::downgrade(program),
            program_handle: resolved.spec.program,
            buffers: buffers
                .into_iter()
                .map(|buffer| (buffer.handle(), Arc::downgrade(buffer)))
                .collect(),
            attributes: resolved.spec.attributes,
            index: resolved.spec.index,
            vertex_count: resolved.vertex_count,
            instance_count: resolved.instance_count,
        }
    }

    pub fn handle(&self) -> Handle {
        self.object.handle()
    }

    /// Handle of the program this binding was built for.
    pub fn program_handle(&self) -> Handle {
        self.program_handle
    }

    /// The program, if it is still alive and not released.
    pub fn program(&self) -> Option<Arc<Program>> {
        self.program.upgrade().filter(|p| !p.is_released())
    }

    pub fn attributes(&self) -> &[AttributeBinding] {
        &self.attributes
    }

    pub fn is_indexed(&self) -> bool {
        self.index.is_some()
    }

    pub fn index_format(&self) -> Option<IndexFormat> {
        self.index.map(|(_, format)| format)
    }

    /// Vertex count derived from the buffers, or the index count when indexed.
    pub fn vertex_count(&self) -> Option<u32> {
        self.vertex_count
    }

    /// Instance count derived from per-instance buffers (1 without any).
    pub fn instance_count(&self) -> u32 {
        self.instance_count
    }

    pub fn is_released(&self) -> bool {
        self.object.is_released()
    }

    /// Fails if any vertex or index buffer was released or dropped.
    pub fn check_buffers(&self) -> Result<(), GraphicsError> {
        for (handle, buffer) in &self.buffers {
            let released = GraphicsError::Released {
                kind: ResourceKind::Buffer,
                handle: *handle,
            };
            buffer.upgrade().ok_or(released)?.live_handle()?;
        }
        Ok(())
    }

    /// Issue a draw.
    ///
    /// A zero `count` draws the derived vertex count and zero `instances`
    /// draws the derived instance count.
    ///
    /// # Errors
    ///
    /// - [`GraphicsError::UndetectableVertexCount`] if `count` is zero and no
    ///   buffer determines the vertex count.
    /// - [`GraphicsError::Released`] if the binding, its program or one of its
    ///   buffers was released.
    pub fn render(
        &self,
        mode: DrawMode,
        count: u32,
        first: u32,
        instances: u32,
    ) -> Result<(), GraphicsError> {
        let device = self.object.device()?;
        if self.program().is_none() {
            return Err(GraphicsError::Released {
                kind: ResourceKind::Program,
                handle: self.program_handle,
            });
        }
        self.check_buffers()?;

        let count = match count {
            0 => self
                .vertex_count
                .ok_or(GraphicsError::UndetectableVertexCount)?,
            count => count,
        };
        let instances = match instances {
            0 => self.instance_count,
            instances => instances,
        };

        device.draw(&DrawCall {
            binding: self.handle(),
            mode,
            count,
            first,
            instances,
        })
    }

    /// Destroy the device object. Buffers and program are untouched.
    pub fn release(&self) -> Result<(), GraphicsError> {
        self.object.release()
    }
}

impl std::fmt::Debug for VertexBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VertexBinding")
            .field("handle", &self.handle())
            .field("program", &self.program_handle)
            .field("locations", &self.attributes.len())
            .field("indexed", &self.is_indexed())
            .field("vertex_count", &self.vertex_count)
            .field("instance_count", &self.instance_count)
            .finish()
    }
}

// Ensure VertexBinding is Send + Sync
static_assertions::assert_impl_all!(VertexBinding: Send, Sync);

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::backend::headless::HeadlessBackend;
    use crate::backend::{DrawCall, ResourceKind};
    use crate::error::GraphicsError;
    use crate::resources::Program;
    use crate::shader::{ProgramDescriptor, ShaderStage};
    use crate::types::DrawMode;
    use crate::vertex::{IndexSource, VertexBinder, VertexBufferBinding};
    use crate::GraphicsDevice;

    const VERTEX: &str = "#version 330
in vec2 vert;
in vec2 offset;
void main() { gl_Position = vec4(vert + offset, 0.0, 1.0); }";

    fn setup() -> (Arc<GraphicsDevice>, Arc<HeadlessBackend>, Arc<Program>) {
        let (device, backend) = GraphicsDevice::headless().unwrap();
        let program = device
            .create_program(&ProgramDescriptor::new().with_stage(ShaderStage::Vertex, VERTEX))
            .unwrap();
        (device, backend, program)
    }

    #[test]
    fn test_render_derived_counts() {
        let (device, backend, program) = setup();
        let vertices = device.create_buffer_with_data(&[0u8; 8 * 6], false).unwrap();
        let offsets = device.create_buffer_with_data(&[0u8; 8 * 3], false).unwrap();
        let binding = VertexBinder::bind(
            &program,
            &[
                VertexBufferBinding::new(vertices, "2f", ["vert"]).unwrap(),
                VertexBufferBinding::new(offsets, "2f/i", ["offset"]).unwrap(),
            ],
            None,
        )
        .unwrap();

        binding.render(DrawMode::Triangles, 0, 0, 0).unwrap();
        binding.render(DrawMode::Points, 2, 1, 5).unwrap();

        assert_eq!(
            backend.draw_calls(),
            vec![
                DrawCall {
                    binding: binding.handle(),
                    mode: DrawMode::Triangles,
                    count: 6,
                    first: 0,
                    instances: 3
                },
                DrawCall {
                    binding: binding.handle(),
                    mode: DrawMode::Points,
                    count: 2,
                    first: 1,
                    instances: 5
                },
            ]
        );
    }

    #[test]
    fn test_undetectable_count() {
        let (device, _backend, program) = setup();
        let buffer = device.create_buffer_with_data(&[0u8; 16], false).unwrap();
        let binding = VertexBinder::bind(
            &program,
            &[VertexBufferBinding::new(buffer, "2f 2f/r", ["vert", "offset"]).unwrap()],
            None,
        )
        .unwrap();
        assert_eq!(binding.vertex_count(), None);
        assert_eq!(
            binding.render(DrawMode::Triangles, 0, 0, 1),
            Err(GraphicsError::UndetectableVertexCount)
        );
        assert!(binding.render(DrawMode::Triangles, 3, 0, 1).is_ok());
    }

    #[test]
    fn test_indexed_count() {
        let (device, backend, program) = setup();
        let buffer = device.create_buffer_with_data(&[0u8; 64], false).unwrap();
        let index = device.create_buffer_with_data(&[0u8; 12], false).unwrap();
        let binding = VertexBinder::bind(
            &program,
            &[VertexBufferBinding::new(buffer, "2f 2f", ["vert", "offset"]).unwrap()],
            Some(&IndexSource::new(index, 2)),
        )
        .unwrap();
        assert!(binding.is_indexed());
        binding.render(DrawMode::Triangles, 0, 0, 0).unwrap();
        assert_eq!(backend.draw_calls()[0].count, 6);
    }

    #[test]
    fn test_released_program() {
        let (device, _backend, program) = setup();
        let buffer = device.create_buffer_with_data(&[0u8; 16], false).unwrap();
        let binding = VertexBinder::bind(
            &program,
            &[VertexBufferBinding::new(buffer, "2f 2f", ["vert", "offset"]).unwrap()],
            None,
        )
        .unwrap();
        program.release().unwrap();
        assert!(matches!(
            binding.render(DrawMode::Triangles, 0, 0, 0),
            Err(GraphicsError::Released { .. })
        ));

        binding.release().unwrap();
        assert!(matches!(
            binding.release(),
            Err(GraphicsError::AlreadyReleased { .. })
        ));
    }

    #[test]
    fn test_released_buffer() {
        let (device, backend, program) = setup();
        let buffer = device.create_buffer_with_data(&[0u8; 48], false).unwrap();
        let index = device.create_buffer_with_data(&[0u8; 12], false).unwrap();
        let binding = VertexBinder::bind(
            &program,
            &[VertexBufferBinding::new(buffer.clone(), "2f 2f", ["vert", "offset"]).unwrap()],
            Some(&IndexSource::new(index.clone(), 2)),
        )
        .unwrap();
        binding.render(DrawMode::Triangles, 0, 0, 0).unwrap();

        index.release().unwrap();
        assert_eq!(
            binding.render(DrawMode::Triangles, 0, 0, 0),
            Err(GraphicsError::Released {
                kind: ResourceKind::Buffer,
                handle: index.handle()
            })
        );
        assert_eq!(backend.draw_calls().len(), 1);
        assert!(!buffer.is_released());
    }
}
