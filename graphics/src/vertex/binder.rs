//! Vertex binding protocol.
//!
//! [`VertexBinder`] matches the layouts and attribute names of one or more
//! vertex buffers against a program's reflected attributes and resolves the
//! per-location bindings. Every structural check runs before the device is
//! touched, so a failed bind leaves nothing behind.

use std::collections::HashSet;
use std::sync::Arc;

use lattice_core::profiling::profile_scope;

use super::layout::{BufferLayout, Divisor};
use super::VertexBinding;
use crate::backend::{
    AttributeBinding, AttributeMode, IndexFormat, ResourceKind, VertexBindingSpec,
};
use crate::error::GraphicsError;
use crate::reflect::ScalarKind;
use crate::resources::{Buffer, DeviceObject, Program};

/// What a layout element feeds.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AttributeTarget {
    /// A program attribute by name.
    Name(String),
    /// Consume the element without binding it.
    Padding,
}

impl From<&str> for AttributeTarget {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl From<String> for AttributeTarget {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

/// One vertex buffer with its layout and the attributes its elements feed.
#[derive(Debug, Clone)]
pub struct VertexBufferBinding {
    pub buffer: Arc<Buffer>,
    pub layout: BufferLayout,
    /// One target per non-padding layout element, in order.
    pub attributes: Vec<AttributeTarget>,
}

impl VertexBufferBinding {
    /// Parse `layout` and pair it with `attributes`.
    ///
    /// ```ignore
    /// let vertices = VertexBufferBinding::new(buffer, "2f 4f", ["vert", "vert_color"])?;
    /// ```
    pub fn new<I, A>(buffer: Arc<Buffer>, layout: &str, attributes: I) -> Result<Self, GraphicsError>
    where
        I: IntoIterator<Item = A>,
        A: Into<AttributeTarget>,
    {
        Ok(Self::with_layout(buffer, BufferLayout::parse(layout)?, attributes))
    }

    pub fn with_layout<I, A>(buffer: Arc<Buffer>, layout: BufferLayout, attributes: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<AttributeTarget>,
    {
        Self {
            buffer,
            layout,
            attributes: attributes.into_iter().map(Into::into).collect(),
        }
    }
}

/// An index buffer and the width of its elements.
#[derive(Debug, Clone)]
pub struct IndexSource {
    pub buffer: Arc<Buffer>,
    /// 1, 2 or 4 bytes.
    pub element_size: u32,
}

impl IndexSource {
    pub fn new(buffer: Arc<Buffer>, element_size: u32) -> Self {
        Self {
            buffer,
            element_size,
        }
    }
}

/// Bindings resolved for a program, ready to be created on the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedBinding {
    pub spec: VertexBindingSpec,
    /// Derived vertex (or index element) count, if any buffer provides one.
    pub vertex_count: Option<u32>,
    pub instance_count: u32,
}

/// Builds vertex bindings.
pub struct VertexBinder;

impl VertexBinder {
    /// Resolve and create a vertex binding.
    ///
    /// # Errors
    ///
    /// Any error from [`VertexBinder::resolve`], or a device error while
    /// creating the native object.
    pub fn bind(
        program: &Arc<Program>,
        buffers: &[VertexBufferBinding],
        index: Option<&IndexSource>,
    ) -> Result<VertexBinding, GraphicsError> {
        profile_scope!("vertex_bind");

        let resolved = Self::resolve(program, buffers, index)?;
        let device = program.device()?;
        let handle = device.create_vertex_binding(&resolved.spec)?;

        log::debug!(
            "VertexBinder: built binding {handle} for program {} ({} locations, vertices={:?}, instances={})",
            program.handle(),
            resolved.spec.attributes.len(),
            resolved.vertex_count,
            resolved.instance_count
        );

        Ok(VertexBinding::new(
            DeviceObject::new(&device, ResourceKind::VertexBinding, handle),
            program,
            buffers
                .iter()
                .map(|entry| &entry.buffer)
                .chain(index.map(|index| &index.buffer)),
            resolved,
        ))
    }

    /// Validate the inputs and compute every attribute binding without
    /// touching the device.
    ///
    /// # Errors
    ///
    /// - [`GraphicsError::InvalidIndexElementSize`] for an index element
    ///   size other than 1, 2 or 4.
    /// - [`GraphicsError::EmptyAttributeList`] and
    ///   [`GraphicsError::LayoutMismatch`] when a buffer's names do not line
    ///   up with its layout.
    /// - [`GraphicsError::UnknownAttribute`] for a name the program lacks.
    /// - [`GraphicsError::DuplicateAttribute`] for a name supplied twice.
    /// - [`GraphicsError::AttributeShapeMismatch`] when an element cannot be
    ///   split across the attribute's locations.
    /// - [`GraphicsError::MissingBufferMapping`] for a program attribute no
    ///   buffer supplies.
    /// - [`GraphicsError::Released`] if the program or a buffer is released.
    pub fn resolve(
        program: &Program,
        buffers: &[VertexBufferBinding],
        index: Option<&IndexSource>,
    ) -> Result<ResolvedBinding, GraphicsError> {
        let program_handle = program.live_handle()?;

        let index = match index {
            Some(index) => {
                let format = IndexFormat::from_element_size(index.element_size)
                    .ok_or(GraphicsError::InvalidIndexElementSize(index.element_size))?;
                Some((index, format))
            }
            None => None,
        };

        let mut bindings = Vec::new();
        let mut supplied: HashSet<&str> = HashSet::new();
        let mut vertex_count: Option<u64> = None;
        let mut instance_count: Option<u64> = None;

        for (position, entry) in buffers.iter().enumerate() {
            if entry.attributes.is_empty() {
                return Err(GraphicsError::EmptyAttributeList { buffer: position });
            }
            let elements = entry.layout.attribute_count();
            if entry.attributes.len() != elements {
                return Err(GraphicsError::LayoutMismatch {
                    buffer: position,
                    elements,
                    attributes: entry.attributes.len(),
                });
            }
            let buffer = entry.buffer.live_handle()?;
            let stride = entry.layout.stride();

            for (element, target) in entry.layout.attributes().zip(&entry.attributes) {
                let name = match target {
                    AttributeTarget::Name(name) => name.as_str(),
                    AttributeTarget::Padding => continue,
                };
                let attribute = program.attribute(name).ok_or_else(|| {
                    GraphicsError::UnknownAttribute {
                        buffer: position,
                        name: name.to_string(),
                    }
                })?;
                if !supplied.insert(name) {
                    return Err(GraphicsError::DuplicateAttribute {
                        name: name.to_string(),
                    });
                }

                let rows = attribute.location_count();
                let components = element.count / rows;
                if element.count % rows != 0 || !(1..=4).contains(&components) {
                    return Err(GraphicsError::AttributeShapeMismatch {
                        name: name.to_string(),
                        components: element.count,
                        rows,
                    });
                }

                let mode = match attribute.info.scalar {
                    ScalarKind::Double => AttributeMode::Double,
                    ScalarKind::Int | ScalarKind::UInt => AttributeMode::Integer,
                    _ => AttributeMode::Float,
                };
                let row_size = element.size / rows;
                for row in 0..rows {
                    bindings.push(AttributeBinding {
                        location: attribute.location + row,
                        buffer,
                        components,
                        component_type: element.component,
                        normalize: element.normalize,
                        stride,
                        offset: element.offset + row * row_size,
                        divisor: element.divisor,
                        mode,
                    });
                }
            }

            let records = entry.layout.record_count(entry.buffer.size());
            match entry.layout.divisor() {
                Divisor::PerVertex => {
                    vertex_count = Some(vertex_count.map_or(records, |c| c.min(records)))
                }
                Divisor::PerInstance => {
                    instance_count = Some(instance_count.map_or(records, |c| c.min(records)))
                }
                Divisor::PerRender => {}
            }
        }

        if let Some(missing) = program
            .reflection()
            .attributes
            .iter()
            .find(|a| !supplied.contains(a.name.as_str()))
        {
            return Err(GraphicsError::MissingBufferMapping {
                name: missing.name.clone(),
            });
        }

        let index_spec = match index {
            Some((index, format)) => {
                let handle = index.buffer.live_handle()?;
                vertex_count = Some(index.buffer.size() / u64::from(format.size()));
                Some((handle, format))
            }
            None => None,
        };

        bindings.sort_by_key(|b| b.location);

        Ok(ResolvedBinding {
            spec: VertexBindingSpec {
                program: program_handle,
                attributes: bindings,
                index: index_spec,
            },
            vertex_count: vertex_count.map(saturate),
            instance_count: instance_count.map_or(1, saturate),
        })
    }
}

fn saturate(count: u64) -> u32 {
    u32::try_from(count).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{RawProgramInfo, RawResource};
    use crate::reflect::GpuType;
    use crate::shader::{ProgramDescriptor, ShaderStage};
    use crate::vertex::ComponentType;
    use crate::GraphicsDevice;

    fn device_with_program(
        attributes: &[(&str, GpuType, i32)],
    ) -> (Arc<GraphicsDevice>, Arc<Program>) {
        let (device, backend) = GraphicsDevice::headless().unwrap();
        backend.queue_introspection(RawProgramInfo {
            attributes: attributes
                .iter()
                .map(|(name, ty, location)| RawResource::new(*name, ty.code(), *location, 1))
                .collect(),
            ..Default::default()
        });
        let program = device
            .create_program(&ProgramDescriptor::new().with_stage(ShaderStage::Vertex, "#version 330\n"))
            .unwrap();
        (device, program)
    }

    fn buffer(device: &Arc<GraphicsDevice>, size: usize) -> Arc<Buffer> {
        device.create_buffer_with_data(&vec![0u8; size], false).unwrap()
    }

    #[test]
    fn test_interleaved_offsets() {
        let (device, program) =
            device_with_program(&[("vert", GpuType::Vec2, 0), ("vert_color", GpuType::Vec4, 1)]);
        let vbo = VertexBufferBinding::new(buffer(&device, 24 * 5), "2f 4f", ["vert", "vert_color"])
            .unwrap();

        let resolved = VertexBinder::resolve(&program, &[vbo], None).unwrap();
        let attrs = &resolved.spec.attributes;
        assert_eq!(attrs.len(), 2);
        assert_eq!((attrs[0].location, attrs[0].offset, attrs[0].stride), (0, 0, 24));
        assert_eq!((attrs[1].location, attrs[1].offset, attrs[1].components), (1, 8, 4));
        assert_eq!(resolved.vertex_count, Some(5));
        assert_eq!(resolved.instance_count, 1);
    }

    #[test]
    fn test_matrix_rows() {
        let (device, program) =
            device_with_program(&[("in_vert", GpuType::Vec3, 0), ("in_model", GpuType::Mat4, 2)]);
        let vertices = VertexBufferBinding::new(buffer(&device, 12 * 3), "3f", ["in_vert"]).unwrap();
        let instances =
            VertexBufferBinding::new(buffer(&device, 64 * 7), "16f/i", ["in_model"]).unwrap();

        let resolved = VertexBinder::resolve(&program, &[vertices, instances], None).unwrap();
        let rows: Vec<_> = resolved
            .spec
            .attributes
            .iter()
            .filter(|a| a.location >= 2)
            .map(|a| (a.location, a.components, a.offset, a.divisor))
            .collect();
        assert_eq!(
            rows,
            vec![(2, 4, 0, 1), (3, 4, 16, 1), (4, 4, 32, 1), (5, 4, 48, 1)]
        );
        assert_eq!(resolved.vertex_count, Some(3));
        assert_eq!(resolved.instance_count, 7);
    }

    #[test]
    fn test_binding_modes() {
        let (device, program) = device_with_program(&[
            ("in_pos", GpuType::DVec3, 0),
            ("in_id", GpuType::UInt, 1),
            ("in_color", GpuType::Vec4, 2),
        ]);
        let vbo = VertexBufferBinding::new(
            buffer(&device, 32 * 2),
            "3d u 4f1",
            ["in_pos", "in_id", "in_color"],
        )
        .unwrap();
        let resolved = VertexBinder::resolve(&program, &[vbo], None).unwrap();
        let modes: Vec<_> = resolved.spec.attributes.iter().map(|a| a.mode).collect();
        assert_eq!(
            modes,
            vec![AttributeMode::Double, AttributeMode::Integer, AttributeMode::Float]
        );
        let color = &resolved.spec.attributes[2];
        assert!(color.normalize);
        assert_eq!(color.component_type, ComponentType::U8);
    }

    #[test]
    fn test_index_count() {
        let (device, program) = device_with_program(&[("vert", GpuType::Vec2, 0)]);
        let vbo = VertexBufferBinding::new(buffer(&device, 8 * 100), "2f", ["vert"]).unwrap();
        let index = IndexSource::new(buffer(&device, 24), 4);

        let resolved = VertexBinder::resolve(&program, &[vbo], Some(&index)).unwrap();
        assert_eq!(resolved.vertex_count, Some(6));
        assert_eq!(
            resolved.spec.index.map(|(_, format)| format),
            Some(IndexFormat::U32)
        );
    }

    #[test]
    fn test_padding_target() {
        let (device, program) = device_with_program(&[("vert", GpuType::Vec2, 0)]);
        let vbo = VertexBufferBinding::new(
            buffer(&device, 16),
            "2f 2f",
            vec![AttributeTarget::Padding, AttributeTarget::from("vert")],
        )
        .unwrap();
        let resolved = VertexBinder::resolve(&program, &[vbo], None).unwrap();
        assert_eq!(resolved.spec.attributes.len(), 1);
        assert_eq!(resolved.spec.attributes[0].offset, 8);
    }

    #[test]
    fn test_validation_errors() {
        let (device, program) =
            device_with_program(&[("vert", GpuType::Vec2, 0), ("vert_color", GpuType::Vec4, 1)]);
        let buf = buffer(&device, 96);

        let mismatch = VertexBufferBinding::new(buf.clone(), "2f 4f", ["vert"]).unwrap();
        assert_eq!(
            VertexBinder::resolve(&program, &[mismatch], None).unwrap_err(),
            GraphicsError::LayoutMismatch {
                buffer: 0,
                elements: 2,
                attributes: 1
            }
        );

        let empty = VertexBufferBinding::new(buf.clone(), "2f", Vec::<&str>::new()).unwrap();
        assert_eq!(
            VertexBinder::resolve(&program, &[empty], None).unwrap_err(),
            GraphicsError::EmptyAttributeList { buffer: 0 }
        );

        let unknown = VertexBufferBinding::new(buf.clone(), "2f 4f", ["vert", "normal"]).unwrap();
        assert!(matches!(
            VertexBinder::resolve(&program, &[unknown], None),
            Err(GraphicsError::UnknownAttribute { .. })
        ));

        let partial = VertexBufferBinding::new(buf.clone(), "2f", ["vert"]).unwrap();
        assert_eq!(
            VertexBinder::resolve(&program, &[partial.clone()], None).unwrap_err(),
            GraphicsError::MissingBufferMapping {
                name: "vert_color".into()
            }
        );

        let twice = VertexBufferBinding::new(buf.clone(), "2f 4f", ["vert", "vert_color"]).unwrap();
        assert!(matches!(
            VertexBinder::resolve(&program, &[partial, twice], None),
            Err(GraphicsError::DuplicateAttribute { .. })
        ));

        let ok = VertexBufferBinding::new(buf.clone(), "2f 4f", ["vert", "vert_color"]).unwrap();
        let bad_index = IndexSource::new(buf, 3);
        assert_eq!(
            VertexBinder::resolve(&program, &[ok], Some(&bad_index)).unwrap_err(),
            GraphicsError::InvalidIndexElementSize(3)
        );
    }

    #[test]
    fn test_shape_mismatch() {
        let (device, program) = device_with_program(&[("in_model", GpuType::Mat4, 0)]);
        let vbo = VertexBufferBinding::new(buffer(&device, 64), "10f", ["in_model"]).unwrap();
        assert!(matches!(
            VertexBinder::resolve(&program, &[vbo], None),
            Err(GraphicsError::AttributeShapeMismatch { rows: 4, .. })
        ));
    }

    #[test]
    fn test_failed_bind_creates_nothing() {
        let (device, program) =
            device_with_program(&[("vert", GpuType::Vec2, 0), ("vert_color", GpuType::Vec4, 1)]);
        let partial = VertexBufferBinding::new(buffer(&device, 16), "2f", ["vert"]).unwrap();
        let before = device.live_resources();
        assert!(VertexBinder::bind(&program, &[partial], None).is_err());
        assert_eq!(device.live_resources(), before);
        assert_eq!(device.live_count(ResourceKind::VertexBinding), 0);
    }

    #[test]
    fn test_released_buffer() {
        let (device, program) = device_with_program(&[("vert", GpuType::Vec2, 0)]);
        let buf = buffer(&device, 16);
        buf.release().unwrap();
        let vbo = VertexBufferBinding::new(buf, "2f", ["vert"]).unwrap();
        assert!(matches!(
            VertexBinder::resolve(&program, &[vbo], None),
            Err(GraphicsError::Released { .. })
        ));
    }
}
