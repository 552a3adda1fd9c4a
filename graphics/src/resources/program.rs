//! Linked shader program resource.

use std::sync::Arc;

use bytemuck::Pod;

use super::DeviceObject;
use crate::backend::Handle;
use crate::device::GraphicsDevice;
use crate::error::GraphicsError;
use crate::reflect::{Attribute, ProgramReflection, Uniform};

/// A linked shader program and its reflection tables.
///
/// Programs are created by [`GraphicsDevice::create_program`]. The
/// reflection is immutable and shared, so vertex bindings and render
/// commands can hold on to it without locking.
///
/// # Example
///
/// ```ignore
/// let program = device.create_program(&descriptor)?;
/// program.set_uniform("projection", &glam::Mat4::IDENTITY)?;
/// program.set_uniform("tint", &glam::Vec4::ONE)?;
/// ```
pub struct Program {
    object: DeviceObject,
    label: Option<String>,
    reflection: Arc<ProgramReflection>,
}

impl Program {
    pub(crate) fn new(
        object: DeviceObject,
        label: Option<String>,
        reflection: Arc<ProgramReflection>,
    ) -> Self {
        Self {
            object,
            label,
            reflection,
        }
    }

    pub fn handle(&self) -> Handle {
        self.object.handle()
    }

    pub(crate) fn live_handle(&self) -> Result<Handle, GraphicsError> {
        self.object.live_handle()
    }

    /// Get the parent device, if the program is still usable.
    pub fn device(&self) -> Result<Arc<GraphicsDevice>, GraphicsError> {
        self.object.device()
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn reflection(&self) -> &Arc<ProgramReflection> {
        &self.reflection
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.reflection.attribute(name)
    }

    pub fn uniform(&self, name: &str) -> Option<&Uniform> {
        self.reflection.uniform(name)
    }

    pub fn is_released(&self) -> bool {
        self.object.is_released()
    }

    /// Upload a plain-old-data value to a uniform.
    pub fn set_uniform<T: Pod>(&self, name: &str, value: &T) -> Result<(), GraphicsError> {
        self.set_uniform_bytes(name, bytemuck::bytes_of(value))
    }

    /// Upload consecutive elements of an array uniform.
    pub fn set_uniform_slice<T: Pod>(&self, name: &str, values: &[T]) -> Result<(), GraphicsError> {
        self.set_uniform_bytes(name, bytemuck::cast_slice(values))
    }

    /// Upload raw bytes to a uniform.
    ///
    /// # Errors
    ///
    /// - [`GraphicsError::UnknownUniform`] if the program has no such uniform.
    /// - [`GraphicsError::UniformSizeMismatch`] if `data` is empty, not a
    ///   multiple of the element size, or larger than the whole uniform.
    pub fn set_uniform_bytes(&self, name: &str, data: &[u8]) -> Result<(), GraphicsError> {
        let device = self.object.device()?;
        let uniform = self
            .reflection
            .uniform(name)
            .ok_or_else(|| GraphicsError::UnknownUniform(name.to_string()))?;

        let element_size = uniform.element_size();
        if data.is_empty() || data.len() % element_size != 0 || data.len() > uniform.size() {
            return Err(GraphicsError::UniformSizeMismatch {
                name: name.to_string(),
                element_size,
                max_size: uniform.size(),
                actual: data.len(),
            });
        }

        device
            .backend()
            .set_uniform(self.handle(), uniform.location, data)?;
        Ok(())
    }

    /// Destroy the device program.
    pub fn release(&self) -> Result<(), GraphicsError> {
        self.object.release()
    }
}

impl std::fmt::Debug for Program {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Program")
            .field("handle", &self.handle())
            .field("label", &self.label)
            .field("attributes", &self.reflection.attributes.len())
            .field("uniforms", &self.reflection.uniforms.len())
            .finish()
    }
}

// Ensure Program is Send + Sync
static_assertions::assert_impl_all!(Program: Send, Sync);

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::backend::headless::HeadlessBackend;
    use crate::error::GraphicsError;
    use crate::shader::{ProgramDescriptor, ShaderStage};
    use crate::GraphicsDevice;

    const VERTEX: &str = "#version 330
uniform mat4 projection;
uniform vec3 lights[2];
in vec3 in_pos;
void main() { gl_Position = projection * vec4(in_pos, 1.0); }";

    fn program() -> (Arc<GraphicsDevice>, Arc<HeadlessBackend>, Arc<super::Program>) {
        let (device, backend) = GraphicsDevice::headless().unwrap();
        let program = device
            .create_program(&ProgramDescriptor::new().with_stage(ShaderStage::Vertex, VERTEX))
            .unwrap();
        (device, backend, program)
    }

    #[test]
    fn test_set_uniform() {
        let (_device, backend, program) = program();
        let projection = glam::Mat4::from_scale(glam::Vec3::splat(2.0));
        program.set_uniform("projection", &projection).unwrap();

        let location = program.uniform("projection").unwrap().location;
        assert_eq!(
            backend.uniform_value(program.handle(), location),
            Some(bytemuck::bytes_of(&projection).to_vec())
        );
    }

    #[test]
    fn test_uniform_array() {
        let (_device, _backend, program) = program();
        program
            .set_uniform_slice("lights", &[glam::Vec3::X, glam::Vec3::Y])
            .unwrap();
        program.set_uniform("lights", &glam::Vec3::Z).unwrap();

        let err = program
            .set_uniform_slice("lights", &[glam::Vec3::X; 3])
            .unwrap_err();
        assert_eq!(
            err,
            GraphicsError::UniformSizeMismatch {
                name: "lights".into(),
                element_size: 12,
                max_size: 24,
                actual: 36
            }
        );
    }

    #[test]
    fn test_uniform_errors() {
        let (_device, _backend, program) = program();
        assert_eq!(
            program.set_uniform("missing", &1.0f32),
            Err(GraphicsError::UnknownUniform("missing".into()))
        );
        assert!(matches!(
            program.set_uniform("projection", &1.0f32),
            Err(GraphicsError::UniformSizeMismatch { .. })
        ));
    }

    #[test]
    fn test_released_program() {
        let (device, _backend, program) = program();
        program.release().unwrap();
        assert!(matches!(
            program.set_uniform("projection", &glam::Mat4::IDENTITY),
            Err(GraphicsError::Released { .. })
        ));
        assert_eq!(device.live_resources(), 0);
    }
}
