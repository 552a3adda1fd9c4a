//! Render state snapshot.

use std::collections::BTreeMap;
use std::sync::Arc;

use glam::Mat4;

use super::batch::Batch;
use super::command::DrawRequest;
use crate::device::GraphicsDevice;
use crate::error::GraphicsError;
use crate::reflect::{GpuType, Uniform};
use crate::resources::{Program, Texture};

/// Uniform names the renderer fills from the snapshot.
pub const VIEW_UNIFORM: &str = "view";
pub const PROJECTION_UNIFORM: &str = "projection";
pub const MODEL_UNIFORM: &str = "model";

/// The state a script execution works against.
///
/// Only executing commands changes it. It is reset at the start of every
/// execution.
#[derive(Debug)]
pub struct RenderState {
    shader: Option<Arc<Program>>,
    textures: BTreeMap<u32, Arc<Texture>>,
    view: Mat4,
    projection: Mat4,
    view_uniform: Option<Uniform>,
    projection_uniform: Option<Uniform>,
    model_uniform: Option<Uniform>,
    batch: Batch,
}

impl Default for RenderState {
    fn default() -> Self {
        Self {
            shader: None,
            textures: BTreeMap::new(),
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
            view_uniform: None,
            projection_uniform: None,
            model_uniform: None,
            batch: Batch::default(),
        }
    }
}

fn matrix_uniform(program: &Program, name: &str) -> Option<Uniform> {
    let uniform = program.uniform(name)?;
    if uniform.info.ty != GpuType::Mat4 {
        log::warn!(
            "RenderState: program {} declares `{name}` as {:?}, expected mat4; ignoring it",
            program.handle(),
            uniform.info.ty
        );
        return None;
    }
    Some(uniform.clone())
}

impl RenderState {
    pub fn shader(&self) -> Option<&Arc<Program>> {
        self.shader.as_ref()
    }

    pub fn texture(&self, slot: u32) -> Option<&Arc<Texture>> {
        self.textures.get(&slot)
    }

    pub fn textures(&self) -> &BTreeMap<u32, Arc<Texture>> {
        &self.textures
    }

    pub fn view(&self) -> Mat4 {
        self.view
    }

    pub fn projection(&self) -> Mat4 {
        self.projection
    }

    /// The `model` uniform of the enabled shader, if it is a `mat4`.
    pub fn model_uniform(&self) -> Option<&Uniform> {
        self.model_uniform.as_ref()
    }

    /// The batch collecting draws.
    pub fn batch(&self) -> &Batch {
        &self.batch
    }

    pub(crate) fn reset(&mut self) {
        *self = Self::default();
    }

    fn current_shader(&self) -> Result<&Arc<Program>, GraphicsError> {
        self.shader.as_ref().ok_or(GraphicsError::NoShaderEnabled)
    }

    /// Issue the pending draws, if any.
    pub(crate) fn commit_pending(&mut self) -> Result<(), GraphicsError> {
        if self.batch.is_empty() {
            return Ok(());
        }
        let shader = self.current_shader()?.clone();
        self.batch.commit(&shader, self.model_uniform.as_ref())?;
        Ok(())
    }

    pub(crate) fn enable_shader(
        &mut self,
        device: &GraphicsDevice,
        program: &Arc<Program>,
    ) -> Result<(), GraphicsError> {
        self.commit_pending()?;
        device.use_program(Some(program))?;

        self.view_uniform = matrix_uniform(program, VIEW_UNIFORM);
        self.projection_uniform = matrix_uniform(program, PROJECTION_UNIFORM);
        self.model_uniform = matrix_uniform(program, MODEL_UNIFORM);
        self.shader = Some(program.clone());
        self.batch.clear();

        if let Some(uniform) = &self.view_uniform {
            program.set_uniform(&uniform.name, &self.view)?;
        }
        if let Some(uniform) = &self.projection_uniform {
            program.set_uniform(&uniform.name, &self.projection)?;
        }

        log::trace!("RenderState: enabled shader {}", program.handle());
        Ok(())
    }

    pub(crate) fn disable_shader(&mut self, device: &GraphicsDevice) -> Result<(), GraphicsError> {
        if self.shader.is_none() {
            return Ok(());
        }
        self.commit_pending()?;
        device.use_program(None)?;

        self.shader = None;
        self.view_uniform = None;
        self.projection_uniform = None;
        self.model_uniform = None;
        self.batch.clear();
        Ok(())
    }

    pub(crate) fn set_view(&mut self, view: Mat4) -> Result<(), GraphicsError> {
        self.commit_pending()?;
        self.view = view;
        if let (Some(shader), Some(uniform)) = (&self.shader, &self.view_uniform) {
            shader.set_uniform(&uniform.name, &view)?;
        }
        Ok(())
    }

    pub(crate) fn set_projection(&mut self, projection: Mat4) -> Result<(), GraphicsError> {
        self.commit_pending()?;
        self.projection = projection;
        if let (Some(shader), Some(uniform)) = (&self.shader, &self.projection_uniform) {
            shader.set_uniform(&uniform.name, &projection)?;
        }
        Ok(())
    }

    pub(crate) fn bind_texture(
        &mut self,
        device: &GraphicsDevice,
        slot: u32,
        texture: &Arc<Texture>,
    ) -> Result<(), GraphicsError> {
        self.commit_pending()?;
        device.bind_texture(slot, Some(texture))?;
        self.textures.insert(slot, texture.clone());
        Ok(())
    }

    pub(crate) fn unbind_texture(&mut self, device: &GraphicsDevice, slot: u32) -> Result<(), GraphicsError> {
        self.commit_pending()?;
        device.bind_texture(slot, None)?;
        self.textures.remove(&slot);
        Ok(())
    }

    pub(crate) fn clear_samplers(
        &mut self,
        device: &GraphicsDevice,
        start: u32,
        end: u32,
    ) -> Result<(), GraphicsError> {
        self.commit_pending()?;
        device.clear_samplers(start, end)?;
        self.textures.retain(|slot, _| !(start..end).contains(slot));
        Ok(())
    }

    /// Add a draw to the pending batch, committing the batch first when the
    /// draw uses a different source, index buffer or mode.
    pub(crate) fn queue_draw(&mut self, request: &DrawRequest) -> Result<(), GraphicsError> {
        self.current_shader()?;
        if !self
            .batch
            .matches(&request.source, request.index.as_ref(), request.mode)
        {
            self.commit_pending()?;
            self.batch
                .reset(request.source.clone(), request.index.clone(), request.mode);
        }
        self.batch.push(
            request.transform,
            request.count,
            request.offset,
            request.instances,
        );
        Ok(())
    }

    /// Commit the pending draws, then `batch` with the enabled shader.
    pub(crate) fn draw_batch(&mut self, batch: &mut Batch) -> Result<(), GraphicsError> {
        self.commit_pending()?;
        if batch.is_empty() {
            return Ok(());
        }
        let shader = self.current_shader()?.clone();
        batch.commit(&shader, self.model_uniform.as_ref())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_snapshot() {
        let state = RenderState::default();
        assert!(state.shader().is_none());
        assert!(state.textures().is_empty());
        assert_eq!(state.view(), Mat4::IDENTITY);
        assert_eq!(state.projection(), Mat4::IDENTITY);
        assert!(state.batch().is_empty());
    }

    #[test]
    fn test_commit_without_entries_needs_no_shader() {
        let mut state = RenderState::default();
        assert!(state.commit_pending().is_ok());
    }
}
