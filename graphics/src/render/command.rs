//! Recorded render commands.

use std::sync::Arc;

use glam::{Mat4, Vec4};

use super::batch::SharedBatch;
use super::RenderContext;
use crate::error::GraphicsError;
use crate::resources::{Program, Texture};
use crate::types::{BlendEquation, BlendFunc, DrawMode, EnableFlags};
use crate::vertex::{IndexSource, VertexSource};

/// A draw recorded into a script.
///
/// Count and instances of 0 use the counts derived from the buffers.
#[derive(Debug, Clone)]
pub struct DrawRequest {
    pub source: Arc<VertexSource>,
    pub index: Option<IndexSource>,
    pub mode: DrawMode,
    pub transform: Mat4,
    pub count: u32,
    pub offset: u32,
    pub instances: u32,
}

impl DrawRequest {
    pub fn new(source: Arc<VertexSource>, mode: DrawMode) -> Self {
        Self {
            source,
            index: None,
            mode,
            transform: Mat4::IDENTITY,
            count: 0,
            offset: 0,
            instances: 0,
        }
    }

    pub fn with_index(mut self, index: IndexSource) -> Self {
        self.index = Some(index);
        self
    }

    pub fn with_transform(mut self, transform: Mat4) -> Self {
        self.transform = transform;
        self
    }

    /// Draw `count` vertices (or indices) starting at `offset`.
    pub fn with_range(mut self, count: u32, offset: u32) -> Self {
        self.count = count;
        self.offset = offset;
        self
    }

    pub fn with_instances(mut self, instances: u32) -> Self {
        self.instances = instances;
        self
    }
}

/// One recorded operation.
#[derive(Debug, Clone)]
pub enum RenderCommand {
    Clear { color: Vec4, depth: f32 },
    SetView(Mat4),
    SetProjection(Mat4),
    SetBlendFunc(BlendFunc),
    SetBlendEquation(BlendEquation),
    EnableState(EnableFlags),
    DisableState(EnableFlags),
    EnableShader(Arc<Program>),
    DisableShader,
    EnableTexture { slot: u32, texture: Arc<Texture> },
    DisableTexture { slot: u32 },
    Draw(DrawRequest),
    DrawBatch(SharedBatch),
    ClearSamplers { start: u32, end: u32 },
}

impl RenderCommand {
    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Clear { .. } => "clear",
            Self::SetView(_) => "set_view",
            Self::SetProjection(_) => "set_projection",
            Self::SetBlendFunc(_) => "set_blend_func",
            Self::SetBlendEquation(_) => "set_blend_equation",
            Self::EnableState(_) => "enable_state",
            Self::DisableState(_) => "disable_state",
            Self::EnableShader(_) => "enable_shader",
            Self::DisableShader => "disable_shader",
            Self::EnableTexture { .. } => "enable_texture",
            Self::DisableTexture { .. } => "disable_texture",
            Self::Draw(_) => "draw",
            Self::DrawBatch(_) => "draw_batch",
            Self::ClearSamplers { .. } => "clear_samplers",
        }
    }

    /// Run the command against `ctx`.
    ///
    /// Every command other than `Draw` first commits pending draws, so
    /// device calls appear in recorded order.
    pub fn execute(&self, ctx: &mut RenderContext) -> Result<(), GraphicsError> {
        let RenderContext { device, state } = ctx;
        match self {
            Self::Clear { color, depth } => {
                state.commit_pending()?;
                device.clear(*color, *depth)
            }
            Self::SetView(view) => state.set_view(*view),
            Self::SetProjection(projection) => state.set_projection(*projection),
            Self::SetBlendFunc(func) => {
                state.commit_pending()?;
                device.set_blend_func(*func)
            }
            Self::SetBlendEquation(equation) => {
                state.commit_pending()?;
                device.set_blend_equation(*equation)
            }
            Self::EnableState(flags) => {
                state.commit_pending()?;
                device.enable(*flags)
            }
            Self::DisableState(flags) => {
                state.commit_pending()?;
                device.disable(*flags)
            }
            Self::EnableShader(program) => state.enable_shader(device, program),
            Self::DisableShader => state.disable_shader(device),
            Self::EnableTexture { slot, texture } => state.bind_texture(device, *slot, texture),
            Self::DisableTexture { slot } => state.unbind_texture(device, *slot),
            Self::Draw(request) => state.queue_draw(request),
            Self::DrawBatch(batch) => state.draw_batch(&mut batch.lock()),
            Self::ClearSamplers { start, end } => state.clear_samplers(device, *start, *end),
        }
    }
}
