//! Replayable render scripts.

use std::sync::Arc;

use glam::{Mat4, Vec4};

use lattice_core::profiling::profile_scope;

use super::batch::SharedBatch;
use super::command::{DrawRequest, RenderCommand};
use super::RenderContext;
use crate::error::GraphicsError;
use crate::resources::{Framebuffer, Program, Texture};
use crate::types::{BlendEquation, BlendFunc, EnableFlags};

/// An ordered list of render commands with an optional target.
///
/// A script can be executed any number of times. Each execution binds the
/// target (or the default target), runs every command in recorded order,
/// disables the shader that is still enabled and restores the default
/// target.
///
/// # Example
///
/// ```ignore
/// let mut script = RenderScript::new();
/// script.clear(Vec4::new(0.1, 0.1, 0.1, 1.0));
/// script.enable_shader(program.clone());
/// script.draw(DrawRequest::new(mesh.clone(), DrawMode::Triangles));
/// script.disable_shader();
/// script.execute(&mut ctx)?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct RenderScript {
    target: Option<Arc<Framebuffer>>,
    commands: Vec<RenderCommand>,
}

impl RenderScript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Render into `target` instead of the default target.
    pub fn with_target(mut self, target: Arc<Framebuffer>) -> Self {
        self.target = Some(target);
        self
    }

    pub fn set_target(&mut self, target: Option<Arc<Framebuffer>>) {
        self.target = target;
    }

    pub fn target(&self) -> Option<&Arc<Framebuffer>> {
        self.target.as_ref()
    }

    pub fn commands(&self) -> &[RenderCommand] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Remove every recorded command.
    pub fn reset(&mut self) {
        self.commands.clear();
    }

    pub fn record(&mut self, command: RenderCommand) {
        self.commands.push(command);
    }

    // ========================================================================
    // Recording helpers
    // ========================================================================

    /// Clear color and depth (to 1.0).
    pub fn clear(&mut self, color: Vec4) {
        self.record(RenderCommand::Clear { color, depth: 1.0 });
    }

    pub fn set_view(&mut self, view: Mat4) {
        self.record(RenderCommand::SetView(view));
    }

    pub fn set_projection(&mut self, projection: Mat4) {
        self.record(RenderCommand::SetProjection(projection));
    }

    pub fn set_blend_func(&mut self, func: BlendFunc) {
        self.record(RenderCommand::SetBlendFunc(func));
    }

    pub fn set_blend_equation(&mut self, equation: BlendEquation) {
        self.record(RenderCommand::SetBlendEquation(equation));
    }

    pub fn enable_state(&mut self, flags: EnableFlags) {
        self.record(RenderCommand::EnableState(flags));
    }

    pub fn disable_state(&mut self, flags: EnableFlags) {
        self.record(RenderCommand::DisableState(flags));
    }

    pub fn enable_shader(&mut self, program: Arc<Program>) {
        self.record(RenderCommand::EnableShader(program));
    }

    pub fn disable_shader(&mut self) {
        self.record(RenderCommand::DisableShader);
    }

    pub fn enable_texture(&mut self, slot: u32, texture: Arc<Texture>) {
        self.record(RenderCommand::EnableTexture { slot, texture });
    }

    pub fn disable_texture(&mut self, slot: u32) {
        self.record(RenderCommand::DisableTexture { slot });
    }

    pub fn draw(&mut self, request: DrawRequest) {
        self.record(RenderCommand::Draw(request));
    }

    pub fn draw_batch(&mut self, batch: SharedBatch) {
        self.record(RenderCommand::DrawBatch(batch));
    }

    /// Unbind texture slots in `start..end`.
    pub fn clear_samplers(&mut self, start: u32, end: u32) {
        self.record(RenderCommand::ClearSamplers { start, end });
    }

    // ========================================================================
    // Execution
    // ========================================================================

    /// Execute every command in order.
    ///
    /// The default target is restored even when a command fails, and the
    /// enabled program is unbound; the first error is returned.
    pub fn execute(&self, ctx: &mut RenderContext) -> Result<(), GraphicsError> {
        profile_scope!("render_script_execute");

        ctx.state.reset();
        let device = ctx.device.clone();
        device.bind_framebuffer(self.target.as_deref())?;

        let result = self.run(ctx);
        if let Err(err) = &result {
            log::error!("RenderScript: execution failed: {err}");
            if device.current_program().is_some() {
                if let Err(unbind) = device.use_program(None) {
                    log::error!("RenderScript: failed to unbind program after error: {unbind}");
                }
            }
            ctx.state.reset();
        }

        let restored = device.bind_framebuffer(None);
        result.and(restored)
    }

    fn run(&self, ctx: &mut RenderContext) -> Result<(), GraphicsError> {
        for (position, command) in self.commands.iter().enumerate() {
            log::trace!("RenderScript: [{position}] {}", command.name());
            command.execute(ctx)?;
        }
        let RenderContext { device, state } = ctx;
        if let Some(shader) = state.shader() {
            log::debug!(
                "RenderScript: shader {} still enabled at end of script, disabling it",
                shader.handle()
            );
        }
        state.disable_shader(device)
    }
}
