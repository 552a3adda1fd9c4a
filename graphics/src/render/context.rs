//! Render context.

use std::sync::Arc;

use super::RenderState;
use crate::device::GraphicsDevice;

/// A device together with the snapshot scripts execute against.
///
/// There is no implicit current context; scripts take the context they run
/// in as a parameter.
#[derive(Debug)]
pub struct RenderContext {
    pub(crate) device: Arc<GraphicsDevice>,
    pub(crate) state: RenderState,
}

impl RenderContext {
    pub fn new(device: Arc<GraphicsDevice>) -> Self {
        Self {
            device,
            state: RenderState::default(),
        }
    }

    pub fn device(&self) -> &Arc<GraphicsDevice> {
        &self.device
    }

    pub fn state(&self) -> &RenderState {
        &self.state
    }
}
