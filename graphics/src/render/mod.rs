//! Deferred rendering through recorded scripts.
//!
//! A [`RenderScript`] records [`RenderCommand`]s and replays them against a
//! [`RenderContext`]. Draws are not issued immediately: consecutive draws
//! that share a vertex source, index buffer and primitive mode collect in a
//! [`Batch`] and are issued through one vertex binding when the batch is
//! committed.
//!
//! # Example
//!
//! ```ignore
//! let mut ctx = RenderContext::new(device.clone());
//! let mut script = RenderScript::new();
//! script.set_projection(projection);
//! script.enable_shader(program.clone());
//! for transform in &transforms {
//!     script.draw(DrawRequest::new(mesh.clone(), DrawMode::Triangles).with_transform(*transform));
//! }
//! script.execute(&mut ctx)?;
//! ```

mod batch;
mod command;
mod context;
mod script;
mod state;

pub use batch::{Batch, BatchEntry, SharedBatch};
pub use command::{DrawRequest, RenderCommand};
pub use context::RenderContext;
pub use script::RenderScript;
pub use state::{RenderState, MODEL_UNIFORM, PROJECTION_UNIFORM, VIEW_UNIFORM};
