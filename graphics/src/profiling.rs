//! Profiling support via Tracy.
//!
//! Re-exports the CPU profiling macros from [`lattice_core::profiling`] so
//! graphics users can instrument their own code without depending on the
//! core crate directly. Build with the `profiling` feature to enable them:
//!
//! ```bash
//! cargo bench -p lattice-graphics --features profiling
//! ```
//!
//! ```ignore
//! use lattice_graphics::profiling::{profile_scope, profile_plot};
//!
//! fn draw_frame(script: &RenderScript, ctx: &mut RenderContext) -> Result<(), GraphicsError> {
//!     profile_scope!("draw_frame");
//!     script.execute(ctx)?;
//!     profile_plot!("script_commands", script.len());
//!     Ok(())
//! }
//! ```

pub use lattice_core::profiling::*;
