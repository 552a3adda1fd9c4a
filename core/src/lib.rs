//! # Lattice Core
//!
//! Utilities shared by every Lattice crate: Tracy-backed profiling macros and
//! logger initialisation.

pub mod logging;
pub mod profiling;

/// Core library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Announce the core crate on the `log` facade.
pub fn init() {
    log::info!("Lattice Core v{} initialized", VERSION);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
