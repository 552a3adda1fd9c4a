//! Logger initialisation.
//!
//! Library code only talks to the `log` facade. Binaries and tests call
//! [`init_logging`] once to install an `env_logger` backend.
//!
//! ```ignore
//! use lattice_core::logging::{init_logging, LoggingConfig};
//!
//! init_logging(LoggingConfig::default().with_filter("lattice_graphics=trace"));
//! ```

use std::sync::Once;

/// Logger configuration.
///
/// `env_filter` uses the `env_logger` filter syntax (e.g. `"info"`,
/// `"lattice_graphics=debug,lattice_core=warn"`). When it is `None` the
/// `RUST_LOG` environment variable is consulted, then `info` is used.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub env_filter: Option<String>,
    pub write_style: env_logger::WriteStyle,
    /// Route output through the test harness capture instead of stderr.
    pub is_test: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            env_filter: None,
            write_style: env_logger::WriteStyle::Auto,
            is_test: false,
        }
    }
}

impl LoggingConfig {
    /// Configuration suitable for `#[test]` functions.
    pub fn for_tests() -> Self {
        Self {
            is_test: true,
            ..Self::default()
        }
    }

    /// Set an explicit filter, overriding `RUST_LOG`.
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.env_filter = Some(filter.into());
        self
    }

    /// Set the ANSI coloring behavior.
    pub fn with_write_style(mut self, style: env_logger::WriteStyle) -> Self {
        self.write_style = style;
        self
    }
}

static INIT: Once = Once::new();

/// Install the global logger.
///
/// Only the first call has an effect; later calls are ignored, so every test
/// can call this without coordinating.
pub fn init_logging(config: LoggingConfig) {
    INIT.call_once(|| {
        let mut builder = env_logger::Builder::new();

        match config.env_filter {
            Some(filter) => {
                builder.parse_filters(&filter);
            }
            None => match std::env::var("RUST_LOG") {
                Ok(filter) => {
                    builder.parse_filters(&filter);
                }
                Err(_) => {
                    builder.filter_level(log::LevelFilter::Info);
                }
            },
        }

        builder.write_style(config.write_style);
        builder.is_test(config.is_test);

        // Another logger may already be installed by the host application.
        if builder.try_init().is_err() {
            log::debug!("logger already installed, keeping the existing one");
            return;
        }

        log::debug!("logging initialized");
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        init_logging(LoggingConfig::for_tests().with_filter("debug"));
        init_logging(LoggingConfig::for_tests().with_filter("trace"));
        log::debug!("still alive");
    }

    #[test]
    fn test_builder_methods() {
        let config = LoggingConfig::default()
            .with_filter("warn")
            .with_write_style(env_logger::WriteStyle::Never);
        assert_eq!(config.env_filter.as_deref(), Some("warn"));
        assert!(!config.is_test);
    }
}
