//! Device configuration.

use crate::types::{BlendEquation, BlendFunc, EnableFlags};

/// Limits enforced by a [`GraphicsDevice`](crate::GraphicsDevice).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceCapabilities {
    /// Number of vertex attribute locations.
    pub max_vertex_attributes: u32,
    /// Number of texture slots.
    pub max_texture_units: u32,
    /// Maximum texture width or height.
    pub max_texture_size: u32,
    pub max_color_attachments: u32,
    /// Maximum buffer size in bytes.
    pub max_buffer_size: u64,
    pub max_samples: u32,
}

impl Default for DeviceCapabilities {
    fn default() -> Self {
        Self {
            max_vertex_attributes: 16,
            max_texture_units: 32,
            max_texture_size: 16384,
            max_color_attachments: 8,
            max_buffer_size: 1 << 30, // 1 GB
            max_samples: 16,
        }
    }
}

/// Configuration for creating a [`GraphicsDevice`](crate::GraphicsDevice).
///
/// The blend and enable settings are applied to the backend when the device
/// is created.
///
/// # Example
///
/// ```ignore
/// let config = DeviceConfig::default()
///     .with_name("offscreen")
///     .with_enabled(EnableFlags::DEPTH_TEST | EnableFlags::BLEND)
///     .with_blend_func(BlendFunc::alpha_blending());
/// let (device, backend) = GraphicsDevice::headless_with(config)?;
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceConfig {
    pub name: String,
    pub capabilities: DeviceCapabilities,
    pub enabled: EnableFlags,
    pub blend_func: BlendFunc,
    pub blend_equation: BlendEquation,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            name: "Lattice Device".to_string(),
            capabilities: DeviceCapabilities::default(),
            enabled: EnableFlags::empty(),
            blend_func: BlendFunc::default(),
            blend_equation: BlendEquation::default(),
        }
    }
}

impl DeviceConfig {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_capabilities(mut self, capabilities: DeviceCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Set the initially enabled capabilities.
    pub fn with_enabled(mut self, enabled: EnableFlags) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_blend_func(mut self, blend_func: BlendFunc) -> Self {
        self.blend_func = blend_func;
        self
    }

    pub fn with_blend_equation(mut self, blend_equation: BlendEquation) -> Self {
        self.blend_equation = blend_equation;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_limits() {
        let caps = DeviceCapabilities::default();
        assert_eq!(caps.max_vertex_attributes, 16);
        assert_eq!(caps.max_texture_units, 32);
        assert_eq!(caps.max_buffer_size, 1 << 30);
    }

    #[test]
    fn test_builder() {
        let config = DeviceConfig::default()
            .with_name("test")
            .with_enabled(EnableFlags::BLEND)
            .with_blend_func(BlendFunc::alpha_blending());
        assert_eq!(config.name, "test");
        assert!(config.enabled.contains(EnableFlags::BLEND));
        assert_eq!(config.blend_func, BlendFunc::alpha_blending());
    }
}
