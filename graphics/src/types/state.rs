//! Fixed-function state: capability flags, blending and primitive modes.

use bitflags::bitflags;

bitflags! {
    /// Device capabilities that can be switched on and off.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct EnableFlags: u32 {
        /// Color blending.
        const BLEND = 1 << 1;
        /// Depth testing.
        const DEPTH_TEST = 1 << 2;
        /// Face culling.
        const CULL_FACE = 1 << 3;
        /// Stencil testing.
        const STENCIL_TEST = 1 << 4;
        /// Discard primitives before rasterization.
        const RASTERIZER_DISCARD = 1 << 5;
        /// Point size is written by the vertex shader.
        const PROGRAM_POINT_SIZE = 1 << 6;
    }
}

impl Default for EnableFlags {
    fn default() -> Self {
        Self::empty()
    }
}

/// Source or destination factor of the blend function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendFactor {
    Zero,
    One,
    SrcColor,
    OneMinusSrcColor,
    DstColor,
    OneMinusDstColor,
    SrcAlpha,
    OneMinusSrcAlpha,
    DstAlpha,
    OneMinusDstAlpha,
    ConstantColor,
    OneMinusConstantColor,
    ConstantAlpha,
    OneMinusConstantAlpha,
    SrcAlphaSaturate,
    Src1Color,
    OneMinusSrc1Color,
    Src1Alpha,
    OneMinusSrc1Alpha,
}

/// Blend factors for the color and alpha channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlendFunc {
    pub src_rgb: BlendFactor,
    pub dst_rgb: BlendFactor,
    pub src_alpha: BlendFactor,
    pub dst_alpha: BlendFactor,
}

impl BlendFunc {
    /// Use the same factors for color and alpha.
    pub fn new(src: BlendFactor, dst: BlendFactor) -> Self {
        Self::separate(src, dst, src, dst)
    }

    /// Separate factors for color and alpha.
    pub fn separate(
        src_rgb: BlendFactor,
        dst_rgb: BlendFactor,
        src_alpha: BlendFactor,
        dst_alpha: BlendFactor,
    ) -> Self {
        Self {
            src_rgb,
            dst_rgb,
            src_alpha,
            dst_alpha,
        }
    }

    /// Standard "over" compositing with straight alpha.
    pub fn alpha_blending() -> Self {
        Self::new(BlendFactor::SrcAlpha, BlendFactor::OneMinusSrcAlpha)
    }
}

impl Default for BlendFunc {
    fn default() -> Self {
        Self::new(BlendFactor::One, BlendFactor::Zero)
    }
}

/// How source and destination are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BlendEquationMode {
    #[default]
    Add,
    Subtract,
    ReverseSubtract,
    Min,
    Max,
}

/// Blend equations for the color and alpha channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BlendEquation {
    pub rgb: BlendEquationMode,
    pub alpha: BlendEquationMode,
}

impl BlendEquation {
    /// Use the same mode for color and alpha.
    pub fn new(mode: BlendEquationMode) -> Self {
        Self {
            rgb: mode,
            alpha: mode,
        }
    }

    /// Separate modes for color and alpha.
    pub fn separate(rgb: BlendEquationMode, alpha: BlendEquationMode) -> Self {
        Self { rgb, alpha }
    }
}

/// Primitive topology of a draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u32)]
pub enum DrawMode {
    Points = 0x0,
    Lines = 0x1,
    LineLoop = 0x2,
    LineStrip = 0x3,
    #[default]
    Triangles = 0x4,
    TriangleStrip = 0x5,
    TriangleFan = 0x6,
    LinesAdjacency = 0xA,
    LineStripAdjacency = 0xB,
    TrianglesAdjacency = 0xC,
    TriangleStripAdjacency = 0xD,
    Patches = 0xE,
}

impl DrawMode {
    /// Native enumeration value.
    pub fn code(self) -> u32 {
        self as u32
    }

    /// Look up a mode by its native value.
    pub fn from_code(code: u32) -> Option<Self> {
        let mode = match code {
            0x0 => Self::Points,
            0x1 => Self::Lines,
            0x2 => Self::LineLoop,
            0x3 => Self::LineStrip,
            0x4 => Self::Triangles,
            0x5 => Self::TriangleStrip,
            0x6 => Self::TriangleFan,
            0xA => Self::LinesAdjacency,
            0xB => Self::LineStripAdjacency,
            0xC => Self::TrianglesAdjacency,
            0xD => Self::TriangleStripAdjacency,
            0xE => Self::Patches,
            _ => return None,
        };
        Some(mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enable_flags_bits() {
        assert_eq!(EnableFlags::BLEND.bits(), 2);
        assert_eq!(EnableFlags::PROGRAM_POINT_SIZE.bits(), 64);
        let flags = EnableFlags::BLEND | EnableFlags::DEPTH_TEST;
        assert!(flags.contains(EnableFlags::DEPTH_TEST));
        assert!(!flags.contains(EnableFlags::CULL_FACE));
    }

    #[test]
    fn test_draw_mode_codes() {
        assert_eq!(DrawMode::Patches.code(), 0xE);
        assert_eq!(DrawMode::from_code(0x4), Some(DrawMode::Triangles));
        assert_eq!(DrawMode::from_code(0x7), None);
    }

    #[test]
    fn test_blend_defaults() {
        let func = BlendFunc::default();
        assert_eq!(func.src_rgb, BlendFactor::One);
        assert_eq!(func.dst_alpha, BlendFactor::Zero);
        assert_eq!(BlendEquation::default().alpha, BlendEquationMode::Add);
    }
}
