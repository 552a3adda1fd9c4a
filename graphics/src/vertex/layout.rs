//! Buffer layout mini-language.
//!
//! A layout string describes the byte structure of one record in a vertex
//! buffer. It is a whitespace separated list of tokens followed by an
//! optional usage suffix:
//!
//! ```text
//! [count]type[width] [[count]type[width] ...] [/usage]
//! ```
//!
//! | type | meaning        | widths (default)   |
//! |------|----------------|--------------------|
//! | `f`  | float          | 1, 2, 4, 8 (4)     |
//! | `i`  | signed int     | 1, 2, 4 (4)        |
//! | `u`  | unsigned int   | 1, 2, 4 (4)        |
//! | `d`  | double         | 8 (8)              |
//! | `x`  | padding bytes  | 1-9 (1)            |
//!
//! A width of `1` on `f`, `i` or `u` marks the element as normalized. The
//! usage suffix selects the divisor of every element: `/v` per vertex (the
//! default), `/i` per instance, `/r` once per render.
//!
//! # Example
//!
//! ```ignore
//! let layout = BufferLayout::parse("3f 4f1 2x4 2f/i")?;
//! assert_eq!(layout.stride(), 12 + 4 + 8 + 8);
//! assert_eq!(layout.attribute_count(), 3);
//! ```

use std::fmt;
use std::str::FromStr;

use lattice_core::profiling::profile_scope;

use crate::error::GraphicsError;

/// Per-component storage type of a layout element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentType {
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    F16,
    F32,
    F64,
}

impl ComponentType {
    /// Size of one component in bytes.
    pub fn size(&self) -> u32 {
        match self {
            Self::I8 | Self::U8 => 1,
            Self::I16 | Self::U16 | Self::F16 => 2,
            Self::I32 | Self::U32 | Self::F32 => 4,
            Self::F64 => 8,
        }
    }
}

/// What a layout element feeds into the shader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    Float,
    Int,
    UInt,
    Double,
    /// Skipped bytes, bound to nothing.
    Padding,
}

/// Advance rate of every element in a layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Divisor {
    /// Successive records feed successive vertices.
    #[default]
    PerVertex,
    /// Successive records feed successive instances.
    PerInstance,
    /// The first record feeds every vertex of every instance.
    PerRender,
}

impl Divisor {
    /// Native divisor value.
    pub fn value(&self) -> u32 {
        match self {
            Self::PerVertex => 0,
            Self::PerInstance => 1,
            Self::PerRender => 0x7fff_ffff,
        }
    }
}

/// One parsed token of a layout string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LayoutElement {
    pub kind: ElementKind,
    pub component: ComponentType,
    /// Number of components.
    pub count: u32,
    /// Total size in bytes (`count * component size`).
    pub size: u32,
    pub normalize: bool,
    /// Byte offset from the start of the record.
    pub offset: u32,
    pub divisor: u32,
}

impl LayoutElement {
    /// Whether this element only skips bytes.
    pub fn is_padding(&self) -> bool {
        self.kind == ElementKind::Padding
    }
}

/// A parsed layout string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BufferLayout {
    source: String,
    elements: Vec<LayoutElement>,
    stride: u32,
    divisor: Divisor,
}

impl BufferLayout {
    /// Parse a layout string.
    ///
    /// # Errors
    ///
    /// Returns [`GraphicsError::MalformedLayout`] for an empty layout, an
    /// unknown type code, a zero count or width, an unsupported width, tokens
    /// that are not separated by whitespace, or an unknown usage suffix.
    pub fn parse(layout: &str) -> Result<Self, GraphicsError> {
        profile_scope!("layout_parse");

        let (body, divisor) = match layout.split_once('/') {
            Some((body, suffix)) => (body, parse_divisor(layout, suffix)?),
            None => (layout, Divisor::PerVertex),
        };

        let mut elements = Vec::new();
        let mut offset = 0u32;
        for token in body.split_whitespace() {
            let element = parse_token(layout, token, offset, divisor)?;
            offset = offset
                .checked_add(element.size)
                .ok_or_else(|| GraphicsError::malformed(layout, "stride overflows"))?;
            elements.push(element);
        }

        if elements.is_empty() {
            return Err(GraphicsError::malformed(layout, "layout has no elements"));
        }

        Ok(Self {
            source: layout.to_string(),
            elements,
            stride: offset,
            divisor,
        })
    }

    /// The string this layout was parsed from.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// All elements in declaration order, padding included.
    pub fn elements(&self) -> &[LayoutElement] {
        &self.elements
    }

    /// Elements that bind an attribute.
    pub fn attributes(&self) -> impl Iterator<Item = &LayoutElement> {
        self.elements.iter().filter(|element| !element.is_padding())
    }

    /// Number of elements that bind an attribute.
    pub fn attribute_count(&self) -> usize {
        self.attributes().count()
    }

    /// Size of one record in bytes.
    pub fn stride(&self) -> u32 {
        self.stride
    }

    pub fn divisor(&self) -> Divisor {
        self.divisor
    }

    /// Whether records advance per vertex.
    pub fn is_per_vertex(&self) -> bool {
        self.divisor == Divisor::PerVertex
    }

    /// Number of whole records that fit in `buffer_size` bytes.
    pub fn record_count(&self, buffer_size: u64) -> u64 {
        buffer_size / u64::from(self.stride)
    }
}

impl FromStr for BufferLayout {
    type Err = GraphicsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for BufferLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn parse_divisor(layout: &str, suffix: &str) -> Result<Divisor, GraphicsError> {
    match suffix.trim() {
        "v" => Ok(Divisor::PerVertex),
        "i" => Ok(Divisor::PerInstance),
        "r" => Ok(Divisor::PerRender),
        other => Err(GraphicsError::malformed(
            layout,
            format!("unknown usage suffix \"/{other}\""),
        )),
    }
}

fn parse_token(
    layout: &str,
    token: &str,
    offset: u32,
    divisor: Divisor,
) -> Result<LayoutElement, GraphicsError> {
    let digits_end = token
        .find(|c: char| !c.is_ascii_digit())
        .ok_or_else(|| GraphicsError::malformed(layout, format!("\"{token}\" has no type code")))?;

    let count = if digits_end == 0 {
        1
    } else {
        let count: u32 = token[..digits_end].parse().map_err(|_| {
            GraphicsError::malformed(layout, format!("\"{token}\" has an invalid count"))
        })?;
        if count == 0 {
            return Err(GraphicsError::malformed(
                layout,
                format!("\"{token}\" count must be positive"),
            ));
        }
        count
    };

    let mut chars = token[digits_end..].chars();
    let code = chars
        .next()
        .ok_or_else(|| GraphicsError::malformed(layout, format!("\"{token}\" has no type code")))?;

    let width = match chars.as_str() {
        "" => None,
        rest if rest.len() == 1 && rest.as_bytes()[0].is_ascii_digit() => {
            Some(u32::from(rest.as_bytes()[0] - b'0'))
        }
        rest => {
            return Err(GraphicsError::malformed(
                layout,
                format!("unexpected \"{rest}\" after type code in \"{token}\""),
            ));
        }
    };

    let unsupported = |kind: &str| {
        GraphicsError::malformed(
            layout,
            format!("\"{token}\": unsupported width for {kind}"),
        )
    };

    let (kind, component) = match code {
        'f' => {
            let component = match width.unwrap_or(4) {
                1 => ComponentType::U8,
                2 => ComponentType::F16,
                4 => ComponentType::F32,
                8 => ComponentType::F64,
                _ => return Err(unsupported("float")),
            };
            (ElementKind::Float, component)
        }
        'i' => {
            let component = match width.unwrap_or(4) {
                1 => ComponentType::I8,
                2 => ComponentType::I16,
                4 => ComponentType::I32,
                _ => return Err(unsupported("int")),
            };
            (ElementKind::Int, component)
        }
        'u' => {
            let component = match width.unwrap_or(4) {
                1 => ComponentType::U8,
                2 => ComponentType::U16,
                4 => ComponentType::U32,
                _ => return Err(unsupported("unsigned int")),
            };
            (ElementKind::UInt, component)
        }
        'd' => match width.unwrap_or(8) {
            8 => (ElementKind::Double, ComponentType::F64),
            _ => return Err(unsupported("double")),
        },
        'x' => {
            let width = width.unwrap_or(1);
            if width == 0 {
                return Err(unsupported("padding"));
            }
            let size = count
                .checked_mul(width)
                .ok_or_else(|| GraphicsError::malformed(layout, "stride overflows"))?;
            return Ok(LayoutElement {
                kind: ElementKind::Padding,
                component: ComponentType::U8,
                count,
                size,
                normalize: false,
                offset,
                divisor: divisor.value(),
            });
        }
        other => {
            return Err(GraphicsError::malformed(
                layout,
                format!("unknown type code '{other}' in \"{token}\""),
            ));
        }
    };

    let size = count
        .checked_mul(component.size())
        .ok_or_else(|| GraphicsError::malformed(layout, "stride overflows"))?;

    Ok(LayoutElement {
        kind,
        component,
        count,
        size,
        normalize: width == Some(1),
        offset,
        divisor: divisor.value(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offsets(layout: &BufferLayout) -> Vec<u32> {
        layout.attributes().map(|e| e.offset).collect()
    }

    #[test]
    fn test_two_floats() {
        let layout = BufferLayout::parse("2f 4f").unwrap();
        assert_eq!(layout.stride(), 24);
        assert_eq!(layout.attribute_count(), 2);
        assert_eq!(offsets(&layout), vec![0, 8]);
        assert!(layout.is_per_vertex());
    }

    #[test]
    fn test_explicit_vertex_usage() {
        let layout = BufferLayout::parse("3f 2i/v").unwrap();
        assert_eq!(layout.stride(), 20);
        assert_eq!(layout.attribute_count(), 2);
        assert_eq!(offsets(&layout), vec![0, 12]);
        assert_eq!(layout.divisor(), Divisor::PerVertex);
    }

    #[test]
    fn test_padding_in_the_middle() {
        let layout = BufferLayout::parse("3f 2i 4f 10x 4f").unwrap();
        assert_eq!(layout.stride(), 62);
        assert_eq!(layout.attribute_count(), 4);
        assert_eq!(layout.elements().len(), 5);
        assert_eq!(offsets(&layout), vec![0, 12, 20, 46]);
    }

    #[test]
    fn test_normalized_byte_with_padding() {
        let layout = BufferLayout::parse("3f1 x").unwrap();
        assert_eq!(layout.stride(), 4);
        assert_eq!(layout.attribute_count(), 1);
        let color = layout.attributes().next().unwrap();
        assert!(color.normalize);
        assert_eq!(color.component, ComponentType::U8);
    }

    #[test]
    fn test_padding_width() {
        let layout = BufferLayout::parse("2x4 3f").unwrap();
        assert_eq!(layout.stride(), 20);
        assert!(layout.elements()[0].is_padding());
        assert_eq!(offsets(&layout), vec![8]);
    }

    #[test]
    fn test_widths() {
        let layout = BufferLayout::parse("2f2 4u2 i1 d 3f8").unwrap();
        let components: Vec<_> = layout.elements().iter().map(|e| e.component).collect();
        assert_eq!(
            components,
            vec![
                ComponentType::F16,
                ComponentType::U16,
                ComponentType::I8,
                ComponentType::F64,
                ComponentType::F64
            ]
        );
        assert_eq!(layout.stride(), 4 + 8 + 1 + 8 + 24);
        assert!(layout.elements()[2].normalize);
        assert!(!layout.elements()[1].normalize);
        assert_eq!(layout.elements()[3].kind, ElementKind::Double);
    }

    #[test]
    fn test_usage_suffixes() {
        let instanced = BufferLayout::parse("16f/i").unwrap();
        assert!(instanced.attributes().all(|e| e.divisor == 1));

        let per_render = BufferLayout::parse("4f /r").unwrap();
        assert!(per_render.attributes().all(|e| e.divisor == 0x7fff_ffff));

        let per_vertex = BufferLayout::parse("4f 2f").unwrap();
        assert!(per_vertex.attributes().all(|e| e.divisor == 0));
    }

    #[test]
    fn test_record_count() {
        let layout = BufferLayout::parse("2f 4f").unwrap();
        assert_eq!(layout.record_count(24 * 3), 3);
        assert_eq!(layout.record_count(24 * 3 + 10), 3);
    }

    #[test]
    fn test_round_trip() {
        let text = "3f 2x4 4u1/i";
        let layout: BufferLayout = text.parse().unwrap();
        assert_eq!(layout.to_string(), text);
        assert_eq!(BufferLayout::parse(&layout.to_string()).unwrap(), layout);
    }

    #[test]
    fn test_malformed() {
        for text in [
            "", "   ", "3f2i", "3z", "3fz", "0f", "f0", "x0", "f3", "i8", "u8", "d4", "f16",
            "3", "4f/q", "4f/", "4f/i/v", "/i",
        ] {
            let err = BufferLayout::parse(text).unwrap_err();
            assert!(
                matches!(err, GraphicsError::MalformedLayout { .. }),
                "{text:?} should be malformed, got {err:?}"
            );
        }
    }
}
