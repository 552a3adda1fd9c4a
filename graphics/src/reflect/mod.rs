//! Program reflection.
//!
//! [`reflect`] turns the raw introspection records a backend reports for a
//! linked program into typed, immutable tables. Vertex binding matches
//! against [`ProgramReflection::attributes`], uniform uploads and render
//! scripts look up [`ProgramReflection::uniforms`].
//!
//! # Example
//!
//! ```ignore
//! let reflection = reflect(&raw)?;
//! let position = reflection.attribute("in_position").unwrap();
//! assert_eq!(position.location, 0);
//! ```

mod types;

pub use types::{attribute_type, uniform_type, GpuType, ScalarKind, TypeInfo};

use std::ops::Range;

use crate::backend::RawProgramInfo;
use crate::error::GraphicsError;
use crate::shader::ShaderStage;

/// An active vertex attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub info: TypeInfo,
    /// First location.
    pub location: u32,
    pub array_length: u32,
}

impl Attribute {
    /// Number of consecutive locations the attribute occupies.
    pub fn location_count(&self) -> u32 {
        self.info.rows * self.array_length
    }

    /// The locations the attribute occupies.
    pub fn locations(&self) -> Range<u32> {
        self.location..self.location + self.location_count()
    }
}

/// An active uniform outside of uniform blocks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Uniform {
    pub name: String,
    pub info: TypeInfo,
    pub location: i32,
    pub array_length: u32,
}

impl Uniform {
    /// Byte size of one array element.
    pub fn element_size(&self) -> usize {
        self.info.size as usize
    }

    /// Byte size of the whole uniform.
    pub fn size(&self) -> usize {
        self.element_size() * self.array_length as usize
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformBlock {
    pub name: String,
    pub index: u32,
    pub size: u32,
}

/// A transform-feedback output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Varying {
    pub name: String,
    pub info: TypeInfo,
    pub array_length: u32,
    /// Capture position in the feedback buffer.
    pub index: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subroutine {
    pub name: String,
    pub index: u32,
    pub stage: ShaderStage,
}

/// Typed tables describing a linked program.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgramReflection {
    /// Sorted by location.
    pub attributes: Vec<Attribute>,
    pub uniforms: Vec<Uniform>,
    pub uniform_blocks: Vec<UniformBlock>,
    pub varyings: Vec<Varying>,
    pub subroutines: Vec<Subroutine>,
}

impl ProgramReflection {
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn uniform(&self, name: &str) -> Option<&Uniform> {
        self.uniforms.iter().find(|u| u.name == name)
    }

    pub fn uniform_block(&self, name: &str) -> Option<&UniformBlock> {
        self.uniform_blocks.iter().find(|b| b.name == name)
    }

    pub fn varying(&self, name: &str) -> Option<&Varying> {
        self.varyings.iter().find(|v| v.name == name)
    }

    /// Look up a subroutine of one stage.
    pub fn subroutine(&self, stage: ShaderStage, name: &str) -> Option<&Subroutine> {
        self.subroutines
            .iter()
            .find(|s| s.stage == stage && s.name == name)
    }
}

/// Strip a trailing array subscript such as `[0]` from a reported name.
pub fn clean_glsl_name(name: &str) -> &str {
    if name.ends_with(']') {
        if let Some(open) = name.rfind('[') {
            return &name[..open];
        }
    }
    name
}

/// Build typed reflection tables from raw introspection data.
///
/// Attributes and uniforms without a valid location are skipped.
///
/// # Errors
///
/// - [`GraphicsError::UnknownTypeCode`] when a resource has a type outside
///   the lookup tables.
/// - [`GraphicsError::LocationConflict`] when two attributes occupy the
///   same location.
pub fn reflect(raw: &RawProgramInfo) -> Result<ProgramReflection, GraphicsError> {
    let mut attributes = Vec::with_capacity(raw.attributes.len());
    for resource in &raw.attributes {
        if resource.location < 0 {
            continue;
        }
        let name = clean_glsl_name(&resource.name);
        let info = attribute_type(resource.type_code).ok_or_else(|| {
            GraphicsError::UnknownTypeCode {
                name: name.to_string(),
                code: resource.type_code,
            }
        })?;
        attributes.push(Attribute {
            name: name.to_string(),
            info,
            location: resource.location as u32,
            array_length: resource.array_length.max(1),
        });
    }
    attributes.sort_by_key(|a| a.location);
    for pair in attributes.windows(2) {
        if pair[0].locations().end > pair[1].location {
            return Err(GraphicsError::LocationConflict {
                name: pair[1].name.clone(),
                location: pair[1].location,
            });
        }
    }

    let mut uniforms = Vec::with_capacity(raw.uniforms.len());
    for resource in &raw.uniforms {
        if resource.location < 0 {
            continue;
        }
        let name = clean_glsl_name(&resource.name);
        let info =
            uniform_type(resource.type_code).ok_or_else(|| GraphicsError::UnknownTypeCode {
                name: name.to_string(),
                code: resource.type_code,
            })?;
        uniforms.push(Uniform {
            name: name.to_string(),
            info,
            location: resource.location,
            array_length: resource.array_length.max(1),
        });
    }

    let uniform_blocks = raw
        .uniform_blocks
        .iter()
        .map(|block| UniformBlock {
            name: clean_glsl_name(&block.name).to_string(),
            index: block.index,
            size: block.data_size,
        })
        .collect();

    let mut varyings = Vec::with_capacity(raw.varyings.len());
    for (index, varying) in raw.varyings.iter().enumerate() {
        let name = clean_glsl_name(&varying.name);
        let info =
            uniform_type(varying.type_code).ok_or_else(|| GraphicsError::UnknownTypeCode {
                name: name.to_string(),
                code: varying.type_code,
            })?;
        varyings.push(Varying {
            name: name.to_string(),
            info,
            array_length: varying.array_length.max(1),
            index: index as u32,
        });
    }

    let subroutines = raw
        .subroutines
        .iter()
        .map(|subroutine| Subroutine {
            name: subroutine.name.clone(),
            index: subroutine.index,
            stage: subroutine.stage,
        })
        .collect();

    log::trace!(
        "Reflect: {} attributes, {} uniforms, {} blocks, {} varyings",
        attributes.len(),
        uniforms.len(),
        raw.uniform_blocks.len(),
        varyings.len()
    );

    Ok(ProgramReflection {
        attributes,
        uniforms,
        uniform_blocks,
        varyings,
        subroutines,
    })
}
