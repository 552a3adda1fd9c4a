//! Shader sources and composition.
//!
//! A single GLSL file can hold every stage of a program. Stage bodies are
//! guarded by marker macros that [`ShaderSource::stage`] defines when it
//! emits the source for one stage:
//!
//! ```glsl
//! #version 330
//!
//! #if defined VERTEX_SHADER
//! in vec3 in_position;
//! void main() { gl_Position = vec4(in_position, 1.0); }
//! #elif defined FRAGMENT_SHADER
//! out vec4 f_color;
//! void main() { f_color = vec4(1.0); }
//! #endif
//! ```
//!
//! A source that mentions no marker at all is a generic single-stage shader.
//!
//! [`ShaderComposer`] resolves `#include` directives against registered
//! modules before the source is split into stages.
//!
//! # Example
//!
//! ```ignore
//! let mut composer = ShaderComposer::new();
//! composer.register_include("lattice/color.glsl", COLOR_HELPERS);
//!
//! let descriptor = composer.compose(source, &[("MAX_LIGHTS", ShaderDef::Int(8))])?;
//! let program = device.create_program(&descriptor)?;
//! ```

use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::error::GraphicsError;

/// Programmable pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ShaderStage {
    Vertex,
    Fragment,
    Geometry,
    TessControl,
    TessEvaluation,
}

impl ShaderStage {
    /// All stages in pipeline order.
    pub const ALL: [ShaderStage; 5] = [
        Self::Vertex,
        Self::TessControl,
        Self::TessEvaluation,
        Self::Geometry,
        Self::Fragment,
    ];

    /// Macro that guards this stage in a multi-stage source.
    pub fn marker(self) -> &'static str {
        match self {
            Self::Vertex => "VERTEX_SHADER",
            Self::Fragment => "FRAGMENT_SHADER",
            Self::Geometry => "GEOMETRY_SHADER",
            Self::TessControl => "TESS_CONTROL_SHADER",
            Self::TessEvaluation => "TESS_EVALUATION_SHADER",
        }
    }
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Vertex => "vertex",
            Self::Fragment => "fragment",
            Self::Geometry => "geometry",
            Self::TessControl => "tessellation control",
            Self::TessEvaluation => "tessellation evaluation",
        };
        f.write_str(name)
    }
}

// ============================================================================
// ShaderSource
// ============================================================================

/// A parsed single-file GLSL source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderSource {
    version: u32,
    body: String,
    generic_stage: ShaderStage,
}

impl ShaderSource {
    /// Parse a source whose first line is `#version N`.
    pub fn parse(source: &str) -> Result<Self, GraphicsError> {
        let source = source.trim();
        let (first, body) = source.split_once('\n').unwrap_or((source, ""));

        let version = first
            .trim()
            .strip_prefix("#version")
            .ok_or_else(|| {
                GraphicsError::ShaderSource("#version must appear on the first line".into())
            })?
            .split_whitespace()
            .next()
            .and_then(|v| v.parse::<u32>().ok())
            .ok_or_else(|| GraphicsError::ShaderSource(format!("invalid version line \"{first}\"")))?;

        Ok(Self {
            version,
            body: body.to_string(),
            generic_stage: ShaderStage::Vertex,
        })
    }

    /// Stage a source without markers is compiled as (vertex by default).
    pub fn with_generic_stage(mut self, stage: ShaderStage) -> Self {
        self.generic_stage = stage;
        self
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    /// Source without the version line.
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Whether the body mentions the stage marker.
    pub fn has_stage(&self, stage: ShaderStage) -> bool {
        self.body.contains(stage.marker())
    }

    fn is_generic(&self) -> bool {
        !ShaderStage::ALL.iter().any(|stage| self.has_stage(*stage))
    }

    /// Stages this source provides, in pipeline order.
    pub fn stages(&self) -> Vec<ShaderStage> {
        if self.is_generic() {
            return vec![self.generic_stage];
        }
        ShaderStage::ALL
            .iter()
            .copied()
            .filter(|stage| self.has_stage(*stage))
            .collect()
    }

    /// Emit the source of one stage, or `None` if the stage is absent.
    ///
    /// The output is the version line, the stage marker, one `#define` per
    /// entry of `defines`, a `#line` directive, then the body. Generic
    /// sources omit the stage marker.
    pub fn stage(&self, stage: ShaderStage, defines: &[(String, String)]) -> Option<String> {
        let marker = if self.has_stage(stage) {
            Some(stage.marker())
        } else if self.is_generic() && stage == self.generic_stage {
            None
        } else {
            return None;
        };

        let mut out = format!("#version {}\n", self.version);
        if let Some(marker) = marker {
            out.push_str(&format!("#define {marker}\n"));
        }
        for (name, value) in defines {
            if value.is_empty() {
                out.push_str(&format!("#define {name}\n"));
            } else {
                out.push_str(&format!("#define {name} {value}\n"));
            }
        }
        // The body starts on the second line of the original file.
        out.push_str("#line 2\n");
        out.push_str(&self.body);
        Some(out)
    }

    /// Names of the `out` declarations in the body.
    pub fn outputs(&self) -> Vec<String> {
        self.body
            .lines()
            .filter_map(|line| {
                let line = strip_layout_qualifier(line.trim());
                let mut words = line.split_whitespace();
                if words.next() != Some("out") {
                    return None;
                }
                let _ty = words.next()?;
                let name = words.next()?.trim_end_matches(';');
                let name = name.split('[').next().unwrap_or(name);
                (!name.is_empty()).then(|| name.to_string())
            })
            .collect()
    }
}

fn strip_layout_qualifier(line: &str) -> &str {
    if let Some(rest) = line.strip_prefix("layout") {
        if let Some(close) = rest.find(')') {
            return rest[close + 1..].trim_start();
        }
    }
    line
}

// ============================================================================
// ProgramDescriptor
// ============================================================================

/// Stage sources and link options for a program.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgramDescriptor {
    /// Debug label for the program.
    pub label: Option<String>,
    pub stages: Vec<(ShaderStage, String)>,
    /// Transform-feedback outputs, in capture order.
    pub varyings: Vec<String>,
}

impl ProgramDescriptor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a descriptor with every stage present in `source`.
    pub fn from_source(source: &ShaderSource, defines: &[(String, String)]) -> Self {
        let stages = source
            .stages()
            .into_iter()
            .filter_map(|stage| source.stage(stage, defines).map(|text| (stage, text)))
            .collect();
        Self {
            label: None,
            stages,
            varyings: Vec::new(),
        }
    }

    /// Add or replace one stage.
    pub fn with_stage(mut self, stage: ShaderStage, source: impl Into<String>) -> Self {
        self.stages.retain(|(s, _)| *s != stage);
        self.stages.push((stage, source.into()));
        self
    }

    pub fn with_varyings<I, S>(mut self, varyings: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.varyings = varyings.into_iter().map(Into::into).collect();
        self
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn stage_source(&self, stage: ShaderStage) -> Option<&str> {
        self.stages
            .iter()
            .find(|(s, _)| *s == stage)
            .map(|(_, text)| text.as_str())
    }
}

// ============================================================================
// ShaderComposer
// ============================================================================

/// Resolves `#include` directives against registered modules.
///
/// ```glsl
/// #include "lattice/color.glsl"
/// #include <lattice/noise.glsl>
/// ```
///
/// A module is expanded at most once per composition, later includes of the
/// same path are dropped.
#[derive(Debug, Clone, Default)]
pub struct ShaderComposer {
    /// Registered include sources: path -> source text.
    includes: HashMap<String, String>,
}

impl ShaderComposer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a single include source.
    ///
    /// The path is what appears in `#include "path"` directives.
    pub fn register_include(&mut self, path: &str, source: &str) {
        self.includes.insert(path.to_string(), source.to_string());
    }

    pub fn has_include(&self, path: &str) -> bool {
        self.includes.contains_key(path)
    }

    /// Expand every `#include` in `source`.
    pub fn resolve(&self, source: &str) -> Result<String, GraphicsError> {
        let mut included = HashSet::new();
        self.resolve_includes(source, &mut included)
    }

    /// Turn user shader definitions into `(name, value)` defines.
    ///
    /// `Bool(false)` entries are omitted.
    pub fn build_defines(shader_defs: &[(&str, ShaderDef)]) -> Vec<(String, String)> {
        let mut defines = Vec::new();
        for (name, def) in shader_defs {
            match def {
                ShaderDef::Bool(true) => defines.push((name.to_string(), String::new())),
                ShaderDef::Bool(false) => {}
                ShaderDef::Int(v) => defines.push((name.to_string(), v.to_string())),
                ShaderDef::UInt(v) => defines.push((name.to_string(), v.to_string())),
            }
        }
        defines
    }

    /// Resolve includes, split the result into stages and apply defines.
    pub fn compose(
        &self,
        source: &str,
        shader_defs: &[(&str, ShaderDef)],
    ) -> Result<ProgramDescriptor, GraphicsError> {
        let resolved = self.resolve(source)?;
        let parsed = ShaderSource::parse(&resolved)?;
        let defines = Self::build_defines(shader_defs);
        Ok(ProgramDescriptor::from_source(&parsed, &defines))
    }

    /// Resolve `#include "path"` directives recursively.
    fn resolve_includes(
        &self,
        source: &str,
        included: &mut HashSet<String>,
    ) -> Result<String, GraphicsError> {
        let mut result = String::with_capacity(source.len());

        for line in source.lines() {
            if let Some(path) = parse_include_directive(line.trim()) {
                if !included.insert(path.to_string()) {
                    continue;
                }

                let include_source = self.includes.get(path).ok_or_else(|| {
                    GraphicsError::ShaderSource(format!("include not found: \"{path}\""))
                })?;

                let resolved = self.resolve_includes(include_source, included)?;
                result.push_str(&resolved);
            } else {
                result.push_str(line);
                result.push('\n');
            }
        }

        Ok(result)
    }
}

/// Parse a `#include "path"` directive, returning the path if found.
fn parse_include_directive(line: &str) -> Option<&str> {
    let rest = line.strip_prefix("#include")?.trim();
    if let Some(inner) = rest.strip_prefix('"') {
        inner.strip_suffix('"')
    } else if let Some(inner) = rest.strip_prefix('<') {
        inner.strip_suffix('>')
    } else {
        None
    }
}

/// Shader definition value for compile-time conditionals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderDef {
    /// Boolean definition (`#ifdef`, `#ifndef`).
    Bool(bool),
    /// Integer definition (`#if VAR == 5`).
    Int(i32),
    UInt(u32),
}

impl From<bool> for ShaderDef {
    fn from(v: bool) -> Self {
        ShaderDef::Bool(v)
    }
}

impl From<i32> for ShaderDef {
    fn from(v: i32) -> Self {
        ShaderDef::Int(v)
    }
}

impl From<u32> for ShaderDef {
    fn from(v: u32) -> Self {
        ShaderDef::UInt(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MULTI_STAGE: &str = r#"
#version 330

#if defined VERTEX_SHADER
in vec2 in_vert;
out vec2 v_uv;
void main() { gl_Position = vec4(in_vert, 0.0, 1.0); }
#elif defined FRAGMENT_SHADER
layout(location = 0) out vec4 f_color;
void main() { f_color = vec4(1.0); }
#endif
"#;

    #[test]
    fn test_parse_version() {
        let source = ShaderSource::parse(MULTI_STAGE).unwrap();
        assert_eq!(source.version(), 330);
        assert!(!source.body().contains("#version"));
    }

    #[test]
    fn test_missing_version() {
        let err = ShaderSource::parse("void main() {}").unwrap_err();
        assert!(matches!(err, GraphicsError::ShaderSource(_)));
        assert!(ShaderSource::parse("#version abc\nvoid main() {}").is_err());
    }

    #[test]
    fn test_stage_output() {
        let source = ShaderSource::parse(MULTI_STAGE).unwrap();
        let defines = vec![("MAX_LIGHTS".to_string(), "4".to_string())];

        let vertex = source.stage(ShaderStage::Vertex, &defines).unwrap();
        let mut lines = vertex.lines();
        assert_eq!(lines.next(), Some("#version 330"));
        assert_eq!(lines.next(), Some("#define VERTEX_SHADER"));
        assert_eq!(lines.next(), Some("#define MAX_LIGHTS 4"));
        assert_eq!(lines.next(), Some("#line 2"));

        assert!(source.stage(ShaderStage::Fragment, &[]).is_some());
        assert!(source.stage(ShaderStage::Geometry, &[]).is_none());
        assert_eq!(
            source.stages(),
            vec![ShaderStage::Vertex, ShaderStage::Fragment]
        );
    }

    #[test]
    fn test_generic_source() {
        let source = ShaderSource::parse("#version 430\nvoid main() {}")
            .unwrap()
            .with_generic_stage(ShaderStage::Fragment);
        assert_eq!(source.stages(), vec![ShaderStage::Fragment]);
        let text = source.stage(ShaderStage::Fragment, &[]).unwrap();
        assert!(!text.contains("FRAGMENT_SHADER"));
        assert!(source.stage(ShaderStage::Vertex, &[]).is_none());
    }

    #[test]
    fn test_outputs() {
        let source = ShaderSource::parse(MULTI_STAGE).unwrap();
        assert_eq!(source.outputs(), vec!["v_uv", "f_color"]);
    }

    #[test]
    fn test_include_resolution() {
        let mut composer = ShaderComposer::new();
        composer.register_include("lattice/shared.glsl", "const float SCALE = 2.0;");
        composer.register_include(
            "lattice/outer.glsl",
            "#include \"lattice/shared.glsl\"\nfloat scaled(float x) { return x * SCALE; }",
        );
        assert!(composer.has_include("lattice/outer.glsl"));

        let resolved = composer
            .resolve("#version 330\n#include <lattice/outer.glsl>\n#include \"lattice/shared.glsl\"\nvoid main() {}")
            .unwrap();
        assert_eq!(resolved.matches("const float SCALE").count(), 1);
        assert!(resolved.contains("float scaled"));
    }

    #[test]
    fn test_missing_include() {
        let composer = ShaderComposer::new();
        let result = composer.resolve("#version 330\n#include \"nope.glsl\"\n");
        assert!(matches!(result, Err(GraphicsError::ShaderSource(_))));
    }

    #[test]
    fn test_build_defines() {
        let defines = ShaderComposer::build_defines(&[
            ("USE_FOG", ShaderDef::Bool(true)),
            ("USE_SHADOWS", ShaderDef::Bool(false)),
            ("MAX_LIGHTS", ShaderDef::Int(8)),
            ("LAYERS", 3u32.into()),
        ]);
        assert_eq!(
            defines,
            vec![
                ("USE_FOG".to_string(), String::new()),
                ("MAX_LIGHTS".to_string(), "8".to_string()),
                ("LAYERS".to_string(), "3".to_string()),
            ]
        );
    }

    #[test]
    fn test_compose() {
        let composer = ShaderComposer::new();
        let descriptor = composer
            .compose(MULTI_STAGE, &[("USE_FOG", ShaderDef::Bool(true))])
            .unwrap()
            .with_label("quad");
        assert_eq!(descriptor.stages.len(), 2);
        assert!(descriptor
            .stage_source(ShaderStage::Vertex)
            .unwrap()
            .contains("#define USE_FOG\n"));
        assert!(descriptor.stage_source(ShaderStage::Geometry).is_none());
    }

    #[test]
    fn test_parse_include_directive() {
        assert_eq!(
            parse_include_directive(r#"#include "foo/bar.glsl""#),
            Some("foo/bar.glsl")
        );
        assert_eq!(
            parse_include_directive(r#"#include <foo/bar.glsl>"#),
            Some("foo/bar.glsl")
        );
        assert_eq!(parse_include_directive("#define FOO"), None);
    }
}
