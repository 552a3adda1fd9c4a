//! GLSL declaration scanner used by the headless backend.
//!
//! This is not a compiler. It runs a small preprocessor over each stage
//! source, splits the active text into top-level statements and reports the
//! declarations a driver would list for the linked program. Every declared
//! resource is reported as active.

use std::collections::{BTreeSet, HashMap};

use crate::backend::{
    BackendError, RawProgramInfo, RawResource, RawSubroutine, RawUniformBlock, RawVarying,
};
use crate::reflect::{GpuType, ScalarKind};
use crate::shader::{ProgramDescriptor, ShaderStage};

/// Scan every stage of `descriptor` and report the program's resources.
pub(crate) fn introspect(descriptor: &ProgramDescriptor) -> Result<RawProgramInfo, BackendError> {
    let mut scanned = Vec::with_capacity(descriptor.stages.len());
    for (stage, source) in &descriptor.stages {
        let (text, defines) = preprocess(source)?;
        let statements = split_statements(&text);
        scanned.push((*stage, statements, defines));
    }
    scanned.sort_by_key(|(stage, _, _)| *stage);

    let mut info = RawProgramInfo::default();
    let mut attributes = Vec::new();
    let mut uniforms: Vec<Declared> = Vec::new();
    let mut outputs: HashMap<ShaderStage, Vec<Declared>> = HashMap::new();

    for (stage, statements, defines) in &scanned {
        let mut subroutine_index = 0;
        for statement in statements {
            match classify(statement) {
                Statement::Declaration => {
                    let Some(declaration) = parse_declaration(statement, defines)? else {
                        continue;
                    };
                    match declaration.storage {
                        Storage::In if *stage == ShaderStage::Vertex => {
                            attributes.extend(declaration.items)
                        }
                        Storage::Uniform => {
                            for item in declaration.items {
                                if !uniforms.iter().any(|u| u.name == item.name) {
                                    uniforms.push(item);
                                }
                            }
                        }
                        Storage::Out => outputs.entry(*stage).or_default().extend(declaration.items),
                        _ => {}
                    }
                }
                Statement::Block => {
                    if let Some(block) = parse_uniform_block(statement, defines)? {
                        let index = info.uniform_blocks.len() as u32;
                        for member in &block.members {
                            info.uniforms.push(RawResource::new(
                                format!("{}.{}", block.name, member.name),
                                member.ty.code(),
                                -1,
                                member.array_length,
                            ));
                        }
                        info.uniform_blocks.push(RawUniformBlock {
                            name: block.name,
                            index,
                            data_size: block.size,
                        });
                    }
                }
                Statement::Function => {
                    if let Some(name) = subroutine_function_name(statement) {
                        info.subroutines.push(RawSubroutine {
                            name: name.to_string(),
                            index: subroutine_index,
                            stage: *stage,
                        });
                        subroutine_index += 1;
                    }
                }
                Statement::Other => {}
            }
        }
    }

    let attribute_locations = assign_locations(&attributes, |item| item.location_span())?;
    for (item, location) in attributes.iter().zip(attribute_locations) {
        info.attributes.push(item.to_raw(location));
    }
    if let Some((_, statements, _)) = scanned.iter().find(|(s, _, _)| *s == ShaderStage::Vertex) {
        for builtin in ["gl_VertexID", "gl_InstanceID"] {
            if statements.iter().any(|s| s.contains(builtin)) {
                info.attributes
                    .push(RawResource::new(builtin, GpuType::Int.code(), -1, 1));
            }
        }
    }

    let uniform_locations = assign_locations(&uniforms, |item| item.array_length)?;
    for (item, location) in uniforms.iter().zip(uniform_locations) {
        info.uniforms.push(item.to_raw(location));
    }

    for name in &descriptor.varyings {
        let ty = if name == "gl_Position" {
            Some((GpuType::Vec4, 1))
        } else {
            // Transform feedback captures the last stage before rasterization.
            [
                ShaderStage::Geometry,
                ShaderStage::TessEvaluation,
                ShaderStage::Vertex,
            ]
            .iter()
            .filter_map(|stage| outputs.get(stage))
            .find_map(|items| {
                items
                    .iter()
                    .find(|item| &item.name == name)
                    .map(|item| (item.ty, item.array_length))
            })
        };
        let (ty, array_length) = ty.ok_or_else(|| {
            BackendError::CompilationFailed(format!("varying \"{name}\" is not a stage output"))
        })?;
        info.varyings.push(RawVarying {
            name: name.clone(),
            type_code: ty.code(),
            array_length,
        });
    }

    Ok(info)
}

// ============================================================================
// Preprocessor
// ============================================================================

struct Frame {
    parent_active: bool,
    taken: bool,
    active: bool,
}

/// Strip comments and inactive conditional branches.
///
/// Returns the active text and the macros defined at the end of the source.
fn preprocess(source: &str) -> Result<(String, HashMap<String, String>), BackendError> {
    let source = strip_comments(source);
    let mut defines: HashMap<String, String> = HashMap::new();
    let mut stack: Vec<Frame> = Vec::new();
    let mut out = String::with_capacity(source.len());

    for line in source.lines() {
        let active = stack.last().map_or(true, |frame| frame.active);
        let trimmed = line.trim();

        let Some(directive) = trimmed.strip_prefix('#') else {
            if active {
                out.push_str(line);
            }
            out.push('\n');
            continue;
        };
        out.push('\n');

        let directive = directive.trim_start();
        let (keyword, rest) = directive
            .split_once(char::is_whitespace)
            .unwrap_or((directive, ""));
        let rest = rest.trim();

        match keyword {
            "define" if active => {
                let end = rest
                    .find(|c: char| c.is_whitespace() || c == '(')
                    .unwrap_or(rest.len());
                defines.insert(rest[..end].to_string(), rest[end..].trim().to_string());
            }
            "undef" if active => {
                defines.remove(rest);
            }
            "ifdef" | "ifndef" | "if" => {
                let condition = match keyword {
                    "ifdef" => defines.contains_key(rest),
                    "ifndef" => !defines.contains_key(rest),
                    _ => evaluate(rest, &defines),
                };
                stack.push(Frame {
                    parent_active: active,
                    taken: condition,
                    active: active && condition,
                });
            }
            "elif" => {
                let frame = stack
                    .last_mut()
                    .ok_or_else(|| unbalanced("#elif without #if"))?;
                if frame.taken {
                    frame.active = false;
                } else {
                    let condition = evaluate(rest, &defines);
                    frame.active = frame.parent_active && condition;
                    frame.taken = condition;
                }
            }
            "else" => {
                let frame = stack
                    .last_mut()
                    .ok_or_else(|| unbalanced("#else without #if"))?;
                frame.active = frame.parent_active && !frame.taken;
                frame.taken = true;
            }
            "endif" => {
                stack.pop().ok_or_else(|| unbalanced("#endif without #if"))?;
            }
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(unbalanced("unterminated #if"));
    }
    Ok((out, defines))
}

fn unbalanced(message: &str) -> BackendError {
    BackendError::CompilationFailed(message.to_string())
}

/// Evaluate a `#if` expression made of `defined`, `!`, `&&`, `||`, integer
/// literals and macro names.
fn evaluate(expression: &str, defines: &HashMap<String, String>) -> bool {
    expression.split("||").any(|any| {
        any.split("&&").all(|term| {
            let mut term = term.trim();
            let mut negate = false;
            while let Some(inner) = term.strip_prefix('!') {
                negate = !negate;
                term = inner.trim_start();
            }
            let value = if let Some(name) = term.strip_prefix("defined") {
                let name = name.trim().trim_start_matches('(').trim_end_matches(')').trim();
                defines.contains_key(name)
            } else {
                macro_value(term, defines).is_some_and(|v| v != 0)
            };
            value != negate
        })
    })
}

fn macro_value(token: &str, defines: &HashMap<String, String>) -> Option<i64> {
    let mut token = token.trim();
    // Bounded to avoid cycles such as `#define A B` / `#define B A`.
    for _ in 0..16 {
        if let Ok(value) = token.parse::<i64>() {
            return Some(value);
        }
        token = defines.get(token)?.trim();
    }
    None
}

fn strip_comments(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut chars = source.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '/' && chars.peek() == Some(&'/') {
            for c in chars.by_ref() {
                if c == '\n' {
                    out.push('\n');
                    break;
                }
            }
        } else if c == '/' && chars.peek() == Some(&'*') {
            chars.next();
            let mut previous = '\0';
            for c in chars.by_ref() {
                if c == '\n' {
                    out.push('\n');
                }
                if previous == '*' && c == '/' {
                    break;
                }
                previous = c;
            }
        } else {
            out.push(c);
        }
    }
    out
}

// ============================================================================
// Statements
// ============================================================================

/// Split active text into top-level statements.
///
/// A statement ends at a `;` outside braces, or at the closing brace of a
/// function body.
fn split_statements(text: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;

    for c in text.chars() {
        match c {
            '{' => {
                depth += 1;
                current.push(c);
            }
            '}' => {
                depth = depth.saturating_sub(1);
                current.push(c);
                if depth == 0 && classify(&current) == Statement::Function {
                    statements.push(std::mem::take(&mut current).trim().to_string());
                }
            }
            ';' if depth == 0 => {
                let statement = std::mem::take(&mut current);
                let statement = statement.trim();
                if !statement.is_empty() {
                    statements.push(statement.to_string());
                }
            }
            '\n' | '\r' | '\t' => current.push(' '),
            _ => current.push(c),
        }
    }
    statements
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Statement {
    Declaration,
    Block,
    Function,
    Other,
}

fn classify(statement: &str) -> Statement {
    let text = strip_layout(statement.trim());
    let first = text.split_whitespace().next().unwrap_or("");
    match text.find('{') {
        Some(_) if matches!(first, "uniform" | "buffer" | "in" | "out" | "struct") => {
            if first == "uniform" {
                Statement::Block
            } else {
                Statement::Other
            }
        }
        Some(_) => Statement::Function,
        None if first == "precision" || first.is_empty() => Statement::Other,
        None if text.starts_with("subroutine") => Statement::Other,
        None if text.contains('(') && !text.contains('=') => Statement::Other,
        None => Statement::Declaration,
    }
}

/// Remove a leading `layout(...)` qualifier.
fn strip_layout(text: &str) -> &str {
    split_layout(text).1
}

fn split_layout(text: &str) -> (Option<&str>, &str) {
    let Some(rest) = text.strip_prefix("layout") else {
        return (None, text);
    };
    let rest = rest.trim_start();
    let Some(inner) = rest.strip_prefix('(') else {
        return (None, text);
    };
    match inner.find(')') {
        Some(close) => (Some(&inner[..close]), inner[close + 1..].trim_start()),
        None => (None, text),
    }
}

fn layout_location(qualifier: Option<&str>) -> Option<u32> {
    qualifier?.split(',').find_map(|entry| {
        let (key, value) = entry.split_once('=')?;
        if key.trim() == "location" {
            value.trim().parse().ok()
        } else {
            None
        }
    })
}

fn subroutine_function_name(statement: &str) -> Option<&str> {
    let rest = statement.trim().strip_prefix("subroutine")?.trim_start();
    let rest = rest.strip_prefix('(')?;
    let signature = &rest[rest.find(')')? + 1..];
    let head = &signature[..signature.find('(')?];
    head.split_whitespace().last()
}

// ============================================================================
// Declarations
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Storage {
    In,
    Out,
    Uniform,
}

#[derive(Debug, Clone)]
struct Declared {
    name: String,
    ty: GpuType,
    array_length: u32,
    location: Option<u32>,
}

impl Declared {
    fn location_span(&self) -> u32 {
        self.ty.info().rows * self.array_length
    }

    fn to_raw(&self, location: u32) -> RawResource {
        let name = if self.array_length > 1 {
            format!("{}[0]", self.name)
        } else {
            self.name.clone()
        };
        RawResource::new(name, self.ty.code(), location as i32, self.array_length)
    }
}

struct Declaration {
    storage: Storage,
    items: Vec<Declared>,
}

const QUALIFIERS: &[&str] = &[
    "flat",
    "smooth",
    "noperspective",
    "centroid",
    "sample",
    "invariant",
    "precise",
    "highp",
    "mediump",
    "lowp",
    "patch",
];

fn parse_declaration(
    statement: &str,
    defines: &HashMap<String, String>,
) -> Result<Option<Declaration>, BackendError> {
    let (layout, text) = split_layout(statement.trim());
    let location = layout_location(layout);

    let mut words = text.split_whitespace().skip_while(|w| QUALIFIERS.contains(w));
    let storage = match words.next() {
        Some("in") | Some("attribute") => Storage::In,
        Some("out") | Some("varying") => Storage::Out,
        Some("uniform") => Storage::Uniform,
        _ => return Ok(None),
    };
    let Some(type_name) = words.by_ref().find(|w| !QUALIFIERS.contains(w)) else {
        return Ok(None);
    };

    let Some(ty) = GpuType::from_glsl_name(type_name) else {
        if storage == Storage::Uniform {
            log::warn!("HeadlessBackend: skipping uniform of unsupported type {type_name}");
            return Ok(None);
        }
        return Err(BackendError::CompilationFailed(format!(
            "unknown type \"{type_name}\""
        )));
    };

    let declarators: String = words.collect::<Vec<_>>().join(" ");
    let mut items = Vec::new();
    for (position, declarator) in declarators.split(',').enumerate() {
        let declarator = declarator.split('=').next().unwrap_or("").trim();
        if declarator.is_empty() {
            continue;
        }
        let (name, array_length) = parse_declarator(declarator, defines)?;
        items.push(Declared {
            name,
            ty,
            array_length,
            // An explicit location applies to the first declarator only.
            location: if position == 0 { location } else { None },
        });
    }
    Ok(Some(Declaration { storage, items }))
}

fn parse_declarator(
    declarator: &str,
    defines: &HashMap<String, String>,
) -> Result<(String, u32), BackendError> {
    let Some((name, size)) = declarator.split_once('[') else {
        return Ok((declarator.to_string(), 1));
    };
    let size = size.trim_end_matches(']').trim();
    let length = macro_value(size, defines)
        .and_then(|v| u32::try_from(v).ok())
        .filter(|v| *v > 0)
        .ok_or_else(|| {
            BackendError::CompilationFailed(format!("invalid array size \"{size}\""))
        })?;
    Ok((name.trim().to_string(), length))
}

struct Block {
    name: String,
    members: Vec<Declared>,
    size: u32,
}

fn parse_uniform_block(
    statement: &str,
    defines: &HashMap<String, String>,
) -> Result<Option<Block>, BackendError> {
    let text = strip_layout(statement.trim());
    let Some(rest) = text.strip_prefix("uniform") else {
        return Ok(None);
    };
    let (Some(open), Some(close)) = (rest.find('{'), rest.rfind('}')) else {
        return Ok(None);
    };
    let name = rest[..open].trim().to_string();

    let mut members = Vec::new();
    let mut offset = 0u32;
    let mut block_align = 16u32;
    for member in rest[open + 1..close].split(';') {
        let member = strip_layout(member.trim());
        let mut words = member.split_whitespace().filter(|w| !QUALIFIERS.contains(w));
        let Some(type_name) = words.next() else {
            continue;
        };
        let ty = GpuType::from_glsl_name(type_name).ok_or_else(|| {
            BackendError::CompilationFailed(format!(
                "unknown type \"{type_name}\" in block {name}"
            ))
        })?;
        let declarators: String = words.collect::<Vec<_>>().join(" ");
        for declarator in declarators.split(',') {
            let declarator = declarator.trim();
            if declarator.is_empty() {
                continue;
            }
            let (member_name, array_length) = parse_declarator(declarator, defines)?;
            let (align, size) = std140(ty, array_length);
            block_align = block_align.max(align);
            offset = offset.next_multiple_of(align) + size;
            members.push(Declared {
                name: member_name,
                ty,
                array_length,
                location: None,
            });
        }
    }

    Ok(Some(Block {
        name,
        members,
        size: offset.next_multiple_of(block_align),
    }))
}

/// Alignment and size of a block member under std140 rules.
fn std140(ty: GpuType, array_length: u32) -> (u32, u32) {
    let info = ty.info();
    let scalar = match info.scalar {
        ScalarKind::Double => 8,
        _ => 4,
    };
    let vector_align = match info.cols {
        1 => scalar,
        2 => 2 * scalar,
        _ => 4 * scalar,
    };
    if info.rows == 1 && array_length == 1 {
        return (vector_align, info.cols * scalar);
    }
    let align = vector_align.max(16);
    let stride = (info.cols * scalar).next_multiple_of(align);
    (align, stride * info.rows * array_length)
}

/// Place items at their explicit location, then fill the rest in
/// declaration order at the lowest free range.
fn assign_locations(
    items: &[Declared],
    span: impl Fn(&Declared) -> u32,
) -> Result<Vec<u32>, BackendError> {
    let mut used = BTreeSet::new();
    for item in items {
        if let Some(location) = item.location {
            for slot in location..location + span(item) {
                if !used.insert(slot) {
                    return Err(BackendError::CompilationFailed(format!(
                        "location {slot} of \"{}\" is already in use",
                        item.name
                    )));
                }
            }
        }
    }

    let mut locations = Vec::with_capacity(items.len());
    for item in items {
        let location = match item.location {
            Some(location) => location,
            None => {
                let n = span(item);
                let mut start = 0;
                while (start..start + n).any(|slot| used.contains(&slot)) {
                    start += 1;
                }
                used.extend(start..start + n);
                start
            }
        };
        locations.push(location);
    }
    Ok(locations)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(stages: &[(ShaderStage, &str)]) -> ProgramDescriptor {
        stages
            .iter()
            .fold(ProgramDescriptor::new(), |d, (stage, text)| {
                d.with_stage(*stage, *text)
            })
    }

    #[test]
    fn test_preprocess_branches() {
        let (text, defines) = preprocess(
            "#define VERTEX_SHADER\n#define COUNT 2\n#if defined VERTEX_SHADER\nkeep_a\n#elif defined FRAGMENT_SHADER\ndrop_b\n#else\ndrop_c\n#endif\n#ifndef VERTEX_SHADER\ndrop_d\n#endif\n#if COUNT && !defined(FOO)\nkeep_e\n#endif\n",
        )
        .unwrap();
        assert!(text.contains("keep_a"));
        assert!(text.contains("keep_e"));
        assert!(!text.contains("drop"));
        assert_eq!(defines.get("COUNT").map(String::as_str), Some("2"));
    }

    #[test]
    fn test_preprocess_unbalanced() {
        assert!(preprocess("#ifdef A\nfoo\n").is_err());
        assert!(preprocess("#endif\n").is_err());
    }

    #[test]
    fn test_strip_comments() {
        let text = strip_comments("in vec2 a; // old\n/* in vec3 b;\n */ in vec4 c;");
        assert!(!text.contains("vec3"));
        assert!(text.contains("vec4 c"));
        assert_eq!(text.lines().count(), 3);
    }

    #[test]
    fn test_split_statements() {
        let statements = split_statements(
            "in vec2 a; void main() { if (x) { y(); } } uniform Block { float f; } inst; out vec4 c;",
        );
        assert_eq!(statements.len(), 4);
        assert_eq!(classify(&statements[0]), Statement::Declaration);
        assert_eq!(classify(&statements[1]), Statement::Function);
        assert_eq!(classify(&statements[2]), Statement::Block);
        assert_eq!(classify(&statements[3]), Statement::Declaration);
    }

    #[test]
    fn test_attribute_locations() {
        let info = introspect(&descriptor(&[(
            ShaderStage::Vertex,
            "#version 330\nin vec3 in_pos;\nlayout(location = 1) in mat4 in_model;\nin vec2 in_uv, in_extra;\nvoid main() { gl_Position = vec4(float(gl_VertexID)); }",
        )]))
        .unwrap();

        let location = |name: &str| {
            info.attributes
                .iter()
                .find(|a| a.name == name)
                .map(|a| a.location)
        };
        assert_eq!(location("in_model"), Some(1));
        assert_eq!(location("in_pos"), Some(0));
        assert_eq!(location("in_uv"), Some(5));
        assert_eq!(location("in_extra"), Some(6));
        assert_eq!(location("gl_VertexID"), Some(-1));
    }

    #[test]
    fn test_uniforms_and_blocks() {
        let info = introspect(&descriptor(&[
            (
                ShaderStage::Vertex,
                "#version 330\n#define LIGHTS 3\nuniform mat4 projection;\nuniform vec3 lights[LIGHTS];\nlayout(std140) uniform Camera { mat4 view; vec3 eye; float fov; };\nvoid main() {}",
            ),
            (
                ShaderStage::Fragment,
                "#version 330\nuniform mat4 projection;\nuniform sampler2D tex;\nvoid main() {}",
            ),
        ]))
        .unwrap();

        let active: Vec<_> = info.uniforms.iter().filter(|u| u.location >= 0).collect();
        assert_eq!(active.len(), 3);
        assert_eq!(active[0].name, "projection");
        assert_eq!(active[1].name, "lights[0]");
        assert_eq!(active[1].array_length, 3);
        assert_eq!(active[2].location, 4);

        assert_eq!(info.uniform_blocks.len(), 1);
        assert_eq!(info.uniform_blocks[0].name, "Camera");
        // mat4 (64) + vec3 (12) + float (4)
        assert_eq!(info.uniform_blocks[0].data_size, 80);
        assert!(info.uniforms.iter().any(|u| u.name == "Camera.view" && u.location == -1));
    }

    #[test]
    fn test_subroutines_and_varyings() {
        let info = introspect(
            &descriptor(&[
                (
                    ShaderStage::Vertex,
                    "#version 400\nin float in_value;\nout float out_value;\nvoid main() { out_value = in_value * 2.0; }",
                ),
                (
                    ShaderStage::Fragment,
                    "#version 400\nsubroutine vec4 Shade();\nsubroutine(Shade) vec4 shade_red() { return vec4(1,0,0,1); }\nsubroutine(Shade) vec4 shade_blue() { return vec4(0,0,1,1); }\nsubroutine uniform Shade shade;\nvoid main() {}",
                ),
            ])
            .with_varyings(["out_value"]),
        )
        .unwrap();

        assert_eq!(info.subroutines.len(), 2);
        assert_eq!(info.subroutines[1].name, "shade_blue");
        assert_eq!(info.subroutines[1].index, 1);
        assert_eq!(info.subroutines[1].stage, ShaderStage::Fragment);

        assert_eq!(info.varyings.len(), 1);
        assert_eq!(info.varyings[0].type_code, GpuType::Float.code());
    }

    #[test]
    fn test_unknown_varying() {
        let result = introspect(
            &descriptor(&[(ShaderStage::Vertex, "#version 330\nvoid main() {}")])
                .with_varyings(["missing"]),
        );
        assert!(matches!(result, Err(BackendError::CompilationFailed(_))));
    }

    #[test]
    fn test_location_clash() {
        let result = introspect(&descriptor(&[(
            ShaderStage::Vertex,
            "#version 330\nlayout(location = 0) in mat2 a;\nlayout(location = 1) in vec2 b;\nvoid main() {}",
        )]));
        assert!(result.is_err());
    }

    #[test]
    fn test_std140_sizes() {
        assert_eq!(std140(GpuType::Float, 1), (4, 4));
        assert_eq!(std140(GpuType::Vec3, 1), (16, 12));
        assert_eq!(std140(GpuType::Float, 4), (16, 64));
        assert_eq!(std140(GpuType::Mat3, 1), (16, 48));
        assert_eq!(std140(GpuType::DVec3, 1), (32, 24));
    }
}
