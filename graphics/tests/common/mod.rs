//! Shared fixtures for the integration tests.
//!
//! Every test runs against the headless backend, which records device calls
//! instead of touching a GPU.

#![allow(dead_code)]

use std::sync::Arc;

use lattice_core::logging::{init_logging, LoggingConfig};
use lattice_graphics::backend::headless::{DeviceCall, HeadlessBackend};
use lattice_graphics::backend::DrawCall;
use lattice_graphics::render::RenderContext;
use lattice_graphics::vertex::VertexSource;
use lattice_graphics::{
    Buffer, GraphicsDevice, Program, ProgramDescriptor, ShaderSource, ShaderStage,
};

// ============================================================================
// Shader sources
// ============================================================================

/// Colored 2D triangle: `vert` (vec2) and `vert_color` (vec4).
pub const COLORED_TRIANGLE: &str = "#version 330

#if defined VERTEX_SHADER

in vec2 vert;
in vec4 vert_color;
out vec4 frag_color;

void main() {
    frag_color = vert_color;
    gl_Position = vec4(vert, 0.0, 1.0);
}

#elif defined FRAGMENT_SHADER

in vec4 frag_color;
out vec4 f_color;

void main() {
    f_color = frag_color;
}

#endif
";

/// Instanced mesh with camera uniforms and a per-instance model matrix.
pub const INSTANCED_MESH: &str = "#version 330

#if defined VERTEX_SHADER

uniform mat4 view;
uniform mat4 projection;

layout(location = 0) in vec3 in_vert;
layout(location = 1) in vec3 in_normal;
layout(location = 2) in mat4 in_model;

out vec3 v_normal;

void main() {
    v_normal = mat3(in_model) * in_normal;
    gl_Position = projection * view * in_model * vec4(in_vert, 1.0);
}

#elif defined FRAGMENT_SHADER

uniform vec4 tint;
in vec3 v_normal;
out vec4 f_color;

void main() {
    f_color = tint * max(dot(normalize(v_normal), vec3(0.0, 0.0, 1.0)), 0.1);
}

#endif
";

/// Mesh drawn with a `model` uniform, for batching.
pub const BATCHED_MESH: &str = "#version 330

#if defined VERTEX_SHADER

uniform mat4 view;
uniform mat4 projection;
uniform mat4 model;

in vec3 in_vert;
in vec2 in_uv;
out vec2 v_uv;

void main() {
    v_uv = in_uv;
    gl_Position = projection * view * model * vec4(in_vert, 1.0);
}

#elif defined FRAGMENT_SHADER

uniform sampler2D texture0;
in vec2 v_uv;
out vec4 f_color;

void main() {
    f_color = texture(texture0, v_uv);
}

#endif
";

// ============================================================================
// Test context
// ============================================================================

/// A headless device and the backend recording its calls.
pub struct TestContext {
    pub device: Arc<GraphicsDevice>,
    pub backend: Arc<HeadlessBackend>,
}

impl TestContext {
    pub fn new() -> Self {
        init_logging(LoggingConfig::for_tests());
        let (device, backend) = GraphicsDevice::headless().expect("headless device");
        Self { device, backend }
    }

    /// Compile a single-file source with vertex and fragment stages.
    pub fn program(&self, source: &str) -> Arc<Program> {
        let source = ShaderSource::parse(source).expect("valid shader source");
        self.device
            .create_program(&ProgramDescriptor::from_source(&source, &[]))
            .expect("program creation")
    }

    /// Compile a vertex-only program.
    pub fn vertex_program(&self, source: &str) -> Arc<Program> {
        self.device
            .create_program(&ProgramDescriptor::new().with_stage(ShaderStage::Vertex, source))
            .expect("program creation")
    }

    pub fn buffer<T: bytemuck::Pod>(&self, data: &[T]) -> Arc<Buffer> {
        self.device
            .create_buffer_with_data(bytemuck::cast_slice(data), false)
            .expect("buffer creation")
    }

    /// A zero-filled buffer of `size` bytes.
    pub fn zeroed(&self, size: usize) -> Arc<Buffer> {
        self.device
            .create_buffer_with_data(&vec![0u8; size], false)
            .expect("buffer creation")
    }

    pub fn render_context(&self) -> RenderContext {
        RenderContext::new(self.device.clone())
    }

    pub fn draws(&self) -> Vec<DrawCall> {
        self.backend.draw_calls()
    }

    pub fn calls(&self) -> Vec<DeviceCall> {
        self.backend.calls()
    }
}

/// Three vertices of [`COLORED_TRIANGLE`], interleaved as `2f 4f`.
pub const TRIANGLE_VERTICES: [f32; 18] = [
    0.0, 0.5, 1.0, 0.0, 0.0, 1.0, //
    -0.5, -0.5, 0.0, 1.0, 0.0, 1.0, //
    0.5, -0.5, 0.0, 0.0, 1.0, 1.0, //
];

/// A unit quad for [`BATCHED_MESH`], interleaved as `3f 2f`.
pub fn quad_source(ctx: &TestContext) -> Arc<VertexSource> {
    let vertices: [f32; 30] = [
        -0.5, -0.5, 0.0, 0.0, 0.0, //
        0.5, -0.5, 0.0, 1.0, 0.0, //
        0.5, 0.5, 0.0, 1.0, 1.0, //
        -0.5, -0.5, 0.0, 0.0, 0.0, //
        0.5, 0.5, 0.0, 1.0, 1.0, //
        -0.5, 0.5, 0.0, 0.0, 1.0, //
    ];
    Arc::new(
        VertexSource::single(ctx.buffer(&vertices), "3f 2f", ["in_vert", "in_uv"])
            .expect("valid layout"),
    )
}
