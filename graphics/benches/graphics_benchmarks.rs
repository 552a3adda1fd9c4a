use std::hint::black_box;
use std::sync::Arc;

use criterion::{criterion_group, criterion_main, Criterion};

use glam::{Mat4, Vec3};
use lattice_graphics::render::{Batch, DrawRequest, RenderContext, RenderScript};
use lattice_graphics::vertex::{BufferLayout, VertexBinder, VertexBufferBinding, VertexSource};
use lattice_graphics::{DrawMode, GraphicsDevice, ProgramDescriptor, ShaderSource};

const MESH_SHADER: &str = "#version 330

#if defined VERTEX_SHADER

uniform mat4 view;
uniform mat4 projection;
uniform mat4 model;

in vec3 in_vert;
in vec3 in_normal;
in vec2 in_uv;

out vec2 v_uv;

void main() {
    v_uv = in_uv;
    gl_Position = projection * view * model * vec4(in_vert + in_normal * 0.0, 1.0);
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

fn mesh_fixture() -> (
    Arc<GraphicsDevice>,
    Arc<lattice_graphics::Program>,
    Arc<VertexSource>,
) {
    let (device, _backend) = GraphicsDevice::headless().unwrap();
    let source = ShaderSource::parse(MESH_SHADER).unwrap();
    let program = device
        .create_program(&ProgramDescriptor::from_source(&source, &[]))
        .unwrap();
    let buffer = device
        .create_buffer_with_data(&vec![0u8; 32 * 1024], false)
        .unwrap();
    let mesh = Arc::new(
        VertexSource::single(buffer, "3f 3f 2f", ["in_vert", "in_normal", "in_uv"]).unwrap(),
    );
    (device, program, mesh)
}

// ---------------------------------------------------------------------------
// Layout parsing
// ---------------------------------------------------------------------------

fn bench_layout_parse(c: &mut Criterion) {
    c.bench_function("layout_parse_interleaved", |b| {
        b.iter(|| black_box(BufferLayout::parse(black_box("3f 3f 2f 4f1 2x4")).unwrap()));
    });

    c.bench_function("layout_parse_instance_matrix", |b| {
        b.iter(|| black_box(BufferLayout::parse(black_box("16f 4f1/i")).unwrap()));
    });
}

// ---------------------------------------------------------------------------
// Program creation and binding
// ---------------------------------------------------------------------------

fn bench_program_create(c: &mut Criterion) {
    let (device, _backend) = GraphicsDevice::headless().unwrap();
    let source = ShaderSource::parse(MESH_SHADER).unwrap();
    let descriptor = ProgramDescriptor::from_source(&source, &[]);

    c.bench_function("headless_create_program", |b| {
        b.iter(|| {
            let program = device.create_program(&descriptor).unwrap();
            program.release().unwrap();
        });
    });
}

fn bench_vertex_resolve(c: &mut Criterion) {
    let (_device, program, mesh) = mesh_fixture();
    let buffers: Vec<VertexBufferBinding> = mesh.buffers().to_vec();

    c.bench_function("vertex_binder_resolve", |b| {
        b.iter(|| black_box(VertexBinder::resolve(&program, &buffers, None).unwrap()));
    });

    c.bench_function("vertex_source_cached_lookup", |b| {
        b.iter(|| black_box(mesh.binding(&program, None).unwrap()));
    });
}

// ---------------------------------------------------------------------------
// Script execution
// ---------------------------------------------------------------------------

fn bench_script_batched_draws(c: &mut Criterion) {
    let (device, program, mesh) = mesh_fixture();
    let mut ctx = RenderContext::new(device);

    let mut script = RenderScript::new();
    script.enable_shader(program);
    for i in 0..256 {
        script.draw(
            DrawRequest::new(mesh.clone(), DrawMode::Triangles)
                .with_transform(Mat4::from_translation(Vec3::new(i as f32, 0.0, 0.0))),
        );
    }

    c.bench_function("script_execute_256_batched_draws", |b| {
        b.iter(|| script.execute(&mut ctx).unwrap());
    });
}

fn bench_shared_batch_commit(c: &mut Criterion) {
    let (device, program, mesh) = mesh_fixture();
    let mut ctx = RenderContext::new(device);
    let batch = Batch::shared(mesh, None, DrawMode::Triangles);

    let mut script = RenderScript::new();
    script.enable_shader(program);
    script.draw_batch(batch.clone());

    c.bench_function("shared_batch_commit_1024", |b| {
        b.iter(|| {
            {
                let mut batch = batch.lock();
                for i in 0..1024 {
                    batch.push(Mat4::from_translation(Vec3::splat(i as f32)), 0, 0, 1);
                }
            }
            script.execute(&mut ctx).unwrap();
        });
    });
}

criterion_group!(
    benches,
    bench_layout_parse,
    bench_program_create,
    bench_vertex_resolve,
    bench_script_batched_draws,
    bench_shared_batch_commit,
);
criterion_main!(benches);
