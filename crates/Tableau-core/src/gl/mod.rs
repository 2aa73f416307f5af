//! # Graphics Binding
//!
//! The fixed-function GPU interface every drawable strategy, support object
//! and shape renderer talks to. All calls happen on the thread that owns the
//! GPU context; nothing here is `Send`.
//!
//! [`RecordingContext`] is the headless backend: it records the command
//! stream and tracks handle lifetimes.

mod recording;

pub use recording::{GlCommand, RecordingContext};

use glam::{Mat4, Vec3, Vec4};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Primitive assembly mode for vertex submission.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Primitive {
    Points,
    Lines,
    LineStrip,
    LineLoop,
    Triangles,
    TriangleFan,
    Quads,
}

/// Server-side capabilities toggled with `enable`/`disable`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GlCapability {
    Blend,
    CullFace,
    DepthTest,
    Texture2d,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlendFactor {
    Zero,
    One,
    SrcAlpha,
    OneMinusSrcAlpha,
    DstColor,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CullFace {
    #[default]
    Back,
    Front,
    FrontAndBack,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PolygonMode {
    #[default]
    Fill,
    Line,
}

/// Core binding interface. Calls occur on the GPU context's owning thread.
pub trait GraphicsContext {
    // Display lists.
    /// Reserves `range` consecutive list names and returns the first.
    fn gen_lists(&mut self, range: u32) -> u32;
    fn new_list(&mut self, list: u32);
    fn end_list(&mut self);
    fn call_list(&mut self, list: u32);
    fn delete_lists(&mut self, list: u32, range: u32);

    // Vertex buffer objects.
    fn gen_buffer(&mut self) -> u32;
    fn buffer_data(&mut self, buffer: u32, vertices: &[Vec3]);
    fn draw_buffer(&mut self, buffer: u32, primitive: Primitive, first: usize, count: usize);
    fn delete_buffer(&mut self, buffer: u32);

    // Client-side vertex arrays.
    fn draw_arrays(&mut self, primitive: Primitive, vertices: &[Vec3]);

    // Immediate mode.
    fn begin(&mut self, primitive: Primitive);
    fn vertex(&mut self, vertex: Vec3);
    fn end(&mut self);

    // Fixed-function state.
    fn color(&mut self, color: Vec4);
    fn push_matrix(&mut self);
    fn pop_matrix(&mut self);
    fn mult_matrix(&mut self, matrix: Mat4);
    fn enable(&mut self, capability: GlCapability);
    fn disable(&mut self, capability: GlCapability);
    fn blend_func(&mut self, src: BlendFactor, dst: BlendFactor);
    fn cull_face(&mut self, face: CullFace);
    fn polygon_mode(&mut self, mode: PolygonMode);
    fn line_width(&mut self, width: f32);
    fn bind_texture(&mut self, texture: Option<u32>);

    // Programs.
    fn create_program(&mut self, vertex_source: &str, fragment_source: &str) -> Result<u32>;
    fn use_program(&mut self, program: Option<u32>);
    fn delete_program(&mut self, program: u32);

    // Name stack for selection picking.
    fn push_name(&mut self, name: u32);
    fn load_name(&mut self, name: u32);
    fn pop_name(&mut self);
}

/// Emits `vertices` as one immediate-mode batch and returns the vertex count.
pub fn emit(ctx: &mut dyn GraphicsContext, primitive: Primitive, vertices: &[Vec3]) -> usize {
    ctx.begin(primitive);
    for vertex in vertices {
        ctx.vertex(*vertex);
    }
    ctx.end();
    vertices.len()
}
