//! # Recording Backend
//!
//! Acts as a headless GPU. Instead of drawing, every call is appended to a
//! command list, and handle allocation is tracked so that callers can check
//! for leaks and double releases. Commands issued between `new_list` and
//! `end_list` are stored with the list, the way a compiled display list is.

use std::collections::{HashMap, HashSet};

use glam::{Mat4, Vec3, Vec4};
use serde::{Deserialize, Serialize};

use super::{BlendFactor, CullFace, GlCapability, GraphicsContext, PolygonMode, Primitive};
use crate::error::{Error, Result};

/// A single recorded call.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum GlCommand {
    GenLists { first: u32, range: u32 },
    NewList { list: u32 },
    EndList { list: u32 },
    CallList { list: u32 },
    DeleteLists { list: u32, range: u32 },
    GenBuffer { buffer: u32 },
    BufferData { buffer: u32, len: usize },
    DrawBuffer { buffer: u32, primitive: Primitive, first: usize, count: usize },
    DeleteBuffer { buffer: u32 },
    DrawArrays { primitive: Primitive, count: usize },
    Begin { primitive: Primitive },
    Vertex { position: Vec3 },
    End,
    Color { color: Vec4 },
    PushMatrix,
    PopMatrix,
    MultMatrix { matrix: Mat4 },
    Enable { capability: GlCapability },
    Disable { capability: GlCapability },
    BlendFunc { src: BlendFactor, dst: BlendFactor },
    CullFace { face: CullFace },
    PolygonMode { mode: PolygonMode },
    LineWidth { width: f32 },
    BindTexture { texture: Option<u32> },
    CreateProgram { program: u32 },
    UseProgram { program: Option<u32> },
    DeleteProgram { program: u32 },
    PushName { name: u32 },
    LoadName { name: u32 },
    PopName,
}

/// A [`GraphicsContext`] that records instead of rendering.
#[derive(Debug, Default)]
pub struct RecordingContext {
    commands: Vec<GlCommand>,
    lists: HashMap<u32, Vec<GlCommand>>,
    compiling: Option<(u32, Vec<GlCommand>)>,
    next_handle: u32,
    live_lists: HashMap<u32, u32>,
    live_buffers: HashSet<u32>,
    live_programs: HashSet<u32>,
    double_frees: usize,
    reject_programs: bool,
}

impl RecordingContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent `create_program` fail, as a driver with a broken compiler would.
    pub fn reject_programs(&mut self, reject: bool) {
        self.reject_programs = reject;
    }

    /// Commands executed so far (display list bodies are not included).
    pub fn commands(&self) -> &[GlCommand] {
        &self.commands
    }

    pub fn take_commands(&mut self) -> Vec<GlCommand> {
        std::mem::take(&mut self.commands)
    }

    /// The commands compiled into a display list.
    pub fn list_body(&self, list: u32) -> Option<&[GlCommand]> {
        self.lists.get(&list).map(Vec::as_slice)
    }

    pub fn count(&self, predicate: impl Fn(&GlCommand) -> bool) -> usize {
        self.commands.iter().filter(|command| predicate(command)).count()
    }

    pub fn live_lists(&self) -> usize {
        self.live_lists.len()
    }

    pub fn live_buffers(&self) -> usize {
        self.live_buffers.len()
    }

    pub fn live_programs(&self) -> usize {
        self.live_programs.len()
    }

    /// Releases of handles that were never allocated or were already released.
    pub fn double_frees(&self) -> usize {
        self.double_frees
    }

    fn next(&mut self, range: u32) -> u32 {
        let first = self.next_handle + 1;
        self.next_handle += range.max(1);
        first
    }

    fn record(&mut self, command: GlCommand) {
        match &mut self.compiling {
            Some((_, body)) => body.push(command),
            None => self.commands.push(command),
        }
    }
}

impl GraphicsContext for RecordingContext {
    fn gen_lists(&mut self, range: u32) -> u32 {
        let first = self.next(range);
        self.live_lists.insert(first, range);
        self.commands.push(GlCommand::GenLists { first, range });
        first
    }

    fn new_list(&mut self, list: u32) {
        self.commands.push(GlCommand::NewList { list });
        self.compiling = Some((list, Vec::new()));
    }

    fn end_list(&mut self) {
        if let Some((list, body)) = self.compiling.take() {
            self.lists.insert(list, body);
            self.commands.push(GlCommand::EndList { list });
        }
    }

    fn call_list(&mut self, list: u32) {
        self.record(GlCommand::CallList { list });
    }

    fn delete_lists(&mut self, list: u32, range: u32) {
        if self.live_lists.remove(&list).is_none() {
            self.double_frees += 1;
        }
        for name in list..list + range {
            self.lists.remove(&name);
        }
        self.commands.push(GlCommand::DeleteLists { list, range });
    }

    fn gen_buffer(&mut self) -> u32 {
        let buffer = self.next(1);
        self.live_buffers.insert(buffer);
        self.commands.push(GlCommand::GenBuffer { buffer });
        buffer
    }

    fn buffer_data(&mut self, buffer: u32, vertices: &[Vec3]) {
        self.commands.push(GlCommand::BufferData {
            buffer,
            len: vertices.len(),
        });
    }

    fn draw_buffer(&mut self, buffer: u32, primitive: Primitive, first: usize, count: usize) {
        self.record(GlCommand::DrawBuffer {
            buffer,
            primitive,
            first,
            count,
        });
    }

    fn delete_buffer(&mut self, buffer: u32) {
        if !self.live_buffers.remove(&buffer) {
            self.double_frees += 1;
        }
        self.commands.push(GlCommand::DeleteBuffer { buffer });
    }

    fn draw_arrays(&mut self, primitive: Primitive, vertices: &[Vec3]) {
        self.record(GlCommand::DrawArrays {
            primitive,
            count: vertices.len(),
        });
    }

    fn begin(&mut self, primitive: Primitive) {
        self.record(GlCommand::Begin { primitive });
    }

    fn vertex(&mut self, position: Vec3) {
        self.record(GlCommand::Vertex { position });
    }

    fn end(&mut self) {
        self.record(GlCommand::End);
    }

    fn color(&mut self, color: Vec4) {
        self.record(GlCommand::Color { color });
    }

    fn push_matrix(&mut self) {
        self.record(GlCommand::PushMatrix);
    }

    fn pop_matrix(&mut self) {
        self.record(GlCommand::PopMatrix);
    }

    fn mult_matrix(&mut self, matrix: Mat4) {
        self.record(GlCommand::MultMatrix { matrix });
    }

    fn enable(&mut self, capability: GlCapability) {
        self.record(GlCommand::Enable { capability });
    }

    fn disable(&mut self, capability: GlCapability) {
        self.record(GlCommand::Disable { capability });
    }

    fn blend_func(&mut self, src: BlendFactor, dst: BlendFactor) {
        self.record(GlCommand::BlendFunc { src, dst });
    }

    fn cull_face(&mut self, face: CullFace) {
        self.record(GlCommand::CullFace { face });
    }

    fn polygon_mode(&mut self, mode: PolygonMode) {
        self.record(GlCommand::PolygonMode { mode });
    }

    fn line_width(&mut self, width: f32) {
        self.record(GlCommand::LineWidth { width });
    }

    fn bind_texture(&mut self, texture: Option<u32>) {
        self.record(GlCommand::BindTexture { texture });
    }

    fn create_program(&mut self, vertex_source: &str, fragment_source: &str) -> Result<u32> {
        if self.reject_programs
            || vertex_source.trim().is_empty()
            || fragment_source.trim().is_empty()
        {
            return Err(Error::Graphics("program failed to compile".to_string()));
        }
        let program = self.next(1);
        self.live_programs.insert(program);
        self.commands.push(GlCommand::CreateProgram { program });
        Ok(program)
    }

    fn use_program(&mut self, program: Option<u32>) {
        self.record(GlCommand::UseProgram { program });
    }

    fn delete_program(&mut self, program: u32) {
        if !self.live_programs.remove(&program) {
            self.double_frees += 1;
        }
        self.commands.push(GlCommand::DeleteProgram { program });
    }

    fn push_name(&mut self, name: u32) {
        self.record(GlCommand::PushName { name });
    }

    fn load_name(&mut self, name: u32) {
        self.record(GlCommand::LoadName { name });
    }

    fn pop_name(&mut self) {
        self.record(GlCommand::PopName);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_bodies_are_kept_out_of_the_command_stream() {
        let mut ctx = RecordingContext::new();
        let list = ctx.gen_lists(1);
        ctx.new_list(list);
        ctx.begin(Primitive::Lines);
        ctx.vertex(Vec3::ZERO);
        ctx.vertex(Vec3::X);
        ctx.end();
        ctx.end_list();
        ctx.call_list(list);

        assert_eq!(ctx.list_body(list).map(<[GlCommand]>::len), Some(4));
        assert_eq!(ctx.count(|c| matches!(c, GlCommand::Vertex { .. })), 0);
        assert_eq!(ctx.count(|c| matches!(c, GlCommand::CallList { .. })), 1);
    }

    #[test]
    fn test_double_release_is_counted() {
        let mut ctx = RecordingContext::new();
        let buffer = ctx.gen_buffer();
        ctx.delete_buffer(buffer);
        ctx.delete_buffer(buffer);
        assert_eq!(ctx.double_frees(), 1);
        assert_eq!(ctx.live_buffers(), 0);
    }
}
