mod common;

use std::sync::Arc;

use common::*;
use glam::Vec3;
use tableau_core::gl::{GlCommand, RecordingContext};
use tableau_core::supports::{ShaderSupport, ShapeSupport, Transform, TransformSupport};
use tableau_core::{ActorBuilder, DrawingPass, Fields, RenderModes};

#[test]
fn test_a_burst_of_changes_rebuilds_once() {
    let scene = scene_with_modes(RenderModes::DISPLAY_LISTS);
    let mut ctx = RecordingContext::new();
    let (_, color) = spawn_colored(&scene, "panel", RED);
    render(&scene, &mut ctx);
    assert_eq!(scene.pending_tasks(), 0);
    assert_eq!(gen_lists(&ctx), 1);

    color.set_color(GREEN);
    color.set_color(BLUE);
    color.set_color(RED);
    assert_eq!(scene.pending_tasks(), 1);

    let stats = render(&scene, &mut ctx);
    assert_eq!(stats.reinitialized, 1);
    assert_eq!(stats.released, 1);
    assert_eq!(delete_lists(&ctx), 1);
    assert_eq!(gen_lists(&ctx), 2);
    assert_eq!(ctx.live_lists(), 1);
    assert_eq!(scene.pending_tasks(), 0);
}

#[test]
fn test_old_lists_are_deleted_before_new_ones_are_compiled() {
    let scene = scene_with_modes(RenderModes::DISPLAY_LISTS);
    let mut ctx = RecordingContext::new();
    let (_, color) = spawn_colored(&scene, "panel", RED);
    render(&scene, &mut ctx);
    ctx.take_commands();

    color.set_color(GREEN);
    render(&scene, &mut ctx);
    let commands = ctx.take_commands();
    let deleted = commands
        .iter()
        .position(|c| matches!(c, GlCommand::DeleteLists { .. }))
        .unwrap();
    let generated = commands
        .iter()
        .position(|c| matches!(c, GlCommand::GenLists { .. }))
        .unwrap();
    assert!(deleted < generated);
}

#[test]
fn test_insensitive_changes_only_redraw() {
    let scene = scene_with_modes(RenderModes::DISPLAY_LISTS);
    let mut ctx = RecordingContext::new();
    let (actor, _) = spawn_colored(&scene, "panel", RED);
    render(&scene, &mut ctx);

    actor.set_wire(true);
    actor.set_pass_number(3).unwrap();
    assert!(actor.is_dirty());
    assert_eq!(scene.pending_tasks(), 0);

    let stats = render(&scene, &mut ctx);
    assert_eq!(stats.reinitialized, 0);
    assert_eq!(gen_lists(&ctx), 1);
    assert!(ctx.commands().contains(&GlCommand::PolygonMode {
        mode: tableau_core::gl::PolygonMode::Line
    }));
}

#[test]
fn test_contributed_fields_trigger_rebuilds() {
    let scene = scene_with_modes(RenderModes::DISPLAY_LISTS);
    let mut ctx = RecordingContext::new();
    let actor = scene
        .spawn(
            ActorBuilder::new("shape", "panel")
                .dynamic()
                .contributes(Fields::THICKNESS),
        )
        .unwrap();
    actor
        .add(Arc::new(ShapeSupport::new(&actor, rectangle())))
        .unwrap();
    render(&scene, &mut ctx);

    actor.set_thickness(3.0).unwrap();
    assert_eq!(scene.pending_tasks(), 1);
}

#[test]
fn test_shape_edits_rebuild_the_cache() {
    let scene = loaded_scene();
    let mut ctx = RecordingContext::new();
    let actor = spawn_shape(&scene, "panel", rectangle());
    render(&scene, &mut ctx);
    assert_eq!(ctx.live_buffers(), 1);

    let support = actor.get::<ShapeSupport>().unwrap();
    support.set_origin(Vec3::new(1.0, 0.0, 0.0));
    support.set_background(Some(BLUE));
    assert_eq!(scene.pending_tasks(), 1);

    let stats = render(&scene, &mut ctx);
    assert_eq!(stats.released, 1);
    assert_eq!(ctx.live_buffers(), 2);
    assert_eq!(ctx.double_frees(), 0);
}

#[test]
fn test_transforms_wrap_the_draw_without_rebuilding() {
    let scene = scene_with_modes(RenderModes::DISPLAY_LISTS);
    let mut ctx = RecordingContext::new();
    let actor = spawn_shape(&scene, "panel", rectangle());
    let transform = Arc::new(TransformSupport::new(
        &actor,
        Transform::from_translation(Vec3::new(0.0, 2.0, 0.0)),
    ));
    actor.add(Arc::clone(&transform)).unwrap();
    render(&scene, &mut ctx);
    ctx.take_commands();

    transform.set_translation(Vec3::new(5.0, 0.0, 0.0));
    assert_eq!(scene.pending_tasks(), 0);
    render(&scene, &mut ctx);
    let commands = ctx.take_commands();
    assert_eq!(commands.first(), Some(&GlCommand::PushMatrix));
    assert_eq!(commands.last(), Some(&GlCommand::PopMatrix));
    assert_eq!(gen_lists(&ctx), 0);
}

#[test]
fn test_shader_programs_are_compiled_lazily_and_released() {
    let scene = loaded_scene();
    let mut ctx = RecordingContext::new();
    let actor = spawn_shape(&scene, "panel", rectangle());
    let shader = Arc::new(ShaderSupport::new(&actor, "void main() {}", "void main() {}"));
    actor.add(Arc::clone(&shader)).unwrap();
    assert_eq!(shader.program(), None);

    render(&scene, &mut ctx);
    assert!(shader.program().is_some());
    assert_eq!(ctx.live_programs(), 1);

    shader.set_sources("void main() { }", "void main() { }");
    render(&scene, &mut ctx);
    assert_eq!(ctx.live_programs(), 1);
    assert_eq!(ctx.count(|c| matches!(c, GlCommand::CreateProgram { .. })), 2);

    actor.dispose();
    render(&scene, &mut ctx);
    assert_eq!(ctx.live_programs(), 0);
    assert_eq!(ctx.double_frees(), 0);
}

#[test]
fn test_rejected_programs_fail_the_draw() {
    let scene = loaded_scene();
    let mut ctx = RecordingContext::new();
    ctx.reject_programs(true);
    let actor = spawn_shape(&scene, "panel", rectangle());
    actor
        .add(Arc::new(ShaderSupport::new(&actor, "void main() {}", "void main() {}")))
        .unwrap();

    let stats = render(&scene, &mut ctx);
    assert_eq!(stats.failures, 1);
    assert!(actor.is_dirty());
    assert!(scene.needs_redraw(DrawingPass::Main));

    ctx.reject_programs(false);
    let stats = render(&scene, &mut ctx);
    assert_eq!(stats.failures, 0);
    assert!(!actor.is_dirty());
    assert!(!scene.needs_redraw(DrawingPass::Main));
}
