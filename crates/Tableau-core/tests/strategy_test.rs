mod common;

use std::sync::Arc;

use common::*;
use glam::Vec3;
use tableau_core::drawable::{CacheSlot, DisplayListStrategy, VboStrategy};
use tableau_core::gl::{GlCommand, RecordingContext};
use tableau_core::shapes::Path3d;
use tableau_core::supports::{BorderStyle, BorderSupport, ShapeSupport};
use tableau_core::{ActorBuilder, RenderModes, Scene, SceneConfig, Technique};

#[test]
fn test_default_modes_pick_vertex_buffers() {
    let scene = loaded_scene();
    let (actor, _) = spawn_colored(&scene, "panel", RED);
    assert_eq!(actor.technique(), Some(Technique::Vbo));
    assert_eq!(strategies_in_lookup(&actor), 1);
}

#[test]
fn test_display_lists_only_resolves_to_display_lists() {
    let scene = scene_with_modes(RenderModes::DISPLAY_LISTS);
    let (actor, _) = spawn_colored(&scene, "panel", RED);
    assert_eq!(actor.technique(), Some(Technique::DisplayLists));
    assert!(actor.get::<DisplayListStrategy>().is_some());
}

#[test]
fn test_no_allowed_mode_falls_back_to_immediate() {
    let scene = scene_with_modes(RenderModes::empty());
    let (actor, _) = spawn_colored(&scene, "panel", RED);
    assert_eq!(actor.technique(), Some(Technique::Immediate));

    let mut ctx = RecordingContext::new();
    let stats = render(&scene, &mut ctx);
    assert_eq!(stats.actors_drawn, 1);
    assert_eq!(stats.vertices, 4);
    assert_eq!(gen_lists(&ctx), 0);
    assert_eq!(ctx.live_buffers(), 0);
}

#[test]
fn test_non_dynamic_actors_have_no_strategy() {
    let scene = loaded_scene();
    let actor = scene.spawn(ActorBuilder::new("group", "static")).unwrap();
    assert_eq!(actor.select_strategy().unwrap(), None);
    assert!(actor.strategy().is_none());
}

#[test]
fn test_switching_modes_keeps_exactly_one_strategy() {
    let scene = loaded_scene();
    let mut ctx = RecordingContext::new();
    let (actor, _) = spawn_colored(&scene, "panel", RED);

    render(&scene, &mut ctx);
    assert_eq!(ctx.live_buffers(), 1);

    scene.set_render_modes(RenderModes::DISPLAY_LISTS).unwrap();
    assert_eq!(actor.technique(), Some(Technique::DisplayLists));
    assert_eq!(strategies_in_lookup(&actor), 1);
    assert!(actor.get::<VboStrategy>().is_none());

    let stats = render(&scene, &mut ctx);
    assert_eq!(stats.released, 1);
    assert_eq!(ctx.live_buffers(), 0);
    assert_eq!(ctx.live_lists(), 1);

    scene.set_render_modes(RenderModes::VERTEX_ARRAY).unwrap();
    assert_eq!(actor.technique(), Some(Technique::VertexArray));
    assert_eq!(strategies_in_lookup(&actor), 1);
    render(&scene, &mut ctx);
    assert_eq!(ctx.live_lists(), 0);
    assert_eq!(ctx.double_frees(), 0);
}

#[test]
fn test_preference_order_is_honoured() {
    let scene = loaded_scene();
    let (actor, _) = spawn_colored(&scene, "panel", RED);
    scene
        .set_preference(vec![RenderModes::DISPLAY_LISTS, RenderModes::VBO])
        .unwrap();
    assert_eq!(actor.technique(), Some(Technique::DisplayLists));
}

#[test]
fn test_combined_preference_entry_is_an_error() {
    let scene = loaded_scene();
    spawn_colored(&scene, "panel", RED);
    let outcome = scene.set_preference(vec![RenderModes::VBO | RenderModes::DISPLAY_LISTS]);
    assert!(matches!(outcome, Err(tableau_core::Error::UnhandledRenderMode(_))));
}

#[test]
fn test_rejected_preference_leaves_the_scene_untouched() {
    let scene = loaded_scene();
    let (first, _) = spawn_colored(&scene, "first", RED);
    let (second, _) = spawn_colored(&scene, "second", GREEN);
    let before = scene.config().preference;

    let rejected = vec![
        RenderModes::DISPLAY_LISTS,
        RenderModes::VBO | RenderModes::IMMEDIATE,
    ];
    assert!(scene.set_preference(rejected.clone()).is_err());
    assert_eq!(scene.config().preference, before);
    assert_eq!(first.technique(), Some(Technique::Vbo));
    assert_eq!(second.technique(), Some(Technique::Vbo));

    let config = SceneConfig {
        render_modes: RenderModes::DISPLAY_LISTS,
        preference: rejected,
        ..SceneConfig::default()
    };
    assert!(scene.set_config(config).is_err());
    assert_eq!(scene.config().render_modes, RenderModes::all());
    assert_eq!(first.technique(), Some(Technique::Vbo));
    assert_eq!(strategies_in_lookup(&second), 1);
}

#[test]
fn test_text_steps_down_from_vertex_buffers() {
    let scene = loaded_scene();
    let actor = spawn_shape(&scene, "label", text("Hello"));
    assert_eq!(actor.technique(), Some(Technique::DisplayLists));

    scene
        .set_render_modes(RenderModes::VBO | RenderModes::IMMEDIATE)
        .unwrap();
    assert_eq!(actor.technique(), Some(Technique::Immediate));
}

#[test]
fn test_shape_change_reselects_the_technique() {
    let scene = loaded_scene();
    let actor = spawn_shape(&scene, "morph", rectangle());
    assert_eq!(actor.technique(), Some(Technique::Vbo));

    let support = actor.get::<ShapeSupport>().unwrap();
    support.set_shape(text("Hi"));
    assert_eq!(actor.technique(), Some(Technique::DisplayLists));

    support.set_shape(rectangle());
    assert_eq!(actor.technique(), Some(Technique::Vbo));
    assert_eq!(strategies_in_lookup(&actor), 1);
}

#[test]
fn test_technique_override_has_the_last_word() {
    let scene = loaded_scene();
    let actor = scene
        .spawn(
            ActorBuilder::new("shape", "forced")
                .dynamic()
                .technique_override(|_| Technique::Immediate),
        )
        .unwrap();
    actor
        .add(Arc::new(ShapeSupport::new(&actor, rectangle())))
        .unwrap();
    assert_eq!(actor.technique(), Some(Technique::Immediate));
}

#[test]
fn test_strategies_wait_for_the_scene_to_load() {
    let scene = Scene::new(SceneConfig::default());
    let actor = scene.spawn(ActorBuilder::new("shape", "early").dynamic()).unwrap();
    actor
        .add(Arc::new(ShapeSupport::new(&actor, rectangle())))
        .unwrap();
    assert_eq!(actor.technique(), None);
    assert_eq!(scene.deferred(), 1);

    scene.set_loaded().unwrap();
    assert_eq!(scene.deferred(), 0);
    assert_eq!(actor.technique(), Some(Technique::Vbo));
}

#[test]
fn test_disposed_actors_leave_the_load_gate() {
    let scene = Scene::new(SceneConfig::default());
    let actor = scene.spawn(ActorBuilder::new("shape", "early").dynamic()).unwrap();
    assert_eq!(scene.deferred(), 1);
    actor.dispose();
    assert_eq!(scene.deferred(), 0);
    scene.set_loaded().unwrap();
    assert!(actor.strategy().is_none());
}

#[test]
fn test_display_list_is_compiled_once_and_replayed() {
    let scene = scene_with_modes(RenderModes::DISPLAY_LISTS);
    let mut ctx = RecordingContext::new();
    let (actor, _) = spawn_colored(&scene, "panel", RED);

    render(&scene, &mut ctx);
    render(&scene, &mut ctx);
    render(&scene, &mut ctx);

    assert_eq!(gen_lists(&ctx), 1);
    assert_eq!(ctx.count(|c| matches!(c, GlCommand::CallList { .. })), 3);
    let strategy = actor.get::<DisplayListStrategy>().unwrap();
    let CacheSlot::Allocated { list, vertices } = strategy.slot() else {
        panic!("display list was not compiled");
    };
    assert_eq!(vertices, 4);
    let body = ctx.list_body(list).unwrap();
    assert!(body.contains(&GlCommand::Color { color: RED }));
}

#[test]
fn test_vertex_buffers_upload_one_buffer_per_layer() {
    let scene = loaded_scene();
    let mut ctx = RecordingContext::new();
    let actor = spawn_shape(&scene, "panel", rectangle());
    actor
        .get::<ShapeSupport>()
        .unwrap()
        .set_background(Some(BLUE));
    actor
        .add(Arc::new(BorderSupport::new(&actor, BorderStyle::default()).unwrap()))
        .unwrap();

    let stats = render(&scene, &mut ctx);
    assert_eq!(stats.failures, 0);
    assert_eq!(ctx.live_buffers(), 3);
    assert_eq!(actor.get::<VboStrategy>().unwrap().buffers().len(), 3);
    assert_eq!(ctx.count(|c| matches!(c, GlCommand::DrawBuffer { .. })), 3);
}

#[test]
fn test_path_border_fails_the_draw() {
    let scene = loaded_scene();
    let mut ctx = RecordingContext::new();
    let path = Path3d::new(vec![Vec3::ZERO, Vec3::X, Vec3::new(1.0, 1.0, 0.0)], 4).unwrap();
    let actor = spawn_shape(&scene, "path", Arc::new(path));
    actor
        .add(Arc::new(BorderSupport::new(&actor, BorderStyle::default()).unwrap()))
        .unwrap();
    assert_eq!(actor.technique(), Some(Technique::DisplayLists));

    let stats = render(&scene, &mut ctx);
    assert_eq!(stats.failures, 1);
    assert_eq!(stats.actors_drawn, 0);
    assert!(actor.is_dirty());
    assert!(scene.needs_redraw(tableau_core::DrawingPass::Main));
    // The half-compiled list is not leaked.
    assert_eq!(ctx.live_lists(), 0);
    assert_eq!(ctx.double_frees(), 0);
}

#[test]
fn test_disposal_releases_every_handle_once() {
    let scene = loaded_scene();
    let mut ctx = RecordingContext::new();
    let (buffered, _) = spawn_colored(&scene, "buffered", RED);
    let listed = spawn_shape(&scene, "listed", text("Hi"));
    render(&scene, &mut ctx);
    assert_eq!(ctx.live_buffers(), 1);
    assert_eq!(ctx.live_lists(), 1);

    buffered.dispose();
    listed.dispose();
    buffered.dispose();
    assert_eq!(scene.pending_releases(), 2);

    let stats = render(&scene, &mut ctx);
    assert_eq!(stats.released, 2);
    assert_eq!(ctx.live_buffers(), 0);
    assert_eq!(ctx.live_lists(), 0);

    let stats = render(&scene, &mut ctx);
    assert_eq!(stats.released, 0);
    assert_eq!(ctx.double_frees(), 0);
}
