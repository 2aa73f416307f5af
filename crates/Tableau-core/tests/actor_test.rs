mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use common::*;
use tableau_core::gl::{CullFace, RecordingContext};
use tableau_core::supports::{ColorSupport, CullingSupport, ShapeSupport};
use tableau_core::{
    ActorBuilder, Capability, DrawableStrategy, DrawingPass, Fields, RenderModes, Technique,
};

#[test]
fn test_lookup_keeps_one_instance_per_type() {
    let scene = loaded_scene();
    let actor = scene.spawn(ActorBuilder::new("shape", "a")).unwrap();
    let first = Arc::new(ColorSupport::new(&actor, RED));
    let second = Arc::new(ColorSupport::new(&actor, GREEN));

    actor.add(Arc::clone(&first)).unwrap();
    actor.add(Arc::clone(&second)).unwrap();

    let stored = actor.get::<ColorSupport>().unwrap();
    assert!(Arc::ptr_eq(&stored, &second));
    assert_eq!(actor.lookup().len(), 1);
    // The evicted instance belonged to this actor only.
    assert!(first.support().unwrap().is_disposed());
    assert!(!second.support().unwrap().is_disposed());
    assert_eq!(actor.disposal_set_len(), 1);
}

#[test]
fn test_disposed_supports_are_rejected() {
    let scene = loaded_scene();
    let actor = scene.spawn(ActorBuilder::new("shape", "a")).unwrap();
    let color = Arc::new(ColorSupport::new(&actor, RED));
    color.dispose();
    assert!(actor.add(color).is_err());
    assert!(actor.lookup().is_empty());
}

#[test]
fn test_remove_detaches_without_disposing() {
    let scene = loaded_scene();
    let actor = scene.spawn(ActorBuilder::new("shape", "a")).unwrap();
    let culling = Arc::new(CullingSupport::new(&actor, CullFace::Back));
    actor.add(Arc::clone(&culling)).unwrap();

    assert!(actor.remove(&culling));
    assert!(!actor.remove(&culling));
    assert!(!culling.support().unwrap().is_disposed());
    assert_eq!(actor.disposal_set_len(), 0);
}

#[test]
fn test_dirty_follows_support_changes() {
    let scene = loaded_scene();
    let mut ctx = RecordingContext::new();
    let actor = scene.spawn(ActorBuilder::new("shape", "a")).unwrap();
    assert!(actor.is_dirty());

    render(&scene, &mut ctx);
    assert!(!actor.is_dirty());

    let color = Arc::new(ColorSupport::new(&actor, RED));
    actor.add(Arc::clone(&color)).unwrap();
    assert!(actor.is_dirty());
    assert!(scene.needs_redraw(DrawingPass::Main));

    render(&scene, &mut ctx);
    assert!(!actor.is_dirty());
    assert!(!scene.needs_redraw(DrawingPass::Main));

    color.set_color(RED);
    assert!(!actor.is_dirty(), "setting the same colour is not a change");

    color.set_color(BLUE);
    assert!(actor.is_dirty());
}

#[test]
fn test_pass_number_bounds() {
    let scene = loaded_scene();
    assert!(scene.spawn(ActorBuilder::new("shape", "max").pass_number(127)).is_ok());
    assert!(scene.spawn(ActorBuilder::new("shape", "over").pass_number(128)).is_err());
    assert!(scene.spawn(ActorBuilder::new("shape", "negative").pass_number(-1)).is_err());

    let actor = scene.actor_by_id("max").unwrap();
    assert_eq!(actor.pass_number(), 127);
    assert!(actor.set_pass_number_i32(128).is_err());
    assert!(actor.set_pass_number(-3).is_err());
    actor.set_pass_number_i32(5).unwrap();
    assert_eq!(actor.pass_number(), 5);
}

#[test]
fn test_thickness_bounds() {
    let scene = loaded_scene();
    assert!(scene.spawn(ActorBuilder::new("shape", "thin").thickness(-0.0001)).is_err());
    let actor = scene.spawn(ActorBuilder::new("shape", "zero").thickness(0.0)).unwrap();
    assert!(actor.set_thickness(-0.0001).is_err());
    assert!(actor.set_thickness(f32::NAN).is_err());
    actor.set_thickness(2.5).unwrap();
    assert_eq!(actor.thickness(), 2.5);
}

#[test]
fn test_ids_are_unique_per_scene() {
    let scene = loaded_scene();
    scene.spawn(ActorBuilder::new("shape", "a")).unwrap();
    assert!(scene.spawn(ActorBuilder::new("shape", "a")).is_err());
    assert!(scene.spawn(ActorBuilder::new("shape", "")).is_err());
    assert!(scene.spawn(ActorBuilder::new("", "b")).is_err());
    assert_eq!(scene.len(), 1);
}

#[test]
fn test_children_are_never_roots() {
    let scene = loaded_scene();
    let parent = scene.spawn(ActorBuilder::new("group", "parent")).unwrap();
    let child = scene.spawn(ActorBuilder::new("shape", "child")).unwrap();
    assert!(child.is_root());

    scene.add_child(parent.key(), child.key()).unwrap();
    assert!(!child.is_root());
    assert!(parent.is_root());
    assert_eq!(child.parent(), Some(parent.key()));
    assert_eq!(parent.children(), vec![child.key()]);
    let roots = scene.roots(DrawingPass::Main);
    assert_eq!(roots.len(), 1);
    assert_eq!(roots[0].key(), parent.key());

    assert!(scene.remove_child(parent.key(), child.key()).unwrap());
    assert!(child.is_root());
    assert!(parent.children().is_empty());
    assert_eq!(scene.roots(DrawingPass::Main).len(), 2);
}

#[test]
fn test_cycles_are_rejected() {
    let scene = loaded_scene();
    let a = scene.spawn(ActorBuilder::new("group", "a")).unwrap();
    let b = scene.spawn(ActorBuilder::new("group", "b")).unwrap();
    scene.add_child(a.key(), b.key()).unwrap();

    assert!(scene.add_child(b.key(), a.key()).is_err());
    assert!(scene.add_child(a.key(), a.key()).is_err());
    assert!(a.is_root());
}

#[test]
fn test_reparenting_moves_the_child() {
    let scene = loaded_scene();
    let first = scene.spawn(ActorBuilder::new("group", "first")).unwrap();
    let second = scene.spawn(ActorBuilder::new("group", "second")).unwrap();
    let child = scene.spawn(ActorBuilder::new("shape", "child")).unwrap();

    scene.add_child(first.key(), child.key()).unwrap();
    scene.add_child(second.key(), child.key()).unwrap();

    assert!(first.children().is_empty());
    assert_eq!(second.children(), vec![child.key()]);
    assert_eq!(child.parent(), Some(second.key()));
    assert!(!child.is_root());
}

#[test]
fn test_parent_disposal_takes_children_along() {
    let scene = loaded_scene();
    let parent = scene.spawn(ActorBuilder::new("group", "parent")).unwrap();
    let child = scene.spawn(ActorBuilder::new("shape", "child")).unwrap();
    scene.add_child(parent.key(), child.key()).unwrap();

    parent.dispose();
    assert!(child.is_disposed());
    assert!(scene.is_empty());
}

#[test]
fn test_child_disposal_detaches_from_parent() {
    let scene = loaded_scene();
    let parent = scene.spawn(ActorBuilder::new("group", "parent")).unwrap();
    let child = scene.spawn(ActorBuilder::new("shape", "child")).unwrap();
    scene.add_child(parent.key(), child.key()).unwrap();

    assert!(scene.dispose_actor(child.key()));
    assert!(parent.children().is_empty());
    assert!(!parent.is_disposed());
    assert!(!scene.dispose_actor(child.key()));
}

#[test]
fn test_dispose_runs_once() {
    let scene = loaded_scene();
    let actor = scene.spawn(ActorBuilder::new("shape", "a")).unwrap();
    let disposals = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&disposals);
    actor.subscribe(move |event| {
        if event.field == Fields::DISPOSE {
            seen.fetch_add(1, Ordering::SeqCst);
        }
    });

    actor.dispose();
    actor.dispose();
    assert_eq!(disposals.load(Ordering::SeqCst), 1);
    assert!(actor.is_disposed());
    assert!(actor.lookup().is_empty());
    assert!(actor.add(Arc::new(ColorSupport::new(&actor, RED))).is_err());
}

#[test]
fn test_shared_support_outlives_its_creator() {
    let scene = loaded_scene();
    let a = scene.spawn(ActorBuilder::new("shape", "a")).unwrap();
    let b = scene.spawn(ActorBuilder::new("shape", "b")).unwrap();
    let color = Arc::new(ColorSupport::new(&a, RED));
    a.add(Arc::clone(&color)).unwrap();
    b.add(Arc::clone(&color)).unwrap();
    assert!(color.support().unwrap().is_shared());
    // Only the creating actor enrolls it for disposal.
    assert_eq!(a.disposal_set_len(), 1);
    assert_eq!(b.disposal_set_len(), 0);

    a.dispose();
    assert!(!color.support().unwrap().is_disposed());
    assert_eq!(color.support().unwrap().owners(), vec![b.key()]);

    b.dispose();
    assert!(color.support().unwrap().is_disposed());
}

#[test]
fn test_shared_support_change_dirties_every_holder() {
    let scene = loaded_scene();
    let mut ctx = RecordingContext::new();
    let a = scene.spawn(ActorBuilder::new("shape", "a")).unwrap();
    let b = scene.spawn(ActorBuilder::new("shape", "b")).unwrap();
    let color = Arc::new(ColorSupport::new(&a, RED));
    a.add(Arc::clone(&color)).unwrap();
    b.add(Arc::clone(&color)).unwrap();
    render(&scene, &mut ctx);
    assert!(!a.is_dirty() && !b.is_dirty());

    color.set_color(GREEN);
    assert!(a.is_dirty());
    assert!(b.is_dirty());
}

#[test]
fn test_sensitive_fields_grow_with_capabilities() {
    let scene = loaded_scene();
    let actor = scene
        .spawn(ActorBuilder::new("shape", "a").contributes(Fields::TRANSFORM))
        .unwrap();
    let fields = actor.sensitive_fields();
    assert!(fields.contains(Fields::BASE_INITIALIZE | Fields::TRANSFORM));
    assert!(!fields.contains(Fields::COLOR));

    actor.add(Arc::new(ColorSupport::new(&actor, RED))).unwrap();
    assert!(actor.sensitive_fields().contains(Fields::COLOR));
}

#[test]
fn test_concurrent_dispose_runs_once() {
    let scene = loaded_scene();
    let mut ctx = RecordingContext::new();
    let (actor, _) = spawn_colored(&scene, "a", RED);
    render(&scene, &mut ctx);
    assert_eq!(ctx.live_buffers(), 1);

    let disposals = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&disposals);
    actor.subscribe(move |event| {
        if event.field == Fields::DISPOSE {
            seen.fetch_add(1, Ordering::SeqCst);
        }
    });

    let barrier = Arc::new(Barrier::new(8));
    let threads: Vec<_> = (0..8)
        .map(|_| {
            let actor = Arc::clone(&actor);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                actor.dispose();
            })
        })
        .collect();
    for thread in threads {
        thread.join().unwrap();
    }

    assert_eq!(disposals.load(Ordering::SeqCst), 1);
    assert_eq!(scene.pending_releases(), 1);
    assert!(scene.is_empty());
    let stats = render(&scene, &mut ctx);
    assert_eq!(stats.released, 1);
    assert_eq!(ctx.live_buffers(), 0);
    assert_eq!(ctx.double_frees(), 0);
}

#[test]
fn test_concurrent_setters_keep_one_strategy() {
    let scene = loaded_scene();
    let actor = spawn_shape(&scene, "morph", rectangle());
    let shape = actor.get::<ShapeSupport>().unwrap();
    let color = Arc::new(ColorSupport::new(&actor, RED));
    actor.add(Arc::clone(&color)).unwrap();

    let barrier = Arc::new(Barrier::new(4));
    let shapes = {
        let (shape, barrier) = (Arc::clone(&shape), Arc::clone(&barrier));
        thread::spawn(move || {
            barrier.wait();
            for round in 0..100 {
                let next = if round % 2 == 0 { text("Hi") } else { rectangle() };
                shape.set_shape(next);
            }
            shape.set_shape(rectangle());
        })
    };
    let modes = {
        let (scene, barrier) = (Arc::clone(&scene), Arc::clone(&barrier));
        thread::spawn(move || {
            barrier.wait();
            for round in 0..100 {
                let next = match round % 3 {
                    0 => RenderModes::DISPLAY_LISTS | RenderModes::IMMEDIATE,
                    1 => RenderModes::VERTEX_ARRAY,
                    _ => RenderModes::all(),
                };
                scene.set_render_modes(next).unwrap();
            }
            scene.set_render_modes(RenderModes::all()).unwrap();
        })
    };
    let colors = {
        let (color, barrier) = (Arc::clone(&color), Arc::clone(&barrier));
        thread::spawn(move || {
            barrier.wait();
            for round in 0..100 {
                color.set_color(if round % 2 == 0 { GREEN } else { BLUE });
            }
        })
    };
    let renderer = {
        let (scene, barrier) = (Arc::clone(&scene), Arc::clone(&barrier));
        thread::spawn(move || {
            let mut ctx = RecordingContext::new();
            barrier.wait();
            for _ in 0..100 {
                render(&scene, &mut ctx);
            }
            ctx
        })
    };
    shapes.join().unwrap();
    modes.join().unwrap();
    colors.join().unwrap();
    let mut ctx = renderer.join().unwrap();

    assert_eq!(strategies_in_lookup(&actor), 1);
    let active = actor.strategy().unwrap();
    assert!(!active.is_retired());
    assert_eq!(actor.select_strategy().unwrap(), Some(active.technique()));
    assert_eq!(active.technique(), Technique::Vbo);

    render(&scene, &mut ctx);
    actor.dispose();
    render(&scene, &mut ctx);
    assert_eq!(ctx.live_buffers(), 0);
    assert_eq!(ctx.live_lists(), 0);
    assert_eq!(ctx.double_frees(), 0);
}
