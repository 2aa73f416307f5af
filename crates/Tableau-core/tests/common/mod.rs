#![allow(dead_code)]

use std::sync::Arc;

use glam::Vec4;
use tableau_core::drawable::{
    DisplayListStrategy, ImmediateStrategy, VboStrategy, VertexArrayStrategy,
};
use tableau_core::gl::{GlCommand, RecordingContext};
use tableau_core::shapes::{Rectangle, Shape, Text};
use tableau_core::supports::{ColorSupport, ShapeSupport};
use tableau_core::{Actor, ActorBuilder, DrawingPass, RenderModes, Scene, SceneConfig};

pub const RED: Vec4 = Vec4::new(1.0, 0.0, 0.0, 1.0);
pub const GREEN: Vec4 = Vec4::new(0.0, 1.0, 0.0, 1.0);
pub const BLUE: Vec4 = Vec4::new(0.0, 0.0, 1.0, 1.0);

/// A loaded scene with every render mode allowed.
pub fn loaded_scene() -> Arc<Scene> {
    scene_with_modes(RenderModes::all())
}

pub fn scene_with_modes(modes: RenderModes) -> Arc<Scene> {
    let scene = Scene::new(SceneConfig {
        render_modes: modes,
        ..SceneConfig::default()
    });
    scene.set_loaded().unwrap();
    scene
}

pub fn rectangle() -> Arc<dyn Shape> {
    Arc::new(Rectangle::new(2.0, 1.0).unwrap())
}

pub fn text(value: &str) -> Arc<dyn Shape> {
    Arc::new(Text::new(value, 1.0).unwrap())
}

/// Spawns a dynamic actor drawing `shape`.
pub fn spawn_shape(scene: &Scene, id: &str, shape: Arc<dyn Shape>) -> Arc<Actor> {
    let actor = scene.spawn(ActorBuilder::new("shape", id).dynamic()).unwrap();
    actor.add(Arc::new(ShapeSupport::new(&actor, shape))).unwrap();
    actor
}

pub fn spawn_colored(scene: &Scene, id: &str, color: Vec4) -> (Arc<Actor>, Arc<ColorSupport>) {
    let actor = spawn_shape(scene, id, rectangle());
    let support = Arc::new(ColorSupport::new(&actor, color));
    actor.add(Arc::clone(&support)).unwrap();
    (actor, support)
}

/// Strategies registered in the actor's lookup, of any technique.
pub fn strategies_in_lookup(actor: &Actor) -> usize {
    let lookup = actor.lookup();
    [
        lookup.contains::<ImmediateStrategy>(),
        lookup.contains::<DisplayListStrategy>(),
        lookup.contains::<VertexArrayStrategy>(),
        lookup.contains::<VboStrategy>(),
    ]
    .into_iter()
    .filter(|held| *held)
    .count()
}

pub fn render(scene: &Scene, ctx: &mut RecordingContext) -> tableau_core::FrameStats {
    scene.render(ctx, DrawingPass::Main)
}

pub fn gen_lists(ctx: &RecordingContext) -> usize {
    ctx.count(|c| matches!(c, GlCommand::GenLists { .. }))
}

pub fn delete_lists(ctx: &RecordingContext) -> usize {
    ctx.count(|c| matches!(c, GlCommand::DeleteLists { .. }))
}
