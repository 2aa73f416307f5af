//! Headless walkthrough of a scene: loads a blueprint, renders it through the
//! recording backend, edits it, switches render modes and picks.
//!
//! Usage: `tableau-playground [scene.yaml]`

use glam::Vec4;
use tableau_core::gl::{GlCommand, RecordingContext};
use tableau_core::picking::ColorPickingMap;
use tableau_core::scene_loader::{load_scene, load_scene_from_str};
use tableau_core::supports::{ColorSupport, SelectionSupport};
use tableau_core::{DrawingPass, PickingMode, RenderModes, Scene, SceneConfig};

const DEMO_SCENE: &str = r#"
actors:
  - id: panel
    type: shape
    dynamic: true
    shape: { kind: rectangle, width: 4.0, height: 2.0 }
    background: [0.1, 0.1, 0.1, 1.0]
    color: [0.2, 0.4, 0.8, 1.0]
    border: { color: [1.0, 1.0, 1.0, 1.0], thickness: 2.0 }
    selectable: true
    children:
      - id: caption
        type: label
        dynamic: true
        pass_number: 1
        origin: [0.2, 0.7, 0.01]
        shape: { kind: text, text: "Hello Tableau", size: 0.4 }
  - id: cursor
    type: shape
    dynamic: true
    pass: overlay
    transform: { translation: [1.0, 1.0, 0.0], billboard: true }
    shape: { kind: circle, radius: 0.1, segments: 16 }
"#;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    println!("=== Tableau Playground ===");

    // 1. Scene
    let config = SceneConfig::default().with_env_overrides()?;
    let scene = Scene::new(config);
    let spawned = match std::env::args().nth(1) {
        Some(path) => load_scene(&scene, path)?,
        None => load_scene_from_str(&scene, DEMO_SCENE)?,
    };
    println!("Spawned {} actors, {} waiting for load", spawned.len(), scene.deferred());
    scene.set_loaded()?;
    report_techniques(&scene);

    // 2. First frames
    let mut ctx = RecordingContext::new();
    for pass in [DrawingPass::Main, DrawingPass::Overlay] {
        let stats = scene.render(&mut ctx, pass);
        println!("{pass:?}: {stats:?}");
    }

    // 3. Edits are coalesced into one rebuild per actor
    if let Some(color) = scene
        .actor_by_id("panel")
        .and_then(|panel| panel.get::<ColorSupport>())
    {
        for step in 0..5 {
            color.set_color(Vec4::new(0.2 * step as f32, 0.4, 0.8, 1.0));
        }
    }
    println!("Pending reinitialize tasks: {}", scene.pending_tasks());
    let stats = scene.render(&mut ctx, DrawingPass::Main);
    println!("After edits: {stats:?}");

    // 4. Restrict the host to display lists
    scene.set_render_modes(RenderModes::DISPLAY_LISTS | RenderModes::IMMEDIATE)?;
    report_techniques(&scene);
    let stats = scene.render(&mut ctx, DrawingPass::Main);
    println!("After mode switch: {stats:?}");

    // 5. Picking
    let picking = scene.render_picking(&mut ctx, DrawingPass::Main, PickingMode::Color);
    let hits: Vec<_> = ctx
        .commands()
        .iter()
        .rev()
        .filter_map(|command| match command {
            GlCommand::Color { color } => picking.resolve_color(ColorPickingMap::to_rgba(*color)),
            _ => None,
        })
        .take(3)
        .collect();
    println!("Colour picking registered {} targets", picking.colors.len());
    for hit in hits {
        if let Some(actor) = scene.actor(hit.actor) {
            println!("  hit {} item {:?}", actor.id(), hit.item);
            if let Some(selection) = actor.get::<SelectionSupport>() {
                selection.set_selected(true);
            }
        }
    }

    // 6. Teardown
    for actor in scene.roots(DrawingPass::Main) {
        actor.dispose();
    }
    for actor in scene.roots(DrawingPass::Overlay) {
        actor.dispose();
    }
    let stats = scene.render(&mut ctx, DrawingPass::Main);
    println!(
        "Released {} handles; live lists {}, live buffers {}, double frees {}",
        stats.released,
        ctx.live_lists(),
        ctx.live_buffers(),
        ctx.double_frees()
    );
    Ok(())
}

fn report_techniques(scene: &Scene) {
    for (id, technique) in scene.techniques() {
        tracing::info!(actor = %id, ?technique, "Drawable strategy");
    }
}
