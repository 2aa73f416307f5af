//! # Scene Loader
//!
//! Spawns actors from a YAML blueprint:
//!
//! ```yaml
//! actors:
//!   - id: panel
//!     type: shape
//!     dynamic: true
//!     pass: main
//!     shape: { kind: rectangle, width: 4.0, height: 2.0 }
//!     color: [0.2, 0.4, 0.8, 1.0]
//!     border: { color: [1.0, 1.0, 1.0, 1.0], thickness: 2.0 }
//!     children:
//!       - id: caption
//!         type: label
//!         dynamic: true
//!         shape: { kind: text, text: "Hello", size: 0.5 }
//! ```
//!
//! Loading does not open the scene's load gate; callers decide when the
//! scene is ready with [`Scene::set_loaded`].

use std::path::Path;
use std::sync::Arc;

use glam::{Vec3, Vec4};
use serde::{Deserialize, Serialize};

use crate::actor::{Actor, ActorBuilder};
use crate::config::DrawingPass;
use crate::error::Result;
use crate::scene::Scene;
use crate::shapes::{Circle, Path3d, Rectangle, RoundedRectangle, Shape, Text};
use crate::supports::{
    BlendingSupport, BorderStyle, BorderSupport, ColorSupport, SelectionSupport, ShapeSupport,
    Transform, TransformSupport,
};

/// The structure of a scene file.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct SceneBlueprint {
    #[serde(default)]
    pub actors: Vec<ActorBlueprint>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ActorBlueprint {
    pub id: String,
    #[serde(rename = "type")]
    pub actor_type: String,
    #[serde(default)]
    pub dynamic: bool,
    #[serde(default = "default_visible")]
    pub visible: bool,
    #[serde(default)]
    pub wire: bool,
    #[serde(default)]
    pub thickness: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pass: Option<DrawingPass>,
    #[serde(default)]
    pub pass_number: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shape: Option<ShapeBlueprint>,
    #[serde(default)]
    pub origin: Vec3,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<Vec4>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<Vec4>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub border: Option<BorderStyle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<Transform>,
    #[serde(default)]
    pub blending: bool,
    #[serde(default)]
    pub selectable: bool,
    #[serde(default)]
    pub children: Vec<ActorBlueprint>,
}

fn default_visible() -> bool {
    true
}

/// Built-in shapes, tagged by `kind`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ShapeBlueprint {
    Rectangle {
        width: f32,
        height: f32,
    },
    RoundedRectangle {
        width: f32,
        height: f32,
        radius: f32,
    },
    Circle {
        radius: f32,
        #[serde(default = "default_segments")]
        segments: u32,
    },
    Text {
        text: String,
        size: f32,
        #[serde(default)]
        texture: Option<u32>,
    },
    Path {
        points: Vec<Vec3>,
        #[serde(default)]
        subdivisions: u32,
    },
}

fn default_segments() -> u32 {
    32
}

impl ShapeBlueprint {
    pub fn build(&self) -> Result<Arc<dyn Shape>> {
        let shape: Arc<dyn Shape> = match self {
            Self::Rectangle { width, height } => Arc::new(Rectangle::new(*width, *height)?),
            Self::RoundedRectangle {
                width,
                height,
                radius,
            } => Arc::new(RoundedRectangle::new(*width, *height, *radius)?),
            Self::Circle { radius, segments } => Arc::new(Circle::new(*radius, *segments)?),
            Self::Text {
                text,
                size,
                texture,
            } => {
                let shape = Text::new(text.clone(), *size)?;
                Arc::new(match texture {
                    Some(texture) => shape.with_texture(*texture),
                    None => shape,
                })
            }
            Self::Path {
                points,
                subdivisions,
            } => Arc::new(Path3d::new(points.clone(), *subdivisions)?),
        };
        Ok(shape)
    }
}

pub fn load_scene(scene: &Scene, path: impl AsRef<Path>) -> Result<Vec<Arc<Actor>>> {
    let content = std::fs::read_to_string(path)?;
    load_scene_from_str(scene, &content)
}

/// Parses a YAML scene and spawns its actors, parents before children.
/// Returns every spawned actor in spawn order.
#[tracing::instrument(skip(scene, yaml))]
pub fn load_scene_from_str(scene: &Scene, yaml: &str) -> Result<Vec<Arc<Actor>>> {
    let blueprint: SceneBlueprint = serde_yaml::from_str(yaml)?;
    let mut spawned = Vec::new();
    for actor in &blueprint.actors {
        spawn_tree(scene, actor, None, &mut spawned)?;
    }
    tracing::info!(actors = spawned.len(), "Scene blueprint loaded");
    Ok(spawned)
}

fn spawn_tree(
    scene: &Scene,
    blueprint: &ActorBlueprint,
    parent: Option<&Arc<Actor>>,
    spawned: &mut Vec<Arc<Actor>>,
) -> Result<()> {
    let actor = spawn_one(scene, blueprint)?;
    if let Some(parent) = parent {
        scene.add_child(parent.key(), actor.key())?;
    }
    spawned.push(Arc::clone(&actor));
    for child in &blueprint.children {
        spawn_tree(scene, child, Some(&actor), spawned)?;
    }
    Ok(())
}

fn spawn_one(scene: &Scene, blueprint: &ActorBlueprint) -> Result<Arc<Actor>> {
    let mut builder = ActorBuilder::new(&blueprint.actor_type, &blueprint.id)
        .visible(blueprint.visible)
        .wire(blueprint.wire)
        .thickness(blueprint.thickness)
        .pass_number(blueprint.pass_number);
    if blueprint.dynamic {
        builder = builder.dynamic();
    }
    if let Some(pass) = blueprint.pass {
        builder = builder.drawing_pass(pass);
    }
    let actor = scene.spawn(builder)?;

    if let Some(transform) = blueprint.transform {
        actor.add(Arc::new(TransformSupport::new(&actor, transform)))?;
    }
    if let Some(color) = blueprint.color {
        actor.add(Arc::new(ColorSupport::new(&actor, color)))?;
    }
    if blueprint.blending {
        actor.add(Arc::new(BlendingSupport::new(&actor)))?;
    }
    if blueprint.selectable {
        actor.add(Arc::new(SelectionSupport::new(&actor)))?;
    }
    if let Some(shape) = &blueprint.shape {
        let support = ShapeSupport::new(&actor, shape.build()?);
        support.set_origin(blueprint.origin);
        support.set_background(blueprint.background);
        actor.add(Arc::new(support))?;
    }
    if let Some(style) = blueprint.border {
        actor.add(Arc::new(BorderSupport::new(&actor, style)?))?;
    }
    Ok(actor)
}
