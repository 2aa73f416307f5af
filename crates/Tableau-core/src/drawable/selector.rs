//! Strategy selection.
//!
//! 1. Start from immediate mode.
//! 2. Walk the scene's preference list and take the first technique the
//!    scene's render modes allow.
//! 3. Shapes whose renderer cannot produce vertex batches (text, tessellated
//!    paths) fall back from the array techniques to display lists, or to
//!    immediate mode when display lists are not allowed either.
//! 4. The actor's own technique override, if any, has the last word.
//!
//! A preference entry that is not a single known flag is a logic error and
//! is reported as [`Error::UnhandledRenderMode`](crate::Error::UnhandledRenderMode).

use std::sync::Arc;

use crate::actor::Actor;
use crate::config::{RenderModes, Technique};
use crate::drawable::{
    DisplayListStrategy, DrawableStrategy, ImmediateStrategy, VboStrategy, VertexArrayStrategy,
};
use crate::error::{Error, Result};
use crate::scene::Scene;
use crate::shapes::ShapeRenderer;
use crate::supports::ShapeSupport;

/// The first technique in `preference` that `modes` allows, else immediate.
pub fn resolve_technique(modes: RenderModes, preference: &[RenderModes]) -> Result<Technique> {
    for preferred in preference {
        if modes.contains(*preferred) {
            return Technique::try_from(*preferred);
        }
    }
    Ok(Technique::Immediate)
}

/// Steps down from the array techniques when `renderer` cannot feed them.
pub fn fit_to_renderer(
    technique: Technique,
    modes: RenderModes,
    renderer: &dyn ShapeRenderer,
) -> Technique {
    if !technique.uses_arrays() || renderer.supports_arrays() {
        return technique;
    }
    if modes.contains(RenderModes::DISPLAY_LISTS) {
        Technique::DisplayLists
    } else {
        Technique::Immediate
    }
}

/// Resolves the technique for `actor` from the scene's hints and its shape.
/// The actor's override is applied by the caller.
pub(crate) fn resolve_for(scene: &Scene, actor: &Actor) -> Result<Technique> {
    let (modes, preference) = {
        let config = scene.config();
        (config.render_modes, config.preference)
    };
    let technique = resolve_technique(modes, &preference)?;
    let renderer = actor.get::<ShapeSupport>().and_then(|support| {
        let shape = support.shape();
        let service = scene.shape_service()?;
        service.resolve(&shape).ok().map(|resolved| resolved.renderer)
    });
    Ok(match renderer {
        Some(renderer) => fit_to_renderer(technique, modes, &*renderer),
        None => technique,
    })
}

/// Builds a fresh, uninitialized strategy. Fails with [`Error::NotLoaded`]
/// until the scene has finished loading.
pub(crate) fn instantiate(
    scene: &Scene,
    actor: &Actor,
    technique: Technique,
) -> Result<Arc<dyn DrawableStrategy>> {
    if !scene.is_loaded() {
        return Err(Error::NotLoaded);
    }
    let strategy: Arc<dyn DrawableStrategy> = match technique {
        Technique::Immediate => Arc::new(ImmediateStrategy::new(actor)),
        Technique::DisplayLists => Arc::new(DisplayListStrategy::new(actor)),
        Technique::VertexArray => Arc::new(VertexArrayStrategy::new(actor)),
        Technique::Vbo => Arc::new(VboStrategy::new(actor)),
    };
    Ok(strategy)
}
