//! # Drawable Strategies
//!
//! A dynamic actor does not draw itself. It delegates to exactly one
//! [`DrawableStrategy`], chosen by the [`selector`] from the scene's rendering
//! hints and the actor's shape:
//!
//! | Technique | Cache | Rebuilt on |
//! |-----------|-------|------------|
//! | [`ImmediateStrategy`] | none | never |
//! | [`DisplayListStrategy`] | one compiled display list | reinitialize |
//! | [`VertexArrayStrategy`] | CPU-side vertex batches | reinitialize |
//! | [`VboStrategy`] | one vertex buffer per layer | reinitialize |
//!
//! All strategies share the same painter, so every technique produces the
//! same picture. Picking draws always use immediate calls; they are rare and
//! must not disturb the caches.

mod display_list;
mod immediate;
pub(crate) mod paint;
pub mod selector;
mod vbo;
mod vertex_array;

pub use display_list::{CacheSlot, DisplayListStrategy};
pub use immediate::ImmediateStrategy;
pub use vbo::VboStrategy;
pub use vertex_array::VertexArrayStrategy;

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use crate::actor::{Actor, ActorKey};
use crate::config::Technique;
use crate::error::Result;
use crate::gl::GraphicsContext;
use crate::lookup::Capability;
use crate::picking::{ColorPickingMap, PickingMode};
use crate::reinit::GpuRelease;
use crate::scene::Scene;

/// Everything a draw call may consult besides the context itself.
#[derive(Clone, Copy)]
pub struct Frame<'a> {
    pub scene: &'a Scene,
    pub actor: &'a Actor,
    /// Set while rendering a picking pass.
    pub picking: Option<PickingMode>,
}

impl<'a> Frame<'a> {
    pub fn new(scene: &'a Scene, actor: &'a Actor) -> Self {
        Self {
            scene,
            actor,
            picking: None,
        }
    }

    pub fn picking(scene: &'a Scene, actor: &'a Actor, mode: PickingMode) -> Self {
        Self {
            scene,
            actor,
            picking: Some(mode),
        }
    }
}

/// One way of turning an actor's shape into GPU calls.
///
/// `initialize` and `draw` run on the render thread only. `uninitialize` and
/// `retire` may run anywhere: they never touch the context and hand their
/// handles to the scene's release queue instead.
pub trait DrawableStrategy: Capability {
    fn technique(&self) -> Technique;

    fn as_capability(self: Arc<Self>) -> Arc<dyn Capability>;

    fn is_initialized(&self) -> bool;

    /// Builds cached GPU state. A no-op when already initialized, when the
    /// strategy was retired, or when the owning actor is disposed.
    fn initialize(&self, ctx: &mut dyn GraphicsContext, frame: &Frame<'_>) -> Result<()>;

    /// Drops cached state. Idempotent.
    fn uninitialize(&self);

    /// Permanently deactivates the strategy and releases its cache.
    fn retire(&self);

    fn is_retired(&self) -> bool;

    /// Draws the actor, initializing first when needed. Returns the number of
    /// vertices submitted.
    fn draw(&self, ctx: &mut dyn GraphicsContext, frame: &Frame<'_>) -> Result<usize>;

    /// Vertices submitted by the most recent draw.
    fn vertex_count(&self) -> usize;

    /// Context-current setup that cannot be cached, run before every draw.
    fn prepare(&self, ctx: &mut dyn GraphicsContext, frame: &Frame<'_>) -> Result<()> {
        match paint::Paint::gather(frame)? {
            Some(paint) => paint.prepare(ctx),
            None => Ok(()),
        }
    }

    /// Simplified solid geometry for selection picking.
    fn picking_draw(&self, ctx: &mut dyn GraphicsContext, frame: &Frame<'_>) -> Result<usize> {
        match paint::Paint::gather(frame)? {
            Some(paint) => paint.picking(ctx),
            None => Ok(0),
        }
    }

    /// Picking geometry per sub-item, each under its own name.
    fn item_picking_draw(&self, ctx: &mut dyn GraphicsContext, frame: &Frame<'_>) -> Result<usize> {
        match paint::Paint::gather(frame)? {
            Some(paint) => paint.item_picking(ctx),
            None => Ok(0),
        }
    }

    /// Draws in colours registered with `colors`.
    fn color_picking_draw(
        &self,
        ctx: &mut dyn GraphicsContext,
        frame: &Frame<'_>,
        colors: &mut ColorPickingMap,
    ) -> Result<usize> {
        match paint::Paint::gather(frame)? {
            Some(paint) => paint.color_picking(ctx, frame.actor.key(), colors),
            None => Ok(0),
        }
    }
}

/// Bookkeeping every strategy shares.
#[derive(Debug)]
pub(crate) struct StrategyCore {
    owner: ActorKey,
    scene: Weak<Scene>,
    retired: AtomicBool,
    vertices: AtomicUsize,
}

impl StrategyCore {
    pub(crate) fn new(actor: &Actor) -> Self {
        Self {
            owner: actor.key(),
            scene: actor.scene_weak(),
            retired: AtomicBool::new(false),
            vertices: AtomicUsize::new(0),
        }
    }

    pub(crate) fn owner(&self) -> ActorKey {
        self.owner
    }

    /// Whether caches may be built for `frame`.
    pub(crate) fn may_initialize(&self, frame: &Frame<'_>) -> bool {
        !self.is_retired() && !frame.actor.is_disposed() && frame.actor.key() == self.owner
    }

    pub(crate) fn retire(&self) -> bool {
        !self.retired.swap(true, Ordering::AcqRel)
    }

    pub(crate) fn is_retired(&self) -> bool {
        self.retired.load(Ordering::Acquire)
    }

    pub(crate) fn vertex_count(&self) -> usize {
        self.vertices.load(Ordering::Relaxed)
    }

    pub(crate) fn record_vertices(&self, count: usize) -> usize {
        self.vertices.store(count, Ordering::Relaxed);
        count
    }

    /// Hands `handle` to the scene's release queue.
    pub(crate) fn release(&self, handle: GpuRelease) {
        match self.scene.upgrade() {
            Some(scene) => scene.releases().push(handle),
            None => tracing::debug!(?handle, "Scene gone, dropping GPU handle"),
        }
    }
}

/// Implements [`Capability`] for a strategy type.
macro_rules! strategy_capability {
    ($strategy:ty, $name:literal) => {
        impl $crate::lookup::Capability for $strategy {
            fn name(&self) -> &'static str {
                $name
            }

            fn primary_actor(&self) -> Option<$crate::actor::ActorKey> {
                Some(self.core.owner())
            }

            fn is_disposable(&self) -> bool {
                true
            }

            fn dispose(&self) {
                $crate::drawable::DrawableStrategy::retire(self);
            }
        }
    };
}

pub(crate) use strategy_capability;
