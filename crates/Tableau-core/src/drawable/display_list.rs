use std::sync::{Arc, Mutex};

use crate::actor::Actor;
use crate::config::Technique;
use crate::drawable::paint::Paint;
use crate::drawable::{DrawableStrategy, Frame, StrategyCore, strategy_capability};
use crate::error::Result;
use crate::gl::GraphicsContext;
use crate::lookup::Capability;
use crate::reinit::GpuRelease;
use crate::sync::lock;

/// Cache state of a display list.
///
/// `Allocated { vertices: 0 }` is a compiled, empty list and is distinct from
/// `Unallocated`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CacheSlot {
    #[default]
    Unallocated,
    Allocated { list: u32, vertices: usize },
}

/// Compiles the actor's geometry into a display list once and replays it.
///
/// Renderer `prepare` calls (texture binds) run outside the list on every
/// frame, since they depend on context state at replay time.
#[derive(Debug)]
pub struct DisplayListStrategy {
    core: StrategyCore,
    slot: Mutex<CacheSlot>,
}

impl DisplayListStrategy {
    pub fn new(actor: &Actor) -> Self {
        Self {
            core: StrategyCore::new(actor),
            slot: Mutex::new(CacheSlot::Unallocated),
        }
    }

    pub fn slot(&self) -> CacheSlot {
        *lock(&self.slot)
    }
}

strategy_capability!(DisplayListStrategy, "drawable/display-list");

impl DrawableStrategy for DisplayListStrategy {
    fn technique(&self) -> Technique {
        Technique::DisplayLists
    }

    fn as_capability(self: Arc<Self>) -> Arc<dyn Capability> {
        self
    }

    fn is_initialized(&self) -> bool {
        matches!(self.slot(), CacheSlot::Allocated { .. })
    }

    fn initialize(&self, ctx: &mut dyn GraphicsContext, frame: &Frame<'_>) -> Result<()> {
        if !self.core.may_initialize(frame) || self.is_initialized() {
            return Ok(());
        }
        let paint = Paint::gather(frame)?;
        let list = ctx.gen_lists(1);
        ctx.new_list(list);
        let compiled = match &paint {
            Some(paint) => paint.draw(ctx),
            None => Ok(0),
        };
        ctx.end_list();
        match compiled {
            Ok(vertices) => {
                let mut slot = lock(&self.slot);
                // Retired while compiling: the retiring thread already saw an
                // empty slot, so the list is ours to delete.
                if self.core.is_retired() {
                    drop(slot);
                    ctx.delete_lists(list, 1);
                    return Ok(());
                }
                tracing::debug!(actor = frame.actor.id(), list, vertices, "Compiled display list");
                *slot = CacheSlot::Allocated { list, vertices };
                Ok(())
            }
            Err(error) => {
                ctx.delete_lists(list, 1);
                Err(error)
            }
        }
    }

    fn uninitialize(&self) {
        let previous = std::mem::take(&mut *lock(&self.slot));
        if let CacheSlot::Allocated { list, .. } = previous {
            self.core.release(GpuRelease::Lists {
                first: list,
                range: 1,
            });
        }
        self.core.record_vertices(0);
    }

    fn retire(&self) {
        if self.core.retire() {
            self.uninitialize();
        }
    }

    fn is_retired(&self) -> bool {
        self.core.is_retired()
    }

    fn draw(&self, ctx: &mut dyn GraphicsContext, frame: &Frame<'_>) -> Result<usize> {
        self.initialize(ctx, frame)?;
        match self.slot() {
            CacheSlot::Allocated { list, vertices } => {
                ctx.call_list(list);
                Ok(self.core.record_vertices(vertices))
            }
            CacheSlot::Unallocated => Ok(self.core.record_vertices(0)),
        }
    }

    fn vertex_count(&self) -> usize {
        self.core.vertex_count()
    }
}
