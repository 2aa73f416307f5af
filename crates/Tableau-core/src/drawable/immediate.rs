use std::sync::Arc;

use crate::actor::Actor;
use crate::config::Technique;
use crate::drawable::paint::Paint;
use crate::drawable::{DrawableStrategy, Frame, StrategyCore, strategy_capability};
use crate::error::Result;
use crate::gl::GraphicsContext;
use crate::lookup::Capability;

/// Re-issues every vertex on every frame. Nothing is cached, so there is
/// nothing to invalidate.
#[derive(Debug)]
pub struct ImmediateStrategy {
    core: StrategyCore,
}

impl ImmediateStrategy {
    pub fn new(actor: &Actor) -> Self {
        Self {
            core: StrategyCore::new(actor),
        }
    }
}

strategy_capability!(ImmediateStrategy, "drawable/immediate");

impl DrawableStrategy for ImmediateStrategy {
    fn technique(&self) -> Technique {
        Technique::Immediate
    }

    fn as_capability(self: Arc<Self>) -> Arc<dyn Capability> {
        self
    }

    fn is_initialized(&self) -> bool {
        !self.core.is_retired()
    }

    fn initialize(&self, _ctx: &mut dyn GraphicsContext, _frame: &Frame<'_>) -> Result<()> {
        Ok(())
    }

    fn uninitialize(&self) {}

    fn retire(&self) {
        self.core.retire();
    }

    fn is_retired(&self) -> bool {
        self.core.is_retired()
    }

    fn draw(&self, ctx: &mut dyn GraphicsContext, frame: &Frame<'_>) -> Result<usize> {
        if !self.core.may_initialize(frame) {
            return Ok(0);
        }
        let count = match Paint::gather(frame)? {
            Some(paint) => paint.draw(ctx)?,
            None => 0,
        };
        Ok(self.core.record_vertices(count))
    }

    fn vertex_count(&self) -> usize {
        self.core.vertex_count()
    }
}
