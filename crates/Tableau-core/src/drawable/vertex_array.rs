use std::sync::{Arc, Mutex};

use glam::{Mat4, Vec3};

use crate::actor::Actor;
use crate::config::Technique;
use crate::drawable::paint::{Layer, Paint};
use crate::drawable::{DrawableStrategy, Frame, StrategyCore, strategy_capability};
use crate::error::Result;
use crate::gl::GraphicsContext;
use crate::lookup::Capability;
use crate::sync::lock;

#[derive(Debug)]
struct Tessellated {
    origin: Vec3,
    layers: Vec<Layer>,
}

/// Keeps pre-tessellated vertices in client memory and submits them with
/// one array call per layer. No GPU handles are held.
#[derive(Debug)]
pub struct VertexArrayStrategy {
    core: StrategyCore,
    cache: Mutex<Option<Arc<Tessellated>>>,
}

impl VertexArrayStrategy {
    pub fn new(actor: &Actor) -> Self {
        Self {
            core: StrategyCore::new(actor),
            cache: Mutex::new(None),
        }
    }
}

strategy_capability!(VertexArrayStrategy, "drawable/vertex-array");

impl DrawableStrategy for VertexArrayStrategy {
    fn technique(&self) -> Technique {
        Technique::VertexArray
    }

    fn as_capability(self: Arc<Self>) -> Arc<dyn Capability> {
        self
    }

    fn is_initialized(&self) -> bool {
        lock(&self.cache).is_some()
    }

    fn initialize(&self, _ctx: &mut dyn GraphicsContext, frame: &Frame<'_>) -> Result<()> {
        if !self.core.may_initialize(frame) || self.is_initialized() {
            return Ok(());
        }
        let Some(paint) = Paint::gather(frame)? else {
            return Ok(());
        };
        let tessellated = Tessellated {
            origin: paint.origin,
            layers: paint.layers()?,
        };
        let mut cache = lock(&self.cache);
        if !self.core.is_retired() {
            *cache = Some(Arc::new(tessellated));
        }
        Ok(())
    }

    fn uninitialize(&self) {
        lock(&self.cache).take();
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
        let Some(tessellated) = lock(&self.cache).clone() else {
            return Ok(self.core.record_vertices(0));
        };
        let offset = tessellated.origin != Vec3::ZERO;
        if offset {
            ctx.push_matrix();
            ctx.mult_matrix(Mat4::from_translation(tessellated.origin));
        }
        let mut vertices = 0;
        for layer in &tessellated.layers {
            layer.apply_state(ctx);
            ctx.draw_arrays(layer.batch.primitive, &layer.batch.vertices);
            vertices += layer.batch.vertices.len();
        }
        if offset {
            ctx.pop_matrix();
        }
        Ok(self.core.record_vertices(vertices))
    }

    fn vertex_count(&self) -> usize {
        self.core.vertex_count()
    }
}
