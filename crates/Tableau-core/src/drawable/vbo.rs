use std::sync::{Arc, Mutex};

use glam::{Mat4, Vec3, Vec4};

use crate::actor::Actor;
use crate::config::Technique;
use crate::drawable::paint::Paint;
use crate::drawable::{DrawableStrategy, Frame, StrategyCore, strategy_capability};
use crate::error::Result;
use crate::gl::{GraphicsContext, Primitive};
use crate::lookup::Capability;
use crate::reinit::GpuRelease;
use crate::sync::lock;

#[derive(Clone, Copy, Debug, PartialEq)]
struct UploadedLayer {
    buffer: u32,
    primitive: Primitive,
    count: usize,
    color: Option<Vec4>,
    line_width: Option<f32>,
}

#[derive(Clone, Debug, PartialEq)]
struct Uploaded {
    origin: Vec3,
    layers: Vec<UploadedLayer>,
}

/// Uploads each paint layer into its own vertex buffer and replays the
/// buffers every frame.
#[derive(Debug)]
pub struct VboStrategy {
    core: StrategyCore,
    cache: Mutex<Option<Uploaded>>,
}

impl VboStrategy {
    pub fn new(actor: &Actor) -> Self {
        Self {
            core: StrategyCore::new(actor),
            cache: Mutex::new(None),
        }
    }

    /// Buffer handles currently held.
    pub fn buffers(&self) -> Vec<u32> {
        lock(&self.cache)
            .as_ref()
            .map(|uploaded| uploaded.layers.iter().map(|layer| layer.buffer).collect())
            .unwrap_or_default()
    }
}

strategy_capability!(VboStrategy, "drawable/vbo");

impl DrawableStrategy for VboStrategy {
    fn technique(&self) -> Technique {
        Technique::Vbo
    }

    fn as_capability(self: Arc<Self>) -> Arc<dyn Capability> {
        self
    }

    fn is_initialized(&self) -> bool {
        lock(&self.cache).is_some()
    }

    fn initialize(&self, ctx: &mut dyn GraphicsContext, frame: &Frame<'_>) -> Result<()> {
        if !self.core.may_initialize(frame) || self.is_initialized() {
            return Ok(());
        }
        let Some(paint) = Paint::gather(frame)? else {
            return Ok(());
        };
        // Tessellate before allocating so a failure leaves nothing behind.
        let layers = paint.layers()?;
        let uploaded = Uploaded {
            origin: paint.origin,
            layers: layers
                .into_iter()
                .map(|layer| {
                    let buffer = ctx.gen_buffer();
                    ctx.buffer_data(buffer, &layer.batch.vertices);
                    UploadedLayer {
                        buffer,
                        primitive: layer.batch.primitive,
                        count: layer.batch.vertices.len(),
                        color: layer.color,
                        line_width: layer.line_width,
                    }
                })
                .collect(),
        };
        let mut cache = lock(&self.cache);
        if self.core.is_retired() {
            drop(cache);
            for layer in &uploaded.layers {
                ctx.delete_buffer(layer.buffer);
            }
            return Ok(());
        }
        tracing::debug!(
            actor = frame.actor.id(),
            buffers = uploaded.layers.len(),
            "Uploaded vertex buffers"
        );
        *cache = Some(uploaded);
        Ok(())
    }

    fn uninitialize(&self) {
        let previous = lock(&self.cache).take();
        if let Some(uploaded) = previous {
            for layer in uploaded.layers {
                self.core.release(GpuRelease::Buffer(layer.buffer));
            }
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
        let Some(uploaded) = lock(&self.cache).clone() else {
            return Ok(self.core.record_vertices(0));
        };
        let offset = uploaded.origin != Vec3::ZERO;
        if offset {
            ctx.push_matrix();
            ctx.mult_matrix(Mat4::from_translation(uploaded.origin));
        }
        let mut vertices = 0;
        for layer in &uploaded.layers {
            if let Some(color) = layer.color {
                ctx.color(color);
            }
            if let Some(width) = layer.line_width {
                ctx.line_width(width);
            }
            ctx.draw_buffer(layer.buffer, layer.primitive, 0, layer.count);
            vertices += layer.count;
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
