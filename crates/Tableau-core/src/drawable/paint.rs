//! Shared painter: turns an actor's shape supports into draw calls.
//!
//! Paint order is background, shape, border, all inside the origin offset.

use std::sync::Arc;

use glam::{Mat4, Vec3, Vec4};

use crate::actor::ActorKey;
use crate::drawable::Frame;
use crate::error::{Error, Result};
use crate::gl::GraphicsContext;
use crate::picking::{ColorPickingMap, PickTarget};
use crate::shapes::{Batch, Shape, ShapeRenderer};
use crate::supports::{BorderStyle, BorderSupport, ColorSupport, SelectionSupport, ShapeSupport};

/// A snapshot of everything that ends up in an actor's cached geometry.
pub(crate) struct Paint {
    pub(crate) renderer: Arc<dyn ShapeRenderer>,
    pub(crate) shape: Arc<dyn Shape>,
    pub(crate) origin: Vec3,
    pub(crate) color: Option<Vec4>,
    pub(crate) background: Option<Vec4>,
    pub(crate) border: Option<BorderStyle>,
}

/// One array draw with the state it needs.
#[derive(Clone, Debug)]
pub(crate) struct Layer {
    pub(crate) color: Option<Vec4>,
    pub(crate) line_width: Option<f32>,
    pub(crate) batch: Batch,
}

impl Layer {
    pub(crate) fn apply_state(&self, ctx: &mut dyn GraphicsContext) {
        if let Some(color) = self.color {
            ctx.color(color);
        }
        if let Some(width) = self.line_width {
            ctx.line_width(width);
        }
    }
}

impl Paint {
    /// Reads the actor's supports. `None` when the actor has no shape.
    pub(crate) fn gather(frame: &Frame<'_>) -> Result<Option<Self>> {
        let actor = frame.actor;
        let Some(shape_support) = actor.get::<ShapeSupport>() else {
            return Ok(None);
        };
        let shape = shape_support.shape();
        let service = frame
            .scene
            .shape_service()
            .ok_or(Error::NoRenderer(shape.shape_name()))?;
        let resolved = service.resolve(&shape)?;
        let highlight = actor
            .get::<SelectionSupport>()
            .and_then(|selection| selection.active_highlight());
        let color = highlight.or_else(|| actor.get::<ColorSupport>().map(|c| c.color()));
        Ok(Some(Self {
            renderer: resolved.renderer,
            shape: resolved.shape,
            origin: shape_support.origin(),
            color,
            background: shape_support.background(),
            border: actor
                .get::<BorderSupport>()
                .and_then(|border| border.active_style()),
        }))
    }

    pub(crate) fn prepare(&self, ctx: &mut dyn GraphicsContext) -> Result<()> {
        self.renderer.prepare(ctx, &*self.shape)
    }

    /// Runs `body` with the origin offset applied.
    pub(crate) fn at_origin<T>(
        &self,
        ctx: &mut dyn GraphicsContext,
        body: impl FnOnce(&mut dyn GraphicsContext) -> Result<T>,
    ) -> Result<T> {
        if self.origin == Vec3::ZERO {
            return body(ctx);
        }
        ctx.push_matrix();
        ctx.mult_matrix(Mat4::from_translation(self.origin));
        let outcome = body(&mut *ctx);
        ctx.pop_matrix();
        outcome
    }

    /// Immediate-mode draw of background, shape and border.
    pub(crate) fn draw(&self, ctx: &mut dyn GraphicsContext) -> Result<usize> {
        let shape = &*self.shape;
        self.at_origin(ctx, |ctx| {
            let mut vertices = 0;
            if let Some(background) = self.background {
                ctx.color(background);
                vertices += self.renderer.draw_background(ctx, shape)?;
            }
            if let Some(color) = self.color {
                ctx.color(color);
            }
            vertices += self.renderer.draw_shape(ctx, shape)?;
            if let Some(border) = self.border {
                ctx.color(border.color);
                ctx.line_width(border.thickness);
                vertices += self.renderer.draw_border(ctx, shape)?;
            }
            Ok(vertices)
        })
    }

    /// Pre-tessellated layers for the array techniques.
    pub(crate) fn layers(&self) -> Result<Vec<Layer>> {
        let shape = &*self.shape;
        let mut layers = Vec::new();
        if let Some(background) = self.background {
            if let Some(batch) = self.renderer.background_batch(shape)? {
                layers.push(Layer {
                    color: Some(background),
                    line_width: None,
                    batch,
                });
            }
        }
        layers.push(Layer {
            color: self.color,
            line_width: None,
            batch: self.renderer.fill_batch(shape)?,
        });
        if let Some(border) = self.border {
            layers.push(Layer {
                color: Some(border.color),
                line_width: Some(border.thickness),
                batch: self.renderer.border_batch(shape)?,
            });
        }
        Ok(layers)
    }

    pub(crate) fn picking(&self, ctx: &mut dyn GraphicsContext) -> Result<usize> {
        let shape = &*self.shape;
        self.at_origin(ctx, |ctx| self.renderer.picking_draw_shape(ctx, shape))
    }

    pub(crate) fn item_picking(&self, ctx: &mut dyn GraphicsContext) -> Result<usize> {
        let shape = &*self.shape;
        self.at_origin(ctx, |ctx| {
            let mut vertices = 0;
            for item in 0..self.renderer.item_count(shape) {
                ctx.push_name(item as u32);
                let drawn = self.renderer.draw_item(ctx, shape, item);
                ctx.pop_name();
                vertices += drawn?;
            }
            Ok(vertices)
        })
    }

    /// Renderers that opt into colour picking get one colour per item;
    /// everything else is drawn whole in a single colour.
    pub(crate) fn color_picking(
        &self,
        ctx: &mut dyn GraphicsContext,
        actor: ActorKey,
        colors: &mut ColorPickingMap,
    ) -> Result<usize> {
        let shape = &*self.shape;
        let renderer = &self.renderer;
        self.at_origin(ctx, |ctx| {
            if !renderer.supports_color_picking() {
                ctx.color(colors.register(PickTarget { actor, item: None }));
                return renderer.picking_draw_shape(ctx, shape);
            }
            if renderer.item_count(shape) > 1 {
                let mut assign = |item: usize| {
                    colors.register(PickTarget {
                        actor,
                        item: Some(item),
                    })
                };
                renderer.color_picking_draw_items(ctx, shape, &mut assign)
            } else {
                let color = colors.register(PickTarget { actor, item: None });
                renderer.color_picking_draw_shape(ctx, shape, color)
            }
        })
    }
}
