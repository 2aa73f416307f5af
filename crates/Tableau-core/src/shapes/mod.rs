//! # Shapes and Shape-Renderer Dispatch
//!
//! A [`Shape`] is an immutable geometry description. The engine never looks
//! inside one; it only uses the shape's concrete type as a key into the
//! [`ShapeService`], which hands back the [`ShapeRenderer`] registered for it.
//!
//! Lookup order is exact type first, then the shape's declared
//! generalizations in order (see [`Shape::generalize`]).

mod builtin;

pub use builtin::{
    Circle, CircleRenderer, Path3d, Path3dRenderer, Rectangle, RectangleRenderer, RoundedRectangle,
    Text, TextRenderer,
};

use std::any::TypeId;
use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use glam::{Vec3, Vec4};

use crate::error::{Error, Result};
use crate::gl::{self, GraphicsContext, Primitive};
use crate::lookup::{AsAny, Capability};

/// An opaque, immutable geometry description.
pub trait Shape: AsAny + fmt::Debug {
    fn shape_name(&self) -> &'static str;

    /// This shape re-expressed as more general shapes, most specific first.
    ///
    /// Used when no renderer is registered for the exact type: the first
    /// generalization with a registered renderer is drawn instead.
    fn generalize(&self) -> Vec<Arc<dyn Shape>> {
        Vec::new()
    }
}

/// Dispatch key for a shape type. Only the type takes part in equality.
#[derive(Clone, Copy, Debug)]
pub struct ShapeKey {
    pub type_id: TypeId,
    pub name: &'static str,
}

impl PartialEq for ShapeKey {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for ShapeKey {}

impl std::hash::Hash for ShapeKey {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
    }
}

impl ShapeKey {
    pub fn of<S: Shape>() -> Self {
        Self {
            type_id: TypeId::of::<S>(),
            name: std::any::type_name::<S>(),
        }
    }

    pub fn of_shape(shape: &dyn Shape) -> Self {
        Self {
            type_id: AsAny::concrete_type(shape),
            name: shape.shape_name(),
        }
    }
}

/// Downcasts `shape` for a type-specific renderer.
///
/// Passing the wrong shape type to a renderer is a programming error.
pub fn expect_shape<'a, S: Shape>(shape: &'a dyn Shape) -> Result<&'a S> {
    AsAny::as_any(shape).downcast_ref::<S>().ok_or_else(|| {
        Error::invalid(format!(
            "renderer for `{}` received `{}`",
            std::any::type_name::<S>(),
            shape.shape_name()
        ))
    })
}

/// Pre-tessellated vertices for the array and buffer techniques.
#[derive(Clone, Debug, PartialEq)]
pub struct Batch {
    pub primitive: Primitive,
    pub vertices: Vec<Vec3>,
}

impl Batch {
    pub fn new(primitive: Primitive, vertices: Vec<Vec3>) -> Self {
        Self {
            primitive,
            vertices,
        }
    }

    /// Draws the batch in immediate mode.
    pub fn emit(&self, ctx: &mut dyn GraphicsContext) -> usize {
        gl::emit(ctx, self.primitive, &self.vertices)
    }
}

/// Produces the draw calls for one shape type.
///
/// `draw_*` methods return the number of vertices submitted.
pub trait ShapeRenderer: Send + Sync {
    /// Context-current setup that must run outside any cached list, e.g.
    /// binding a glyph texture.
    fn prepare(&self, _ctx: &mut dyn GraphicsContext, _shape: &dyn Shape) -> Result<()> {
        Ok(())
    }

    fn draw_shape(&self, ctx: &mut dyn GraphicsContext, shape: &dyn Shape) -> Result<usize>;

    fn draw_background(&self, _ctx: &mut dyn GraphicsContext, _shape: &dyn Shape) -> Result<usize> {
        Ok(0)
    }

    /// Fails with [`Error::Unsupported`] for shapes without a border concept.
    fn draw_border(&self, ctx: &mut dyn GraphicsContext, shape: &dyn Shape) -> Result<usize>;

    /// Simplified, solid geometry for selection picking.
    fn picking_draw_shape(
        &self,
        ctx: &mut dyn GraphicsContext,
        shape: &dyn Shape,
    ) -> Result<usize> {
        self.draw_shape(ctx, shape)
    }

    /// Opts the renderer into the two `color_picking_*` entry points.
    fn supports_color_picking(&self) -> bool {
        false
    }

    /// Draws the whole shape in one picking colour.
    fn color_picking_draw_shape(
        &self,
        ctx: &mut dyn GraphicsContext,
        shape: &dyn Shape,
        color: Vec4,
    ) -> Result<usize> {
        ctx.color(color);
        self.picking_draw_shape(ctx, shape)
    }

    /// Draws every item in its own colour, obtained from `assign(item)`.
    fn color_picking_draw_items(
        &self,
        ctx: &mut dyn GraphicsContext,
        shape: &dyn Shape,
        assign: &mut dyn FnMut(usize) -> Vec4,
    ) -> Result<usize> {
        let mut vertices = 0;
        for item in 0..self.item_count(shape) {
            ctx.color(assign(item));
            vertices += self.draw_item(ctx, shape, item)?;
        }
        Ok(vertices)
    }

    /// Number of individually pickable sub-items.
    fn item_count(&self, _shape: &dyn Shape) -> usize {
        1
    }

    fn draw_item(
        &self,
        ctx: &mut dyn GraphicsContext,
        shape: &dyn Shape,
        _item: usize,
    ) -> Result<usize> {
        self.picking_draw_shape(ctx, shape)
    }

    /// Whether the vertex-array and buffer techniques can draw this shape.
    fn supports_arrays(&self) -> bool {
        false
    }

    fn fill_batch(&self, shape: &dyn Shape) -> Result<Batch> {
        Err(Error::Unsupported {
            operation: "fill_batch",
            shape: shape.shape_name(),
        })
    }

    fn background_batch(&self, _shape: &dyn Shape) -> Result<Option<Batch>> {
        Ok(None)
    }

    fn border_batch(&self, shape: &dyn Shape) -> Result<Batch> {
        Err(Error::Unsupported {
            operation: "border_batch",
            shape: shape.shape_name(),
        })
    }
}

/// A renderer together with the shape it should be given.
///
/// When dispatch went through a generalization, `shape` is the generalized
/// shape, not the one the actor holds.
#[derive(Clone)]
pub struct Resolved {
    pub renderer: Arc<dyn ShapeRenderer>,
    pub shape: Arc<dyn Shape>,
}

impl fmt::Debug for Resolved {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolved").field("shape", &self.shape).finish()
    }
}

/// Registry of shape renderers keyed by shape type.
#[derive(Default)]
pub struct ShapeService {
    renderers: DashMap<TypeId, (&'static str, Arc<dyn ShapeRenderer>)>,
}

impl ShapeService {
    pub fn new() -> Self {
        Self::default()
    }

    /// A service with renderers for every built-in shape.
    pub fn with_builtin() -> Self {
        let service = Self::new();
        service.set_shape_renderer(ShapeKey::of::<Rectangle>(), Some(Arc::new(RectangleRenderer)));
        service.set_shape_renderer(ShapeKey::of::<Circle>(), Some(Arc::new(CircleRenderer)));
        service.set_shape_renderer(ShapeKey::of::<Text>(), Some(Arc::new(TextRenderer)));
        service.set_shape_renderer(ShapeKey::of::<Path3d>(), Some(Arc::new(Path3dRenderer)));
        service
    }

    /// Registers a renderer, or clears the registration with `None`.
    pub fn set_shape_renderer(&self, key: ShapeKey, renderer: Option<Arc<dyn ShapeRenderer>>) {
        match renderer {
            Some(renderer) => {
                tracing::debug!(shape = key.name, "Registered shape renderer");
                self.renderers.insert(key.type_id, (key.name, renderer));
            }
            None => {
                self.renderers.remove(&key.type_id);
            }
        }
    }

    /// The renderer registered for exactly this key.
    pub fn get_shape_renderer(&self, key: ShapeKey) -> Option<Arc<dyn ShapeRenderer>> {
        self.renderers
            .get(&key.type_id)
            .map(|entry| Arc::clone(&entry.value().1))
    }

    /// Exact match first, then each generalization of `shape` in order.
    pub fn resolve(&self, shape: &Arc<dyn Shape>) -> Result<Resolved> {
        if let Some(renderer) = self.get_shape_renderer(ShapeKey::of_shape(&**shape)) {
            return Ok(Resolved {
                renderer,
                shape: Arc::clone(shape),
            });
        }
        for general in shape.generalize() {
            if let Some(renderer) = self.get_shape_renderer(ShapeKey::of_shape(&*general)) {
                tracing::trace!(
                    shape = shape.shape_name(),
                    drawn_as = general.shape_name(),
                    "Dispatched through generalization"
                );
                return Ok(Resolved {
                    renderer,
                    shape: general,
                });
            }
        }
        Err(Error::NoRenderer(shape.shape_name()))
    }

    /// Names of the registered shape types.
    pub fn registered(&self) -> Vec<&'static str> {
        self.renderers.iter().map(|entry| entry.value().0).collect()
    }

    pub fn len(&self) -> usize {
        self.renderers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.renderers.is_empty()
    }
}

impl Capability for ShapeService {
    fn name(&self) -> &'static str {
        "shape-service"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rounded_rectangle_falls_back_to_rectangle() {
        let service = ShapeService::with_builtin();
        let shape: Arc<dyn Shape> = Arc::new(RoundedRectangle::new(2.0, 1.0, 0.25).unwrap());
        let resolved = service.resolve(&shape).unwrap();
        assert!(expect_shape::<Rectangle>(&*resolved.shape).is_ok());
    }

    #[test]
    fn test_exact_registration_wins_over_fallback() {
        let service = ShapeService::with_builtin();
        service.set_shape_renderer(
            ShapeKey::of::<RoundedRectangle>(),
            Some(Arc::new(RectangleRenderer)),
        );
        let shape: Arc<dyn Shape> = Arc::new(RoundedRectangle::new(2.0, 1.0, 0.25).unwrap());
        let resolved = service.resolve(&shape).unwrap();
        assert!(expect_shape::<RoundedRectangle>(&*resolved.shape).is_ok());
    }

    #[test]
    fn test_cleared_registration_reports_missing_renderer() {
        let service = ShapeService::with_builtin();
        service.set_shape_renderer(ShapeKey::of::<Circle>(), None);
        let shape: Arc<dyn Shape> = Arc::new(Circle::new(1.0, 12).unwrap());
        assert!(matches!(service.resolve(&shape), Err(Error::NoRenderer(_))));
    }
}
