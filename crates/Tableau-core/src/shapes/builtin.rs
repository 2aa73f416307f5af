//! Built-in shapes and their renderers.

use std::sync::Arc;

use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

use super::{Batch, Shape, ShapeRenderer, expect_shape};
use crate::error::{Error, Result};
use crate::gl::{self, GlCapability, GraphicsContext, Primitive};

fn non_negative(value: f32, what: &str) -> Result<f32> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(Error::invalid(format!("{what} must be finite and >= 0, got {value}")))
    }
}

fn quad(min: Vec2, max: Vec2, z: f32) -> Vec<Vec3> {
    vec![
        Vec3::new(min.x, min.y, z),
        Vec3::new(max.x, min.y, z),
        Vec3::new(max.x, max.y, z),
        Vec3::new(min.x, max.y, z),
    ]
}

/// Depth offset that keeps backgrounds behind their shape.
const BACKGROUND_Z: f32 = -0.001;

// Deserialization goes through the validating constructors.

#[derive(Deserialize)]
struct RectangleFields {
    width: f32,
    height: f32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RectangleFields")]
pub struct Rectangle {
    width: f32,
    height: f32,
}

impl TryFrom<RectangleFields> for Rectangle {
    type Error = Error;

    fn try_from(fields: RectangleFields) -> Result<Self> {
        Self::new(fields.width, fields.height)
    }
}

impl Rectangle {
    pub fn new(width: f32, height: f32) -> Result<Self> {
        Ok(Self {
            width: non_negative(width, "width")?,
            height: non_negative(height, "height")?,
        })
    }

    pub fn width(&self) -> f32 {
        self.width
    }

    pub fn height(&self) -> f32 {
        self.height
    }

    fn corners(&self, z: f32) -> Vec<Vec3> {
        quad(Vec2::ZERO, Vec2::new(self.width, self.height), z)
    }
}

impl Shape for Rectangle {
    fn shape_name(&self) -> &'static str {
        "rectangle"
    }
}

/// A rectangle with rounded corners. It has no renderer of its own by
/// default and is drawn as its bounding [`Rectangle`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RoundedRectangleFields")]
pub struct RoundedRectangle {
    width: f32,
    height: f32,
    radius: f32,
}

#[derive(Deserialize)]
struct RoundedRectangleFields {
    width: f32,
    height: f32,
    radius: f32,
}

impl TryFrom<RoundedRectangleFields> for RoundedRectangle {
    type Error = Error;

    fn try_from(fields: RoundedRectangleFields) -> Result<Self> {
        Self::new(fields.width, fields.height, fields.radius)
    }
}

impl RoundedRectangle {
    pub fn new(width: f32, height: f32, radius: f32) -> Result<Self> {
        let width = non_negative(width, "width")?;
        let height = non_negative(height, "height")?;
        let radius = non_negative(radius, "radius")?;
        if radius > width.min(height) / 2.0 {
            return Err(Error::invalid(format!(
                "radius {radius} exceeds half of the shorter side"
            )));
        }
        Ok(Self {
            width,
            height,
            radius,
        })
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }
}

impl Shape for RoundedRectangle {
    fn shape_name(&self) -> &'static str {
        "rounded-rectangle"
    }

    fn generalize(&self) -> Vec<Arc<dyn Shape>> {
        vec![Arc::new(Rectangle {
            width: self.width,
            height: self.height,
        })]
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "CircleFields")]
pub struct Circle {
    radius: f32,
    segments: u32,
}

#[derive(Deserialize)]
struct CircleFields {
    radius: f32,
    segments: u32,
}

impl TryFrom<CircleFields> for Circle {
    type Error = Error;

    fn try_from(fields: CircleFields) -> Result<Self> {
        Self::new(fields.radius, fields.segments)
    }
}

impl Circle {
    pub fn new(radius: f32, segments: u32) -> Result<Self> {
        if segments < 3 {
            return Err(Error::invalid(format!(
                "a circle needs at least 3 segments, got {segments}"
            )));
        }
        Ok(Self {
            radius: non_negative(radius, "radius")?,
            segments,
        })
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    pub fn segments(&self) -> u32 {
        self.segments
    }

    fn rim(&self) -> Vec<Vec3> {
        (0..self.segments)
            .map(|i| {
                let angle = std::f32::consts::TAU * i as f32 / self.segments as f32;
                Vec3::new(angle.cos() * self.radius, angle.sin() * self.radius, 0.0)
            })
            .collect()
    }
}

impl Shape for Circle {
    fn shape_name(&self) -> &'static str {
        "circle"
    }
}

/// A single line of text laid out on a fixed advance.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "TextFields")]
pub struct Text {
    text: String,
    size: f32,
    /// Glyph atlas texture, bound in `prepare`.
    texture: Option<u32>,
}

#[derive(Deserialize)]
struct TextFields {
    text: String,
    size: f32,
    #[serde(default)]
    texture: Option<u32>,
}

impl TryFrom<TextFields> for Text {
    type Error = Error;

    fn try_from(fields: TextFields) -> Result<Self> {
        let text = Self::new(fields.text, fields.size)?;
        Ok(match fields.texture {
            Some(texture) => text.with_texture(texture),
            None => text,
        })
    }
}

impl Text {
    /// Horizontal advance per character, relative to the font size.
    pub const ADVANCE: f32 = 0.6;

    pub fn new(text: impl Into<String>, size: f32) -> Result<Self> {
        if !(size.is_finite() && size > 0.0) {
            return Err(Error::invalid(format!("font size must be > 0, got {size}")));
        }
        Ok(Self {
            text: text.into(),
            size,
            texture: None,
        })
    }

    pub fn with_texture(mut self, texture: u32) -> Self {
        self.texture = Some(texture);
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn size(&self) -> f32 {
        self.size
    }

    pub fn texture(&self) -> Option<u32> {
        self.texture
    }

    fn advance(&self) -> f32 {
        self.size * Self::ADVANCE
    }

    /// Quads for every visible glyph, in reading order.
    fn glyphs(&self) -> Vec<Vec<Vec3>> {
        let advance = self.advance();
        self.text
            .chars()
            .enumerate()
            .filter(|(_, c)| !c.is_whitespace())
            .map(|(column, _)| {
                let x = column as f32 * advance;
                quad(Vec2::new(x, 0.0), Vec2::new(x + advance, self.size), 0.0)
            })
            .collect()
    }

    fn bounds(&self) -> Vec<Vec3> {
        let width = self.text.chars().count() as f32 * self.advance();
        quad(Vec2::ZERO, Vec2::new(width, self.size), 0.0)
    }
}

impl Shape for Text {
    fn shape_name(&self) -> &'static str {
        "text"
    }
}

/// A smooth curve through 3D control points, tessellated as a Catmull-Rom spline.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Path3dFields")]
pub struct Path3d {
    points: Vec<Vec3>,
    /// Segments generated between two control points.
    subdivisions: u32,
}

#[derive(Deserialize)]
struct Path3dFields {
    points: Vec<Vec3>,
    #[serde(default)]
    subdivisions: u32,
}

impl TryFrom<Path3dFields> for Path3d {
    type Error = Error;

    fn try_from(fields: Path3dFields) -> Result<Self> {
        Self::new(fields.points, fields.subdivisions)
    }
}

impl Path3d {
    pub fn new(points: Vec<Vec3>, subdivisions: u32) -> Result<Self> {
        if points.len() < 2 {
            return Err(Error::invalid("a path needs at least two points"));
        }
        Ok(Self {
            points,
            subdivisions: subdivisions.max(1),
        })
    }

    pub fn points(&self) -> &[Vec3] {
        &self.points
    }

    pub fn subdivisions(&self) -> u32 {
        self.subdivisions
    }

    pub fn tessellate(&self) -> Vec<Vec3> {
        let n = self.points.len();
        if n < 2 {
            return self.points.clone();
        }
        let at = |i: isize| self.points[i.clamp(0, n as isize - 1) as usize];
        let mut out = Vec::with_capacity((n - 1) * self.subdivisions as usize + 1);
        for i in 0..n as isize - 1 {
            let (p0, p1, p2, p3) = (at(i - 1), at(i), at(i + 1), at(i + 2));
            for step in 0..self.subdivisions {
                let t = step as f32 / self.subdivisions as f32;
                let t2 = t * t;
                let t3 = t2 * t;
                out.push(
                    0.5 * ((2.0 * p1)
                        + (p2 - p0) * t
                        + (2.0 * p0 - 5.0 * p1 + 4.0 * p2 - p3) * t2
                        + (3.0 * p1 - p0 - 3.0 * p2 + p3) * t3),
                );
            }
        }
        out.push(self.points[n - 1]);
        out
    }
}

impl Shape for Path3d {
    fn shape_name(&self) -> &'static str {
        "path3d"
    }
}

pub struct RectangleRenderer;

impl ShapeRenderer for RectangleRenderer {
    fn draw_shape(&self, ctx: &mut dyn GraphicsContext, shape: &dyn Shape) -> Result<usize> {
        Ok(self.fill_batch(shape)?.emit(ctx))
    }

    fn draw_background(&self, ctx: &mut dyn GraphicsContext, shape: &dyn Shape) -> Result<usize> {
        let rectangle = expect_shape::<Rectangle>(shape)?;
        Ok(gl::emit(ctx, Primitive::Quads, &rectangle.corners(BACKGROUND_Z)))
    }

    fn draw_border(&self, ctx: &mut dyn GraphicsContext, shape: &dyn Shape) -> Result<usize> {
        Ok(self.border_batch(shape)?.emit(ctx))
    }

    fn supports_color_picking(&self) -> bool {
        true
    }

    fn supports_arrays(&self) -> bool {
        true
    }

    fn fill_batch(&self, shape: &dyn Shape) -> Result<Batch> {
        let rectangle = expect_shape::<Rectangle>(shape)?;
        Ok(Batch::new(Primitive::Quads, rectangle.corners(0.0)))
    }

    fn background_batch(&self, shape: &dyn Shape) -> Result<Option<Batch>> {
        let rectangle = expect_shape::<Rectangle>(shape)?;
        Ok(Some(Batch::new(Primitive::Quads, rectangle.corners(BACKGROUND_Z))))
    }

    fn border_batch(&self, shape: &dyn Shape) -> Result<Batch> {
        let rectangle = expect_shape::<Rectangle>(shape)?;
        Ok(Batch::new(Primitive::LineLoop, rectangle.corners(0.0)))
    }
}

pub struct CircleRenderer;

impl ShapeRenderer for CircleRenderer {
    fn draw_shape(&self, ctx: &mut dyn GraphicsContext, shape: &dyn Shape) -> Result<usize> {
        Ok(self.fill_batch(shape)?.emit(ctx))
    }

    fn draw_border(&self, ctx: &mut dyn GraphicsContext, shape: &dyn Shape) -> Result<usize> {
        Ok(self.border_batch(shape)?.emit(ctx))
    }

    fn supports_color_picking(&self) -> bool {
        true
    }

    fn supports_arrays(&self) -> bool {
        true
    }

    fn fill_batch(&self, shape: &dyn Shape) -> Result<Batch> {
        let circle = expect_shape::<Circle>(shape)?;
        let rim = circle.rim();
        let Some(&first) = rim.first() else {
            return Err(Error::invalid("a circle needs at least 3 segments"));
        };
        let mut fan = Vec::with_capacity(rim.len() + 2);
        fan.push(Vec3::ZERO);
        fan.extend_from_slice(&rim);
        fan.push(first);
        Ok(Batch::new(Primitive::TriangleFan, fan))
    }

    fn border_batch(&self, shape: &dyn Shape) -> Result<Batch> {
        let circle = expect_shape::<Circle>(shape)?;
        Ok(Batch::new(Primitive::LineLoop, circle.rim()))
    }
}

/// Glyph quads; each visible character is a pickable item.
pub struct TextRenderer;

impl ShapeRenderer for TextRenderer {
    fn prepare(&self, ctx: &mut dyn GraphicsContext, shape: &dyn Shape) -> Result<()> {
        let text = expect_shape::<Text>(shape)?;
        if let Some(texture) = text.texture {
            ctx.enable(GlCapability::Texture2d);
            ctx.bind_texture(Some(texture));
        }
        Ok(())
    }

    fn draw_shape(&self, ctx: &mut dyn GraphicsContext, shape: &dyn Shape) -> Result<usize> {
        let text = expect_shape::<Text>(shape)?;
        let vertices: Vec<Vec3> = text.glyphs().into_iter().flatten().collect();
        Ok(gl::emit(ctx, Primitive::Quads, &vertices))
    }

    fn draw_border(&self, ctx: &mut dyn GraphicsContext, shape: &dyn Shape) -> Result<usize> {
        let text = expect_shape::<Text>(shape)?;
        Ok(gl::emit(ctx, Primitive::LineLoop, &text.bounds()))
    }

    /// The whole text box, as one solid quad.
    fn picking_draw_shape(
        &self,
        ctx: &mut dyn GraphicsContext,
        shape: &dyn Shape,
    ) -> Result<usize> {
        let text = expect_shape::<Text>(shape)?;
        Ok(gl::emit(ctx, Primitive::Quads, &text.bounds()))
    }

    fn supports_color_picking(&self) -> bool {
        true
    }

    fn item_count(&self, shape: &dyn Shape) -> usize {
        expect_shape::<Text>(shape).map_or(0, |text| text.glyphs().len())
    }

    fn draw_item(
        &self,
        ctx: &mut dyn GraphicsContext,
        shape: &dyn Shape,
        item: usize,
    ) -> Result<usize> {
        let text = expect_shape::<Text>(shape)?;
        let glyphs = text.glyphs();
        let glyph = glyphs
            .get(item)
            .ok_or_else(|| {
                Error::invalid(format!("glyph {item} out of range ({} glyphs)", glyphs.len()))
            })?;
        Ok(gl::emit(ctx, Primitive::Quads, glyph))
    }
}

/// Draws a [`Path3d`] as a line strip. Paths have no border.
pub struct Path3dRenderer;

impl ShapeRenderer for Path3dRenderer {
    fn draw_shape(&self, ctx: &mut dyn GraphicsContext, shape: &dyn Shape) -> Result<usize> {
        let path = expect_shape::<Path3d>(shape)?;
        Ok(gl::emit(ctx, Primitive::LineStrip, &path.tessellate()))
    }

    fn draw_border(&self, _ctx: &mut dyn GraphicsContext, shape: &dyn Shape) -> Result<usize> {
        Err(Error::Unsupported {
            operation: "draw_border",
            shape: shape.shape_name(),
        })
    }

    /// The control polygon is close enough for picking.
    fn picking_draw_shape(
        &self,
        ctx: &mut dyn GraphicsContext,
        shape: &dyn Shape,
    ) -> Result<usize> {
        let path = expect_shape::<Path3d>(shape)?;
        Ok(gl::emit(ctx, Primitive::LineStrip, &path.points))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gl::RecordingContext;

    #[test]
    fn test_path_border_is_a_hard_failure() {
        let mut ctx = RecordingContext::new();
        let path = Path3d::new(vec![Vec3::ZERO, Vec3::X, Vec3::Y], 4).unwrap();
        let result = Path3dRenderer.draw_border(&mut ctx, &path);
        assert!(matches!(result, Err(Error::Unsupported { operation: "draw_border", .. })));
    }

    #[test]
    fn test_tessellation_passes_through_control_points() {
        let path = Path3d::new(vec![Vec3::ZERO, Vec3::X, Vec3::new(2.0, 1.0, 0.0)], 8).unwrap();
        let points = path.tessellate();
        assert_eq!(points.len(), 2 * 8 + 1);
        assert!(points[0].distance(Vec3::ZERO) < 1e-6);
        assert!(points[8].distance(Vec3::X) < 1e-6);
        assert!(points[16].distance(Vec3::new(2.0, 1.0, 0.0)) < 1e-6);
    }

    #[test]
    fn test_whitespace_is_not_a_glyph() {
        let text = Text::new("a b", 10.0).unwrap();
        assert_eq!(TextRenderer.item_count(&text), 2);
    }

    #[test]
    fn test_wrong_shape_type_is_rejected() {
        let mut ctx = RecordingContext::new();
        let circle = Circle::new(1.0, 8).unwrap();
        assert!(matches!(
            RectangleRenderer.draw_shape(&mut ctx, &circle),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_constructors_validate() {
        assert!(Rectangle::new(-1.0, 1.0).is_err());
        assert!(Circle::new(1.0, 2).is_err());
        assert!(RoundedRectangle::new(2.0, 1.0, 0.6).is_err());
        assert!(Text::new("x", 0.0).is_err());
        assert!(Path3d::new(vec![Vec3::ZERO], 2).is_err());
    }

    #[test]
    fn test_deserialization_validates_circles() {
        assert!(serde_yaml::from_str::<Circle>("radius: 1.0\nsegments: 0").is_err());
        assert!(serde_yaml::from_str::<Circle>("radius: -1.0\nsegments: 8").is_err());
        let circle: Circle = serde_yaml::from_str("radius: 1.0\nsegments: 8").unwrap();
        assert_eq!(circle.segments(), 8);
        let mut ctx = RecordingContext::new();
        assert_eq!(CircleRenderer.draw_shape(&mut ctx, &circle).unwrap(), 10);
    }

    #[test]
    fn test_deserialization_validates_paths() {
        assert!(serde_yaml::from_str::<Path3d>("points: []\nsubdivisions: 1").is_err());
        assert!(serde_yaml::from_str::<Path3d>("points: [[0.0, 0.0, 0.0]]").is_err());
        let yaml = "points: [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0]]\nsubdivisions: 0";
        let path: Path3d = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(path.subdivisions(), 1);
        assert_eq!(path.tessellate().len(), 2);
    }

    #[test]
    fn test_deserialization_validates_rectangles_and_text() {
        assert!(serde_yaml::from_str::<Rectangle>("width: -2.0\nheight: 1.0").is_err());
        let rounded = "width: 2.0\nheight: 1.0\nradius: 0.6";
        assert!(serde_yaml::from_str::<RoundedRectangle>(rounded).is_err());
        assert!(serde_yaml::from_str::<Text>("text: hi\nsize: 0.0").is_err());
        let text: Text = serde_yaml::from_str("text: hi\nsize: 1.0\ntexture: 4").unwrap();
        assert_eq!(text.texture(), Some(4));
    }
}
