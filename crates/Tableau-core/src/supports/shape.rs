use std::sync::{Arc, Mutex};

use glam::{Vec3, Vec4};
use serde::{Deserialize, Serialize};

use crate::actor::Actor;
use crate::error::{Error, Result};
use crate::events::Fields;
use crate::lookup::Capability;
use crate::shapes::Shape;
use crate::supports::{SupportCore, replace};
use crate::sync::lock;

#[derive(Debug)]
struct ShapeState {
    shape: Arc<dyn Shape>,
    origin: Vec3,
    background: Option<Vec4>,
}

/// The geometry a dynamic actor draws, with its origin offset and optional
/// background fill.
///
/// Replacing the shape with one of a different type re-runs strategy
/// selection for every holder, since not every technique can draw every
/// shape.
#[derive(Debug)]
pub struct ShapeSupport {
    core: SupportCore,
    state: Mutex<ShapeState>,
}

impl ShapeSupport {
    pub fn new(actor: &Actor, shape: Arc<dyn Shape>) -> Self {
        Self {
            core: SupportCore::new("shape", actor),
            state: Mutex::new(ShapeState {
                shape,
                origin: Vec3::ZERO,
                background: None,
            }),
        }
    }

    pub fn shape(&self) -> Arc<dyn Shape> {
        Arc::clone(&lock(&self.state).shape)
    }

    pub fn origin(&self) -> Vec3 {
        lock(&self.state).origin
    }

    pub fn background(&self) -> Option<Vec4> {
        lock(&self.state).background
    }

    /// Always reports a change; shapes are opaque and not comparable.
    pub fn set_shape(&self, shape: Arc<dyn Shape>) {
        lock(&self.state).shape = shape;
        self.core.changed(Fields::SHAPE);
    }

    pub fn set_origin(&self, origin: Vec3) {
        let changed = {
            let mut state = lock(&self.state);
            let changed = state.origin != origin;
            state.origin = origin;
            changed
        };
        if changed {
            self.core.changed(Fields::ORIGIN);
        }
    }

    pub fn set_background(&self, background: Option<Vec4>) {
        let changed = {
            let mut state = lock(&self.state);
            let changed = state.background != background;
            state.background = background;
            changed
        };
        if changed {
            self.core.changed(Fields::BACKGROUND);
        }
    }
}

impl Capability for ShapeSupport {
    fn name(&self) -> &'static str {
        self.core.name()
    }

    fn support(&self) -> Option<&SupportCore> {
        Some(&self.core)
    }

    fn initialize_fields(&self) -> Fields {
        Fields::SHAPE | Fields::ORIGIN | Fields::BACKGROUND
    }

    fn is_disposable(&self) -> bool {
        true
    }

    fn dispose(&self) {
        self.core.begin_dispose();
    }
}

/// Outline drawn around a shape.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BorderStyle {
    pub color: Vec4,
    pub thickness: f32,
}

impl Default for BorderStyle {
    fn default() -> Self {
        Self {
            color: Vec4::ONE,
            thickness: 1.0,
        }
    }
}

#[derive(Debug)]
pub struct BorderSupport {
    core: SupportCore,
    enabled: Mutex<bool>,
    style: Mutex<BorderStyle>,
}

impl BorderSupport {
    pub fn new(actor: &Actor, style: BorderStyle) -> Result<Self> {
        validate_thickness(style.thickness)?;
        Ok(Self {
            core: SupportCore::new("border", actor),
            enabled: Mutex::new(true),
            style: Mutex::new(style),
        })
    }

    pub fn is_enabled(&self) -> bool {
        *lock(&self.enabled)
    }

    pub fn style(&self) -> BorderStyle {
        *lock(&self.style)
    }

    /// The style to paint with, or `None` while the border is switched off.
    pub fn active_style(&self) -> Option<BorderStyle> {
        self.is_enabled().then(|| self.style())
    }

    pub fn set_enabled(&self, enabled: bool) {
        if replace(&self.enabled, enabled) {
            self.core.changed(Fields::BORDER);
        }
    }

    pub fn set_color(&self, color: Vec4) {
        let changed = {
            let mut style = lock(&self.style);
            let changed = style.color != color;
            style.color = color;
            changed
        };
        if changed {
            self.core.changed(Fields::BORDER_COLOR);
        }
    }

    pub fn set_thickness(&self, thickness: f32) -> Result<()> {
        validate_thickness(thickness)?;
        let changed = {
            let mut style = lock(&self.style);
            let changed = style.thickness != thickness;
            style.thickness = thickness;
            changed
        };
        if changed {
            self.core.changed(Fields::BORDER_THICKNESS);
        }
        Ok(())
    }
}

fn validate_thickness(thickness: f32) -> Result<()> {
    if thickness >= 0.0 {
        Ok(())
    } else {
        Err(Error::invalid(format!("border thickness must be >= 0, got {thickness}")))
    }
}

impl Capability for BorderSupport {
    fn name(&self) -> &'static str {
        self.core.name()
    }

    fn support(&self) -> Option<&SupportCore> {
        Some(&self.core)
    }

    fn initialize_fields(&self) -> Fields {
        Fields::BORDER | Fields::BORDER_COLOR | Fields::BORDER_THICKNESS
    }

    fn is_disposable(&self) -> bool {
        true
    }

    fn dispose(&self) {
        self.core.begin_dispose();
    }
}
