use std::sync::Mutex;

use glam::Vec4;

use crate::actor::Actor;
use crate::drawable::Frame;
use crate::error::Result;
use crate::events::Fields;
use crate::gl::{BlendFactor, CullFace, GlCapability, GraphicsContext};
use crate::lookup::Capability;
use crate::supports::{SupportCore, replace};
use crate::sync::lock;

/// Base colour of an actor. Cached strategies bake it into their geometry.
#[derive(Debug)]
pub struct ColorSupport {
    core: SupportCore,
    color: Mutex<Vec4>,
}

impl ColorSupport {
    pub fn new(actor: &Actor, color: Vec4) -> Self {
        Self {
            core: SupportCore::new("color", actor),
            color: Mutex::new(color),
        }
    }

    pub fn color(&self) -> Vec4 {
        *lock(&self.color)
    }

    pub fn set_color(&self, color: Vec4) {
        if replace(&self.color, color) {
            self.core.changed(Fields::COLOR);
        }
    }
}

impl Capability for ColorSupport {
    fn name(&self) -> &'static str {
        self.core.name()
    }

    fn support(&self) -> Option<&SupportCore> {
        Some(&self.core)
    }

    fn is_disposable(&self) -> bool {
        true
    }

    fn dispose(&self) {
        self.core.begin_dispose();
    }

    fn initialize_fields(&self) -> Fields {
        Fields::COLOR
    }

    // Children without their own colour inherit this one.
    fn pre_draw(&self, ctx: &mut dyn GraphicsContext, frame: &Frame<'_>) -> Result<()> {
        if frame.picking.is_none() {
            ctx.color(self.color());
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct CullingState {
    enabled: bool,
    face: CullFace,
}

/// Face culling around the actor's draw.
#[derive(Debug)]
pub struct CullingSupport {
    core: SupportCore,
    state: Mutex<CullingState>,
}

impl CullingSupport {
    pub fn new(actor: &Actor, face: CullFace) -> Self {
        Self {
            core: SupportCore::new("culling", actor),
            state: Mutex::new(CullingState { enabled: true, face }),
        }
    }

    pub fn face(&self) -> CullFace {
        lock(&self.state).face
    }

    pub fn is_enabled(&self) -> bool {
        lock(&self.state).enabled
    }

    pub fn set_face(&self, face: CullFace) {
        let changed = {
            let mut state = lock(&self.state);
            let changed = state.face != face;
            state.face = face;
            changed
        };
        if changed {
            self.core.changed(Fields::CULLING);
        }
    }

    pub fn set_enabled(&self, enabled: bool) {
        let changed = {
            let mut state = lock(&self.state);
            let changed = state.enabled != enabled;
            state.enabled = enabled;
            changed
        };
        if changed {
            self.core.changed(Fields::CULLING);
        }
    }
}

impl Capability for CullingSupport {
    fn name(&self) -> &'static str {
        self.core.name()
    }

    fn support(&self) -> Option<&SupportCore> {
        Some(&self.core)
    }

    fn is_disposable(&self) -> bool {
        true
    }

    fn dispose(&self) {
        self.core.begin_dispose();
    }

    fn pre_draw(&self, ctx: &mut dyn GraphicsContext, _frame: &Frame<'_>) -> Result<()> {
        let state = *lock(&self.state);
        if state.enabled {
            ctx.enable(GlCapability::CullFace);
            ctx.cull_face(state.face);
        }
        Ok(())
    }

    fn post_draw(&self, ctx: &mut dyn GraphicsContext, _frame: &Frame<'_>) -> Result<()> {
        if self.is_enabled() {
            ctx.disable(GlCapability::CullFace);
        }
        Ok(())
    }
}

/// Alpha blending around the actor's draw. Skipped during picking, where
/// blended colours would no longer decode to a pick id.
#[derive(Debug)]
pub struct BlendingSupport {
    core: SupportCore,
    factors: Mutex<(BlendFactor, BlendFactor)>,
}

impl BlendingSupport {
    pub fn new(actor: &Actor) -> Self {
        Self::with_factors(actor, BlendFactor::SrcAlpha, BlendFactor::OneMinusSrcAlpha)
    }

    pub fn with_factors(actor: &Actor, src: BlendFactor, dst: BlendFactor) -> Self {
        Self {
            core: SupportCore::new("blending", actor),
            factors: Mutex::new((src, dst)),
        }
    }

    pub fn factors(&self) -> (BlendFactor, BlendFactor) {
        *lock(&self.factors)
    }

    pub fn set_factors(&self, src: BlendFactor, dst: BlendFactor) {
        if replace(&self.factors, (src, dst)) {
            self.core.changed(Fields::BLENDING);
        }
    }
}

impl Capability for BlendingSupport {
    fn name(&self) -> &'static str {
        self.core.name()
    }

    fn support(&self) -> Option<&SupportCore> {
        Some(&self.core)
    }

    fn is_disposable(&self) -> bool {
        true
    }

    fn dispose(&self) {
        self.core.begin_dispose();
    }

    fn draw_order(&self) -> i32 {
        10
    }

    fn pre_draw(&self, ctx: &mut dyn GraphicsContext, frame: &Frame<'_>) -> Result<()> {
        if frame.picking.is_none() {
            let (src, dst) = self.factors();
            ctx.enable(GlCapability::Blend);
            ctx.blend_func(src, dst);
        }
        Ok(())
    }

    fn post_draw(&self, ctx: &mut dyn GraphicsContext, frame: &Frame<'_>) -> Result<()> {
        if frame.picking.is_none() {
            ctx.disable(GlCapability::Blend);
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct SelectionState {
    selected: bool,
    highlighted: bool,
    highlight: Vec4,
}

/// Selection and highlight state. While highlighted, the actor's shape is
/// painted in the highlight colour instead of its base colour.
#[derive(Debug)]
pub struct SelectionSupport {
    core: SupportCore,
    state: Mutex<SelectionState>,
}

impl SelectionSupport {
    pub const DEFAULT_HIGHLIGHT: Vec4 = Vec4::new(1.0, 0.85, 0.2, 1.0);

    pub fn new(actor: &Actor) -> Self {
        Self {
            core: SupportCore::new("selection", actor),
            state: Mutex::new(SelectionState {
                selected: false,
                highlighted: false,
                highlight: Self::DEFAULT_HIGHLIGHT,
            }),
        }
    }

    pub fn is_selected(&self) -> bool {
        lock(&self.state).selected
    }

    pub fn is_highlighted(&self) -> bool {
        lock(&self.state).highlighted
    }

    pub fn highlight_color(&self) -> Vec4 {
        lock(&self.state).highlight
    }

    /// The colour the shape is painted in while highlighted.
    pub fn active_highlight(&self) -> Option<Vec4> {
        let state = lock(&self.state);
        state.highlighted.then_some(state.highlight)
    }

    pub fn set_selected(&self, selected: bool) {
        self.update(|state| state.selected = selected);
    }

    pub fn set_highlighted(&self, highlighted: bool) {
        self.update(|state| state.highlighted = highlighted);
    }

    pub fn set_highlight_color(&self, color: Vec4) {
        self.update(|state| state.highlight = color);
    }

    fn update(&self, apply: impl FnOnce(&mut SelectionState)) {
        let changed = {
            let mut state = lock(&self.state);
            let before = *state;
            apply(&mut *state);
            before != *state
        };
        if changed {
            self.core.changed(Fields::SELECTION);
        }
    }
}

impl Capability for SelectionSupport {
    fn name(&self) -> &'static str {
        self.core.name()
    }

    fn support(&self) -> Option<&SupportCore> {
        Some(&self.core)
    }

    fn is_disposable(&self) -> bool {
        true
    }

    fn dispose(&self) {
        self.core.begin_dispose();
    }

    fn initialize_fields(&self) -> Fields {
        Fields::SELECTION
    }
}
