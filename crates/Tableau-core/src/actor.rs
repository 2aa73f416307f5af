//! # Actor
//!
//! The composition root of the scene graph. An actor owns:
//! - its identity (`id`, `uuid`) and drawing state (visibility, pass, wire
//!   mode, line thickness, dirty flag),
//! - a [`Lookup`] of capabilities (support objects and, for dynamic actors,
//!   the active drawable strategy),
//! - an observation channel for property changes.
//!
//! Actors live in the scene's arena and refer to each other by [`ActorKey`].
//! Parent and child links are capabilities holding keys, never owning
//! references.
//!
//! ## Lifecycle
//! `LIVE -> DISPOSED`, one-way. [`Actor::dispose`] runs at most once; later
//! calls are no-ops.

use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};

use slotmap::new_key_type;
use uuid::Uuid;

use crate::config::{DrawingPass, Technique};
use crate::drawable::{DrawableStrategy, selector};
use crate::error::{Error, Result};
use crate::events::{EventSource, Fields, ListenerId, Listeners, PropertyEvent};
use crate::lookup::{Capability, Lookup, same};
use crate::reinit;
use crate::scene::Scene;
use crate::supports::{ChildSupport, ParentSupport};
use crate::sync::lock;

new_key_type! {
    /// Handle of an actor in its scene's arena.
    pub struct ActorKey;
}

/// Adjusts the technique picked by the strategy selector for one actor.
pub type TechniqueOverride = Arc<dyn Fn(Technique) -> Technique + Send + Sync>;

#[derive(Clone, Debug)]
struct ActorState {
    type_name: String,
    visible: bool,
    dirty: bool,
    wire: bool,
    thickness: f32,
    drawing_pass: DrawingPass,
    pass_number: i8,
    root: bool,
}

/// Strategy slot of a dynamic actor.
struct Dynamic {
    slot: Mutex<Option<Arc<dyn DrawableStrategy>>>,
    /// Serializes strategy swaps. Readers of `slot` never take it.
    selection: Mutex<()>,
    technique_override: Option<TechniqueOverride>,
}

pub struct Actor {
    key: ActorKey,
    id: String,
    uuid: Uuid,
    scene: Weak<Scene>,
    state: Mutex<ActorState>,
    lookup: Lookup,
    listeners: Listeners<PropertyEvent>,
    disposed: AtomicBool,
    /// Owned, disposable capabilities released when the actor is disposed.
    disposables: Mutex<Vec<Arc<dyn Capability>>>,
    /// Initialize-sensitive fields contributed at construction.
    contributors: Vec<Fields>,
    dynamic: Option<Dynamic>,
}

/// Describes an actor to spawn with [`Scene::spawn`].
#[derive(Clone)]
pub struct ActorBuilder {
    type_name: String,
    id: String,
    visible: bool,
    wire: bool,
    thickness: f32,
    drawing_pass: Option<DrawingPass>,
    pass_number: i32,
    dynamic: bool,
    contributors: Vec<Fields>,
    technique_override: Option<TechniqueOverride>,
}

impl ActorBuilder {
    pub fn new(type_name: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            id: id.into(),
            visible: true,
            wire: false,
            thickness: 0.0,
            drawing_pass: None,
            pass_number: 0,
            dynamic: false,
            contributors: Vec::new(),
            technique_override: None,
        }
    }

    /// Makes the actor draw through a drawable strategy.
    pub fn dynamic(mut self) -> Self {
        self.dynamic = true;
        self
    }

    pub fn visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    pub fn wire(mut self, wire: bool) -> Self {
        self.wire = wire;
        self
    }

    pub fn thickness(mut self, thickness: f32) -> Self {
        self.thickness = thickness;
        self
    }

    /// Defaults to the scene's configured pass.
    pub fn drawing_pass(mut self, pass: DrawingPass) -> Self {
        self.drawing_pass = Some(pass);
        self
    }

    pub fn pass_number(mut self, pass_number: i32) -> Self {
        self.pass_number = pass_number;
        self
    }

    /// Adds fields whose change must rebuild this actor's cached geometry.
    pub fn contributes(mut self, fields: Fields) -> Self {
        self.contributors.push(fields);
        self
    }

    pub fn technique_override(
        mut self,
        adjust: impl Fn(Technique) -> Technique + Send + Sync + 'static,
    ) -> Self {
        self.technique_override = Some(Arc::new(adjust));
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub(crate) fn build(
        self,
        key: ActorKey,
        uuid: Uuid,
        scene: Weak<Scene>,
        default_pass: DrawingPass,
    ) -> Result<Actor> {
        if self.id.is_empty() {
            return Err(Error::invalid("actor id must not be empty"));
        }
        if self.type_name.is_empty() {
            return Err(Error::invalid("actor type must not be empty"));
        }
        validate_thickness(self.thickness)?;
        let pass_number = narrow_pass_number(self.pass_number)?;
        Ok(Actor {
            key,
            id: self.id,
            uuid,
            scene,
            state: Mutex::new(ActorState {
                type_name: self.type_name,
                visible: self.visible,
                dirty: true,
                wire: self.wire,
                thickness: self.thickness,
                drawing_pass: self.drawing_pass.unwrap_or(default_pass),
                pass_number,
                root: true,
            }),
            lookup: Lookup::new(),
            listeners: Listeners::default(),
            disposed: AtomicBool::new(false),
            disposables: Mutex::new(Vec::new()),
            contributors: self.contributors,
            dynamic: self.dynamic.then(|| Dynamic {
                slot: Mutex::new(None),
                selection: Mutex::new(()),
                technique_override: self.technique_override,
            }),
        })
    }
}

fn validate_thickness(thickness: f32) -> Result<()> {
    // Also rejects NaN.
    if thickness >= 0.0 {
        Ok(())
    } else {
        Err(Error::invalid(format!("thickness must be >= 0, got {thickness}")))
    }
}

fn validate_pass_number(pass_number: i8) -> Result<()> {
    if pass_number < 0 {
        return Err(Error::invalid(format!("pass number must be >= 0, got {pass_number}")));
    }
    Ok(())
}

fn narrow_pass_number(pass_number: i32) -> Result<i8> {
    let narrowed = i8::try_from(pass_number)
        .map_err(|_| Error::invalid(format!("pass number must be in 0..=127, got {pass_number}")))?;
    validate_pass_number(narrowed)?;
    Ok(narrowed)
}

impl Actor {
    pub fn key(&self) -> ActorKey {
        self.key
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn scene(&self) -> Option<Arc<Scene>> {
        self.scene.upgrade()
    }

    pub(crate) fn scene_weak(&self) -> Weak<Scene> {
        Weak::clone(&self.scene)
    }

    pub fn lookup(&self) -> &Lookup {
        &self.lookup
    }

    /// Shorthand for `self.lookup().lookup::<C>()`.
    pub fn get<C: Capability>(&self) -> Option<Arc<C>> {
        self.lookup.lookup::<C>()
    }

    pub fn type_name(&self) -> String {
        lock(&self.state).type_name.clone()
    }

    pub fn is_visible(&self) -> bool {
        lock(&self.state).visible
    }

    pub fn is_dirty(&self) -> bool {
        lock(&self.state).dirty
    }

    pub fn is_wire(&self) -> bool {
        lock(&self.state).wire
    }

    pub fn thickness(&self) -> f32 {
        lock(&self.state).thickness
    }

    pub fn drawing_pass(&self) -> DrawingPass {
        lock(&self.state).drawing_pass
    }

    pub fn pass_number(&self) -> i8 {
        lock(&self.state).pass_number
    }

    /// True unless the actor holds a capability that makes it a child.
    pub fn is_root(&self) -> bool {
        lock(&self.state).root
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    pub fn is_dynamic(&self) -> bool {
        self.dynamic.is_some()
    }

    pub fn set_type(&self, type_name: impl Into<String>) -> Result<()> {
        let type_name = type_name.into();
        if type_name.is_empty() {
            return Err(Error::invalid("actor type must not be empty"));
        }
        self.update(Fields::TYPE, |state| {
            let changed = state.type_name != type_name;
            state.type_name = type_name;
            changed
        });
        Ok(())
    }

    pub fn set_visible(&self, visible: bool) {
        self.update(Fields::VISIBLE, |state| {
            std::mem::replace(&mut state.visible, visible) != visible
        });
    }

    pub fn set_wire(&self, wire: bool) {
        self.update(Fields::WIRE, |state| std::mem::replace(&mut state.wire, wire) != wire);
    }

    pub fn set_thickness(&self, thickness: f32) -> Result<()> {
        validate_thickness(thickness)?;
        self.update(Fields::THICKNESS, |state| {
            std::mem::replace(&mut state.thickness, thickness) != thickness
        });
        Ok(())
    }

    pub fn set_drawing_pass(&self, pass: DrawingPass) {
        let previous = {
            let mut state = lock(&self.state);
            std::mem::replace(&mut state.drawing_pass, pass)
        };
        if previous != pass {
            if let Some(scene) = self.scene() {
                scene.request_redraw(previous);
            }
            self.changed(Fields::DRAWING_PASS);
        }
    }

    pub fn set_pass_number(&self, pass_number: i8) -> Result<()> {
        validate_pass_number(pass_number)?;
        self.update(Fields::PASS_NUMBER, |state| {
            std::mem::replace(&mut state.pass_number, pass_number) != pass_number
        });
        Ok(())
    }

    /// Accepts `0..=127`, then narrows and delegates to [`Actor::set_pass_number`].
    pub fn set_pass_number_i32(&self, pass_number: i32) -> Result<()> {
        if pass_number > i32::from(i8::MAX) {
            return Err(Error::invalid(format!(
                "pass number must be <= 127, got {pass_number}"
            )));
        }
        self.set_pass_number(narrow_pass_number(pass_number)?)
    }

    /// Marks the actor dirty and asks the scene to redraw its pass.
    pub fn mark_dirty(&self) {
        self.changed(Fields::DIRTY);
    }

    pub(crate) fn clear_dirty(&self) {
        lock(&self.state).dirty = false;
    }

    fn update(&self, field: Fields, apply: impl FnOnce(&mut ActorState) -> bool) {
        let changed = apply(&mut *lock(&self.state));
        if changed {
            self.changed(field);
        }
    }

    /// Reacts to a change of `field` on the actor or one of its supports.
    ///
    /// Runs outside every lock: dirties the actor, requests a redraw of its
    /// pass, invalidates cached geometry when `field` is initialize-sensitive
    /// and finally notifies observers.
    pub(crate) fn changed(&self, field: Fields) {
        if self.is_disposed() {
            return;
        }
        let pass = {
            let mut state = lock(&self.state);
            state.dirty = true;
            state.drawing_pass
        };
        if let Some(scene) = self.scene() {
            scene.request_redraw(pass);
        }
        reinit::invalidate(self, field);
        // The shape decides which techniques can draw it.
        if self.is_dynamic() && field.intersects(Fields::SHAPE | Fields::LOOKUP) {
            if let Err(error) = self.select_strategy() {
                tracing::error!(actor = %self.id, %error, "Strategy reselection failed");
            }
        }
        self.listeners.notify(&PropertyEvent {
            source: EventSource::Actor(self.id.clone()),
            field,
        });
    }

    pub fn subscribe(
        &self,
        listener: impl Fn(&PropertyEvent) + Send + Sync + 'static,
    ) -> ListenerId {
        self.listeners.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.listeners.unsubscribe(id)
    }

    /// The union of the base set, construction-time contributors and every
    /// held capability's own fields.
    pub fn sensitive_fields(&self) -> Fields {
        let mut fields = Fields::BASE_INITIALIZE;
        for contributed in &self.contributors {
            fields |= *contributed;
        }
        for capability in self.lookup.lookup_all() {
            fields |= capability.initialize_fields();
        }
        fields
    }

    /// Adds `capability`, evicting any instance of the same type.
    ///
    /// An evicted support is detached from this actor and disposed once no
    /// other actor holds it.
    pub fn add<C: Capability>(&self, capability: Arc<C>) -> Result<()> {
        self.add_dyn(capability)
    }

    pub fn add_dyn(&self, capability: Arc<dyn Capability>) -> Result<()> {
        if self.is_disposed() {
            return Err(Error::invalid(format!("actor `{}` is disposed", self.id)));
        }
        if let Some(core) = capability.support() {
            if core.is_disposed() {
                return Err(Error::invalid(format!("support `{}` is disposed", core.name())));
            }
            core.attach(self.key);
        }
        if self.owns(&*capability) && capability.is_disposable() {
            let mut disposables = lock(&self.disposables);
            if !disposables.iter().any(|owned| same(owned, &capability)) {
                disposables.push(Arc::clone(&capability));
            }
        }
        let evicted = self.lookup.add_dyn(Arc::clone(&capability));
        if let Some(old) = evicted {
            if same(&old, &capability) {
                return Ok(());
            }
            let enrolled = self.unenroll(&old);
            self.release(&old, enrolled);
        }
        self.refresh_root();
        self.changed(Fields::LOOKUP);
        Ok(())
    }

    /// Removes `capability` if it is the stored instance. The capability is
    /// detached but not disposed; the caller gets it back intact.
    pub fn remove<C: Capability>(&self, capability: &Arc<C>) -> bool {
        let capability: Arc<dyn Capability> = Arc::clone(capability) as Arc<dyn Capability>;
        self.remove_dyn(&capability)
    }

    pub fn remove_dyn(&self, capability: &Arc<dyn Capability>) -> bool {
        if !self.lookup.remove_dyn(capability) {
            return false;
        }
        self.unenroll(capability);
        if let Some(core) = capability.support() {
            core.detach(self.key);
        }
        self.refresh_root();
        self.changed(Fields::LOOKUP);
        true
    }

    /// Number of owned capabilities that will be disposed with the actor.
    pub fn disposal_set_len(&self) -> usize {
        lock(&self.disposables).len()
    }

    fn owns(&self, capability: &dyn Capability) -> bool {
        capability.primary_actor() == Some(self.key)
    }

    /// Returns whether `capability` was in the disposal set.
    fn unenroll(&self, capability: &Arc<dyn Capability>) -> bool {
        let mut disposables = lock(&self.disposables);
        let before = disposables.len();
        disposables.retain(|owned| !same(owned, capability));
        disposables.len() != before
    }

    /// Detaches `capability` and disposes it once nothing holds it any more.
    /// Capabilities that are not supports are disposed only when enrolled.
    fn release(&self, capability: &Arc<dyn Capability>, enrolled: bool) {
        match capability.support() {
            Some(core) => {
                if core.detach(self.key) == 0 && capability.is_disposable() {
                    capability.dispose();
                }
            }
            None if enrolled => capability.dispose(),
            None => {}
        }
    }

    fn refresh_root(&self) {
        let root = !self.lookup.lookup_all().iter().any(|c| c.marks_child());
        let flipped = {
            let mut state = lock(&self.state);
            std::mem::replace(&mut state.root, root) != root
        };
        if flipped {
            tracing::trace!(actor = %self.id, root, "Root state changed");
            self.changed(Fields::PARENT);
        }
    }

    pub fn parent(&self) -> Option<ActorKey> {
        self.get::<ParentSupport>().map(|support| support.parent())
    }

    pub fn children(&self) -> Vec<ActorKey> {
        self.get::<ChildSupport>()
            .map(|support| support.children())
            .unwrap_or_default()
    }

    /// The active drawable strategy of a dynamic actor.
    pub fn strategy(&self) -> Option<Arc<dyn DrawableStrategy>> {
        let dynamic = self.dynamic.as_ref()?;
        lock(&dynamic.slot).clone()
    }

    pub fn technique(&self) -> Option<Technique> {
        self.strategy().map(|strategy| strategy.technique())
    }

    /// Re-runs strategy selection and swaps strategies when the resolved
    /// technique changed.
    ///
    /// Returns the active technique, or `None` for non-dynamic or disposed
    /// actors and for actors waiting for their scene to finish loading.
    /// A render mode the selector cannot map is a fatal error.
    pub fn select_strategy(&self) -> Result<Option<Technique>> {
        let Some(dynamic) = &self.dynamic else {
            return Ok(None);
        };
        let scene = self.scene().ok_or(Error::SceneGone)?;
        loop {
            // Check, teardown, install and registration form one step per
            // actor. Retired handles only reach the release queue here.
            let installed = {
                let _selecting = lock(&dynamic.selection);
                if self.is_disposed() {
                    return Ok(None);
                }
                let mut technique = selector::resolve_for(&scene, self)?;
                if let Some(adjust) = &dynamic.technique_override {
                    technique = adjust(technique);
                }
                if self.technique() == Some(technique) {
                    return Ok(Some(technique));
                }
                let outgoing = lock(&dynamic.slot).take();
                if let Some(old) = outgoing {
                    self.retire(&old);
                }
                selector::instantiate(&scene, self, technique).map(|strategy| {
                    self.lookup.add_dyn(Arc::clone(&strategy).as_capability());
                    *lock(&dynamic.slot) = Some(strategy);
                    technique
                })
            };
            match installed {
                Ok(technique) => {
                    tracing::debug!(actor = %self.id, ?technique, "Installed drawable strategy");
                    self.mark_dirty();
                    return Ok(Some(technique));
                }
                Err(error) if error.is_recoverable() => {
                    if scene.defer_until_loaded(self.key) {
                        tracing::debug!(
                            actor = %self.id,
                            "Strategy deferred until the scene is loaded"
                        );
                        return Ok(None);
                    }
                }
                Err(error) => return Err(error),
            }
        }
    }

    fn retire(&self, strategy: &Arc<dyn DrawableStrategy>) {
        let capability = Arc::clone(strategy).as_capability();
        self.lookup.remove_dyn(&capability);
        strategy.retire();
        tracing::debug!(
            actor = %self.id,
            technique = ?strategy.technique(),
            "Retired drawable strategy"
        );
    }

    /// Disposes the actor and everything it exclusively owns.
    ///
    /// Order: observers see `DISPOSE` first, then children are disposed, the
    /// actor detaches from its parent, its strategy and owned capabilities are
    /// released, and it leaves the scene last.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        tracing::debug!(actor = %self.id, "Disposing actor");
        self.listeners.notify(&PropertyEvent {
            source: EventSource::Actor(self.id.clone()),
            field: Fields::DISPOSE,
        });
        self.listeners.clear();

        let scene = self.scene();
        if let Some(scene) = &scene {
            for child in self.children() {
                if let Some(actor) = scene.actor(child) {
                    actor.dispose();
                }
            }
            if let Some(parent) = self.parent().and_then(|key| scene.actor(key)) {
                if let Some(children) = parent.get::<ChildSupport>() {
                    children.remove(self.key);
                }
            }
        }

        if let Some(dynamic) = &self.dynamic {
            let _selecting = lock(&dynamic.selection);
            let strategy = lock(&dynamic.slot).take();
            if let Some(strategy) = strategy {
                self.retire(&strategy);
            }
        }

        let owned = std::mem::take(&mut *lock(&self.disposables));
        for capability in self.lookup.clear() {
            let enrolled = owned.iter().any(|o| same(o, &capability));
            self.release(&capability, enrolled);
        }

        if let Some(scene) = &scene {
            scene.deregister(self.key);
        }
    }
}

impl PartialEq for Actor {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Actor {}

impl Hash for Actor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl std::fmt::Debug for Actor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = lock(&self.state).clone();
        f.debug_struct("Actor")
            .field("id", &self.id)
            .field("type", &state.type_name)
            .field("visible", &state.visible)
            .field("dirty", &state.dirty)
            .field("pass", &state.drawing_pass)
            .field("pass_number", &state.pass_number)
            .field("root", &state.root)
            .field("disposed", &self.is_disposed())
            .field("lookup", &self.lookup)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pass_number_narrowing() {
        assert_eq!(narrow_pass_number(127).unwrap(), 127);
        assert!(narrow_pass_number(128).is_err());
        assert!(narrow_pass_number(-1).is_err());
        assert!(narrow_pass_number(-200).is_err());
    }

    #[test]
    fn test_thickness_bounds() {
        assert!(validate_thickness(0.0).is_ok());
        assert!(validate_thickness(-0.0001).is_err());
        assert!(validate_thickness(f32::NAN).is_err());
    }
}
