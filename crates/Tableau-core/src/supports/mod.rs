//! # Support Objects
//!
//! Support objects are the capabilities actors are composed from. Each one
//! embeds a [`SupportCore`] that records:
//! - the *primary* actor that created it,
//! - every actor currently holding it (a support can be shared),
//! - its own property listeners and disposed flag.
//!
//! A property change on a support dirties every actor that holds it. A
//! shared support is disposed only once its last holder releases it.

mod appearance;
mod hierarchy;
mod shader;
mod shape;
mod transform;

pub use appearance::{BlendingSupport, ColorSupport, CullingSupport, SelectionSupport};
pub use hierarchy::{ChildSupport, ParentSupport};
pub use shader::ShaderSupport;
pub use shape::{BorderSupport, BorderStyle, ShapeSupport};
pub use transform::{Transform, TransformSupport};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};

use crate::actor::{Actor, ActorKey};
use crate::events::{EventSource, Fields, ListenerId, Listeners, PropertyEvent};
use crate::scene::Scene;
use crate::sync::lock;

/// State shared by every support object.
pub struct SupportCore {
    name: &'static str,
    primary: ActorKey,
    scene: Weak<Scene>,
    owners: Mutex<Vec<ActorKey>>,
    listeners: Listeners<PropertyEvent>,
    disposed: AtomicBool,
}

impl SupportCore {
    /// Core for a support created by `primary`. The primary actor becomes an
    /// owner when the support is added to it.
    pub fn new(name: &'static str, primary: &Actor) -> Self {
        Self {
            name,
            primary: primary.key(),
            scene: primary.scene_weak(),
            owners: Mutex::new(Vec::new()),
            listeners: Listeners::default(),
            disposed: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn primary(&self) -> ActorKey {
        self.primary
    }

    /// Actors currently holding this support, in the order they added it.
    pub fn owners(&self) -> Vec<ActorKey> {
        lock(&self.owners).clone()
    }

    pub fn is_shared(&self) -> bool {
        lock(&self.owners).len() > 1
    }

    pub fn scene(&self) -> Option<Arc<Scene>> {
        self.scene.upgrade()
    }

    pub(crate) fn attach(&self, owner: ActorKey) {
        let mut owners = lock(&self.owners);
        if !owners.contains(&owner) {
            owners.push(owner);
        }
    }

    /// Returns the number of owners left.
    pub(crate) fn detach(&self, owner: ActorKey) -> usize {
        let mut owners = lock(&self.owners);
        owners.retain(|key| *key != owner);
        owners.len()
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

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Flips the disposed flag, fires `DISPOSE` and drops all listeners.
    ///
    /// Returns `false` when the support was already disposed; the caller must
    /// then skip its own teardown.
    pub fn begin_dispose(&self) -> bool {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return false;
        }
        tracing::debug!(support = self.name, "Disposing support");
        self.listeners.notify(&self.event(Fields::DISPOSE));
        self.listeners.clear();
        true
    }

    /// Reports a property change: notifies listeners, then dirties every owner.
    pub fn changed(&self, field: Fields) {
        if self.is_disposed() {
            return;
        }
        self.listeners.notify(&self.event(field));
        let Some(scene) = self.scene() else {
            return;
        };
        for key in self.owners() {
            if let Some(actor) = scene.actor(key) {
                actor.changed(field);
            }
        }
    }

    fn event(&self, field: Fields) -> PropertyEvent {
        PropertyEvent {
            source: EventSource::Support(self.name),
            field,
        }
    }
}

impl std::fmt::Debug for SupportCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupportCore")
            .field("name", &self.name)
            .field("primary", &self.primary)
            .field("owners", &self.owners())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// Sets `slot` to `value` and reports whether it changed.
pub(crate) fn replace<T: PartialEq>(slot: &Mutex<T>, value: T) -> bool {
    let mut current = lock(slot);
    if *current == value {
        return false;
    }
    *current = value;
    true
}
