//! # Capability Registry
//!
//! Every actor (and the scene itself) carries a [`Lookup`]: a registry that
//! maps a capability's concrete type to at most one live instance. Matching is
//! by exact type only; there is no upcasting at this level.
//!
//! The registry never disposes what it evicts. It hands the evicted instance
//! back to the caller, which knows whether it owns it.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::actor::ActorKey;
use crate::drawable::Frame;
use crate::error::Result;
use crate::events::{Fields, ListenerId, Listeners};
use crate::gl::GraphicsContext;
use crate::supports::SupportCore;
use crate::sync::lock;

/// Type-erasure helpers, implemented for every `Send + Sync` type.
pub trait AsAny: Any + Send + Sync {
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
    fn as_any(&self) -> &dyn Any;
    /// The concrete type of `self`, even when called through a trait object.
    fn concrete_type(&self) -> TypeId;
}

impl<T: Any + Send + Sync> AsAny for T {
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn concrete_type(&self) -> TypeId {
        TypeId::of::<T>()
    }
}

/// A unit of behaviour that can be attached to an actor or a scene.
///
/// Every hook has a no-op default; capabilities only override what they take
/// part in.
pub trait Capability: AsAny {
    /// Short name used in logs and events.
    fn name(&self) -> &'static str;

    /// The shared support state, for capabilities that are support objects.
    fn support(&self) -> Option<&SupportCore> {
        None
    }

    /// The actor that created this capability, if any.
    fn primary_actor(&self) -> Option<ActorKey> {
        self.support().map(SupportCore::primary)
    }

    /// True for capabilities whose presence makes the holder a child actor.
    fn marks_child(&self) -> bool {
        false
    }

    /// Fields whose change must invalidate the holder's cached GPU state.
    fn initialize_fields(&self) -> Fields {
        Fields::empty()
    }

    /// Ordering of `pre_draw` among the holder's capabilities (ascending).
    /// `post_draw` runs in the reverse order.
    fn draw_order(&self) -> i32 {
        0
    }

    fn pre_draw(&self, _ctx: &mut dyn GraphicsContext, _frame: &Frame<'_>) -> Result<()> {
        Ok(())
    }

    fn post_draw(&self, _ctx: &mut dyn GraphicsContext, _frame: &Frame<'_>) -> Result<()> {
        Ok(())
    }

    /// Whether [`Capability::dispose`] releases anything.
    fn is_disposable(&self) -> bool {
        false
    }

    /// Releases owned resources. Must be idempotent.
    fn dispose(&self) {}
}

impl std::fmt::Debug for dyn Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Capability").field("name", &self.name()).finish()
    }
}

/// Notification emitted for every registry mutation.
#[derive(Clone, Debug)]
pub struct LookupChange {
    pub old: Option<Arc<dyn Capability>>,
    pub new: Option<Arc<dyn Capability>>,
}

/// The concrete type behind a capability trait object.
pub fn type_of(capability: &dyn Capability) -> TypeId {
    AsAny::concrete_type(capability)
}

pub(crate) fn same(a: &Arc<dyn Capability>, b: &Arc<dyn Capability>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

/// Exact-type capability registry.
#[derive(Default)]
pub struct Lookup {
    entries: Mutex<HashMap<TypeId, Arc<dyn Capability>>>,
    listeners: Listeners<LookupChange>,
}

impl Lookup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `capability`, replacing any instance of the same concrete type.
    /// Returns the evicted instance.
    pub fn add<C: Capability>(&self, capability: Arc<C>) -> Option<Arc<dyn Capability>> {
        self.add_dyn(capability)
    }

    pub fn add_dyn(&self, capability: Arc<dyn Capability>) -> Option<Arc<dyn Capability>> {
        let key = type_of(&*capability);
        let old = lock(&self.entries).insert(key, Arc::clone(&capability));
        if let Some(previous) = &old {
            if same(previous, &capability) {
                return old;
            }
        }
        self.listeners.notify(&LookupChange {
            old: old.clone(),
            new: Some(capability),
        });
        old
    }

    /// Removes `capability` only if it is the stored instance.
    pub fn remove<C: Capability>(&self, capability: &Arc<C>) -> bool {
        let capability: Arc<dyn Capability> = Arc::clone(capability) as Arc<dyn Capability>;
        self.remove_dyn(&capability)
    }

    pub fn remove_dyn(&self, capability: &Arc<dyn Capability>) -> bool {
        let key = type_of(&**capability);
        let removed = {
            let mut entries = lock(&self.entries);
            match entries.get(&key) {
                Some(stored) if same(stored, capability) => entries.remove(&key),
                _ => None,
            }
        };
        match removed {
            Some(old) => {
                self.listeners.notify(&LookupChange {
                    old: Some(old),
                    new: None,
                });
                true
            }
            None => false,
        }
    }

    pub fn lookup<C: Capability>(&self) -> Option<Arc<C>> {
        let stored = self.lookup_type(TypeId::of::<C>())?;
        AsAny::into_any(stored).downcast::<C>().ok()
    }

    pub fn lookup_type(&self, key: TypeId) -> Option<Arc<dyn Capability>> {
        lock(&self.entries).get(&key).cloned()
    }

    pub fn contains<C: Capability>(&self) -> bool {
        lock(&self.entries).contains_key(&TypeId::of::<C>())
    }

    /// Snapshot of all entries, in no particular order.
    pub fn lookup_all(&self) -> Vec<Arc<dyn Capability>> {
        lock(&self.entries).values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Evicts everything and returns what was stored.
    pub fn clear(&self) -> Vec<Arc<dyn Capability>> {
        let drained: Vec<_> = lock(&self.entries).drain().map(|(_, v)| v).collect();
        for old in &drained {
            self.listeners.notify(&LookupChange {
                old: Some(Arc::clone(old)),
                new: None,
            });
        }
        drained
    }

    pub fn subscribe(
        &self,
        observer: impl Fn(&LookupChange) + Send + Sync + 'static,
    ) -> ListenerId {
        self.listeners.subscribe(observer)
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.listeners.unsubscribe(id)
    }
}

impl std::fmt::Debug for Lookup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&'static str> = self.lookup_all().iter().map(|c| c.name()).collect();
        f.debug_struct("Lookup").field("entries", &names).finish()
    }
}
