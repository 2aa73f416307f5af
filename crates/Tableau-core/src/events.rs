//! # Property Events
//!
//! Two channels leave every actor and support object:
//! - an observation channel ([`Listeners`]) that external subscribers use to
//!   follow property changes, and
//! - the internal invalidation signal ([`Fields`]) that the reinitialize
//!   protocol checks directly, without going through the listener list.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use bitflags::bitflags;

use crate::sync::lock;

bitflags! {
    /// Observable properties of actors and support objects.
    ///
    /// A set of these is an actor's "initialize-sensitive field set": a change
    /// to any member invalidates GPU-resident caches.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct Fields: u32 {
        /// The capability registry gained or lost an entry.
        const LOOKUP = 1 << 0;
        /// Synthetic signal fired once when the owner is disposed.
        const DISPOSE = 1 << 1;
        const VISIBLE = 1 << 2;
        const WIRE = 1 << 3;
        const THICKNESS = 1 << 4;
        const DRAWING_PASS = 1 << 5;
        const PASS_NUMBER = 1 << 6;
        const TYPE = 1 << 7;
        const SHAPE = 1 << 8;
        const ORIGIN = 1 << 9;
        const COLOR = 1 << 10;
        const BACKGROUND = 1 << 11;
        const BORDER = 1 << 12;
        const BORDER_COLOR = 1 << 13;
        const BORDER_THICKNESS = 1 << 14;
        const TRANSFORM = 1 << 15;
        const CULLING = 1 << 16;
        const BLENDING = 1 << 17;
        const SHADER = 1 << 18;
        const CHILDREN = 1 << 19;
        const PARENT = 1 << 20;
        const SELECTION = 1 << 21;
        const DIRTY = 1 << 22;
    }
}

impl Fields {
    /// Fields every cached strategy reacts to, whatever its owner.
    pub const BASE_INITIALIZE: Fields = Fields::LOOKUP.union(Fields::DISPOSE);
}

/// Who fired a [`PropertyEvent`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EventSource {
    Actor(String),
    Support(&'static str),
    Scene,
}

/// A single property change.
///
/// Listeners should re-read current state instead of trusting a payload: the
/// event is delivered outside the owner's lock and the state may already be
/// newer than the change it describes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PropertyEvent {
    pub source: EventSource,
    pub field: Fields,
}

/// Handle returned by [`Listeners::subscribe`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Callback<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// A thread-safe list of callbacks.
///
/// Callbacks are invoked on a snapshot of the list, with no lock held, so a
/// listener may subscribe or unsubscribe from inside its own callback.
pub struct Listeners<E> {
    next_id: AtomicU64,
    entries: Mutex<Vec<(ListenerId, Callback<E>)>>,
}

impl<E> Default for Listeners<E> {
    fn default() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            entries: Mutex::new(Vec::new()),
        }
    }
}

impl<E> Listeners<E> {
    pub fn subscribe(&self, callback: impl Fn(&E) + Send + Sync + 'static) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        lock(&self.entries).push((id, Arc::new(callback)));
        id
    }

    /// Returns whether a listener was removed.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut entries = lock(&self.entries);
        let before = entries.len();
        entries.retain(|(entry, _)| *entry != id);
        entries.len() != before
    }

    pub fn clear(&self) {
        lock(&self.entries).clear();
    }

    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn notify(&self, event: &E) {
        let snapshot: Vec<Callback<E>> = lock(&self.entries)
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect();
        for callback in snapshot {
            callback(event);
        }
    }
}
