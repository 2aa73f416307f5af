use std::sync::Mutex;

use crate::actor::{Actor, ActorKey};
use crate::events::Fields;
use crate::lookup::Capability;
use crate::supports::SupportCore;
use crate::sync::lock;

/// The children of an actor, in draw order.
///
/// Holds keys into the scene's actor table; the scene owns the children.
#[derive(Debug)]
pub struct ChildSupport {
    core: SupportCore,
    children: Mutex<Vec<ActorKey>>,
}

impl ChildSupport {
    pub fn new(actor: &Actor) -> Self {
        Self {
            core: SupportCore::new("children", actor),
            children: Mutex::new(Vec::new()),
        }
    }

    pub fn children(&self) -> Vec<ActorKey> {
        lock(&self.children).clone()
    }

    pub fn contains(&self, child: ActorKey) -> bool {
        lock(&self.children).contains(&child)
    }

    pub fn len(&self) -> usize {
        lock(&self.children).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn push(&self, child: ActorKey) -> bool {
        {
            let mut children = lock(&self.children);
            if children.contains(&child) {
                return false;
            }
            children.push(child);
        }
        self.core.changed(Fields::CHILDREN);
        true
    }

    pub(crate) fn remove(&self, child: ActorKey) -> bool {
        let removed = {
            let mut children = lock(&self.children);
            let before = children.len();
            children.retain(|key| *key != child);
            children.len() != before
        };
        if removed {
            self.core.changed(Fields::CHILDREN);
        }
        removed
    }
}

impl Capability for ChildSupport {
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
        if self.core.begin_dispose() {
            lock(&self.children).clear();
        }
    }
}

/// Back-reference from a child to its parent. Holding one makes the actor a
/// non-root.
#[derive(Debug)]
pub struct ParentSupport {
    core: SupportCore,
    parent: ActorKey,
}

impl ParentSupport {
    pub fn new(actor: &Actor, parent: ActorKey) -> Self {
        Self {
            core: SupportCore::new("parent", actor),
            parent,
        }
    }

    pub fn parent(&self) -> ActorKey {
        self.parent
    }
}

impl Capability for ParentSupport {
    fn name(&self) -> &'static str {
        self.core.name()
    }

    fn support(&self) -> Option<&SupportCore> {
        Some(&self.core)
    }

    fn marks_child(&self) -> bool {
        true
    }

    fn is_disposable(&self) -> bool {
        true
    }

    fn dispose(&self) {
        self.core.begin_dispose();
    }
}
