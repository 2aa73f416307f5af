//! # Reinitialize Protocol
//!
//! Cached GPU state (display lists, buffers, compiled programs) must be
//! rebuilt when a property that affects rendered output changes, but only on
//! the render thread. Setters therefore never touch the GPU. Instead:
//!
//! 1. [`invalidate`] checks the changed field against the actor's
//!    initialize-sensitive set and, on a hit, schedules a
//!    [`Task::Reinitialize`] on the scene's [`TaskQueue`]. Scheduling is
//!    idempotent, so a burst of changes between two frames collapses into a
//!    single task.
//! 2. At the start of the next frame the scene runs the pending tasks. A
//!    reinitialize task uninitializes the actor's strategy, which pushes its
//!    handles onto the [`ReleaseQueue`].
//! 3. The release queue is drained against the live context, and the
//!    strategy re-initializes lazily on its next draw.

use std::sync::Mutex;

use crate::actor::{Actor, ActorKey};
use crate::events::Fields;
use crate::gl::GraphicsContext;
use crate::sync::lock;

/// Deferred work that must run on the render thread.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Task {
    /// Drop the actor's cached GPU state; it is rebuilt on the next draw.
    Reinitialize(ActorKey),
}

/// Coalescing task queue. Safe to schedule into from any thread.
#[derive(Debug, Default)]
pub struct TaskQueue {
    pending: Mutex<Vec<Task>>,
}

impl TaskQueue {
    /// Queues `task` unless an identical task is already pending.
    ///
    /// Returns whether the task was newly queued.
    pub fn schedule(&self, task: Task) -> bool {
        let mut pending = lock(&self.pending);
        if pending.contains(&task) {
            return false;
        }
        pending.push(task);
        true
    }

    pub fn take(&self) -> Vec<Task> {
        std::mem::take(&mut *lock(&self.pending))
    }

    pub fn len(&self) -> usize {
        lock(&self.pending).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A GPU handle waiting to be deleted on the render thread.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GpuRelease {
    Lists { first: u32, range: u32 },
    Buffer(u32),
    Program(u32),
}

impl GpuRelease {
    fn execute(self, ctx: &mut dyn GraphicsContext) {
        match self {
            Self::Lists { first, range } => ctx.delete_lists(first, range),
            Self::Buffer(buffer) => ctx.delete_buffer(buffer),
            Self::Program(program) => ctx.delete_program(program),
        }
    }
}

/// Handles released off the render thread, deleted at the start of the next
/// frame.
#[derive(Debug, Default)]
pub struct ReleaseQueue {
    pending: Mutex<Vec<GpuRelease>>,
}

impl ReleaseQueue {
    pub fn push(&self, release: GpuRelease) {
        lock(&self.pending).push(release);
    }

    pub fn len(&self) -> usize {
        lock(&self.pending).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deletes every pending handle and returns how many were released.
    pub fn drain(&self, ctx: &mut dyn GraphicsContext) -> usize {
        let pending = std::mem::take(&mut *lock(&self.pending));
        for release in &pending {
            tracing::trace!(?release, "Releasing GPU handle");
            release.execute(ctx);
        }
        pending.len()
    }
}

/// Schedules a reinitialize of `actor` when `field` is initialize-sensitive.
///
/// Holds no state of its own: every actor and support reports through this
/// function.
pub(crate) fn invalidate(actor: &Actor, field: Fields) {
    if !actor.is_dynamic() || !actor.sensitive_fields().intersects(field) {
        return;
    }
    let Some(scene) = actor.scene() else {
        return;
    };
    if scene.tasks().schedule(Task::Reinitialize(actor.key())) {
        tracing::trace!(actor = actor.id(), ?field, "Scheduled reinitialize");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gl::RecordingContext;

    #[test]
    fn test_repeated_schedules_coalesce() {
        let queue = TaskQueue::default();
        let task = Task::Reinitialize(ActorKey::default());
        assert!(queue.schedule(task));
        for _ in 0..10 {
            assert!(!queue.schedule(task));
        }
        assert_eq!(queue.take(), vec![task]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_drain_deletes_each_handle_once() {
        let mut ctx = RecordingContext::new();
        let first = ctx.gen_lists(1);
        let buffer = ctx.gen_buffer();

        let queue = ReleaseQueue::default();
        queue.push(GpuRelease::Lists { first, range: 1 });
        queue.push(GpuRelease::Buffer(buffer));
        assert_eq!(queue.drain(&mut ctx), 2);
        assert_eq!(queue.drain(&mut ctx), 0);
        assert_eq!(ctx.live_lists(), 0);
        assert_eq!(ctx.live_buffers(), 0);
        assert_eq!(ctx.double_frees(), 0);
    }
}
