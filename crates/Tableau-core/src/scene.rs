//! # Scene
//!
//! The scene owns every actor in a slotmap arena and drives the frame:
//!
//! 1. run coalesced reinitialize tasks,
//! 2. delete GPU handles released since the last frame,
//! 3. draw the visible root actors of the requested pass, ordered by pass
//!    number, recursing into children inside the parent's support state,
//! 4. clear dirty flags of what was drawn.
//!
//! Strategy construction is gated on [`Scene::set_loaded`]: dynamic actors
//! spawned earlier wait in the load gate and resolve their strategy when the
//! gate opens.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, RwLock, Weak};

use slotmap::SlotMap;
use uuid::Uuid;

use crate::actor::{Actor, ActorBuilder, ActorKey};
use crate::camera::{Camera, FrameStats};
use crate::config::{DrawingPass, RenderModes, SceneConfig, Technique, validate_preference};
use crate::drawable::Frame;
use crate::error::{Error, Result};
use crate::events::{EventSource, Fields, ListenerId, Listeners, PropertyEvent};
use crate::gl::{GraphicsContext, PolygonMode};
use crate::lookup::{Capability, Lookup};
use crate::picking::{PickingFrame, PickingMode};
use crate::reinit::{ReleaseQueue, Task, TaskQueue};
use crate::shapes::ShapeService;
use crate::supports::{ChildSupport, ParentSupport};
use crate::sync::{lock, read, write};

#[derive(Default)]
struct ActorTable {
    actors: SlotMap<ActorKey, Arc<Actor>>,
    ids: HashMap<String, ActorKey>,
}

#[derive(Debug, Default)]
struct LoadGate {
    loaded: bool,
    waiting: Vec<ActorKey>,
}

pub struct Scene {
    me: Weak<Scene>,
    config: RwLock<SceneConfig>,
    table: RwLock<ActorTable>,
    lookup: Lookup,
    gate: Mutex<LoadGate>,
    tasks: TaskQueue,
    releases: ReleaseQueue,
    redraw: Mutex<BTreeSet<DrawingPass>>,
    camera: RwLock<Camera>,
    listeners: Listeners<PropertyEvent>,
}

impl Scene {
    /// A scene with the built-in shape renderers registered. The scene starts
    /// unloaded.
    pub fn new(config: SceneConfig) -> Arc<Self> {
        let scene = Arc::new_cyclic(|me| Self {
            me: Weak::clone(me),
            config: RwLock::new(config),
            table: RwLock::new(ActorTable::default()),
            lookup: Lookup::new(),
            gate: Mutex::new(LoadGate::default()),
            tasks: TaskQueue::default(),
            releases: ReleaseQueue::default(),
            redraw: Mutex::new(BTreeSet::new()),
            camera: RwLock::new(Camera::default()),
            listeners: Listeners::default(),
        });
        scene.lookup.add(Arc::new(ShapeService::with_builtin()));
        scene
    }

    pub fn config(&self) -> SceneConfig {
        read(&self.config).clone()
    }

    /// Replaces the configuration and re-runs strategy selection for every
    /// dynamic actor.
    /// A config with an invalid preference is rejected before anything
    /// changes.
    pub fn set_config(&self, config: SceneConfig) -> Result<()> {
        config.validate()?;
        *write(&self.config) = config;
        self.reselect_all()
    }

    pub fn set_render_modes(&self, modes: RenderModes) -> Result<()> {
        {
            let mut config = write(&self.config);
            if config.render_modes == modes {
                return Ok(());
            }
            config.render_modes = modes;
        }
        tracing::info!(?modes, "Render modes changed");
        self.reselect_all()
    }

    /// Fails with [`Error::UnhandledRenderMode`] for an entry that is not a
    /// single technique, leaving the current preference in place.
    pub fn set_preference(&self, preference: Vec<RenderModes>) -> Result<()> {
        validate_preference(&preference)?;
        write(&self.config).preference = preference;
        self.reselect_all()
    }

    /// Reselects every actor even when one fails; the first error is returned.
    fn reselect_all(&self) -> Result<()> {
        let mut first_error = None;
        for actor in self.actors() {
            if let Err(error) = actor.select_strategy() {
                tracing::error!(actor = actor.id(), %error, "Strategy reselection failed");
                first_error.get_or_insert(error);
            }
        }
        self.notify(Fields::DIRTY);
        first_error.map_or(Ok(()), Err)
    }

    pub fn camera(&self) -> Camera {
        *read(&self.camera)
    }

    pub fn set_camera(&self, camera: Camera) {
        *write(&self.camera) = camera;
        // Billboards depend on the camera; every populated pass is redrawn.
        let passes: BTreeSet<DrawingPass> = read(&self.table)
            .actors
            .values()
            .map(|actor| actor.drawing_pass())
            .collect();
        lock(&self.redraw).extend(passes);
    }

    /// Scene-level capabilities, such as the [`ShapeService`].
    pub fn lookup(&self) -> &Lookup {
        &self.lookup
    }

    pub fn add<C: Capability>(&self, capability: Arc<C>) -> Option<Arc<dyn Capability>> {
        let evicted = self.lookup.add(capability);
        self.notify(Fields::LOOKUP);
        evicted
    }

    pub fn remove<C: Capability>(&self, capability: &Arc<C>) -> bool {
        let removed = self.lookup.remove(capability);
        if removed {
            self.notify(Fields::LOOKUP);
        }
        removed
    }

    pub fn shape_service(&self) -> Option<Arc<ShapeService>> {
        self.lookup.lookup::<ShapeService>()
    }

    pub fn new_uuid(&self) -> Uuid {
        Uuid::new_v4()
    }

    pub fn is_loaded(&self) -> bool {
        lock(&self.gate).loaded
    }

    /// Opens the load gate and resolves the strategies of every actor that
    /// was waiting for it.
    pub fn set_loaded(&self) -> Result<()> {
        let waiting = {
            let mut gate = lock(&self.gate);
            if gate.loaded {
                return Ok(());
            }
            gate.loaded = true;
            std::mem::take(&mut gate.waiting)
        };
        tracing::info!(waiting = waiting.len(), "Scene loaded");
        for key in waiting {
            if let Some(actor) = self.actor(key) {
                actor.select_strategy()?;
            }
        }
        Ok(())
    }

    /// Parks `key` until the scene is loaded. Returns `false` when the gate
    /// is already open and the caller should retry right away.
    pub(crate) fn defer_until_loaded(&self, key: ActorKey) -> bool {
        let mut gate = lock(&self.gate);
        if gate.loaded {
            return false;
        }
        if !gate.waiting.contains(&key) {
            gate.waiting.push(key);
        }
        true
    }

    /// Number of actors waiting for the load gate.
    pub fn deferred(&self) -> usize {
        lock(&self.gate).waiting.len()
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

    fn notify(&self, field: Fields) {
        self.listeners.notify(&PropertyEvent {
            source: EventSource::Scene,
            field,
        });
    }

    /// Creates an actor from `builder` and, for dynamic actors, resolves its
    /// drawable strategy (or defers it until the scene is loaded).
    pub fn spawn(&self, builder: ActorBuilder) -> Result<Arc<Actor>> {
        let default_pass = read(&self.config).default_pass;
        let actor = {
            let mut table = write(&self.table);
            if table.ids.contains_key(builder.id()) {
                return Err(Error::invalid(format!("duplicate actor id `{}`", builder.id())));
            }
            let uuid = self.new_uuid();
            let scene = Weak::clone(&self.me);
            let key = table.actors.try_insert_with_key(|key| {
                builder.build(key, uuid, scene, default_pass).map(Arc::new)
            })?;
            let actor = Arc::clone(&table.actors[key]);
            table.ids.insert(actor.id().to_owned(), key);
            actor
        };
        tracing::debug!(actor = actor.id(), dynamic = actor.is_dynamic(), "Spawned actor");
        self.request_redraw(actor.drawing_pass());
        actor.select_strategy()?;
        Ok(actor)
    }

    pub fn actor(&self, key: ActorKey) -> Option<Arc<Actor>> {
        read(&self.table).actors.get(key).cloned()
    }

    pub fn actor_by_id(&self, id: &str) -> Option<Arc<Actor>> {
        let table = read(&self.table);
        table.ids.get(id).and_then(|key| table.actors.get(*key)).cloned()
    }

    pub fn actors(&self) -> Vec<Arc<Actor>> {
        read(&self.table).actors.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        read(&self.table).actors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Root actors of `pass`, ordered by pass number.
    pub fn roots(&self, pass: DrawingPass) -> Vec<Arc<Actor>> {
        let mut roots: Vec<Arc<Actor>> = read(&self.table)
            .actors
            .values()
            .filter(|actor| actor.is_root() && actor.drawing_pass() == pass)
            .cloned()
            .collect();
        roots.sort_by_key(|actor| actor.pass_number());
        roots
    }

    /// Disposes the actor behind `key`, if it is still in the scene.
    pub fn dispose_actor(&self, key: ActorKey) -> bool {
        match self.actor(key) {
            Some(actor) => {
                actor.dispose();
                true
            }
            None => false,
        }
    }

    pub(crate) fn deregister(&self, key: ActorKey) {
        let removed = {
            let mut table = write(&self.table);
            let removed = table.actors.remove(key);
            if let Some(actor) = &removed {
                table.ids.remove(actor.id());
            }
            removed
        };
        lock(&self.gate).waiting.retain(|waiting| *waiting != key);
        if let Some(actor) = removed {
            self.request_redraw(actor.drawing_pass());
        }
    }

    /// Makes `child` a child of `parent`, detaching it from any previous
    /// parent. Self-parenting and cycles are rejected.
    pub fn add_child(&self, parent: ActorKey, child: ActorKey) -> Result<()> {
        if parent == child {
            return Err(Error::invalid("an actor cannot be its own child"));
        }
        let parent_actor = self
            .actor(parent)
            .ok_or_else(|| Error::invalid("unknown parent actor"))?;
        let child_actor = self.actor(child).ok_or_else(|| Error::invalid("unknown child actor"))?;
        let mut ancestor = parent_actor.parent();
        while let Some(key) = ancestor {
            if key == child {
                return Err(Error::invalid(format!(
                    "`{}` is an ancestor of `{}`",
                    child_actor.id(),
                    parent_actor.id()
                )));
            }
            ancestor = self.actor(key).and_then(|actor| actor.parent());
        }
        if let Some(previous) = child_actor.parent() {
            if previous == parent {
                return Ok(());
            }
            self.remove_child(previous, child)?;
        }

        let children = match parent_actor.get::<ChildSupport>() {
            Some(children) => children,
            None => {
                let children = Arc::new(ChildSupport::new(&parent_actor));
                parent_actor.add(Arc::clone(&children))?;
                children
            }
        };
        children.push(child);
        child_actor.add(Arc::new(ParentSupport::new(&child_actor, parent)))?;
        Ok(())
    }

    /// Detaches `child` from `parent`. Returns whether it was a child.
    pub fn remove_child(&self, parent: ActorKey, child: ActorKey) -> Result<bool> {
        let parent_actor = self
            .actor(parent)
            .ok_or_else(|| Error::invalid("unknown parent actor"))?;
        let removed = parent_actor
            .get::<ChildSupport>()
            .is_some_and(|children| children.remove(child));
        if let Some(child_actor) = self.actor(child) {
            if let Some(link) = child_actor.get::<ParentSupport>() {
                if link.parent() == parent {
                    child_actor.remove(&link);
                    link.dispose();
                }
            }
        }
        Ok(removed)
    }

    pub(crate) fn tasks(&self) -> &TaskQueue {
        &self.tasks
    }

    pub(crate) fn releases(&self) -> &ReleaseQueue {
        &self.releases
    }

    /// Reinitialize tasks waiting for the next frame.
    pub fn pending_tasks(&self) -> usize {
        self.tasks.len()
    }

    /// GPU handles waiting for the next frame.
    pub fn pending_releases(&self) -> usize {
        self.releases.len()
    }

    pub(crate) fn request_redraw(&self, pass: DrawingPass) {
        lock(&self.redraw).insert(pass);
    }

    /// Whether `pass` has changes that have not been rendered yet.
    pub fn needs_redraw(&self, pass: DrawingPass) -> bool {
        lock(&self.redraw).contains(&pass)
    }

    /// Uninitializes the strategy of every actor with a pending task.
    fn run_tasks(&self) -> usize {
        let mut reinitialized = 0;
        for task in self.tasks.take() {
            match task {
                Task::Reinitialize(key) => {
                    let Some(actor) = self.actor(key) else {
                        continue;
                    };
                    if actor.is_disposed() {
                        continue;
                    }
                    if let Some(strategy) = actor.strategy() {
                        strategy.uninitialize();
                        reinitialized += 1;
                    }
                }
            }
        }
        if reinitialized > 0 {
            tracing::debug!(reinitialized, "Ran reinitialize tasks");
        }
        reinitialized
    }

    /// Work every frame does before drawing: pending tasks, then releases.
    fn begin_frame(&self, ctx: &mut dyn GraphicsContext, stats: &mut FrameStats) {
        stats.reinitialized = self.run_tasks();
        stats.released = self.releases.drain(ctx);
        if stats.released > 0 {
            tracing::debug!(released = stats.released, "Released GPU handles");
        }
    }

    /// Renders one pass. Draw failures are logged, counted and skipped; the
    /// failing actor stays dirty.
    #[tracing::instrument(skip(self, ctx))]
    pub fn render(&self, ctx: &mut dyn GraphicsContext, pass: DrawingPass) -> FrameStats {
        let mut stats = FrameStats::default();
        self.begin_frame(ctx, &mut stats);
        lock(&self.redraw).remove(&pass);
        for actor in self.roots(pass) {
            self.draw_actor(ctx, &actor, &mut stats);
        }
        if stats.failures > 0 {
            // Failed actors stay dirty, so the pass does too.
            self.request_redraw(pass);
        }
        tracing::trace!(?stats, "Frame rendered");
        stats
    }

    fn draw_actor(&self, ctx: &mut dyn GraphicsContext, actor: &Actor, stats: &mut FrameStats) {
        if !actor.is_visible() || actor.is_disposed() {
            return;
        }
        let frame = Frame::new(self, actor);
        let chain = draw_chain(actor);
        let mut entered = 0;
        let outcome = self.draw_body(ctx, &frame, &chain, &mut entered, stats);
        for capability in chain[..entered].iter().rev() {
            if let Err(error) = capability.post_draw(ctx, &frame) {
                tracing::warn!(
                    actor = actor.id(),
                    capability = capability.name(),
                    %error,
                    "post_draw failed"
                );
            }
        }
        match outcome {
            Ok(()) => {
                actor.clear_dirty();
                stats.actors_drawn += 1;
            }
            Err(error) => {
                stats.failures += 1;
                tracing::warn!(actor = actor.id(), %error, "Draw failed");
            }
        }
    }

    fn draw_body(
        &self,
        ctx: &mut dyn GraphicsContext,
        frame: &Frame<'_>,
        chain: &[Arc<dyn Capability>],
        entered: &mut usize,
        stats: &mut FrameStats,
    ) -> Result<()> {
        for capability in chain {
            capability.pre_draw(ctx, frame)?;
            *entered += 1;
        }
        let actor = frame.actor;
        let wire = actor.is_wire();
        if wire {
            ctx.polygon_mode(PolygonMode::Line);
        }
        if actor.thickness() > 0.0 {
            ctx.line_width(actor.thickness());
        }
        let drawn = match actor.strategy() {
            Some(strategy) => strategy
                .prepare(ctx, frame)
                .and_then(|()| strategy.draw(ctx, frame)),
            None => Ok(0),
        };
        if wire {
            ctx.polygon_mode(PolygonMode::Fill);
        }
        if let Ok(vertices) = &drawn {
            stats.vertices += vertices;
        }
        for key in actor.children() {
            if let Some(child) = self.actor(key) {
                self.draw_actor(ctx, &child, stats);
            }
        }
        drawn.map(|_| ())
    }

    /// Picking draw of one pass. Uses immediate calls only and leaves every
    /// cache and dirty flag untouched.
    #[tracing::instrument(skip(self, ctx))]
    pub fn render_picking(
        &self,
        ctx: &mut dyn GraphicsContext,
        pass: DrawingPass,
        mode: PickingMode,
    ) -> PickingFrame {
        let mut picking = PickingFrame::default();
        for actor in self.roots(pass) {
            self.pick_actor(ctx, &actor, mode, &mut picking);
        }
        picking
    }

    fn pick_actor(
        &self,
        ctx: &mut dyn GraphicsContext,
        actor: &Actor,
        mode: PickingMode,
        picking: &mut PickingFrame,
    ) {
        if !actor.is_visible() || actor.is_disposed() {
            return;
        }
        let frame = Frame::picking(self, actor, mode);
        let chain = draw_chain(actor);
        let mut entered = 0;
        let named = mode != PickingMode::Color;
        if named {
            ctx.push_name(picking.names.len() as u32);
            picking.names.push(actor.key());
        }
        let outcome = self.pick_body(ctx, &frame, &chain, &mut entered, picking);
        for capability in chain[..entered].iter().rev() {
            if let Err(error) = capability.post_draw(ctx, &frame) {
                tracing::warn!(
                    actor = actor.id(),
                    capability = capability.name(),
                    %error,
                    "post_draw failed"
                );
            }
        }
        if named {
            ctx.pop_name();
        }
        if let Err(error) = outcome {
            tracing::warn!(actor = actor.id(), %error, "Picking draw failed");
        }
    }

    fn pick_body(
        &self,
        ctx: &mut dyn GraphicsContext,
        frame: &Frame<'_>,
        chain: &[Arc<dyn Capability>],
        entered: &mut usize,
        picking: &mut PickingFrame,
    ) -> Result<()> {
        for capability in chain {
            capability.pre_draw(ctx, frame)?;
            *entered += 1;
        }
        let mode = frame.picking.unwrap_or(PickingMode::Select);
        if let Some(strategy) = frame.actor.strategy() {
            picking.vertices += match mode {
                PickingMode::Select => strategy.picking_draw(ctx, frame)?,
                PickingMode::Items => strategy.item_picking_draw(ctx, frame)?,
                PickingMode::Color => strategy.color_picking_draw(ctx, frame, &mut picking.colors)?,
            };
        }
        for key in frame.actor.children() {
            if let Some(child) = self.actor(key) {
                self.pick_actor(ctx, &child, mode, picking);
            }
        }
        Ok(())
    }

    /// Technique of every dynamic actor, for diagnostics.
    pub fn techniques(&self) -> Vec<(String, Option<Technique>)> {
        self.actors()
            .iter()
            .filter(|actor| actor.is_dynamic())
            .map(|actor| (actor.id().to_owned(), actor.technique()))
            .collect()
    }
}

/// The actor's capabilities in `pre_draw` order.
fn draw_chain(actor: &Actor) -> Vec<Arc<dyn Capability>> {
    let mut chain = actor.lookup().lookup_all();
    chain.sort_by_key(|capability| capability.draw_order());
    chain
}

impl std::fmt::Debug for Scene {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scene")
            .field("actors", &self.len())
            .field("loaded", &self.is_loaded())
            .field("pending_tasks", &self.pending_tasks())
            .field("pending_releases", &self.pending_releases())
            .finish()
    }
}
