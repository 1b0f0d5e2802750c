//! # Scene
//!
//! Owns one world, one message bus and an ordered list of systems, and drives
//! them one tick at a time.
//!
//! ## Tick order
//!
//! ```text
//! simulate(dt)
//!   ├─ commit pending posts
//!   ├─ for each active system, in registration order:
//!   │    ├─ handle_message for every message it has not seen
//!   │    ├─ process(dt) over a snapshot of its matching entities
//!   │    ├─ apply deferred commands
//!   │    └─ deliver entity hooks, commit posts
//!   └─ close the message frame
//! ```
//!
//! Posts made during a turn are committed when the turn ends, so later
//! systems see them in the same tick and earlier systems see them next tick.

use std::any::{type_name, Any, TypeId};

use bytemuck::Pod;

use super::commands::CommandQueue;
use super::component::{Component, ComponentId};
use super::director::{Director, DirectorSystem};
use super::entity::Entity;
use super::mask::ComponentMask;
use super::system::{RenderTarget, System, SystemContext, SystemSetup};
use super::world::{Notification, World};
use crate::config::SceneConfig;
use crate::error::{EcsError, EcsResult};
use crate::message::{Message, MessageBus, MessageId, ReadCursor};

struct SystemSlot {
    system: Box<dyn System>,
    name: &'static str,
    type_id: TypeId,
    cursor: ReadCursor,
    active: bool,
}

impl SystemSlot {
    fn downcast_ref<S: Any>(&self) -> Option<&S> {
        let system: &dyn System = &*self.system;
        system.as_any().downcast_ref()
    }

    fn downcast_mut<S: Any>(&mut self) -> Option<&mut S> {
        let system: &mut dyn System = &mut *self.system;
        system.as_any_mut().downcast_mut()
    }
}

/// A world plus the systems that run over it.
///
/// # Example
///
/// ```rust,ignore
/// let mut scene = Scene::new(SceneConfig::load("scene.toml")?)?;
/// scene.add_system(Movement)?;
///
/// let ball = scene.create_entity()?;
/// scene.add_component(ball, Position::default())?;
/// scene.add_component(ball, Velocity::new(1.0, 0.0))?;
///
/// loop {
///     scene.simulate(1.0 / 60.0)?;
/// }
/// ```
pub struct Scene {
    world: World,
    bus: MessageBus,
    systems: Vec<SystemSlot>,
    commands: CommandQueue,
    cameras: Vec<Entity>,
    scratch: Vec<Entity>,
    notifications: Vec<Notification>,
    max_command_passes: u32,
    ticks: u64,
}

impl Scene {
    /// Creates an empty scene.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` if `config` fails [`SceneConfig::validate`].
    pub fn new(config: SceneConfig) -> EcsResult<Self> {
        config.validate()?;
        Ok(Self::with_valid_config(config))
    }

    fn with_valid_config(config: SceneConfig) -> Self {
        tracing::info!(
            "Creating scene (max entities: {:?}, fixed pool ceiling: {})",
            config.max_entities,
            config.fixed_pool_ceiling
        );
        Self {
            world: World::new(&config),
            bus: MessageBus::new(config.message_arena_words),
            systems: Vec::new(),
            commands: CommandQueue::new(),
            cameras: Vec::new(),
            scratch: Vec::new(),
            notifications: Vec::new(),
            max_command_passes: config.max_command_passes,
            ticks: 0,
        }
    }

    /// Read access to the world.
    #[inline]
    #[must_use]
    pub const fn world(&self) -> &World {
        &self.world
    }

    /// The scene's message bus, for polling from outside the tick.
    #[inline]
    #[must_use]
    pub const fn bus(&self) -> &MessageBus {
        &self.bus
    }

    /// Number of completed ticks.
    #[inline]
    #[must_use]
    pub const fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Returns `true` once a fatal error has halted this scene.
    #[inline]
    #[must_use]
    pub const fn is_poisoned(&self) -> bool {
        self.world.is_poisoned()
    }

    // =========================================================================
    // Entities and components
    // =========================================================================

    /// Creates an entity. See [`World::create_entity`].
    ///
    /// # Errors
    ///
    /// `CapacityExceeded` (fatal) or `ScenePoisoned`.
    pub fn create_entity(&mut self) -> EcsResult<Entity> {
        let created = self.world.create_entity();
        self.settle();
        created
    }

    /// Destroys an entity. See [`World::destroy_entity`].
    ///
    /// # Errors
    ///
    /// `InvalidEntity` for a stale handle, or `ScenePoisoned`.
    pub fn destroy_entity(&mut self, entity: Entity) -> EcsResult<()> {
        let destroyed = self.world.destroy_entity(entity);
        self.settle();
        destroyed
    }

    /// Checks if a handle refers to a live entity.
    #[inline]
    #[must_use]
    pub fn is_valid(&self, entity: Entity) -> bool {
        self.world.is_valid(entity)
    }

    /// Returns the component mask of a live entity.
    ///
    /// # Errors
    ///
    /// `InvalidEntity` if the handle is stale.
    #[inline]
    pub fn mask(&self, entity: Entity) -> EcsResult<ComponentMask> {
        self.world.mask(entity)
    }

    /// Registers `C` ahead of first use. See [`World::register_component`].
    ///
    /// # Errors
    ///
    /// `CapacityExceeded` (fatal) or `ScenePoisoned`.
    pub fn register_component<C: Component>(&mut self) -> EcsResult<ComponentId> {
        self.world.register_component::<C>()
    }

    /// Attaches a component. See [`World::add_component`].
    ///
    /// # Errors
    ///
    /// `InvalidEntity`, `DuplicateComponent`, `CapacityExceeded` (fatal) or
    /// `ScenePoisoned`.
    pub fn add_component<C: Component>(&mut self, entity: Entity, component: C) -> EcsResult<&mut C> {
        let added = self.world.add_component(entity, component).map(drop);
        self.settle();
        added?;
        self.world.get_component_mut(entity)
    }

    /// Detaches a component. See [`World::remove_component`].
    ///
    /// # Errors
    ///
    /// `InvalidEntity`, `MissingComponent` or `ScenePoisoned`.
    pub fn remove_component<C: Component>(&mut self, entity: Entity) -> EcsResult<()> {
        let removed = self.world.remove_component::<C>(entity);
        self.settle();
        removed
    }

    /// Returns `true` if the entity is live and owns a `C`.
    #[must_use]
    pub fn has_component<C: Component>(&self, entity: Entity) -> bool {
        self.world.has_component::<C>(entity)
    }

    /// Borrows a component. See [`World::get_component`].
    ///
    /// # Errors
    ///
    /// `InvalidEntity` or `MissingComponent`.
    pub fn get_component<C: Component>(&self, entity: Entity) -> EcsResult<&C> {
        self.world.get_component(entity)
    }

    /// Mutably borrows a component. See [`World::get_component_mut`].
    ///
    /// # Errors
    ///
    /// `InvalidEntity` or `MissingComponent`.
    pub fn get_component_mut<C: Component>(&mut self, entity: Entity) -> EcsResult<&mut C> {
        self.world.get_component_mut(entity)
    }

    // =========================================================================
    // Systems
    // =========================================================================

    /// Runs `system`'s setup and attaches it after every system already in
    /// the scene. Live entities that already match are added right away.
    ///
    /// # Errors
    ///
    /// - `DuplicateSystem` if a system of this type is attached
    /// - whatever the system's setup returned; the system is dropped
    /// - `ScenePoisoned`
    pub fn add_system<S: System>(&mut self, system: S) -> EcsResult<&mut S> {
        self.attach(system, false)
    }

    /// Attaches a director. It runs in registration order like any system,
    /// but never holds matching entities.
    ///
    /// # Errors
    ///
    /// `DuplicateSystem` or `ScenePoisoned`.
    pub fn add_director<D: Director>(&mut self, director: D) -> EcsResult<&mut D> {
        self.attach(DirectorSystem(director), true)
            .map(|slot| &mut slot.0)
    }

    fn attach<S: System>(&mut self, mut system: S, observer: bool) -> EcsResult<&mut S> {
        self.world.ensure_live()?;
        let name = type_name::<S>();
        if self.slot_of::<S>().is_some() {
            return Err(EcsError::DuplicateSystem(name));
        }

        let index = self.world.attach_record(name, observer);
        let mut setup = SystemSetup::new(&mut self.world, index);
        if let Err(err) = system.setup(&mut setup) {
            tracing::warn!("System {} rejected during setup: {}", name, err);
            self.world.discard_record(index);
            return Err(err);
        }
        self.world.seal_record(index);

        self.systems.push(SystemSlot {
            system: Box::new(system),
            name,
            type_id: TypeId::of::<S>(),
            cursor: ReadCursor::new(),
            active: true,
        });
        tracing::info!(
            "Attached system {} (requires {:?})",
            name,
            self.world.required_mask(index)
        );
        self.settle();

        self.systems[index]
            .downcast_mut::<S>()
            .ok_or(EcsError::UnknownSystem(name))
    }

    /// Returns the attached system of type `S`.
    #[must_use]
    pub fn system<S: System>(&self) -> Option<&S> {
        self.systems.get(self.slot_of::<S>()?)?.downcast_ref()
    }

    /// Returns the attached system of type `S` mutably.
    pub fn system_mut<S: System>(&mut self) -> Option<&mut S> {
        let index = self.slot_of::<S>()?;
        self.systems[index].downcast_mut()
    }

    /// Returns the attached director of type `D`.
    #[must_use]
    pub fn director<D: Director>(&self) -> Option<&D> {
        self.system::<DirectorSystem<D>>().map(|slot| &slot.0)
    }

    /// Returns the attached director of type `D` mutably.
    pub fn director_mut<D: Director>(&mut self) -> Option<&mut D> {
        self.system_mut::<DirectorSystem<D>>().map(|slot| &mut slot.0)
    }

    /// Pauses or resumes a system. Inactive systems are skipped by
    /// `simulate`, `forward_message` and `render`, but keep their matching
    /// list up to date.
    ///
    /// # Errors
    ///
    /// `UnknownSystem` if no `S` is attached.
    pub fn set_system_active<S: System>(&mut self, active: bool) -> EcsResult<()> {
        let index = self
            .slot_of::<S>()
            .ok_or(EcsError::UnknownSystem(type_name::<S>()))?;
        self.systems[index].active = active;
        tracing::debug!("System {} active: {}", self.systems[index].name, active);
        Ok(())
    }

    /// Pauses or resumes a director.
    ///
    /// # Errors
    ///
    /// `UnknownSystem` if no `D` is attached.
    pub fn set_director_active<D: Director>(&mut self, active: bool) -> EcsResult<()> {
        self.set_system_active::<DirectorSystem<D>>(active)
            .map_err(|_| EcsError::UnknownSystem(type_name::<D>()))
    }

    /// Returns `true` if `S` is attached and active.
    #[must_use]
    pub fn is_system_active<S: System>(&self) -> bool {
        self.slot_of::<S>()
            .is_some_and(|index| self.systems[index].active)
    }

    /// Entities currently matching `S`, in insertion order.
    #[must_use]
    pub fn matching_entities<S: System>(&self) -> Option<&[Entity]> {
        self.slot_of::<S>().map(|index| self.world.matching(index))
    }

    /// Required component mask of `S`.
    #[must_use]
    pub fn required_mask<S: System>(&self) -> Option<ComponentMask> {
        self.slot_of::<S>()
            .map(|index| self.world.required_mask(index))
    }

    // =========================================================================
    // Tick
    // =========================================================================

    /// Advances the scene by one tick.
    ///
    /// Recoverable errors returned by systems are logged and the tick goes on.
    ///
    /// # Errors
    ///
    /// `ScenePoisoned` if the scene was halted before or during this tick.
    pub fn simulate(&mut self, delta_time: f32) -> EcsResult<()> {
        self.world.ensure_live()?;
        self.settle();
        self.bus.commit();

        for index in 0..self.systems.len() {
            if self.systems[index].active {
                self.run_turn(index, Turn::Tick(delta_time))?;
            }
        }

        self.bus.end_frame();
        self.ticks += 1;
        Ok(())
    }

    /// Hands a message from outside the scene (another scene's bus, for
    /// example) to every active system's `handle_message`, in order.
    ///
    /// # Errors
    ///
    /// `ScenePoisoned` if the scene is or becomes halted.
    pub fn forward_message(&mut self, message: &Message<'_>) -> EcsResult<()> {
        self.world.ensure_live()?;
        for index in 0..self.systems.len() {
            if !self.systems[index].active {
                continue;
            }
            self.run_turn(index, Turn::Forward(message))?;
        }
        Ok(())
    }

    /// Posts a message from outside any system. It is committed at the start
    /// of the next tick.
    pub fn post_message<T: Pod>(&mut self, id: MessageId) -> &mut T {
        self.bus.post(id)
    }

    // =========================================================================
    // Rendering
    // =========================================================================

    /// Makes `camera` the active camera, replacing the previous one.
    ///
    /// # Errors
    ///
    /// `InvalidEntity` if the handle is stale.
    pub fn set_active_camera(&mut self, camera: Entity) -> EcsResult<()> {
        if !self.world.is_valid(camera) {
            return Err(EcsError::InvalidEntity(camera));
        }
        self.cameras.retain(|&other| other != camera);
        match self.cameras.first_mut() {
            Some(active) => *active = camera,
            None => self.cameras.push(camera),
        }
        Ok(())
    }

    /// Adds a camera rendered after the active one.
    ///
    /// # Errors
    ///
    /// `InvalidEntity` if the handle is stale.
    pub fn add_camera(&mut self, camera: Entity) -> EcsResult<()> {
        if !self.world.is_valid(camera) {
            return Err(EcsError::InvalidEntity(camera));
        }
        if !self.cameras.contains(&camera) {
            self.cameras.push(camera);
        }
        Ok(())
    }

    /// The camera used for the first render pass.
    #[must_use]
    pub fn active_camera(&self) -> Option<Entity> {
        self.cameras.first().copied()
    }

    /// Renders every live camera. For each camera, all renderable systems
    /// update their draw lists before any of them draws.
    ///
    /// Destroyed cameras are dropped from the list.
    pub fn render(&mut self, target: &mut dyn RenderTarget) {
        let world = &self.world;
        self.cameras.retain(|&camera| world.is_valid(camera));

        for &camera in &self.cameras {
            for slot in self.systems.iter_mut().filter(|slot| slot.active) {
                if let Some(renderable) = slot.system.as_renderable() {
                    renderable.update_draw_list(camera, world);
                }
            }
            for slot in self.systems.iter_mut().filter(|slot| slot.active) {
                if let Some(renderable) = slot.system.as_renderable() {
                    renderable.render(camera, world, target);
                }
            }
        }
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn slot_of<S: 'static>(&self) -> Option<usize> {
        let type_id = TypeId::of::<S>();
        self.systems.iter().position(|slot| slot.type_id == type_id)
    }

    /// Runs one system turn and everything that follows it: deferred
    /// commands, hooks and the commit of its posts.
    fn run_turn(&mut self, index: usize, turn: Turn<'_>) -> EcsResult<()> {
        self.scratch.clear();
        self.scratch.extend_from_slice(self.world.matching(index));

        let slot = &mut self.systems[index];
        let (log, outbox) = self.bus.split_mut();
        let mut ctx = SystemContext::new(
            &mut self.world,
            outbox,
            &mut self.commands,
            &self.scratch,
            index,
            self.ticks,
        );

        match turn {
            Turn::Tick(delta_time) => {
                while let Some(message) = log.poll(&mut slot.cursor) {
                    report(slot.name, slot.system.handle_message(&message, &mut ctx));
                    if ctx.world().is_poisoned() {
                        break;
                    }
                }
                if !ctx.world().is_poisoned() {
                    report(slot.name, slot.system.process(&mut ctx, delta_time));
                }
            }
            Turn::Forward(message) => {
                report(slot.name, slot.system.handle_message(message, &mut ctx));
            }
        }

        if !self.world.is_poisoned() {
            if let Ok(applied) = self.commands.apply(&mut self.world, self.max_command_passes) {
                if applied.applied > 0 {
                    tracing::debug!(
                        "Applied {} commands after {} in {} passes",
                        applied.applied,
                        self.systems[index].name,
                        applied.passes
                    );
                }
            }
        }

        self.settle();
        self.bus.commit();
        self.world.ensure_live()
    }

    /// Delivers queued entity hooks and posts queued lifecycle events.
    fn settle(&mut self) {
        self.world.compact_matching();
        for event in self.world.drain_lifecycle() {
            *self.bus.post(MessageId::SCENE) = event;
        }

        self.world.take_notifications(&mut self.notifications);
        for notification in self.notifications.drain(..) {
            match notification {
                Notification::Added { system, entity } => {
                    if let Some(slot) = self.systems.get_mut(system) {
                        slot.system.on_entity_added(entity);
                    }
                }
                Notification::Removed { system, entity } => {
                    if let Some(slot) = self.systems.get_mut(system) {
                        slot.system.on_entity_removed(entity);
                    }
                }
            }
        }
    }
}

/// What a system turn is for.
enum Turn<'m> {
    /// Drain unseen messages, then process.
    Tick(f32),
    /// Handle one message from outside the scene.
    Forward(&'m Message<'m>),
}

/// Logs a recoverable system error. Fatal errors were logged when they
/// poisoned the world.
fn report(system: &'static str, result: EcsResult<()>) {
    if let Err(err) = result {
        if !err.is_fatal() && !matches!(err, EcsError::ScenePoisoned(_)) {
            tracing::warn!("System {} failed: {}", system, err);
        }
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::with_valid_config(SceneConfig::default())
    }
}

impl std::fmt::Debug for Scene {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scene")
            .field("world", &self.world)
            .field("systems", &self.systems.iter().map(|s| s.name).collect::<Vec<_>>())
            .field("ticks", &self.ticks)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settle_leaves_world_queues_empty() {
        let mut scene = Scene::new(SceneConfig {
            broadcast_lifecycle: true,
            ..SceneConfig::default()
        })
        .unwrap();

        for _ in 0..100 {
            let entity = scene.create_entity().unwrap();
            scene.destroy_entity(entity).unwrap();
        }

        assert_eq!(scene.world.drain_lifecycle().count(), 0);
        let mut pending = Vec::new();
        scene.world.take_notifications(&mut pending);
        assert!(pending.is_empty());
        // Lifecycle events moved to the bus, waiting for the next commit.
        assert_eq!(scene.bus().pending(), 200);
    }
}
