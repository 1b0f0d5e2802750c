//! # World
//!
//! The central container for entities, components and the matching entity
//! lists of every attached system.
//!
//! Every structural change (create, destroy, add or remove a component) goes
//! through the world, which keeps three things coherent:
//! - an entity's mask bit is set exactly when its pool slot holds its data
//! - a system's list holds exactly the live entities whose mask covers the
//!   system's required mask
//! - a hook notification is queued for every list insertion and removal
//!
//! A fatal error poisons the world. Reads keep working, every later mutation
//! fails with `ScenePoisoned`.

use std::any::type_name;

use super::component::{Component, ComponentId};
use super::entity::{Entity, EntityManager};
use super::mask::ComponentMask;
use super::registry::ComponentRegistry;
use super::storage::ComponentPool;
use crate::config::SceneConfig;
use crate::error::{EcsError, EcsResult};
use crate::message::{SceneEvent, SceneEventKind};

/// Marks a slot with no entry in a record's list.
const NO_POSITION: u32 = u32::MAX;

/// Matching bookkeeping for one attached system.
///
/// Removal leaves a `NULL` hole so that withdrawing many entities costs one
/// compaction rather than one shift each. Holes never outlive a settle.
#[derive(Debug)]
struct SystemRecord {
    name: &'static str,
    mask: ComponentMask,
    entities: Vec<Entity>,
    /// List position of each entity, by slot index.
    positions: Vec<u32>,
    holes: usize,
    sealed: bool,
    /// Directors observe messages only and never hold entities.
    observer: bool,
}

impl SystemRecord {
    /// `None` stands for an entity that no longer exists.
    #[inline]
    fn matches(&self, mask: Option<ComponentMask>) -> bool {
        self.sealed && !self.observer && mask.is_some_and(|mask| mask.contains_all(self.mask))
    }

    fn push(&mut self, entity: Entity) {
        let slot = entity.index() as usize;
        if self.positions.len() <= slot {
            self.positions.resize(slot + 1, NO_POSITION);
        }
        #[allow(clippy::cast_possible_truncation)]
        let position = self.entities.len() as u32;
        self.positions[slot] = position;
        self.entities.push(entity);
    }

    fn take(&mut self, entity: Entity) {
        let Some(position) = self.positions.get_mut(entity.index() as usize) else {
            return;
        };
        if let Some(held) = self.entities.get_mut(*position as usize) {
            *held = Entity::NULL;
            self.holes += 1;
        }
        *position = NO_POSITION;
    }

    /// Closes holes, keeping the order of the remaining entities.
    fn compact(&mut self) {
        if self.holes == 0 {
            return;
        }
        self.entities.retain(|entity| !entity.is_null());
        for (position, entity) in self.entities.iter().enumerate() {
            #[allow(clippy::cast_possible_truncation)]
            let position = position as u32;
            self.positions[entity.index() as usize] = position;
        }
        self.holes = 0;
    }
}

/// Queued entity hook, delivered by the scene once no system is running.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Notification {
    Added { system: usize, entity: Entity },
    Removed { system: usize, entity: Entity },
}

/// The ECS world: entities, component pools and per-system matching lists.
///
/// # Example
///
/// A world is always owned by a [`Scene`](super::Scene), which delivers the
/// hooks and lifecycle events it queues. Systems reach it through their
/// context.
///
/// ```rust,ignore
/// let world = ctx.world_mut();
///
/// let ball = world.create_entity()?;
/// world.add_component(ball, Transform::default())?;
/// world.get_component_mut::<Transform>(ball)?.position = [0.0, 1.0, 0.0];
/// ```
pub struct World {
    entities: EntityManager,
    components: ComponentRegistry,
    records: Vec<SystemRecord>,
    notifications: Vec<Notification>,
    lifecycle: Vec<SceneEvent>,
    broadcast_lifecycle: bool,
    poisoned: Option<EcsError>,
}

impl World {
    /// Creates an empty world sized by `config`, which the caller has
    /// already validated.
    #[must_use]
    pub(crate) fn new(config: &SceneConfig) -> Self {
        Self {
            entities: EntityManager::new(config.max_entities),
            components: ComponentRegistry::new(
                config.initial_pool_size,
                config.fixed_pool_ceiling,
            ),
            records: Vec::new(),
            notifications: Vec::new(),
            lifecycle: Vec::new(),
            broadcast_lifecycle: config.broadcast_lifecycle,
            poisoned: None,
        }
    }

    /// The entity slot table.
    #[inline]
    #[must_use]
    pub const fn entities(&self) -> &EntityManager {
        &self.entities
    }

    /// The component registry and its pools.
    #[inline]
    #[must_use]
    pub const fn components(&self) -> &ComponentRegistry {
        &self.components
    }

    /// Returns the number of live entities.
    #[inline]
    #[must_use]
    pub const fn alive_count(&self) -> usize {
        self.entities.alive_count()
    }

    /// Returns `true` once a fatal error has halted this world.
    #[inline]
    #[must_use]
    pub const fn is_poisoned(&self) -> bool {
        self.poisoned.is_some()
    }

    /// The fatal error that halted this world, if any.
    #[must_use]
    pub fn poison_cause(&self) -> Option<&EcsError> {
        self.poisoned.as_ref()
    }

    // =========================================================================
    // Entities
    // =========================================================================

    /// Creates an entity with an empty mask.
    ///
    /// # Errors
    ///
    /// `CapacityExceeded` (fatal) at the configured entity ceiling.
    pub fn create_entity(&mut self) -> EcsResult<Entity> {
        self.ensure_live()?;
        let created = self.entities.create();
        let entity = self.guard(created)?;
        self.offer(entity, None, ComponentMask::EMPTY);
        if self.broadcast_lifecycle {
            self.lifecycle
                .push(SceneEvent::new(SceneEventKind::EntityCreated, entity));
        }
        Ok(entity)
    }

    /// Destroys an entity and every component it owns.
    ///
    /// Systems holding the entity are notified first, in reverse attachment
    /// order. Then the pool slots are reset and the slot is freed with a new
    /// generation.
    ///
    /// # Errors
    ///
    /// `InvalidEntity` if the handle is stale. Nothing changes in that case.
    pub fn destroy_entity(&mut self, entity: Entity) -> EcsResult<()> {
        self.ensure_live()?;
        let mask = match self.entities.mask(entity) {
            Ok(mask) => mask,
            Err(err) => {
                tracing::debug!("Ignoring destroy of stale entity {}", entity);
                return Err(err);
            }
        };

        self.withdraw(entity, mask, None);
        self.components
            .reset_slots(entity.index() as usize, mask);
        self.entities.free(entity)?;

        if self.broadcast_lifecycle {
            self.lifecycle
                .push(SceneEvent::new(SceneEventKind::EntityDestroyed, entity));
        }
        Ok(())
    }

    /// Checks if a handle refers to a live entity.
    #[inline]
    #[must_use]
    pub fn is_valid(&self, entity: Entity) -> bool {
        self.entities.is_valid(entity)
    }

    /// Returns the component mask of a live entity.
    ///
    /// # Errors
    ///
    /// `InvalidEntity` if the handle is stale.
    #[inline]
    pub fn mask(&self, entity: Entity) -> EcsResult<ComponentMask> {
        self.entities.mask(entity)
    }

    // =========================================================================
    // Components
    // =========================================================================

    /// Registers `C` without attaching it to anything.
    ///
    /// # Errors
    ///
    /// - `CapacityExceeded` (fatal) once every component id is taken
    /// - `InvalidConfig` if `C`'s pool would have a zero slot ceiling
    pub fn register_component<C: Component>(&mut self) -> EcsResult<ComponentId> {
        self.ensure_live()?;
        let registered = self.components.register::<C>();
        self.guard(registered)
    }

    /// Attaches `component` to `entity` and returns it in place.
    ///
    /// Every system whose requirements become satisfied gains the entity.
    ///
    /// # Errors
    ///
    /// - `InvalidEntity` if the handle is stale
    /// - `DuplicateComponent` if the entity already owns a `C`; the existing
    ///   value is kept
    /// - `CapacityExceeded` (fatal) if `C`'s pool is fixed and full
    /// - `InvalidConfig` if `C`'s pool would have a zero slot ceiling
    pub fn add_component<C: Component>(&mut self, entity: Entity, component: C) -> EcsResult<&mut C> {
        self.ensure_live()?;
        let old = self.entities.mask(entity)?;
        let id = self.register_component::<C>()?;
        if old.contains(id) {
            return Err(EcsError::DuplicateComponent {
                entity,
                component: type_name::<C>(),
            });
        }

        let inserted = match self.components.pool_mut::<C>() {
            Some(pool) => pool.insert(entity.index() as usize, component).map(drop),
            None => Err(Self::missing::<C>(entity)),
        };
        self.guard(inserted)?;

        let new = old.with(id);
        self.entities.set_mask(entity, new)?;
        self.offer(entity, Some(old), new);
        self.get_component_mut(entity)
    }

    /// Detaches `C` from `entity`.
    ///
    /// Systems that required `C` lose the entity before the slot is reset.
    ///
    /// # Errors
    ///
    /// `InvalidEntity` if the handle is stale, `MissingComponent` if the
    /// entity has no `C`.
    pub fn remove_component<C: Component>(&mut self, entity: Entity) -> EcsResult<()> {
        self.ensure_live()?;
        let old = self.entities.mask(entity)?;
        let id = match self.components.id_of::<C>() {
            Some(id) if old.contains(id) => id,
            _ => return Err(Self::missing::<C>(entity)),
        };

        let new = old.without(id);
        self.withdraw(entity, old, Some(new));
        self.entities.set_mask(entity, new)?;
        if let Some(pool) = self.components.pool_mut::<C>() {
            pool.reset(entity.index() as usize);
        }
        Ok(())
    }

    /// Returns `true` if the entity is live and owns a `C`.
    #[must_use]
    pub fn has_component<C: Component>(&self, entity: Entity) -> bool {
        match (self.entities.mask(entity), self.components.id_of::<C>()) {
            (Ok(mask), Some(id)) => mask.contains(id),
            _ => false,
        }
    }

    /// Borrows the `C` owned by `entity`.
    ///
    /// # Errors
    ///
    /// `InvalidEntity` if the handle is stale, `MissingComponent` if the
    /// entity has no `C`.
    pub fn get_component<C: Component>(&self, entity: Entity) -> EcsResult<&C> {
        let mask = self.entities.mask(entity)?;
        match self.components.id_of::<C>() {
            Some(id) if mask.contains(id) => {}
            _ => return Err(Self::missing::<C>(entity)),
        }
        self.components
            .pool::<C>()
            .and_then(|pool| pool.get(entity.index() as usize))
            .ok_or_else(|| Self::missing::<C>(entity))
    }

    /// Mutably borrows the `C` owned by `entity`.
    ///
    /// # Errors
    ///
    /// `InvalidEntity` if the handle is stale, `MissingComponent` if the
    /// entity has no `C`.
    pub fn get_component_mut<C: Component>(&mut self, entity: Entity) -> EcsResult<&mut C> {
        let mask = self.entities.mask(entity)?;
        match self.components.id_of::<C>() {
            Some(id) if mask.contains(id) => {}
            _ => return Err(Self::missing::<C>(entity)),
        }
        self.components
            .pool_mut::<C>()
            .and_then(|pool| pool.get_mut(entity.index() as usize))
            .ok_or_else(|| Self::missing::<C>(entity))
    }

    /// The pool of `C`, for bulk reads. Slots are only meaningful for
    /// entities whose mask has `C`'s bit set.
    #[must_use]
    pub fn pool<C: Component>(&self) -> Option<&ComponentPool<C>> {
        self.components.pool::<C>()
    }

    // =========================================================================
    // System bookkeeping
    // =========================================================================

    /// Opens a record for a system that is about to run its setup. Observer
    /// records never match any entity.
    pub(crate) fn attach_record(&mut self, name: &'static str, observer: bool) -> usize {
        self.records.push(SystemRecord {
            name,
            mask: ComponentMask::EMPTY,
            entities: Vec::new(),
            positions: Vec::new(),
            holes: 0,
            sealed: false,
            observer,
        });
        self.records.len() - 1
    }

    /// Drops the record of a system whose setup failed. Only the most recent
    /// record can be discarded.
    pub(crate) fn discard_record(&mut self, system: usize) {
        debug_assert_eq!(system + 1, self.records.len());
        self.records.truncate(system);
    }

    /// Adds a component to a system's required mask while it is unsealed.
    pub(crate) fn declare_requirement(
        &mut self,
        system: usize,
        id: ComponentId,
        component: &'static str,
    ) -> EcsResult<()> {
        let Some(record) = self.records.get_mut(system) else {
            return Err(EcsError::UnknownSystem(component));
        };
        if record.sealed {
            tracing::error!(
                "System {} tried to require {} after attachment",
                record.name,
                component
            );
            return Err(EcsError::RequirementDeclaredLate {
                system: record.name,
                component,
            });
        }
        record.mask.insert(id);
        Ok(())
    }

    /// Freezes a system's mask and collects the live entities it matches.
    pub(crate) fn seal_record(&mut self, system: usize) {
        let Some(record) = self.records.get_mut(system) else {
            return;
        };
        record.sealed = true;
        for (entity, mask) in self.entities.iter_alive() {
            if record.matches(Some(mask)) {
                record.push(entity);
                self.notifications
                    .push(Notification::Added { system, entity });
            }
        }
        tracing::debug!(
            "System {} sealed with {} matching entities",
            record.name,
            record.entities.len()
        );
    }

    /// Required mask of the system at `system`.
    pub(crate) fn required_mask(&self, system: usize) -> ComponentMask {
        self.records
            .get(system)
            .map_or(ComponentMask::EMPTY, |record| record.mask)
    }

    /// Matching entities of the system at `system`, in insertion order.
    /// Only meaningful after [`World::compact_matching`].
    pub(crate) fn matching(&self, system: usize) -> &[Entity] {
        self.records
            .get(system)
            .map(|record| {
                debug_assert_eq!(record.holes, 0, "{} read before compaction", record.name);
                record.entities.as_slice()
            })
            .unwrap_or_default()
    }

    /// Closes the holes removals left in every matching list.
    pub(crate) fn compact_matching(&mut self) {
        for record in &mut self.records {
            record.compact();
        }
    }

    /// Moves queued hook notifications into `out`.
    pub(crate) fn take_notifications(&mut self, out: &mut Vec<Notification>) {
        out.append(&mut self.notifications);
    }

    /// Drains queued lifecycle events.
    pub(crate) fn drain_lifecycle(&mut self) -> std::vec::Drain<'_, SceneEvent> {
        self.lifecycle.drain(..)
    }

    /// Fails with `ScenePoisoned` once a fatal error has been recorded.
    pub(crate) fn ensure_live(&self) -> EcsResult<()> {
        match &self.poisoned {
            Some(cause) => Err(EcsError::ScenePoisoned(Box::new(cause.clone()))),
            None => Ok(()),
        }
    }

    // =========================================================================
    // Internals
    // =========================================================================

    /// Records fatal errors before handing the result back.
    fn guard<T>(&mut self, result: EcsResult<T>) -> EcsResult<T> {
        if let Err(err) = &result {
            if err.is_fatal() && self.poisoned.is_none() {
                tracing::error!("Fatal error, halting world: {}", err);
                self.poisoned = Some(err.clone());
            }
        }
        result
    }

    /// Inserts `entity` into every list it newly matches. `old` is `None` for
    /// a fresh entity.
    fn offer(&mut self, entity: Entity, old: Option<ComponentMask>, new: ComponentMask) {
        for (system, record) in self.records.iter_mut().enumerate() {
            if record.matches(Some(new)) && !record.matches(old) {
                record.push(entity);
                self.notifications
                    .push(Notification::Added { system, entity });
            }
        }
    }

    /// Removes `entity` from every list it stops matching, last system first.
    /// `new` is `None` when the entity is being destroyed.
    fn withdraw(&mut self, entity: Entity, old: ComponentMask, new: Option<ComponentMask>) {
        for (system, record) in self.records.iter_mut().enumerate().rev() {
            if record.matches(Some(old)) && !record.matches(new) {
                record.take(entity);
                self.notifications
                    .push(Notification::Removed { system, entity });
            }
        }
    }

    fn missing<C>(entity: Entity) -> EcsError {
        EcsError::MissingComponent {
            entity,
            component: type_name::<C>(),
        }
    }
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("alive", &self.entities.alive_count())
            .field("component_types", &self.components.len())
            .field("systems", &self.records.len())
            .field("poisoned", &self.poisoned)
            .finish()
    }
}
