//! # Entity Management
//!
//! Entities are lightweight identifiers consisting of:
//! - An index into component pools
//! - A generation counter for safe reuse
//!
//! The [`EntityManager`] owns the slot table: liveness, generations and the
//! component mask of every slot. Freed slots are recycled lowest index first.

use std::collections::BTreeSet;
use std::fmt;

use super::mask::ComponentMask;
use crate::error::{EcsError, EcsResult, Resource};

/// Handle to an entity in a scene.
///
/// The handle is split into two parts:
/// - Lower 32 bits: slot index into component pools
/// - Upper 32 bits: generation of the slot when the handle was issued
///
/// Handles are plain values. They never own the entity, and a handle whose
/// generation no longer matches its slot is stale.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct Entity(u64);

impl Entity {
    /// Creates a handle from index and generation.
    #[inline]
    #[must_use]
    pub const fn new(index: u32, generation: u32) -> Self {
        Self(((generation as u64) << 32) | (index as u64))
    }

    /// Returns the slot index of this handle.
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.0 as u32
    }

    /// Returns the generation of this handle.
    #[inline]
    #[must_use]
    pub const fn generation(self) -> u32 {
        (self.0 >> 32) as u32
    }

    /// Null handle, never valid in any scene.
    pub const NULL: Self = Self(u64::MAX);

    /// Checks if this is the null handle.
    #[inline]
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == u64::MAX
    }
}

impl Default for Entity {
    fn default() -> Self {
        Self::NULL
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            f.write_str("Entity(null)")
        } else {
            write!(f, "Entity({}v{})", self.index(), self.generation())
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index(), self.generation())
    }
}

/// State of one slot in the entity table.
#[derive(Clone, Copy, Debug, Default)]
struct Slot {
    generation: u32,
    mask: ComponentMask,
    alive: bool,
}

/// Allocates and recycles entity slots.
///
/// Tracks for every slot whether it is alive, its current generation and the
/// component mask of the entity occupying it.
#[derive(Debug, Default)]
pub struct EntityManager {
    slots: Vec<Slot>,
    /// Freed indices, popped lowest first.
    free: BTreeSet<u32>,
    alive_count: usize,
    max_entities: Option<u32>,
}

impl EntityManager {
    /// Creates a manager, optionally with a hard entity ceiling.
    #[must_use]
    pub fn new(max_entities: Option<u32>) -> Self {
        Self {
            slots: Vec::new(),
            free: BTreeSet::new(),
            alive_count: 0,
            max_entities,
        }
    }

    /// Returns the number of live entities.
    #[inline]
    #[must_use]
    pub const fn alive_count(&self) -> usize {
        self.alive_count
    }

    /// Returns the number of slots ever allocated (live or free).
    #[inline]
    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Returns the configured entity ceiling, if any.
    #[inline]
    #[must_use]
    pub const fn max_entities(&self) -> Option<u32> {
        self.max_entities
    }

    /// Allocates the lowest free slot, growing the table if none is free.
    ///
    /// # Errors
    ///
    /// `CapacityExceeded` if the configured ceiling would be exceeded.
    pub fn create(&mut self) -> EcsResult<Entity> {
        if let Some(index) = self.free.pop_first() {
            let slot = &mut self.slots[index as usize];
            slot.alive = true;
            slot.mask = ComponentMask::EMPTY;
            self.alive_count += 1;
            return Ok(Entity::new(index, slot.generation));
        }

        let limit = self.max_entities.unwrap_or(u32::MAX - 1);
        if self.slots.len() >= limit as usize {
            return Err(EcsError::CapacityExceeded {
                resource: Resource::Entities,
                limit: limit as usize,
            });
        }

        #[allow(clippy::cast_possible_truncation)]
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            mask: ComponentMask::EMPTY,
            alive: true,
        });
        self.alive_count += 1;
        Ok(Entity::new(index, 0))
    }

    /// Frees a live slot, returning the mask the entity held.
    ///
    /// The generation is bumped so every outstanding handle becomes stale.
    ///
    /// # Errors
    ///
    /// `InvalidEntity` if the handle is stale or out of range.
    pub fn free(&mut self, entity: Entity) -> EcsResult<ComponentMask> {
        let slot = self.live_slot_mut(entity)?;
        let mask = slot.mask;
        slot.alive = false;
        slot.mask = ComponentMask::EMPTY;
        slot.generation = slot.generation.wrapping_add(1);
        self.alive_count -= 1;
        self.free.insert(entity.index());
        Ok(mask)
    }

    /// Checks if a handle refers to a live entity of the current generation.
    #[inline]
    #[must_use]
    pub fn is_valid(&self, entity: Entity) -> bool {
        self.live_slot(entity).is_ok()
    }

    /// Returns the component mask of a live entity.
    ///
    /// # Errors
    ///
    /// `InvalidEntity` if the handle is stale or out of range.
    #[inline]
    pub fn mask(&self, entity: Entity) -> EcsResult<ComponentMask> {
        self.live_slot(entity).map(|slot| slot.mask)
    }

    /// Overwrites the component mask of a live entity.
    pub(crate) fn set_mask(&mut self, entity: Entity, mask: ComponentMask) -> EcsResult<()> {
        self.live_slot_mut(entity)?.mask = mask;
        Ok(())
    }

    /// Iterates over all live entities in slot order.
    pub fn iter_alive(&self) -> impl Iterator<Item = (Entity, ComponentMask)> + '_ {
        self.slots.iter().enumerate().filter(|(_, s)| s.alive).map(|(index, slot)| {
            #[allow(clippy::cast_possible_truncation)]
            let entity = Entity::new(index as u32, slot.generation);
            (entity, slot.mask)
        })
    }

    fn live_slot(&self, entity: Entity) -> EcsResult<&Slot> {
        match self.slots.get(entity.index() as usize) {
            Some(slot) if !entity.is_null() && slot.alive && slot.generation == entity.generation() => {
                Ok(slot)
            }
            _ => Err(EcsError::InvalidEntity(entity)),
        }
    }

    fn live_slot_mut(&mut self, entity: Entity) -> EcsResult<&mut Slot> {
        match self.slots.get_mut(entity.index() as usize) {
            Some(slot) if !entity.is_null() && slot.alive && slot.generation == entity.generation() => {
                Ok(slot)
            }
            _ => Err(EcsError::InvalidEntity(entity)),
        }
    }
}
