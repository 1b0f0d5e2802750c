//! # Component Storage
//!
//! Dense component pools indexed by entity slot.
//!
//! The storage uses a dense array strategy:
//! - Access is O(1) via entity index
//! - Iteration is cache-friendly (contiguous memory)
//! - A slot only means something while the entity's mask bit is set
//!
//! Relocatable pools grow geometrically. Fixed pools reserve their ceiling at
//! creation and refuse to grow past it, so their backing storage never moves.

use std::any::{type_name, Any};

use super::component::Component;
use crate::error::{EcsError, EcsResult, Resource};

/// Type-erased view of a pool, used by the registry for slot resets.
pub(crate) trait AnyPool: Any {
    /// Resets a slot back to the default value.
    fn reset(&mut self, index: usize);
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Storage for a single component type.
///
/// # Type Parameters
///
/// * `C` - The component type to store
///
/// # Example
///
/// ```rust,ignore
/// let mut pool: ComponentPool<Velocity> = ComponentPool::new(128, None);
/// pool.insert(5, Velocity { x: 1.0, y: 0.0 })?;
/// ```
pub struct ComponentPool<C: Component> {
    /// The dense array of components.
    data: Vec<C>,
    /// Slot ceiling for non-relocatable pools.
    ceiling: Option<usize>,
}

impl<C: Component> ComponentPool<C> {
    /// Creates a pool with `initial_size` default-constructed slots.
    ///
    /// With a ceiling, the full ceiling is reserved up front and the initial
    /// size is clamped to it.
    ///
    /// # Panics
    ///
    /// Panics if the ceiling is zero.
    #[must_use]
    pub fn new(initial_size: usize, ceiling: Option<usize>) -> Self {
        let data = match ceiling {
            Some(ceiling) => {
                assert!(ceiling > 0, "Pool ceiling must be greater than zero");
                let mut data = Vec::with_capacity(ceiling);
                data.resize_with(initial_size.min(ceiling), C::default);
                tracing::info!(
                    "Reserved fixed pool of {} slots for {}",
                    ceiling,
                    type_name::<C>()
                );
                data
            }
            None => {
                let mut data = Vec::new();
                data.resize_with(initial_size, C::default);
                data
            }
        };

        Self { data, ceiling }
    }

    /// Returns the number of addressable slots.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the pool has no slots.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns the slot ceiling, if this pool is non-relocatable.
    #[inline]
    #[must_use]
    pub const fn ceiling(&self) -> Option<usize> {
        self.ceiling
    }

    /// Returns the allocated capacity in slots.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.data.capacity()
    }

    /// Gets a component by entity index.
    ///
    /// The slot is only meaningful if the entity's mask says it owns `C`.
    #[inline]
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&C> {
        self.data.get(index)
    }

    /// Gets a mutable component by entity index.
    #[inline]
    pub fn get_mut(&mut self, index: usize) -> Option<&mut C> {
        self.data.get_mut(index)
    }

    /// Stores a component at the specified index, growing the pool if needed.
    ///
    /// # Errors
    ///
    /// `CapacityExceeded` if the pool is fixed and `index` is past its
    /// ceiling. Nothing is written in that case.
    pub fn insert(&mut self, index: usize, component: C) -> EcsResult<&mut C> {
        self.ensure_slot(index)?;
        let slot = &mut self.data[index];
        *slot = component;
        Ok(slot)
    }

    /// Resets a component slot to its default value.
    ///
    /// Memory is not released.
    #[inline]
    pub fn reset(&mut self, index: usize) {
        if let Some(slot) = self.data.get_mut(index) {
            *slot = C::default();
        }
    }

    /// Returns a slice of all slots.
    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[C] {
        &self.data
    }

    fn ensure_slot(&mut self, index: usize) -> EcsResult<()> {
        if index < self.data.len() {
            return Ok(());
        }

        match self.ceiling {
            Some(ceiling) => {
                if index >= ceiling {
                    return Err(EcsError::CapacityExceeded {
                        resource: Resource::Pool(type_name::<C>()),
                        limit: ceiling,
                    });
                }
                let reserved = self.data.capacity();
                self.data.resize_with(index + 1, C::default);
                debug_assert_eq!(reserved, self.data.capacity(), "fixed pool reallocated");
            }
            None => {
                let new_len = (index + 1).max(self.data.len() * 2);
                self.data.resize_with(new_len, C::default);
                tracing::debug!(
                    "Component pool {} grew to {} slots",
                    type_name::<C>(),
                    new_len
                );
            }
        }
        Ok(())
    }
}

impl<C: Component> AnyPool for ComponentPool<C> {
    fn reset(&mut self, index: usize) {
        ComponentPool::reset(self, index);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
