//! # Component Registry
//!
//! Assigns each component type a dense id on first use and owns one pool per
//! registered type. Ids are stable for the lifetime of the registry and never
//! depend on platform type-identity ordering.

use std::any::{type_name, TypeId};
use std::collections::HashMap;

use super::component::{Component, ComponentId};
use super::mask::{ComponentMask, MAX_COMPONENTS};
use super::storage::{AnyPool, ComponentPool};
use crate::error::{EcsError, EcsResult, Resource};

struct PoolEntry {
    name: &'static str,
    pool: Box<dyn AnyPool>,
}

/// Scene-scoped registry of component types and their pools.
pub struct ComponentRegistry {
    ids: HashMap<TypeId, ComponentId>,
    pools: Vec<PoolEntry>,
    initial_pool_size: usize,
    fixed_pool_ceiling: usize,
}

impl ComponentRegistry {
    /// Creates an empty registry.
    ///
    /// # Arguments
    ///
    /// * `initial_pool_size` - Slots created with each relocatable pool
    /// * `fixed_pool_ceiling` - Ceiling for `PoolPolicy::NonRelocatable` types
    #[must_use]
    pub fn new(initial_pool_size: usize, fixed_pool_ceiling: usize) -> Self {
        Self {
            ids: HashMap::new(),
            pools: Vec::new(),
            initial_pool_size,
            fixed_pool_ceiling,
        }
    }

    /// Returns the number of registered component types.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.pools.len()
    }

    /// Returns `true` if no type has been registered yet.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }

    /// Registers `C`, or returns its existing id.
    ///
    /// # Errors
    ///
    /// - `CapacityExceeded` once [`MAX_COMPONENTS`] types are registered
    /// - `InvalidConfig` if the type's pool would have a zero slot ceiling
    pub fn register<C: Component>(&mut self) -> EcsResult<ComponentId> {
        if let Some(&id) = self.ids.get(&TypeId::of::<C>()) {
            return Ok(id);
        }

        if self.pools.len() >= MAX_COMPONENTS {
            return Err(EcsError::CapacityExceeded {
                resource: Resource::ComponentTypes,
                limit: MAX_COMPONENTS,
            });
        }

        let ceiling = C::POLICY.ceiling(self.fixed_pool_ceiling);
        if ceiling == Some(0) {
            return Err(EcsError::InvalidConfig(format!(
                "{} pool has a zero slot ceiling",
                type_name::<C>()
            )));
        }

        #[allow(clippy::cast_possible_truncation)]
        let id = ComponentId::new(self.pools.len() as u8);
        self.pools.push(PoolEntry {
            name: type_name::<C>(),
            pool: Box::new(ComponentPool::<C>::new(self.initial_pool_size, ceiling)),
        });
        self.ids.insert(TypeId::of::<C>(), id);
        Ok(id)
    }

    /// Returns the id of `C` if it has been registered.
    #[inline]
    #[must_use]
    pub fn id_of<C: Component>(&self) -> Option<ComponentId> {
        self.ids.get(&TypeId::of::<C>()).copied()
    }

    /// Returns the type name registered under `id`.
    #[must_use]
    pub fn name_of(&self, id: ComponentId) -> Option<&'static str> {
        self.pools.get(usize::from(id.index())).map(|entry| entry.name)
    }

    /// Returns the pool of `C`.
    #[must_use]
    pub fn pool<C: Component>(&self) -> Option<&ComponentPool<C>> {
        let id = self.id_of::<C>()?;
        self.pools[usize::from(id.index())]
            .pool
            .as_any()
            .downcast_ref::<ComponentPool<C>>()
    }

    /// Returns the pool of `C` mutably.
    pub fn pool_mut<C: Component>(&mut self) -> Option<&mut ComponentPool<C>> {
        let id = self.id_of::<C>()?;
        self.pools[usize::from(id.index())]
            .pool
            .as_any_mut()
            .downcast_mut::<ComponentPool<C>>()
    }

    /// Resets `index` in every pool whose bit is set in `mask`.
    pub(crate) fn reset_slots(&mut self, index: usize, mask: ComponentMask) {
        for id in mask.iter() {
            if let Some(entry) = self.pools.get_mut(usize::from(id.index())) {
                entry.pool.reset(index);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::PoolPolicy;

    #[derive(Default, Debug, PartialEq)]
    struct Transform(f32);
    impl Component for Transform {}

    #[derive(Default, Debug, PartialEq)]
    struct Sprite(u32);
    impl Component for Sprite {}

    #[derive(Default)]
    struct Emitter;
    impl Component for Emitter {
        const POLICY: PoolPolicy = PoolPolicy::NonRelocatable;
    }

    #[test]
    fn test_register_is_idempotent_and_dense() {
        let mut registry = ComponentRegistry::new(16, 1024);
        let a = registry.register::<Transform>().unwrap();
        let b = registry.register::<Sprite>().unwrap();
        assert_eq!(a, ComponentId::new(0));
        assert_eq!(b, ComponentId::new(1));
        assert_eq!(registry.register::<Transform>().unwrap(), a);
        assert_eq!(registry.len(), 2);
        assert!(registry.name_of(b).unwrap().ends_with("Sprite"));
    }

    #[test]
    fn test_non_relocatable_uses_configured_ceiling() {
        let mut registry = ComponentRegistry::new(16, 4);
        registry.register::<Emitter>().unwrap();
        assert_eq!(registry.pool::<Emitter>().unwrap().ceiling(), Some(4));
        assert!(registry.pool::<Transform>().is_none());
    }

    #[test]
    fn test_zero_ceiling_rejected_at_registration() {
        #[derive(Default)]
        struct Socket;
        impl Component for Socket {
            const POLICY: PoolPolicy = PoolPolicy::Fixed(0);
        }

        let mut registry = ComponentRegistry::new(16, 1024);
        assert!(matches!(
            registry.register::<Socket>(),
            Err(EcsError::InvalidConfig(_))
        ));
        assert!(registry.is_empty());

        let mut unsized_fixed = ComponentRegistry::new(16, 0);
        assert!(matches!(
            unsized_fixed.register::<Emitter>(),
            Err(EcsError::InvalidConfig(_))
        ));
        assert!(unsized_fixed.register::<Transform>().is_ok());
    }

    #[test]
    fn test_reset_slots_follows_mask() {
        let mut registry = ComponentRegistry::new(4, 1024);
        let transform = registry.register::<Transform>().unwrap();
        registry.register::<Sprite>().unwrap();
        registry.pool_mut::<Transform>().unwrap().insert(1, Transform(2.0)).unwrap();
        registry.pool_mut::<Sprite>().unwrap().insert(1, Sprite(7)).unwrap();

        registry.reset_slots(1, ComponentMask::EMPTY.with(transform));
        assert_eq!(registry.pool::<Transform>().unwrap().get(1), Some(&Transform(0.0)));
        assert_eq!(registry.pool::<Sprite>().unwrap().get(1), Some(&Sprite(7)));
    }
}
