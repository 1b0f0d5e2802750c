//! # Component System
//!
//! Components are plain data records with no behavior. Each type is given a
//! dense [`ComponentId`] by the scene's registry the first time it is used,
//! and declares through [`Component::POLICY`] whether its pool may relocate.

/// Dense id assigned to a component type by a registry, starting at 0.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct ComponentId(u8);

impl ComponentId {
    /// Wraps a raw id. Ids are below [`MAX_COMPONENTS`](super::MAX_COMPONENTS).
    #[inline]
    #[must_use]
    pub const fn new(index: u8) -> Self {
        Self(index)
    }

    /// Returns the raw id, which is also the mask bit.
    #[inline]
    #[must_use]
    pub const fn index(self) -> u8 {
        self.0
    }
}

/// Storage policy of a component pool.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PoolPolicy {
    /// The pool grows geometrically on demand. References into it must be
    /// re-fetched by handle every tick.
    #[default]
    Relocatable,
    /// The pool reserves the scene's configured fixed ceiling up front and
    /// never reallocates.
    ///
    /// The ceiling bounds the entity slot index, not the number of stored
    /// components: pools are indexed by slot. Once a scene has handed out
    /// more slots than the ceiling, attaching this component to an entity
    /// whose index is at or past it fails with `CapacityExceeded` and halts
    /// the scene, even if the pool holds few values. Size the ceiling for the
    /// scene's peak entity count.
    NonRelocatable,
    /// Like [`PoolPolicy::NonRelocatable`], with an explicit slot ceiling.
    /// The same slot-index rule applies. A ceiling of zero is rejected at
    /// registration.
    Fixed(usize),
}

impl PoolPolicy {
    /// Resolves the slot ceiling of this policy, if it has one.
    #[inline]
    #[must_use]
    pub const fn ceiling(self, default_ceiling: usize) -> Option<usize> {
        match self {
            Self::Relocatable => None,
            Self::NonRelocatable => Some(default_ceiling),
            Self::Fixed(ceiling) => Some(ceiling),
        }
    }
}

/// Marker trait for scene components.
///
/// Components must be:
/// - `Default`: new pool slots are default-constructed, and removal resets a
///   slot back to the default value
/// - `'static`: the registry keys pools by type
///
/// # Example
///
/// ```rust,ignore
/// #[derive(Default)]
/// struct Velocity { x: f32, y: f32 }
///
/// impl Component for Velocity {}
///
/// #[derive(Default)]
/// struct AudioEmitter { voice: Option<VoiceHandle> }
///
/// impl Component for AudioEmitter {
///     const POLICY: PoolPolicy = PoolPolicy::NonRelocatable;
/// }
/// ```
pub trait Component: Default + 'static {
    /// Storage policy for this type's pool.
    const POLICY: PoolPolicy = PoolPolicy::Relocatable;
}
