//! # Component Masks
//!
//! Fixed-width bitsets: one bit per registered component type. Entities carry
//! the mask of what they own, systems carry the mask of what they require.

use std::fmt;

use super::component::ComponentId;

/// Maximum number of component types one registry can describe.
pub const MAX_COMPONENTS: usize = 64;

/// Bitset of component type ids.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct ComponentMask(u64);

impl ComponentMask {
    /// The mask with no bits set.
    pub const EMPTY: Self = Self(0);

    /// Returns a copy of this mask with the bit for `id` set.
    #[inline]
    #[must_use]
    pub const fn with(self, id: ComponentId) -> Self {
        Self(self.0 | (1 << id.index()))
    }

    /// Returns a copy of this mask with the bit for `id` cleared.
    #[inline]
    #[must_use]
    pub const fn without(self, id: ComponentId) -> Self {
        Self(self.0 & !(1 << id.index()))
    }

    /// Sets the bit for `id`.
    #[inline]
    pub fn insert(&mut self, id: ComponentId) {
        *self = self.with(id);
    }

    /// Checks the bit for `id`.
    #[inline]
    #[must_use]
    pub const fn contains(self, id: ComponentId) -> bool {
        (self.0 & (1 << id.index())) != 0
    }

    /// Checks that every bit of `required` is also set here.
    #[inline]
    #[must_use]
    pub const fn contains_all(self, required: Self) -> bool {
        (self.0 & required.0) == required.0
    }

    /// Returns `true` if no bits are set.
    #[inline]
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Number of bits set.
    #[inline]
    #[must_use]
    pub const fn len(self) -> u32 {
        self.0.count_ones()
    }

    /// Raw bits.
    #[inline]
    #[must_use]
    pub const fn bits(self) -> u64 {
        self.0
    }

    /// Iterates over the ids whose bits are set, lowest first.
    pub fn iter(self) -> impl Iterator<Item = ComponentId> {
        let mut bits = self.0;
        std::iter::from_fn(move || {
            if bits == 0 {
                return None;
            }
            #[allow(clippy::cast_possible_truncation)]
            let index = bits.trailing_zeros() as u8;
            bits &= bits - 1;
            Some(ComponentId::new(index))
        })
    }
}

impl fmt::Debug for ComponentMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ComponentMask({:#b})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_bits() {
        let a = ComponentId::new(0);
        let b = ComponentId::new(5);
        let mut mask = ComponentMask::EMPTY.with(a);
        assert!(mask.contains(a));
        assert!(!mask.contains(b));

        mask.insert(b);
        assert_eq!(mask.len(), 2);
        assert_eq!(mask.iter().collect::<Vec<_>>(), vec![a, b]);

        let mask = mask.without(a);
        assert!(!mask.contains(a));
        assert_eq!(mask.bits(), 1 << 5);
    }

    #[test]
    fn test_mask_superset() {
        let a = ComponentId::new(0);
        let b = ComponentId::new(1);
        let required = ComponentMask::EMPTY.with(a).with(b);

        assert!(!ComponentMask::EMPTY.with(a).contains_all(required));
        assert!(required.contains_all(required));
        assert!(required.with(ComponentId::new(63)).contains_all(required));
        assert!(ComponentMask::EMPTY.contains_all(ComponentMask::EMPTY));
    }
}
