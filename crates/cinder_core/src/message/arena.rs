//! # Frame Arena
//!
//! A bump allocator for message payloads that are freed all at once at the
//! end of a frame.
//!
//! Storage is a run of 8-byte words, so every payload starts 8-byte aligned
//! and can be viewed in place as any `Pod` type with alignment up to 8.

use std::any::{type_name, TypeId};
use std::mem::{align_of, size_of};

use bytemuck::Pod;

use super::MessageId;

/// Word size of the arena backing storage.
type Word = u64;

/// Bookkeeping for one payload stored in an arena.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Record {
    pub(crate) id: MessageId,
    pub(crate) sequence: u64,
    pub(crate) type_id: TypeId,
    pub(crate) type_name: &'static str,
    /// First word of the payload.
    pub(crate) offset: usize,
    /// Payload size in bytes.
    pub(crate) len: usize,
}

/// A bump-pointer arena of message payloads, in post order.
///
/// Allocations are fast (append words). Memory is released all at once
/// when the arena is reset; the allocation itself is kept for the next frame.
///
/// # Thread Safety
///
/// This arena is NOT thread-safe. It belongs to exactly one bus.
#[derive(Debug, Default)]
pub(crate) struct FrameArena {
    records: Vec<Record>,
    words: Vec<Word>,
}

impl FrameArena {
    /// Creates an arena with `words` 8-byte words reserved.
    pub(crate) fn with_capacity(words: usize) -> Self {
        Self {
            records: Vec::new(),
            words: Vec::with_capacity(words),
        }
    }

    /// Number of payloads stored.
    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns the bytes used by payloads.
    #[inline]
    pub(crate) fn used(&self) -> usize {
        self.words.len() * size_of::<Word>()
    }

    /// Allocates a zeroed payload of type `T` and returns it for filling in.
    ///
    /// # Panics
    ///
    /// Panics if `T` needs an alignment above 8 bytes.
    pub(crate) fn alloc<T: Pod>(&mut self, id: MessageId, sequence: u64) -> &mut T {
        assert!(
            align_of::<T>() <= align_of::<Word>(),
            "message payload {} needs alignment {}, the bus supports at most {}",
            type_name::<T>(),
            align_of::<T>(),
            align_of::<Word>()
        );

        let len = size_of::<T>();
        let offset = self.words.len();
        self.words.resize(offset + len.div_ceil(size_of::<Word>()), 0);
        self.records.push(Record {
            id,
            sequence,
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
            offset,
            len,
        });

        let bytes: &mut [u8] = bytemuck::cast_slice_mut(&mut self.words[offset..]);
        bytemuck::from_bytes_mut(&mut bytes[..len])
    }

    /// Returns the raw bytes of a stored payload.
    #[inline]
    pub(crate) fn payload(&self, record: &Record) -> &[u8] {
        let bytes: &[u8] = bytemuck::cast_slice(&self.words[record.offset..]);
        &bytes[..record.len]
    }

    /// Payload records in post order.
    #[inline]
    pub(crate) fn records(&self) -> &[Record] {
        &self.records
    }

    /// Moves every payload of `other` to the end of this arena, preserving
    /// order. `other` is left empty with its allocation intact.
    pub(crate) fn append(&mut self, other: &mut Self) {
        let base = self.words.len();
        self.words.extend_from_slice(&other.words);
        self.records.extend(other.records.iter().map(|record| Record {
            offset: record.offset + base,
            ..*record
        }));
        other.reset();
    }

    /// Resets the arena, invalidating all previous payloads.
    ///
    /// No memory is freed or reallocated.
    #[inline]
    pub(crate) fn reset(&mut self) {
        self.records.clear();
        self.words.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arena_allocation_is_zeroed_and_aligned() {
        let mut arena = FrameArena::with_capacity(16);
        *arena.alloc::<u8>(MessageId(1), 0) = 7;
        let wide = arena.alloc::<[u64; 2]>(MessageId(2), 1);
        assert_eq!(*wide, [0, 0]);
        wide[1] = 9;

        assert_eq!(arena.len(), 2);
        assert_eq!(arena.used(), 24);
        let second = arena.records()[1];
        assert_eq!(second.offset, 1);
        assert_eq!(arena.payload(&second).len(), 16);
    }

    #[test]
    fn test_arena_append_rebases_offsets() {
        let mut a = FrameArena::with_capacity(4);
        let mut b = FrameArena::with_capacity(4);
        *a.alloc::<u32>(MessageId(1), 0) = 11;
        *b.alloc::<u32>(MessageId(2), 1) = 22;

        a.append(&mut b);
        assert_eq!(b.len(), 0);
        assert_eq!(a.len(), 2);
        let record = a.records()[1];
        assert_eq!(record.offset, 1);
        assert_eq!(bytemuck::pod_read_unaligned::<u32>(a.payload(&record)), 22);
    }

    #[test]
    fn test_arena_reset() {
        let mut arena = FrameArena::with_capacity(4);
        arena.alloc::<u64>(MessageId(1), 0);
        assert!(arena.used() > 0);

        arena.reset();
        assert_eq!(arena.used(), 0);
        assert_eq!(arena.len(), 0);
    }
}
