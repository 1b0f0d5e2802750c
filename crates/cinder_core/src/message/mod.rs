//! # Message Bus
//!
//! A per-scene broadcast queue. Producers post typed payloads, consumers poll
//! with their own [`ReadCursor`]. Nobody subscribes: every poller sees every
//! message, so adding a consumer never touches a producer.
//!
//! ## Frame window
//!
//! ```text
//! post ──► outbox ──commit──► current frame ──end_frame──► previous frame ──end_frame──► gone
//! ```
//!
//! Every post gets a sequence number. The bus retains two frames, so a
//! message posted in frame N can be polled during frame N (once committed)
//! and frame N+1. A cursor remembers the next sequence number it has not
//! seen, so no consumer receives the same message twice.
//!
//! Payloads live in per-frame arenas. [`Message::data`] copies the payload
//! out; nothing can hold on to arena memory past the end of the frame.

mod arena;
mod event;

use std::any::TypeId;
use std::fmt;

use bytemuck::Pod;

use arena::{FrameArena, Record};
pub use event::{SceneEvent, SceneEventKind};

/// Category tag of a message. Consumers switch on it before reading data.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(pub u32);

impl MessageId {
    /// Reserved for scene lifecycle events.
    pub const SCENE: Self = Self(u32::MAX);
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A read-only view of one posted message.
///
/// Valid only while the bus is borrowed. Copy out what you need.
#[derive(Clone, Copy)]
pub struct Message<'a> {
    record: &'a Record,
    payload: &'a [u8],
}

impl<'a> Message<'a> {
    /// Returns the category tag.
    #[inline]
    #[must_use]
    pub fn id(&self) -> MessageId {
        self.record.id
    }

    /// Returns the bus-wide sequence number (post order).
    #[inline]
    #[must_use]
    pub fn sequence(&self) -> u64 {
        self.record.sequence
    }

    /// Copies the payload out as `T`.
    ///
    /// Returns `None` if the payload was posted as a different type.
    #[must_use]
    pub fn data<T: Pod>(&self) -> Option<T> {
        if self.record.type_id != TypeId::of::<T>() {
            return None;
        }
        Some(bytemuck::pod_read_unaligned(self.payload))
    }

    /// Returns the raw payload bytes.
    #[inline]
    #[must_use]
    pub fn bytes(&self) -> &'a [u8] {
        self.payload
    }
}

impl fmt::Debug for Message<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("id", &self.record.id)
            .field("sequence", &self.record.sequence)
            .field("type", &self.record.type_name)
            .field("len", &self.record.len)
            .finish()
    }
}

/// Per-consumer read position on a bus.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReadCursor {
    next: u64,
}

impl ReadCursor {
    /// A cursor that has seen nothing.
    #[must_use]
    pub const fn new() -> Self {
        Self { next: 0 }
    }
}

/// Committed messages of the previous and the current frame.
#[derive(Debug, Default)]
pub struct MessageLog {
    previous: FrameArena,
    current: FrameArena,
}

impl MessageLog {
    /// Returns the next message at or after `cursor`, advancing it.
    pub fn poll(&self, cursor: &mut ReadCursor) -> Option<Message<'_>> {
        for arena in [&self.previous, &self.current] {
            let records = arena.records();
            let start = records.partition_point(|record| record.sequence < cursor.next);
            if let Some(record) = records.get(start) {
                cursor.next = record.sequence + 1;
                return Some(Message {
                    record,
                    payload: arena.payload(record),
                });
            }
        }
        None
    }

    /// Number of messages retained across both frames.
    #[must_use]
    pub fn len(&self) -> usize {
        self.previous.len() + self.current.len()
    }

    /// Returns `true` if nothing is retained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Payload bytes retained across both frames.
    #[must_use]
    pub fn retained_bytes(&self) -> usize {
        self.previous.used() + self.current.used()
    }
}

/// Write side of a bus: posts land here until the next commit.
#[derive(Debug, Default)]
pub struct Outbox {
    pending: FrameArena,
    next_sequence: u64,
}

impl Outbox {
    /// Allocates a zeroed payload of type `T` tagged with `id` and returns it
    /// for the caller to fill in. Post order is preserved.
    ///
    /// # Panics
    ///
    /// Panics if `T` needs an alignment above 8 bytes.
    pub fn post<T: Pod>(&mut self, id: MessageId) -> &mut T {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.pending.alloc(id, sequence)
    }

    /// Number of posts waiting for the next commit.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Returns `true` if nothing is waiting.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.len() == 0
    }
}

/// Broadcast message queue owned by one scene.
///
/// # Example
///
/// ```rust,ignore
/// let mut bus = MessageBus::new(256);
/// let mut cursor = ReadCursor::new();
///
/// bus.post::<BallEvent>(BALL_MESSAGE).position = [1.0, 0.0, 2.0];
/// bus.commit();
///
/// while let Some(message) = bus.poll(&mut cursor) {
///     if let Some(event) = message.data::<BallEvent>() { /* ... */ }
/// }
///
/// bus.end_frame();
/// ```
#[derive(Debug, Default)]
pub struct MessageBus {
    log: MessageLog,
    outbox: Outbox,
    frame: u64,
}

impl MessageBus {
    /// Creates a bus with `words` 8-byte words reserved per frame.
    #[must_use]
    pub fn new(words: usize) -> Self {
        Self {
            log: MessageLog {
                previous: FrameArena::with_capacity(words),
                current: FrameArena::with_capacity(words),
            },
            outbox: Outbox {
                pending: FrameArena::with_capacity(words),
                next_sequence: 0,
            },
            frame: 0,
        }
    }

    /// Posts a payload. See [`Outbox::post`].
    pub fn post<T: Pod>(&mut self, id: MessageId) -> &mut T {
        self.outbox.post(id)
    }

    /// Makes every pending post visible to pollers.
    pub fn commit(&mut self) {
        self.log.current.append(&mut self.outbox.pending);
    }

    /// Returns the next committed message for `cursor`. See [`MessageLog::poll`].
    pub fn poll(&self, cursor: &mut ReadCursor) -> Option<Message<'_>> {
        self.log.poll(cursor)
    }

    /// Closes the frame: the previous frame is dropped and the current one
    /// becomes previous. Pending posts stay pending.
    pub fn end_frame(&mut self) {
        std::mem::swap(&mut self.log.previous, &mut self.log.current);
        self.log.current.reset();
        self.frame += 1;
    }

    /// Number of frames closed so far.
    #[must_use]
    pub const fn frame(&self) -> u64 {
        self.frame
    }

    /// Committed messages still retained.
    #[must_use]
    pub const fn log(&self) -> &MessageLog {
        &self.log
    }

    /// Number of posts waiting for the next commit.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.outbox.len()
    }

    /// Splits the bus so committed messages can be read while new ones are
    /// posted.
    pub(crate) fn split_mut(&mut self) -> (&MessageLog, &mut Outbox) {
        (&self.log, &mut self.outbox)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PING: MessageId = MessageId(1);
    const PONG: MessageId = MessageId(2);

    fn drain(bus: &MessageBus, cursor: &mut ReadCursor) -> Vec<u32> {
        let mut out = Vec::new();
        while let Some(message) = bus.poll(cursor) {
            out.push(message.data::<u32>().unwrap());
        }
        out
    }

    #[test]
    fn test_fifo_within_frame() {
        let mut bus = MessageBus::new(16);
        for value in 0..4u32 {
            *bus.post::<u32>(PING) = value;
        }
        bus.commit();

        let mut cursor = ReadCursor::new();
        assert_eq!(drain(&bus, &mut cursor), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_uncommitted_posts_are_invisible() {
        let mut bus = MessageBus::new(16);
        *bus.post::<u32>(PING) = 1;
        let mut cursor = ReadCursor::new();
        assert!(bus.poll(&mut cursor).is_none());
        assert_eq!(bus.pending(), 1);

        bus.commit();
        assert_eq!(drain(&bus, &mut cursor), vec![1]);
    }

    #[test]
    fn test_second_poll_pass_sees_nothing() {
        let mut bus = MessageBus::new(16);
        *bus.post::<u32>(PING) = 5;
        bus.commit();

        let mut cursor = ReadCursor::new();
        assert_eq!(drain(&bus, &mut cursor), vec![5]);
        assert!(drain(&bus, &mut cursor).is_empty());
    }

    #[test]
    fn test_message_survives_one_frame_boundary() {
        let mut bus = MessageBus::new(16);
        *bus.post::<u32>(PING) = 3;
        bus.commit();
        bus.end_frame();

        let mut late = ReadCursor::new();
        assert_eq!(drain(&bus, &mut late), vec![3]);

        bus.end_frame();
        let mut too_late = ReadCursor::new();
        assert!(bus.poll(&mut too_late).is_none());
        assert!(bus.log().is_empty());
    }

    #[test]
    fn test_retained_bytes_follow_the_window() {
        let mut bus = MessageBus::new(16);
        *bus.post::<u64>(PING) = 1;
        bus.commit();
        assert_eq!(bus.log().retained_bytes(), 8);

        bus.end_frame();
        *bus.post::<[u32; 4]>(PONG) = [1, 2, 3, 4];
        bus.commit();
        assert_eq!(bus.log().retained_bytes(), 24);

        bus.end_frame();
        bus.end_frame();
        assert_eq!(bus.log().retained_bytes(), 0);
    }

    #[test]
    fn test_cursor_spans_both_frames_in_order() {
        let mut bus = MessageBus::new(16);
        *bus.post::<u32>(PING) = 1;
        bus.commit();
        bus.end_frame();
        *bus.post::<u32>(PING) = 2;
        bus.commit();

        let mut cursor = ReadCursor::new();
        assert_eq!(drain(&bus, &mut cursor), vec![1, 2]);
    }

    #[test]
    fn test_typed_read_rejects_wrong_type() {
        let mut bus = MessageBus::new(16);
        *bus.post::<[f32; 2]>(PONG) = [1.5, 2.5];
        bus.commit();

        let mut cursor = ReadCursor::new();
        let message = bus.poll(&mut cursor).unwrap();
        assert_eq!(message.id(), PONG);
        assert!(message.data::<u64>().is_none());
        assert_eq!(message.data::<[f32; 2]>(), Some([1.5, 2.5]));
        assert_eq!(message.bytes().len(), 8);
    }
}
