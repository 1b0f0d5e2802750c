//! # Scene Lifecycle Events
//!
//! Payload posted under [`MessageId::SCENE`] when a scene is configured to
//! broadcast entity creation and destruction.

// bytemuck derives emit unsafe impls
#![allow(unsafe_code)]

use bytemuck::{Pod, Zeroable};

use super::MessageId;
use crate::ecs::Entity;

/// What happened to the entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum SceneEventKind {
    /// The entity was created.
    EntityCreated = 0,
    /// The entity was destroyed.
    EntityDestroyed = 1,
}

/// Lifecycle notification for one entity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct SceneEvent {
    kind: u32,
    index: u32,
    generation: u32,
}

impl SceneEvent {
    /// Message id lifecycle events are posted under.
    pub const ID: MessageId = MessageId::SCENE;

    /// Creates an event.
    #[must_use]
    pub const fn new(kind: SceneEventKind, entity: Entity) -> Self {
        Self {
            kind: kind as u32,
            index: entity.index(),
            generation: entity.generation(),
        }
    }

    /// Returns what happened.
    #[must_use]
    pub const fn kind(&self) -> SceneEventKind {
        if self.kind == SceneEventKind::EntityDestroyed as u32 {
            SceneEventKind::EntityDestroyed
        } else {
            SceneEventKind::EntityCreated
        }
    }

    /// Returns the handle the event refers to. After destruction it is stale.
    #[must_use]
    pub const fn entity(&self) -> Entity {
        Entity::new(self.index, self.generation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scene_event_roundtrip() {
        let entity = Entity::new(4, 2);
        let event = SceneEvent::new(SceneEventKind::EntityDestroyed, entity);
        assert_eq!(event.kind(), SceneEventKind::EntityDestroyed);
        assert_eq!(event.entity(), entity);
        assert_eq!(std::mem::size_of::<SceneEvent>(), 12);
    }
}
