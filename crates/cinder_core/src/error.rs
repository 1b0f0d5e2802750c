//! # Runtime Error Types
//!
//! All errors that can occur while driving a scene.
//!
//! Lookup errors (`InvalidEntity`, `MissingComponent`, `DuplicateComponent`)
//! are recoverable and go straight back to the caller. `CapacityExceeded` is
//! fatal: the world that raised it is poisoned and refuses further mutation.

use std::fmt;

use thiserror::Error;

use crate::ecs::Entity;

/// A bounded resource that can run out.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resource {
    /// The configured hard entity ceiling.
    Entities,
    /// The number of distinct component types a mask can describe.
    ComponentTypes,
    /// The fixed slot ceiling of a non-relocatable component pool.
    Pool(&'static str),
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Entities => f.write_str("entity"),
            Self::ComponentTypes => f.write_str("component type"),
            Self::Pool(name) => write!(f, "{name} pool"),
        }
    }
}

/// Errors that can occur in the scene runtime.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EcsError {
    /// The handle is stale (slot reused or freed) or out of range.
    #[error("invalid entity {0}: stale or out of range")]
    InvalidEntity(Entity),

    /// The entity does not own a component of the requested type.
    #[error("entity {entity} has no {component} component")]
    MissingComponent {
        /// The entity that was queried.
        entity: Entity,
        /// Type name of the missing component.
        component: &'static str,
    },

    /// The entity already owns a component of this type. The existing value
    /// is left untouched.
    #[error("entity {entity} already has a {component} component")]
    DuplicateComponent {
        /// The entity that was targeted.
        entity: Entity,
        /// Type name of the duplicated component.
        component: &'static str,
    },

    /// A fixed ceiling was hit. Fatal for the owning scene.
    #[error("{resource} capacity exceeded (limit {limit})")]
    CapacityExceeded {
        /// What ran out.
        resource: Resource,
        /// The configured ceiling.
        limit: usize,
    },

    /// A system declared a required component after it was attached.
    #[error("system {system} declared {component} after attachment")]
    RequirementDeclaredLate {
        /// Type name of the offending system.
        system: &'static str,
        /// Type name of the component it tried to require.
        component: &'static str,
    },

    /// No system of the requested type is attached to the scene.
    #[error("no system of type {0} in scene")]
    UnknownSystem(&'static str),

    /// A system of this type is already attached to the scene.
    #[error("system {0} is already attached")]
    DuplicateSystem(&'static str),

    /// The scene hit a fatal error earlier and no longer accepts mutation.
    #[error("scene halted after fatal error: {0}")]
    ScenePoisoned(Box<EcsError>),

    /// Configuration could not be read or parsed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The background worker thread has gone away.
    #[error("background worker disconnected")]
    WorkerDisconnected,

    /// The background worker thread could not be started.
    #[error("failed to start background worker: {0}")]
    WorkerSpawn(String),
}

impl EcsError {
    /// Returns `true` if this error must halt the scene that raised it.
    #[inline]
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::CapacityExceeded { .. })
    }
}

/// Result type for runtime operations.
pub type EcsResult<T> = Result<T, EcsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_capacity_is_fatal() {
        let fatal = EcsError::CapacityExceeded {
            resource: Resource::Pool("Emitter"),
            limit: 2,
        };
        assert!(fatal.is_fatal());
        assert!(!EcsError::InvalidEntity(Entity::new(0, 0)).is_fatal());
        assert!(!EcsError::UnknownSystem("Physics").is_fatal());
    }

    #[test]
    fn test_error_messages() {
        let err = EcsError::CapacityExceeded {
            resource: Resource::Pool("Emitter"),
            limit: 2,
        };
        assert_eq!(err.to_string(), "Emitter pool capacity exceeded (limit 2)");

        let poisoned = EcsError::ScenePoisoned(Box::new(err));
        assert!(poisoned.to_string().starts_with("scene halted"));
    }
}
