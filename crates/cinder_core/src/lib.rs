//! # Cinder Core
//!
//! Entity Component System runtime for game scenes:
//! - Generational entity handles with lowest-slot reuse
//! - Per-type dense component pools, relocatable or fixed
//! - Systems with incrementally maintained matching lists
//! - A per-scene broadcast message bus with a two-frame window
//!
//! ## Architecture Rules
//!
//! 1. **One thread per scene** - all structural changes happen inside `simulate`
//!    or between ticks; heavy work goes to a [`Worker`]
//! 2. **Handles, not references** - component references never outlive a turn
//! 3. **Fatal means halted** - a scene that runs out of a fixed resource
//!    refuses further mutation
//!
//! ## Example
//!
//! ```rust,ignore
//! use cinder_core::{Scene, SceneConfig};
//!
//! let mut scene = Scene::new(SceneConfig::default())?;
//! scene.add_system(Movement)?;
//!
//! let ball = scene.create_entity()?;
//! scene.add_component(ball, Position::default())?;
//! scene.add_component(ball, Velocity { x: 1.0, y: 0.0 })?;
//!
//! scene.simulate(1.0 / 60.0)?;
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod ecs;
pub mod error;
pub mod message;
pub mod sync;

pub use config::SceneConfig;
pub use ecs::{
    CommandQueue, Component, ComponentId, ComponentMask, ComponentPool, Director, Entity,
    PoolPolicy, RenderTarget, Renderable, Scene, System, SystemContext, SystemSetup, World,
};
pub use error::{EcsError, EcsResult, Resource};
pub use message::{Message, MessageBus, MessageId, ReadCursor, SceneEvent, SceneEventKind};
pub use sync::Worker;
