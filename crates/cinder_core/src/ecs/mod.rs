//! # Entity Component System
//!
//! Entities are generational handles, components are plain data in per-type
//! pools, and systems run over every entity whose component mask covers
//! their requirements.
//!
//! ## Design Philosophy
//!
//! - Component pools are dense arrays indexed by entity slot
//! - Entity handles carry a generation, so stale handles are detected
//! - Matching lists are maintained incrementally, never rebuilt per tick
//! - Structural changes during a turn never invalidate the turn's iteration

mod commands;
mod component;
mod director;
mod entity;
mod mask;
mod registry;
mod scene;
mod storage;
mod system;
mod world;

pub use commands::{CommandQueue, CommandReport};
pub use component::{Component, ComponentId, PoolPolicy};
pub use director::Director;
pub use entity::{Entity, EntityManager};
pub use mask::{ComponentMask, MAX_COMPONENTS};
pub use registry::ComponentRegistry;
pub use scene::Scene;
pub use storage::ComponentPool;
pub use system::{AsAny, RenderTarget, Renderable, System, SystemContext, SystemSetup};
pub use world::World;
