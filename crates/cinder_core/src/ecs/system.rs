//! # Systems
//!
//! A system declares the components it requires once, in [`System::setup`].
//! From then on the scene keeps its list of matching entities up to date
//! incrementally and calls [`System::process`] once per tick, in
//! registration order.
//!
//! During a turn the system sees a snapshot of its matching entities, so
//! adding or removing components (on any entity) never invalidates the
//! iteration in progress. Entity hooks for changes made during a turn are
//! delivered after the turn.

use std::any::{type_name, Any};

use bytemuck::Pod;

use super::commands::CommandQueue;
use super::component::Component;
use super::entity::Entity;
use super::world::World;
use crate::error::EcsResult;
use crate::message::{Message, MessageId, Outbox};

/// Upcast helper so scenes can hand back concrete system types.
pub trait AsAny: Any {
    /// Returns `self` as `&dyn Any`.
    fn as_any(&self) -> &dyn Any;
    /// Returns `self` as `&mut dyn Any`.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Per-tick logic over every entity owning a set of components.
///
/// # Example
///
/// ```rust,ignore
/// struct Movement;
///
/// impl System for Movement {
///     fn setup(&mut self, setup: &mut SystemSetup<'_>) -> EcsResult<()> {
///         setup.require_component::<Position>()?;
///         setup.require_component::<Velocity>()
///     }
///
///     fn process(&mut self, ctx: &mut SystemContext<'_>, dt: f32) -> EcsResult<()> {
///         for &entity in ctx.entities() {
///             let velocity = *ctx.get::<Velocity>(entity)?;
///             ctx.get_mut::<Position>(entity)?.advance(velocity, dt);
///         }
///         Ok(())
///     }
/// }
/// ```
pub trait System: AsAny {
    /// Declares required components. Called once, before attachment.
    ///
    /// A system that requires nothing matches every live entity. Use a
    /// [`Director`](super::Director) for logic that should hold none.
    ///
    /// # Errors
    ///
    /// An error rejects the system: it is not attached.
    fn setup(&mut self, _setup: &mut SystemSetup<'_>) -> EcsResult<()> {
        Ok(())
    }

    /// Called for every message this system has not seen yet, at the start
    /// of its turn.
    ///
    /// # Errors
    ///
    /// Errors are logged and the turn continues.
    fn handle_message(
        &mut self,
        _message: &Message<'_>,
        _ctx: &mut SystemContext<'_>,
    ) -> EcsResult<()> {
        Ok(())
    }

    /// Called once per tick.
    ///
    /// # Errors
    ///
    /// Errors are logged and the next system runs.
    fn process(&mut self, _ctx: &mut SystemContext<'_>, _delta_time: f32) -> EcsResult<()> {
        Ok(())
    }

    /// The entity now matches this system's requirements.
    fn on_entity_added(&mut self, _entity: Entity) {}

    /// The entity no longer matches. It may already be destroyed, so the
    /// handle must not be used for component access.
    fn on_entity_removed(&mut self, _entity: Entity) {}

    /// Returns the render hooks if this system draws.
    fn as_renderable(&mut self) -> Option<&mut dyn Renderable> {
        None
    }
}

/// Surface a render pass draws into.
pub trait RenderTarget {
    /// Size of the target in pixels.
    fn size(&self) -> [u32; 2];
}

/// Render hooks of a drawing system, run once per active camera.
///
/// For a given camera, every renderable's `update_draw_list` runs before any
/// renderable's `render`.
pub trait Renderable {
    /// Rebuilds the draw list as seen from `camera`.
    fn update_draw_list(&mut self, camera: Entity, world: &World);

    /// Draws the list built for `camera` into `target`.
    fn render(&mut self, camera: Entity, world: &World, target: &mut dyn RenderTarget);
}

/// Handed to [`System::setup`] to declare requirements.
pub struct SystemSetup<'a> {
    world: &'a mut World,
    system: usize,
}

impl<'a> SystemSetup<'a> {
    pub(crate) fn new(world: &'a mut World, system: usize) -> Self {
        Self { world, system }
    }

    /// Adds `C` to the system's required mask, registering `C` if needed.
    ///
    /// # Errors
    ///
    /// `CapacityExceeded` if the registry is full of component types.
    pub fn require_component<C: Component>(&mut self) -> EcsResult<()> {
        let id = self.world.register_component::<C>()?;
        self.world.declare_requirement(self.system, id, type_name::<C>())
    }

    /// Read access to the world the system is joining.
    #[must_use]
    pub fn world(&self) -> &World {
        self.world
    }
}

/// Everything a system or director may touch during its turn.
pub struct SystemContext<'a> {
    world: &'a mut World,
    outbox: &'a mut Outbox,
    commands: &'a mut CommandQueue,
    entities: &'a [Entity],
    system: usize,
    tick: u64,
}

impl<'a> SystemContext<'a> {
    pub(crate) fn new(
        world: &'a mut World,
        outbox: &'a mut Outbox,
        commands: &'a mut CommandQueue,
        entities: &'a [Entity],
        system: usize,
        tick: u64,
    ) -> Self {
        Self {
            world,
            outbox,
            commands,
            entities,
            system,
            tick,
        }
    }

    /// Snapshot of the matching entities taken at the start of the turn.
    ///
    /// Structural changes made during the turn do not show up here; re-check
    /// with the world when that matters.
    #[inline]
    #[must_use]
    pub fn entities(&self) -> &'a [Entity] {
        self.entities
    }

    /// Number of ticks the scene has completed.
    #[inline]
    #[must_use]
    pub const fn tick(&self) -> u64 {
        self.tick
    }

    /// Read access to the world.
    #[inline]
    #[must_use]
    pub fn world(&self) -> &World {
        self.world
    }

    /// Write access to the world. Structural changes are visible to later
    /// systems in this same tick.
    #[inline]
    pub fn world_mut(&mut self) -> &mut World {
        self.world
    }

    /// Shorthand for [`World::get_component`].
    ///
    /// # Errors
    ///
    /// `InvalidEntity` or `MissingComponent`.
    #[inline]
    pub fn get<C: Component>(&self, entity: Entity) -> EcsResult<&C> {
        self.world.get_component(entity)
    }

    /// Shorthand for [`World::get_component_mut`].
    ///
    /// # Errors
    ///
    /// `InvalidEntity` or `MissingComponent`.
    #[inline]
    pub fn get_mut<C: Component>(&mut self, entity: Entity) -> EcsResult<&mut C> {
        self.world.get_component_mut(entity)
    }

    /// Posts a message, visible to later systems this tick and to everyone
    /// next tick.
    pub fn post<T: Pod>(&mut self, id: MessageId) -> &mut T {
        self.outbox.post(id)
    }

    /// Deferred structural changes, applied after this turn.
    #[inline]
    pub fn commands(&mut self) -> &mut CommandQueue {
        self.commands
    }

    /// Requirements can only be declared in [`System::setup`].
    ///
    /// # Errors
    ///
    /// Always `RequirementDeclaredLate` for an attached system; the mask is
    /// left unchanged.
    pub fn require_component<C: Component>(&mut self) -> EcsResult<()> {
        let id = self.world.register_component::<C>()?;
        self.world.declare_requirement(self.system, id, type_name::<C>())
    }
}
