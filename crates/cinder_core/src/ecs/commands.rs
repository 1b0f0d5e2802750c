//! # Deferred Commands
//!
//! Structural changes queued during a turn and applied once it ends. Commands
//! may queue further commands; the scene keeps applying until the queue is
//! empty or the pass limit is reached, and anything left over waits for the
//! next turn.

use std::fmt;

use super::component::Component;
use super::entity::Entity;
use super::world::World;
use crate::error::EcsResult;

type Command = Box<dyn FnOnce(&mut World, &mut CommandQueue) -> EcsResult<()>>;

/// Outcome of one [`CommandQueue::apply`] call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CommandReport {
    /// Commands executed.
    pub applied: usize,
    /// Passes over the queue.
    pub passes: u32,
    /// Commands left queued for the next turn.
    pub deferred: usize,
}

/// FIFO queue of deferred world mutations.
///
/// # Example
///
/// ```rust,ignore
/// ctx.commands().spawn(|world, ball| {
///     world.add_component(ball, Transform::default())?;
///     world.add_component(ball, Velocity::new(0.0, 3.0)).map(drop)
/// });
/// ```
#[derive(Default)]
pub struct CommandQueue {
    queue: Vec<Command>,
}

impl CommandQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of queued commands.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Returns `true` if nothing is queued.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Queues an arbitrary mutation. The queue handed to `command` collects
    /// follow-up commands for the next pass.
    pub fn push<F>(&mut self, command: F)
    where
        F: FnOnce(&mut World, &mut CommandQueue) -> EcsResult<()> + 'static,
    {
        self.queue.push(Box::new(command));
    }

    /// Queues the creation of an entity, then `init` on it.
    pub fn spawn<F>(&mut self, init: F)
    where
        F: FnOnce(&mut World, Entity) -> EcsResult<()> + 'static,
    {
        self.push(move |world, _| {
            let entity = world.create_entity()?;
            init(world, entity)
        });
    }

    /// Queues the destruction of `entity`.
    pub fn destroy(&mut self, entity: Entity) {
        self.push(move |world, _| world.destroy_entity(entity));
    }

    /// Queues adding `component` to `entity`.
    pub fn add_component<C: Component>(&mut self, entity: Entity, component: C) {
        self.push(move |world, _| world.add_component(entity, component).map(drop));
    }

    /// Queues removing `C` from `entity`.
    pub fn remove_component<C: Component>(&mut self, entity: Entity) {
        self.push(move |world, _| world.remove_component::<C>(entity));
    }

    /// Applies queued commands to `world` in FIFO order.
    ///
    /// Recoverable command failures are logged and skipped. At least one
    /// pass always runs.
    ///
    /// # Errors
    ///
    /// Returns the first error raised once the world is poisoned; the rest of
    /// that pass is discarded.
    pub fn apply(&mut self, world: &mut World, max_passes: u32) -> EcsResult<CommandReport> {
        let max_passes = max_passes.max(1);
        let mut report = CommandReport::default();

        while !self.queue.is_empty() {
            if report.passes >= max_passes {
                tracing::warn!(
                    "{} commands still queued after {} passes, deferring to next turn",
                    self.queue.len(),
                    report.passes
                );
                break;
            }
            report.passes += 1;

            for command in std::mem::take(&mut self.queue) {
                report.applied += 1;
                if let Err(err) = command(world, self) {
                    if world.is_poisoned() {
                        return Err(err);
                    }
                    tracing::warn!("Deferred command failed: {}", err);
                }
            }
        }

        report.deferred = self.queue.len();
        Ok(report)
    }
}

impl fmt::Debug for CommandQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandQueue")
            .field("len", &self.queue.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SceneConfig;
    use crate::error::EcsError;

    #[derive(Clone, Copy, Debug, Default, PartialEq)]
    struct Fuel(u32);
    impl Component for Fuel {}

    fn world() -> World {
        World::new(&SceneConfig::default())
    }

    #[test]
    fn test_commands_apply_in_order() {
        let mut world = world();
        let mut queue = CommandQueue::new();
        queue.spawn(|world, entity| world.add_component(entity, Fuel(1)).map(drop));
        queue.spawn(|world, entity| world.add_component(entity, Fuel(2)).map(drop));

        let report = queue.apply(&mut world, 4).unwrap();
        assert_eq!(report, CommandReport { applied: 2, passes: 1, deferred: 0 });
        assert_eq!(world.alive_count(), 2);
        assert_eq!(world.get_component::<Fuel>(Entity::new(1, 0)), Ok(&Fuel(2)));
    }

    #[test]
    fn test_follow_up_commands_run_in_next_pass() {
        let mut world = world();
        let mut queue = CommandQueue::new();
        queue.push(|world, next| {
            let entity = world.create_entity()?;
            next.add_component(entity, Fuel(9));
            Ok(())
        });

        let report = queue.apply(&mut world, 4).unwrap();
        assert_eq!(report.passes, 2);
        assert_eq!(world.get_component::<Fuel>(Entity::new(0, 0)), Ok(&Fuel(9)));
    }

    #[test]
    fn test_pass_limit_defers_leftovers() {
        fn chain(world: &mut World, next: &mut CommandQueue) -> EcsResult<()> {
            world.create_entity()?;
            next.push(chain);
            Ok(())
        }

        let mut world = world();
        let mut queue = CommandQueue::new();
        queue.push(chain);

        let report = queue.apply(&mut world, 3).unwrap();
        assert_eq!(report.passes, 3);
        assert_eq!(report.deferred, 1);
        assert_eq!(queue.len(), 1);
        assert_eq!(world.alive_count(), 3);
    }

    #[test]
    fn test_zero_pass_limit_still_runs_one_pass() {
        let mut world = world();
        let mut queue = CommandQueue::new();
        queue.spawn(|_, _| Ok(()));

        let report = queue.apply(&mut world, 0).unwrap();
        assert_eq!(report.passes, 1);
        assert!(queue.is_empty());
        assert_eq!(world.alive_count(), 1);
    }

    #[test]
    fn test_recoverable_failure_is_skipped() {
        let mut world = world();
        let mut queue = CommandQueue::new();
        queue.destroy(Entity::new(7, 0));
        queue.spawn(|_, _| Ok(()));

        let report = queue.apply(&mut world, 4).unwrap();
        assert_eq!(report.applied, 2);
        assert_eq!(world.alive_count(), 1);
    }

    #[test]
    fn test_fatal_failure_stops_the_pass() {
        let config = SceneConfig {
            max_entities: Some(1),
            ..SceneConfig::default()
        };
        let mut world = World::new(&config);
        let mut queue = CommandQueue::new();
        queue.spawn(|_, _| Ok(()));
        queue.spawn(|_, _| Ok(()));
        queue.spawn(|_, _| Ok(()));

        let err = queue.apply(&mut world, 4).unwrap_err();
        assert!(matches!(err, EcsError::CapacityExceeded { .. }));
        assert!(world.is_poisoned());
        assert_eq!(world.alive_count(), 1);
    }
}
