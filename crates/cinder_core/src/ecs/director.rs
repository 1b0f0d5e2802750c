//! # Directors
//!
//! A director is a system that never holds entities. It reacts to
//! messages and answers with structural changes (usually through the
//! [`CommandQueue`](super::CommandQueue)), which keeps network and game-flow
//! code out of the systems that own component data.

use super::system::{System, SystemContext};
use crate::error::EcsResult;
use crate::message::Message;

/// Message-driven orchestrator.
///
/// # Example
///
/// ```rust,ignore
/// struct RoundDirector { holes_left: u32 }
///
/// impl Director for RoundDirector {
///     fn handle_message(&mut self, message: &Message<'_>, ctx: &mut SystemContext<'_>) -> EcsResult<()> {
///         if message.id() == HOLE_COMPLETE {
///             self.holes_left -= 1;
///             ctx.commands().spawn(|world, flag| world.add_component(flag, Flag::default()).map(drop));
///         }
///         Ok(())
///     }
/// }
/// ```
pub trait Director: 'static {
    /// Called for every message this director has not seen yet, at the start
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

    /// Called once per tick. The context's entity list is always empty.
    ///
    /// # Errors
    ///
    /// Errors are logged and the next system runs.
    fn process(&mut self, _ctx: &mut SystemContext<'_>, _delta_time: f32) -> EcsResult<()> {
        Ok(())
    }
}

/// Runs a director in an observer slot: empty mask, empty matching list.
pub(crate) struct DirectorSystem<D>(pub(crate) D);

impl<D: Director> System for DirectorSystem<D> {
    fn handle_message(
        &mut self,
        message: &Message<'_>,
        ctx: &mut SystemContext<'_>,
    ) -> EcsResult<()> {
        self.0.handle_message(message, ctx)
    }

    fn process(&mut self, ctx: &mut SystemContext<'_>, delta_time: f32) -> EcsResult<()> {
        self.0.process(ctx, delta_time)
    }
}
