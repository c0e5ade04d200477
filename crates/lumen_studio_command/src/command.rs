// SPDX-License-Identifier: MIT OR Apache-2.0
//! The command trait and its execution outcomes.

use crate::input::CommandInput;

/// Outcome of executing a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionStatus {
    /// The command ran to completion
    Success,
    /// The command could not run; no state was changed
    Failure,
    /// The command stays active and receives further input events
    EntersModal,
}

/// A unit of user-triggered work.
///
/// Commands are ephemeral: the registry's factory builds one per
/// invocation, the responder drives it and drops it when its lifecycle
/// completes. Only a command returning [`ExecutionStatus::EntersModal`]
/// survives the initial call, owned by the responder until the gesture
/// finishes. The only state a command may hold is its own transient
/// drag/gesture state.
///
/// `Ctx` is the application context the command mutates; the responder
/// threads it through every hook.
pub trait Command<Ctx> {
    /// Execute the command once
    fn execute(&mut self, ctx: &mut Ctx, input: &CommandInput) -> ExecutionStatus;

    /// Receive a follow-up input event while modal
    fn update_modal(&mut self, _ctx: &mut Ctx, _input: &CommandInput) {}

    /// Receive the final input event of a modal gesture
    fn finish_modal(&mut self, _ctx: &mut Ctx, _input: &CommandInput) {}

    /// Whether the command could run right now, for UI affordance
    fn is_enabled(&self, _ctx: &Ctx, _input: &CommandInput) -> bool {
        true
    }

    /// Whether a successful non-modal execution is recorded in the
    /// undo history
    fn records_history(&self) -> bool {
        true
    }
}
