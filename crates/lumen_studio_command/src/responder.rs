// SPDX-License-Identifier: MIT OR Apache-2.0
//! The modal dispatch state machine routing input to commands.

use crate::command::{Command, ExecutionStatus};
use crate::input::CommandInput;
use crate::registry::CommandRegistry;

/// Error produced at the dispatch boundary
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    /// A modal command is active; the input was not routed
    #[error("A modal command is already active")]
    ModalInProgress,

    /// No descriptor is registered under the identifier
    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    /// No descriptor of the category matches the input
    #[error("No command of category '{0}' matches the input")]
    NoMatch(String),
}

/// Routes input events to commands and owns the active modal command.
///
/// The responder is either idle or modal. While modal it exclusively owns
/// the active command; every other command is built, executed and dropped
/// within a single call. All invocation paths — trigger dispatch, direct
/// invocation by name, enablement queries — check the lookup result and
/// respect the modal guard.
pub struct CommandResponder<Ctx> {
    modal: Option<Box<dyn Command<Ctx>>>,
}

impl<Ctx> CommandResponder<Ctx> {
    /// Create an idle responder
    pub fn new() -> Self {
        Self { modal: None }
    }

    /// Whether a modal command is active
    pub fn is_modal(&self) -> bool {
        self.modal.is_some()
    }

    /// Route an input event to the command its category/trigger selects.
    ///
    /// Fails without side effects while a modal command is active or when
    /// nothing matches. On [`ExecutionStatus::EntersModal`] the command is
    /// retained and subsequent events go through [`Self::update_modal`].
    pub fn dispatch(
        &mut self,
        registry: &CommandRegistry<Ctx>,
        ctx: &mut Ctx,
        category: &str,
        input: &mut CommandInput,
    ) -> Result<ExecutionStatus, DispatchError> {
        if self.is_modal() {
            return Err(DispatchError::ModalInProgress);
        }

        let command = registry
            .find(category, input)
            .ok_or_else(|| DispatchError::NoMatch(category.to_string()))?;

        Ok(self.run(command, ctx, input))
    }

    /// Invoke a command directly by identifier, as UI widgets do.
    ///
    /// Goes through the same guarded path as [`Self::dispatch`]: an
    /// unknown identifier and an active modal command are both explicit
    /// errors rather than silent misbehavior.
    pub fn invoke_by_name(
        &mut self,
        registry: &CommandRegistry<Ctx>,
        ctx: &mut Ctx,
        name: &str,
        metadata: &str,
    ) -> Result<ExecutionStatus, DispatchError> {
        if self.is_modal() {
            return Err(DispatchError::ModalInProgress);
        }

        let command = registry
            .create(name)
            .ok_or_else(|| DispatchError::UnknownCommand(name.to_string()))?;

        let mut input = CommandInput::with_metadata(metadata);
        input.matched_command = Some(name.to_string());

        Ok(self.run(command, ctx, &input))
    }

    fn run(
        &mut self,
        mut command: Box<dyn Command<Ctx>>,
        ctx: &mut Ctx,
        input: &CommandInput,
    ) -> ExecutionStatus {
        let status = command.execute(ctx, input);

        if status == ExecutionStatus::EntersModal {
            self.modal = Some(command);
        }

        status
    }

    /// Forward an input event to the active modal command.
    ///
    /// Returns whether an event was forwarded; a no-op while idle.
    pub fn update_modal(&mut self, ctx: &mut Ctx, input: &CommandInput) -> bool {
        let Some(command) = self.modal.as_mut() else {
            return false;
        };
        command.update_modal(ctx, input);
        true
    }

    /// Finish the modal gesture: forward the final event, drop the
    /// command, return to idle. A no-op while idle.
    pub fn finish_modal(&mut self, ctx: &mut Ctx, input: &CommandInput) -> bool {
        let Some(mut command) = self.modal.take() else {
            return false;
        };
        command.finish_modal(ctx, input);
        true
    }

    /// Force the responder back to idle, dropping any modal command
    pub fn reset(&mut self) {
        self.modal = None;
    }

    /// Ask a command's enablement predicate, for UI affordance.
    ///
    /// Builds an instance, queries it, drops it. Unknown identifiers are
    /// disabled.
    pub fn is_enabled(
        &self,
        registry: &CommandRegistry<Ctx>,
        ctx: &Ctx,
        name: &str,
        metadata: &str,
    ) -> bool {
        let Some(command) = registry.create(name) else {
            return false;
        };

        let input = CommandInput::with_metadata(metadata);
        command.is_enabled(ctx, &input)
    }
}

impl<Ctx> Default for CommandResponder<Ctx> {
    fn default() -> Self {
        Self::new()
    }
}
