// SPDX-License-Identifier: MIT OR Apache-2.0
//! The engine context: registry, responder, and session in one owned
//! bundle.
//!
//! One value created at startup, owned by the thread that drives the UI,
//! and dropped together at shutdown — nothing here is ambient global
//! state. The context also records undo history around command
//! execution: a snapshot is taken before dispatch and committed when a
//! history-recording command succeeds (for modal commands, when the
//! gesture finishes).

use crate::commands::register_builtin_commands;
use crate::history::StateSnapshot;
use crate::notifier::EngineNotice;
use crate::operator::OperatorRegistry;
use crate::session::Session;
use lumen_studio_command::{
    CommandInput, CommandRegistry, CommandResponder, DispatchError, ExecutionStatus,
};

struct PendingRecord {
    name: String,
    before: StateSnapshot,
}

/// The engine services, bundled and explicitly owned
pub struct EngineContext {
    /// Registered commands
    pub registry: CommandRegistry<Session>,
    /// The modal dispatch state machine
    pub responder: CommandResponder<Session>,
    /// The editing session
    pub session: Session,
    pending_record: Option<PendingRecord>,
}

impl EngineContext {
    /// Create a context with the built-in commands and no operators
    pub fn new() -> Self {
        Self::with_operators(OperatorRegistry::new())
    }

    /// Create a context with an operator registry
    pub fn with_operators(operators: OperatorRegistry) -> Self {
        let mut registry = CommandRegistry::new();
        register_builtin_commands(&mut registry);

        Self {
            registry,
            responder: CommandResponder::new(),
            session: Session::with_operators(operators),
            pending_record: None,
        }
    }

    /// Route an input event to the command its category/trigger selects
    pub fn dispatch(
        &mut self,
        category: &str,
        input: &mut CommandInput,
    ) -> Result<ExecutionStatus, DispatchError> {
        let before = self.take_snapshot();
        let status = self
            .responder
            .dispatch(&self.registry, &mut self.session, category, input)?;

        let name = input.matched_command.clone().unwrap_or_default();
        self.track_history(&name, before, status);
        Ok(status)
    }

    /// Invoke a command directly by identifier
    pub fn invoke_by_name(
        &mut self,
        name: &str,
        metadata: &str,
    ) -> Result<ExecutionStatus, DispatchError> {
        let before = self.take_snapshot();
        let status =
            self.responder
                .invoke_by_name(&self.registry, &mut self.session, name, metadata)?;

        self.track_history(name, before, status);
        Ok(status)
    }

    /// Forward an input event to the active modal command
    pub fn update_modal(&mut self, input: &CommandInput) -> bool {
        self.responder.update_modal(&mut self.session, input)
    }

    /// Finish the modal gesture, committing its history record
    pub fn finish_modal(&mut self, input: &CommandInput) -> bool {
        let finished = self.responder.finish_modal(&mut self.session, input);
        if finished {
            if let Some(pending) = self.pending_record.take() {
                self.commit_record(&pending.name, pending.before);
            }
        }
        finished
    }

    /// Force the responder back to idle, discarding any pending record
    pub fn reset_responder(&mut self) {
        self.responder.reset();
        self.pending_record = None;
    }

    /// Ask a command's enablement predicate
    pub fn is_enabled(&self, name: &str, metadata: &str) -> bool {
        self.responder
            .is_enabled(&self.registry, &self.session, name, metadata)
    }

    /// Drain pending worker notices, broadcasting refreshes to observers
    pub fn pump_events(&mut self) -> Vec<EngineNotice> {
        self.session.events.pump()
    }

    fn take_snapshot(&self) -> Option<StateSnapshot> {
        match self.session.snapshot() {
            Ok(snapshot) => Some(snapshot),
            Err(err) => {
                tracing::warn!("history snapshot failed: {err}");
                None
            }
        }
    }

    fn records_history(&self, name: &str) -> bool {
        self.registry
            .create(name)
            .map(|command| command.records_history())
            .unwrap_or(false)
    }

    fn track_history(
        &mut self,
        name: &str,
        before: Option<StateSnapshot>,
        status: ExecutionStatus,
    ) {
        let Some(before) = before else {
            return;
        };
        if !self.records_history(name) {
            return;
        }

        match status {
            ExecutionStatus::Success => self.commit_record(name, before),
            ExecutionStatus::EntersModal => {
                self.pending_record = Some(PendingRecord {
                    name: name.to_string(),
                    before,
                });
            }
            ExecutionStatus::Failure => {}
        }
    }

    fn commit_record(&mut self, name: &str, before: StateSnapshot) {
        match self.session.snapshot() {
            Ok(after) => self.session.history.record(name, before, after),
            Err(err) => tracing::warn!("history snapshot failed: {err}"),
        }
    }
}

impl Default for EngineContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::OperatorContext;
    use crate::operator::{Operator, OperatorStatus, OperatorType};
    use crate::value::Value;
    use lumen_studio_command::{Modifiers, PointerButtons};
    use lumen_studio_graph::{NodeKind, PortType};

    struct Noop;

    impl Operator for Noop {
        fn execute(&mut self, _ctx: &mut OperatorContext<'_, '_>) -> OperatorStatus {
            OperatorStatus::Success
        }

        fn reset_warnings(&mut self) {}

        fn warnings(&self) -> &[String] {
            &[]
        }

        fn output(&self) -> Option<Value> {
            Some(Value::Int(0))
        }
    }

    fn context() -> EngineContext {
        let mut operators = OperatorRegistry::new();
        operators.register(
            OperatorType::new("read", "input", || Box::new(Noop))
                .with_output("image", PortType::Image),
        );

        let mut ctx = EngineContext::with_operators(operators);
        let entity = ctx.session.project().create_entity("comp", NodeKind::Composite);
        ctx.session.graph_path = vec![entity];
        ctx
    }

    #[test]
    fn test_invoke_records_history_and_undo() {
        let mut ctx = context();
        assert!(!ctx.is_enabled("edit.undo", ""));

        let status = ctx.invoke_by_name("graph.add_node", "read");
        assert_eq!(status, Ok(ExecutionStatus::Success));
        assert!(ctx.is_enabled("edit.undo", ""));

        let node_count = |ctx: &EngineContext| {
            ctx.session
                .project()
                .root
                .graph_at_path(&ctx.session.graph_path)
                .map(|g| g.node_count())
                .unwrap_or(0)
        };
        assert_eq!(node_count(&ctx), 1);

        let status = ctx.invoke_by_name("edit.undo", "");
        assert_eq!(status, Ok(ExecutionStatus::Success));
        assert_eq!(node_count(&ctx), 0);
        assert!(ctx.is_enabled("edit.redo", ""));

        // Undoing did not itself create a history entry.
        assert!(!ctx.is_enabled("edit.undo", ""));
    }

    #[test]
    fn test_modal_gesture_records_once_on_finish() {
        let mut ctx = context();
        ctx.invoke_by_name("graph.add_node", "read").expect("add");
        let entries_after_add = 1;
        assert!(ctx.session.history.can_undo());

        let mut press = CommandInput {
            buttons: PointerButtons::PRIMARY,
            modifiers: Modifiers::NONE,
            position: [5.0, 5.0],
            ..CommandInput::with_metadata("node:read")
        };
        let status = ctx.dispatch("graph_editor", &mut press);
        assert_eq!(status, Ok(ExecutionStatus::EntersModal));

        let drag = CommandInput {
            position: [9.0, 9.0],
            ..CommandInput::default()
        };
        assert!(ctx.update_modal(&drag));
        assert!(ctx.finish_modal(&drag));

        // One more entry than after the add: the whole gesture is one
        // operation.
        let mut undone = 0;
        while ctx.session.history.can_undo() {
            ctx.session.history.undo().expect("undo");
            undone += 1;
        }
        assert_eq!(undone, entries_after_add + 1);
    }

    #[test]
    fn test_dispatch_respects_modal_guard() {
        let mut ctx = context();
        ctx.invoke_by_name("graph.add_node", "read").expect("add");

        let mut press = CommandInput {
            buttons: PointerButtons::PRIMARY,
            modifiers: Modifiers::NONE,
            ..CommandInput::with_metadata("node:read")
        };
        ctx.dispatch("graph_editor", &mut press).expect("modal");

        assert_eq!(
            ctx.invoke_by_name("render.refresh", ""),
            Err(DispatchError::ModalInProgress)
        );

        ctx.reset_responder();
        assert_eq!(
            ctx.invoke_by_name("render.refresh", ""),
            Ok(ExecutionStatus::Success)
        );
    }

    #[test]
    fn test_unknown_command_is_an_error() {
        let mut ctx = context();
        assert_eq!(
            ctx.invoke_by_name("missing.command", ""),
            Err(DispatchError::UnknownCommand("missing.command".to_string()))
        );
        assert!(!ctx.is_enabled("missing.command", ""));
    }
}
