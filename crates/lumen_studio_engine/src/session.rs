// SPDX-License-Identifier: MIT OR Apache-2.0
//! The editing session: project, scheduler, history, and notifications.
//!
//! The thread that owns the session owns all graph mutation; the
//! evaluation worker takes the project mutex only while running a plan.
//! Never request an evaluation while holding the project guard — the
//! scheduler takes the lock itself.

use crate::eval::InterruptFlag;
use crate::event::EventMask;
use crate::history::{History, HistoryError, StateSnapshot};
use crate::notifier::{EventQueue, Notifier};
use crate::operator::OperatorRegistry;
use crate::project::Project;
use crate::scheduler::{EvalReason, Scheduler};
use lumen_studio_graph::{Graph, NodeId};
use parking_lot::{Mutex, MutexGuard};
use std::sync::Arc;

/// An editing session over one project
pub struct Session {
    project: Arc<Mutex<Project>>,
    /// Available operator types
    pub operators: OperatorRegistry,
    /// Evaluation scheduling
    pub scheduler: Scheduler,
    /// Notices pending for the owner thread
    pub events: EventQueue,
    /// Undo/redo history
    pub history: History,
    /// Cooperative interruption flag
    pub interrupt: InterruptFlag,
    /// Breadcrumb of owning nodes into the graph being edited
    pub graph_path: Vec<NodeId>,
    notifier: Notifier,
}

impl Session {
    /// Create a session over an empty project
    pub fn new() -> Self {
        Self::with_operators(OperatorRegistry::new())
    }

    /// Create a session with an operator registry
    pub fn with_operators(operators: OperatorRegistry) -> Self {
        let (notifier, events) = EventQueue::channel();
        let interrupt = InterruptFlag::new();
        let project = Arc::new(Mutex::new(Project::new()));
        let history_depth = project.lock().settings.history_depth;
        let scheduler = Scheduler::new(
            Arc::clone(&project),
            notifier.clone(),
            interrupt.clone(),
        );

        Self {
            project,
            operators,
            scheduler,
            events,
            history: History::with_max_depth(history_depth),
            interrupt,
            graph_path: Vec::new(),
            notifier,
        }
    }

    /// Lock the project for mutation or inspection.
    ///
    /// Drop the guard before requesting an evaluation.
    pub fn project(&self) -> MutexGuard<'_, Project> {
        self.project.lock()
    }

    /// A shareable handle to the project
    pub fn project_handle(&self) -> Arc<Mutex<Project>> {
        Arc::clone(&self.project)
    }

    /// Broadcast an event to the observers
    pub fn notify_observers(&self, mask: EventMask) {
        self.notifier.notify(mask);
    }

    /// Request an evaluation pass for every entity
    pub fn request_evaluation(&self, reason: EvalReason, message: &str) {
        self.scheduler.request(reason, message);
    }

    /// Move the time cursor and re-evaluate
    pub fn set_frame(&mut self, frame: i64) {
        self.project().set_frame(frame);
        self.notify_observers(EventMask::TIME | EventMask::MODIFIED);
        self.request_evaluation(EvalReason::TimeChanged, "time changed");
    }

    /// Toggle continuous playback
    pub fn set_playback(&mut self, playback: bool) {
        self.project().playback = playback;
        if playback {
            self.request_evaluation(EvalReason::Playback, "playback started");
        }
    }

    /// Snapshot the root graph for the history
    pub fn snapshot(&self) -> Result<StateSnapshot, HistoryError> {
        StateSnapshot::from_value(&self.project().root)
    }

    /// Undo the last recorded operation
    pub fn undo(&mut self) -> Result<(), HistoryError> {
        let operation = self.history.undo()?;
        tracing::info!("undo '{}'", operation.description);
        self.restore(&operation.before)
    }

    /// Redo the last undone operation
    pub fn redo(&mut self) -> Result<(), HistoryError> {
        let operation = self.history.redo()?;
        tracing::info!("redo '{}'", operation.description);
        self.restore(&operation.after)
    }

    /// Replace the root graph from a snapshot, rebuilding operator
    /// payloads from the registry and invalidating every result.
    fn restore(&mut self, snapshot: &StateSnapshot) -> Result<(), HistoryError> {
        let mut root: Graph = snapshot.to_value()?;
        self.operators.rebuild_payloads(&mut root);

        {
            let mut project = self.project();
            project.root = root;
            project.refresh_result_slots();
            project.mark_all_stale();
        }

        self.clamp_graph_path();
        self.notify_observers(EventMask::PROJECT | EventMask::MODIFIED);
        self.request_evaluation(EvalReason::GraphChanged, "history restored");
        Ok(())
    }

    // The breadcrumb may reference nodes that no longer exist after a
    // restore; keep the longest valid prefix.
    fn clamp_graph_path(&mut self) {
        let valid = {
            let project = self.project();
            let mut valid = 0;
            while valid < self.graph_path.len() {
                if project.root.graph_at_path(&self.graph_path[..=valid]).is_none() {
                    break;
                }
                valid += 1;
            }
            valid
        };
        self.graph_path.truncate(valid);
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::OperatorContext;
    use crate::operator::{operator_ref, Operator, OperatorStatus, OperatorType};
    use crate::value::Value;
    use lumen_studio_graph::{NodeKind, PortType};

    struct Const;

    impl Operator for Const {
        fn execute(&mut self, _ctx: &mut OperatorContext<'_, '_>) -> OperatorStatus {
            OperatorStatus::Success
        }

        fn reset_warnings(&mut self) {}

        fn warnings(&self) -> &[String] {
            &[]
        }

        fn output(&self) -> Option<Value> {
            Some(Value::Float(1.0))
        }
    }

    fn session() -> Session {
        let mut operators = OperatorRegistry::new();
        operators.register(
            OperatorType::new("const", "generate", || Box::new(Const))
                .with_output("out", PortType::Float),
        );
        Session::with_operators(operators)
    }

    #[test]
    fn test_undo_restores_topology_and_payloads() {
        let mut session = session();
        let entity = session.project().create_entity("comp", NodeKind::Composite);

        let before = session.snapshot().expect("before");

        let node = {
            let mut project = session.project();
            let graph = project
                .root
                .node_mut(entity)
                .and_then(|n| n.graph.as_mut())
                .expect("subgraph");
            session.operators.instantiate(graph, "const").expect("node")
        };

        let after = session.snapshot().expect("after");
        session.history.record("add const", before, after);

        session.undo().expect("undo");
        assert!(session.project().root.find_node(node).is_none());

        session.redo().expect("redo");
        {
            let project = session.project();
            let restored = project.root.find_node(node).expect("node back");
            assert_eq!(restored.operator.as_deref(), Some("const"));
            // The payload was rebuilt from the registry.
            assert!(operator_ref(restored).is_some());
            assert!(restored.stale);
        }
    }

    #[test]
    fn test_restore_clamps_graph_path() {
        let mut session = session();
        let before = session.snapshot().expect("before");

        let entity = session.project().create_entity("comp", NodeKind::Composite);
        session.graph_path = vec![entity];

        let after = session.snapshot().expect("after");
        session.history.record("add entity", before, after);

        session.undo().expect("undo");
        assert!(session.graph_path.is_empty());
    }

    #[test]
    fn test_set_frame_notifies() {
        let mut session = session();
        session.set_frame(5);
        assert_eq!(session.project().frame, 5);

        let notices = session.events.pump();
        assert!(!notices.is_empty());
    }
}
