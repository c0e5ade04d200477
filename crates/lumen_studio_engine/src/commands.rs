// SPDX-License-Identifier: MIT OR Apache-2.0
//! Built-in graph editor commands.
//!
//! The UI resolves picking before dispatch and passes the hit as command
//! metadata: `node:<name>` for a node body, `port:<node>.<port>` for a
//! plug, an empty string for the canvas. Coordinates arrive already
//! transformed to graph space.

use crate::event::EventMask;
use crate::scheduler::EvalReason;
use crate::session::Session;
use lumen_studio_command::{
    Command, CommandDescriptor, CommandInput, CommandRegistry, ExecutionStatus, Modifiers,
    PointerButtons, Trigger,
};
use lumen_studio_graph::{
    mark_ancestors_stale, mark_downstream, Graph, NodeId, NodeKind, PendingConnection,
    PortDirection, PortId,
};

/// Dispatch category of the graph editor surface
pub const CATEGORY_GRAPH: &str = "graph_editor";

const KEY_A: u32 = 'A' as u32;
const KEY_R: u32 = 'R' as u32;
const KEY_U: u32 = 'U' as u32;
const KEY_X: u32 = 'X' as u32;
const KEY_Z: u32 = 'Z' as u32;
const KEY_EQUALS: u32 = '=' as u32;

/// Register every built-in command
pub fn register_builtin_commands(registry: &mut CommandRegistry<Session>) {
    registry.register(CommandDescriptor::new(
        "graph.add_node",
        CATEGORY_GRAPH,
        Trigger::key(KEY_A, Modifiers::SHIFT),
        || Box::new(AddNode),
    ));
    registry.register(CommandDescriptor::new(
        "graph.select",
        CATEGORY_GRAPH,
        Trigger::pointer(PointerButtons::PRIMARY, Modifiers::NONE),
        || Box::new(Select::default()),
    ));
    registry.register(CommandDescriptor::new(
        "graph.delete",
        CATEGORY_GRAPH,
        Trigger::key(KEY_X, Modifiers::NONE),
        || Box::new(Delete),
    ));
    registry.register(CommandDescriptor::new(
        "graph.enter",
        CATEGORY_GRAPH,
        Trigger::pointer(PointerButtons::PRIMARY, Modifiers::NONE).double_click(),
        || Box::new(EnterNode),
    ));
    registry.register(CommandDescriptor::new(
        "graph.leave",
        CATEGORY_GRAPH,
        Trigger::key(KEY_U, Modifiers::NONE),
        || Box::new(LeaveGraph),
    ));
    registry.register(CommandDescriptor::new(
        "view.pan",
        CATEGORY_GRAPH,
        Trigger::pointer(PointerButtons::MIDDLE, Modifiers::NONE),
        || Box::new(PanView::default()),
    ));
    registry.register(CommandDescriptor::new(
        "view.zoom",
        CATEGORY_GRAPH,
        Trigger::key(KEY_EQUALS, Modifiers::CTRL),
        || Box::new(ZoomView),
    ));
    registry.register(CommandDescriptor::new(
        "edit.undo",
        CATEGORY_GRAPH,
        Trigger::key(KEY_Z, Modifiers::CTRL),
        || Box::new(Undo),
    ));
    registry.register(CommandDescriptor::new(
        "edit.redo",
        CATEGORY_GRAPH,
        Trigger::key(KEY_Z, Modifiers::CTRL_SHIFT),
        || Box::new(Redo),
    ));
    registry.register(CommandDescriptor::new(
        "render.refresh",
        CATEGORY_GRAPH,
        Trigger::key(KEY_R, Modifiers::CTRL),
        || Box::new(RefreshRender),
    ));
}

/// What a pick metadata string resolved to
enum Pick {
    Node(String),
    Port(String, String),
    Empty,
}

fn parse_pick(metadata: &str) -> Pick {
    if let Some(name) = metadata.strip_prefix("node:") {
        return Pick::Node(name.to_string());
    }
    if let Some(rest) = metadata.strip_prefix("port:") {
        if let Some((node, port)) = rest.split_once('.') {
            return Pick::Port(node.to_string(), port.to_string());
        }
    }
    Pick::Empty
}

fn find_port(graph: &Graph, node_name: &str, port_name: &str) -> Option<PortId> {
    graph
        .nodes()
        .find(|n| n.name == node_name)?
        .ports()
        .find(|p| p.name == port_name)
        .map(|p| p.id)
}

/// Make a node the active one. Selecting a Render-kind node pins it as
/// the graph's output; returns whether that pin changed, which is the
/// signal to re-evaluate.
fn select_node(graph: &mut Graph, node: Option<NodeId>) -> bool {
    graph.active_node = node;

    let Some(id) = node else {
        return false;
    };
    let Some(selected) = graph.node(id) else {
        return false;
    };

    if selected.kind == NodeKind::Render {
        let changed = graph.last_output_node != Some(id);
        graph.last_output_node = Some(id);
        return changed;
    }

    false
}

// Wire a freshly added node into the connection the user was dragging.
fn complete_pending(graph: &mut Graph, pending: &PendingConnection, node: NodeId) {
    if let Some(to_input) = pending.to_input {
        if let Some(out) = graph.node(node).and_then(|n| n.output(0)).map(|p| p.id) {
            if let Err(err) = graph.connect(out, to_input) {
                tracing::debug!("connection rejected: {err}");
            }
        }
    } else if let Some(from_output) = pending.from_output {
        if let Some(input) = graph.node(node).and_then(|n| n.input(0)).map(|p| p.id) {
            if let Err(err) = graph.connect(from_output, input) {
                tracing::debug!("connection rejected: {err}");
            }
        }
    }
}

/// Create a node of the operator type named by the metadata, place it at
/// the view center, complete any pending connection, select it.
struct AddNode;

impl Command<Session> for AddNode {
    fn execute(&mut self, session: &mut Session, input: &CommandInput) -> ExecutionStatus {
        let path = session.graph_path.clone();
        let need_eval;
        {
            let mut project = session.project();
            let Some(graph) = project.root.graph_at_path_mut(&path) else {
                return ExecutionStatus::Failure;
            };

            let id = match session.operators.instantiate(graph, &input.metadata) {
                Ok(id) => id,
                Err(err) => {
                    tracing::warn!("{err}");
                    return ExecutionStatus::Failure;
                }
            };

            let center = graph.center;
            if let Some(node) = graph.node_mut(id) {
                node.position = center;
            }

            if let Some(pending) = graph.pending_connection.take() {
                complete_pending(graph, &pending, id);
            }

            need_eval = select_node(graph, Some(id));
        }

        session.notify_observers(EventMask::NODE | EventMask::ADDED);
        if need_eval {
            session.request_evaluation(EvalReason::NodeAdded, "node added");
        }
        ExecutionStatus::Success
    }
}

/// Modal selection: press picks a node or starts a link drag from a port,
/// update moves the node or the dangling link end, release completes the
/// connection.
#[derive(Default)]
struct Select {
    drag_offset: Option<[f32; 2]>,
    detached_node: Option<NodeId>,
    detached_feeds_sink: bool,
}

impl Command<Session> for Select {
    fn execute(&mut self, session: &mut Session, input: &CommandInput) -> ExecutionStatus {
        let path = session.graph_path.clone();
        let mut need_eval = false;
        {
            let mut project = session.project();
            let Some(graph) = project.root.graph_at_path_mut(&path) else {
                return ExecutionStatus::Failure;
            };

            match parse_pick(&input.metadata) {
                Pick::Port(node_name, port_name) => {
                    let Some(port_id) = find_port(graph, &node_name, &port_name) else {
                        return ExecutionStatus::Failure;
                    };
                    let (direction, first_link) = {
                        let Some(port) = graph.port(port_id) else {
                            return ExecutionStatus::Failure;
                        };
                        (port.direction, port.links.first().copied())
                    };

                    let pending = match direction {
                        PortDirection::Input => {
                            if let Some(upstream_out) = first_link {
                                // Grabbing a connected input detaches its
                                // link; the drag continues from the
                                // upstream output.
                                match graph.disconnect(upstream_out, port_id) {
                                    Ok(fed) => {
                                        self.detached_feeds_sink = fed;
                                        self.detached_node = graph.port_owner(port_id);
                                    }
                                    Err(err) => tracing::debug!("detach failed: {err}"),
                                }
                                PendingConnection::from_output(upstream_out, input.position)
                            } else {
                                PendingConnection::from_input(port_id, input.position)
                            }
                        }
                        PortDirection::Output => {
                            PendingConnection::from_output(port_id, input.position)
                        }
                    };
                    graph.pending_connection = Some(pending);
                }
                Pick::Node(name) => {
                    let Some(id) = graph.nodes().find(|n| n.name == name).map(|n| n.id) else {
                        return ExecutionStatus::Failure;
                    };
                    if let Some(node) = graph.node(id) {
                        self.drag_offset = Some([
                            input.position[0] - node.position[0],
                            input.position[1] - node.position[1],
                        ]);
                    }
                    need_eval = select_node(graph, Some(id));
                }
                Pick::Empty => {
                    select_node(graph, None);
                }
            }
        }

        session.notify_observers(EventMask::NODE | EventMask::SELECTED);
        if need_eval {
            session.request_evaluation(EvalReason::NodeSelected, "node selected");
        }
        ExecutionStatus::EntersModal
    }

    fn update_modal(&mut self, session: &mut Session, input: &CommandInput) {
        let path = session.graph_path.clone();
        {
            let mut project = session.project();
            let Some(graph) = project.root.graph_at_path_mut(&path) else {
                return;
            };

            if let Some(pending) = graph.pending_connection.as_mut() {
                pending.position = input.position;
            } else if let Some(active) = graph.active_node {
                if let Some(offset) = self.drag_offset {
                    if let Some(node) = graph.node_mut(active) {
                        node.position = [
                            input.position[0] - offset[0],
                            input.position[1] - offset[1],
                        ];
                    }
                }
            }
        }
        session.notify_observers(EventMask::NODE | EventMask::MODIFIED);
    }

    fn finish_modal(&mut self, session: &mut Session, input: &CommandInput) {
        let path = session.graph_path.clone();
        let mut need_eval = self.detached_feeds_sink;
        {
            let mut project = session.project();
            {
                let Some(graph) = project.root.graph_at_path_mut(&path) else {
                    return;
                };

                if let Some(detached) = self.detached_node.take() {
                    mark_downstream(graph, detached, |_, _| {});
                }

                if let Some(pending) = graph.pending_connection.take() {
                    let target = match parse_pick(&input.metadata) {
                        Pick::Port(node_name, port_name) => {
                            find_port(graph, &node_name, &port_name)
                        }
                        _ => None,
                    };

                    let pair = target.and_then(|target| {
                        match (pending.from_output, pending.to_input) {
                            (Some(out), None) => Some((out, target)),
                            (None, Some(input_port)) => Some((target, input_port)),
                            _ => None,
                        }
                    });

                    if let Some((out, input_port)) = pair {
                        // An occupied single-connection input is replaced
                        // by an explicit disconnect first.
                        let existing = graph
                            .port(input_port)
                            .filter(|p| !p.multi_connect)
                            .and_then(|p| p.links.first().copied());
                        if let Some(existing) = existing {
                            let _ = graph.disconnect(existing, input_port);
                        }

                        match graph.connect(out, input_port) {
                            Ok(()) => {
                                if let Some(downstream) = graph.port_owner(input_port) {
                                    need_eval |= graph.feeds_sink(downstream);
                                    mark_downstream(graph, downstream, |_, _| {});
                                }
                            }
                            Err(err) => tracing::debug!("connection rejected: {err}"),
                        }
                    }
                }
            }

            if need_eval {
                if let Some(&owner) = path.last() {
                    mark_ancestors_stale(&mut project.root, owner, |_| {});
                }
            }
        }

        session.notify_observers(EventMask::NODE | EventMask::MODIFIED);
        if need_eval {
            session.request_evaluation(EvalReason::GraphChanged, "graph modified");
        }
    }
}

/// Delete the active node, staling its dependents and clearing every
/// dangling reference to it.
struct Delete;

impl Command<Session> for Delete {
    fn execute(&mut self, session: &mut Session, _input: &CommandInput) -> ExecutionStatus {
        let path = session.graph_path.clone();
        let need_eval;
        {
            let mut project = session.project();

            if path.is_empty() {
                let Some(active) = project.root.active_node else {
                    return ExecutionStatus::Failure;
                };
                project.remove_entity(active);
                need_eval = true;
            } else {
                let feeds;
                {
                    let Some(graph) = project.root.graph_at_path_mut(&path) else {
                        return ExecutionStatus::Failure;
                    };
                    let Some(active) = graph.active_node else {
                        return ExecutionStatus::Failure;
                    };
                    feeds = graph.feeds_sink(active);
                    mark_downstream(graph, active, |_, _| {});
                    graph.delete_node(active);
                }

                if feeds {
                    if let Some(&owner) = path.last() {
                        mark_ancestors_stale(&mut project.root, owner, |_| {});
                    }
                }
                need_eval = feeds;
            }
        }

        session.notify_observers(EventMask::NODE | EventMask::REMOVED);
        if need_eval {
            session.request_evaluation(EvalReason::NodeRemoved, "node deleted");
        }
        ExecutionStatus::Success
    }
}

/// Descend into the active (or named) node's nested graph
struct EnterNode;

impl Command<Session> for EnterNode {
    fn execute(&mut self, session: &mut Session, input: &CommandInput) -> ExecutionStatus {
        let path = session.graph_path.clone();
        let target = {
            let project = session.project();
            let Some(graph) = project.root.graph_at_path(&path) else {
                return ExecutionStatus::Failure;
            };

            let id = match parse_pick(&input.metadata) {
                Pick::Node(name) => graph.nodes().find(|n| n.name == name).map(|n| n.id),
                _ => graph.active_node,
            };

            id.and_then(|id| graph.node(id))
                .filter(|n| n.graph.is_some())
                .map(|n| n.id)
        };

        let Some(target) = target else {
            return ExecutionStatus::Failure;
        };

        session.graph_path.push(target);
        session.notify_observers(EventMask::NODE | EventMask::MODIFIED);
        ExecutionStatus::Success
    }

    fn records_history(&self) -> bool {
        false
    }
}

/// Pop back to the parent graph
struct LeaveGraph;

impl Command<Session> for LeaveGraph {
    fn execute(&mut self, session: &mut Session, _input: &CommandInput) -> ExecutionStatus {
        if session.graph_path.pop().is_none() {
            return ExecutionStatus::Failure;
        }
        session.notify_observers(EventMask::NODE | EventMask::MODIFIED);
        ExecutionStatus::Success
    }

    fn records_history(&self) -> bool {
        false
    }
}

/// Modal drag of the graph view center
#[derive(Default)]
struct PanView {
    start_pointer: [f32; 2],
    start_center: [f32; 2],
}

impl Command<Session> for PanView {
    fn execute(&mut self, session: &mut Session, input: &CommandInput) -> ExecutionStatus {
        let path = session.graph_path.clone();
        {
            let project = session.project();
            let Some(graph) = project.root.graph_at_path(&path) else {
                return ExecutionStatus::Failure;
            };
            self.start_pointer = input.position;
            self.start_center = graph.center;
        }
        ExecutionStatus::EntersModal
    }

    fn update_modal(&mut self, session: &mut Session, input: &CommandInput) {
        let path = session.graph_path.clone();
        {
            let mut project = session.project();
            let Some(graph) = project.root.graph_at_path_mut(&path) else {
                return;
            };
            graph.center = [
                self.start_center[0] - (input.position[0] - self.start_pointer[0]),
                self.start_center[1] - (input.position[1] - self.start_pointer[1]),
            ];
        }
        session.notify_observers(EventMask::NODE | EventMask::MODIFIED);
    }

    fn records_history(&self) -> bool {
        false
    }
}

/// Scale the graph view zoom by the factor in the metadata
struct ZoomView;

impl Command<Session> for ZoomView {
    fn execute(&mut self, session: &mut Session, input: &CommandInput) -> ExecutionStatus {
        let factor: f32 = input.metadata.parse().unwrap_or(1.1);
        let path = session.graph_path.clone();
        {
            let mut project = session.project();
            let Some(graph) = project.root.graph_at_path_mut(&path) else {
                return ExecutionStatus::Failure;
            };
            graph.zoom = (graph.zoom * factor).clamp(0.1, 10.0);
        }
        session.notify_observers(EventMask::NODE | EventMask::MODIFIED);
        ExecutionStatus::Success
    }

    fn records_history(&self) -> bool {
        false
    }
}

/// Restore the previous history snapshot
struct Undo;

impl Command<Session> for Undo {
    fn execute(&mut self, session: &mut Session, _input: &CommandInput) -> ExecutionStatus {
        match session.undo() {
            Ok(()) => ExecutionStatus::Success,
            Err(err) => {
                tracing::debug!("{err}");
                ExecutionStatus::Failure
            }
        }
    }

    fn is_enabled(&self, session: &Session, _input: &CommandInput) -> bool {
        session.history.can_undo()
    }

    fn records_history(&self) -> bool {
        false
    }
}

/// Re-apply the last undone history snapshot
struct Redo;

impl Command<Session> for Redo {
    fn execute(&mut self, session: &mut Session, _input: &CommandInput) -> ExecutionStatus {
        match session.redo() {
            Ok(()) => ExecutionStatus::Success,
            Err(err) => {
                tracing::debug!("{err}");
                ExecutionStatus::Failure
            }
        }
    }

    fn is_enabled(&self, session: &Session, _input: &CommandInput) -> bool {
        session.history.can_redo()
    }

    fn records_history(&self) -> bool {
        false
    }
}

/// Force a fresh evaluation pass
struct RefreshRender;

impl Command<Session> for RefreshRender {
    fn execute(&mut self, session: &mut Session, _input: &CommandInput) -> ExecutionStatus {
        session.request_evaluation(EvalReason::RenderRequested, "render requested");
        ExecutionStatus::Success
    }

    fn records_history(&self) -> bool {
        false
    }
}
