// SPDX-License-Identifier: MIT OR Apache-2.0
//! The project: the root graph, time state, and per-entity results.
//!
//! Top-level nodes of the root graph are entities (objects, composites),
//! each owning a nested graph. Every entity has a stable result slot
//! behind a `parking_lot::RwLock`: the evaluation worker writes the sink's
//! value under the write lock, UI readers take read locks and never see a
//! partial write.

use crate::eval::{evaluate_node, EvalError, EvalState, InterruptFlag, ValueCache};
use crate::settings::ProjectSettings;
use crate::value::Value;
use lumen_studio_graph::{Graph, GraphKind, Node, NodeId, NodeKind};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Shared storage for one entity's computed result
pub type ResultSlot = Arc<RwLock<Option<Value>>>;

/// A loaded project
pub struct Project {
    /// The root graph holding entities
    pub root: Graph,
    /// Evaluation and editor settings
    pub settings: ProjectSettings,
    /// Current frame
    pub frame: i64,
    /// Whether continuous playback is driving evaluation
    pub playback: bool,
    /// Memoized node outputs
    pub cache: ValueCache,
    results: HashMap<NodeId, ResultSlot>,
}

impl Project {
    /// Create an empty project
    pub fn new() -> Self {
        let settings = ProjectSettings::default();
        Self {
            root: Graph::new(GraphKind::Root),
            frame: settings.frame_start,
            settings,
            playback: false,
            cache: ValueCache::new(),
            results: HashMap::new(),
        }
    }

    /// Create an entity: a top-level node owning a nested graph and a
    /// result slot. `kind` is Object or Composite.
    pub fn create_entity(&mut self, name: &str, kind: NodeKind) -> NodeId {
        let graph_kind = match kind {
            NodeKind::Object => GraphKind::Object,
            NodeKind::Composite => GraphKind::Composite,
            NodeKind::Shader => GraphKind::Shader,
            _ => GraphKind::Detail,
        };

        let id = self
            .root
            .add_node(Node::new(name, kind).with_subgraph(graph_kind));
        self.results.insert(id, Arc::new(RwLock::new(None)));
        id
    }

    /// Remove an entity and its result slot
    pub fn remove_entity(&mut self, entity: NodeId) -> Option<Node> {
        self.results.remove(&entity);
        self.root.delete_node(entity)
    }

    /// The result slot of an entity, cloneable for readers on any thread
    pub fn result(&self, entity: NodeId) -> Option<ResultSlot> {
        self.results.get(&entity).cloned()
    }

    /// Ids of all entities, in insertion order
    pub fn entities(&self) -> Vec<NodeId> {
        self.root
            .nodes()
            .filter(|n| matches!(n.kind, NodeKind::Object | NodeKind::Composite))
            .map(|n| n.id)
            .collect()
    }

    /// Ensure every entity has a result slot. Used after replacing the
    /// root graph wholesale (file load, history restore).
    pub fn refresh_result_slots(&mut self) {
        for id in self.entities() {
            self.results
                .entry(id)
                .or_insert_with(|| Arc::new(RwLock::new(None)));
        }
    }

    /// Evaluate one entity from its nested graph's sink, storing the
    /// produced value in the entity's result slot under the write lock.
    ///
    /// An entity without a sink is skipped.
    pub fn evaluate_entity(
        &mut self,
        entity: NodeId,
        interrupt: &InterruptFlag,
    ) -> Result<(), EvalError> {
        let slot = self.results.get(&entity).cloned();

        let Self {
            root,
            settings,
            frame,
            cache,
            ..
        } = self;

        let node = root
            .node_mut(entity)
            .ok_or(EvalError::NodeNotFound(entity))?;
        let Some(graph) = node.graph.as_mut() else {
            return Ok(());
        };
        let Some(sink) = graph.output_sink() else {
            tracing::debug!("entity '{}' has no output node, skipping", node.name);
            return Ok(());
        };

        let mut state = EvalState::new(settings, *frame, cache, interrupt);
        evaluate_node(graph, sink, &mut state)?;

        let value = state.cache.get(sink).cloned();
        if let Some(slot) = slot {
            *slot.write() = value;
        }

        Ok(())
    }

    /// Evaluate every entity. Interruption stops the pass; any other
    /// per-entity failure is logged and the pass continues.
    pub fn evaluate_all(&mut self, interrupt: &InterruptFlag) -> Result<(), EvalError> {
        for entity in self.entities() {
            match self.evaluate_entity(entity, interrupt) {
                Ok(()) => {}
                Err(EvalError::Interrupted) => return Err(EvalError::Interrupted),
                Err(err) => tracing::warn!("entity evaluation failed: {err}"),
            }
        }
        Ok(())
    }

    /// Move the time cursor, invalidating every computed result
    pub fn set_frame(&mut self, frame: i64) {
        self.frame = frame.clamp(self.settings.frame_start, self.settings.frame_end);
        self.mark_all_stale();
    }

    /// Mark every operator node stale and drop all memoized values
    pub fn mark_all_stale(&mut self) {
        fn mark(graph: &mut Graph) {
            for node in graph.nodes_mut() {
                if node.kind == NodeKind::Operator {
                    node.stale = true;
                }
                if let Some(sub) = node.graph.as_mut() {
                    mark(sub);
                }
            }
        }

        mark(&mut self.root);
        self.cache.clear();
    }
}

impl Default for Project {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::OperatorContext;
    use crate::operator::{Operator, OperatorRegistry, OperatorStatus, OperatorType};
    use lumen_studio_graph::PortType;

    struct Const(f64);

    impl Operator for Const {
        fn execute(&mut self, _ctx: &mut OperatorContext<'_, '_>) -> OperatorStatus {
            OperatorStatus::Success
        }

        fn reset_warnings(&mut self) {}

        fn warnings(&self) -> &[String] {
            &[]
        }

        fn output(&self) -> Option<Value> {
            Some(Value::Float(self.0))
        }
    }

    fn registry() -> OperatorRegistry {
        let mut registry = OperatorRegistry::new();
        registry.register(
            OperatorType::new("const", "generate", || Box::new(Const(3.0)))
                .with_output("out", PortType::Float),
        );
        registry
    }

    #[test]
    fn test_entity_result_hand_off() {
        let registry = registry();
        let mut project = Project::new();
        let entity = project.create_entity("comp", NodeKind::Composite);

        let graph = project
            .root
            .node_mut(entity)
            .and_then(|n| n.graph.as_mut())
            .expect("subgraph");
        registry.instantiate(graph, "const").expect("node");

        let interrupt = InterruptFlag::new();
        project.evaluate_all(&interrupt).expect("evaluate");

        let slot = project.result(entity).expect("slot");
        assert_eq!(*slot.read(), Some(Value::Float(3.0)));
    }

    #[test]
    fn test_entity_without_sink_is_skipped() {
        let mut project = Project::new();
        let entity = project.create_entity("empty", NodeKind::Object);

        let interrupt = InterruptFlag::new();
        project.evaluate_all(&interrupt).expect("evaluate");

        let slot = project.result(entity).expect("slot");
        assert_eq!(*slot.read(), None);
    }

    #[test]
    fn test_set_frame_invalidates() {
        let registry = registry();
        let mut project = Project::new();
        let entity = project.create_entity("comp", NodeKind::Composite);
        let node = {
            let graph = project
                .root
                .node_mut(entity)
                .and_then(|n| n.graph.as_mut())
                .expect("subgraph");
            registry.instantiate(graph, "const").expect("node")
        };

        let interrupt = InterruptFlag::new();
        project.evaluate_all(&interrupt).expect("first pass");
        assert!(!project
            .root
            .find_node(node)
            .map(|n| n.stale)
            .unwrap_or(true));

        project.set_frame(10);
        assert_eq!(project.frame, 10);
        assert!(project.root.find_node(node).map(|n| n.stale).unwrap_or(false));
    }

    #[test]
    fn test_remove_entity_drops_slot() {
        let mut project = Project::new();
        let entity = project.create_entity("comp", NodeKind::Composite);
        assert!(project.result(entity).is_some());

        project.remove_entity(entity);
        assert!(project.result(entity).is_none());
        assert!(project.entities().is_empty());
    }
}
