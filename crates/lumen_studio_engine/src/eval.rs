// SPDX-License-Identifier: MIT OR Apache-2.0
//! Pull-based node evaluation.
//!
//! Evaluation enters at a graph's sink and recurses upstream on demand:
//! an operator asks its context for an input value, which executes the
//! node feeding it first. There is no pre-sorted batch; branches nothing
//! pulls from are never executed. A persistent value cache keyed by node
//! id, together with the per-node staleness flag, keeps repeated pulls
//! from re-executing clean nodes.

use crate::operator::{attach_operator, take_operator};
use crate::settings::ProjectSettings;
use crate::value::Value;
use lumen_studio_graph::{Graph, NodeId, NodeKind};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Process-wide cooperative interruption flag.
///
/// Long operators poll it through their context; nothing is preempted.
#[derive(Debug, Clone, Default)]
pub struct InterruptFlag(Arc<AtomicBool>);

impl InterruptFlag {
    /// Create a cleared flag
    pub fn new() -> Self {
        Self::default()
    }

    /// Request interruption
    pub fn interrupt(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Clear the flag before a new task
    pub fn clear(&self) {
        self.0.store(false, Ordering::Relaxed);
    }

    /// Whether interruption was requested
    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Error during evaluation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EvalError {
    /// Node not found in the graph being evaluated
    #[error("Node not found: {0:?}")]
    NodeNotFound(NodeId),

    /// An Operator-kind node has no operator attached
    #[error("Node has no operator attached: {0:?}")]
    MissingOperator(NodeId),

    /// A pull re-entered a node already executing
    #[error("Dependency cycle at node: {0:?}")]
    Cycle(NodeId),

    /// The interruption flag was observed
    #[error("Evaluation interrupted")]
    Interrupted,
}

/// Memoized node outputs, persistent across evaluation passes.
///
/// An entry is trusted while its node's staleness flag is clear; staleness
/// propagation is what invalidates results.
#[derive(Debug, Default)]
pub struct ValueCache {
    values: HashMap<NodeId, Value>,
}

impl ValueCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a cached output
    pub fn get(&self, node: NodeId) -> Option<&Value> {
        self.values.get(&node)
    }

    /// Whether a node has a cached output
    pub fn contains(&self, node: NodeId) -> bool {
        self.values.contains_key(&node)
    }

    /// Store a node's output
    pub fn insert(&mut self, node: NodeId, value: Value) {
        self.values.insert(node, value);
    }

    /// Drop a node's output
    pub fn invalidate(&mut self, node: NodeId) {
        self.values.remove(&node);
    }

    /// Drop everything
    pub fn clear(&mut self) {
        self.values.clear();
    }
}

/// Shared state of one evaluation pass
pub struct EvalState<'a> {
    /// Project settings in effect
    pub settings: &'a ProjectSettings,
    /// Frame being evaluated
    pub frame: i64,
    /// Memoized outputs
    pub cache: &'a mut ValueCache,
    /// Cooperative interruption flag
    pub interrupt: &'a InterruptFlag,
    in_flight: HashSet<NodeId>,
    // A cycle or interruption seen during a pull aborts the pass even if
    // the operator swallows the error it was handed.
    fatal: Option<EvalError>,
}

impl<'a> EvalState<'a> {
    /// Create the state for one pass
    pub fn new(
        settings: &'a ProjectSettings,
        frame: i64,
        cache: &'a mut ValueCache,
        interrupt: &'a InterruptFlag,
    ) -> Self {
        Self {
            settings,
            frame,
            cache,
            interrupt,
            in_flight: HashSet::new(),
            fatal: None,
        }
    }
}

/// What an operator sees while executing: its node, the pass state, and
/// on-demand access to upstream values.
pub struct OperatorContext<'a, 'b> {
    graph: &'a mut Graph,
    node: NodeId,
    state: &'a mut EvalState<'b>,
}

impl OperatorContext<'_, '_> {
    /// Frame being evaluated
    pub fn frame(&self) -> i64 {
        self.state.frame
    }

    /// Project settings in effect
    pub fn settings(&self) -> &ProjectSettings {
        self.state.settings
    }

    /// Whether the user requested interruption
    pub fn is_interrupted(&self) -> bool {
        self.state.interrupt.is_set()
    }

    /// Number of input ports on the executing node
    pub fn input_count(&self) -> usize {
        self.graph
            .node(self.node)
            .map(|n| n.inputs.len())
            .unwrap_or(0)
    }

    /// Pull the value feeding input `index`.
    ///
    /// Executes the upstream node first if it is stale or was never run.
    /// Returns `None` for an unconnected input.
    pub fn input(&mut self, index: usize) -> Result<Option<Value>, EvalError> {
        let Some(linked) = self
            .graph
            .node(self.node)
            .ok_or(EvalError::NodeNotFound(self.node))?
            .input(index)
            .and_then(|p| p.links.first().copied())
        else {
            return Ok(None);
        };

        let Some(upstream) = self.graph.port_owner(linked) else {
            return Ok(None);
        };

        if let Err(err) = evaluate_node(self.graph, upstream, self.state) {
            self.state.fatal = Some(err.clone());
            return Err(err);
        }
        Ok(self.state.cache.get(upstream).cloned())
    }

    /// Pull every value feeding a multi-connection input, in link order
    pub fn input_all(&mut self, index: usize) -> Result<Vec<Value>, EvalError> {
        let links: Vec<_> = self
            .graph
            .node(self.node)
            .ok_or(EvalError::NodeNotFound(self.node))?
            .input(index)
            .map(|p| p.links.clone())
            .unwrap_or_default();

        let mut values = Vec::new();
        for linked in links {
            let Some(upstream) = self.graph.port_owner(linked) else {
                continue;
            };
            if let Err(err) = evaluate_node(self.graph, upstream, self.state) {
                self.state.fatal = Some(err.clone());
                return Err(err);
            }
            if let Some(value) = self.state.cache.get(upstream).cloned() {
                values.push(value);
            }
        }
        Ok(values)
    }
}

/// Execute a node if needed, leaving its output in the pass cache.
///
/// Clean nodes with a cached output return immediately. Operator-kind
/// nodes run their operator; other kinds pass their first input through.
/// Each execution is wall-clock timed onto the node.
pub fn evaluate_node(
    graph: &mut Graph,
    node_id: NodeId,
    state: &mut EvalState<'_>,
) -> Result<(), EvalError> {
    if state.interrupt.is_set() {
        return Err(EvalError::Interrupted);
    }

    let kind = {
        let node = graph
            .node(node_id)
            .ok_or(EvalError::NodeNotFound(node_id))?;
        if !node.stale && state.cache.contains(node_id) {
            return Ok(());
        }
        node.kind
    };

    if !state.in_flight.insert(node_id) {
        return Err(EvalError::Cycle(node_id));
    }
    let result = execute(graph, node_id, kind, state);
    state.in_flight.remove(&node_id);
    result
}

fn execute(
    graph: &mut Graph,
    node_id: NodeId,
    kind: NodeKind,
    state: &mut EvalState<'_>,
) -> Result<(), EvalError> {
    if kind != NodeKind::Operator {
        return pass_through(graph, node_id, state);
    }

    let Some(mut operator) = graph.node_mut(node_id).and_then(take_operator) else {
        return Err(EvalError::MissingOperator(node_id));
    };

    operator.reset_warnings();

    let started = Instant::now();
    let status = {
        let mut ctx = OperatorContext {
            graph: &mut *graph,
            node: node_id,
            state: &mut *state,
        };
        operator.execute(&mut ctx)
    };
    let elapsed = started.elapsed();

    let output = operator.output();
    let warning_count = operator.warnings().len();
    let fatal = state.fatal.take();

    if let Some(node) = graph.node_mut(node_id) {
        node.record_eval(elapsed);
        // An aborted execution stays stale so a later pass retries it.
        node.stale = fatal.is_some();
        if status == crate::operator::OperatorStatus::Failure || warning_count > 0 {
            tracing::warn!(
                "Operator '{}' finished with {} warning(s)",
                node.name,
                warning_count
            );
        }
        attach_operator(node, operator);
    }

    if let Some(err) = fatal {
        return Err(err);
    }

    if let Some(value) = output {
        state.cache.insert(node_id, value);
    } else {
        state.cache.invalidate(node_id);
    }

    Ok(())
}

// Non-operator kinds (viewers and the like) forward their first input.
fn pass_through(
    graph: &mut Graph,
    node_id: NodeId,
    state: &mut EvalState<'_>,
) -> Result<(), EvalError> {
    let linked = graph
        .node(node_id)
        .ok_or(EvalError::NodeNotFound(node_id))?
        .input(0)
        .and_then(|p| p.links.first().copied());

    if let Some(linked) = linked {
        if let Some(upstream) = graph.port_owner(linked) {
            evaluate_node(graph, upstream, state)?;
            if let Some(value) = state.cache.get(upstream).cloned() {
                state.cache.insert(node_id, value);
            }
        }
    }

    if let Some(node) = graph.node_mut(node_id) {
        node.stale = false;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operator::{Operator, OperatorStatus};
    use lumen_studio_graph::{GraphKind, PortType};
    use std::sync::atomic::AtomicUsize;

    // Counts its executions and sums its inputs plus its own constant.
    struct Add {
        constant: f64,
        runs: Arc<AtomicUsize>,
        result: Option<Value>,
        warnings: Vec<String>,
    }

    impl Add {
        fn new(constant: f64, runs: Arc<AtomicUsize>) -> Self {
            Self {
                constant,
                runs,
                result: None,
                warnings: Vec::new(),
            }
        }
    }

    impl Operator for Add {
        fn execute(&mut self, ctx: &mut OperatorContext<'_, '_>) -> OperatorStatus {
            self.runs.fetch_add(1, Ordering::Relaxed);
            let mut total = self.constant;
            for index in 0..ctx.input_count() {
                match ctx.input(index) {
                    Ok(Some(value)) => total += value.as_float().unwrap_or(0.0),
                    Ok(None) => {}
                    Err(_) => return OperatorStatus::Failure,
                }
            }
            self.result = Some(Value::Float(total));
            OperatorStatus::Success
        }

        fn reset_warnings(&mut self) {
            self.warnings.clear();
        }

        fn warnings(&self) -> &[String] {
            &self.warnings
        }

        fn output(&self) -> Option<Value> {
            self.result.clone()
        }
    }

    struct Failing {
        warnings: Vec<String>,
    }

    impl Operator for Failing {
        fn execute(&mut self, _ctx: &mut OperatorContext<'_, '_>) -> OperatorStatus {
            self.warnings.push("missing input file".to_string());
            OperatorStatus::Failure
        }

        fn reset_warnings(&mut self) {
            self.warnings.clear();
        }

        fn warnings(&self) -> &[String] {
            &self.warnings
        }

        fn output(&self) -> Option<Value> {
            None
        }
    }

    fn add_node(graph: &mut Graph, constant: f64, runs: &Arc<AtomicUsize>) -> NodeId {
        let id = graph.create_node("add", NodeKind::Operator);
        if let Some(node) = graph.node_mut(id) {
            node.add_input("a", PortType::Float);
            node.add_input("b", PortType::Float);
            node.add_output("out", PortType::Float);
            attach_operator(node, Box::new(Add::new(constant, Arc::clone(runs))));
        }
        id
    }

    fn wire(graph: &mut Graph, from: NodeId, to: NodeId, input_index: usize) {
        let out = graph
            .node(from)
            .and_then(|n| n.output(0))
            .map(|p| p.id)
            .expect("output");
        let input = graph
            .node(to)
            .and_then(|n| n.input(input_index))
            .map(|p| p.id)
            .expect("input");
        graph.connect(out, input).expect("wire");
    }

    fn run(graph: &mut Graph, sink: NodeId, cache: &mut ValueCache) -> Result<(), EvalError> {
        let settings = ProjectSettings::default();
        let interrupt = InterruptFlag::new();
        let mut state = EvalState::new(&settings, 1, cache, &interrupt);
        evaluate_node(graph, sink, &mut state)
    }

    #[test]
    fn test_pull_evaluates_diamond_once() {
        let runs = Arc::new(AtomicUsize::new(0));
        let mut graph = Graph::new(GraphKind::Composite);
        let a = add_node(&mut graph, 1.0, &runs);
        let b = add_node(&mut graph, 2.0, &runs);
        let c = add_node(&mut graph, 3.0, &runs);
        let d = add_node(&mut graph, 4.0, &runs);
        wire(&mut graph, a, b, 0);
        wire(&mut graph, a, c, 0);
        wire(&mut graph, b, d, 0);
        wire(&mut graph, c, d, 1);

        let mut cache = ValueCache::new();
        run(&mut graph, d, &mut cache).expect("evaluate");

        // a executed once despite two pull paths: 4 executions total.
        assert_eq!(runs.load(Ordering::Relaxed), 4);
        // d = 4 + (b = 2 + 1) + (c = 3 + 1)
        assert_eq!(cache.get(d), Some(&Value::Float(11.0)));
    }

    #[test]
    fn test_clean_nodes_are_not_rerun() {
        let runs = Arc::new(AtomicUsize::new(0));
        let mut graph = Graph::new(GraphKind::Composite);
        let a = add_node(&mut graph, 1.0, &runs);
        let b = add_node(&mut graph, 2.0, &runs);
        wire(&mut graph, a, b, 0);

        let mut cache = ValueCache::new();
        run(&mut graph, b, &mut cache).expect("first pass");
        run(&mut graph, b, &mut cache).expect("second pass");

        assert_eq!(runs.load(Ordering::Relaxed), 2);

        // Marking b stale re-runs b only; a's cached value is pulled.
        if let Some(node) = graph.node_mut(b) {
            node.stale = true;
        }
        run(&mut graph, b, &mut cache).expect("third pass");
        assert_eq!(runs.load(Ordering::Relaxed), 3);
    }

    #[test]
    fn test_unpulled_branches_are_not_executed() {
        let runs = Arc::new(AtomicUsize::new(0));
        let mut graph = Graph::new(GraphKind::Composite);
        let a = add_node(&mut graph, 1.0, &runs);
        let b = add_node(&mut graph, 2.0, &runs);
        let orphan = add_node(&mut graph, 9.0, &runs);
        wire(&mut graph, a, b, 0);

        let mut cache = ValueCache::new();
        run(&mut graph, b, &mut cache).expect("evaluate");

        assert_eq!(runs.load(Ordering::Relaxed), 2);
        assert!(cache.get(orphan).is_none());
    }

    #[test]
    fn test_cycle_is_an_error() {
        let runs = Arc::new(AtomicUsize::new(0));
        let mut graph = Graph::new(GraphKind::Composite);
        let a = add_node(&mut graph, 1.0, &runs);
        let b = add_node(&mut graph, 2.0, &runs);
        wire(&mut graph, a, b, 0);
        wire(&mut graph, b, a, 0);

        let mut cache = ValueCache::new();
        assert!(matches!(
            run(&mut graph, b, &mut cache),
            Err(EvalError::Cycle(_))
        ));
    }

    #[test]
    fn test_failed_operator_keeps_warnings_and_timing() {
        let mut graph = Graph::new(GraphKind::Composite);
        let id = graph.create_node("reader", NodeKind::Operator);
        if let Some(node) = graph.node_mut(id) {
            node.add_output("out", PortType::Image);
            attach_operator(
                node,
                Box::new(Failing {
                    warnings: Vec::new(),
                }),
            );
        }

        let mut cache = ValueCache::new();
        run(&mut graph, id, &mut cache).expect("a failure completes the pass");

        let node = graph.node(id).expect("node");
        assert_eq!(node.eval_count, 1);
        assert!(!node.stale);
        let operator = crate::operator::operator_ref(node).expect("operator");
        assert_eq!(operator.warnings(), ["missing input file"]);
    }

    #[test]
    fn test_missing_operator_is_an_error() {
        let mut graph = Graph::new(GraphKind::Composite);
        let id = graph.create_node("empty", NodeKind::Operator);

        let mut cache = ValueCache::new();
        assert!(matches!(
            run(&mut graph, id, &mut cache),
            Err(EvalError::MissingOperator(_))
        ));
    }

    #[test]
    fn test_interrupt_stops_the_pass() {
        let runs = Arc::new(AtomicUsize::new(0));
        let mut graph = Graph::new(GraphKind::Composite);
        let a = add_node(&mut graph, 1.0, &runs);

        let settings = ProjectSettings::default();
        let interrupt = InterruptFlag::new();
        interrupt.interrupt();
        let mut cache = ValueCache::new();
        let mut state = EvalState::new(&settings, 1, &mut cache, &interrupt);

        assert_eq!(
            evaluate_node(&mut graph, a, &mut state),
            Err(EvalError::Interrupted)
        );
        assert_eq!(runs.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_render_node_passes_through() {
        let runs = Arc::new(AtomicUsize::new(0));
        let mut graph = Graph::new(GraphKind::Composite);
        let a = add_node(&mut graph, 5.0, &runs);
        let viewer = graph.create_node("viewer", NodeKind::Render);
        let viewer_in = graph
            .node_mut(viewer)
            .map(|n| n.add_input("in", PortType::Float))
            .expect("viewer");
        let out = graph
            .node(a)
            .and_then(|n| n.output(0))
            .map(|p| p.id)
            .expect("out");
        graph.connect(out, viewer_in).expect("connect");

        let mut cache = ValueCache::new();
        run(&mut graph, viewer, &mut cache).expect("evaluate");

        assert_eq!(cache.get(viewer), Some(&Value::Float(5.0)));
    }
}
