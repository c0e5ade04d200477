// SPDX-License-Identifier: MIT OR Apache-2.0
//! Staleness propagation after a graph change.
//!
//! Two traversals cover the two directions a change can matter in:
//! [`mark_downstream`] walks dependents inside one graph,
//! [`mark_ancestors_stale`] walks the owning-node chain out of a nested
//! graph. Both visit every node at most once per pass, so diamond
//! dependency shapes are reported a single time.

use crate::graph::Graph;
use crate::node::{Node, NodeId, NodeKind};
use crate::port::PortId;
use std::collections::{HashSet, VecDeque};

/// Mark every Operator-kind node reachable forward from `origin` stale.
///
/// The walk follows output→input links within the graph. Operator nodes
/// get their staleness flag set and are reported through the callback
/// with the input port the change arrived through (`None` for the origin
/// itself). Other kinds are traversed through without being reported.
pub fn mark_downstream(
    graph: &mut Graph,
    origin: NodeId,
    mut on_stale: impl FnMut(&mut Node, Option<PortId>),
) {
    let mut queue: VecDeque<(NodeId, Option<PortId>)> = VecDeque::new();
    let mut visited: HashSet<NodeId> = HashSet::new();
    queue.push_back((origin, None));

    while let Some((id, via)) = queue.pop_front() {
        if !visited.insert(id) {
            continue;
        }

        let mut hops: Vec<(NodeId, PortId)> = Vec::new();
        if let Some(node) = graph.node(id) {
            for output in &node.outputs {
                for linked in &output.links {
                    if let Some(port) = graph.port(*linked) {
                        hops.push((port.node, port.id));
                    }
                }
            }
        }

        if let Some(node) = graph.node_mut(id) {
            if node.kind == NodeKind::Operator {
                node.stale = true;
                on_stale(node, via);
            }
        }

        for (next, port) in hops {
            queue.push_back((next, Some(port)));
        }
    }
}

/// Walk the owning-node chain of a changed nested graph up to the root.
///
/// `from` is the node owning the graph whose contents changed. Every
/// Operator-kind ancestor is marked stale and reported through the
/// callback; every Shader-kind ancestor gets its modification counter
/// incremented once, which drives lazy recompilation. The walk ends at
/// the root (a node without a parent), and a malformed parent cycle
/// terminates instead of recursing forever.
pub fn mark_ancestors_stale(
    root: &mut Graph,
    from: NodeId,
    mut on_stale: impl FnMut(&mut Node),
) {
    let mut current = Some(from);
    let mut visited: HashSet<NodeId> = HashSet::new();

    while let Some(id) = current {
        if !visited.insert(id) {
            break;
        }

        let Some(node) = root.find_node_mut(id) else {
            break;
        };
        current = node.parent;

        match node.kind {
            NodeKind::Operator => {
                node.stale = true;
                on_stale(node);
            }
            NodeKind::Shader => {
                node.modifications += 1;
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphKind;
    use crate::port::PortType;

    fn operator(graph: &mut Graph, name: &str) -> NodeId {
        let id = graph.create_node(name, NodeKind::Operator);
        if let Some(node) = graph.node_mut(id) {
            node.add_input("in", PortType::Image);
            node.add_multi_input("extra", PortType::Image);
            node.add_output("out", PortType::Image);
        }
        id
    }

    fn wire(graph: &mut Graph, from: NodeId, to: NodeId, input_index: usize) {
        let out = graph.node(from).and_then(|n| n.output(0)).map(|p| p.id);
        let input = graph
            .node(to)
            .and_then(|n| n.input(input_index))
            .map(|p| p.id);
        graph
            .connect(out.expect("output"), input.expect("input"))
            .expect("wire");
    }

    #[test]
    fn test_downstream_diamond_reported_once() {
        let mut graph = Graph::new(GraphKind::Composite);
        let a = operator(&mut graph, "a");
        let b = operator(&mut graph, "b");
        let c = operator(&mut graph, "c");
        let d = operator(&mut graph, "d");
        wire(&mut graph, a, b, 0);
        wire(&mut graph, a, c, 0);
        wire(&mut graph, b, d, 0);
        wire(&mut graph, c, d, 1);

        let mut reported: Vec<NodeId> = Vec::new();
        mark_downstream(&mut graph, a, |node, _| reported.push(node.id));

        assert_eq!(reported.len(), 4);
        assert_eq!(reported.iter().filter(|id| **id == d).count(), 1);
        assert!(graph.node(d).map(|n| n.stale).unwrap_or(false));
    }

    #[test]
    fn test_downstream_origin_has_no_arrival_port() {
        let mut graph = Graph::new(GraphKind::Composite);
        let a = operator(&mut graph, "a");
        let b = operator(&mut graph, "b");
        wire(&mut graph, a, b, 0);

        let mut arrivals: Vec<(NodeId, Option<PortId>)> = Vec::new();
        mark_downstream(&mut graph, a, |node, via| arrivals.push((node.id, via)));

        assert_eq!(arrivals[0], (a, None));
        assert_eq!(arrivals[1].0, b);
        assert!(arrivals[1].1.is_some());
    }

    #[test]
    fn test_downstream_skips_non_operator_kinds() {
        let mut graph = Graph::new(GraphKind::Composite);
        let a = operator(&mut graph, "a");
        let viewer = graph.create_node("viewer", NodeKind::Render);
        let viewer_in = graph
            .node_mut(viewer)
            .map(|n| n.add_input("in", PortType::Image))
            .expect("viewer");
        let out = graph
            .node(a)
            .and_then(|n| n.output(0))
            .map(|p| p.id)
            .expect("out");
        graph.connect(out, viewer_in).expect("connect");

        let mut reported: Vec<NodeId> = Vec::new();
        mark_downstream(&mut graph, a, |node, _| reported.push(node.id));

        assert_eq!(reported, vec![a]);
    }

    #[test]
    fn test_ancestors_bump_shader_counter_once() {
        let mut root = Graph::new(GraphKind::Root);
        let shader_id = root.add_node(
            crate::node::Node::new("metal", NodeKind::Shader).with_subgraph(GraphKind::Shader),
        );
        let op_id = root
            .node_mut(shader_id)
            .and_then(|n| n.graph.as_mut())
            .map(|g| {
                g.add_node(
                    crate::node::Node::new("pattern", NodeKind::Operator)
                        .with_subgraph(GraphKind::Detail),
                )
            })
            .expect("nested operator");

        // A change inside the detail graph owned by `pattern`.
        let mut reported: Vec<NodeId> = Vec::new();
        mark_ancestors_stale(&mut root, op_id, |node| reported.push(node.id));

        assert_eq!(reported, vec![op_id]);
        assert_eq!(root.node(shader_id).map(|n| n.modifications), Some(1));
        assert!(root.find_node(op_id).map(|n| n.stale).unwrap_or(false));
    }

    #[test]
    fn test_ancestors_stop_at_root() {
        let mut root = Graph::new(GraphKind::Root);
        let top = root.create_node("top", NodeKind::Operator);

        let mut count = 0;
        mark_ancestors_stale(&mut root, top, |_| count += 1);

        assert_eq!(count, 1);
    }
}
