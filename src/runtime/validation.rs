//! Graph validation engine
//!
//! Two entry points:
//! - [`GraphValidator::check_connection`] gates a single wire request before
//!   the graph is touched (port roles, occupancy, type tags, cycles).
//! - [`GraphValidator::validate`] audits a whole graph and reports broken
//!   structure as errors and suspicious-but-legal structure as warnings.
//!
//! It also provides the deterministic topological order the evaluation
//! engine runs in.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap, HashSet};

use crate::core::block::Node;
use crate::core::port::{PortDirection, PortId, PortTypes};
use crate::core::NodeId;

use super::graph::{Graph, GraphError};

// ── Result types ────────────────────────────────────────────────────────────

/// A single validation error with optional location and suggestion.
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// Node where the problem was found (if applicable).
    pub node_id: Option<NodeId>,
    /// Human-readable description.
    pub message: String,
    /// Optional suggestion for how to fix it.
    pub suggestion: Option<String>,
}

/// A non-fatal warning.
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub node_id: Option<NodeId>,
    pub message: String,
    pub suggestion: Option<String>,
}

/// Overall validation result.
#[derive(Debug, Clone)]
pub struct GraphValidationResult {
    pub valid: bool,
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl GraphValidationResult {
    fn ok() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    fn add_error(&mut self, node_id: Option<NodeId>, message: impl Into<String>, suggestion: Option<&str>) {
        self.valid = false;
        self.errors.push(ValidationError {
            node_id,
            message: message.into(),
            suggestion: suggestion.map(|s| s.to_string()),
        });
    }

    fn add_warning(&mut self, node_id: Option<NodeId>, message: impl Into<String>, suggestion: Option<&str>) {
        self.warnings.push(ValidationWarning {
            node_id,
            message: message.into(),
            suggestion: suggestion.map(|s| s.to_string()),
        });
    }

    /// Merge another result into this one.
    fn merge(&mut self, other: GraphValidationResult) {
        if !other.valid {
            self.valid = false;
        }
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }
}

/// Facts about an accepted connection request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionCheck {
    /// The source node is an input source rather than a block
    pub source_is_input: bool,
}

// ── Validator ───────────────────────────────────────────────────────────────

/// Validates connection requests and whole graphs.
pub struct GraphValidator;

impl GraphValidator {
    /// Decide whether a wire from `source` to `target` may be created.
    ///
    /// Checks run in a fixed order and the first failure wins:
    /// 1. both ports exist and sit on the right side (output to input)
    /// 2. both ports are free
    /// 3. the tags are identical and registered
    /// 4. the wire would not close a cycle
    pub fn check_connection(
        graph: &Graph,
        source: PortId,
        target: PortId,
    ) -> Result<ConnectionCheck, GraphError> {
        let source_type = graph.port_type(source)?;
        if source.direction() != PortDirection::Output {
            return Err(GraphError::InvalidPortRole(source));
        }
        let target_type = graph.port_type(target)?;
        if target.direction() != PortDirection::Input {
            return Err(GraphError::InvalidPortRole(target));
        }

        if !graph.is_port_free(source)? {
            return Err(GraphError::PortAlreadyConnected(source));
        }
        if !graph.is_port_free(target)? {
            return Err(GraphError::PortAlreadyConnected(target));
        }

        if !PortTypes::compatible(source_type, target_type) {
            return Err(GraphError::PortTypeMismatch {
                source_type: source_type.to_string(),
                target_type: target_type.to_string(),
            });
        }
        if !graph.port_types().type_exists(source_type) {
            return Err(GraphError::UnknownPortType(source_type.to_string()));
        }

        if source.node == target.node || Self::reaches(graph, target.node, source.node) {
            return Err(GraphError::CycleDetected {
                from: source.node,
                to: target.node,
            });
        }

        let source_is_input = graph
            .node(source.node)
            .map(Node::is_input)
            .unwrap_or(false);
        Ok(ConnectionCheck { source_is_input })
    }

    /// Whether `to` is reachable from `from` by following wires forward.
    pub fn reaches(graph: &Graph, from: NodeId, to: NodeId) -> bool {
        let mut stack = vec![from];
        let mut seen = HashSet::new();

        while let Some(node) = stack.pop() {
            if node == to {
                return true;
            }
            if seen.insert(node) {
                stack.extend(graph.successors(node));
            }
        }
        false
    }

    /// Topological order of every node, ties broken by ascending id.
    ///
    /// Returns `None` if the graph has a cycle, which a graph built through
    /// its own operations never does.
    pub fn topological_order(graph: &Graph) -> Option<Vec<NodeId>> {
        let mut in_degree: BTreeMap<NodeId, usize> =
            graph.nodes().map(|n| (n.id(), 0)).collect();

        for wire in graph.wires() {
            if let Some(deg) = in_degree.get_mut(&wire.target.node) {
                *deg += 1;
            }
        }

        let mut ready: BinaryHeap<Reverse<NodeId>> = in_degree
            .iter()
            .filter(|(_, &deg)| deg == 0)
            .map(|(&id, _)| Reverse(id))
            .collect();

        let mut order = Vec::with_capacity(in_degree.len());

        while let Some(Reverse(node)) = ready.pop() {
            order.push(node);
            for next in graph.successors(node) {
                if let Some(deg) = in_degree.get_mut(&next) {
                    *deg -= 1;
                    if *deg == 0 {
                        ready.push(Reverse(next));
                    }
                }
            }
        }

        if order.len() == in_degree.len() {
            Some(order)
        } else {
            None
        }
    }

    /// Run every structural check against the graph.
    pub fn validate(graph: &Graph) -> GraphValidationResult {
        let mut result = GraphValidationResult::ok();

        result.merge(Self::check_wire_endpoints(graph));
        result.merge(Self::check_port_occupancy(graph));
        result.merge(Self::check_cycles(graph));
        result.merge(Self::check_unconnected_inputs(graph));
        result.merge(Self::check_disconnected_nodes(graph));

        result
    }

    // ── Individual checks ───────────────────────────────────────────────

    /// Every wire joins an existing output to an existing block input, and
    /// both endpoints list the wire.
    fn check_wire_endpoints(graph: &Graph) -> GraphValidationResult {
        let mut result = GraphValidationResult::ok();
        for wire in graph.wires() {
            let source = graph.node(wire.source.node);
            let target = graph.node(wire.target.node);

            match source {
                None => result.add_error(
                    Some(wire.source.node),
                    format!("Wire {} starts at missing node {}", wire.id, wire.source.node),
                    Some("Delete the wire"),
                ),
                Some(node) => {
                    if wire.source.direction() != PortDirection::Output
                        || !node.output_wires().contains(&wire.id)
                    {
                        result.add_error(
                            Some(node.id()),
                            format!("Wire {} is not registered on output {}", wire.id, wire.source),
                            None,
                        );
                    }
                    if node.is_input() != wire.source_is_input {
                        result.add_error(
                            Some(node.id()),
                            format!("Wire {} has a stale source kind flag", wire.id),
                            None,
                        );
                    }
                }
            }

            let slot = wire.target.input_index();
            match (target.and_then(Node::as_block), slot) {
                (Some(block), Some(index)) if block.input_wire(index) == Some(wire.id) => {}
                _ => result.add_error(
                    Some(wire.target.node),
                    format!("Wire {} does not end at a registered input {}", wire.id, wire.target),
                    Some("Delete the wire"),
                ),
            }
        }
        result
    }

    /// Every port reference points back at a live wire, and outputs carry at
    /// most one wire unless fan-out is enabled.
    fn check_port_occupancy(graph: &Graph) -> GraphValidationResult {
        let mut result = GraphValidationResult::ok();
        for node in graph.nodes() {
            for wire_id in node.attached_wires() {
                if !graph.wire(wire_id).is_some_and(|w| w.touches(node.id())) {
                    result.add_error(
                        Some(node.id()),
                        format!("Node {} references unknown wire {}", node.id(), wire_id),
                        None,
                    );
                }
            }
            if !graph.allows_output_fanout() && node.output_wires().len() > 1 {
                result.add_error(
                    Some(node.id()),
                    format!(
                        "Output of {} drives {} wires but fan-out is disabled",
                        node.id(),
                        node.output_wires().len()
                    ),
                    Some("Remove extra wires or enable output fan-out"),
                );
            }
        }
        result
    }

    fn check_cycles(graph: &Graph) -> GraphValidationResult {
        let mut result = GraphValidationResult::ok();
        if Self::topological_order(graph).is_none() {
            result.add_error(
                None,
                "Graph contains a cycle",
                Some("Remove wires to break the cycle"),
            );
        }
        result
    }

    /// Warn about blocks with an empty input slot; they will not compute.
    fn check_unconnected_inputs(graph: &Graph) -> GraphValidationResult {
        let mut result = GraphValidationResult::ok();
        for block in graph.nodes().filter_map(Node::as_block) {
            for (index, slot) in block.input_wires().iter().enumerate() {
                if slot.is_none() {
                    result.add_warning(
                        Some(block.id),
                        format!("Input {} of block {} is not connected", index, block.id),
                        Some("Connect a source to this input port"),
                    );
                }
            }
        }
        result
    }

    /// Warn about nodes that have no wires at all.
    fn check_disconnected_nodes(graph: &Graph) -> GraphValidationResult {
        let mut result = GraphValidationResult::ok();
        if graph.node_count() < 2 {
            return result;
        }
        for node in graph.nodes() {
            if node.attached_wires().is_empty() {
                result.add_warning(
                    Some(node.id()),
                    format!("Node {} is not connected to any other node", node.id()),
                    Some("Connect this node or remove it from the graph"),
                );
            }
        }
        result
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::registry::BlockRegistry;
    use std::sync::Arc;

    fn graph() -> Graph {
        Graph::new(
            Arc::new(BlockRegistry::builtin()),
            PortTypes::from_tags(["general", "type2", "type3"]),
        )
    }

    fn block(g: &mut Graph, name: &str) -> NodeId {
        let kind = g.registry().kind_id_by_name(name).unwrap();
        g.create_block(kind).unwrap()
    }

    // ── Connection checks ───────────────────────────────────────────────

    #[test]
    fn test_valid_connection() {
        let mut g = graph();
        let a = g.create_input(1.0);
        let neg = block(&mut g, "neg");

        let check = GraphValidator::check_connection(&g, PortId::output(a), PortId::input(neg, 0));
        assert_eq!(check, Ok(ConnectionCheck { source_is_input: true }));
    }

    #[test]
    fn test_missing_node() {
        let mut g = graph();
        let neg = block(&mut g, "neg");
        let result =
            GraphValidator::check_connection(&g, PortId::output(NodeId(50)), PortId::input(neg, 0));
        assert_eq!(result, Err(GraphError::UnknownId(50)));
    }

    #[test]
    fn test_wrong_port_roles() {
        let mut g = graph();
        let a = g.create_input(1.0);
        let n1 = block(&mut g, "neg");
        let n2 = block(&mut g, "abs");

        // input used as a source
        let result = GraphValidator::check_connection(&g, PortId::input(n1, 0), PortId::input(n2, 0));
        assert_eq!(result, Err(GraphError::InvalidPortRole(PortId::input(n1, 0))));

        // output used as a target
        let result = GraphValidator::check_connection(&g, PortId::output(n1), PortId::output(n2));
        assert_eq!(result, Err(GraphError::InvalidPortRole(PortId::output(n2))));

        // input sources have no input ports
        let result = GraphValidator::check_connection(&g, PortId::output(n1), PortId::input(a, 0));
        assert_eq!(result, Err(GraphError::InvalidPortRole(PortId::input(a, 0))));
    }

    #[test]
    fn test_port_index_out_of_range() {
        let mut g = graph();
        let a = g.create_input(1.0);
        let neg = block(&mut g, "neg");
        let result = GraphValidator::check_connection(&g, PortId::output(a), PortId::input(neg, 1));
        assert_eq!(result, Err(GraphError::UnknownPort(PortId::input(neg, 1))));
    }

    #[test]
    fn test_occupied_ports() {
        let mut g = graph();
        let a = g.create_input(1.0);
        let b = g.create_input(2.0);
        let n1 = block(&mut g, "neg");
        let n2 = block(&mut g, "abs");
        g.create_wire(PortId::output(a), PortId::input(n1, 0)).unwrap();

        let result = GraphValidator::check_connection(&g, PortId::output(a), PortId::input(n2, 0));
        assert_eq!(result, Err(GraphError::PortAlreadyConnected(PortId::output(a))));

        let result = GraphValidator::check_connection(&g, PortId::output(b), PortId::input(n1, 0));
        assert_eq!(result, Err(GraphError::PortAlreadyConnected(PortId::input(n1, 0))));
    }

    #[test]
    fn test_cycle_rejected() {
        let mut g = graph();
        let n1 = block(&mut g, "neg");
        let n2 = block(&mut g, "abs");
        g.create_wire(PortId::output(n1), PortId::input(n2, 0)).unwrap();

        let result = GraphValidator::check_connection(&g, PortId::output(n2), PortId::input(n1, 0));
        assert_eq!(result, Err(GraphError::CycleDetected { from: n2, to: n1 }));
    }

    #[test]
    fn test_self_loop_rejected() {
        let mut g = graph();
        let add = block(&mut g, "adder");
        let result = GraphValidator::check_connection(&g, PortId::output(add), PortId::input(add, 1));
        assert_eq!(result, Err(GraphError::CycleDetected { from: add, to: add }));
    }

    #[test]
    fn test_reaches() {
        let mut g = graph();
        let a = g.create_input(1.0);
        let n1 = block(&mut g, "neg");
        let n2 = block(&mut g, "abs");
        g.create_wire(PortId::output(a), PortId::input(n1, 0)).unwrap();
        g.create_wire(PortId::output(n1), PortId::input(n2, 0)).unwrap();

        assert!(GraphValidator::reaches(&g, a, n2));
        assert!(GraphValidator::reaches(&g, n1, n1));
        assert!(!GraphValidator::reaches(&g, n2, a));
    }

    // ── Ordering ────────────────────────────────────────────────────────

    #[test]
    fn test_topological_order_breaks_ties_by_id() {
        let mut g = graph();
        let sum = block(&mut g, "adder");
        let b = g.create_input(2.0);
        let a = g.create_input(1.0);
        g.create_wire(PortId::output(a), PortId::input(sum, 0)).unwrap();
        g.create_wire(PortId::output(b), PortId::input(sum, 1)).unwrap();
        let lone = block(&mut g, "sqrt");

        let order = GraphValidator::topological_order(&g).unwrap();
        assert_eq!(order, vec![b, a, sum, lone]);
    }

    #[test]
    fn test_topological_order_diamond_with_fanout() {
        let mut g = graph().with_output_fanout(true);
        let a = g.create_input(3.0);
        let n1 = block(&mut g, "neg");
        let n2 = block(&mut g, "abs");
        let sum = block(&mut g, "adder");
        g.create_wire(PortId::output(a), PortId::input(n1, 0)).unwrap();
        g.create_wire(PortId::output(a), PortId::input(n2, 0)).unwrap();
        g.create_wire(PortId::output(n1), PortId::input(sum, 0)).unwrap();
        g.create_wire(PortId::output(n2), PortId::input(sum, 1)).unwrap();

        let order = GraphValidator::topological_order(&g).unwrap();
        assert_eq!(order, vec![a, n1, n2, sum]);
    }

    // ── Whole-graph audit ───────────────────────────────────────────────

    #[test]
    fn test_validate_clean_graph() {
        let mut g = graph();
        let a = g.create_input(1.0);
        let neg = block(&mut g, "neg");
        g.create_wire(PortId::output(a), PortId::input(neg, 0)).unwrap();

        let result = GraphValidator::validate(&g);
        assert!(result.valid, "Errors: {:?}", result.errors);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_validate_warns_about_open_inputs() {
        let mut g = graph();
        let a = g.create_input(1.0);
        let sum = block(&mut g, "adder");
        g.create_wire(PortId::output(a), PortId::input(sum, 0)).unwrap();
        let lone = g.create_input(5.0);

        let result = GraphValidator::validate(&g);
        assert!(result.valid);
        assert_eq!(result.warnings.len(), 2);
        assert_eq!(result.warnings[0].node_id, Some(sum));
        assert_eq!(result.warnings[1].node_id, Some(lone));
    }
}
