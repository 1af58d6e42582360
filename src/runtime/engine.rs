//! Evaluation engine
//!
//! Computes every node of a graph in topological order, propagating values
//! along wires. Numeric failures are recorded per node and never abort the
//! run: a failing block simply produces no value, and its consumers report
//! [`DomainError::UpstreamFailure`].
//!
//! Three ways to run:
//! - [`Evaluator::evaluate_all`] computes the whole graph
//! - [`Evaluator::evaluate_dirty`] recomputes only what a set of changed
//!   nodes can influence and reuses earlier results for the rest
//! - [`Stepper`] walks the same order one node per call

use log::{debug, warn};
use std::collections::{BTreeMap, BTreeSet};

use crate::core::block::{DomainError, Node};
use crate::core::NodeId;

use super::graph::Graph;
use super::validation::GraphValidator;

// ── Result types ────────────────────────────────────────────────────────────

/// Outcome of evaluating a graph.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Evaluation {
    /// Nodes that produced a value
    pub values: BTreeMap<NodeId, f64>,
    /// Nodes that failed, with the reason
    pub failures: BTreeMap<NodeId, DomainError>,
    /// Order the nodes were (or will be) computed in
    pub order: Vec<NodeId>,
}

impl Evaluation {
    pub fn value(&self, id: NodeId) -> Option<f64> {
        self.values.get(&id).copied()
    }

    pub fn failure(&self, id: NodeId) -> Option<DomainError> {
        self.failures.get(&id).copied()
    }

    /// Result of one node, `None` if it was not computed
    pub fn result(&self, id: NodeId) -> Option<Result<f64, DomainError>> {
        match (self.value(id), self.failure(id)) {
            (Some(v), _) => Some(Ok(v)),
            (None, Some(e)) => Some(Err(e)),
            (None, None) => None,
        }
    }

    /// Whether the node has a recorded result
    pub fn covers(&self, id: NodeId) -> bool {
        self.values.contains_key(&id) || self.failures.contains_key(&id)
    }

    /// Whether no node failed
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    fn record(&mut self, id: NodeId, result: Result<f64, DomainError>) {
        match result {
            Ok(v) => {
                self.values.insert(id, v);
            }
            Err(e) => {
                self.failures.insert(id, e);
            }
        }
    }
}

/// Result of a single [`Stepper::step`]
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutcome {
    /// Node computed by this step
    pub node: NodeId,
    /// Its value or failure
    pub result: Result<f64, DomainError>,
    /// Whether this was the last node of the order
    pub finished: bool,
}

// ── Evaluator ───────────────────────────────────────────────────────────────

/// Stateless evaluation entry points.
pub struct Evaluator;

impl Evaluator {
    /// Compute every node of the graph.
    pub fn evaluate_all(graph: &Graph) -> Evaluation {
        let order = Self::order_of(graph);
        let mut eval = Evaluation {
            order: order.clone(),
            ..Evaluation::default()
        };

        for id in order {
            let result = Self::evaluate_node(graph, id, &eval.values);
            eval.record(id, result);
        }
        eval
    }

    /// Recompute the dirty nodes and everything downstream of them.
    ///
    /// Nodes outside that set keep the result they had in `previous`; nodes
    /// `previous` never saw are computed as well. The outcome equals what
    /// [`Evaluator::evaluate_all`] would return for the current graph,
    /// provided every change since `previous` is covered by `dirty`.
    pub fn evaluate_dirty(
        graph: &Graph,
        previous: &Evaluation,
        dirty: &BTreeSet<NodeId>,
    ) -> Evaluation {
        let affected = graph.downstream_of(dirty.iter().copied());
        let order = Self::order_of(graph);
        let mut eval = Evaluation {
            order: order.clone(),
            ..Evaluation::default()
        };

        let mut recomputed = 0usize;
        for id in order {
            let result = if affected.contains(&id) || !previous.covers(id) {
                recomputed += 1;
                Self::evaluate_node(graph, id, &eval.values)
            } else {
                match previous.result(id) {
                    Some(r) => r,
                    None => Self::evaluate_node(graph, id, &eval.values),
                }
            };
            eval.record(id, result);
        }
        debug!("dirty evaluation recomputed {} of {} nodes", recomputed, eval.order.len());
        eval
    }

    /// Compute a single node from the values of the nodes feeding it.
    ///
    /// An empty input slot is reported before a missing upstream value.
    pub fn evaluate_node(
        graph: &Graph,
        id: NodeId,
        values: &BTreeMap<NodeId, f64>,
    ) -> Result<f64, DomainError> {
        let block = match graph.node(id) {
            Some(Node::Input(input)) => return Ok(input.value),
            Some(Node::Block(block)) => block,
            None => unreachable!("node {} vanished during evaluation", id),
        };

        if !block.is_fully_connected() {
            return Err(DomainError::UnconnectedInput);
        }

        let mut args = Vec::with_capacity(block.arity());
        for wire_id in block.input_wires().iter().flatten() {
            let source = graph
                .wire(*wire_id)
                .map(|w| w.source.node)
                .unwrap_or_else(|| unreachable!("block {} lists missing wire {}", id, wire_id));
            match values.get(&source) {
                Some(v) => args.push(*v),
                None => return Err(DomainError::UpstreamFailure),
            }
        }

        let kind = graph
            .registry()
            .kind_of(block.kind)
            .unwrap_or_else(|e| unreachable!("block {} has no kind: {}", id, e));

        let result = kind.transfer.apply(&args);
        match &result {
            Err(e) if e.is_numeric() => warn!("{} ({}) failed: {}", id, kind.name, e),
            _ => {}
        }
        result
    }

    /// Write an evaluation back into the graph: block caches, failures,
    /// wire values, and highlights on blocks whose own computation failed.
    pub fn apply(graph: &mut Graph, eval: &Evaluation) {
        for id in graph.node_ids() {
            Self::write_node(graph, id, &eval.values, eval.failure(id), false);
        }
    }

    /// Write one node's result into the graph.
    ///
    /// With `spotlight` set the block and its incoming wires are highlighted
    /// regardless of outcome, the way a single step is shown.
    pub(crate) fn write_node(
        graph: &mut Graph,
        id: NodeId,
        values: &BTreeMap<NodeId, f64>,
        failure: Option<DomainError>,
        spotlight: bool,
    ) {
        let incoming: Vec<(usize, _, Option<f64>)> = match graph.block(id) {
            Some(block) => block
                .input_wires()
                .iter()
                .enumerate()
                .filter_map(|(slot, w)| w.map(|w| (slot, w)))
                .map(|(slot, w)| {
                    let value = graph
                        .wire(w)
                        .and_then(|wire| values.get(&wire.source.node).copied());
                    (slot, w, value)
                })
                .collect(),
            None => return,
        };

        for (_, wire_id, value) in &incoming {
            if let Some(wire) = graph.wire_mut(*wire_id) {
                wire.value = *value;
                wire.highlighted = spotlight;
            }
        }

        if let Some(Node::Block(block)) = graph.node_mut(id) {
            block.reset_results();
            for (slot, _, value) in incoming {
                block.input_values[slot] = value;
            }
            block.output_value = values.get(&id).copied();
            block.last_error = failure;
            block.highlighted = spotlight || failure.is_some_and(|e| e.is_numeric());
        }
    }

    fn order_of(graph: &Graph) -> Vec<NodeId> {
        match GraphValidator::topological_order(graph) {
            Some(order) => order,
            None => unreachable!("graph contains a cycle; connections are checked on creation"),
        }
    }
}

// ── Stepper ─────────────────────────────────────────────────────────────────

/// Walks the evaluation order one node at a time.
///
/// The order is fixed when the stepper is created. The graph must not change
/// structurally while a stepper is in use; the editor drops its stepper on
/// every edit.
#[derive(Debug, Clone)]
pub struct Stepper {
    cursor: usize,
    partial: Evaluation,
}

impl Stepper {
    pub fn new(graph: &Graph) -> Self {
        Self {
            cursor: 0,
            partial: Evaluation {
                order: Evaluator::order_of(graph),
                ..Evaluation::default()
            },
        }
    }

    /// Compute the next node, `None` once every node has been computed.
    pub fn step(&mut self, graph: &Graph) -> Option<StepOutcome> {
        let node = *self.partial.order.get(self.cursor)?;
        let result = Evaluator::evaluate_node(graph, node, &self.partial.values);
        self.partial.record(node, result);
        self.cursor += 1;

        Some(StepOutcome {
            node,
            result,
            finished: self.is_finished(),
        })
    }

    pub fn is_finished(&self) -> bool {
        self.cursor >= self.partial.order.len()
    }

    /// Number of nodes computed so far
    pub fn position(&self) -> usize {
        self.cursor
    }

    /// Results gathered so far
    pub fn evaluation(&self) -> &Evaluation {
        &self.partial
    }

    pub fn into_evaluation(self) -> Evaluation {
        self.partial
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
