//! Editor runtime
//!
//! This module ties the graph model, the evaluation engine and persistence
//! together behind [`Editor`], the synchronous surface a front end drives.

pub mod config;
pub mod engine;
pub mod graph;
pub mod snapshot;
pub mod validation;

use log::{debug, info};
use serde_json::Value as JsonValue;
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use crate::core::block::{BlockKind, DomainError};
use crate::core::port::{PortId, Wire};
use crate::core::registry::{BlockRegistry, KindId, RegistryError};
use crate::core::{NodeId, WireId};

pub use config::{ConfigError, EditorConfig};
pub use engine::{Evaluation, Evaluator, StepOutcome, Stepper};
pub use graph::{Graph, GraphError};
pub use snapshot::{PersistError, Snapshot};
pub use validation::{GraphValidationResult, GraphValidator};

// ── Notifications ───────────────────────────────────────────────────────────

/// Answer to a connection request
#[derive(Debug, Clone, PartialEq)]
pub enum WireOutcome {
    /// The wire exists now
    Created(WireId),
    /// Nothing changed; the front end should drop its provisional wire
    Rejected(GraphError),
}

impl WireOutcome {
    pub fn wire_id(&self) -> Option<WireId> {
        match self {
            WireOutcome::Created(id) => Some(*id),
            WireOutcome::Rejected(_) => None,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, WireOutcome::Created(_))
    }
}

/// Display state of one node after a run
#[derive(Debug, Clone, PartialEq)]
pub struct NodeUpdate {
    pub id: NodeId,
    pub value: Option<f64>,
    pub failure: Option<DomainError>,
    pub highlighted: bool,
}

/// Display state of one wire after a run
#[derive(Debug, Clone, PartialEq)]
pub struct WireUpdate {
    pub id: WireId,
    pub value: Option<f64>,
    pub highlighted: bool,
}

/// Everything a front end needs to redraw after a run
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    /// One entry per node, in evaluation order
    pub nodes: Vec<NodeUpdate>,
    /// One entry per wire, in id order
    pub wires: Vec<WireUpdate>,
    pub evaluation: Evaluation,
}

impl RunReport {
    fn collect(graph: &Graph, evaluation: Evaluation) -> Self {
        let nodes = evaluation
            .order
            .iter()
            .map(|&id| NodeUpdate {
                id,
                value: evaluation.value(id),
                failure: evaluation.failure(id),
                highlighted: graph.node(id).is_some_and(|n| n.highlighted()),
            })
            .collect();

        let wires = graph
            .wires()
            .map(|w| WireUpdate {
                id: w.id,
                value: w.value,
                highlighted: w.highlighted,
            })
            .collect();

        Self {
            nodes,
            wires,
            evaluation,
        }
    }

    pub fn node(&self, id: NodeId) -> Option<&NodeUpdate> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn wire(&self, id: WireId) -> Option<&WireUpdate> {
        self.wires.iter().find(|w| w.id == id)
    }
}

// ── Editor ──────────────────────────────────────────────────────────────────

/// Block diagram editor session.
///
/// Owns the graph and remembers which nodes changed since the last run, so
/// [`Editor::run_dirty`] can skip everything an edit cannot influence.
pub struct Editor {
    graph: Graph,
    config: EditorConfig,
    last_evaluation: Option<Evaluation>,
    dirty: BTreeSet<NodeId>,
    stepper: Option<Stepper>,
    last_report: Option<RunReport>,
}

impl Editor {
    /// Create an editor offering the built-in block kinds
    ///
    /// # Example
    /// ```
    /// use block_editor::core::port::PortId;
    /// use block_editor::runtime::{Editor, EditorConfig};
    ///
    /// let mut editor = Editor::new(EditorConfig::default());
    /// let a = editor.create_input(6.0);
    /// let b = editor.create_input(3.0);
    /// let div = editor.create_block(editor.kind_id("divider").unwrap()).unwrap();
    /// editor.create_wire(PortId::output(a), PortId::input(div, 0));
    /// editor.create_wire(PortId::output(b), PortId::input(div, 1));
    ///
    /// let report = editor.run();
    /// assert_eq!(report.evaluation.value(div), Some(2.0));
    /// ```
    pub fn new(config: EditorConfig) -> Self {
        Self::with_registry(BlockRegistry::builtin(), config)
    }

    /// Create an editor over a custom registry
    pub fn with_registry(registry: BlockRegistry, config: EditorConfig) -> Self {
        let graph = Graph::new(Arc::new(registry), config.build_port_types())
            .with_output_fanout(config.allow_output_fanout);
        Self {
            graph,
            config,
            last_evaluation: None,
            dirty: BTreeSet::new(),
            stepper: None,
            last_report: None,
        }
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    /// Report of the most recent run, including runs triggered by edits
    pub fn last_report(&self) -> Option<&RunReport> {
        self.last_report.as_ref()
    }

    pub fn last_evaluation(&self) -> Option<&Evaluation> {
        self.last_evaluation.as_ref()
    }

    /// Nodes changed since the last completed run
    pub fn dirty_nodes(&self) -> &BTreeSet<NodeId> {
        &self.dirty
    }

    // ── Palette ─────────────────────────────────────────────────────────

    /// Block kinds in palette order
    pub fn block_kinds(&self) -> impl Iterator<Item = (KindId, &BlockKind)> {
        self.graph.registry().kinds()
    }

    pub fn kind_id(&self, name: &str) -> Result<KindId, RegistryError> {
        self.graph.registry().kind_id_by_name(name)
    }

    pub fn add_port_type(&mut self, tag: impl Into<String>) -> bool {
        self.graph.port_types().add_type(tag)
    }

    /// Unregister a tag; existing wires that carry it stay in place
    pub fn remove_port_type(&mut self, tag: &str) -> bool {
        self.graph.port_types().remove_type(tag)
    }

    pub fn port_types(&self) -> Vec<String> {
        self.graph.port_types().types()
    }

    // ── Edits ───────────────────────────────────────────────────────────

    pub fn create_block(&mut self, kind: KindId) -> Result<NodeId, GraphError> {
        let id = self.graph.create_block(kind)?;
        self.touched([id]);
        Ok(id)
    }

    pub fn create_input(&mut self, value: f64) -> NodeId {
        let id = self.graph.create_input(value);
        self.touched([id]);
        id
    }

    /// Delete a node and its wires; returns the removed wire ids
    pub fn delete_node(&mut self, id: NodeId) -> Result<Vec<WireId>, GraphError> {
        let consumers: Vec<NodeId> = self.graph.successors(id).collect();
        let removed = self.graph.delete_node(id)?;
        self.dirty.remove(&id);
        self.touched(consumers);
        Ok(removed)
    }

    pub fn create_wire(&mut self, source: PortId, target: PortId) -> WireOutcome {
        match self.graph.create_wire(source, target) {
            Ok(id) => {
                self.touched([target.node]);
                WireOutcome::Created(id)
            }
            Err(e) => WireOutcome::Rejected(e),
        }
    }

    pub fn delete_wire(&mut self, id: WireId) -> Result<Wire, GraphError> {
        let wire = self.graph.delete_wire(id)?;
        self.touched([wire.target.node]);
        Ok(wire)
    }

    pub fn set_input_value(&mut self, id: NodeId, value: f64) -> Result<(), GraphError> {
        self.graph.set_input_value(id, value)?;
        self.touched([id]);
        Ok(())
    }

    /// Attach presentation data; never affects evaluation
    pub fn set_payload(&mut self, id: NodeId, payload: JsonValue) -> Result<(), GraphError> {
        self.graph.set_payload(id, payload)
    }

    /// Remove every node and wire; ids keep counting from where they were
    pub fn clear(&mut self) {
        self.graph.clear();
        self.last_evaluation = None;
        self.last_report = None;
        self.dirty.clear();
        self.stepper = None;
    }

    pub fn clear_highlights(&mut self) {
        self.graph.clear_highlights();
    }

    fn touched(&mut self, nodes: impl IntoIterator<Item = NodeId>) {
        self.dirty.extend(nodes);
        if self.stepper.take().is_some() {
            debug!("edit interrupted a step run");
            self.graph.clear_highlights();
        }
        if self.config.evaluate_on_edit {
            self.run_dirty();
        }
    }

    // ── Evaluation ──────────────────────────────────────────────────────

    /// Evaluate the whole graph and write the results into it
    pub fn run(&mut self) -> RunReport {
        let evaluation = Evaluator::evaluate_all(&self.graph);
        self.finish_run(evaluation)
    }

    /// Re-evaluate only what changed since the last run.
    ///
    /// Falls back to a full run when nothing has been evaluated yet.
    pub fn run_dirty(&mut self) -> RunReport {
        let evaluation = match &self.last_evaluation {
            Some(previous) => Evaluator::evaluate_dirty(&self.graph, previous, &self.dirty),
            None => Evaluator::evaluate_all(&self.graph),
        };
        self.finish_run(evaluation)
    }

    fn finish_run(&mut self, evaluation: Evaluation) -> RunReport {
        self.stepper = None;
        self.graph.clear_highlights();
        Evaluator::apply(&mut self.graph, &evaluation);

        info!(
            "evaluated {} node(s): {} value(s), {} failure(s)",
            evaluation.order.len(),
            evaluation.values.len(),
            evaluation.failures.len()
        );

        let report = RunReport::collect(&self.graph, evaluation.clone());
        self.last_evaluation = Some(evaluation);
        self.dirty.clear();
        self.last_report = Some(report.clone());
        report
    }

    /// Compute the next node of a step-by-step run.
    ///
    /// The first call starts a run; the computed block and its incoming
    /// wires are highlighted. Once the last node is computed the run counts
    /// as a full evaluation and the next call starts over.
    pub fn step(&mut self) -> Option<StepOutcome> {
        let mut stepper = match self.stepper.take() {
            Some(stepper) => stepper,
            None => Stepper::new(&self.graph),
        };

        let outcome = stepper.step(&self.graph)?;
        self.graph.clear_highlights();
        Evaluator::write_node(
            &mut self.graph,
            outcome.node,
            &stepper.evaluation().values,
            outcome.result.err(),
            true,
        );
        debug!("step {}: {} -> {:?}", stepper.position(), outcome.node, outcome.result);

        if outcome.finished {
            let evaluation = stepper.into_evaluation();
            info!("step run finished after {} node(s)", evaluation.order.len());
            self.last_evaluation = Some(evaluation);
            self.dirty.clear();
        } else {
            self.stepper = Some(stepper);
        }
        Some(outcome)
    }

    /// Abandon a step run and drop its highlights
    pub fn reset_stepping(&mut self) {
        self.stepper = None;
        self.graph.clear_highlights();
    }

    pub fn is_stepping(&self) -> bool {
        self.stepper.is_some()
    }

    // ── Validation & persistence ────────────────────────────────────────

    pub fn validate(&self) -> GraphValidationResult {
        GraphValidator::validate(&self.graph)
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot::capture(&self.graph)
    }

    /// Replace the current graph with the snapshot's.
    ///
    /// On failure the current graph is left exactly as it was.
    pub fn restore_snapshot(&mut self, snapshot: &Snapshot) -> Result<(), PersistError> {
        let graph = snapshot.restore(&self.graph)?;
        info!(
            "restored {} node(s) and {} wire(s)",
            graph.node_count(),
            graph.wire_count()
        );
        self.graph = graph;
        self.last_evaluation = None;
        self.last_report = None;
        self.stepper = None;
        self.dirty = self.graph.node_ids().into_iter().collect();
        if self.config.evaluate_on_edit {
            self.run();
        }
        Ok(())
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), PersistError> {
        self.snapshot().save(path)
    }

    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<(), PersistError> {
        let snapshot = Snapshot::load(path)?;
        self.restore_snapshot(&snapshot)
    }
}

impl Default for Editor {
    fn default() -> Self {
        Self::new(EditorConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain(editor: &mut Editor) -> (NodeId, NodeId, NodeId) {
        let a = editor.create_input(4.0);
        let root = editor.create_block(editor.kind_id("sqrt").unwrap()).unwrap();
        let neg = editor.create_block(editor.kind_id("neg").unwrap()).unwrap();
        editor.create_wire(PortId::output(a), PortId::input(root, 0));
        editor.create_wire(PortId::output(root), PortId::input(neg, 0));
        (a, root, neg)
    }

    #[test]
    fn test_edits_mark_nodes_dirty() {
        let mut editor = Editor::default();
        let (a, root, neg) = chain(&mut editor);
        assert_eq!(
            editor.dirty_nodes().iter().copied().collect::<Vec<_>>(),
            vec![a, root, neg]
        );

        editor.run();
        assert!(editor.dirty_nodes().is_empty());

        editor.set_input_value(a, 9.0).unwrap();
        assert!(editor.dirty_nodes().contains(&a));

        let report = editor.run_dirty();
        assert_eq!(report.evaluation.value(neg), Some(-3.0));
    }

    #[test]
    fn test_delete_node_marks_consumers_dirty() {
        let mut editor = Editor::default();
        let (_, root, neg) = chain(&mut editor);
        editor.run();

        let removed = editor.delete_node(root).unwrap();
        assert_eq!(removed.len(), 2);
        assert!(editor.dirty_nodes().contains(&neg));

        let report = editor.run_dirty();
        assert_eq!(
            report.evaluation.failure(neg),
            Some(DomainError::UnconnectedInput)
        );
    }

    #[test]
    fn test_rejected_wire_leaves_state_alone() {
        let mut editor = Editor::default();
        let (a, root, _) = chain(&mut editor);
        editor.run();

        let outcome = editor.create_wire(PortId::output(a), PortId::input(root, 0));
        assert!(matches!(
            outcome,
            WireOutcome::Rejected(GraphError::PortAlreadyConnected(_))
        ));
        assert!(editor.dirty_nodes().is_empty());
    }

    #[test]
    fn test_step_highlights_current_block() {
        let mut editor = Editor::default();
        let (a, root, neg) = chain(&mut editor);

        let first = editor.step().unwrap();
        assert_eq!(first.node, a);
        assert!(editor.is_stepping());

        let second = editor.step().unwrap();
        assert_eq!(second.node, root);
        assert!(editor.graph().block(root).unwrap().highlighted);
        let incoming = editor.graph().block(root).unwrap().input_wire(0).unwrap();
        assert!(editor.graph().wire(incoming).unwrap().highlighted);
        assert_eq!(editor.graph().wire(incoming).unwrap().value, Some(4.0));

        let third = editor.step().unwrap();
        assert_eq!(third.node, neg);
        assert!(third.finished);
        assert!(!editor.graph().block(root).unwrap().highlighted);
        assert!(!editor.is_stepping());
        assert_eq!(editor.last_evaluation().unwrap().value(neg), Some(-2.0));
    }

    #[test]
    fn test_edit_interrupts_stepping() {
        let mut editor = Editor::default();
        let (a, root, _) = chain(&mut editor);
        editor.step();
        editor.step();
        assert!(editor.graph().block(root).unwrap().highlighted);

        editor.set_input_value(a, 1.0).unwrap();
        assert!(!editor.is_stepping());
        assert!(!editor.graph().block(root).unwrap().highlighted);

        // a fresh run starts from the first node again
        assert_eq!(editor.step().unwrap().node, a);
        editor.reset_stepping();
        assert!(!editor.is_stepping());
    }

    #[test]
    fn test_evaluate_on_edit() {
        let config = EditorConfig {
            evaluate_on_edit: true,
            ..EditorConfig::default()
        };
        let mut editor = Editor::new(config);
        let (a, _, neg) = chain(&mut editor);
        assert_eq!(
            editor.last_report().unwrap().evaluation.value(neg),
            Some(-2.0)
        );

        editor.set_input_value(a, 16.0).unwrap();
        assert_eq!(editor.last_report().unwrap().node(neg).unwrap().value, Some(-4.0));
    }

    #[test]
    fn test_clear_keeps_counting() {
        let mut editor = Editor::default();
        chain(&mut editor);
        editor.run();
        editor.clear();

        assert_eq!(editor.graph().node_count(), 0);
        assert!(editor.last_evaluation().is_none());
        assert_eq!(editor.create_input(1.0), NodeId(5));
    }
}
