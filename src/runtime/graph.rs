//! Graph model
//!
//! Owns every block, input source and wire, keyed by integer id. Each
//! mutating operation either fully succeeds or leaves the graph untouched:
//! requests are validated before anything is written.

use log::{debug, warn};
use serde_json::Value as JsonValue;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::Arc;

use crate::core::block::{Block, InputSource, Node};
use crate::core::port::{PortId, PortTypes, Wire, GENERAL, OUTPUT_PORT};
use crate::core::registry::{BlockRegistry, KindId, RESERVED_INPUT_NAME};
use crate::core::{IdAllocator, NodeId, WireId};

use super::validation::GraphValidator;

/// Structural errors raised by graph edits
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GraphError {
    /// No node or wire with this id
    #[error("Unknown id: {0}")]
    UnknownId(u64),

    /// Kind id is not in the registry
    #[error("Unknown block kind: {0}")]
    UnknownKind(KindId),

    /// Node exists but has no such port
    #[error("Port {0} does not exist")]
    UnknownPort(PortId),

    /// Output used as a target, input used as a source, or an input
    /// source addressed as a target
    #[error("Port {0} cannot be used on this side of a wire")]
    InvalidPortRole(PortId),

    /// Port already has a wire attached
    #[error("Port {0} is already connected")]
    PortAlreadyConnected(PortId),

    /// Port tags differ
    #[error("Port type mismatch: '{source_type}' cannot feed '{target_type}'")]
    PortTypeMismatch {
        source_type: String,
        target_type: String,
    },

    /// Port tag is not (or no longer) registered
    #[error("Port type '{0}' is not registered")]
    UnknownPortType(String),

    /// The wire would close a cycle
    #[error("Connecting {from} to {to} would create a cycle")]
    CycleDetected { from: NodeId, to: NodeId },

    /// Restored id is too large for the id counter to continue after it
    #[error("Id {0} is outside the usable id range")]
    IdSpaceExhausted(u64),

    /// Value can only be set on input sources
    #[error("Node {0} is not an input source")]
    NotAnInputSource(NodeId),

    /// Restored id collides with an existing node or wire
    #[error("Duplicate id: {0}")]
    DuplicateId(u64),
}

/// Block diagram: nodes, wires and the id counter
#[derive(Debug, Clone)]
pub struct Graph {
    registry: Arc<BlockRegistry>,
    port_types: PortTypes,
    allow_output_fanout: bool,
    ids: IdAllocator,
    nodes: BTreeMap<NodeId, Node>,
    wires: BTreeMap<WireId, Wire>,
}

impl Graph {
    /// Create an empty graph over a registry and a port type set
    pub fn new(registry: Arc<BlockRegistry>, port_types: PortTypes) -> Self {
        Self {
            registry,
            port_types,
            allow_output_fanout: false,
            ids: IdAllocator::new(),
            nodes: BTreeMap::new(),
            wires: BTreeMap::new(),
        }
    }

    /// Allow one output port to drive several inputs
    pub fn with_output_fanout(mut self, allow: bool) -> Self {
        self.allow_output_fanout = allow;
        self
    }

    /// Empty graph sharing this graph's registry, port types, options and
    /// id counter
    pub fn empty_like(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            port_types: self.port_types.clone(),
            allow_output_fanout: self.allow_output_fanout,
            ids: self.ids.clone(),
            nodes: BTreeMap::new(),
            wires: BTreeMap::new(),
        }
    }

    pub fn registry(&self) -> &BlockRegistry {
        &self.registry
    }

    pub fn shared_registry(&self) -> Arc<BlockRegistry> {
        Arc::clone(&self.registry)
    }

    pub fn port_types(&self) -> &PortTypes {
        &self.port_types
    }

    pub fn allows_output_fanout(&self) -> bool {
        self.allow_output_fanout
    }

    /// The id the next created node or wire will receive
    pub fn next_id(&self) -> u64 {
        self.ids.peek()
    }

    // ── Mutations ───────────────────────────────────────────────────────

    /// Place a new block of the given kind
    pub fn create_block(&mut self, kind: KindId) -> Result<NodeId, GraphError> {
        let arity = self
            .registry
            .kind_of(kind)
            .map_err(|_| GraphError::UnknownKind(kind))?
            .arity();

        let id = self.ids.next_node();
        self.nodes.insert(id, Node::Block(Block::new(id, kind, arity)));
        debug!("created block {} ({})", id, self.registry.name_of(kind).unwrap_or("?"));
        Ok(id)
    }

    /// Place a new input source
    pub fn create_input(&mut self, value: f64) -> NodeId {
        let id = self.ids.next_node();
        self.nodes.insert(id, Node::Input(InputSource::new(id, value)));
        debug!("created input {} = {}", id, value);
        id
    }

    /// Remove a node together with every wire attached to it.
    ///
    /// Returns the ids of the removed wires, inputs first.
    pub fn delete_node(&mut self, id: NodeId) -> Result<Vec<WireId>, GraphError> {
        let attached = self
            .nodes
            .get(&id)
            .ok_or(GraphError::UnknownId(id.0))?
            .attached_wires();

        let mut removed = Vec::with_capacity(attached.len());
        for wire_id in attached {
            if self.remove_wire(wire_id).is_some() {
                removed.push(wire_id);
            }
        }
        self.nodes.remove(&id);
        debug!("deleted node {} and {} wire(s)", id, removed.len());
        Ok(removed)
    }

    /// Connect an output port to a block input port.
    ///
    /// Checks, in order: ports exist with the right roles, both ports are
    /// free, tags match and are registered, no cycle would be formed.
    pub fn create_wire(&mut self, source: PortId, target: PortId) -> Result<WireId, GraphError> {
        let check = GraphValidator::check_connection(self, source, target).map_err(|e| {
            warn!("rejected wire from {} to {}: {}", source, target, e);
            e
        })?;
        let id = self.ids.next_wire();
        self.insert_wire(Wire::new(id, source, check.source_is_input, target));
        debug!("created wire {} from {} to {}", id, source, target);
        Ok(id)
    }

    /// Remove one wire and free both of its ports
    pub fn delete_wire(&mut self, id: WireId) -> Result<Wire, GraphError> {
        let wire = self.remove_wire(id).ok_or(GraphError::UnknownId(id.0))?;
        debug!("deleted wire {}", id);
        Ok(wire)
    }

    /// Change the value of an input source; does not evaluate anything
    pub fn set_input_value(&mut self, id: NodeId, value: f64) -> Result<(), GraphError> {
        match self.nodes.get_mut(&id) {
            Some(Node::Input(input)) => {
                input.value = value;
                Ok(())
            }
            Some(Node::Block(_)) => Err(GraphError::NotAnInputSource(id)),
            None => Err(GraphError::UnknownId(id.0)),
        }
    }

    /// Attach opaque presentation data to a node
    pub fn set_payload(&mut self, id: NodeId, payload: JsonValue) -> Result<(), GraphError> {
        let node = self.nodes.get_mut(&id).ok_or(GraphError::UnknownId(id.0))?;
        node.set_payload(payload);
        Ok(())
    }

    /// Remove every node and wire; the id counter keeps running
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.wires.clear();
    }

    /// Reset every block and wire highlight
    pub fn clear_highlights(&mut self) {
        for node in self.nodes.values_mut() {
            if let Node::Block(b) = node {
                b.highlighted = false;
            }
        }
        for wire in self.wires.values_mut() {
            wire.highlighted = false;
        }
    }

    // ── Restore (ids supplied by the caller) ────────────────────────────

    pub(crate) fn restore_block(&mut self, id: NodeId, kind: KindId) -> Result<(), GraphError> {
        self.claim_id(id.0)?;
        let arity = self
            .registry
            .kind_of(kind)
            .map_err(|_| GraphError::UnknownKind(kind))?
            .arity();
        self.nodes.insert(id, Node::Block(Block::new(id, kind, arity)));
        Ok(())
    }

    pub(crate) fn restore_input(&mut self, id: NodeId, value: f64) -> Result<(), GraphError> {
        self.claim_id(id.0)?;
        self.nodes.insert(id, Node::Input(InputSource::new(id, value)));
        Ok(())
    }

    pub(crate) fn restore_wire(
        &mut self,
        id: WireId,
        source: PortId,
        target: PortId,
    ) -> Result<(), GraphError> {
        self.claim_id(id.0)?;
        let check = GraphValidator::check_connection(self, source, target)?;
        self.insert_wire(Wire::new(id, source, check.source_is_input, target));
        Ok(())
    }

    fn ensure_unused(&self, id: u64) -> Result<(), GraphError> {
        if self.nodes.contains_key(&NodeId(id)) || self.wires.contains_key(&WireId(id)) {
            return Err(GraphError::DuplicateId(id));
        }
        Ok(())
    }

    /// Reserve a caller-supplied id: unused, and low enough that the
    /// counter can resume after it
    fn claim_id(&mut self, id: u64) -> Result<(), GraphError> {
        self.ensure_unused(id)?;
        if !self.ids.resume_after(id) {
            return Err(GraphError::IdSpaceExhausted(id));
        }
        Ok(())
    }

    fn insert_wire(&mut self, wire: Wire) {
        if let Some(node) = self.nodes.get_mut(&wire.source.node) {
            node.attach_output(wire.id);
        }
        if let (Some(node), Some(index)) = (
            self.nodes.get_mut(&wire.target.node),
            wire.target.input_index(),
        ) {
            node.attach_input(index, wire.id);
        }
        self.wires.insert(wire.id, wire);
    }

    fn remove_wire(&mut self, id: WireId) -> Option<Wire> {
        let wire = self.wires.remove(&id)?;
        for node_id in [wire.source.node, wire.target.node] {
            if let Some(node) = self.nodes.get_mut(&node_id) {
                node.detach(id);
            }
        }
        Some(wire)
    }

    // ── Queries ─────────────────────────────────────────────────────────

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&id)
    }

    pub fn block(&self, id: NodeId) -> Option<&Block> {
        self.nodes.get(&id).and_then(Node::as_block)
    }

    pub fn input(&self, id: NodeId) -> Option<&InputSource> {
        self.nodes.get(&id).and_then(Node::as_input)
    }

    pub fn wire(&self, id: WireId) -> Option<&Wire> {
        self.wires.get(&id)
    }

    pub(crate) fn wire_mut(&mut self, id: WireId) -> Option<&mut Wire> {
        self.wires.get_mut(&id)
    }

    /// All nodes in ascending id order
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// All wires in ascending id order
    pub fn wires(&self) -> impl Iterator<Item = &Wire> {
        self.wires.values()
    }

    pub fn node_ids(&self) -> Vec<NodeId> {
        self.nodes.keys().copied().collect()
    }

    pub fn wire_ids(&self) -> Vec<WireId> {
        self.wires.keys().copied().collect()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn wire_count(&self) -> usize {
        self.wires.len()
    }

    pub fn contains_node(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Kind name of a block, or `"input"` for an input source
    pub fn node_label(&self, id: NodeId) -> Option<&str> {
        match self.nodes.get(&id)? {
            Node::Block(b) => self.registry.name_of(b.kind).ok(),
            Node::Input(_) => Some(RESERVED_INPUT_NAME),
        }
    }

    /// Type tag of a port, validating that the port exists and may be
    /// addressed at all
    pub fn port_type(&self, port: PortId) -> Result<&str, GraphError> {
        let node = self
            .nodes
            .get(&port.node)
            .ok_or(GraphError::UnknownId(port.node.0))?;

        match (node, port.input_index()) {
            (_, None) if port.port != OUTPUT_PORT => Err(GraphError::UnknownPort(port)),
            (Node::Input(_), None) => Ok(GENERAL),
            (Node::Input(_), Some(_)) => Err(GraphError::InvalidPortRole(port)),
            (Node::Block(b), None) => Ok(self.kind_output_type(b)),
            (Node::Block(b), Some(index)) => self
                .registry
                .kind_of(b.kind)
                .ok()
                .and_then(|k| k.input_type(index))
                .ok_or(GraphError::UnknownPort(port)),
        }
    }

    fn kind_output_type(&self, block: &Block) -> &str {
        self.registry
            .kind_of(block.kind)
            .map(|k| k.output_type())
            .unwrap_or(GENERAL)
    }

    /// Whether another wire may attach to the port
    pub fn is_port_free(&self, port: PortId) -> Result<bool, GraphError> {
        self.port_type(port)?;
        let node = self
            .nodes
            .get(&port.node)
            .ok_or(GraphError::UnknownId(port.node.0))?;

        let free = match port.input_index() {
            Some(index) => node
                .as_block()
                .map(|b| b.input_wire(index).is_none())
                .unwrap_or(false),
            None => self.allow_output_fanout || node.output_wires().is_empty(),
        };
        Ok(free)
    }

    /// Wires attached to any port of a node
    pub fn wires_of(&self, id: NodeId) -> Vec<WireId> {
        self.nodes
            .get(&id)
            .map(Node::attached_wires)
            .unwrap_or_default()
    }

    /// Nodes fed directly by the node's output
    pub fn successors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes
            .get(&id)
            .map(Node::output_wires)
            .unwrap_or_default()
            .iter()
            .filter_map(|w| self.wires.get(w))
            .map(|w| w.target.node)
    }

    /// Every node reachable from the seeds, seeds included
    pub fn downstream_of(&self, seeds: impl IntoIterator<Item = NodeId>) -> BTreeSet<NodeId> {
        let mut reached = BTreeSet::new();
        let mut queue: VecDeque<NodeId> = seeds
            .into_iter()
            .filter(|id| self.nodes.contains_key(id))
            .collect();

        while let Some(id) = queue.pop_front() {
            if !reached.insert(id) {
                continue;
            }
            queue.extend(self.successors(id));
        }
        reached
    }
}
