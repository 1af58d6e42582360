//! Block kinds and node instances
//!
//! A [`BlockKind`] is the immutable description of a computation (its port
//! signature and transfer function). A [`Block`] is one placed instance of a
//! kind, and an [`InputSource`] is a constant supplied by the user. Both are
//! stored in the graph as a [`Node`].

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::port::GENERAL;
use super::registry::KindId;
use super::{NodeId, WireId};
use crate::categories::BlockCategory;

/// Numeric failure local to a single node's evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, thiserror::Error)]
pub enum DomainError {
    /// Denominator was zero
    #[error("division by zero")]
    DivisionByZero,

    /// Logarithm argument was zero or negative
    #[error("logarithm of a non-positive number")]
    NonPositiveLog,

    /// Square root argument was negative
    #[error("square root of a negative number")]
    NegativeSqrt,

    /// At least one input slot has no wire attached
    #[error("input port is not connected")]
    UnconnectedInput,

    /// A node feeding this one produced no value
    #[error("upstream block produced no value")]
    UpstreamFailure,
}

impl DomainError {
    /// Whether the failure was raised by the block's own transfer function
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            DomainError::DivisionByZero | DomainError::NonPositiveLog | DomainError::NegativeSqrt
        )
    }
}

/// One-input transfer function
pub type UnaryFn = fn(f64) -> Result<f64, DomainError>;

/// Two-input transfer function
pub type BinaryFn = fn(f64, f64) -> Result<f64, DomainError>;

/// Pure transfer function of a block kind, tagged by arity
#[derive(Debug, Clone, Copy)]
pub enum Transfer {
    /// One input, one output
    Unary(UnaryFn),
    /// Two inputs, one output
    Binary(BinaryFn),
}

impl Transfer {
    /// Number of inputs the function consumes
    pub fn arity(&self) -> usize {
        match self {
            Transfer::Unary(_) => 1,
            Transfer::Binary(_) => 2,
        }
    }

    /// Apply the function to exactly `arity()` arguments
    pub fn apply(&self, args: &[f64]) -> Result<f64, DomainError> {
        match (self, args) {
            (Transfer::Unary(f), [x]) => f(*x),
            (Transfer::Binary(f), [a, b]) => f(*a, *b),
            _ => unreachable!("{}-ary transfer called with {} argument(s)", self.arity(), args.len()),
        }
    }
}

/// Immutable description of a block kind
#[derive(Debug, Clone)]
pub struct BlockKind {
    /// Unique kind name (e.g. "adder")
    pub name: String,
    /// Palette grouping
    pub category: BlockCategory,
    /// Type tag per input port, one entry per input
    pub input_types: Vec<String>,
    /// Type tag of the output port (always exactly one)
    pub output_types: Vec<String>,
    /// Numeric transfer function
    pub transfer: Transfer,
}

impl BlockKind {
    /// Kind whose ports all carry the [`GENERAL`] tag
    pub fn general(name: impl Into<String>, category: BlockCategory, transfer: Transfer) -> Self {
        Self {
            name: name.into(),
            category,
            input_types: vec![GENERAL.to_string(); transfer.arity()],
            output_types: vec![GENERAL.to_string()],
            transfer,
        }
    }

    /// Number of input ports
    pub fn arity(&self) -> usize {
        self.transfer.arity()
    }

    /// Tag of the `index`-th input port
    pub fn input_type(&self, index: usize) -> Option<&str> {
        self.input_types.get(index).map(String::as_str)
    }

    /// Tag of the output port
    pub fn output_type(&self) -> &str {
        self.output_types.first().map(String::as_str).unwrap_or(GENERAL)
    }
}

/// A placed block instance
#[derive(Debug, Clone)]
pub struct Block {
    /// Node identifier
    pub id: NodeId,
    /// Kind of the block, never changes
    pub kind: KindId,
    /// Value last seen on each input slot
    pub input_values: Vec<Option<f64>>,
    /// Value last produced on the output
    pub output_value: Option<f64>,
    /// Failure of the last evaluation, if any
    pub last_error: Option<DomainError>,
    /// Highlight flag for the presentation layer
    pub highlighted: bool,
    /// Opaque presentation data (position, ...)
    pub payload: JsonValue,
    input_wires: Vec<Option<WireId>>,
    output_wires: Vec<WireId>,
}

impl Block {
    /// Create a block with `arity` unset input slots
    pub fn new(id: NodeId, kind: KindId, arity: usize) -> Self {
        Self {
            id,
            kind,
            input_values: vec![None; arity],
            output_value: None,
            last_error: None,
            highlighted: false,
            payload: JsonValue::Null,
            input_wires: vec![None; arity],
            output_wires: Vec::new(),
        }
    }

    /// Number of input slots
    pub fn arity(&self) -> usize {
        self.input_wires.len()
    }

    /// Wire attached to the `index`-th input, if any
    pub fn input_wire(&self, index: usize) -> Option<WireId> {
        self.input_wires.get(index).copied().flatten()
    }

    /// Wires attached to each input slot
    pub fn input_wires(&self) -> &[Option<WireId>] {
        &self.input_wires
    }

    /// Wires leaving the output
    pub fn output_wires(&self) -> &[WireId] {
        &self.output_wires
    }

    /// Whether every input slot has a wire
    pub fn is_fully_connected(&self) -> bool {
        self.input_wires.iter().all(Option::is_some)
    }

    /// Forget the results of the last evaluation
    pub fn reset_results(&mut self) {
        self.input_values.iter_mut().for_each(|v| *v = None);
        self.output_value = None;
        self.last_error = None;
    }
}

/// A user-supplied constant with a single output
#[derive(Debug, Clone)]
pub struct InputSource {
    /// Node identifier
    pub id: NodeId,
    /// Current value
    pub value: f64,
    /// Opaque presentation data (position, ...)
    pub payload: JsonValue,
    output_wires: Vec<WireId>,
}

impl InputSource {
    /// Create an unwired input source
    pub fn new(id: NodeId, value: f64) -> Self {
        Self {
            id,
            value,
            payload: JsonValue::Null,
            output_wires: Vec::new(),
        }
    }

    /// Wires leaving the output
    pub fn output_wires(&self) -> &[WireId] {
        &self.output_wires
    }

    /// Whether the output connector is still free
    pub fn output_connector_available(&self) -> bool {
        self.output_wires.is_empty()
    }
}

/// Any node stored in the graph
#[derive(Debug, Clone)]
pub enum Node {
    /// Computation block
    Block(Block),
    /// Constant source
    Input(InputSource),
}

impl Node {
    /// Node identifier
    pub fn id(&self) -> NodeId {
        match self {
            Node::Block(b) => b.id,
            Node::Input(i) => i.id,
        }
    }

    /// Whether this node is an input source
    pub fn is_input(&self) -> bool {
        matches!(self, Node::Input(_))
    }

    pub fn as_block(&self) -> Option<&Block> {
        match self {
            Node::Block(b) => Some(b),
            Node::Input(_) => None,
        }
    }

    pub fn as_input(&self) -> Option<&InputSource> {
        match self {
            Node::Input(i) => Some(i),
            Node::Block(_) => None,
        }
    }

    /// Wires leaving the node's output
    pub fn output_wires(&self) -> &[WireId] {
        match self {
            Node::Block(b) => &b.output_wires,
            Node::Input(i) => &i.output_wires,
        }
    }

    /// Every wire attached to any port of the node, inputs first
    pub fn attached_wires(&self) -> Vec<WireId> {
        let mut wires: Vec<WireId> = match self {
            Node::Block(b) => b.input_wires.iter().flatten().copied().collect(),
            Node::Input(_) => Vec::new(),
        };
        wires.extend_from_slice(self.output_wires());
        wires
    }

    /// Opaque presentation data
    pub fn payload(&self) -> &JsonValue {
        match self {
            Node::Block(b) => &b.payload,
            Node::Input(i) => &i.payload,
        }
    }

    pub(crate) fn set_payload(&mut self, payload: JsonValue) {
        match self {
            Node::Block(b) => b.payload = payload,
            Node::Input(i) => i.payload = payload,
        }
    }

    /// Highlight state; input sources are never highlighted
    pub fn highlighted(&self) -> bool {
        match self {
            Node::Block(b) => b.highlighted,
            Node::Input(_) => false,
        }
    }

    pub(crate) fn attach_output(&mut self, wire: WireId) {
        match self {
            Node::Block(b) => b.output_wires.push(wire),
            Node::Input(i) => i.output_wires.push(wire),
        }
    }

    pub(crate) fn attach_input(&mut self, index: usize, wire: WireId) {
        if let Node::Block(b) = self {
            if let Some(slot) = b.input_wires.get_mut(index) {
                *slot = Some(wire);
            }
        }
    }

    /// Release every port the wire occupies on this node
    pub(crate) fn detach(&mut self, wire: WireId) {
        match self {
            Node::Block(b) => {
                for (slot, value) in b.input_wires.iter_mut().zip(b.input_values.iter_mut()) {
                    if *slot == Some(wire) {
                        *slot = None;
                        *value = None;
                    }
                }
                b.output_wires.retain(|w| *w != wire);
            }
            Node::Input(i) => i.output_wires.retain(|w| *w != wire),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn halve(x: f64) -> Result<f64, DomainError> {
        Ok(x / 2.0)
    }

    fn sum(a: f64, b: f64) -> Result<f64, DomainError> {
        Ok(a + b)
    }

    #[test]
    fn test_transfer_arity_and_apply() {
        let unary = Transfer::Unary(halve);
        let binary = Transfer::Binary(sum);

        assert_eq!(unary.arity(), 1);
        assert_eq!(binary.arity(), 2);
        assert_eq!(unary.apply(&[8.0]), Ok(4.0));
        assert_eq!(binary.apply(&[2.0, 3.5]), Ok(5.5));
    }

    #[test]
    #[should_panic(expected = "2-ary transfer called with 1 argument(s)")]
    fn test_transfer_with_wrong_arity_panics() {
        let _ = Transfer::Binary(sum).apply(&[1.0]);
    }

    #[test]
    fn test_general_kind_signature() {
        let kind = BlockKind::general("sum", BlockCategory::Arithmetic, Transfer::Binary(sum));
        assert_eq!(kind.arity(), 2);
        assert_eq!(kind.input_type(0), Some(GENERAL));
        assert_eq!(kind.input_type(2), None);
        assert_eq!(kind.output_type(), GENERAL);
    }

    #[test]
    fn test_block_attach_and_detach() {
        let mut node = Node::Block(Block::new(NodeId(1), KindId(0), 2));
        node.attach_input(1, WireId(7));
        node.attach_output(WireId(8));

        let block = node.as_block().unwrap();
        assert_eq!(block.input_wire(0), None);
        assert_eq!(block.input_wire(1), Some(WireId(7)));
        assert!(!block.is_fully_connected());
        assert_eq!(node.attached_wires(), vec![WireId(7), WireId(8)]);

        node.detach(WireId(7));
        node.detach(WireId(8));
        assert!(node.attached_wires().is_empty());
    }

    #[test]
    fn test_input_source_availability() {
        let mut node = Node::Input(InputSource::new(NodeId(2), 1.5));
        assert!(node.as_input().unwrap().output_connector_available());

        node.attach_output(WireId(3));
        assert!(!node.as_input().unwrap().output_connector_available());
        assert!(!node.highlighted());
    }

    #[test]
    fn test_domain_error_classification() {
        assert!(DomainError::DivisionByZero.is_numeric());
        assert!(DomainError::NegativeSqrt.is_numeric());
        assert!(!DomainError::UpstreamFailure.is_numeric());
        assert!(!DomainError::UnconnectedInput.is_numeric());
    }
}
