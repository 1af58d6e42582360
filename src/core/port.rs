//! Port system for block connections
//!
//! This module defines how ports are addressed, the runtime-extensible set of
//! port type tags that gates connections, and the wires that join an output
//! port to an input port.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use super::{NodeId, WireId};

/// Default tag carried by every built-in port and every input source output
pub const GENERAL: &str = "general";

/// Port index of the single output of every node
pub const OUTPUT_PORT: i32 = -1;

/// Address of a port: the owning node plus a port index.
///
/// Non-negative indices name input ports, [`OUTPUT_PORT`] names the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PortId {
    /// Owning node
    pub node: NodeId,
    /// Port index (input index, or negative for the output)
    pub port: i32,
}

impl PortId {
    /// Address the `index`-th input of `node`
    pub fn input(node: NodeId, index: usize) -> Self {
        Self {
            node,
            // no kind has this many inputs, so an oversized index stays unknown
            port: i32::try_from(index).unwrap_or(i32::MAX),
        }
    }

    /// Address the output of `node`
    pub fn output(node: NodeId) -> Self {
        Self {
            node,
            port: OUTPUT_PORT,
        }
    }

    /// Which side of the node this port sits on
    pub fn direction(&self) -> PortDirection {
        if self.port < 0 {
            PortDirection::Output
        } else {
            PortDirection::Input
        }
    }

    /// Input slot index, or `None` for output ports
    pub fn input_index(&self) -> Option<usize> {
        usize::try_from(self.port).ok()
    }
}

impl fmt::Display for PortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.input_index() {
            Some(index) => write!(f, "{}.in{}", self.node, index),
            None => write!(f, "{}.out", self.node),
        }
    }
}

/// Port direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PortDirection {
    /// Input port
    Input,
    /// Output port
    Output,
}

/// Set of port type tags known to the editor.
///
/// The set is advisory: it is consulted when a wire is created and never
/// re-checked against wires that already exist. Clones share the same set,
/// so the editor palette and the graph always agree on it.
#[derive(Clone)]
pub struct PortTypes {
    tags: Arc<RwLock<BTreeSet<String>>>,
}

impl PortTypes {
    /// Create a set holding only [`GENERAL`]
    pub fn new() -> Self {
        Self::from_tags([GENERAL])
    }

    /// Create a set from the given tags, [`GENERAL`] is always added
    pub fn from_tags<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut set: BTreeSet<String> = tags.into_iter().map(Into::into).collect();
        set.insert(GENERAL.to_string());
        Self {
            tags: Arc::new(RwLock::new(set)),
        }
    }

    /// Check whether a tag is registered
    pub fn type_exists(&self, tag: &str) -> bool {
        self.tags.read().contains(tag)
    }

    /// Register a tag, returns `false` if it was already present
    pub fn add_type(&self, tag: impl Into<String>) -> bool {
        self.tags.write().insert(tag.into())
    }

    /// Unregister a tag, returns `false` if it was not present.
    ///
    /// Wires already carrying the tag stay in place; only future
    /// connections of that tag are refused.
    pub fn remove_type(&self, tag: &str) -> bool {
        self.tags.write().remove(tag)
    }

    /// All registered tags in sorted order
    pub fn types(&self) -> Vec<String> {
        self.tags.read().iter().cloned().collect()
    }

    /// Two ports may be joined iff their tags are identical
    pub fn compatible(source: &str, target: &str) -> bool {
        source == target
    }
}

impl Default for PortTypes {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PortTypes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.tags.read().iter()).finish()
    }
}

/// Directed edge from an output port to a block input port
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wire {
    /// Unique wire identifier
    pub id: WireId,
    /// Output port the wire starts at
    pub source: PortId,
    /// Whether the source node is an input source rather than a block
    pub source_is_input: bool,
    /// Block input port the wire ends at
    pub target: PortId,
    /// Last value propagated along the wire, kept for display
    pub value: Option<f64>,
    /// Highlight flag for the presentation layer
    pub highlighted: bool,
}

impl Wire {
    /// Create a new wire with no cached value
    pub fn new(id: WireId, source: PortId, source_is_input: bool, target: PortId) -> Self {
        Self {
            id,
            source,
            source_is_input,
            target,
            value: None,
            highlighted: false,
        }
    }

    /// Whether either end of the wire sits on `node`
    pub fn touches(&self, node: NodeId) -> bool {
        self.source.node == node || self.target.node == node
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_direction_from_index() {
        let node = NodeId(3);
        assert_eq!(PortId::input(node, 1).direction(), PortDirection::Input);
        assert_eq!(PortId::output(node).direction(), PortDirection::Output);
        assert_eq!(PortId::input(node, 1).input_index(), Some(1));
        assert_eq!(PortId::output(node).input_index(), None);
    }

    #[test]
    fn test_oversized_input_index_stays_an_input() {
        let node = NodeId(3);
        let port = PortId::input(node, u32::MAX as usize);
        assert_eq!(port.direction(), PortDirection::Input);
        assert_eq!(port.input_index(), Some(i32::MAX as usize));
    }

    #[test]
    fn test_port_display() {
        assert_eq!(PortId::input(NodeId(4), 0).to_string(), "#4.in0");
        assert_eq!(PortId::output(NodeId(4)).to_string(), "#4.out");
    }

    #[test]
    fn test_general_is_always_present() {
        let types = PortTypes::from_tags(["custom"]);
        assert!(types.type_exists(GENERAL));
        assert!(types.type_exists("custom"));
        assert_eq!(types.types(), vec!["custom".to_string(), GENERAL.to_string()]);
    }

    #[test]
    fn test_add_and_remove_type() {
        let types = PortTypes::new();
        assert!(types.add_type("signal"));
        assert!(!types.add_type("signal"));
        assert!(types.type_exists("signal"));

        assert!(types.remove_type("signal"));
        assert!(!types.remove_type("signal"));
        assert!(!types.type_exists("signal"));
    }

    #[test]
    fn test_clones_share_the_same_set() {
        let types = PortTypes::new();
        let shared = types.clone();
        shared.add_type("matrix");
        assert!(types.type_exists("matrix"));
    }

    #[test]
    fn test_compatibility_requires_identical_tags() {
        assert!(PortTypes::compatible("general", "general"));
        assert!(!PortTypes::compatible("general", "type2"));
    }

    #[test]
    fn test_wire_touches_both_endpoints() {
        let wire = Wire::new(
            WireId(9),
            PortId::output(NodeId(1)),
            true,
            PortId::input(NodeId(2), 0),
        );
        assert!(wire.touches(NodeId(1)));
        assert!(wire.touches(NodeId(2)));
        assert!(!wire.touches(NodeId(3)));
        assert!(wire.value.is_none());
    }
}
