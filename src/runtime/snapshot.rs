//! Snapshot / state export
//!
//! A [`Snapshot`] is the logical content of a graph (ids, kinds, input values,
//! connections and opaque node payloads) with nothing that depends on
//! rendering. It serializes to JSON:
//!
//! ```json
//! {
//!   "version": 1,
//!   "port_types": ["general"],
//!   "nodes": [
//!     { "id": 0, "kind": "input", "value": 6.0 },
//!     { "id": 1, "kind": "neg", "payload": { "x": 120, "y": 40 } }
//!   ],
//!   "wires": [
//!     { "id": 2, "source_node": 0, "source_port": -1, "target_node": 1, "target_port": 0 }
//!   ]
//! }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeSet;
use std::path::Path;

use crate::core::block::Node;
use crate::core::port::{PortId, GENERAL};
use crate::core::registry::RESERVED_INPUT_NAME;
use crate::core::{NodeId, WireId};

use super::graph::{Graph, GraphError};

/// Format version written by [`Snapshot::capture`]
pub const SNAPSHOT_VERSION: u32 = 1;

/// Errors raised while saving or restoring a snapshot
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed snapshot: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unsupported snapshot version {found} (expected {})", SNAPSHOT_VERSION)]
    UnsupportedVersion { found: u32 },

    #[error("Snapshot references unknown block kind '{0}'")]
    UnknownKindName(String),

    #[error("Input source {0} has no value")]
    MissingInputValue(NodeId),

    #[error("Snapshot is inconsistent: {0}")]
    Graph(#[from] GraphError),
}

/// One node of a saved diagram
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: NodeId,
    /// Kind name, or `"input"` for an input source
    pub kind: String,
    /// Value of an input source
    #[serde(default, skip_serializing_if = "Option::is_none", with = "input_value")]
    pub value: Option<f64>,
    #[serde(default, skip_serializing_if = "JsonValue::is_null")]
    pub payload: JsonValue,
}

/// JSON has no literal for infinities or NaN, so those input values are
/// written as the strings `"inf"`, `"-inf"` and `"nan"`.
mod input_value {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(f64),
        Named(String),
    }

    pub fn serialize<S: Serializer>(value: &Option<f64>, serializer: S) -> Result<S::Ok, S::Error> {
        match *value {
            Some(v) if v.is_nan() => serializer.serialize_str("nan"),
            Some(v) if v == f64::INFINITY => serializer.serialize_str("inf"),
            Some(v) if v == f64::NEG_INFINITY => serializer.serialize_str("-inf"),
            Some(v) => serializer.serialize_f64(v),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
        match Option::<Repr>::deserialize(deserializer)? {
            None => Ok(None),
            Some(Repr::Number(v)) => Ok(Some(v)),
            Some(Repr::Named(name)) => match name.as_str() {
                "inf" => Ok(Some(f64::INFINITY)),
                "-inf" => Ok(Some(f64::NEG_INFINITY)),
                "nan" => Ok(Some(f64::NAN)),
                other => Err(D::Error::custom(format!("invalid input value '{}'", other))),
            },
        }
    }
}

/// One wire of a saved diagram
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireRecord {
    pub id: WireId,
    pub source_node: NodeId,
    pub source_port: i32,
    pub target_node: NodeId,
    pub target_port: i32,
}

impl WireRecord {
    pub fn source(&self) -> PortId {
        PortId {
            node: self.source_node,
            port: self.source_port,
        }
    }

    pub fn target(&self) -> PortId {
        PortId {
            node: self.target_node,
            port: self.target_port,
        }
    }
}

/// Serializable logical state of a graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    /// Port tags used by the saved nodes, sorted
    #[serde(default)]
    pub port_types: Vec<String>,
    pub nodes: Vec<NodeRecord>,
    pub wires: Vec<WireRecord>,
}

impl Snapshot {
    /// Export the graph; nodes and wires are listed in ascending id order.
    pub fn capture(graph: &Graph) -> Self {
        let mut tags = BTreeSet::new();
        let mut nodes = Vec::with_capacity(graph.node_count());

        for node in graph.nodes() {
            let record = match node {
                Node::Input(input) => {
                    tags.insert(GENERAL.to_string());
                    NodeRecord {
                        id: input.id,
                        kind: RESERVED_INPUT_NAME.to_string(),
                        value: Some(input.value),
                        payload: input.payload.clone(),
                    }
                }
                Node::Block(block) => {
                    let kind = graph.registry().kind_of(block.kind).ok();
                    if let Some(kind) = kind {
                        tags.extend(kind.input_types.iter().cloned());
                        tags.extend(kind.output_types.iter().cloned());
                    }
                    NodeRecord {
                        id: block.id,
                        kind: kind.map(|k| k.name.clone()).unwrap_or_default(),
                        value: None,
                        payload: block.payload.clone(),
                    }
                }
            };
            nodes.push(record);
        }

        let wires = graph
            .wires()
            .map(|w| WireRecord {
                id: w.id,
                source_node: w.source.node,
                source_port: w.source.port,
                target_node: w.target.node,
                target_port: w.target.port,
            })
            .collect();

        Self {
            version: SNAPSHOT_VERSION,
            port_types: tags.into_iter().collect(),
            nodes,
            wires,
        }
    }

    /// Rebuild a graph shaped like `template` (same registry, port types and
    /// options) from this snapshot.
    ///
    /// Every wire is checked exactly as a new connection would be. Nothing is
    /// kept if any record is rejected: port tags registered for the restore
    /// are removed again and `template` is never touched.
    pub fn restore(&self, template: &Graph) -> Result<Graph, PersistError> {
        if self.version != SNAPSHOT_VERSION {
            return Err(PersistError::UnsupportedVersion {
                found: self.version,
            });
        }

        let port_types = template.port_types();
        let added: Vec<&String> = self
            .port_types
            .iter()
            .filter(|tag| port_types.add_type(tag.as_str()))
            .collect();

        let result = self.rebuild(template);
        if result.is_err() {
            for tag in added {
                port_types.remove_type(tag);
            }
        }
        result
    }

    fn rebuild(&self, template: &Graph) -> Result<Graph, PersistError> {
        let mut graph = template.empty_like();

        for record in &self.nodes {
            if record.kind == RESERVED_INPUT_NAME {
                let value = record
                    .value
                    .ok_or(PersistError::MissingInputValue(record.id))?;
                graph.restore_input(record.id, value)?;
            } else {
                let kind = graph
                    .registry()
                    .kind_id_by_name(&record.kind)
                    .map_err(|_| PersistError::UnknownKindName(record.kind.clone()))?;
                graph.restore_block(record.id, kind)?;
            }
            if !record.payload.is_null() {
                graph.set_payload(record.id, record.payload.clone())?;
            }
        }

        for record in &self.wires {
            graph.restore_wire(record.id, record.source(), record.target())?;
        }

        Ok(graph)
    }

    pub fn to_json(&self) -> Result<String, PersistError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, PersistError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Write the snapshot as pretty JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), PersistError> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Read a snapshot written by [`Snapshot::save`]
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PersistError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }
}
