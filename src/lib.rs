//! Block Editor - dataflow graph model and evaluation engine
//!
//! This crate is the computational core of a block diagram editor: a registry
//! of numeric block kinds, a graph model that keeps every edit type-correct and
//! acyclic, an evaluation engine that runs the graph in topological order, and
//! a JSON snapshot format for saving diagrams.

pub mod core;
pub mod categories;
pub mod runtime;
mod tests;

// Re-export commonly used types
pub use core::{BlockRegistry, DomainError, KindId, NodeId, PortId, PortTypes, WireId};
pub use categories::BlockCategory;
pub use runtime::{
    Editor, EditorConfig, Evaluation, Graph, GraphError, PersistError, RunReport, Snapshot,
    WireOutcome,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
