//! Core graph abstractions and types
//!
//! This module defines the identifiers, ports, block kinds and node instances
//! that the graph model and the evaluation engine are built from.

pub mod block;
pub mod port;
pub mod registry;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use block::{Block, BlockKind, DomainError, InputSource, Node, Transfer};
pub use port::{PortDirection, PortId, PortTypes, Wire};
pub use registry::{BlockRegistry, KindId, RegistryError};

/// Identifier of a node (block or input source) in the graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u64);

/// Identifier of a wire in the graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WireId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl fmt::Display for WireId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "w{}", self.0)
    }
}

/// Session-wide id counter shared by nodes and wires.
///
/// Nodes and wires draw from the same sequence, so a raw id is never
/// ambiguous, and ids are never handed out twice, even after a delete.
#[derive(Debug, Clone, Default)]
pub struct IdAllocator {
    next: u64,
}

impl IdAllocator {
    /// Largest id a restored diagram may carry. Keeps the counter far from
    /// `u64::MAX`, so allocation can never run out.
    pub const MAX_ID: u64 = i64::MAX as u64;

    /// Create an allocator starting at id 0
    pub fn new() -> Self {
        Self { next: 0 }
    }

    /// Allocate the next node id
    pub fn next_node(&mut self) -> NodeId {
        NodeId(self.bump())
    }

    /// Allocate the next wire id
    pub fn next_wire(&mut self) -> WireId {
        WireId(self.bump())
    }

    /// The id the next allocation will return
    pub fn peek(&self) -> u64 {
        self.next
    }

    /// Make sure future ids are strictly greater than `id`.
    ///
    /// Returns `false` and leaves the counter alone if `id` is above
    /// [`IdAllocator::MAX_ID`].
    #[must_use]
    pub fn resume_after(&mut self, id: u64) -> bool {
        match id.checked_add(1) {
            Some(next) if id <= Self::MAX_ID => {
                self.next = self.next.max(next);
                true
            }
            _ => false,
        }
    }

    fn bump(&mut self) -> u64 {
        let id = self.next;
        self.next = id
            .checked_add(1)
            .unwrap_or_else(|| unreachable!("id counter passed {}", Self::MAX_ID));
        id
    }
}
