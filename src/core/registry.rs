//! Block Registry - static catalogue of the block kinds the editor offers
//!
//! The registry is filled once at start-up (see [`BlockRegistry::builtin`])
//! and then shared immutably with every graph through an `Arc`. It supports:
//! - Kind registration with signature validation
//! - Lookup by kind id or by name
//! - Listing kinds in palette order, optionally by category

use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use super::block::{BlockKind, Transfer};
use crate::categories::{self, BlockCategory};

/// Name reserved for input sources in saved diagrams
pub const RESERVED_INPUT_NAME: &str = "input";

/// Integer identifier of a block kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KindId(pub u32);

impl fmt::Display for KindId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "kind {}", self.0)
    }
}

/// Catalogue of block kinds, indexed by [`KindId`]
#[derive(Debug, Clone, Default)]
pub struct BlockRegistry {
    kinds: Vec<BlockKind>,
    by_name: HashMap<String, KindId>,
}

impl BlockRegistry {
    /// Create an empty registry
    ///
    /// # Example
    /// ```
    /// use block_editor::core::registry::BlockRegistry;
    ///
    /// let registry = BlockRegistry::new();
    /// assert!(registry.is_empty());
    /// ```
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding every built-in kind.
    ///
    /// Kind ids follow palette order: adder, subtractor, multiplier,
    /// divider, ex, abs, ln, neg, sign, squared, sqrt.
    ///
    /// # Example
    /// ```
    /// use block_editor::core::registry::BlockRegistry;
    ///
    /// let registry = BlockRegistry::builtin();
    /// let divider = registry.kind_id_by_name("divider").unwrap();
    /// assert_eq!(registry.kind_of(divider).unwrap().arity(), 2);
    /// ```
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for kind in categories::builtin_kinds() {
            if let Err(e) = registry.register(kind) {
                // Built-in table is fixed; a failure here is a programming error.
                unreachable!("built-in block table is inconsistent: {}", e);
            }
        }
        registry
    }

    /// Register a new kind from its parts
    ///
    /// # Returns
    /// * `Ok(KindId)` with the id assigned to the kind
    /// * `Err(RegistryError)` if the name is taken or the signature does not
    ///   match the transfer function
    pub fn register_kind(
        &mut self,
        name: impl Into<String>,
        category: BlockCategory,
        input_types: Vec<String>,
        output_types: Vec<String>,
        transfer: Transfer,
    ) -> Result<KindId, RegistryError> {
        self.register(BlockKind {
            name: name.into(),
            category,
            input_types,
            output_types,
            transfer,
        })
    }

    /// Register a fully built kind
    pub fn register(&mut self, kind: BlockKind) -> Result<KindId, RegistryError> {
        self.validate_kind(&kind)?;

        let id = KindId(self.kinds.len() as u32);
        debug!("registered block kind '{}' as {}", kind.name, id);
        self.by_name.insert(kind.name.clone(), id);
        self.kinds.push(kind);
        Ok(id)
    }

    /// Look up a kind by id
    pub fn kind_of(&self, id: KindId) -> Result<&BlockKind, RegistryError> {
        self.kinds
            .get(id.0 as usize)
            .ok_or(RegistryError::UnknownKind(id))
    }

    /// Look up a kind id by name
    pub fn kind_id_by_name(&self, name: &str) -> Result<KindId, RegistryError> {
        self.by_name
            .get(name)
            .copied()
            .ok_or_else(|| RegistryError::UnknownName(name.to_string()))
    }

    /// Name of a kind
    pub fn name_of(&self, id: KindId) -> Result<&str, RegistryError> {
        self.kind_of(id).map(|k| k.name.as_str())
    }

    /// Whether a kind id is known
    pub fn contains(&self, id: KindId) -> bool {
        (id.0 as usize) < self.kinds.len()
    }

    /// All kinds in id order
    pub fn kinds(&self) -> impl Iterator<Item = (KindId, &BlockKind)> {
        self.kinds
            .iter()
            .enumerate()
            .map(|(i, k)| (KindId(i as u32), k))
    }

    /// Kinds of one palette category, in id order
    pub fn kinds_in_category<'a>(
        &'a self,
        category: &'a BlockCategory,
    ) -> impl Iterator<Item = (KindId, &'a BlockKind)> + 'a {
        self.kinds().filter(move |(_, k)| &k.category == category)
    }

    /// Number of registered kinds
    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    fn validate_kind(&self, kind: &BlockKind) -> Result<(), RegistryError> {
        if kind.name.is_empty() {
            return Err(RegistryError::EmptyName);
        }
        if kind.name == RESERVED_INPUT_NAME {
            return Err(RegistryError::ReservedName(kind.name.clone()));
        }
        if self.by_name.contains_key(&kind.name) {
            return Err(RegistryError::DuplicateName(kind.name.clone()));
        }
        if kind.input_types.len() != kind.transfer.arity() {
            return Err(RegistryError::ArityMismatch {
                name: kind.name.clone(),
                arity: kind.transfer.arity(),
                declared: kind.input_types.len(),
            });
        }
        if kind.output_types.len() != 1 {
            return Err(RegistryError::OutputCount {
                name: kind.name.clone(),
                count: kind.output_types.len(),
            });
        }
        Ok(())
    }
}

/// Registry error types
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// No kind with this id
    #[error("Unknown block kind: {0}")]
    UnknownKind(KindId),

    /// No kind with this name
    #[error("Unknown block name: {0}")]
    UnknownName(String),

    /// A kind with this name already exists
    #[error("Duplicate block name: {0}")]
    DuplicateName(String),

    /// The name is reserved for input sources
    #[error("Block name is reserved: {0}")]
    ReservedName(String),

    /// Kind names must not be empty
    #[error("Block name cannot be empty")]
    EmptyName,

    /// Declared input tags do not match the transfer function
    #[error("Block '{name}' takes {arity} inputs but declares {declared} input types")]
    ArityMismatch {
        name: String,
        arity: usize,
        declared: usize,
    },

    /// Blocks have exactly one output
    #[error("Block '{name}' declares {count} outputs, expected 1")]
    OutputCount { name: String, count: usize },
}
