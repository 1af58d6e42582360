//! Test suite for the block editor
//!
//! This module organizes tests into logical groups: the core model, the port
//! type system, full editing sessions, and randomized properties.

#[cfg(test)]
mod core_tests;
