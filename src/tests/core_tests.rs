//! Tests for the core model
//!
//! Covers the block registry, block kinds and their transfer functions, and
//! the way blocks and input sources live inside a graph.

#[cfg(test)]
mod core_tests {
    use std::sync::Arc;

    use crate::categories::BlockCategory;
    use crate::core::block::{BlockKind, DomainError, Transfer};
    use crate::core::port::{PortId, PortTypes};
    use crate::core::registry::{BlockRegistry, KindId, RegistryError};
    use crate::core::{NodeId, WireId};
    use crate::runtime::graph::{Graph, GraphError};

    fn clamp_unit(x: f64) -> Result<f64, DomainError> {
        Ok(x.clamp(0.0, 1.0))
    }

    fn graph() -> Graph {
        Graph::new(Arc::new(BlockRegistry::builtin()), PortTypes::new())
    }

    /// Test every built-in transfer function through the registry
    ///
    /// The registry is the only place block behaviour comes from, so looking
    /// kinds up by name and applying them checks the whole table.
    #[test]
    fn test_builtin_transfer_functions() {
        let registry = BlockRegistry::builtin();
        let apply = |name: &str, args: &[f64]| {
            let id = registry.kind_id_by_name(name).unwrap();
            registry.kind_of(id).unwrap().transfer.apply(args)
        };

        assert_eq!(apply("adder", &[2.0, 3.0]), Ok(5.0));
        assert_eq!(apply("subtractor", &[2.0, 3.0]), Ok(-1.0));
        assert_eq!(apply("multiplier", &[2.0, 3.0]), Ok(6.0));
        assert_eq!(apply("divider", &[6.0, 3.0]), Ok(2.0));
        assert_eq!(apply("divider", &[5.0, 0.0]), Err(DomainError::DivisionByZero));
        assert_eq!(apply("ex", &[0.0]), Ok(1.0));
        assert_eq!(apply("abs", &[-7.0]), Ok(7.0));
        assert_eq!(apply("ln", &[1.0]), Ok(0.0));
        assert_eq!(apply("ln", &[-1.0]), Err(DomainError::NonPositiveLog));
        assert_eq!(apply("neg", &[2.0]), Ok(-2.0));
        assert_eq!(apply("sign", &[-9.0]), Ok(-1.0));
        assert_eq!(apply("squared", &[1.5]), Ok(2.25));
        assert_eq!(apply("sqrt", &[16.0]), Ok(4.0));
        assert_eq!(apply("sqrt", &[-16.0]), Err(DomainError::NegativeSqrt));
    }

    /// Test arities of the built-in kinds
    ///
    /// Arithmetic kinds take two inputs, everything else takes one.
    #[test]
    fn test_builtin_arities() {
        let registry = BlockRegistry::builtin();
        for (_, kind) in registry.kinds() {
            let expected = match kind.category {
                BlockCategory::Arithmetic => 2,
                _ => 1,
            };
            assert_eq!(kind.arity(), expected, "{}", kind.name);
            assert_eq!(kind.input_types.len(), expected);
            assert_eq!(kind.output_types.len(), 1);
        }
    }

    /// Test a custom kind placed in a graph
    ///
    /// Kinds registered before the registry is shared behave exactly like
    /// the built-in ones.
    #[test]
    fn test_custom_kind_in_graph() {
        let mut registry = BlockRegistry::builtin();
        let clamp = registry
            .register(BlockKind::general(
                "clamp",
                BlockCategory::Custom("limits".into()),
                Transfer::Unary(clamp_unit),
            ))
            .unwrap();

        let mut g = Graph::new(Arc::new(registry), PortTypes::new());
        let block = g.create_block(clamp).unwrap();
        assert_eq!(g.node_label(block), Some("clamp"));
        assert_eq!(g.block(block).unwrap().arity(), 1);
    }

    /// Test that the registry refuses names reserved by the snapshot format
    #[test]
    fn test_registry_reserves_input_name() {
        let mut registry = BlockRegistry::builtin();
        let err = registry
            .register(BlockKind::general(
                "input",
                BlockCategory::Elementary,
                Transfer::Unary(clamp_unit),
            ))
            .unwrap_err();
        assert_eq!(err, RegistryError::ReservedName("input".into()));
    }

    /// Test the unified id space
    ///
    /// Nodes and wires draw from one counter: a wire created between two
    /// nodes takes the next number after them.
    #[test]
    fn test_unified_id_space() {
        let mut g = graph();
        let a = g.create_input(1.0);
        let neg = g.create_block(KindId(7)).unwrap();
        let w = g.create_wire(PortId::output(a), PortId::input(neg, 0)).unwrap();
        let b = g.create_input(2.0);

        assert_eq!((a, neg, w, b), (NodeId(0), NodeId(1), WireId(2), NodeId(3)));
    }

    /// Test that deleted ids are never handed out again
    #[test]
    fn test_ids_are_not_reused() {
        let mut g = graph();
        let mut seen = Vec::new();
        for _ in 0..5 {
            let id = g.create_input(0.0);
            g.delete_node(id).unwrap();
            seen.push(id);
        }
        seen.dedup();
        assert_eq!(seen.len(), 5);
    }

    /// Test that new blocks start with empty caches
    #[test]
    fn test_new_block_state() {
        let mut g = graph();
        let divider = g.create_block(KindId(3)).unwrap();
        let block = g.block(divider).unwrap();

        assert_eq!(block.input_values, vec![None, None]);
        assert_eq!(block.output_value, None);
        assert_eq!(block.last_error, None);
        assert!(!block.highlighted);
        assert!(block.payload.is_null());
    }

    /// Test that input sources are not blocks
    ///
    /// An input source has no kind and no inputs; asking for it as a block
    /// or wiring into it fails.
    #[test]
    fn test_input_source_is_distinct() {
        let mut g = graph();
        let a = g.create_input(3.0);
        let b = g.create_input(4.0);

        assert!(g.block(a).is_none());
        assert!(g.node(a).unwrap().is_input());
        assert_eq!(
            g.create_wire(PortId::output(a), PortId::input(b, 0)),
            Err(GraphError::InvalidPortRole(PortId::input(b, 0)))
        );
    }
}
