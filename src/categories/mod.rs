//! Block categories and the built-in block table
//!
//! Each category module holds the pure transfer functions of its kinds. The
//! built-in table below lists them in palette order.

pub mod arithmetic;
pub mod elementary;

use serde::{Deserialize, Serialize};

use crate::core::block::{BlockKind, Transfer};

/// Block category enumeration
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlockCategory {
    /// Binary arithmetic (adder, divider, ...)
    Arithmetic,
    /// Single-argument functions (ex, ln, sqrt, ...)
    Elementary,
    /// User-registered kinds
    Custom(String),
}

impl BlockCategory {
    /// Get a human-readable name for the category
    pub fn display_name(&self) -> &str {
        match self {
            BlockCategory::Arithmetic => "Arithmetic",
            BlockCategory::Elementary => "Elementary",
            BlockCategory::Custom(name) => name,
        }
    }
}

impl std::fmt::Display for BlockCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Every built-in kind, in the order their ids are assigned
pub fn builtin_kinds() -> Vec<BlockKind> {
    use BlockCategory::{Arithmetic, Elementary};

    vec![
        BlockKind::general("adder", Arithmetic, Transfer::Binary(arithmetic::add)),
        BlockKind::general("subtractor", Arithmetic, Transfer::Binary(arithmetic::subtract)),
        BlockKind::general("multiplier", Arithmetic, Transfer::Binary(arithmetic::multiply)),
        BlockKind::general("divider", Arithmetic, Transfer::Binary(arithmetic::divide)),
        BlockKind::general("ex", Elementary, Transfer::Unary(elementary::exp)),
        BlockKind::general("abs", Elementary, Transfer::Unary(elementary::abs)),
        BlockKind::general("ln", Elementary, Transfer::Unary(elementary::ln)),
        BlockKind::general("neg", Elementary, Transfer::Unary(elementary::neg)),
        BlockKind::general("sign", Elementary, Transfer::Unary(elementary::sign)),
        BlockKind::general("squared", Elementary, Transfer::Unary(elementary::square)),
        BlockKind::general("sqrt", Elementary, Transfer::Unary(elementary::sqrt)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_names() {
        assert_eq!(BlockCategory::Arithmetic.to_string(), "Arithmetic");
        assert_eq!(BlockCategory::Custom("filters".into()).to_string(), "filters");
    }

    #[test]
    fn test_builtin_names_are_unique() {
        let kinds = builtin_kinds();
        let mut names: Vec<&str> = kinds.iter().map(|k| k.name.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), kinds.len());
    }
}
