//! Algebraic operator sets and their precedence.
//!
//! A closed operator set: an exhaustive enum per operator family rather
//! than a string tag, so downstream matches are exhaustive at compile
//! time.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl BinaryOp {
    /// Higher binds tighter. Mirrors conventional arithmetic precedence;
    /// comparisons bind looser than arithmetic, logical connectives loosest.
    pub fn precedence(self) -> u8 {
        match self {
            BinaryOp::Pow => 6,
            BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => 5,
            BinaryOp::Add | BinaryOp::Sub => 4,
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => 3,
            BinaryOp::Eq | BinaryOp::Ne => 2,
            BinaryOp::And => 1,
            BinaryOp::Or => 0,
        }
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge
        )
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or)
    }

    pub fn is_arithmetic(self) -> bool {
        matches!(self, BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod | BinaryOp::Pow)
    }

    /// Source-level symbol, used by error messages. The emitter special-cases
    /// `Pow`, since the target language has no infix power operator.
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Pow => "**",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Neg,
    Not,
}

impl UnaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Neg => "-",
            UnaryOp::Not => "!",
        }
    }
}

/// Reduction operator for `Loop`/`Reduction` nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReductionOp {
    /// Collect each iteration's value into an array, in iteration order.
    Array,
    /// Keep only the last iteration's value.
    Value,
    /// Accumulate with `+`. Associative -- the emitter may parallelize it.
    Sum,
    /// Accumulate with `*`. Associative -- the emitter may parallelize it.
    Product,
}

impl ReductionOp {
    /// Whether this reduction's accumulation order doesn't matter, making
    /// the emitted loop eligible for the parallel-reduction hint.
    pub fn is_parallelizable(self) -> bool {
        matches!(self, ReductionOp::Sum | ReductionOp::Product)
    }

    pub fn identity_literal(self) -> Option<&'static str> {
        match self {
            ReductionOp::Sum => Some("0"),
            ReductionOp::Product => Some("1"),
            ReductionOp::Array | ReductionOp::Value => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precedence_orders_pow_above_mul_above_add_above_comparison_above_logical() {
        assert!(BinaryOp::Pow.precedence() > BinaryOp::Mul.precedence());
        assert!(BinaryOp::Mul.precedence() > BinaryOp::Add.precedence());
        assert!(BinaryOp::Add.precedence() > BinaryOp::Lt.precedence());
        assert!(BinaryOp::Lt.precedence() > BinaryOp::And.precedence());
        assert!(BinaryOp::And.precedence() > BinaryOp::Or.precedence());
    }

    #[test]
    fn classification_is_exhaustive_and_exclusive() {
        for op in [
            BinaryOp::Add,
            BinaryOp::Sub,
            BinaryOp::Mul,
            BinaryOp::Div,
            BinaryOp::Mod,
            BinaryOp::Pow,
            BinaryOp::Eq,
            BinaryOp::Ne,
            BinaryOp::Lt,
            BinaryOp::Le,
            BinaryOp::Gt,
            BinaryOp::Ge,
            BinaryOp::And,
            BinaryOp::Or,
        ] {
            let count = [op.is_arithmetic(), op.is_comparison(), op.is_logical()]
                .iter()
                .filter(|b| **b)
                .count();
            assert_eq!(count, 1, "{op:?} must be exactly one of arithmetic/comparison/logical");
        }
    }

    #[test]
    fn sum_and_product_are_parallelizable_array_and_value_are_not() {
        assert!(ReductionOp::Sum.is_parallelizable());
        assert!(ReductionOp::Product.is_parallelizable());
        assert!(!ReductionOp::Array.is_parallelizable());
        assert!(!ReductionOp::Value.is_parallelizable());
    }

    #[test]
    fn identity_literals_match_operator() {
        assert_eq!(ReductionOp::Sum.identity_literal(), Some("0"));
        assert_eq!(ReductionOp::Product.identity_literal(), Some("1"));
        assert_eq!(ReductionOp::Array.identity_literal(), None);
    }
}
