//! Per-operator type rules for `Binary`/`Unary`/`Reduction` nodes.
//!
//! Each operator defines what types it accepts on its input ports and what
//! type it produces. [`resolve_binary_rule`]/[`resolve_unary_rule`] perform
//! exhaustive matching over the closed operator sets in `flowir_core::ops`
//! with no wildcard arm, so a new operator variant fails to compile here
//! until its rule is written.

use flowir_core::ops::{BinaryOp, UnaryOp};
use flowir_core::types::Type;

use super::coercion::{common_numeric_type, is_numeric};
use super::diagnostics::Diagnostic;

/// Resolved input/output types for an operator node once both/its operand
/// type(s) are known.
#[derive(Debug, Clone)]
pub struct OpTypeRule {
    pub input_types: Vec<Type>,
    pub output_type: Type,
}

pub fn resolve_binary_rule(
    op: BinaryOp,
    left: &Type,
    right: &Type,
    location: &str,
) -> Result<OpTypeRule, Diagnostic> {
    if op == BinaryOp::Or && is_array(left) && is_array(right) {
        if !arrays_concatenable(left, right) {
            return Err(type_mismatch(right, location));
        }
        return Ok(OpTypeRule { input_types: vec![left.clone(), right.clone()], output_type: left.clone() });
    }

    if op.is_logical() {
        if !left.equal(&Type::boolean()) || !right.equal(&Type::boolean()) {
            return Err(Diagnostic::TypeMismatch {
                node: flowir_core::id::NodeId::new("<binary>"),
                port: flowir_core::id::PortId::new("<operand>"),
                expected: Type::boolean(),
                actual: if left.equal(&Type::boolean()) { right.clone() } else { left.clone() },
                location: location.to_string(),
            });
        }
        return Ok(OpTypeRule {
            input_types: vec![Type::boolean(), Type::boolean()],
            output_type: Type::boolean(),
        });
    }

    if !is_numeric(left) && !left.equal(&Type::any()) {
        return Err(type_mismatch(left, location));
    }
    if !is_numeric(right) && !right.equal(&Type::any()) {
        return Err(type_mismatch(right, location));
    }
    let common = common_numeric_type(left, right).ok_or_else(|| type_mismatch(right, location))?;

    if op.is_comparison() {
        Ok(OpTypeRule { input_types: vec![common.clone(), common], output_type: Type::boolean() })
    } else {
        Ok(OpTypeRule { input_types: vec![common.clone(), common.clone()], output_type: common })
    }
}

pub fn resolve_unary_rule(op: UnaryOp, operand: &Type, location: &str) -> Result<OpTypeRule, Diagnostic> {
    match op {
        UnaryOp::Neg => {
            if !is_numeric(operand) && !operand.equal(&Type::any()) {
                return Err(type_mismatch(operand, location));
            }
            Ok(OpTypeRule { input_types: vec![operand.clone()], output_type: operand.clone() })
        }
        UnaryOp::Not => {
            if !operand.equal(&Type::boolean()) && !operand.equal(&Type::any()) {
                return Err(Diagnostic::TypeMismatch {
                    node: flowir_core::id::NodeId::new("<unary>"),
                    port: flowir_core::id::PortId::new("<operand>"),
                    expected: Type::boolean(),
                    actual: operand.clone(),
                    location: location.to_string(),
                });
            }
            Ok(OpTypeRule { input_types: vec![Type::boolean()], output_type: Type::boolean() })
        }
    }
}

fn is_array(ty: &Type) -> bool {
    matches!(ty.resolved().kind, flowir_core::types::TypeKind::Array { .. })
}

/// `|` on two arrays concatenates them: element types must match. Arity
/// (dimension count) must match too, since concatenation only extends the
/// outermost dimension.
fn arrays_concatenable(left: &Type, right: &Type) -> bool {
    match (&left.resolved().kind, &right.resolved().kind) {
        (
            flowir_core::types::TypeKind::Array { element: e1, arity: a1 },
            flowir_core::types::TypeKind::Array { element: e2, arity: a2 },
        ) => a1 == a2 && e1.equal(e2),
        _ => false,
    }
}

fn type_mismatch(actual: &Type, location: &str) -> Diagnostic {
    Diagnostic::TypeMismatch {
        node: flowir_core::id::NodeId::new("<binary>"),
        port: flowir_core::id::PortId::new("<operand>"),
        expected: Type::any(),
        actual: actual.clone(),
        location: location.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arithmetic_on_two_integers_produces_integer() {
        let rule = resolve_binary_rule(BinaryOp::Add, &Type::integer(), &Type::integer(), "").unwrap();
        assert!(rule.output_type.equal(&Type::integer()));
    }

    #[test]
    fn arithmetic_mixing_integer_and_real_widens_to_real() {
        let rule = resolve_binary_rule(BinaryOp::Mul, &Type::integer(), &Type::real(), "").unwrap();
        assert!(rule.output_type.equal(&Type::real()));
    }

    #[test]
    fn comparison_always_produces_boolean() {
        let rule = resolve_binary_rule(BinaryOp::Lt, &Type::integer(), &Type::real(), "").unwrap();
        assert!(rule.output_type.equal(&Type::boolean()));
    }

    #[test]
    fn logical_and_requires_both_operands_boolean() {
        assert!(resolve_binary_rule(BinaryOp::And, &Type::boolean(), &Type::boolean(), "").is_ok());
        assert!(resolve_binary_rule(BinaryOp::And, &Type::integer(), &Type::boolean(), "").is_err());
    }

    #[test]
    fn unary_neg_requires_numeric() {
        assert!(resolve_unary_rule(UnaryOp::Neg, &Type::real(), "").is_ok());
        assert!(resolve_unary_rule(UnaryOp::Neg, &Type::boolean(), "").is_err());
    }

    #[test]
    fn unary_not_requires_boolean() {
        assert!(resolve_unary_rule(UnaryOp::Not, &Type::boolean(), "").is_ok());
        assert!(resolve_unary_rule(UnaryOp::Not, &Type::integer(), "").is_err());
    }

    #[test]
    fn any_operand_is_accepted_by_arithmetic() {
        assert!(resolve_binary_rule(BinaryOp::Add, &Type::any(), &Type::integer(), "").is_ok());
    }

    #[test]
    fn or_on_two_matching_arrays_concatenates_instead_of_requiring_boolean() {
        let arr = Type::array(Type::integer(), 1);
        let rule = resolve_binary_rule(BinaryOp::Or, &arr, &arr, "").unwrap();
        assert!(rule.output_type.equal(&arr));
    }

    #[test]
    fn or_on_arrays_with_mismatched_element_type_is_a_type_mismatch() {
        let ints = Type::array(Type::integer(), 1);
        let reals = Type::array(Type::real(), 1);
        assert!(resolve_binary_rule(BinaryOp::Or, &ints, &reals, "").is_err());
    }
}
