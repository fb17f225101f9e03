//! Type coercion rules.
//!
//! The only implicit conversion in this language is between the two
//! numeric scalars, `integer` and `real`, and only one direction of it
//! is silent.
//!
//! - `integer` -> `real`: always allowed, lossless.
//! - `real` -> `integer`: allowed, but the caller must surface a
//!   `NarrowingWarning` (it is NOT fatal, unlike every other mismatch).
//! - `any` is compatible with everything in both directions.
//! - Everything else is a fatal `TypeMismatch`.

use flowir_core::types::{Assignability, Type};

/// Returns `true` if a value of type `from` can flow into a port expecting
/// `to`, silently or with a narrowing warning (i.e. not fatal).
pub fn can_coerce(from: &Type, to: &Type) -> bool {
    !matches!(to.assignable_from(from), Assignability::Fatal)
}

/// Returns `true` only for the lossy direction (`real` source, `integer`
/// target) that must raise `NarrowingWarning` at the call site.
pub fn needs_narrowing_warning(from: &Type, to: &Type) -> bool {
    matches!(to.assignable_from(from), Assignability::NarrowingWarning)
}

pub fn is_numeric(ty: &Type) -> bool {
    ty.is_numeric()
}

/// The common numeric type two operand types must be widened to before an
/// arithmetic/comparison op applies: `real` wins over `integer`, and `any`
/// defers to the other operand. Returns `None` when neither side is
/// numeric (and not `any`).
pub fn common_numeric_type(a: &Type, b: &Type) -> Option<Type> {
    use flowir_core::types::{ScalarKind, TypeKind};

    let ra = a.resolved();
    let rb = b.resolved();
    match (&ra.kind, &rb.kind) {
        (TypeKind::Scalar(ScalarKind::Any), _) if rb.is_numeric() => Some(b.clone()),
        (_, TypeKind::Scalar(ScalarKind::Any)) if ra.is_numeric() => Some(a.clone()),
        (TypeKind::Scalar(ScalarKind::Any), TypeKind::Scalar(ScalarKind::Any)) => Some(Type::any()),
        _ if ra.is_numeric() && rb.is_numeric() => {
            if matches!(ra.kind, TypeKind::Scalar(ScalarKind::Real))
                || matches!(rb.kind, TypeKind::Scalar(ScalarKind::Real))
            {
                Some(Type::real())
            } else {
                Some(Type::integer())
            }
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_match_coerces() {
        assert!(can_coerce(&Type::integer(), &Type::integer()));
        assert!(can_coerce(&Type::boolean(), &Type::boolean()));
    }

    #[test]
    fn integer_to_real_coerces_without_warning() {
        assert!(can_coerce(&Type::integer(), &Type::real()));
        assert!(!needs_narrowing_warning(&Type::integer(), &Type::real()));
    }

    #[test]
    fn real_to_integer_coerces_with_warning() {
        assert!(can_coerce(&Type::real(), &Type::integer()));
        assert!(needs_narrowing_warning(&Type::real(), &Type::integer()));
    }

    #[test]
    fn any_coerces_both_ways() {
        assert!(can_coerce(&Type::any(), &Type::boolean()));
        assert!(can_coerce(&Type::boolean(), &Type::any()));
    }

    #[test]
    fn boolean_and_integer_do_not_coerce() {
        assert!(!can_coerce(&Type::boolean(), &Type::integer()));
        assert!(!can_coerce(&Type::integer(), &Type::boolean()));
    }

    #[test]
    fn array_and_record_mismatch_is_fatal() {
        let arr = Type::array(Type::integer(), 1);
        let rec = Type::record(Default::default());
        assert!(!can_coerce(&arr, &rec));
    }

    #[test]
    fn common_numeric_type_prefers_real() {
        assert!(common_numeric_type(&Type::integer(), &Type::real()).unwrap().equal(&Type::real()));
        assert!(common_numeric_type(&Type::integer(), &Type::integer()).unwrap().equal(&Type::integer()));
    }

    #[test]
    fn common_numeric_type_with_any_defers_to_other_operand() {
        assert!(common_numeric_type(&Type::any(), &Type::real()).unwrap().equal(&Type::real()));
    }

    #[test]
    fn common_numeric_type_non_numeric_is_none() {
        assert!(common_numeric_type(&Type::boolean(), &Type::integer()).is_none());
    }
}
