//! The dataflow type system.
//!
//! Types are structural, not nominal: two `Record`s with the same fields in
//! the same order are the same type regardless of where they were
//! constructed, and a `Named` type is transparently equal to whatever it
//! aliases. There is no registry -- a [`Type`] owns its element/field types
//! directly, building one `Type` instance per occurrence rather than
//! interning them.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A type in the dataflow language.
///
/// `location` carries the source position a type was parsed from, purely
/// for diagnostic rendering; it never participates in [`Type::equal`] or
/// [`Type::assignable_from`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Type {
    pub kind: TypeKind,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub location: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TypeKind {
    Scalar(ScalarKind),
    /// Fixed-arity array. `arity` is the number of dimensions and must be
    /// positive; `[Type::dimensions`] reconstructs it by walking `element`.
    Array { element: Box<Type>, arity: u32 },
    /// A stream is an array that may be produced/consumed incrementally
    /// (loop-carried reductions materialize into one); same arity rule.
    Stream { element: Box<Type>, arity: u32 },
    /// Structural record: field order is preserved for emission but does
    /// not affect equality (records are compared by field set, see
    /// [`Type::equal`]).
    Record { fields: IndexMap<String, Type> },
    /// A transparent alias: `name` is cosmetic (kept for display/emission
    /// as a typedef), `aliased` is what actually participates in equality.
    Named { name: String, aliased: Box<Type> },
}

impl Type {
    pub fn scalar(kind: ScalarKind) -> Self {
        Type { kind: TypeKind::Scalar(kind), location: None }
    }

    pub fn integer() -> Self {
        Self::scalar(ScalarKind::Integer)
    }

    pub fn real() -> Self {
        Self::scalar(ScalarKind::Real)
    }

    pub fn boolean() -> Self {
        Self::scalar(ScalarKind::Boolean)
    }

    pub fn any() -> Self {
        Self::scalar(ScalarKind::Any)
    }

    pub fn array(element: Type, arity: u32) -> Self {
        Type { kind: TypeKind::Array { element: Box::new(element), arity }, location: None }
    }

    pub fn stream(element: Type, arity: u32) -> Self {
        Type { kind: TypeKind::Stream { element: Box::new(element), arity }, location: None }
    }

    pub fn record(fields: IndexMap<String, Type>) -> Self {
        Type { kind: TypeKind::Record { fields }, location: None }
    }

    pub fn named(name: impl Into<String>, aliased: Type) -> Self {
        Type { kind: TypeKind::Named { name: name.into(), aliased: Box::new(aliased) }, location: None }
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// The type with any `Named` wrapper stripped, recursively.
    pub fn resolved(&self) -> &Type {
        match &self.kind {
            TypeKind::Named { aliased, .. } => aliased.resolved(),
            _ => self,
        }
    }

    /// Structural equality: `Named` aliases are transparent, `Array`/`Stream`
    /// require matching arity and equal element types, `Record` requires
    /// the same field names mapped to equal types (order-independent).
    pub fn equal(&self, other: &Type) -> bool {
        match (&self.resolved().kind, &other.resolved().kind) {
            (TypeKind::Scalar(a), TypeKind::Scalar(b)) => a == b,
            (
                TypeKind::Array { element: e1, arity: a1 },
                TypeKind::Array { element: e2, arity: a2 },
            ) => a1 == a2 && e1.equal(e2),
            (
                TypeKind::Stream { element: e1, arity: a1 },
                TypeKind::Stream { element: e2, arity: a2 },
            ) => a1 == a2 && e1.equal(e2),
            (TypeKind::Record { fields: f1 }, TypeKind::Record { fields: f2 }) => {
                f1.len() == f2.len()
                    && f1.iter().all(|(name, ty)| f2.get(name).is_some_and(|t2| ty.equal(t2)))
            }
            _ => false,
        }
    }

    /// Can a value of type `other` be assigned where `self` is expected?
    ///
    /// `any` accepts and produces anything; identical kinds are always
    /// assignable; `integer` <-> `real` coerces (callers should surface the
    /// "possible loss of data" warning when narrowing to `integer`); every
    /// other mismatch is fatal.
    pub fn assignable_from(&self, other: &Type) -> Assignability {
        let (a, b) = (self.resolved(), other.resolved());
        if matches!(a.kind, TypeKind::Scalar(ScalarKind::Any))
            || matches!(b.kind, TypeKind::Scalar(ScalarKind::Any))
        {
            return Assignability::Ok;
        }
        if a.equal(b) {
            return Assignability::Ok;
        }
        match (&a.kind, &b.kind) {
            (TypeKind::Scalar(ScalarKind::Real), TypeKind::Scalar(ScalarKind::Integer)) => {
                Assignability::Ok
            }
            (TypeKind::Scalar(ScalarKind::Integer), TypeKind::Scalar(ScalarKind::Real)) => {
                Assignability::NarrowingWarning
            }
            _ => Assignability::Fatal,
        }
    }

    /// Number of array/stream dimensions, walking through nested elements.
    pub fn dimensions(&self) -> u32 {
        match &self.resolved().kind {
            TypeKind::Array { element, arity } | TypeKind::Stream { element, arity } => {
                arity + element.dimensions()
            }
            _ => 0,
        }
    }

    /// The type one level down from an `Array`/`Stream` (its `element`).
    pub fn element_type(&self) -> Option<&Type> {
        match &self.resolved().kind {
            TypeKind::Array { element, .. } | TypeKind::Stream { element, .. } => Some(element),
            _ => None,
        }
    }

    /// Recurses through nested arrays/streams to the innermost scalar (or
    /// record) type -- the type of a single fully-indexed element.
    pub fn bottom_element_type(&self) -> &Type {
        match &self.resolved().kind {
            TypeKind::Array { element, .. } | TypeKind::Stream { element, .. } => {
                element.bottom_element_type()
            }
            _ => self.resolved(),
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self.resolved().kind,
            TypeKind::Scalar(ScalarKind::Integer) | TypeKind::Scalar(ScalarKind::Real)
        )
    }

    /// A coarse tag identifying the type's top-level kind (resolving
    /// `Named` aliases away, but not descending into element/field types).
    /// Used by port-compatibility checks that only care "is this still an
    /// array port" rather than full structural equality.
    pub fn resolved_kind_name(&self) -> &'static str {
        match &self.resolved().kind {
            TypeKind::Scalar(ScalarKind::Integer) => "integer",
            TypeKind::Scalar(ScalarKind::Real) => "real",
            TypeKind::Scalar(ScalarKind::Boolean) => "boolean",
            TypeKind::Scalar(ScalarKind::Any) => "any",
            TypeKind::Array { .. } => "array",
            TypeKind::Stream { .. } => "stream",
            TypeKind::Record { .. } => "record",
            TypeKind::Named { .. } => unreachable!("resolved() strips Named"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScalarKind {
    Integer,
    Real,
    Boolean,
    Any,
}

/// Result of checking whether a value may flow from one type to another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assignability {
    Ok,
    /// Allowed, but the caller should raise `NarrowingWarning` (real -> integer).
    NarrowingWarning,
    Fatal,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(pairs: &[(&str, Type)]) -> Type {
        let mut fields = IndexMap::new();
        for (name, ty) in pairs {
            fields.insert(name.to_string(), ty.clone());
        }
        Type::record(fields)
    }

    #[test]
    fn scalars_equal_by_kind() {
        assert!(Type::integer().equal(&Type::integer()));
        assert!(!Type::integer().equal(&Type::real()));
    }

    #[test]
    fn any_is_assignable_both_ways() {
        assert_eq!(Type::any().assignable_from(&Type::integer()), Assignability::Ok);
        assert_eq!(Type::integer().assignable_from(&Type::any()), Assignability::Ok);
    }

    #[test]
    fn integer_to_real_is_ok_real_to_integer_warns() {
        assert_eq!(Type::real().assignable_from(&Type::integer()), Assignability::Ok);
        assert_eq!(Type::integer().assignable_from(&Type::real()), Assignability::NarrowingWarning);
    }

    #[test]
    fn boolean_integer_mismatch_is_fatal() {
        assert_eq!(Type::boolean().assignable_from(&Type::integer()), Assignability::Fatal);
    }

    #[test]
    fn named_alias_is_transparent() {
        let named = Type::named("Meters", Type::real());
        assert!(named.equal(&Type::real()));
        assert_eq!(Type::integer().assignable_from(&named), Assignability::NarrowingWarning);
    }

    #[test]
    fn array_equality_requires_matching_arity_and_element() {
        let a = Type::array(Type::integer(), 1);
        let b = Type::array(Type::integer(), 1);
        let c = Type::array(Type::integer(), 2);
        let d = Type::array(Type::real(), 1);
        assert!(a.equal(&b));
        assert!(!a.equal(&c));
        assert!(!a.equal(&d));
    }

    #[test]
    fn record_equality_is_order_independent_by_field_set() {
        let r1 = rec(&[("x", Type::integer()), ("y", Type::real())]);
        let r2 = rec(&[("y", Type::real()), ("x", Type::integer())]);
        assert!(r1.equal(&r2));
    }

    #[test]
    fn record_equality_requires_same_fields() {
        let r1 = rec(&[("x", Type::integer())]);
        let r2 = rec(&[("x", Type::integer()), ("y", Type::integer())]);
        assert!(!r1.equal(&r2));
    }

    #[test]
    fn dimensions_counts_nested_arrays() {
        let nested = Type::array(Type::array(Type::integer(), 1), 1);
        assert_eq!(nested.dimensions(), 2);
        assert_eq!(Type::integer().dimensions(), 0);
    }

    #[test]
    fn bottom_element_type_recurses_to_scalar() {
        let nested = Type::array(Type::array(Type::real(), 1), 1);
        assert!(nested.bottom_element_type().equal(&Type::real()));
    }

    #[test]
    fn location_does_not_affect_equality() {
        let a = Type::integer().with_location("line 3");
        let b = Type::integer();
        assert!(a.equal(&b));
    }

    #[test]
    fn serde_roundtrip_record() {
        let ty = rec(&[("a", Type::integer()), ("b", Type::array(Type::real(), 1))]);
        let json = serde_json::to_string(&ty).unwrap();
        let back: Type = serde_json::from_str(&json).unwrap();
        assert!(ty.equal(&back));
    }
}
