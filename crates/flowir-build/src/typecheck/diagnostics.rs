//! The ten named diagnostic kinds a build can raise.
//!
//! `Diagnostic` captures full context for every failure detected during
//! the builder pass: which node/port is involved, a human message, and a
//! source `location` string when one is available. Every variant is
//! `Serialize`/`Deserialize` so a caller embedding this compiler can
//! report diagnostics as structured JSON rather than only formatted text.

use flowir_core::id::{FunctionId, NodeId, PortId};
use flowir_core::types::Type;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
pub enum Diagnostic {
    #[error("syntax error: {message}")]
    SyntaxError { message: String, location: String },

    #[error("type mismatch at node {node} port {port}: expected {expected:?}, got {actual:?}")]
    TypeMismatch { node: NodeId, port: PortId, expected: Type, actual: Type, location: String },

    /// Non-fatal: real -> integer narrowing. Collected in
    /// [`Warnings`], never aborts the build.
    #[error("possible loss of data narrowing real to integer at node {node} port {port}")]
    NarrowingWarning { node: NodeId, port: PortId, location: String },

    #[error("arity mismatch calling '{callee}': expected {expected} arguments, got {actual}")]
    ArityMismatch { callee: String, expected: usize, actual: usize, location: String },

    #[error("unresolved identifier '{name}'")]
    UnresolvedIdentifier { name: String, location: String },

    #[error("unknown callee '{name}'")]
    UnknownCallee { name: String, location: String },

    #[error("unknown pragma '{name}' on function {function}")]
    UnknownPragma { name: String, function: FunctionId, location: String },

    #[error("array index out of literal bounds: index {index} not in [1, {length}]")]
    LiteralBoundsError { index: i64, length: u32, location: String },

    #[error("duplicate definition of '{name}'")]
    DuplicateDefinition { name: String, location: String },

    #[error("internal error: {message}")]
    InternalError { message: String },
}

impl Diagnostic {
    /// Narrowing warnings are accumulated but never abort a build; every
    /// other kind is fatal (fatal/warning split).
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Diagnostic::NarrowingWarning { .. })
    }

    /// The source location for the structured `{message, location}` error
    /// record a driver surfaces on a fatal build failure. `InternalError`
    /// carries none, since it's raised from invariant checks with no
    /// associated AST span.
    pub fn location(&self) -> &str {
        match self {
            Diagnostic::SyntaxError { location, .. }
            | Diagnostic::TypeMismatch { location, .. }
            | Diagnostic::NarrowingWarning { location, .. }
            | Diagnostic::ArityMismatch { location, .. }
            | Diagnostic::UnresolvedIdentifier { location, .. }
            | Diagnostic::UnknownCallee { location, .. }
            | Diagnostic::UnknownPragma { location, .. }
            | Diagnostic::LiteralBoundsError { location, .. }
            | Diagnostic::DuplicateDefinition { location, .. } => location,
            Diagnostic::InternalError { .. } => "",
        }
    }
}

/// Accumulates non-fatal diagnostics across a build, in encounter order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Warnings(pub Vec<Diagnostic>);

impl Warnings {
    pub fn push(&mut self, diagnostic: Diagnostic) {
        debug_assert!(!diagnostic.is_fatal(), "fatal diagnostics must abort via Result, not Warnings");
        self.0.push(diagnostic);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_narrowing_warning_is_non_fatal() {
        let warning = Diagnostic::NarrowingWarning {
            node: NodeId::new("node0"),
            port: PortId::new("port0"),
            location: String::new(),
        };
        assert!(!warning.is_fatal());

        let fatal = Diagnostic::UnresolvedIdentifier { name: "x".into(), location: String::new() };
        assert!(fatal.is_fatal());
    }

    #[test]
    fn warnings_accumulate_in_order() {
        let mut warnings = Warnings::default();
        for i in 0..3 {
            warnings.push(Diagnostic::NarrowingWarning {
                node: NodeId::new(format!("node{i}")),
                port: PortId::new("port0"),
                location: String::new(),
            });
        }
        assert_eq!(warnings.0.len(), 3);
    }
}
