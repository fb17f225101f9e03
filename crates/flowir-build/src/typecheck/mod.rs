//! Static type checking used during the builder pass.
//!
//! [`coercion`] answers "can this flow from A to B"; [`rules`] answers "what
//! does this operator produce given its operand types"; [`diagnostics`]
//! defines the reportable outcomes of both. Both are pure -- they read
//! types but never touch the graph.

pub mod coercion;
pub mod diagnostics;
pub mod rules;

pub use coercion::{can_coerce, common_numeric_type, is_numeric, needs_narrowing_warning};
pub use diagnostics::{Diagnostic, Warnings};
pub use rules::{resolve_binary_rule, resolve_unary_rule, OpTypeRule};
