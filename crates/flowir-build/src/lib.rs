//! The builder crate: lowers a parsed AST into a `flowir-core` [`Module`](flowir_core::module::Module)
//! and performs static type/scope checking along the way.
//!
//! Entry point: construct a [`Module`](flowir_core::module::Module), wrap it
//! in a [`Builder`], call [`Builder::build_program`], then inspect
//! `builder.warnings` for any accumulated `NarrowingWarning`s.

pub mod ast;
pub mod builder;
pub mod error;
pub mod scope;
pub mod typecheck;

pub use ast::{BindingAst, BranchAst, DefinitionAst, ExprAst, FunctionAst, ParamAst, PragmaAst, Program, RangeAst, ReductionAst};
pub use builder::{copy_ports_from_scope, copy_ports_from_targets, copy_results_ports, Builder};
pub use error::BuildError;
pub use scope::Scope;
