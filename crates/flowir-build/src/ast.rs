//! Input AST shape consumed by the builder pass.
//!
//! Grammar and lexing are out of scope (Non-goals): the builder
//! consumes an already-parsed AST, deserialized from JSON, the same way
//! `flowir-emit`'s wire format consumes an already-built graph. Every node
//! carries a `location` string purely for diagnostic rendering.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use flowir_core::node::LiteralValue;
use flowir_core::ops::{BinaryOp, ReductionOp, UnaryOp};
use flowir_core::types::Type;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Program {
    pub functions: Vec<FunctionAst>,
    #[serde(default)]
    pub definitions: Vec<DefinitionAst>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefinitionAst {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: Type,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamAst {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: Type,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionAst {
    pub name: String,
    #[serde(default)]
    pub params: Vec<ParamAst>,
    #[serde(default)]
    pub returns: Vec<Type>,
    #[serde(default)]
    pub pragmas: IndexMap<String, PragmaAst>,
    pub body: Vec<ExprAst>,
    #[serde(default)]
    pub location: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PragmaAst {
    Number(f64),
    Text(String),
    Flag(bool),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum ExprAst {
    Literal { value: LiteralValue, location: String },
    Identifier { name: String, location: String },
    Binary { op: BinaryOp, left: Box<ExprAst>, right: Box<ExprAst>, location: String },
    Unary { op: UnaryOp, operand: Box<ExprAst>, location: String },
    If { branches: Vec<BranchAst>, location: String },
    Let { bindings: Vec<BindingAst>, body: Vec<ExprAst>, location: String },
    /// `body` is a sequence of named per-iteration definitions (not bare
    /// expressions): each one's value becomes visible under its name to
    /// later body definitions, the condition, and the reductions, the same
    /// way `Let`'s `Init` bindings are.
    Loop { ranges: Vec<RangeAst>, body: Vec<BindingAst>, reductions: Vec<ReductionAst>, location: String },
    Call {
        callee: String,
        args: Vec<ExprAst>,
        #[serde(default)]
        pragmas: IndexMap<String, PragmaAst>,
        location: String,
    },
    ArrayLiteral { elements: Vec<ExprAst>, location: String },
    ArrayAccess { array: Box<ExprAst>, indices: Vec<ExprAst>, location: String },
    RecordLiteral { fields: IndexMap<String, ExprAst>, location: String },
    RecordAccess { record: Box<ExprAst>, field: String, location: String },
    /// References a loop-carried variable's previous-iteration value
    /// (`OldValue`).
    OldValue { name: String, location: String },
}

impl ExprAst {
    pub fn location(&self) -> &str {
        match self {
            ExprAst::Literal { location, .. }
            | ExprAst::Identifier { location, .. }
            | ExprAst::Binary { location, .. }
            | ExprAst::Unary { location, .. }
            | ExprAst::If { location, .. }
            | ExprAst::Let { location, .. }
            | ExprAst::Loop { location, .. }
            | ExprAst::Call { location, .. }
            | ExprAst::ArrayLiteral { location, .. }
            | ExprAst::ArrayAccess { location, .. }
            | ExprAst::RecordLiteral { location, .. }
            | ExprAst::RecordAccess { location, .. }
            | ExprAst::OldValue { location, .. } => location,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BindingAst {
    pub name: String,
    pub value: ExprAst,
}

/// One `If` arm. `condition: None` marks the trailing `Else` (:
/// every `If` has exactly one `Then`, zero or more `ElseIf`, and an
/// optional trailing `Else`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BranchAst {
    pub condition: Option<ExprAst>,
    pub body: Vec<ExprAst>,
    #[serde(default)]
    pub location: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RangeAst {
    pub variable: String,
    pub start: ExprAst,
    pub end: ExprAst,
    #[serde(default)]
    pub location: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReductionAst {
    pub variable: String,
    pub op: ReductionOp,
    pub value: ExprAst,
    #[serde(default)]
    pub location: String,
}
