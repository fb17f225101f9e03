//! The closed node-kind set.
//!
//! A `Node` is a generic container: its `kind` carries only the data that
//! varies per kind (an operator, a literal value, a callee...), while
//! containment (child statements, named subregions, `If` branches) is
//! represented uniformly on `Node` itself: every node has the same fields,
//! most of them empty for most kinds.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::function::PragmaValue;
use crate::id::{FunctionId, NodeId, PortId};
use crate::ops::{BinaryOp, ReductionOp, UnaryOp};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum LiteralValue {
    Integer(i64),
    Real(f64),
    Boolean(bool),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BranchKind {
    Then,
    ElseIf,
    Else,
}

/// Named subregions a node may own, keyed uniformly instead of as distinct
/// struct fields per node kind (`Let` uses `Init`/`Body`; `Loop` uses all
/// seven; `If`'s per-branch `Condition` lives on the `Branch` node itself).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SubregionSlot {
    Condition,
    Init,
    Body,
    RangeGen,
    PreCondition,
    PostCondition,
    Returns,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum NodeKind {
    /// A function's root node; also the envelope used for `main`.
    Function { name: String },
    FunctionCall { callee: FunctionId },
    BuiltInCall { name: String },
    Literal { value: LiteralValue },
    /// A temporary reference to a scope-bound value, resolved away during
    /// the builder pass -- never survives into the
    /// optimizer/emitter stages.
    Identifier { name: String },
    Binary { op: BinaryOp },
    Unary { op: UnaryOp },
    If,
    Branch { kind: BranchKind },
    Condition,
    Let,
    Init,
    Body,
    Loop,
    RangeGen,
    Range,
    RangeNumeric,
    Scatter,
    PreCondition,
    PostCondition,
    Returns,
    Reduction { op: ReductionOp },
    /// References a loop-carried variable's value from the previous
    /// iteration.
    OldValue,
    ArrayAccess,
    ArrayInit,
    RecordAccess { field: String },
    RecordInit,
}

impl NodeKind {
    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Function { .. } => "Function",
            NodeKind::FunctionCall { .. } => "FunctionCall",
            NodeKind::BuiltInCall { .. } => "BuiltInCall",
            NodeKind::Literal { .. } => "Literal",
            NodeKind::Identifier { .. } => "Identifier",
            NodeKind::Binary { .. } => "Binary",
            NodeKind::Unary { .. } => "Unary",
            NodeKind::If => "If",
            NodeKind::Branch { .. } => "Branch",
            NodeKind::Condition => "Condition",
            NodeKind::Let => "Let",
            NodeKind::Init => "Init",
            NodeKind::Body => "Body",
            NodeKind::Loop => "Loop",
            NodeKind::RangeGen => "RangeGen",
            NodeKind::Range => "Range",
            NodeKind::RangeNumeric => "RangeNumeric",
            NodeKind::Scatter => "Scatter",
            NodeKind::PreCondition => "PreCondition",
            NodeKind::PostCondition => "PostCondition",
            NodeKind::Returns => "Returns",
            NodeKind::Reduction { .. } => "Reduction",
            NodeKind::OldValue => "OldValue",
            NodeKind::ArrayAccess => "ArrayAccess",
            NodeKind::ArrayInit => "ArrayInit",
            NodeKind::RecordAccess { .. } => "RecordAccess",
            NodeKind::RecordInit => "RecordInit",
        }
    }

    /// Is this node a "cluster" -- i.e. does it own nested nodes/subregions
    /// that must cascade-delete with it?
    pub fn is_cluster(&self) -> bool {
        matches!(
            self,
            NodeKind::Function { .. }
                | NodeKind::If
                | NodeKind::Branch { .. }
                | NodeKind::Let
                | NodeKind::Init
                | NodeKind::Body
                | NodeKind::Loop
                | NodeKind::RangeGen
                | NodeKind::Condition
                | NodeKind::PreCondition
                | NodeKind::PostCondition
                | NodeKind::Returns
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub kind: NodeKind,
    pub in_ports: Vec<PortId>,
    pub out_ports: Vec<PortId>,
    /// The node containing this one (for cascading delete and scope lookup).
    pub parent: Option<NodeId>,
    /// Direct child statement nodes, e.g. a `Body`'s ordered statement list
    /// or a `Function`'s top-level statements.
    pub nodes: Vec<NodeId>,
    /// Named subregions this node owns (`Loop`'s `Init`/`RangeGen`/`Body`/...).
    pub subregions: IndexMap<SubregionSlot, NodeId>,
    /// `If`'s ordered `Branch` children (Then, any ElseIfs, optional Else).
    pub branches: Vec<NodeId>,
    /// Pragmas attached directly to this node. Only
    /// `Call`-shaped expressions carry these today -- `max_time` on a call
    /// site is the one case the source language actually expresses; other
    /// node kinds keep this empty.
    pub pragmas: IndexMap<String, PragmaValue>,
}

impl Node {
    pub fn new(id: NodeId, kind: NodeKind) -> Self {
        Node {
            id,
            kind,
            in_ports: Vec::new(),
            out_ports: Vec::new(),
            parent: None,
            nodes: Vec::new(),
            subregions: IndexMap::new(),
            branches: Vec::new(),
            pragmas: IndexMap::new(),
        }
    }

    /// The `max_time` pragma, if present, in seconds.
    pub fn max_time(&self) -> Option<f64> {
        match self.pragmas.get("max_time") {
            Some(PragmaValue::Number(n)) => Some(*n),
            _ => None,
        }
    }

    pub fn is_cluster(&self) -> bool {
        self.kind.is_cluster()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_name_matches_kind() {
        let n = Node::new(NodeId::new("node0"), NodeKind::If);
        assert_eq!(n.kind.name(), "If");
    }

    #[test]
    fn clusters_include_loop_and_let_leaves_include_literal() {
        assert!(NodeKind::Loop.is_cluster());
        assert!(NodeKind::Let.is_cluster());
        assert!(!NodeKind::Literal { value: LiteralValue::Integer(1) }.is_cluster());
        assert!(!NodeKind::Binary { op: BinaryOp::Add }.is_cluster());
    }

    #[test]
    fn subregion_slots_are_orderable_for_indexmap_keys() {
        let mut regions = IndexMap::new();
        regions.insert(SubregionSlot::Init, NodeId::new("node1"));
        regions.insert(SubregionSlot::Body, NodeId::new("node2"));
        assert_eq!(regions.get(&SubregionSlot::Init), Some(&NodeId::new("node1")));
    }
}
