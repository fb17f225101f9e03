//! Function metadata.
//!
//! A function's body lives as ordinary nodes owned by its root `Function`
//! node (`Node::nodes`); `FunctionDef` carries everything the builder,
//! optimizer and emitter need without walking the graph: its signature,
//! its pragmas, and whether it is the program's entry point.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::id::NodeId;
use crate::types::Type;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    pub ty: Type,
}

/// A pragma attached to a function, e.g. `max_time`. Values
/// are kept as a small closed set rather than raw JSON so the optimizer's
/// timeout-lifting pass can match on them directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PragmaValue {
    Number(f64),
    Text(String),
    Flag(bool),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDef {
    pub name: String,
    /// Root `Function` node for this function's body.
    pub root: NodeId,
    pub params: Vec<Param>,
    pub returns: Vec<Type>,
    pub pragmas: IndexMap<String, PragmaValue>,
}

impl FunctionDef {
    pub fn new(name: impl Into<String>, root: NodeId) -> Self {
        FunctionDef { name: name.into(), root, params: Vec::new(), returns: Vec::new(), pragmas: IndexMap::new() }
    }

    /// Is this the program's entry point? `main` is a function like any
    /// other except codegen treats it as the emitted translation unit's
    /// entry point.
    pub fn is_main(&self) -> bool {
        self.name == "main"
    }

    /// The `max_time` pragma, if present, in seconds.
    pub fn max_time(&self) -> Option<f64> {
        match self.pragmas.get("max_time") {
            Some(PragmaValue::Number(n)) => Some(*n),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_main_checks_name() {
        let f = FunctionDef::new("main", NodeId::new("node0"));
        assert!(f.is_main());
        let g = FunctionDef::new("helper", NodeId::new("node1"));
        assert!(!g.is_main());
    }

    #[test]
    fn max_time_reads_number_pragma() {
        let mut f = FunctionDef::new("slow", NodeId::new("node0"));
        f.pragmas.insert("max_time".to_string(), PragmaValue::Number(2.5));
        assert_eq!(f.max_time(), Some(2.5));
    }

    #[test]
    fn max_time_absent_returns_none() {
        let f = FunctionDef::new("fast", NodeId::new("node0"));
        assert_eq!(f.max_time(), None);
    }
}
