//! Edges connect an output port to an input port.
//!
//! Invariant: an input port has at most one incoming edge.
//! Output ports may fan out to many edges. [`crate::module::Module`] is the
//! only place edges are created or destroyed so this invariant can be
//! enforced centrally.

use serde::{Deserialize, Serialize};

use crate::id::PortId;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EdgeId(pub String);

impl EdgeId {
    pub fn new(raw: impl Into<String>) -> Self {
        EdgeId(raw.into())
    }
}

impl std::fmt::Display for EdgeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub id: EdgeId,
    pub from: PortId,
    pub to: PortId,
}

impl Edge {
    pub fn new(id: EdgeId, from: PortId, to: PortId) -> Self {
        Edge { id, from, to }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edge_display_is_its_id() {
        let e = Edge::new(EdgeId::new("edge0"), PortId::new("port0"), PortId::new("port1"));
        assert_eq!(e.id.to_string(), "edge0");
    }
}
