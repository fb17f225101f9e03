//! Ports: typed attachment points on a node.
//!
//! A port is a first-class entity rather than a bare index inlined on an
//! edge, because the data model here gives ports their own identity,
//! label and, for record-shaped values, a field-name index
//! (`port_to_name_index`).

use serde::{Deserialize, Serialize};

use crate::id::{NodeId, PortId};
use crate::types::Type;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    In,
    Out,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Port {
    pub id: PortId,
    pub node: NodeId,
    /// Position within the node's in-port or out-port list (direction-scoped).
    pub index: u32,
    pub label: String,
    pub ty: Type,
    pub direction: Direction,
    /// For a port carrying a `Record` value, the field name each sub-index
    /// corresponds to (used by `RecordInit`/`RecordAccess` emission to
    /// recover field names from a flat port list -- ).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_names: Option<Vec<String>>,
}

impl Port {
    pub fn new(id: PortId, node: NodeId, index: u32, label: impl Into<String>, ty: Type, direction: Direction) -> Self {
        Port { id, node, index, label: label.into(), ty, direction, field_names: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_construction_defaults_field_names_to_none() {
        let p = Port::new(PortId::new("port0"), NodeId::new("node0"), 0, "value", Type::integer(), Direction::Out);
        assert!(p.field_names.is_none());
        assert_eq!(p.direction, Direction::Out);
    }
}
