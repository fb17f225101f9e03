//! Stable ID newtypes for graph entities.
//!
//! IDs are strings on the wire (`"node3"`, `"port0"`) rather than dense
//! integers, since the module's free-list reuses retired node ids by name
//! (see [`crate::module::Module::next_node_id`]). Each kind is wrapped in
//! its own newtype so a `NodeId` cannot be accidentally used where a
//! `PortId` is expected.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(raw: impl Into<String>) -> Self {
                Self(raw.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

/// Identifies a node within a [`crate::module::Module`].
string_id!(NodeId);

/// Identifies a port belonging to a node.
string_id!(PortId);

/// Identifies a function within a module.
string_id!(FunctionId);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_display_as_their_string() {
        let id = NodeId::new("node7");
        assert_eq!(id.to_string(), "node7");
        assert_eq!(id.as_str(), "node7");
    }

    #[test]
    fn ids_compare_by_value() {
        assert_eq!(NodeId::new("node1"), NodeId::new("node1"));
        assert_ne!(NodeId::new("node1"), NodeId::new("node2"));
    }

    #[test]
    fn serde_roundtrip() {
        let id = PortId::new("port3");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"port3\"");
        let back: PortId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
    }
}
