//! Core error types for flowir-core.
//!
//! Covers structural failures in the graph data model itself -- bad ids,
//! port/arity mismatches, invariant violations raised by [`crate::module::Module`]'s
//! mutation API. Higher-level semantic diagnostics (type mismatches,
//! unresolved identifiers, pragma errors -- ) live in
//! `flowir-build::diagnostics` since they require builder/type-checker
//! context this crate doesn't have.

use thiserror::Error;

use crate::id::{FunctionId, NodeId, PortId};

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("node not found: {0}")]
    NodeNotFound(NodeId),

    #[error("port not found: {0}")]
    PortNotFound(PortId),

    #[error("function not found: {0}")]
    FunctionNotFound(FunctionId),

    #[error("input port {0} already has an incoming edge")]
    PortAlreadyConnected(PortId),

    #[error("edge endpoints have incompatible directions: {from} -> {to}")]
    DirectionMismatch { from: PortId, to: PortId },

    #[error("cannot connect {from} ({from_ty}) to {to} ({to_ty}): incompatible types")]
    EdgeTypeMismatch { from: PortId, to: PortId, from_ty: String, to_ty: String },

    #[error("{reason} when swapping {src} with {dst}")]
    PortConfigurationMismatch { reason: String, src: NodeId, dst: NodeId },

    #[error("duplicate definition: '{name}'")]
    DuplicateDefinition { name: String },

    #[error("graph inconsistency: {reason}")]
    GraphInconsistency { reason: String },
}
