//! Small helpers shared across passes.

use flowir_core::id::{NodeId, PortId};
use flowir_core::module::Module;
use flowir_core::node::{LiteralValue, NodeKind};

/// If `port` (an input port) is fed by a `Literal` node, return that node's
/// id and value.
pub fn literal_source(module: &Module, port: &PortId) -> Option<(NodeId, LiteralValue)> {
    let edge = module.incoming_edge(port)?;
    let source_port = module.get_port(&edge.from).ok()?;
    let node = module.get_node(&source_port.node).ok()?;
    match &node.kind {
        NodeKind::Literal { value } => Some((node.id.clone(), value.clone())),
        _ => None,
    }
}

/// Redirects every consumer of `old_out` onto `new_source` (an output port),
/// leaving `new_source`'s own producer untouched. Used whenever a pass
/// determines a node's result is equal to some other port's value, without
/// needing to synthesize a new node.
pub fn redirect_consumers(module: &mut Module, old_out: &PortId, new_source: PortId) -> Result<(), flowir_core::error::CoreError> {
    let edge_ids: Vec<_> = module.outgoing_edges(old_out).into_iter().map(|edge| edge.id.clone()).collect();
    for edge_id in edge_ids {
        module.reattach_origin(&edge_id, new_source.clone())?;
    }
    Ok(())
}

/// Detaches `node_id` from its parent's `nodes` list after it has already
/// been removed from the module via `delete_node`.
pub fn detach_from_parent(module: &mut Module, parent: &Option<NodeId>, node_id: &NodeId) -> Result<(), flowir_core::error::CoreError> {
    if let Some(parent_id) = parent {
        module.get_node_mut(parent_id)?.nodes.retain(|n| n != node_id);
    }
    Ok(())
}

/// The out-ports of the last direct child of `container`, in order. This is
/// the structural convention the builder relies on everywhere a container's
/// own result ports are virtual: the value is
/// whatever the last statement produced.
pub fn last_statement_out_ports(module: &Module, container: &NodeId) -> Option<Vec<PortId>> {
    let node = module.get_node(container).ok()?;
    let last = node.nodes.last()?;
    Some(module.get_node(last).ok()?.out_ports.clone())
}
