//! Dead code elimination, ordered last: every other pass
//! leaves its discarded operands and branches unreachable rather than
//! deleting them itself, and this pass sweeps them up.
//!
//! Only non-cluster (leaf/expression) nodes are candidates -- containers
//! (`Let`, `If`, `Loop`, ...) are never deleted directly, only as part of
//! a parent's cascading delete or by a pass that understands their
//! specific fold (`conditional_collapse`, `let_inline`). A node whose
//! output feeds no edge is dead *unless* it is the last statement of a
//! `Body`/`Function` -- that position is exactly where the builder reads
//! a container's virtual result from, so it carries no real
//! edge by construction and must not be mistaken for dead code.

use flowir_core::id::NodeId;
use flowir_core::module::Module;
use flowir_core::node::NodeKind;

use crate::error::OptError;
use crate::walk::descendants;

fn is_protected_last_statement(module: &Module, node_id: &NodeId, parent_id: &NodeId) -> bool {
    let Ok(parent) = module.get_node(parent_id) else { return false };
    if !matches!(parent.kind, NodeKind::Body | NodeKind::Function { .. }) {
        return false;
    }
    parent.nodes.last() == Some(node_id)
}

fn is_dead(module: &Module, node_id: &NodeId) -> bool {
    let Ok(node) = module.get_node(node_id) else { return false };
    if node.kind.is_cluster() {
        return false;
    }
    let Some(parent_id) = &node.parent else { return false };
    if is_protected_last_statement(module, node_id, parent_id) {
        return false;
    }
    node.out_ports.iter().all(|p| module.outgoing_edges(p).is_empty())
}

pub fn run(module: &mut Module, root: &NodeId) -> Result<bool, OptError> {
    let mut changed = false;
    for node_id in descendants(module, root) {
        if !is_dead(module, &node_id) {
            continue;
        }
        let parent_id = module.get_node(&node_id)?.parent.clone();
        module.delete_node(&node_id, true)?;
        if let Some(parent_id) = parent_id {
            module.get_node_mut(&parent_id)?.nodes.retain(|n| *n != node_id);
        }
        changed = true;
    }
    Ok(changed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowir_core::node::{LiteralValue, Node};
    use flowir_core::port::Direction;
    use flowir_core::types::Type;

    #[test]
    fn unused_literal_is_removed_but_last_statement_survives() {
        let mut m = Module::new();
        let root = m.next_node_id();
        m.add_node(Node::new(root.clone(), NodeKind::Function { name: "f".into() }));

        let dead_id = m.next_node_id();
        m.add_node(Node::new(dead_id.clone(), NodeKind::Literal { value: LiteralValue::Integer(1) }));
        m.get_node_mut(&dead_id).unwrap().parent = Some(root.clone());
        m.get_node_mut(&root).unwrap().nodes.push(dead_id.clone());
        m.create_port(dead_id.clone(), "value", Type::integer(), Direction::Out).unwrap();

        let live_id = m.next_node_id();
        m.add_node(Node::new(live_id.clone(), NodeKind::Literal { value: LiteralValue::Integer(2) }));
        m.get_node_mut(&live_id).unwrap().parent = Some(root.clone());
        m.get_node_mut(&root).unwrap().nodes.push(live_id.clone());
        m.create_port(live_id.clone(), "value", Type::integer(), Direction::Out).unwrap();

        let changed = run(&mut m, &root).unwrap();
        assert!(changed);
        assert!(m.get_node(&dead_id).is_err());
        assert!(m.get_node(&live_id).is_ok(), "last statement must survive even with no outgoing edges");
    }
}
