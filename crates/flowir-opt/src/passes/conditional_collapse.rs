//! Collapses an `If` whose branch conditions are all statically known
//!, replacing it with the selected branch's `Body`.
//!
//! A branch's result is a *virtual* port (see `flowir-build`'s builder
//! module doc) -- it carries no edge back to the value it mirrors. To
//! collapse an `If` we therefore resolve the chosen branch's value
//! structurally: the out-ports of the last statement in its `Body`, the
//! same convention the builder used when it created that virtual port in
//! the first place.

use flowir_core::id::{NodeId, PortId};
use flowir_core::module::Module;
use flowir_core::node::{LiteralValue, NodeKind, SubregionSlot};

use crate::error::OptError;
use crate::support::{last_statement_out_ports, literal_source, redirect_consumers};
use crate::walk::descendants;

/// Which branch is statically selected, if any: `false`-condition branches
/// are skipped, the first `true` or unconditional (`Else`) branch wins, and
/// a branch with a non-literal condition makes the whole `If` unresolvable.
fn select_branch(module: &Module, branches: &[NodeId]) -> Option<NodeId> {
    for branch_id in branches {
        let branch = module.get_node(branch_id).ok()?;
        match branch.subregions.get(&SubregionSlot::Condition) {
            None => return Some(branch_id.clone()),
            Some(cond_id) => {
                let cond_node = module.get_node(cond_id).ok()?;
                let test_port = cond_node.in_ports.first()?;
                match literal_source(module, test_port) {
                    Some((_, LiteralValue::Boolean(true))) => return Some(branch_id.clone()),
                    Some((_, LiteralValue::Boolean(false))) => continue,
                    _ => return None,
                }
            }
        }
    }
    None
}

pub fn run(module: &mut Module, root: &NodeId) -> Result<bool, OptError> {
    let mut changed = false;
    for node_id in descendants(module, root) {
        let node = match module.get_node(&node_id) {
            Ok(n) => n.clone(),
            Err(_) => continue,
        };
        if !matches!(node.kind, NodeKind::If) {
            continue;
        }
        let Some(branch_id) = select_branch(module, &node.branches) else {
            continue;
        };
        let Some(body_id) = module.get_node(&branch_id)?.subregions.get(&SubregionSlot::Body).cloned() else {
            continue;
        };
        let Some(result_ports) = last_statement_out_ports(module, &body_id) else {
            continue;
        };
        if result_ports.len() != node.out_ports.len() {
            continue;
        }

        module.get_node_mut(&branch_id)?.subregions.shift_remove(&SubregionSlot::Body);
        module.get_node_mut(&body_id)?.parent = node.parent.clone();

        if let Some(parent_id) = &node.parent {
            let parent = module.get_node_mut(parent_id)?;
            if let Some(pos) = parent.nodes.iter().position(|n| *n == node_id) {
                parent.nodes[pos] = body_id.clone();
            }
        }

        for (if_out, result_port) in node.out_ports.iter().zip(result_ports.iter()) {
            redirect_consumers(module, if_out, result_port.clone())?;
        }

        module.delete_node(&node_id, true)?;
        changed = true;
    }
    Ok(changed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowir_core::node::Node;
    use flowir_core::ops::BinaryOp;
    use flowir_core::port::Direction;
    use flowir_core::types::Type;

    fn literal(module: &mut Module, parent: &NodeId, value: LiteralValue, ty: Type) -> (NodeId, PortId) {
        let id = module.next_node_id();
        module.add_node(Node::new(id.clone(), NodeKind::Literal { value }));
        module.get_node_mut(&id).unwrap().parent = Some(parent.clone());
        module.get_node_mut(parent).unwrap().nodes.push(id.clone());
        let out = module.create_port(id.clone(), "value", ty, Direction::Out).unwrap();
        (id, out)
    }

    #[test]
    fn literal_true_condition_collapses_to_then_branch() {
        let mut m = Module::new();
        let root = m.next_node_id();
        m.add_node(Node::new(root.clone(), NodeKind::Body));

        let if_id = m.next_node_id();
        m.add_node(Node::new(if_id.clone(), NodeKind::If));
        m.get_node_mut(&if_id).unwrap().parent = Some(root.clone());
        m.get_node_mut(&root).unwrap().nodes.push(if_id.clone());
        let if_out = m.create_port(if_id.clone(), "result0", Type::integer(), Direction::Out).unwrap();

        let then_id = m.next_node_id();
        m.add_node(Node::new(then_id.clone(), NodeKind::Branch { kind: flowir_core::node::BranchKind::Then }));
        m.get_node_mut(&then_id).unwrap().parent = Some(if_id.clone());
        m.get_node_mut(&if_id).unwrap().branches.push(then_id.clone());

        let (_, true_out) = literal(&mut m, &root, LiteralValue::Boolean(true), Type::boolean());
        let cond_id = m.next_node_id();
        m.add_node(Node::new(cond_id.clone(), NodeKind::Condition));
        m.get_node_mut(&cond_id).unwrap().parent = Some(then_id.clone());
        let test_in = m.create_port(cond_id.clone(), "test", Type::boolean(), Direction::In).unwrap();
        m.create_edge(true_out, test_in).unwrap();
        m.get_node_mut(&then_id).unwrap().subregions.insert(SubregionSlot::Condition, cond_id);

        let then_body = m.next_node_id();
        m.add_node(Node::new(then_body.clone(), NodeKind::Body));
        m.get_node_mut(&then_body).unwrap().parent = Some(then_id.clone());
        m.get_node_mut(&then_id).unwrap().subregions.insert(SubregionSlot::Body, then_body.clone());
        let (then_lit_id, then_lit_out) = literal(&mut m, &then_body, LiteralValue::Integer(1), Type::integer());
        let _ = then_lit_id;
        m.create_port(then_id.clone(), "result0", Type::integer(), Direction::Out).unwrap();

        let else_id = m.next_node_id();
        m.add_node(Node::new(else_id.clone(), NodeKind::Branch { kind: flowir_core::node::BranchKind::Else }));
        m.get_node_mut(&else_id).unwrap().parent = Some(if_id.clone());
        m.get_node_mut(&if_id).unwrap().branches.push(else_id.clone());
        let else_body = m.next_node_id();
        m.add_node(Node::new(else_body.clone(), NodeKind::Body));
        m.get_node_mut(&else_body).unwrap().parent = Some(else_id.clone());
        m.get_node_mut(&else_id).unwrap().subregions.insert(SubregionSlot::Body, else_body.clone());
        literal(&mut m, &else_body, LiteralValue::Integer(2), Type::integer());
        m.create_port(else_id.clone(), "result0", Type::integer(), Direction::Out).unwrap();

        let consumer = m.next_node_id();
        m.add_node(Node::new(consumer.clone(), NodeKind::Unary { op: flowir_core::ops::UnaryOp::Neg }));
        m.get_node_mut(&root).unwrap().nodes.push(consumer.clone());
        let consumer_in = m.create_port(consumer.clone(), "value", Type::integer(), Direction::In).unwrap();
        m.create_edge(if_out, consumer_in).unwrap();

        let _ = BinaryOp::Add;
        let changed = run(&mut m, &root).unwrap();
        assert!(changed);
        assert!(m.get_node(&if_id).is_err());

        let consumer_node = m.get_node(&consumer).unwrap();
        let edge = m.incoming_edge(&consumer_node.in_ports[0]).unwrap();
        assert_eq!(edge.from, then_lit_out);
    }
}
