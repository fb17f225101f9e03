//! Constant folding for `Binary`/`Unary` nodes.
//!
//! When every operand traces back to a `Literal`, evaluate the operator at
//! compile time, reattach the node's consumers onto a freshly minted
//! `Literal`, and delete the operator node plus any operand literal that
//! has no other consumer left.

use flowir_core::id::{NodeId, PortId};
use flowir_core::module::Module;
use flowir_core::node::{LiteralValue, Node, NodeKind};
use flowir_core::ops::{BinaryOp, UnaryOp};
use flowir_core::port::Direction;

use crate::error::OptError;
use crate::support::{detach_from_parent, literal_source};
use crate::walk::descendants;

fn as_f64(v: &LiteralValue) -> f64 {
    match v {
        LiteralValue::Integer(i) => *i as f64,
        LiteralValue::Real(r) => *r,
        LiteralValue::Boolean(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
    }
}

/// Evaluates a binary op over two literals, producing a result of the
/// wider numeric kind (matching `flowir_build::typecheck::common_numeric_type`'s
/// real-wins-over-integer rule) for arithmetic, and a `Boolean` for
/// comparisons/logical ops.
fn eval_binary(op: BinaryOp, l: &LiteralValue, r: &LiteralValue) -> Option<LiteralValue> {
    if op.is_logical() {
        let (LiteralValue::Boolean(a), LiteralValue::Boolean(b)) = (l, r) else {
            return None;
        };
        return Some(LiteralValue::Boolean(match op {
            BinaryOp::And => *a && *b,
            BinaryOp::Or => *a || *b,
            _ => unreachable!(),
        }));
    }

    let (a, b) = (as_f64(l), as_f64(r));
    if op.is_comparison() {
        let result = match op {
            BinaryOp::Eq => a == b,
            BinaryOp::Ne => a != b,
            BinaryOp::Lt => a < b,
            BinaryOp::Le => a <= b,
            BinaryOp::Gt => a > b,
            BinaryOp::Ge => a >= b,
            _ => unreachable!(),
        };
        return Some(LiteralValue::Boolean(result));
    }

    let both_integer = matches!((l, r), (LiteralValue::Integer(_), LiteralValue::Integer(_)));
    let result = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => {
            if b == 0.0 {
                return None;
            }
            a / b
        }
        BinaryOp::Mod => {
            if b == 0.0 {
                return None;
            }
            a % b
        }
        BinaryOp::Pow => a.powf(b),
        _ => unreachable!(),
    };
    Some(if both_integer { LiteralValue::Integer(result as i64) } else { LiteralValue::Real(result) })
}

fn eval_unary(op: UnaryOp, v: &LiteralValue) -> Option<LiteralValue> {
    match (op, v) {
        (UnaryOp::Neg, LiteralValue::Integer(i)) => Some(LiteralValue::Integer(-i)),
        (UnaryOp::Neg, LiteralValue::Real(r)) => Some(LiteralValue::Real(-r)),
        (UnaryOp::Not, LiteralValue::Boolean(b)) => Some(LiteralValue::Boolean(!b)),
        _ => None,
    }
}

/// Replaces `old` (a `Binary`/`Unary` node with exactly one out port) with a
/// new `Literal` carrying `value`: reattaches every consumer of `old`'s
/// output, then deletes `old` and any of `operand_ids` left with no
/// remaining consumer on any of their output ports.
fn replace_with_literal(module: &mut Module, old: &NodeId, value: LiteralValue, operand_ids: &[NodeId]) -> Result<(), OptError> {
    let (parent, out_port, out_ty) = {
        let node = module.get_node(old)?;
        let out_port = node.out_ports[0].clone();
        let ty = module.get_port(&out_port)?.ty.clone();
        (node.parent.clone(), out_port, ty)
    };

    let literal_id = module.next_node_id();
    module.add_node(Node::new(literal_id.clone(), NodeKind::Literal { value }));
    module.get_node_mut(&literal_id)?.parent = parent.clone();
    if let Some(parent_id) = &parent {
        module.get_node_mut(parent_id)?.nodes.push(literal_id.clone());
    }
    let literal_out = module.create_port(literal_id.clone(), "value", out_ty, Direction::Out)?;

    let edge_ids: Vec<_> = module.outgoing_edges(&out_port).into_iter().map(|edge| edge.id.clone()).collect();
    for edge_id in edge_ids {
        module.reattach_origin(&edge_id, literal_out.clone())?;
    }

    module.delete_node(old, true)?;
    detach_from_parent(module, &parent, old)?;

    for operand in operand_ids {
        let still_used = module
            .get_node(operand)
            .map(|n| n.out_ports.iter().any(|p| !module.outgoing_edges(p).is_empty()))
            .unwrap_or(false);
        if !still_used {
            if let Ok(op_node) = module.get_node(operand) {
                let op_parent = op_node.parent.clone();
                module.delete_node(operand, true)?;
                detach_from_parent(module, &op_parent, operand)?;
            }
        }
    }
    Ok(())
}

pub fn run(module: &mut Module, root: &NodeId) -> Result<bool, OptError> {
    let mut changed = false;
    for node_id in descendants(module, root) {
        let node = match module.get_node(&node_id) {
            Ok(n) => n.clone(),
            Err(_) => continue,
        };
        match &node.kind {
            NodeKind::Binary { op } => {
                let left = literal_source(module, &node.in_ports[0]);
                let right = literal_source(module, &node.in_ports[1]);
                if let (Some((l_id, l_val)), Some((r_id, r_val))) = (left, right) {
                    if let Some(result) = eval_binary(*op, &l_val, &r_val) {
                        replace_with_literal(module, &node_id, result, &[l_id, r_id])?;
                        changed = true;
                    }
                }
            }
            NodeKind::Unary { op } => {
                if let Some((operand_id, value)) = literal_source(module, &node.in_ports[0]) {
                    if let Some(result) = eval_unary(*op, &value) {
                        replace_with_literal(module, &node_id, result, &[operand_id])?;
                        changed = true;
                    }
                }
            }
            _ => {}
        }
    }
    Ok(changed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowir_core::ops::BinaryOp;
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
    fn folds_two_integer_literals() {
        let mut m = Module::new();
        let root = m.next_node_id();
        m.add_node(Node::new(root.clone(), NodeKind::Body));

        let (_, l_out) = literal(&mut m, &root, LiteralValue::Integer(2), Type::integer());
        let (_, r_out) = literal(&mut m, &root, LiteralValue::Integer(3), Type::integer());

        let bin_id = m.next_node_id();
        m.add_node(Node::new(bin_id.clone(), NodeKind::Binary { op: BinaryOp::Add }));
        m.get_node_mut(&bin_id).unwrap().parent = Some(root.clone());
        m.get_node_mut(&root).unwrap().nodes.push(bin_id.clone());
        let in0 = m.create_port(bin_id.clone(), "left", Type::integer(), Direction::In).unwrap();
        let in1 = m.create_port(bin_id.clone(), "right", Type::integer(), Direction::In).unwrap();
        let out = m.create_port(bin_id.clone(), "result", Type::integer(), Direction::Out).unwrap();
        m.create_edge(l_out, in0).unwrap();
        m.create_edge(r_out, in1).unwrap();

        let consumer = m.next_node_id();
        m.add_node(Node::new(consumer.clone(), NodeKind::Unary { op: UnaryOp::Neg }));
        m.get_node_mut(&root).unwrap().nodes.push(consumer.clone());
        let consumer_in = m.create_port(consumer.clone(), "value", Type::integer(), Direction::In).unwrap();
        m.create_edge(out, consumer_in).unwrap();

        let changed = run(&mut m, &root).unwrap();
        assert!(changed);
        assert!(m.get_node(&bin_id).is_err(), "binary node should be removed");

        let consumer_node = m.get_node(&consumer).unwrap();
        let edge = m.incoming_edge(&consumer_node.in_ports[0]).unwrap();
        let source_node = m.get_node(&m.get_port(&edge.from).unwrap().node).unwrap();
        assert!(matches!(source_node.kind, NodeKind::Literal { value: LiteralValue::Integer(5) }));
    }

    #[test]
    fn division_by_literal_zero_is_not_folded() {
        let mut m = Module::new();
        let root = m.next_node_id();
        m.add_node(Node::new(root.clone(), NodeKind::Body));
        let (_, l_out) = literal(&mut m, &root, LiteralValue::Integer(1), Type::integer());
        let (_, r_out) = literal(&mut m, &root, LiteralValue::Integer(0), Type::integer());
        let bin_id = m.next_node_id();
        m.add_node(Node::new(bin_id.clone(), NodeKind::Binary { op: BinaryOp::Div }));
        m.get_node_mut(&bin_id).unwrap().parent = Some(root.clone());
        m.get_node_mut(&root).unwrap().nodes.push(bin_id.clone());
        let in0 = m.create_port(bin_id.clone(), "left", Type::integer(), Direction::In).unwrap();
        let in1 = m.create_port(bin_id.clone(), "right", Type::integer(), Direction::In).unwrap();
        m.create_port(bin_id.clone(), "result", Type::integer(), Direction::Out).unwrap();
        m.create_edge(l_out, in0).unwrap();
        m.create_edge(r_out, in1).unwrap();

        let changed = run(&mut m, &root).unwrap();
        assert!(!changed);
        assert!(m.get_node(&bin_id).is_ok());
    }
}
