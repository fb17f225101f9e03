//! Algebraic identity simplification for `Binary` nodes.
//!
//! Handles the two shapes an identity rewrite can take:
//! - passthrough: the node's result equals one of its operands verbatim
//!   (`x + 0`, `1 * x`, `x / 1`, `true && x`, `false || x`, ...);
//! - collapse: the node's result is a fixed literal regardless of the
//!   other operand (`0 * x`, `false && x`, `true || x`).
//!
//! Neither shape deletes the discarded operand's subtree -- it is left
//! unreachable from any output and cleaned up by the dead-elimination pass
//! that orders last.

use flowir_core::module::Module;
use flowir_core::node::{LiteralValue, Node, NodeKind};
use flowir_core::ops::{BinaryOp, UnaryOp};
use flowir_core::port::Direction;

use crate::error::OptError;
use crate::support::{detach_from_parent, literal_source, redirect_consumers};
use crate::walk::descendants;

enum Rewrite {
    /// Result equals the surviving in-port's source value.
    Passthrough(usize),
    /// Result is a fixed literal.
    Collapse(LiteralValue),
    /// Result is the surviving in-port's source value, negated.
    Negate(usize),
    /// Result is the numeric literal `1`, in whatever scalar kind the
    /// output port already carries (`x**0` collapses to `1` or `1.0`).
    CollapseOne,
}

fn rewrite_for(op: BinaryOp, left: Option<&LiteralValue>, right: Option<&LiteralValue>) -> Option<Rewrite> {
    use LiteralValue::{Boolean, Integer, Real};

    let is_zero = |v: &LiteralValue| matches!(v, Integer(0)) || matches!(v, Real(r) if *r == 0.0);
    let is_one = |v: &LiteralValue| matches!(v, Integer(1)) || matches!(v, Real(r) if *r == 1.0);

    match op {
        BinaryOp::Add => {
            if left.is_some_and(is_zero) {
                return Some(Rewrite::Passthrough(1));
            }
            if right.is_some_and(is_zero) {
                return Some(Rewrite::Passthrough(0));
            }
        }
        BinaryOp::Sub => {
            if right.is_some_and(is_zero) {
                return Some(Rewrite::Passthrough(0));
            }
            if left.is_some_and(is_zero) {
                return Some(Rewrite::Negate(1));
            }
        }
        BinaryOp::Mul => {
            if left.is_some_and(is_one) {
                return Some(Rewrite::Passthrough(1));
            }
            if right.is_some_and(is_one) {
                return Some(Rewrite::Passthrough(0));
            }
            if let Some(Integer(0)) = left {
                return Some(Rewrite::Collapse(Integer(0)));
            }
            if let Some(Real(r)) = left {
                if *r == 0.0 {
                    return Some(Rewrite::Collapse(Real(0.0)));
                }
            }
            if let Some(Integer(0)) = right {
                return Some(Rewrite::Collapse(Integer(0)));
            }
            if let Some(Real(r)) = right {
                if *r == 0.0 {
                    return Some(Rewrite::Collapse(Real(0.0)));
                }
            }
        }
        BinaryOp::Div => {
            if right.is_some_and(is_one) {
                return Some(Rewrite::Passthrough(0));
            }
        }
        BinaryOp::Pow => {
            if right.is_some_and(is_zero) {
                return Some(Rewrite::CollapseOne);
            }
            if right.is_some_and(is_one) {
                return Some(Rewrite::Passthrough(0));
            }
        }
        BinaryOp::And => {
            if let Some(Boolean(true)) = left {
                return Some(Rewrite::Passthrough(1));
            }
            if let Some(Boolean(true)) = right {
                return Some(Rewrite::Passthrough(0));
            }
            if let Some(Boolean(false)) = left {
                return Some(Rewrite::Collapse(Boolean(false)));
            }
            if let Some(Boolean(false)) = right {
                return Some(Rewrite::Collapse(Boolean(false)));
            }
        }
        BinaryOp::Or => {
            if let Some(Boolean(false)) = left {
                return Some(Rewrite::Passthrough(1));
            }
            if let Some(Boolean(false)) = right {
                return Some(Rewrite::Passthrough(0));
            }
            if let Some(Boolean(true)) = left {
                return Some(Rewrite::Collapse(Boolean(true)));
            }
            if let Some(Boolean(true)) = right {
                return Some(Rewrite::Collapse(Boolean(true)));
            }
        }
        _ => {}
    }
    None
}

pub fn run(module: &mut Module, root: &flowir_core::id::NodeId) -> Result<bool, OptError> {
    let mut changed = false;
    for node_id in descendants(module, root) {
        let node = match module.get_node(&node_id) {
            Ok(n) => n.clone(),
            Err(_) => continue,
        };
        let NodeKind::Binary { op } = node.kind else {
            continue;
        };
        let left = literal_source(module, &node.in_ports[0]);
        let right = literal_source(module, &node.in_ports[1]);
        let Some(rewrite) = rewrite_for(op, left.as_ref().map(|(_, v)| v), right.as_ref().map(|(_, v)| v)) else {
            continue;
        };

        let out_port = node.out_ports[0].clone();
        let parent = node.parent.clone();

        match rewrite {
            Rewrite::Passthrough(surviving_index) => {
                let surviving_in = &node.in_ports[surviving_index];
                let Some(source_edge) = module.incoming_edge(surviving_in) else {
                    continue;
                };
                let source = source_edge.from.clone();
                redirect_consumers(module, &out_port, source)?;
            }
            Rewrite::Collapse(value) => {
                let out_ty = module.get_port(&out_port)?.ty.clone();
                let literal_id = module.next_node_id();
                module.add_node(Node::new(literal_id.clone(), NodeKind::Literal { value }));
                module.get_node_mut(&literal_id)?.parent = parent.clone();
                if let Some(parent_id) = &parent {
                    module.get_node_mut(parent_id)?.nodes.push(literal_id.clone());
                }
                let literal_out = module.create_port(literal_id, "value", out_ty, Direction::Out)?;
                redirect_consumers(module, &out_port, literal_out)?;
            }
            Rewrite::CollapseOne => {
                let out_ty = module.get_port(&out_port)?.ty.clone();
                let value = if matches!(out_ty.kind, flowir_core::types::TypeKind::Scalar(flowir_core::types::ScalarKind::Real)) {
                    LiteralValue::Real(1.0)
                } else {
                    LiteralValue::Integer(1)
                };
                let literal_id = module.next_node_id();
                module.add_node(Node::new(literal_id.clone(), NodeKind::Literal { value }));
                module.get_node_mut(&literal_id)?.parent = parent.clone();
                if let Some(parent_id) = &parent {
                    module.get_node_mut(parent_id)?.nodes.push(literal_id.clone());
                }
                let literal_out = module.create_port(literal_id, "value", out_ty, Direction::Out)?;
                redirect_consumers(module, &out_port, literal_out)?;
            }
            Rewrite::Negate(surviving_index) => {
                let surviving_in = &node.in_ports[surviving_index];
                let Some(source_edge) = module.incoming_edge(surviving_in) else {
                    continue;
                };
                let source = source_edge.from.clone();
                let out_ty = module.get_port(&out_port)?.ty.clone();
                let unary_id = module.next_node_id();
                module.add_node(Node::new(unary_id.clone(), NodeKind::Unary { op: UnaryOp::Neg }));
                module.get_node_mut(&unary_id)?.parent = parent.clone();
                if let Some(parent_id) = &parent {
                    module.get_node_mut(parent_id)?.nodes.push(unary_id.clone());
                }
                let unary_in = module.create_port(unary_id.clone(), "value", out_ty.clone(), Direction::In)?;
                let unary_out = module.create_port(unary_id, "value", out_ty, Direction::Out)?;
                module.create_edge(source, unary_in)?;
                redirect_consumers(module, &out_port, unary_out)?;
            }
        }

        module.delete_node(&node_id, true)?;
        detach_from_parent(module, &parent, &node_id)?;
        changed = true;
    }
    Ok(changed)
}
