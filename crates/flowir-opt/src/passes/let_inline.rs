//! Inlines literal `Let` bindings and collapses a fully-inlined `Let` into
//! its `Body`.
//!
//! A binding's value is already wired directly to its uses by edge (this
//! IR has no separate "variable reference" indirection to rewrite), so the
//! only structural work is hoisting a literal binding out of `Init` into
//! the `Let`'s own container -- once `Init` has nothing left to evaluate,
//! the `Let` contributes nothing beyond its `Body` and is replaced by it.

use flowir_core::id::NodeId;
use flowir_core::module::Module;
use flowir_core::node::{NodeKind, SubregionSlot};

use crate::error::OptError;
use crate::support::redirect_consumers;
use crate::walk::descendants;

pub fn run(module: &mut Module, root: &NodeId) -> Result<bool, OptError> {
    let mut changed = false;
    for node_id in descendants(module, root) {
        let node = match module.get_node(&node_id) {
            Ok(n) => n.clone(),
            Err(_) => continue,
        };
        if !matches!(node.kind, NodeKind::Let) {
            continue;
        }
        let Some(let_parent) = node.parent.clone() else { continue };
        let Some(init_id) = node.subregions.get(&SubregionSlot::Init).cloned() else { continue };
        let Some(body_id) = node.subregions.get(&SubregionSlot::Body).cloned() else { continue };

        let literal_children: Vec<NodeId> = module
            .get_node(&init_id)?
            .nodes
            .iter()
            .filter(|c| module.get_node(c).map(|n| matches!(n.kind, NodeKind::Literal { .. })).unwrap_or(false))
            .cloned()
            .collect();

        if !literal_children.is_empty() {
            let insert_at = module.get_node(&let_parent)?.nodes.iter().position(|n| *n == node_id).unwrap_or(0);
            module.get_node_mut(&init_id)?.nodes.retain(|c| !literal_children.contains(c));
            for (offset, lit_id) in literal_children.iter().enumerate() {
                module.get_node_mut(lit_id)?.parent = Some(let_parent.clone());
                module.get_node_mut(&let_parent)?.nodes.insert(insert_at + offset, lit_id.clone());
            }
            changed = true;
        }

        if module.get_node(&init_id)?.nodes.is_empty() {
            let let_outs = node.out_ports.clone();
            let body_outs = module.get_node(&body_id)?.out_ports.clone();
            if let_outs.len() != body_outs.len() {
                continue;
            }

            module.get_node_mut(&node_id)?.subregions.shift_remove(&SubregionSlot::Body);
            module.get_node_mut(&body_id)?.parent = Some(let_parent.clone());

            let parent = module.get_node_mut(&let_parent)?;
            if let Some(pos) = parent.nodes.iter().position(|n| *n == node_id) {
                parent.nodes[pos] = body_id.clone();
            }

            for (let_out, body_out) in let_outs.iter().zip(body_outs.iter()) {
                redirect_consumers(module, let_out, body_out.clone())?;
            }

            module.delete_node(&node_id, true)?;
            changed = true;
        }
    }
    Ok(changed)
}
