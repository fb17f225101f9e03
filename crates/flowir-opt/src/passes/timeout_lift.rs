//! Timeout lifting, run before emission rather than as part
//! of the constant-folding/dead-elim fixpoint: extracts a `max_time`
//! tagged expression into its own function so the emitter can handle every
//! timed computation with one mechanism (a time-limited call template).
//!
//! "Same pragma group" (what gets pulled backward into the lifted region)
//! is concretized here as: a producer joins the
//! region iff every one of its outgoing edges feeds a node already in the
//! region. A producer also feeding something outside stays put and
//! becomes a boundary input instead. The lifted region's outputs are the
//! tagged node's own out-ports; other region nodes leaking a value outside
//! the region is not supported (no construct in this language produces
//! that shape in practice -- a pragma sits on a single call expression).

use std::collections::{HashMap, HashSet};

use flowir_core::function::{FunctionDef, Param, PragmaValue};
use flowir_core::id::{FunctionId, NodeId, PortId};
use flowir_core::module::Module;
use flowir_core::node::NodeKind;
use flowir_core::port::Direction;

use crate::error::OptError;
use crate::walk::descendants;

fn synthesized_name(tagged: &NodeId) -> String {
    let digits: String = tagged.as_str().chars().filter(|c| c.is_ascii_digit()).collect();
    format!("service_function{}_for_timed_expression", if digits.is_empty() { "0".to_string() } else { digits })
}

fn find_tagged_node(module: &Module) -> Option<NodeId> {
    let roots: Vec<NodeId> = module.functions.values().map(|d| d.root.clone()).collect();
    for root in roots {
        for node_id in descendants(module, &root) {
            if let Ok(node) = module.get_node(&node_id) {
                if !matches!(node.kind, NodeKind::Function { .. }) && node.max_time().is_some() {
                    return Some(node_id);
                }
            }
        }
    }
    None
}

/// Backward closure of `tagged`: a producer is pulled in only if every
/// consumer of every one of its out-ports is already in the region.
fn compute_region(module: &Module, tagged: &NodeId) -> HashSet<NodeId> {
    let mut region = HashSet::new();
    region.insert(tagged.clone());
    loop {
        let mut added = false;
        let frontier: Vec<NodeId> = region.iter().cloned().collect();
        for node_id in frontier {
            let Ok(node) = module.get_node(&node_id) else { continue };
            for in_port in &node.in_ports {
                let Some(edge) = module.incoming_edge(in_port) else { continue };
                let Ok(source_port) = module.get_port(&edge.from) else { continue };
                let source_node = source_port.node.clone();
                if region.contains(&source_node) {
                    continue;
                }
                let Ok(source) = module.get_node(&source_node) else { continue };
                let wholly_internal = source.out_ports.iter().all(|p| module.outgoing_edges(p).iter().all(|e| region.contains(&e.to_node(module))));
                if wholly_internal {
                    region.insert(source_node);
                    added = true;
                }
            }
        }
        if !added {
            break;
        }
    }
    region
}

trait EdgeNodeExt {
    fn to_node(&self, module: &Module) -> NodeId;
}
impl EdgeNodeExt for flowir_core::edge::Edge {
    fn to_node(&self, module: &Module) -> NodeId {
        module.get_port(&self.to).map(|p| p.node.clone()).unwrap_or_else(|_| NodeId(self.to.0.clone()))
    }
}

pub fn run(module: &mut Module) -> Result<bool, OptError> {
    let Some(tagged) = find_tagged_node(module) else { return Ok(false) };
    let region = compute_region(module, &tagged);

    let tagged_node = module.get_node(&tagged)?.clone();
    let original_parent = tagged_node.parent.clone();

    // Deduplicated boundary inputs: source port -> this function's param index.
    let mut param_index: HashMap<PortId, usize> = HashMap::new();
    let mut param_ports: Vec<PortId> = Vec::new();
    let mut boundary_edges: Vec<(NodeId, PortId)> = Vec::new(); // (region node, its in-port fed from outside)
    for node_id in &region {
        let node = module.get_node(node_id)?;
        for in_port in &node.in_ports {
            if let Some(edge) = module.incoming_edge(in_port) {
                let source_port = module.get_port(&edge.from)?;
                if !region.contains(&source_port.node) {
                    if !param_index.contains_key(&edge.from) {
                        param_index.insert(edge.from.clone(), param_ports.len());
                        param_ports.push(edge.from.clone());
                    }
                    boundary_edges.push((node_id.clone(), in_port.clone()));
                }
            }
        }
    }

    let fn_name = synthesized_name(&tagged);
    let fn_id = FunctionId::new(fn_name.clone());
    let new_root = module.next_node_id();
    module.add_node(flowir_core::node::Node::new(new_root.clone(), NodeKind::Function { name: fn_name.clone() }));

    let mut params = Vec::new();
    let mut new_param_ports = Vec::new();
    for (i, source_port) in param_ports.iter().enumerate() {
        let ty = module.get_port(source_port)?.ty.clone();
        let p = module.create_param_port(new_root.clone(), format!("arg{i}"), ty.clone())?;
        new_param_ports.push(p);
        params.push(Param { name: format!("arg{i}"), ty });
    }

    for (node_id, in_port) in &boundary_edges {
        let edge_id = module.incoming_edge(in_port).unwrap().id.clone();
        let source = module.get_port(&module.get_edge(&edge_id).unwrap().from)?.clone();
        let idx = param_index[&source.id];
        module.reattach_origin(&edge_id, new_param_ports[idx].clone())?;
        let _ = node_id;
    }

    // Reparent region nodes into the new function, tagged node last so the
    // "last statement is the virtual result" convention resolves its value.
    for node_id in &region {
        if let Some(parent_id) = &module.get_node(node_id)?.parent.clone() {
            module.get_node_mut(parent_id)?.nodes.retain(|n| n != node_id);
        }
        module.get_node_mut(node_id)?.parent = Some(new_root.clone());
    }
    for node_id in &region {
        if *node_id != tagged {
            module.get_node_mut(&new_root)?.nodes.push(node_id.clone());
        }
    }
    module.get_node_mut(&new_root)?.nodes.push(tagged.clone());

    let mut returns = Vec::new();
    for out_port in &tagged_node.out_ports {
        let ty = module.get_port(out_port)?.ty.clone();
        returns.push(ty.clone());
        module.create_port(new_root.clone(), format!("return{}", returns.len() - 1), ty, Direction::Out)?;
    }

    let max_time = tagged_node.max_time();
    let mut def = FunctionDef::new(fn_name, new_root);
    def.params = params;
    def.returns = returns;
    if let Some(seconds) = max_time {
        def.pragmas.insert("max_time".to_string(), PragmaValue::Number(seconds));
    }
    module.functions.insert(fn_id.clone(), def);

    let call_id = module.next_node_id();
    module.add_node(flowir_core::node::Node::new(call_id.clone(), NodeKind::FunctionCall { callee: fn_id }));
    module.get_node_mut(&call_id)?.parent = original_parent.clone();
    if let Some(seconds) = max_time {
        module.get_node_mut(&call_id)?.pragmas.insert("max_time".to_string(), PragmaValue::Number(seconds));
    }

    if let Some(parent_id) = &original_parent {
        let parent = module.get_node_mut(parent_id)?;
        if let Some(pos) = parent.nodes.iter().position(|n| *n == tagged) {
            parent.nodes[pos] = call_id.clone();
        } else {
            parent.nodes.push(call_id.clone());
        }
    }

    for (i, source_port) in param_ports.iter().enumerate() {
        let ty = module.get_port(source_port)?.ty.clone();
        let call_in = module.create_port(call_id.clone(), format!("arg{i}"), ty, Direction::In)?;
        module.create_edge(source_port.clone(), call_in)?;
    }

    let tagged_outs = tagged_node.out_ports.clone();
    for (i, out_port) in tagged_outs.iter().enumerate() {
        let ty = module.get_port(out_port)?.ty.clone();
        let call_out = module.create_port(call_id.clone(), format!("return{i}"), ty, Direction::Out)?;
        let mut edge_ids = Vec::new();
        for edge in module.outgoing_edges(out_port) {
            if !region.contains(&module.get_port(&edge.to)?.node) {
                edge_ids.push(edge.id.clone());
            }
        }
        for edge_id in edge_ids {
            module.reattach_origin(&edge_id, call_out.clone())?;
        }
    }

    module.get_node_mut(&tagged)?.pragmas.shift_remove("max_time");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowir_core::node::{LiteralValue, Node};
    use flowir_core::types::Type;

    #[test]
    fn lifts_tagged_call_into_its_own_function() {
        let mut m = Module::new();
        let main_root = m.next_node_id();
        m.add_node(Node::new(main_root.clone(), NodeKind::Function { name: "main".into() }));

        let arg_lit = m.next_node_id();
        m.add_node(Node::new(arg_lit.clone(), NodeKind::Literal { value: LiteralValue::Integer(9) }));
        m.get_node_mut(&arg_lit).unwrap().parent = Some(main_root.clone());
        m.get_node_mut(&main_root).unwrap().nodes.push(arg_lit.clone());
        let arg_out = m.create_port(arg_lit, "value", Type::integer(), Direction::Out).unwrap();

        let call_id = m.next_node_id();
        m.add_node(Node::new(call_id.clone(), NodeKind::BuiltInCall { name: "heavy".into() }));
        m.get_node_mut(&call_id).unwrap().parent = Some(main_root.clone());
        m.get_node_mut(&main_root).unwrap().nodes.push(call_id.clone());
        let call_in = m.create_port(call_id.clone(), "arg0", Type::integer(), Direction::In).unwrap();
        m.create_edge(arg_out.clone(), call_in).unwrap();
        let call_out = m.create_port(call_id.clone(), "result", Type::integer(), Direction::Out).unwrap();
        m.get_node_mut(&call_id).unwrap().pragmas.insert("max_time".to_string(), PragmaValue::Number(100.0));

        let consumer = m.next_node_id();
        m.add_node(Node::new(consumer.clone(), NodeKind::Unary { op: flowir_core::ops::UnaryOp::Neg }));
        m.get_node_mut(&main_root).unwrap().nodes.push(consumer.clone());
        let consumer_in = m.create_port(consumer.clone(), "value", Type::integer(), Direction::In).unwrap();
        m.create_edge(call_out, consumer_in).unwrap();

        let mut main_def = FunctionDef::new("main", main_root.clone());
        main_def.returns.push(Type::integer());
        m.functions.insert(FunctionId::new("main"), main_def);

        let changed = run(&mut m).unwrap();
        assert!(changed);
        assert!(m.get_node(&call_id).is_err(), "original call site node is moved into the new function");
        assert_eq!(m.functions.len(), 2);

        let main_nodes = m.get_node(&main_root).unwrap();
        let new_call = main_nodes.nodes.iter().find(|n| matches!(m.get_node(n).unwrap().kind, NodeKind::FunctionCall { .. })).cloned().unwrap();
        let new_call_node = m.get_node(&new_call).unwrap();
        assert!(new_call_node.max_time().is_some());

        let consumer_node = m.get_node(&consumer).unwrap();
        let edge = m.incoming_edge(&consumer_node.in_ports[0]).unwrap();
        assert_eq!(m.get_port(&edge.from).unwrap().node, new_call);
    }
}
