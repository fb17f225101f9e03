//! Inlines a user function called from exactly one call site, skipping a
//! function that only calls itself (that call site
//! would vanish along with the definition it is inlining into) and any
//! function carrying pragmas (a `max_time` budget names a unit of work;
//! inlining would erase the boundary the timeout-lifting pass needs).
//!
//! Unlike the other passes here this one is not rooted at a single
//! function: call counts are a whole-program property. It mutates one
//! eligible call site per invocation and returns, relying on the fixpoint
//! driver to call it again until nothing is left to inline.

use std::collections::HashMap;

use flowir_core::id::{FunctionId, NodeId};
use flowir_core::module::Module;
use flowir_core::node::NodeKind;

use crate::error::OptError;
use crate::support::{last_statement_out_ports, redirect_consumers};
use crate::walk::descendants;

struct CallSite {
    call_id: NodeId,
    caller_root: NodeId,
}

pub fn run(module: &mut Module) -> Result<bool, OptError> {
    let defs: Vec<(FunctionId, NodeId)> = module.functions.iter().map(|(k, v)| (k.clone(), v.root.clone())).collect();

    let mut call_sites: HashMap<FunctionId, Vec<CallSite>> = HashMap::new();
    for (_, root) in &defs {
        for node_id in descendants(module, root) {
            if let Ok(n) = module.get_node(&node_id) {
                if let NodeKind::FunctionCall { callee } = &n.kind {
                    call_sites.entry(callee.clone()).or_default().push(CallSite { call_id: node_id, caller_root: root.clone() });
                }
            }
        }
    }

    for (callee_id, sites) in call_sites {
        if sites.len() != 1 {
            continue;
        }
        let def = match module.functions.get(&callee_id) {
            Some(d) => d.clone(),
            None => continue,
        };
        if def.is_main() || !def.pragmas.is_empty() {
            continue;
        }
        let site = &sites[0];
        if site.caller_root == def.root {
            continue;
        }

        inline_call(module, site, &callee_id, &def)?;
        return Ok(true);
    }
    Ok(false)
}

fn inline_call(
    module: &mut Module,
    site: &CallSite,
    callee_id: &FunctionId,
    def: &flowir_core::function::FunctionDef,
) -> Result<(), OptError> {
    let call = module.get_node(&site.call_id)?.clone();
    let root_id = def.root.clone();
    let root = module.get_node(&root_id)?.clone();

    for (i, _) in def.params.iter().enumerate() {
        let param_port = root.in_ports[i].clone();
        let Some(arg_edge) = module.incoming_edge(&call.in_ports[i]) else { continue };
        let arg_source = arg_edge.from.clone();
        let feeding: Vec<_> = module.outgoing_edges(&param_port).iter().map(|e| e.id.clone()).collect();
        for edge_id in feeding {
            module.reattach_origin(&edge_id, arg_source.clone())?;
        }
    }

    if let Some(result_ports) = last_statement_out_ports(module, &root_id) {
        for (call_out, real_port) in call.out_ports.iter().zip(result_ports.iter()) {
            redirect_consumers(module, call_out, real_port.clone())?;
        }
    }

    module.get_node_mut(&root_id)?.kind = NodeKind::Body;
    module.get_node_mut(&root_id)?.parent = call.parent.clone();

    if let Some(parent_id) = &call.parent {
        let parent = module.get_node_mut(parent_id)?;
        if let Some(pos) = parent.nodes.iter().position(|n| *n == site.call_id) {
            parent.nodes[pos] = root_id.clone();
        }
    }

    module.delete_node(&site.call_id, true)?;
    module.functions.shift_remove(callee_id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowir_core::function::{FunctionDef, Param};
    use flowir_core::node::{LiteralValue, Node};
    use flowir_core::port::Direction;
    use flowir_core::types::Type;

    #[test]
    fn single_call_site_is_inlined() {
        let mut m = Module::new();

        let callee_root = m.next_node_id();
        m.add_node(Node::new(callee_root.clone(), NodeKind::Function { name: "double".into() }));
        let param_port = m.create_param_port(callee_root.clone(), "x", Type::integer()).unwrap();

        let double_id = m.next_node_id();
        m.add_node(Node::new(double_id.clone(), NodeKind::Binary { op: flowir_core::ops::BinaryOp::Add }));
        m.get_node_mut(&double_id).unwrap().parent = Some(callee_root.clone());
        m.get_node_mut(&callee_root).unwrap().nodes.push(double_id.clone());
        let in0 = m.create_port(double_id.clone(), "left", Type::integer(), Direction::In).unwrap();
        let in1 = m.create_port(double_id.clone(), "right", Type::integer(), Direction::In).unwrap();
        let double_out = m.create_port(double_id.clone(), "result", Type::integer(), Direction::Out).unwrap();
        m.create_edge(param_port.clone(), in0).unwrap();
        m.create_edge(param_port, in1).unwrap();
        m.create_port(callee_root.clone(), "return0", Type::integer(), Direction::Out).unwrap();

        let mut def = FunctionDef::new("double", callee_root.clone());
        def.params.push(Param { name: "x".into(), ty: Type::integer() });
        def.returns.push(Type::integer());
        let callee_id = FunctionId::new("double");
        m.functions.insert(callee_id.clone(), def);

        let main_root = m.next_node_id();
        m.add_node(Node::new(main_root.clone(), NodeKind::Function { name: "main".into() }));
        let arg_lit = m.next_node_id();
        m.add_node(Node::new(arg_lit.clone(), NodeKind::Literal { value: LiteralValue::Integer(21) }));
        m.get_node_mut(&arg_lit).unwrap().parent = Some(main_root.clone());
        m.get_node_mut(&main_root).unwrap().nodes.push(arg_lit.clone());
        let arg_out = m.create_port(arg_lit, "value", Type::integer(), Direction::Out).unwrap();

        let call_id = m.next_node_id();
        m.add_node(Node::new(call_id.clone(), NodeKind::FunctionCall { callee: callee_id.clone() }));
        m.get_node_mut(&call_id).unwrap().parent = Some(main_root.clone());
        m.get_node_mut(&main_root).unwrap().nodes.push(call_id.clone());
        let call_in = m.create_port(call_id.clone(), "x", Type::integer(), Direction::In).unwrap();
        m.create_edge(arg_out.clone(), call_in).unwrap();
        let call_out = m.create_port(call_id.clone(), "return0", Type::integer(), Direction::Out).unwrap();

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
        assert!(module_has_no_function(&m, &callee_id));
        assert!(m.get_node(&call_id).is_err());

        let consumer_node = m.get_node(&consumer).unwrap();
        let edge = m.incoming_edge(&consumer_node.in_ports[0]).unwrap();
        assert_eq!(edge.from, double_out);

        let bin_node = m.get_node(&double_id).unwrap();
        let left_edge = m.incoming_edge(&bin_node.in_ports[0]).unwrap();
        assert_eq!(left_edge.from, arg_out);
    }

    fn module_has_no_function(m: &Module, id: &FunctionId) -> bool {
        !m.functions.contains_key(id)
    }
}
