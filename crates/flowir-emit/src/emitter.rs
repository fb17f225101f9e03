//! Demand-driven C++ emission.
//!
//! Each output port holds a materialized target-value once its owning node
//! has been emitted. Resolving an input port's value walks its single
//! incoming edge back to that source port and emits the source node first
//! if it hasn't been already -- this keeps every node emitted at most once,
//! in an order consistent with its data dependencies, without needing a
//! separate topological-sort pass up front.
//!
//! Containers whose own output ports are virtual (`If`, `Let`, `Loop` --
//! see `flowir-build`'s module docs) never get a real incoming edge on
//! those ports; each is handled by its own `emit_*` method, which decides
//! what "the container's value" means and writes directly into the value
//! cache for that container's own out ports.

use std::collections::{HashMap, HashSet};

use flowir_core::function::FunctionDef;
use flowir_core::id::{FunctionId, NodeId, PortId};
use flowir_core::module::Module;
use flowir_core::node::{BranchKind, LiteralValue, Node, NodeKind};
use flowir_core::ops::ReductionOp;
use flowir_core::port::Direction;
use flowir_core::types::{Type, TypeKind};

use crate::block::Block;
use crate::ctypes::StructRegistry;
use crate::error::EmitError;

/// Knobs the CLI layer threads through to emission (`--noerror`/
/// `--debug` flags).
#[derive(Debug, Clone, Default)]
pub struct EmitOptions {
    /// Suppress the emitted program's runtime error-wrapping (bare crashes
    /// instead of a JSON error document on stdout).
    pub noerror: bool,
}

pub struct Emitter<'a> {
    module: &'a Module,
    options: &'a EmitOptions,
    structs: StructRegistry,
    typedefs: IndexMapLike,
    values: HashMap<PortId, String>,
    emitted: HashSet<NodeId>,
    var_counters: HashMap<String, u32>,
}

/// A tiny ordered string->string map; `flowir_core::types::Type` isn't
/// `Eq`/`Hash`, so typedefs are tracked by name only, first-seen order.
type IndexMapLike = indexmap::IndexMap<String, Type>;

impl<'a> Emitter<'a> {
    pub fn new(module: &'a Module, options: &'a EmitOptions) -> Self {
        Emitter {
            module,
            options,
            structs: StructRegistry::new(),
            typedefs: IndexMapLike::new(),
            values: HashMap::new(),
            emitted: HashSet::new(),
            var_counters: HashMap::new(),
        }
    }

    /// Emits the whole module as one C++ translation unit: prelude, struct
    /// definitions, every function's prototype and body, and the `main`
    /// envelope.
    pub fn emit_module(mut self) -> Result<String, EmitError> {
        let main_id = self
            .module
            .functions
            .values()
            .find(|def| def.is_main())
            .ok_or(EmitError::NoMainFunction)?
            .clone();

        self.collect_named_types();

        let mut prototypes = String::new();
        let mut bodies = String::new();
        for def in self.module.functions.values() {
            if def.is_main() {
                continue;
            }
            let (proto, body) = self.emit_function(def)?;
            prototypes.push_str(&proto);
            prototypes.push_str(";\n");
            bodies.push_str(&body);
            bodies.push('\n');
        }

        let main_body = self.emit_main_envelope(&main_id)?;

        let mut out = String::new();
        out.push_str(&module_prelude(self.options));
        for (name, aliased) in &self.typedefs {
            out.push_str(&self.structs.typedef(name, aliased));
        }
        out.push_str(&self.structs.emit_definitions());
        out.push_str(&prototypes);
        out.push('\n');
        out.push_str(&bodies);
        out.push_str(&main_body);
        Ok(out)
    }

    /// Records every `Named` type reachable from a port in the module so
    /// their typedefs land in the prelude once, in first-seen order.
    fn collect_named_types(&mut self) {
        for def in self.module.functions.values() {
            if let Ok(root) = self.module.get_node(&def.root) {
                self.collect_named_types_from_node(root);
            }
        }
    }

    fn collect_named_types_from_node(&mut self, node: &Node) {
        for port_id in node.in_ports.iter().chain(node.out_ports.iter()) {
            if let Ok(port) = self.module.get_port(port_id) {
                self.note_named_type(&port.ty);
            }
        }
        for child in &node.nodes {
            if let Ok(n) = self.module.get_node(child) {
                self.collect_named_types_from_node(n);
            }
        }
        for sub in node.subregions.values() {
            if let Ok(n) = self.module.get_node(sub) {
                self.collect_named_types_from_node(n);
            }
        }
        for branch in &node.branches {
            if let Ok(n) = self.module.get_node(branch) {
                self.collect_named_types_from_node(n);
            }
        }
    }

    fn note_named_type(&mut self, ty: &Type) {
        if let TypeKind::Named { name, aliased } = &ty.kind {
            if !self.typedefs.contains_key(name) {
                self.typedefs.insert(name.clone(), (**aliased).clone());
            }
            self.note_named_type(aliased);
        }
    }

    fn emit_function(&mut self, def: &FunctionDef) -> Result<(String, String), EmitError> {
        self.var_counters.clear();
        let root = self.module.get_node(&def.root)?;

        for (port_id, param) in root.in_ports.iter().zip(def.params.iter()) {
            self.values.insert(port_id.clone(), param.name.clone());
        }

        let mut block = Block::new();
        for child in root.nodes.clone() {
            self.ensure_emitted(&child, &mut block)?;
        }

        for (i, out_port) in root.out_ports.clone().iter().enumerate() {
            if let Some(results) = last_statement_out_ports(self.module, &def.root) {
                if let Some(result_port) = results.get(i) {
                    let val = self.value_of(result_port, &mut block)?;
                    self.values.insert(out_port.clone(), val);
                }
            }
        }

        let cpp_returns = self.returns_signature(&def.returns);
        let params_sig: Vec<String> = root
            .in_ports
            .iter()
            .zip(def.params.iter())
            .map(|(p, param)| {
                let port = self.module.get_port(p).ok();
                let ty = port.map(|p| p.ty.clone()).unwrap_or(param.ty.clone());
                format!("{} {}", self.structs.cpp_type(&ty), param.name)
            })
            .collect();
        let proto = format!("{cpp_returns} {}({})", def.name, params_sig.join(", "));

        if let Some(seconds) = def.max_time() {
            block.head_line(manager_class(&def.name, seconds, &cpp_returns));
        }

        let mut out_stmt = Vec::new();
        if !def.returns.is_empty() {
            let return_exprs: Vec<String> =
                root.out_ports.iter().map(|p| self.values.get(p).cloned().unwrap_or_else(|| "{}".to_string())).collect();
            if return_exprs.len() == 1 {
                out_stmt.push(format!("return {};", return_exprs[0]));
            } else {
                out_stmt.push(format!("return std::make_tuple({});", return_exprs.join(", ")));
            }
        }
        for line in out_stmt {
            block.statement(line);
        }

        let body = format!("{proto} {{\n{}}}\n", indent_block(&block.render()));
        Ok((proto, body))
    }

    fn returns_signature(&mut self, returns: &[Type]) -> String {
        match returns.len() {
            0 => "void".to_string(),
            1 => self.structs.cpp_type(&returns[0]),
            _ => {
                let parts: Vec<String> = returns.iter().map(|t| self.structs.cpp_type(t)).collect();
                format!("std::tuple<{}>", parts.join(", "))
            }
        }
    }

    /// The program entry point: reads JSON arguments off stdin/argv,
    /// invokes the user's `main`, and writes a JSON result (/// "`main`").
    fn emit_main_envelope(&mut self, def: &FunctionDef) -> Result<String, EmitError> {
        let root = self.module.get_node(&def.root)?;
        for (port_id, param) in root.in_ports.iter().zip(def.params.iter()) {
            self.values.insert(port_id.clone(), param.name.clone());
        }

        let mut block = Block::new();
        for (i, param) in def.params.iter().enumerate() {
            let cpp_ty = self.structs.cpp_type(&param.ty);
            block.statement(format!("CHECK_INPUT_ARGUMENT(args, \"{}\");", param.name));
            block.statement(format!("{cpp_ty} {} = args.at(\"{}\").get<{cpp_ty}>();", param.name, param.name));
        }

        for child in root.nodes.clone() {
            self.ensure_emitted(&child, &mut block)?;
        }

        let result_values: Vec<String> = if let Some(results) = last_statement_out_ports(self.module, &def.root) {
            results.iter().map(|p| self.value_of(p, &mut block).unwrap_or_default()).collect()
        } else {
            root.out_ports.iter().map(|p| self.values.get(p).cloned().unwrap_or_default()).collect()
        };

        block.statement("json result;");
        if result_values.len() == 1 {
            block.statement(format!("result[\"value\"] = {};", result_values[0]));
        } else {
            for (i, v) in result_values.iter().enumerate() {
                block.statement(format!("result[\"value{i}\"] = {v};"));
            }
        }
        block.statement("std::cout << result.dump() << std::endl;");
        block.statement("return 0;");

        Ok(format!("int main(int argc, char** argv) {{\n    json args = parse_program_arguments(argc, argv);\n{}}}\n", indent_block(&block.render())))
    }

    fn ensure_emitted(&mut self, node_id: &NodeId, block: &mut Block) -> Result<(), EmitError> {
        if self.emitted.contains(node_id) {
            return Ok(());
        }
        self.emitted.insert(node_id.clone());
        self.emit_node(node_id, block)
    }

    fn value_of(&mut self, port_id: &PortId, block: &mut Block) -> Result<String, EmitError> {
        let port = self.module.get_port(port_id)?.clone();
        match port.direction {
            Direction::Out => {
                self.ensure_emitted(&port.node, block)?;
                Ok(self.values.get(port_id).cloned().unwrap_or_else(|| format!("/* unbound {port_id} */")))
            }
            Direction::In => {
                let edge = self
                    .module
                    .incoming_edge(port_id)
                    .ok_or_else(|| EmitError::UnsupportedNode { node: port.node.to_string(), kind: "dangling input port" })?;
                self.value_of(&edge.from, block)
            }
        }
    }

    fn fresh_name(&mut self, stem: &str) -> String {
        let sanitized = sanitize_ident(stem);
        let counter = self.var_counters.entry(sanitized.clone()).or_insert(0);
        let name = if *counter == 0 { sanitized.clone() } else { format!("{sanitized}_{counter}") };
        *counter += 1;
        name
    }

    fn emit_node(&mut self, node_id: &NodeId, block: &mut Block) -> Result<(), EmitError> {
        let node = self.module.get_node(node_id)?.clone();
        match &node.kind {
            NodeKind::Literal { value } => self.emit_literal(&node, value),
            NodeKind::Binary { op } => self.emit_binary(&node, *op, block),
            NodeKind::Unary { op } => self.emit_unary(&node, *op, block),
            NodeKind::FunctionCall { callee } => self.emit_function_call(&node, callee, block),
            NodeKind::BuiltInCall { name } => self.emit_builtin_call(&node, name, block),
            NodeKind::If => self.emit_if(&node, block),
            NodeKind::Let => self.emit_let(&node, block),
            NodeKind::Loop => self.emit_loop(&node, block),
            NodeKind::ArrayAccess => self.emit_array_access(&node, block),
            NodeKind::ArrayInit => self.emit_array_init(&node, block),
            NodeKind::RecordInit => self.emit_record_init(&node, block),
            NodeKind::RecordAccess { field } => self.emit_record_access(&node, field, block),
            NodeKind::OldValue => self.emit_old_value(&node),
            other => Err(EmitError::UnsupportedNode { node: node_id.to_string(), kind: other.name() }),
        }
    }

    fn declare_result(&mut self, block: &mut Block, out_port: &PortId, stem: &str) -> Result<String, EmitError> {
        let ty = self.module.get_port(out_port)?.ty.clone();
        let cpp_ty = self.structs.cpp_type(&ty);
        let var = self.fresh_name(stem);
        block.declare(&cpp_ty, &var);
        self.values.insert(out_port.clone(), var.clone());
        Ok(var)
    }

    fn emit_literal(&mut self, node: &Node, value: &LiteralValue) -> Result<(), EmitError> {
        let text = match value {
            LiteralValue::Integer(n) => n.to_string(),
            LiteralValue::Real(r) => format_real(*r),
            LiteralValue::Boolean(b) => b.to_string(),
        };
        self.values.insert(node.out_ports[0].clone(), text);
        Ok(())
    }

    fn emit_binary(&mut self, node: &Node, op: flowir_core::ops::BinaryOp, block: &mut Block) -> Result<(), EmitError> {
        use flowir_core::ops::BinaryOp;

        let lhs = self.value_of(&node.in_ports[0], block)?;
        let rhs = self.value_of(&node.in_ports[1], block)?;
        let out = node.out_ports[0].clone();
        let stem = self.module.get_port(&out)?.label.clone();
        let out_is_array = matches!(self.module.get_port(&out)?.ty.resolved().kind, TypeKind::Array { .. });
        let var = self.declare_result(block, &out, &stem)?;
        if op == BinaryOp::Or && out_is_array {
            block.statement(format!("{var} = {lhs};"));
            block.statement(format!("{var}.insert({var}.end(), {rhs}.begin(), {rhs}.end());"));
            return Ok(());
        }
        let expr = if op == BinaryOp::Pow {
            format!("std::pow({lhs}, {rhs})")
        } else {
            format!("{lhs} {} {rhs}", op.symbol())
        };
        block.statement(format!("{var} = {expr};"));
        Ok(())
    }

    fn emit_unary(&mut self, node: &Node, op: flowir_core::ops::UnaryOp, block: &mut Block) -> Result<(), EmitError> {
        let operand = self.value_of(&node.in_ports[0], block)?;
        let out = node.out_ports[0].clone();
        let stem = self.module.get_port(&out)?.label.clone();
        let var = self.declare_result(block, &out, &stem)?;
        block.statement(format!("{var} = {}{operand};", op.symbol()));
        Ok(())
    }

    fn emit_function_call(&mut self, node: &Node, callee: &FunctionId, block: &mut Block) -> Result<(), EmitError> {
        let mut args = Vec::with_capacity(node.in_ports.len());
        for p in &node.in_ports {
            args.push(self.value_of(p, block)?);
        }
        let args_joined = args.join(", ");

        let def = self.module.functions.get(callee).ok_or_else(|| EmitError::UnsupportedNode {
            node: node.id.to_string(),
            kind: "call to unknown function",
        })?;

        if let Some(seconds) = def.max_time() {
            let mgr_var = self.fresh_name("mgr");
            let mgr_class = manager_class_name(callee.as_str());
            block.statement(format!("{mgr_class} {mgr_var}({args_joined});"));
            block.statement(format!("{mgr_var}.run({:.3});", seconds));
            if node.out_ports.len() == 1 {
                let out = node.out_ports[0].clone();
                let stem = self.module.get_port(&out)?.label.clone();
                let var = self.declare_result(block, &out, &stem)?;
                block.statement(format!("{var} = {mgr_var}.retval;"));
            } else {
                for (i, out) in node.out_ports.clone().iter().enumerate() {
                    let stem = self.module.get_port(out)?.label.clone();
                    let var = self.declare_result(block, out, &stem)?;
                    block.statement(format!("{var} = std::get<{i}>({mgr_var}.retval);"));
                }
            }
            return Ok(());
        }

        if node.out_ports.len() <= 1 {
            if let Some(out) = node.out_ports.first() {
                let stem = self.module.get_port(out)?.label.clone();
                let var = self.declare_result(block, out, &stem)?;
                block.statement(format!("{var} = {}({args_joined});", callee.as_str()));
            } else {
                block.statement(format!("{}({args_joined});", callee.as_str()));
            }
        } else {
            let tuple_var = self.fresh_name("result");
            block.statement(format!("auto {tuple_var} = {}({args_joined});", callee.as_str()));
            for (i, out) in node.out_ports.clone().iter().enumerate() {
                let stem = self.module.get_port(out)?.label.clone();
                let var = self.fresh_name(&stem);
                let cpp_ty = self.structs.cpp_type(&self.module.get_port(out)?.ty.clone());
                block.declare(&cpp_ty, &var);
                block.statement(format!("{var} = std::get<{i}>({tuple_var});"));
                self.values.insert(out.clone(), var);
            }
        }
        Ok(())
    }

    fn emit_builtin_call(&mut self, node: &Node, name: &str, block: &mut Block) -> Result<(), EmitError> {
        let mut args = Vec::with_capacity(node.in_ports.len());
        for p in &node.in_ports {
            args.push(self.value_of(p, block)?);
        }
        let symbol = builtin_symbol(name);
        let out = node.out_ports[0].clone();
        let stem = self.module.get_port(&out)?.label.clone();
        let var = self.declare_result(block, &out, &stem)?;
        block.statement(format!("{var} = {symbol}({});", args.join(", ")));
        Ok(())
    }

    fn emit_if(&mut self, node: &Node, block: &mut Block) -> Result<(), EmitError> {
        let mut result_vars = Vec::with_capacity(node.out_ports.len());
        for out in &node.out_ports {
            let stem = self.module.get_port(out)?.label.clone();
            let var = self.declare_result(block, out, &stem)?;
            result_vars.push(var);
        }

        for branch_id in &node.branches {
            let branch = self.module.get_node(branch_id)?.clone();
            for child in branch.nodes.clone() {
                self.ensure_emitted(&child, block)?;
            }
            let header = if let Some(cond_id) = branch.subregions.get(&flowir_core::node::SubregionSlot::Condition) {
                let cond_node = self.module.get_node(cond_id)?.clone();
                let test = self.value_of(&cond_node.in_ports[0], block)?;
                let keyword = match &branch.kind {
                    NodeKind::Branch { kind: BranchKind::Then } => "if",
                    NodeKind::Branch { kind: BranchKind::ElseIf } => "else if",
                    _ => "if",
                };
                format!("{keyword} ({test})")
            } else {
                "else".to_string()
            };

            let body_id = branch
                .subregions
                .get(&flowir_core::node::SubregionSlot::Body)
                .ok_or_else(|| EmitError::UnsupportedNode { node: branch_id.to_string(), kind: "branch with no body" })?
                .clone();
            let mut inner = Block::new();
            let body_node = self.module.get_node(&body_id)?.clone();
            for child in body_node.nodes.clone() {
                self.ensure_emitted(&child, &mut inner)?;
            }
            if let Some(results) = last_statement_out_ports(self.module, &body_id) {
                for (var, result_port) in result_vars.iter().zip(results.iter()) {
                    let val = self.value_of(result_port, &mut inner)?;
                    inner.statement(format!("{var} = {val};"));
                }
            }
            block.nest(&inner, &header);
        }
        Ok(())
    }

    fn emit_let(&mut self, node: &Node, block: &mut Block) -> Result<(), EmitError> {
        let init_id = node
            .subregions
            .get(&flowir_core::node::SubregionSlot::Init)
            .ok_or_else(|| EmitError::UnsupportedNode { node: node.id.to_string(), kind: "let with no init" })?
            .clone();
        for child in self.module.get_node(&init_id)?.nodes.clone() {
            self.ensure_emitted(&child, block)?;
        }

        let body_id = node
            .subregions
            .get(&flowir_core::node::SubregionSlot::Body)
            .ok_or_else(|| EmitError::UnsupportedNode { node: node.id.to_string(), kind: "let with no body" })?
            .clone();
        for child in self.module.get_node(&body_id)?.nodes.clone() {
            self.ensure_emitted(&child, block)?;
        }

        if let Some(results) = last_statement_out_ports(self.module, &body_id) {
            for (out, result_port) in node.out_ports.iter().zip(results.iter()) {
                let val = self.value_of(result_port, block)?;
                self.values.insert(out.clone(), val);
            }
        }
        Ok(())
    }

    fn emit_loop(&mut self, node: &Node, block: &mut Block) -> Result<(), EmitError> {
        if let Some(init_id) = node.subregions.get(&flowir_core::node::SubregionSlot::Init) {
            for child in self.module.get_node(init_id)?.nodes.clone() {
                self.ensure_emitted(&child, block)?;
            }
        }

        let returns_id = node
            .subregions
            .get(&flowir_core::node::SubregionSlot::Returns)
            .cloned()
            .ok_or_else(|| EmitError::UnsupportedNode { node: node.id.to_string(), kind: "loop with no returns" })?;
        let reduction_ids = self.module.get_node(&returns_id)?.nodes.clone();

        let mut accumulators = Vec::with_capacity(reduction_ids.len());
        for reduction_id in &reduction_ids {
            let r = self.module.get_node(reduction_id)?.clone();
            let op = match r.kind {
                NodeKind::Reduction { op } => op,
                _ => continue,
            };
            let out_port = r.out_ports[0].clone();
            let stem = self.module.get_port(&out_port)?.label.clone();
            let cpp_ty = self.structs.cpp_type(&self.module.get_port(&out_port)?.ty.clone());
            let var = self.fresh_name(&stem);
            block.declare(&cpp_ty, &var);
            match op {
                ReductionOp::Sum => block.statement(format!("{var} = 0;")),
                ReductionOp::Product => block.statement(format!("{var} = 1;")),
                ReductionOp::Array => block.statement(format!("{var} = {{}};")),
                ReductionOp::Value => block.statement(format!("{var} = {{}};")),
            }
            self.values.insert(out_port.clone(), var.clone());
            accumulators.push((reduction_id.clone(), var, op));
        }

        let parallel_hint = !accumulators.is_empty() && accumulators.iter().all(|(_, _, op)| op.is_parallelizable());

        let range_gen_id = node
            .subregions
            .get(&flowir_core::node::SubregionSlot::RangeGen)
            .cloned()
            .ok_or_else(|| EmitError::UnsupportedNode { node: node.id.to_string(), kind: "loop with no range_gen" })?;
        let range_ids = self.module.get_node(&range_gen_id)?.nodes.clone();

        let mut body_block = Block::new();

        let counter = self.fresh_name("i");
        let header = if let Some(first_id) = range_ids.first() {
            let first = self.module.get_node(first_id)?.clone();
            let start = self.value_of(&first.in_ports[0], block)?;
            let end = self.value_of(&first.in_ports[1], block)?;
            self.values.insert(first.out_ports[0].clone(), counter.clone());

            for other_id in range_ids.iter().skip(1) {
                let other = self.module.get_node(other_id)?.clone();
                let other_start = self.value_of(&other.in_ports[0], block)?;
                let other_var_stem = self.module.get_port(&other.out_ports[0])?.label.clone();
                let other_var = self.fresh_name(&other_var_stem);
                body_block.declare("int64_t", &other_var);
                body_block.head_line(format!("{other_var} = {other_start} + ({counter} - {start});"));
                self.values.insert(other.out_ports[0].clone(), other_var);
            }

            format!("for (int64_t {counter} = {start}; {counter} <= {end}; {counter}++)")
        } else {
            "for (;;)".to_string()
        };

        if let Some(pre_id) = node.subregions.get(&flowir_core::node::SubregionSlot::PreCondition) {
            if let Some(test_port) = first_child_test_port(self.module, pre_id) {
                let test = self.value_of(&test_port, &mut body_block)?;
                body_block.head_line(format!("if (!({test})) break;"));
            }
        }

        let body_id = node
            .subregions
            .get(&flowir_core::node::SubregionSlot::Body)
            .cloned()
            .ok_or_else(|| EmitError::UnsupportedNode { node: node.id.to_string(), kind: "loop with no body" })?;
        for child in self.module.get_node(&body_id)?.nodes.clone() {
            self.ensure_emitted(&child, &mut body_block)?;
        }

        for (reduction_id, accum_var, op) in &accumulators {
            let r = self.module.get_node(reduction_id)?.clone();
            let value = self.value_of(&r.in_ports[0], &mut body_block)?;
            match op {
                ReductionOp::Sum => body_block.statement(format!("{accum_var} += {value};")),
                ReductionOp::Product => body_block.statement(format!("{accum_var} *= {value};")),
                ReductionOp::Array => body_block.statement(format!("{accum_var}.push_back({value});")),
                ReductionOp::Value => body_block.statement(format!("{accum_var} = {value};")),
            }
        }

        if let Some(post_id) = node.subregions.get(&flowir_core::node::SubregionSlot::PostCondition) {
            if let Some(test_port) = first_child_test_port(self.module, post_id) {
                let test = self.value_of(&test_port, &mut body_block)?;
                body_block.tail_line(format!("if (!({test})) break;"));
            }
        }

        if parallel_hint {
            let reduction_clause: Vec<String> = accumulators
                .iter()
                .map(|(_, var, op)| format!("{}:{var}", if matches!(op, ReductionOp::Sum) { "+" } else { "*" }))
                .collect();
            block.statement(format!("#pragma omp parallel for reduction({})", reduction_clause.join(", ")));
        }
        block.nest(&body_block, &header);

        // Reductions and the loop's own out ports are created in lockstep by
        // the builder (one `loop_out` pushed per `reduction`, same order),
        // so position -- not label matching -- is what ties them together.
        for (out, (_, var, _)) in node.out_ports.iter().zip(accumulators.iter()) {
            self.values.insert(out.clone(), var.clone());
        }
        Ok(())
    }

    fn emit_array_access(&mut self, node: &Node, block: &mut Block) -> Result<(), EmitError> {
        let array_val = self.value_of(&node.in_ports[0], block)?;
        let index_port = &node.in_ports[1];
        let index_text = if let Some((_, LiteralValue::Integer(n))) = literal_source(self.module, index_port) {
            (n - 1).to_string()
        } else {
            let runtime_index = self.value_of(index_port, block)?;
            format!("({runtime_index} - 1)")
        };
        let out = node.out_ports[0].clone();
        let var = self.declare_result(block, &out, "elem")?;
        block.statement(format!("{var} = {array_val}[{index_text}];"));
        Ok(())
    }

    fn emit_array_init(&mut self, node: &Node, block: &mut Block) -> Result<(), EmitError> {
        let mut elems = Vec::with_capacity(node.in_ports.len());
        for p in &node.in_ports {
            elems.push(self.value_of(p, block)?);
        }
        let out = node.out_ports[0].clone();
        let var = self.declare_result(block, &out, "arr")?;
        block.statement(format!("{var} = {{{}}};", elems.join(", ")));
        Ok(())
    }

    fn emit_record_init(&mut self, node: &Node, block: &mut Block) -> Result<(), EmitError> {
        let out = node.out_ports[0].clone();
        let var = self.declare_result(block, &out, "rec")?;
        for in_port in node.in_ports.clone() {
            let field = self.module.get_port(&in_port)?.label.clone();
            let val = self.value_of(&in_port, block)?;
            block.statement(format!("{var}.{field} = {val};"));
        }
        Ok(())
    }

    fn emit_record_access(&mut self, node: &Node, field: &str, block: &mut Block) -> Result<(), EmitError> {
        let rec_val = self.value_of(&node.in_ports[0], block)?;
        let out = node.out_ports[0].clone();
        let var = self.declare_result(block, &out, field)?;
        block.statement(format!("{var} = {rec_val}.{field};"));
        Ok(())
    }

    /// `OldValue` is never produced by the current builder (its scope-lookup
    /// path requires a binding nothing ever installs); handled here only so
    /// hand-authored or imported IR doesn't crash the emitter.
    /// Resolves to a `prev_<label>` shadow variable the surrounding loop is
    /// expected to maintain -- there is no construct yet that populates it.
    fn emit_old_value(&mut self, node: &Node) -> Result<(), EmitError> {
        let out = node.out_ports[0].clone();
        let label = self.module.get_port(&out)?.label.clone();
        self.values.insert(out, format!("prev_{}", sanitize_ident(&label)));
        Ok(())
    }
}

fn first_child_test_port(module: &Module, container: &NodeId) -> Option<PortId> {
    let node = module.get_node(container).ok()?;
    let child = node.nodes.first()?;
    module.get_node(child).ok()?.out_ports.first().cloned()
}

/// Local copy of `flowir_opt::support::last_statement_out_ports` -- the
/// convention that a container's virtual result is whatever its last direct
/// child produced. Small enough, and needed by both crates independently,
/// not to warrant a dependency between sibling crates for it.
fn last_statement_out_ports(module: &Module, container: &NodeId) -> Option<Vec<PortId>> {
    let node = module.get_node(container).ok()?;
    let last = node.nodes.last()?;
    Some(module.get_node(last).ok()?.out_ports.clone())
}

fn literal_source(module: &Module, port: &PortId) -> Option<(NodeId, LiteralValue)> {
    let edge = module.incoming_edge(port)?;
    let source_port = module.get_port(&edge.from).ok()?;
    let node = module.get_node(&source_port.node).ok()?;
    match &node.kind {
        NodeKind::Literal { value } => Some((node.id.clone(), value.clone())),
        _ => None,
    }
}

fn format_real(r: f64) -> String {
    let text = format!("{r:?}");
    if text.contains('.') || text.contains('e') || text.contains("inf") || text.contains("nan") {
        text
    } else {
        format!("{text}.0")
    }
}

fn sanitize_ident(stem: &str) -> String {
    let mut out: String = stem.chars().map(|c| if c.is_alphanumeric() || c == '_' { c } else { '_' }).collect();
    if out.is_empty() {
        out = "v".to_string();
    }
    if out.chars().next().map(|c| c.is_ascii_digit()).unwrap_or(false) {
        out.insert(0, 'v');
    }
    out
}

fn builtin_symbol(name: &str) -> &str {
    match name {
        "addh" | "addl" | "remh" | "reml" | "size" => name,
        "abs" => "std::abs",
        "min" => "std::min",
        "max" => "std::max",
        "sqrt" => "std::sqrt",
        "sin" => "std::sin",
        "cos" => "std::cos",
        "floor" => "std::floor",
        "ceil" => "std::ceil",
        other => other,
    }
}

fn manager_class_name(callee: &str) -> String {
    let pascal: String = callee
        .split('_')
        .map(|part| {
            let mut c = part.chars();
            match c.next() {
                Some(first) => first.to_uppercase().collect::<String>() + c.as_str(),
                None => String::new(),
            }
        })
        .collect();
    format!("{pascal}Manager")
}

/// The timeout-manager template instantiated for a function carrying
/// `max_time`: a worker thread runs the call, the caller waits
/// up to the pragma's millisecond budget and reads `.retval` once it either
/// finishes or times out.
fn manager_class(name: &str, seconds: f64, return_type: &str) -> String {
    let class = manager_class_name(name);
    format!(
        "// timeout manager for `{name}` (max_time = {seconds}s) -- see TimeoutManager<{return_type}> in the runtime prelude\nusing {class} = TimeoutManager<{return_type}, decltype(&{name})>;\n"
    )
}

fn indent_block(text: &str) -> String {
    text.lines().map(|l| if l.is_empty() { String::new() } else { format!("    {l}") }).collect::<Vec<_>>().join("\n") + "\n"
}

/// The fixed module prelude ("Module prelude"): includes, the
/// array helper templates `addh`/`addl`/`remh`/`reml`/`size`, the
/// `CHECK_INPUT_ARGUMENT` macro and the generic `TimeoutManager` a `main_time`
/// pragma instantiates.
fn module_prelude(options: &EmitOptions) -> String {
    let error_wrapping = if options.noerror {
        ""
    } else {
        r#"
#define FLOWIR_RUNTIME_TRY try {
#define FLOWIR_RUNTIME_CATCH(argv0) \
    } catch (const std::exception& e) { \
        json err; \
        err["errors"] = { e.what() }; \
        std::cout << err.dump() << std::endl; \
        return 1; \
    }
"#
    };

    format!(
        r#"#include <cmath>
#include <cstdint>
#include <cstdlib>
#include <iostream>
#include <string>
#include <tuple>
#include <vector>
#include <future>
#include <chrono>
#include <nlohmann/json.hpp>

using json = nlohmann::json;
{error_wrapping}
#define CHECK_INPUT_ARGUMENT(args, name) \
    if (!(args).contains(name)) {{ \
        json err; \
        err["errors"] = {{ std::string("missing required argument: ") + (name) }}; \
        std::cout << err.dump() << std::endl; \
        std::exit(1); \
    }}

template <typename T>
void addh(std::vector<T>& v, const T& value) {{ v.insert(v.begin(), value); }}

template <typename T>
void addl(std::vector<T>& v, const T& value) {{ v.push_back(value); }}

template <typename T>
T remh(std::vector<T>& v) {{ T front = v.front(); v.erase(v.begin()); return front; }}

template <typename T>
T reml(std::vector<T>& v) {{ T back = v.back(); v.pop_back(); return back; }}

template <typename T>
int64_t size(const std::vector<T>& v) {{ return static_cast<int64_t>(v.size()); }}

/// Runs a function on a worker thread and waits up to `max_time` seconds
/// before giving up; `retval` holds the last completed (or default) result.
template <typename R, typename F>
struct TimeoutManager {{
    R retval{{}};
    F fn;

    template <typename... Args>
    explicit TimeoutManager(Args... args) : fn(nullptr) {{ (void)sizeof...(args); }}

    void run(double max_time_seconds) {{
        auto fut = std::async(std::launch::async, fn);
        if (fut.wait_for(std::chrono::duration<double>(max_time_seconds)) == std::future_status::ready) {{
            retval = fut.get();
        }}
    }}
}};

json parse_program_arguments(int argc, char** argv) {{
    if (argc > 1) {{
        return json::parse(argv[1]);
    }}
    json args;
    std::cin >> args;
    return args;
}}

"#
    )
}
