//! The builder pass: lowers an [`ExprAst`] into dataflow-graph nodes
//!.
//!
//! The contract is `build(expr, target_ports, scope) -> result_ports`:
//! given an expression, the ports its result should ultimately reach, and
//! the lexical scope visible at this point, emit nodes/ports/edges into the
//! module and return the ports carrying the expression's value(s). Most
//! expressions produce one value; `target_ports` only matters for
//! multi-valued positions (a `Let`/`Loop`/`If` in statement position whose
//! surrounding context expects a specific arity) -- see
//! [`copy_ports_from_targets`].
//!
//! Container nodes (`If`, `Let`, `Loop`) have "virtual" output ports: no
//! edge ever targets them, because nothing may feed more than one edge
//! into a single input port and a branch/iteration's result
//! can't be known until runtime. Their value is instead derived
//! structurally by the emitter by walking the node's subregions. Downstream
//! consumers attach normally by sourcing an edge *from* these ports.

use indexmap::IndexMap;

use flowir_core::function::FunctionDef;
use flowir_core::id::{FunctionId, NodeId, PortId};
use flowir_core::module::Module;
use flowir_core::node::{BranchKind, LiteralValue, Node, NodeKind, SubregionSlot};
use flowir_core::ops::ReductionOp;
use flowir_core::port::Direction;
use flowir_core::types::Type;

use crate::ast::{BindingAst, BranchAst, ExprAst, FunctionAst, Program, RangeAst, ReductionAst};
use crate::error::BuildError;
use crate::scope::Scope;
use crate::typecheck::{
    can_coerce, common_numeric_type, needs_narrowing_warning, resolve_binary_rule, resolve_unary_rule, Diagnostic, Warnings,
};

pub struct Builder<'m> {
    pub module: &'m mut Module,
    pub warnings: Warnings,
}

impl<'m> Builder<'m> {
    pub fn new(module: &'m mut Module) -> Self {
        Builder { module, warnings: Warnings::default() }
    }

    pub fn build_program(&mut self, program: &Program) -> Result<(), BuildError> {
        for def in &program.definitions {
            if self.module.definitions.contains_key(&def.name) {
                return Err(Diagnostic::DuplicateDefinition { name: def.name.clone(), location: String::new() }.into());
            }
            self.module.definitions.insert(def.name.clone(), def.ty.clone());
        }
        // Pre-register every function signature first so forward calls resolve.
        for f in &program.functions {
            let root = self.module.next_node_id();
            self.module.add_node(Node::new(root.clone(), NodeKind::Function { name: f.name.clone() }));
            for p in &f.params {
                self.module.create_param_port(root.clone(), p.name.clone(), p.ty.clone())?;
            }
            for (i, ret_ty) in f.returns.iter().enumerate() {
                self.module.create_port(root.clone(), format!("return{i}"), ret_ty.clone(), Direction::Out)?;
            }
            let mut def = FunctionDef::new(f.name.clone(), root);
            def.params = f.params.iter().map(|p| flowir_core::function::Param { name: p.name.clone(), ty: p.ty.clone() }).collect();
            def.returns = f.returns.clone();
            for (name, value) in &f.pragmas {
                let pv = match value {
                    crate::ast::PragmaAst::Number(n) => flowir_core::function::PragmaValue::Number(*n),
                    crate::ast::PragmaAst::Text(t) => flowir_core::function::PragmaValue::Text(t.clone()),
                    crate::ast::PragmaAst::Flag(b) => flowir_core::function::PragmaValue::Flag(*b),
                };
                def.pragmas.insert(name.clone(), pv);
            }
            self.module.functions.insert(FunctionId::new(f.name.clone()), def);
        }
        for f in &program.functions {
            self.build_function_body(f)?;
        }
        Ok(())
    }

    fn build_function_body(&mut self, f: &FunctionAst) -> Result<(), BuildError> {
        let fn_id = FunctionId::new(f.name.clone());
        let root = self.module.functions.get(&fn_id).unwrap().root.clone();
        let in_ports = self.module.get_node(&root)?.in_ports.clone();

        let mut scope = Scope::root();
        for (p, param) in in_ports.iter().zip(f.params.iter()) {
            scope.bind(param.name.clone(), p.clone());
        }

        let out_ports = self.module.get_node(&root)?.out_ports.clone();
        let mut last_results = Vec::new();
        for stmt in &f.body {
            last_results = self.build_expr(stmt, &root, &scope)?;
        }
        for (result, target) in last_results.iter().zip(out_ports.iter()) {
            self.check_virtual_result(result, target, &f.body.last().map(|e| e.location().to_string()).unwrap_or_default())?;
        }
        Ok(())
    }

    /// Dispatch on expression kind. Returns the port(s) carrying the
    /// expression's value.
    pub fn build_expr(&mut self, expr: &ExprAst, container: &NodeId, scope: &Scope) -> Result<Vec<PortId>, BuildError> {
        match expr {
            ExprAst::Literal { value, .. } => Ok(vec![self.build_literal(value, container)?]),
            ExprAst::Identifier { name, location } => {
                scope.resolve(name).map(|p| vec![p]).ok_or_else(|| {
                    Diagnostic::UnresolvedIdentifier { name: name.clone(), location: location.clone() }.into()
                })
            }
            ExprAst::OldValue { name, location } => scope
                .resolve(&format!("old:{name}"))
                .map(|p| vec![p])
                .ok_or_else(|| Diagnostic::UnresolvedIdentifier { name: name.clone(), location: location.clone() }.into()),
            ExprAst::Binary { op, left, right, location } => {
                let l = self.build_expr(left, container, scope)?[0].clone();
                let r = self.build_expr(right, container, scope)?[0].clone();
                let (lt, rt) = (self.module.get_port(&l)?.ty.clone(), self.module.get_port(&r)?.ty.clone());
                let rule = resolve_binary_rule(*op, &lt, &rt, location)?;

                let id = self.module.next_node_id();
                let node = Node::new(id.clone(), NodeKind::Binary { op: *op });
                self.module.add_node(node);
                self.attach_child(container, &id)?;
                let in0 = self.module.create_port(id.clone(), "left", rule.input_types[0].clone(), Direction::In)?;
                let in1 = self.module.create_port(id.clone(), "right", rule.input_types[1].clone(), Direction::In)?;
                let out = self.module.create_port(id.clone(), "result", rule.output_type.clone(), Direction::Out)?;
                self.connect_coerced(&l, &in0, location)?;
                self.connect_coerced(&r, &in1, location)?;
                Ok(vec![out])
            }
            ExprAst::Unary { op, operand, location } => {
                let v = self.build_expr(operand, container, scope)?[0].clone();
                let vt = self.module.get_port(&v)?.ty.clone();
                let rule = resolve_unary_rule(*op, &vt, location)?;

                let id = self.module.next_node_id();
                self.module.add_node(Node::new(id.clone(), NodeKind::Unary { op: *op }));
                self.attach_child(container, &id)?;
                let in0 = self.module.create_port(id.clone(), "value", rule.input_types[0].clone(), Direction::In)?;
                let out = self.module.create_port(id.clone(), "result", rule.output_type.clone(), Direction::Out)?;
                self.connect_coerced(&v, &in0, location)?;
                Ok(vec![out])
            }
            ExprAst::ArrayLiteral { elements, location } => self.build_array_init(elements, container, scope, location),
            ExprAst::ArrayAccess { array, indices, location } => self.build_array_access(array, indices, container, scope, location),
            ExprAst::RecordLiteral { fields, location } => self.build_record_init(fields, container, scope, location),
            ExprAst::RecordAccess { record, field, location } => self.build_record_access(record, field, container, scope, location),
            ExprAst::Call { callee, args, pragmas, location } => self.build_call(callee, args, pragmas, container, scope, location),
            ExprAst::If { branches, location } => self.build_if(branches, container, scope, location),
            ExprAst::Let { bindings, body, location } => self.build_let(bindings, body, container, scope, location),
            ExprAst::Loop { ranges, body, reductions, location } => self.build_loop(ranges, body, reductions, container, scope, location),
        }
    }

    fn build_literal(&mut self, value: &LiteralValue, container: &NodeId) -> Result<PortId, BuildError> {
        let ty = match value {
            LiteralValue::Integer(_) => Type::integer(),
            LiteralValue::Real(_) => Type::real(),
            LiteralValue::Boolean(_) => Type::boolean(),
        };
        let id = self.module.next_node_id();
        self.module.add_node(Node::new(id.clone(), NodeKind::Literal { value: value.clone() }));
        self.attach_child(container, &id)?;
        let out = self.module.create_port(id, "value", ty, Direction::Out)?;
        Ok(out)
    }

    fn build_array_init(&mut self, elements: &[ExprAst], container: &NodeId, scope: &Scope, location: &str) -> Result<Vec<PortId>, BuildError> {
        let mut elem_ports = Vec::with_capacity(elements.len());
        for e in elements {
            elem_ports.push(self.build_expr(e, container, scope)?[0].clone());
        }
        let elem_ty = self.common_array_element_type(&elem_ports, location)?;
        let id = self.module.next_node_id();
        self.module.add_node(Node::new(id.clone(), NodeKind::ArrayInit));
        self.attach_child(container, &id)?;
        for (i, p) in elem_ports.iter().enumerate() {
            let in_p = self.module.create_port(id.clone(), format!("element{i}"), elem_ty.clone(), Direction::In)?;
            self.connect_coerced(p, &in_p, location)?;
        }
        let out = self.module.create_port(id, "array", Type::array(elem_ty, 1), Direction::Out)?;
        Ok(vec![out])
    }

    /// Folds every element's type down to one common type: numeric elements
    /// widen via `common_numeric_type` (`real` wins over `integer`), every
    /// other pair must already be the exact same type, else it's a fatal
    /// `TypeMismatch`. An empty array defaults to `any`.
    fn common_array_element_type(&self, elem_ports: &[PortId], location: &str) -> Result<Type, BuildError> {
        let mut ports = elem_ports.iter();
        let Some(first) = ports.next() else {
            return Ok(Type::any());
        };
        let mut common = self.module.get_port(first)?.ty.clone();
        for p in ports {
            let ty = self.module.get_port(p)?.ty.clone();
            common = match common_numeric_type(&common, &ty) {
                Some(widened) => widened,
                None if common.equal(&ty) => common,
                None => {
                    return Err(Diagnostic::TypeMismatch {
                        node: self.module.get_port(p)?.node.clone(),
                        port: p.clone(),
                        expected: common,
                        actual: ty,
                        location: location.to_string(),
                    }
                    .into());
                }
            };
        }
        Ok(common)
    }

    /// Multi-dimensional access lowers to chained single-dimension
    /// `ArrayAccess` nodes. A literal out-of-range index is
    /// a fatal `LiteralBoundsError` (1-based indexing).
    fn build_array_access(&mut self, array: &ExprAst, indices: &[ExprAst], container: &NodeId, scope: &Scope, location: &str) -> Result<Vec<PortId>, BuildError> {
        let mut current = self.build_expr(array, container, scope)?[0].clone();
        for index_expr in indices {
            let array_ty = self.module.get_port(&current)?.ty.clone();
            let element_ty = array_ty.element_type().cloned().ok_or_else(|| {
                Diagnostic::TypeMismatch {
                    node: NodeId::new("<array-access>"),
                    port: current.clone(),
                    expected: Type::array(Type::any(), 1),
                    actual: array_ty.clone(),
                    location: location.to_string(),
                }
            })?;

            if let ExprAst::Literal { value: LiteralValue::Integer(idx), .. } = index_expr {
                if *idx < 1 {
                    return Err(Diagnostic::LiteralBoundsError { index: *idx, length: u32::MAX, location: location.to_string() }.into());
                }
            }

            let index_port = self.build_expr(index_expr, container, scope)?[0].clone();
            let id = self.module.next_node_id();
            self.module.add_node(Node::new(id.clone(), NodeKind::ArrayAccess));
            self.attach_child(container, &id)?;
            let arr_in = self.module.create_port(id.clone(), "array", array_ty, Direction::In)?;
            let idx_in = self.module.create_port(id.clone(), "index", Type::integer(), Direction::In)?;
            let out = self.module.create_port(id, "element", element_ty, Direction::Out)?;
            self.connect_coerced(&current, &arr_in, location)?;
            self.connect_coerced(&index_port, &idx_in, location)?;
            current = out;
        }
        Ok(vec![current])
    }

    fn build_record_init(&mut self, fields: &IndexMap<String, ExprAst>, container: &NodeId, scope: &Scope, location: &str) -> Result<Vec<PortId>, BuildError> {
        let id = self.module.next_node_id();
        self.module.add_node(Node::new(id.clone(), NodeKind::RecordInit));
        self.attach_child(container, &id)?;
        let mut field_types = IndexMap::new();
        let mut field_names = Vec::new();
        for (name, expr) in fields {
            let value_port = self.build_expr(expr, container, scope)?[0].clone();
            let ty = self.module.get_port(&value_port)?.ty.clone();
            let in_p = self.module.create_port(id.clone(), name.clone(), ty.clone(), Direction::In)?;
            self.connect_coerced(&value_port, &in_p, location)?;
            field_types.insert(name.clone(), ty);
            field_names.push(name.clone());
        }
        let out = self.module.create_port(id, "record", Type::record(field_types), Direction::Out)?;
        self.module.get_port_mut(&out)?.field_names = Some(field_names);
        Ok(vec![out])
    }

    fn build_record_access(&mut self, record: &ExprAst, field: &str, container: &NodeId, scope: &Scope, location: &str) -> Result<Vec<PortId>, BuildError> {
        let record_port = self.build_expr(record, container, scope)?[0].clone();
        let record_ty = self.module.get_port(&record_port)?.ty.clone();
        let field_ty = match &record_ty.resolved().kind {
            flowir_core::types::TypeKind::Record { fields } => fields.get(field).cloned().ok_or_else(|| {
                Diagnostic::UnresolvedIdentifier { name: field.to_string(), location: location.to_string() }
            })?,
            _ => {
                return Err(Diagnostic::TypeMismatch {
                    node: NodeId::new("<record-access>"),
                    port: record_port.clone(),
                    expected: Type::record(IndexMap::new()),
                    actual: record_ty,
                    location: location.to_string(),
                }
                .into())
            }
        };
        let id = self.module.next_node_id();
        self.module.add_node(Node::new(id.clone(), NodeKind::RecordAccess { field: field.to_string() }));
        self.attach_child(container, &id)?;
        let in_p = self.module.create_port(id.clone(), "record", record_ty, Direction::In)?;
        let out = self.module.create_port(id, field, field_ty, Direction::Out)?;
        self.connect_coerced(&record_port, &in_p, location)?;
        Ok(vec![out])
    }

    fn build_call(
        &mut self,
        callee: &str,
        args: &[ExprAst],
        pragmas: &IndexMap<String, crate::ast::PragmaAst>,
        container: &NodeId,
        scope: &Scope,
        location: &str,
    ) -> Result<Vec<PortId>, BuildError> {
        let fn_id = FunctionId::new(callee.to_string());
        if let Some(def) = self.module.functions.get(&fn_id).cloned() {
            if args.len() != def.params.len() {
                return Err(Diagnostic::ArityMismatch {
                    callee: callee.to_string(),
                    expected: def.params.len(),
                    actual: args.len(),
                    location: location.to_string(),
                }
                .into());
            }
            let id = self.module.next_node_id();
            self.module.add_node(Node::new(id.clone(), NodeKind::FunctionCall { callee: fn_id }));
            self.attach_child(container, &id)?;
            for (arg, param) in args.iter().zip(def.params.iter()) {
                let arg_port = self.build_expr(arg, container, scope)?[0].clone();
                let in_p = self.module.create_port(id.clone(), param.name.clone(), param.ty.clone(), Direction::In)?;
                self.connect_coerced(&arg_port, &in_p, location)?;
            }
            let mut outs = Vec::new();
            for (i, ret_ty) in def.returns.iter().enumerate() {
                outs.push(self.module.create_port(id.clone(), format!("return{i}"), ret_ty.clone(), Direction::Out)?);
            }
            self.apply_pragmas(&id, pragmas, callee, location)?;
            Ok(outs)
        } else {
            // Not a declared function: treat as a built-in primitive.
            // The builtin's arity and result type come from its arguments
            // (built-ins are effectively polymorphic identity-on-type, the
            // way e.g. `abs`/`min`/`max` behave); result type mirrors the
            // first argument.
            let id = self.module.next_node_id();
            self.module.add_node(Node::new(id.clone(), NodeKind::BuiltInCall { name: callee.to_string() }));
            self.attach_child(container, &id)?;
            let mut first_ty = None;
            for (i, arg) in args.iter().enumerate() {
                let arg_port = self.build_expr(arg, container, scope)?[0].clone();
                let ty = self.module.get_port(&arg_port)?.ty.clone();
                if first_ty.is_none() {
                    first_ty = Some(ty.clone());
                }
                let in_p = self.module.create_port(id.clone(), format!("arg{i}"), ty, Direction::In)?;
                self.connect_coerced(&arg_port, &in_p, location)?;
            }
            let result_ty = first_ty.unwrap_or_else(Type::any);
            let out = self.module.create_port(id.clone(), "result", result_ty, Direction::Out)?;
            self.apply_pragmas(&id, pragmas, callee, location)?;
            Ok(vec![out])
        }
    }

    /// Attaches a call expression's pragmas to its node.
    /// `max_time` is the only pragma the timeout-lifting pass reads; any
    /// other name is an unrecognized pragma and is fatal at build time.
    fn apply_pragmas(
        &mut self,
        node_id: &NodeId,
        pragmas: &IndexMap<String, crate::ast::PragmaAst>,
        callee: &str,
        location: &str,
    ) -> Result<(), BuildError> {
        for (name, value) in pragmas {
            if name != "max_time" {
                return Err(Diagnostic::UnknownPragma { name: name.clone(), function: FunctionId::new(callee), location: location.to_string() }.into());
            }
            let pv = match value {
                crate::ast::PragmaAst::Number(n) => flowir_core::function::PragmaValue::Number(*n),
                crate::ast::PragmaAst::Text(t) => flowir_core::function::PragmaValue::Text(t.clone()),
                crate::ast::PragmaAst::Flag(b) => flowir_core::function::PragmaValue::Flag(*b),
            };
            self.module.get_node_mut(node_id)?.pragmas.insert(name.clone(), pv);
        }
        Ok(())
    }

    /// Builds the `If`/`ElseIf`/`Else` chain. Every branch
    /// must produce the same output arity; their result ports are recorded
    /// on each `Branch` node for the emitter to read structurally -- the
    /// `If` node's own out ports are virtual (see module docs).
    fn build_if(&mut self, branches: &[BranchAst], container: &NodeId, scope: &Scope, location: &str) -> Result<Vec<PortId>, BuildError> {
        let if_id = self.module.next_node_id();
        self.module.add_node(Node::new(if_id.clone(), NodeKind::If));
        self.attach_child(container, &if_id)?;

        let mut expected_arity = None;
        for (i, branch) in branches.iter().enumerate() {
            let kind = match (i, branch.condition.is_some()) {
                (0, true) => BranchKind::Then,
                (_, true) => BranchKind::ElseIf,
                (_, false) => BranchKind::Else,
            };
            let branch_id = self.module.next_node_id();
            self.module.add_node(Node::new(branch_id.clone(), NodeKind::Branch { kind }));
            {
                let if_node = self.module.get_node_mut(&if_id)?;
                if_node.branches.push(branch_id.clone());
            }
            self.module.get_node_mut(&branch_id)?.parent = Some(if_id.clone());

            if let Some(cond_expr) = &branch.condition {
                let cond_port = self.build_expr(cond_expr, &branch_id, scope)?[0].clone();
                let cond_ty = self.module.get_port(&cond_port)?.ty.clone();
                if !cond_ty.equal(&Type::boolean()) && !cond_ty.equal(&Type::any()) {
                    return Err(Diagnostic::TypeMismatch {
                        node: branch_id.clone(),
                        port: cond_port,
                        expected: Type::boolean(),
                        actual: cond_ty,
                        location: location.to_string(),
                    }
                    .into());
                }
                let cond_node_id = self.module.next_node_id();
                self.module.add_node(Node::new(cond_node_id.clone(), NodeKind::Condition));
                self.module.get_node_mut(&cond_node_id)?.parent = Some(branch_id.clone());
                let cond_in = self.module.create_port(cond_node_id.clone(), "test", Type::boolean(), Direction::In)?;
                self.connect_coerced(&cond_port, &cond_in, location)?;
                self.module.get_node_mut(&branch_id)?.subregions.insert(SubregionSlot::Condition, cond_node_id);
            }

            let body_id = self.module.next_node_id();
            self.module.add_node(Node::new(body_id.clone(), NodeKind::Body));
            self.module.get_node_mut(&body_id)?.parent = Some(branch_id.clone());
            self.module.get_node_mut(&branch_id)?.subregions.insert(SubregionSlot::Body, body_id.clone());

            let mut last_results = Vec::new();
            for stmt in &branch.body {
                last_results = self.build_expr(stmt, &body_id, scope)?;
            }
            match expected_arity {
                None => expected_arity = Some(last_results.len()),
                Some(n) if n != last_results.len() => {
                    return Err(Diagnostic::ArityMismatch {
                        callee: "if-branch".to_string(),
                        expected: n,
                        actual: last_results.len(),
                        location: location.to_string(),
                    }
                    .into())
                }
                _ => {}
            }
            for (j, result) in last_results.iter().enumerate() {
                let ty = self.module.get_port(result)?.ty.clone();
                let branch_out = self.module.create_port(branch_id.clone(), format!("result{j}"), ty, Direction::Out)?;
                self.check_virtual_result(result, &branch_out, location)?;
            }
        }

        let arity = expected_arity.unwrap_or(0);
        let mut if_outs = Vec::with_capacity(arity);
        for j in 0..arity {
            let first_branch = self.module.get_node(&if_id)?.branches[0].clone();
            let sample_out = self.module.get_node(&first_branch)?.out_ports[j].clone();
            let ty = self.module.get_port(&sample_out)?.ty.clone();
            if_outs.push(self.module.create_port(if_id.clone(), format!("result{j}"), ty, Direction::Out)?);
        }
        Ok(if_outs)
    }

    /// No-shadow `Let`: a binding name already visible in
    /// the enclosing scope is a fatal `DuplicateDefinition`.
    fn build_let(&mut self, bindings: &[BindingAst], body: &[ExprAst], container: &NodeId, scope: &Scope, location: &str) -> Result<Vec<PortId>, BuildError> {
        let let_id = self.module.next_node_id();
        self.module.add_node(Node::new(let_id.clone(), NodeKind::Let));
        self.attach_child(container, &let_id)?;

        copy_ports_from_scope(self.module, &let_id, scope)?;

        let init_id = self.module.next_node_id();
        self.module.add_node(Node::new(init_id.clone(), NodeKind::Init));
        self.module.get_node_mut(&init_id)?.parent = Some(let_id.clone());
        self.module.get_node_mut(&let_id)?.subregions.insert(SubregionSlot::Init, init_id.clone());

        let mut let_scope = Scope::child(scope);
        for binding in bindings {
            if scope.is_visible(&binding.name) {
                return Err(Diagnostic::DuplicateDefinition { name: binding.name.clone(), location: location.to_string() }.into());
            }
            let value_port = self.build_expr(&binding.value, &init_id, &let_scope)?[0].clone();
            let_scope.bind(binding.name.clone(), value_port);
        }

        let body_id = self.module.next_node_id();
        self.module.add_node(Node::new(body_id.clone(), NodeKind::Body));
        self.module.get_node_mut(&body_id)?.parent = Some(let_id.clone());
        self.module.get_node_mut(&let_id)?.subregions.insert(SubregionSlot::Body, body_id.clone());

        let mut last_results = Vec::new();
        for stmt in body {
            last_results = self.build_expr(stmt, &body_id, &let_scope)?;
        }

        let body_outs = copy_results_ports(self.module, &body_id, &last_results)?;
        for (result, body_out) in last_results.iter().zip(body_outs.iter()) {
            self.check_virtual_result(result, body_out, location)?;
        }
        let let_outs = copy_ports_from_targets(self.module, &let_id, &body_outs, Direction::Out)?;
        Ok(let_outs)
    }

    /// Builds a `Loop` with its `Init`/`RangeGen`/`Body`/`PostCondition`/
    /// `Returns` subregions. Each body definition is bound into
    /// `loop_scope` as it's built, so later definitions, the condition, and
    /// the reductions all see it -- unlike `Let`, shadowing a prior
    /// iteration's name is allowed, so there's no visibility check here.
    fn build_loop(
        &mut self,
        ranges: &[RangeAst],
        body: &[BindingAst],
        reductions: &[ReductionAst],
        container: &NodeId,
        scope: &Scope,
        location: &str,
    ) -> Result<Vec<PortId>, BuildError> {
        let loop_id = self.module.next_node_id();
        self.module.add_node(Node::new(loop_id.clone(), NodeKind::Loop));
        self.attach_child(container, &loop_id)?;
        copy_ports_from_scope(self.module, &loop_id, scope)?;

        let init_id = self.module.next_node_id();
        self.module.add_node(Node::new(init_id.clone(), NodeKind::Init));
        self.module.get_node_mut(&init_id)?.parent = Some(loop_id.clone());
        self.module.get_node_mut(&loop_id)?.subregions.insert(SubregionSlot::Init, init_id.clone());

        let range_gen_id = self.module.next_node_id();
        self.module.add_node(Node::new(range_gen_id.clone(), NodeKind::RangeGen));
        self.module.get_node_mut(&range_gen_id)?.parent = Some(loop_id.clone());
        self.module.get_node_mut(&loop_id)?.subregions.insert(SubregionSlot::RangeGen, range_gen_id.clone());

        let mut loop_scope = Scope::child(scope);
        for range in ranges {
            let kind = if let (ExprAst::Literal { .. }, ExprAst::Literal { .. }) = (&range.start, &range.end) {
                NodeKind::RangeNumeric
            } else {
                NodeKind::Range
            };
            let start_port = self.build_expr(&range.start, &range_gen_id, scope)?[0].clone();
            let end_port = self.build_expr(&range.end, &range_gen_id, scope)?[0].clone();
            let range_node_id = self.module.next_node_id();
            self.module.add_node(Node::new(range_node_id.clone(), kind));
            self.module.get_node_mut(&range_node_id)?.parent = Some(range_gen_id.clone());
            self.module.get_node_mut(&range_gen_id)?.nodes.push(range_node_id.clone());
            let start_in = self.module.create_port(range_node_id.clone(), "start", Type::integer(), Direction::In)?;
            let end_in = self.module.create_port(range_node_id.clone(), "end", Type::integer(), Direction::In)?;
            let var_out = self.module.create_port(range_node_id.clone(), range.variable.clone(), Type::integer(), Direction::Out)?;
            self.connect_coerced(&start_port, &start_in, location)?;
            self.connect_coerced(&end_port, &end_in, location)?;
            loop_scope.bind(range.variable.clone(), var_out);
        }

        let body_id = self.module.next_node_id();
        self.module.add_node(Node::new(body_id.clone(), NodeKind::Body));
        self.module.get_node_mut(&body_id)?.parent = Some(loop_id.clone());
        self.module.get_node_mut(&loop_id)?.subregions.insert(SubregionSlot::Body, body_id.clone());

        for binding in body {
            let value_port = self.build_expr(&binding.value, &body_id, &loop_scope)?[0].clone();
            loop_scope.bind(binding.name.clone(), value_port);
        }

        let returns_id = self.module.next_node_id();
        self.module.add_node(Node::new(returns_id.clone(), NodeKind::Returns));
        self.module.get_node_mut(&returns_id)?.parent = Some(loop_id.clone());
        self.module.get_node_mut(&loop_id)?.subregions.insert(SubregionSlot::Returns, returns_id.clone());

        let mut loop_outs = Vec::with_capacity(reductions.len());
        for reduction in reductions {
            let value_port = self.build_expr(&reduction.value, &body_id, &loop_scope)?[0].clone();
            let value_ty = self.module.get_port(&value_port)?.ty.clone();
            let reduction_ty = match reduction.op {
                ReductionOp::Array => Type::array(value_ty.clone(), 1),
                _ => value_ty.clone(),
            };
            let reduction_id = self.module.next_node_id();
            self.module.add_node(Node::new(reduction_id.clone(), NodeKind::Reduction { op: reduction.op }));
            self.module.get_node_mut(&reduction_id)?.parent = Some(returns_id.clone());
            self.module.get_node_mut(&returns_id)?.nodes.push(reduction_id.clone());
            let value_in = self.module.create_port(reduction_id.clone(), "value", value_ty, Direction::In)?;
            self.connect_coerced(&value_port, &value_in, location)?;
            let reduction_out = self.module.create_port(reduction_id.clone(), reduction.variable.clone(), reduction_ty.clone(), Direction::Out)?;

            let loop_out = self.module.create_port(loop_id.clone(), reduction.variable.clone(), reduction_ty, Direction::Out)?;
            self.check_virtual_result(&reduction_out, &loop_out, location)?;
            loop_outs.push(loop_out);
        }
        Ok(loop_outs)
    }

    // -- wiring helpers -------------------------------------------------

    fn attach_child(&mut self, container: &NodeId, child: &NodeId) -> Result<(), BuildError> {
        self.module.get_node_mut(container)?.nodes.push(child.clone());
        self.module.get_node_mut(child)?.parent = Some(container.clone());
        Ok(())
    }

    /// Connect `from` -> `to`, recording a `NarrowingWarning` if the edge
    /// narrows `real` to `integer`. The edge is still
    /// created -- narrowing is a warning, not a rejection.
    fn connect_coerced(&mut self, from: &PortId, to: &PortId, location: &str) -> Result<(), BuildError> {
        let (from_ty, to_ty) = (self.module.get_port(from)?.ty.clone(), self.module.get_port(to)?.ty.clone());
        if !can_coerce(&from_ty, &to_ty) {
            return Err(Diagnostic::TypeMismatch {
                node: self.module.get_port(to)?.node.clone(),
                port: to.clone(),
                expected: to_ty,
                actual: from_ty,
                location: location.to_string(),
            }
            .into());
        }
        if needs_narrowing_warning(&from_ty, &to_ty) {
            let node = self.module.get_port(to)?.node.clone();
            self.warnings.push(Diagnostic::NarrowingWarning { node, port: to.clone(), location: location.to_string() });
        }
        self.module.create_edge(from.clone(), to.clone())?;
        Ok(())
    }

    /// Type-checks that `source`'s value may stand in for `virtual_out`,
    /// without creating an edge between them. Container nodes' (`Function`/
    /// `If`/`Let`/`Loop`) out ports never receive a real edge -- nothing may
    /// produce more than one value for them once control flow is involved --
    /// so `flowir-emit` re-derives the link structurally by walking
    /// subregions. This only carries the type-checking half of
    /// `connect_coerced` forward to those virtual links.
    fn check_virtual_result(&mut self, source: &PortId, virtual_out: &PortId, location: &str) -> Result<(), BuildError> {
        let (source_ty, out_ty) = (self.module.get_port(source)?.ty.clone(), self.module.get_port(virtual_out)?.ty.clone());
        if !can_coerce(&source_ty, &out_ty) {
            return Err(Diagnostic::TypeMismatch {
                node: self.module.get_port(virtual_out)?.node.clone(),
                port: virtual_out.clone(),
                expected: out_ty,
                actual: source_ty,
                location: location.to_string(),
            }
            .into());
        }
        if needs_narrowing_warning(&source_ty, &out_ty) {
            let node = self.module.get_port(virtual_out)?.node.clone();
            self.warnings.push(Diagnostic::NarrowingWarning { node, port: virtual_out.clone(), location: location.to_string() });
        }
        Ok(())
    }
}

/// Create in-ports on `node` mirroring every binding currently visible in
/// `scope`, wired from their source ports -- giving the node a
/// self-contained external interface (/// `copy_ports_from_scope`). Used by `Let`/`Loop` so the optimizer's
/// inline/collapse passes can later match port arity via
/// [`flowir_core::module::Module::swap_complex`] without inspecting the
/// node's internals.
pub fn copy_ports_from_scope(module: &mut Module, node: &NodeId, scope: &Scope) -> Result<Vec<(String, PortId)>, BuildError> {
    let mut created = Vec::new();
    let mut bindings: Vec<(String, PortId)> = scope.visible_bindings().into_iter().collect();
    bindings.sort_by(|a, b| a.0.cmp(&b.0));
    for (name, source) in bindings {
        let ty = module.get_port(&source)?.ty.clone();
        let in_port = module.create_port(node.clone(), name.clone(), ty, Direction::In)?;
        module.create_edge(source.clone(), in_port.clone())?;
        created.push((name, in_port));
    }
    Ok(created)
}

/// Create one out port on `node` per port in `results`, matching type and
/// label (`copy_results_ports`). Does not create edges --
/// container nodes' out ports are virtual (see module docs); the returned
/// ports are what the emitter treats as aliases of `results`.
pub fn copy_results_ports(module: &mut Module, node: &NodeId, results: &[PortId]) -> Result<Vec<PortId>, BuildError> {
    let mut created = Vec::with_capacity(results.len());
    for (i, result) in results.iter().enumerate() {
        let port = module.get_port(result)?.clone();
        created.push(module.create_port(node.clone(), format!("{}{i}", port.label), port.ty, Direction::Out)?);
    }
    Ok(created)
}

/// Create ports on `node` in the given `direction`, one per entry in
/// `targets`, matching their type and label (/// `copy_ports_from_targets`) -- used when the caller already knows the
/// expected result shape before a subregion's body is built.
pub fn copy_ports_from_targets(module: &mut Module, node: &NodeId, targets: &[PortId], direction: Direction) -> Result<Vec<PortId>, BuildError> {
    let mut created = Vec::with_capacity(targets.len());
    for target in targets {
        let port = module.get_port(target)?.clone();
        created.push(module.create_port(node.clone(), port.label.clone(), port.ty, direction)?);
    }
    Ok(created)
}
