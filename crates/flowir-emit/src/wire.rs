//! IR wire format: `Module <-> JSON` ("IR wire format").
//!
//! Keys are `camelCase` on the wire and `snake_case` internally; the only
//! reserved-word escape needed is `type` <-> `type_`, since `type` is a
//! field name here but a keyword nowhere else in this format. Edges address
//! ports by `(nodeId, portIndex)` pair rather than by the internal
//! [`PortId`], so encoding/decoding an edge means resolving a port's
//! position within its owning node's in-port or out-port list.

use indexmap::IndexMap;
use serde_json::{json, Map, Value};

use flowir_core::edge::EdgeId;
use flowir_core::function::{FunctionDef, Param, PragmaValue};
use flowir_core::id::{FunctionId, NodeId, PortId};
use flowir_core::module::Module;
use flowir_core::node::{BranchKind, LiteralValue, Node, NodeKind, SubregionSlot};
use flowir_core::ops::{BinaryOp, ReductionOp, UnaryOp};
use flowir_core::port::{Direction, Port};
use flowir_core::types::{ScalarKind, Type, TypeKind};

use crate::error::EmitError;

pub fn module_to_json(module: &Module) -> Value {
    let functions: Vec<Value> = module.functions.values().map(|def| function_to_json(module, def)).collect();
    let definitions: Vec<Value> = module
        .definitions_sorted()
        .map(|(name, ty)| {
            let mut v = type_to_json(ty);
            v.as_object_mut().unwrap().insert("name".to_string(), json!(name));
            v
        })
        .collect();
    json!({ "functions": functions, "definitions": definitions })
}

pub fn module_from_json(value: &Value) -> Result<Module, EmitError> {
    let mut module = Module::new();
    let obj = value.as_object().ok_or_else(|| malformed("module must be a JSON object"))?;

    if let Some(defs) = obj.get("definitions").and_then(Value::as_array) {
        for entry in defs {
            let name = entry.get("name").and_then(Value::as_str).ok_or_else(|| malformed("definition missing name"))?;
            let ty = type_from_json(entry)?;
            module.definitions.insert(name.to_string(), ty);
        }
    }

    if let Some(funcs) = obj.get("functions").and_then(Value::as_array) {
        for entry in funcs {
            function_from_json(&mut module, entry)?;
        }
    }

    Ok(module)
}

fn malformed(msg: &str) -> EmitError {
    EmitError::UnsupportedNode { node: msg.to_string(), kind: "malformed wire IR" }
}

// ---------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------

fn type_to_json(ty: &Type) -> Value {
    let mut v = match &ty.kind {
        TypeKind::Scalar(kind) => {
            let name = match kind {
                ScalarKind::Integer => "integer",
                ScalarKind::Real => "real",
                ScalarKind::Boolean => "boolean",
                ScalarKind::Any => "any",
            };
            json!({ "name": name })
        }
        TypeKind::Array { element, arity } => json!({ "element": type_to_json(element), "multiType": "array", "arity": arity }),
        TypeKind::Stream { element, arity } => json!({ "element": type_to_json(element), "multiType": "stream", "arity": arity }),
        TypeKind::Record { fields } => {
            let mut fields_obj = Map::new();
            for (name, field_ty) in fields {
                fields_obj.insert(name.clone(), type_to_json(field_ty));
            }
            json!({ "name": "record", "fields": fields_obj })
        }
        TypeKind::Named { name, aliased } => {
            let mut v = type_to_json(aliased);
            v.as_object_mut().unwrap().insert("typeName".to_string(), json!(name));
            v.as_object_mut().unwrap().insert("customType".to_string(), json!(true));
            v
        }
    };
    if let Some(loc) = &ty.location {
        v.as_object_mut().unwrap().insert("location".to_string(), json!(loc));
    }
    v
}

fn type_from_json(v: &Value) -> Result<Type, EmitError> {
    let location = v.get("location").and_then(Value::as_str).map(str::to_string);
    let is_named = v.get("customType").and_then(Value::as_bool).unwrap_or(false);

    let base = if let Some(multi) = v.get("multiType").and_then(Value::as_str) {
        let element = type_from_json(v.get("element").ok_or_else(|| malformed("array/stream type missing element"))?)?;
        let arity = v.get("arity").and_then(Value::as_u64).unwrap_or(1) as u32;
        match multi {
            "array" => Type::array(element, arity),
            "stream" => Type::stream(element, arity),
            other => return Err(malformed(&format!("unknown multiType '{other}'"))),
        }
    } else {
        match v.get("name").and_then(Value::as_str) {
            Some("record") => {
                let mut fields = IndexMap::new();
                if let Some(obj) = v.get("fields").and_then(Value::as_object) {
                    for (name, field_v) in obj {
                        fields.insert(name.clone(), type_from_json(field_v)?);
                    }
                }
                Type::record(fields)
            }
            Some("integer") => Type::integer(),
            Some("real") => Type::real(),
            Some("boolean") => Type::boolean(),
            Some("any") | None => Type::any(),
            Some(other) => return Err(malformed(&format!("unknown scalar type name '{other}'"))),
        }
    };

    let base = if let Some(loc) = location.clone() { base.with_location(loc) } else { base };

    if is_named {
        let alias_name = v.get("typeName").and_then(Value::as_str).unwrap_or("Named").to_string();
        Ok(Type::named(alias_name, base))
    } else {
        Ok(base)
    }
}

// ---------------------------------------------------------------------
// Functions
// ---------------------------------------------------------------------

fn function_to_json(module: &Module, def: &FunctionDef) -> Value {
    let params: Vec<Value> = def.params.iter().map(|p| json!({ "name": p.name, "type": type_to_json(&p.ty) })).collect();
    let returns: Vec<Value> = def.returns.iter().map(type_to_json).collect();
    let pragmas = pragmas_to_json(&def.pragmas);
    let root = module.get_node(&def.root).expect("function root must exist");
    json!({
        "name": def.name,
        "params": params,
        "returns": returns,
        "pragmas": pragmas,
        "root": node_to_json(module, root, true),
    })
}

fn function_from_json(module: &mut Module, v: &Value) -> Result<(), EmitError> {
    let name = v.get("name").and_then(Value::as_str).ok_or_else(|| malformed("function missing name"))?.to_string();
    let root_id = module.next_node_id();
    module.add_node(Node::new(root_id.clone(), NodeKind::Function { name: name.clone() }));

    // Root ports (both params and returns) are created generically by
    // `node_from_json`'s `inPorts`/`outPorts` decode below, in the same
    // order the builder emits them in -- these arrays only carry names and
    // declared types for `FunctionDef`'s own bookkeeping.
    let params_v = v.get("params").and_then(Value::as_array).cloned().unwrap_or_default();
    let mut params = Vec::new();
    for p in &params_v {
        let pname = p.get("name").and_then(Value::as_str).ok_or_else(|| malformed("param missing name"))?.to_string();
        let ty = type_from_json(p.get("type").ok_or_else(|| malformed("param missing type"))?)?;
        params.push(Param { name: pname, ty });
    }

    let returns_v = v.get("returns").and_then(Value::as_array).cloned().unwrap_or_default();
    let mut returns = Vec::new();
    for r in &returns_v {
        returns.push(type_from_json(r)?);
    }

    let mut def = FunctionDef::new(name.clone(), root_id.clone());
    def.params = params;
    def.returns = returns;
    def.pragmas = pragmas_from_json(v.get("pragmas"));
    module.functions.insert(FunctionId::new(name), def);

    if let Some(root_json) = v.get("root") {
        node_from_json(module, root_json, &root_id)?;
    }

    Ok(())
}

fn pragmas_to_json(pragmas: &IndexMap<String, PragmaValue>) -> Value {
    let mut obj = Map::new();
    for (k, v) in pragmas {
        let jv = match v {
            PragmaValue::Number(n) => json!(n),
            PragmaValue::Text(t) => json!(t),
            PragmaValue::Flag(b) => json!(b),
        };
        obj.insert(k.clone(), jv);
    }
    Value::Object(obj)
}

fn pragmas_from_json(v: Option<&Value>) -> IndexMap<String, PragmaValue> {
    let mut out = IndexMap::new();
    if let Some(obj) = v.and_then(Value::as_object) {
        for (k, pv) in obj {
            let value = if let Some(n) = pv.as_f64() {
                PragmaValue::Number(n)
            } else if let Some(b) = pv.as_bool() {
                PragmaValue::Flag(b)
            } else {
                PragmaValue::Text(pv.as_str().unwrap_or_default().to_string())
            };
            out.insert(k.clone(), value);
        }
    }
    out
}

// ---------------------------------------------------------------------
// Nodes, ports, edges
// ---------------------------------------------------------------------

fn port_to_json(port: &Port) -> Value {
    let direction = match port.direction {
        Direction::In => "in",
        Direction::Out => "out",
    };
    let mut v = json!({
        "nodeId": port.node.as_str(),
        "index": port.index,
        "type": type_to_json(&port.ty),
        "label": port.label,
        // Not part of the documented wire shape, but needed to round-trip
        // function parameter ports: they are `Direction::Out` yet live in
        // `inPorts` (`create_param_port`), so list placement
        // alone can't recover their real direction on decode.
        "direction": direction,
    });
    if let Some(loc) = &port.ty.location {
        v.as_object_mut().unwrap().insert("location".to_string(), json!(loc));
    }
    v
}

/// `is_root` is true only for a function's own root node: edges are
/// collected once there (every edge whose endpoints both live within this
/// function) rather than at every nesting level, which would otherwise
/// duplicate the same edge once per ancestor container.
fn node_to_json(module: &Module, node: &Node, is_root: bool) -> Value {
    let mut obj = Map::new();
    obj.insert("id".to_string(), json!(node.id.as_str()));
    obj.insert("name".to_string(), json!(node.kind.name()));
    obj.insert("inPorts".to_string(), Value::Array(node.in_ports.iter().map(|p| port_to_json(module.get_port(p).unwrap())).collect()));
    obj.insert("outPorts".to_string(), Value::Array(node.out_ports.iter().map(|p| port_to_json(module.get_port(p).unwrap())).collect()));

    if !node.nodes.is_empty() {
        obj.insert("nodes".to_string(), Value::Array(node.nodes.iter().map(|id| node_to_json(module, module.get_node(id).unwrap(), false)).collect()));
    }
    if !node.branches.is_empty() {
        obj.insert("branches".to_string(), Value::Array(node.branches.iter().map(|id| node_to_json(module, module.get_node(id).unwrap(), false)).collect()));
    }
    for (slot, key) in subregion_keys() {
        if let Some(sub_id) = node.subregions.get(&slot) {
            obj.insert(key.to_string(), node_to_json(module, module.get_node(sub_id).unwrap(), false));
        }
    }
    if !node.pragmas.is_empty() {
        obj.insert("pragmas".to_string(), pragmas_to_json(&node.pragmas));
    }

    if is_root {
        let edges = edges_within(module, node);
        if !edges.is_empty() {
            obj.insert("edges".to_string(), Value::Array(edges));
        }
    }

    match &node.kind {
        NodeKind::FunctionCall { callee } => {
            obj.insert("callee".to_string(), json!(callee.as_str()));
        }
        NodeKind::BuiltInCall { name } => {
            obj.insert("builtin".to_string(), json!(name));
        }
        NodeKind::Literal { value } => {
            obj.insert("value".to_string(), literal_to_json(value));
        }
        NodeKind::Identifier { name } => {
            obj.insert("identifier".to_string(), json!(name));
        }
        NodeKind::Binary { op } => {
            obj.insert("op".to_string(), json!(binary_op_name(*op)));
        }
        NodeKind::Unary { op } => {
            obj.insert("op".to_string(), json!(unary_op_name(*op)));
        }
        NodeKind::Branch { kind } => {
            obj.insert("kind".to_string(), json!(branch_kind_name(*kind)));
        }
        NodeKind::Reduction { op } => {
            obj.insert("op".to_string(), json!(reduction_op_name(*op)));
        }
        NodeKind::RecordAccess { field } => {
            obj.insert("field".to_string(), json!(field));
        }
        NodeKind::Function { name } => {
            obj.insert("functionName".to_string(), json!(name));
        }
        _ => {}
    }

    Value::Object(obj)
}

/// Every edge whose endpoints are both ports owned by nodes inside `node`
/// (its direct children, its subregions, its branches) -- i.e. not edges
/// captured in from an enclosing scope, which belong to the ancestor that
/// actually produces them.
fn edges_within(module: &Module, node: &Node) -> Vec<Value> {
    let mut owned_nodes = std::collections::HashSet::new();
    collect_descendants(module, node, &mut owned_nodes);

    let mut out = Vec::new();
    for edge in module.edges() {
        let from_node = &module.get_port(&edge.from).unwrap().node;
        let to_node = &module.get_port(&edge.to).unwrap().node;
        if owned_nodes.contains(from_node) && owned_nodes.contains(to_node) {
            out.push(edge_to_json(module, edge));
        }
    }
    out
}

fn collect_descendants(module: &Module, node: &Node, acc: &mut std::collections::HashSet<NodeId>) {
    acc.insert(node.id.clone());
    for child in &node.nodes {
        if let Ok(n) = module.get_node(child) {
            collect_descendants(module, n, acc);
        }
    }
    for branch in &node.branches {
        if let Ok(n) = module.get_node(branch) {
            collect_descendants(module, n, acc);
        }
    }
    for sub in node.subregions.values() {
        if let Ok(n) = module.get_node(sub) {
            collect_descendants(module, n, acc);
        }
    }
}

fn edge_to_json(module: &Module, edge: &flowir_core::edge::Edge) -> Value {
    let from = module.get_port(&edge.from).unwrap();
    let to = module.get_port(&edge.to).unwrap();
    json!({
        "from": [from.node.as_str(), from.index],
        "to": [to.node.as_str(), to.index],
    })
}

fn subregion_keys() -> [(SubregionSlot, &'static str); 7] {
    [
        (SubregionSlot::Condition, "condition"),
        (SubregionSlot::Init, "init"),
        (SubregionSlot::Body, "body"),
        (SubregionSlot::RangeGen, "rangeGen"),
        (SubregionSlot::PreCondition, "preCondition"),
        (SubregionSlot::PostCondition, "postCondition"),
        (SubregionSlot::Returns, "returns"),
    ]
}

fn literal_to_json(value: &LiteralValue) -> Value {
    match value {
        LiteralValue::Integer(n) => json!(n),
        LiteralValue::Real(r) => json!(r),
        LiteralValue::Boolean(b) => json!(b),
    }
}

fn binary_op_name(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Add => "add",
        BinaryOp::Sub => "sub",
        BinaryOp::Mul => "mul",
        BinaryOp::Div => "div",
        BinaryOp::Mod => "mod",
        BinaryOp::Pow => "pow",
        BinaryOp::Eq => "eq",
        BinaryOp::Ne => "ne",
        BinaryOp::Lt => "lt",
        BinaryOp::Le => "le",
        BinaryOp::Gt => "gt",
        BinaryOp::Ge => "ge",
        BinaryOp::And => "and",
        BinaryOp::Or => "or",
    }
}

fn binary_op_from_name(name: &str) -> Result<BinaryOp, EmitError> {
    Ok(match name {
        "add" => BinaryOp::Add,
        "sub" => BinaryOp::Sub,
        "mul" => BinaryOp::Mul,
        "div" => BinaryOp::Div,
        "mod" => BinaryOp::Mod,
        "pow" => BinaryOp::Pow,
        "eq" => BinaryOp::Eq,
        "ne" => BinaryOp::Ne,
        "lt" => BinaryOp::Lt,
        "le" => BinaryOp::Le,
        "gt" => BinaryOp::Gt,
        "ge" => BinaryOp::Ge,
        "and" => BinaryOp::And,
        "or" => BinaryOp::Or,
        other => return Err(malformed(&format!("unknown binary op '{other}'"))),
    })
}

fn unary_op_name(op: UnaryOp) -> &'static str {
    match op {
        UnaryOp::Neg => "neg",
        UnaryOp::Not => "not",
    }
}

fn unary_op_from_name(name: &str) -> Result<UnaryOp, EmitError> {
    Ok(match name {
        "neg" => UnaryOp::Neg,
        "not" => UnaryOp::Not,
        other => return Err(malformed(&format!("unknown unary op '{other}'"))),
    })
}

fn branch_kind_name(kind: BranchKind) -> &'static str {
    match kind {
        BranchKind::Then => "then",
        BranchKind::ElseIf => "elseIf",
        BranchKind::Else => "else",
    }
}

fn branch_kind_from_name(name: &str) -> Result<BranchKind, EmitError> {
    Ok(match name {
        "then" => BranchKind::Then,
        "elseIf" => BranchKind::ElseIf,
        "else" => BranchKind::Else,
        other => return Err(malformed(&format!("unknown branch kind '{other}'"))),
    })
}

fn reduction_op_name(op: ReductionOp) -> &'static str {
    match op {
        ReductionOp::Array => "array",
        ReductionOp::Value => "value",
        ReductionOp::Sum => "sum",
        ReductionOp::Product => "product",
    }
}

fn reduction_op_from_name(name: &str) -> Result<ReductionOp, EmitError> {
    Ok(match name {
        "array" => ReductionOp::Array,
        "value" => ReductionOp::Value,
        "sum" => ReductionOp::Sum,
        "product" => ReductionOp::Product,
        other => return Err(malformed(&format!("unknown reduction op '{other}'"))),
    })
}

/// Decodes a node JSON object, attaching its ports/children to `id` (a node
/// already inserted into `module` by the caller with the right `NodeKind`
/// for plain recursive cases, or freshly created here for nested ones).
fn node_from_json(module: &mut Module, v: &Value, id: &NodeId) -> Result<(), EmitError> {
    decode_ports(module, v, id, "inPorts", Direction::In)?;
    decode_ports(module, v, id, "outPorts", Direction::Out)?;

    if let Some(arr) = v.get("nodes").and_then(Value::as_array) {
        for child_v in arr {
            let child_id = decode_node_recursive(module, child_v, Some(id.clone()))?;
            module.get_node_mut(id)?.nodes.push(child_id);
        }
    }
    if let Some(arr) = v.get("branches").and_then(Value::as_array) {
        for branch_v in arr {
            let branch_id = decode_node_recursive(module, branch_v, Some(id.clone()))?;
            module.get_node_mut(id)?.branches.push(branch_id);
        }
    }
    for (slot, key) in subregion_keys() {
        if let Some(sub_v) = v.get(key) {
            let sub_id = decode_node_recursive(module, sub_v, Some(id.clone()))?;
            module.get_node_mut(id)?.subregions.insert(slot, sub_id);
        }
    }
    if let Some(pragmas_v) = v.get("pragmas") {
        module.get_node_mut(id)?.pragmas = pragmas_from_json(Some(pragmas_v));
    }

    if let Some(edges) = v.get("edges").and_then(Value::as_array) {
        for edge_v in edges {
            decode_edge(module, edge_v)?;
        }
    }

    Ok(())
}

fn decode_ports(module: &mut Module, v: &Value, id: &NodeId, key: &str, list_direction: Direction) -> Result<(), EmitError> {
    if let Some(arr) = v.get(key).and_then(Value::as_array) {
        for port_v in arr {
            let label = port_v.get("label").and_then(Value::as_str).unwrap_or("").to_string();
            let ty = type_from_json(port_v.get("type").ok_or_else(|| malformed("port missing type"))?)?;
            let is_param_port = list_direction == Direction::In && port_v.get("direction").and_then(Value::as_str) == Some("out");
            if is_param_port {
                module.create_param_port(id.clone(), label, ty)?;
            } else {
                module.create_port(id.clone(), label, ty, list_direction)?;
            }
        }
    }
    Ok(())
}

fn decode_node_recursive(module: &mut Module, v: &Value, parent: Option<NodeId>) -> Result<NodeId, EmitError> {
    let name = v.get("name").and_then(Value::as_str).ok_or_else(|| malformed("node missing name"))?;
    let kind = decode_kind(name, v)?;
    let id = module.next_node_id();
    module.add_node(Node::new(id.clone(), kind));
    if let Some(p) = parent {
        module.get_node_mut(&id)?.parent = Some(p);
    }
    node_from_json(module, v, &id)?;
    Ok(id)
}

fn decode_kind(name: &str, v: &Value) -> Result<NodeKind, EmitError> {
    Ok(match name {
        "Function" => NodeKind::Function { name: v.get("functionName").and_then(Value::as_str).unwrap_or_default().to_string() },
        "FunctionCall" => NodeKind::FunctionCall {
            callee: FunctionId::new(v.get("callee").and_then(Value::as_str).ok_or_else(|| malformed("FunctionCall missing callee"))?),
        },
        "BuiltInCall" => {
            NodeKind::BuiltInCall { name: v.get("builtin").and_then(Value::as_str).ok_or_else(|| malformed("BuiltInCall missing builtin"))?.to_string() }
        }
        "Literal" => NodeKind::Literal { value: decode_literal(v.get("value").ok_or_else(|| malformed("Literal missing value"))?)? },
        "Identifier" => NodeKind::Identifier { name: v.get("identifier").and_then(Value::as_str).unwrap_or_default().to_string() },
        "Binary" => NodeKind::Binary { op: binary_op_from_name(v.get("op").and_then(Value::as_str).unwrap_or_default())? },
        "Unary" => NodeKind::Unary { op: unary_op_from_name(v.get("op").and_then(Value::as_str).unwrap_or_default())? },
        "If" => NodeKind::If,
        "Branch" => NodeKind::Branch { kind: branch_kind_from_name(v.get("kind").and_then(Value::as_str).unwrap_or_default())? },
        "Condition" => NodeKind::Condition,
        "Let" => NodeKind::Let,
        "Init" => NodeKind::Init,
        "Body" => NodeKind::Body,
        "Loop" => NodeKind::Loop,
        "RangeGen" => NodeKind::RangeGen,
        "Range" => NodeKind::Range,
        "RangeNumeric" => NodeKind::RangeNumeric,
        "Scatter" => NodeKind::Scatter,
        "PreCondition" => NodeKind::PreCondition,
        "PostCondition" => NodeKind::PostCondition,
        "Returns" => NodeKind::Returns,
        "Reduction" => NodeKind::Reduction { op: reduction_op_from_name(v.get("op").and_then(Value::as_str).unwrap_or_default())? },
        "OldValue" => NodeKind::OldValue,
        "ArrayAccess" => NodeKind::ArrayAccess,
        "ArrayInit" => NodeKind::ArrayInit,
        "RecordAccess" => NodeKind::RecordAccess { field: v.get("field").and_then(Value::as_str).unwrap_or_default().to_string() },
        "RecordInit" => NodeKind::RecordInit,
        other => return Err(malformed(&format!("unknown node kind '{other}'"))),
    })
}

fn decode_literal(v: &Value) -> Result<LiteralValue, EmitError> {
    if let Some(b) = v.as_bool() {
        Ok(LiteralValue::Boolean(b))
    } else if let Some(n) = v.as_i64() {
        Ok(LiteralValue::Integer(n))
    } else if let Some(f) = v.as_f64() {
        Ok(LiteralValue::Real(f))
    } else {
        Err(malformed("literal value must be a bool, integer or real"))
    }
}

/// Accepts either the current `{"from": [nodeId, idx], "to": [nodeId, idx]}`
/// shape or the older `[{"node_id":..,"index":..}, {"node_id":..,"index":..}]`
/// pair-of-objects shape for the same edge, the latter kept only for reading
/// IR dumps produced by that earlier format.
fn decode_edge(module: &mut Module, v: &Value) -> Result<EdgeId, EmitError> {
    let (from, to) = match v {
        Value::Object(_) => {
            let from = v.get("from").and_then(Value::as_array).ok_or_else(|| malformed("edge missing from"))?;
            let to = v.get("to").and_then(Value::as_array).ok_or_else(|| malformed("edge missing to"))?;
            (endpoint_pair(from)?, endpoint_pair(to)?)
        }
        Value::Array(pair) => {
            let from = pair.first().ok_or_else(|| malformed("edge missing from"))?;
            let to = pair.get(1).ok_or_else(|| malformed("edge missing to"))?;
            (endpoint_object(from)?, endpoint_object(to)?)
        }
        _ => return Err(malformed("edge must be an object or a two-element array")),
    };
    let from_port = resolve_port(module, &from, Direction::Out)?;
    let to_port = resolve_port(module, &to, Direction::In)?;
    Ok(module.create_edge(from_port, to_port)?)
}

/// Reads a `[nodeId, portIndex]` pair into `(nodeId, portIndex)`.
fn endpoint_pair(pair: &[Value]) -> Result<(String, u64), EmitError> {
    let node_id = pair.first().and_then(Value::as_str).ok_or_else(|| malformed("edge endpoint missing nodeId"))?;
    let index = pair.get(1).and_then(Value::as_u64).ok_or_else(|| malformed("edge endpoint missing portIndex"))?;
    Ok((node_id.to_string(), index))
}

/// Reads a `{"node_id":.., "index":..}` object into `(nodeId, portIndex)`.
fn endpoint_object(v: &Value) -> Result<(String, u64), EmitError> {
    let node_id = v.get("node_id").and_then(Value::as_str).ok_or_else(|| malformed("edge endpoint missing node_id"))?;
    let index = v.get("index").and_then(Value::as_u64).ok_or_else(|| malformed("edge endpoint missing index"))?;
    Ok((node_id.to_string(), index))
}

/// Resolves a `(nodeId, portIndex)` pair to a `PortId`, preferring the list
/// matching `prefer` (out-ports for an edge's `from`, in-ports for `to`) and
/// falling back to the other list for the one case where that doesn't hold:
/// a function's parameter ports are `Direction::Out` but live in `in_ports`.
fn resolve_port(module: &Module, (node_id, index): &(String, u64), prefer: Direction) -> Result<PortId, EmitError> {
    let node_id = NodeId::new(node_id.as_str());
    let index = *index as usize;
    let node = module.get_node(&node_id)?;
    let (primary, secondary) = match prefer {
        Direction::Out => (&node.out_ports, &node.in_ports),
        Direction::In => (&node.in_ports, &node.out_ports),
    };
    primary.get(index).or_else(|| secondary.get(index)).cloned().ok_or_else(|| malformed("edge endpoint index out of range"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowir_build::ast::{ExprAst, FunctionAst, Program};
    use flowir_build::Builder;

    fn build_binary_add() -> Module {
        let program = Program {
            functions: vec![FunctionAst {
                name: "main".to_string(),
                params: vec![],
                returns: vec![],
                pragmas: Default::default(),
                body: vec![ExprAst::Binary {
                    op: BinaryOp::Add,
                    left: Box::new(ExprAst::Literal { value: LiteralValue::Integer(1), location: String::new() }),
                    right: Box::new(ExprAst::Literal { value: LiteralValue::Integer(2), location: String::new() }),
                    location: String::new(),
                }],
                location: String::new(),
            }],
            definitions: vec![],
        };
        let mut module = Module::new();
        Builder::new(&mut module).build_program(&program).expect("build");
        module
    }

    #[test]
    fn current_edge_shape_round_trips() {
        let module = build_binary_add();
        let json = module_to_json(&module);
        let back = module_from_json(&json).expect("decode current shape");
        assert_eq!(back.edges().count(), module.edges().count());
    }

    #[test]
    fn legacy_pair_of_objects_edge_shape_decodes_to_the_same_edge() {
        let module = build_binary_add();
        let json = module_to_json(&module);

        let mut rewritten = json.clone();
        rewrite_edges_to_legacy_shape(&mut rewritten);

        let back = module_from_json(&rewritten).expect("decode legacy shape");
        assert_eq!(back.edges().count(), module.edges().count());
    }

    fn rewrite_edges_to_legacy_shape(v: &mut Value) {
        match v {
            Value::Object(map) => {
                if let Some(Value::Array(edges)) = map.get_mut("edges") {
                    for edge in edges.iter_mut() {
                        let from = edge.get("from").and_then(Value::as_array).unwrap().clone();
                        let to = edge.get("to").and_then(Value::as_array).unwrap().clone();
                        *edge = json!([
                            { "node_id": from[0], "index": from[1] },
                            { "node_id": to[0], "index": to[1] },
                        ]);
                    }
                }
                for child in map.values_mut() {
                    rewrite_edges_to_legacy_shape(child);
                }
            }
            Value::Array(items) => {
                for item in items.iter_mut() {
                    rewrite_edges_to_legacy_shape(item);
                }
            }
            _ => {}
        }
    }
}
