//! GraphML export ("GraphML export"): a structural dump of the
//! graph for external tools, independent of the JSON wire format in
//! [`crate::wire`]. Each node, port and edge becomes one GraphML element;
//! there is no round-trip back into a [`Module`].

use quick_xml::events::{BytesDecl, BytesStart, BytesText, Event};
use quick_xml::writer::Writer;

use flowir_core::module::Module;
use flowir_core::node::Node;
use flowir_core::port::Port;
use flowir_core::types::Type;

use crate::error::EmitError;

/// Renders every function's graph in `module` as one GraphML document.
pub fn module_to_graphml(module: &Module) -> Result<String, EmitError> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let graphml = BytesStart::new("graphml");
    writer.write_event(Event::Start(graphml.clone()))?;

    write_keys(&mut writer)?;

    for def in module.functions.values() {
        let root = module.get_node(&def.root)?;
        let mut graph = BytesStart::new("graph");
        graph.push_attribute(("id", def.name.as_str()));
        graph.push_attribute(("edgedefault", "directed"));
        writer.write_event(Event::Start(graph.clone()))?;
        write_node(&mut writer, module, root)?;
        write_edges(&mut writer, module, root)?;
        writer.write_event(Event::End(graph.to_end()))?;
    }

    writer.write_event(Event::End(graphml.to_end()))?;
    let bytes = writer.into_inner();
    Ok(String::from_utf8(bytes).expect("quick-xml only emits valid UTF-8"))
}

/// Key declarations for the attributes used on `<node>`, `<port>` and
/// `<edge>` elements, as required by the GraphML schema.
fn write_keys(writer: &mut Writer<Vec<u8>>) -> Result<(), EmitError> {
    let keys: &[(&str, &str, &str)] = &[
        ("d_type", "node", "type"),
        ("d_location", "node", "location"),
        ("d_porttype", "port", "type"),
        ("d_sourceport", "edge", "sourceport"),
        ("d_targetport", "edge", "targetport"),
    ];
    for (id, domain, name) in keys {
        let mut key = BytesStart::new("key");
        key.push_attribute(("id", *id));
        key.push_attribute(("for", *domain));
        key.push_attribute(("attr.name", *name));
        key.push_attribute(("attr.type", "string"));
        writer.write_event(Event::Empty(key))?;
    }
    Ok(())
}

fn write_node(writer: &mut Writer<Vec<u8>>, module: &Module, node: &Node) -> Result<(), EmitError> {
    let mut elem = BytesStart::new("node");
    elem.push_attribute(("id", node.id.as_str()));
    writer.write_event(Event::Start(elem.clone()))?;

    write_data(writer, "d_type", node.kind.name())?;
    if let Some(loc) = node_location(module, node) {
        write_data(writer, "d_location", &loc)?;
    }

    for (i, port_id) in node.in_ports.iter().enumerate() {
        write_port(writer, module.get_port(port_id)?, &format!("in{i}"))?;
    }
    for (i, port_id) in node.out_ports.iter().enumerate() {
        write_port(writer, module.get_port(port_id)?, &format!("out{i}"))?;
    }

    for child in &node.nodes {
        write_node(writer, module, module.get_node(child)?)?;
    }
    for branch in &node.branches {
        write_node(writer, module, module.get_node(branch)?)?;
    }
    for sub in node.subregions.values() {
        write_node(writer, module, module.get_node(sub)?)?;
    }

    writer.write_event(Event::End(elem.to_end()))?;
    Ok(())
}

fn write_port(writer: &mut Writer<Vec<u8>>, port: &Port, name: &str) -> Result<(), EmitError> {
    let mut elem = BytesStart::new("port");
    elem.push_attribute(("name", name));
    writer.write_event(Event::Start(elem.clone()))?;
    write_data(writer, "d_porttype", &type_name(&port.ty))?;
    writer.write_event(Event::End(elem.to_end()))?;
    Ok(())
}

fn write_data(writer: &mut Writer<Vec<u8>>, key: &str, value: &str) -> Result<(), EmitError> {
    let mut elem = BytesStart::new("data");
    elem.push_attribute(("key", key));
    writer.write_event(Event::Start(elem.clone()))?;
    writer.write_event(Event::Text(BytesText::new(value)))?;
    writer.write_event(Event::End(elem.to_end()))?;
    Ok(())
}

/// Edges whose endpoints both live within `root`'s descendant closure --
/// mirrors [`crate::wire`]'s function-scoped edge collection so a function's
/// internal wiring is emitted exactly once, at its graph's top level.
fn write_edges(writer: &mut Writer<Vec<u8>>, module: &Module, root: &Node) -> Result<(), EmitError> {
    let mut owned = std::collections::HashSet::new();
    collect_descendants(module, root, &mut owned);

    for edge in module.edges() {
        let from = module.get_port(&edge.from)?;
        let to = module.get_port(&edge.to)?;
        if !owned.contains(&from.node) || !owned.contains(&to.node) {
            continue;
        }
        let mut elem = BytesStart::new("edge");
        elem.push_attribute(("source", from.node.as_str()));
        elem.push_attribute(("target", to.node.as_str()));
        writer.write_event(Event::Start(elem.clone()))?;
        write_data(writer, "d_sourceport", &from.index.to_string())?;
        write_data(writer, "d_targetport", &to.index.to_string())?;
        writer.write_event(Event::End(elem.to_end()))?;
    }
    Ok(())
}

fn collect_descendants(module: &Module, node: &Node, acc: &mut std::collections::HashSet<flowir_core::id::NodeId>) {
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

/// `Node` carries no location field of its own; a port's carried `Type`
/// does (propagated from the source AST span), so the first typed port
/// found stands in for the node's location. Nodes with no located port
/// (e.g. a bare `If`) simply omit the `<data>` element.
fn node_location(module: &Module, node: &Node) -> Option<String> {
    node.out_ports
        .iter()
        .chain(node.in_ports.iter())
        .filter_map(|p| module.get_port(p).ok())
        .find_map(|p| p.ty.location.clone())
}

fn type_name(ty: &Type) -> String {
    use flowir_core::types::{ScalarKind, TypeKind};
    match &ty.kind {
        TypeKind::Scalar(ScalarKind::Integer) => "integer".to_string(),
        TypeKind::Scalar(ScalarKind::Real) => "real".to_string(),
        TypeKind::Scalar(ScalarKind::Boolean) => "boolean".to_string(),
        TypeKind::Scalar(ScalarKind::Any) => "any".to_string(),
        TypeKind::Array { element, arity } => format!("array<{}>[{arity}]", type_name(element)),
        TypeKind::Stream { element, arity } => format!("stream<{}>[{arity}]", type_name(element)),
        TypeKind::Record { fields } => {
            let parts: Vec<String> = fields.iter().map(|(n, t)| format!("{n}:{}", type_name(t))).collect();
            format!("record{{{}}}", parts.join(","))
        }
        TypeKind::Named { name, .. } => name.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowir_build::ast::{ExprAst, FunctionAst, Program};
    use flowir_build::Builder;
    use flowir_core::node::LiteralValue;
    use flowir_core::ops::BinaryOp;

    fn build(program: &Program) -> Module {
        let mut module = Module::new();
        Builder::new(&mut module).build_program(program).expect("build");
        module
    }

    #[test]
    fn main_function_produces_a_graph_element_per_function() {
        let program = Program {
            functions: vec![FunctionAst {
                name: "main".to_string(),
                params: vec![],
                returns: vec![],
                pragmas: Default::default(),
                body: vec![ExprAst::Literal { value: LiteralValue::Integer(1), location: String::new() }],
                location: String::new(),
            }],
            definitions: vec![],
        };
        let module = build(&program);
        let xml = module_to_graphml(&module).expect("graphml export");
        assert!(xml.starts_with("<?xml"));
        assert!(xml.contains("<graphml>"));
        assert!(xml.contains("graph id=\"main\""));
        assert!(xml.contains("<node id="));
    }

    #[test]
    fn ports_carry_positional_in_out_names() {
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
        let module = build(&program);
        let xml = module_to_graphml(&module).expect("graphml export");
        assert!(xml.contains("name=\"in0\""));
        assert!(xml.contains("name=\"out0\""));
    }
}
