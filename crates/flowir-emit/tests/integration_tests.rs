//! End-to-end tests of the `flowir-build -> flowir-emit` pipeline.
//!
//! Each test builds a [`Program`] AST directly (the concrete parser is out
//! of scope), lowers it with [`flowir_build::Builder`], and checks the
//! resulting C++/JSON/GraphML output. These are output-shape assertions,
//! not a compiled-and-executed binary check: driving a C++ toolchain is
//! `flowir-cli`'s job, not this crate's.

use flowir_build::ast::{BindingAst, ExprAst, FunctionAst, ParamAst, Program, RangeAst, ReductionAst};
use flowir_build::Builder;
use flowir_core::module::Module;
use flowir_core::node::LiteralValue;
use flowir_core::ops::{BinaryOp, ReductionOp};
use flowir_core::types::Type;

use flowir_emit::{emit_cpp, module_from_json, module_to_graphml, module_to_json, EmitOptions};

fn loc() -> String {
    String::new()
}

fn lit(n: i64) -> ExprAst {
    ExprAst::Literal { value: LiteralValue::Integer(n), location: loc() }
}

fn ident(name: &str) -> ExprAst {
    ExprAst::Identifier { name: name.to_string(), location: loc() }
}

fn build(program: &Program) -> Module {
    let mut module = Module::new();
    Builder::new(&mut module).build_program(program).expect("program should build");
    module
}

fn single_function(name: &str, params: Vec<ParamAst>, returns: Vec<Type>, body: Vec<ExprAst>) -> Program {
    Program {
        functions: vec![FunctionAst { name: name.to_string(), params, returns, pragmas: Default::default(), body, location: loc() }],
        definitions: vec![],
    }
}

#[test]
fn arithmetic_expression_emits_a_binary_chain() {
    let program = single_function(
        "main",
        vec![],
        vec![],
        vec![ExprAst::Binary {
            op: BinaryOp::Add,
            left: Box::new(lit(2)),
            right: Box::new(ExprAst::Binary { op: BinaryOp::Mul, left: Box::new(lit(3)), right: Box::new(lit(4)), location: loc() }),
            location: loc(),
        }],
    );
    let module = build(&program);
    let cpp = emit_cpp(&module, &EmitOptions::default()).expect("emit");
    assert!(cpp.contains("int main("));
    assert!(cpp.contains("+"));
    assert!(cpp.contains("*"));
}

#[test]
fn array_access_indexes_with_zero_based_offset() {
    let array_ty = Type::array(Type::integer(), 1);
    let program = single_function(
        "g",
        vec![ParamAst { name: "a".to_string(), ty: array_ty }],
        vec![Type::integer()],
        vec![ExprAst::ArrayAccess { array: Box::new(ident("a")), indices: vec![lit(2)], location: loc() }],
    );
    let module = build(&program);
    let cpp = emit_cpp(&module, &EmitOptions::default()).expect("emit");
    // 1-based source index 2 becomes a 0-based std::vector subscript.
    assert!(cpp.contains("a[1]") || cpp.contains("a.at(1)"), "expected a 0-based index in: {cpp}");
}

#[test]
fn array_concat_with_or_emits_an_insert_call() {
    let array_ty = Type::array(Type::integer(), 1);
    let program = single_function(
        "g",
        vec![
            ParamAst { name: "a".to_string(), ty: array_ty.clone() },
            ParamAst { name: "b".to_string(), ty: array_ty.clone() },
        ],
        vec![array_ty],
        vec![ExprAst::Binary { op: BinaryOp::Or, left: Box::new(ident("a")), right: Box::new(ident("b")), location: loc() }],
    );
    let module = build(&program);
    let cpp = emit_cpp(&module, &EmitOptions::default()).expect("emit");
    assert!(cpp.contains(".insert("), "expected vector concatenation via insert() in: {cpp}");
}

#[test]
fn array_literal_widens_to_the_elements_common_type() {
    let program = single_function(
        "g",
        vec![],
        vec![Type::array(Type::real(), 1)],
        vec![ExprAst::ArrayLiteral {
            elements: vec![lit(1), ExprAst::Literal { value: LiteralValue::Real(2.5), location: loc() }],
            location: loc(),
        }],
    );
    let module = build(&program);
    let array_init = module.nodes_of_kind("ArrayInit").next().expect("one ArrayInit node");
    let out_ty = module.get_port(&array_init.out_ports[0]).unwrap().ty.clone();
    assert!(out_ty.equal(&Type::array(Type::real(), 1)), "expected array<real>, got {out_ty:?}");
}

#[test]
fn array_literal_with_incompatible_element_kinds_is_a_type_mismatch() {
    let program = single_function(
        "g",
        vec![],
        vec![],
        vec![ExprAst::ArrayLiteral {
            elements: vec![lit(1), ExprAst::Literal { value: LiteralValue::Boolean(true), location: loc() }],
            location: loc(),
        }],
    );
    let mut module = Module::new();
    let result = Builder::new(&mut module).build_program(&program);
    assert!(result.is_err(), "expected a type mismatch building an array of mixed integer/boolean elements");
}

#[test]
fn loop_sum_reduction_emits_an_accumulator_loop() {
    let program = single_function(
        "sum_to",
        vec![],
        vec![Type::integer()],
        vec![ExprAst::Loop {
            ranges: vec![RangeAst { variable: "i".to_string(), start: lit(1), end: lit(10), location: loc() }],
            body: vec![],
            reductions: vec![ReductionAst { variable: "total".to_string(), op: ReductionOp::Sum, value: ident("i"), location: loc() }],
            location: loc(),
        }],
    );
    let module = build(&program);
    let cpp = emit_cpp(&module, &EmitOptions::default()).expect("emit");
    assert!(cpp.contains("for ("), "expected a for loop in: {cpp}");
    assert!(cpp.contains("+="), "expected an accumulating sum in: {cpp}");
}

#[test]
fn loop_body_definition_is_visible_to_the_reduction() {
    let program = single_function(
        "sum_doubled",
        vec![],
        vec![Type::integer()],
        vec![ExprAst::Loop {
            ranges: vec![RangeAst { variable: "i".to_string(), start: lit(1), end: lit(10), location: loc() }],
            body: vec![BindingAst {
                name: "doubled".to_string(),
                value: ExprAst::Binary { op: BinaryOp::Mul, left: Box::new(ident("i")), right: Box::new(lit(2)), location: loc() },
            }],
            reductions: vec![ReductionAst { variable: "total".to_string(), op: ReductionOp::Sum, value: ident("doubled"), location: loc() }],
            location: loc(),
        }],
    );
    let module = build(&program);
    let cpp = emit_cpp(&module, &EmitOptions::default()).expect("emit");
    assert!(cpp.contains("for ("), "expected a for loop in: {cpp}");
    assert!(cpp.contains('*'), "expected the body definition's multiplication in: {cpp}");
}

#[test]
fn if_expression_emits_a_shared_result_variable_assigned_per_branch() {
    use flowir_build::ast::BranchAst;
    let program = single_function(
        "choose",
        vec![],
        vec![Type::integer()],
        vec![ExprAst::If {
            branches: vec![
                BranchAst { condition: Some(ExprAst::Literal { value: LiteralValue::Boolean(true), location: loc() }), body: vec![lit(1)], location: loc() },
                BranchAst { condition: None, body: vec![lit(2)], location: loc() },
            ],
            location: loc(),
        }],
    );
    let module = build(&program);
    let cpp = emit_cpp(&module, &EmitOptions::default()).expect("emit");
    assert!(cpp.contains("if ("), "expected an if statement in: {cpp}");
    assert!(cpp.contains("else"), "expected an else branch in: {cpp}");
}

#[test]
fn let_binding_emits_an_inline_scoped_block() {
    let program = single_function(
        "halve",
        vec![],
        vec![Type::integer()],
        vec![ExprAst::Let {
            bindings: vec![BindingAst { name: "x".to_string(), value: lit(10) }],
            body: vec![ExprAst::Binary { op: BinaryOp::Div, left: Box::new(ident("x")), right: Box::new(lit(2)), location: loc() }],
            location: loc(),
        }],
    );
    let module = build(&program);
    let cpp = emit_cpp(&module, &EmitOptions::default()).expect("emit");
    assert!(cpp.contains("/"), "expected a division in: {cpp}");
}

#[test]
fn wire_json_round_trip_preserves_structure_and_is_idempotent() {
    let program = single_function(
        "g",
        vec![ParamAst { name: "a".to_string(), ty: Type::array(Type::integer(), 1) }],
        vec![Type::integer()],
        vec![ExprAst::ArrayAccess { array: Box::new(ident("a")), indices: vec![lit(2)], location: loc() }],
    );
    let module = build(&program);

    let first = module_to_json(&module);
    let decoded = module_from_json(&first).expect("decode should succeed");
    let second = module_to_json(&decoded);

    // Free ids may be renumbered on decode, but re-emitting the decoded
    // module reaches a fixed point: its own round trip is byte-identical.
    let third = module_to_json(&module_from_json(&second).expect("decode should succeed"));
    assert_eq!(second, third);

    assert_eq!(first["functions"][0]["name"], second["functions"][0]["name"]);
    assert_eq!(first["functions"][0]["params"], second["functions"][0]["params"]);
}

#[test]
fn graphml_export_contains_one_graph_per_function() {
    let program = Program {
        functions: vec![
            FunctionAst { name: "main".to_string(), params: vec![], returns: vec![], pragmas: Default::default(), body: vec![lit(1)], location: loc() },
            FunctionAst { name: "helper".to_string(), params: vec![], returns: vec![Type::integer()], pragmas: Default::default(), body: vec![lit(2)], location: loc() },
        ],
        definitions: vec![],
    };
    let module = build(&program);
    let xml = module_to_graphml(&module).expect("graphml export");
    assert_eq!(xml.matches("<graph ").count(), 2);
    assert!(xml.contains("graph id=\"main\""));
    assert!(xml.contains("graph id=\"helper\""));
}
