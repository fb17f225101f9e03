//! Target-text emission for `flowir` modules.
//!
//! This crate is the last of the pipeline's stages: given a [`Module`]
//! (built by `flowir-build`, optionally rewritten by `flowir-opt`), it
//! produces either C++ source text, a JSON wire-format dump of the IR
//! itself, or a GraphML export of the graph structure. It does not invoke a
//! C++ toolchain or otherwise touch the filesystem -- that belongs to the
//! `flowir-cli` driver.
//!
//! # Modules
//!
//! - [`emitter`] -- walks a module's functions and produces C++ source text
//! - [`wire`] -- `Module <-> JSON` for the `--json` CLI flag and round-tripping IR
//! - [`graphml`] -- structural GraphML export for the `--graphml` CLI flag
//! - [`ctypes`] -- dataflow type to C++ type mapping, record struct synthesis
//! - [`block`] -- the mutable statement buffer the emitter appends to
//! - [`error`] -- error types for all emission failure modes

pub mod block;
pub mod ctypes;
pub mod emitter;
pub mod error;
pub mod graphml;
pub mod wire;

pub use emitter::{EmitOptions, Emitter};
pub use error::EmitError;
pub use graphml::module_to_graphml;
pub use wire::{module_from_json, module_to_json};

use flowir_core::module::Module;

/// Emits `module` as C++ source text under the given options. Thin
/// convenience wrapper over [`Emitter::new`]/[`Emitter::emit_module`] for
/// callers that don't need to hold onto the emitter itself.
pub fn emit_cpp(module: &Module, options: &EmitOptions) -> Result<String, EmitError> {
    Emitter::new(module, options).emit_module()
}

/// Wraps emitted C++ source in the `--cppjson` envelope:
/// `{errors: [...], cpp_src: [...]}`. `cpp_src` is a single-element array
/// since this compiler only ever emits one translation unit per
/// invocation.
pub fn cpp_json_envelope(cpp_src: Result<String, EmitError>) -> serde_json::Value {
    match cpp_src {
        Ok(src) => serde_json::json!({ "errors": [], "cpp_src": [src] }),
        Err(err) => serde_json::json!({ "errors": [err.to_string()], "cpp_src": [] }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowir_build::ast::{ExprAst, FunctionAst, Program};
    use flowir_build::Builder;
    use flowir_core::node::LiteralValue;

    fn build_main_returning_one() -> Module {
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
        let mut module = Module::new();
        Builder::new(&mut module).build_program(&program).expect("build");
        module
    }

    #[test]
    fn emit_cpp_produces_a_main_entry_point() {
        let module = build_main_returning_one();
        let cpp = emit_cpp(&module, &EmitOptions::default()).expect("emit");
        assert!(cpp.contains("int main("));
    }

    #[test]
    fn cpp_json_envelope_wraps_success_with_no_errors() {
        let module = build_main_returning_one();
        let cpp = emit_cpp(&module, &EmitOptions::default());
        let env = cpp_json_envelope(cpp);
        assert_eq!(env["errors"].as_array().unwrap().len(), 0);
        assert_eq!(env["cpp_src"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn wire_round_trip_preserves_function_names() {
        let module = build_main_returning_one();
        let json = module_to_json(&module);
        let back = module_from_json(&json).expect("decode");
        assert_eq!(back.functions.keys().map(|k| k.as_str()).collect::<Vec<_>>(), module.functions.keys().map(|k| k.as_str()).collect::<Vec<_>>());
    }

    #[test]
    fn graphml_export_succeeds_for_a_built_module() {
        let module = build_main_returning_one();
        let xml = module_to_graphml(&module).expect("graphml");
        assert!(xml.contains("<graphml>"));
    }
}
