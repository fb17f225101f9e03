//! `flowir` compiler driver ("CLI surface").
//!
//! The driver is the only layer in the workspace that touches the
//! filesystem or standard streams: it reads an already-parsed AST (JSON,
//! since lexing/parsing the source language is out of scope), runs the
//! `flowir-build` -> (optional `flowir-opt`) -> `flowir-emit` pipeline, and
//! writes the requested artefact to stdout.

use std::io::Read;
use std::path::PathBuf;
use std::process;

use clap::Parser;
use serde_json::json;

use flowir_build::ast::Program;
use flowir_build::error::BuildError;
use flowir_build::Builder;
use flowir_core::module::Module;
use flowir_emit::{cpp_json_envelope, emit_cpp, module_to_graphml, module_to_json, EmitOptions};
use flowir_opt::error::OptError;

/// The `flowir` compiler: lowers a parsed AST to C++ (or dumps the IR).
#[derive(Parser)]
#[command(name = "flowir", about = "flowir compiler driver")]
struct Cli {
    /// Read the input AST from this file. Without `-i`, read from stdin.
    #[arg(short = 'i', long = "input")]
    input: Option<PathBuf>,

    /// Emit the IR as JSON instead of target source.
    #[arg(long)]
    json: bool,

    /// Emit the IR as GraphML instead of target source.
    #[arg(long)]
    graphml: bool,

    /// Run the optimizer on the IR before emitting.
    #[arg(long)]
    opt: bool,

    /// Wrap emitted C++ source in a `{errors, cpp_src}` JSON envelope.
    #[arg(long)]
    cppjson: bool,

    /// Propagate internal errors verbatim instead of converting them to a
    /// structured error document.
    #[arg(long)]
    debug: bool,

    /// Suppress the runtime error-wrapping in the emitted C++ code.
    #[arg(long)]
    noerror: bool,
}

fn main() {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();
    process::exit(run(cli));
}

fn run(cli: Cli) -> i32 {
    let source = match read_source(cli.input.as_deref()) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: failed to read input: {e}");
            return 3;
        }
    };

    let program: Program = match serde_json::from_str(&source) {
        Ok(p) => p,
        Err(e) => return fail(cli.debug, &format!("malformed input AST: {e}"), ""),
    };

    let mut module = Module::new();
    if let Err(err) = Builder::new(&mut module).build_program(&program) {
        return fail_build(cli.debug, &err);
    }

    if cli.opt {
        if let Err(err) = flowir_opt::optimize(&mut module) {
            return fail_opt(cli.debug, &err);
        }
    }

    if cli.json {
        println!("{}", module_to_json(&module));
        return 0;
    }

    if cli.graphml {
        match module_to_graphml(&module) {
            Ok(xml) => {
                println!("{xml}");
                0
            }
            Err(e) => fail(cli.debug, &e.to_string(), ""),
        }
    } else {
        let options = EmitOptions { noerror: cli.noerror };
        let cpp = emit_cpp(&module, &options);
        if cli.cppjson {
            let had_error = cpp.is_err();
            println!("{}", cpp_json_envelope(cpp));
            if had_error { 1 } else { 0 }
        } else {
            match cpp {
                Ok(src) => {
                    println!("{src}");
                    0
                }
                Err(e) => fail(cli.debug, &e.to_string(), ""),
            }
        }
    }
}

fn read_source(path: Option<&std::path::Path>) -> std::io::Result<String> {
    match path {
        Some(p) => std::fs::read_to_string(p),
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            Ok(buf)
        }
    }
}

/// Converts a fatal build diagnostic into a structured `{message, location}`
/// error record, or re-panics with the full error chain under
/// `--debug`.
fn fail_build(debug: bool, err: &BuildError) -> i32 {
    match err {
        BuildError::Diagnostic(diag) => fail(debug, &diag.to_string(), diag.location()),
        BuildError::Core(core) => fail(debug, &core.to_string(), ""),
    }
}

fn fail_opt(debug: bool, err: &OptError) -> i32 {
    let OptError::Core(core) = err;
    fail(debug, &core.to_string(), "")
}

fn fail(debug: bool, message: &str, location: &str) -> i32 {
    if debug {
        panic!("{message} (at {location})");
    }
    println!("{}", json!({ "errors": [{ "message": message, "location": location }] }));
    1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_the_documented_flags() {
        let cli = Cli::parse_from(["flowir", "-i", "prog.json", "--json", "--opt", "--noerror"]);
        assert_eq!(cli.input, Some(PathBuf::from("prog.json")));
        assert!(cli.json);
        assert!(cli.opt);
        assert!(cli.noerror);
        assert!(!cli.graphml);
        assert!(!cli.cppjson);
        assert!(!cli.debug);
    }

    #[test]
    fn bad_json_input_reports_a_structured_error_without_debug() {
        let source = "{not json";
        let result: Result<Program, _> = serde_json::from_str(source);
        assert!(result.is_err());
        let code = fail(false, "malformed input AST", "");
        assert_eq!(code, 1);
    }
}
