//! Errors surfaced while emitting a module to target text, IR JSON or
//! GraphML.

use flowir_core::error::CoreError;

#[derive(Debug, thiserror::Error)]
pub enum EmitError {
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A node kind reached the emitter with a shape it cannot handle, e.g.
    /// an `Identifier` that survived past the builder pass.
    #[error("emitter cannot handle node {node} of kind {kind}")]
    UnsupportedNode { node: String, kind: &'static str },

    /// The module has no `main` function to use as the envelope entry point.
    #[error("no main function found")]
    NoMainFunction,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),
}
