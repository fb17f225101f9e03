//! Errors surfaced by the builder pass.
//!
//! Wraps the two sources of failure while building: structural graph
//! mutation failures from `flowir-core` and the fatal half of the
//! diagnostics (`NarrowingWarning` never reaches here -- it goes through
//! [`crate::typecheck::Warnings`] instead).

use flowir_core::error::CoreError;
use thiserror::Error;

use crate::typecheck::Diagnostic;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Diagnostic(#[from] Diagnostic),
}
