//! Errors surfaced by optimizer passes. All of them are graph-structure
//! failures -- by the time a `Module` reaches the optimizer it has already
//! passed the builder's type checks, so there is no diagnostic-level
//! failure mode here, only [`flowir_core::error::CoreError`].

use flowir_core::error::CoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OptError {
    #[error(transparent)]
    Core(#[from] CoreError),
}
