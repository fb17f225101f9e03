//! Graph optimizer: a fixpoint over the per-function passes,
//! followed by the whole-program passes that need more than one function's
//! worth of context.
//!
//! Ordering within a fixpoint iteration mirrors stated
//! dependencies: constant folding before algebraic simplification (a fold
//! can expose an identity), conditional collapse before let inlining (a
//! collapsed branch's body is often a single let that can then inline), and
//! dead elimination last (every earlier pass leaves orphaned operands for
//! it to sweep). Function inlining is whole-program -- a call site's
//! single-use-ness is a property of the whole module, not one function --
//! so it runs once per outer iteration rather than inside the per-function
//! loop. Timeout lifting runs once, after the fixpoint settles, since it
//! changes which functions exist and would otherwise fight the inliner.

pub mod error;
pub mod support;
pub mod walk;

pub mod passes {
    pub mod algebraic_simplify;
    pub mod conditional_collapse;
    pub mod constant_fold;
    pub mod dead_elim;
    pub mod function_inline;
    pub mod let_inline;
    pub mod timeout_lift;
}

use flowir_core::id::NodeId;
use flowir_core::module::Module;

use error::OptError;

/// Safety valve against a pathological rewrite cycle; real programs settle
/// in single digits.
const MAX_ITERATIONS: usize = 64;

fn run_per_function_fixpoint(module: &mut Module, root: &NodeId) -> Result<bool, OptError> {
    let mut any_changed = false;
    for _ in 0..MAX_ITERATIONS {
        let mut changed = false;
        changed |= passes::constant_fold::run(module, root)?;
        changed |= passes::algebraic_simplify::run(module, root)?;
        changed |= passes::conditional_collapse::run(module, root)?;
        changed |= passes::let_inline::run(module, root)?;
        changed |= passes::dead_elim::run(module, root)?;
        if !changed {
            break;
        }
        any_changed = true;
        tracing::trace!(root = %root, "optimizer pass round made changes, re-running fixpoint");
    }
    Ok(any_changed)
}

/// Runs every optimizer pass to a fixpoint and returns whether the module
/// changed at all.
pub fn optimize(module: &mut Module) -> Result<bool, OptError> {
    let span = tracing::info_span!("optimize");
    let _enter = span.enter();

    let mut any_changed = false;
    for _ in 0..MAX_ITERATIONS {
        let mut changed = false;

        let roots: Vec<NodeId> = module.functions.values().map(|d| d.root.clone()).collect();
        for root in &roots {
            changed |= run_per_function_fixpoint(module, root)?;
        }

        changed |= passes::function_inline::run(module)?;

        if !changed {
            break;
        }
        any_changed = true;
        tracing::debug!("function inlining changed the call graph, re-running per-function fixpoint");
    }

    while passes::timeout_lift::run(module)? {
        any_changed = true;
        tracing::debug!("lifted a timed expression into its own function");
    }

    Ok(any_changed)
}
