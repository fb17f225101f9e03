//! Lexical scope chain used by the builder pass.
//!
//! A `Scope` maps a variable name to the port currently carrying its
//! value. Scopes nest -- a `Let`'s body scope chains to its `Init` scope,
//! which chains to the enclosing function's parameter scope -- and
//! resolution walks from innermost to outermost, returning the first hit
//! (standard lexical shadowing), except forbids a `Let`'s own
//! bindings from shadowing a name already visible in its enclosing scope;
//! that check happens in the builder, not here.

use std::collections::HashMap;

use flowir_core::id::PortId;

#[derive(Debug, Default)]
pub struct Scope<'a> {
    parent: Option<&'a Scope<'a>>,
    bindings: HashMap<String, PortId>,
}

impl<'a> Scope<'a> {
    pub fn root() -> Self {
        Scope { parent: None, bindings: HashMap::new() }
    }

    pub fn child(parent: &'a Scope<'a>) -> Self {
        Scope { parent: Some(parent), bindings: HashMap::new() }
    }

    pub fn bind(&mut self, name: impl Into<String>, port: PortId) {
        self.bindings.insert(name.into(), port);
    }

    /// Resolve `name`, walking outward through enclosing scopes.
    pub fn resolve(&self, name: &str) -> Option<PortId> {
        self.bindings.get(name).cloned().or_else(|| self.parent.and_then(|p| p.resolve(name)))
    }

    /// Is `name` already visible in this scope chain? Used by `Let`'s
    /// no-shadow check.
    pub fn is_visible(&self, name: &str) -> bool {
        self.resolve(name).is_some()
    }

    /// All `(name, port)` pairs visible from this scope, innermost wins on
    /// collision -- used by `copy_ports_from_scope` when a subregion needs
    /// to forward the enclosing scope's live bindings as extra input ports.
    pub fn visible_bindings(&self) -> HashMap<String, PortId> {
        let mut out = self.parent.map(|p| p.visible_bindings()).unwrap_or_default();
        for (k, v) in &self.bindings {
            out.insert(k.clone(), v.clone());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_from_innermost_scope_first() {
        let mut root = Scope::root();
        root.bind("x", PortId::new("port0"));
        let mut child = Scope::child(&root);
        child.bind("x", PortId::new("port1"));
        assert_eq!(child.resolve("x"), Some(PortId::new("port1")));
        assert_eq!(root.resolve("x"), Some(PortId::new("port0")));
    }

    #[test]
    fn falls_through_to_parent_when_not_locally_bound() {
        let mut root = Scope::root();
        root.bind("y", PortId::new("port2"));
        let child = Scope::child(&root);
        assert_eq!(child.resolve("y"), Some(PortId::new("port2")));
    }

    #[test]
    fn unresolved_name_returns_none() {
        let root = Scope::root();
        assert_eq!(root.resolve("missing"), None);
    }

    #[test]
    fn visible_bindings_merges_chain_with_innermost_precedence() {
        let mut root = Scope::root();
        root.bind("a", PortId::new("port0"));
        root.bind("b", PortId::new("port1"));
        let mut child = Scope::child(&root);
        child.bind("b", PortId::new("port2"));
        let merged = child.visible_bindings();
        assert_eq!(merged.get("a"), Some(&PortId::new("port0")));
        assert_eq!(merged.get("b"), Some(&PortId::new("port2")));
    }
}
