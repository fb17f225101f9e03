//! The module: single owner of the graph.
//!
//! Every node, port, edge, function and top-level definition lives in
//! exactly one `Module`. All graph mutation goes through its methods so
//! invariants (one incoming edge per input port, cascading delete,
//! id-reuse) are enforced in a single place instead of scattered across
//! every caller that touches the graph.

use std::collections::{HashMap, VecDeque};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::edge::{Edge, EdgeId};
use crate::error::CoreError;
use crate::function::FunctionDef;
use crate::id::{FunctionId, NodeId, PortId};
use crate::node::{Node, NodeKind, SubregionSlot};
use crate::port::{Direction, Port};
use crate::types::{Assignability, ScalarKind, Type, TypeKind};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Module {
    nodes: IndexMap<NodeId, Node>,
    ports: IndexMap<PortId, Port>,
    edges: IndexMap<EdgeId, Edge>,
    /// Ports feeding zero or more outgoing edges (an output port may fan out).
    edges_from: HashMap<PortId, Vec<EdgeId>>,
    /// The single edge feeding an input port, if any.
    edge_to: HashMap<PortId, EdgeId>,
    pub functions: IndexMap<FunctionId, FunctionDef>,
    pub definitions: IndexMap<String, Type>,
    deleted_node_ids: VecDeque<NodeId>,
    deleted_port_ids: VecDeque<PortId>,
    deleted_edge_ids: VecDeque<EdgeId>,
    node_counter: u64,
    port_counter: u64,
    edge_counter: u64,
}

impl Default for Module {
    fn default() -> Self {
        Self::new()
    }
}

impl Module {
    pub fn new() -> Self {
        Module {
            nodes: IndexMap::new(),
            ports: IndexMap::new(),
            edges: IndexMap::new(),
            edges_from: HashMap::new(),
            edge_to: HashMap::new(),
            functions: IndexMap::new(),
            definitions: IndexMap::new(),
            deleted_node_ids: VecDeque::new(),
            deleted_port_ids: VecDeque::new(),
            deleted_edge_ids: VecDeque::new(),
            node_counter: 0,
            port_counter: 0,
            edge_counter: 0,
        }
    }

    // -- id allocation -----------------------------------------------------

    /// Allocate a node id, reusing the oldest retired id (FIFO) before
    /// minting a fresh one.
    pub fn next_node_id(&mut self) -> NodeId {
        if let Some(id) = self.deleted_node_ids.pop_front() {
            return id;
        }
        let id = NodeId::new(format!("node{}", self.node_counter));
        self.node_counter += 1;
        id
    }

    pub fn next_port_id(&mut self) -> PortId {
        if let Some(id) = self.deleted_port_ids.pop_front() {
            return id;
        }
        let id = PortId::new(format!("port{}", self.port_counter));
        self.port_counter += 1;
        id
    }

    pub fn next_edge_id(&mut self) -> EdgeId {
        if let Some(id) = self.deleted_edge_ids.pop_front() {
            return id;
        }
        let id = EdgeId::new(format!("edge{}", self.edge_counter));
        self.edge_counter += 1;
        id
    }

    // -- node access ---------------------------------------------------------

    pub fn add_node(&mut self, node: Node) -> NodeId {
        let id = node.id.clone();
        self.nodes.insert(id.clone(), node);
        id
    }

    pub fn get_node(&self, id: &NodeId) -> Result<&Node, CoreError> {
        self.nodes.get(id).ok_or_else(|| CoreError::NodeNotFound(id.clone()))
    }

    pub fn get_node_mut(&mut self, id: &NodeId) -> Result<&mut Node, CoreError> {
        self.nodes.get_mut(id).ok_or_else(|| CoreError::NodeNotFound(id.clone()))
    }

    pub fn nodes_of_kind<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Node> + 'a {
        self.nodes.values().filter(move |n| n.kind.name() == name)
    }

    pub fn get_port(&self, id: &PortId) -> Result<&Port, CoreError> {
        self.ports.get(id).ok_or_else(|| CoreError::PortNotFound(id.clone()))
    }

    pub fn get_port_mut(&mut self, id: &PortId) -> Result<&mut Port, CoreError> {
        self.ports.get_mut(id).ok_or_else(|| CoreError::PortNotFound(id.clone()))
    }

    pub fn get_edge(&self, id: &EdgeId) -> Option<&Edge> {
        self.edges.get(id)
    }

    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.values()
    }

    /// The single edge feeding `port`, if any -- `None` for an unconnected
    /// input or for any output port (outputs never receive edges).
    pub fn incoming_edge(&self, port: &PortId) -> Option<&Edge> {
        self.edge_to.get(port).and_then(|id| self.edges.get(id))
    }

    /// Every edge sourced from `port` (an output port may fan out to more
    /// than one consumer).
    pub fn outgoing_edges(&self, port: &PortId) -> Vec<&Edge> {
        self.edges_from.get(port).into_iter().flatten().filter_map(|id| self.edges.get(id)).collect()
    }

    // -- port/edge creation --------------------------------------------------

    /// Create a port on `node`, append it to the node's in/out port list,
    /// and register it in the module (`create_port`).
    pub fn create_port(
        &mut self,
        node: NodeId,
        label: impl Into<String>,
        ty: Type,
        direction: Direction,
    ) -> Result<PortId, CoreError> {
        let id = self.next_port_id();
        let index = {
            let n = self.get_node(&node)?;
            match direction {
                Direction::In => n.in_ports.len() as u32,
                Direction::Out => n.out_ports.len() as u32,
            }
        };
        let port = Port::new(id.clone(), node.clone(), index, label, ty, direction);
        self.ports.insert(id.clone(), port);
        let n = self.get_node_mut(&node)?;
        match direction {
            Direction::In => n.in_ports.push(id.clone()),
            Direction::Out => n.out_ports.push(id.clone()),
        }
        Ok(id)
    }

    /// Declare a `Function`'s parameter port: it lives in
    /// `node.in_ports` for signature bookkeeping (arity checks, the
    /// optimizer's function-inline pass), but carries `Direction::Out`
    /// because a parameter's value is a *source* for statements inside the
    /// function body -- it never receives an edge, since every call site
    /// would otherwise need to feed the same shared port.
    pub fn create_param_port(&mut self, node: NodeId, label: impl Into<String>, ty: Type) -> Result<PortId, CoreError> {
        let id = self.next_port_id();
        let index = self.get_node(&node)?.in_ports.len() as u32;
        let port = Port::new(id.clone(), node.clone(), index, label, ty, Direction::Out);
        self.ports.insert(id.clone(), port);
        self.get_node_mut(&node)?.in_ports.push(id.clone());
        Ok(id)
    }

    /// Connect `from` (an output port) to `to` (an input port). Fails if
    /// `to` already has an incoming edge (one-incoming-per-input
    /// invariant), the directions don't match, or the port types are
    /// fatally incompatible. Every edge-creation path (the builder, the
    /// wire decoder) funnels through this one method, so type reconciliation
    /// happens exactly once: if `to` is `any`, it acquires `from`'s type.
    pub fn create_edge(&mut self, from: PortId, to: PortId) -> Result<EdgeId, CoreError> {
        {
            let from_port = self.get_port(&from)?;
            let to_port = self.get_port(&to)?;
            if from_port.direction != Direction::Out || to_port.direction != Direction::In {
                return Err(CoreError::DirectionMismatch { from, to });
            }
        }
        if self.edge_to.contains_key(&to) {
            return Err(CoreError::PortAlreadyConnected(to));
        }
        self.reconcile_edge_types(&from, &to)?;
        let id = self.next_edge_id();
        let edge = Edge::new(id.clone(), from.clone(), to.clone());
        self.edges.insert(id.clone(), edge);
        self.edges_from.entry(from).or_default().push(id.clone());
        self.edge_to.insert(to, id.clone());
        Ok(id)
    }

    /// If `to`'s type is `any`, it acquires `from`'s type; otherwise the two
    /// types must be assignable (identical, or a numeric integer/real
    /// crossing) or edge creation fails fatally. Narrowing (real -> integer)
    /// is allowed here -- callers that need to surface the non-fatal warning
    /// check `needs_narrowing_warning` themselves before calling
    /// `create_edge`.
    fn reconcile_edge_types(&mut self, from: &PortId, to: &PortId) -> Result<(), CoreError> {
        let from_ty = self.get_port(from)?.ty.clone();
        let to_ty = self.get_port(to)?.ty.clone();
        if matches!(to_ty.kind, TypeKind::Scalar(ScalarKind::Any)) {
            self.get_port_mut(to)?.ty = from_ty;
            return Ok(());
        }
        if matches!(to_ty.assignable_from(&from_ty), Assignability::Fatal) {
            return Err(CoreError::EdgeTypeMismatch {
                from: from.clone(),
                to: to.clone(),
                from_ty: from_ty.resolved_kind_name().to_string(),
                to_ty: to_ty.resolved_kind_name().to_string(),
            });
        }
        Ok(())
    }

    /// Move an edge's source to a different output port, leaving its target
    /// untouched (`reattach_origin`).
    pub fn reattach_origin(&mut self, edge_id: &EdgeId, new_from: PortId) -> Result<(), CoreError> {
        let old_from = {
            let edge = self.edges.get(edge_id).ok_or_else(|| CoreError::GraphInconsistency {
                reason: format!("edge {edge_id} not found"),
            })?;
            edge.from.clone()
        };
        if let Some(list) = self.edges_from.get_mut(&old_from) {
            list.retain(|e| e != edge_id);
        }
        self.edges_from.entry(new_from.clone()).or_default().push(edge_id.clone());
        self.edges.get_mut(edge_id).unwrap().from = new_from;
        Ok(())
    }

    /// Move an edge's target to a different input port, leaving its source
    /// untouched (`reattach_target`). Fails if the new target
    /// already has an incoming edge.
    pub fn reattach_target(&mut self, edge_id: &EdgeId, new_to: PortId) -> Result<(), CoreError> {
        if self.edge_to.get(&new_to).is_some_and(|e| e != edge_id) {
            return Err(CoreError::PortAlreadyConnected(new_to));
        }
        let old_to = {
            let edge = self.edges.get(edge_id).ok_or_else(|| CoreError::GraphInconsistency {
                reason: format!("edge {edge_id} not found"),
            })?;
            edge.to.clone()
        };
        self.edge_to.remove(&old_to);
        self.edge_to.insert(new_to.clone(), edge_id.clone());
        self.edges.get_mut(edge_id).unwrap().to = new_to;
        Ok(())
    }

    pub fn delete_edge(&mut self, edge_id: &EdgeId) -> Result<(), CoreError> {
        let edge = self
            .edges
            .shift_remove(edge_id)
            .ok_or_else(|| CoreError::GraphInconsistency { reason: format!("edge {edge_id} not found") })?;
        if let Some(list) = self.edges_from.get_mut(&edge.from) {
            list.retain(|e| e != edge_id);
        }
        self.edge_to.remove(&edge.to);
        self.deleted_edge_ids.push_back(edge_id.clone());
        Ok(())
    }

    fn delete_edges_attached_to_node(&mut self, node_id: &NodeId) -> Result<(), CoreError> {
        let (in_ports, out_ports) = {
            let node = self.get_node(node_id)?;
            (node.in_ports.clone(), node.out_ports.clone())
        };
        for p in &in_ports {
            if let Some(edge_id) = self.edge_to.get(p).cloned() {
                self.delete_edge(&edge_id)?;
            }
        }
        for p in &out_ports {
            let ids: Vec<EdgeId> = self.edges_from.get(p).cloned().unwrap_or_default();
            for edge_id in ids {
                self.delete_edge(&edge_id)?;
            }
        }
        Ok(())
    }

    /// Delete a node, cascading into everything it contains: direct child
    /// `nodes`, named `subregions`, and `If` `branches`.
    pub fn delete_node(&mut self, node_id: &NodeId, delete_attached_edges: bool) -> Result<(), CoreError> {
        let (children, subregions, branches) = {
            let node = self.get_node(node_id)?;
            (node.nodes.clone(), node.subregions.values().cloned().collect::<Vec<_>>(), node.branches.clone())
        };
        for child in &children {
            self.delete_node(child, true)?;
        }
        for region in &subregions {
            self.delete_node(region, true)?;
        }
        for branch in &branches {
            self.delete_node(branch, true)?;
        }
        if delete_attached_edges {
            self.delete_edges_attached_to_node(node_id)?;
        }
        if let Some(node) = self.nodes.shift_remove(node_id) {
            for p in node.in_ports.iter().chain(node.out_ports.iter()) {
                self.ports.shift_remove(p);
                self.deleted_port_ids.push_back(p.clone());
            }
        }
        self.deleted_node_ids.push_back(node_id.clone());
        Ok(())
    }

    /// Verify two nodes have matching in/out port arity and port kinds,
    /// required before [`Module::swap_complex`]. Names the offending side
    /// and port index in its error.
    pub fn check_ports_compatibility(&self, src: &NodeId, dst: &NodeId) -> Result<(), CoreError> {
        let s = self.get_node(src)?;
        let d = self.get_node(dst)?;
        if s.in_ports.len() != d.in_ports.len() {
            return Err(CoreError::PortConfigurationMismatch {
                reason: "input port count mismatch".to_string(),
                src: src.clone(),
                dst: dst.clone(),
            });
        }
        if s.out_ports.len() != d.out_ports.len() {
            return Err(CoreError::PortConfigurationMismatch {
                reason: "output port count mismatch".to_string(),
                src: src.clone(),
                dst: dst.clone(),
            });
        }
        for (sp, dp) in s.in_ports.iter().zip(d.in_ports.iter()) {
            let (sp, dp) = (self.get_port(sp)?, self.get_port(dp)?);
            if sp.ty.resolved_kind_name() != dp.ty.resolved_kind_name() {
                return Err(CoreError::PortConfigurationMismatch {
                    reason: format!("input port type mismatch at index {}", sp.index),
                    src: src.clone(),
                    dst: dst.clone(),
                });
            }
        }
        for (sp, dp) in s.out_ports.iter().zip(d.out_ports.iter()) {
            let (sp, dp) = (self.get_port(sp)?, self.get_port(dp)?);
            if sp.ty.resolved_kind_name() != dp.ty.resolved_kind_name() {
                return Err(CoreError::PortConfigurationMismatch {
                    reason: format!("output port type mismatch at index {}", sp.index),
                    src: src.clone(),
                    dst: dst.clone(),
                });
            }
        }
        Ok(())
    }

    /// Replace `target` with `replacement`: every edge feeding one of
    /// `target`'s input ports is rewired onto the matching input port of
    /// `replacement`, every edge consuming one of `target`'s output ports
    /// is rewired onto the matching output port of `replacement`, and
    /// `target` (along with `replacement`'s now-stale placeholder wiring)
    /// is deleted. Used by the optimizer's conditional-collapse and
    /// let-inline passes.
    pub fn swap_complex(&mut self, replacement: &NodeId, target: &NodeId) -> Result<(), CoreError> {
        self.check_ports_compatibility(replacement, target)?;

        let (target_ins, replacement_ins) = {
            let t = self.get_node(target)?;
            let r = self.get_node(replacement)?;
            (t.in_ports.clone(), r.in_ports.clone())
        };
        for (t_in, r_in) in target_ins.iter().zip(replacement_ins.iter()) {
            if let Some(stale) = self.edge_to.get(r_in).cloned() {
                self.delete_edge(&stale)?;
            }
            if let Some(incoming) = self.edge_to.get(t_in).cloned() {
                self.reattach_target(&incoming, r_in.clone())?;
            }
        }

        let (target_outs, replacement_outs) = {
            let t = self.get_node(target)?;
            let r = self.get_node(replacement)?;
            (t.out_ports.clone(), r.out_ports.clone())
        };
        for (t_out, r_out) in target_outs.iter().zip(replacement_outs.iter()) {
            let consumers: Vec<EdgeId> = self.edges_from.get(t_out).cloned().unwrap_or_default();
            for edge_id in consumers {
                self.reattach_origin(&edge_id, r_out.clone())?;
            }
        }

        let parent = self.get_node(target)?.parent.clone();
        if let Some(parent_id) = &parent {
            let parent_node = self.get_node_mut(parent_id)?;
            if let Some(pos) = parent_node.nodes.iter().position(|n| n == target) {
                parent_node.nodes[pos] = replacement.clone();
            }
        }
        if let Ok(r) = self.get_node_mut(replacement) {
            r.parent = parent;
        }

        self.delete_node(target, false)
    }

    // -- JSON persistence ------------------------------------------------

    pub fn definitions_sorted(&self) -> impl Iterator<Item = (&String, &Type)> {
        self.definitions.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{LiteralValue, Node, NodeKind};

    fn literal_node(module: &mut Module, value: i64) -> NodeId {
        let id = module.next_node_id();
        let node = Node::new(id.clone(), NodeKind::Literal { value: LiteralValue::Integer(value) });
        module.add_node(node);
        module.create_port(id.clone(), "value", Type::integer(), Direction::Out).unwrap();
        id
    }

    #[test]
    fn node_ids_reuse_in_fifo_order() {
        let mut m = Module::new();
        let a = m.next_node_id();
        let b = m.next_node_id();
        m.add_node(Node::new(a.clone(), NodeKind::Body));
        m.add_node(Node::new(b.clone(), NodeKind::Body));
        m.delete_node(&a, false).unwrap();
        m.delete_node(&b, false).unwrap();
        // a was deleted first, so it's reused first.
        assert_eq!(m.next_node_id(), a);
        assert_eq!(m.next_node_id(), b);
    }

    #[test]
    fn create_edge_rejects_second_incoming_edge() {
        let mut m = Module::new();
        let lit1 = literal_node(&mut m, 1);
        let lit2 = literal_node(&mut m, 2);
        let consumer_id = m.next_node_id();
        let mut consumer = Node::new(consumer_id.clone(), NodeKind::Unary { op: crate::ops::UnaryOp::Neg });
        consumer.id = consumer_id.clone();
        m.add_node(consumer);
        let in_port = m.create_port(consumer_id.clone(), "input", Type::integer(), Direction::In).unwrap();

        let out1 = m.get_node(&lit1).unwrap().out_ports[0].clone();
        let out2 = m.get_node(&lit2).unwrap().out_ports[0].clone();

        m.create_edge(out1, in_port.clone()).unwrap();
        let result = m.create_edge(out2, in_port);
        assert!(matches!(result, Err(CoreError::PortAlreadyConnected(_))));
    }

    #[test]
    fn delete_node_cascades_into_children() {
        let mut m = Module::new();
        let body_id = m.next_node_id();
        let body = Node::new(body_id.clone(), NodeKind::Body);
        m.add_node(body);
        let child = literal_node(&mut m, 42);
        m.get_node_mut(&body_id).unwrap().nodes.push(child.clone());

        m.delete_node(&body_id, true).unwrap();
        assert!(m.get_node(&child).is_err());
        assert!(m.get_node(&body_id).is_err());
    }

    #[test]
    fn reattach_target_rejects_occupied_port() {
        let mut m = Module::new();
        let lit1 = literal_node(&mut m, 1);
        let lit2 = literal_node(&mut m, 2);
        let consumer_id = m.next_node_id();
        m.add_node(Node::new(consumer_id.clone(), NodeKind::Unary { op: crate::ops::UnaryOp::Neg }));
        let in1 = m.create_port(consumer_id.clone(), "a", Type::integer(), Direction::In).unwrap();
        let in2 = m.create_port(consumer_id.clone(), "b", Type::integer(), Direction::In).unwrap();

        let out1 = m.get_node(&lit1).unwrap().out_ports[0].clone();
        let out2 = m.get_node(&lit2).unwrap().out_ports[0].clone();
        let e1 = m.create_edge(out1, in1).unwrap();
        m.create_edge(out2, in2.clone()).unwrap();

        assert!(matches!(m.reattach_target(&e1, in2), Err(CoreError::PortAlreadyConnected(_))));
    }

    #[test]
    fn create_edge_into_an_any_port_makes_it_acquire_the_source_type() {
        let mut m = Module::new();
        let lit1 = literal_node(&mut m, 1);
        let out1 = m.get_node(&lit1).unwrap().out_ports[0].clone();

        let consumer_id = m.next_node_id();
        m.add_node(Node::new(consumer_id.clone(), NodeKind::Unary { op: crate::ops::UnaryOp::Neg }));
        let in_port = m.create_port(consumer_id.clone(), "input", Type::any(), Direction::In).unwrap();

        m.create_edge(out1, in_port.clone()).unwrap();
        assert!(m.get_port(&in_port).unwrap().ty.equal(&Type::integer()));
    }

    #[test]
    fn create_edge_between_incompatible_concrete_types_is_fatal() {
        let mut m = Module::new();
        let lit1 = literal_node(&mut m, 1);
        let out1 = m.get_node(&lit1).unwrap().out_ports[0].clone();

        let consumer_id = m.next_node_id();
        m.add_node(Node::new(consumer_id.clone(), NodeKind::Unary { op: crate::ops::UnaryOp::Not }));
        let in_port = m.create_port(consumer_id.clone(), "input", Type::boolean(), Direction::In).unwrap();

        let result = m.create_edge(out1, in_port);
        assert!(matches!(result, Err(CoreError::EdgeTypeMismatch { .. })));
    }
}
