//! Containment traversal shared by every pass.
//!
//! : "the optimizer runs on each function, breadth-first over
//! containment." A node's children live across three places (`nodes`,
//! `subregions`, `branches`); this walks all three uniformly.

use std::collections::VecDeque;

use flowir_core::id::NodeId;
use flowir_core::module::Module;

/// Every node reachable from `root` by containment, in breadth-first order
/// (`root` itself is not included).
pub fn descendants(module: &Module, root: &NodeId) -> Vec<NodeId> {
    let mut queue = VecDeque::new();
    queue.push_back(root.clone());
    let mut out = Vec::new();
    while let Some(id) = queue.pop_front() {
        let node = match module.get_node(&id) {
            Ok(n) => n,
            Err(_) => continue,
        };
        for child in &node.nodes {
            out.push(child.clone());
            queue.push_back(child.clone());
        }
        for region in node.subregions.values() {
            out.push(region.clone());
            queue.push_back(region.clone());
        }
        for branch in &node.branches {
            out.push(branch.clone());
            queue.push_back(branch.clone());
        }
    }
    out
}
