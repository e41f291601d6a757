//! Point-in-time fleet capacity view.
//!
//! The loop copies node capacities once per tick and computes against the
//! copy. Allocations debit the copy via [`FleetView::commit`], so later
//! allocations in the same tick see earlier commitments without re-reading
//! the network.

use siphon_core::NodeCapacity;

/// A tick-local copy of the fleet's capacity.
#[derive(Debug, Clone)]
pub struct FleetView {
    nodes: Vec<NodeCapacity>,
    home_reserve: f64,
}

/// Free capacity after the home carve-out.
///
/// May be negative when a node's usage already exceeds its effective total;
/// callers treat anything non-positive as "no room".
fn effective_free(node: &NodeCapacity, home_reserve: f64) -> f64 {
    let effective_total = if node.home {
        (node.total - home_reserve).max(0.0)
    } else {
        node.total
    };
    effective_total - node.used
}

impl FleetView {
    pub fn new(nodes: Vec<NodeCapacity>, home_reserve: f64) -> Self {
        Self {
            nodes,
            home_reserve,
        }
    }

    pub fn nodes(&self) -> &[NodeCapacity] {
        &self.nodes
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Effective free capacity of one node, applying the home reserve rule.
    pub fn free_capacity(&self, node: &NodeCapacity) -> f64 {
        effective_free(node, self.home_reserve)
    }

    /// Order nodes descending by raw free capacity.
    ///
    /// The sort is stable: ties keep discovery order, which makes the
    /// allocator's visitation order deterministic for a fixed snapshot.
    pub fn sort_by_free_desc(&mut self) {
        self.nodes.sort_by(|a, b| {
            b.free()
                .partial_cmp(&a.free())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
    }

    /// Record `cost` capacity as consumed on `node_id`.
    ///
    /// Mirrors, locally, the usage the execution collaborator applies when
    /// a launch succeeds.
    pub fn commit(&mut self, node_id: &str, cost: f64) {
        if let Some(node) = self.nodes.iter_mut().find(|n| n.id == node_id) {
            node.used += cost;
        }
    }

    pub fn total_capacity(&self) -> f64 {
        self.nodes.iter().map(|n| n.total).sum()
    }

    pub fn total_used(&self) -> f64 {
        self.nodes.iter().map(|n| n.used).sum()
    }

    /// Capacity held back on the home node this tick.
    ///
    /// The reserve only counts up to what is actually still free there.
    pub fn reserved_headroom(&self) -> f64 {
        self.nodes
            .iter()
            .filter(|n| n.home)
            .map(|n| self.home_reserve.min((n.total - n.used).max(0.0)))
            .sum()
    }

    /// Fleet-wide capacity left over after usage and the home reserve.
    pub fn idle_capacity(&self) -> f64 {
        self.total_capacity() - (self.total_used() + self.reserved_headroom())
    }
}
