//! Shared types used across siphon crates.

use serde::{Deserialize, Serialize};

use crate::config::JobCosts;

/// The kind of work a unit performs against a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobKind {
    /// Lower a target's degradation level toward its floor.
    Degrade,
    /// Raise a target's resource level toward its ceiling.
    Grow,
    /// Extract resources from a target at steady state.
    Harvest,
}

impl JobKind {
    /// The worker program that implements this kind on a node.
    pub fn program(&self) -> &'static str {
        match self {
            JobKind::Degrade => "siphon-degrade",
            JobKind::Grow => "siphon-grow",
            JobKind::Harvest => "siphon-harvest",
        }
    }

    /// Map a running program name back to its job kind.
    ///
    /// Returns `None` for programs that are not siphon workers, which is
    /// how the network snapshot filters out unrelated processes.
    pub fn from_program(program: &str) -> Option<JobKind> {
        match program {
            "siphon-degrade" => Some(JobKind::Degrade),
            "siphon-grow" => Some(JobKind::Grow),
            "siphon-harvest" => Some(JobKind::Harvest),
            _ => None,
        }
    }

    /// Capacity cost of running one unit of this kind.
    pub fn unit_cost(&self, costs: &JobCosts) -> f64 {
        match self {
            JobKind::Degrade => costs.degrade,
            JobKind::Grow => costs.grow,
            JobKind::Harvest => costs.harvest,
        }
    }
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.program())
    }
}

/// A request to run `units` workers of `kind` against `target`.
///
/// Created and consumed within a single tick, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkRequest {
    pub kind: JobKind,
    pub target: String,
    pub units: u32,
}

impl WorkRequest {
    pub fn new(kind: JobKind, target: impl Into<String>, units: u32) -> Self {
        Self {
            kind,
            target: target.into(),
            units,
        }
    }
}

/// Point-in-time capacity of a single execution node.
///
/// Rebuilt every tick from the topology collaborator; never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeCapacity {
    pub id: String,
    /// Total capacity in capacity units.
    pub total: f64,
    /// Capacity currently consumed by running workers.
    pub used: f64,
    /// Home nodes keep a reserved carve-out of their capacity.
    pub home: bool,
}

impl NodeCapacity {
    pub fn new(id: impl Into<String>, total: f64, used: f64) -> Self {
        Self {
            id: id.into(),
            total,
            used,
            home: false,
        }
    }

    pub fn home(id: impl Into<String>, total: f64, used: f64) -> Self {
        Self {
            id: id.into(),
            total,
            used,
            home: true,
        }
    }

    /// Raw free capacity, ignoring the home reserve.
    pub fn free(&self) -> f64 {
        (self.total - self.used).max(0.0)
    }
}

/// Live metrics for a target, read fresh each tick from the metrics oracle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetMetrics {
    /// Maximum resource ceiling (> 0 for eligible targets).
    pub max_resource: f64,
    /// Current resource level, 0 ..= max_resource.
    pub current_resource: f64,
    /// The degradation level this target cannot drop below.
    pub floor_degradation: f64,
    /// Current degradation level, >= floor_degradation.
    pub current_degradation: f64,
    /// Access gate: targets above the player's capability are ineligible.
    pub required_level: u32,
}

impl TargetMetrics {
    /// How far degradation currently sits above its floor.
    pub fn degradation_delta(&self) -> f64 {
        self.current_degradation - self.floor_degradation
    }

    /// Current resource as a fraction of the ceiling.
    pub fn resource_fraction(&self) -> f64 {
        if self.max_resource > 0.0 {
            self.current_resource / self.max_resource
        } else {
            0.0
        }
    }
}
