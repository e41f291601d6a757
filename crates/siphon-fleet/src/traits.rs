//! Collaborator seams.
//!
//! Topology discovery, process inspection, job launch, and target analytics
//! are external to the engine. The loop only ever talks to them through
//! these traits, so tests and the standalone simulation can stand in for
//! the real network.

use async_trait::async_trait;
use thiserror::Error;

use siphon_core::{JobKind, NodeCapacity, TargetMetrics};

/// Errors surfaced by the fleet collaborators.
///
/// None of these are fatal to the engine: a failed launch loses its units
/// for the tick and the next tick re-requests them from fresh state.
#[derive(Debug, Error)]
pub enum FleetError {
    #[error("worker program missing on node: {0}")]
    ProgramMissing(String),

    #[error("insufficient capacity on node: {0}")]
    InsufficientCapacity(String),

    #[error("node unreachable: {0}")]
    NodeUnreachable(String),

    #[error("unknown target: {0}")]
    UnknownTarget(String),
}

pub type FleetResult<T> = Result<T, FleetError>;

/// A process currently executing on a node, as reported by inspection.
///
/// `program` is the raw program name; the snapshot decides whether it is
/// one of the siphon workers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunningProcess {
    pub program: String,
    pub target: String,
    pub units: u32,
}

/// Topology + access-check collaborator.
#[async_trait]
pub trait NodeProvider {
    /// Usable nodes discovered this tick, in discovery order.
    ///
    /// "Usable" means accessible and with nonzero total capacity; the
    /// provider applies the access model before returning.
    async fn list_usable_nodes(&self) -> Vec<NodeCapacity>;
}

/// Process-inspection collaborator.
#[async_trait]
pub trait ProcessInspector {
    /// Every process currently running on `node`. Unknown nodes yield
    /// an empty list.
    async fn list_running(&self, node: &str) -> Vec<RunningProcess>;
}

/// Job-execution collaborator.
#[async_trait]
pub trait JobLauncher {
    /// Start `units` workers of `kind` on `node` against `target`.
    ///
    /// Launching includes deploying the worker program to a non-home node
    /// when it is not already present; a failed copy surfaces as
    /// [`FleetError::ProgramMissing`].
    async fn launch(
        &self,
        kind: JobKind,
        node: &str,
        units: u32,
        target: &str,
    ) -> FleetResult<()>;
}

/// Target metrics and the analytic oracles, one per job kind.
///
/// The engine treats all of these as black boxes; the effects the numbers
/// describe happen entirely outside the core.
#[async_trait]
pub trait TargetOracle {
    async fn target_metrics(&self, target: &str) -> FleetResult<TargetMetrics>;

    /// The player's current capability level, gating target eligibility.
    async fn capability_level(&self) -> u32;

    /// Estimated completion time of a harvest pass, in milliseconds.
    async fn completion_time_ms(&self, target: &str) -> f64;

    /// Grow units needed to multiply the target's resource by `ratio`.
    async fn growth_units_needed(&self, target: &str, ratio: f64) -> f64;

    /// Fraction of max resource one harvest unit extracts.
    async fn harvest_yield_per_unit(&self, target: &str) -> f64;
}

/// The full collaborator surface the scheduler loop needs.
pub trait Environment:
    NodeProvider + ProcessInspector + JobLauncher + TargetOracle + Send + Sync
{
}

impl<T> Environment for T where
    T: NodeProvider + ProcessInspector + JobLauncher + TargetOracle + Send + Sync
{
}
