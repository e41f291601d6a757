//! Deterministic in-memory environment.
//!
//! Implements every collaborator trait against a small simulated network
//! so `siphond standalone` can run without a real fleet and integration
//! tests can drive whole ticks. Time is a logical millisecond clock
//! advanced explicitly with [`Sim::advance_ms`]; jobs occupy node
//! capacity until their completion time, then apply their effect to the
//! target's metrics.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use siphon_core::{JobCosts, JobKind, NodeCapacity, TargetMetrics};
use siphon_fleet::{
    FleetError, FleetResult, JobLauncher, NodeProvider, ProcessInspector, RunningProcess,
    TargetOracle,
};

/// Degradation removed per Degrade unit on completion.
const DEGRADE_EFFECT: f64 = 0.05;
/// Degradation added per Grow / Harvest unit on completion.
const GROW_TAX: f64 = 0.004;
const HARVEST_TAX: f64 = 0.002;

/// Everything that describes a simulated target.
#[derive(Debug, Clone)]
pub struct TargetSpec {
    /// Execution capacity the target node contributes to the fleet.
    pub capacity: f64,
    pub max_resource: f64,
    pub current_resource: f64,
    pub floor_degradation: f64,
    pub current_degradation: f64,
    pub required_level: u32,
    /// Completion time of one pass, in logical milliseconds.
    pub completion_ms: f64,
    /// Grow units needed per 1.0 of growth ratio above 1.
    pub growth_factor: f64,
    /// Fraction of max resource one harvest unit extracts.
    pub yield_per_unit: f64,
}

impl Default for TargetSpec {
    fn default() -> Self {
        Self {
            capacity: 16.0,
            max_resource: 1_000_000.0,
            current_resource: 1_000_000.0,
            floor_degradation: 1.0,
            current_degradation: 1.0,
            required_level: 1,
            completion_ms: 1_000.0,
            growth_factor: 40.0,
            yield_per_unit: 0.01,
        }
    }
}

#[derive(Debug, Clone)]
struct SimNode {
    id: String,
    total: f64,
    home: bool,
}

#[derive(Debug, Clone)]
struct SimJob {
    node: String,
    kind: JobKind,
    target: String,
    units: u32,
    completes_at_ms: u64,
}

struct SimState {
    clock_ms: u64,
    nodes: Vec<SimNode>,
    targets: HashMap<String, TargetSpec>,
    running: Vec<SimJob>,
    /// Nodes where worker deployment fails.
    broken_nodes: HashSet<String>,
    capability: u32,
    costs: JobCosts,
}

impl SimState {
    fn used_on(&self, node: &str) -> f64 {
        self.running
            .iter()
            .filter(|j| j.node == node)
            .map(|j| j.kind.unit_cost(&self.costs) * f64::from(j.units))
            .sum()
    }

    fn complete_due_jobs(&mut self) {
        let clock = self.clock_ms;
        let (due, still_running): (Vec<SimJob>, Vec<SimJob>) = self
            .running
            .drain(..)
            .partition(|j| j.completes_at_ms <= clock);
        self.running = still_running;

        for job in due {
            let Some(target) = self.targets.get_mut(&job.target) else {
                continue;
            };
            let units = f64::from(job.units);
            match job.kind {
                JobKind::Degrade => {
                    target.current_degradation = (target.current_degradation
                        - DEGRADE_EFFECT * units)
                        .max(target.floor_degradation);
                }
                JobKind::Grow => {
                    let ratio = 1.0 + units / target.growth_factor;
                    target.current_resource =
                        (target.current_resource.max(1.0) * ratio).min(target.max_resource);
                    target.current_degradation += GROW_TAX * units;
                }
                JobKind::Harvest => {
                    let stolen = target.max_resource * target.yield_per_unit * units;
                    target.current_resource = (target.current_resource - stolen).max(0.0);
                    target.current_degradation += HARVEST_TAX * units;
                }
            }
        }
    }
}

/// Cloneable handle to the simulated world.
#[derive(Clone)]
pub struct Sim {
    inner: Arc<Mutex<SimState>>,
}

impl Sim {
    pub fn new(costs: JobCosts) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SimState {
                clock_ms: 0,
                nodes: Vec::new(),
                targets: HashMap::new(),
                running: Vec::new(),
                broken_nodes: HashSet::new(),
                capability: 100,
                costs,
            })),
        }
    }

    /// Add the home node. At most one makes sense; the sim does not check.
    pub fn add_home(&self, id: &str, total: f64) {
        self.inner.lock().unwrap().nodes.push(SimNode {
            id: id.to_string(),
            total,
            home: true,
        });
    }

    /// Add a capacity-only node. It reports zeroed target metrics, so the
    /// engine filters it out of the target ranking silently.
    pub fn add_node(&self, id: &str, total: f64) {
        self.inner.lock().unwrap().nodes.push(SimNode {
            id: id.to_string(),
            total,
            home: false,
        });
    }

    /// Add a node that is also a harvestable target.
    pub fn add_target(&self, id: &str, spec: TargetSpec) {
        let mut state = self.inner.lock().unwrap();
        state.nodes.push(SimNode {
            id: id.to_string(),
            total: spec.capacity,
            home: false,
        });
        state.targets.insert(id.to_string(), spec);
    }

    /// Mark a node's worker deployment as failing.
    pub fn break_node(&self, id: &str) {
        self.inner.lock().unwrap().broken_nodes.insert(id.to_string());
    }

    pub fn set_capability(&self, level: u32) {
        self.inner.lock().unwrap().capability = level;
    }

    /// Advance the logical clock, completing any due jobs.
    pub fn advance_ms(&self, ms: u64) {
        let mut state = self.inner.lock().unwrap();
        state.clock_ms += ms;
        state.complete_due_jobs();
    }

    pub fn clock_ms(&self) -> u64 {
        self.inner.lock().unwrap().clock_ms
    }

    /// Current metrics of a simulated target, for test assertions.
    pub fn target_state(&self, id: &str) -> Option<TargetSpec> {
        self.inner.lock().unwrap().targets.get(id).cloned()
    }

    pub fn running_jobs(&self) -> usize {
        self.inner.lock().unwrap().running.len()
    }
}

#[async_trait]
impl NodeProvider for Sim {
    async fn list_usable_nodes(&self) -> Vec<NodeCapacity> {
        let state = self.inner.lock().unwrap();
        state
            .nodes
            .iter()
            .map(|n| NodeCapacity {
                id: n.id.clone(),
                total: n.total,
                used: state.used_on(&n.id),
                home: n.home,
            })
            .collect()
    }
}

#[async_trait]
impl ProcessInspector for Sim {
    async fn list_running(&self, node: &str) -> Vec<RunningProcess> {
        let state = self.inner.lock().unwrap();
        state
            .running
            .iter()
            .filter(|j| j.node == node)
            .map(|j| RunningProcess {
                program: j.kind.program().to_string(),
                target: j.target.clone(),
                units: j.units,
            })
            .collect()
    }
}

#[async_trait]
impl JobLauncher for Sim {
    async fn launch(
        &self,
        kind: JobKind,
        node: &str,
        units: u32,
        target: &str,
    ) -> FleetResult<()> {
        let mut state = self.inner.lock().unwrap();

        let Some(sim_node) = state.nodes.iter().find(|n| n.id == node).cloned() else {
            return Err(FleetError::NodeUnreachable(node.to_string()));
        };
        if !sim_node.home && state.broken_nodes.contains(node) {
            return Err(FleetError::ProgramMissing(node.to_string()));
        }

        let cost = kind.unit_cost(&state.costs) * f64::from(units);
        if state.used_on(node) + cost > sim_node.total {
            return Err(FleetError::InsufficientCapacity(node.to_string()));
        }

        let duration = state
            .targets
            .get(target)
            .map(|t| t.completion_ms)
            .unwrap_or(1_000.0) as u64;
        let completes_at_ms = state.clock_ms + duration;
        state.running.push(SimJob {
            node: node.to_string(),
            kind,
            target: target.to_string(),
            units,
            completes_at_ms,
        });
        Ok(())
    }
}

#[async_trait]
impl TargetOracle for Sim {
    async fn target_metrics(&self, target: &str) -> FleetResult<TargetMetrics> {
        let state = self.inner.lock().unwrap();
        if let Some(spec) = state.targets.get(target) {
            return Ok(TargetMetrics {
                max_resource: spec.max_resource,
                current_resource: spec.current_resource,
                floor_degradation: spec.floor_degradation,
                current_degradation: spec.current_degradation,
                required_level: spec.required_level,
            });
        }
        // Capacity-only nodes exist but hold nothing worth harvesting.
        if state.nodes.iter().any(|n| n.id == target) {
            return Ok(TargetMetrics {
                max_resource: 0.0,
                current_resource: 0.0,
                floor_degradation: 0.0,
                current_degradation: 0.0,
                required_level: 0,
            });
        }
        Err(FleetError::UnknownTarget(target.to_string()))
    }

    async fn capability_level(&self) -> u32 {
        self.inner.lock().unwrap().capability
    }

    async fn completion_time_ms(&self, target: &str) -> f64 {
        self.inner
            .lock()
            .unwrap()
            .targets
            .get(target)
            .map(|t| t.completion_ms)
            .unwrap_or(f64::MAX)
    }

    async fn growth_units_needed(&self, target: &str, ratio: f64) -> f64 {
        self.inner
            .lock()
            .unwrap()
            .targets
            .get(target)
            .map(|t| (ratio - 1.0).max(0.0) * t.growth_factor)
            .unwrap_or(0.0)
    }

    async fn harvest_yield_per_unit(&self, target: &str) -> f64 {
        self.inner
            .lock()
            .unwrap()
            .targets
            .get(target)
            .map(|t| t.yield_per_unit)
            .unwrap_or(0.0)
    }
}
