//! The scheduler loop.
//!
//! One tick, strictly sequential: refresh the fleet, rank eligible
//! targets, snapshot in-flight work, classify-and-allocate every inactive
//! target, soak leftover capacity with filler work, re-snapshot for the
//! dashboard, sleep. Every failure path logs and continues; the loop has
//! no terminal state of its own and runs until shut down externally.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use siphon_core::{EngineConfig, JobKind, TargetMetrics, WorkRequest};
use siphon_fleet::{Environment, FleetView, NetworkSnapshot};

use crate::allocator::allocate;
use crate::classifier::classify;

/// What one tick did, handed to the dashboard and returned to callers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TickReport {
    /// Requests that launched at least one unit this tick.
    pub scheduled: Vec<WorkRequest>,
    /// Ranked targets considered this tick.
    pub eligible_targets: usize,
    /// Targets left alone because work was already in flight.
    pub skipped_active: usize,
    /// Units handed to the idle-capacity filler (0 when it did not run).
    pub filler_units: u32,
    /// In-flight work after this tick's launches.
    pub snapshot: NetworkSnapshot,
    /// Fresh metrics for every target in the snapshot, for display.
    pub target_metrics: HashMap<String, TargetMetrics>,
    pub total_capacity: f64,
    pub total_used: f64,
}

/// Display collaborator. Receives each tick's report; makes no decisions.
pub trait Dashboard: Send + Sync {
    fn publish(&self, report: &TickReport);
}

/// The process-wide control loop.
///
/// Generic over the collaborator surface so tests and the standalone
/// simulation drive it the same way the real network does. Configuration
/// is an immutable value threaded through to the classifier and
/// allocator.
pub struct SchedulerLoop<E: Environment> {
    env: E,
    config: EngineConfig,
    dashboard: Option<Box<dyn Dashboard>>,
}

impl<E: Environment> SchedulerLoop<E> {
    pub fn new(env: E, config: EngineConfig) -> Self {
        Self {
            env,
            config,
            dashboard: None,
        }
    }

    pub fn with_dashboard(mut self, dashboard: Box<dyn Dashboard>) -> Self {
        self.dashboard = Some(dashboard);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Execute one tick to completion.
    pub async fn run_tick(&self) -> TickReport {
        let mut report = TickReport::default();

        // 1. Fresh capacity copy; all allocation this tick computes
        // against it.
        let nodes = self.env.list_usable_nodes().await;
        let mut fleet = FleetView::new(nodes.clone(), self.config.home_reserve);

        // 2. Rank eligible targets by throughput density.
        let targets = self.rank_targets(&fleet).await;
        report.eligible_targets = targets.len();

        // 3. In-flight work, collected strictly before any decision.
        let snapshot = NetworkSnapshot::collect(&self.env, &nodes).await;

        // 4. Classify and allocate every target without in-flight work.
        for (target, metrics) in &targets {
            if snapshot.is_active(target) {
                report.skipped_active += 1;
                continue;
            }

            let request = classify(target, metrics, &self.env, &self.config).await;
            if request.units == 0 {
                continue;
            }
            if allocate(&request, &mut fleet, &self.env, &self.config.costs).await {
                report.scheduled.push(request);
            }
        }

        // 5. Idle fill: convert leftover capacity into filler work.
        let idle = fleet.idle_capacity();
        if idle > self.config.idle_fill_threshold {
            let unit_cost = JobKind::Grow.unit_cost(&self.config.costs);
            let units = (idle / unit_cost).floor() as u32;
            if units > 0 {
                let request =
                    WorkRequest::new(JobKind::Grow, self.config.filler_target.clone(), units);
                if allocate(&request, &mut fleet, &self.env, &self.config.costs).await {
                    report.filler_units = units;
                    report.scheduled.push(request);
                }
            }
        }

        // 6. Re-snapshot to capture what was just launched, then hand off.
        let snapshot_after = NetworkSnapshot::collect(&self.env, &nodes).await;
        for (target, _) in snapshot_after.iter() {
            if let Ok(m) = self.env.target_metrics(target).await {
                report.target_metrics.insert(target.to_string(), m);
            }
        }
        report.snapshot = snapshot_after;
        report.total_capacity = fleet.total_capacity();
        report.total_used = fleet.total_used();

        if let Some(dashboard) = &self.dashboard {
            dashboard.publish(&report);
        }

        report
    }

    /// Run ticks forever, sleeping `refresh_interval_ms` between them.
    ///
    /// A tick always runs to completion before the sleep; the shutdown
    /// channel is only observed between ticks.
    pub async fn run(&self, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        let interval = Duration::from_millis(self.config.refresh_interval_ms);
        info!(
            interval_ms = self.config.refresh_interval_ms,
            max_targets = self.config.max_targets,
            "scheduler loop started"
        );

        loop {
            let report = self.run_tick().await;
            debug!(
                scheduled = report.scheduled.len(),
                skipped_active = report.skipped_active,
                filler_units = report.filler_units,
                "tick complete"
            );

            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = shutdown.changed() => {
                    info!("scheduler loop shutting down");
                    break;
                }
            }
        }
    }

    /// Eligible targets in scheduling order.
    ///
    /// Candidates are the refreshed node ids; a target qualifies when it
    /// has a resource ceiling, is not the home node, and its access gate
    /// is within the current capability level. Ordering is descending by
    /// `max_resource / completion_time`, truncated to `max_targets`.
    async fn rank_targets(&self, fleet: &FleetView) -> Vec<(String, TargetMetrics)> {
        let capability = self.env.capability_level().await;
        let mut ranked: Vec<(String, TargetMetrics, f64)> = Vec::new();

        for node in fleet.nodes() {
            if node.home {
                continue;
            }

            let metrics = match self.env.target_metrics(&node.id).await {
                Ok(m) => m,
                Err(e) => {
                    warn!(target = %node.id, error = %e, "metrics unavailable, skipping");
                    continue;
                }
            };
            if metrics.max_resource <= 0.0 || metrics.required_level > capability {
                continue;
            }

            // Clamp the estimate so the ordering stays total even for
            // degenerate zero-time answers.
            let completion_ms = self.env.completion_time_ms(&node.id).await.max(1.0);
            let density = metrics.max_resource / completion_ms;
            ranked.push((node.id.clone(), metrics, density));
        }

        ranked.sort_by(|a, b| b.2.partial_cmp(&a.2).unwrap_or(std::cmp::Ordering::Equal));
        ranked.truncate(self.config.max_targets);
        ranked.into_iter().map(|(id, m, _)| (id, m)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use siphon_core::NodeCapacity;
    use siphon_fleet::{
        FleetError, FleetResult, JobLauncher, NodeProvider, ProcessInspector, RunningProcess,
        TargetOracle,
    };

    /// Minimal in-memory environment for driving single ticks.
    ///
    /// Launches append to a process table, so the tick's re-snapshot
    /// observes them the way the real inspector would.
    struct MockEnv {
        nodes: Vec<NodeCapacity>,
        metrics: HashMap<String, TargetMetrics>,
        preexisting: Vec<(String, RunningProcess)>,
        launched: Mutex<Vec<(String, RunningProcess)>>,
        capability: u32,
        yield_per_unit: f64,
    }

    impl MockEnv {
        fn new(nodes: Vec<NodeCapacity>) -> Self {
            Self {
                nodes,
                metrics: HashMap::new(),
                preexisting: Vec::new(),
                launched: Mutex::new(Vec::new()),
                capability: 100,
                yield_per_unit: 0.01,
            }
        }

        fn with_target(mut self, id: &str, metrics: TargetMetrics) -> Self {
            self.metrics.insert(id.to_string(), metrics);
            self
        }

        fn with_running(mut self, node: &str, program: &str, target: &str, units: u32) -> Self {
            self.preexisting.push((
                node.to_string(),
                RunningProcess {
                    program: program.to_string(),
                    target: target.to_string(),
                    units,
                },
            ));
            self
        }

        fn launched_against(&self, target: &str) -> u32 {
            self.launched
                .lock()
                .unwrap()
                .iter()
                .filter(|(_, p)| p.target == target)
                .map(|(_, p)| p.units)
                .sum()
        }
    }

    #[async_trait]
    impl NodeProvider for MockEnv {
        async fn list_usable_nodes(&self) -> Vec<NodeCapacity> {
            self.nodes.clone()
        }
    }

    #[async_trait]
    impl ProcessInspector for MockEnv {
        async fn list_running(&self, node: &str) -> Vec<RunningProcess> {
            self.preexisting
                .iter()
                .chain(self.launched.lock().unwrap().iter())
                .filter(|(n, _)| n == node)
                .map(|(_, p)| p.clone())
                .collect()
        }
    }

    #[async_trait]
    impl JobLauncher for MockEnv {
        async fn launch(
            &self,
            kind: JobKind,
            node: &str,
            units: u32,
            target: &str,
        ) -> FleetResult<()> {
            self.launched.lock().unwrap().push((
                node.to_string(),
                RunningProcess {
                    program: kind.program().to_string(),
                    target: target.to_string(),
                    units,
                },
            ));
            Ok(())
        }
    }

    #[async_trait]
    impl TargetOracle for MockEnv {
        async fn target_metrics(&self, target: &str) -> FleetResult<TargetMetrics> {
            self.metrics
                .get(target)
                .cloned()
                .ok_or_else(|| FleetError::UnknownTarget(target.to_string()))
        }

        async fn capability_level(&self) -> u32 {
            self.capability
        }

        async fn completion_time_ms(&self, target: &str) -> f64 {
            // Richer targets take longer; keeps ranking deterministic.
            self.metrics
                .get(target)
                .map(|m| (m.max_resource / 1000.0).max(1.0))
                .unwrap_or(1.0)
        }

        async fn growth_units_needed(&self, _target: &str, ratio: f64) -> f64 {
            ratio * 10.0
        }

        async fn harvest_yield_per_unit(&self, _target: &str) -> f64 {
            self.yield_per_unit
        }
    }

    fn steady_metrics(max: f64) -> TargetMetrics {
        TargetMetrics {
            max_resource: max,
            current_resource: max,
            floor_degradation: 1.0,
            current_degradation: 1.0,
            required_level: 1,
        }
    }

    fn config_without_filler() -> EngineConfig {
        EngineConfig {
            // A huge threshold keeps the filler quiet in tests that do
            // not exercise it.
            idle_fill_threshold: f64::MAX,
            ..EngineConfig::default()
        }
    }

    fn fleet_node(id: &str, total: f64) -> NodeCapacity {
        NodeCapacity::new(id, total, 0.0)
    }

    #[tokio::test]
    async fn tick_schedules_inactive_targets() {
        let env = MockEnv::new(vec![
            NodeCapacity::home("home", 4096.0, 0.0),
            fleet_node("vault-a", 64.0),
        ])
        .with_target("vault-a", steady_metrics(1_000_000.0));

        let scheduler = SchedulerLoop::new(env, config_without_filler());
        let report = scheduler.run_tick().await;

        assert_eq!(report.eligible_targets, 1);
        assert_eq!(report.scheduled.len(), 1);
        assert_eq!(report.scheduled[0].kind, JobKind::Harvest);
        // The re-snapshot sees what was just launched.
        assert!(report.snapshot.is_active("vault-a"));
    }

    #[tokio::test]
    async fn active_target_is_skipped_entirely() {
        let env = MockEnv::new(vec![
            NodeCapacity::home("home", 4096.0, 0.0),
            fleet_node("vault-a", 64.0),
        ])
        .with_target("vault-a", steady_metrics(1_000_000.0))
        // One stray degrade unit is enough to block reclassification.
        .with_running("vault-a", "siphon-degrade", "vault-a", 1);

        let scheduler = SchedulerLoop::new(env, config_without_filler());
        let report = scheduler.run_tick().await;

        assert_eq!(report.skipped_active, 1);
        assert!(report.scheduled.is_empty());
        assert_eq!(scheduler.env.launched_against("vault-a"), 0);
    }

    #[tokio::test]
    async fn non_worker_processes_do_not_block_targets() {
        let env = MockEnv::new(vec![fleet_node("vault-a", 64.0)])
            .with_target("vault-a", steady_metrics(1_000_000.0))
            .with_running("vault-a", "cron", "vault-a", 3);

        let scheduler = SchedulerLoop::new(env, config_without_filler());
        let report = scheduler.run_tick().await;

        assert_eq!(report.skipped_active, 0);
        assert_eq!(report.scheduled.len(), 1);
    }

    #[tokio::test]
    async fn home_node_is_never_a_target() {
        let env = MockEnv::new(vec![NodeCapacity::home("home", 4096.0, 0.0)]);

        let scheduler = SchedulerLoop::new(env, config_without_filler());
        let report = scheduler.run_tick().await;

        assert_eq!(report.eligible_targets, 0);
        assert!(report.scheduled.is_empty());
    }

    #[tokio::test]
    async fn capability_gate_excludes_hard_targets() {
        let mut hard = steady_metrics(1_000_000.0);
        hard.required_level = 999;

        let mut env = MockEnv::new(vec![
            fleet_node("vault-easy", 64.0),
            fleet_node("vault-hard", 64.0),
        ])
        .with_target("vault-easy", steady_metrics(500_000.0))
        .with_target("vault-hard", hard);
        env.capability = 50;

        let scheduler = SchedulerLoop::new(env, config_without_filler());
        let report = scheduler.run_tick().await;

        assert_eq!(report.eligible_targets, 1);
        assert_eq!(report.scheduled[0].target, "vault-easy");
    }

    #[tokio::test]
    async fn max_targets_truncates_the_ranking() {
        let env = MockEnv::new(vec![
            fleet_node("vault-a", 640.0),
            fleet_node("vault-b", 640.0),
            fleet_node("vault-c", 640.0),
        ])
        .with_target("vault-a", steady_metrics(1_000.0))
        .with_target("vault-b", steady_metrics(2_000.0))
        .with_target("vault-c", steady_metrics(3_000.0));

        let config = EngineConfig {
            max_targets: 2,
            ..config_without_filler()
        };
        let scheduler = SchedulerLoop::new(env, config);
        let report = scheduler.run_tick().await;

        assert_eq!(report.eligible_targets, 2);
    }

    #[tokio::test]
    async fn metrics_failure_skips_target_and_continues() {
        // vault-ghost has no metrics entry; the tick carries on with the
        // remaining target instead of aborting.
        let env = MockEnv::new(vec![
            fleet_node("vault-ghost", 64.0),
            fleet_node("vault-a", 64.0),
        ])
        .with_target("vault-a", steady_metrics(1_000_000.0));

        let scheduler = SchedulerLoop::new(env, config_without_filler());
        let report = scheduler.run_tick().await;

        assert_eq!(report.eligible_targets, 1);
        assert_eq!(report.scheduled.len(), 1);
        assert_eq!(report.scheduled[0].target, "vault-a");
    }

    #[tokio::test]
    async fn idle_filler_soaks_leftover_capacity() {
        let env = MockEnv::new(vec![
            NodeCapacity::home("home", 2248.0, 0.0),
            fleet_node("vault-a", 64.0),
        ])
        .with_target("vault-a", steady_metrics(1_000_000.0));

        let config = EngineConfig {
            home_reserve: 2048.0,
            filler_target: "vault-a".to_string(),
            ..EngineConfig::default()
        };
        let scheduler = SchedulerLoop::new(env, config);
        let report = scheduler.run_tick().await;

        assert!(report.filler_units > 0);
        assert!(
            report
                .scheduled
                .iter()
                .any(|r| r.kind == JobKind::Grow && r.target == "vault-a")
        );
    }

    #[tokio::test]
    async fn idle_filler_respects_threshold() {
        // Fleet is almost saturated: leftover capacity stays below the
        // threshold, so no filler request is made.
        let env = MockEnv::new(vec![fleet_node("vault-a", 40.0)])
            .with_target("vault-a", steady_metrics(1_000_000.0));

        let config = EngineConfig {
            idle_fill_threshold: 50.0,
            filler_target: "vault-a".to_string(),
            ..EngineConfig::default()
        };
        let scheduler = SchedulerLoop::new(env, config);
        let report = scheduler.run_tick().await;

        assert_eq!(report.filler_units, 0);
    }

    #[tokio::test]
    async fn report_reflects_fleet_totals() {
        let env = MockEnv::new(vec![
            fleet_node("vault-a", 64.0),
            fleet_node("vault-b", 32.0),
        ])
        .with_target("vault-a", steady_metrics(1_000_000.0));

        let scheduler = SchedulerLoop::new(env, config_without_filler());
        let report = scheduler.run_tick().await;

        assert_eq!(report.total_capacity, 96.0);
        // Harvest of 67 units at 1.70 each landed somewhere in the fleet.
        assert!(report.total_used > 0.0);
    }

    #[tokio::test]
    async fn run_stops_on_shutdown_signal() {
        let env = MockEnv::new(vec![fleet_node("vault-a", 16.0)])
            .with_target("vault-a", steady_metrics(1_000.0));

        let config = EngineConfig {
            refresh_interval_ms: 5,
            ..config_without_filler()
        };
        let scheduler = SchedulerLoop::new(env, config);

        let (tx, rx) = tokio::sync::watch::channel(false);
        let run = tokio::time::timeout(Duration::from_secs(5), async {
            tokio::join!(scheduler.run(rx), async {
                tokio::time::sleep(Duration::from_millis(20)).await;
                tx.send(true).unwrap();
            })
        });
        run.await.expect("loop should exit after shutdown signal");
    }
}
