//! Target classification.
//!
//! A pure priority cascade over freshly read metrics. Exactly one branch
//! fires per call, in fixed order: Degrade beats Grow beats Harvest.
//! Unit counts always round up, since fractional workers cannot run.

use siphon_core::{EngineConfig, JobKind, TargetMetrics, WorkRequest};
use siphon_fleet::TargetOracle;

/// Degradation removed by one Degrade unit.
pub const DEGRADE_PER_UNIT: f64 = 0.05;

/// Decide the single job to run against `target` this tick.
///
/// The caller is responsible for not invoking this on targets the network
/// snapshot already reports active.
pub async fn classify<O>(
    target: &str,
    metrics: &TargetMetrics,
    oracle: &O,
    config: &EngineConfig,
) -> WorkRequest
where
    O: TargetOracle + ?Sized,
{
    // Degradation above tolerance takes priority over everything else,
    // regardless of resource levels.
    if metrics.current_degradation > metrics.floor_degradation + config.degradation_tolerance {
        let units = (metrics.degradation_delta() / DEGRADE_PER_UNIT).ceil().max(0.0) as u32;
        return WorkRequest::new(JobKind::Degrade, target, units);
    }

    if metrics.current_resource < metrics.max_resource * config.money_fraction_floor {
        let ratio = metrics.max_resource / metrics.current_resource.max(1.0);
        let units = oracle
            .growth_units_needed(target, ratio)
            .await
            .ceil()
            .max(0.0) as u32;
        return WorkRequest::new(JobKind::Grow, target, units);
    }

    // Steady state: harvest the desired fraction, bounded by the hard cap.
    let yield_per_unit = oracle.harvest_yield_per_unit(target).await;
    let units = if yield_per_unit > 0.0 {
        let desired = (config.steal_fraction / yield_per_unit).ceil() as u32;
        let cap = (config.hard_steal_cap / yield_per_unit).ceil() as u32;
        desired.min(cap)
    } else {
        0
    };
    WorkRequest::new(JobKind::Harvest, target, units)
}
