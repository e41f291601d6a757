//! Greedy work allocation.
//!
//! Packs a work request across the fleet first-fit-descending: nodes are
//! visited in order of free capacity and each takes as many units as fit.
//! Partial placement counts as success; an unsatisfied remainder is simply
//! dropped and re-requested from scratch on the next tick.

use tracing::{debug, warn};

use siphon_core::{JobCosts, WorkRequest};
use siphon_fleet::{FleetView, JobLauncher};

/// Schedule as many units of `request` as fit across `fleet`.
///
/// Returns true iff at least one unit was launched anywhere. Zero-unit
/// requests succeed trivially with no launches. Committed capacity is
/// debited from the fleet view so later allocations in the same tick see
/// it.
///
/// A failed launch loses its units for this tick: they are neither retried
/// on later nodes nor counted toward the success flag.
pub async fn allocate<L>(
    request: &WorkRequest,
    fleet: &mut FleetView,
    launcher: &L,
    costs: &JobCosts,
) -> bool
where
    L: JobLauncher + ?Sized,
{
    if request.units == 0 {
        return true;
    }

    let unit_cost = request.kind.unit_cost(costs);
    fleet.sort_by_free_desc();

    // Each node is visited once, so its free capacity can be captured up
    // front; commits only ever debit the node just launched on.
    let candidates: Vec<(String, f64)> = fleet
        .nodes()
        .iter()
        .map(|n| (n.id.clone(), fleet.free_capacity(n)))
        .collect();

    let mut remaining = request.units;
    let mut scheduled = false;

    for (node_id, free) in candidates {
        if remaining == 0 {
            break;
        }
        if free < unit_cost {
            continue;
        }

        let possible = (free / unit_cost).floor() as u32;
        if possible == 0 {
            continue;
        }
        let run = remaining.min(possible);

        match launcher
            .launch(request.kind, &node_id, run, &request.target)
            .await
        {
            Ok(()) => {
                fleet.commit(&node_id, unit_cost * f64::from(run));
                scheduled = true;
                debug!(
                    node = %node_id,
                    target = %request.target,
                    kind = %request.kind,
                    units = run,
                    "units launched"
                );
            }
            Err(e) => {
                warn!(
                    node = %node_id,
                    target = %request.target,
                    units = run,
                    error = %e,
                    "launch failed, units lost for this tick"
                );
            }
        }

        remaining -= run;
    }

    if remaining > 0 {
        debug!(
            target = %request.target,
            kind = %request.kind,
            remaining,
            "fleet could not absorb full request"
        );
    }

    scheduled
}
