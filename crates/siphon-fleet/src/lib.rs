//! siphon-fleet: the fleet model underneath the scheduling engine.
//!
//! This crate owns the seams to the excluded collaborators and the two
//! read-only views the engine computes over them each tick:
//!
//! - **`traits`** — `NodeProvider`, `ProcessInspector`, `JobLauncher`,
//!   `TargetOracle`, and the combined `Environment` the loop is generic over
//! - **`view`** — `FleetView`: a point-in-time capacity copy with the home
//!   reserve carve-out and the free-capacity ordering the allocator walks
//! - **`snapshot`** — `NetworkSnapshot`: per-target counts of in-flight
//!   worker units, used for idempotent scheduling

pub mod snapshot;
pub mod traits;
pub mod view;

pub use snapshot::{JobCounts, NetworkSnapshot};
pub use traits::{
    Environment, FleetError, FleetResult, JobLauncher, NodeProvider, ProcessInspector,
    RunningProcess, TargetOracle,
};
pub use view::FleetView;
