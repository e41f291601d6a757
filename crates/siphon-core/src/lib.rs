//! siphon-core: shared types and configuration for the siphon workspace.
//!
//! Everything here is plain data. The decision logic lives in
//! `siphon-engine`; the collaborator seams live in `siphon-fleet`.

pub mod config;
pub mod types;

pub use config::{EngineConfig, JobCosts};
pub use types::*;
