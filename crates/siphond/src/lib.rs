//! siphond library surface.
//!
//! The binary lives in `main.rs`; the simulation environment is exported
//! here so integration tests can drive whole ticks against it.

pub mod sim;

pub use sim::{Sim, TargetSpec};
