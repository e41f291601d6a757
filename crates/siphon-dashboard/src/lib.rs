//! siphon-dashboard: text rendering of tick reports.
//!
//! Pure display. The view builders take a finished `TickReport` and
//! produce strings; nothing here influences scheduling.

pub mod views;

pub use views::{CapacityBar, ConsoleDashboard, TargetRow, render};
