//! siphon.toml configuration parser.
//!
//! The engine receives one immutable `EngineConfig` at startup and threads
//! it through to the classifier and allocator. There is no reload and no
//! process-wide mutable state.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Per-unit capacity cost of each worker program.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobCosts {
    pub degrade: f64,
    pub grow: f64,
    pub harvest: f64,
}

impl Default for JobCosts {
    fn default() -> Self {
        Self {
            degrade: 1.75,
            grow: 1.75,
            harvest: 1.70,
        }
    }
}

/// Engine configuration, fixed at process start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Fraction of a target's resources one harvest pass aims to extract.
    pub steal_fraction: f64,
    /// Hard cap on the fraction extracted in a single pass.
    pub hard_steal_cap: f64,
    /// Capacity held back on the home node, never scheduled against.
    pub home_reserve: f64,
    /// Degradation above floor that triggers a Degrade pass.
    pub degradation_tolerance: f64,
    /// Resource fraction below which a Grow pass is scheduled.
    pub money_fraction_floor: f64,
    /// Upper bound on ranked targets considered per tick.
    pub max_targets: usize,
    /// Target that soaks up otherwise-idle capacity with Grow work.
    pub filler_target: String,
    /// Minimum leftover capacity before the idle filler bothers to run.
    pub idle_fill_threshold: f64,
    /// Sleep between ticks, in milliseconds.
    pub refresh_interval_ms: u64,
    pub costs: JobCosts,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            steal_fraction: 0.67,
            hard_steal_cap: 0.90,
            home_reserve: 2048.0,
            degradation_tolerance: 5.0,
            money_fraction_floor: 0.90,
            max_targets: 200,
            filler_target: "idle-sink".to_string(),
            idle_fill_threshold: 50.0,
            refresh_interval_ms: 200,
            costs: JobCosts::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: EngineConfig = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_reference_values() {
        let config = EngineConfig::default();
        assert_eq!(config.steal_fraction, 0.67);
        assert_eq!(config.home_reserve, 2048.0);
        assert_eq!(config.max_targets, 200);
        assert_eq!(config.costs.harvest, 1.70);
    }

    #[test]
    fn parse_partial_toml_falls_back_to_defaults() {
        let config: EngineConfig = toml::from_str(
            r#"
steal_fraction = 0.5
filler_target = "depot-c"

[costs]
grow = 2.0
"#,
        )
        .unwrap();
        assert_eq!(config.steal_fraction, 0.5);
        assert_eq!(config.filler_target, "depot-c");
        assert_eq!(config.costs.grow, 2.0);
        // Untouched fields keep their defaults.
        assert_eq!(config.money_fraction_floor, 0.90);
        assert_eq!(config.costs.degrade, 1.75);
    }

    #[test]
    fn toml_round_trip() {
        let config = EngineConfig::default();
        let text = config.to_toml_string().unwrap();
        let parsed: EngineConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn from_file_reads_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "refresh_interval_ms = 1000").unwrap();

        let config = EngineConfig::from_file(file.path()).unwrap();
        assert_eq!(config.refresh_interval_ms, 1000);
        assert_eq!(config.max_targets, 200);
    }
}
