//! In-flight work snapshot.
//!
//! `NetworkSnapshot::collect` asks the inspector what is running on every
//! node and aggregates unit counts per target, keyed by job kind. The
//! snapshot is rebuilt from scratch each time; it is never patched
//! incrementally, so completed or failed jobs drop out on the next
//! collection without bookkeeping.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use siphon_core::{JobKind, NodeCapacity};

use crate::traits::ProcessInspector;

/// Running unit counts for one target, by job kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobCounts {
    pub degrade: u32,
    pub grow: u32,
    pub harvest: u32,
}

impl JobCounts {
    pub fn add(&mut self, kind: JobKind, units: u32) {
        match kind {
            JobKind::Degrade => self.degrade += units,
            JobKind::Grow => self.grow += units,
            JobKind::Harvest => self.harvest += units,
        }
    }

    pub fn get(&self, kind: JobKind) -> u32 {
        match kind {
            JobKind::Degrade => self.degrade,
            JobKind::Grow => self.grow,
            JobKind::Harvest => self.harvest,
        }
    }

    pub fn total(&self) -> u32 {
        self.degrade + self.grow + self.harvest
    }
}

/// Per-target in-flight unit counts, aggregated over the whole fleet.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkSnapshot {
    targets: HashMap<String, JobCounts>,
}

impl NetworkSnapshot {
    /// Inspect every node and sum worker units grouped by (target, kind).
    ///
    /// Processes whose program name is not a siphon worker are ignored.
    /// An empty fleet yields an empty snapshot.
    pub async fn collect<I>(inspector: &I, nodes: &[NodeCapacity]) -> Self
    where
        I: ProcessInspector + ?Sized,
    {
        let mut targets: HashMap<String, JobCounts> = HashMap::new();

        for node in nodes {
            for process in inspector.list_running(&node.id).await {
                let Some(kind) = JobKind::from_program(&process.program) else {
                    continue;
                };
                targets
                    .entry(process.target)
                    .or_default()
                    .add(kind, process.units);
            }
        }

        Self { targets }
    }

    /// Build a snapshot from already-aggregated counts.
    pub fn from_counts(entries: impl IntoIterator<Item = (String, JobCounts)>) -> Self {
        Self {
            targets: entries.into_iter().collect(),
        }
    }

    /// True when any job kind has a positive count against `target`.
    ///
    /// Even a single stray unit of an unrelated kind counts: the engine
    /// skips such targets for the tick rather than stacking new work on
    /// top of in-flight work.
    pub fn is_active(&self, target: &str) -> bool {
        self.targets.get(target).is_some_and(|c| c.total() > 0)
    }

    pub fn counts(&self, target: &str) -> Option<JobCounts> {
        self.targets.get(target).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &JobCounts)> {
        self.targets.iter().map(|(t, c)| (t.as_str(), c))
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}
