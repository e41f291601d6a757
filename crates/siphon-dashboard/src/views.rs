//! View types for dashboard rendering.
//!
//! These types carry pre-formatted strings and computed fields so the
//! final `render` stays a plain layout pass.

use siphon_engine::{Dashboard, TickReport};

const BAR_WIDTH: usize = 25;
const TABLE_WIDTH: usize = 56;

/// Fleet-wide capacity load, pre-formatted for the header.
pub struct CapacityBar {
    pub used: f64,
    pub total: f64,
    pub percent: f64,
    pub bar: String,
    pub percent_display: String,
    pub load_display: String,
}

impl CapacityBar {
    pub fn new(used: f64, total: f64) -> Self {
        let percent = if total > 0.0 {
            (used / total) * 100.0
        } else {
            0.0
        };
        let filled = ((percent / 100.0) * BAR_WIDTH as f64).round() as usize;
        let filled = filled.min(BAR_WIDTH);
        let bar = "█".repeat(filled) + &"░".repeat(BAR_WIDTH - filled);

        Self {
            used,
            total,
            percent,
            bar,
            percent_display: format!("{percent:.1}%"),
            load_display: format!("{used:.1} / {total:.1}"),
        }
    }
}

/// One active target's row in the activity table.
pub struct TargetRow {
    pub target: String,
    /// Per-kind unit counts, e.g. `h:67 g:12`.
    pub activity: String,
    /// Degradation above floor as `+x.x`, or `OK` at the floor.
    pub degradation: String,
    /// Resource level as a percentage of the ceiling.
    pub resource: String,
    pub total_units: u32,
}

/// Build table rows from a report, sorted descending by running units.
pub fn target_rows(report: &TickReport) -> Vec<TargetRow> {
    let mut rows: Vec<TargetRow> = report
        .snapshot
        .iter()
        .map(|(target, counts)| {
            let mut activity = Vec::new();
            if counts.harvest > 0 {
                activity.push(format!("h:{}", counts.harvest));
            }
            if counts.grow > 0 {
                activity.push(format!("g:{}", counts.grow));
            }
            if counts.degrade > 0 {
                activity.push(format!("d:{}", counts.degrade));
            }

            let (degradation, resource) = match report.target_metrics.get(target) {
                Some(m) => {
                    let delta = m.degradation_delta();
                    let degradation = if delta > 0.0 {
                        format!("+{delta:.1}")
                    } else {
                        "OK".to_string()
                    };
                    let resource = format!("{:.0}%", m.resource_fraction() * 100.0);
                    (degradation, resource)
                }
                None => ("-".to_string(), "-".to_string()),
            };

            TargetRow {
                target: target.to_string(),
                activity: activity.join(" "),
                degradation,
                resource,
                total_units: counts.total(),
            }
        })
        .collect();

    rows.sort_by(|a, b| b.total_units.cmp(&a.total_units));
    rows
}

/// Render a full tick report as terminal text.
pub fn render(report: &TickReport) -> String {
    let bar = CapacityBar::new(report.total_used, report.total_capacity);
    let mut out = String::new();

    out.push_str(&format!(" SIPHON  [{}] {}\n", bar.bar, bar.percent_display));
    out.push_str(&format!(" LOAD:   {}\n", bar.load_display));
    out.push_str(&"━".repeat(TABLE_WIDTH));
    out.push('\n');
    out.push_str(&format!(
        " {:<15} | {:<15} | {:<8} | {:<8}\n",
        "TARGET", "ACTIVITY", "DEGR", "RES"
    ));
    out.push_str(&"─".repeat(TABLE_WIDTH));
    out.push('\n');

    let rows = target_rows(report);
    if rows.is_empty() {
        out.push_str(" idle: waiting for in-flight work\n");
        return out;
    }

    for row in rows {
        out.push_str(&format!(
            " {:<15} | {:<15} | {:<8} | {:<8}\n",
            row.target, row.activity, row.degradation, row.resource
        ));
    }
    out
}

/// Dashboard that prints each report to stdout.
pub struct ConsoleDashboard;

impl Dashboard for ConsoleDashboard {
    fn publish(&self, report: &TickReport) {
        print!("{}", render(report));
    }
}
