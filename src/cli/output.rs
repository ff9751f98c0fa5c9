//! Output formatting for `slate` commands.
//!
//! Supports two modes: human-readable tables (default) and JSON (--json).

use serde::Serialize;
use tabled::{Table, Tabled};

use crate::domain::{AnnotatedTable, Lineup, PlayerExposure, Warning};
use crate::portfolio::ExportRow;
use crate::simulation::LineupOutcome;

/// Output mode for command results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Table,
    Json,
}

impl OutputMode {
    pub fn from_json_flag(json: bool) -> Self {
        if json {
            OutputMode::Json
        } else {
            OutputMode::Table
        }
    }
}

/// Print a vec of Tabled + Serialize items in the chosen mode.
pub fn print_items<T: Tabled + Serialize>(items: &[T], mode: OutputMode) -> anyhow::Result<()> {
    match mode {
        OutputMode::Table => {
            if items.is_empty() {
                println!("(no results)");
            } else {
                let table = Table::new(items).to_string();
                println!("{table}");
            }
        }
        OutputMode::Json => {
            let json = serde_json::to_string_pretty(items)?;
            println!("{json}");
        }
    }
    Ok(())
}

/// Print a single Serialize item as pretty JSON.
pub fn print_item<T: Serialize>(item: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(item)?);
    Ok(())
}

/// Warnings go to stderr so table output stays clean.
pub fn print_warnings(warnings: &[Warning]) {
    for w in warnings {
        eprintln!("warning: {w}");
    }
}

#[derive(Debug, Clone, Tabled, Serialize)]
pub struct PlayerRow {
    #[tabled(rename = "Player")]
    pub name: String,
    #[tabled(rename = "Pos")]
    pub position: String,
    #[tabled(rename = "Team")]
    pub team: String,
    #[tabled(rename = "Salary")]
    pub salary: u32,
    #[tabled(rename = "Proj")]
    pub projection: String,
    #[tabled(rename = "Own")]
    pub ownership: String,
    #[tabled(rename = "Optimal")]
    pub optimal_rate: String,
    #[tabled(rename = "Leverage")]
    pub leverage: String,
    #[tabled(rename = "Ceiling")]
    pub ceiling: String,
}

impl PlayerRow {
    /// Rows sorted by leverage, highest first
    pub fn from_annotated(annotated: &AnnotatedTable, limit: usize) -> Vec<Self> {
        let mut rows: Vec<_> = annotated.iter().collect();
        rows.sort_by(|a, b| b.1.leverage.total_cmp(&a.1.leverage).then(a.0.id.cmp(&b.0.id)));
        rows.into_iter()
            .take(limit)
            .map(|(p, m)| PlayerRow {
                name: p.name.clone(),
                position: p.positions.join("/"),
                team: p.team.clone(),
                salary: p.salary,
                projection: format!("{:.1}", p.projection),
                ownership: pct(p.ownership),
                optimal_rate: pct(m.optimal_rate),
                leverage: format!("{:+.1}%", m.leverage * 100.0),
                ceiling: format!("{:.1}", m.ceiling),
            })
            .collect()
    }
}

#[derive(Debug, Clone, Tabled, Serialize)]
pub struct LineupRow {
    #[tabled(rename = "#")]
    pub index: usize,
    #[tabled(rename = "Archetype")]
    pub archetype: String,
    #[tabled(rename = "Rank")]
    pub rank: usize,
    #[tabled(rename = "Salary")]
    pub salary: u32,
    #[tabled(rename = "Proj")]
    pub projection: String,
    #[tabled(rename = "Own")]
    pub ownership: String,
    #[tabled(rename = "Stack")]
    pub stack: String,
    #[tabled(rename = "Players")]
    pub players: String,
}

impl LineupRow {
    pub fn from_export(row: &ExportRow) -> Self {
        Self {
            index: row.index,
            archetype: row.archetype.clone(),
            rank: row.rank,
            salary: row.salary,
            projection: format!("{:.1}", row.projection),
            ownership: format!("{:.2}", row.ownership),
            stack: row.stack.clone(),
            players: row
                .slots
                .iter()
                .map(|s| format!("{}:{}", s.role, s.player))
                .collect::<Vec<_>>()
                .join(", "),
        }
    }

    /// Pool lineups carry no archetype; rank is pool position
    pub fn from_pool(index: usize, lineup: &Lineup, annotated: &AnnotatedTable) -> Self {
        Self {
            index: index + 1,
            archetype: "-".to_string(),
            rank: index + 1,
            salary: lineup.salary(),
            projection: format!("{:.1}", lineup.projection()),
            ownership: format!("{:.2}", lineup.ownership()),
            stack: format!("{} ({})", lineup.stack().pattern, lineup.stack().rating),
            players: lineup
                .occupants()
                .iter()
                .map(|id| annotated.player(*id).name.clone())
                .collect::<Vec<_>>()
                .join(", "),
        }
    }
}

#[derive(Debug, Clone, Tabled, Serialize)]
pub struct OutcomeRow {
    #[tabled(rename = "#")]
    pub index: usize,
    #[tabled(rename = "Mean")]
    pub mean: String,
    #[tabled(rename = "Floor")]
    pub floor: String,
    #[tabled(rename = "Ceiling")]
    pub ceiling: String,
    #[tabled(rename = "Top 1%")]
    pub top_1_percent: String,
    #[tabled(rename = "Win")]
    pub win_rate: String,
}

impl OutcomeRow {
    pub fn from_outcome(index: usize, outcome: &LineupOutcome) -> Self {
        Self {
            index: index + 1,
            mean: format!("{:.1}", outcome.mean),
            floor: format!("{:.1}", outcome.floor),
            ceiling: format!("{:.1}", outcome.ceiling),
            top_1_percent: format!("{:.1}", outcome.top_1_percent),
            win_rate: pct(outcome.win_rate),
        }
    }
}

#[derive(Debug, Clone, Tabled, Serialize)]
pub struct ExposureRow {
    #[tabled(rename = "Player")]
    pub name: String,
    #[tabled(rename = "Count")]
    pub count: usize,
    #[tabled(rename = "Exposure")]
    pub realized: String,
    #[tabled(rename = "Target")]
    pub target: String,
}

impl From<&PlayerExposure> for ExposureRow {
    fn from(e: &PlayerExposure) -> Self {
        Self {
            name: e.name.clone(),
            count: e.count,
            realized: pct(e.realized),
            target: e.target.map(pct).unwrap_or_else(|| "-".to_string()),
        }
    }
}

fn pct(x: f64) -> String {
    format!("{:.1}%", x * 100.0)
}
