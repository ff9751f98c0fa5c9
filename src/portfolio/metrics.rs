//! Portfolio summary metrics and export rows.

use serde::Serialize;

use crate::domain::{AnnotatedTable, Portfolio, RosterSchema};

/// Aggregate view of a finished portfolio
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortfolioMetrics {
    pub lineups: usize,
    pub mean_projection: f64,
    pub mean_ceiling: f64,
    pub mean_ownership: f64,
    pub mean_leverage: f64,
    /// 1 - mean pairwise overlap / roster size; 1.0 means no shared players
    pub uniqueness: f64,
    /// Lineup count per archetype, in portfolio order
    pub archetypes: Vec<(String, usize)>,
}

impl PortfolioMetrics {
    pub fn from_portfolio(portfolio: &Portfolio, roster_size: usize) -> Self {
        let n = portfolio.len();
        if n == 0 {
            return Self {
                lineups: 0,
                mean_projection: 0.0,
                mean_ceiling: 0.0,
                mean_ownership: 0.0,
                mean_leverage: 0.0,
                uniqueness: 1.0,
                archetypes: Vec::new(),
            };
        }

        let mean = |f: fn(&crate::domain::Lineup) -> f64| portfolio.lineups().map(f).sum::<f64>() / n as f64;

        let lineups: Vec<_> = portfolio.lineups().collect();
        let mut overlap = 0usize;
        let mut pairs = 0usize;
        for (i, a) in lineups.iter().enumerate() {
            for b in &lineups[i + 1..] {
                overlap += a.overlap(b);
                pairs += 1;
            }
        }
        let uniqueness = if pairs == 0 || roster_size == 0 {
            1.0
        } else {
            1.0 - overlap as f64 / pairs as f64 / roster_size as f64
        };

        let mut archetypes: Vec<(String, usize)> = Vec::new();
        for entry in portfolio.entries() {
            match archetypes.iter_mut().find(|(name, _)| *name == entry.archetype) {
                Some((_, count)) => *count += 1,
                None => archetypes.push((entry.archetype.clone(), 1)),
            }
        }

        Self {
            lineups: n,
            mean_projection: mean(|l| l.projection()),
            mean_ceiling: mean(|l| l.ceiling()),
            mean_ownership: mean(|l| l.mean_ownership()),
            mean_leverage: mean(|l| l.leverage()),
            uniqueness,
            archetypes,
        }
    }
}

/// One occupant of an exported lineup
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportSlot {
    pub slot: String,
    /// "CPT" / "FLEX" in multiplier contests, otherwise the slot name
    pub role: String,
    pub player: String,
    pub team: String,
    pub salary: u32,
    pub projection: f64,
    pub ownership: f64,
    pub leverage: f64,
}

/// One lineup per row, occupants in schema slot order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportRow {
    pub index: usize,
    pub archetype: String,
    pub rank: usize,
    pub slots: Vec<ExportSlot>,
    pub salary: u32,
    pub projection: f64,
    pub ownership: f64,
    pub leverage: f64,
    pub stack: String,
}

pub fn export_rows(portfolio: &Portfolio, annotated: &AnnotatedTable, schema: &RosterSchema) -> Vec<ExportRow> {
    portfolio
        .entries()
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            let lineup = &entry.lineup;
            let slots = lineup
                .occupants()
                .iter()
                .enumerate()
                .map(|(slot, id)| {
                    let player = annotated.player(*id);
                    let mult = schema.score_multiplier(slot);
                    let role = if schema.is_multiplier_slot(slot) {
                        "CPT".to_string()
                    } else if schema.multiplier.is_some() {
                        "FLEX".to_string()
                    } else {
                        schema.slots[slot].name.clone()
                    };
                    ExportSlot {
                        slot: schema.slots[slot].name.clone(),
                        role,
                        player: player.name.clone(),
                        team: player.team.clone(),
                        salary: schema.slot_salary(slot, player),
                        projection: player.projection * mult,
                        ownership: player.ownership,
                        leverage: annotated.metrics(*id).leverage,
                    }
                })
                .collect();
            ExportRow {
                index: index + 1,
                archetype: entry.archetype.clone(),
                rank: entry.rank,
                slots,
                salary: lineup.salary(),
                projection: lineup.projection(),
                ownership: lineup.ownership(),
                leverage: lineup.leverage(),
                stack: lineup.stack().pattern.clone(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StrategyProfile;
    use crate::domain::{Player, PlayerMetrics, PlayerTable, PortfolioEntry, StackRules};
    use crate::lineup::LineupScorer;
    use std::sync::Arc;

    fn showdown() -> (AnnotatedTable, RosterSchema) {
        let players: Vec<Player> = (0..8)
            .map(|i| Player {
                id: 0,
                name: format!("P{i}"),
                positions: vec!["WR".into()],
                team: if i % 2 == 0 { "KC".into() } else { "BUF".into() },
                opponent: None,
                game: "BUF@KC".into(),
                salary: 4000 + 500 * i,
                projection: 10.0 + i as f64,
                std_dev: 3.0,
                ownership: 0.1,
            })
            .collect();
        let table = PlayerTable::from_players(players).unwrap();
        let metrics = table
            .players()
            .iter()
            .map(|p| PlayerMetrics {
                leverage: 0.02,
                ceiling: p.projection * 1.4,
                ..PlayerMetrics::default()
            })
            .collect();
        let annotated = AnnotatedTable::new(Arc::new(table), metrics).unwrap();
        (annotated, RosterSchema::captain_mode(StackRules::default()))
    }

    fn portfolio(annotated: &AnnotatedTable, schema: &RosterSchema, lineups: &[Vec<usize>]) -> Portfolio {
        let strategy = StrategyProfile::default();
        let scorer = LineupScorer::new(annotated, schema, &strategy);
        let entries = lineups
            .iter()
            .enumerate()
            .map(|(i, occupants)| PortfolioEntry {
                lineup: scorer.assemble(occupants.clone()),
                archetype: if i == 0 { "core".into() } else { "hedge".into() },
                rank: i + 1,
                backfilled_from: None,
            })
            .collect();
        Portfolio::new(entries, Vec::new(), Vec::new(), 0.2)
    }

    #[test]
    fn test_export_roles_follow_slot_order() {
        let (annotated, schema) = showdown();
        let portfolio = portfolio(&annotated, &schema, &[vec![7, 0, 1, 2, 3, 4]]);
        let rows = export_rows(&portfolio, &annotated, &schema);
        assert_eq!(rows.len(), 1);

        let roles: Vec<_> = rows[0].slots.iter().map(|s| s.role.as_str()).collect();
        assert_eq!(roles, ["CPT", "FLEX", "FLEX", "FLEX", "FLEX", "FLEX"]);
        assert_eq!(rows[0].slots[0].player, "P7");
        // 1.5x captain salary and points
        assert_eq!(rows[0].slots[0].salary, 11_250);
        assert!((rows[0].slots[0].projection - 25.5).abs() < 1e-9);
        let total: u32 = rows[0].slots.iter().map(|s| s.salary).sum();
        assert_eq!(total, rows[0].salary);
    }

    #[test]
    fn test_uniqueness_and_archetype_counts() {
        let (annotated, schema) = showdown();
        let portfolio = portfolio(
            &annotated,
            &schema,
            &[vec![0, 1, 2, 3, 4, 5], vec![6, 1, 2, 3, 4, 7], vec![5, 0, 1, 2, 3, 4]],
        );
        let metrics = PortfolioMetrics::from_portfolio(&portfolio, schema.len());
        assert_eq!(metrics.lineups, 3);
        assert_eq!(metrics.archetypes, vec![("core".to_string(), 1), ("hedge".to_string(), 2)]);

        // overlaps: 4, 6, 4 over three pairs of six-slot rosters
        let expected = 1.0 - (14.0 / 3.0) / 6.0;
        assert!((metrics.uniqueness - expected).abs() < 1e-9);
        assert!((metrics.mean_leverage - 6.0 * 0.02).abs() < 1e-9);
    }

    #[test]
    fn test_empty_portfolio_metrics() {
        let portfolio = Portfolio::new(Vec::new(), Vec::new(), Vec::new(), 0.2);
        let metrics = PortfolioMetrics::from_portfolio(&portfolio, 9);
        assert_eq!(metrics.lineups, 0);
        assert_eq!(metrics.uniqueness, 1.0);
    }
}
