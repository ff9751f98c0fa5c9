//! Leverage-tiered exposure targets.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{ExposureConfig, ExposureTier};
use crate::domain::{AnnotatedTable, Lineup, PlayerId};

/// Desired fraction of portfolio lineups containing a player
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExposureTarget {
    pub player: PlayerId,
    pub leverage: f64,
    pub target: f64,
}

/// Maps leverage to a target exposure; monotone non-decreasing in leverage
#[derive(Debug, Clone)]
pub struct ExposureTiers {
    /// Highest threshold first
    tiers: Vec<ExposureTier>,
    base_target: f64,
    scarce_positions: Vec<String>,
    scarce_bonus: f64,
    max_target: f64,
}

impl ExposureTiers {
    pub fn new(config: &ExposureConfig) -> Self {
        let mut tiers = config.tiers.clone();
        tiers.sort_by(|a, b| b.min_leverage.total_cmp(&a.min_leverage));
        Self {
            tiers,
            base_target: config.base_target,
            scarce_positions: config.scarce_positions.clone(),
            scarce_bonus: config.scarce_bonus,
            max_target: config.max_target.min(1.0),
        }
    }

    /// Target for a player with `leverage` whose primary position is `position`
    pub fn target(&self, leverage: f64, position: &str) -> f64 {
        let mut target = self
            .tiers
            .iter()
            .find(|tier| leverage >= tier.min_leverage)
            .map(|tier| tier.target)
            .unwrap_or(self.base_target);
        if leverage > 0.0 && self.scarce_positions.iter().any(|p| p == position) {
            target += self.scarce_bonus;
        }
        target.clamp(0.0, self.max_target)
    }

    /// Targets for "core" players: those in at least `core_share` of the pool
    pub fn assign(&self, annotated: &AnnotatedTable, pool: &[Lineup], core_share: f64) -> Vec<ExposureTarget> {
        if pool.is_empty() {
            return Vec::new();
        }
        let mut appearances = vec![0usize; annotated.len()];
        for lineup in pool {
            for id in lineup.occupants() {
                appearances[*id] += 1;
            }
        }

        let targets: Vec<ExposureTarget> = annotated
            .iter()
            .filter(|(p, _)| appearances[p.id] as f64 / pool.len() as f64 >= core_share && appearances[p.id] > 0)
            .map(|(p, m)| ExposureTarget {
                player: p.id,
                leverage: m.leverage,
                target: self.target(m.leverage, p.primary_position()),
            })
            .collect();

        debug!(core_players = targets.len(), pool = pool.len(), "exposure targets assigned");
        targets
    }
}
