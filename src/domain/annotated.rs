use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::player::{Player, PlayerId, PlayerTable};
use crate::error::{Result, SlateError};

/// Simulation-derived annotations for one player
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerMetrics {
    /// Fraction of draws in which the player was flagged optimal, in [0, 1]
    pub optimal_rate: f64,
    /// optimal_rate - ownership
    pub leverage: f64,
    pub mean: f64,
    pub sim_std_dev: f64,
    /// 5th percentile
    pub floor: f64,
    pub p10: f64,
    pub median: f64,
    pub p90: f64,
    /// Configured upper percentile (p95 by default)
    pub ceiling: f64,
}

/// A player table snapshot plus its additive simulation annotations
#[derive(Debug, Clone)]
pub struct AnnotatedTable {
    table: Arc<PlayerTable>,
    metrics: Vec<PlayerMetrics>,
}

impl AnnotatedTable {
    pub fn new(table: Arc<PlayerTable>, metrics: Vec<PlayerMetrics>) -> Result<Self> {
        if table.len() != metrics.len() {
            return Err(SlateError::Internal(format!(
                "metrics length {} does not match player count {}",
                metrics.len(),
                table.len()
            )));
        }
        Ok(Self { table, metrics })
    }

    pub fn table(&self) -> &PlayerTable {
        &self.table
    }

    pub fn players(&self) -> &[Player] {
        self.table.players()
    }

    pub fn player(&self, id: PlayerId) -> &Player {
        &self.table[id]
    }

    pub fn metrics(&self, id: PlayerId) -> &PlayerMetrics {
        &self.metrics[id]
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Players paired with their metrics
    pub fn iter(&self) -> impl Iterator<Item = (&Player, &PlayerMetrics)> {
        self.table.players().iter().zip(self.metrics.iter())
    }
}
