//! Per-player score distributions.
//!
//! The engine draws one correlated standard-normal shock per player per draw
//! and hands it to a [`ScoreDistribution`], so swapping the family never
//! touches the correlation model.

use crate::config::DistributionKind;

/// Maps a standard-normal shock to a fantasy score
pub trait ScoreDistribution: Send + Sync {
    fn score(&self, mean: f64, std_dev: f64, shock: f64) -> f64;

    fn name(&self) -> &'static str;
}

/// Symmetric Gaussian around the projection
#[derive(Debug, Clone, Copy, Default)]
pub struct NormalScores;

impl ScoreDistribution for NormalScores {
    fn score(&self, mean: f64, std_dev: f64, shock: f64) -> f64 {
        mean + std_dev * shock
    }

    fn name(&self) -> &'static str {
        "normal"
    }
}

/// Right-skewed scores with the same mean and std dev as the projection.
///
/// Falls back to the Gaussian when the mean is not positive, since a
/// log-normal cannot represent it.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNormalScores;

impl ScoreDistribution for LogNormalScores {
    fn score(&self, mean: f64, std_dev: f64, shock: f64) -> f64 {
        if mean <= 0.0 || std_dev <= 0.0 {
            return mean + std_dev * shock;
        }
        let sigma2 = (1.0 + (std_dev * std_dev) / (mean * mean)).ln();
        let mu = mean.ln() - sigma2 / 2.0;
        (mu + sigma2.sqrt() * shock).exp()
    }

    fn name(&self) -> &'static str {
        "log_normal"
    }
}

pub fn for_kind(kind: DistributionKind) -> Box<dyn ScoreDistribution> {
    match kind {
        DistributionKind::Normal => Box::new(NormalScores),
        DistributionKind::LogNormal => Box::new(LogNormalScores),
    }
}
