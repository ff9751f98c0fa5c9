use serde::{Deserialize, Serialize};
use std::fmt;

use super::lineup::Lineup;
use super::player::PlayerId;

/// How an archetype ranks its candidate lineups
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringPreference {
    /// Highest strategy score
    MaxScore,
    /// Highest simulated ceiling
    MaxCeiling,
    /// Highest aggregate leverage
    MaxLeverage,
    /// Lowest mean ownership
    MinOwnership,
    /// Highest mean ownership (chalk insurance)
    MaxOwnership,
    /// Highest score among stack patterns not already in the portfolio
    AlternateStack,
}

impl ScoringPreference {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScoringPreference::MaxScore => "max_score",
            ScoringPreference::MaxCeiling => "max_ceiling",
            ScoringPreference::MaxLeverage => "max_leverage",
            ScoringPreference::MinOwnership => "min_ownership",
            ScoringPreference::MaxOwnership => "max_ownership",
            ScoringPreference::AlternateStack => "alternate_stack",
        }
    }

    /// Ranking key, higher is better
    pub fn key(&self, lineup: &Lineup) -> f64 {
        match self {
            ScoringPreference::MaxScore | ScoringPreference::AlternateStack => lineup.score(),
            ScoringPreference::MaxCeiling => lineup.ceiling(),
            ScoringPreference::MaxLeverage => lineup.leverage(),
            ScoringPreference::MinOwnership => -lineup.mean_ownership(),
            ScoringPreference::MaxOwnership => lineup.mean_ownership(),
        }
    }

    /// Rough position on a contrarian (0.0) to chalk (1.0) axis
    pub fn chalkiness(&self) -> f64 {
        match self {
            ScoringPreference::MaxLeverage | ScoringPreference::MinOwnership => 0.0,
            ScoringPreference::MaxCeiling => 0.25,
            ScoringPreference::MaxScore | ScoringPreference::AlternateStack => 0.5,
            ScoringPreference::MaxOwnership => 1.0,
        }
    }
}

impl fmt::Display for ScoringPreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Named risk profile governing part of the portfolio
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Archetype {
    pub name: String,
    /// Number of portfolio lineups following this profile
    pub allocation: usize,
    pub preference: ScoringPreference,
    /// Allowed mean lineup ownership, as fractions
    #[serde(default)]
    pub ownership_band: Option<(f64, f64)>,
    /// Allowed count of chalk players per lineup
    #[serde(default)]
    pub chalk_count: Option<(usize, usize)>,
    /// Allowed count of contrarian players per lineup
    #[serde(default)]
    pub contrarian_count: Option<(usize, usize)>,
}

impl Archetype {
    pub fn new(name: &str, allocation: usize, preference: ScoringPreference) -> Self {
        Self {
            name: name.to_string(),
            allocation,
            preference,
            ownership_band: None,
            chalk_count: None,
            contrarian_count: None,
        }
    }

    pub fn with_ownership_band(mut self, low: f64, high: f64) -> Self {
        self.ownership_band = Some((low, high));
        self
    }

    pub fn with_chalk_count(mut self, min: usize, max: usize) -> Self {
        self.chalk_count = Some((min, max));
        self
    }

    pub fn with_contrarian_count(mut self, min: usize, max: usize) -> Self {
        self.contrarian_count = Some((min, max));
        self
    }

    /// Midpoint of the ownership band, or the preference's chalkiness scaled
    /// onto a typical ownership range when no band is set
    pub fn ownership_anchor(&self) -> f64 {
        match self.ownership_band {
            Some((lo, hi)) => (lo + hi) / 2.0,
            None => 0.05 + self.preference.chalkiness() * 0.20,
        }
    }

    /// Tournament portfolio of five: one max-leverage, two balanced,
    /// one correlation hedge, one chalk insurance
    pub fn default_set() -> Vec<Archetype> {
        vec![
            Archetype::new("max_leverage", 1, ScoringPreference::MaxLeverage)
                .with_ownership_band(0.0, 0.12)
                .with_contrarian_count(3, 9),
            Archetype::new("balanced_leverage", 2, ScoringPreference::MaxScore)
                .with_ownership_band(0.06, 0.20)
                .with_chalk_count(1, 3),
            Archetype::new("correlation_hedge", 1, ScoringPreference::AlternateStack),
            Archetype::new("chalk_insurance", 1, ScoringPreference::MaxOwnership)
                .with_ownership_band(0.15, 1.0)
                .with_chalk_count(2, 9),
        ]
    }
}

/// One selected lineup with traceability back to its archetype ranking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioEntry {
    pub lineup: Lineup,
    pub archetype: String,
    /// 1-based rank within the archetype's candidate ordering
    pub rank: usize,
    /// Donor archetype when this slot was back-filled from another archetype's candidates
    pub backfilled_from: Option<String>,
}

/// Realized exposure of one player
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerExposure {
    pub player: PlayerId,
    pub name: String,
    pub count: usize,
    pub realized: f64,
    pub target: Option<f64>,
}

impl PlayerExposure {
    pub fn deviation(&self) -> Option<f64> {
        self.target.map(|t| self.realized - t)
    }
}

/// A targeted player whose realized exposure missed by more than the tolerance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExposureException {
    pub player: PlayerId,
    pub name: String,
    pub target: f64,
    pub realized: f64,
    pub tolerance: f64,
}

/// Final, read-only portfolio
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Portfolio {
    entries: Vec<PortfolioEntry>,
    exposures: Vec<PlayerExposure>,
    exceptions: Vec<ExposureException>,
    tolerance: f64,
}

impl Portfolio {
    pub(crate) fn new(
        entries: Vec<PortfolioEntry>,
        exposures: Vec<PlayerExposure>,
        exceptions: Vec<ExposureException>,
        tolerance: f64,
    ) -> Self {
        Self {
            entries,
            exposures,
            exceptions,
            tolerance,
        }
    }

    pub fn entries(&self) -> &[PortfolioEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Exposure for every player in the portfolio or with a target
    pub fn exposures(&self) -> &[PlayerExposure] {
        &self.exposures
    }

    pub fn exposure(&self, player: PlayerId) -> Option<&PlayerExposure> {
        self.exposures.iter().find(|e| e.player == player)
    }

    pub fn exceptions(&self) -> &[ExposureException] {
        &self.exceptions
    }

    /// Exposure tolerance the exceptions were judged against
    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    pub fn lineups(&self) -> impl Iterator<Item = &Lineup> {
        self.entries.iter().map(|e| &e.lineup)
    }
}
