use serde::{Deserialize, Serialize};
use std::fmt;

use super::player::PlayerId;

/// Qualitative stack strength derived from the stack bonus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StackRating {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl StackRating {
    pub fn from_bonus(bonus: f64) -> Self {
        if bonus > 5.0 {
            StackRating::Excellent
        } else if bonus > 2.0 {
            StackRating::Good
        } else if bonus > 0.0 {
            StackRating::Fair
        } else {
            StackRating::Poor
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StackRating::Excellent => "excellent",
            StackRating::Good => "good",
            StackRating::Fair => "fair",
            StackRating::Poor => "poor",
        }
    }
}

impl fmt::Display for StackRating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Players of one lineup that share a game group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameStack {
    pub game: String,
    pub players: Vec<PlayerId>,
    pub teams: Vec<String>,
}

/// Primary scorer plus the players feeding off (or answering) its output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrimaryStack {
    pub team: String,
    pub primary: PlayerId,
    pub receivers: Vec<PlayerId>,
    pub bring_backs: Vec<PlayerId>,
}

/// Which players of a lineup are correlated, and how much that is worth
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackDescriptor {
    /// Game groups with at least two occupants
    pub games: Vec<GameStack>,
    pub primary: Option<PrimaryStack>,
    /// Same-team anti-correlated pairs present
    pub anti_pairs: Vec<(PlayerId, PlayerId)>,
    pub bonus: f64,
    /// Coarse label used to tell stacking patterns apart
    pub pattern: String,
    pub rating: StackRating,
}

/// Deduplication key: occupant multiset, with the multiplier occupant kept apart
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LineupKey {
    pub anchor: Option<PlayerId>,
    pub members: Vec<PlayerId>,
}

/// A complete, valid roster. Immutable once assembled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lineup {
    occupants: Vec<PlayerId>,
    salary: u32,
    projection: f64,
    ceiling: f64,
    ownership: f64,
    mean_ownership: f64,
    leverage: f64,
    stack: StackDescriptor,
    score: f64,
}

/// Aggregates computed while assembling a lineup
#[derive(Debug, Clone)]
pub(crate) struct LineupParts {
    pub occupants: Vec<PlayerId>,
    pub salary: u32,
    pub projection: f64,
    pub ceiling: f64,
    pub ownership: f64,
    pub mean_ownership: f64,
    pub leverage: f64,
    pub stack: StackDescriptor,
    pub score: f64,
}

impl Lineup {
    pub(crate) fn from_parts(parts: LineupParts) -> Self {
        Self {
            occupants: parts.occupants,
            salary: parts.salary,
            projection: parts.projection,
            ceiling: parts.ceiling,
            ownership: parts.ownership,
            mean_ownership: parts.mean_ownership,
            leverage: parts.leverage,
            stack: parts.stack,
            score: parts.score,
        }
    }

    /// Occupant per slot, in schema slot order
    pub fn occupants(&self) -> &[PlayerId] {
        &self.occupants
    }

    pub fn occupant(&self, slot: usize) -> Option<PlayerId> {
        self.occupants.get(slot).copied()
    }

    pub fn contains(&self, player: PlayerId) -> bool {
        self.occupants.contains(&player)
    }

    /// Total salary, multiplier-adjusted
    pub fn salary(&self) -> u32 {
        self.salary
    }

    /// Total projection, multiplier-adjusted
    pub fn projection(&self) -> f64 {
        self.projection
    }

    /// Sum of occupant simulated ceilings, multiplier-adjusted
    pub fn ceiling(&self) -> f64 {
        self.ceiling
    }

    /// Aggregate ownership as defined by the strategy (sum or product)
    pub fn ownership(&self) -> f64 {
        self.ownership
    }

    /// Average occupant ownership fraction
    pub fn mean_ownership(&self) -> f64 {
        self.mean_ownership
    }

    pub fn leverage(&self) -> f64 {
        self.leverage
    }

    pub fn stack(&self) -> &StackDescriptor {
        &self.stack
    }

    /// Strategy score
    pub fn score(&self) -> f64 {
        self.score
    }

    pub fn key(&self, multiplier_slot: Option<usize>) -> LineupKey {
        lineup_key(&self.occupants, multiplier_slot)
    }

    /// Number of players shared with `other`
    pub fn overlap(&self, other: &Lineup) -> usize {
        self.occupants
            .iter()
            .filter(|p| other.occupants.contains(p))
            .count()
    }
}

pub(crate) fn lineup_key(occupants: &[PlayerId], multiplier_slot: Option<usize>) -> LineupKey {
    let anchor = multiplier_slot.and_then(|s| occupants.get(s).copied());
    let mut members: Vec<PlayerId> = occupants
        .iter()
        .enumerate()
        .filter(|(slot, _)| Some(*slot) != multiplier_slot)
        .map(|(_, p)| *p)
        .collect();
    members.sort_unstable();
    LineupKey { anchor, members }
}
