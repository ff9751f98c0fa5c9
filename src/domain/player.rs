//! Player table: the immutable per-run input of the optimizer.
//!
//! Raw rows arrive as [`PlayerRecord`]s with optional fields. All default
//! policies (missing std dev, ownership scale, non-positive projections) live
//! in [`DataPolicy`] and are applied exactly once, in
//! [`PlayerTable::from_records`]. Scoring code never re-derives defaults.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{DataError, Result};

/// Index of a player inside its [`PlayerTable`]
pub type PlayerId = usize;

/// How the ownership column is expressed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OwnershipScale {
    /// Values are already fractions in [0, 1]
    Fraction,
    /// Values are percentages in [0, 100]
    Percent,
    /// Percent if any value exceeds 1.0, fraction otherwise
    #[default]
    Auto,
}

/// Explicit default policies for player table construction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataPolicy {
    #[serde(default)]
    pub ownership_scale: OwnershipScale,
    /// Missing std dev = this fraction of the projection
    #[serde(default = "default_std_dev_fraction")]
    pub default_std_dev_fraction: f64,
    /// Drop rows whose projection is <= 0 instead of keeping them
    #[serde(default = "default_true")]
    pub drop_non_positive_projection: bool,
}

fn default_std_dev_fraction() -> f64 {
    0.25
}

fn default_true() -> bool {
    true
}

impl Default for DataPolicy {
    fn default() -> Self {
        Self {
            ownership_scale: OwnershipScale::Auto,
            default_std_dev_fraction: default_std_dev_fraction(),
            drop_non_positive_projection: true,
        }
    }
}

/// One raw row from the ingestion collaborator
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlayerRecord {
    pub name: Option<String>,
    /// Slash-separated eligible positions, e.g. "PG/SG"
    pub position: Option<String>,
    pub team: Option<String>,
    #[serde(default)]
    pub opponent: Option<String>,
    /// Game-group id; derived from team/opponent when absent
    #[serde(default)]
    pub game: Option<String>,
    pub salary: Option<i64>,
    pub projection: Option<f64>,
    #[serde(default)]
    pub std_dev: Option<f64>,
    pub ownership: Option<f64>,
}

/// A validated player
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub positions: Vec<String>,
    pub team: String,
    pub opponent: Option<String>,
    pub game: String,
    pub salary: u32,
    pub projection: f64,
    pub std_dev: f64,
    /// Field ownership fraction in [0, 1]
    pub ownership: f64,
}

impl Player {
    /// Points per 1000 salary
    pub fn value(&self) -> f64 {
        self.projection / (self.salary as f64 / 1000.0)
    }

    /// First listed position, used for grouping
    pub fn primary_position(&self) -> &str {
        self.positions.first().map(String::as_str).unwrap_or("")
    }

    pub fn has_position(&self, position: &str) -> bool {
        self.positions.iter().any(|p| p == position)
    }

    /// True when this player and `other` play in the same game on opposite sides
    pub fn is_opponent_of(&self, other: &Player) -> bool {
        self.game == other.game && self.team != other.team
    }
}

/// Immutable, validated player table
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlayerTable {
    players: Vec<Player>,
}

impl PlayerTable {
    /// Validate raw rows and apply the default policies.
    ///
    /// Fails on the first malformed row; no partial table is returned.
    pub fn from_records(records: Vec<PlayerRecord>, policy: &DataPolicy) -> Result<Self> {
        let ownership_divisor = match policy.ownership_scale {
            OwnershipScale::Fraction => 1.0,
            OwnershipScale::Percent => 100.0,
            OwnershipScale::Auto => {
                let any_percent = records
                    .iter()
                    .filter_map(|r| r.ownership)
                    .any(|o| o > 1.0);
                if any_percent {
                    100.0
                } else {
                    1.0
                }
            }
        };

        let mut players = Vec::with_capacity(records.len());
        let mut seen: HashSet<(String, String)> = HashSet::new();

        for (row, record) in records.into_iter().enumerate() {
            let name = required(record.name, row, "name")?;
            let position = required(record.position, row, "position")?;
            let team = required(record.team, row, "team")?;
            let salary = required(record.salary, row, "salary")?;
            let projection = required(record.projection, row, "projection")?;
            let ownership = required(record.ownership, row, "ownership")?;

            if salary <= 0 || salary > u32::MAX as i64 {
                return Err(DataError::InvalidSalary { name, salary }.into());
            }
            if !projection.is_finite() {
                return Err(DataError::NonFiniteProjection { name }.into());
            }
            if projection <= 0.0 && policy.drop_non_positive_projection {
                warn!(row, %name, projection, "dropping non-positive projection");
                continue;
            }

            let ownership = ownership / ownership_divisor;
            if !(0.0..=1.0).contains(&ownership) || !ownership.is_finite() {
                return Err(DataError::OwnershipOutOfRange { name, ownership }.into());
            }

            let std_dev = match record.std_dev {
                Some(sd) if sd.is_finite() && sd < 0.0 => {
                    warn!(%name, std_dev = sd, "negative std dev clamped to 0");
                    0.0
                }
                Some(sd) if sd.is_finite() => sd,
                _ => (projection * policy.default_std_dev_fraction).max(0.0),
            };

            let (game, opponent) = resolve_game(&name, &team, record.opponent, record.game)?;

            let positions: Vec<String> = position
                .split('/')
                .map(|p| p.trim().to_uppercase())
                .filter(|p| !p.is_empty())
                .collect();
            if positions.is_empty() {
                return Err(DataError::MissingField {
                    row,
                    field: "position".to_string(),
                }
                .into());
            }

            if !seen.insert((name.clone(), team.clone())) {
                return Err(DataError::DuplicatePlayer { name, team }.into());
            }

            players.push(Player {
                id: players.len(),
                name,
                positions,
                team,
                opponent,
                game,
                salary: salary as u32,
                projection,
                std_dev,
                ownership,
            });
        }

        if players.is_empty() {
            return Err(DataError::EmptyTable.into());
        }

        Ok(Self { players })
    }

    /// Build directly from validated players, renumbering ids by position
    pub fn from_players(mut players: Vec<Player>) -> Result<Self> {
        if players.is_empty() {
            return Err(DataError::EmptyTable.into());
        }
        for (idx, p) in players.iter_mut().enumerate() {
            p.id = idx;
        }
        Ok(Self { players })
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn get(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(id)
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}

impl std::ops::Index<PlayerId> for PlayerTable {
    type Output = Player;

    fn index(&self, id: PlayerId) -> &Player {
        &self.players[id]
    }
}

fn required<T>(value: Option<T>, row: usize, field: &str) -> std::result::Result<T, DataError> {
    value.ok_or_else(|| DataError::MissingField {
        row,
        field: field.to_string(),
    })
}

/// Resolve (game id, opponent) from whatever the row provides.
///
/// A game string like "KC@BUF" yields the opponent; a team/opponent pair
/// yields a sorted game id so both sides land in the same group.
fn resolve_game(
    name: &str,
    team: &str,
    opponent: Option<String>,
    game: Option<String>,
) -> std::result::Result<(String, Option<String>), DataError> {
    let opponent = opponent.filter(|o| !o.trim().is_empty());
    let game = game.filter(|g| !g.trim().is_empty());

    match (game, opponent) {
        (Some(game), Some(opp)) => Ok((game.trim().to_string(), Some(opp))),
        (Some(game), None) => {
            let opp = opponent_from_game(&game, team);
            Ok((game.trim().to_string(), opp))
        }
        (None, Some(opp)) => {
            let mut sides = [team.to_string(), opp.clone()];
            sides.sort();
            Ok((format!("{}@{}", sides[0], sides[1]), Some(opp)))
        }
        (None, None) => Err(DataError::MissingGameGroup {
            name: name.to_string(),
        }),
    }
}

fn opponent_from_game(game: &str, team: &str) -> Option<String> {
    // Game strings often carry a kickoff time after the matchup ("KC@BUF 01:00PM")
    let matchup = game.split_whitespace().next()?;
    let sides: Vec<&str> = matchup.split(['@', '-']).collect();
    if sides.len() != 2 || !sides.contains(&team) {
        return None;
    }
    sides
        .into_iter()
        .find(|side| *side != team)
        .map(str::to_string)
}
