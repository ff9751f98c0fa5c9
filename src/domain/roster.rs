//! Roster schemas: slot layout, salary cap, multiplier slot and the
//! correlation rules used to score stacks.

use serde::{Deserialize, Serialize};

use super::player::Player;
use crate::error::{Result, SlateError};

/// Position wildcard accepted by utility slots
pub const ANY_POSITION: &str = "*";

/// One named roster slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slot {
    pub name: String,
    /// Eligible positions; `"*"` accepts any player
    pub eligible: Vec<String>,
}

impl Slot {
    pub fn new(name: &str, eligible: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            eligible: eligible.iter().map(|p| p.to_string()).collect(),
        }
    }

    pub fn accepts(&self, player: &Player) -> bool {
        self.eligible
            .iter()
            .any(|e| e == ANY_POSITION || player.has_position(e))
    }

    /// A slot dedicated to exactly one position
    pub fn dedicated_position(&self) -> Option<&str> {
        match self.eligible.as_slice() {
            [only] if only != ANY_POSITION => Some(only.as_str()),
            _ => None,
        }
    }
}

/// Captain-style multiplier applied to one slot's occupant
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MultiplierRule {
    /// Index into `RosterSchema::slots`
    pub slot: usize,
    pub score_multiplier: f64,
    pub salary_multiplier: f64,
}

/// Correlation rules for stack scoring.
///
/// Roles are position names. A "primary" feeds its "receivers" on the same
/// team; a bring-back is a player from the opposing side of the primary's game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackRules {
    #[serde(default)]
    pub primary_positions: Vec<String>,
    #[serde(default)]
    pub receiver_positions: Vec<String>,
    #[serde(default)]
    pub bring_back_positions: Vec<String>,
    /// Same-team position pairs with negatively correlated outcomes
    #[serde(default)]
    pub anti_correlated: Vec<(String, String)>,
    #[serde(default = "default_receiver_bonus")]
    pub receiver_bonus: f64,
    /// Receivers beyond this count earn no extra bonus
    #[serde(default = "default_max_receivers")]
    pub max_receivers: usize,
    #[serde(default = "default_bring_back_bonus")]
    pub bring_back_bonus: f64,
    #[serde(default = "default_anti_penalty")]
    pub anti_correlation_penalty: f64,
    /// Team-stack bonus indexed by same-team count (used when no primary roles exist)
    #[serde(default)]
    pub team_stack_bonus: Vec<f64>,
    /// Penalty once a team stack exceeds the bonus table
    #[serde(default)]
    pub over_stack_penalty: f64,
}

fn default_receiver_bonus() -> f64 {
    3.0
}
fn default_max_receivers() -> usize {
    2
}
fn default_bring_back_bonus() -> f64 {
    2.0
}
fn default_anti_penalty() -> f64 {
    3.0
}

impl Default for StackRules {
    fn default() -> Self {
        Self {
            primary_positions: Vec::new(),
            receiver_positions: Vec::new(),
            bring_back_positions: Vec::new(),
            anti_correlated: Vec::new(),
            receiver_bonus: default_receiver_bonus(),
            max_receivers: default_max_receivers(),
            bring_back_bonus: default_bring_back_bonus(),
            anti_correlation_penalty: default_anti_penalty(),
            team_stack_bonus: Vec::new(),
            over_stack_penalty: 0.0,
        }
    }
}

impl StackRules {
    /// Football: QB feeds WR/TE, opposing skill players bring it back,
    /// a DST fights its own offense.
    pub fn football() -> Self {
        Self {
            primary_positions: vec!["QB".into()],
            receiver_positions: vec!["WR".into(), "TE".into()],
            bring_back_positions: vec!["WR".into(), "TE".into(), "RB".into()],
            anti_correlated: vec![
                ("DST".into(), "RB".into()),
                ("DST".into(), "QB".into()),
                ("DST".into(), "WR".into()),
                ("DST".into(), "TE".into()),
            ],
            ..Self::default()
        }
    }

    /// Basketball: no passer/receiver roles, reward 2-3 man team stacks
    pub fn basketball() -> Self {
        Self {
            team_stack_bonus: vec![0.0, 0.0, 1.0, 2.5],
            over_stack_penalty: 2.0,
            ..Self::default()
        }
    }

    pub fn is_primary(&self, player: &Player) -> bool {
        self.primary_positions.iter().any(|p| player.has_position(p))
    }

    pub fn is_receiver(&self, player: &Player) -> bool {
        self.receiver_positions.iter().any(|p| player.has_position(p))
    }

    pub fn is_bring_back(&self, player: &Player) -> bool {
        self.bring_back_positions.iter().any(|p| player.has_position(p))
    }

    /// Same team and an anti-correlated role pair in either order
    pub fn anti_correlated(&self, a: &Player, b: &Player) -> bool {
        a.team == b.team
            && self.anti_correlated.iter().any(|(x, y)| {
                (a.has_position(x) && b.has_position(y)) || (a.has_position(y) && b.has_position(x))
            })
    }

    /// Bonus for `count` players of the same team
    pub fn team_stack_value(&self, count: usize) -> f64 {
        if self.team_stack_bonus.is_empty() {
            return 0.0;
        }
        match self.team_stack_bonus.get(count) {
            Some(bonus) => *bonus,
            None => -self.over_stack_penalty,
        }
    }
}

/// Static contest definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RosterSchema {
    pub name: String,
    pub slots: Vec<Slot>,
    pub salary_cap: u32,
    #[serde(default)]
    pub multiplier: Option<MultiplierRule>,
    #[serde(default)]
    pub stack_rules: StackRules,
}

impl RosterSchema {
    /// Classic football: QB, RB x2, WR x3, TE, FLEX, DST
    pub fn football_classic() -> Self {
        Self {
            name: "football_classic".to_string(),
            slots: vec![
                Slot::new("QB", &["QB"]),
                Slot::new("RB1", &["RB"]),
                Slot::new("RB2", &["RB"]),
                Slot::new("WR1", &["WR"]),
                Slot::new("WR2", &["WR"]),
                Slot::new("WR3", &["WR"]),
                Slot::new("TE", &["TE"]),
                Slot::new("FLEX", &["RB", "WR", "TE"]),
                Slot::new("DST", &["DST"]),
            ],
            salary_cap: 50_000,
            multiplier: None,
            stack_rules: StackRules::football(),
        }
    }

    /// Classic basketball: PG, SG, SF, PF, C, G, F, UTIL
    pub fn basketball_classic() -> Self {
        Self {
            name: "basketball_classic".to_string(),
            slots: vec![
                Slot::new("PG", &["PG"]),
                Slot::new("SG", &["SG"]),
                Slot::new("SF", &["SF"]),
                Slot::new("PF", &["PF"]),
                Slot::new("C", &["C"]),
                Slot::new("G", &["PG", "SG"]),
                Slot::new("F", &["SF", "PF"]),
                Slot::new("UTIL", &[ANY_POSITION]),
            ],
            salary_cap: 50_000,
            multiplier: None,
            stack_rules: StackRules::basketball(),
        }
    }

    /// Single-game captain mode: CPT (1.5x points and salary) + 5 FLEX
    pub fn captain_mode(stack_rules: StackRules) -> Self {
        let mut slots = vec![Slot::new("CPT", &[ANY_POSITION])];
        for i in 1..=5 {
            slots.push(Slot::new(&format!("FLEX{i}"), &[ANY_POSITION]));
        }
        Self {
            name: "captain_mode".to_string(),
            slots,
            salary_cap: 50_000,
            multiplier: Some(MultiplierRule {
                slot: 0,
                score_multiplier: 1.5,
                salary_multiplier: 1.5,
            }),
            stack_rules,
        }
    }

    /// Look up a built-in schema by name
    pub fn preset(name: &str) -> Result<Self> {
        match name {
            "football_classic" | "nfl" => Ok(Self::football_classic()),
            "basketball_classic" | "nba" => Ok(Self::basketball_classic()),
            "captain_mode" | "showdown" => Ok(Self::captain_mode(StackRules::football())),
            other => Err(SlateError::invalid_config(format!(
                "unknown roster preset `{other}`"
            ))),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn is_multiplier_slot(&self, slot: usize) -> bool {
        self.multiplier.is_some_and(|m| m.slot == slot)
    }

    /// Salary charged for `player` in `slot`
    pub fn slot_salary(&self, slot: usize, player: &Player) -> u32 {
        match self.multiplier {
            Some(m) if m.slot == slot => (player.salary as f64 * m.salary_multiplier).round() as u32,
            _ => player.salary,
        }
    }

    /// Score multiplier applied to the occupant of `slot`
    pub fn score_multiplier(&self, slot: usize) -> f64 {
        match self.multiplier {
            Some(m) if m.slot == slot => m.score_multiplier,
            _ => 1.0,
        }
    }

    /// Number of dedicated slots per position, e.g. WR -> 3 in classic football
    pub fn position_demand(&self) -> Vec<(String, usize)> {
        let mut demand: Vec<(String, usize)> = Vec::new();
        for slot in &self.slots {
            if let Some(pos) = slot.dedicated_position() {
                match demand.iter_mut().find(|(p, _)| p == pos) {
                    Some((_, n)) => *n += 1,
                    None => demand.push((pos.to_string(), 1)),
                }
            }
        }
        demand
    }

    /// Structural checks; a zero cap or empty slot list is a configuration error
    pub fn validate(&self) -> Result<()> {
        if self.slots.is_empty() {
            return Err(SlateError::invalid_config(format!(
                "roster `{}` has no slots",
                self.name
            )));
        }
        if self.salary_cap == 0 {
            return Err(SlateError::invalid_config(format!(
                "roster `{}` salary cap must be positive",
                self.name
            )));
        }
        if let Some(slot) = self.slots.iter().find(|s| s.eligible.is_empty()) {
            return Err(SlateError::invalid_config(format!(
                "slot `{}` accepts no positions",
                slot.name
            )));
        }
        if let Some(m) = self.multiplier {
            if m.slot >= self.slots.len() {
                return Err(SlateError::invalid_config(format!(
                    "multiplier slot index {} out of range",
                    m.slot
                )));
            }
            if m.score_multiplier <= 0.0 || m.salary_multiplier <= 0.0 {
                return Err(SlateError::invalid_config(
                    "multipliers must be positive",
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player(pos: &[&str], team: &str, salary: u32) -> Player {
        Player {
            id: 0,
            name: "p".into(),
            positions: pos.iter().map(|p| p.to_string()).collect(),
            team: team.into(),
            opponent: None,
            game: "G1".into(),
            salary,
            projection: 10.0,
            std_dev: 2.0,
            ownership: 0.1,
        }
    }

    #[test]
    fn test_flex_slot_accepts_skill_positions() {
        let schema = RosterSchema::football_classic();
        let flex = &schema.slots[7];
        assert!(flex.accepts(&player(&["WR"], "KC", 5000)));
        assert!(!flex.accepts(&player(&["QB"], "KC", 5000)));
        assert!(!flex.accepts(&player(&["DST"], "KC", 3000)));
    }

    #[test]
    fn test_captain_salary_multiplied() {
        let schema = RosterSchema::captain_mode(StackRules::football());
        let p = player(&["QB"], "KC", 10_000);
        assert_eq!(schema.slot_salary(0, &p), 15_000);
        assert_eq!(schema.slot_salary(1, &p), 10_000);
        assert_eq!(schema.score_multiplier(0), 1.5);
    }

    #[test]
    fn test_position_demand() {
        let demand = RosterSchema::football_classic().position_demand();
        assert!(demand.contains(&("WR".to_string(), 3)));
        assert!(demand.contains(&("RB".to_string(), 2)));
        assert!(demand.contains(&("QB".to_string(), 1)));
    }

    #[test]
    fn test_anti_correlation_same_team_only() {
        let rules = StackRules::football();
        let dst = player(&["DST"], "KC", 3000);
        assert!(rules.anti_correlated(&dst, &player(&["RB"], "KC", 6000)));
        assert!(!rules.anti_correlated(&dst, &player(&["RB"], "BUF", 6000)));
    }

    #[test]
    fn test_team_stack_table() {
        let rules = StackRules::basketball();
        assert_eq!(rules.team_stack_value(1), 0.0);
        assert_eq!(rules.team_stack_value(3), 2.5);
        assert_eq!(rules.team_stack_value(5), -2.0);
    }

    #[test]
    fn test_zero_cap_invalid() {
        let mut schema = RosterSchema::basketball_classic();
        schema.salary_cap = 0;
        assert!(schema.validate().is_err());
    }
}
