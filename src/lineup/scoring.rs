//! Stack detection and strategy scoring for assembled lineups.

use std::collections::BTreeMap;

use crate::config::{OwnershipAggregation, StrategyProfile};
use crate::domain::{
    AnnotatedTable, GameStack, Lineup, LineupParts, PlayerId, PlayerTable, PrimaryStack,
    RosterSchema, StackDescriptor, StackRating, StackRules,
};

/// Find the correlated groups in a set of occupants and price them
pub fn describe_stack(occupants: &[PlayerId], table: &PlayerTable, rules: &StackRules) -> StackDescriptor {
    let games = game_stacks(occupants, table);
    let primary = primary_stack(occupants, table, rules);
    let team_counts = team_counts(occupants, table);
    let anti_pairs = anti_pairs(occupants, table, rules);
    let bonus = price(primary.as_ref(), &team_counts, anti_pairs.len(), rules);

    let pattern = match &primary {
        Some(stack) => format!("primary_stack:{}", stack.team),
        None => {
            // BTreeMap iteration makes the tie-break alphabetical
            let top = team_counts
                .iter()
                .filter(|(_, count)| **count >= 2)
                .max_by(|a, b| a.1.cmp(b.1).then(b.0.cmp(a.0)));
            match top {
                Some((team, _)) => format!("team_stack:{team}"),
                None => "balanced".to_string(),
            }
        }
    };

    StackDescriptor {
        games,
        primary,
        anti_pairs,
        bonus,
        pattern,
        rating: StackRating::from_bonus(bonus),
    }
}

/// Stack bonus of `occupants` without building the descriptor
pub fn stack_bonus(occupants: &[PlayerId], table: &PlayerTable, rules: &StackRules) -> f64 {
    let primary = primary_stack(occupants, table, rules);
    let team_counts = team_counts(occupants, table);
    let anti = anti_pairs(occupants, table, rules).len();
    price(primary.as_ref(), &team_counts, anti, rules)
}

fn price(primary: Option<&PrimaryStack>, team_counts: &BTreeMap<&str, usize>, anti_pairs: usize, rules: &StackRules) -> f64 {
    let mut bonus = 0.0;
    if let Some(stack) = primary {
        bonus += rules.receiver_bonus * stack.receivers.len().min(rules.max_receivers) as f64;
        if !stack.bring_backs.is_empty() {
            bonus += rules.bring_back_bonus;
        }
    }
    bonus += team_counts
        .values()
        .map(|count| rules.team_stack_value(*count))
        .sum::<f64>();
    bonus - rules.anti_correlation_penalty * anti_pairs as f64
}

fn team_counts<'t>(occupants: &[PlayerId], table: &'t PlayerTable) -> BTreeMap<&'t str, usize> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for id in occupants {
        *counts.entry(table[*id].team.as_str()).or_default() += 1;
    }
    counts
}

fn anti_pairs(occupants: &[PlayerId], table: &PlayerTable, rules: &StackRules) -> Vec<(PlayerId, PlayerId)> {
    let mut pairs = Vec::new();
    for (i, a) in occupants.iter().enumerate() {
        for b in &occupants[i + 1..] {
            if rules.anti_correlated(&table[*a], &table[*b]) {
                pairs.push((*a, *b));
            }
        }
    }
    pairs
}

fn game_stacks(occupants: &[PlayerId], table: &PlayerTable) -> Vec<GameStack> {
    let mut stacks: Vec<GameStack> = Vec::new();
    for id in occupants {
        let player = &table[*id];
        match stacks.iter_mut().find(|g| g.game == player.game) {
            Some(stack) => {
                stack.players.push(*id);
                if !stack.teams.contains(&player.team) {
                    stack.teams.push(player.team.clone());
                }
            }
            None => stacks.push(GameStack {
                game: player.game.clone(),
                players: vec![*id],
                teams: vec![player.team.clone()],
            }),
        }
    }
    stacks.retain(|g| g.players.len() >= 2);
    stacks
}

/// The primary with the most same-team receivers, then the most bring-backs
fn primary_stack(occupants: &[PlayerId], table: &PlayerTable, rules: &StackRules) -> Option<PrimaryStack> {
    occupants
        .iter()
        .filter(|id| rules.is_primary(&table[**id]))
        .map(|primary| {
            let p = &table[*primary];
            let receivers: Vec<PlayerId> = occupants
                .iter()
                .filter(|id| *id != primary)
                .filter(|id| table[**id].team == p.team && rules.is_receiver(&table[**id]))
                .copied()
                .collect();
            let bring_backs: Vec<PlayerId> = occupants
                .iter()
                .filter(|id| table[**id].is_opponent_of(p) && rules.is_bring_back(&table[**id]))
                .copied()
                .collect();
            PrimaryStack {
                team: p.team.clone(),
                primary: *primary,
                receivers,
                bring_backs,
            }
        })
        .filter(|stack| !stack.receivers.is_empty())
        .fold(None, |best: Option<PrimaryStack>, stack| match best {
            Some(b)
                if (b.receivers.len(), b.bring_backs.len())
                    >= (stack.receivers.len(), stack.bring_backs.len()) =>
            {
                Some(b)
            }
            _ => Some(stack),
        })
}

/// Scores players and lineups under one strategy profile
pub struct LineupScorer<'a> {
    annotated: &'a AnnotatedTable,
    schema: &'a RosterSchema,
    strategy: &'a StrategyProfile,
}

impl<'a> LineupScorer<'a> {
    pub fn new(annotated: &'a AnnotatedTable, schema: &'a RosterSchema, strategy: &'a StrategyProfile) -> Self {
        Self {
            annotated,
            schema,
            strategy,
        }
    }

    /// Per-player desirability in points, used to bias slot sampling
    pub fn player_value(&self, id: PlayerId) -> f64 {
        let player = self.annotated.player(id);
        let metrics = self.annotated.metrics(id);
        let cw = self.strategy.ceiling_weight;
        (1.0 - cw) * player.projection + cw * metrics.ceiling + self.leverage_term(metrics.leverage)
    }

    /// Weighted change in stack bonus from adding each candidate to `chosen`
    pub fn stack_gains(&self, chosen: &[PlayerId], candidates: &[PlayerId]) -> Vec<f64> {
        let weight = self.strategy.correlation_weight;
        if weight == 0.0 {
            return vec![0.0; candidates.len()];
        }
        let table = self.annotated.table();
        let rules = &self.schema.stack_rules;
        let base = stack_bonus(chosen, table, rules);
        let mut with = chosen.to_vec();
        with.push(0);
        let last = with.len() - 1;
        candidates
            .iter()
            .map(|id| {
                with[last] = *id;
                weight * (stack_bonus(&with, table, rules) - base)
            })
            .collect()
    }

    /// Linear reward for leverage, plus a penalty for falling short of the target
    fn leverage_term(&self, leverage: f64) -> f64 {
        let s = self.strategy;
        let shortfall = (s.leverage_target - leverage).max(0.0);
        s.leverage_weight * (leverage - shortfall)
    }

    /// Strategy score from lineup aggregates.
    ///
    /// Base points (projection blended toward ceiling), minus a linear
    /// penalty for mean ownership outside the band, plus the leverage term
    /// and the weighted stack bonus.
    pub fn score(&self, projection: f64, ceiling: f64, mean_ownership: f64, mean_leverage: f64, stack_bonus: f64) -> f64 {
        let s = self.strategy;
        let base = (1.0 - s.ceiling_weight) * projection + s.ceiling_weight * ceiling;

        let (low, high) = s.ownership_band;
        let outside = if mean_ownership < low {
            low - mean_ownership
        } else if mean_ownership > high {
            mean_ownership - high
        } else {
            0.0
        };

        base - s.ownership_weight * outside + self.leverage_term(mean_leverage) + s.correlation_weight * stack_bonus
    }

    /// Build the immutable lineup for occupants given in slot order
    pub fn assemble(&self, occupants: Vec<PlayerId>) -> Lineup {
        let table = self.annotated.table();
        let mut salary = 0u32;
        let mut projection = 0.0;
        let mut ceiling = 0.0;
        let mut ownership_sum = 0.0;
        let mut ownership_product = 1.0;
        let mut leverage = 0.0;

        for (slot, id) in occupants.iter().enumerate() {
            let player = &table[*id];
            let metrics = self.annotated.metrics(*id);
            let mult = self.schema.score_multiplier(slot);
            salary += self.schema.slot_salary(slot, player);
            projection += player.projection * mult;
            ceiling += metrics.ceiling * mult;
            ownership_sum += player.ownership;
            ownership_product *= player.ownership;
            leverage += metrics.leverage;
        }

        let count = occupants.len().max(1) as f64;
        let mean_ownership = ownership_sum / count;
        let stack = describe_stack(&occupants, table, &self.schema.stack_rules);
        let score = self.score(projection, ceiling, mean_ownership, leverage / count, stack.bonus);
        let ownership = match self.strategy.ownership_aggregation {
            OwnershipAggregation::Sum => ownership_sum,
            OwnershipAggregation::Product => ownership_product,
        };

        Lineup::from_parts(LineupParts {
            occupants,
            salary,
            projection,
            ceiling,
            ownership,
            mean_ownership,
            leverage,
            stack,
            score,
        })
    }
}
