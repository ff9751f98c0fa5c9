//! Randomized lineup construction.
//!
//! Each attempt fills slots most-constrained first, sampling players by a
//! softmax over their strategy value plus the stack bonus they add to the
//! players already chosen. A pick is kept only if the remaining slots can
//! still be filled with distinct players inside the remaining cap. A salary-floor (or cap) violation is fixed by
//! single-occupant swaps. Attempts run in parallel batches, each on its own
//! stream derived from the run seed and attempt index, and are merged in
//! attempt order so a seeded run is reproducible.

use std::collections::HashSet;
use std::time::Instant;

use rand::distributions::WeightedIndex;
use rand::prelude::*;
use rand::rngs::StdRng;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, warn};

use super::feasibility::{self, SlotPool};
use super::scoring::LineupScorer;
use crate::config::{GeneratorConfig, StrategyProfile};
use crate::domain::{
    lineup_key, AnnotatedTable, BelowTargetReason, Lineup, LineupKey, PlayerId, PlayerTable,
    RosterSchema, Warning,
};
use crate::error::{Result, SlateError};
use crate::simulation::stream_seed;

/// Deduplicated candidate pool, best strategy score first
#[derive(Debug, Clone, Serialize)]
pub struct LineupPool {
    lineups: Vec<Lineup>,
    requested: usize,
    attempts: usize,
    seed: u64,
    warnings: Vec<Warning>,
}

impl LineupPool {
    pub fn lineups(&self) -> &[Lineup] {
        &self.lineups
    }

    pub fn len(&self) -> usize {
        self.lineups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lineups.is_empty()
    }

    pub fn requested(&self) -> usize {
        self.requested
    }

    pub fn attempts(&self) -> usize {
        self.attempts
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }
}

enum Attempt {
    Built(Lineup),
    /// No affordable, unused candidate for this slot
    SlotFailed(usize),
    /// Salary floor unreachable by repair
    BelowFloor,
}

pub struct LineupGenerator {
    config: GeneratorConfig,
    strategy: StrategyProfile,
}

impl LineupGenerator {
    pub fn new(config: GeneratorConfig, strategy: StrategyProfile) -> Result<Self> {
        strategy.validate()?;
        if config.pool_size == 0 || config.batch_size == 0 || config.max_attempts_per_lineup == 0 {
            return Err(SlateError::invalid_config(
                "generator pool_size, batch_size and max_attempts_per_lineup must be positive",
            ));
        }
        Ok(Self { config, strategy })
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    pub fn strategy(&self) -> &StrategyProfile {
        &self.strategy
    }

    /// Build a pool of distinct valid lineups.
    ///
    /// Fails with `ConstraintInfeasible` when the schema cannot be filled,
    /// either up front or after `infeasible_attempts` attempts without a
    /// single valid lineup.
    pub fn generate(&self, annotated: &AnnotatedTable, schema: &RosterSchema, seed: u64) -> Result<LineupPool> {
        schema.validate()?;
        if self.strategy.salary_floor > schema.salary_cap {
            return Err(SlateError::invalid_config(format!(
                "salary floor {} exceeds the {} salary cap",
                self.strategy.salary_floor, schema.salary_cap
            )));
        }
        let slots = feasibility::check(annotated.table(), schema)?;
        let scorer = LineupScorer::new(annotated, schema, &self.strategy);
        let values: Vec<f64> = (0..annotated.len()).map(|id| scorer.player_value(id)).collect();
        let build = Builder {
            table: annotated.table(),
            schema,
            slots: &slots,
            scorer: &scorer,
            values: &values,
            temperature: self.strategy.temperature,
            salary_floor: self.strategy.salary_floor,
            repair_steps: self.config.repair_steps,
        };

        let target = self.config.pool_size;
        let max_attempts = target.saturating_mul(self.config.max_attempts_per_lineup);
        let multiplier_slot = schema.multiplier.map(|m| m.slot);
        let deadline = self.config.time_budget().map(|budget| Instant::now() + budget);
        let started = Instant::now();

        info!(
            pool_size = target,
            max_attempts,
            batch_size = self.config.batch_size,
            seed,
            "lineup generation started"
        );

        let mut lineups: Vec<Lineup> = Vec::with_capacity(target);
        let mut seen: HashSet<LineupKey> = HashSet::with_capacity(target);
        let mut slot_failures = vec![0usize; schema.len()];
        let mut below_floor = 0usize;
        let mut valid = 0usize;
        let mut attempts = 0usize;
        let mut timed_out = false;

        while lineups.len() < target && attempts < max_attempts {
            if deadline.is_some_and(|d| Instant::now() >= d) {
                timed_out = true;
                break;
            }
            if valid == 0 && attempts >= self.config.infeasible_attempts {
                return Err(infeasible_after(schema, &slot_failures, below_floor, attempts));
            }

            let batch = self.config.batch_size.min(max_attempts - attempts);
            let outcomes: Vec<Attempt> = (attempts..attempts + batch)
                .into_par_iter()
                .map(|index| {
                    let mut rng = StdRng::seed_from_u64(stream_seed(seed, index as u64));
                    build.attempt(&mut rng)
                })
                .collect();
            attempts += batch;

            for outcome in outcomes {
                match outcome {
                    Attempt::Built(lineup) => {
                        valid += 1;
                        if lineups.len() < target && seen.insert(lineup_key(lineup.occupants(), multiplier_slot)) {
                            lineups.push(lineup);
                        }
                    }
                    Attempt::SlotFailed(slot) => slot_failures[slot] += 1,
                    Attempt::BelowFloor => below_floor += 1,
                }
            }
        }

        if lineups.is_empty() && !timed_out {
            return Err(infeasible_after(schema, &slot_failures, below_floor, attempts));
        }

        lineups.sort_by(|a, b| {
            b.score()
                .total_cmp(&a.score())
                .then_with(|| a.key(multiplier_slot).cmp(&b.key(multiplier_slot)))
        });

        let mut warnings = Vec::new();
        if lineups.len() < target {
            let reason = if timed_out {
                BelowTargetReason::TimeBudget
            } else {
                BelowTargetReason::AttemptsExhausted
            };
            warn!(
                requested = target,
                produced = lineups.len(),
                ?reason,
                "lineup pool below target size"
            );
            warnings.push(Warning::PoolBelowTarget {
                requested: target,
                produced: lineups.len(),
                reason,
            });
        }

        info!(
            produced = lineups.len(),
            attempts,
            valid,
            duplicates = valid.saturating_sub(lineups.len()),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "lineup generation complete"
        );

        Ok(LineupPool {
            lineups,
            requested: target,
            attempts,
            seed,
            warnings,
        })
    }
}

fn infeasible_after(schema: &RosterSchema, slot_failures: &[usize], below_floor: usize, attempts: usize) -> SlateError {
    let worst = slot_failures.iter().copied().max().unwrap_or(0);
    if worst == 0 && below_floor > 0 {
        return SlateError::infeasible(
            Vec::new(),
            format!("salary floor unreachable after {attempts} attempts"),
        );
    }
    let slots = slot_failures
        .iter()
        .enumerate()
        .filter(|(_, count)| **count == worst && worst > 0)
        .map(|(idx, _)| schema.slots[idx].name.clone())
        .collect();
    SlateError::infeasible(
        slots,
        format!("no valid lineup after {attempts} attempts"),
    )
}

fn draw(weights: &[f64], rng: &mut StdRng) -> Option<usize> {
    WeightedIndex::new(weights).ok().map(|dist| dist.sample(rng))
}

/// Shared, read-only state of one generation run
struct Builder<'a> {
    table: &'a PlayerTable,
    schema: &'a RosterSchema,
    slots: &'a SlotPool,
    scorer: &'a LineupScorer<'a>,
    values: &'a [f64],
    temperature: f64,
    salary_floor: u32,
    repair_steps: usize,
}

impl Builder<'_> {
    fn attempt(&self, rng: &mut StdRng) -> Attempt {
        let order = self.slot_order(rng);
        let mut occupants: Vec<Option<PlayerId>> = vec![None; self.schema.len()];
        let mut used: Vec<PlayerId> = Vec::with_capacity(self.schema.len());
        let mut remaining = self.schema.salary_cap;

        for (k, &slot) in order.iter().enumerate() {
            let rest = &order[k + 1..];
            let reserve = match self.slots.reserve(rest, &used) {
                Ok(reserve) => reserve,
                Err(starved) => return Attempt::SlotFailed(starved),
            };
            let Some(budget) = remaining.checked_sub(reserve) else {
                return Attempt::SlotFailed(slot);
            };

            let mut affordable: Vec<(PlayerId, u32)> = self
                .slots
                .candidates(slot)
                .iter()
                .take_while(|(_, salary)| *salary <= budget)
                .filter(|(id, _)| !used.contains(id))
                .copied()
                .collect();
            let mut weights = self.weights(slot, &affordable, &used);

            // Reject picks that starve the remaining slots
            let salary = loop {
                let Some(pick) = draw(&weights, rng) else {
                    return Attempt::SlotFailed(slot);
                };
                let (player, salary) = affordable[pick];
                used.push(player);
                let fits = self
                    .slots
                    .reserve(rest, &used)
                    .is_ok_and(|reserve| salary.saturating_add(reserve) <= remaining);
                if fits {
                    occupants[slot] = Some(player);
                    break salary;
                }
                used.pop();
                affordable.swap_remove(pick);
                weights.swap_remove(pick);
            };
            remaining -= salary;
        }

        let Some(mut occupants) = occupants.into_iter().collect::<Option<Vec<PlayerId>>>() else {
            return Attempt::SlotFailed(order[0]);
        };
        if !self.repair(&mut occupants) {
            return Attempt::BelowFloor;
        }
        Attempt::Built(self.scorer.assemble(occupants))
    }

    /// Fewest candidates first; ties shuffled so attempts explore different orders
    fn slot_order(&self, rng: &mut StdRng) -> Vec<usize> {
        let mut order: Vec<(usize, u32, usize)> = (0..self.schema.len())
            .map(|slot| (self.slots.candidates(slot).len(), rng.gen::<u32>(), slot))
            .collect();
        order.sort_unstable();
        order.into_iter().map(|(_, _, slot)| slot).collect()
    }

    /// Softmax weights over strategy value plus the weighted stack gain.
    ///
    /// Values are scaled by their spread across the candidates, so the
    /// temperature reads in standard deviations whatever the point scale.
    fn weights(&self, slot: usize, affordable: &[(PlayerId, u32)], chosen: &[PlayerId]) -> Vec<f64> {
        if affordable.is_empty() {
            return Vec::new();
        }
        let mult = self.schema.score_multiplier(slot);
        let ids: Vec<PlayerId> = affordable.iter().map(|(id, _)| *id).collect();
        let gains = self.scorer.stack_gains(chosen, &ids);
        let values: Vec<f64> = ids
            .iter()
            .zip(&gains)
            .map(|(id, gain)| self.values[*id] * mult + gain)
            .collect();

        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let spread = (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt();
        let top = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if !top.is_finite() || !spread.is_finite() || spread <= 1e-9 {
            return vec![1.0; values.len()];
        }
        let scale = self.temperature * spread;
        values.iter().map(|v| ((v - top) / scale).exp()).collect()
    }

    fn salary(&self, occupants: &[PlayerId]) -> u32 {
        occupants
            .iter()
            .enumerate()
            .map(|(slot, id)| self.schema.slot_salary(slot, &self.table[*id]))
            .sum()
    }

    /// Swap single occupants until salary lies in [floor, cap].
    ///
    /// Returns false when no useful swap remains or the step budget runs out.
    fn repair(&self, occupants: &mut [PlayerId]) -> bool {
        let mut steps = 0;
        loop {
            let salary = self.salary(occupants);
            let raise = if salary > self.schema.salary_cap {
                false
            } else if salary < self.salary_floor {
                true
            } else {
                return true;
            };
            if steps == self.repair_steps {
                return false;
            }
            match self.best_swap(occupants, salary, raise) {
                Some((slot, player)) => occupants[slot] = player,
                None => return false,
            }
            steps += 1;
        }
    }

    /// Best single swap moving salary up (toward the floor) or down (under the cap).
    ///
    /// Swaps reaching the bound win, then the smallest loss of strategy value.
    fn best_swap(&self, occupants: &[PlayerId], salary: u32, raise: bool) -> Option<(usize, PlayerId)> {
        let cap = self.schema.salary_cap;
        let mut best: Option<(bool, f64, usize, PlayerId)> = None;

        for (slot, current) in occupants.iter().enumerate() {
            let current_salary = self.schema.slot_salary(slot, &self.table[*current]);
            let mult = self.schema.score_multiplier(slot);
            for (candidate, candidate_salary) in self.slots.candidates(slot) {
                if occupants.contains(candidate) {
                    continue;
                }
                let total = salary - current_salary + candidate_salary;
                let (useful, reaches) = if raise {
                    (*candidate_salary > current_salary && total <= cap, total >= self.salary_floor)
                } else {
                    (*candidate_salary < current_salary, total <= cap)
                };
                if !useful {
                    continue;
                }
                let gain = (self.values[*candidate] - self.values[*current]) * mult;
                let better = match best {
                    None => true,
                    Some((best_reaches, best_gain, _, _)) => {
                        (reaches && !best_reaches) || (reaches == best_reaches && gain > best_gain)
                    }
                };
                if better {
                    best = Some((reaches, gain, slot, *candidate));
                }
            }
        }
        best.map(|(_, _, slot, player)| (slot, player))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Player, PlayerMetrics};
    use std::sync::Arc;

    fn player(name: &str, pos: &str, team: &str, salary: u32, proj: f64) -> Player {
        let game = if team == "KC" || team == "BUF" { "BUF@KC" } else { "MIA@NYJ" };
        Player {
            id: 0,
            name: name.into(),
            positions: vec![pos.into()],
            team: team.into(),
            opponent: None,
            game: game.into(),
            salary,
            projection: proj,
            std_dev: proj * 0.3,
            ownership: 0.1,
        }
    }

    fn slate() -> AnnotatedTable {
        let players = vec![
            player("QB1", "QB", "KC", 8000, 22.0),
            player("QB2", "QB", "NYJ", 6000, 17.0),
            player("RB1", "RB", "KC", 7500, 18.0),
            player("RB2", "RB", "BUF", 6500, 15.0),
            player("RB3", "RB", "MIA", 5000, 12.0),
            player("RB4", "RB", "NYJ", 4500, 10.0),
            player("WR1", "WR", "KC", 8000, 19.0),
            player("WR2", "WR", "BUF", 7000, 16.0),
            player("WR3", "WR", "MIA", 6000, 14.0),
            player("WR4", "WR", "NYJ", 5000, 12.0),
            player("WR5", "WR", "KC", 4000, 9.0),
            player("WR6", "WR", "BUF", 3500, 8.0),
            player("TE1", "TE", "KC", 6000, 13.0),
            player("TE2", "TE", "MIA", 3500, 7.0),
            player("DST1", "DST", "BUF", 3000, 8.0),
            player("DST2", "DST", "MIA", 2500, 6.0),
        ];
        let table = PlayerTable::from_players(players).unwrap();
        let metrics = table
            .players()
            .iter()
            .map(|p| PlayerMetrics {
                optimal_rate: 0.1,
                leverage: 0.0,
                mean: p.projection,
                ceiling: p.projection * 1.5,
                ..PlayerMetrics::default()
            })
            .collect();
        AnnotatedTable::new(Arc::new(table), metrics).unwrap()
    }

    fn generator(pool_size: usize) -> LineupGenerator {
        let config = GeneratorConfig {
            pool_size,
            batch_size: 32,
            ..GeneratorConfig::default()
        };
        LineupGenerator::new(config, StrategyProfile::default()).unwrap()
    }

    #[test]
    fn test_generated_lineups_are_valid() {
        let annotated = slate();
        let schema = RosterSchema::football_classic();
        let pool = generator(50).generate(&annotated, &schema, 7).unwrap();
        assert!(!pool.is_empty());

        for lineup in pool.lineups() {
            assert!(lineup.salary() <= schema.salary_cap);
            let mut ids = lineup.occupants().to_vec();
            for (slot, id) in ids.iter().enumerate() {
                assert!(schema.slots[slot].accepts(annotated.player(*id)));
            }
            ids.sort_unstable();
            ids.dedup();
            assert_eq!(ids.len(), schema.len());
        }
    }

    #[test]
    fn test_pool_is_distinct_and_sorted() {
        let annotated = slate();
        let schema = RosterSchema::football_classic();
        let pool = generator(40).generate(&annotated, &schema, 11).unwrap();

        let keys: HashSet<LineupKey> = pool.lineups().iter().map(|l| l.key(None)).collect();
        assert_eq!(keys.len(), pool.len());
        for pair in pool.lineups().windows(2) {
            assert!(pair[0].score() >= pair[1].score());
        }
    }

    #[test]
    fn test_same_seed_same_pool() {
        let annotated = slate();
        let schema = RosterSchema::football_classic();
        let a = generator(30).generate(&annotated, &schema, 5).unwrap();
        let b = generator(30).generate(&annotated, &schema, 5).unwrap();
        assert_eq!(a.lineups(), b.lineups());
    }

    #[test]
    fn test_salary_floor_respected() {
        let annotated = slate();
        let schema = RosterSchema::football_classic();
        let strategy = StrategyProfile {
            salary_floor: 48_000,
            ..StrategyProfile::default()
        };
        let config = GeneratorConfig {
            pool_size: 20,
            batch_size: 16,
            ..GeneratorConfig::default()
        };
        let pool = LineupGenerator::new(config, strategy)
            .unwrap()
            .generate(&annotated, &schema, 3)
            .unwrap();
        assert!(!pool.is_empty());
        assert!(pool
            .lineups()
            .iter()
            .all(|l| (48_000..=50_000).contains(&l.salary())));
    }

    #[test]
    fn test_floor_above_cap_rejected() {
        let annotated = slate();
        let schema = RosterSchema::football_classic();
        let strategy = StrategyProfile {
            salary_floor: 60_000,
            ..StrategyProfile::default()
        };
        let result = LineupGenerator::new(GeneratorConfig::default(), strategy)
            .unwrap()
            .generate(&annotated, &schema, 1);
        assert!(matches!(result, Err(SlateError::InvalidConfig(_))));
    }

    #[test]
    fn test_repair_brings_salary_under_cap() {
        let annotated = slate();
        let mut schema = RosterSchema::football_classic();
        schema.salary_cap = 50_000;
        let strategy = StrategyProfile::default();
        let scorer = LineupScorer::new(&annotated, &schema, &strategy);
        let slots = feasibility::check(annotated.table(), &schema).unwrap();
        let values: Vec<f64> = (0..annotated.len()).map(|id| scorer.player_value(id)).collect();
        let builder = Builder {
            table: annotated.table(),
            schema: &schema,
            slots: &slots,
            scorer: &scorer,
            values: &values,
            temperature: 1.0,
            salary_floor: 0,
            repair_steps: 10,
        };

        // QB1, RB1, RB2, WR1, WR2, WR3, TE1, RB3 (flex), DST1 = 57,000
        let mut occupants = vec![0, 2, 3, 6, 7, 8, 12, 4, 14];
        assert!(builder.salary(&occupants) > 50_000);
        assert!(builder.repair(&mut occupants));
        assert!(builder.salary(&occupants) <= 50_000);
    }

    #[test]
    fn test_zero_time_budget_returns_empty_pool() {
        let config = GeneratorConfig {
            pool_size: 10,
            time_budget_ms: Some(0),
            ..GeneratorConfig::default()
        };
        let pool = LineupGenerator::new(config, StrategyProfile::default())
            .unwrap()
            .generate(&slate(), &RosterSchema::football_classic(), 1)
            .unwrap();
        assert!(pool.is_empty());
        assert_eq!(pool.attempts(), 0);
        assert_eq!(
            pool.warnings(),
            &[Warning::PoolBelowTarget {
                requested: 10,
                produced: 0,
                reason: BelowTargetReason::TimeBudget,
            }]
        );
    }

    #[test]
    fn test_correlation_weight_shapes_construction() {
        let annotated = slate();
        let schema = RosterSchema::football_classic();
        let mean_bonus = |weight: f64| {
            let strategy = StrategyProfile {
                correlation_weight: weight,
                ..StrategyProfile::default()
            };
            let config = GeneratorConfig {
                pool_size: 60,
                batch_size: 32,
                ..GeneratorConfig::default()
            };
            let pool = LineupGenerator::new(config, strategy)
                .unwrap()
                .generate(&annotated, &schema, 19)
                .unwrap();
            pool.lineups().iter().map(|l| l.stack().bonus).sum::<f64>() / pool.len() as f64
        };
        let flat = mean_bonus(0.0);
        let stacked = mean_bonus(8.0);
        assert!(stacked > flat + 1.0, "flat={flat} stacked={stacked}");
    }

    #[test]
    fn test_sampling_spreads_across_value_scales() {
        // Leverage spreads values by tens of points; the pool must still fill
        let annotated = {
            let base = slate();
            let metrics = (0..base.len())
                .map(|id| PlayerMetrics {
                    leverage: if id % 2 == 0 { 0.25 } else { -0.25 },
                    ..*base.metrics(id)
                })
                .collect();
            AnnotatedTable::new(Arc::new(base.table().clone()), metrics).unwrap()
        };
        let schema = RosterSchema::football_classic();
        let pool = generator(40).generate(&annotated, &schema, 23).unwrap();
        assert_eq!(pool.len(), 40);
        assert!(pool.warnings().is_empty());
    }
}
