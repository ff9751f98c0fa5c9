//! Monte Carlo estimation of per-player optimal rates.
//!
//! Each draw samples every player at once. Players in the same game share a
//! draw-level "game pace" factor carrying `game_correlation` of their
//! variance. Within each ranking group the top performers of the draw are
//! flagged optimal; the optimal rate is the flagged share over all draws.
//!
//! Draws are split into fixed-size chunks, each with its own seeded stream,
//! and run on rayon. Chunk results are merged in chunk order and optimal
//! counts are integers, so output is bit-identical for a given seed
//! regardless of thread count. Means and std devs come from per-chunk sums
//! over every draw; percentiles come from an evenly strided subset of at
//! most `max_samples` draws, so memory stays bounded on large runs.
//!
//! The same draw model also scores whole lineups, which gives each
//! portfolio lineup its own score distribution.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::distribution::{self, ScoreDistribution};
use super::stream_seed;
use crate::config::{RankBasis, RankGrouping, SimulationConfig};
use crate::domain::{AnnotatedTable, Lineup, PlayerId, PlayerMetrics, PlayerTable, RosterSchema};
use crate::error::Result;

/// Stream index reserved for lineup simulation chunks
const LINEUP_STREAM: u64 = u64::MAX - 1;

/// Output of one simulation run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationReport {
    pub simulations: usize,
    /// Seed actually used (drawn at random when none was configured)
    pub seed: u64,
    pub metrics: Vec<PlayerMetrics>,
}

impl SimulationReport {
    /// Attach the metrics to the table they were computed from
    pub fn annotate(&self, table: Arc<PlayerTable>) -> Result<AnnotatedTable> {
        AnnotatedTable::new(table, self.metrics.clone())
    }
}

/// Simulated score distribution of one lineup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineupOutcome {
    pub mean: f64,
    pub std_dev: f64,
    /// 10th percentile
    pub floor: f64,
    /// 90th percentile
    pub ceiling: f64,
    /// 99th percentile, roughly the score a top-1% finish needs
    pub top_1_percent: f64,
    /// 80th percentile, roughly the min-cash line
    pub min_cash: f64,
    /// Share of draws in which this lineup outscored every other lineup
    /// simulated alongside it
    pub win_rate: f64,
}

/// Players ranked together, and how many of them count as optimal per draw
#[derive(Debug, Clone)]
struct RankGroup {
    members: Vec<PlayerId>,
    picks: usize,
}

/// Static per-player sampling parameters
#[derive(Debug, Clone, Copy)]
struct DrawParams {
    mean: f64,
    std_dev: f64,
    game: usize,
    salary_k: f64,
}

/// Running sums of `score - center` over every draw of a chunk
#[derive(Debug, Clone, Copy, Default)]
struct Moments {
    sum: f64,
    sum_sq: f64,
}

impl Moments {
    fn add(&mut self, deviation: f64) {
        self.sum += deviation;
        self.sum_sq += deviation * deviation;
    }

    fn merge(&mut self, other: &Moments) {
        self.sum += other.sum;
        self.sum_sq += other.sum_sq;
    }

    /// (mean, population std dev) given the center the sums were taken around
    fn finish(&self, center: f64, n: usize) -> (f64, f64) {
        let n = n.max(1) as f64;
        let shift = self.sum / n;
        let var = (self.sum_sq / n - shift * shift).max(0.0);
        (center + shift, var.sqrt())
    }
}

struct ChunkResult {
    optimal_counts: Vec<u32>,
    moments: Vec<Moments>,
    /// Retained draws, row-major: kept x players
    samples: Vec<f64>,
    kept: usize,
}

struct LineupChunk {
    wins: Vec<u32>,
    moments: Vec<Moments>,
    /// Retained draws, row-major: kept x lineups
    samples: Vec<f64>,
    kept: usize,
}

pub struct SimulationEngine {
    config: SimulationConfig,
    distribution: Box<dyn ScoreDistribution>,
    /// Dedicated roster slots per position (e.g., WR -> 3)
    group_demand: Vec<(String, usize)>,
}

impl SimulationEngine {
    /// Create an engine; a zero simulation count is rejected here
    pub fn new(config: SimulationConfig) -> Result<Self> {
        config.validate()?;
        let distribution = distribution::for_kind(config.distribution);
        Ok(Self {
            config,
            distribution,
            group_demand: Vec::new(),
        })
    }

    /// Substitute the score distribution without changing anything else
    pub fn with_distribution(mut self, distribution: Box<dyn ScoreDistribution>) -> Self {
        self.distribution = distribution;
        self
    }

    /// Flag at least as many optimal players per group as the roster needs
    pub fn with_group_demand(mut self, demand: Vec<(String, usize)>) -> Self {
        self.group_demand = demand;
        self
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Keep every `stride`-th draw so at most `max_samples` are retained
    fn stride(&self) -> usize {
        self.config.simulations.div_ceil(self.config.max_samples).max(1)
    }

    pub fn run(&self, table: &PlayerTable) -> Result<SimulationReport> {
        let seed = self.config.seed.unwrap_or_else(rand::random);
        let n = self.config.simulations;
        let started = Instant::now();

        let params = draw_params(table);
        let game_count = game_count(&params);
        let groups = self.rank_groups(table);
        let stride = self.stride();

        info!(
            players = table.len(),
            simulations = n,
            games = game_count,
            groups = groups.len(),
            distribution = self.distribution.name(),
            stride,
            seed,
            "simulation started"
        );

        let chunk_size = self.config.chunk_size;
        let chunk_count = n.div_ceil(chunk_size);

        let chunks: Vec<ChunkResult> = (0..chunk_count)
            .into_par_iter()
            .map(|chunk| {
                let first = chunk * chunk_size;
                let draws = chunk_size.min(n - first);
                let mut rng = StdRng::seed_from_u64(stream_seed(seed, chunk as u64));
                self.run_chunk(&mut rng, first, draws, stride, &params, game_count, &groups)
            })
            .collect();

        let player_count = table.len();
        let mut optimal_counts = vec![0u64; player_count];
        let mut moments = vec![Moments::default(); player_count];
        for chunk in &chunks {
            for (total, count) in optimal_counts.iter_mut().zip(&chunk.optimal_counts) {
                *total += u64::from(*count);
            }
            for (total, part) in moments.iter_mut().zip(&chunk.moments) {
                total.merge(part);
            }
        }

        let metrics: Vec<PlayerMetrics> = (0..player_count)
            .into_par_iter()
            .map(|id| {
                let column = retained_column(&chunks, id, player_count);
                let (mean, sim_std_dev) = moments[id].finish(params[id].mean, n);
                let optimal_rate = optimal_counts[id] as f64 / n as f64;
                summarize(
                    column,
                    mean,
                    sim_std_dev,
                    optimal_rate,
                    table[id].ownership,
                    self.config.ceiling_percentile,
                )
            })
            .collect();

        info!(
            simulations = n,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "simulation complete"
        );

        Ok(SimulationReport {
            simulations: n,
            seed,
            metrics,
        })
    }

    /// Score whole lineups on the same correlated draws used for players.
    ///
    /// Each occupant's score is scaled by its slot's multiplier. Ties for the
    /// best lineup in a draw go to the earliest lineup.
    pub fn simulate_lineups(
        &self,
        table: &PlayerTable,
        schema: &RosterSchema,
        lineups: &[&Lineup],
        seed: u64,
    ) -> Vec<LineupOutcome> {
        if lineups.is_empty() {
            return Vec::new();
        }
        let n = self.config.simulations;
        let started = Instant::now();
        let params = draw_params(table);
        let game_count = game_count(&params);
        let stride = self.stride();
        let rosters: Vec<Vec<(PlayerId, f64)>> = lineups
            .iter()
            .map(|lineup| {
                lineup
                    .occupants()
                    .iter()
                    .enumerate()
                    .map(|(slot, id)| (*id, schema.score_multiplier(slot)))
                    .collect()
            })
            .collect();
        let centers: Vec<f64> = lineups.iter().map(|l| l.projection()).collect();

        let base = stream_seed(seed, LINEUP_STREAM);
        let chunk_size = self.config.chunk_size;
        let chunks: Vec<LineupChunk> = (0..n.div_ceil(chunk_size))
            .into_par_iter()
            .map(|chunk| {
                let first = chunk * chunk_size;
                let draws = chunk_size.min(n - first);
                let mut rng = StdRng::seed_from_u64(stream_seed(base, chunk as u64));
                self.run_lineup_chunk(&mut rng, first, draws, stride, &params, game_count, &rosters, &centers)
            })
            .collect();

        let mut wins = vec![0u64; lineups.len()];
        let mut moments = vec![Moments::default(); lineups.len()];
        for chunk in &chunks {
            for (total, count) in wins.iter_mut().zip(&chunk.wins) {
                *total += u64::from(*count);
            }
            for (total, part) in moments.iter_mut().zip(&chunk.moments) {
                total.merge(part);
            }
        }

        let outcomes: Vec<LineupOutcome> = (0..lineups.len())
            .map(|idx| {
                let mut column = retained_column(&chunks, idx, lineups.len());
                column.sort_by(|a, b| a.total_cmp(b));
                let (mean, std_dev) = moments[idx].finish(centers[idx], n);
                LineupOutcome {
                    mean,
                    std_dev,
                    floor: percentile(&column, 0.10),
                    ceiling: percentile(&column, 0.90),
                    top_1_percent: percentile(&column, 0.99),
                    min_cash: percentile(&column, 0.80),
                    win_rate: wins[idx] as f64 / n as f64,
                }
            })
            .collect();

        info!(
            lineups = lineups.len(),
            simulations = n,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "lineup simulation complete"
        );
        outcomes
    }

    /// Sample one draw of every player into `row`
    fn draw(&self, rng: &mut StdRng, params: &[DrawParams], game_shocks: &mut [f64], row: &mut [f64]) {
        let shared = self.config.game_correlation.sqrt();
        let own = (1.0 - self.config.game_correlation).sqrt();
        for shock in game_shocks.iter_mut() {
            *shock = rng.sample(StandardNormal);
        }
        for (id, p) in params.iter().enumerate() {
            let idio: f64 = rng.sample(StandardNormal);
            let shock = shared * game_shocks[p.game] + own * idio;
            let score = self.distribution.score(p.mean, p.std_dev, shock);
            row[id] = if self.config.floor_at_zero { score.max(0.0) } else { score };
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn run_chunk(
        &self,
        rng: &mut StdRng,
        first_draw: usize,
        draws: usize,
        stride: usize,
        params: &[DrawParams],
        game_count: usize,
        groups: &[RankGroup],
    ) -> ChunkResult {
        let players = params.len();
        let mut optimal_counts = vec![0u32; players];
        let mut moments = vec![Moments::default(); players];
        let mut samples = Vec::with_capacity(draws.div_ceil(stride) * players);
        let mut kept = 0;
        let mut game_shocks = vec![0.0f64; game_count];
        let mut row = vec![0.0f64; players];
        let mut basis = vec![0.0f64; players];
        let mut scratch: Vec<PlayerId> = Vec::with_capacity(players);

        for draw in 0..draws {
            self.draw(rng, params, &mut game_shocks, &mut row);
            for (id, p) in params.iter().enumerate() {
                moments[id].add(row[id] - p.mean);
                basis[id] = match self.config.basis {
                    RankBasis::Points => row[id],
                    RankBasis::Value => row[id] / p.salary_k,
                };
            }
            if (first_draw + draw) % stride == 0 {
                samples.extend_from_slice(&row);
                kept += 1;
            }

            for group in groups {
                flag_top(group, &basis, &mut scratch, &mut optimal_counts);
            }
        }

        ChunkResult {
            optimal_counts,
            moments,
            samples,
            kept,
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn run_lineup_chunk(
        &self,
        rng: &mut StdRng,
        first_draw: usize,
        draws: usize,
        stride: usize,
        params: &[DrawParams],
        game_count: usize,
        rosters: &[Vec<(PlayerId, f64)>],
        centers: &[f64],
    ) -> LineupChunk {
        let mut wins = vec![0u32; rosters.len()];
        let mut moments = vec![Moments::default(); rosters.len()];
        let mut samples = Vec::with_capacity(draws.div_ceil(stride) * rosters.len());
        let mut kept = 0;
        let mut game_shocks = vec![0.0f64; game_count];
        let mut row = vec![0.0f64; params.len()];
        let mut scores = vec![0.0f64; rosters.len()];

        for draw in 0..draws {
            self.draw(rng, params, &mut game_shocks, &mut row);
            let mut best = 0;
            for (idx, roster) in rosters.iter().enumerate() {
                let score: f64 = roster.iter().map(|(id, mult)| row[*id] * mult).sum();
                scores[idx] = score;
                moments[idx].add(score - centers[idx]);
                if score > scores[best] {
                    best = idx;
                }
            }
            wins[best] += 1;
            if (first_draw + draw) % stride == 0 {
                samples.extend_from_slice(&scores);
                kept += 1;
            }
        }

        LineupChunk {
            wins,
            moments,
            samples,
            kept,
        }
    }

    fn rank_groups(&self, table: &PlayerTable) -> Vec<RankGroup> {
        let fraction = self.config.optimal_fraction;
        let picks_for = |size: usize, demand: usize| -> usize {
            let by_fraction = (fraction * size as f64).ceil() as usize;
            by_fraction.max(demand).max(1).min(size)
        };

        match self.config.grouping {
            RankGrouping::Global => {
                let members: Vec<PlayerId> = (0..table.len()).collect();
                let demand: usize = self.group_demand.iter().map(|(_, n)| *n).sum();
                let picks = picks_for(members.len(), demand);
                vec![RankGroup { members, picks }]
            }
            RankGrouping::Position => {
                let mut order: Vec<String> = Vec::new();
                let mut by_position: HashMap<String, Vec<PlayerId>> = HashMap::new();
                for p in table.players() {
                    let pos = p.primary_position().to_string();
                    if !by_position.contains_key(&pos) {
                        order.push(pos.clone());
                    }
                    by_position.entry(pos).or_default().push(p.id);
                }
                order
                    .into_iter()
                    .filter_map(|pos| {
                        let members = by_position.remove(&pos)?;
                        if members.is_empty() {
                            return None;
                        }
                        let demand = self
                            .group_demand
                            .iter()
                            .find(|(p, _)| *p == pos)
                            .map(|(_, n)| *n)
                            .unwrap_or(1);
                        let picks = picks_for(members.len(), demand);
                        debug!(position = %pos, size = members.len(), picks, "rank group");
                        Some(RankGroup { members, picks })
                    })
                    .collect()
            }
        }
    }
}

fn game_count(params: &[DrawParams]) -> usize {
    params.iter().map(|p| p.game + 1).max().unwrap_or(0)
}

/// Chunk output holding retained draws row-major
trait Retained {
    fn rows(&self) -> (&[f64], usize);
}

impl Retained for ChunkResult {
    fn rows(&self) -> (&[f64], usize) {
        (&self.samples, self.kept)
    }
}

impl Retained for LineupChunk {
    fn rows(&self) -> (&[f64], usize) {
        (&self.samples, self.kept)
    }
}

/// Column `idx` of the retained rows of every chunk, in draw order
fn retained_column<C: Retained>(chunks: &[C], idx: usize, width: usize) -> Vec<f64> {
    let mut column = Vec::new();
    for chunk in chunks {
        let (samples, kept) = chunk.rows();
        column.extend((0..kept).map(|row| samples[row * width + idx]));
    }
    column
}

fn draw_params(table: &PlayerTable) -> Vec<DrawParams> {
    let mut games: HashMap<&str, usize> = HashMap::new();
    table
        .players()
        .iter()
        .map(|p| {
            let next = games.len();
            let game = *games.entry(p.game.as_str()).or_insert(next);
            DrawParams {
                mean: p.projection,
                std_dev: p.std_dev.max(0.0),
                game,
                salary_k: p.salary as f64 / 1000.0,
            }
        })
        .collect()
}

/// Increment the optimal count of the group's top `picks` players this draw
fn flag_top(group: &RankGroup, basis: &[f64], scratch: &mut Vec<PlayerId>, counts: &mut [u32]) {
    if group.members.is_empty() || group.picks == 0 {
        return;
    }
    scratch.clear();
    scratch.extend_from_slice(&group.members);

    // Descending by basis, ties broken by id for determinism
    let cmp = |a: &PlayerId, b: &PlayerId| basis[*b].total_cmp(&basis[*a]).then(a.cmp(b));
    if group.picks < scratch.len() {
        scratch.select_nth_unstable_by(group.picks - 1, cmp);
    }
    for id in &scratch[..group.picks] {
        counts[*id] += 1;
    }
}

fn summarize(
    mut column: Vec<f64>,
    mean: f64,
    sim_std_dev: f64,
    optimal_rate: f64,
    ownership: f64,
    ceiling_pct: f64,
) -> PlayerMetrics {
    column.sort_by(|a, b| a.total_cmp(b));

    PlayerMetrics {
        optimal_rate,
        leverage: optimal_rate - ownership,
        mean,
        sim_std_dev,
        floor: percentile(&column, 0.05),
        p10: percentile(&column, 0.10),
        median: percentile(&column, 0.50),
        p90: percentile(&column, 0.90),
        ceiling: percentile(&column, ceiling_pct),
    }
}

/// Linear-interpolated percentile of sorted data
pub(crate) fn percentile(sorted: &[f64], q: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        len => {
            let rank = q.clamp(0.0, 1.0) * (len - 1) as f64;
            let lo = rank.floor() as usize;
            let hi = rank.ceil() as usize;
            let frac = rank - lo as f64;
            sorted[lo] + (sorted[hi] - sorted[lo]) * frac
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{MultiplierRule, Player, Slot, StackRules};
    use crate::lineup::LineupScorer;
    use crate::config::StrategyProfile;
    use crate::simulation::LogNormalScores;

    fn player(name: &str, pos: &str, team: &str, game: &str, salary: u32, proj: f64, sd: f64, own: f64) -> Player {
        Player {
            id: 0,
            name: name.into(),
            positions: vec![pos.into()],
            team: team.into(),
            opponent: None,
            game: game.into(),
            salary,
            projection: proj,
            std_dev: sd,
            ownership: own,
        }
    }

    fn small_table() -> PlayerTable {
        PlayerTable::from_players(vec![
            player("Star", "WR", "A", "G1", 8000, 25.0, 6.0, 0.30),
            player("Mid", "WR", "B", "G1", 6000, 15.0, 5.0, 0.10),
            player("Punt", "WR", "C", "G2", 3500, 6.0, 4.0, 0.02),
            player("Zero", "WR", "D", "G2", 3000, 0.0, 0.0, 0.0),
        ])
        .unwrap()
    }

    fn config(seed: u64) -> SimulationConfig {
        SimulationConfig {
            simulations: 4000,
            seed: Some(seed),
            chunk_size: 300,
            ..SimulationConfig::default()
        }
    }

    #[test]
    fn test_percentile_interpolates() {
        let data = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(percentile(&data, 0.5), 3.0);
        assert_eq!(percentile(&data, 0.0), 1.0);
        assert_eq!(percentile(&data, 1.0), 5.0);
        assert!((percentile(&data, 0.9) - 4.6).abs() < 1e-12);
    }

    #[test]
    fn test_same_seed_is_bit_identical() {
        let table = small_table();
        let a = SimulationEngine::new(config(99)).unwrap().run(&table).unwrap();
        let b = SimulationEngine::new(config(99)).unwrap().run(&table).unwrap();
        for (x, y) in a.metrics.iter().zip(&b.metrics) {
            assert_eq!(x.optimal_rate.to_bits(), y.optimal_rate.to_bits());
            assert_eq!(x.ceiling.to_bits(), y.ceiling.to_bits());
        }
    }

    #[test]
    fn test_leverage_is_rate_minus_ownership() {
        let table = small_table();
        let report = SimulationEngine::new(config(3)).unwrap().run(&table).unwrap();
        for (p, m) in table.players().iter().zip(&report.metrics) {
            assert!((0.0..=1.0).contains(&m.optimal_rate));
            assert!((m.leverage - (m.optimal_rate - p.ownership)).abs() < 1e-12);
        }
        // One pick per group per draw: rates across a single group sum to 1
        let total: f64 = report.metrics.iter().map(|m| m.optimal_rate).sum();
        assert!((total - 1.0).abs() < 1e-9);
        assert!(report.metrics[0].optimal_rate > report.metrics[2].optimal_rate);
    }

    #[test]
    fn test_zero_variance_player_is_constant() {
        let table = small_table();
        let report = SimulationEngine::new(config(5)).unwrap().run(&table).unwrap();
        let zero = &report.metrics[3];
        assert_eq!(zero.mean, 0.0);
        assert_eq!(zero.ceiling, 0.0);
        assert_eq!(zero.sim_std_dev, 0.0);
    }

    #[test]
    fn test_zero_simulations_rejected() {
        let cfg = SimulationConfig {
            simulations: 0,
            ..SimulationConfig::default()
        };
        assert!(SimulationEngine::new(cfg).is_err());
    }

    #[test]
    fn test_group_demand_raises_picks() {
        let table = small_table();
        let engine = SimulationEngine::new(config(8))
            .unwrap()
            .with_group_demand(vec![("WR".to_string(), 3)]);
        let report = engine.run(&table).unwrap();
        let total: f64 = report.metrics.iter().map(|m| m.optimal_rate).sum();
        assert!((total - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_ceiling_above_projection() {
        let table = small_table();
        let report = SimulationEngine::new(config(21)).unwrap().run(&table).unwrap();
        let star = &report.metrics[0];
        assert!(star.ceiling > 25.0);
        assert!(star.floor < star.median && star.median < star.p90);
    }

    #[test]
    fn test_shared_game_factor_correlates_teammates() {
        let table = PlayerTable::from_players(vec![
            player("A", "WR", "X", "G1", 5000, 15.0, 5.0, 0.1),
            player("B", "RB", "X", "G1", 5000, 15.0, 5.0, 0.1),
        ])
        .unwrap();
        let engine = SimulationEngine::new(SimulationConfig {
            simulations: 1,
            seed: Some(1),
            game_correlation: 0.8,
            floor_at_zero: false,
            ..SimulationConfig::default()
        })
        .unwrap();
        let params = draw_params(&table);
        let groups = engine.rank_groups(&table);
        let mut rng = StdRng::seed_from_u64(17);
        let chunk = engine.run_chunk(&mut rng, 0, 5000, 1, &params, 1, &groups);

        let (mut sa, mut sb, mut sab) = (0.0, 0.0, 0.0);
        for d in 0..chunk.kept {
            let a = chunk.samples[d * 2] - 15.0;
            let b = chunk.samples[d * 2 + 1] - 15.0;
            sa += a * a;
            sb += b * b;
            sab += a * b;
        }
        let corr = sab / (sa.sqrt() * sb.sqrt());
        assert!(corr > 0.7 && corr < 0.9, "corr={corr}");
    }

    #[test]
    fn test_stride_keeps_every_nth_draw() {
        let table = small_table();
        let engine = SimulationEngine::new(config(4)).unwrap();
        let params = draw_params(&table);
        let groups = engine.rank_groups(&table);
        let mut rng = StdRng::seed_from_u64(2);
        // Draws 300..600 of the run: 300, 307, ... are multiples of 7
        let chunk = engine.run_chunk(&mut rng, 300, 300, 7, &params, 2, &groups);
        assert_eq!(chunk.kept, (300..600).filter(|d| d % 7 == 0).count());
        assert_eq!(chunk.samples.len(), chunk.kept * table.len());
    }

    #[test]
    fn test_sample_cap_keeps_means_and_rates() {
        let table = small_table();
        let full = SimulationEngine::new(config(13)).unwrap().run(&table).unwrap();
        let capped = SimulationEngine::new(SimulationConfig {
            max_samples: 250,
            ..config(13)
        })
        .unwrap()
        .run(&table)
        .unwrap();

        for (a, b) in full.metrics.iter().zip(&capped.metrics) {
            assert_eq!(a.optimal_rate.to_bits(), b.optimal_rate.to_bits());
            assert_eq!(a.mean.to_bits(), b.mean.to_bits());
            assert_eq!(a.sim_std_dev.to_bits(), b.sim_std_dev.to_bits());
        }
        let star = (&full.metrics[0], &capped.metrics[0]);
        assert!((star.0.median - star.1.median).abs() < 1.5);
    }

    #[test]
    fn test_zero_sample_cap_rejected() {
        let cfg = SimulationConfig {
            max_samples: 0,
            ..SimulationConfig::default()
        };
        assert!(SimulationEngine::new(cfg).is_err());
    }

    #[test]
    fn test_global_grouping_flags_one_pool() {
        let table = PlayerTable::from_players(vec![
            player("Star", "WR", "A", "G1", 8000, 25.0, 6.0, 0.30),
            player("Mid", "WR", "B", "G1", 6000, 15.0, 5.0, 0.10),
            player("Arm", "QB", "C", "G2", 7000, 20.0, 5.0, 0.20),
        ])
        .unwrap();
        let by_position = SimulationEngine::new(config(6)).unwrap().run(&table).unwrap();
        let global = SimulationEngine::new(SimulationConfig {
            grouping: RankGrouping::Global,
            ..config(6)
        })
        .unwrap()
        .run(&table)
        .unwrap();

        let total = |r: &SimulationReport| r.metrics.iter().map(|m| m.optimal_rate).sum::<f64>();
        assert!((total(&by_position) - 2.0).abs() < 1e-9);
        assert!((total(&global) - 1.0).abs() < 1e-9);
        // Alone in its position group, the QB is always optimal there
        assert_eq!(by_position.metrics[2].optimal_rate, 1.0);
        assert!(global.metrics[2].optimal_rate < 1.0);
    }

    #[test]
    fn test_value_basis_favors_points_per_dollar() {
        let table = PlayerTable::from_players(vec![
            player("Cheap", "WR", "A", "G1", 3000, 15.0, 1.0, 0.1),
            player("Pricey", "WR", "B", "G2", 9000, 20.0, 1.0, 0.1),
        ])
        .unwrap();
        let points = SimulationEngine::new(config(7)).unwrap().run(&table).unwrap();
        let value = SimulationEngine::new(SimulationConfig {
            basis: RankBasis::Value,
            ..config(7)
        })
        .unwrap()
        .run(&table)
        .unwrap();

        assert!(points.metrics[1].optimal_rate > 0.95);
        assert!(value.metrics[0].optimal_rate > 0.95);
    }

    #[test]
    fn test_substituted_distribution_skews_scores() {
        let table = PlayerTable::from_players(vec![player("Boom", "WR", "A", "G1", 6000, 20.0, 8.0, 0.1)]).unwrap();
        let normal = SimulationEngine::new(config(9)).unwrap().run(&table).unwrap();
        let engine = SimulationEngine::new(config(9))
            .unwrap()
            .with_distribution(Box::new(LogNormalScores));
        let skewed = engine.run(&table).unwrap();

        // Same mean, lower median: the log-normal median is about 18.6
        assert!((skewed.metrics[0].mean - 20.0).abs() < 0.5);
        assert!(skewed.metrics[0].median < normal.metrics[0].median - 0.8);
    }

    fn two_slot_schema(multiplier: Option<MultiplierRule>) -> RosterSchema {
        RosterSchema {
            name: "pair".into(),
            slots: vec![Slot::new("W1", &["WR"]), Slot::new("W2", &["WR"])],
            salary_cap: 50_000,
            multiplier,
            stack_rules: StackRules::default(),
        }
    }

    fn lineups_for(table: PlayerTable, schema: &RosterSchema, rosters: &[[PlayerId; 2]]) -> Vec<Lineup> {
        let metrics = vec![PlayerMetrics::default(); table.len()];
        let annotated = AnnotatedTable::new(Arc::new(table), metrics).unwrap();
        let strategy = StrategyProfile::default();
        let scorer = LineupScorer::new(&annotated, schema, &strategy);
        rosters.iter().map(|r| scorer.assemble(r.to_vec())).collect()
    }

    #[test]
    fn test_lineup_outcomes_summarize_draws() {
        let schema = two_slot_schema(None);
        let lineups = lineups_for(small_table(), &schema, &[[0, 1], [2, 3]]);
        let refs: Vec<&Lineup> = lineups.iter().collect();
        let engine = SimulationEngine::new(config(31)).unwrap();
        let outcomes = engine.simulate_lineups(&small_table(), &schema, &refs, 31);

        assert_eq!(outcomes.len(), 2);
        let strong = &outcomes[0];
        assert!((strong.mean - 40.0).abs() < 0.6, "mean={}", strong.mean);
        assert!(strong.floor < strong.mean && strong.mean < strong.min_cash);
        assert!(strong.min_cash < strong.ceiling && strong.ceiling < strong.top_1_percent);
        assert!(strong.std_dev > 0.0);
        assert!(strong.win_rate > 0.99);
        assert!((outcomes[0].win_rate + outcomes[1].win_rate - 1.0).abs() < 1e-9);

        let again = engine.simulate_lineups(&small_table(), &schema, &refs, 31);
        assert_eq!(again[1].ceiling.to_bits(), outcomes[1].ceiling.to_bits());
    }

    #[test]
    fn test_lineup_outcome_applies_slot_multiplier() {
        let schema = two_slot_schema(Some(MultiplierRule {
            slot: 0,
            score_multiplier: 1.5,
            salary_multiplier: 1.5,
        }));
        // Star (25) in the boosted slot next to Zero (0)
        let lineups = lineups_for(small_table(), &schema, &[[0, 3]]);
        let refs: Vec<&Lineup> = lineups.iter().collect();
        let outcomes = SimulationEngine::new(config(17))
            .unwrap()
            .simulate_lineups(&small_table(), &schema, &refs, 17);
        assert!((outcomes[0].mean - 37.5).abs() < 0.6, "mean={}", outcomes[0].mean);
        assert_eq!(outcomes[0].win_rate, 1.0);
    }

    #[test]
    fn test_no_lineups_no_outcomes() {
        let engine = SimulationEngine::new(config(1)).unwrap();
        assert!(engine
            .simulate_lineups(&small_table(), &two_slot_schema(None), &[], 1)
            .is_empty());
    }
}
