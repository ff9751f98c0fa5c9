//! Archetype-driven portfolio selection with exposure control.
//!
//! Archetypes are served strictly in order: each pick must observe the
//! running exposure counts left by earlier picks, so this stage is a single
//! sequential pass followed by a bounded swap-repair loop.

use std::collections::HashSet;

use tracing::{debug, info, warn};

use super::exposure::{ExposureTarget, ExposureTiers};
use crate::config::{ExposureConfig, PortfolioConfig};
use crate::domain::{
    AnnotatedTable, Archetype, ExposureException, Lineup, PlayerExposure, Portfolio, PortfolioEntry,
    RosterSchema, ScoringPreference, Warning,
};
use crate::error::{Result, SlateError};

const EPS: f64 = 1e-9;

/// Portfolio plus the targets it was built against and any warnings
#[derive(Debug, Clone)]
pub struct Construction {
    pub portfolio: Portfolio,
    pub targets: Vec<ExposureTarget>,
    pub warnings: Vec<Warning>,
}

/// One selected lineup during construction
#[derive(Debug, Clone, Copy)]
struct Pick {
    lineup: usize,
    archetype: usize,
    /// Candidate list the lineup came from (an archetype index, or the
    /// unfiltered fallback list)
    source: usize,
    rank: usize,
}

/// Running exposure state, owned by one construction call
struct Exposure {
    counts: Vec<usize>,
    targets: Vec<Option<f64>>,
    size: f64,
}

impl Exposure {
    fn deviation(&self, player: usize, count: usize) -> Option<f64> {
        self.targets[player].map(|t| count as f64 / self.size - t)
    }

    /// Adding `lineup` keeps every targeted occupant at most `tolerance` above target
    fn admits(&self, lineup: &Lineup, tolerance: f64) -> bool {
        lineup.occupants().iter().all(|p| match self.deviation(*p, self.counts[*p] + 1) {
            Some(dev) => dev <= tolerance + EPS,
            None => true,
        })
    }

    fn add(&mut self, lineup: &Lineup) {
        for p in lineup.occupants() {
            self.counts[*p] += 1;
        }
    }

    fn remove(&mut self, lineup: &Lineup) {
        for p in lineup.occupants() {
            self.counts[*p] -= 1;
        }
    }

    /// Targeted players outside tolerance, worst first
    fn violators(&self, tolerance: f64) -> Vec<usize> {
        let mut out: Vec<(usize, f64)> = (0..self.counts.len())
            .filter_map(|p| self.deviation(p, self.counts[p]).map(|d| (p, d.abs())))
            .filter(|(_, d)| *d > tolerance + EPS)
            .collect();
        out.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        out.into_iter().map(|(p, _)| p).collect()
    }
}

pub struct PortfolioConstructor {
    config: PortfolioConfig,
    tiers: ExposureTiers,
}

impl PortfolioConstructor {
    pub fn new(config: PortfolioConfig, exposure: &ExposureConfig) -> Result<Self> {
        config.validate()?;
        exposure.validate()?;
        Ok(Self {
            config,
            tiers: ExposureTiers::new(exposure),
        })
    }

    pub fn config(&self) -> &PortfolioConfig {
        &self.config
    }

    /// Select `config.size` lineups from `pool`.
    ///
    /// Deterministic: the same pool and configuration always give the same
    /// portfolio.
    pub fn construct(&self, annotated: &AnnotatedTable, pool: &[Lineup], schema: &RosterSchema) -> Result<Construction> {
        let size = self.config.size;
        let multiplier_slot = schema.multiplier.map(|m| m.slot);

        let mut seen = HashSet::new();
        let distinct: Vec<usize> = (0..pool.len())
            .filter(|i| seen.insert(pool[*i].key(multiplier_slot)))
            .collect();
        if distinct.len() < size {
            return Err(SlateError::InsufficientPool {
                required: size,
                available: distinct.len(),
            });
        }

        let targets = self.tiers.assign(annotated, pool, self.config.core_pool_share);
        let mut target_of = vec![None; annotated.len()];
        for t in &targets {
            target_of[t.player] = Some(t.target);
        }
        let mut exposure = Exposure {
            counts: vec![0; annotated.len()],
            targets: target_of,
            size: size as f64,
        };

        let archetypes = &self.config.archetypes;
        let mut lists: Vec<Vec<usize>> = archetypes
            .iter()
            .map(|a| self.candidates(a, annotated, pool, &distinct))
            .collect();
        // Unfiltered last resort, ranked by score
        let fallback = lists.len();
        lists.push(distinct.clone());

        info!(
            pool = distinct.len(),
            size,
            core_players = targets.len(),
            archetypes = archetypes.len(),
            "portfolio construction started"
        );

        let mut picks: Vec<Pick> = Vec::with_capacity(size);
        let mut selected = vec![false; pool.len()];
        let mut warnings = Vec::new();

        for (a, archetype) in archetypes.iter().enumerate() {
            let donors = donor_order(a, archetypes);
            let mut own = 0usize;
            let mut donor_used: Option<Option<usize>> = None;
            let mut widest = self.config.tolerance;

            for _ in 0..archetype.allocation {
                let own_left = lists[a].iter().any(|i| !selected[*i]);
                let sources: Vec<usize> = if own_left {
                    vec![a]
                } else {
                    donors.iter().copied().chain(std::iter::once(fallback)).collect()
                };

                let mut tolerance = self.config.tolerance;
                let pick = loop {
                    let found = sources.iter().find_map(|s| {
                        self.pick_from(*s, a, &lists[*s], pool, &selected, &picks, &exposure, tolerance)
                    });
                    if let Some(pick) = found {
                        break pick;
                    }
                    tolerance += self.config.tolerance_step;
                    if tolerance > self.config.max_tolerance + EPS {
                        return Err(SlateError::ExposureUnsatisfiable {
                            archetype: archetype.name.clone(),
                            tolerance: self.config.max_tolerance,
                        });
                    }
                };

                widest = widest.max(tolerance);
                if pick.source == a {
                    own += 1;
                } else if donor_used.is_none() {
                    donor_used = Some((pick.source != fallback).then_some(pick.source));
                }
                selected[pick.lineup] = true;
                exposure.add(&pool[pick.lineup]);
                picks.push(pick);
            }

            if widest > self.config.tolerance + EPS {
                warn!(archetype = %archetype.name, tolerance = widest, "exposure tolerance relaxed");
                warnings.push(Warning::ToleranceRelaxed {
                    archetype: archetype.name.clone(),
                    tolerance: widest,
                    default_tolerance: self.config.tolerance,
                });
            }
            if let Some(donor) = donor_used {
                let backfilled_by = donor.map(|d| archetypes[d].name.clone());
                warn!(
                    archetype = %archetype.name,
                    requested = archetype.allocation,
                    filled = own,
                    ?backfilled_by,
                    "archetype short of candidates"
                );
                warnings.push(Warning::ArchetypeShortfall {
                    archetype: archetype.name.clone(),
                    requested: archetype.allocation,
                    filled: own,
                    backfilled_by,
                });
            }
        }

        let swaps = self.repair(pool, &lists, &mut picks, &mut selected, &mut exposure);

        let portfolio = self.finish(annotated, pool, &picks, &exposure, archetypes, fallback);
        info!(
            lineups = portfolio.len(),
            swaps,
            exceptions = portfolio.exceptions().len(),
            warnings = warnings.len(),
            "portfolio construction complete"
        );

        Ok(Construction {
            portfolio,
            targets,
            warnings,
        })
    }

    /// Pool indices passing the archetype's filters, best first by its preference
    fn candidates(&self, archetype: &Archetype, annotated: &AnnotatedTable, pool: &[Lineup], distinct: &[usize]) -> Vec<usize> {
        let count = |lineup: &Lineup, pred: &dyn Fn(f64) -> bool| {
            lineup
                .occupants()
                .iter()
                .filter(|p| pred(annotated.player(**p).ownership))
                .count()
        };
        let chalk = self.config.chalk_ownership;
        let contrarian = self.config.contrarian_ownership;

        let mut list: Vec<usize> = distinct
            .iter()
            .copied()
            .filter(|i| {
                let lineup = &pool[*i];
                let in_band = archetype
                    .ownership_band
                    .map_or(true, |(lo, hi)| (lo..=hi).contains(&lineup.mean_ownership()));
                let chalk_ok = archetype.chalk_count.map_or(true, |(lo, hi)| {
                    (lo..=hi).contains(&count(lineup, &|o: f64| o >= chalk))
                });
                let contrarian_ok = archetype.contrarian_count.map_or(true, |(lo, hi)| {
                    (lo..=hi).contains(&count(lineup, &|o: f64| o < contrarian))
                });
                in_band && chalk_ok && contrarian_ok
            })
            .collect();

        // Stable: ties keep pool order
        let pref = archetype.preference;
        list.sort_by(|a, b| pref.key(&pool[*b]).total_cmp(&pref.key(&pool[*a])));
        debug!(archetype = %archetype.name, candidates = list.len(), "archetype candidates");
        list
    }

    /// First admissible lineup from one candidate list
    #[allow(clippy::too_many_arguments)]
    fn pick_from(
        &self,
        source: usize,
        archetype: usize,
        list: &[usize],
        pool: &[Lineup],
        selected: &[bool],
        picks: &[Pick],
        exposure: &Exposure,
        tolerance: f64,
    ) -> Option<Pick> {
        let at_default = tolerance <= self.config.tolerance + EPS;
        let admissible = |i: usize| {
            let lineup = &pool[i];
            if selected[i] || !exposure.admits(lineup, tolerance) {
                return false;
            }
            match self.config.max_overlap {
                Some(max) if at_default => picks.iter().all(|p| pool[p.lineup].overlap(lineup) <= max),
                _ => true,
            }
        };

        let hedge = self.config.archetypes[archetype].preference == ScoringPreference::AlternateStack;
        if hedge {
            let used: HashSet<&str> = picks
                .iter()
                .map(|p| pool[p.lineup].stack().pattern.as_str())
                .collect();
            let fresh = list
                .iter()
                .enumerate()
                .find(|(_, i)| !used.contains(pool[**i].stack().pattern.as_str()) && admissible(**i));
            if let Some((pos, i)) = fresh {
                return Some(Pick {
                    lineup: *i,
                    archetype,
                    source,
                    rank: pos + 1,
                });
            }
        }

        list.iter()
            .enumerate()
            .find(|(_, i)| admissible(**i))
            .map(|(pos, i)| Pick {
                lineup: *i,
                archetype,
                source,
                rank: pos + 1,
            })
    }

    /// Within-archetype swaps that shrink exposure deviations.
    ///
    /// A swap must reduce the violating player's deviation and may not push
    /// any other targeted player beyond both its old deviation and the
    /// tolerance. Returns the number of swaps made.
    fn repair(
        &self,
        pool: &[Lineup],
        lists: &[Vec<usize>],
        picks: &mut [Pick],
        selected: &mut [bool],
        exposure: &mut Exposure,
    ) -> usize {
        let tolerance = self.config.tolerance;
        let mut swaps = 0;

        for pass in 0..self.config.repair_passes {
            let violators = exposure.violators(tolerance);
            if violators.is_empty() {
                break;
            }
            let swap = violators.iter().find_map(|v| self.find_swap(*v, pool, lists, picks, selected, exposure));
            let Some((slot, candidate, rank)) = swap else {
                debug!(pass, remaining = violators.len(), "exposure repair at local optimum");
                break;
            };

            let old = picks[slot].lineup;
            exposure.remove(&pool[old]);
            exposure.add(&pool[candidate]);
            selected[old] = false;
            selected[candidate] = true;
            picks[slot].lineup = candidate;
            picks[slot].rank = rank;
            swaps += 1;
        }
        swaps
    }

    /// (pick slot, replacement pool index, replacement rank) improving `player`
    fn find_swap(
        &self,
        player: usize,
        pool: &[Lineup],
        lists: &[Vec<usize>],
        picks: &[Pick],
        selected: &[bool],
        exposure: &Exposure,
    ) -> Option<(usize, usize, usize)> {
        let tolerance = self.config.tolerance;
        let current = exposure.deviation(player, exposure.counts[player])?;
        let over = current > 0.0;

        for (slot, pick) in picks.iter().enumerate() {
            let outgoing = &pool[pick.lineup];
            if outgoing.contains(player) != over {
                continue;
            }
            for (pos, candidate) in lists[pick.source].iter().take(self.config.repair_depth).enumerate() {
                let incoming = &pool[*candidate];
                if selected[*candidate] || incoming.contains(player) == over {
                    continue;
                }
                if self.swap_improves(player, current, outgoing, incoming, exposure, tolerance) {
                    return Some((slot, *candidate, pos + 1));
                }
            }
        }
        None
    }

    fn swap_improves(
        &self,
        player: usize,
        current: f64,
        outgoing: &Lineup,
        incoming: &Lineup,
        exposure: &Exposure,
        tolerance: f64,
    ) -> bool {
        let delta = |p: usize| -> isize {
            incoming.contains(p) as isize - outgoing.contains(p) as isize
        };
        let new_count = |p: usize| (exposure.counts[p] as isize + delta(p)) as usize;

        let Some(after) = exposure.deviation(player, new_count(player)) else {
            return false;
        };
        if after.abs() >= current.abs() - EPS {
            return false;
        }

        outgoing
            .occupants()
            .iter()
            .chain(incoming.occupants())
            .filter(|p| **p != player && delta(**p) != 0)
            .all(|p| {
                let before = exposure.deviation(*p, exposure.counts[*p]);
                let after = exposure.deviation(*p, new_count(*p));
                match (before, after) {
                    (Some(b), Some(a)) => a.abs() <= b.abs().max(tolerance) + EPS,
                    _ => true,
                }
            })
    }

    fn finish(
        &self,
        annotated: &AnnotatedTable,
        pool: &[Lineup],
        picks: &[Pick],
        exposure: &Exposure,
        archetypes: &[Archetype],
        fallback: usize,
    ) -> Portfolio {
        let entries: Vec<PortfolioEntry> = picks
            .iter()
            .map(|pick| PortfolioEntry {
                lineup: pool[pick.lineup].clone(),
                archetype: archetypes[pick.archetype].name.clone(),
                rank: pick.rank,
                backfilled_from: (pick.source != pick.archetype).then(|| {
                    if pick.source == fallback {
                        "pool".to_string()
                    } else {
                        archetypes[pick.source].name.clone()
                    }
                }),
            })
            .collect();

        let mut exposures: Vec<PlayerExposure> = (0..exposure.counts.len())
            .filter(|p| exposure.counts[*p] > 0 || exposure.targets[*p].is_some())
            .map(|p| PlayerExposure {
                player: p,
                name: annotated.player(p).name.clone(),
                count: exposure.counts[p],
                realized: exposure.counts[p] as f64 / exposure.size,
                target: exposure.targets[p],
            })
            .collect();
        exposures.sort_by(|a, b| b.realized.total_cmp(&a.realized).then(a.player.cmp(&b.player)));

        let tolerance = self.config.tolerance;
        let exceptions: Vec<ExposureException> = exposures
            .iter()
            .filter_map(|e| {
                let target = e.target?;
                ((e.realized - target).abs() > tolerance + EPS).then(|| ExposureException {
                    player: e.player,
                    name: e.name.clone(),
                    target,
                    realized: e.realized,
                    tolerance,
                })
            })
            .collect();
        for e in &exceptions {
            warn!(
                player = %e.name,
                target = e.target,
                realized = e.realized,
                "exposure outside tolerance"
            );
        }

        Portfolio::new(entries, exposures, exceptions, tolerance)
    }
}

/// Other archetypes, most structurally similar first
fn donor_order(index: usize, archetypes: &[Archetype]) -> Vec<usize> {
    let me = &archetypes[index];
    let mut donors: Vec<(usize, f64)> = archetypes
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != index)
        .map(|(i, other)| (i, similarity_distance(me, other)))
        .collect();
    donors.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
    donors.into_iter().map(|(i, _)| i).collect()
}

/// Distance on ownership anchor and preference chalkiness; 0 for identical profiles
pub fn similarity_distance(a: &Archetype, b: &Archetype) -> f64 {
    let anchor = (a.ownership_anchor() - b.ownership_anchor()).abs();
    let chalk = (a.preference.chalkiness() - b.preference.chalkiness()).abs();
    let same_pref = if a.preference == b.preference { 0.0 } else { 0.01 };
    anchor + 0.1 * chalk + same_pref
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Player, PlayerMetrics, PlayerTable};
    use crate::lineup::LineupScorer;
    use crate::config::StrategyProfile;
    use std::sync::Arc;

    /// Two-slot "any position" schema over ten players
    fn fixture() -> (AnnotatedTable, RosterSchema, Vec<Lineup>) {
        let players: Vec<Player> = (0..10)
            .map(|i| Player {
                id: 0,
                name: format!("P{i}"),
                positions: vec!["X".into()],
                team: format!("T{i}"),
                opponent: None,
                game: format!("G{i}"),
                salary: 5000,
                projection: 20.0 - i as f64,
                std_dev: 4.0,
                ownership: 0.05 + 0.03 * i as f64,
            })
            .collect();
        let table = PlayerTable::from_players(players).unwrap();
        let metrics = table
            .players()
            .iter()
            .map(|p| PlayerMetrics {
                optimal_rate: 0.1,
                leverage: 0.1 - p.ownership,
                ceiling: p.projection * 1.5,
                ..PlayerMetrics::default()
            })
            .collect();
        let annotated = AnnotatedTable::new(Arc::new(table), metrics).unwrap();
        let schema = RosterSchema {
            name: "pair".into(),
            slots: vec![
                crate::domain::Slot::new("A", &["*"]),
                crate::domain::Slot::new("B", &["*"]),
            ],
            salary_cap: 10_000,
            multiplier: None,
            stack_rules: Default::default(),
        };
        let strategy = StrategyProfile::default();
        let scorer = LineupScorer::new(&annotated, &schema, &strategy);
        let mut pool = Vec::new();
        for a in 0..10 {
            for b in (a + 1)..10 {
                pool.push(scorer.assemble(vec![a, b]));
            }
        }
        pool.sort_by(|x, y| y.score().total_cmp(&x.score()));
        (annotated, schema, pool)
    }

    fn config(archetypes: Vec<Archetype>) -> PortfolioConfig {
        PortfolioConfig {
            size: archetypes.iter().map(|a| a.allocation).sum(),
            archetypes,
            ..PortfolioConfig::default()
        }
    }

    #[test]
    fn test_allocation_and_distinct_lineups() {
        let (annotated, schema, pool) = fixture();
        let constructor = PortfolioConstructor::new(config(Archetype::default_set()), &ExposureConfig::default()).unwrap();
        let built = constructor.construct(&annotated, &pool, &schema).unwrap();
        let portfolio = built.portfolio;
        assert_eq!(portfolio.len(), 5);

        let keys: HashSet<_> = portfolio.lineups().map(|l| l.key(None)).collect();
        assert_eq!(keys.len(), 5);
        let balanced = portfolio
            .entries()
            .iter()
            .filter(|e| e.archetype == "balanced_leverage")
            .count();
        assert_eq!(balanced, 2);
        assert!(portfolio.entries().iter().all(|e| e.rank >= 1));
    }

    #[test]
    fn test_construction_is_idempotent() {
        let (annotated, schema, pool) = fixture();
        let constructor = PortfolioConstructor::new(config(Archetype::default_set()), &ExposureConfig::default()).unwrap();
        let a = constructor.construct(&annotated, &pool, &schema).unwrap();
        let b = constructor.construct(&annotated, &pool, &schema).unwrap();
        assert_eq!(a.portfolio, b.portfolio);
        assert_eq!(a.warnings, b.warnings);
    }

    #[test]
    fn test_exposure_within_tolerance_or_reported() {
        let (annotated, schema, pool) = fixture();
        let constructor = PortfolioConstructor::new(config(Archetype::default_set()), &ExposureConfig::default()).unwrap();
        let built = constructor.construct(&annotated, &pool, &schema).unwrap();
        let portfolio = &built.portfolio;
        for target in &built.targets {
            let realized = portfolio.exposure(target.player).map_or(0.0, |e| e.realized);
            let within = (realized - target.target).abs() <= portfolio.tolerance() + EPS;
            let reported = portfolio.exceptions().iter().any(|e| e.player == target.player);
            assert!(within || reported, "player {} unreported", target.player);
        }
    }

    #[test]
    fn test_small_pool_rejected() {
        let (annotated, schema, pool) = fixture();
        let constructor = PortfolioConstructor::new(config(Archetype::default_set()), &ExposureConfig::default()).unwrap();
        let err = constructor.construct(&annotated, &pool[..3], &schema).unwrap_err();
        assert!(matches!(err, SlateError::InsufficientPool { required: 5, available: 3 }));
    }

    #[test]
    fn test_empty_archetype_is_backfilled() {
        let (annotated, schema, pool) = fixture();
        let archetypes = vec![
            Archetype::new("core", 2, ScoringPreference::MaxScore),
            // No lineup has mean ownership this high
            Archetype::new("impossible", 1, ScoringPreference::MaxOwnership).with_ownership_band(0.9, 1.0),
        ];
        let constructor = PortfolioConstructor::new(config(archetypes), &ExposureConfig::default()).unwrap();
        let built = constructor.construct(&annotated, &pool, &schema).unwrap();

        assert_eq!(built.portfolio.len(), 3);
        let last = &built.portfolio.entries()[2];
        assert_eq!(last.archetype, "impossible");
        assert_eq!(last.backfilled_from.as_deref(), Some("core"));
        assert!(built.warnings.iter().any(|w| matches!(
            w,
            Warning::ArchetypeShortfall { archetype, filled: 0, .. } if archetype == "impossible"
        )));
    }

    #[test]
    fn test_similar_archetype_preferred_as_donor() {
        let set = Archetype::default_set();
        // max_leverage sits closest to balanced_leverage, not chalk_insurance
        let order = donor_order(0, &set);
        assert_eq!(order.last(), Some(&3));
    }

    #[test]
    fn test_unreachable_exposure_is_an_error() {
        let (annotated, schema, pool) = fixture();
        // Every player is targeted at 0%, so any single lineup overshoots by 20%
        let exposure = ExposureConfig {
            tiers: Vec::new(),
            base_target: 0.0,
            scarce_positions: Vec::new(),
            ..ExposureConfig::default()
        };
        let portfolio = PortfolioConfig {
            tolerance: 0.1,
            max_tolerance: 0.1,
            ..config(vec![Archetype::new("core", 5, ScoringPreference::MaxScore)])
        };
        let constructor = PortfolioConstructor::new(portfolio, &exposure).unwrap();
        match constructor.construct(&annotated, &pool, &schema) {
            Err(SlateError::ExposureUnsatisfiable { archetype, tolerance }) => {
                assert_eq!(archetype, "core");
                assert_eq!(tolerance, 0.1);
            }
            other => panic!("expected ExposureUnsatisfiable, got {other:?}"),
        }
    }
}
