//! Stochastic simulation of player outcomes

pub mod distribution;
pub mod engine;

pub use distribution::{LogNormalScores, NormalScores, ScoreDistribution};
pub use engine::{LineupOutcome, SimulationEngine, SimulationReport};

/// Derive an independent stream seed from a run seed and a stream index.
///
/// SplitMix64 finalizer over the pair, so neighbouring indices give
/// unrelated streams.
pub fn stream_seed(seed: u64, index: u64) -> u64 {
    let mut z = seed ^ index.wrapping_add(1).wrapping_mul(0x9e37_79b9_7f4a_7c15);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}
