//! Lineup pool generation
//!
//! - `feasibility`: slot candidate lists and fail-fast schema checks
//! - `scoring`: stack detection and strategy scoring
//! - `generator`: parallel randomized construction with repair and dedup

pub mod feasibility;
pub mod generator;
pub mod scoring;

pub use feasibility::SlotPool;
pub use generator::{LineupGenerator, LineupPool};
pub use scoring::{describe_stack, LineupScorer};
