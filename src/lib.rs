pub mod cancel;
pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod ingest;
pub mod lineup;
pub mod pipeline;
pub mod portfolio;
pub mod simulation;

pub use cancel::CancelToken;
pub use config::AppConfig;
pub use domain::{
    AnnotatedTable, Archetype, DataPolicy, Lineup, Player, PlayerId, PlayerMetrics, PlayerRecord,
    PlayerTable, Portfolio, PortfolioEntry, RosterSchema, ScoringPreference, Slot, StackRules,
    Warning,
};
pub use error::{DataError, Result, SlateError};
pub use lineup::{LineupGenerator, LineupPool};
pub use pipeline::{OptimizationResult, Optimizer};
pub use portfolio::{Construction, PortfolioConstructor, PortfolioMetrics};
pub use simulation::{SimulationEngine, SimulationReport};
