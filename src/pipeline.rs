//! End-to-end optimization: simulate, generate, construct, then score the
//! chosen lineups on the same draw model.
//!
//! Stages run strictly in sequence. Cancellation is checked before each
//! stage; a cancelled run returns `SlateError::Cancelled` and nothing else.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use tracing::{info, info_span, warn};
use uuid::Uuid;

use crate::cancel::CancelToken;
use crate::config::AppConfig;
use crate::domain::{AnnotatedTable, Lineup, PlayerTable, Portfolio, RosterSchema, Warning};
use crate::error::Result;
use crate::lineup::{LineupGenerator, LineupPool};
use crate::portfolio::{export_rows, ExportRow, ExposureTarget, PortfolioConstructor, PortfolioMetrics};
use crate::simulation::{stream_seed, LineupOutcome, SimulationEngine, SimulationReport};

/// Stream index reserved for deriving the generator seed from the run seed
const GENERATOR_STREAM: u64 = u64::MAX;

/// Everything one optimization request produced
#[derive(Debug, Clone)]
pub struct OptimizationResult {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    pub simulation: SimulationReport,
    pub annotated: AnnotatedTable,
    pub pool: LineupPool,
    pub portfolio: Portfolio,
    pub targets: Vec<ExposureTarget>,
    pub metrics: PortfolioMetrics,
    /// Simulated score distribution of each portfolio lineup, in portfolio order
    pub outcomes: Vec<LineupOutcome>,
    /// Non-fatal conditions from every stage, in stage order
    pub warnings: Vec<Warning>,
}

impl OptimizationResult {
    pub fn export_rows(&self, schema: &RosterSchema) -> Vec<ExportRow> {
        export_rows(&self.portfolio, &self.annotated, schema)
    }
}

pub struct Optimizer {
    config: AppConfig,
}

impl Optimizer {
    /// Validates the whole configuration up front
    pub fn new(config: AppConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    fn engine(&self, schema: &RosterSchema) -> Result<SimulationEngine> {
        Ok(SimulationEngine::new(self.config.simulation.clone())?.with_group_demand(schema.position_demand()))
    }

    /// Simulation stage only
    pub fn simulate(&self, table: &PlayerTable, schema: &RosterSchema) -> Result<SimulationReport> {
        self.engine(schema)?.run(table)
    }

    /// Score distributions of finished lineups, drawn from the run seed
    pub fn simulate_lineups(
        &self,
        table: &PlayerTable,
        schema: &RosterSchema,
        lineups: &[&Lineup],
        seed: u64,
    ) -> Result<Vec<LineupOutcome>> {
        Ok(self.engine(schema)?.simulate_lineups(table, schema, lineups, seed))
    }

    /// Generation stage only; the seed falls back to one derived from the simulation seed
    pub fn generate(&self, annotated: &AnnotatedTable, schema: &RosterSchema, simulation_seed: u64) -> Result<LineupPool> {
        let seed = self
            .config
            .generator
            .seed
            .unwrap_or_else(|| stream_seed(simulation_seed, GENERATOR_STREAM));
        LineupGenerator::new(self.config.generator.clone(), self.config.strategy.clone())?
            .generate(annotated, schema, seed)
    }

    pub fn run(&self, table: PlayerTable, schema: &RosterSchema, cancel: &CancelToken) -> Result<OptimizationResult> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let started = Instant::now();
        let span = info_span!("optimize", %run_id, schema = %schema.name);
        let _enter = span.enter();

        schema.validate()?;
        let constructor = PortfolioConstructor::new(self.config.portfolio.clone(), &self.config.exposure)?;
        info!(players = table.len(), slots = schema.len(), "optimization started");

        cancel.check("simulation")?;
        let table = Arc::new(table);
        let simulation = self.simulate(&table, schema)?;
        let annotated = simulation.annotate(Arc::clone(&table))?;

        cancel.check("generation")?;
        let pool = self.generate(&annotated, schema, simulation.seed)?;

        cancel.check("construction")?;
        let construction = constructor.construct(&annotated, pool.lineups(), schema)?;

        cancel.check("lineup simulation")?;
        let chosen: Vec<&Lineup> = construction.portfolio.lineups().collect();
        let outcomes = self.simulate_lineups(&table, schema, &chosen, simulation.seed)?;

        let mut warnings: Vec<Warning> = pool.warnings().to_vec();
        warnings.extend(construction.warnings);
        for w in &warnings {
            warn!(warning = %w, "optimization warning");
        }

        let metrics = PortfolioMetrics::from_portfolio(&construction.portfolio, schema.len());
        let elapsed_ms = started.elapsed().as_millis() as u64;
        info!(
            lineups = construction.portfolio.len(),
            pool = pool.len(),
            warnings = warnings.len(),
            elapsed_ms,
            "optimization complete"
        );

        Ok(OptimizationResult {
            run_id,
            started_at,
            elapsed_ms,
            simulation,
            annotated,
            pool,
            portfolio: construction.portfolio,
            targets: construction.targets,
            metrics,
            outcomes,
            warnings,
        })
    }
}
