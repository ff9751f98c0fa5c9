//! Command-line interface for the `slate` binary.

pub mod output;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::info;

use crate::cancel::CancelToken;
use crate::config::AppConfig;
use crate::domain::{PlayerTable, RosterSchema, Warning};
use crate::ingest;
use crate::pipeline::Optimizer;
use crate::portfolio::{ExportRow, PortfolioMetrics};
use crate::simulation::LineupOutcome;
use output::{print_item, print_items, print_warnings, ExposureRow, LineupRow, OutcomeRow, OutputMode, PlayerRow};

#[derive(Parser)]
#[command(name = "slate")]
#[command(version)]
#[command(about = "Tournament lineup portfolio optimizer", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file path
    #[arg(short, long, global = true, default_value = "config/default.toml")]
    pub config: PathBuf,

    /// Output as JSON instead of tables
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Simulate, generate a pool and build the portfolio
    Optimize {
        #[command(flatten)]
        run: RunArgs,
        /// Portfolio size (allocations must still sum to it)
        #[arg(short = 'n', long)]
        size: Option<usize>,
    },
    /// Run the simulation only and list players by leverage
    Simulate {
        #[command(flatten)]
        run: RunArgs,
        /// Rows to print
        #[arg(long, default_value = "25")]
        top: usize,
    },
    /// Generate the lineup pool and print the best lineups
    Pool {
        #[command(flatten)]
        run: RunArgs,
        #[arg(long, default_value = "20")]
        top: usize,
    },
    /// Load and validate the configuration
    CheckConfig,
}

/// Inputs and overrides shared by the run commands
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Player table (CSV, or JSON by extension)
    #[arg(short, long)]
    pub players: PathBuf,

    /// Roster preset (football_classic, basketball_classic, captain_mode)
    #[arg(short, long)]
    pub roster: Option<String>,

    #[arg(long, env = "SLATE_SEED")]
    pub seed: Option<u64>,

    #[arg(long)]
    pub simulations: Option<usize>,

    #[arg(long)]
    pub pool_size: Option<usize>,

    /// Advisory generator time budget
    #[arg(long)]
    pub time_budget_ms: Option<u64>,
}

impl RunArgs {
    /// Command-line values win over file and environment configuration
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(roster) = &self.roster {
            config.roster.preset = roster.clone();
            config.roster.schema = None;
        }
        if self.seed.is_some() {
            config.simulation.seed = self.seed;
        }
        if let Some(n) = self.simulations {
            config.simulation.simulations = n;
        }
        if let Some(n) = self.pool_size {
            config.generator.pool_size = n;
        }
        if self.time_budget_ms.is_some() {
            config.generator.time_budget_ms = self.time_budget_ms;
        }
    }
}

/// JSON shape of `slate optimize --json`
#[derive(Debug, Serialize)]
struct OptimizeReport<'a> {
    run_id: String,
    seed: u64,
    pool_size: usize,
    metrics: &'a PortfolioMetrics,
    lineups: &'a [ExportRow],
    outcomes: &'a [LineupOutcome],
    exposures: &'a [crate::domain::PlayerExposure],
    exceptions: &'a [crate::domain::ExposureException],
    warnings: &'a [Warning],
}

/// Run one command to completion; blocking
pub fn execute(command: Commands, mut config: AppConfig, mode: OutputMode, cancel: &CancelToken) -> anyhow::Result<()> {
    match command {
        Commands::CheckConfig => {
            config.validate()?;
            let schema = config.roster.resolve()?;
            match mode {
                OutputMode::Json => print_item(&config)?,
                OutputMode::Table => println!(
                    "configuration ok: roster {} ({} slots, cap {}), portfolio of {}, pool of {}",
                    schema.name,
                    schema.len(),
                    schema.salary_cap,
                    config.portfolio.size,
                    config.generator.pool_size
                ),
            }
        }
        Commands::Optimize { run, size } => {
            run.apply(&mut config);
            if let Some(size) = size {
                config.portfolio.size = size;
            }
            let (optimizer, table, schema) = prepare(config, &run)?;
            let result = optimizer.run(table, &schema, cancel)?;
            let rows = result.export_rows(&schema);

            match mode {
                OutputMode::Json => print_item(&OptimizeReport {
                    run_id: result.run_id.to_string(),
                    seed: result.simulation.seed,
                    pool_size: result.pool.len(),
                    metrics: &result.metrics,
                    lineups: &rows,
                    outcomes: &result.outcomes,
                    exposures: result.portfolio.exposures(),
                    exceptions: result.portfolio.exceptions(),
                    warnings: &result.warnings,
                })?,
                OutputMode::Table => {
                    let lineups: Vec<LineupRow> = rows.iter().map(LineupRow::from_export).collect();
                    print_items(&lineups, mode)?;
                    let outcomes: Vec<OutcomeRow> = result
                        .outcomes
                        .iter()
                        .enumerate()
                        .map(|(i, o)| OutcomeRow::from_outcome(i, o))
                        .collect();
                    print_items(&outcomes, mode)?;
                    let exposures: Vec<ExposureRow> =
                        result.portfolio.exposures().iter().map(ExposureRow::from).collect();
                    print_items(&exposures, mode)?;
                    let m = &result.metrics;
                    println!(
                        "mean projection {:.1}, mean ownership {:.3}, uniqueness {:.2}, seed {}",
                        m.mean_projection, m.mean_ownership, m.uniqueness, result.simulation.seed
                    );
                    print_warnings(&result.warnings);
                }
            }
        }
        Commands::Simulate { run, top } => {
            run.apply(&mut config);
            let (optimizer, table, schema) = prepare(config, &run)?;
            cancel.check("simulation")?;
            let table = Arc::new(table);
            let report = optimizer.simulate(&table, &schema)?;
            let annotated = report.annotate(table)?;
            print_items(&PlayerRow::from_annotated(&annotated, top), mode)?;
        }
        Commands::Pool { run, top } => {
            run.apply(&mut config);
            let (optimizer, table, schema) = prepare(config, &run)?;
            cancel.check("simulation")?;
            let table = Arc::new(table);
            let report = optimizer.simulate(&table, &schema)?;
            let annotated = report.annotate(table)?;
            cancel.check("generation")?;
            let pool = optimizer.generate(&annotated, &schema, report.seed)?;
            let rows: Vec<LineupRow> = pool
                .lineups()
                .iter()
                .take(top)
                .enumerate()
                .map(|(i, l)| LineupRow::from_pool(i, l, &annotated))
                .collect();
            print_items(&rows, mode)?;
            if mode == OutputMode::Table {
                println!("{} distinct lineups from {} attempts", pool.len(), pool.attempts());
                print_warnings(pool.warnings());
            }
        }
    }
    Ok(())
}

fn prepare(config: AppConfig, run: &RunArgs) -> anyhow::Result<(Optimizer, PlayerTable, RosterSchema)> {
    let schema = config.roster.resolve()?;
    let table = ingest::load_players(&run.players, &config.data)?;
    info!(players = table.len(), path = %run.players.display(), roster = %schema.name, "player table loaded");
    let optimizer = Optimizer::new(config)?;
    Ok((optimizer, table, schema))
}
