use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::domain::{Archetype, DataPolicy, RosterSchema};
use crate::error::{Result, SlateError};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub strategy: StrategyProfile,
    #[serde(default)]
    pub generator: GeneratorConfig,
    #[serde(default)]
    pub portfolio: PortfolioConfig,
    #[serde(default)]
    pub exposure: ExposureConfig,
    #[serde(default)]
    pub data: DataPolicy,
    #[serde(default)]
    pub roster: RosterConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

// ==================== Simulation ====================

/// Which players are ranked against each other within a draw
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RankGrouping {
    /// Rank within each primary position
    #[default]
    Position,
    /// Rank the whole slate together
    Global,
}

/// What a draw is ranked by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RankBasis {
    /// Simulated fantasy points
    #[default]
    Points,
    /// Simulated points per 1000 salary
    Value,
}

/// Per-player score distribution family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DistributionKind {
    #[default]
    Normal,
    /// Right-skewed, mean and std dev matched to the projection
    LogNormal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Number of independent draws
    #[serde(default = "default_simulations")]
    pub simulations: usize,
    /// Fixed seed for reproducible runs
    #[serde(default)]
    pub seed: Option<u64>,
    /// Share of each player's variance carried by the shared game factor, in [0, 1)
    #[serde(default = "default_game_correlation")]
    pub game_correlation: f64,
    /// Top fraction of each ranking group flagged optimal per draw (e.g., 0.01 = 1%)
    #[serde(default = "default_optimal_fraction")]
    pub optimal_fraction: f64,
    #[serde(default)]
    pub grouping: RankGrouping,
    #[serde(default)]
    pub basis: RankBasis,
    #[serde(default)]
    pub distribution: DistributionKind,
    /// Truncate negative draws at zero
    #[serde(default = "default_true")]
    pub floor_at_zero: bool,
    /// Percentile reported as the ceiling (e.g., 0.95)
    #[serde(default = "default_ceiling_percentile")]
    pub ceiling_percentile: f64,
    /// Draws per parallel chunk; fixed so results do not depend on thread count
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Draws kept per player (and per lineup) for percentiles. Every draw
    /// still counts toward optimal rates, means and std devs.
    #[serde(default = "default_max_samples")]
    pub max_samples: usize,
}

fn default_simulations() -> usize {
    10_000
}
fn default_game_correlation() -> f64 {
    0.25
}
fn default_optimal_fraction() -> f64 {
    0.01
}
fn default_ceiling_percentile() -> f64 {
    0.95
}
fn default_chunk_size() -> usize {
    500
}
fn default_max_samples() -> usize {
    10_000
}
fn default_true() -> bool {
    true
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            simulations: default_simulations(),
            seed: None,
            game_correlation: default_game_correlation(),
            optimal_fraction: default_optimal_fraction(),
            grouping: RankGrouping::default(),
            basis: RankBasis::default(),
            distribution: DistributionKind::default(),
            floor_at_zero: true,
            ceiling_percentile: default_ceiling_percentile(),
            chunk_size: default_chunk_size(),
            max_samples: default_max_samples(),
        }
    }
}

// ==================== Strategy ====================

/// How a lineup's ownership is aggregated for reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OwnershipAggregation {
    #[default]
    Sum,
    Product,
}

/// Lineup scoring parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyProfile {
    #[serde(default = "default_strategy_name")]
    pub name: String,
    /// Points lost per unit of mean ownership outside the band
    #[serde(default = "default_ownership_weight")]
    pub ownership_weight: f64,
    /// Target band for mean lineup ownership (fractions)
    #[serde(default = "default_ownership_band")]
    pub ownership_band: (f64, f64),
    #[serde(default)]
    pub ownership_aggregation: OwnershipAggregation,
    /// Multiplier on the stack bonus
    #[serde(default = "default_correlation_weight")]
    pub correlation_weight: f64,
    /// Mean leverage the strategy aims for; each unit of shortfall below it
    /// costs `leverage_weight` points on top of the linear leverage term
    #[serde(default)]
    pub leverage_target: f64,
    /// Points per unit of mean leverage
    #[serde(default = "default_leverage_weight")]
    pub leverage_weight: f64,
    /// Blend of ceiling into the base score, in [0, 1]
    #[serde(default)]
    pub ceiling_weight: f64,
    /// Minimum total salary; lineups below are repaired or discarded
    #[serde(default)]
    pub salary_floor: u32,
    /// Softmax temperature of the per-slot sampler, in standard deviations
    /// of the affordable candidates' values
    #[serde(default = "default_temperature")]
    pub temperature: f64,
}

fn default_strategy_name() -> String {
    "balanced".to_string()
}
fn default_ownership_weight() -> f64 {
    40.0
}
fn default_ownership_band() -> (f64, f64) {
    (0.08, 0.15)
}
fn default_correlation_weight() -> f64 {
    1.0
}
fn default_leverage_weight() -> f64 {
    60.0
}
fn default_temperature() -> f64 {
    1.0
}

impl Default for StrategyProfile {
    fn default() -> Self {
        Self {
            name: default_strategy_name(),
            ownership_weight: default_ownership_weight(),
            ownership_band: default_ownership_band(),
            ownership_aggregation: OwnershipAggregation::Sum,
            correlation_weight: default_correlation_weight(),
            leverage_target: 0.0,
            leverage_weight: default_leverage_weight(),
            ceiling_weight: 0.0,
            salary_floor: 0,
            temperature: default_temperature(),
        }
    }
}

// ==================== Generator ====================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// Distinct lineups to produce
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
    /// Attempt budget per requested lineup
    #[serde(default = "default_attempts_per_lineup")]
    pub max_attempts_per_lineup: usize,
    /// Attempts run in parallel per batch
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Local-search swaps allowed per repair
    #[serde(default = "default_repair_steps")]
    pub repair_steps: usize,
    /// Attempts without a single valid lineup before giving up as infeasible
    #[serde(default = "default_infeasible_attempts")]
    pub infeasible_attempts: usize,
    /// Advisory time budget in milliseconds
    #[serde(default)]
    pub time_budget_ms: Option<u64>,
    /// Run seed; falls back to the simulation seed
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_pool_size() -> usize {
    1000
}
fn default_attempts_per_lineup() -> usize {
    40
}
fn default_batch_size() -> usize {
    256
}
fn default_repair_steps() -> usize {
    25
}
fn default_infeasible_attempts() -> usize {
    2000
}

impl GeneratorConfig {
    pub fn time_budget(&self) -> Option<Duration> {
        self.time_budget_ms.map(Duration::from_millis)
    }
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            pool_size: default_pool_size(),
            max_attempts_per_lineup: default_attempts_per_lineup(),
            batch_size: default_batch_size(),
            repair_steps: default_repair_steps(),
            infeasible_attempts: default_infeasible_attempts(),
            time_budget_ms: None,
            seed: None,
        }
    }
}

// ==================== Portfolio ====================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioConfig {
    /// Number of lineups in the portfolio
    #[serde(default = "default_portfolio_size")]
    pub size: usize,
    #[serde(default = "Archetype::default_set")]
    pub archetypes: Vec<Archetype>,
    /// Allowed |realized - target| exposure gap
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
    /// Increment when no candidate fits the current tolerance
    #[serde(default = "default_tolerance_step")]
    pub tolerance_step: f64,
    #[serde(default = "default_max_tolerance")]
    pub max_tolerance: f64,
    /// Maximum swap passes in the exposure repair
    #[serde(default = "default_repair_passes")]
    pub repair_passes: usize,
    /// Candidates per archetype considered as swap-ins
    #[serde(default = "default_repair_depth")]
    pub repair_depth: usize,
    /// Minimum share of pool lineups a player must appear in to get a target
    #[serde(default = "default_core_pool_share")]
    pub core_pool_share: f64,
    /// Ownership at or above which a player counts as chalk
    #[serde(default = "default_chalk_ownership")]
    pub chalk_ownership: f64,
    /// Ownership below which a player counts as contrarian
    #[serde(default = "default_contrarian_ownership")]
    pub contrarian_ownership: f64,
    /// Max shared players with any already-selected lineup (default tolerance only)
    #[serde(default)]
    pub max_overlap: Option<usize>,
}

fn default_portfolio_size() -> usize {
    5
}
fn default_tolerance() -> f64 {
    0.2
}
fn default_tolerance_step() -> f64 {
    0.1
}
fn default_max_tolerance() -> f64 {
    1.0
}
fn default_repair_passes() -> usize {
    10
}
fn default_repair_depth() -> usize {
    200
}
fn default_core_pool_share() -> f64 {
    0.05
}
fn default_chalk_ownership() -> f64 {
    0.25
}
fn default_contrarian_ownership() -> f64 {
    0.10
}

impl Default for PortfolioConfig {
    fn default() -> Self {
        Self {
            size: default_portfolio_size(),
            archetypes: Archetype::default_set(),
            tolerance: default_tolerance(),
            tolerance_step: default_tolerance_step(),
            max_tolerance: default_max_tolerance(),
            repair_passes: default_repair_passes(),
            repair_depth: default_repair_depth(),
            core_pool_share: default_core_pool_share(),
            chalk_ownership: default_chalk_ownership(),
            contrarian_ownership: default_contrarian_ownership(),
            max_overlap: None,
        }
    }
}

// ==================== Exposure ====================

/// Leverage at or above `min_leverage` maps to `target` exposure
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExposureTier {
    pub min_leverage: f64,
    pub target: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExposureConfig {
    /// Tiers, any order; evaluated from the highest threshold down
    #[serde(default = "default_tiers")]
    pub tiers: Vec<ExposureTier>,
    /// Target below every tier threshold (faded but kept)
    #[serde(default = "default_base_target")]
    pub base_target: f64,
    /// Positions earning the scarcity bonus when leverage is positive
    #[serde(default)]
    pub scarce_positions: Vec<String>,
    #[serde(default = "default_scarce_bonus")]
    pub scarce_bonus: f64,
    /// Upper clip on any target
    #[serde(default = "default_max_target")]
    pub max_target: f64,
}

fn default_tiers() -> Vec<ExposureTier> {
    vec![
        ExposureTier {
            min_leverage: 0.05,
            target: 0.6,
        },
        ExposureTier {
            min_leverage: 0.0,
            target: 0.5,
        },
        ExposureTier {
            min_leverage: -0.03,
            target: 0.4,
        },
    ]
}
fn default_base_target() -> f64 {
    0.2
}
fn default_scarce_bonus() -> f64 {
    0.2
}
fn default_max_target() -> f64 {
    0.8
}

impl Default for ExposureConfig {
    fn default() -> Self {
        Self {
            tiers: default_tiers(),
            base_target: default_base_target(),
            scarce_positions: Vec::new(),
            scarce_bonus: default_scarce_bonus(),
            max_target: default_max_target(),
        }
    }
}

// ==================== Roster / Logging ====================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RosterConfig {
    /// Built-in schema name, used when no inline schema is given
    #[serde(default = "default_roster_preset")]
    pub preset: String,
    #[serde(default)]
    pub schema: Option<RosterSchema>,
}

fn default_roster_preset() -> String {
    "football_classic".to_string()
}

impl Default for RosterConfig {
    fn default() -> Self {
        Self {
            preset: default_roster_preset(),
            schema: None,
        }
    }
}

impl RosterConfig {
    pub fn resolve(&self) -> Result<RosterSchema> {
        match &self.schema {
            Some(schema) => Ok(schema.clone()),
            None => RosterSchema::preset(&self.preset),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Enable JSON formatted logs
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from files and environment
    pub fn load() -> std::result::Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from a specific directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> std::result::Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();
        Self::load_file(config_dir.join("default.toml"), Some(config_dir))
    }

    /// Load a single file plus the environment layers
    pub fn load_file<P: AsRef<Path>>(
        file: P,
        env_dir: Option<&Path>,
    ) -> std::result::Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .set_default("logging.level", "info")?
            .set_default("logging.json", false)?
            .add_source(File::from(file.as_ref()).required(false));

        // Environment-specific overlay (e.g., config/production.toml)
        if let Some(dir) = env_dir {
            let env_name = std::env::var("SLATE_ENV").unwrap_or_else(|_| "development".to_string());
            builder = builder.add_source(File::from(dir.join(env_name)).required(false));
        }

        // Override with environment variables (SLATE__SIMULATION__SEED, etc.)
        builder
            .add_source(
                Environment::with_prefix("SLATE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// Reject invalid parameters before any computation starts
    pub fn validate(&self) -> Result<()> {
        self.simulation.validate()?;
        self.strategy.validate()?;
        self.exposure.validate()?;
        self.portfolio.validate()?;

        if self.generator.pool_size == 0 {
            return Err(SlateError::invalid_config("generator.pool_size must be positive"));
        }
        if self.generator.pool_size < self.portfolio.size {
            return Err(SlateError::invalid_config(format!(
                "generator.pool_size ({}) is smaller than portfolio.size ({})",
                self.generator.pool_size, self.portfolio.size
            )));
        }
        if self.generator.batch_size == 0 || self.generator.max_attempts_per_lineup == 0 {
            return Err(SlateError::invalid_config(
                "generator.batch_size and generator.max_attempts_per_lineup must be positive",
            ));
        }

        let schema = self.roster.resolve()?;
        schema.validate()?;
        if self.strategy.salary_floor > schema.salary_cap {
            return Err(SlateError::invalid_config(format!(
                "strategy.salary_floor ({}) exceeds the salary cap ({})",
                self.strategy.salary_floor, schema.salary_cap
            )));
        }
        if !(0.0..=1.0).contains(&self.data.default_std_dev_fraction) {
            return Err(SlateError::invalid_config(
                "data.default_std_dev_fraction must be in [0, 1]",
            ));
        }
        Ok(())
    }
}

impl SimulationConfig {
    pub fn validate(&self) -> Result<()> {
        if self.simulations == 0 {
            return Err(SlateError::invalid_config("simulation.simulations must be positive"));
        }
        if self.chunk_size == 0 {
            return Err(SlateError::invalid_config("simulation.chunk_size must be positive"));
        }
        if self.max_samples == 0 {
            return Err(SlateError::invalid_config("simulation.max_samples must be positive"));
        }
        if !(self.optimal_fraction > 0.0 && self.optimal_fraction <= 1.0) {
            return Err(SlateError::invalid_config(
                "simulation.optimal_fraction must be in (0, 1]",
            ));
        }
        if !(self.ceiling_percentile > 0.0 && self.ceiling_percentile < 1.0) {
            return Err(SlateError::invalid_config(
                "simulation.ceiling_percentile must be in (0, 1)",
            ));
        }
        if !(0.0..1.0).contains(&self.game_correlation) {
            return Err(SlateError::invalid_config(
                "simulation.game_correlation must be in [0, 1)",
            ));
        }
        Ok(())
    }
}

impl StrategyProfile {
    pub fn validate(&self) -> Result<()> {
        let (lo, hi) = self.ownership_band;
        if lo > hi || lo < 0.0 {
            return Err(SlateError::invalid_config(format!(
                "strategy.ownership_band ({lo}, {hi}) is not a valid range"
            )));
        }
        if self.temperature <= 0.0 || !self.temperature.is_finite() {
            return Err(SlateError::invalid_config("strategy.temperature must be positive"));
        }
        if !(0.0..=1.0).contains(&self.ceiling_weight) {
            return Err(SlateError::invalid_config("strategy.ceiling_weight must be in [0, 1]"));
        }
        if self.ownership_weight < 0.0 || self.correlation_weight < 0.0 {
            return Err(SlateError::invalid_config(
                "strategy weights must be non-negative",
            ));
        }
        Ok(())
    }
}

impl PortfolioConfig {
    pub fn validate(&self) -> Result<()> {
        if self.size == 0 {
            return Err(SlateError::invalid_config("portfolio.size must be positive"));
        }
        if self.archetypes.is_empty() {
            return Err(SlateError::invalid_config("portfolio.archetypes is empty"));
        }
        let allocated: usize = self.archetypes.iter().map(|a| a.allocation).sum();
        if allocated != self.size {
            return Err(SlateError::invalid_config(format!(
                "archetype allocations sum to {allocated}, portfolio size is {}",
                self.size
            )));
        }
        if !(0.0..=1.0).contains(&self.tolerance) {
            return Err(SlateError::invalid_config("portfolio.tolerance must be in [0, 1]"));
        }
        if self.tolerance_step <= 0.0 {
            return Err(SlateError::invalid_config("portfolio.tolerance_step must be positive"));
        }
        if self.max_tolerance < self.tolerance {
            return Err(SlateError::invalid_config(
                "portfolio.max_tolerance is below portfolio.tolerance",
            ));
        }
        for archetype in &self.archetypes {
            if let Some((lo, hi)) = archetype.ownership_band {
                if lo > hi {
                    return Err(SlateError::invalid_config(format!(
                        "archetype `{}` has an inverted ownership band",
                        archetype.name
                    )));
                }
            }
        }
        Ok(())
    }
}

impl ExposureConfig {
    /// Higher leverage must never map to a lower target
    pub fn validate(&self) -> Result<()> {
        let mut tiers = self.tiers.clone();
        tiers.sort_by(|a, b| a.min_leverage.total_cmp(&b.min_leverage));

        let mut previous = self.base_target;
        for tier in &tiers {
            if !(0.0..=1.0).contains(&tier.target) {
                return Err(SlateError::invalid_config(format!(
                    "exposure tier target {} outside [0, 1]",
                    tier.target
                )));
            }
            if tier.target < previous {
                return Err(SlateError::invalid_config(format!(
                    "exposure tiers are not monotone: leverage >= {} maps to {} below {}",
                    tier.min_leverage, tier.target, previous
                )));
            }
            previous = tier.target;
        }
        if !(0.0..=1.0).contains(&self.base_target) || !(0.0..=1.0).contains(&self.max_target) {
            return Err(SlateError::invalid_config(
                "exposure.base_target and exposure.max_target must be in [0, 1]",
            ));
        }
        if self.scarce_bonus < 0.0 {
            return Err(SlateError::invalid_config("exposure.scarce_bonus must be non-negative"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        AppConfig::default().validate().unwrap();
    }

    #[test]
    fn test_zero_simulations_rejected() {
        let mut config = AppConfig::default();
        config.simulation.simulations = 0;
        assert!(matches!(config.validate(), Err(SlateError::InvalidConfig(_))));
    }

    #[test]
    fn test_allocation_mismatch_rejected() {
        let mut config = AppConfig::default();
        config.portfolio.size = 6;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("allocations"));
    }

    #[test]
    fn test_non_monotone_tiers_rejected() {
        let mut config = AppConfig::default();
        config.exposure.tiers = vec![
            ExposureTier {
                min_leverage: 0.05,
                target: 0.3,
            },
            ExposureTier {
                min_leverage: 0.0,
                target: 0.8,
            },
        ];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_salary_floor_above_cap_rejected() {
        let mut config = AppConfig::default();
        config.strategy.salary_floor = 60_000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_overrides_defaults() {
        let raw = r#"
            [simulation]
            simulations = 2000
            seed = 7

            [portfolio]
            size = 2
            archetypes = [
                { name = "core", allocation = 2, preference = "max_score" },
            ]
        "#;
        let config: AppConfig = toml::from_str(raw).unwrap();
        assert_eq!(config.simulation.simulations, 2000);
        assert_eq!(config.simulation.seed, Some(7));
        assert_eq!(config.portfolio.archetypes.len(), 1);
        assert_eq!(config.generator.pool_size, 1000);
        config.validate().unwrap();
    }
}
