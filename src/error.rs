use thiserror::Error;

/// Main error type for the optimizer
#[derive(Error, Debug)]
pub enum SlateError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // Player table errors
    #[error("Data error: {0}")]
    Data(#[from] DataError),

    // Search errors
    #[error("Constraint infeasible: {reason} (slots: {})", slots.join(", "))]
    ConstraintInfeasible { slots: Vec<String>, reason: String },

    #[error("Insufficient lineup pool: need {required} distinct lineups, have {available}")]
    InsufficientPool { required: usize, available: usize },

    #[error("No lineup for archetype `{archetype}` within exposure tolerance {tolerance:.2}")]
    ExposureUnsatisfiable { archetype: String, tolerance: f64 },

    // Serialization errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl SlateError {
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        SlateError::InvalidConfig(msg.into())
    }

    pub fn infeasible(slots: Vec<String>, reason: impl Into<String>) -> Self {
        SlateError::ConstraintInfeasible {
            slots,
            reason: reason.into(),
        }
    }
}

/// Result type alias for SlateError
pub type Result<T> = std::result::Result<T, SlateError>;

/// Malformed or missing player table fields
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DataError {
    #[error("Row {row}: missing required field `{field}`")]
    MissingField { row: usize, field: String },

    #[error("Row {row}: field `{field}` has unparseable value `{value}`")]
    Unparseable {
        row: usize,
        field: String,
        value: String,
    },

    #[error("Player {name}: salary must be positive, got {salary}")]
    InvalidSalary { name: String, salary: i64 },

    #[error("Player {name}: ownership {ownership} outside [0, 1]")]
    OwnershipOutOfRange { name: String, ownership: f64 },

    #[error("Player {name}: projection is not finite")]
    NonFiniteProjection { name: String },

    #[error("Player {name}: no game group (give `game` or both `team` and `opponent`)")]
    MissingGameGroup { name: String },

    #[error("Duplicate player: {name} ({team})")]
    DuplicatePlayer { name: String, team: String },

    #[error("Player table is empty")]
    EmptyTable,

    #[error("Unmapped required columns: {}", .0.join(", "))]
    UnmappedColumns(Vec<String>),
}
