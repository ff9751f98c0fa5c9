//! Player table ingestion from CSV and JSON.
//!
//! Header matching is a pure function over the observed header strings: it
//! returns which column feeds which field and lists the required fields it
//! could not find, instead of failing on the first missing lookup.

use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::Serialize;
use tracing::{debug, info};

use crate::domain::{DataPolicy, PlayerRecord, PlayerTable};
use crate::error::{DataError, Result};

/// Canonical player table fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Name,
    Position,
    Team,
    Opponent,
    Game,
    Salary,
    Projection,
    StdDev,
    Ownership,
}

impl Field {
    pub const ALL: [Field; 9] = [
        Field::Name,
        Field::Position,
        Field::Team,
        Field::Opponent,
        Field::Game,
        Field::Salary,
        Field::Projection,
        Field::StdDev,
        Field::Ownership,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Name => "name",
            Field::Position => "position",
            Field::Team => "team",
            Field::Opponent => "opponent",
            Field::Game => "game",
            Field::Salary => "salary",
            Field::Projection => "projection",
            Field::StdDev => "std_dev",
            Field::Ownership => "ownership",
        }
    }

    /// Normalized header spellings accepted for this field
    fn aliases(&self) -> &'static [&'static str] {
        match self {
            Field::Name => &["name", "player", "player name", "playername", "nickname"],
            Field::Position => &["position", "pos", "positions"],
            Field::Team => &["team", "tm", "teamabbrev", "team abbrev"],
            Field::Opponent => &["opponent", "opp", "vs"],
            Field::Game => &["game", "game info", "matchup", "game id"],
            Field::Salary => &["salary", "sal", "price", "cost"],
            Field::Projection => &["projection", "proj", "fpts", "points", "projected points", "proj pts"],
            Field::StdDev => &["stddev", "std dev", "std_dev", "sd", "stdev", "std"],
            Field::Ownership => &["ownership", "own", "own %", "own%", "projected ownership", "pown", "pown%"],
        }
    }

    /// Opponent, game and std dev can be derived or defaulted
    pub fn is_required(&self) -> bool {
        !matches!(self, Field::Opponent | Field::Game | Field::StdDev)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of matching observed headers against the canonical fields
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HeaderMapping {
    /// Field -> column index, first matching column wins
    pub columns: Vec<(Field, usize)>,
    pub unmapped_required: Vec<Field>,
    /// Headers that matched no field
    pub ignored: Vec<String>,
}

impl HeaderMapping {
    pub fn column(&self, field: Field) -> Option<usize> {
        self.columns.iter().find(|(f, _)| *f == field).map(|(_, c)| *c)
    }

    pub fn is_complete(&self) -> bool {
        self.unmapped_required.is_empty()
    }
}

/// Trim, fold non-breaking spaces and case, collapse inner whitespace
pub fn normalize_header(raw: &str) -> String {
    raw.replace('\u{a0}', " ")
        .trim()
        .trim_matches('"')
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

pub fn map_headers<I, S>(headers: I) -> HeaderMapping
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut mapping = HeaderMapping::default();
    for (idx, raw) in headers.into_iter().enumerate() {
        let normalized = normalize_header(raw.as_ref());
        let field = Field::ALL
            .iter()
            .find(|f| f.aliases().contains(&normalized.as_str()));
        match field {
            Some(f) if mapping.column(*f).is_none() => mapping.columns.push((*f, idx)),
            Some(_) => mapping.ignored.push(raw.as_ref().to_string()),
            None => mapping.ignored.push(raw.as_ref().to_string()),
        }
    }
    mapping.unmapped_required = Field::ALL
        .iter()
        .copied()
        .filter(|f| f.is_required() && mapping.column(*f).is_none())
        .collect();
    mapping
}

/// Read a CSV player table with flexible headers
pub fn read_players_csv<R: Read>(reader: R, policy: &DataPolicy) -> Result<PlayerTable> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let headers = rdr.headers()?.clone();
    let mapping = map_headers(headers.iter());
    if !mapping.is_complete() {
        let missing = mapping
            .unmapped_required
            .iter()
            .map(|f| f.as_str().to_string())
            .collect();
        return Err(DataError::UnmappedColumns(missing).into());
    }
    debug!(columns = mapping.columns.len(), ignored = ?mapping.ignored, "csv headers mapped");

    let mut records = Vec::new();
    for (row, result) in rdr.records().enumerate() {
        let record = result?;
        let text = |field: Field| {
            mapping
                .column(field)
                .and_then(|c| record.get(c))
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };
        records.push(PlayerRecord {
            name: text(Field::Name),
            position: text(Field::Position),
            team: text(Field::Team),
            opponent: text(Field::Opponent),
            game: text(Field::Game),
            salary: parse_salary(row, text(Field::Salary))?,
            projection: parse_number(row, Field::Projection, text(Field::Projection))?,
            std_dev: parse_number(row, Field::StdDev, text(Field::StdDev))?,
            ownership: parse_number(row, Field::Ownership, text(Field::Ownership))?,
        });
    }

    info!(rows = records.len(), "csv player rows read");
    PlayerTable::from_records(records, policy)
}

/// Read a JSON array of player records
pub fn read_players_json<R: Read>(reader: R, policy: &DataPolicy) -> Result<PlayerTable> {
    let records: Vec<PlayerRecord> = serde_json::from_reader(reader)?;
    info!(rows = records.len(), "json player rows read");
    PlayerTable::from_records(records, policy)
}

/// Dispatch on file extension (`.json`, anything else is CSV)
pub fn load_players(path: &Path, policy: &DataPolicy) -> Result<PlayerTable> {
    let file = File::open(path)?;
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("json") => read_players_json(file, policy),
        _ => read_players_csv(file, policy),
    }
}

fn unparseable(row: usize, field: Field, value: String) -> DataError {
    DataError::Unparseable {
        row,
        field: field.as_str().to_string(),
        value,
    }
}

/// Numbers like "12.5" or "12.5%"
fn parse_number(row: usize, field: Field, value: Option<String>) -> std::result::Result<Option<f64>, DataError> {
    match value {
        None => Ok(None),
        Some(v) => v
            .trim_end_matches('%')
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| unparseable(row, field, v)),
    }
}

/// Salaries like "$5,400" or "5400.0"
fn parse_salary(row: usize, value: Option<String>) -> std::result::Result<Option<i64>, DataError> {
    match value {
        None => Ok(None),
        Some(v) => {
            let cleaned: String = v.chars().filter(|c| *c != '$' && *c != ',').collect();
            cleaned
                .parse::<i64>()
                .ok()
                .or_else(|| cleaned.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f.round() as i64))
                .map(Some)
                .ok_or_else(|| unparseable(row, Field::Salary, v))
        }
    }
}
