#![allow(dead_code)]

use slate::config::AppConfig;
use slate::domain::{DataPolicy, PlayerTable};
use slate::ingest::read_players_csv;

/// name, position, team, opponent, salary, projection, ownership %
pub type Row = (&'static str, &'static str, &'static str, &'static str, u32, f64, f64);

/// Two-game classic football slate: 20 players, a single defense
pub const SLATE: [Row; 20] = [
    ("Patrick Mahomes", "QB", "KC", "BUF", 8200, 24.0, 18.0),
    ("Tua Tagovailoa", "QB", "MIA", "NYJ", 6800, 19.0, 9.0),
    ("Isiah Pacheco", "RB", "KC", "BUF", 6500, 15.0, 14.0),
    ("James Cook", "RB", "BUF", "KC", 6200, 14.0, 12.0),
    ("De'Von Achane", "RB", "MIA", "NYJ", 7000, 17.0, 20.0),
    ("Breece Hall", "RB", "NYJ", "MIA", 7400, 16.5, 16.0),
    ("Clyde Edwards-Helaire", "RB", "KC", "BUF", 4500, 8.0, 3.0),
    ("Rashee Rice", "WR", "KC", "BUF", 6000, 14.0, 11.0),
    ("Stefon Diggs", "WR", "BUF", "KC", 7800, 18.0, 22.0),
    ("Tyreek Hill", "WR", "MIA", "NYJ", 8800, 21.0, 25.0),
    ("Jaylen Waddle", "WR", "MIA", "NYJ", 6600, 15.0, 10.0),
    ("Garrett Wilson", "WR", "NYJ", "MIA", 6900, 15.5, 13.0),
    ("Xavier Worthy", "WR", "KC", "BUF", 5200, 11.0, 6.0),
    ("Khalil Shakir", "WR", "BUF", "KC", 4800, 10.0, 5.0),
    ("Allen Lazard", "WR", "NYJ", "MIA", 3800, 7.0, 2.0),
    ("Travis Kelce", "TE", "KC", "BUF", 6400, 14.0, 15.0),
    ("Dalton Kincaid", "TE", "BUF", "KC", 4600, 9.0, 7.0),
    ("Jonnu Smith", "TE", "MIA", "NYJ", 3500, 6.0, 3.0),
    ("Tyler Conklin", "TE", "NYJ", "MIA", 3200, 5.0, 2.0),
    ("Bills", "DST", "BUF", "KC", 3000, 8.0, 10.0),
];

pub fn csv_text(rows: &[Row]) -> String {
    let mut out = String::from("Name,Pos,Team,Opp,Salary,Proj,Own %\n");
    for (name, pos, team, opp, salary, proj, own) in rows {
        out.push_str(&format!("{name},{pos},{team},{opp},{salary},{proj},{own}\n"));
    }
    out
}

pub fn load(rows: &[Row]) -> PlayerTable {
    read_players_csv(csv_text(rows).as_bytes(), &DataPolicy::default()).unwrap()
}

pub fn slate() -> PlayerTable {
    load(&SLATE)
}

/// Seeded, scaled-down configuration that keeps tests fast
pub fn config(seed: u64) -> AppConfig {
    let mut config = AppConfig::default();
    config.simulation.simulations = 2000;
    config.simulation.seed = Some(seed);
    config.generator.pool_size = 80;
    config.generator.batch_size = 64;
    config
}
