//! Slot candidate lists and up-front feasibility checks.
//!
//! Cheap necessary conditions are checked before any search so that an
//! impossible schema fails fast with the offending slots named.

use tracing::debug;

use crate::domain::{PlayerId, PlayerTable, RosterSchema};
use crate::error::{Result, SlateError};

/// Eligible players per slot, cheapest slot salary first
#[derive(Debug, Clone)]
pub struct SlotPool {
    candidates: Vec<Vec<(PlayerId, u32)>>,
}

impl SlotPool {
    pub fn build(table: &PlayerTable, schema: &RosterSchema) -> Self {
        let candidates = schema
            .slots
            .iter()
            .enumerate()
            .map(|(idx, slot)| {
                let mut eligible: Vec<(PlayerId, u32)> = table
                    .players()
                    .iter()
                    .filter(|p| slot.accepts(p))
                    .map(|p| (p.id, schema.slot_salary(idx, p)))
                    .collect();
                eligible.sort_by_key(|(id, salary)| (*salary, *id));
                eligible
            })
            .collect();
        Self { candidates }
    }

    /// (player, slot salary) pairs for `slot`
    pub fn candidates(&self, slot: usize) -> &[(PlayerId, u32)] {
        &self.candidates[slot]
    }

    pub fn slot_count(&self) -> usize {
        self.candidates.len()
    }

    /// Cheapest salary that fills `slots` with distinct players outside `used`.
    ///
    /// Solved as a min-cost assignment. Only each slot's `slots.len()`
    /// cheapest unused candidates can appear in an optimal fill, so the
    /// problem stays small. Returns a slot that cannot be filled as the error.
    pub fn reserve(&self, slots: &[usize], used: &[PlayerId]) -> std::result::Result<u32, usize> {
        let n = slots.len();
        if n == 0 {
            return Ok(0);
        }

        let mut columns: Vec<PlayerId> = Vec::new();
        let mut shortlists: Vec<Vec<(PlayerId, u32)>> = Vec::with_capacity(n);
        for slot in slots {
            let shortlist: Vec<(PlayerId, u32)> = self.candidates[*slot]
                .iter()
                .filter(|(id, _)| !used.contains(id))
                .take(n)
                .copied()
                .collect();
            if shortlist.is_empty() {
                return Err(*slot);
            }
            for (id, _) in &shortlist {
                if !columns.contains(id) {
                    columns.push(*id);
                }
            }
            shortlists.push(shortlist);
        }
        if columns.len() < n {
            return Err(slots[0]);
        }

        let cost: Vec<Vec<i64>> = shortlists
            .iter()
            .map(|shortlist| {
                columns
                    .iter()
                    .map(|col| {
                        shortlist
                            .iter()
                            .find(|(id, _)| id == col)
                            .map_or(UNREACHABLE, |(_, salary)| i64::from(*salary))
                    })
                    .collect()
            })
            .collect();

        let assignment = min_cost_assignment(&cost, columns.len());
        let mut total = 0i64;
        for (row, col) in assignment.iter().enumerate() {
            let edge = cost[row][*col];
            if edge >= UNREACHABLE {
                return Err(slots[row]);
            }
            total += edge;
        }
        Ok(u32::try_from(total).unwrap_or(u32::MAX))
    }
}

/// Cost of a slot/player pair that is not eligible
const UNREACHABLE: i64 = 1 << 40;

/// Hungarian method over `cost` (rows are slots, `width >= rows` columns).
///
/// Returns the column assigned to each row.
fn min_cost_assignment(cost: &[Vec<i64>], width: usize) -> Vec<usize> {
    let rows = cost.len();
    let mut u = vec![0i64; rows + 1];
    let mut v = vec![0i64; width + 1];
    // owner[j]: 1-based row holding column j; column 0 is the virtual root
    let mut owner = vec![0usize; width + 1];
    let mut way = vec![0usize; width + 1];

    for row in 1..=rows {
        owner[0] = row;
        let mut col = 0usize;
        let mut min_slack = vec![i64::MAX; width + 1];
        let mut visited = vec![false; width + 1];
        loop {
            visited[col] = true;
            let current = owner[col];
            let mut delta = i64::MAX;
            let mut next = 0usize;
            for j in 1..=width {
                if visited[j] {
                    continue;
                }
                let slack = cost[current - 1][j - 1] - u[current] - v[j];
                if slack < min_slack[j] {
                    min_slack[j] = slack;
                    way[j] = col;
                }
                if min_slack[j] < delta {
                    delta = min_slack[j];
                    next = j;
                }
            }
            for j in 0..=width {
                if visited[j] {
                    u[owner[j]] += delta;
                    v[j] -= delta;
                } else {
                    min_slack[j] -= delta;
                }
            }
            col = next;
            if owner[col] == 0 {
                break;
            }
        }
        while col != 0 {
            let prev = way[col];
            owner[col] = owner[prev];
            col = prev;
        }
    }

    let mut assignment = vec![0usize; rows];
    for j in 1..=width {
        if owner[j] != 0 {
            assignment[owner[j] - 1] = j - 1;
        }
    }
    assignment
}

/// Build the slot pool, rejecting schemas the player table cannot satisfy
pub fn check(table: &PlayerTable, schema: &RosterSchema) -> Result<SlotPool> {
    let pool = SlotPool::build(table, schema);
    let slot_name = |idx: usize| schema.slots[idx].name.clone();

    let empty: Vec<String> = (0..pool.slot_count())
        .filter(|idx| pool.candidates(*idx).is_empty())
        .map(slot_name)
        .collect();
    if !empty.is_empty() {
        return Err(SlateError::infeasible(empty, "no eligible player"));
    }

    let over_cap: Vec<String> = (0..pool.slot_count())
        .filter(|idx| pool.candidates(*idx)[0].1 > schema.salary_cap)
        .map(slot_name)
        .collect();
    if !over_cap.is_empty() {
        return Err(SlateError::infeasible(
            over_cap,
            format!(
                "cheapest eligible player exceeds the {} salary cap",
                schema.salary_cap
            ),
        ));
    }

    let deficient = hall_violation(&pool, table.len());
    if !deficient.is_empty() {
        return Err(SlateError::infeasible(
            deficient.into_iter().map(slot_name).collect(),
            "fewer distinct eligible players than slots",
        ));
    }

    let all: Vec<usize> = (0..pool.slot_count()).collect();
    let minimum = pool
        .reserve(&all, &[])
        .map_err(|slot| SlateError::infeasible(vec![slot_name(slot)], "no distinct fill for slot"))?;
    if minimum > schema.salary_cap {
        return Err(SlateError::infeasible(
            schema.slots.iter().map(|s| s.name.clone()).collect(),
            format!(
                "cheapest possible fill {minimum} exceeds the {} salary cap",
                schema.salary_cap
            ),
        ));
    }

    debug!(
        slots = pool.slot_count(),
        min_fill = minimum,
        cap = schema.salary_cap,
        "schema feasible"
    );
    Ok(pool)
}

/// Slots that cannot all receive distinct players.
///
/// Runs a maximum bipartite matching; for each unmatched slot, every slot
/// reachable through alternating paths belongs to the deficient set.
fn hall_violation(pool: &SlotPool, player_count: usize) -> Vec<usize> {
    let slots = pool.slot_count();
    let mut owner: Vec<Option<usize>> = vec![None; player_count];

    let mut unmatched = Vec::new();
    for slot in 0..slots {
        let mut visited = vec![false; player_count];
        if !augment(slot, pool, &mut visited, &mut owner) {
            unmatched.push(slot);
        }
    }
    if unmatched.is_empty() {
        return Vec::new();
    }

    let mut in_set = vec![false; slots];
    let mut stack = unmatched;
    while let Some(slot) = stack.pop() {
        if in_set[slot] {
            continue;
        }
        in_set[slot] = true;
        for (player, _) in pool.candidates(slot) {
            if let Some(other) = owner[*player] {
                if !in_set[other] {
                    stack.push(other);
                }
            }
        }
    }
    (0..slots).filter(|s| in_set[*s]).collect()
}

fn augment(slot: usize, pool: &SlotPool, visited: &mut [bool], owner: &mut [Option<usize>]) -> bool {
    for (player, _) in pool.candidates(slot) {
        if visited[*player] {
            continue;
        }
        visited[*player] = true;
        let free = match owner[*player] {
            None => true,
            Some(other) => augment(other, pool, visited, owner),
        };
        if free {
            owner[*player] = Some(slot);
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Player, Slot, StackRules};

    fn player(pos: &str, salary: u32) -> Player {
        Player {
            id: 0,
            name: format!("{pos}{salary}"),
            positions: vec![pos.into()],
            team: "T".into(),
            opponent: None,
            game: "G".into(),
            salary,
            projection: 10.0,
            std_dev: 2.0,
            ownership: 0.1,
        }
    }

    fn schema(slots: Vec<Slot>, cap: u32) -> RosterSchema {
        RosterSchema {
            name: "test".into(),
            slots,
            salary_cap: cap,
            multiplier: None,
            stack_rules: StackRules::default(),
        }
    }

    #[test]
    fn test_candidates_sorted_by_salary() {
        let table = PlayerTable::from_players(vec![player("A", 5000), player("A", 3000)]).unwrap();
        let pool = check(&table, &schema(vec![Slot::new("A", &["A"])], 10_000)).unwrap();
        assert_eq!(pool.candidates(0), &[(1, 3000), (0, 5000)]);
        assert_eq!(pool.reserve(&[0], &[1]), Ok(5000));
        assert_eq!(pool.reserve(&[0], &[0, 1]), Err(0));
    }

    #[test]
    fn test_missing_position_named() {
        let table = PlayerTable::from_players(vec![player("A", 5000)]).unwrap();
        let s = schema(vec![Slot::new("A", &["A"]), Slot::new("B", &["B"])], 10_000);
        match check(&table, &s) {
            Err(SlateError::ConstraintInfeasible { slots, .. }) => assert_eq!(slots, vec!["B"]),
            other => panic!("expected infeasible, got {other:?}"),
        }
    }

    #[test]
    fn test_too_few_distinct_players() {
        let table = PlayerTable::from_players(vec![
            player("WR", 5000),
            player("WR", 4000),
            player("RB", 4000),
        ])
        .unwrap();
        let s = schema(
            vec![
                Slot::new("RB", &["RB"]),
                Slot::new("WR1", &["WR"]),
                Slot::new("WR2", &["WR"]),
                Slot::new("FLEX", &["WR"]),
            ],
            50_000,
        );
        match check(&table, &s) {
            Err(SlateError::ConstraintInfeasible { slots, .. }) => {
                assert_eq!(slots, vec!["WR1", "WR2", "FLEX"]);
            }
            other => panic!("expected infeasible, got {other:?}"),
        }
    }

    #[test]
    fn test_single_player_over_cap() {
        let table = PlayerTable::from_players(vec![player("QB", 60_000), player("WR", 4000)]).unwrap();
        let s = schema(vec![Slot::new("QB", &["QB"]), Slot::new("WR", &["WR"])], 50_000);
        match check(&table, &s) {
            Err(SlateError::ConstraintInfeasible { slots, .. }) => assert_eq!(slots, vec!["QB"]),
            other => panic!("expected infeasible, got {other:?}"),
        }
    }

    #[test]
    fn test_reserve_counts_a_shared_cheap_player_once() {
        let table = PlayerTable::from_players(vec![
            player("WR", 3000),
            player("WR", 6000),
            player("WR", 7000),
        ])
        .unwrap();
        let s = schema(vec![Slot::new("WR1", &["WR"]), Slot::new("WR2", &["WR"])], 50_000);
        let pool = check(&table, &s).unwrap();
        assert_eq!(pool.reserve(&[0, 1], &[]), Ok(9000));
        assert_eq!(pool.reserve(&[0, 1], &[0]), Ok(13_000));
        assert_eq!(pool.reserve(&[0, 1], &[0, 1]), Err(0));
    }

    #[test]
    fn test_reserve_routes_cheap_player_to_the_tighter_slot() {
        // FLEX can take the cheap WR or the RB; WR must take a WR
        let table = PlayerTable::from_players(vec![
            player("WR", 3000),
            player("WR", 8000),
            player("RB", 4000),
        ])
        .unwrap();
        let s = schema(vec![Slot::new("FLEX", &["WR", "RB"]), Slot::new("WR", &["WR"])], 50_000);
        let pool = check(&table, &s).unwrap();
        assert_eq!(pool.reserve(&[0, 1], &[]), Ok(7000));
    }

    #[test]
    fn test_shared_cheap_player_pushes_fill_over_cap() {
        // Two WR slots cannot both use the 3000 WR: 3000 + 8000 > 10000
        let table = PlayerTable::from_players(vec![player("WR", 3000), player("WR", 8000)]).unwrap();
        let s = schema(vec![Slot::new("WR1", &["WR"]), Slot::new("WR2", &["WR"])], 10_000);
        let err = check(&table, &s).unwrap_err();
        assert!(err.to_string().contains("11000"), "{err}");
    }

    #[test]
    fn test_minimum_fill_over_cap() {
        let table = PlayerTable::from_players(vec![player("A", 6000), player("B", 6000)]).unwrap();
        let s = schema(vec![Slot::new("A", &["A"]), Slot::new("B", &["B"])], 10_000);
        let err = check(&table, &s).unwrap_err();
        assert!(err.to_string().contains("12000"));
    }
}
