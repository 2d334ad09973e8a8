// 📊 Aggregator - Scored entries → standings views
//
// Pure reductions, recomputed from scratch on every run. Nothing here is
// stored between runs, so a leaderboard can never drift from its entries.

use crate::engine::ScoredEntry;
use crate::entities::Owner;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

// ============================================================================
// LEADERBOARD
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerTotal {
    pub owner: Owner,
    pub points: u32,
}

/// Total points per owner, in roster order.
///
/// Every rostered owner is listed, with 0 when nothing scored. An owner
/// that only appears in the entries is appended after them.
pub fn leaderboard(entries: &[ScoredEntry], owners: &[Owner]) -> Vec<OwnerTotal> {
    let mut totals: Vec<OwnerTotal> = owners
        .iter()
        .map(|o| OwnerTotal {
            owner: o.clone(),
            points: 0,
        })
        .collect();

    for entry in entries {
        match totals.iter_mut().find(|t| t.owner == entry.owner) {
            Some(total) => total.points += entry.points,
            None => totals.push(OwnerTotal {
                owner: entry.owner.clone(),
                points: entry.points,
            }),
        }
    }

    totals
}

/// Highest total first; tied owners keep roster order
pub fn ranked(board: &[OwnerTotal]) -> Vec<OwnerTotal> {
    let mut sorted = board.to_vec();
    sorted.sort_by(|a, b| b.points.cmp(&a.points));
    sorted
}

// ============================================================================
// RIDER TOTALS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiderTotal {
    pub rider: String,
    pub owner: Owner,
    pub points: u32,

    /// Scored finishes, zero-point ones included
    pub finishes: usize,
}

/// Points per (owner, rider) in first-encountered order. A traded rider
/// appears once per owner they scored for.
pub fn rider_totals(entries: &[ScoredEntry]) -> Vec<RiderTotal> {
    let mut totals: Vec<RiderTotal> = Vec::new();

    for entry in entries {
        match totals
            .iter_mut()
            .find(|t| t.owner == entry.owner && t.rider == entry.rider)
        {
            Some(total) => {
                total.points += entry.points;
                total.finishes += 1;
            }
            None => totals.push(RiderTotal {
                rider: entry.rider.clone(),
                owner: entry.owner.clone(),
                points: entry.points,
                finishes: 1,
            }),
        }
    }

    totals
}

/// Best `n` scorers for one owner; ties keep first-encountered order
pub fn top_riders<'a>(totals: &'a [RiderTotal], owner: &Owner, n: usize) -> Vec<&'a RiderTotal> {
    let mut mine: Vec<&RiderTotal> = totals.iter().filter(|t| &t.owner == owner).collect();
    mine.sort_by(|a, b| b.points.cmp(&a.points));
    mine.truncate(n);
    mine
}

// ============================================================================
// HISTORY
// ============================================================================

/// Where entries without any known date go in the history view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UndatedPlacement {
    #[default]
    Last,
    Exclude,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryPolicy {
    pub undated: UndatedPlacement,
    pub include_zero_points: bool,
}

impl Default for HistoryPolicy {
    fn default() -> Self {
        HistoryPolicy {
            undated: UndatedPlacement::Last,
            include_zero_points: true,
        }
    }
}

/// Most recent first: date desc, then event desc, then rank asc
pub fn history<'a>(entries: &'a [ScoredEntry], policy: &HistoryPolicy) -> Vec<&'a ScoredEntry> {
    let mut selected: Vec<&ScoredEntry> = entries
        .iter()
        .filter(|e| policy.include_zero_points || e.points > 0)
        .filter(|e| e.date.is_some() || policy.undated == UndatedPlacement::Last)
        .collect();

    selected.sort_by(|a, b| {
        newest_first(a.date, b.date)
            .then_with(|| b.event.cmp(&a.event))
            .then_with(|| a.rank.cmp(&b.rank))
    });

    selected
}

fn newest_first(a: Option<NaiveDate>, b: Option<NaiveDate>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

// ============================================================================
// CUMULATIVE STANDINGS
// ============================================================================

/// One owner's position after one event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventStanding {
    pub event: usize,
    pub race_name: String,
    pub stage: Option<String>,
    pub date: Option<NaiveDate>,
    pub owner: Owner,

    /// Points scored in this event
    pub points: u32,

    /// Points scored up to and including this event
    pub running_total: u32,
}

/// Running totals event by event, every owner at every event.
///
/// Events are ordered by sequence number; events sharing a number keep
/// first-encountered order. The last event's running totals equal the
/// leaderboard.
pub fn cumulative_standings(entries: &[ScoredEntry], owners: &[Owner]) -> Vec<EventStanding> {
    struct Event<'a> {
        event: usize,
        race_name: &'a str,
        stage: Option<&'a str>,
        date: Option<NaiveDate>,
        entries: Vec<&'a ScoredEntry>,
    }

    let mut events: Vec<Event> = Vec::new();
    for entry in entries {
        let existing = events.iter_mut().find(|ev| {
            ev.event == entry.event
                && ev.race_name == entry.race_name
                && ev.stage == entry.stage.as_deref()
        });
        match existing {
            Some(ev) => ev.entries.push(entry),
            None => events.push(Event {
                event: entry.event,
                race_name: &entry.race_name,
                stage: entry.stage.as_deref(),
                date: entry.date,
                entries: vec![entry],
            }),
        }
    }
    events.sort_by_key(|ev| ev.event);

    let mut running: Vec<(Owner, u32)> = owners.iter().map(|o| (o.clone(), 0)).collect();
    for entry in entries {
        if !running.iter().any(|(o, _)| o == &entry.owner) {
            running.push((entry.owner.clone(), 0));
        }
    }

    let mut standings = Vec::with_capacity(events.len() * running.len());
    for ev in &events {
        for (owner, total) in running.iter_mut() {
            let points: u32 = ev
                .entries
                .iter()
                .filter(|e| &e.owner == owner)
                .map(|e| e.points)
                .sum();
            *total += points;

            standings.push(EventStanding {
                event: ev.event,
                race_name: ev.race_name.to_string(),
                stage: ev.stage.map(str::to_string),
                date: ev.date,
                owner: owner.clone(),
                points,
                running_total: *total,
            });
        }
    }

    standings
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::MatchStrategy;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn scored(owner: &str, rider: &str, event: usize, date: Option<NaiveDate>, rank: u32, points: u32) -> ScoredEntry {
        ScoredEntry {
            owner: Owner::new(owner),
            race_name: format!("Race {}", event),
            stage: None,
            date,
            event,
            rider: rider.to_string(),
            rank,
            points,
            matched_by: MatchStrategy::Exact,
        }
    }

    fn owners(names: &[&str]) -> Vec<Owner> {
        names.iter().map(|n| Owner::new(*n)).collect()
    }

    #[test]
    fn test_leaderboard_lists_every_owner() {
        let entries = vec![scored("Bob", "Mads Pedersen", 1, None, 1, 20)];
        let board = leaderboard(&entries, &owners(&["Alice", "Bob"]));

        assert_eq!(
            board,
            vec![
                OwnerTotal { owner: Owner::new("Alice"), points: 0 },
                OwnerTotal { owner: Owner::new("Bob"), points: 20 },
            ]
        );
    }

    #[test]
    fn test_leaderboard_empty_entries() {
        let board = leaderboard(&[], &owners(&["Alice", "Bob"]));
        assert_eq!(board.len(), 2);
        assert!(board.iter().all(|t| t.points == 0));
    }

    #[test]
    fn test_ranked_keeps_ties_in_roster_order() {
        let entries = vec![
            scored("Alice", "Tadej Pogacar", 1, None, 1, 30),
            scored("Bob", "Jonas Vingegaard", 2, None, 1, 30),
            scored("Cara", "Remco Evenepoel", 2, None, 2, 27),
        ];
        let board = leaderboard(&entries, &owners(&["Cara", "Alice", "Bob"]));
        let ordered = ranked(&board);
        let order: Vec<&str> = ordered.iter().map(|t| t.owner.as_str()).collect();
        assert_eq!(order, vec!["Alice", "Bob", "Cara"]);
    }

    #[test]
    fn test_rider_totals_sum_to_leaderboard() {
        let entries = vec![
            scored("Alice", "Tadej Pogacar", 1, None, 1, 30),
            scored("Bob", "Jonas Vingegaard", 1, None, 2, 27),
            scored("Alice", "Tadej Pogacar", 2, None, 3, 16),
            scored("Alice", "Remco Evenepoel", 2, None, 12, 0),
        ];
        let board = leaderboard(&entries, &owners(&["Alice", "Bob"]));
        let totals = rider_totals(&entries);

        assert_eq!(totals.len(), 3);
        assert_eq!(totals[0].rider, "Tadej Pogacar");
        assert_eq!(totals[0].points, 46);
        assert_eq!(totals[0].finishes, 2);

        for owner_total in &board {
            let sum: u32 = totals
                .iter()
                .filter(|t| t.owner == owner_total.owner)
                .map(|t| t.points)
                .sum();
            assert_eq!(sum, owner_total.points);
        }
    }

    #[test]
    fn test_traded_rider_totals_split_by_owner() {
        let entries = vec![
            scored("Alice", "Remco Evenepoel", 1, None, 1, 30),
            scored("Bob", "Remco Evenepoel", 2, None, 1, 30),
        ];
        let totals = rider_totals(&entries);
        assert_eq!(totals.len(), 2);
        assert_eq!(totals[1].owner.as_str(), "Bob");
    }

    #[test]
    fn test_top_riders_stable() {
        let entries = vec![
            scored("Alice", "A", 1, None, 1, 10),
            scored("Alice", "B", 1, None, 2, 30),
            scored("Bob", "X", 1, None, 3, 50),
            scored("Alice", "C", 1, None, 4, 10),
            scored("Alice", "D", 1, None, 5, 5),
        ];
        let totals = rider_totals(&entries);
        let top: Vec<&str> = top_riders(&totals, &Owner::new("Alice"), 3)
            .iter()
            .map(|t| t.rider.as_str())
            .collect();
        assert_eq!(top, vec!["B", "A", "C"]);
        assert!(top_riders(&totals, &Owner::new("Nobody"), 3).is_empty());
    }

    #[test]
    fn test_history_order() {
        let entries = vec![
            scored("Alice", "A", 1, Some(d(2026, 7, 4)), 2, 27),
            scored("Alice", "B", 1, Some(d(2026, 7, 4)), 1, 30),
            scored("Bob", "C", 2, Some(d(2026, 7, 4)), 5, 18),
            scored("Bob", "D", 3, None, 1, 10),
            scored("Alice", "E", 0, Some(d(2026, 8, 1)), 1, 20),
        ];
        let ordered: Vec<&str> = history(&entries, &HistoryPolicy::default())
            .iter()
            .map(|e| e.rider.as_str())
            .collect();
        assert_eq!(ordered, vec!["E", "C", "B", "A", "D"]);
    }

    #[test]
    fn test_history_policy() {
        let entries = vec![
            scored("Alice", "A", 1, Some(d(2026, 7, 4)), 1, 30),
            scored("Alice", "B", 1, Some(d(2026, 7, 4)), 14, 0),
            scored("Bob", "C", 2, None, 1, 10),
        ];

        let policy = HistoryPolicy {
            undated: UndatedPlacement::Exclude,
            include_zero_points: false,
        };
        let ordered: Vec<&str> = history(&entries, &policy).iter().map(|e| e.rider.as_str()).collect();
        assert_eq!(ordered, vec!["A"]);

        assert_eq!(history(&entries, &HistoryPolicy::default()).len(), 3);
    }

    #[test]
    fn test_history_policy_defaults_from_partial_json() {
        let policy: HistoryPolicy = serde_json::from_str(r#"{"undated": "exclude"}"#).unwrap();
        assert_eq!(policy.undated, UndatedPlacement::Exclude);
        assert!(policy.include_zero_points);
    }

    #[test]
    fn test_cumulative_standings() {
        let entries = vec![
            scored("Alice", "A", 1, Some(d(2026, 7, 4)), 1, 30),
            scored("Bob", "B", 1, Some(d(2026, 7, 4)), 2, 27),
            scored("Alice", "A", 2, Some(d(2026, 7, 5)), 3, 24),
        ];
        let owner_list = owners(&["Alice", "Bob"]);
        let standings = cumulative_standings(&entries, &owner_list);

        assert_eq!(standings.len(), 4);
        let rows: Vec<(usize, &str, u32, u32)> = standings
            .iter()
            .map(|s| (s.event, s.owner.as_str(), s.points, s.running_total))
            .collect();
        assert_eq!(
            rows,
            vec![
                (1, "Alice", 30, 30),
                (1, "Bob", 27, 27),
                (2, "Alice", 24, 54),
                (2, "Bob", 0, 27),
            ]
        );

        let board = leaderboard(&entries, &owner_list);
        for total in &board {
            let last = standings.iter().rev().find(|s| s.owner == total.owner).unwrap();
            assert_eq!(last.running_total, total.points);
        }
    }

    #[test]
    fn test_cumulative_standings_empty() {
        assert!(cumulative_standings(&[], &owners(&["Alice"])).is_empty());
    }
}
