// 🎯 Scoring Engine - Results × roster × catalog → scored entries
//
// For every finisher:
//   1. race name → catalog          (miss → dropped, race_not_in_catalog)
//   2. rider name → normalized key
//   3. key + date → owner           (miss → dropped, not_rostered)
//                                   (ambiguous → excluded, conflict recorded)
//   4. tier × rank → points         (outside the table → 0, still emitted)
//
// Deterministic and free of I/O: same inputs, same outcome.

use crate::entities::{MatchStrategy, Owner, RaceCatalog, Resolution, RosterConflict, RosterRegistry};
use crate::normalize::normalize_with;
use crate::parser::ResultEntry;
use crate::scoring::ScoringTable;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ============================================================================
// SCORED ENTRY
// ============================================================================

/// A finish that counts for an owner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoredEntry {
    pub owner: Owner,
    pub race_name: String,
    pub stage: Option<String>,

    /// Entry date, falling back to the race's scheduled date
    pub date: Option<NaiveDate>,

    pub event: usize,

    /// Rider display name as drafted
    pub rider: String,

    pub rank: u32,
    pub points: u32,
    pub matched_by: MatchStrategy,
}

// ============================================================================
// OUTCOME
// ============================================================================

/// Entries that never reached an owner
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropCounts {
    pub race_not_in_catalog: usize,
    pub not_rostered: usize,
    pub ambiguous: usize,
}

impl DropCounts {
    pub fn total(&self) -> usize {
        self.race_not_in_catalog + self.not_rostered + self.ambiguous
    }
}

/// What happened to a single result entry
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Scored(ScoredEntry),
    RaceNotInCatalog,
    NotRostered,
    Ambiguous(RosterConflict),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoringOutcome {
    /// In input order
    pub entries: Vec<ScoredEntry>,

    pub drops: DropCounts,

    /// Distinct roster conflicts hit while scoring
    pub conflicts: Vec<RosterConflict>,
}

impl ScoringOutcome {
    pub fn total_points(&self) -> u32 {
        self.entries.iter().map(|e| e.points).sum()
    }

    pub fn summary(&self) -> String {
        format!(
            "{} scored ({} pts), {} dropped: {} race not in catalog, {} not rostered, {} ambiguous",
            self.entries.len(),
            self.total_points(),
            self.drops.total(),
            self.drops.race_not_in_catalog,
            self.drops.not_rostered,
            self.drops.ambiguous
        )
    }
}

// ============================================================================
// SCORING ENGINE
// ============================================================================

pub struct ScoringEngine {
    table: ScoringTable,
}

impl ScoringEngine {
    /// Engine with the standard points table
    pub fn new() -> Self {
        ScoringEngine {
            table: ScoringTable::standard(),
        }
    }

    /// Builder pattern: use a custom points table
    pub fn with_table(mut self, table: ScoringTable) -> Self {
        self.table = table;
        self
    }

    pub fn table(&self) -> &ScoringTable {
        &self.table
    }

    /// Score every entry; drops and conflicts are collected, never fatal
    pub fn score(
        &self,
        entries: &[ResultEntry],
        catalog: &RaceCatalog,
        registry: &RosterRegistry,
    ) -> ScoringOutcome {
        let mut outcome = ScoringOutcome::default();

        for entry in entries {
            match self.score_entry(entry, catalog, registry) {
                Verdict::Scored(scored) => outcome.entries.push(scored),
                Verdict::RaceNotInCatalog => outcome.drops.race_not_in_catalog += 1,
                Verdict::NotRostered => outcome.drops.not_rostered += 1,
                Verdict::Ambiguous(conflict) => {
                    outcome.drops.ambiguous += 1;
                    if !outcome.conflicts.contains(&conflict) {
                        tracing::warn!("Excluding {} in {}: {}", entry.rider_name, entry.race_name, conflict);
                        outcome.conflicts.push(conflict);
                    }
                }
            }
        }

        tracing::info!("Scoring: {}", outcome.summary());
        outcome
    }

    pub fn score_entry(
        &self,
        entry: &ResultEntry,
        catalog: &RaceCatalog,
        registry: &RosterRegistry,
    ) -> Verdict {
        let Some(race) = catalog.lookup(&entry.race_name) else {
            tracing::debug!("Race not in catalog: {}", entry.race_name);
            return Verdict::RaceNotInCatalog;
        };

        let key = normalize_with(&entry.rider_name, registry.policy());
        let date = entry.date.or(race.date);

        match registry.resolve_owner(&key, date) {
            Resolution::NotFound => {
                tracing::debug!("Not rostered: {} ({})", entry.rider_name, key);
                Verdict::NotRostered
            }
            Resolution::Ambiguous(conflict) => Verdict::Ambiguous(conflict),
            Resolution::Owned { entry: roster, matched_by } => Verdict::Scored(ScoredEntry {
                owner: roster.owner.clone(),
                race_name: race.name.clone(),
                stage: entry.stage.clone(),
                date,
                event: entry.event,
                rider: roster.rider.display_name.clone(),
                rank: entry.rank,
                points: self.table.points(race.tier, entry.rank),
                matched_by,
            }),
        }
    }
}

impl Default for ScoringEngine {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================
