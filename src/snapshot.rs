// 📸 Snapshot & Pipeline - Raw inputs → one immutable run
//
// A run is: raw bytes → parse → registry + catalog + results (the snapshot)
// → score → standings. Nothing is carried between runs except the optional
// memo in `PipelineCache`, keyed by a SHA-256 over every raw input and the
// config, so a changed file can never be served stale results.

use crate::aggregate::{self, EventStanding, HistoryPolicy, OwnerTotal, RiderTotal};
use crate::config::LeagueConfig;
use crate::data_quality::{QualityIssue, QualityReport};
use crate::engine::{DropCounts, ScoredEntry};
use crate::entities::{Owner, RaceCatalog, RosterConflict, RosterRegistry};
use crate::parser::{self, get_parser, RaceScope, ResultEntry, SourceKind};
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::time::{Duration, Instant};

pub const ROSTER_FILE: &str = "riders.csv";
pub const SCHEDULE_FILE: &str = "schedule.csv";
pub const RESULTS_FILE: &str = "results.csv";

/// Directory of per-race results, one file per race named after it
pub const RACES_DIR: &str = "races";

// ============================================================================
// RAW INPUTS
// ============================================================================

/// One results input, still as bytes
#[derive(Debug, Clone, PartialEq)]
pub struct ResultSource {
    pub name: String,
    pub kind: SourceKind,

    /// Required for every kind except a wide table
    pub scope: Option<RaceScope>,

    pub bytes: Vec<u8>,
}

impl ResultSource {
    pub fn wide_table(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        ResultSource {
            name: name.into(),
            kind: SourceKind::WideTable,
            scope: None,
            bytes,
        }
    }

    pub fn ranked(name: impl Into<String>, kind: SourceKind, scope: RaceScope, bytes: Vec<u8>) -> Self {
        ResultSource {
            name: name.into(),
            kind,
            scope: Some(scope),
            bytes,
        }
    }

    fn parse(&self) -> Result<parser::Ingested<ResultEntry>> {
        let parser = get_parser(self.kind, self.scope.clone())?;
        tracing::debug!("Parsing {} as {}", self.name, parser.source_kind().name());
        parser
            .parse_reader(&mut self.bytes.as_slice(), &self.name)
            .with_context(|| format!("Failed to parse results from {}", self.name))
    }
}

/// Everything a run reads, before any parsing
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawInputs {
    pub roster: Option<Vec<u8>>,
    pub schedule: Option<Vec<u8>>,
    pub results: Vec<ResultSource>,
}

impl RawInputs {
    pub fn new() -> Self {
        RawInputs::default()
    }

    /// Builder pattern: roster listing bytes
    pub fn with_roster(mut self, bytes: impl Into<Vec<u8>>) -> Self {
        self.roster = Some(bytes.into());
        self
    }

    /// Builder pattern: schedule listing bytes
    pub fn with_schedule(mut self, bytes: impl Into<Vec<u8>>) -> Self {
        self.schedule = Some(bytes.into());
        self
    }

    /// Builder pattern: add a results source
    pub fn with_results(mut self, source: ResultSource) -> Self {
        self.results.push(source);
        self
    }

    /// Read `riders.csv`, `schedule.csv`, `results.csv` and every file
    /// under `races/` from a directory. A missing file is not an error; the
    /// run reports no data instead.
    pub fn load_dir<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        let mut inputs = RawInputs::new();

        inputs.roster = read_optional(&dir.join(ROSTER_FILE))?;
        inputs.schedule = read_optional(&dir.join(SCHEDULE_FILE))?;
        if let Some(bytes) = read_optional(&dir.join(RESULTS_FILE))? {
            inputs.results.push(ResultSource::wide_table(RESULTS_FILE, bytes));
        }
        inputs.results.extend(read_race_dir(&dir.join(RACES_DIR))?);

        Ok(inputs)
    }

    /// SHA-256 over every input, hex encoded
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();

        hash_part(&mut hasher, b"roster", self.roster.as_deref());
        hash_part(&mut hasher, b"schedule", self.schedule.as_deref());
        for source in &self.results {
            hasher.update(source.name.as_bytes());
            hasher.update(source.kind.name().as_bytes());
            if let Some(scope) = &source.scope {
                hasher.update(format!("{:?}", scope).as_bytes());
            }
            hash_part(&mut hasher, b"results", Some(source.bytes.as_slice()));
        }

        format!("{:x}", hasher.finalize())
    }

    /// Why a run would have nothing to score, if so
    pub fn missing(&self) -> Option<String> {
        if is_empty(self.roster.as_deref()) {
            return Some(format!("{} is missing or empty", ROSTER_FILE));
        }
        if is_empty(self.schedule.as_deref()) {
            return Some(format!("{} is missing or empty", SCHEDULE_FILE));
        }
        if self.results.iter().all(|s| is_empty(Some(s.bytes.as_slice()))) {
            return Some("no results provided".to_string());
        }
        None
    }
}

fn read_optional(path: &Path) -> Result<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            tracing::info!("{} not found", path.display());
            Ok(None)
        }
        Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
    }
}

/// Per-race files ("races/Spring Classic.json"). The file stem is the race
/// name and the format is sniffed from the content. Events follow file name
/// order.
fn read_race_dir(dir: &Path) -> Result<Vec<ResultSource>> {
    let listing = match fs::read_dir(dir) {
        Ok(listing) => listing,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e).with_context(|| format!("Failed to list {}", dir.display())),
    };

    let mut paths = Vec::new();
    for entry in listing {
        let path = entry
            .with_context(|| format!("Failed to list {}", dir.display()))?
            .path();
        let hidden = path
            .file_name()
            .and_then(|n| n.to_str())
            .map_or(true, |n| n.starts_with('.'));
        if path.is_file() && !hidden {
            paths.push(path);
        }
    }
    paths.sort();

    let mut sources = Vec::new();
    for (i, path) in paths.iter().enumerate() {
        let Some(race_name) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
        let name = format!("{}/{}", RACES_DIR, path.file_name().and_then(|n| n.to_str()).unwrap_or(race_name));

        let source = match parser::detect_source(&bytes) {
            SourceKind::WideTable => ResultSource::wide_table(name, bytes),
            kind => {
                let scope = RaceScope::new(race_name).with_event(i + 1);
                ResultSource::ranked(name, kind, scope, bytes)
            }
        };
        tracing::info!("Found {} ({})", source.name, source.kind.name());
        sources.push(source);
    }

    Ok(sources)
}

fn hash_part(hasher: &mut Sha256, label: &[u8], bytes: Option<&[u8]>) {
    hasher.update(label);
    match bytes {
        Some(b) => {
            hasher.update((b.len() as u64).to_le_bytes());
            hasher.update(b);
        }
        None => hasher.update(u64::MAX.to_le_bytes()),
    }
}

fn is_empty(bytes: Option<&[u8]>) -> bool {
    bytes.map_or(true, |b| b.iter().all(u8::is_ascii_whitespace))
}

// ============================================================================
// LEAGUE SNAPSHOT
// ============================================================================

/// Typed, validated inputs of one run. Built once, then only borrowed.
#[derive(Debug, Clone)]
pub struct LeagueSnapshot {
    pub registry: RosterRegistry,
    pub catalog: RaceCatalog,
    pub results: Vec<ResultEntry>,
    pub quality: QualityReport,
    pub fingerprint: String,
}

impl LeagueSnapshot {
    /// Parse every input. The inner `Err` is the reason there is nothing
    /// to score (an input missing, or a listing without usable rows).
    pub fn build(inputs: &RawInputs, config: &LeagueConfig) -> Result<std::result::Result<Self, String>> {
        if let Some(reason) = inputs.missing() {
            return Ok(Err(reason));
        }

        let mut quality = QualityReport::new();

        let roster_bytes = inputs.roster.as_deref().unwrap_or_default();
        let roster = parser::parse_roster(&mut &roster_bytes[..], ROSTER_FILE)?;
        quality.extend(roster.issues);
        if roster.records.is_empty() {
            return Ok(Err(format!("{} has no usable rows", ROSTER_FILE)));
        }

        let schedule_bytes = inputs.schedule.as_deref().unwrap_or_default();
        let schedule = parser::parse_schedule(&mut &schedule_bytes[..], SCHEDULE_FILE)?;
        quality.extend(schedule.issues);
        if schedule.records.is_empty() {
            return Ok(Err(format!("{} has no usable rows", SCHEDULE_FILE)));
        }

        let mut results = Vec::new();
        for source in &inputs.results {
            match source.parse() {
                Ok(ingested) => {
                    quality.extend(ingested.issues);
                    results.extend(ingested.records);
                }
                Err(e) => {
                    // One unreadable race file costs that race, not the run
                    tracing::warn!("Skipping results source {}: {:#}", source.name, e);
                    quality.push(QualityIssue::rejected(&source.name, None, "results", format!("{:#}", e)));
                }
            }
        }
        if results.is_empty() {
            return Ok(Err("results contain no finishers".to_string()));
        }

        let (registry, roster_issues) = config.registry(&roster.records);
        quality.extend(roster_issues);

        let (catalog, catalog_issues) = RaceCatalog::from_races(schedule.records);
        quality.extend(catalog_issues);

        tracing::info!(
            "Snapshot: {} riders, {} owners, {} races, {} finishers ({})",
            registry.rider_count(),
            registry.owners().len(),
            catalog.len(),
            results.len(),
            quality.summary()
        );

        Ok(Ok(LeagueSnapshot {
            registry,
            catalog,
            results,
            quality,
            fingerprint: inputs.fingerprint(),
        }))
    }
}

// ============================================================================
// RUN OUTCOME / STANDINGS
// ============================================================================

/// Output of one run, fully derived from its snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Standings {
    pub run_id: String,
    pub fingerprint: String,
    pub scored_at: DateTime<Utc>,

    pub entries: Vec<ScoredEntry>,

    /// Roster order
    pub owners: Vec<Owner>,

    pub drops: DropCounts,

    /// Ambiguities hit while scoring
    pub conflicts: Vec<RosterConflict>,

    /// Overlapping windows in the roster, touched by results or not
    pub roster_conflicts: Vec<RosterConflict>,

    pub quality: QualityReport,
    pub history_policy: HistoryPolicy,
}

impl Standings {
    pub fn leaderboard(&self) -> Vec<OwnerTotal> {
        aggregate::leaderboard(&self.entries, &self.owners)
    }

    /// Leaderboard, highest first
    pub fn ranked(&self) -> Vec<OwnerTotal> {
        aggregate::ranked(&self.leaderboard())
    }

    pub fn rider_totals(&self) -> Vec<RiderTotal> {
        aggregate::rider_totals(&self.entries)
    }

    pub fn top_riders(&self, owner: &Owner, n: usize) -> Vec<RiderTotal> {
        let totals = self.rider_totals();
        aggregate::top_riders(&totals, owner, n)
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn history(&self) -> Vec<&ScoredEntry> {
        aggregate::history(&self.entries, &self.history_policy)
    }

    pub fn cumulative(&self) -> Vec<EventStanding> {
        aggregate::cumulative_standings(&self.entries, &self.owners)
    }

    pub fn total_points(&self) -> u32 {
        self.entries.iter().map(|e| e.points).sum()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// Nothing to score: an input is missing or has no usable rows
    NoData { reason: String },

    /// Scored, possibly with zero points for everyone
    Scored(Box<Standings>),
}

impl RunOutcome {
    pub fn standings(&self) -> Option<&Standings> {
        match self {
            RunOutcome::Scored(standings) => Some(standings.as_ref()),
            RunOutcome::NoData { .. } => None,
        }
    }

    pub fn is_no_data(&self) -> bool {
        matches!(self, RunOutcome::NoData { .. })
    }
}

/// Run the whole pipeline over raw inputs
pub fn run(inputs: &RawInputs, config: &LeagueConfig) -> Result<RunOutcome> {
    let snapshot = match LeagueSnapshot::build(inputs, config)? {
        Ok(snapshot) => snapshot,
        Err(reason) => {
            tracing::info!("No data: {}", reason);
            return Ok(RunOutcome::NoData { reason });
        }
    };

    let outcome = config
        .engine()
        .score(&snapshot.results, &snapshot.catalog, &snapshot.registry);

    let roster_conflicts = snapshot.registry.conflicts();
    for conflict in &roster_conflicts {
        tracing::warn!("Roster conflict: {}", conflict);
    }

    Ok(RunOutcome::Scored(Box::new(Standings {
        run_id: uuid::Uuid::new_v4().to_string(),
        fingerprint: snapshot.fingerprint,
        scored_at: Utc::now(),
        entries: outcome.entries,
        owners: snapshot.registry.owners().to_vec(),
        drops: outcome.drops,
        conflicts: outcome.conflicts,
        roster_conflicts,
        quality: snapshot.quality,
        history_policy: config.history,
    })))
}

// ============================================================================
// PIPELINE CACHE
// ============================================================================

struct CachedRun {
    fingerprint: String,
    outcome: RunOutcome,
    computed_at: Instant,
}

/// Memo of the last run, keyed by input fingerprint
pub struct PipelineCache {
    config: LeagueConfig,
    last: Option<CachedRun>,

    /// Soft limit after which a cached run is recomputed even if the
    /// inputs are unchanged (live sources only)
    max_age: Option<Duration>,

    runs: usize,
}

impl PipelineCache {
    pub fn new(config: LeagueConfig) -> Self {
        PipelineCache {
            config,
            last: None,
            max_age: None,
            runs: 0,
        }
    }

    /// Builder pattern: expire cached runs after `max_age`
    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }

    /// Cached outcome for these inputs, running the pipeline on a miss
    pub fn get_or_run(&mut self, inputs: &RawInputs) -> Result<&RunOutcome> {
        let key = self.cache_key(inputs)?;

        let hit = self
            .last
            .as_ref()
            .is_some_and(|cached| cached.fingerprint == key && !self.is_expired(cached));

        if hit {
            tracing::debug!("Pipeline cache hit");
        } else {
            tracing::debug!("Pipeline cache miss, running");
            let outcome = run(inputs, &self.config)?;
            self.runs += 1;
            self.last = Some(CachedRun {
                fingerprint: key,
                outcome,
                computed_at: Instant::now(),
            });
        }

        self.last
            .as_ref()
            .map(|cached| &cached.outcome)
            .ok_or_else(|| anyhow!("Pipeline cache is empty after run"))
    }

    /// Drop the memo; the next call recomputes
    pub fn invalidate(&mut self) {
        self.last = None;
    }

    /// Number of times the pipeline actually ran
    pub fn runs(&self) -> usize {
        self.runs
    }

    pub fn config(&self) -> &LeagueConfig {
        &self.config
    }

    fn is_expired(&self, cached: &CachedRun) -> bool {
        self.max_age
            .is_some_and(|max_age| cached.computed_at.elapsed() >= max_age)
    }

    fn cache_key(&self, inputs: &RawInputs) -> Result<String> {
        let config = serde_json::to_string(&self.config).context("Failed to serialize config")?;
        let mut hasher = Sha256::new();
        hasher.update(inputs.fingerprint().as_bytes());
        hasher.update(config.as_bytes());
        Ok(format!("{:x}", hasher.finalize()))
    }
}

// ============================================================================
// TESTS
// ============================================================================
