// 📡 Live Feed Sync - Results pages for scheduled races
//
// Each race is fetched and classified on its own; one failing page never
// stops the others. What came back is kept as raw bytes so the pipeline
// parses (and fingerprints) it like any other results input.

use crate::entities::{Race, RaceCatalog};
use crate::parser::{HtmlResultsParser, RaceScope, SourceKind};
use crate::snapshot::{RawInputs, ResultSource};
use anyhow::{anyhow, Context, Result};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const REQUEST_TIMEOUT_SECS: u64 = 10;

// ============================================================================
// FEED
// ============================================================================

/// Source of a race's results page
pub trait ResultFeed {
    fn fetch(&self, race: &Race) -> Result<String>;
}

/// Plain HTTP GET of the race's `url`
pub struct HttpFeed {
    client: Client,
}

impl HttpFeed {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context("failed to build http client")?;
        Ok(HttpFeed { client })
    }
}

impl ResultFeed for HttpFeed {
    fn fetch(&self, race: &Race) -> Result<String> {
        let url = race
            .url
            .as_deref()
            .ok_or_else(|| anyhow!("{} has no results url", race.name))?;

        self.client
            .get(url)
            .send()
            .and_then(|r| r.error_for_status())
            .with_context(|| format!("GET {}", url))?
            .text()
            .with_context(|| format!("reading body of {}", url))
    }
}

// ============================================================================
// SYNC REPORT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RaceSync {
    Fetched { finishers: usize },
    NotInCatalog,
    NoUrl,

    /// Page came back without a results table or finishers
    NoResults,

    FetchFailed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaceSyncRecord {
    pub race_name: String,
    pub outcome: RaceSync,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncReport {
    pub races: Vec<RaceSyncRecord>,

    /// One source per fetched race with finishers
    pub sources: Vec<ResultSource>,
}

impl SyncReport {
    pub fn fetched_count(&self) -> usize {
        self.races
            .iter()
            .filter(|r| matches!(r.outcome, RaceSync::Fetched { .. }))
            .count()
    }

    pub fn failed_count(&self) -> usize {
        self.races
            .iter()
            .filter(|r| matches!(r.outcome, RaceSync::FetchFailed(_)))
            .count()
    }

    pub fn summary(&self) -> String {
        format!(
            "Sync: {} races, {} fetched, {} failed, {} without results",
            self.races.len(),
            self.fetched_count(),
            self.failed_count(),
            self.races
                .iter()
                .filter(|r| r.outcome == RaceSync::NoResults)
                .count()
        )
    }

    /// Add every fetched page to the run's inputs
    pub fn apply(self, mut inputs: RawInputs) -> RawInputs {
        inputs.results.extend(self.sources);
        inputs
    }

    fn record(&mut self, race_name: &str, outcome: RaceSync) {
        self.races.push(RaceSyncRecord {
            race_name: race_name.to_string(),
            outcome,
        });
    }
}

// ============================================================================
// SYNC
// ============================================================================

/// Sync the named races
pub fn sync_races(feed: &dyn ResultFeed, catalog: &RaceCatalog, race_names: &[&str]) -> SyncReport {
    let mut report = SyncReport::default();

    for name in race_names {
        let Some(position) = catalog.races().iter().position(|r| r.name == *name) else {
            tracing::debug!("Sync skipped, not in catalog: {}", name);
            report.record(name, RaceSync::NotInCatalog);
            continue;
        };
        sync_one(feed, &catalog.races()[position], position + 1, &mut report);
    }

    tracing::info!("{}", report.summary());
    report
}

/// Sync every catalog race that has a results url
pub fn sync_all(feed: &dyn ResultFeed, catalog: &RaceCatalog) -> SyncReport {
    let mut report = SyncReport::default();

    for (idx, race) in catalog.races().iter().enumerate() {
        if race.url.is_some() {
            sync_one(feed, race, idx + 1, &mut report);
        }
    }

    tracing::info!("{}", report.summary());
    report
}

fn sync_one(feed: &dyn ResultFeed, race: &Race, event: usize, report: &mut SyncReport) {
    if race.url.is_none() {
        report.record(&race.name, RaceSync::NoUrl);
        return;
    }

    let html = match feed.fetch(race) {
        Ok(html) => html,
        Err(e) => {
            tracing::warn!("Fetch failed for {}: {:#}", race.name, e);
            report.record(&race.name, RaceSync::FetchFailed(format!("{:#}", e)));
            return;
        }
    };

    let mut scope = RaceScope::new(race.name.clone()).with_event(event);
    if let Some(date) = race.date {
        scope = scope.with_date(date);
    }

    let source_name = format!("{} (html)", race.name);
    let finishers = match HtmlResultsParser::new(scope.clone()).parse_html(&html, &source_name) {
        Ok(ingested) => ingested.records.len(),
        Err(e) => {
            report.record(&race.name, RaceSync::FetchFailed(format!("{:#}", e)));
            return;
        }
    };

    if finishers == 0 {
        report.record(&race.name, RaceSync::NoResults);
        return;
    }

    report.record(&race.name, RaceSync::Fetched { finishers });
    report.sources.push(ResultSource::ranked(
        source_name,
        SourceKind::Html,
        scope,
        html.into_bytes(),
    ));
}

// ============================================================================
// TESTS
// ============================================================================
