// 🏗️ Parser Framework - Raw tables → typed records
//
// Everything that comes in from outside is turned into typed records here,
// and a bad row is rejected here (with its line and reason) instead of
// surfacing later during scoring.
//
// Result shapes:
// - Wide table: one row per race/stage, finisher names in rank columns
// - Ranked list: (rank, rider) pairs for one race, as CSV, JSON or a
//   scraped HTML results table
//
// Listings: roster (rider, owner, add/drop dates) and schedule (race, tier,
// date, type, url).

use crate::data_quality::QualityIssue;
use crate::entities::{Race, RosterRow};
use crate::scoring::Tier;
use crate::temporal::parse_date;
use anyhow::{anyhow, bail, Context, Result};
use chrono::NaiveDate;
use csv::{ReaderBuilder, StringRecord, Trim};
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::File;
use std::io::Read;
use std::path::Path;

// ============================================================================
// CORE TYPES
// ============================================================================

/// One finisher of one race or stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultEntry {
    pub race_name: String,
    pub stage: Option<String>,
    pub date: Option<NaiveDate>,

    /// 1-based finishing position
    pub rank: u32,

    /// Name exactly as the source reported it
    pub rider_name: String,

    /// 1-based order of the race/stage row in its source
    pub event: usize,

    /// Line in the source, when it is line-oriented
    pub line: Option<usize>,
}

/// SourceKind - which shape a results input has
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceKind {
    WideTable,
    RankedList,
    Json,
    Html,
}

impl SourceKind {
    pub fn name(&self) -> &str {
        match self {
            SourceKind::WideTable => "wide table",
            SourceKind::RankedList => "ranked list",
            SourceKind::Json => "json",
            SourceKind::Html => "html",
        }
    }
}

/// Output of every parser: accepted records plus what was left out
#[derive(Debug, Clone, PartialEq)]
pub struct Ingested<T> {
    pub records: Vec<T>,
    pub issues: Vec<QualityIssue>,

    /// Data rows seen (accepted or not)
    pub rows_read: usize,
}

impl<T> Ingested<T> {
    pub fn new() -> Self {
        Ingested {
            records: Vec::new(),
            issues: Vec::new(),
            rows_read: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn rejected_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity == crate::data_quality::Severity::Critical)
            .count()
    }

    fn reject(&mut self, source: &str, line: Option<usize>, field: &str, reason: impl Into<String>) {
        let reason = reason.into();
        match line {
            Some(l) => tracing::warn!("{}:{} skipped: {}: {}", source, l, field, reason),
            None => tracing::warn!("{} row skipped: {}: {}", source, field, reason),
        }
        self.issues.push(QualityIssue::rejected(source, line, field, reason));
    }

    fn warn(&mut self, source: &str, line: Option<usize>, field: &str, reason: impl Into<String>) {
        let reason = reason.into();
        tracing::warn!("{}: {}: {}", source, field, reason);
        self.issues.push(QualityIssue::warning(source, line, field, reason));
    }
}

impl<T> Default for Ingested<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// The race a ranked list belongs to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaceScope {
    pub race_name: String,
    pub stage: Option<String>,
    pub date: Option<NaiveDate>,
    pub event: usize,
}

impl RaceScope {
    pub fn new(race_name: impl Into<String>) -> Self {
        RaceScope {
            race_name: race_name.into(),
            stage: None,
            date: None,
            event: 1,
        }
    }

    /// Builder pattern: add stage label
    pub fn with_stage(mut self, stage: impl Into<String>) -> Self {
        self.stage = Some(stage.into());
        self
    }

    /// Builder pattern: add date
    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    /// Builder pattern: set event sequence number
    pub fn with_event(mut self, event: usize) -> Self {
        self.event = event;
        self
    }

    fn entry(&self, rank: u32, rider_name: &str, line: Option<usize>) -> ResultEntry {
        ResultEntry {
            race_name: self.race_name.clone(),
            stage: self.stage.clone(),
            date: self.date,
            rank,
            rider_name: rider_name.to_string(),
            event: self.event,
            line,
        }
    }
}

// ============================================================================
// PARSER TRAIT
// ============================================================================

/// ResultParser - turns one raw results input into `ResultEntry`s
///
/// `Err` means the input as a whole is unusable (unreadable, no header,
/// no race column). Individual bad rows never fail the parse; they end up
/// in `Ingested::issues`.
pub trait ResultParser: Send + Sync {
    fn parse_reader(&self, reader: &mut dyn Read, source_name: &str) -> Result<Ingested<ResultEntry>>;

    fn source_kind(&self) -> SourceKind;

    fn parse(&self, file_path: &Path) -> Result<Ingested<ResultEntry>> {
        let mut file = File::open(file_path)
            .with_context(|| format!("Failed to open file: {}", file_path.display()))?;

        let filename = file_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown")
            .to_string();

        self.parse_reader(&mut file, &filename)
    }
}

// ============================================================================
// FACTORY FUNCTIONS
// ============================================================================

/// Guess the shape of a results input from its content
pub fn detect_source(content: &[u8]) -> SourceKind {
    let text = String::from_utf8_lossy(content);
    let trimmed = text.trim_start_matches('\u{feff}').trim_start();

    if trimmed.starts_with('<') {
        return SourceKind::Html;
    }
    if trimmed.starts_with('[') || trimmed.starts_with('{') {
        return SourceKind::Json;
    }

    let first_line = trimmed.lines().next().unwrap_or("");
    let headers: Vec<String> = first_line.split(',').map(canonical_header).collect();
    if find_column(&headers, RACE_COLUMNS).is_some() {
        SourceKind::WideTable
    } else {
        SourceKind::RankedList
    }
}

/// Get the parser for a source kind. Ranked lists need the race they
/// belong to; a wide table names its races itself.
pub fn get_parser(kind: SourceKind, scope: Option<RaceScope>) -> Result<Box<dyn ResultParser>> {
    let parser: Box<dyn ResultParser> = match (kind, scope) {
        (SourceKind::WideTable, _) => Box::new(WideTableParser::new()),
        (SourceKind::RankedList, Some(scope)) => Box::new(RankedListParser::new(scope)),
        (SourceKind::Json, Some(scope)) => Box::new(JsonListParser::new(scope)),
        (SourceKind::Html, Some(scope)) => Box::new(HtmlResultsParser::new(scope)),
        (kind, None) => bail!("A {} source needs a race scope", kind.name()),
    };
    Ok(parser)
}

// ============================================================================
// COLUMN HELPERS
// ============================================================================

const RACE_COLUMNS: &[&str] = &["race_name", "race", "event", "race_title"];
const DATE_COLUMNS: &[&str] = &["date", "race_date"];
const STAGE_COLUMNS: &[&str] = &["stage", "stage_name", "stage/race"];
const IGNORED_COLUMNS: &[&str] = &["race_num", "tier", "notes"];
const RANK_COLUMNS: &[&str] = &["rank", "rnk", "pos", "position", "place", "#"];
const RIDER_COLUMNS: &[&str] = &["rider", "rider_name", "name"];

/// "Race Name" → "race_name"
fn canonical_header(raw: &str) -> String {
    raw.trim()
        .trim_start_matches('\u{feff}')
        .trim_matches('"')
        .trim()
        .to_lowercase()
        .split(|c: char| c.is_whitespace() || c == '-')
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}

fn canonical_headers(record: &StringRecord) -> Vec<String> {
    record.iter().map(canonical_header).collect()
}

fn find_column(headers: &[String], names: &[&str]) -> Option<usize> {
    headers.iter().position(|h| names.contains(&h.as_str()))
}

/// "1st", "10th", "3", "P1", "pos_2", "#4" → rank
fn parse_ordinal(header: &str) -> Option<u32> {
    let mut s = header.trim().to_lowercase();
    for prefix in ["position", "pos", "rank", "p", "#"] {
        if let Some(rest) = s.strip_prefix(prefix) {
            s = rest.trim_start_matches(['_', '.', ' ']).to_string();
            break;
        }
    }
    for suffix in ["st", "nd", "rd", "th"] {
        if let Some(rest) = s.strip_suffix(suffix) {
            s = rest.to_string();
            break;
        }
    }
    s.parse::<u32>().ok().filter(|&n| n > 0)
}

/// Explicit rank cell: "1", "1.", " 12 "
fn parse_rank(raw: &str) -> std::result::Result<u32, String> {
    let trimmed = raw.trim().trim_end_matches('.');
    match trimmed.parse::<u32>() {
        Ok(0) => Err("Rank must be positive".to_string()),
        Ok(n) => Ok(n),
        Err(_) => Err(format!("Rank is not an integer: '{}'", raw.trim())),
    }
}

fn cell(record: &StringRecord, col: Option<usize>) -> &str {
    col.and_then(|c| record.get(c)).map(str::trim).unwrap_or("")
}

/// Spreadsheet exports write missing cells as "nan"
fn is_blank(value: &str) -> bool {
    let v = value.trim();
    v.is_empty() || ["nan", "none", "null"].contains(&v.to_lowercase().as_str())
}

fn parse_date_cell(raw: &str) -> std::result::Result<Option<NaiveDate>, String> {
    if is_blank(raw) {
        Ok(None)
    } else {
        parse_date(raw)
    }
}

fn non_blank(value: &str) -> Option<String> {
    if is_blank(value) {
        None
    } else {
        Some(value.trim().to_string())
    }
}

fn csv_reader(reader: &mut dyn Read) -> csv::Reader<&mut dyn Read> {
    ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(reader)
}

fn record_line(record: &StringRecord) -> Option<usize> {
    record.position().map(|p| p.line() as usize)
}

// ============================================================================
// WIDE TABLE PARSER
// ============================================================================

/// Wide results spreadsheet: `Date, Race Name, Stage, 1st, 2nd, ... 10th`
///
/// A finisher column whose header is an ordinal gives the rank; any other
/// finisher column gets its 1-based position among the finisher columns.
/// Blank cells emit nothing and do not shift the ranks after them.
pub struct WideTableParser;

impl WideTableParser {
    pub fn new() -> Self {
        WideTableParser
    }
}

impl Default for WideTableParser {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultParser for WideTableParser {
    fn parse_reader(&self, reader: &mut dyn Read, source_name: &str) -> Result<Ingested<ResultEntry>> {
        let mut csv = csv_reader(reader);
        let headers = canonical_headers(
            csv.headers()
                .with_context(|| format!("Failed to read header row of {}", source_name))?,
        );

        let race_col = find_column(&headers, RACE_COLUMNS)
            .ok_or_else(|| anyhow!("{}: no race name column in {:?}", source_name, headers))?;
        let date_col = find_column(&headers, DATE_COLUMNS);
        let stage_col = find_column(&headers, STAGE_COLUMNS);

        let finisher_cols: Vec<(usize, u32)> = headers
            .iter()
            .enumerate()
            .filter(|(i, h)| {
                *i != race_col
                    && Some(*i) != date_col
                    && Some(*i) != stage_col
                    && !IGNORED_COLUMNS.contains(&h.as_str())
            })
            .enumerate()
            .map(|(position, (col, header))| {
                (col, parse_ordinal(header).unwrap_or(position as u32 + 1))
            })
            .collect();

        let mut out = Ingested::new();

        for (row_idx, result) in csv.records().enumerate() {
            out.rows_read += 1;
            let event = row_idx + 1;

            let record = match result {
                Ok(r) => r,
                Err(e) => {
                    let line = e.position().map(|p| p.line() as usize);
                    out.reject(source_name, line, "row", e.to_string());
                    continue;
                }
            };
            let line = record_line(&record);

            let race_name = cell(&record, Some(race_col));
            if is_blank(race_name) {
                out.reject(source_name, line, "race_name", "Required field is empty");
                continue;
            }

            let date = match parse_date_cell(cell(&record, date_col)) {
                Ok(d) => d,
                Err(reason) => {
                    out.reject(source_name, line, "date", reason);
                    continue;
                }
            };

            let stage = non_blank(cell(&record, stage_col));

            let mut row_entries: Vec<ResultEntry> = finisher_cols
                .iter()
                .filter_map(|&(col, rank)| {
                    let name = cell(&record, Some(col));
                    if is_blank(name) {
                        return None;
                    }
                    Some(ResultEntry {
                        race_name: race_name.to_string(),
                        stage: stage.clone(),
                        date,
                        rank,
                        rider_name: name.to_string(),
                        event,
                        line,
                    })
                })
                .collect();

            row_entries.sort_by_key(|e| e.rank);
            out.records.extend(row_entries);
        }

        tracing::debug!(
            "{}: {} rows, {} finishers, {} rejected",
            source_name,
            out.rows_read,
            out.records.len(),
            out.rejected_count()
        );

        Ok(out)
    }

    fn source_kind(&self) -> SourceKind {
        SourceKind::WideTable
    }
}

// ============================================================================
// RANKED LIST PARSER (CSV)
// ============================================================================

/// `Rank,Rider` list for one race. Without a rank column the rank is the
/// row's 1-based position.
pub struct RankedListParser {
    scope: RaceScope,
}

impl RankedListParser {
    pub fn new(scope: RaceScope) -> Self {
        RankedListParser { scope }
    }
}

impl ResultParser for RankedListParser {
    fn parse_reader(&self, reader: &mut dyn Read, source_name: &str) -> Result<Ingested<ResultEntry>> {
        let mut csv = csv_reader(reader);
        let headers = canonical_headers(
            csv.headers()
                .with_context(|| format!("Failed to read header row of {}", source_name))?,
        );

        let rider_col = find_column(&headers, RIDER_COLUMNS)
            .ok_or_else(|| anyhow!("{}: no rider column in {:?}", source_name, headers))?;
        let rank_col = find_column(&headers, RANK_COLUMNS);

        let mut out = Ingested::new();

        for (row_idx, result) in csv.records().enumerate() {
            out.rows_read += 1;

            let record = match result {
                Ok(r) => r,
                Err(e) => {
                    let line = e.position().map(|p| p.line() as usize);
                    out.reject(source_name, line, "row", e.to_string());
                    continue;
                }
            };
            let line = record_line(&record);

            let rider = cell(&record, Some(rider_col));
            if is_blank(rider) {
                continue;
            }

            let rank = match rank_col {
                Some(col) => match parse_rank(cell(&record, Some(col))) {
                    Ok(r) => r,
                    Err(reason) => {
                        out.reject(source_name, line, "rank", reason);
                        continue;
                    }
                },
                None => row_idx as u32 + 1,
            };

            out.records.push(self.scope.entry(rank, rider, line));
        }

        out.records.sort_by_key(|e| e.rank);
        Ok(out)
    }

    fn source_kind(&self) -> SourceKind {
        SourceKind::RankedList
    }
}

// ============================================================================
// JSON LIST PARSER
// ============================================================================

#[derive(Debug, Deserialize)]
struct JsonFinisher {
    #[serde(default)]
    rank: Option<u32>,

    #[serde(alias = "name", alias = "rider_name")]
    rider: String,
}

/// `[{"rank": 1, "rider": "..."}]`, or the same array under `results` /
/// `data`.
pub struct JsonListParser {
    scope: RaceScope,
}

impl JsonListParser {
    pub fn new(scope: RaceScope) -> Self {
        JsonListParser { scope }
    }
}

impl ResultParser for JsonListParser {
    fn parse_reader(&self, reader: &mut dyn Read, source_name: &str) -> Result<Ingested<ResultEntry>> {
        let json: Value = serde_json::from_reader(reader)
            .with_context(|| format!("Failed to parse JSON from {}", source_name))?;

        let items = match &json {
            Value::Array(items) => items,
            Value::Object(map) => map
                .get("results")
                .or_else(|| map.get("data"))
                .and_then(|v| v.as_array())
                .ok_or_else(|| anyhow!("{}: JSON missing 'results' array", source_name))?,
            _ => bail!("{}: expected a JSON array of finishers", source_name),
        };

        let mut out = Ingested::new();

        for (idx, item) in items.iter().enumerate() {
            out.rows_read += 1;

            let finisher: JsonFinisher = match serde_json::from_value(item.clone()) {
                Ok(f) => f,
                Err(e) => {
                    out.reject(source_name, None, "item", format!("Item {}: {}", idx + 1, e));
                    continue;
                }
            };

            if is_blank(&finisher.rider) {
                continue;
            }

            let rank = match finisher.rank {
                Some(0) => {
                    out.reject(source_name, None, "rank", format!("Item {}: rank must be positive", idx + 1));
                    continue;
                }
                Some(r) => r,
                None => idx as u32 + 1,
            };

            out.records.push(self.scope.entry(rank, finisher.rider.trim(), None));
        }

        out.records.sort_by_key(|e| e.rank);
        Ok(out)
    }

    fn source_kind(&self) -> SourceKind {
        SourceKind::Json
    }
}

// ============================================================================
// HTML RESULTS PARSER
// ============================================================================

/// Scraped results page: the first `<table>` with a rider column.
///
/// Results pages put the team name in the rider cell next to the rider link,
/// so the link text is preferred when there is one.
pub struct HtmlResultsParser {
    scope: RaceScope,
}

impl HtmlResultsParser {
    pub fn new(scope: RaceScope) -> Self {
        HtmlResultsParser { scope }
    }

    pub fn parse_html(&self, html: &str, source_name: &str) -> Result<Ingested<ResultEntry>> {
        let document = Html::parse_document(html);
        let table_sel = selector("table")?;
        let row_sel = selector("tr")?;
        let cell_sel = selector("th, td")?;
        let link_sel = selector("a")?;

        let mut out = Ingested::new();

        for table in document.select(&table_sel) {
            let rows: Vec<ElementRef> = table.select(&row_sel).collect();

            let header = rows.iter().enumerate().find_map(|(i, row)| {
                let headers: Vec<String> = row
                    .select(&cell_sel)
                    .map(|c| canonical_header(&element_text(c)))
                    .collect();
                let rider_col = find_column(&headers, RIDER_COLUMNS)?;
                Some((i, find_column(&headers, RANK_COLUMNS), rider_col))
            });

            let Some((header_idx, rank_col, rider_col)) = header else {
                continue;
            };

            for (position, row) in rows[header_idx + 1..].iter().enumerate() {
                let cells: Vec<ElementRef> = row.select(&cell_sel).collect();
                if cells.is_empty() {
                    continue;
                }
                out.rows_read += 1;

                let rider = cells
                    .get(rider_col)
                    .map(|c| {
                        c.select(&link_sel)
                            .next()
                            .map(element_text)
                            .filter(|t| !t.is_empty())
                            .unwrap_or_else(|| element_text(*c))
                    })
                    .unwrap_or_default();

                if is_blank(&rider) {
                    continue;
                }

                let rank = match rank_col {
                    Some(col) => {
                        let raw = cells.get(col).map(|c| element_text(*c)).unwrap_or_default();
                        match parse_rank(&raw) {
                            Ok(r) => r,
                            Err(reason) => {
                                out.reject(
                                    source_name,
                                    None,
                                    "rank",
                                    format!("Row {}: {}", position + 1, reason),
                                );
                                continue;
                            }
                        }
                    }
                    None => position as u32 + 1,
                };

                out.records.push(self.scope.entry(rank, &rider, None));
            }

            out.records.sort_by_key(|e| e.rank);
            return Ok(out);
        }

        out.warn(source_name, None, "table", "No results table with a rider column");
        Ok(out)
    }
}

impl ResultParser for HtmlResultsParser {
    fn parse_reader(&self, reader: &mut dyn Read, source_name: &str) -> Result<Ingested<ResultEntry>> {
        let mut html = String::new();
        reader
            .read_to_string(&mut html)
            .with_context(|| format!("Failed to read HTML from {}", source_name))?;
        self.parse_html(&html, source_name)
    }

    fn source_kind(&self) -> SourceKind {
        SourceKind::Html
    }
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow!("Invalid selector '{}': {:?}", css, e))
}

fn element_text(el: ElementRef) -> String {
    el.text()
        .flat_map(|t| t.split_whitespace())
        .collect::<Vec<_>>()
        .join(" ")
}

// ============================================================================
// LISTINGS
// ============================================================================

#[derive(Debug, Deserialize)]
struct RosterRecord {
    #[serde(alias = "rider", alias = "name")]
    rider_name: Option<String>,
    owner: Option<String>,
    #[serde(default, alias = "added")]
    add_date: Option<String>,
    #[serde(default, alias = "dropped")]
    drop_date: Option<String>,
}

/// Parse the roster listing: `rider_name, owner[, add_date, drop_date]`
pub fn parse_roster(reader: &mut dyn Read, source_name: &str) -> Result<Ingested<RosterRow>> {
    let mut csv = csv_reader(reader);
    let headers = canonical_headers(
        csv.headers()
            .with_context(|| format!("Failed to read header row of {}", source_name))?,
    );

    if find_column(&headers, &["rider_name", "rider", "name"]).is_none()
        || find_column(&headers, &["owner"]).is_none()
    {
        bail!("{}: roster needs rider_name and owner columns, got {:?}", source_name, headers);
    }
    let header_record = StringRecord::from(headers);

    let mut out = Ingested::new();

    for result in csv.records() {
        out.rows_read += 1;

        let record = match result {
            Ok(r) => r,
            Err(e) => {
                let line = e.position().map(|p| p.line() as usize);
                out.reject(source_name, line, "row", e.to_string());
                continue;
            }
        };
        let line = record_line(&record);

        let raw: RosterRecord = match record.deserialize(Some(&header_record)) {
            Ok(r) => r,
            Err(e) => {
                out.reject(source_name, line, "row", e.to_string());
                continue;
            }
        };

        let Some(rider_name) = raw.rider_name.as_deref().and_then(non_blank) else {
            out.reject(source_name, line, "rider_name", "Required field is empty");
            continue;
        };
        let Some(owner) = raw.owner.as_deref().and_then(non_blank) else {
            out.reject(source_name, line, "owner", "Required field is empty");
            continue;
        };

        let add_date = match parse_date_cell(raw.add_date.as_deref().unwrap_or("")) {
            Ok(d) => d,
            Err(reason) => {
                out.reject(source_name, line, "add_date", reason);
                continue;
            }
        };
        let drop_date = match parse_date_cell(raw.drop_date.as_deref().unwrap_or("")) {
            Ok(d) => d,
            Err(reason) => {
                out.reject(source_name, line, "drop_date", reason);
                continue;
            }
        };

        if let (Some(add), Some(drop)) = (add_date, drop_date) {
            if drop <= add {
                out.reject(
                    source_name,
                    line,
                    "drop_date",
                    format!("Drop date {} is not after add date {}", drop, add),
                );
                continue;
            }
        }

        out.records.push(RosterRow {
            rider_name,
            owner,
            add_date,
            drop_date,
            line: line.unwrap_or(out.rows_read + 1),
        });
    }

    Ok(out)
}

#[derive(Debug, Deserialize)]
struct ScheduleRecord {
    #[serde(alias = "race")]
    race_name: Option<String>,
    #[serde(default)]
    tier: Option<String>,
    #[serde(default)]
    date: Option<String>,
    #[serde(default, alias = "type")]
    race_type: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

/// Parse the schedule listing: `race_name, tier[, date, race_type, url]`
///
/// An unknown tier label keeps the race (it scores zero) and is reported.
pub fn parse_schedule(reader: &mut dyn Read, source_name: &str) -> Result<Ingested<Race>> {
    let mut csv = csv_reader(reader);
    let headers = canonical_headers(
        csv.headers()
            .with_context(|| format!("Failed to read header row of {}", source_name))?,
    );

    if find_column(&headers, &["race_name", "race"]).is_none() {
        bail!("{}: schedule needs a race_name column, got {:?}", source_name, headers);
    }
    let header_record = StringRecord::from(headers);

    let mut out = Ingested::new();

    for result in csv.records() {
        out.rows_read += 1;

        let record = match result {
            Ok(r) => r,
            Err(e) => {
                let line = e.position().map(|p| p.line() as usize);
                out.reject(source_name, line, "row", e.to_string());
                continue;
            }
        };
        let line = record_line(&record);

        let raw: ScheduleRecord = match record.deserialize(Some(&header_record)) {
            Ok(r) => r,
            Err(e) => {
                out.reject(source_name, line, "row", e.to_string());
                continue;
            }
        };

        let Some(name) = raw.race_name.as_deref().and_then(non_blank) else {
            out.reject(source_name, line, "race_name", "Required field is empty");
            continue;
        };

        let date = match parse_date_cell(raw.date.as_deref().unwrap_or("")) {
            Ok(d) => d,
            Err(reason) => {
                out.reject(source_name, line, "date", reason);
                continue;
            }
        };

        let tier_label = raw.tier.as_deref().map(str::trim).unwrap_or("").to_string();
        let tier = Tier::parse(&tier_label);
        if tier.is_none() {
            out.warn(
                source_name,
                line,
                "tier",
                format!("Unknown tier '{}' for {}; race scores zero", tier_label, name),
            );
        }

        out.records.push(Race {
            name,
            tier,
            tier_label,
            date,
            race_type: raw.race_type.as_deref().and_then(non_blank),
            url: raw.url.as_deref().and_then(non_blank),
        });
    }

    Ok(out)
}

// ============================================================================
// TESTS
// ============================================================================
