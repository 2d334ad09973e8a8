// Fantasy Cycling League - Core Library
// Result resolution pipeline: raw results → owners → points → standings

pub mod normalize;
pub mod temporal;
pub mod scoring;
pub mod data_quality;
pub mod entities;
pub mod parser;
pub mod engine;
pub mod aggregate;
pub mod config;
pub mod snapshot;
pub mod feed;

// Re-export commonly used types
pub use normalize::{normalize, normalize_with, HyphenPolicy};
pub use temporal::{parse_date, DateWindow};
pub use scoring::{ScoringTable, TableError, Tier};
pub use data_quality::{QualityIssue, QualityReport, Severity};
pub use entities::{
    ConflictKind, MatchStrategy, Owner, Race, RaceCatalog, Resolution, Rider,
    RosterConflict, RosterEntry, RosterRegistry, RosterRow,
};
pub use parser::{
    ResultParser, ResultEntry, Ingested, RaceScope, SourceKind,
    detect_source, get_parser, parse_roster, parse_schedule,
    WideTableParser, RankedListParser, JsonListParser, HtmlResultsParser,
};
pub use engine::{DropCounts, ScoredEntry, ScoringEngine, ScoringOutcome, Verdict};
pub use aggregate::{
    cumulative_standings, history, leaderboard, ranked, rider_totals, top_riders,
    EventStanding, HistoryPolicy, OwnerTotal, RiderTotal, UndatedPlacement,
};
pub use config::LeagueConfig;
pub use snapshot::{
    run, LeagueSnapshot, PipelineCache, RawInputs, ResultSource, RunOutcome, Standings,
};
pub use feed::{sync_all, sync_races, HttpFeed, RaceSync, RaceSyncRecord, ResultFeed, SyncReport};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
