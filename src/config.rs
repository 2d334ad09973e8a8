// ⚙️ League Configuration - Loaded from JSON
//
// Every field has a default, so an empty object `{}` (or no config file at
// all) gives the standard league:
//
// {
//   "hyphen_policy": "strip_team_suffix",
//   "allow_partial_match": true,
//   "history": { "undated": "last", "include_zero_points": true },
//   "scoring": { "Tier 1": [30, 27, ...], "Tier 2": [...], "Tier 3": [...] }
// }

use crate::aggregate::HistoryPolicy;
use crate::data_quality::QualityIssue;
use crate::engine::ScoringEngine;
use crate::entities::{RosterRegistry, RosterRow};
use crate::normalize::HyphenPolicy;
use crate::scoring::ScoringTable;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LeagueConfig {
    pub hyphen_policy: HyphenPolicy,

    /// Fall back to token-subset matching when no rider key matches exactly
    pub allow_partial_match: bool,

    pub history: HistoryPolicy,

    /// Replaces the standard table when present
    pub scoring: Option<ScoringTable>,
}

impl Default for LeagueConfig {
    fn default() -> Self {
        LeagueConfig {
            hyphen_policy: HyphenPolicy::default(),
            allow_partial_match: true,
            history: HistoryPolicy::default(),
            scoring: None,
        }
    }
}

impl LeagueConfig {
    /// Load configuration from JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let config: LeagueConfig =
            serde_json::from_str(content).context("Failed to parse config JSON")?;

        if let Some(table) = &config.scoring {
            table.validate().context("Invalid scoring table in config")?;
        }

        Ok(config)
    }

    pub fn scoring_table(&self) -> ScoringTable {
        self.scoring.clone().unwrap_or_default()
    }

    pub fn engine(&self) -> ScoringEngine {
        ScoringEngine::new().with_table(self.scoring_table())
    }

    /// Registry built with this league's matching rules
    pub fn registry(&self, rows: &[RosterRow]) -> (RosterRegistry, Vec<QualityIssue>) {
        let (registry, issues) = RosterRegistry::from_rows(rows, self.hyphen_policy);
        (registry.with_partial_match(self.allow_partial_match), issues)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::UndatedPlacement;
    use crate::scoring::Tier;

    #[test]
    fn test_empty_config_is_standard_league() {
        let config = LeagueConfig::from_json("{}").unwrap();
        assert_eq!(config, LeagueConfig::default());
        assert_eq!(config.scoring_table(), ScoringTable::standard());
        assert!(config.allow_partial_match);
    }

    #[test]
    fn test_partial_config() {
        let config = LeagueConfig::from_json(
            r#"{
                "hyphen_policy": "split_words",
                "allow_partial_match": false,
                "history": { "undated": "exclude" }
            }"#,
        )
        .unwrap();

        assert_eq!(config.hyphen_policy, HyphenPolicy::SplitWords);
        assert!(!config.allow_partial_match);
        assert_eq!(config.history.undated, UndatedPlacement::Exclude);
        assert!(config.history.include_zero_points);
    }

    #[test]
    fn test_custom_scoring_table() {
        let config = LeagueConfig::from_json(
            r#"{
                "scoring": {
                    "Tier 1": [50, 30, 20],
                    "Tier 2": [25, 15, 10],
                    "Tier 3": [10, 5, 2]
                }
            }"#,
        )
        .unwrap();

        let table = config.scoring_table();
        assert_eq!(table.points(Some(Tier::One), 1), 50);
        assert_eq!(table.points(Some(Tier::Three), 3), 2);
        assert_eq!(table.points(Some(Tier::Three), 4), 0);
        assert_eq!(config.engine().table().max_rank(), 3);
    }

    #[test]
    fn test_invalid_scoring_table_rejected() {
        let result = LeagueConfig::from_json(
            r#"{
                "scoring": {
                    "Tier 1": [10, 20],
                    "Tier 2": [5, 4],
                    "Tier 3": [2, 1]
                }
            }"#,
        );
        assert!(result.is_err());

        assert!(LeagueConfig::from_json("not json").is_err());
    }

    #[test]
    fn test_missing_file() {
        assert!(LeagueConfig::from_file("/nonexistent/league.json").is_err());
    }

    #[test]
    fn test_registry_honours_partial_match() {
        let rows = vec![RosterRow {
            rider_name: "Tadej Pogacar".to_string(),
            owner: "Alice".to_string(),
            add_date: None,
            drop_date: None,
            line: 2,
        }];
        let config = LeagueConfig {
            allow_partial_match: false,
            ..LeagueConfig::default()
        };
        let (registry, issues) = config.registry(&rows);
        assert!(issues.is_empty());
        assert_eq!(
            registry.resolve_owner("pogacar", None),
            crate::entities::Resolution::NotFound
        );
    }
}
