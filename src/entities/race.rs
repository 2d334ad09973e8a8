// 🏁 Race Catalog - Race name → tier + date
//
// Keyed by the exact race-name string. Race names are under the operator's
// control and kept consistent between schedule and results by convention,
// so there is no fuzzy matching here.

use crate::data_quality::QualityIssue;
use crate::scoring::Tier;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ============================================================================
// RACE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Race {
    pub name: String,

    /// None when the schedule label is not a known tier; scores zero
    pub tier: Option<Tier>,

    /// Label exactly as listed in the schedule
    pub tier_label: String,

    pub date: Option<NaiveDate>,

    /// "One-day", "Stage race", ... (informational)
    pub race_type: Option<String>,

    /// Results page for live sync
    pub url: Option<String>,
}

impl Race {
    pub fn new(name: impl Into<String>, tier: Tier) -> Self {
        Race {
            name: name.into(),
            tier: Some(tier),
            tier_label: tier.label().to_string(),
            date: None,
            race_type: None,
            url: None,
        }
    }

    /// Builder pattern: add date
    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    /// Builder pattern: add results URL
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }
}

// ============================================================================
// RACE CATALOG
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct RaceCatalog {
    races: Vec<Race>,
    index: HashMap<String, usize>,
}

impl RaceCatalog {
    pub fn new() -> Self {
        RaceCatalog::default()
    }

    /// Build from schedule rows; the first row for a name wins, later ones
    /// are reported.
    pub fn from_races(races: Vec<Race>) -> (Self, Vec<QualityIssue>) {
        let mut catalog = RaceCatalog::new();
        let mut issues = Vec::new();

        for race in races {
            let name = race.name.clone();
            if !catalog.insert(race) {
                tracing::warn!("Duplicate race in schedule ignored: {}", name);
                issues.push(QualityIssue::warning(
                    "schedule",
                    None,
                    "race_name",
                    format!("Duplicate race '{}' ignored", name),
                ));
            }
        }

        (catalog, issues)
    }

    /// Add a race; returns false if the name is already present
    pub fn insert(&mut self, race: Race) -> bool {
        if self.index.contains_key(&race.name) {
            return false;
        }
        self.index.insert(race.name.clone(), self.races.len());
        self.races.push(race);
        true
    }

    pub fn lookup(&self, race_name: &str) -> Option<&Race> {
        self.index.get(race_name).map(|&i| &self.races[i])
    }

    /// All races in schedule order
    pub fn races(&self) -> &[Race] {
        &self.races
    }

    pub fn len(&self) -> usize {
        self.races.len()
    }

    pub fn is_empty(&self) -> bool {
        self.races.is_empty()
    }
}

// ============================================================================
// TESTS
// ============================================================================
