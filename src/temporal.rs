// ⏰ Temporal Model - Roster validity windows
//
// A roster entry is in effect over a half-open date range:
//   [valid_from, valid_until)
// valid_from is inclusive (the add date), valid_until exclusive (the drop
// date). A missing bound is unbounded on that side.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// DATE WINDOW
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DateWindow {
    /// First day the value is in effect (None = since forever)
    pub valid_from: Option<NaiveDate>,

    /// First day the value is no longer in effect (None = still current)
    pub valid_until: Option<NaiveDate>,
}

impl DateWindow {
    /// Window covering all time
    pub fn always() -> Self {
        DateWindow::default()
    }

    /// Build a window, rejecting empty ranges (until <= from)
    pub fn new(valid_from: Option<NaiveDate>, valid_until: Option<NaiveDate>) -> Option<Self> {
        if let (Some(from), Some(until)) = (valid_from, valid_until) {
            if until <= from {
                return None;
            }
        }
        Some(DateWindow {
            valid_from,
            valid_until,
        })
    }

    /// Check if the window was in effect on a given day
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.valid_from.map_or(true, |from| from <= date)
            && self.valid_until.map_or(true, |until| until > date)
    }

    /// Like `contains`, but an unknown date always matches
    pub fn admits(&self, date: Option<NaiveDate>) -> bool {
        date.map_or(true, |d| self.contains(d))
    }

    /// Check if two windows share at least one day
    pub fn overlaps(&self, other: &DateWindow) -> bool {
        let starts_before_other_ends = match (self.valid_from, other.valid_until) {
            (Some(from), Some(until)) => from < until,
            _ => true,
        };
        let other_starts_before_end = match (other.valid_from, self.valid_until) {
            (Some(from), Some(until)) => from < until,
            _ => true,
        };
        starts_before_other_ends && other_starts_before_end
    }
}

impl fmt::Display for DateWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let from = self
            .valid_from
            .map(|d| d.to_string())
            .unwrap_or_else(|| "…".to_string());
        let until = self
            .valid_until
            .map(|d| d.to_string())
            .unwrap_or_else(|| "…".to_string());
        write!(f, "[{}, {})", from, until)
    }
}

// ============================================================================
// DATE PARSING
// ============================================================================

const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%m/%d/%Y", "%d.%m.%Y", "%b %d, %Y"];

/// Parse a date cell.
///
/// * `Ok(None)` - blank cell, the date is unknown
/// * `Ok(Some(_))` - parsed
/// * `Err(_)` - present but unparseable
pub fn parse_date(raw: &str) -> Result<Option<NaiveDate>, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    // Spreadsheet exports sometimes carry a midnight timestamp
    let date_part = trimmed
        .split_once(' ')
        .filter(|(d, t)| d.contains('-') && t.contains(':'))
        .map(|(d, _)| d)
        .unwrap_or(trimmed);

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(date_part, format) {
            return Ok(Some(date));
        }
    }

    Err(format!("Invalid date format: {}", trimmed))
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_always_contains_everything() {
        let w = DateWindow::always();
        assert!(w.contains(d(1990, 1, 1)));
        assert!(w.contains(d(2030, 12, 31)));
    }

    #[test]
    fn test_window_edges() {
        let w = DateWindow::new(Some(d(2026, 3, 1)), Some(d(2026, 5, 1))).unwrap();

        assert!(!w.contains(d(2026, 2, 28)));
        assert!(w.contains(d(2026, 3, 1)), "start is inclusive");
        assert!(w.contains(d(2026, 4, 30)));
        assert!(!w.contains(d(2026, 5, 1)), "end is exclusive");
    }

    #[test]
    fn test_unknown_date_is_admitted() {
        let w = DateWindow::new(Some(d(2026, 3, 1)), Some(d(2026, 5, 1))).unwrap();
        assert!(w.admits(None));
        assert!(!w.admits(Some(d(2026, 6, 1))));
    }

    #[test]
    fn test_empty_range_rejected() {
        assert!(DateWindow::new(Some(d(2026, 5, 1)), Some(d(2026, 5, 1))).is_none());
        assert!(DateWindow::new(Some(d(2026, 5, 2)), Some(d(2026, 5, 1))).is_none());
    }

    #[test]
    fn test_overlap() {
        let before = DateWindow::new(None, Some(d(2026, 5, 1))).unwrap();
        let after = DateWindow::new(Some(d(2026, 5, 1)), None).unwrap();
        let straddling = DateWindow::new(Some(d(2026, 4, 1)), Some(d(2026, 6, 1))).unwrap();

        // A trade: drop date == add date of the next entry
        assert!(!before.overlaps(&after));
        assert!(!after.overlaps(&before));

        assert!(before.overlaps(&straddling));
        assert!(after.overlaps(&straddling));
        assert!(DateWindow::always().overlaps(&before));
    }

    #[test]
    fn test_parse_date_formats() {
        assert_eq!(parse_date("2026-03-01"), Ok(Some(d(2026, 3, 1))));
        assert_eq!(parse_date("03/01/2026"), Ok(Some(d(2026, 3, 1))));
        assert_eq!(parse_date("01.03.2026"), Ok(Some(d(2026, 3, 1))));
        assert_eq!(parse_date("Mar 01, 2026"), Ok(Some(d(2026, 3, 1))));
        assert_eq!(parse_date("2026-03-01 00:00:00"), Ok(Some(d(2026, 3, 1))));
    }

    #[test]
    fn test_parse_date_blank_and_invalid() {
        assert_eq!(parse_date(""), Ok(None));
        assert_eq!(parse_date("  "), Ok(None));
        assert!(parse_date("next tuesday").is_err());
        assert!(parse_date("2026-13-01").is_err());
    }

    #[test]
    fn test_display() {
        let w = DateWindow::new(Some(d(2026, 3, 1)), None).unwrap();
        assert_eq!(w.to_string(), "[2026-03-01, …)");
    }
}
