// ✅ Data Quality - Rejected rows and integrity findings
//
// Nothing in the pipeline aborts on a bad row. Every skipped row, unknown
// tier or duplicate race lands here so the operator can see what was left
// out of the standings and why.

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// SEVERITY
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Critical, // Row could not be used at all
    Warning,  // Row used, but something about it is questionable
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::Warning => "warning",
        }
    }
}

// ============================================================================
// QUALITY ISSUE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityIssue {
    pub severity: Severity,

    /// Which input the row came from ("riders.csv", "Tour Race (html)")
    pub source: String,

    /// 1-based line in the source, header included (None for non-tabular)
    pub line: Option<usize>,

    pub field: String,
    pub issue: String,
}

impl QualityIssue {
    pub fn rejected(source: &str, line: Option<usize>, field: &str, issue: impl Into<String>) -> Self {
        QualityIssue {
            severity: Severity::Critical,
            source: source.to_string(),
            line,
            field: field.to_string(),
            issue: issue.into(),
        }
    }

    pub fn warning(source: &str, line: Option<usize>, field: &str, issue: impl Into<String>) -> Self {
        QualityIssue {
            severity: Severity::Warning,
            source: source.to_string(),
            line,
            field: field.to_string(),
            issue: issue.into(),
        }
    }
}

impl fmt::Display for QualityIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(
                f,
                "[{}] {}:{} {}: {}",
                self.severity.as_str(),
                self.source,
                line,
                self.field,
                self.issue
            ),
            None => write!(
                f,
                "[{}] {} {}: {}",
                self.severity.as_str(),
                self.source,
                self.field,
                self.issue
            ),
        }
    }
}

// ============================================================================
// QUALITY REPORT
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    pub issues: Vec<QualityIssue>,
}

impl QualityReport {
    pub fn new() -> Self {
        QualityReport::default()
    }

    pub fn push(&mut self, issue: QualityIssue) {
        self.issues.push(issue);
    }

    pub fn extend(&mut self, issues: impl IntoIterator<Item = QualityIssue>) {
        self.issues.extend(issues);
    }

    /// Rows that were skipped entirely
    pub fn rejected_count(&self) -> usize {
        self.count(Severity::Critical)
    }

    pub fn warning_count(&self) -> usize {
        self.count(Severity::Warning)
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.issues.iter().filter(|i| i.severity == severity).count()
    }

    pub fn has_critical_issues(&self) -> bool {
        self.issues.iter().any(|i| i.severity == Severity::Critical)
    }

    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn summary(&self) -> String {
        format!(
            "Issues: {} ({} rows rejected, {} warnings)",
            self.issues.len(),
            self.rejected_count(),
            self.warning_count()
        )
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_counts() {
        let mut report = QualityReport::new();
        assert!(report.is_clean());

        report.push(QualityIssue::rejected("riders.csv", Some(3), "owner", "Required field is empty"));
        report.push(QualityIssue::warning("schedule.csv", Some(5), "tier", "Unknown tier: Tier 9"));
        report.push(QualityIssue::rejected("results.csv", Some(7), "date", "Invalid date format: soon"));

        assert_eq!(report.rejected_count(), 2);
        assert_eq!(report.warning_count(), 1);
        assert_eq!(report.count(Severity::Warning), 1);
        assert!(report.has_critical_issues());
        assert_eq!(report.summary(), "Issues: 3 (2 rows rejected, 1 warnings)");
    }

    #[test]
    fn test_issue_display() {
        let issue = QualityIssue::rejected("riders.csv", Some(3), "owner", "Required field is empty");
        assert_eq!(issue.to_string(), "[critical] riders.csv:3 owner: Required field is empty");

        let issue = QualityIssue::warning("Tour Race (html)", None, "rank", "No results table");
        assert_eq!(issue.to_string(), "[warning] Tour Race (html) rank: No results table");
    }

    #[test]
    fn test_warnings_are_not_critical() {
        let mut report = QualityReport::new();
        report.push(QualityIssue::warning("schedule.csv", Some(2), "race_name", "Duplicate race"));
        assert!(!report.has_critical_issues());
        assert!(!report.is_clean());
    }
}
