// 🔤 Name Normalizer - Rider name → match key
//
// Source feeds disagree on spelling, accents, name order and whether a team
// name is glued onto the rider:
//   "Pogačar-UAE Team Emirates", "POGACAR Tadej", "Tadej Pogacar"
// The key is only ever used for joining, never displayed.

use serde::{Deserialize, Serialize};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

// ============================================================================
// HYPHEN POLICY
// ============================================================================

/// How hyphens in a raw name are treated.
///
/// The two policies disagree on double-barrelled surnames without a team
/// suffix: "Cort-Nielsen" becomes "cort" under `StripTeamSuffix` but
/// "cort nielsen" under `SplitWords`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HyphenPolicy {
    /// "Name-Team Name" → keep only what precedes the first hyphen
    #[default]
    StripTeamSuffix,

    /// Treat every hyphen as a word separator
    SplitWords,
}

// ============================================================================
// NORMALIZATION
// ============================================================================

/// Normalize with the default hyphen policy.
pub fn normalize(raw: &str) -> String {
    normalize_with(raw, HyphenPolicy::default())
}

/// Canonicalize a free-text rider name into a join key.
///
/// Steps: lower-case, NFD + drop combining marks, hyphen policy, drop
/// punctuation, split on whitespace, sort tokens, join with one space.
/// Empty input yields an empty key, which matches nothing.
pub fn normalize_with(raw: &str, policy: HyphenPolicy) -> String {
    // Lower-case first: some capitals lower-case into base + combining mark
    let folded: String = raw
        .to_lowercase()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect();

    let name_part = match policy {
        HyphenPolicy::StripTeamSuffix => folded.split('-').next().unwrap_or(""),
        HyphenPolicy::SplitWords => folded.as_str(),
    };

    let cleaned: String = name_part
        .chars()
        .filter_map(|c| {
            if c.is_alphanumeric() {
                Some(c)
            } else if c.is_whitespace() || c == '-' {
                Some(' ')
            } else {
                None
            }
        })
        .collect();

    let mut tokens: Vec<&str> = cleaned.split_whitespace().collect();
    tokens.sort_unstable();
    tokens.join(" ")
}

/// Tokens of an already-normalized key.
pub fn key_tokens(key: &str) -> Vec<&str> {
    key.split(' ').filter(|t| !t.is_empty()).collect()
}

// ============================================================================
// TESTS
// ============================================================================
