// 🏆 Scoring Table - Points by (tier, rank)

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ============================================================================
// TIER
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Tier {
    #[serde(rename = "Tier 1")]
    One,
    #[serde(rename = "Tier 2")]
    Two,
    #[serde(rename = "Tier 3")]
    Three,
}

impl Tier {
    pub const ALL: [Tier; 3] = [Tier::One, Tier::Two, Tier::Three];

    /// Human-readable label, as used in schedule listings
    pub fn label(&self) -> &'static str {
        match self {
            Tier::One => "Tier 1",
            Tier::Two => "Tier 2",
            Tier::Three => "Tier 3",
        }
    }

    /// Parse a schedule label: "Tier 1", "tier1", "T1", "1"
    pub fn parse(label: &str) -> Option<Tier> {
        let compact: String = label
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
            .collect::<String>()
            .to_lowercase();

        let digits = compact
            .strip_prefix("tier")
            .or_else(|| compact.strip_prefix('t'))
            .unwrap_or(&compact);

        match digits {
            "1" => Some(Tier::One),
            "2" => Some(Tier::Two),
            "3" => Some(Tier::Three),
            _ => None,
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ============================================================================
// TABLE ERRORS
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum TableError {
    /// A tier has no points row
    MissingTier(Tier),

    /// Points within a tier do not strictly decrease with rank
    NotDecreasing { tier: Tier, rank: u32 },

    /// A lower tier pays at least as much as a higher tier at some rank
    NotDominating { higher: Tier, lower: Tier, rank: u32 },
}

impl fmt::Display for TableError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableError::MissingTier(tier) => write!(f, "No points row for {}", tier),
            TableError::NotDecreasing { tier, rank } => {
                write!(f, "{}: rank {} does not pay less than rank {}", tier, rank, rank.saturating_sub(1))
            }
            TableError::NotDominating { higher, lower, rank } => {
                write!(f, "{} does not pay more than {} at rank {}", higher, lower, rank)
            }
        }
    }
}

impl std::error::Error for TableError {}

// ============================================================================
// SCORING TABLE
// ============================================================================

/// Points per tier; index 0 holds the points for rank 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScoringTable {
    tiers: BTreeMap<Tier, Vec<u32>>,
}

impl ScoringTable {
    /// The league's standard top-10 table
    pub fn standard() -> Self {
        let mut tiers = BTreeMap::new();
        tiers.insert(Tier::One, vec![30, 27, 24, 21, 18, 15, 12, 9, 6, 3]);
        tiers.insert(Tier::Two, vec![20, 18, 16, 14, 12, 10, 8, 6, 4, 2]);
        tiers.insert(Tier::Three, vec![10, 9, 8, 7, 6, 5, 4, 3, 2, 1]);
        ScoringTable { tiers }
    }

    pub fn from_rows(tiers: BTreeMap<Tier, Vec<u32>>) -> Self {
        ScoringTable { tiers }
    }

    /// Points for a finish. Unknown tier, rank 0, or rank past the end of
    /// the tier's row all score zero.
    pub fn points(&self, tier: Option<Tier>, rank: u32) -> u32 {
        let Some(row) = tier.and_then(|t| self.tiers.get(&t)) else {
            return 0;
        };
        if rank == 0 {
            return 0;
        }
        row.get(rank as usize - 1).copied().unwrap_or(0)
    }

    /// Deepest scoring rank across all tiers
    pub fn max_rank(&self) -> u32 {
        self.tiers.values().map(|r| r.len() as u32).max().unwrap_or(0)
    }

    /// Check the table's shape: each tier strictly decreasing in rank, and
    /// each tier paying strictly more than the next lower tier at every rank
    /// both rows cover.
    pub fn validate(&self) -> Result<(), TableError> {
        for tier in Tier::ALL {
            let row = self.tiers.get(&tier).ok_or(TableError::MissingTier(tier))?;
            for (idx, pair) in row.windows(2).enumerate() {
                if pair[1] >= pair[0] {
                    return Err(TableError::NotDecreasing {
                        tier,
                        rank: idx as u32 + 2,
                    });
                }
            }
        }

        for pair in Tier::ALL.windows(2) {
            let (higher, lower) = (pair[0], pair[1]);
            let higher_row = &self.tiers[&higher];
            let lower_row = &self.tiers[&lower];
            for (idx, (h, l)) in higher_row.iter().zip(lower_row.iter()).enumerate() {
                if h <= l {
                    return Err(TableError::NotDominating {
                        higher,
                        lower,
                        rank: idx as u32 + 1,
                    });
                }
            }
        }

        Ok(())
    }
}

impl Default for ScoringTable {
    fn default() -> Self {
        Self::standard()
    }
}

// ============================================================================
// TESTS
// ============================================================================
