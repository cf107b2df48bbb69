//! Severity tiers and the threshold table that maps points onto them.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Severity tier of a user record, ordered from least to most severe.
///
/// The ordering of the variants is load-bearing: tier comparisons
/// (`new_tier > previous_tier`) drive notification and enforcement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// Member in good standing.
    Active,
    /// Accumulated enough points to be on the moderators' radar.
    Flagged,
    /// One more serious infraction away from exclusion.
    RiskingExclusion,
    /// Terminal tier. Reaching it triggers exclusion from the community.
    Excluded,
}

impl Tier {
    /// Stable string form, matching the persisted representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Active => "active",
            Tier::Flagged => "flagged",
            Tier::RiskingExclusion => "risking_exclusion",
            Tier::Excluded => "excluded",
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Tier::Active),
            "flagged" => Ok(Tier::Flagged),
            "risking_exclusion" => Ok(Tier::RiskingExclusion),
            "excluded" => Ok(Tier::Excluded),
            other => Err(format!("unknown tier: {other}")),
        }
    }
}

/// Ascending threshold table mapping point totals to tiers.
///
/// `evaluate` is a pure function of the point total; the tier of the
/// highest threshold less than or equal to the total wins, so landing
/// exactly on a threshold counts as entering that tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierTable {
    thresholds: Vec<(i64, Tier)>,
}

impl Default for TierTable {
    fn default() -> Self {
        Self {
            thresholds: vec![
                (0, Tier::Active),
                (300, Tier::Flagged),
                (500, Tier::RiskingExclusion),
                (1000, Tier::Excluded),
            ],
        }
    }
}

impl TierTable {
    /// Build a table from `(threshold, tier)` pairs.
    ///
    /// The table must start at threshold 0 and be strictly ascending in
    /// both thresholds and tier severity.
    pub fn new(thresholds: Vec<(i64, Tier)>) -> Result<Self, ValidationError> {
        match thresholds.first() {
            None => {
                return Err(ValidationError::InvalidTierTable(
                    "threshold table is empty".into(),
                ))
            }
            Some((first, _)) if *first != 0 => {
                return Err(ValidationError::InvalidTierTable(format!(
                    "first threshold must be 0, got {first}"
                )))
            }
            Some(_) => {}
        }
        for pair in thresholds.windows(2) {
            let (lo_points, lo_tier) = pair[0];
            let (hi_points, hi_tier) = pair[1];
            if hi_points <= lo_points || hi_tier <= lo_tier {
                return Err(ValidationError::InvalidTierTable(format!(
                    "thresholds must ascend: ({lo_points}, {lo_tier}) then ({hi_points}, {hi_tier})"
                )));
            }
        }
        Ok(Self { thresholds })
    }

    /// Tier for a point total.
    pub fn evaluate(&self, points: i64) -> Tier {
        self.thresholds
            .iter()
            .rev()
            .find(|(threshold, _)| points >= *threshold)
            .map(|(_, tier)| *tier)
            .unwrap_or(Tier::Active)
    }

    /// The most severe tier in the table.
    pub fn terminal(&self) -> Tier {
        // Constructor guarantees the table is non-empty and ascending.
        self.thresholds.last().map(|(_, t)| *t).unwrap_or(Tier::Excluded)
    }

    /// Point threshold of the terminal tier.
    pub fn terminal_threshold(&self) -> i64 {
        self.thresholds.last().map(|(p, _)| *p).unwrap_or(i64::MAX)
    }
}
