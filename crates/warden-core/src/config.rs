//! Engine configuration.
//!
//! Historically the decay interval, thresholds, and warning texts were
//! scattered across the code paths that used them; this module is the
//! single source of truth for all of them.

use serde::{Deserialize, Serialize};

use crate::tier::{Tier, TierTable};

/// Default decay interval: every 15 minutes.
const DEFAULT_TICK_INTERVAL_SECS: u64 = 900;

/// Default points removed per decay tick.
const DEFAULT_DECAY_AMOUNT: i64 = 10;

/// Default commit retries before a write conflict surfaces as an error.
const DEFAULT_MAX_COMMIT_RETRIES: u32 = 5;

/// Warning texts per tier, plus the reason attached to exclusions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierMessages {
    /// Sent on ascension into [`Tier::Flagged`].
    pub flagged: String,
    /// Sent on ascension into [`Tier::RiskingExclusion`].
    pub risking_exclusion: String,
    /// Sent on ascension into [`Tier::Excluded`].
    pub excluded: String,
    /// Reason string passed to the platform exclusion action.
    pub exclusion_reason: String,
}

impl TierMessages {
    fn defaults_for(table: &TierTable) -> Self {
        let terminal = table.terminal_threshold();
        let warning = format!(
            "You have incurred significant infractions. You are at risk of \
             being excluded from the community once you reach {terminal} points."
        );
        Self {
            flagged: warning.clone(),
            risking_exclusion: warning,
            excluded: "Due to repeated violations of the rules, you have been \
                       excluded from the community."
                .to_string(),
            exclusion_reason: format!("Exceeded maximum infraction points ({terminal})."),
        }
    }

    /// Warning text for a tier, `None` for [`Tier::Active`].
    pub fn for_tier(&self, tier: Tier) -> Option<&str> {
        match tier {
            Tier::Active => None,
            Tier::Flagged => Some(&self.flagged),
            Tier::RiskingExclusion => Some(&self.risking_exclusion),
            Tier::Excluded => Some(&self.excluded),
        }
    }
}

impl Default for TierMessages {
    fn default() -> Self {
        Self::defaults_for(&TierTable::default())
    }
}

/// All tunables of the moderation engine in one place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModerationConfig {
    /// Seconds between decay ticks.
    pub tick_interval_secs: u64,
    /// Points removed from each non-zero record per tick.
    pub decay_amount: i64,
    /// Threshold table driving tier evaluation.
    pub tiers: TierTable,
    /// Warning and enforcement texts.
    pub messages: TierMessages,
    /// Optimistic-commit retry budget per mutation.
    pub max_commit_retries: u32,
}

impl Default for ModerationConfig {
    fn default() -> Self {
        let tiers = TierTable::default();
        let messages = TierMessages::defaults_for(&tiers);
        Self {
            tick_interval_secs: DEFAULT_TICK_INTERVAL_SECS,
            decay_amount: DEFAULT_DECAY_AMOUNT,
            tiers,
            messages,
            max_commit_retries: DEFAULT_MAX_COMMIT_RETRIES,
        }
    }
}

impl ModerationConfig {
    /// Create a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the decay tick interval in seconds.
    #[must_use]
    pub fn with_tick_interval_secs(mut self, secs: u64) -> Self {
        self.tick_interval_secs = secs;
        self
    }

    /// Set the per-tick decay amount.
    #[must_use]
    pub fn with_decay_amount(mut self, amount: i64) -> Self {
        self.decay_amount = amount;
        self
    }

    /// Replace the threshold table and refresh the default message texts
    /// to match its terminal threshold.
    #[must_use]
    pub fn with_tiers(mut self, tiers: TierTable) -> Self {
        self.messages = TierMessages::defaults_for(&tiers);
        self.tiers = tiers;
        self
    }

    /// Replace the message texts.
    #[must_use]
    pub fn with_messages(mut self, messages: TierMessages) -> Self {
        self.messages = messages;
        self
    }

    /// Set the commit retry budget.
    #[must_use]
    pub fn with_max_commit_retries(mut self, retries: u32) -> Self {
        self.max_commit_retries = retries;
        self
    }

    /// The decay interval as a [`std::time::Duration`].
    pub fn tick_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.tick_interval_secs)
    }
}
