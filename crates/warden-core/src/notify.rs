//! Tier-warning notifications, at most once per ascension.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::config::TierMessages;
use crate::error::DeliveryError;
use crate::ledger::DeltaOutcome;
use crate::tier::Tier;

/// Outbound direct-message delivery to the hosting platform.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Deliver `text` to a user as a direct message.
    async fn deliver_direct_message(
        &self,
        community: u64,
        user: u64,
        text: &str,
    ) -> Result<(), DeliveryError>;
}

/// The idempotency guard for tier warnings.
///
/// Returns the tier to warn about only when `new` is strictly more
/// severe than both the previous tier and the highest tier already
/// notified. The marker is never cleared on decay, so re-ascending a
/// previously notified tier stays silent.
pub fn ascended_tier(previous: Tier, new: Tier, last_notified: Option<Tier>) -> Option<Tier> {
    if new > previous && last_notified.is_none_or(|notified| new > notified) {
        Some(new)
    } else {
        None
    }
}

/// Composes and delivers tier warnings after a commit.
///
/// The decision to notify was already made (and persisted as the
/// notification marker) inside the same transaction that changed the
/// points; delivery failure here is logged and recovered, never
/// propagated, and never rolls the marker back.
pub struct NotificationDispatcher {
    channel: Arc<dyn NotificationChannel>,
    messages: TierMessages,
}

impl NotificationDispatcher {
    /// Create a dispatcher over a channel.
    pub fn new(channel: Arc<dyn NotificationChannel>, messages: TierMessages) -> Self {
        Self { channel, messages }
    }

    /// Deliver the warning recorded in `outcome`, if any.
    pub async fn dispatch(&self, outcome: &DeltaOutcome) {
        let Some(tier) = outcome.notify else { return };
        let Some(warning) = self.messages.for_tier(tier) else {
            return;
        };
        let record = &outcome.record;
        let text = format!(
            "{warning}\n\nCurrent points: {}\n\nInfraction log:\n{}",
            record.points,
            record.log.render(),
        );

        match self
            .channel
            .deliver_direct_message(record.community_id, record.user_id, &text)
            .await
        {
            Ok(()) => {
                debug!(
                    community = record.community_id,
                    user = record.user_id,
                    tier = %tier,
                    "tier warning delivered"
                );
            }
            Err(DeliveryError::Unreachable) => {
                warn!(
                    community = record.community_id,
                    user = record.user_id,
                    tier = %tier,
                    "tier warning not delivered: recipient unreachable"
                );
            }
            Err(e) => {
                warn!(
                    community = record.community_id,
                    user = record.user_id,
                    tier = %tier,
                    error = %e,
                    "tier warning delivery failed"
                );
            }
        }
    }
}
