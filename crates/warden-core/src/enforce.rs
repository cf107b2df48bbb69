//! Terminal-tier enforcement: the exclusion action.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::audit::{LogAction, LogEntry};
use crate::error::DirectoryError;
use crate::ledger::{DeltaOutcome, PointLedger};
use crate::record::Actor;

/// Membership and exclusion state of the hosting platform.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MembershipDirectory: Send + Sync {
    /// Whether the subject is already excluded from the community.
    async fn is_excluded(&self, community: u64, user: u64) -> Result<bool, DirectoryError>;

    /// Exclude the subject, with a reason visible to platform audit tools.
    async fn exclude(&self, community: u64, user: u64, reason: &str)
        -> Result<(), DirectoryError>;

    /// Reverse an exclusion.
    async fn readmit(&self, community: u64, user: u64) -> Result<(), DirectoryError>;
}

/// Runs the exclusion action exactly once per entry into the terminal
/// tier.
///
/// Entry into the terminal tier is detected on the committed record, so
/// among concurrent triggers only the one whose commit performed the
/// transition enforces; the directory check on top covers exclusions
/// that happened outside this process. Directory failures are logged and
/// recovered; the point and tier state stays committed either way.
pub struct EscalationEnforcer {
    directory: Arc<dyn MembershipDirectory>,
    ledger: Arc<PointLedger>,
    reason: String,
}

impl EscalationEnforcer {
    /// Create an enforcer.
    pub fn new(
        directory: Arc<dyn MembershipDirectory>,
        ledger: Arc<PointLedger>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            directory,
            ledger,
            reason: reason.into(),
        }
    }

    /// Enforce exclusion if `outcome` entered the terminal tier.
    pub async fn enforce(&self, outcome: &DeltaOutcome) {
        if !outcome.entered_terminal {
            return;
        }
        let community = outcome.record.community_id;
        let user = outcome.record.user_id;

        match self.directory.is_excluded(community, user).await {
            Ok(true) => {
                debug!(community, user, "already excluded, skipping enforcement");
                return;
            }
            Ok(false) => {}
            Err(e) => {
                warn!(community, user, error = %e, "exclusion state check failed");
                return;
            }
        }

        if let Err(e) = self.directory.exclude(community, user, &self.reason).await {
            warn!(community, user, error = %e, "exclusion action failed");
            return;
        }
        info!(community, user, "user excluded after reaching terminal tier");

        let reason = self.reason.clone();
        let appended = self
            .ledger
            .update_with(community, user, true, move |record| {
                record.log.append(LogEntry::new(
                    Actor::system(),
                    LogAction::Exclusion,
                    0,
                    reason.clone(),
                ));
                Ok(true)
            })
            .await;
        if let Err(e) = appended {
            warn!(community, user, error = %e, "failed to append exclusion entry");
        }
    }
}
