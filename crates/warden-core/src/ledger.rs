//! The point ledger — sole writer of point deltas.
//!
//! Every mutation of a user record flows through here as an optimistic
//! read-modify-write loop: load the versioned record, apply the change,
//! commit with compare-and-swap, retry on conflict. Concurrent callers
//! on the same key are therefore both reflected; no delta is lost.

use std::sync::Arc;

use tracing::debug;

use crate::audit::{LogAction, LogEntry};
use crate::config::ModerationConfig;
use crate::error::{Error, Result, StoreError, ValidationError};
use crate::notify::ascended_tier;
use crate::record::{Actor, UserRecord};
use crate::store::RecordStore;
use crate::tier::{Tier, TierTable};

/// Pre- and post-images of one committed mutation. When the mutator
/// declines to change anything the images are equal and no write was
/// issued.
#[derive(Debug, Clone)]
pub(crate) struct Mutation {
    /// The record before the mutation (zero-value when freshly created).
    pub(crate) before: UserRecord,
    /// The record as committed.
    pub(crate) after: UserRecord,
}

/// Result of [`PointLedger::apply_delta`], carrying everything the
/// escalation path needs without re-reading the store.
#[derive(Debug, Clone)]
pub struct DeltaOutcome {
    /// The committed record.
    pub record: UserRecord,
    /// Tier before the delta was applied.
    pub previous_tier: Tier,
    /// Tier to warn about; set exactly when the notification marker
    /// advanced in this commit.
    pub notify: Option<Tier>,
    /// True when this delta moved the record into the terminal tier.
    pub entered_terminal: bool,
}

/// Owns atomic mutation of a user's points and log.
pub struct PointLedger {
    store: Arc<dyn RecordStore>,
    tiers: TierTable,
    max_commit_retries: u32,
}

impl PointLedger {
    /// Create a ledger over a store.
    pub fn new(store: Arc<dyn RecordStore>, config: &ModerationConfig) -> Self {
        Self {
            store,
            tiers: config.tiers.clone(),
            max_commit_retries: config.max_commit_retries,
        }
    }

    /// Apply a signed point delta and append exactly one log entry.
    ///
    /// Points floor at zero and the entry records the effective (clamped)
    /// change. Status is recomputed from the new total unless the
    /// terminal latch is engaged. If the new tier is one the user has not
    /// been warned about, the notification marker advances in the same
    /// commit as the points, so a crash after commit can never produce a
    /// duplicate warning.
    ///
    /// A decay delta that would change nothing (points already zero) is
    /// suppressed entirely: no write, no log entry.
    pub async fn apply_delta(
        &self,
        community: u64,
        user: u64,
        delta: i64,
        actor: Actor,
        action: LogAction,
        note: &str,
    ) -> Result<DeltaOutcome> {
        let mutation = self
            .update_with(community, user, false, |record| {
                let previous = record.status;
                let new_points = (record.points + delta).max(0);
                let effective = new_points - record.points;
                if effective == 0 && matches!(action, LogAction::Decay) {
                    return Ok(false);
                }
                record.points = new_points;
                if record.status != Tier::Excluded {
                    record.status = self.tiers.evaluate(new_points);
                }
                record.log.append(LogEntry::new(
                    actor.clone(),
                    action.clone(),
                    effective,
                    note,
                ));
                if let Some(tier) = ascended_tier(previous, record.status, record.last_notified_tier)
                {
                    record.last_notified_tier = Some(tier);
                }
                Ok(true)
            })
            .await?;

        let notify = if mutation.after.last_notified_tier != mutation.before.last_notified_tier {
            mutation.after.last_notified_tier
        } else {
            None
        };
        let terminal = self.tiers.terminal();
        Ok(DeltaOutcome {
            previous_tier: mutation.before.status,
            notify,
            entered_terminal: mutation.before.status != terminal
                && mutation.after.status == terminal,
            record: mutation.after,
        })
    }

    /// Run an arbitrary record mutation through the commit loop.
    ///
    /// The mutator may be invoked multiple times (once per conflict
    /// retry) and must be deterministic given the record it receives.
    /// Returning `Ok(false)` skips the write and reports the record
    /// unchanged. With `require_existing`, a missing record is a
    /// validation error instead of a lazily created zero-value record.
    pub(crate) async fn update_with<F>(
        &self,
        community: u64,
        user: u64,
        require_existing: bool,
        mutate: F,
    ) -> Result<Mutation>
    where
        F: Fn(&mut UserRecord) -> std::result::Result<bool, ValidationError>,
    {
        let mut attempts: u32 = 0;
        loop {
            let loaded = self.store.load(community, user).await?;
            let (before, version) = match loaded {
                Some(versioned) => (versioned.record, Some(versioned.version)),
                None if require_existing => {
                    return Err(Error::Validation(ValidationError::UnknownRecord {
                        community,
                        user,
                    }))
                }
                None => (UserRecord::new(community, user), None),
            };

            let mut after = before.clone();
            if !mutate(&mut after).map_err(Error::Validation)? {
                return Ok(Mutation {
                    after: before.clone(),
                    before,
                });
            }

            match self.store.store(&after, version).await {
                Ok(()) => return Ok(Mutation { before, after }),
                Err(StoreError::Conflict) if attempts < self.max_commit_retries => {
                    attempts += 1;
                    debug!(community, user, attempts, "write conflict, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}
