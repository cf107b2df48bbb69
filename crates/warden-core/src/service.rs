//! The operations surface the command layer calls.

use std::sync::Arc;

use tracing::{debug, info};

use crate::audit::{LogAction, LogEntry};
use crate::config::ModerationConfig;
use crate::decay::{DecayScheduler, TickSummary};
use crate::enforce::{EscalationEnforcer, MembershipDirectory};
use crate::error::{Error, Result, ValidationError};
use crate::ledger::{DeltaOutcome, PointLedger};
use crate::notify::{NotificationChannel, NotificationDispatcher};
use crate::record::{Actor, CommunityConfig, UserRecord};
use crate::store::RecordStore;
use crate::tier::Tier;

/// A filtered-terms configuration command.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigAction {
    /// Add a new term with a point value.
    Add {
        /// Term to filter.
        term: String,
        /// Points incurred per hit.
        points: i64,
    },
    /// Remove an existing term.
    Remove {
        /// Term to remove.
        term: String,
    },
    /// Change the point value of an existing term.
    Update {
        /// Term to update.
        term: String,
        /// New point value.
        points: i64,
    },
    /// Read the configuration without changing it.
    View,
}

/// Result of scanning a message against the community's filtered terms.
#[derive(Debug, Clone)]
pub struct FilterScan {
    /// The terms that matched, in configuration-map order.
    pub terms: Vec<String>,
    /// Total points added across all matches.
    pub points_added: i64,
    /// The record after all hits were applied.
    pub record: UserRecord,
}

/// Facade wiring the ledger, dispatcher, enforcer, and scheduler.
pub struct ModerationService {
    config: ModerationConfig,
    store: Arc<dyn RecordStore>,
    ledger: Arc<PointLedger>,
    dispatcher: Arc<NotificationDispatcher>,
    enforcer: Arc<EscalationEnforcer>,
    scheduler: Arc<DecayScheduler>,
    directory: Arc<dyn MembershipDirectory>,
}

impl ModerationService {
    /// Wire up a service over the storage and platform seams.
    pub fn new(
        config: ModerationConfig,
        store: Arc<dyn RecordStore>,
        channel: Arc<dyn NotificationChannel>,
        directory: Arc<dyn MembershipDirectory>,
    ) -> Self {
        let ledger = Arc::new(PointLedger::new(store.clone(), &config));
        let dispatcher = Arc::new(NotificationDispatcher::new(
            channel,
            config.messages.clone(),
        ));
        let enforcer = Arc::new(EscalationEnforcer::new(
            directory.clone(),
            ledger.clone(),
            config.messages.exclusion_reason.clone(),
        ));
        let scheduler = Arc::new(DecayScheduler::new(
            store.clone(),
            ledger.clone(),
            dispatcher.clone(),
            enforcer.clone(),
            &config,
        ));
        Self {
            config,
            store,
            ledger,
            dispatcher,
            enforcer,
            scheduler,
            directory,
        }
    }

    /// Handle to the decay scheduler, for the host to spawn
    /// [`DecayScheduler::run`] once the platform connection is ready.
    pub fn scheduler(&self) -> Arc<DecayScheduler> {
        self.scheduler.clone()
    }

    // ── Point-affecting operations ──────────────────────────────

    /// Apply a moderator-issued point adjustment.
    pub async fn apply_manual_adjustment(
        &self,
        community: u64,
        user: u64,
        actor: Actor,
        points: i64,
        note: &str,
    ) -> Result<UserRecord> {
        let outcome = self
            .ledger
            .apply_delta(
                community,
                user,
                points,
                actor,
                LogAction::ManualAdjustment,
                note,
            )
            .await?;
        info!(
            community,
            user,
            points = outcome.record.points,
            status = %outcome.record.status,
            "manual adjustment applied"
        );
        self.escalate(&outcome).await;
        Ok(outcome.record)
    }

    /// Apply a content-filter hit for one term.
    pub async fn apply_filter_hit(
        &self,
        community: u64,
        user: u64,
        term: &str,
        points: i64,
    ) -> Result<UserRecord> {
        if points <= 0 {
            return Err(ValidationError::InvalidPoints(points).into());
        }
        let outcome = self
            .ledger
            .apply_delta(
                community,
                user,
                points,
                Actor::system(),
                LogAction::FilterHit {
                    term: term.to_string(),
                },
                &format!("automated filter hit on term `{term}`"),
            )
            .await?;
        self.escalate(&outcome).await;
        Ok(outcome.record)
    }

    /// Scan message content against the community's filtered terms and
    /// apply one filter hit per match. `None` when nothing matched.
    pub async fn scan_content(
        &self,
        community: u64,
        user: u64,
        content: &str,
    ) -> Result<Option<FilterScan>> {
        let config = self
            .store
            .load_config(community)
            .await?
            .unwrap_or_default();
        let matched: Vec<(String, i64)> = config
            .filtered_terms
            .iter()
            .filter(|(term, _)| content.contains(term.as_str()))
            .map(|(term, points)| (term.clone(), *points))
            .collect();
        if matched.is_empty() {
            return Ok(None);
        }

        let mut record = self.get_record(community, user).await?;
        let mut points_added = 0;
        for (term, points) in &matched {
            record = self.apply_filter_hit(community, user, term, *points).await?;
            points_added += points;
        }
        debug!(community, user, points_added, "content scan applied hits");
        Ok(Some(FilterScan {
            terms: matched.into_iter().map(|(term, _)| term).collect(),
            points_added,
            record,
        }))
    }

    // ── Read operations ─────────────────────────────────────────

    /// Current record for a user, zero-value if absent.
    pub async fn get_record(&self, community: u64, user: u64) -> Result<UserRecord> {
        Ok(self
            .store
            .load(community, user)
            .await?
            .map(|versioned| versioned.record)
            .unwrap_or_else(|| UserRecord::new(community, user)))
    }

    /// The user's infraction history in insertion order.
    pub async fn list_log(&self, community: u64, user: u64) -> Result<Vec<LogEntry>> {
        Ok(self
            .get_record(community, user)
            .await?
            .log
            .entries()
            .to_vec())
    }

    // ── Community configuration ─────────────────────────────────

    /// Apply a filtered-terms configuration command.
    pub async fn update_config(
        &self,
        community: u64,
        action: ConfigAction,
    ) -> Result<CommunityConfig> {
        let mut config = self
            .store
            .load_config(community)
            .await?
            .unwrap_or_default();
        match action {
            ConfigAction::View => return Ok(config),
            ConfigAction::Add { term, points } => {
                if points <= 0 {
                    return Err(ValidationError::InvalidPoints(points).into());
                }
                if config.filtered_terms.contains_key(&term) {
                    return Err(ValidationError::DuplicateTerm(term).into());
                }
                config.filtered_terms.insert(term, points);
            }
            ConfigAction::Update { term, points } => {
                if points <= 0 {
                    return Err(ValidationError::InvalidPoints(points).into());
                }
                if !config.filtered_terms.contains_key(&term) {
                    return Err(ValidationError::UnknownTerm(term).into());
                }
                config.filtered_terms.insert(term, points);
            }
            ConfigAction::Remove { term } => {
                if config.filtered_terms.remove(&term).is_none() {
                    return Err(ValidationError::UnknownTerm(term).into());
                }
            }
        }
        self.store.save_config(community, &config).await?;
        Ok(config)
    }

    /// Store the role whose members may moderate this community.
    pub async fn set_authorizer_role(
        &self,
        community: u64,
        role: &str,
    ) -> Result<CommunityConfig> {
        let mut config = self
            .store
            .load_config(community)
            .await?
            .unwrap_or_default();
        config.authorizer_role = Some(role.to_string());
        self.store.save_config(community, &config).await?;
        Ok(config)
    }

    /// The configured authorizer role, if any.
    pub async fn authorizer_role(&self, community: u64) -> Result<Option<String>> {
        Ok(self
            .store
            .load_config(community)
            .await?
            .and_then(|config| config.authorizer_role))
    }

    // ── Moderator notes ─────────────────────────────────────────

    /// The free-form notes on a record.
    pub async fn notes(&self, community: u64, user: u64) -> Result<String> {
        Ok(self.get_record(community, user).await?.notes)
    }

    /// Replace the notes on an existing record. Notes change
    /// independently of the log; no entry is appended.
    pub async fn set_notes(&self, community: u64, user: u64, text: &str) -> Result<UserRecord> {
        let mutation = self
            .ledger
            .update_with(community, user, true, |record| {
                record.notes = text.to_string();
                Ok(true)
            })
            .await?;
        Ok(mutation.after)
    }

    // ── Administrative exclusion control ────────────────────────

    /// Exclude a user immediately, outside the point thresholds.
    ///
    /// Requires an existing record so the exclusion lands in a real
    /// infraction history. Engages the terminal latch.
    pub async fn exclude_manually(
        &self,
        community: u64,
        user: u64,
        actor: Actor,
        reason: &str,
    ) -> Result<UserRecord> {
        if self.store.load(community, user).await?.is_none() {
            return Err(Error::Validation(ValidationError::UnknownRecord {
                community,
                user,
            }));
        }
        self.directory.exclude(community, user, reason).await?;
        info!(community, user, "user excluded by moderator action");

        let mutation = self
            .ledger
            .update_with(community, user, true, |record| {
                record.status = Tier::Excluded;
                record.log.append(LogEntry::new(
                    actor.clone(),
                    LogAction::Exclusion,
                    0,
                    reason,
                ));
                Ok(true)
            })
            .await?;
        Ok(mutation.after)
    }

    /// Reverse an exclusion on the platform and release the terminal
    /// latch; status reverts to whatever the current points evaluate to.
    pub async fn readmit(&self, community: u64, user: u64, actor: Actor) -> Result<UserRecord> {
        if self.store.load(community, user).await?.is_none() {
            return Err(Error::Validation(ValidationError::UnknownRecord {
                community,
                user,
            }));
        }
        self.directory.readmit(community, user).await?;
        info!(community, user, "user readmitted by moderator action");

        let tiers = self.config.tiers.clone();
        let mutation = self
            .ledger
            .update_with(community, user, true, move |record| {
                record.status = tiers.evaluate(record.points);
                record.log.append(LogEntry::new(
                    actor.clone(),
                    LogAction::Reversal,
                    0,
                    "readmitted to the community",
                ));
                Ok(true)
            })
            .await?;
        Ok(mutation.after)
    }

    // ── Decay ───────────────────────────────────────────────────

    /// Run one decay tick now, outside the schedule.
    pub async fn force_decay_tick(&self) -> Result<TickSummary> {
        self.scheduler.force_tick().await
    }

    async fn escalate(&self, outcome: &DeltaOutcome) {
        self.dispatcher.dispatch(outcome).await;
        self.enforcer.enforce(outcome).await;
    }
}
