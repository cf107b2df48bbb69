//! Recurring point decay.
//!
//! A single long-lived task scans all records on a fixed interval and
//! walks each non-zero record down through the ledger. Ticks never
//! overlap: the loop runs them inline and a mutex serializes manual
//! triggers against scheduled ones.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Timelike, Utc};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::audit::LogAction;
use crate::config::ModerationConfig;
use crate::enforce::EscalationEnforcer;
use crate::error::Result;
use crate::ledger::PointLedger;
use crate::notify::NotificationDispatcher;
use crate::record::Actor;
use crate::store::RecordStore;

const DECAY_NOTE: &str = "scheduled point decay";

/// Counters from one decay tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickSummary {
    /// Records seen by the scan.
    pub scanned: usize,
    /// Records whose points were reduced.
    pub decayed: usize,
    /// Records skipped because their points were already zero.
    pub skipped: usize,
    /// Records skipped because of a per-record failure.
    pub failed: usize,
}

/// Drives the recurring decay process.
pub struct DecayScheduler {
    store: Arc<dyn RecordStore>,
    ledger: Arc<PointLedger>,
    dispatcher: Arc<NotificationDispatcher>,
    enforcer: Arc<EscalationEnforcer>,
    interval: Duration,
    decay_amount: i64,
    tick_lock: Mutex<()>,
}

impl DecayScheduler {
    /// Create a scheduler over the shared engine components.
    pub fn new(
        store: Arc<dyn RecordStore>,
        ledger: Arc<PointLedger>,
        dispatcher: Arc<NotificationDispatcher>,
        enforcer: Arc<EscalationEnforcer>,
        config: &ModerationConfig,
    ) -> Self {
        Self {
            store,
            ledger,
            dispatcher,
            enforcer,
            interval: config.tick_interval(),
            decay_amount: config.decay_amount,
            tick_lock: Mutex::new(()),
        }
    }

    /// Run the decay loop until `shutdown` fires.
    ///
    /// The host calls this once the platform connection is ready. The
    /// first firing aligns to the next clean interval boundary; after
    /// that, ticks fire every interval. Cancellation stops scheduling
    /// immediately and an in-flight tick checks the token between
    /// records.
    pub async fn run(&self, shutdown: CancellationToken) {
        let first = align_delay(Utc::now(), self.interval);
        info!(
            interval_secs = self.interval.as_secs(),
            first_tick_in_secs = first.as_secs(),
            "decay scheduler starting"
        );
        tokio::select! {
            _ = tokio::time::sleep(first) => {}
            _ = shutdown.cancelled() => {
                info!("decay scheduler stopped before first tick");
                return;
            }
        }

        loop {
            match self.tick(&shutdown).await {
                Ok(summary) => {
                    info!(
                        scanned = summary.scanned,
                        decayed = summary.decayed,
                        skipped = summary.skipped,
                        failed = summary.failed,
                        "decay tick complete"
                    );
                }
                Err(e) => warn!(error = %e, "decay tick failed"),
            }

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = shutdown.cancelled() => {
                    info!("decay scheduler stopped");
                    return;
                }
            }
        }
    }

    /// Run one tick immediately, outside the schedule.
    ///
    /// Shares the tick mutex with the scheduled loop, so a forced tick
    /// can never overlap a scheduled one.
    pub async fn force_tick(&self) -> Result<TickSummary> {
        self.tick(&CancellationToken::new()).await
    }

    async fn tick(&self, shutdown: &CancellationToken) -> Result<TickSummary> {
        let _guard = self.tick_lock.lock().await;
        let records = self.store.scan_all().await?;
        let mut summary = TickSummary::default();

        for record in records {
            if shutdown.is_cancelled() {
                info!(
                    scanned = summary.scanned,
                    "decay tick cancelled mid-scan"
                );
                break;
            }
            summary.scanned += 1;
            if record.points <= 0 {
                summary.skipped += 1;
                continue;
            }

            match self
                .ledger
                .apply_delta(
                    record.community_id,
                    record.user_id,
                    -self.decay_amount,
                    Actor::system(),
                    LogAction::Decay,
                    DECAY_NOTE,
                )
                .await
            {
                Ok(outcome) => {
                    summary.decayed += 1;
                    debug!(
                        community = record.community_id,
                        user = record.user_id,
                        points = outcome.record.points,
                        "points decayed"
                    );
                    // Decay usually de-escalates, but a concurrent
                    // increase can still land an ascension here.
                    self.dispatcher.dispatch(&outcome).await;
                    self.enforcer.enforce(&outcome).await;
                }
                Err(e) => {
                    summary.failed += 1;
                    warn!(
                        community = record.community_id,
                        user = record.user_id,
                        error = %e,
                        "decay skipped record"
                    );
                }
            }
        }
        Ok(summary)
    }
}

/// Delay until the next clean interval boundary, measured from midnight
/// UTC. Purely cosmetic alignment; a full interval is returned when
/// `now` sits exactly on a boundary.
pub(crate) fn align_delay(now: DateTime<Utc>, interval: Duration) -> Duration {
    let interval_secs = interval.as_secs().max(1);
    let since_midnight = u64::from(now.num_seconds_from_midnight());
    Duration::from_secs(interval_secs - (since_midnight % interval_secs))
}
