//! End-to-end scenarios: the full engine over real SQLite.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use warden_core::{
    Actor, ConfigAction, DeliveryError, DirectoryError, LogAction, MembershipDirectory,
    ModerationConfig, ModerationService, NotificationChannel, Tier,
};
use warden_store::SqliteStore;

/// Direct-message channel that records every delivery attempt.
#[derive(Default)]
struct RecordingChannel {
    deliveries: Mutex<Vec<(u64, u64, String)>>,
    fail_unreachable: AtomicBool,
}

impl RecordingChannel {
    fn attempts(&self) -> usize {
        self.deliveries.lock().unwrap().len()
    }

    fn last_text(&self) -> Option<String> {
        self.deliveries
            .lock()
            .unwrap()
            .last()
            .map(|(_, _, text)| text.clone())
    }
}

#[async_trait]
impl NotificationChannel for RecordingChannel {
    async fn deliver_direct_message(
        &self,
        community: u64,
        user: u64,
        text: &str,
    ) -> Result<(), DeliveryError> {
        self.deliveries
            .lock()
            .unwrap()
            .push((community, user, text.to_string()));
        if self.fail_unreachable.load(Ordering::SeqCst) {
            return Err(DeliveryError::Unreachable);
        }
        Ok(())
    }
}

/// Membership directory that tracks exclusion state in memory.
#[derive(Default)]
struct FakeDirectory {
    excluded: Mutex<HashSet<(u64, u64)>>,
    exclude_calls: AtomicUsize,
}

impl FakeDirectory {
    fn exclude_calls(&self) -> usize {
        self.exclude_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MembershipDirectory for FakeDirectory {
    async fn is_excluded(&self, community: u64, user: u64) -> Result<bool, DirectoryError> {
        Ok(self.excluded.lock().unwrap().contains(&(community, user)))
    }

    async fn exclude(
        &self,
        community: u64,
        user: u64,
        _reason: &str,
    ) -> Result<(), DirectoryError> {
        self.exclude_calls.fetch_add(1, Ordering::SeqCst);
        self.excluded.lock().unwrap().insert((community, user));
        Ok(())
    }

    async fn readmit(&self, community: u64, user: u64) -> Result<(), DirectoryError> {
        self.excluded.lock().unwrap().remove(&(community, user));
        Ok(())
    }
}

struct TestContext {
    service: ModerationService,
    channel: Arc<RecordingChannel>,
    directory: Arc<FakeDirectory>,
}

async fn create_context(config: ModerationConfig) -> TestContext {
    let store = Arc::new(SqliteStore::in_memory().await.unwrap());
    let channel = Arc::new(RecordingChannel::default());
    let directory = Arc::new(FakeDirectory::default());
    let service = ModerationService::new(config, store, channel.clone(), directory.clone());
    TestContext {
        service,
        channel,
        directory,
    }
}

const COMMUNITY: u64 = 4242;
const USER: u64 = 1001;
const MOD: u64 = 7;

fn moderator() -> Actor {
    Actor::user(MOD, "mod")
}

#[tokio::test]
async fn test_new_user_record_created_on_first_adjustment() {
    let ctx = create_context(ModerationConfig::default()).await;

    let record = ctx
        .service
        .apply_manual_adjustment(COMMUNITY, USER, moderator(), 50, "spam")
        .await
        .unwrap();

    assert_eq!(record.points, 50);
    assert_eq!(record.status, Tier::Active);
    assert_eq!(record.log.len(), 1);
    let entry = &record.log.entries()[0];
    assert_eq!(entry.action, LogAction::ManualAdjustment);
    assert_eq!(entry.point_delta, 50);
    assert_eq!(entry.note, "spam");
    assert_eq!(entry.actor.id, Some(MOD));
    assert_eq!(ctx.channel.attempts(), 0);
}

#[tokio::test]
async fn test_flagged_ascension_notifies_exactly_once() {
    let ctx = create_context(ModerationConfig::default()).await;

    ctx.service
        .apply_manual_adjustment(COMMUNITY, USER, moderator(), 250, "spam")
        .await
        .unwrap();
    assert_eq!(ctx.channel.attempts(), 0);

    let record = ctx
        .service
        .apply_manual_adjustment(COMMUNITY, USER, moderator(), 60, "repeat spam")
        .await
        .unwrap();
    assert_eq!(record.points, 310);
    assert_eq!(record.status, Tier::Flagged);
    assert_eq!(record.last_notified_tier, Some(Tier::Flagged));
    assert_eq!(ctx.channel.attempts(), 1);

    let text = ctx.channel.last_text().unwrap();
    assert!(text.contains("Current points: 310"));
    assert!(text.contains("Infraction log:"));
    assert!(text.contains("manual_adjustment"));

    // Still flagged: no second warning.
    ctx.service
        .apply_manual_adjustment(COMMUNITY, USER, moderator(), 10, "again")
        .await
        .unwrap();
    assert_eq!(ctx.channel.attempts(), 1);
}

#[tokio::test]
async fn test_decay_walks_record_to_zero_and_reverts_status() {
    let ctx = create_context(ModerationConfig::default()).await;
    ctx.service
        .apply_manual_adjustment(COMMUNITY, USER, moderator(), 350, "spam")
        .await
        .unwrap();

    for _ in 0..36 {
        ctx.service.force_decay_tick().await.unwrap();
    }

    let record = ctx.service.get_record(COMMUNITY, USER).await.unwrap();
    assert_eq!(record.points, 0);
    assert_eq!(record.status, Tier::Active);
    // One manual entry plus 35 decay entries; the tick at zero appends
    // nothing.
    assert_eq!(record.log.len(), 36);
    let decay_entries = record
        .log
        .entries()
        .iter()
        .filter(|e| e.action == LogAction::Decay)
        .count();
    assert_eq!(decay_entries, 35);

    let summary = ctx.service.force_decay_tick().await.unwrap();
    assert_eq!(summary.scanned, 1);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.decayed, 0);
}

#[tokio::test]
async fn test_configured_term_can_exclude_in_one_hit() {
    let ctx = create_context(ModerationConfig::default()).await;
    ctx.service
        .update_config(
            COMMUNITY,
            ConfigAction::Add {
                term: "slur".into(),
                points: 1000,
            },
        )
        .await
        .unwrap();

    let scan = ctx
        .service
        .scan_content(COMMUNITY, USER, "message containing slur here")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(scan.points_added, 1000);
    assert_eq!(scan.terms, vec!["slur".to_string()]);

    let record = ctx.service.get_record(COMMUNITY, USER).await.unwrap();
    assert_eq!(record.points, 1000);
    assert_eq!(record.status, Tier::Excluded);
    assert_eq!(ctx.directory.exclude_calls(), 1);

    let log = ctx.service.list_log(COMMUNITY, USER).await.unwrap();
    assert_eq!(log.len(), 2);
    assert_eq!(
        log[0].action,
        LogAction::FilterHit {
            term: "slur".into()
        }
    );
    assert_eq!(log[1].action, LogAction::Exclusion);
    assert_eq!(log[1].point_delta, 0);

    // The terminal warning went out too.
    assert_eq!(ctx.channel.attempts(), 1);
}

#[tokio::test]
async fn test_concurrent_adjustments_are_both_reflected() {
    let ctx = create_context(ModerationConfig::default()).await;
    let service = Arc::new(ctx.service);

    let a = {
        let service = service.clone();
        tokio::spawn(async move {
            service
                .apply_manual_adjustment(COMMUNITY, USER, Actor::user(7, "mod-a"), 50, "a")
                .await
        })
    };
    let b = {
        let service = service.clone();
        tokio::spawn(async move {
            service
                .apply_manual_adjustment(COMMUNITY, USER, Actor::user(8, "mod-b"), 70, "b")
                .await
        })
    };
    a.await.unwrap().unwrap();
    b.await.unwrap().unwrap();

    let record = service.get_record(COMMUNITY, USER).await.unwrap();
    assert_eq!(record.points, 120, "no lost update");
    assert_eq!(record.log.len(), 2);
}

#[tokio::test]
async fn test_terminal_enforcement_happens_once_under_races() {
    let ctx = create_context(ModerationConfig::default()).await;
    let service = Arc::new(ctx.service);

    let a = {
        let service = service.clone();
        tokio::spawn(async move {
            service
                .apply_manual_adjustment(COMMUNITY, USER, Actor::user(7, "mod-a"), 600, "a")
                .await
        })
    };
    let b = {
        let service = service.clone();
        tokio::spawn(async move {
            service
                .apply_manual_adjustment(COMMUNITY, USER, Actor::user(8, "mod-b"), 600, "b")
                .await
        })
    };
    a.await.unwrap().unwrap();
    b.await.unwrap().unwrap();

    let record = service.get_record(COMMUNITY, USER).await.unwrap();
    assert_eq!(record.points, 1200);
    assert_eq!(record.status, Tier::Excluded);
    assert_eq!(ctx.directory.exclude_calls(), 1, "excluded exactly once");
}

#[tokio::test]
async fn test_log_is_append_only_across_operations() {
    let ctx = create_context(ModerationConfig::default()).await;

    for (points, note) in [(50, "one"), (30, "two"), (20, "three")] {
        ctx.service
            .apply_manual_adjustment(COMMUNITY, USER, moderator(), points, note)
            .await
            .unwrap();
    }

    let log = ctx.service.list_log(COMMUNITY, USER).await.unwrap();
    assert_eq!(log.len(), 3);
    let notes: Vec<&str> = log.iter().map(|e| e.note.as_str()).collect();
    assert_eq!(notes, vec!["one", "two", "three"]);
    for pair in log.windows(2) {
        assert!(pair[0].timestamp <= pair[1].timestamp);
    }
}

#[tokio::test]
async fn test_no_resend_after_decay_and_reascent() {
    let ctx = create_context(ModerationConfig::default()).await;
    ctx.service
        .apply_manual_adjustment(COMMUNITY, USER, moderator(), 310, "spam")
        .await
        .unwrap();
    assert_eq!(ctx.channel.attempts(), 1);

    // Decay below the flagged threshold...
    for _ in 0..3 {
        ctx.service.force_decay_tick().await.unwrap();
    }
    let record = ctx.service.get_record(COMMUNITY, USER).await.unwrap();
    assert_eq!(record.points, 280);
    assert_eq!(record.status, Tier::Active);

    // ...then re-ascend into it. The marker was never cleared, so the
    // warning does not repeat.
    let record = ctx
        .service
        .apply_manual_adjustment(COMMUNITY, USER, moderator(), 30, "again")
        .await
        .unwrap();
    assert_eq!(record.status, Tier::Flagged);
    assert_eq!(ctx.channel.attempts(), 1);
}

#[tokio::test]
async fn test_marker_advances_even_when_delivery_fails() {
    let ctx = create_context(ModerationConfig::default()).await;
    ctx.channel.fail_unreachable.store(true, Ordering::SeqCst);

    let record = ctx
        .service
        .apply_manual_adjustment(COMMUNITY, USER, moderator(), 310, "spam")
        .await
        .unwrap();
    assert_eq!(record.last_notified_tier, Some(Tier::Flagged));
    assert_eq!(ctx.channel.attempts(), 1);

    // At-most-once: the failed tier is not retried.
    ctx.service
        .apply_manual_adjustment(COMMUNITY, USER, moderator(), 10, "again")
        .await
        .unwrap();
    assert_eq!(ctx.channel.attempts(), 1);
}

#[tokio::test]
async fn test_excluded_latch_holds_through_decay() {
    let ctx = create_context(ModerationConfig::default()).await;
    ctx.service
        .apply_manual_adjustment(COMMUNITY, USER, moderator(), 1000, "severe")
        .await
        .unwrap();
    assert_eq!(ctx.directory.exclude_calls(), 1);

    for _ in 0..5 {
        ctx.service.force_decay_tick().await.unwrap();
    }

    let record = ctx.service.get_record(COMMUNITY, USER).await.unwrap();
    assert_eq!(record.points, 950);
    assert_eq!(record.status, Tier::Excluded, "no silent auto-readmission");
    assert_eq!(ctx.directory.exclude_calls(), 1);
}

#[tokio::test]
async fn test_readmission_releases_latch() {
    let ctx = create_context(ModerationConfig::default()).await;
    ctx.service
        .apply_manual_adjustment(COMMUNITY, USER, moderator(), 1000, "severe")
        .await
        .unwrap();

    // An administrative point reset alone does not release the latch.
    let record = ctx
        .service
        .apply_manual_adjustment(COMMUNITY, USER, moderator(), -900, "appeal accepted")
        .await
        .unwrap();
    assert_eq!(record.points, 100);
    assert_eq!(record.status, Tier::Excluded);

    // Readmission does: status reverts to whatever the points evaluate to.
    let record = ctx
        .service
        .readmit(COMMUNITY, USER, moderator())
        .await
        .unwrap();
    assert_eq!(record.status, Tier::Active);
    assert_eq!(
        record.log.entries().last().unwrap().action,
        LogAction::Reversal
    );
    assert!(!ctx
        .directory
        .is_excluded(COMMUNITY, USER)
        .await
        .unwrap());

    // Decay now behaves normally again.
    ctx.service.force_decay_tick().await.unwrap();
    let record = ctx.service.get_record(COMMUNITY, USER).await.unwrap();
    assert_eq!(record.points, 90);
    assert_eq!(record.status, Tier::Active);
}

#[tokio::test(start_paused = true)]
async fn test_scheduled_tick_matches_forced_tick() {
    // Seed both stores identically with a record one tick away from
    // zero, so extra scheduled firings are no-ops and the comparison is
    // exact regardless of how many intervals elapse.
    let config = ModerationConfig::default().with_tick_interval_secs(1);

    let forced = create_context(config.clone()).await;
    forced
        .service
        .apply_manual_adjustment(COMMUNITY, USER, moderator(), 10, "seed")
        .await
        .unwrap();
    let summary = forced.service.force_decay_tick().await.unwrap();
    assert_eq!(summary.decayed, 1);

    let scheduled = create_context(config).await;
    scheduled
        .service
        .apply_manual_adjustment(COMMUNITY, USER, moderator(), 10, "seed")
        .await
        .unwrap();

    let scheduler = scheduled.service.scheduler();
    let shutdown = CancellationToken::new();
    let handle = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move { scheduler.run(shutdown).await })
    };

    // Wait (in auto-advanced time) until the scheduled tick lands.
    let mut decayed = false;
    for _ in 0..100 {
        tokio::time::sleep(Duration::from_millis(100)).await;
        let record = scheduled.service.get_record(COMMUNITY, USER).await.unwrap();
        if record.points == 0 {
            decayed = true;
            break;
        }
    }
    assert!(decayed, "scheduled tick never fired");
    shutdown.cancel();
    handle.await.unwrap();

    let forced_record = forced.service.get_record(COMMUNITY, USER).await.unwrap();
    let scheduled_record = scheduled.service.get_record(COMMUNITY, USER).await.unwrap();
    assert_eq!(scheduled_record.points, forced_record.points);
    assert_eq!(scheduled_record.status, forced_record.status);
    assert_eq!(scheduled_record.log.len(), forced_record.log.len());
    for (a, b) in scheduled_record
        .log
        .entries()
        .iter()
        .zip(forced_record.log.entries())
    {
        assert_eq!(a.action, b.action);
        assert_eq!(a.point_delta, b.point_delta);
    }
}

#[tokio::test]
async fn test_cancellation_stops_scheduler() {
    let ctx = create_context(ModerationConfig::default()).await;
    let scheduler = ctx.service.scheduler();
    let shutdown = CancellationToken::new();
    let handle = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move { scheduler.run(shutdown).await })
    };

    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("scheduler did not stop on cancellation")
        .unwrap();
}
