use async_trait::async_trait;
use betsignal::adapters::{MessageReceipt, NotificationChannel, SnapshotProvider};
use betsignal::config::AppConfig;
use betsignal::context::{AppContext, Boundaries};
use betsignal::domain::MatchSnapshot;
use betsignal::error::{BetSignalError, ChannelDispatchError, Result};
use betsignal::persistence::{InMemoryStore, LocalModelRegistry};
use betsignal::services::MetricsSnapshot;
use betsignal::supervisor::{AlertEngine, AlertRule, AlertSeverity, AlertType, WorkerPhase};
use chrono::{Duration as ChronoDuration, Utc};
use mockall::mock;
use std::sync::Arc;
use std::time::Duration;

mock! {
    pub Channel {}

    #[async_trait]
    impl NotificationChannel for Channel {
        fn name(&self) -> &str;
        async fn send(&self, text: &str) -> std::result::Result<MessageReceipt, ChannelDispatchError>;
        async fn edit(&self, message_id: &str, text: &str) -> std::result::Result<(), ChannelDispatchError>;
    }
}

struct DownProvider;

#[async_trait]
impl SnapshotProvider for DownProvider {
    fn name(&self) -> &str {
        "down"
    }

    async fn fetch(&self) -> Result<Vec<MatchSnapshot>> {
        Err(BetSignalError::Provider("feed returned 502".to_string()))
    }
}

fn channel(sends: usize) -> Arc<dyn NotificationChannel> {
    let mut mock = MockChannel::new();
    mock.expect_name().return_const("mock".to_string());
    mock.expect_send()
        .times(sends)
        .returning(|_| Ok(MessageReceipt::default()));
    Arc::new(mock)
}

async fn context(alert_sends: usize) -> Arc<AppContext> {
    let boundaries = Boundaries {
        store: Arc::new(InMemoryStore::new()),
        models: Arc::new(LocalModelRegistry::in_memory()),
        provider: Arc::new(DownProvider),
        signal_channel: channel(0),
        alert_channels: vec![channel(alert_sends)],
    };
    let mut config = AppConfig::default();
    config.workers.restart_delay_ms = 0;
    AppContext::assemble(config, boundaries).await.unwrap()
}

#[tokio::test]
async fn rule_cooldown_suppresses_repeats() {
    let engine = AlertEngine::new(100).with_channel(channel(3));
    engine
        .add_rule(
            AlertRule::new(
                "match_backlog",
                AlertType::Performance,
                AlertSeverity::Medium,
                300,
                |m: &MetricsSnapshot| m.active_matches > 10,
            )
            .with_text("Match backlog", "Too many live matches"),
        )
        .await;

    let busy = MetricsSnapshot {
        active_matches: 25,
        ..MetricsSnapshot::default()
    };
    let t0 = Utc::now();

    let first = engine.evaluate_rules_at(&busy, t0).await;
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].metadata.as_ref().unwrap()["rule"], "match_backlog");
    assert!(engine
        .evaluate_rules_at(&busy, t0 + ChronoDuration::seconds(100))
        .await
        .is_empty());
    assert_eq!(
        engine
            .evaluate_rules_at(&busy, t0 + ChronoDuration::seconds(301))
            .await
            .len(),
        1
    );

    assert!(engine.resolve("nope_0", "n/a").await.is_none());
    let resolved = engine.resolve(&first[0].id, "drained").await.unwrap();
    assert!(resolved.resolved);
    assert_eq!(resolved.resolution_notes.as_deref(), Some("drained"));
    assert_eq!(engine.active().len(), 1);
    assert_eq!(engine.history(10).await.len(), 2);
}

#[tokio::test]
async fn failing_cycle_raises_a_system_alert() {
    let ctx = context(1).await;

    let err = ctx.workers.run_once("ingestion").await.unwrap_err();
    assert!(matches!(err, BetSignalError::WorkerCycle { .. }));

    let active = ctx.alerts.active();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].alert_type, AlertType::System);
    assert_eq!(active[0].severity, AlertSeverity::High);
    assert!(active[0].message.contains("502"));

    let state = ctx.workers.get("ingestion").await.unwrap().state().await;
    assert_eq!(state.consecutive_failures, 1);
    assert_eq!(ctx.metrics.snapshot().worker_failures, 1);
}

#[tokio::test]
async fn interval_updates_are_validated() {
    let ctx = context(0).await;

    assert!(ctx.workers.set_interval("analysis", 0).await.is_err());
    assert!(ctx.workers.set_interval("analysis", u64::MAX / 2).await.is_err());
    ctx.workers.set_interval("analysis", 30).await.unwrap();
    let state = ctx.workers.get("analysis").await.unwrap().state().await;
    assert_eq!(state.interval_seconds, 30);

    assert!(matches!(
        ctx.workers.set_interval("settlement", 30).await.unwrap_err(),
        BetSignalError::WorkerNotFound(_)
    ));
}

#[tokio::test(start_paused = true)]
async fn start_restart_and_shutdown() {
    let ctx = context(0).await;

    assert!(ctx.workers.start("alert_monitor").await.unwrap());
    assert!(!ctx.workers.start("alert_monitor").await.unwrap());
    tokio::time::sleep(Duration::from_secs(1)).await;

    let report = ctx.workers.report().await;
    assert!(!report.healthy);
    assert!(!report.unhealthy.contains(&"alert_monitor".to_string()));

    ctx.workers.restart("alert_monitor").await.unwrap();
    let state = ctx.workers.get("alert_monitor").await.unwrap().state().await;
    assert_eq!(state.phase, WorkerPhase::Running);

    ctx.shutdown().await;
    for state in ctx.workers.states().await {
        assert_eq!(state.phase, WorkerPhase::Idle);
    }
}
