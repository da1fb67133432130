use async_trait::async_trait;
use betsignal::adapters::{
    LogChannel, MessageReceipt, NotificationChannel, StaticSnapshotProvider,
};
use betsignal::config::{PipelineConfig, StrategyConfig, ValueFilterConfig};
use betsignal::domain::{MatchSnapshot, PredictorId};
use betsignal::error::{ChannelDispatchError, PredictorError};
use betsignal::ml::{DenseNetwork, TrainingMetrics};
use betsignal::persistence::{InMemoryStore, LocalModelRegistry, MatchStore};
use betsignal::predictors::{FeatureVector, Prediction, Predictor, PredictorRegistry};
use betsignal::services::{AnalysisJob, IngestionJob, RuntimeMetrics, MAX_SEND_ATTEMPTS};
use betsignal::strategy::{DecisionCombiner, MultiLegGenerator, SignalPipeline, ValueFilter};
use betsignal::supervisor::WorkerJob;
use chrono::{Duration, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Always picks a home win at 65%
struct FixedWinner;

impl Predictor for FixedWinner {
    fn id(&self) -> PredictorId {
        PredictorId::Winner
    }

    fn feature_names(&self) -> &'static [&'static str] {
        &["bias"]
    }

    fn prepare(&self, _snapshot: &MatchSnapshot) -> Result<FeatureVector, PredictorError> {
        FeatureVector::new(PredictorId::Winner, vec![1.0])
    }

    fn predict(&self, _features: &FeatureVector) -> Result<Prediction, PredictorError> {
        Ok(Prediction {
            label: "1".to_string(),
            probability: 0.65,
            confidence: 0.65,
            class_probabilities: vec![
                ("1".to_string(), 0.65),
                ("X".to_string(), 0.2),
                ("2".to_string(), 0.15),
            ],
        })
    }

    fn train(
        &mut self,
        _features: &[FeatureVector],
        _labels: &[String],
    ) -> Result<TrainingMetrics, PredictorError> {
        Err(PredictorError::EmptyDataset("winner".to_string()))
    }

    fn is_trained(&self) -> bool {
        true
    }

    fn parameters(&self) -> Option<&DenseNetwork> {
        None
    }

    fn load(&mut self, _parameters: DenseNetwork) -> Result<(), PredictorError> {
        Ok(())
    }
}

/// Fails the first `failures` sends
struct FlakyChannel {
    failures: usize,
    calls: AtomicUsize,
}

#[async_trait]
impl NotificationChannel for FlakyChannel {
    fn name(&self) -> &str {
        "flaky"
    }

    async fn send(&self, _text: &str) -> Result<MessageReceipt, ChannelDispatchError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            Err(ChannelDispatchError::Transport {
                channel: "flaky".to_string(),
                reason: "connection reset".to_string(),
            })
        } else {
            Ok(MessageReceipt::with_id(format!("m{call}")))
        }
    }

    async fn edit(&self, _message_id: &str, _text: &str) -> Result<(), ChannelDispatchError> {
        Ok(())
    }
}

fn priors() -> PipelineConfig {
    PipelineConfig {
        prior_accuracy: 0.6,
        prior_sample_size: 80,
        ..PipelineConfig::default()
    }
}

fn pipeline(store: Arc<InMemoryStore>) -> Arc<SignalPipeline> {
    let registry = Arc::new(PredictorRegistry::with_predictors(
        vec![Box::new(FixedWinner)],
        store.clone(),
        Arc::new(LocalModelRegistry::in_memory()),
    ));
    let combiner = DecisionCombiner::new(
        registry,
        store.clone(),
        MultiLegGenerator::new(StrategyConfig {
            seed: Some(7),
            ..StrategyConfig::default()
        }),
        ValueFilter::new(ValueFilterConfig::default()),
        priors(),
    );
    Arc::new(SignalPipeline::new(store, combiner))
}

fn upcoming(id: &str) -> MatchSnapshot {
    let mut snapshot = MatchSnapshot::new(id, "Porto", "Braga", Utc::now() + Duration::hours(1));
    snapshot.odds.home = 2.1;
    snapshot
}

#[tokio::test]
async fn accepted_pick_is_persisted_and_dispatched_once() {
    let store = Arc::new(InMemoryStore::new());
    let metrics = Arc::new(RuntimeMetrics::new());

    let ingestion = IngestionJob::new(
        Arc::new(StaticSnapshotProvider::new(vec![upcoming("m1")])),
        store.clone(),
        metrics.clone(),
    );
    let out = ingestion.do_work().await.unwrap();
    assert_eq!(out["upserted"], 1);

    let analysis = AnalysisJob::new(pipeline(store.clone()), store.clone(), priors(), metrics.clone())
        .with_channel(Arc::new(LogChannel::new()));
    let out = analysis.do_work().await.unwrap();
    assert_eq!(out["candidates"], 1);
    assert_eq!(out["emitted"], 1);
    assert_eq!(out["dispatched"], 1);

    let signals = store.signals_for_match("m1").await.unwrap();
    assert_eq!(signals.len(), 1);
    let signal = &signals[0];
    assert_eq!(signal.prediction, "1");
    assert_eq!(signal.predictor_id, Some(PredictorId::Winner));
    assert!((signal.expected_value - 0.365).abs() < 1e-9);
    assert_eq!(signal.stake_fraction, 0.25);
    assert!(signal.sent);
    assert!(signal.message_id.as_deref().unwrap().starts_with("log-"));

    // same pick on the next cycle is not signalled again
    let out = analysis.do_work().await.unwrap();
    assert_eq!(out["emitted"], 0);
    assert_eq!(out["dispatched"], 0);
    assert_eq!(metrics.snapshot().signals_emitted, 1);
}

#[tokio::test]
async fn failed_send_stays_unsent_until_the_channel_recovers() {
    let store = Arc::new(InMemoryStore::new());
    store.upsert_snapshots(vec![upcoming("m2")]).await.unwrap();
    let metrics = Arc::new(RuntimeMetrics::new());

    let analysis = AnalysisJob::new(pipeline(store.clone()), store.clone(), priors(), metrics.clone())
        .with_channel(Arc::new(FlakyChannel {
            failures: 1,
            calls: AtomicUsize::new(0),
        }));

    let out = analysis.do_work().await.unwrap();
    assert_eq!(out["emitted"], 1);
    assert_eq!(out["dispatched"], 0);
    assert_eq!(store.unsent_signals().await.unwrap().len(), 1);

    assert_eq!(analysis.dispatch_unsent().await.unwrap(), 1);
    assert!(store.unsent_signals().await.unwrap().is_empty());
    let signal = &store.signals_for_match("m2").await.unwrap()[0];
    assert_eq!(signal.message_id.as_deref(), Some("m1"));

    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.channel_sends, 2);
    assert_eq!(snapshot.channel_failures, 1);
}

#[tokio::test]
async fn dispatch_gives_up_after_the_attempt_cap() {
    let store = Arc::new(InMemoryStore::new());
    store.upsert_snapshots(vec![upcoming("m4")]).await.unwrap();
    let metrics = Arc::new(RuntimeMetrics::new());
    let channel = Arc::new(FlakyChannel {
        failures: usize::MAX,
        calls: AtomicUsize::new(0),
    });

    let analysis = AnalysisJob::new(pipeline(store.clone()), store.clone(), priors(), metrics.clone())
        .with_channel(channel.clone());

    assert_eq!(analysis.do_work().await.unwrap()["emitted"], 1);
    for _ in 0..5 {
        assert_eq!(analysis.dispatch_unsent().await.unwrap(), 0);
    }

    assert_eq!(channel.calls.load(Ordering::SeqCst), MAX_SEND_ATTEMPTS as usize);
    assert_eq!(store.unsent_signals().await.unwrap().len(), 1);
    assert_eq!(metrics.snapshot().channel_failures, MAX_SEND_ATTEMPTS as u64);
}

#[tokio::test]
async fn thin_odds_yield_no_signal() {
    let store = Arc::new(InMemoryStore::new());
    let mut snapshot = upcoming("m3");
    snapshot.odds.home = 1.4;

    let evaluation = pipeline(store.clone()).evaluate(&snapshot).await.unwrap();
    assert!(evaluation.signal.is_none());
    let single = evaluation.decision.single.unwrap();
    assert!(!single.assessment.is_value_bet);
    assert!(evaluation
        .decision
        .skipped
        .iter()
        .any(|s| s.predictor_id == PredictorId::OverUnder));
    assert_eq!(store.signal_count().await, 0);
}
