//! Pulls snapshot batches from the provider into the store.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use super::metrics::RuntimeMetrics;
use crate::adapters::SnapshotProvider;
use crate::error::Result;
use crate::persistence::MatchStore;
use crate::supervisor::WorkerJob;

pub struct IngestionJob {
    provider: Arc<dyn SnapshotProvider>,
    store: Arc<dyn MatchStore>,
    metrics: Arc<RuntimeMetrics>,
}

impl IngestionJob {
    pub const NAME: &'static str = "ingestion";

    pub fn new(
        provider: Arc<dyn SnapshotProvider>,
        store: Arc<dyn MatchStore>,
        metrics: Arc<RuntimeMetrics>,
    ) -> Self {
        Self {
            provider,
            store,
            metrics,
        }
    }
}

#[async_trait]
impl WorkerJob for IngestionJob {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn do_work(&self) -> Result<serde_json::Value> {
        let batch = self.provider.fetch().await?;
        let fetched = batch.len();
        let upserted = self.store.upsert_snapshots(batch).await?;
        let live = self.store.live_match_count().await?;
        self.metrics.set_active_matches(live as u64);

        info!(provider = self.provider.name(), fetched, upserted, live, "Snapshots ingested");
        Ok(serde_json::json!({
            "fetched": fetched,
            "upserted": upserted,
            "live": live,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::StaticSnapshotProvider;
    use crate::domain::{MatchSnapshot, MatchStatus};
    use crate::persistence::InMemoryStore;
    use chrono::Utc;

    #[tokio::test]
    async fn test_ingestion_upserts_and_counts_live() {
        let mut live = MatchSnapshot::new("m1", "Lazio", "Roma", Utc::now());
        live.status = MatchStatus::Live;
        let upcoming = MatchSnapshot::new("m2", "Milan", "Inter", Utc::now());

        let store = Arc::new(InMemoryStore::new());
        let metrics = Arc::new(RuntimeMetrics::new());
        let job = IngestionJob::new(
            Arc::new(StaticSnapshotProvider::new(vec![live, upcoming])),
            store.clone(),
            metrics.clone(),
        );

        let out = job.do_work().await.unwrap();
        assert_eq!(out["upserted"], 2);
        assert_eq!(out["live"], 1);
        assert_eq!(metrics.snapshot().active_matches, 1);
        assert!(store.get_snapshot("m2").await.unwrap().is_some());
    }
}
