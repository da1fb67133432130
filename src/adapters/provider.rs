//! Odds/stats feeds that supply `MatchSnapshot` batches to the ingestion job.

use async_trait::async_trait;
use reqwest::Client;
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

use crate::domain::MatchSnapshot;
use crate::error::{BetSignalError, Result};

#[async_trait]
pub trait SnapshotProvider: Send + Sync {
    fn name(&self) -> &str;

    /// One batch of current snapshots. Transient failures surface as `Err`.
    async fn fetch(&self) -> Result<Vec<MatchSnapshot>>;
}

/// HTTP feed returning a JSON array of snapshots
pub struct HttpSnapshotProvider {
    client: Client,
    url: String,
    api_key: Option<String>,
}

impl HttpSnapshotProvider {
    pub fn new(url: impl Into<String>, api_key: Option<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            url: url.into(),
            api_key,
        }
    }
}

#[async_trait]
impl SnapshotProvider for HttpSnapshotProvider {
    fn name(&self) -> &str {
        "http"
    }

    async fn fetch(&self) -> Result<Vec<MatchSnapshot>> {
        let mut request = self.client.get(&self.url);
        if let Some(key) = &self.api_key {
            request = request.header("x-api-key", key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| BetSignalError::Provider(format!("Network error: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(BetSignalError::Provider(format!(
                "Feed error {}: {}",
                status, body
            )));
        }

        let snapshots: Vec<MatchSnapshot> = response
            .json()
            .await
            .map_err(|e| BetSignalError::Provider(format!("Parse error: {}", e)))?;
        debug!(count = snapshots.len(), "Fetched snapshots");
        Ok(snapshots)
    }
}

/// Reads a JSON array of snapshots from disk on every fetch
pub struct FileSnapshotProvider {
    path: PathBuf,
}

impl FileSnapshotProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl SnapshotProvider for FileSnapshotProvider {
    fn name(&self) -> &str {
        "file"
    }

    async fn fetch(&self) -> Result<Vec<MatchSnapshot>> {
        let raw = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            BetSignalError::Provider(format!("{}: {}", self.path.display(), e))
        })?;
        Ok(serde_json::from_str(&raw)?)
    }
}

/// Fixed batch; used when no feed is configured and in tests
#[derive(Default)]
pub struct StaticSnapshotProvider {
    snapshots: Vec<MatchSnapshot>,
}

impl StaticSnapshotProvider {
    pub fn new(snapshots: Vec<MatchSnapshot>) -> Self {
        Self { snapshots }
    }
}

#[async_trait]
impl SnapshotProvider for StaticSnapshotProvider {
    fn name(&self) -> &str {
        "static"
    }

    async fn fetch(&self) -> Result<Vec<MatchSnapshot>> {
        Ok(self.snapshots.clone())
    }
}
