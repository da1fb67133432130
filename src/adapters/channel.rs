//! Outbound notification channel boundary.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

use crate::error::ChannelDispatchError;

/// Acknowledgement of a delivered message
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageReceipt {
    /// Channel-assigned id, when the channel supports later edits
    pub message_id: Option<String>,
}

impl MessageReceipt {
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            message_id: Some(id.into()),
        }
    }
}

/// A sink for human-readable notifications.
///
/// Failures come back as `ChannelDispatchError` and are never retried here.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    fn name(&self) -> &str;

    async fn send(&self, text: &str) -> Result<MessageReceipt, ChannelDispatchError>;

    async fn edit(&self, message_id: &str, text: &str) -> Result<(), ChannelDispatchError>;
}

/// Writes every message to the tracing log
#[derive(Debug, Default)]
pub struct LogChannel {
    sent: AtomicU64,
}

impl LogChannel {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl NotificationChannel for LogChannel {
    fn name(&self) -> &str {
        "log"
    }

    async fn send(&self, text: &str) -> Result<MessageReceipt, ChannelDispatchError> {
        let n = self.sent.fetch_add(1, Ordering::Relaxed) + 1;
        info!(channel = "log", message_id = n, "{}", text);
        Ok(MessageReceipt::with_id(format!("log-{}", n)))
    }

    async fn edit(&self, message_id: &str, text: &str) -> Result<(), ChannelDispatchError> {
        info!(channel = "log", message_id, "(edited) {}", text);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn log_channel_numbers_messages() {
        let channel = LogChannel::new();
        let first = channel.send("one").await.unwrap();
        let second = channel.send("two").await.unwrap();
        assert_eq!(first.message_id.as_deref(), Some("log-1"));
        assert_eq!(second.message_id.as_deref(), Some("log-2"));
        assert!(channel.edit("log-1", "uno").await.is_ok());
    }
}
