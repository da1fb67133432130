//! Generic JSON webhook notifications
//!
//! Posts `{"msg_type": "text", "content": {"text": ...}}`, the payload shape
//! understood by Feishu/Lark and Slack-compatible incoming webhooks.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, error, info};

use super::channel::{MessageReceipt, NotificationChannel};
use crate::error::ChannelDispatchError;

const CHANNEL: &str = "webhook";

#[derive(Serialize)]
struct WebhookMessage<'a> {
    msg_type: &'static str,
    content: WebhookContent<'a>,
}

#[derive(Serialize)]
struct WebhookContent<'a> {
    text: &'a str,
}

#[derive(Clone)]
pub struct WebhookChannel {
    client: Client,
    url: String,
}

impl WebhookChannel {
    pub fn new(url: impl Into<String>) -> Self {
        info!("Webhook notifications enabled");
        Self {
            client: Client::new(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl NotificationChannel for WebhookChannel {
    fn name(&self) -> &str {
        CHANNEL
    }

    async fn send(&self, text: &str) -> Result<MessageReceipt, ChannelDispatchError> {
        let message = WebhookMessage {
            msg_type: "text",
            content: WebhookContent { text },
        };

        match self.client.post(&self.url).json(&message).send().await {
            Ok(resp) => {
                if resp.status().is_success() {
                    debug!("Webhook notification sent");
                    Ok(MessageReceipt::default())
                } else {
                    let status = resp.status();
                    let body = resp.text().await.unwrap_or_default();
                    error!("Webhook notification failed: {} - {}", status, body);
                    Err(ChannelDispatchError::Rejected {
                        channel: CHANNEL.to_string(),
                        reason: format!("HTTP {}: {}", status, body),
                    })
                }
            }
            Err(e) => {
                error!("Webhook request failed: {}", e);
                Err(ChannelDispatchError::Transport {
                    channel: CHANNEL.to_string(),
                    reason: e.to_string(),
                })
            }
        }
    }

    /// Webhooks are fire-and-forget; there is nothing to edit
    async fn edit(&self, message_id: &str, _text: &str) -> Result<(), ChannelDispatchError> {
        Err(ChannelDispatchError::Rejected {
            channel: CHANNEL.to_string(),
            reason: format!("edit not supported (message {})", message_id),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_shape() {
        let message = WebhookMessage {
            msg_type: "text",
            content: WebhookContent { text: "hello" },
        };
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["msg_type"], "text");
        assert_eq!(json["content"]["text"], "hello");
    }

    #[tokio::test]
    async fn edit_is_unsupported() {
        let channel = WebhookChannel::new("http://127.0.0.1:9/hook");
        assert!(channel.edit("1", "x").await.is_err());
    }
}
