//! Telegram Bot API channel (`sendMessage` / `editMessageText`).

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info};

use super::channel::{MessageReceipt, NotificationChannel};
use crate::error::ChannelDispatchError;

const CHANNEL: &str = "telegram";
const DEFAULT_API_BASE: &str = "https://api.telegram.org";

#[derive(Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
    disable_web_page_preview: bool,
}

#[derive(Serialize)]
struct EditMessageRequest<'a> {
    chat_id: &'a str,
    message_id: i64,
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    result: Option<serde_json::Value>,
}

#[derive(Clone)]
pub struct TelegramChannel {
    client: Client,
    api_base: String,
    bot_token: String,
    chat_id: String,
}

impl TelegramChannel {
    pub fn new(bot_token: impl Into<String>, chat_id: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| Client::new());
        info!("Telegram notifications enabled");
        Self {
            client,
            api_base: DEFAULT_API_BASE.to_string(),
            bot_token: bot_token.into(),
            chat_id: chat_id.into(),
        }
    }

    /// Point at a different Bot API host (local bot server, test double)
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.bot_token, method)
    }

    async fn call<T: Serialize + ?Sized>(
        &self,
        method: &str,
        body: &T,
    ) -> Result<ApiResponse, ChannelDispatchError> {
        let resp = self
            .client
            .post(self.endpoint(method))
            .json(body)
            .send()
            .await
            .map_err(|e| {
                error!("Telegram request failed: {}", e);
                transport(e)
            })?;

        let status = resp.status();
        let text = resp.text().await.map_err(transport)?;
        let parsed = parse_response(&text).map_err(|reason| {
            error!(%status, "Unreadable Telegram response: {}", reason);
            ChannelDispatchError::Transport {
                channel: CHANNEL.to_string(),
                reason: format!("HTTP {}: {}", status, reason),
            }
        })?;

        if !parsed.ok {
            let reason = parsed
                .description
                .clone()
                .unwrap_or_else(|| format!("HTTP {}", status));
            error!(method, "Telegram rejected message: {}", reason);
            return Err(ChannelDispatchError::Rejected {
                channel: CHANNEL.to_string(),
                reason,
            });
        }
        Ok(parsed)
    }
}

fn transport(e: reqwest::Error) -> ChannelDispatchError {
    ChannelDispatchError::Transport {
        channel: CHANNEL.to_string(),
        reason: e.to_string(),
    }
}

fn parse_response(body: &str) -> Result<ApiResponse, String> {
    serde_json::from_str(body).map_err(|e| e.to_string())
}

/// `result.message_id` of a successful `sendMessage`
fn message_id_of(response: &ApiResponse) -> Option<String> {
    response
        .result
        .as_ref()
        .and_then(|r| r.get("message_id"))
        .and_then(|id| id.as_i64())
        .map(|id| id.to_string())
}

#[async_trait]
impl NotificationChannel for TelegramChannel {
    fn name(&self) -> &str {
        CHANNEL
    }

    async fn send(&self, text: &str) -> Result<MessageReceipt, ChannelDispatchError> {
        let request = SendMessageRequest {
            chat_id: &self.chat_id,
            text,
            disable_web_page_preview: true,
        };
        let response = self.call("sendMessage", &request).await?;
        let message_id = message_id_of(&response);
        debug!(?message_id, "Telegram message sent");
        Ok(MessageReceipt { message_id })
    }

    async fn edit(&self, message_id: &str, text: &str) -> Result<(), ChannelDispatchError> {
        let id: i64 = message_id
            .parse()
            .map_err(|_| ChannelDispatchError::Rejected {
                channel: CHANNEL.to_string(),
                reason: format!("invalid message id {}", message_id),
            })?;
        let request = EditMessageRequest {
            chat_id: &self.chat_id,
            message_id: id,
            text,
        };
        self.call("editMessageText", &request).await?;
        debug!(message_id, "Telegram message edited");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_embeds_token_and_method() {
        let channel = TelegramChannel::new("123:abc", "-100").with_api_base("http://localhost:8081/");
        assert_eq!(
            channel.endpoint("sendMessage"),
            "http://localhost:8081/bot123:abc/sendMessage"
        );
    }

    #[test]
    fn message_id_is_read_from_result() {
        let ok = parse_response(r#"{"ok":true,"result":{"message_id":4711,"text":"hi"}}"#).unwrap();
        assert!(ok.ok);
        assert_eq!(message_id_of(&ok).as_deref(), Some("4711"));

        let rejected =
            parse_response(r#"{"ok":false,"error_code":400,"description":"chat not found"}"#)
                .unwrap();
        assert!(!rejected.ok);
        assert_eq!(rejected.description.as_deref(), Some("chat not found"));
        assert!(message_id_of(&rejected).is_none());
    }

    #[tokio::test]
    async fn edit_rejects_non_numeric_id() {
        let channel = TelegramChannel::new("t", "c");
        let err = channel.edit("log-1", "x").await.unwrap_err();
        assert!(matches!(err, ChannelDispatchError::Rejected { .. }));
    }
}
