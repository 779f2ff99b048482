//! Telegram channel adapter.
//!
//! Provides the `TelegramChannel` implementation for receiving and sending messages
//! through the Telegram Bot API.

use crate::message::{ChannelMessage, OutgoingMessage};
use crate::traits::{Channel, ChannelError, ChannelResult};
use async_trait::async_trait;
use miku_common::config::TelegramConfig;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;

const DEFAULT_API_BASE: &str = "https://api.telegram.org";

/// Maximum message length accepted by `sendMessage`, in UTF-16 code units.
pub const MAX_MESSAGE_LEN: usize = 4096;

/// Pause after a failed poll.
const POLL_BACKOFF: Duration = Duration::from_secs(5);

/// Telegram channel - long-polls the Bot API for updates.
pub struct TelegramChannel {
    bot_token: String,
    api_base: String,
    poll_timeout_secs: u64,
    client: reqwest::Client,
}

impl TelegramChannel {
    /// Create a new Telegram channel.
    pub fn new(bot_token: impl Into<String>, poll_timeout_secs: u64) -> Self {
        // The HTTP timeout has to outlive the long poll.
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(poll_timeout_secs + 10))
            .build()
            .unwrap_or_default();

        Self {
            bot_token: bot_token.into(),
            api_base: DEFAULT_API_BASE.to_string(),
            poll_timeout_secs,
            client,
        }
    }

    /// Create a channel from configuration.
    pub fn from_config(config: &TelegramConfig) -> ChannelResult<Self> {
        let token = config
            .bot_token
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| ChannelError::Auth("Telegram bot token not configured".into()))?;

        Ok(Self::new(token, config.poll_timeout_secs))
    }

    /// Point the channel at a different Bot API server.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    fn api_url(&self, method: &str) -> String {
        format!("{}/bot{}/{method}", self.api_base, self.bot_token)
    }

    /// Send a single message chunk as plain text.
    async fn send_single_chunk(&self, text: &str, chat_id: &str) -> ChannelResult<()> {
        let body = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
        });

        let resp = self
            .client
            .post(self.api_url("sendMessage"))
            .json(&body)
            .send()
            .await
            .map_err(|e| ChannelError::SendFailed(e.to_string()))?;

        if resp.status().is_success() {
            return Ok(());
        }

        let error_text = resp.text().await.unwrap_or_default();
        Err(ChannelError::SendFailed(format!(
            "Telegram sendMessage failed: {error_text}"
        )))
    }

    /// Fetch the next batch of updates after `offset`.
    async fn get_updates(&self, offset: i64) -> Result<Vec<serde_json::Value>, String> {
        let body = serde_json::json!({
            "offset": offset,
            "timeout": self.poll_timeout_secs,
            "allowed_updates": ["message"],
        });

        let resp = self
            .client
            .post(self.api_url("getUpdates"))
            .json(&body)
            .send()
            .await
            .map_err(|e| format!("poll error: {e}"))?;

        let data: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| format!("parse error: {e}"))?;

        if !data.get("ok").and_then(serde_json::Value::as_bool).unwrap_or(false) {
            let description = data
                .get("description")
                .and_then(serde_json::Value::as_str)
                .unwrap_or("unknown error");
            return Err(format!("getUpdates rejected: {description}"));
        }

        Ok(data
            .get("result")
            .and_then(serde_json::Value::as_array)
            .cloned()
            .unwrap_or_default())
    }

    /// Call `getMe` and return the bot's username.
    async fn get_me(&self) -> ChannelResult<String> {
        let resp = self
            .client
            .get(self.api_url("getMe"))
            .send()
            .await
            .map_err(|e| ChannelError::Connection(e.to_string()))?;

        if !resp.status().is_success() {
            let err = resp.text().await.unwrap_or_default();
            return Err(ChannelError::Auth(format!("Invalid bot token: {err}")));
        }

        let data: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| ChannelError::Connection(e.to_string()))?;

        Ok(data
            .pointer("/result/username")
            .and_then(serde_json::Value::as_str)
            .unwrap_or("unknown")
            .to_string())
    }
}

/// Turn one `getUpdates` entry into a message.
///
/// Returns `None` for anything other than a text message.
pub fn parse_update(update: &serde_json::Value) -> Option<ChannelMessage> {
    let message = update.get("message")?;
    let text = message.get("text").and_then(serde_json::Value::as_str)?;

    let chat = message.get("chat")?;
    let chat_id = chat.get("id").and_then(serde_json::Value::as_i64)?.to_string();

    let from = message.get("from");
    let username = from
        .and_then(|f| f.get("username"))
        .and_then(serde_json::Value::as_str)
        .map(String::from);
    let user_id = from
        .and_then(|f| f.get("id"))
        .and_then(serde_json::Value::as_i64)
        .map(|id| id.to_string())
        .unwrap_or_else(|| chat_id.clone());

    let id = message
        .get("message_id")
        .and_then(serde_json::Value::as_i64)
        .map(|id| id.to_string())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let timestamp = message
        .get("date")
        .and_then(serde_json::Value::as_i64)
        .map(|secs| secs * 1000)
        .unwrap_or_else(now_millis);

    let mut metadata = HashMap::new();
    if let Some(kind) = chat.get("type").and_then(serde_json::Value::as_str) {
        metadata.insert("chat_type".to_string(), kind.to_string());
    }

    Some(ChannelMessage {
        id,
        channel_id: chat_id,
        user_id,
        username,
        text: text.to_string(),
        metadata,
        timestamp,
        trace_id: miku_common::logging::generate_trace_id(),
    })
}

fn now_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

/// Byte offset of the longest prefix of `text` that fits in `max_units`
/// UTF-16 code units, or `None` if the whole text fits.
fn utf16_limit(text: &str, max_units: usize) -> Option<usize> {
    let mut units = 0;
    for (idx, ch) in text.char_indices() {
        units += ch.len_utf16();
        if units > max_units {
            return Some(idx);
        }
    }
    None
}

/// Split a message into chunks of at most `max_units` UTF-16 code units,
/// the unit Telegram counts message length in.
///
/// Prefers paragraph, line, sentence and word boundaries, in that order.
pub fn split_message(message: &str, max_units: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut remaining = message;

    while !remaining.is_empty() {
        let Some(limit) = utf16_limit(remaining, max_units) else {
            chunks.push(remaining.to_string());
            break;
        };
        // A single character wider than the limit still has to go somewhere.
        let limit = if limit == 0 {
            remaining.chars().next().map_or(remaining.len(), char::len_utf8)
        } else {
            limit
        };

        let window = &remaining[..limit];
        let split_pos = window
            .rfind("\n\n")
            .or_else(|| window.rfind('\n'))
            .or_else(|| window.rfind(". ").map(|p| p + 1))
            .or_else(|| window.rfind(' '))
            .filter(|&p| p > 0)
            .unwrap_or(limit);

        chunks.push(remaining[..split_pos].to_string());
        remaining = remaining[split_pos..].trim_start();
    }

    chunks
}

#[async_trait]
impl Channel for TelegramChannel {
    fn name(&self) -> &'static str {
        "telegram"
    }

    async fn init(&mut self) -> ChannelResult<()> {
        let username = self.get_me().await?;
        tracing::info!(bot = %username, "Telegram channel initialized");
        Ok(())
    }

    async fn send(&self, message: OutgoingMessage) -> ChannelResult<()> {
        for chunk in split_message(&message.text, MAX_MESSAGE_LEN) {
            self.send_single_chunk(&chunk, &message.channel_id).await?;
        }
        Ok(())
    }

    async fn start_typing(&self, channel_id: &str) -> ChannelResult<()> {
        let body = serde_json::json!({
            "chat_id": channel_id,
            "action": "typing",
        });

        let resp = self
            .client
            .post(self.api_url("sendChatAction"))
            .json(&body)
            .send()
            .await
            .map_err(|e| ChannelError::SendFailed(e.to_string()))?;

        if resp.status().is_success() {
            Ok(())
        } else {
            let err = resp.text().await.unwrap_or_default();
            Err(ChannelError::SendFailed(format!(
                "sendChatAction failed: {err}"
            )))
        }
    }

    async fn listen(&self, tx: mpsc::Sender<ChannelMessage>) -> ChannelResult<()> {
        let mut offset: i64 = 0;

        tracing::info!("Telegram channel listening for messages...");

        loop {
            let updates = match self.get_updates(offset).await {
                Ok(updates) => updates,
                Err(e) => {
                    tracing::warn!("Telegram {e}");
                    tokio::time::sleep(POLL_BACKOFF).await;
                    continue;
                }
            };

            for update in &updates {
                if let Some(uid) = update.get("update_id").and_then(serde_json::Value::as_i64) {
                    offset = uid + 1;
                }

                let Some(msg) = parse_update(update) else {
                    continue;
                };

                if msg.is_command() {
                    tracing::debug!(user_id = %msg.user_id, text = %msg.text, "Ignoring command");
                    continue;
                }

                tracing::info!(
                    trace_id = %msg.trace_id,
                    message_id = %msg.id,
                    channel_id = %msg.channel_id,
                    user_id = %msg.user_id,
                    text = %msg.text,
                    "Telegram message received"
                );

                if tx.send(msg).await.is_err() {
                    tracing::info!("Message receiver closed, stopping Telegram listener");
                    return Ok(());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn text_update(update_id: i64, text: &str) -> serde_json::Value {
        json!({
            "update_id": update_id,
            "message": {
                "message_id": 77,
                "date": 1_700_000_000,
                "chat": {"id": 456, "type": "private"},
                "from": {"id": 123, "username": "fan"},
                "text": text
            }
        })
    }

    fn channel(server: &MockServer) -> TelegramChannel {
        TelegramChannel::new("123:ABC", 1).with_api_base(server.uri())
    }

    #[test]
    fn telegram_channel_name() {
        let ch = TelegramChannel::new("fake-token", 30);
        assert_eq!(ch.name(), "telegram");
    }

    #[test]
    fn telegram_api_url() {
        let ch = TelegramChannel::new("123:ABC", 30);
        assert_eq!(
            ch.api_url("getMe"),
            "https://api.telegram.org/bot123:ABC/getMe"
        );
    }

    #[test]
    fn from_config_requires_token() {
        let config = TelegramConfig {
            bot_token: Some("  ".into()),
            ..Default::default()
        };
        assert!(matches!(
            TelegramChannel::from_config(&config),
            Err(ChannelError::Auth(_))
        ));
    }

    #[test]
    fn parse_text_update() {
        let msg = parse_update(&text_update(1, "мику, привет")).unwrap();
        assert_eq!(msg.id, "77");
        assert_eq!(msg.channel_id, "456");
        assert_eq!(msg.user_id, "123");
        assert_eq!(msg.username.as_deref(), Some("fan"));
        assert_eq!(msg.text, "мику, привет");
        assert_eq!(msg.timestamp, 1_700_000_000_000);
        assert_eq!(msg.metadata.get("chat_type").map(String::as_str), Some("private"));
        assert!(!msg.trace_id.is_empty());
    }

    #[test]
    fn parse_skips_non_text() {
        let sticker = json!({
            "update_id": 2,
            "message": {
                "message_id": 5,
                "chat": {"id": 456},
                "from": {"id": 123},
                "sticker": {"file_id": "abc"}
            }
        });
        assert!(parse_update(&sticker).is_none());
        assert!(parse_update(&json!({"update_id": 3, "edited_message": {}})).is_none());
    }

    #[test]
    fn parse_falls_back_to_chat_for_user() {
        let update = json!({
            "update_id": 4,
            "message": {"message_id": 1, "chat": {"id": -100}, "text": "hi"}
        });
        let msg = parse_update(&update).unwrap();
        assert_eq!(msg.user_id, "-100");
        assert!(msg.username.is_none());
    }

    #[test]
    fn split_message_short() {
        let result = split_message("Hello, World!", 4096);
        assert_eq!(result, vec!["Hello, World!".to_string()]);
    }

    #[test]
    fn split_message_long() {
        let msg = "x".repeat(5000);
        let result = split_message(&msg, 4096);
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].len(), 4096);
        assert_eq!(result[1].len(), 904);
    }

    #[test]
    fn split_message_cyrillic_on_char_boundary() {
        let msg = "ж".repeat(5000);
        let result = split_message(&msg, 4096);
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].chars().count(), 4096);
        assert_eq!(result[1].chars().count(), 904);
    }

    #[test]
    fn split_message_counts_utf16_units() {
        let msg = "💙".repeat(4096);
        let result = split_message(&msg, 4096);
        assert_eq!(result.len(), 2);
        for chunk in &result {
            assert_eq!(chunk.encode_utf16().count(), 4096);
        }
        assert_eq!(result.concat(), msg);
    }

    #[test]
    fn split_message_mixed_emoji_fits_limit() {
        let msg = "Мику 💙 поёт 🎤 ".repeat(600);
        for chunk in split_message(&msg, MAX_MESSAGE_LEN) {
            assert!(chunk.encode_utf16().count() <= MAX_MESSAGE_LEN);
        }
    }

    #[test]
    fn split_message_prefers_word_boundary() {
        let result = split_message("привет мику как дела", 10);
        assert_eq!(result, vec!["привет", "мику как", "дела"]);
    }

    #[test]
    fn split_message_keeps_sentence_end() {
        let result = split_message("One two. Three", 10);
        assert_eq!(result, vec!["One two.", "Three"]);
    }

    #[test]
    fn split_message_empty() {
        assert!(split_message("", 4096).is_empty());
    }

    #[tokio::test]
    async fn init_checks_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/bot123:ABC/getMe"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "result": {"id": 1, "is_bot": true, "username": "miku_bot"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let mut ch = channel(&server);
        ch.init().await.unwrap();
    }

    #[tokio::test]
    async fn init_rejects_bad_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/bot123:ABC/getMe"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "ok": false,
                "description": "Unauthorized"
            })))
            .mount(&server)
            .await;

        let mut ch = channel(&server);
        assert!(matches!(ch.init().await, Err(ChannelError::Auth(_))));
    }

    #[tokio::test]
    async fn send_posts_plain_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot123:ABC/sendMessage"))
            .and(body_partial_json(json!({"chat_id": "456", "text": "Привет!"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;

        let ch = channel(&server);
        ch.send(OutgoingMessage {
            channel_id: "456".into(),
            text: "Привет!".into(),
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn send_splits_long_replies() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot123:ABC/sendMessage"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .expect(2)
            .mount(&server)
            .await;

        let ch = channel(&server);
        ch.send(OutgoingMessage {
            channel_id: "456".into(),
            text: "ж".repeat(MAX_MESSAGE_LEN + 1),
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn send_reports_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot123:ABC/sendMessage"))
            .respond_with(ResponseTemplate::new(400).set_body_string("Bad Request: chat not found"))
            .mount(&server)
            .await;

        let ch = channel(&server);
        let err = ch
            .send(OutgoingMessage {
                channel_id: "0".into(),
                text: "hi".into(),
            })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("chat not found"));
    }

    #[tokio::test]
    async fn start_typing_sends_chat_action() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot123:ABC/sendChatAction"))
            .and(body_partial_json(json!({"chat_id": "456", "action": "typing"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true, "result": true})))
            .expect(1)
            .mount(&server)
            .await;

        let ch = channel(&server);
        ch.start_typing("456").await.unwrap();
    }

    #[tokio::test]
    async fn listen_forwards_text_and_skips_commands() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot123:ABC/getUpdates"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "result": [text_update(10, "/start"), text_update(11, "мику")]
            })))
            .mount(&server)
            .await;

        let ch = channel(&server);
        let (tx, mut rx) = mpsc::channel(1);
        let listener = tokio::spawn(async move { ch.listen(tx).await });

        let msg = rx.recv().await.unwrap();
        assert_eq!(msg.text, "мику");
        assert_eq!(msg.user_id, "123");

        drop(rx);
        let result = tokio::time::timeout(Duration::from_secs(5), listener)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
    }
}
