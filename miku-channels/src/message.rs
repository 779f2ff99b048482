//! Message types for channel communication.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Inbound text message from a channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelMessage {
    /// Message ID (channel-specific)
    pub id: String,
    /// Chat to reply into
    pub channel_id: String,
    /// Sender identifier, stable per end user
    pub user_id: String,
    /// Sender's handle, when the platform exposes one
    #[serde(default)]
    pub username: Option<String>,
    /// Message text
    pub text: String,
    /// Additional metadata
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    /// Timestamp (Unix millis)
    pub timestamp: i64,
    /// Trace ID assigned on receipt
    pub trace_id: String,
}

impl ChannelMessage {
    /// Whether the text is a bot command (`/start`, `/help@bot`, ...).
    pub fn is_command(&self) -> bool {
        is_command(&self.text)
    }
}

/// Whether `text` is a bot command.
pub fn is_command(text: &str) -> bool {
    text.starts_with('/')
}

/// Outgoing text message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingMessage {
    /// Target chat
    pub channel_id: String,
    /// Message text
    pub text: String,
}

impl OutgoingMessage {
    /// Reply to `message` in the chat it came from.
    pub fn reply(message: &ChannelMessage, text: impl Into<String>) -> Self {
        Self {
            channel_id: message.channel_id.clone(),
            text: text.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(text: &str) -> ChannelMessage {
        ChannelMessage {
            id: "10".into(),
            channel_id: "456".into(),
            user_id: "123".into(),
            username: Some("fan".into()),
            text: text.into(),
            metadata: HashMap::new(),
            timestamp: 1_700_000_000_000,
            trace_id: "trace".into(),
        }
    }

    #[test]
    fn commands_are_detected() {
        assert!(message("/start").is_command());
        assert!(message("/help@miku_bot").is_command());
        assert!(!message("мику, привет").is_command());
        assert!(!message(" /not-a-command").is_command());
    }

    #[test]
    fn reply_targets_origin_chat() {
        let msg = message("hi");
        let reply = OutgoingMessage::reply(&msg, "hello");
        assert_eq!(reply.channel_id, "456");
        assert_eq!(reply.text, "hello");
    }
}
