//! Relay bridge between a channel and the orchestrator.
//!
//! Every inbound message produces exactly one outbound reply: a greeting,
//! the completion text, or the apology.

use crate::message::{ChannelMessage, OutgoingMessage};
use crate::traits::Channel;
use anyhow::Result;
use miku_agent::Orchestrator;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Routes channel messages through the orchestrator and back.
pub struct RelayBridge {
    orchestrator: Arc<Orchestrator>,
    channel: Arc<dyn Channel>,
}

impl RelayBridge {
    pub fn new(orchestrator: Arc<Orchestrator>, channel: Arc<dyn Channel>) -> Self {
        Self {
            orchestrator,
            channel,
        }
    }

    /// Handle one message end to end.
    pub async fn process(&self, message: ChannelMessage) -> Result<()> {
        // Bare mentions are answered instantly; everything else waits on the model.
        if !self.orchestrator.matcher().is_name_only(&message.text) {
            if let Err(e) = self.channel.start_typing(&message.channel_id).await {
                tracing::warn!(
                    trace_id = %message.trace_id,
                    channel = self.channel.name(),
                    channel_id = %message.channel_id,
                    error = %e,
                    "Failed to send typing indicator"
                );
            }
        }

        let outcome = self
            .orchestrator
            .respond(&message.user_id, &message.text)
            .await;

        tracing::info!(
            trace_id = %message.trace_id,
            channel = self.channel.name(),
            user_id = %message.user_id,
            failed = outcome.is_failure(),
            reply_len = outcome.text().chars().count(),
            "Sending reply"
        );

        self.channel
            .send(OutgoingMessage::reply(&message, outcome.text()))
            .await?;

        Ok(())
    }

    /// Spawn a task that processes messages from `rx`, one task per message.
    pub fn spawn_processor(
        bridge: Arc<Self>,
        mut rx: mpsc::Receiver<ChannelMessage>,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            tracing::info!("Relay processor started");

            while let Some(message) = rx.recv().await {
                let bridge = bridge.clone();

                tokio::spawn(async move {
                    let trace_id = message.trace_id.clone();
                    if let Err(e) = bridge.process(message).await {
                        tracing::error!(trace_id = %trace_id, error = %e, "Failed to process message");
                    }
                });
            }

            tracing::info!("Relay processor stopped");
        })
    }
}
