//! Miku Channels - Telegram front end of the Miku relay bot.
//!
//! ## Architecture
//!
//! The Telegram listener long-polls the Bot API and pushes text messages into
//! a queue. The relay processor takes each message through the orchestrator
//! and sends the outcome back to the originating chat.
//!
//! ```text
//! User → getUpdates → TelegramChannel → mpsc → RelayBridge → Orchestrator → LLM
//! User ←── sendMessage ←── TelegramChannel ←──────┘
//! ```

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod bridge;
pub mod message;
pub mod telegram;
pub mod traits;

// Re-export commonly used types
pub use bridge::RelayBridge;
pub use message::{ChannelMessage, OutgoingMessage};
pub use telegram::TelegramChannel;
pub use traits::{Channel, ChannelError, ChannelResult};

use anyhow::{Context, Result};
use miku_agent::{CompatibleProvider, CompletionProvider, Orchestrator};
use miku_common::config::Config;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Capacity of the inbound message queue.
const QUEUE_CAPACITY: usize = 100;

/// Run the bot until Ctrl+C or until the listener stops.
pub async fn run(config: &Config) -> Result<()> {
    let provider = Arc::new(CompatibleProvider::from_config(&config.llm));
    tracing::info!(
        provider = %provider.name(),
        base_url = %provider.base_url(),
        "Completion provider configured"
    );
    let orchestrator = Orchestrator::from_config(config, provider)
        .context("Failed to build orchestrator")?;

    tracing::info!(
        model = %config.llm.model,
        max_turns = config.session.max_turns,
        locking = ?orchestrator.sessions().locking(),
        aliases = orchestrator.matcher().aliases().len(),
        "Orchestrator ready"
    );

    let mut telegram = TelegramChannel::from_config(&config.telegram)?;
    telegram.init().await?;
    let channel: Arc<dyn Channel> = Arc::new(telegram);
    tracing::info!(channel = channel.name(), "Channel ready");

    let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
    let bridge = Arc::new(RelayBridge::new(Arc::new(orchestrator), channel.clone()));
    let processor = RelayBridge::spawn_processor(bridge, rx);

    let mut listener = tokio::spawn({
        let channel = channel.clone();
        async move { channel.listen(tx).await }
    });

    tracing::info!("Bot is running. Press Ctrl+C to stop.");

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.context("Failed to listen for shutdown signal")?;
            tracing::info!("Shutdown signal received");
            listener.abort();
        }
        result = &mut listener => {
            match result {
                Ok(Ok(())) => tracing::warn!("Telegram listener stopped"),
                Ok(Err(e)) => tracing::error!(error = %e, "Telegram listener failed"),
                Err(e) => tracing::error!(error = %e, "Telegram listener panicked"),
            }
        }
    }

    processor.abort();
    tracing::info!("Miku bot stopped");
    Ok(())
}
