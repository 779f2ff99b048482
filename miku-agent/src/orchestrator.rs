//! Completion orchestration.
//!
//! Turns one incoming message into one reply:
//! preprocess → session update → completion call → session update.

use crate::matcher::NameMatcher;
use crate::persona::{GreetingPicker, Persona};
use crate::preprocess::{preprocess, Preprocessed};
use crate::provider::{CompletionProvider, CompletionRequest, CompletionResponse, ProviderError};
use crate::session::{Session, SessionError, SessionHandle, SessionLocking, SessionStore, Turn};
use miku_common::Config;
use std::sync::Arc;

/// Result of handling one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Canned reply to a bare name mention; no completion call was made.
    Greeting(String),
    /// Text generated by the completion service.
    Reply(String),
    /// The completion call failed; carries the user-facing apology.
    Failure(String),
}

impl Outcome {
    /// Text to send back to the user.
    pub fn text(&self) -> &str {
        match self {
            Self::Greeting(text) | Self::Reply(text) | Self::Failure(text) => text,
        }
    }

    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::Failure(_))
    }
}

/// Fixed parameters of every completion call.
#[derive(Debug, Clone)]
pub struct CompletionSettings {
    pub model: String,
    pub max_tokens: i64,
    pub temperature: f64,
}

impl Default for CompletionSettings {
    fn default() -> Self {
        Self {
            model: "deepseek-chat".into(),
            max_tokens: 1000,
            temperature: 0.8,
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum ExchangeError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Ties the matcher, session store and provider together.
pub struct Orchestrator {
    provider: Arc<dyn CompletionProvider>,
    sessions: SessionStore,
    matcher: NameMatcher,
    greetings: GreetingPicker,
    apology: String,
    settings: CompletionSettings,
}

impl Orchestrator {
    /// Assemble an orchestrator from its parts.
    pub fn new(
        provider: Arc<dyn CompletionProvider>,
        sessions: SessionStore,
        matcher: NameMatcher,
        greetings: GreetingPicker,
        apology: impl Into<String>,
        settings: CompletionSettings,
    ) -> Self {
        Self {
            provider,
            sessions,
            matcher,
            greetings,
            apology: apology.into(),
            settings,
        }
    }

    /// Build an orchestrator from configuration.
    pub fn from_config(
        config: &Config,
        provider: Arc<dyn CompletionProvider>,
    ) -> Result<Self, crate::matcher::MatcherError> {
        let persona = Persona::from_config(&config.persona);
        let matcher = NameMatcher::new(&persona.aliases)?;
        let sessions = SessionStore::new(
            persona.system_prompt,
            config.session.max_turns,
            SessionLocking::from_serialize_flag(config.session.serialize_per_user),
        );
        let settings = CompletionSettings {
            model: config.llm.model.clone(),
            max_tokens: config.llm.max_tokens,
            temperature: config.llm.temperature,
        };

        Ok(Self::new(
            provider,
            sessions,
            matcher,
            GreetingPicker::new(persona.greetings),
            persona.apology,
            settings,
        ))
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn matcher(&self) -> &NameMatcher {
        &self.matcher
    }

    /// Handle one message from `user_id`.
    pub async fn respond(&self, user_id: &str, raw_text: &str) -> Outcome {
        let handle = self.sessions.get_or_create(user_id);

        let forwarded = match preprocess(&self.matcher, raw_text) {
            Preprocessed::Greeting => {
                tracing::debug!(user_id = %user_id, "Bare name mention, sending greeting");
                return Outcome::Greeting(self.greetings.pick().to_string());
            }
            Preprocessed::Forward(text) => text,
        };

        let result = match self.sessions.locking() {
            SessionLocking::PerUser => {
                let mut session = handle.lock().await;
                self.exchange_locked(&mut session, forwarded).await
            }
            SessionLocking::Unsynchronized => self.exchange_unlocked(&handle, forwarded).await,
        };

        match result {
            Ok(response) => {
                tracing::info!(
                    user_id = %user_id,
                    provider = %self.provider.name(),
                    input_tokens = response.usage.input_tokens,
                    output_tokens = response.usage.output_tokens,
                    total_tokens = response.usage.total_tokens,
                    finish_reason = response.finish_reason.as_deref().unwrap_or("unknown"),
                    latency_ms = response.latency_ms,
                    "Completion received"
                );
                Outcome::Reply(response.content)
            }
            Err(e) => {
                tracing::error!(
                    user_id = %user_id,
                    provider = %self.provider.name(),
                    error = %e,
                    "Completion failed"
                );
                Outcome::Failure(self.apology.clone())
            }
        }
    }

    /// Whole exchange under the user's lock.
    async fn exchange_locked(
        &self,
        session: &mut Session,
        forwarded: String,
    ) -> Result<CompletionResponse, ExchangeError> {
        session.append_and_truncate(Turn::user(forwarded))?;

        let request = self.request(session.turns().to_vec());
        let response = self.provider.complete(request).await?;

        session.append(Turn::assistant(response.content.clone()))?;
        Ok(response)
    }

    /// Lock released while the completion call is in flight.
    async fn exchange_unlocked(
        &self,
        handle: &SessionHandle,
        forwarded: String,
    ) -> Result<CompletionResponse, ExchangeError> {
        let messages = {
            let mut session = handle.lock().await;
            session.append_and_truncate(Turn::user(forwarded))?;
            session.turns().to_vec()
        };

        let response = self.provider.complete(self.request(messages)).await?;

        handle
            .lock()
            .await
            .append(Turn::assistant(response.content.clone()))?;
        Ok(response)
    }

    fn request(&self, messages: Vec<Turn>) -> CompletionRequest {
        CompletionRequest {
            model: self.settings.model.clone(),
            messages,
            max_tokens: self.settings.max_tokens,
            temperature: self.settings.temperature,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_text() {
        assert_eq!(Outcome::Greeting("hi".into()).text(), "hi");
        assert_eq!(Outcome::Reply("answer".into()).text(), "answer");
        assert_eq!(Outcome::Failure("sorry".into()).text(), "sorry");
        assert!(Outcome::Failure("sorry".into()).is_failure());
        assert!(!Outcome::Reply("answer".into()).is_failure());
    }

    #[test]
    fn default_settings_match_reference() {
        let settings = CompletionSettings::default();
        assert_eq!(settings.model, "deepseek-chat");
        assert_eq!(settings.max_tokens, 1000);
        assert!((settings.temperature - 0.8).abs() < f64::EPSILON);
    }
}
