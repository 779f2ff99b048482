//! Miku Agent - conversation core of the Miku relay bot.
//!
//! For every incoming message the agent:
//! - Recognises mentions of the assistant's name
//! - Answers bare mentions with a canned greeting
//! - Keeps a short per-user history seeded with the persona prompt
//! - Calls the completion service and records its reply
//!
//! ## Example
//!
//! ```ignore
//! use miku_agent::{CompatibleProvider, Orchestrator};
//!
//! let provider = Arc::new(CompatibleProvider::from_config(&config.llm));
//! let orchestrator = Orchestrator::from_config(&config, provider)?;
//!
//! let outcome = orchestrator.respond("42", "мику, посоветуй аниме").await;
//! println!("{}", outcome.text());
//! ```

pub mod compatible;
pub mod matcher;
pub mod orchestrator;
pub mod persona;
pub mod preprocess;
pub mod provider;
pub mod session;

pub use compatible::CompatibleProvider;
pub use matcher::{MatcherError, NameMatcher};
pub use orchestrator::{CompletionSettings, Orchestrator, Outcome};
pub use persona::{GreetingPicker, Persona};
pub use preprocess::{preprocess, Preprocessed};
pub use provider::{
    CompletionProvider, CompletionRequest, CompletionResponse, ProviderError, TokenUsage,
};
pub use session::{Role, Session, SessionError, SessionHandle, SessionLocking, SessionStore, Turn};
