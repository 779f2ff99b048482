//! Miku Common - Shared configuration and logging for the Miku relay bot.
//!
//! This crate provides:
//! - Configuration types and loading
//! - Configuration validation
//! - Logging setup

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod config;
pub mod logging;
pub mod validation;

pub use config::{
    Config, ConfigSource, LlmConfig, ObservabilityConfig, PersonaConfig, SessionConfig, TelegramConfig,
};
pub use validation::{Validate, ValidationError, ValidationResult};
