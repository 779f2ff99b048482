//! Configuration validation.
//!
//! Checks that required credentials are present and that numeric settings
//! are within usable ranges before the bot starts polling.

use thiserror::Error;

use crate::config::{Config, LlmConfig, ObservabilityConfig, PersonaConfig, SessionConfig};

/// Configuration validation error.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Multiple validation errors: {0:?}")]
    Multiple(Vec<ValidationError>),
}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Trait for validatable configuration sections.
pub trait Validate {
    /// Validate this configuration section.
    fn validate(&self) -> ValidationResult<()>;
}

impl Config {
    /// Validate the entire configuration.
    pub fn validate(&self) -> ValidationResult<()> {
        let mut errors = Vec::new();

        if self.telegram_bot_token().is_none() {
            errors.push(ValidationError::MissingField {
                field: "telegram.bot_token (or BOT_TOKEN)".into(),
            });
        }

        if self.llm_api_key().is_none() {
            errors.push(ValidationError::MissingField {
                field: "llm.api_key (or DEEPSEEK_API_KEY)".into(),
            });
        }

        let sections: [&dyn Validate; 4] = [
            &self.llm,
            &self.session,
            &self.persona,
            &self.observability,
        ];
        for section in sections {
            if let Err(e) = section.validate() {
                errors.push(e);
            }
        }

        if errors.is_empty() {
            Ok(())
        } else if errors.len() == 1 {
            Err(errors.remove(0))
        } else {
            Err(ValidationError::Multiple(errors))
        }
    }
}

impl Validate for LlmConfig {
    fn validate(&self) -> ValidationResult<()> {
        if self.base_url.trim().is_empty() {
            return Err(ValidationError::MissingField {
                field: "llm.base_url".into(),
            });
        }

        if self.model.trim().is_empty() {
            return Err(ValidationError::MissingField {
                field: "llm.model".into(),
            });
        }

        if self.max_tokens <= 0 {
            return Err(ValidationError::InvalidValue {
                field: "llm.max_tokens".into(),
                reason: "must be greater than 0".into(),
            });
        }

        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ValidationError::InvalidValue {
                field: "llm.temperature".into(),
                reason: "must be between 0.0 and 2.0".into(),
            });
        }

        if self.timeout_secs == 0 {
            return Err(ValidationError::InvalidValue {
                field: "llm.timeout_secs".into(),
                reason: "must be greater than 0".into(),
            });
        }

        Ok(())
    }
}

impl Validate for SessionConfig {
    fn validate(&self) -> ValidationResult<()> {
        // The system turn plus at least one user turn
        if self.max_turns < 2 {
            return Err(ValidationError::InvalidValue {
                field: "session.max_turns".into(),
                reason: "must be at least 2".into(),
            });
        }

        Ok(())
    }
}

impl Validate for PersonaConfig {
    fn validate(&self) -> ValidationResult<()> {
        if let Some(ref aliases) = self.aliases {
            if aliases.iter().all(|a| a.trim().is_empty()) {
                return Err(ValidationError::InvalidValue {
                    field: "persona.aliases".into(),
                    reason: "must contain at least one non-empty name".into(),
                });
            }
        }

        if let Some(ref greetings) = self.greetings {
            if greetings.is_empty() {
                return Err(ValidationError::InvalidValue {
                    field: "persona.greetings".into(),
                    reason: "must not be empty".into(),
                });
            }
        }

        Ok(())
    }
}

impl Validate for ObservabilityConfig {
    fn validate(&self) -> ValidationResult<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(ValidationError::InvalidValue {
                field: "observability.log_level".into(),
                reason: format!("must be one of: {}", valid_levels.join(", ")),
            });
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.log_format.trim().to_lowercase().as_str()) {
            return Err(ValidationError::InvalidValue {
                field: "observability.log_format".into(),
                reason: format!("must be one of: {}", valid_formats.join(", ")),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        let mut config = Config::default();
        config.telegram.bot_token = Some("123:ABC".into());
        config.llm.api_key = Some("sk-test".into());
        config
    }

    #[test]
    fn test_valid_config() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_default_config_missing_secrets() {
        let result = Config::default().validate();
        match result {
            Err(ValidationError::Multiple(errors)) => assert_eq!(errors.len(), 2),
            other => panic!("expected two missing secrets, got {other:?}"),
        }
    }

    #[test]
    fn test_invalid_log_level() {
        let mut config = valid_config();
        config.observability.log_level = "invalid".into();
        let result = config.validate();
        assert!(
            matches!(result, Err(ValidationError::InvalidValue { ref field, .. }) if field == "observability.log_level")
        );
    }

    #[test]
    fn test_max_turns_too_small() {
        let mut config = valid_config();
        config.session.max_turns = 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_temperature_out_of_range() {
        let mut config = valid_config();
        config.llm.temperature = 3.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_greetings_rejected() {
        let mut config = valid_config();
        config.persona.greetings = Some(vec![]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_blank_aliases_rejected() {
        let mut config = valid_config();
        config.persona.aliases = Some(vec!["  ".into()]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_log_format_case_insensitive() {
        let mut config = valid_config();
        config.observability.log_format = "JSON".into();
        assert!(config.validate().is_ok());

        config.observability.log_format = "xml".into();
        assert!(config.validate().is_err());
    }
}
