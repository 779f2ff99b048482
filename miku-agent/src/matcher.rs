//! Detects and strips mentions of the assistant's name.
//!
//! Matching is case-insensitive and purely substring based: an alias
//! inside a longer word still counts as a mention.

use aho_corasick::{AhoCorasick, MatchKind};

/// Single trailing marks accepted after a bare name.
const NAME_SUFFIXES: &[&str] = &["!", "?", ".", ",", "..."];

/// Leading characters removed after the name is stripped.
const LEADING_PUNCTUATION: &[char] = &[' ', ',', '.', '!', '?', ';', ':', '-'];

/// Error building a matcher.
#[derive(Debug, thiserror::Error)]
pub enum MatcherError {
    #[error("no usable aliases")]
    NoAliases,

    #[error("failed to build alias automaton: {0}")]
    Build(#[from] aho_corasick::BuildError),
}

/// Case-insensitive alias matcher.
#[derive(Debug, Clone)]
pub struct NameMatcher {
    aliases: Vec<String>,
    automaton: AhoCorasick,
}

impl NameMatcher {
    /// Build a matcher over the given aliases.
    ///
    /// Aliases are lowercased and trimmed; blanks and duplicates are dropped.
    pub fn new<I, S>(aliases: I) -> Result<Self, MatcherError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut normalized: Vec<String> = Vec::new();
        for alias in aliases {
            let alias = alias.as_ref().trim().to_lowercase();
            if !alias.is_empty() && !normalized.contains(&alias) {
                normalized.push(alias);
            }
        }

        if normalized.is_empty() {
            return Err(MatcherError::NoAliases);
        }

        // Leftmost-longest so "мику-тян" is removed whole, not as "мику" + "-тян".
        let automaton = AhoCorasick::builder()
            .match_kind(MatchKind::LeftmostLongest)
            .build(&normalized)?;

        Ok(Self {
            aliases: normalized,
            automaton,
        })
    }

    /// Normalized aliases.
    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    /// Whether `text` mentions any alias anywhere.
    pub fn contains_name(&self, text: &str) -> bool {
        self.automaton.is_match(&text.to_lowercase())
    }

    /// Whether `text` is just a name, optionally followed by one suffix mark.
    pub fn is_name_only(&self, text: &str) -> bool {
        let lowered = text.to_lowercase();
        let trimmed = lowered.trim();

        self.aliases.iter().any(|alias| {
            trimmed == alias
                || NAME_SUFFIXES
                    .iter()
                    .any(|suffix| trimmed.strip_suffix(suffix) == Some(alias.as_str()))
        })
    }

    /// Remove every alias from `text` and tidy up what is left.
    ///
    /// The result is lowercased. It may be empty; callers fall back to the
    /// original text in that case.
    pub fn extract_question(&self, text: &str) -> String {
        let mut remaining = text.to_lowercase();
        let replacements = vec![""; self.automaton.patterns_len()];

        // Removing one alias can join its neighbours into another one.
        while self.automaton.is_match(&remaining) {
            remaining = self.automaton.replace_all(&remaining, &replacements);
        }

        remaining
            .trim_start_matches(LEADING_PUNCTUATION)
            .trim()
            .to_string()
    }
}
