//! Classifies incoming text before it reaches the completion service.

use crate::matcher::NameMatcher;

/// What to do with an incoming message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Preprocessed {
    /// The message is only the assistant's name: answer with a canned greeting.
    Greeting,
    /// Forward this text to the completion service.
    Forward(String),
}

/// Decide how to handle `text`.
///
/// A name-prefixed question is forwarded without the name. When stripping
/// leaves nothing behind, the original text is forwarded instead.
pub fn preprocess(matcher: &NameMatcher, text: &str) -> Preprocessed {
    if matcher.is_name_only(text) {
        return Preprocessed::Greeting;
    }

    if matcher.contains_name(text) {
        let question = matcher.extract_question(text);
        if !question.is_empty() {
            return Preprocessed::Forward(question);
        }
    }

    Preprocessed::Forward(text.to_string())
}
