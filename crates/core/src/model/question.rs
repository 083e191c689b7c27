use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Number of answer options every question carries.
pub const OPTION_COUNT: usize = 4;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("question text is empty")]
    EmptyText,

    #[error("option {0} is empty")]
    EmptyOption(AnswerOption),

    #[error("duplicate option text: {0}")]
    DuplicateOption(String),
}

/// One of the four answer letters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AnswerOption {
    A,
    B,
    C,
    D,
}

impl AnswerOption {
    pub const ALL: [AnswerOption; OPTION_COUNT] = [
        AnswerOption::A,
        AnswerOption::B,
        AnswerOption::C,
        AnswerOption::D,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            AnswerOption::A => "A",
            AnswerOption::B => "B",
            AnswerOption::C => "C",
            AnswerOption::D => "D",
        }
    }

    /// Zero-based position of the letter within an option array.
    #[must_use]
    pub fn index(self) -> usize {
        match self {
            AnswerOption::A => 0,
            AnswerOption::B => 1,
            AnswerOption::C => 2,
            AnswerOption::D => 3,
        }
    }

    /// Normalizes raw marker text to an answer letter.
    ///
    /// Takes the uppercased first non-whitespace character; anything outside
    /// A-D is rejected.
    #[must_use]
    pub fn from_marker(raw: &str) -> Option<Self> {
        let first = raw.trim().chars().next()?;
        match first.to_ascii_uppercase() {
            'A' => Some(AnswerOption::A),
            'B' => Some(AnswerOption::B),
            'C' => Some(AnswerOption::C),
            'D' => Some(AnswerOption::D),
            _ => None,
        }
    }
}

impl fmt::Display for AnswerOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnswerOption {
    type Err = ParseAnswerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AnswerOption::from_marker(s).ok_or(ParseAnswerError)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseAnswerError;

impl fmt::Display for ParseAnswerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("answer letter must be one of A, B, C, D")
    }
}

impl std::error::Error for ParseAnswerError {}

/// Normalized topic tag (trimmed, lowercased).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Topic(String);

impl Topic {
    /// Creates a normalized topic; empty input falls back to `general`.
    #[must_use]
    pub fn new(raw: impl AsRef<str>) -> Self {
        let normalized = raw.as_ref().trim().to_lowercase();
        if normalized.is_empty() {
            Self::general()
        } else {
            Self(normalized)
        }
    }

    /// The catch-all topic used when a question carries no tag.
    #[must_use]
    pub fn general() -> Self {
        Self("general".to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A validated multiple-choice question.
///
/// Invariants enforced by construction: non-empty text, exactly four
/// pairwise-distinct non-empty options, and a correct letter in A-D.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    text: String,
    options: [String; OPTION_COUNT],
    correct: AnswerOption,
    topic: Topic,
    rationale: Option<String>,
}

impl Question {
    /// Build a question, validating every invariant.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` if the text or any option is empty, or if two
    /// options share the same text.
    pub fn new(
        text: impl Into<String>,
        options: [String; OPTION_COUNT],
        correct: AnswerOption,
        topic: Topic,
        rationale: Option<String>,
    ) -> Result<Self, QuestionError> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(QuestionError::EmptyText);
        }
        for (letter, option) in AnswerOption::ALL.iter().zip(options.iter()) {
            if option.trim().is_empty() {
                return Err(QuestionError::EmptyOption(*letter));
            }
        }
        for i in 0..options.len() {
            for j in (i + 1)..options.len() {
                if options[i] == options[j] {
                    return Err(QuestionError::DuplicateOption(options[i].clone()));
                }
            }
        }

        Ok(Self {
            text,
            options,
            correct,
            topic,
            rationale,
        })
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn options(&self) -> &[String; OPTION_COUNT] {
        &self.options
    }

    /// Text of the option behind the given letter.
    #[must_use]
    pub fn option(&self, letter: AnswerOption) -> &str {
        &self.options[letter.index()]
    }

    #[must_use]
    pub fn correct(&self) -> AnswerOption {
        self.correct
    }

    #[must_use]
    pub fn topic(&self) -> &Topic {
        &self.topic
    }

    #[must_use]
    pub fn rationale(&self) -> Option<&str> {
        self.rationale.as_deref()
    }

    #[must_use]
    pub fn is_correct(&self, answer: AnswerOption) -> bool {
        answer == self.correct
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(values: [&str; 4]) -> [String; 4] {
        values.map(String::from)
    }

    #[test]
    fn builds_valid_question() {
        let q = Question::new(
            "2 + 2 = ?",
            options(["3", "4", "5", "6"]),
            AnswerOption::B,
            Topic::new("Arithmetic"),
            None,
        )
        .unwrap();

        assert_eq!(q.option(AnswerOption::B), "4");
        assert_eq!(q.topic().as_str(), "arithmetic");
        assert!(q.is_correct(AnswerOption::B));
        assert!(!q.is_correct(AnswerOption::A));
    }

    #[test]
    fn rejects_empty_text() {
        let err = Question::new(
            "   ",
            options(["1", "2", "3", "4"]),
            AnswerOption::A,
            Topic::general(),
            None,
        )
        .unwrap_err();
        assert_eq!(err, QuestionError::EmptyText);
    }

    #[test]
    fn rejects_empty_option() {
        let err = Question::new(
            "q",
            options(["1", "", "3", "4"]),
            AnswerOption::A,
            Topic::general(),
            None,
        )
        .unwrap_err();
        assert_eq!(err, QuestionError::EmptyOption(AnswerOption::B));
    }

    #[test]
    fn rejects_duplicate_options() {
        let err = Question::new(
            "q",
            options(["1", "2", "2", "4"]),
            AnswerOption::A,
            Topic::general(),
            None,
        )
        .unwrap_err();
        assert_eq!(err, QuestionError::DuplicateOption("2".to_string()));
    }

    #[test]
    fn answer_marker_normalization() {
        assert_eq!(AnswerOption::from_marker(" b "), Some(AnswerOption::B));
        assert_eq!(AnswerOption::from_marker("C) something"), Some(AnswerOption::C));
        assert_eq!(AnswerOption::from_marker("E"), None);
        assert_eq!(AnswerOption::from_marker(""), None);
    }

    #[test]
    fn empty_topic_falls_back_to_general() {
        assert_eq!(Topic::new("  "), Topic::general());
    }
}
