//! Content provider: generated questions with validation and fallback.
//!
//! Callers get the contract they need for the flows: exactly N valid
//! questions, for any N the bank's addressable content can cover.

use std::sync::Arc;

use tutor_core::model::{Language, Level, Question, Topic};
use tutor_core::parser::parse_questions;

use crate::bank::FallbackBank;
use crate::error::{ContentError, GenerateError};
use crate::generator::TextGenerator;

/// Independent generation attempts before giving up on the generative path.
pub const GENERATION_ATTEMPTS: usize = 3;

fn language_name(language: Language) -> &'static str {
    match language {
        Language::En => "English",
        Language::Uz => "Uzbek",
    }
}

fn difficulty_hint(level: Level) -> &'static str {
    match level {
        Level::Beginner => "basic level (grades 8-9)",
        Level::Intermediate => "intermediate level (grade 10)",
        Level::Advanced => "advanced level (grade 11, entrance-exam difficulty)",
    }
}

const FORMAT_RULES: &str = "\
IMPORTANT FORMATTING RULES:
1. Use PLAIN TEXT only - NO LaTeX, NO special symbols
2. Write clean math: 2x + 5 = 11
3. Use simple notation: x^2 for x squared, sqrt(16) for square root

For EACH question, provide in this EXACT format:

QUESTION: [question text]
A) [option A]
B) [option B]
C) [option C]
D) [option D]
CORRECT: [A/B/C/D]
TOPIC: [topic name]";

fn diagnostic_prompt(level: Level, language: Language, count: usize) -> String {
    format!(
        "Generate exactly {count} multiple choice math questions for exam preparation \
         in {lang} language.\nDifficulty: {difficulty}\n\n\
         Topics to cover (mix them): algebra, geometry, functions, trigonometry, \
         arithmetic, logarithms.\n\n{FORMAT_RULES}\n\nGenerate all {count} questions now.",
        lang = language_name(language),
        difficulty = difficulty_hint(level),
    )
}

fn practice_prompt(topic: &Topic, level: Level, language: Language, count: usize) -> String {
    format!(
        "Generate exactly {count} multiple choice math questions about \"{topic}\" \
         in {lang} language.\nDifficulty: {difficulty}\n\n{FORMAT_RULES}\n\n\
         Generate all {count} questions now.",
        lang = language_name(language),
        difficulty = difficulty_hint(level),
    )
}

fn theory_prompt(topic: &Topic, language: Language) -> String {
    format!(
        "Create a SHORT math lesson about \"{topic}\" in {lang} for exam students.\n\n\
         Include:\n1. Brief definition (1-2 sentences)\n2. One key formula\n\
         3. One simple example\n\nKeep it under 400 words. Be concise.",
        lang = language_name(language),
    )
}

fn builtin_theory(topic: &Topic) -> String {
    format!(
        "Today's topic is {topic}. Review the key definitions and formulas for \
         {topic}, then work through the practice tasks below step by step."
    )
}

/// Wraps the generative service and the fallback bank.
#[derive(Clone)]
pub struct ContentProvider {
    generator: Arc<dyn TextGenerator>,
    bank: Arc<FallbackBank>,
}

impl ContentProvider {
    #[must_use]
    pub fn new(generator: Arc<dyn TextGenerator>, bank: FallbackBank) -> Self {
        Self {
            generator,
            bank: Arc::new(bank),
        }
    }

    /// Produce exactly `count` valid questions.
    ///
    /// Up to [`GENERATION_ATTEMPTS`] independent generation calls, each with
    /// a fresh prompt and no partial carry-over; the best attempt wins. Any
    /// shortfall is topped up deterministically from the fallback bank.
    ///
    /// # Errors
    ///
    /// Returns `ContentError::Exhausted` when generation and the bank
    /// together cannot cover `count`.
    pub async fn generate_questions(
        &self,
        topic: Option<&Topic>,
        level: Level,
        language: Language,
        count: usize,
    ) -> Result<Vec<Question>, ContentError> {
        let mut questions: Vec<Question> = Vec::new();

        for attempt in 1..=GENERATION_ATTEMPTS {
            let prompt = match topic {
                Some(topic) => practice_prompt(topic, level, language, count),
                None => diagnostic_prompt(level, language, count),
            };
            match self.generator.generate(&prompt).await {
                Ok(raw) => {
                    let parsed = parse_questions(&raw);
                    if parsed.is_empty() {
                        tracing::warn!(attempt, "generated content yielded no valid questions");
                    } else if parsed.len() > questions.len() {
                        questions = parsed;
                    }
                    if questions.len() >= count {
                        break;
                    }
                }
                Err(GenerateError::Disabled) => break,
                Err(err) => {
                    tracing::warn!(attempt, error = %err, "generation attempt failed");
                }
            }
        }

        questions.truncate(count);
        if questions.len() < count {
            let missing = count - questions.len();
            let filler = self.bank.sample_questions(topic, level, missing);
            tracing::info!(
                missing,
                filled = filler.len(),
                "supplementing questions from fallback bank"
            );
            questions.extend(filler);
        }

        if questions.len() < count {
            return Err(ContentError::Exhausted {
                requested: count,
                produced: questions.len(),
            });
        }
        Ok(questions)
    }

    /// Short theory text for a lesson; falls back to a canned summary when
    /// the generative path is down.
    pub async fn generate_theory(&self, topic: &Topic, language: Language) -> String {
        for attempt in 1..=GENERATION_ATTEMPTS {
            match self.generator.generate(&theory_prompt(topic, language)).await {
                Ok(text) if !text.trim().is_empty() => return text,
                Ok(_) => tracing::warn!(attempt, "theory generation returned empty text"),
                Err(GenerateError::Disabled) => break,
                Err(err) => tracing::warn!(attempt, error = %err, "theory generation failed"),
            }
        }
        builtin_theory(topic)
    }
}
