//! Turns raw generated text into validated [`Question`]s.
//!
//! The input is line-oriented: blocks introduced by a `QUESTION:` marker,
//! followed by `A)`..`D)` options, a `CORRECT:` letter and an optional
//! `TOPIC:` tag. Every line maps to exactly one [`LineKind`]; a small
//! accumulator flushes a block whenever the next one starts (and once at end
//! of input) and keeps only blocks that satisfy every question invariant.
//! The parser never invents missing data.

use crate::model::{AnswerOption, OPTION_COUNT, Question, Topic};

/// Classification of a single input line. Total: every line maps to a kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineKind<'a> {
    QuestionMarker(&'a str),
    OptionLetter(AnswerOption, &'a str),
    CorrectMarker(&'a str),
    TopicMarker(&'a str),
    Blank,
    Unknown,
}

fn strip_prefix_ignore_case<'a>(line: &'a str, prefix: &str) -> Option<&'a str> {
    let head = line.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix)
        .then(|| &line[prefix.len()..])
}

fn strip_option_letter(line: &str) -> Option<(AnswerOption, &str)> {
    let mut chars = line.char_indices();
    let (_, letter) = chars.next()?;
    let (_, separator) = chars.next()?;
    if separator != ')' && separator != '.' {
        return None;
    }
    let option = match letter {
        'A' => AnswerOption::A,
        'B' => AnswerOption::B,
        'C' => AnswerOption::C,
        'D' => AnswerOption::D,
        _ => return None,
    };
    Some((option, line[2..].trim()))
}

/// Classify one raw line.
#[must_use]
pub fn classify(line: &str) -> LineKind<'_> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return LineKind::Blank;
    }
    if let Some(rest) = strip_prefix_ignore_case(trimmed, "QUESTION:") {
        return LineKind::QuestionMarker(rest.trim());
    }
    if let Some(rest) = strip_prefix_ignore_case(trimmed, "CORRECT:") {
        return LineKind::CorrectMarker(rest.trim());
    }
    if let Some(rest) = strip_prefix_ignore_case(trimmed, "TOPIC:") {
        return LineKind::TopicMarker(rest.trim());
    }
    if let Some((option, rest)) = strip_option_letter(trimmed) {
        return LineKind::OptionLetter(option, rest);
    }
    LineKind::Unknown
}

/// Partially accumulated question block.
#[derive(Debug, Default)]
struct Block {
    text: Option<String>,
    options: Vec<String>,
    correct: Option<AnswerOption>,
    topic: Option<Topic>,
}

impl Block {
    fn start(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
            ..Self::default()
        }
    }

    /// Convert the block into a question iff it is complete: non-empty text,
    /// a valid correct letter, and exactly four distinct non-empty options.
    fn flush(self) -> Option<Question> {
        let text = self.text?;
        let correct = self.correct?;
        let options: [String; OPTION_COUNT] = self.options.try_into().ok()?;
        let topic = self.topic.unwrap_or_else(Topic::general);
        Question::new(text, options, correct, topic, None).ok()
    }
}

/// Parse a raw text blob into the ordered list of valid questions it holds.
///
/// Emits at most one question per `QUESTION:` marker; incomplete or
/// invariant-violating blocks are dropped silently.
#[must_use]
pub fn parse_questions(input: &str) -> Vec<Question> {
    let mut questions = Vec::new();
    let mut block: Option<Block> = None;

    for line in input.lines() {
        match classify(line) {
            LineKind::QuestionMarker(text) => {
                if let Some(prior) = block.take()
                    && let Some(question) = prior.flush()
                {
                    questions.push(question);
                }
                block = Some(Block::start(text));
            }
            LineKind::OptionLetter(_, text) => {
                if let Some(block) = block.as_mut() {
                    block.options.push(text.to_string());
                }
            }
            LineKind::CorrectMarker(raw) => {
                if let Some(block) = block.as_mut() {
                    // Normalized to the uppercase first character; anything
                    // outside A-D is discarded.
                    block.correct = AnswerOption::from_marker(raw);
                }
            }
            LineKind::TopicMarker(raw) => {
                if let Some(block) = block.as_mut() {
                    block.topic = Some(Topic::new(raw));
                }
            }
            LineKind::Blank | LineKind::Unknown => {}
        }
    }

    if let Some(trailing) = block
        && let Some(question) = trailing.flush()
    {
        questions.push(question);
    }

    questions
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_BLOCKS: &str = "\
QUESTION: 2x + 5 = 11. Find x.
A) 2
B) 3
C) 4
D) 5
CORRECT: B
TOPIC: Algebra

QUESTION: Area of a 3-4-5 triangle?
A) 6
B) 10
C) 12
D) 7.5
CORRECT: A
TOPIC: Geometry
";

    #[test]
    fn parses_complete_blocks_in_order() {
        let questions = parse_questions(TWO_BLOCKS);
        assert_eq!(questions.len(), 2);
        assert_eq!(questions[0].correct(), AnswerOption::B);
        assert_eq!(questions[0].topic().as_str(), "algebra");
        assert_eq!(questions[1].text(), "Area of a 3-4-5 triangle?");
        assert_eq!(questions[1].option(AnswerOption::A), "6");
    }

    #[test]
    fn drops_block_with_missing_option() {
        let input = "\
QUESTION: incomplete
A) 1
B) 2
C) 3
CORRECT: A

QUESTION: complete
A) 1
B) 2
C) 3
D) 4
CORRECT: D
";
        let questions = parse_questions(input);
        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0].text(), "complete");
    }

    #[test]
    fn drops_block_with_duplicate_options() {
        let input = "\
QUESTION: dup
A) same
B) same
C) 3
D) 4
CORRECT: A
";
        assert!(parse_questions(input).is_empty());
    }

    #[test]
    fn discards_invalid_correct_letter() {
        let input = "\
QUESTION: bad letter
A) 1
B) 2
C) 3
D) 4
CORRECT: E
";
        assert!(parse_questions(input).is_empty());
    }

    #[test]
    fn normalizes_correct_marker() {
        let input = "\
QUESTION: normalize
A) 1
B) 2
C) 3
D) 4
CORRECT: b
";
        let questions = parse_questions(input);
        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0].correct(), AnswerOption::B);
    }

    #[test]
    fn ignores_unknown_lines_and_preamble() {
        let input = format!("Here are your questions:\n\n{TWO_BLOCKS}\nGood luck!");
        assert_eq!(parse_questions(&input).len(), 2);
    }

    #[test]
    fn options_before_any_question_are_dropped() {
        let input = "\
A) stray
B) stray 2

QUESTION: q
A) 1
B) 2
C) 3
D) 4
CORRECT: C
";
        let questions = parse_questions(input);
        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0].option(AnswerOption::A), "1");
    }

    #[test]
    fn emitted_count_never_exceeds_block_count() {
        let noisy = format!("{TWO_BLOCKS}\nQUESTION: dangling, no options\n");
        let block_count = noisy
            .lines()
            .filter(|l| matches!(classify(l), LineKind::QuestionMarker(_)))
            .count();
        let questions = parse_questions(&noisy);
        assert!(questions.len() <= block_count);
        assert_eq!(questions.len(), 2);
    }

    #[test]
    fn accepts_dot_separated_options_and_lowercase_markers() {
        let input = "\
question: mixed style
A. 1
B. 2
C. 3
D. 4
correct: d
topic: Functions
";
        let questions = parse_questions(input);
        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0].correct(), AnswerOption::D);
        assert_eq!(questions[0].topic().as_str(), "functions");
    }

    #[test]
    fn classifier_is_total() {
        for line in ["", "   ", "random prose", "E) nope", "A-", "QUESTION:", "QUESTİON: x", "Ğ"] {
            // Must not panic, whatever the line.
            let _ = classify(line);
        }
        assert_eq!(classify("E) nope"), LineKind::Unknown);
        assert_eq!(classify("  "), LineKind::Blank);
    }

    #[test]
    fn fifth_option_invalidates_block() {
        let input = "\
QUESTION: five options
A) 1
B) 2
C) 3
D) 4
A) 5
CORRECT: A
";
        assert!(parse_questions(input).is_empty());
    }
}
