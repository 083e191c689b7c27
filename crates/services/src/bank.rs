//! Static fallback question bank.
//!
//! Used to top up generated content when the generative path comes up short.
//! Sampling is deterministic: eligible entries are taken in bank order
//! without replacement until exhausted, then again with replacement.

use tutor_core::model::{AnswerOption, Level, Question, Topic};

struct BankEntry {
    topic: &'static str,
    difficulty: Level,
    text: &'static str,
    options: [&'static str; 4],
    correct: AnswerOption,
}

const BUILTIN: &[BankEntry] = &[
    BankEntry {
        topic: "arithmetic",
        difficulty: Level::Beginner,
        text: "Calculate: 17 + 28",
        options: ["45", "44", "46", "35"],
        correct: AnswerOption::A,
    },
    BankEntry {
        topic: "arithmetic",
        difficulty: Level::Beginner,
        text: "Calculate: 144 / 12",
        options: ["10", "11", "12", "14"],
        correct: AnswerOption::C,
    },
    BankEntry {
        topic: "percentages",
        difficulty: Level::Beginner,
        text: "What is 25% of 80?",
        options: ["15", "25", "20", "40"],
        correct: AnswerOption::C,
    },
    BankEntry {
        topic: "fractions",
        difficulty: Level::Beginner,
        text: "Simplify: 18/24",
        options: ["3/4", "2/3", "4/5", "5/6"],
        correct: AnswerOption::A,
    },
    BankEntry {
        topic: "algebra",
        difficulty: Level::Beginner,
        text: "Solve: 2x + 5 = 11",
        options: ["2", "3", "4", "8"],
        correct: AnswerOption::B,
    },
    BankEntry {
        topic: "algebra",
        difficulty: Level::Intermediate,
        text: "Solve: x^2 - 5x + 6 = 0. The roots are:",
        options: ["1 and 6", "-2 and -3", "2 and 3", "5 and 6"],
        correct: AnswerOption::C,
    },
    BankEntry {
        topic: "algebra",
        difficulty: Level::Advanced,
        text: "If x + 1/x = 4, what is x^2 + 1/x^2?",
        options: ["12", "16", "14", "18"],
        correct: AnswerOption::C,
    },
    BankEntry {
        topic: "equations",
        difficulty: Level::Intermediate,
        text: "Solve: 3(x - 2) = 2x + 4",
        options: ["10", "8", "6", "2"],
        correct: AnswerOption::A,
    },
    BankEntry {
        topic: "inequalities",
        difficulty: Level::Intermediate,
        text: "For which x does 2x - 3 > 7 hold?",
        options: ["x > 2", "x < 5", "x > 5", "x > 10"],
        correct: AnswerOption::C,
    },
    BankEntry {
        topic: "geometry",
        difficulty: Level::Beginner,
        text: "The angles of a triangle sum to:",
        options: ["90 degrees", "180 degrees", "270 degrees", "360 degrees"],
        correct: AnswerOption::B,
    },
    BankEntry {
        topic: "geometry",
        difficulty: Level::Intermediate,
        text: "A right triangle has legs 6 and 8. The hypotenuse is:",
        options: ["9", "12", "10", "14"],
        correct: AnswerOption::C,
    },
    BankEntry {
        topic: "geometry",
        difficulty: Level::Advanced,
        text: "The area of a circle with circumference 6pi is:",
        options: ["9pi", "6pi", "12pi", "36pi"],
        correct: AnswerOption::A,
    },
    BankEntry {
        topic: "functions",
        difficulty: Level::Intermediate,
        text: "If f(x) = 2x - 3, what is f(5)?",
        options: ["5", "7", "10", "13"],
        correct: AnswerOption::B,
    },
    BankEntry {
        topic: "functions",
        difficulty: Level::Advanced,
        text: "If f(x) = x^2 and g(x) = x + 1, what is f(g(2))?",
        options: ["5", "4", "9", "6"],
        correct: AnswerOption::C,
    },
    BankEntry {
        topic: "trigonometry",
        difficulty: Level::Intermediate,
        text: "sin(30 degrees) equals:",
        options: ["1/2", "1/3", "sqrt(2)/2", "sqrt(3)/2"],
        correct: AnswerOption::A,
    },
    BankEntry {
        topic: "trigonometry",
        difficulty: Level::Advanced,
        text: "If sin(a) = 3/5 and a is acute, cos(a) equals:",
        options: ["2/5", "4/5", "3/4", "5/4"],
        correct: AnswerOption::B,
    },
    BankEntry {
        topic: "logarithms",
        difficulty: Level::Intermediate,
        text: "log2(32) equals:",
        options: ["4", "6", "5", "16"],
        correct: AnswerOption::C,
    },
    BankEntry {
        topic: "logarithms",
        difficulty: Level::Advanced,
        text: "If log(x) + log(4) = log(36), then x equals:",
        options: ["9", "32", "8", "12"],
        correct: AnswerOption::A,
    },
    BankEntry {
        topic: "probability",
        difficulty: Level::Intermediate,
        text: "A fair die is rolled once. The probability of an even number is:",
        options: ["1/6", "1/3", "1/2", "2/3"],
        correct: AnswerOption::C,
    },
    BankEntry {
        topic: "statistics",
        difficulty: Level::Beginner,
        text: "The mean of 4, 7, 10 and 15 is:",
        options: ["9", "8", "10", "12"],
        correct: AnswerOption::A,
    },
];

/// Read-only, pre-validated fallback supply.
pub struct FallbackBank {
    entries: &'static [BankEntry],
}

impl Default for FallbackBank {
    fn default() -> Self {
        Self::builtin()
    }
}

impl FallbackBank {
    #[must_use]
    pub fn builtin() -> Self {
        Self { entries: BUILTIN }
    }

    /// Entries matching the filter, validated through the question
    /// constructor; entries with duplicate options are excluded here.
    fn eligible(&self, topic: Option<&Topic>, difficulty: Level) -> Vec<Question> {
        let build = |entry: &BankEntry| {
            Question::new(
                entry.text,
                entry.options.map(String::from),
                entry.correct,
                Topic::new(entry.topic),
                None,
            )
            .ok()
        };

        // Tiered filter: topic + difficulty, then topic alone, then any
        // valid entry, so the bank stays addressable for unseen topics.
        let by_topic_and_level: Vec<Question> = self
            .entries
            .iter()
            .filter(|e| e.difficulty == difficulty)
            .filter(|e| topic.is_none_or(|t| t.as_str() == e.topic))
            .filter_map(build)
            .collect();
        if !by_topic_and_level.is_empty() {
            return by_topic_and_level;
        }

        if let Some(topic) = topic {
            let by_topic: Vec<Question> = self
                .entries
                .iter()
                .filter(|e| e.topic == topic.as_str())
                .filter_map(build)
                .collect();
            if !by_topic.is_empty() {
                return by_topic;
            }
        }

        self.entries.iter().filter_map(build).collect()
    }

    /// Number of distinct entries addressable for the filter.
    #[must_use]
    pub fn addressable(&self, topic: Option<&Topic>, difficulty: Level) -> usize {
        self.eligible(topic, difficulty).len()
    }

    /// Deterministically sample `count` questions: each eligible entry once,
    /// in bank order, then cycling with replacement.
    #[must_use]
    pub fn sample_questions(
        &self,
        topic: Option<&Topic>,
        difficulty: Level,
        count: usize,
    ) -> Vec<Question> {
        let pool = self.eligible(topic, difficulty);
        if pool.is_empty() {
            return Vec::new();
        }
        (0..count).map(|i| pool[i % pool.len()].clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_builtin_entry_is_valid() {
        let bank = FallbackBank::builtin();
        let all = bank.sample_questions(None, Level::Beginner, BUILTIN.len());
        assert_eq!(all.len(), BUILTIN.len());
    }

    #[test]
    fn sampling_is_deterministic() {
        let bank = FallbackBank::builtin();
        let topic = Topic::new("algebra");
        let first = bank.sample_questions(Some(&topic), Level::Intermediate, 3);
        let second = bank.sample_questions(Some(&topic), Level::Intermediate, 3);
        assert_eq!(first, second);
    }

    #[test]
    fn exhausted_pool_cycles_with_replacement() {
        let bank = FallbackBank::builtin();
        let topic = Topic::new("logarithms");
        let pool_size = bank.addressable(Some(&topic), Level::Intermediate);
        assert!(pool_size >= 1);

        let sampled = bank.sample_questions(Some(&topic), Level::Intermediate, pool_size + 2);
        assert_eq!(sampled.len(), pool_size + 2);
        assert_eq!(sampled[0], sampled[pool_size]);
    }

    #[test]
    fn unknown_topic_falls_back_to_whole_bank() {
        let bank = FallbackBank::builtin();
        let topic = Topic::new("chemistry");
        assert!(bank.addressable(Some(&topic), Level::Beginner) > 0);
        let sampled = bank.sample_questions(Some(&topic), Level::Beginner, 5);
        assert_eq!(sampled.len(), 5);
    }

    #[test]
    fn topic_filter_prefers_matching_entries() {
        let bank = FallbackBank::builtin();
        let topic = Topic::new("geometry");
        let sampled = bank.sample_questions(Some(&topic), Level::Intermediate, 1);
        assert_eq!(sampled[0].topic(), &topic);
    }
}
