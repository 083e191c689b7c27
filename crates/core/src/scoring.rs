//! Diagnostic scoring and proficiency classification.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{Level, Topic};

/// How many topics make up the strengths and weaknesses lists.
pub const RANKED_TOPIC_COUNT: usize = 3;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ScoringError {
    #[error("cannot score an empty answer set")]
    Empty,
}

/// One collected answer, reduced to what scoring needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoredAnswer {
    pub topic: Topic,
    pub is_correct: bool,
}

/// Percentage score; 0 for an empty total.
#[must_use]
pub fn score_percentage(correct: u32, total: u32) -> f64 {
    if total == 0 {
        0.0
    } else {
        f64::from(correct) / f64::from(total) * 100.0
    }
}

/// The single threshold table mapping a percentage to a proficiency level.
///
/// Bounds are inclusive: exactly 75.0 classifies as Advanced.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LevelThresholds {
    pub advanced: f64,
    pub intermediate: f64,
}

impl Default for LevelThresholds {
    fn default() -> Self {
        Self {
            advanced: 75.0,
            intermediate: 40.0,
        }
    }
}

impl LevelThresholds {
    #[must_use]
    pub fn assign(&self, percentage: f64) -> Level {
        if percentage >= self.advanced {
            Level::Advanced
        } else if percentage >= self.intermediate {
            Level::Intermediate
        } else {
            Level::Beginner
        }
    }
}

/// Accuracy of one topic, in encounter order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicAccuracy {
    pub topic: Topic,
    pub correct: u32,
    pub total: u32,
}

impl TopicAccuracy {
    #[must_use]
    pub fn accuracy(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            f64::from(self.correct) / f64::from(self.total)
        }
    }
}

/// Outcome of a completed diagnostic: overall percentage, ranked topics,
/// strengths/weaknesses and the assigned level.
#[derive(Debug, Clone, PartialEq)]
pub struct DiagnosticReport {
    total: u32,
    correct: u32,
    percentage: f64,
    ranked_topics: Vec<TopicAccuracy>,
    strengths: Vec<Topic>,
    weaknesses: Vec<Topic>,
    level: Level,
}

impl DiagnosticReport {
    /// Score a completed answer set.
    ///
    /// Topics are ranked by accuracy descending; ties keep the order in
    /// which a topic was first encountered. The top and bottom
    /// [`RANKED_TOPIC_COUNT`] become strengths and weaknesses.
    ///
    /// # Errors
    ///
    /// Returns `ScoringError::Empty` for an empty answer set.
    pub fn from_answers(
        answers: &[ScoredAnswer],
        thresholds: &LevelThresholds,
    ) -> Result<Self, ScoringError> {
        if answers.is_empty() {
            return Err(ScoringError::Empty);
        }

        let total = u32::try_from(answers.len()).unwrap_or(u32::MAX);
        let correct =
            u32::try_from(answers.iter().filter(|a| a.is_correct).count()).unwrap_or(u32::MAX);

        // Accumulate per-topic counts in encounter order.
        let mut ranked: Vec<TopicAccuracy> = Vec::new();
        for answer in answers {
            match ranked.iter_mut().find(|t| t.topic == answer.topic) {
                Some(entry) => {
                    entry.total += 1;
                    if answer.is_correct {
                        entry.correct += 1;
                    }
                }
                None => ranked.push(TopicAccuracy {
                    topic: answer.topic.clone(),
                    correct: u32::from(answer.is_correct),
                    total: 1,
                }),
            }
        }

        // Stable sort: equal accuracies keep encounter order.
        ranked.sort_by(|a, b| b.accuracy().total_cmp(&a.accuracy()));

        let take = RANKED_TOPIC_COUNT.min(ranked.len());
        let strengths = ranked[..take].iter().map(|t| t.topic.clone()).collect();
        let weaknesses = ranked[ranked.len() - take..]
            .iter()
            .map(|t| t.topic.clone())
            .collect();

        let percentage = score_percentage(correct, total);
        let level = thresholds.assign(percentage);

        Ok(Self {
            total,
            correct,
            percentage,
            ranked_topics: ranked,
            strengths,
            weaknesses,
            level,
        })
    }

    #[must_use]
    pub fn total(&self) -> u32 {
        self.total
    }

    #[must_use]
    pub fn correct(&self) -> u32 {
        self.correct
    }

    #[must_use]
    pub fn percentage(&self) -> f64 {
        self.percentage
    }

    #[must_use]
    pub fn ranked_topics(&self) -> &[TopicAccuracy] {
        &self.ranked_topics
    }

    /// Top-ranked topics, best accuracy first.
    #[must_use]
    pub fn strengths(&self) -> &[Topic] {
        &self.strengths
    }

    /// Bottom-ranked topics, in rank order (worst last).
    #[must_use]
    pub fn weaknesses(&self) -> &[Topic] {
        &self.weaknesses
    }

    #[must_use]
    pub fn level(&self) -> Level {
        self.level
    }
}
