use sqlx::Row;
use sqlx::sqlite::SqliteRow;
use uuid::Uuid;

use tutor_core::model::{
    AnswerOption, Language, LearningStatus, LessonId, LessonRecord, LessonStatus, LessonTask,
    Level, Mode, Question, QuizRecord, SessionId, Topic, UserId, UserProfile,
};

use crate::repository::{QuizSessionMeta, StorageError};

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn session_id_from_str(s: &str) -> Result<SessionId, StorageError> {
    s.parse::<Uuid>()
        .map(SessionId::from_uuid)
        .map_err(|_| StorageError::Serialization(format!("invalid session id: {s}")))
}

pub(crate) fn lesson_id_from_str(s: &str) -> Result<LessonId, StorageError> {
    s.parse::<Uuid>()
        .map(LessonId::from_uuid)
        .map_err(|_| StorageError::Serialization(format!("invalid lesson id: {s}")))
}

pub(crate) fn day_from_i64(v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid day: {v}")))
}

pub(crate) fn parse_answer(s: &str) -> Result<AnswerOption, StorageError> {
    match s {
        "A" => Ok(AnswerOption::A),
        "B" => Ok(AnswerOption::B),
        "C" => Ok(AnswerOption::C),
        "D" => Ok(AnswerOption::D),
        _ => Err(StorageError::Serialization(format!("invalid answer: {s}"))),
    }
}

pub(crate) fn parse_language(s: &str) -> Result<Language, StorageError> {
    Language::parse(s).ok_or_else(|| StorageError::Serialization(format!("invalid language: {s}")))
}

pub(crate) fn parse_level(s: &str) -> Result<Level, StorageError> {
    Level::parse(s).ok_or_else(|| StorageError::Serialization(format!("invalid level: {s}")))
}

pub(crate) fn parse_status(s: &str) -> Result<LearningStatus, StorageError> {
    LearningStatus::parse(s)
        .ok_or_else(|| StorageError::Serialization(format!("invalid learning status: {s}")))
}

pub(crate) fn parse_mode(s: &str) -> Result<Mode, StorageError> {
    Mode::parse(s).ok_or_else(|| StorageError::Serialization(format!("invalid mode: {s}")))
}

pub(crate) fn parse_lesson_status(s: &str) -> Result<LessonStatus, StorageError> {
    LessonStatus::parse(s)
        .ok_or_else(|| StorageError::Serialization(format!("invalid lesson status: {s}")))
}

/// Topics persist as a comma-joined string; topics are normalized and never
/// contain commas themselves.
pub(crate) fn topics_to_text(topics: &[Topic]) -> String {
    topics
        .iter()
        .map(Topic::as_str)
        .collect::<Vec<_>>()
        .join(",")
}

pub(crate) fn topics_from_text(s: &str) -> Vec<Topic> {
    s.split(',')
        .filter(|part| !part.trim().is_empty())
        .map(Topic::new)
        .collect()
}

pub(crate) fn map_user_row(row: &SqliteRow) -> Result<UserProfile, StorageError> {
    let active_quiz = row
        .try_get::<Option<String>, _>("active_quiz")
        .map_err(ser)?
        .map(|s| session_id_from_str(&s))
        .transpose()?;
    let active_lesson = row
        .try_get::<Option<String>, _>("active_lesson")
        .map_err(ser)?
        .map(|s| lesson_id_from_str(&s))
        .transpose()?;

    UserProfile::from_persisted(
        UserId::new(row.try_get::<i64, _>("user_id").map_err(ser)?),
        row.try_get("full_name").map_err(ser)?,
        row.try_get("email").map_err(ser)?,
        parse_language(&row.try_get::<String, _>("language").map_err(ser)?)?,
        parse_level(&row.try_get::<String, _>("level").map_err(ser)?)?,
        row.try_get("target_score").map_err(ser)?,
        parse_status(&row.try_get::<String, _>("learning_status").map_err(ser)?)?,
        day_from_i64(row.try_get::<i64, _>("current_day").map_err(ser)?)?,
        parse_mode(&row.try_get::<String, _>("mode").map_err(ser)?)?,
        active_quiz,
        active_lesson,
        row.try_get("test_score").map_err(ser)?,
        topics_from_text(&row.try_get::<String, _>("strong_topics").map_err(ser)?),
        topics_from_text(&row.try_get::<String, _>("weak_topics").map_err(ser)?),
        day_from_i64(row.try_get::<i64, _>("lessons_completed").map_err(ser)?)?,
        row.try_get("created_at").map_err(ser)?,
        row.try_get("last_active").map_err(ser)?,
    )
    .map_err(ser)
}

pub(crate) fn map_quiz_session_row(row: &SqliteRow) -> Result<QuizSessionMeta, StorageError> {
    let lesson_day = row
        .try_get::<Option<i64>, _>("lesson_day")
        .map_err(ser)?
        .map(day_from_i64)
        .transpose()?;
    Ok(QuizSessionMeta {
        session: session_id_from_str(&row.try_get::<String, _>("id").map_err(ser)?)?,
        user: UserId::new(row.try_get::<i64, _>("user_id").map_err(ser)?),
        lesson_day,
        extra_practice: row.try_get::<i64, _>("extra_practice").map_err(ser)? != 0,
        created_at: row.try_get("created_at").map_err(ser)?,
        completed_at: row.try_get("completed_at").map_err(ser)?,
        total_score: row.try_get("total_score").map_err(ser)?,
    })
}

pub(crate) fn map_quiz_record_row(row: &SqliteRow) -> Result<QuizRecord, StorageError> {
    let question = Question::new(
        row.try_get::<String, _>("question").map_err(ser)?,
        [
            row.try_get::<String, _>("option_a").map_err(ser)?,
            row.try_get::<String, _>("option_b").map_err(ser)?,
            row.try_get::<String, _>("option_c").map_err(ser)?,
            row.try_get::<String, _>("option_d").map_err(ser)?,
        ],
        parse_answer(&row.try_get::<String, _>("correct").map_err(ser)?)?,
        Topic::new(row.try_get::<String, _>("topic").map_err(ser)?),
        row.try_get("rationale").map_err(ser)?,
    )
    .map_err(ser)?;

    let lesson_day = row
        .try_get::<Option<i64>, _>("lesson_day")
        .map_err(ser)?
        .map(day_from_i64)
        .transpose()?;
    let answer = row
        .try_get::<Option<String>, _>("answer")
        .map_err(ser)?
        .map(|s| parse_answer(&s))
        .transpose()?;
    let is_correct = row
        .try_get::<Option<i64>, _>("is_correct")
        .map_err(ser)?
        .map(|v| v != 0);

    QuizRecord::from_persisted(
        session_id_from_str(&row.try_get::<String, _>("session_id").map_err(ser)?)?,
        UserId::new(row.try_get::<i64, _>("user_id").map_err(ser)?),
        day_from_i64(row.try_get::<i64, _>("ordinal").map_err(ser)?)?,
        question,
        lesson_day,
        row.try_get("asked_at").map_err(ser)?,
        row.try_get("answered_at").map_err(ser)?,
        answer,
        is_correct,
    )
    .map_err(ser)
}

const TASK_COLUMNS: [(&str, &str); 5] = [
    ("task_1", "answer_1"),
    ("task_2", "answer_2"),
    ("task_3", "answer_3"),
    ("task_4", "answer_4"),
    ("task_5", "answer_5"),
];

pub(crate) fn map_lesson_row(row: &SqliteRow) -> Result<LessonRecord, StorageError> {
    let mut tasks = Vec::new();
    for (task_col, answer_col) in TASK_COLUMNS {
        let Some(prompt) = row.try_get::<Option<String>, _>(task_col).map_err(ser)? else {
            break;
        };
        let answer = row
            .try_get::<Option<String>, _>(answer_col)
            .map_err(ser)?
            .map(|s| parse_answer(&s))
            .transpose()?;
        tasks.push(LessonTask { prompt, answer });
    }

    let score = row
        .try_get::<Option<i64>, _>("score")
        .map_err(ser)?
        .map(day_from_i64)
        .transpose()?;

    LessonRecord::from_persisted(
        lesson_id_from_str(&row.try_get::<String, _>("id").map_err(ser)?)?,
        UserId::new(row.try_get::<i64, _>("user_id").map_err(ser)?),
        day_from_i64(row.try_get::<i64, _>("day").map_err(ser)?)?,
        Topic::new(row.try_get::<String, _>("topic").map_err(ser)?),
        row.try_get("theory").map_err(ser)?,
        session_id_from_str(&row.try_get::<String, _>("practice_quiz").map_err(ser)?)?,
        tasks,
        parse_lesson_status(&row.try_get::<String, _>("status").map_err(ser)?)?,
        day_from_i64(row.try_get::<i64, _>("expected_task").map_err(ser)?)?,
        row.try_get("started_at").map_err(ser)?,
        row.try_get("completed_at").map_err(ser)?,
        score,
    )
    .map_err(ser)
}
