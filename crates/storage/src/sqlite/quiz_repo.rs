use chrono::{DateTime, Utc};

use tutor_core::model::{AnswerOption, QuizRecord, SessionId};

use super::{SqliteStore, mapping};
use crate::repository::{QuizRepository, QuizSessionMeta, StorageError};

const RECORD_COLUMNS: &str = r"
    session_id, ordinal, user_id, question, option_a, option_b, option_c,
    option_d, correct, topic, rationale, lesson_day, asked_at, answered_at,
    answer, is_correct
";

#[async_trait::async_trait]
impl QuizRepository for SqliteStore {
    async fn create_quiz_session(
        &self,
        meta: &QuizSessionMeta,
        records: &[QuizRecord],
    ) -> Result<(), StorageError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        let inserted = sqlx::query(
            r"
            INSERT INTO quiz_sessions
                (id, user_id, lesson_day, extra_practice, created_at, completed_at, total_score)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(id) DO NOTHING
            ",
        )
        .bind(meta.session.to_string())
        .bind(meta.user.value())
        .bind(meta.lesson_day.map(i64::from))
        .bind(i64::from(meta.extra_practice))
        .bind(meta.created_at)
        .bind(meta.completed_at)
        .bind(meta.total_score)
        .execute(&mut *tx)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        if inserted.rows_affected() == 0 {
            return Err(StorageError::Conflict);
        }

        for record in records {
            let sql = format!(
                r"
                INSERT INTO quiz_records ({RECORD_COLUMNS})
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
                "
            );
            sqlx::query(&sql)
                .bind(record.session().to_string())
                .bind(i64::from(record.ordinal()))
                .bind(record.user().value())
                .bind(record.question().text())
                .bind(record.question().option(AnswerOption::A))
                .bind(record.question().option(AnswerOption::B))
                .bind(record.question().option(AnswerOption::C))
                .bind(record.question().option(AnswerOption::D))
                .bind(record.question().correct().as_str())
                .bind(record.question().topic().as_str())
                .bind(record.question().rationale())
                .bind(record.lesson_day().map(i64::from))
                .bind(record.asked_at())
                .bind(record.answered_at())
                .bind(record.answer().map(AnswerOption::as_str))
                .bind(record.is_correct().map(i64::from))
                .execute(&mut *tx)
                .await
                .map_err(|e| StorageError::Connection(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(())
    }

    async fn quiz_session(
        &self,
        session: SessionId,
    ) -> Result<Option<QuizSessionMeta>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT id, user_id, lesson_day, extra_practice, created_at, completed_at, total_score
            FROM quiz_sessions
            WHERE id = ?1
            ",
        )
        .bind(session.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;
        row.as_ref().map(mapping::map_quiz_session_row).transpose()
    }

    async fn quiz_records(&self, session: SessionId) -> Result<Vec<QuizRecord>, StorageError> {
        let sql = format!(
            r"
            SELECT {RECORD_COLUMNS}
            FROM quiz_records
            WHERE session_id = ?1
            ORDER BY ordinal ASC
            "
        );
        let rows = sqlx::query(&sql)
            .bind(session.to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            records.push(mapping::map_quiz_record_row(&row)?);
        }
        Ok(records)
    }

    async fn update_quiz_answer(
        &self,
        session: SessionId,
        ordinal: u32,
        answer: AnswerOption,
        is_correct: bool,
        answered_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let result = sqlx::query(
            r"
            UPDATE quiz_records SET
                answer = ?3,
                is_correct = ?4,
                answered_at = ?5
            WHERE session_id = ?1 AND ordinal = ?2
            ",
        )
        .bind(session.to_string())
        .bind(i64::from(ordinal))
        .bind(answer.as_str())
        .bind(i64::from(is_correct))
        .bind(answered_at)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn complete_quiz_session(
        &self,
        session: SessionId,
        total_score: f64,
        completed_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let result = sqlx::query(
            r"
            UPDATE quiz_sessions SET
                completed_at = ?2,
                total_score = ?3
            WHERE id = ?1
            ",
        )
        .bind(session.to_string())
        .bind(completed_at)
        .bind(total_score)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }
}
