use tutor_core::model::{AnswerOption, LESSON_TASK_LIMIT, LessonId, LessonRecord, LessonTask};

use super::{SqliteStore, mapping};
use crate::repository::{LessonRepository, StorageError};

const LESSON_COLUMNS: &str = r"
    id, user_id, day, topic, theory, practice_quiz,
    task_1, task_2, task_3, task_4, task_5,
    answer_1, answer_2, answer_3, answer_4, answer_5,
    status, expected_task, started_at, completed_at, score
";

/// Spread the variable-length task list over the fixed task columns.
fn task_slots(lesson: &LessonRecord) -> [Option<&LessonTask>; LESSON_TASK_LIMIT] {
    let mut slots = [None; LESSON_TASK_LIMIT];
    for (slot, task) in slots.iter_mut().zip(lesson.tasks()) {
        *slot = Some(task);
    }
    slots
}

#[async_trait::async_trait]
impl LessonRepository for SqliteStore {
    async fn create_lesson_record(&self, lesson: &LessonRecord) -> Result<(), StorageError> {
        let slots = task_slots(lesson);
        let sql = format!(
            r"
            INSERT INTO lesson_records ({LESSON_COLUMNS})
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16,
                    ?17, ?18, ?19, ?20, ?21)
            ON CONFLICT(id) DO NOTHING
            "
        );
        let mut query = sqlx::query(&sql)
            .bind(lesson.id().to_string())
            .bind(lesson.user().value())
            .bind(i64::from(lesson.day()))
            .bind(lesson.topic().as_str())
            .bind(lesson.theory())
            .bind(lesson.practice_quiz().to_string());
        for slot in slots {
            query = query.bind(slot.map(|t| t.prompt.clone()));
        }
        for slot in slots {
            query = query.bind(slot.and_then(|t| t.answer).map(AnswerOption::as_str));
        }
        let inserted = query
            .bind(lesson.status().as_str())
            .bind(i64::from(lesson.expected_task()))
            .bind(lesson.started_at())
            .bind(lesson.completed_at())
            .bind(lesson.score().map(i64::from))
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        if inserted.rows_affected() == 0 {
            return Err(StorageError::Conflict);
        }
        Ok(())
    }

    async fn get_lesson_record(
        &self,
        id: LessonId,
    ) -> Result<Option<LessonRecord>, StorageError> {
        let sql = format!("SELECT {LESSON_COLUMNS} FROM lesson_records WHERE id = ?1");
        let row = sqlx::query(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        row.as_ref().map(mapping::map_lesson_row).transpose()
    }

    async fn update_lesson_record(&self, lesson: &LessonRecord) -> Result<(), StorageError> {
        let slots = task_slots(lesson);
        let mut query = sqlx::query(
            r"
            UPDATE lesson_records SET
                topic = ?2,
                theory = ?3,
                task_1 = ?4, task_2 = ?5, task_3 = ?6, task_4 = ?7, task_5 = ?8,
                answer_1 = ?9, answer_2 = ?10, answer_3 = ?11, answer_4 = ?12, answer_5 = ?13,
                status = ?14,
                expected_task = ?15,
                completed_at = ?16,
                score = ?17
            WHERE id = ?1
            ",
        )
        .bind(lesson.id().to_string())
        .bind(lesson.topic().as_str())
        .bind(lesson.theory());
        for slot in slots {
            query = query.bind(slot.map(|t| t.prompt.clone()));
        }
        for slot in slots {
            query = query.bind(slot.and_then(|t| t.answer).map(AnswerOption::as_str));
        }
        let result = query
            .bind(lesson.status().as_str())
            .bind(i64::from(lesson.expected_task()))
            .bind(lesson.completed_at())
            .bind(lesson.score().map(i64::from))
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }
}
