use tutor_core::model::{UserId, UserProfile};

use super::{SqliteStore, mapping};
use crate::repository::{StorageError, UserRepository};

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_unique_violation())
}

const USER_COLUMNS: &str = r"
    user_id, full_name, email, language, level, target_score, learning_status,
    current_day, mode, active_quiz, active_lesson, test_score, strong_topics,
    weak_topics, lessons_completed, created_at, last_active
";

#[async_trait::async_trait]
impl UserRepository for SqliteStore {
    async fn create_user(&self, profile: &UserProfile) -> Result<(), StorageError> {
        let sql = format!(
            r"
            INSERT INTO users ({USER_COLUMNS})
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)
            "
        );
        sqlx::query(&sql)
            .bind(profile.id().value())
            .bind(profile.full_name())
            .bind(profile.email())
            .bind(profile.language().as_str())
            .bind(profile.level().as_str())
            .bind(profile.target_score())
            .bind(profile.learning_status().as_str())
            .bind(i64::from(profile.current_day()))
            .bind(profile.mode().as_str())
            .bind(profile.active_quiz().map(|id| id.to_string()))
            .bind(profile.active_lesson().map(|id| id.to_string()))
            .bind(profile.test_score())
            .bind(mapping::topics_to_text(profile.strong_topics()))
            .bind(mapping::topics_to_text(profile.weak_topics()))
            .bind(i64::from(profile.lessons_completed()))
            .bind(profile.created_at())
            .bind(profile.last_active())
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    StorageError::Conflict
                } else {
                    StorageError::Connection(e.to_string())
                }
            })?;
        Ok(())
    }

    async fn get_user(&self, id: UserId) -> Result<Option<UserProfile>, StorageError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE user_id = ?1");
        let row = sqlx::query(&sql)
            .bind(id.value())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        row.as_ref().map(mapping::map_user_row).transpose()
    }

    async fn update_user(&self, profile: &UserProfile) -> Result<(), StorageError> {
        let result = sqlx::query(
            r"
            UPDATE users SET
                full_name = ?2,
                email = ?3,
                language = ?4,
                level = ?5,
                target_score = ?6,
                learning_status = ?7,
                current_day = ?8,
                mode = ?9,
                active_quiz = ?10,
                active_lesson = ?11,
                test_score = ?12,
                strong_topics = ?13,
                weak_topics = ?14,
                lessons_completed = ?15,
                last_active = ?16
            WHERE user_id = ?1
            ",
        )
        .bind(profile.id().value())
        .bind(profile.full_name())
        .bind(profile.email())
        .bind(profile.language().as_str())
        .bind(profile.level().as_str())
        .bind(profile.target_score())
        .bind(profile.learning_status().as_str())
        .bind(i64::from(profile.current_day()))
        .bind(profile.mode().as_str())
        .bind(profile.active_quiz().map(|id| id.to_string()))
        .bind(profile.active_lesson().map(|id| id.to_string()))
        .bind(profile.test_score())
        .bind(mapping::topics_to_text(profile.strong_topics()))
        .bind(mapping::topics_to_text(profile.weak_topics()))
        .bind(i64::from(profile.lessons_completed()))
        .bind(profile.last_active())
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }
}
