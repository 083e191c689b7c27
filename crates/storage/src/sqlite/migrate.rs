use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

/// Runs a single, consolidated migration for the current schema.
///
/// Creates users, quiz sessions with their per-question records, lesson
/// records, and the supporting indexes.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
            .bind(version)
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );
            ",
    )
    .execute(pool)
    .await?;

    // Version 1: full schema.
    if !is_applied(pool, 1).await? {
        let mut tx = pool.begin().await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS users (
                    user_id INTEGER PRIMARY KEY,
                    full_name TEXT NOT NULL,
                    email TEXT,
                    language TEXT NOT NULL,
                    level TEXT NOT NULL,
                    target_score TEXT,
                    learning_status TEXT NOT NULL,
                    current_day INTEGER NOT NULL CHECK (current_day >= 1),
                    mode TEXT NOT NULL,
                    active_quiz TEXT,
                    active_lesson TEXT,
                    test_score REAL,
                    strong_topics TEXT NOT NULL,
                    weak_topics TEXT NOT NULL,
                    lessons_completed INTEGER NOT NULL CHECK (lessons_completed >= 0),
                    created_at TEXT NOT NULL,
                    last_active TEXT NOT NULL
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS quiz_sessions (
                    id TEXT PRIMARY KEY,
                    user_id INTEGER NOT NULL,
                    lesson_day INTEGER CHECK (lesson_day IS NULL OR lesson_day >= 1),
                    extra_practice INTEGER NOT NULL DEFAULT 0,
                    created_at TEXT NOT NULL,
                    completed_at TEXT,
                    total_score REAL
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS quiz_records (
                    session_id TEXT NOT NULL,
                    ordinal INTEGER NOT NULL CHECK (ordinal >= 1),
                    user_id INTEGER NOT NULL,
                    question TEXT NOT NULL,
                    option_a TEXT NOT NULL,
                    option_b TEXT NOT NULL,
                    option_c TEXT NOT NULL,
                    option_d TEXT NOT NULL,
                    correct TEXT NOT NULL,
                    topic TEXT NOT NULL,
                    rationale TEXT,
                    lesson_day INTEGER,
                    asked_at TEXT NOT NULL,
                    answered_at TEXT,
                    answer TEXT,
                    is_correct INTEGER,
                    PRIMARY KEY (session_id, ordinal),
                    FOREIGN KEY (session_id) REFERENCES quiz_sessions(id) ON DELETE CASCADE
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS lesson_records (
                    id TEXT PRIMARY KEY,
                    user_id INTEGER NOT NULL,
                    day INTEGER NOT NULL CHECK (day >= 1),
                    topic TEXT NOT NULL,
                    theory TEXT NOT NULL,
                    practice_quiz TEXT NOT NULL,
                    task_1 TEXT,
                    task_2 TEXT,
                    task_3 TEXT,
                    task_4 TEXT,
                    task_5 TEXT,
                    answer_1 TEXT,
                    answer_2 TEXT,
                    answer_3 TEXT,
                    answer_4 TEXT,
                    answer_5 TEXT,
                    status TEXT NOT NULL,
                    expected_task INTEGER NOT NULL CHECK (expected_task >= 1),
                    started_at TEXT NOT NULL,
                    completed_at TEXT,
                    score INTEGER
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_quiz_sessions_user
                    ON quiz_sessions (user_id, created_at);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_quiz_records_user
                    ON quiz_records (user_id, lesson_day);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_lesson_records_user_day
                    ON lesson_records (user_id, day);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                INSERT INTO schema_migrations (version, applied_at)
                VALUES (?1, ?2)
                ON CONFLICT(version) DO NOTHING
            ",
        )
        .bind(1_i64)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
    }

    Ok(())
}
