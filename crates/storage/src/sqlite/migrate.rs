use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

const SCHEMA_V1: &[&str] = &[
    r"
        CREATE TABLE IF NOT EXISTS courses (
            id INTEGER PRIMARY KEY,
            title TEXT NOT NULL,
            description TEXT NOT NULL,
            instructor_id INTEGER NOT NULL,
            category TEXT NOT NULL,
            level TEXT NOT NULL,
            price_cents INTEGER NOT NULL CHECK (price_cents >= 0),
            published INTEGER NOT NULL CHECK (published IN (0, 1)),
            created_at TEXT NOT NULL
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS lessons (
            id INTEGER PRIMARY KEY,
            course_id INTEGER NOT NULL,
            title TEXT NOT NULL,
            position INTEGER NOT NULL CHECK (position >= 0),
            duration_minutes INTEGER NOT NULL CHECK (duration_minutes > 0),
            preview INTEGER NOT NULL CHECK (preview IN (0, 1)),
            kind TEXT NOT NULL,
            content_json TEXT NOT NULL,
            FOREIGN KEY (course_id) REFERENCES courses(id) ON DELETE CASCADE
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS enrollments (
            user_id INTEGER NOT NULL,
            course_id INTEGER NOT NULL,
            enrolled_at TEXT NOT NULL,
            payment_status TEXT NOT NULL,
            PRIMARY KEY (user_id, course_id),
            FOREIGN KEY (course_id) REFERENCES courses(id) ON DELETE CASCADE
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS course_progress (
            user_id INTEGER NOT NULL,
            course_id INTEGER NOT NULL,
            percent INTEGER NOT NULL CHECK (percent BETWEEN 0 AND 100),
            status TEXT NOT NULL,
            started_at TEXT NOT NULL,
            completed_at TEXT,
            last_accessed_at TEXT NOT NULL,
            last_accessed_lesson INTEGER,
            total_time_spent_secs INTEGER NOT NULL CHECK (total_time_spent_secs >= 0),
            PRIMARY KEY (user_id, course_id)
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS lesson_progress (
            user_id INTEGER NOT NULL,
            course_id INTEGER NOT NULL,
            lesson_id INTEGER NOT NULL,
            completed INTEGER NOT NULL CHECK (completed IN (0, 1)),
            completed_at TEXT,
            last_accessed_at TEXT NOT NULL,
            video_timestamp REAL NOT NULL CHECK (video_timestamp >= 0),
            quiz_score INTEGER CHECK (quiz_score BETWEEN 0 AND 100),
            quiz_attempts INTEGER NOT NULL CHECK (quiz_attempts >= 0),
            seq INTEGER NOT NULL,
            PRIMARY KEY (user_id, course_id, lesson_id),
            FOREIGN KEY (user_id, course_id)
                REFERENCES course_progress(user_id, course_id) ON DELETE CASCADE
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS quiz_results (
            id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL,
            lesson_id INTEGER NOT NULL,
            answers_json TEXT NOT NULL,
            score INTEGER NOT NULL CHECK (score BETWEEN 0 AND 100),
            passed INTEGER NOT NULL CHECK (passed IN (0, 1)),
            total_questions INTEGER NOT NULL CHECK (total_questions >= 0),
            correct_answers INTEGER NOT NULL CHECK (correct_answers >= 0),
            time_taken_secs INTEGER NOT NULL CHECK (time_taken_secs >= 0),
            submitted_at TEXT NOT NULL
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS certificates (
            id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL,
            course_id INTEGER NOT NULL,
            code TEXT NOT NULL UNIQUE,
            issued_at TEXT NOT NULL,
            UNIQUE (user_id, course_id)
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS ratings (
            user_id INTEGER NOT NULL,
            course_id INTEGER NOT NULL,
            stars INTEGER NOT NULL CHECK (stars BETWEEN 1 AND 5),
            feedback TEXT,
            rated_at TEXT NOT NULL,
            PRIMARY KEY (user_id, course_id),
            FOREIGN KEY (course_id) REFERENCES courses(id) ON DELETE CASCADE
        );
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_lessons_course_position
            ON lessons (course_id, position, id);
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_course_progress_user_accessed
            ON course_progress (user_id, last_accessed_at);
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_quiz_results_user_lesson
            ON quiz_results (user_id, lesson_id, submitted_at);
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_ratings_course_rated
            ON ratings (course_id, rated_at);
    ",
];

/// Runs versioned migrations, each inside its own transaction.
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

    // Version 1: catalog, learner progress, quizzes, certificates, ratings.
    if !is_applied(pool, 1).await? {
        let mut tx = pool.begin().await?;

        for statement in SCHEMA_V1 {
            sqlx::query(*statement).execute(&mut *tx).await?;
        }

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
