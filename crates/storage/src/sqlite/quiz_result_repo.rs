use lms_core::model::{LessonId, UserId};
use lms_core::quiz::QuizAttempt;

use super::SqliteRepository;
use super::mapping::{conn, id_i64, map_quiz_result_row, ser};
use crate::repository::{QuizResultRepository, StorageError};

#[async_trait::async_trait]
impl QuizResultRepository for SqliteRepository {
    async fn append_attempt(&self, attempt: &QuizAttempt) -> Result<(), StorageError> {
        let answers = serde_json::to_string(&attempt.answers).map_err(ser)?;

        sqlx::query(
            r"
                INSERT INTO quiz_results (
                    user_id, lesson_id, answers_json, score, passed,
                    total_questions, correct_answers, time_taken_secs, submitted_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ",
        )
        .bind(id_i64("user_id", attempt.user_id.value())?)
        .bind(id_i64("lesson_id", attempt.lesson_id.value())?)
        .bind(answers)
        .bind(i64::from(attempt.score))
        .bind(i64::from(attempt.passed))
        .bind(i64::try_from(attempt.total_questions).map_err(ser)?)
        .bind(i64::try_from(attempt.correct_answers).map_err(ser)?)
        .bind(i64::from(attempt.time_taken_secs))
        .bind(attempt.submitted_at)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(())
    }

    async fn attempts_for_lesson(
        &self,
        user_id: UserId,
        lesson_id: LessonId,
    ) -> Result<Vec<QuizAttempt>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT
                    user_id, lesson_id, answers_json, score, passed,
                    total_questions, correct_answers, time_taken_secs, submitted_at
                FROM quiz_results
                WHERE user_id = ?1 AND lesson_id = ?2
                ORDER BY submitted_at DESC, id DESC
            ",
        )
        .bind(id_i64("user_id", user_id.value())?)
        .bind(id_i64("lesson_id", lesson_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(map_quiz_result_row).collect()
    }
}
