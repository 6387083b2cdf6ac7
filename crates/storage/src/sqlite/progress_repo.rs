use lms_core::model::{CourseId, EnrollmentProgress, UserId};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use super::SqliteRepository;
use super::mapping::{
    conn, course_id_from_i64, id_i64, lesson_id_from_i64, map_lesson_progress_row,
    parse_progress_status, ser, user_id_from_i64,
};
use crate::repository::{ProgressRepository, StorageError};

impl SqliteRepository {
    async fn load_progress(&self, row: &SqliteRow) -> Result<EnrollmentProgress, StorageError> {
        let user_id: i64 = row.try_get("user_id").map_err(ser)?;
        let course_id: i64 = row.try_get("course_id").map_err(ser)?;

        let lesson_rows = sqlx::query(
            r"
            SELECT lesson_id, completed, completed_at, last_accessed_at,
                   video_timestamp, quiz_score, quiz_attempts
            FROM lesson_progress
            WHERE user_id = ?1 AND course_id = ?2
            ORDER BY seq ASC
            ",
        )
        .bind(user_id)
        .bind(course_id)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;
        let lessons = lesson_rows
            .iter()
            .map(map_lesson_progress_row)
            .collect::<Result<Vec<_>, _>>()?;

        let status: String = row.try_get("status").map_err(ser)?;
        let percent: i64 = row.try_get("percent").map_err(ser)?;
        let total_time: i64 = row.try_get("total_time_spent_secs").map_err(ser)?;

        Ok(EnrollmentProgress::from_persisted(
            user_id_from_i64(user_id)?,
            course_id_from_i64(course_id)?,
            u8::try_from(percent).map_err(ser)?,
            parse_progress_status(&status)?,
            row.try_get("started_at").map_err(ser)?,
            row.try_get("completed_at").map_err(ser)?,
            row.try_get("last_accessed_at").map_err(ser)?,
            row.try_get::<Option<i64>, _>("last_accessed_lesson")
                .map_err(ser)?
                .map(lesson_id_from_i64)
                .transpose()?,
            lessons,
            u64::try_from(total_time).map_err(ser)?,
        ))
    }
}

#[async_trait::async_trait]
impl ProgressRepository for SqliteRepository {
    async fn get_progress(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<Option<EnrollmentProgress>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT user_id, course_id, percent, status, started_at, completed_at,
                   last_accessed_at, last_accessed_lesson, total_time_spent_secs
            FROM course_progress
            WHERE user_id = ?1 AND course_id = ?2
            ",
        )
        .bind(id_i64("user_id", user_id.value())?)
        .bind(id_i64("course_id", course_id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        match row {
            Some(row) => self.load_progress(&row).await.map(Some),
            None => Ok(None),
        }
    }

    async fn upsert_progress(&self, progress: &EnrollmentProgress) -> Result<(), StorageError> {
        let user_id = id_i64("user_id", progress.user_id.value())?;
        let course_id = id_i64("course_id", progress.course_id.value())?;
        let last_lesson = progress
            .last_accessed_lesson
            .map(|l| id_i64("lesson_id", l.value()))
            .transpose()?;
        let total_time = i64::try_from(progress.total_time_spent_secs).map_err(ser)?;

        let mut tx = self.pool.begin().await.map_err(conn)?;

        sqlx::query(
            r"
            INSERT INTO course_progress (
                user_id, course_id, percent, status, started_at, completed_at,
                last_accessed_at, last_accessed_lesson, total_time_spent_secs
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT(user_id, course_id) DO UPDATE SET
                -- started_at is fixed by the first insert
                percent = excluded.percent,
                status = excluded.status,
                completed_at = excluded.completed_at,
                last_accessed_at = excluded.last_accessed_at,
                last_accessed_lesson = excluded.last_accessed_lesson,
                total_time_spent_secs = excluded.total_time_spent_secs
            ",
        )
        .bind(user_id)
        .bind(course_id)
        .bind(i64::from(progress.percent()))
        .bind(progress.status().as_str())
        .bind(progress.started_at)
        .bind(progress.completed_at())
        .bind(progress.last_accessed_at)
        .bind(last_lesson)
        .bind(total_time)
        .execute(&mut *tx)
        .await
        .map_err(conn)?;

        sqlx::query("DELETE FROM lesson_progress WHERE user_id = ?1 AND course_id = ?2")
            .bind(user_id)
            .bind(course_id)
            .execute(&mut *tx)
            .await
            .map_err(conn)?;

        for (seq, lesson) in progress.lessons().iter().enumerate() {
            sqlx::query(
                r"
                INSERT INTO lesson_progress (
                    user_id, course_id, lesson_id, completed, completed_at,
                    last_accessed_at, video_timestamp, quiz_score, quiz_attempts, seq
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                ",
            )
            .bind(user_id)
            .bind(course_id)
            .bind(id_i64("lesson_id", lesson.lesson_id.value())?)
            .bind(i64::from(lesson.completed))
            .bind(lesson.completed_at)
            .bind(lesson.last_accessed_at)
            .bind(lesson.video_timestamp)
            .bind(lesson.quiz_score.map(i64::from))
            .bind(i64::from(lesson.quiz_attempts))
            .bind(i64::try_from(seq).map_err(ser)?)
            .execute(&mut *tx)
            .await
            .map_err(conn)?;
        }

        tx.commit().await.map_err(conn)?;
        Ok(())
    }

    async fn progress_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<EnrollmentProgress>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT user_id, course_id, percent, status, started_at, completed_at,
                   last_accessed_at, last_accessed_lesson, total_time_spent_secs
            FROM course_progress
            WHERE user_id = ?1
            ORDER BY last_accessed_at DESC, course_id ASC
            ",
        )
        .bind(id_i64("user_id", user_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in &rows {
            out.push(self.load_progress(row).await?);
        }
        Ok(out)
    }

    async fn progress_for_course(
        &self,
        course_id: CourseId,
    ) -> Result<Vec<EnrollmentProgress>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT user_id, course_id, percent, status, started_at, completed_at,
                   last_accessed_at, last_accessed_lesson, total_time_spent_secs
            FROM course_progress
            WHERE course_id = ?1
            ORDER BY last_accessed_at DESC, user_id ASC
            ",
        )
        .bind(id_i64("course_id", course_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in &rows {
            out.push(self.load_progress(row).await?);
        }
        Ok(out)
    }
}
