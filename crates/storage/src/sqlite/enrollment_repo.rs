use lms_core::model::{CourseId, Enrollment, UserId};

use super::SqliteRepository;
use super::mapping::{conn, id_i64, map_enrollment_row};
use crate::repository::{EnrollmentRepository, Inserted, StorageError};

#[async_trait::async_trait]
impl EnrollmentRepository for SqliteRepository {
    async fn insert_enrollment(
        &self,
        enrollment: &Enrollment,
    ) -> Result<Inserted<Enrollment>, StorageError> {
        let res = sqlx::query(
            r"
            INSERT INTO enrollments (user_id, course_id, enrolled_at, payment_status)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(user_id, course_id) DO NOTHING
            ",
        )
        .bind(id_i64("user_id", enrollment.user_id.value())?)
        .bind(id_i64("course_id", enrollment.course_id.value())?)
        .bind(enrollment.enrolled_at)
        .bind(enrollment.payment_status.as_str())
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        let value = self
            .get_enrollment(enrollment.user_id, enrollment.course_id)
            .await?
            .ok_or(StorageError::NotFound)?;
        Ok(Inserted {
            value,
            created: res.rows_affected() == 1,
        })
    }

    async fn get_enrollment(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<Option<Enrollment>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT user_id, course_id, enrolled_at, payment_status
            FROM enrollments
            WHERE user_id = ?1 AND course_id = ?2
            ",
        )
        .bind(id_i64("user_id", user_id.value())?)
        .bind(id_i64("course_id", course_id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        row.as_ref().map(map_enrollment_row).transpose()
    }

    async fn enrollments_for_course(
        &self,
        course_id: CourseId,
    ) -> Result<Vec<Enrollment>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT user_id, course_id, enrolled_at, payment_status
            FROM enrollments
            WHERE course_id = ?1
            ORDER BY enrolled_at ASC, user_id ASC
            ",
        )
        .bind(id_i64("course_id", course_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(map_enrollment_row).collect()
    }
}
