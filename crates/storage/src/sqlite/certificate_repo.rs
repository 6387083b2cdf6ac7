use lms_core::model::{Certificate, CertificateId, CourseId, NewCertificate, UserId};

use super::SqliteRepository;
use super::mapping::{conn, id_i64, map_certificate_row};
use crate::repository::{CertificateRepository, Inserted, StorageError};

#[async_trait::async_trait]
impl CertificateRepository for SqliteRepository {
    async fn insert_certificate(
        &self,
        draft: NewCertificate,
    ) -> Result<Inserted<Certificate>, StorageError> {
        // The unique (user_id, course_id) index makes concurrent issues collapse
        // onto one row.
        let res = sqlx::query(
            r"
            INSERT INTO certificates (user_id, course_id, code, issued_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(user_id, course_id) DO NOTHING
            ",
        )
        .bind(id_i64("user_id", draft.user_id.value())?)
        .bind(id_i64("course_id", draft.course_id.value())?)
        .bind(draft.code.to_string())
        .bind(draft.issued_at)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        let value = self
            .certificate_for_course(draft.user_id, draft.course_id)
            .await?
            .ok_or(StorageError::NotFound)?;
        Ok(Inserted {
            value,
            created: res.rows_affected() == 1,
        })
    }

    async fn get_certificate(&self, id: CertificateId) -> Result<Option<Certificate>, StorageError> {
        let row = sqlx::query(
            "SELECT id, user_id, course_id, code, issued_at FROM certificates WHERE id = ?1",
        )
        .bind(id_i64("certificate_id", id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        row.as_ref().map(map_certificate_row).transpose()
    }

    async fn certificate_for_course(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<Option<Certificate>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT id, user_id, course_id, code, issued_at
            FROM certificates
            WHERE user_id = ?1 AND course_id = ?2
            ",
        )
        .bind(id_i64("user_id", user_id.value())?)
        .bind(id_i64("course_id", course_id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        row.as_ref().map(map_certificate_row).transpose()
    }

    async fn certificates_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<Certificate>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, user_id, course_id, code, issued_at
            FROM certificates
            WHERE user_id = ?1
            ORDER BY issued_at DESC, id DESC
            ",
        )
        .bind(id_i64("user_id", user_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(map_certificate_row).collect()
    }
}
