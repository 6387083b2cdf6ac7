use lms_core::model::{CourseId, Rating};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{conn, id_i64, map_rating_row, ser};
use crate::repository::{RatingRepository, StorageError};

#[async_trait::async_trait]
impl RatingRepository for SqliteRepository {
    async fn upsert_rating(&self, rating: &Rating) -> Result<bool, StorageError> {
        let user_id = id_i64("user_id", rating.user_id().value())?;
        let course_id = id_i64("course_id", rating.course_id().value())?;
        let mut tx = self.pool.begin().await.map_err(conn)?;

        let existing = sqlx::query("SELECT 1 FROM ratings WHERE user_id = ?1 AND course_id = ?2")
            .bind(user_id)
            .bind(course_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(conn)?;

        sqlx::query(
            r"
            INSERT INTO ratings (user_id, course_id, stars, feedback, rated_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(user_id, course_id) DO UPDATE SET
                stars = excluded.stars,
                feedback = excluded.feedback,
                rated_at = excluded.rated_at
            ",
        )
        .bind(user_id)
        .bind(course_id)
        .bind(i64::from(rating.stars()))
        .bind(rating.feedback().map(ToOwned::to_owned))
        .bind(rating.rated_at())
        .execute(&mut *tx)
        .await
        .map_err(conn)?;

        tx.commit().await.map_err(conn)?;
        Ok(existing.is_some())
    }

    async fn list_ratings(
        &self,
        course_id: CourseId,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Rating>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT user_id, course_id, stars, feedback, rated_at
            FROM ratings
            WHERE course_id = ?1
            ORDER BY rated_at DESC, user_id ASC
            LIMIT ?2 OFFSET ?3
            ",
        )
        .bind(id_i64("course_id", course_id.value())?)
        .bind(i64::from(limit))
        .bind(i64::from(offset))
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(map_rating_row).collect()
    }

    async fn rating_stars(&self, course_id: CourseId) -> Result<Vec<u8>, StorageError> {
        let rows = sqlx::query("SELECT stars FROM ratings WHERE course_id = ?1")
            .bind(id_i64("course_id", course_id.value())?)
            .fetch_all(&self.pool)
            .await
            .map_err(conn)?;

        rows.iter()
            .map(|row| {
                let stars: i64 = row.try_get("stars").map_err(ser)?;
                u8::try_from(stars).map_err(ser)
            })
            .collect()
    }
}
