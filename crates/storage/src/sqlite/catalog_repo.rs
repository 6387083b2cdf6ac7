use lms_core::model::{Course, CourseId, Lesson, LessonId, NewCourse, NewLesson};

use super::SqliteRepository;
use super::mapping::{
    conn, course_id_from_i64, id_i64, lesson_id_from_i64, map_course_row, map_lesson_row, ser,
};
use crate::repository::{CourseRepository, LessonRepository, StorageError};

#[async_trait::async_trait]
impl CourseRepository for SqliteRepository {
    async fn upsert_course(&self, course: &Course) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO courses (
                id, title, description, instructor_id, category, level,
                price_cents, published, created_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                description = excluded.description,
                instructor_id = excluded.instructor_id,
                category = excluded.category,
                level = excluded.level,
                price_cents = excluded.price_cents,
                published = excluded.published
            ",
        )
        .bind(id_i64("course_id", course.id().value())?)
        .bind(course.title().to_owned())
        .bind(course.description().to_owned())
        .bind(id_i64("instructor_id", course.instructor().value())?)
        .bind(course.category().to_owned())
        .bind(course.level().as_str())
        .bind(i64::from(course.price_cents()))
        .bind(i64::from(course.is_published()))
        .bind(course.created_at())
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(())
    }

    async fn create_course(&self, draft: NewCourse) -> Result<Course, StorageError> {
        let res = sqlx::query(
            r"
            INSERT INTO courses (
                title, description, instructor_id, category, level,
                price_cents, published, created_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ",
        )
        .bind(draft.title.clone())
        .bind(draft.description.clone())
        .bind(id_i64("instructor_id", draft.instructor.value())?)
        .bind(draft.category.clone())
        .bind(draft.level.as_str())
        .bind(i64::from(draft.price_cents))
        .bind(i64::from(draft.published))
        .bind(draft.created_at)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(draft.assign_id(course_id_from_i64(res.last_insert_rowid())?))
    }

    async fn delete_course(&self, id: CourseId) -> Result<bool, StorageError> {
        // Lessons, enrollments and ratings go with it via ON DELETE CASCADE.
        let res = sqlx::query("DELETE FROM courses WHERE id = ?1")
            .bind(id_i64("course_id", id.value())?)
            .execute(&self.pool)
            .await
            .map_err(conn)?;
        Ok(res.rows_affected() == 1)
    }

    async fn get_course(&self, id: CourseId) -> Result<Option<Course>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT id, title, description, instructor_id, category, level,
                   price_cents, published, created_at
            FROM courses WHERE id = ?1
            ",
        )
        .bind(id_i64("course_id", id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        row.as_ref().map(map_course_row).transpose()
    }

    async fn list_courses(&self) -> Result<Vec<Course>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, title, description, instructor_id, category, level,
                   price_cents, published, created_at
            FROM courses
            ORDER BY id ASC
            ",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(map_course_row).collect()
    }
}

#[async_trait::async_trait]
impl LessonRepository for SqliteRepository {
    async fn upsert_lesson(&self, lesson: &Lesson) -> Result<(), StorageError> {
        let course_id = id_i64("course_id", lesson.course_id().value())?;
        let exists = sqlx::query("SELECT 1 FROM courses WHERE id = ?1")
            .bind(course_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;
        if exists.is_none() {
            return Err(StorageError::NotFound);
        }

        let content = serde_json::to_string(lesson.kind()).map_err(ser)?;
        sqlx::query(
            r"
            INSERT INTO lessons (
                id, course_id, title, position, duration_minutes, preview, kind, content_json
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ON CONFLICT(id) DO UPDATE SET
                course_id = excluded.course_id,
                title = excluded.title,
                position = excluded.position,
                duration_minutes = excluded.duration_minutes,
                preview = excluded.preview,
                kind = excluded.kind,
                content_json = excluded.content_json
            ",
        )
        .bind(id_i64("lesson_id", lesson.id().value())?)
        .bind(course_id)
        .bind(lesson.title().to_owned())
        .bind(i64::from(lesson.order()))
        .bind(i64::from(lesson.duration_minutes()))
        .bind(i64::from(lesson.is_preview()))
        .bind(lesson.kind().as_str())
        .bind(content)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(())
    }

    async fn create_lesson(&self, draft: NewLesson) -> Result<Lesson, StorageError> {
        let course_id = id_i64("course_id", draft.course_id.value())?;
        let exists = sqlx::query("SELECT 1 FROM courses WHERE id = ?1")
            .bind(course_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;
        if exists.is_none() {
            return Err(StorageError::NotFound);
        }

        let content = serde_json::to_string(&draft.kind).map_err(ser)?;
        let res = sqlx::query(
            r"
            INSERT INTO lessons (
                course_id, title, position, duration_minutes, preview, kind, content_json
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ",
        )
        .bind(course_id)
        .bind(draft.title.clone())
        .bind(i64::from(draft.order))
        .bind(i64::from(draft.duration_minutes))
        .bind(i64::from(draft.preview))
        .bind(draft.kind.as_str())
        .bind(content)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(draft.assign_id(lesson_id_from_i64(res.last_insert_rowid())?))
    }

    async fn delete_lesson(&self, id: LessonId) -> Result<bool, StorageError> {
        let res = sqlx::query("DELETE FROM lessons WHERE id = ?1")
            .bind(id_i64("lesson_id", id.value())?)
            .execute(&self.pool)
            .await
            .map_err(conn)?;
        Ok(res.rows_affected() == 1)
    }

    async fn get_lesson(&self, id: LessonId) -> Result<Option<Lesson>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT id, course_id, title, position, duration_minutes, preview, content_json
            FROM lessons WHERE id = ?1
            ",
        )
        .bind(id_i64("lesson_id", id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        row.as_ref().map(map_lesson_row).transpose()
    }

    async fn lessons_for_course(&self, course_id: CourseId) -> Result<Vec<Lesson>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, course_id, title, position, duration_minutes, preview, content_json
            FROM lessons
            WHERE course_id = ?1
            ORDER BY position ASC, id ASC
            ",
        )
        .bind(id_i64("course_id", course_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(map_lesson_row).collect()
    }
}
