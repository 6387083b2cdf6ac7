use chrono::{DateTime, Utc};
use lms_core::model::{
    Certificate, CertificateId, Course, CourseId, CourseLevel, Enrollment, Lesson, LessonId,
    LessonKind, LessonProgress, PaymentStatus, ProgressStatus, Rating, UserId,
};
use lms_core::quiz::{QuizAnswers, QuizAttempt};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;
use uuid::Uuid;

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn conn(e: sqlx::Error) -> StorageError {
    StorageError::Connection(e.to_string())
}

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

fn i64_to_u32(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

fn i64_to_u8(field: &'static str, v: i64) -> Result<u8, StorageError> {
    u8::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

pub(crate) fn id_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

fn get_i64(row: &SqliteRow, col: &str) -> Result<i64, StorageError> {
    row.try_get::<i64, _>(col).map_err(ser)
}

fn get_flag(row: &SqliteRow, col: &str) -> Result<bool, StorageError> {
    Ok(get_i64(row, col)? != 0)
}

pub(crate) fn user_id_from_i64(v: i64) -> Result<UserId, StorageError> {
    Ok(UserId::new(i64_to_u64("user_id", v)?))
}

pub(crate) fn course_id_from_i64(v: i64) -> Result<CourseId, StorageError> {
    Ok(CourseId::new(i64_to_u64("course_id", v)?))
}

pub(crate) fn lesson_id_from_i64(v: i64) -> Result<LessonId, StorageError> {
    Ok(LessonId::new(i64_to_u64("lesson_id", v)?))
}

pub(crate) fn certificate_id_from_i64(v: i64) -> Result<CertificateId, StorageError> {
    Ok(CertificateId::new(i64_to_u64("certificate_id", v)?))
}

pub(crate) fn parse_progress_status(s: &str) -> Result<ProgressStatus, StorageError> {
    ProgressStatus::parse(s)
        .ok_or_else(|| StorageError::Serialization(format!("invalid status: {s}")))
}

pub(crate) fn parse_payment_status(s: &str) -> Result<PaymentStatus, StorageError> {
    PaymentStatus::parse(s)
        .ok_or_else(|| StorageError::Serialization(format!("invalid payment status: {s}")))
}

pub(crate) fn map_course_row(row: &SqliteRow) -> Result<Course, StorageError> {
    let level: String = row.try_get("level").map_err(ser)?;
    Course::new(
        course_id_from_i64(get_i64(row, "id")?)?,
        row.try_get::<String, _>("title").map_err(ser)?,
        row.try_get::<String, _>("description").map_err(ser)?,
        user_id_from_i64(get_i64(row, "instructor_id")?)?,
        row.try_get::<String, _>("category").map_err(ser)?,
        CourseLevel::parse(&level).map_err(ser)?,
        i64_to_u32("price_cents", get_i64(row, "price_cents")?)?,
        get_flag(row, "published")?,
        row.try_get("created_at").map_err(ser)?,
    )
    .map_err(ser)
}

pub(crate) fn map_lesson_row(row: &SqliteRow) -> Result<Lesson, StorageError> {
    let content: String = row.try_get("content_json").map_err(ser)?;
    let kind: LessonKind = serde_json::from_str(&content).map_err(ser)?;
    let lesson = Lesson::new(
        lesson_id_from_i64(get_i64(row, "id")?)?,
        course_id_from_i64(get_i64(row, "course_id")?)?,
        row.try_get::<String, _>("title").map_err(ser)?,
        i64_to_u32("position", get_i64(row, "position")?)?,
        i64_to_u32("duration_minutes", get_i64(row, "duration_minutes")?)?,
        kind,
    )
    .map_err(ser)?;
    Ok(lesson.with_preview(get_flag(row, "preview")?))
}

pub(crate) fn map_enrollment_row(row: &SqliteRow) -> Result<Enrollment, StorageError> {
    let status: String = row.try_get("payment_status").map_err(ser)?;
    Ok(Enrollment {
        user_id: user_id_from_i64(get_i64(row, "user_id")?)?,
        course_id: course_id_from_i64(get_i64(row, "course_id")?)?,
        enrolled_at: row.try_get("enrolled_at").map_err(ser)?,
        payment_status: parse_payment_status(&status)?,
    })
}

pub(crate) fn map_lesson_progress_row(row: &SqliteRow) -> Result<LessonProgress, StorageError> {
    let quiz_score = row
        .try_get::<Option<i64>, _>("quiz_score")
        .map_err(ser)?
        .map(|v| i64_to_u8("quiz_score", v))
        .transpose()?;
    Ok(LessonProgress {
        lesson_id: lesson_id_from_i64(get_i64(row, "lesson_id")?)?,
        completed: get_flag(row, "completed")?,
        completed_at: row.try_get("completed_at").map_err(ser)?,
        last_accessed_at: row.try_get("last_accessed_at").map_err(ser)?,
        video_timestamp: row.try_get("video_timestamp").map_err(ser)?,
        quiz_score,
        quiz_attempts: i64_to_u32("quiz_attempts", get_i64(row, "quiz_attempts")?)?,
    })
}

pub(crate) fn map_quiz_result_row(row: &SqliteRow) -> Result<QuizAttempt, StorageError> {
    let answers_json: String = row.try_get("answers_json").map_err(ser)?;
    let answers: QuizAnswers = serde_json::from_str(&answers_json).map_err(ser)?;
    let total = get_i64(row, "total_questions")?;
    let correct = get_i64(row, "correct_answers")?;
    Ok(QuizAttempt {
        user_id: user_id_from_i64(get_i64(row, "user_id")?)?,
        lesson_id: lesson_id_from_i64(get_i64(row, "lesson_id")?)?,
        answers,
        score: i64_to_u8("score", get_i64(row, "score")?)?,
        passed: get_flag(row, "passed")?,
        total_questions: usize::try_from(total).map_err(ser)?,
        correct_answers: usize::try_from(correct).map_err(ser)?,
        time_taken_secs: i64_to_u32("time_taken_secs", get_i64(row, "time_taken_secs")?)?,
        submitted_at: row.try_get("submitted_at").map_err(ser)?,
    })
}

pub(crate) fn map_certificate_row(row: &SqliteRow) -> Result<Certificate, StorageError> {
    let code: String = row.try_get("code").map_err(ser)?;
    Ok(Certificate {
        id: certificate_id_from_i64(get_i64(row, "id")?)?,
        user_id: user_id_from_i64(get_i64(row, "user_id")?)?,
        course_id: course_id_from_i64(get_i64(row, "course_id")?)?,
        code: Uuid::parse_str(&code).map_err(ser)?,
        issued_at: row.try_get("issued_at").map_err(ser)?,
    })
}

pub(crate) fn map_rating_row(row: &SqliteRow) -> Result<Rating, StorageError> {
    let rated_at: DateTime<Utc> = row.try_get("rated_at").map_err(ser)?;
    Rating::new(
        user_id_from_i64(get_i64(row, "user_id")?)?,
        course_id_from_i64(get_i64(row, "course_id")?)?,
        i64_to_u8("stars", get_i64(row, "stars")?)?,
        row.try_get::<Option<String>, _>("feedback").map_err(ser)?,
        rated_at,
    )
    .map_err(ser)
}
