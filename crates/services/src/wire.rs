//! JSON bodies exchanged between the progress client and the server.
//!
//! Every endpoint has exactly one body shape. All keys are camelCase.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use lms_core::model::{
    Certificate, Course, CourseId, CourseLevel, Enrollment, EnrollmentProgress, Lesson, LessonId,
    LessonKind, LessonUpdate, ProgressStatus, Rating, RatingSummary, UserId,
};
use lms_core::quiz::{QuizAnswers, QuizAttempt};
use lms_core::reconcile::LessonSnapshot;

pub use lms_core::quiz::QuizGrade;
pub use lms_core::reconcile::ProgressSnapshot;

/// Body of `POST /progress/courses/{courseId}/lessons/{lessonId}`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonProgressRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_timestamp: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quiz_score: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_spent: Option<u64>,
}

impl From<LessonProgressRequest> for LessonUpdate {
    fn from(req: LessonProgressRequest) -> Self {
        Self {
            completed: req.completed,
            video_timestamp: req.video_timestamp,
            quiz_score: req.quiz_score,
            time_spent_secs: req.time_spent,
        }
    }
}

/// Response of the lesson progress update: the changed lesson plus the
/// re-derived course figures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonProgressResponse {
    pub progress: u8,
    pub status: ProgressStatus,
    pub lesson: LessonSnapshot,
    pub course_completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate: Option<Certificate>,
}

/// Response of `POST /lessons/{lessonId}/complete`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteLessonResponse {
    pub lesson_id: LessonId,
    pub already_completed: bool,
    pub progress: u8,
    pub status: ProgressStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate: Option<Certificate>,
}

/// Response of `GET /progress/courses/{courseId}/quick`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuickProgress {
    pub progress: u8,
    pub status: ProgressStatus,
    pub last_accessed_at: Option<DateTime<Utc>>,
    pub last_accessed_lesson: Option<LessonId>,
}

/// One row of `GET /progress`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressListItem {
    pub course_id: CourseId,
    pub progress: u8,
    pub status: ProgressStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub last_accessed_at: DateTime<Utc>,
    pub last_accessed_lesson: Option<LessonId>,
    pub total_time_spent: u64,
}

impl From<&EnrollmentProgress> for ProgressListItem {
    fn from(p: &EnrollmentProgress) -> Self {
        Self {
            course_id: p.course_id,
            progress: p.percent(),
            status: p.status(),
            started_at: p.started_at,
            completed_at: p.completed_at(),
            last_accessed_at: p.last_accessed_at,
            last_accessed_lesson: p.last_accessed_lesson,
            total_time_spent: p.total_time_spent_secs,
        }
    }
}

/// Body of `POST /quiz/{lessonId}/submit`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizSubmitRequest {
    pub answers: QuizAnswers,
    #[serde(default)]
    pub time_taken: u32,
}

/// One stored attempt as returned by the results endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizResultItem {
    pub lesson_id: LessonId,
    pub score: u8,
    pub passed: bool,
    pub total_questions: usize,
    pub correct_answers: usize,
    pub time_taken: u32,
    pub submitted_at: DateTime<Utc>,
}

impl From<&QuizAttempt> for QuizResultItem {
    fn from(a: &QuizAttempt) -> Self {
        Self {
            lesson_id: a.lesson_id,
            score: a.score,
            passed: a.passed,
            total_questions: a.total_questions,
            correct_answers: a.correct_answers,
            time_taken: a.time_taken_secs,
            submitted_at: a.submitted_at,
        }
    }
}

/// Body of `POST /certificates`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateRequest {
    pub course_id: CourseId,
}

/// A certificate plus whether this request created it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedCertificate {
    #[serde(flatten)]
    pub certificate: Certificate,
    pub created: bool,
}

/// Response of `GET /certificates/{id}/verify`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateVerification {
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate: Option<Certificate>,
}

/// Response of `POST /courses/{courseId}/enroll`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentResponse {
    #[serde(flatten)]
    pub enrollment: Enrollment,
    pub created: bool,
}

/// Body of `POST /courses/{courseId}/ratings`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingRequest {
    pub rating: u8,
    #[serde(default)]
    pub feedback: Option<String>,
}

/// Response of `POST /courses/{courseId}/ratings`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingResponse {
    pub rating: Rating,
    pub updated: bool,
    pub summary: RatingSummary,
}

/// Response of `GET /courses/{courseId}/ratings`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingsPage {
    pub ratings: Vec<Rating>,
    pub summary: RatingSummary,
    pub page: u32,
    pub limit: u32,
}

/// Body of `POST /courses`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseRequest {
    pub title: String,
    pub description: String,
    pub category: String,
    #[serde(default)]
    pub level: CourseLevel,
    #[serde(default)]
    pub price_cents: u32,
    #[serde(default)]
    pub published: bool,
}

/// A course as the catalog endpoints return it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseInfo {
    pub id: CourseId,
    pub title: String,
    pub description: String,
    pub instructor_id: UserId,
    pub category: String,
    pub level: CourseLevel,
    pub price_cents: u32,
    pub is_free: bool,
    pub published: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&Course> for CourseInfo {
    fn from(c: &Course) -> Self {
        Self {
            id: c.id(),
            title: c.title().to_owned(),
            description: c.description().to_owned(),
            instructor_id: c.instructor(),
            category: c.category().to_owned(),
            level: c.level(),
            price_cents: c.price_cents(),
            is_free: c.is_free(),
            published: c.is_published(),
            created_at: c.created_at(),
        }
    }
}

/// Response of `GET /courses/{courseId}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseDetail {
    #[serde(flatten)]
    pub course: CourseInfo,
    pub lessons: Vec<LessonInfo>,
}

/// Response of `GET /courses`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoursePage {
    pub courses: Vec<CourseInfo>,
    pub page: u32,
    pub limit: u32,
    pub total: usize,
}

/// Body of `POST /lessons/course/{courseId}`. Without `order` the lesson is
/// appended after the last one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonRequest {
    pub title: String,
    #[serde(default)]
    pub order: Option<u32>,
    pub duration: u32,
    #[serde(default)]
    pub is_preview: bool,
    pub content: LessonKind,
}

/// A lesson as the catalog endpoints return it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonInfo {
    pub id: LessonId,
    pub course_id: CourseId,
    pub title: String,
    pub order: u32,
    pub duration: u32,
    pub is_preview: bool,
    pub content: LessonKind,
}

impl From<&Lesson> for LessonInfo {
    fn from(l: &Lesson) -> Self {
        Self {
            id: l.id(),
            course_id: l.course_id(),
            title: l.title().to_owned(),
            order: l.order(),
            duration: l.duration_minutes(),
            is_preview: l.is_preview(),
            content: l.kind().clone(),
        }
    }
}

/// Response of `GET /analytics/course/{courseId}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseAnalytics {
    pub course_id: CourseId,
    pub title: String,
    pub total_students: usize,
    pub completed_students: usize,
    /// Learners seen in the last 7 days.
    pub active_students: usize,
    /// Mean progress percent over enrolled learners, in tenths.
    pub average_completion_rate: f64,
    pub average_time_spent: u64,
    /// Mean of the latest quiz score per (learner, quiz lesson).
    pub average_quiz_score: Option<f64>,
    pub total_revenue_cents: u64,
    pub lesson_completion: Vec<LessonCompletionStat>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonCompletionStat {
    pub lesson_id: LessonId,
    pub lesson_title: String,
    pub completed_count: usize,
    pub completion_rate: u8,
}

/// Response of `GET /analytics/overview`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstructorOverview {
    pub total_courses: usize,
    pub total_students: usize,
    /// Learners seen in the last 30 days.
    pub active_students: usize,
    pub total_revenue_cents: u64,
    pub course_performance: Vec<CoursePerformance>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoursePerformance {
    pub course_id: CourseId,
    pub title: String,
    pub enrolled: usize,
    pub completed: usize,
    pub completion_rate: u8,
    pub revenue_cents: u64,
    pub average_rating: f64,
}

/// One row of `GET /analytics/students/progress`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentProgressRow {
    pub user_id: UserId,
    pub course_id: CourseId,
    pub course_title: String,
    pub progress: u8,
    pub status: ProgressStatus,
    pub last_accessed_at: DateTime<Utc>,
    pub total_time_spent: u64,
}

/// Error body returned for every non-2xx response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lesson_request_omits_absent_fields() {
        let req = LessonProgressRequest {
            completed: Some(false),
            video_timestamp: Some(12.5),
            ..LessonProgressRequest::default()
        };
        let json = serde_json::to_string(&req).unwrap();
        assert_eq!(json, r#"{"completed":false,"videoTimestamp":12.5}"#);
    }

    #[test]
    fn quiz_submit_reads_string_keyed_answers() {
        let req: QuizSubmitRequest =
            serde_json::from_str(r#"{"answers":{"0":1,"1":0},"timeTaken":40}"#).unwrap();
        assert_eq!(req.answers.get(0), Some(1));
        assert_eq!(req.time_taken, 40);
    }
}
