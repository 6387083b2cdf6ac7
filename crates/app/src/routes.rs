use axum::{Json, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};

use lms_core::model::{
    Certificate, CertificateId, CourseId, CoursePatch, LessonId, LessonPatch, ProgressStatus,
};
use lms_core::reconcile::LessonSnapshot;
use services::AppServices;
use services::wire::{
    CertificateRequest, CertificateVerification, CompleteLessonResponse, CourseAnalytics,
    CourseDetail, CourseInfo, CoursePage, CourseRequest, EnrollmentResponse, InstructorOverview,
    IssuedCertificate, LessonInfo, LessonProgressRequest, LessonProgressResponse, LessonRequest,
    ProgressListItem, ProgressSnapshot, QuickProgress, QuizGrade, QuizResultItem,
    QuizSubmitRequest, RatingRequest, RatingResponse, RatingsPage, StudentProgressRow,
};

use crate::error::AppError;
use crate::extract::{CurrentUser, JsonBody, PathParams, QueryParams};

type ApiResult<T> = Result<Json<T>, AppError>;

#[derive(Serialize)]
pub struct Health {
    status: &'static str,
}

pub async fn health_handler() -> Json<Health> {
    Json(Health { status: "ok" })
}

//
// ─── PROGRESS ──────────────────────────────────────────────────────────────────
//

pub async fn list_progress_handler(
    State(services): State<AppServices>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Vec<ProgressListItem>> {
    let records = services.progress().list_progress(user).await?;
    Ok(Json(records.iter().map(ProgressListItem::from).collect()))
}

pub async fn course_progress_handler(
    State(services): State<AppServices>,
    CurrentUser(user): CurrentUser,
    PathParams(course_id): PathParams<CourseId>,
) -> ApiResult<ProgressSnapshot> {
    let progress = services.progress().course_progress(user, course_id).await?;
    Ok(Json(progress.snapshot()))
}

pub async fn quick_progress_handler(
    State(services): State<AppServices>,
    CurrentUser(user): CurrentUser,
    PathParams(course_id): PathParams<CourseId>,
) -> ApiResult<QuickProgress> {
    Ok(Json(
        services.progress().quick_progress(user, course_id).await?,
    ))
}

pub async fn update_lesson_progress_handler(
    State(services): State<AppServices>,
    CurrentUser(user): CurrentUser,
    PathParams((course_id, lesson_id)): PathParams<(CourseId, LessonId)>,
    JsonBody(body): JsonBody<LessonProgressRequest>,
) -> ApiResult<LessonProgressResponse> {
    let change = services
        .progress()
        .update_lesson_progress(user, course_id, lesson_id, body.into())
        .await?;
    let snapshot = change.progress.snapshot();
    let lesson = snapshot
        .lessons
        .into_iter()
        .find(|l| l.lesson_id == lesson_id)
        .unwrap_or(LessonSnapshot {
            lesson_id,
            completed: false,
            video_timestamp: 0.0,
            quiz_score: None,
            last_accessed_at: None,
        });
    Ok(Json(LessonProgressResponse {
        progress: snapshot.progress,
        status: snapshot.status,
        lesson,
        course_completed: snapshot.status == ProgressStatus::Completed,
        certificate: change.certificate.map(|c| c.value),
    }))
}

pub async fn complete_lesson_handler(
    State(services): State<AppServices>,
    CurrentUser(user): CurrentUser,
    PathParams(lesson_id): PathParams<LessonId>,
) -> ApiResult<CompleteLessonResponse> {
    let completion = services.progress().complete_lesson(user, lesson_id).await?;
    let progress = &completion.change.progress;
    Ok(Json(CompleteLessonResponse {
        lesson_id,
        already_completed: completion.already_completed,
        progress: progress.percent(),
        status: progress.status(),
        certificate: completion.change.certificate.map(|c| c.value),
    }))
}

//
// ─── QUIZZES ───────────────────────────────────────────────────────────────────
//

pub async fn submit_quiz_handler(
    State(services): State<AppServices>,
    CurrentUser(user): CurrentUser,
    PathParams(lesson_id): PathParams<LessonId>,
    JsonBody(body): JsonBody<QuizSubmitRequest>,
) -> ApiResult<QuizGrade> {
    let submission = services
        .quizzes()
        .submit(user, lesson_id, body.answers, body.time_taken)
        .await?;
    Ok(Json(submission.grade))
}

pub async fn quiz_results_handler(
    State(services): State<AppServices>,
    CurrentUser(user): CurrentUser,
    PathParams(lesson_id): PathParams<LessonId>,
) -> ApiResult<Vec<QuizResultItem>> {
    let attempts = services.quizzes().results(user, lesson_id).await?;
    Ok(Json(attempts.iter().map(QuizResultItem::from).collect()))
}

pub async fn best_quiz_result_handler(
    State(services): State<AppServices>,
    CurrentUser(user): CurrentUser,
    PathParams(lesson_id): PathParams<LessonId>,
) -> ApiResult<QuizResultItem> {
    services
        .quizzes()
        .best_result(user, lesson_id)
        .await?
        .map(|attempt| Json(QuizResultItem::from(&attempt)))
        .ok_or_else(|| AppError::NotFound(format!("no attempts for lesson {lesson_id}")))
}

//
// ─── CERTIFICATES ──────────────────────────────────────────────────────────────
//

pub async fn issue_certificate_handler(
    State(services): State<AppServices>,
    CurrentUser(user): CurrentUser,
    JsonBody(body): JsonBody<CertificateRequest>,
) -> Result<(StatusCode, Json<IssuedCertificate>), AppError> {
    let inserted = services.certificates().issue(user, body.course_id).await?;
    let status = if inserted.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((
        status,
        Json(IssuedCertificate {
            certificate: inserted.value,
            created: inserted.created,
        }),
    ))
}

pub async fn list_certificates_handler(
    State(services): State<AppServices>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Vec<Certificate>> {
    Ok(Json(services.certificates().list_for_user(user).await?))
}

pub async fn course_certificate_handler(
    State(services): State<AppServices>,
    CurrentUser(user): CurrentUser,
    PathParams(course_id): PathParams<CourseId>,
) -> ApiResult<Certificate> {
    services
        .certificates()
        .for_course(user, course_id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("no certificate for course {course_id}")))
}

pub async fn verify_certificate_handler(
    State(services): State<AppServices>,
    PathParams(id): PathParams<CertificateId>,
) -> ApiResult<CertificateVerification> {
    let certificate = services.certificates().verify(id).await?;
    Ok(Json(CertificateVerification {
        valid: certificate.is_some(),
        certificate,
    }))
}

//
// ─── ENROLLMENT & RATINGS ──────────────────────────────────────────────────────
//

pub async fn enroll_handler(
    State(services): State<AppServices>,
    CurrentUser(user): CurrentUser,
    PathParams(course_id): PathParams<CourseId>,
) -> Result<(StatusCode, Json<EnrollmentResponse>), AppError> {
    let inserted = services.enrollments().enroll(user, course_id).await?;
    let status = if inserted.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((
        status,
        Json(EnrollmentResponse {
            enrollment: inserted.value,
            created: inserted.created,
        }),
    ))
}

pub async fn rate_course_handler(
    State(services): State<AppServices>,
    CurrentUser(user): CurrentUser,
    PathParams(course_id): PathParams<CourseId>,
    JsonBody(body): JsonBody<RatingRequest>,
) -> ApiResult<RatingResponse> {
    Ok(Json(
        services
            .ratings()
            .rate(user, course_id, body.rating, body.feedback)
            .await?,
    ))
}

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    page: Option<u32>,
    limit: Option<u32>,
}

pub async fn list_ratings_handler(
    State(services): State<AppServices>,
    PathParams(course_id): PathParams<CourseId>,
    QueryParams(query): QueryParams<PageQuery>,
) -> ApiResult<RatingsPage> {
    Ok(Json(
        services
            .ratings()
            .list(course_id, query.page, query.limit)
            .await?,
    ))
}

//
// ─── CATALOG ───────────────────────────────────────────────────────────────────
//

pub async fn list_courses_handler(
    State(services): State<AppServices>,
    QueryParams(query): QueryParams<PageQuery>,
) -> ApiResult<CoursePage> {
    Ok(Json(
        services
            .catalog()
            .list_published(query.page, query.limit)
            .await?,
    ))
}

pub async fn create_course_handler(
    State(services): State<AppServices>,
    CurrentUser(user): CurrentUser,
    JsonBody(body): JsonBody<CourseRequest>,
) -> Result<(StatusCode, Json<CourseInfo>), AppError> {
    let course = services.catalog().create_course(user, body).await?;
    Ok((StatusCode::CREATED, Json(CourseInfo::from(&course))))
}

pub async fn course_detail_handler(
    State(services): State<AppServices>,
    PathParams(course_id): PathParams<CourseId>,
) -> ApiResult<CourseDetail> {
    Ok(Json(services.catalog().detail(course_id).await?))
}

pub async fn update_course_handler(
    State(services): State<AppServices>,
    CurrentUser(user): CurrentUser,
    PathParams(course_id): PathParams<CourseId>,
    JsonBody(patch): JsonBody<CoursePatch>,
) -> ApiResult<CourseInfo> {
    let course = services
        .catalog()
        .update_course(user, course_id, patch)
        .await?;
    Ok(Json(CourseInfo::from(&course)))
}

pub async fn delete_course_handler(
    State(services): State<AppServices>,
    CurrentUser(user): CurrentUser,
    PathParams(course_id): PathParams<CourseId>,
) -> Result<StatusCode, AppError> {
    services.catalog().delete_course(user, course_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn course_lessons_handler(
    State(services): State<AppServices>,
    PathParams(course_id): PathParams<CourseId>,
) -> ApiResult<Vec<LessonInfo>> {
    let lessons = services.catalog().lessons(course_id).await?;
    Ok(Json(lessons.iter().map(LessonInfo::from).collect()))
}

pub async fn create_lesson_handler(
    State(services): State<AppServices>,
    CurrentUser(user): CurrentUser,
    PathParams(course_id): PathParams<CourseId>,
    JsonBody(body): JsonBody<LessonRequest>,
) -> Result<(StatusCode, Json<LessonInfo>), AppError> {
    let lesson = services
        .catalog()
        .create_lesson(user, course_id, body)
        .await?;
    Ok((StatusCode::CREATED, Json(LessonInfo::from(&lesson))))
}

pub async fn lesson_handler(
    State(services): State<AppServices>,
    PathParams(lesson_id): PathParams<LessonId>,
) -> ApiResult<LessonInfo> {
    let lesson = services.catalog().lesson(lesson_id).await?;
    Ok(Json(LessonInfo::from(&lesson)))
}

pub async fn update_lesson_handler(
    State(services): State<AppServices>,
    CurrentUser(user): CurrentUser,
    PathParams(lesson_id): PathParams<LessonId>,
    JsonBody(patch): JsonBody<LessonPatch>,
) -> ApiResult<LessonInfo> {
    let lesson = services
        .catalog()
        .update_lesson(user, lesson_id, patch)
        .await?;
    Ok(Json(LessonInfo::from(&lesson)))
}

pub async fn delete_lesson_handler(
    State(services): State<AppServices>,
    CurrentUser(user): CurrentUser,
    PathParams(lesson_id): PathParams<LessonId>,
) -> Result<StatusCode, AppError> {
    services.catalog().delete_lesson(user, lesson_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

//
// ─── ANALYTICS ─────────────────────────────────────────────────────────────────
//

pub async fn instructor_overview_handler(
    State(services): State<AppServices>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<InstructorOverview> {
    Ok(Json(services.analytics().overview(user).await?))
}

pub async fn course_analytics_handler(
    State(services): State<AppServices>,
    CurrentUser(user): CurrentUser,
    PathParams(course_id): PathParams<CourseId>,
) -> ApiResult<CourseAnalytics> {
    Ok(Json(services.analytics().course(user, course_id).await?))
}

pub async fn students_progress_handler(
    State(services): State<AppServices>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Vec<StudentProgressRow>> {
    Ok(Json(services.analytics().students_progress(user).await?))
}
