use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use services::wire::ErrorBody;
use services::{
    CertificateServiceError, CourseServiceError, EnrollmentServiceError, ProgressServiceError,
    QuizServiceError,
};
use storage::repository::StorageError;
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum AppError {
    #[error("missing or invalid X-User-Id header")]
    Unauthenticated,

    #[error("{0}")]
    MalformedRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error(transparent)]
    Progress(#[from] ProgressServiceError),

    #[error(transparent)]
    Quiz(#[from] QuizServiceError),

    #[error(transparent)]
    Certificate(#[from] CertificateServiceError),

    #[error(transparent)]
    Enrollment(#[from] EnrollmentServiceError),

    #[error(transparent)]
    Course(#[from] CourseServiceError),
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::MalformedRequest(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::MalformedRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::MalformedRequest(rejection.body_text())
    }
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AppError::MalformedRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Progress(err) => progress_status(err),
            AppError::Quiz(err) => match err {
                QuizServiceError::LessonNotFound(_) => StatusCode::NOT_FOUND,
                QuizServiceError::NotAQuiz(_)
                | QuizServiceError::NoQuestions(_)
                | QuizServiceError::UnknownQuestion { .. }
                | QuizServiceError::UnknownOption { .. } => StatusCode::BAD_REQUEST,
                QuizServiceError::Progress(inner) => progress_status(inner),
                QuizServiceError::Storage(inner) => storage_status(inner),
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            AppError::Certificate(err) => certificate_status(err),
            AppError::Enrollment(err) => match err {
                EnrollmentServiceError::CourseNotFound(_) => StatusCode::NOT_FOUND,
                EnrollmentServiceError::CourseNotPublished(_)
                | EnrollmentServiceError::Rating(_) => StatusCode::BAD_REQUEST,
                EnrollmentServiceError::NotEnrolled(_) => StatusCode::FORBIDDEN,
                EnrollmentServiceError::Storage(inner) => storage_status(inner),
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            AppError::Course(err) => match err {
                CourseServiceError::CourseNotFound(_) | CourseServiceError::LessonNotFound(_) => {
                    StatusCode::NOT_FOUND
                }
                CourseServiceError::NotInstructor(_) => StatusCode::FORBIDDEN,
                CourseServiceError::Course(_) | CourseServiceError::Lesson(_) => {
                    StatusCode::BAD_REQUEST
                }
                CourseServiceError::Storage(inner) => storage_status(inner),
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

fn progress_status(err: &ProgressServiceError) -> StatusCode {
    match err {
        ProgressServiceError::CourseNotFound(_) | ProgressServiceError::LessonNotFound(_) => {
            StatusCode::NOT_FOUND
        }
        ProgressServiceError::LessonNotInCourse { .. } => StatusCode::BAD_REQUEST,
        ProgressServiceError::NotEnrolled(_) => StatusCode::FORBIDDEN,
        ProgressServiceError::Certificate(inner) => certificate_status(inner),
        ProgressServiceError::Storage(inner) => storage_status(inner),
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn certificate_status(err: &CertificateServiceError) -> StatusCode {
    match err {
        CertificateServiceError::CourseNotFound(_) => StatusCode::NOT_FOUND,
        CertificateServiceError::CourseNotCompleted(_) => StatusCode::BAD_REQUEST,
        CertificateServiceError::Storage(inner) => storage_status(inner),
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn storage_status(err: &StorageError) -> StatusCode {
    match err {
        StorageError::NotFound => StatusCode::NOT_FOUND,
        StorageError::Conflict => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status.is_server_error() {
            error!(error = %self, "request failed");
            "internal server error".to_owned()
        } else {
            self.to_string()
        };
        (status, Json(ErrorBody { message })).into_response()
    }
}
