//! Shared error types for the services crate.

use std::io;

use thiserror::Error;

use lms_core::model::{CourseError, CourseId, LessonError, LessonId, RatingError};
use lms_core::scheduler::RemoteFailure;
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted by `ProgressService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProgressServiceError {
    #[error("course {0} not found")]
    CourseNotFound(CourseId),
    #[error("lesson {0} not found")]
    LessonNotFound(LessonId),
    #[error("lesson {lesson} does not belong to course {course}")]
    LessonNotInCourse { lesson: LessonId, course: CourseId },
    #[error("not enrolled in course {0}")]
    NotEnrolled(CourseId),
    #[error(transparent)]
    Certificate(#[from] CertificateServiceError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `QuizService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum QuizServiceError {
    #[error("lesson {0} not found")]
    LessonNotFound(LessonId),
    #[error("lesson {0} is not a quiz")]
    NotAQuiz(LessonId),
    #[error("quiz {0} has no questions")]
    NoQuestions(LessonId),
    #[error("question {index} does not exist")]
    UnknownQuestion { index: usize },
    #[error("question {index} has no option {option}")]
    UnknownOption { index: usize, option: usize },
    #[error(transparent)]
    Progress(#[from] ProgressServiceError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `CertificateService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CertificateServiceError {
    #[error("course {0} not found")]
    CourseNotFound(CourseId),
    #[error("course {0} is not completed yet")]
    CourseNotCompleted(CourseId),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `EnrollmentService` and `RatingService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EnrollmentServiceError {
    #[error("course {0} not found")]
    CourseNotFound(CourseId),
    #[error("course {0} is not open for enrollment")]
    CourseNotPublished(CourseId),
    #[error("not enrolled in course {0}")]
    NotEnrolled(CourseId),
    #[error(transparent)]
    Rating(#[from] RatingError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `CourseService` and `AnalyticsService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CourseServiceError {
    #[error("course {0} not found")]
    CourseNotFound(CourseId),
    #[error("lesson {0} not found")]
    LessonNotFound(LessonId),
    #[error("only the instructor of course {0} may do this")]
    NotInstructor(CourseId),
    #[error(transparent)]
    Course(#[from] CourseError),
    #[error(transparent)]
    Lesson(#[from] LessonError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by the on-disk progress cache.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CacheError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("cache lock poisoned")]
    Poisoned,
}

/// Errors emitted by a client-side `CourseSession`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    #[error("no lesson is open")]
    NoCurrentLesson,
    #[error("lesson {0} is not part of this course")]
    UnknownLesson(LessonId),
    #[error(transparent)]
    Remote(#[from] RemoteFailure),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}
