#![forbid(unsafe_code)]

pub mod analytics_service;
pub mod app_services;
pub mod certificate_service;
pub mod course_service;
pub mod enrollment_service;
pub mod error;
pub mod progress_service;
pub mod quiz_service;
pub mod rating_service;
pub mod sync;
pub mod wire;

pub use lms_core::Clock;

pub use analytics_service::AnalyticsService;
pub use app_services::AppServices;
pub use certificate_service::CertificateService;
pub use course_service::CourseService;
pub use enrollment_service::EnrollmentService;
pub use error::{
    AppServicesError, CacheError, CertificateServiceError, CourseServiceError,
    EnrollmentServiceError, ProgressServiceError, QuizServiceError, SessionError,
};
pub use progress_service::{LessonCompletion, ProgressChange, ProgressService};
pub use quiz_service::{QuizService, QuizSubmission};
pub use rating_service::RatingService;
