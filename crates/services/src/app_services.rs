use std::sync::Arc;

use storage::repository::Storage;

use crate::Clock;
use crate::analytics_service::AnalyticsService;
use crate::certificate_service::CertificateService;
use crate::course_service::CourseService;
use crate::enrollment_service::EnrollmentService;
use crate::error::AppServicesError;
use crate::progress_service::ProgressService;
use crate::quiz_service::QuizService;
use crate::rating_service::RatingService;

/// Assembles the server-side services over one storage backend.
#[derive(Clone)]
pub struct AppServices {
    storage: Storage,
    catalog: Arc<CourseService>,
    analytics: Arc<AnalyticsService>,
    progress: Arc<ProgressService>,
    quizzes: Arc<QuizService>,
    certificates: Arc<CertificateService>,
    enrollments: Arc<EnrollmentService>,
    ratings: Arc<RatingService>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if the database cannot be opened or migrated.
    pub async fn new_sqlite(db_url: &str, clock: Clock) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Ok(Self::from_storage(storage, clock))
    }

    #[must_use]
    pub fn in_memory(clock: Clock) -> Self {
        Self::from_storage(Storage::in_memory(), clock)
    }

    #[must_use]
    pub fn from_storage(storage: Storage, clock: Clock) -> Self {
        let catalog = CourseService::new(
            clock,
            Arc::clone(&storage.courses),
            Arc::clone(&storage.lessons),
        );
        let analytics = AnalyticsService::new(
            clock,
            catalog.clone(),
            Arc::clone(&storage.courses),
            Arc::clone(&storage.lessons),
            Arc::clone(&storage.enrollments),
            Arc::clone(&storage.progress),
            Arc::clone(&storage.ratings),
        );
        let certificates = CertificateService::new(
            clock,
            Arc::clone(&storage.courses),
            Arc::clone(&storage.progress),
            Arc::clone(&storage.certificates),
        );
        let progress = ProgressService::new(
            clock,
            Arc::clone(&storage.courses),
            Arc::clone(&storage.lessons),
            Arc::clone(&storage.enrollments),
            Arc::clone(&storage.progress),
            certificates.clone(),
        );
        let quizzes = QuizService::new(clock, Arc::clone(&storage.quiz_results), progress.clone());
        let enrollments = EnrollmentService::new(
            clock,
            Arc::clone(&storage.courses),
            Arc::clone(&storage.enrollments),
        );
        let ratings = RatingService::new(
            clock,
            Arc::clone(&storage.courses),
            Arc::clone(&storage.enrollments),
            Arc::clone(&storage.ratings),
        );

        Self {
            storage,
            catalog: Arc::new(catalog),
            analytics: Arc::new(analytics),
            progress: Arc::new(progress),
            quizzes: Arc::new(quizzes),
            certificates: Arc::new(certificates),
            enrollments: Arc::new(enrollments),
            ratings: Arc::new(ratings),
        }
    }

    /// Raw repositories, used for catalog seeding.
    #[must_use]
    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    #[must_use]
    pub fn catalog(&self) -> Arc<CourseService> {
        Arc::clone(&self.catalog)
    }

    #[must_use]
    pub fn analytics(&self) -> Arc<AnalyticsService> {
        Arc::clone(&self.analytics)
    }

    #[must_use]
    pub fn progress(&self) -> Arc<ProgressService> {
        Arc::clone(&self.progress)
    }

    #[must_use]
    pub fn quizzes(&self) -> Arc<QuizService> {
        Arc::clone(&self.quizzes)
    }

    #[must_use]
    pub fn certificates(&self) -> Arc<CertificateService> {
        Arc::clone(&self.certificates)
    }

    #[must_use]
    pub fn enrollments(&self) -> Arc<EnrollmentService> {
        Arc::clone(&self.enrollments)
    }

    #[must_use]
    pub fn ratings(&self) -> Arc<RatingService> {
        Arc::clone(&self.ratings)
    }
}
