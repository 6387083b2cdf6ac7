use std::sync::Arc;

use lms_core::model::{
    Certificate, CertificateId, CourseId, NewCertificate, ProgressStatus, UserId,
};
use storage::repository::{
    CertificateRepository, CourseRepository, Inserted, ProgressRepository,
};
use tracing::info;

use crate::Clock;
use crate::error::CertificateServiceError;

/// Issues and looks up completion certificates.
#[derive(Clone)]
pub struct CertificateService {
    clock: Clock,
    courses: Arc<dyn CourseRepository>,
    progress: Arc<dyn ProgressRepository>,
    certificates: Arc<dyn CertificateRepository>,
}

impl CertificateService {
    #[must_use]
    pub fn new(
        clock: Clock,
        courses: Arc<dyn CourseRepository>,
        progress: Arc<dyn ProgressRepository>,
        certificates: Arc<dyn CertificateRepository>,
    ) -> Self {
        Self {
            clock,
            courses,
            progress,
            certificates,
        }
    }

    /// Issue the certificate for a completed course.
    ///
    /// Idempotent: when one already exists it is returned with
    /// `created == false`.
    ///
    /// # Errors
    ///
    /// Returns `CertificateServiceError::CourseNotFound` for unknown courses,
    /// `CourseNotCompleted` when the user's progress is not completed, or
    /// `Storage` if repository access fails.
    pub async fn issue(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<Inserted<Certificate>, CertificateServiceError> {
        if self.courses.get_course(course_id).await?.is_none() {
            return Err(CertificateServiceError::CourseNotFound(course_id));
        }
        let completed = self
            .progress
            .get_progress(user_id, course_id)
            .await?
            .is_some_and(|p| p.status() == ProgressStatus::Completed);
        if !completed {
            return Err(CertificateServiceError::CourseNotCompleted(course_id));
        }
        self.issue_completed(user_id, course_id).await
    }

    /// Issue without re-checking completion; the caller has just observed it.
    pub(crate) async fn issue_completed(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<Inserted<Certificate>, CertificateServiceError> {
        let draft = NewCertificate::issue(user_id, course_id, self.clock.now());
        let inserted = self.certificates.insert_certificate(draft).await?;
        if inserted.created {
            info!(
                user = %user_id,
                course = %course_id,
                certificate = %inserted.value.id,
                "certificate issued"
            );
        }
        Ok(inserted)
    }

    /// # Errors
    ///
    /// Returns `CertificateServiceError::Storage` if repository access fails.
    pub async fn for_course(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<Option<Certificate>, CertificateServiceError> {
        Ok(self
            .certificates
            .certificate_for_course(user_id, course_id)
            .await?)
    }

    /// Certificates of a user, newest first.
    ///
    /// # Errors
    ///
    /// Returns `CertificateServiceError::Storage` if repository access fails.
    pub async fn list_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<Certificate>, CertificateServiceError> {
        Ok(self.certificates.certificates_for_user(user_id).await?)
    }

    /// Public lookup used by third parties to check a certificate.
    ///
    /// # Errors
    ///
    /// Returns `CertificateServiceError::Storage` if repository access fails.
    pub async fn verify(
        &self,
        id: CertificateId,
    ) -> Result<Option<Certificate>, CertificateServiceError> {
        Ok(self.certificates.get_certificate(id).await?)
    }
}
