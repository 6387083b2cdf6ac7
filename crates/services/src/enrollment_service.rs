use std::sync::Arc;

use lms_core::model::{CourseId, Enrollment, UserId};
use storage::repository::{CourseRepository, EnrollmentRepository, Inserted};
use tracing::info;

use crate::Clock;
use crate::error::EnrollmentServiceError;

/// Enrolls learners into published courses.
#[derive(Clone)]
pub struct EnrollmentService {
    clock: Clock,
    courses: Arc<dyn CourseRepository>,
    enrollments: Arc<dyn EnrollmentRepository>,
}

impl EnrollmentService {
    #[must_use]
    pub fn new(
        clock: Clock,
        courses: Arc<dyn CourseRepository>,
        enrollments: Arc<dyn EnrollmentRepository>,
    ) -> Self {
        Self {
            clock,
            courses,
            enrollments,
        }
    }

    /// Enroll `user_id`. Enrolling twice returns the first enrollment.
    ///
    /// # Errors
    ///
    /// Returns `CourseNotFound` or `CourseNotPublished` when the course cannot
    /// be joined, or `Storage` if repository access fails.
    pub async fn enroll(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<Inserted<Enrollment>, EnrollmentServiceError> {
        let course = self
            .courses
            .get_course(course_id)
            .await?
            .ok_or(EnrollmentServiceError::CourseNotFound(course_id))?;
        if !course.is_published() {
            return Err(EnrollmentServiceError::CourseNotPublished(course_id));
        }
        let enrollment = Enrollment::for_course(user_id, &course, self.clock.now());
        let inserted = self.enrollments.insert_enrollment(&enrollment).await?;
        if inserted.created {
            info!(
                user = %user_id,
                course = %course_id,
                payment = inserted.value.payment_status.as_str(),
                "enrolled"
            );
        }
        Ok(inserted)
    }

    /// # Errors
    ///
    /// Returns `EnrollmentServiceError::Storage` if repository access fails.
    pub async fn is_enrolled(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<bool, EnrollmentServiceError> {
        Ok(self
            .enrollments
            .get_enrollment(user_id, course_id)
            .await?
            .is_some())
    }
}
