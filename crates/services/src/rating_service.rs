use std::sync::Arc;

use lms_core::model::{CourseId, Rating, RatingSummary, UserId};
use storage::repository::{CourseRepository, EnrollmentRepository, RatingRepository};
use tracing::info;

use crate::Clock;
use crate::error::EnrollmentServiceError;
use crate::wire::{RatingResponse, RatingsPage};

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;

/// Course reviews left by enrolled learners.
#[derive(Clone)]
pub struct RatingService {
    clock: Clock,
    courses: Arc<dyn CourseRepository>,
    enrollments: Arc<dyn EnrollmentRepository>,
    ratings: Arc<dyn RatingRepository>,
}

impl RatingService {
    #[must_use]
    pub fn new(
        clock: Clock,
        courses: Arc<dyn CourseRepository>,
        enrollments: Arc<dyn EnrollmentRepository>,
        ratings: Arc<dyn RatingRepository>,
    ) -> Self {
        Self {
            clock,
            courses,
            enrollments,
            ratings,
        }
    }

    /// Rate a course, replacing the user's earlier rating if any.
    ///
    /// # Errors
    ///
    /// Returns `CourseNotFound`, `NotEnrolled`, `Rating` for invalid input, or
    /// `Storage` if repository access fails.
    pub async fn rate(
        &self,
        user_id: UserId,
        course_id: CourseId,
        stars: u8,
        feedback: Option<String>,
    ) -> Result<RatingResponse, EnrollmentServiceError> {
        self.require_course(course_id).await?;
        if self
            .enrollments
            .get_enrollment(user_id, course_id)
            .await?
            .is_none()
        {
            return Err(EnrollmentServiceError::NotEnrolled(course_id));
        }
        let rating = Rating::new(user_id, course_id, stars, feedback, self.clock.now())?;
        let updated = self.ratings.upsert_rating(&rating).await?;
        info!(user = %user_id, course = %course_id, stars, updated, "course rated");
        let summary = self.summary(course_id).await?;
        Ok(RatingResponse {
            rating,
            updated,
            summary,
        })
    }

    /// # Errors
    ///
    /// Returns `EnrollmentServiceError::Storage` if repository access fails.
    pub async fn summary(
        &self,
        course_id: CourseId,
    ) -> Result<RatingSummary, EnrollmentServiceError> {
        let stars = self.ratings.rating_stars(course_id).await?;
        Ok(RatingSummary::from_stars(stars))
    }

    /// One page of ratings, newest first. `page` is 1-based.
    ///
    /// # Errors
    ///
    /// Returns `CourseNotFound` for unknown courses or `Storage` if repository
    /// access fails.
    pub async fn list(
        &self,
        course_id: CourseId,
        page: Option<u32>,
        limit: Option<u32>,
    ) -> Result<RatingsPage, EnrollmentServiceError> {
        self.require_course(course_id).await?;
        let (page, limit) = page_window(page, limit);
        let offset = (page - 1).saturating_mul(limit);
        let ratings = self.ratings.list_ratings(course_id, limit, offset).await?;
        let summary = self.summary(course_id).await?;
        Ok(RatingsPage {
            ratings,
            summary,
            page,
            limit,
        })
    }

    async fn require_course(&self, course_id: CourseId) -> Result<(), EnrollmentServiceError> {
        match self.courses.get_course(course_id).await? {
            Some(_) => Ok(()),
            None => Err(EnrollmentServiceError::CourseNotFound(course_id)),
        }
    }
}

pub(crate) fn page_window(page: Option<u32>, limit: Option<u32>) -> (u32, u32) {
    let page = page.unwrap_or(1).max(1);
    let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    (page, limit)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_window_clamps() {
        assert_eq!(page_window(None, None), (1, DEFAULT_PAGE_SIZE));
        assert_eq!(page_window(Some(0), Some(0)), (1, 1));
        assert_eq!(page_window(Some(3), Some(500)), (3, MAX_PAGE_SIZE));
    }
}
