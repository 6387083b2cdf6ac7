use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{CourseId, UserId};

pub const MAX_FEEDBACK_CHARS: usize = 1000;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum RatingError {
    #[error("rating must be between 1 and 5 stars, got {0}")]
    StarsOutOfRange(u8),

    #[error("feedback is limited to {MAX_FEEDBACK_CHARS} characters")]
    FeedbackTooLong,
}

/// A learner's review of a course. One per (user, course); re-rating replaces it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rating {
    user_id: UserId,
    course_id: CourseId,
    stars: u8,
    feedback: Option<String>,
    rated_at: DateTime<Utc>,
}

impl Rating {
    /// # Errors
    ///
    /// Returns `RatingError` when stars fall outside 1..=5 or the feedback is
    /// too long. Blank feedback is dropped.
    pub fn new(
        user_id: UserId,
        course_id: CourseId,
        stars: u8,
        feedback: Option<String>,
        rated_at: DateTime<Utc>,
    ) -> Result<Self, RatingError> {
        if !(1..=5).contains(&stars) {
            return Err(RatingError::StarsOutOfRange(stars));
        }
        let feedback = feedback
            .map(|f| f.trim().to_owned())
            .filter(|f| !f.is_empty());
        if feedback
            .as_ref()
            .is_some_and(|f| f.chars().count() > MAX_FEEDBACK_CHARS)
        {
            return Err(RatingError::FeedbackTooLong);
        }
        Ok(Self {
            user_id,
            course_id,
            stars,
            feedback,
            rated_at,
        })
    }

    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    #[must_use]
    pub fn course_id(&self) -> CourseId {
        self.course_id
    }

    #[must_use]
    pub fn stars(&self) -> u8 {
        self.stars
    }

    #[must_use]
    pub fn feedback(&self) -> Option<&str> {
        self.feedback.as_deref()
    }

    #[must_use]
    pub fn rated_at(&self) -> DateTime<Utc> {
        self.rated_at
    }
}

/// Aggregate shown on the course page.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingSummary {
    /// Mean stars rounded to one decimal, 0.0 when unrated.
    pub average: f64,
    pub count: u64,
    /// Number of ratings per star value, index 0 is one star.
    pub distribution: [u64; 5],
}

impl RatingSummary {
    #[must_use]
    pub fn from_stars(stars: impl IntoIterator<Item = u8>) -> Self {
        let mut distribution = [0_u64; 5];
        let mut count = 0_u64;
        let mut total = 0_u64;
        for s in stars {
            if (1..=5).contains(&s) {
                distribution[usize::from(s - 1)] += 1;
                count += 1;
                total += u64::from(s);
            }
        }
        // Tenths, rounded half up: round(10 * total / count).
        let average = if count == 0 {
            0.0
        } else {
            let tenths = (20 * total + count) / (2 * count);
            tenths as f64 / 10.0
        };
        Self {
            average,
            count,
            distribution,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    #[test]
    fn stars_must_be_one_to_five() {
        for bad in [0, 6] {
            let err = Rating::new(UserId::new(1), CourseId::new(1), bad, None, fixed_now())
                .unwrap_err();
            assert_eq!(err, RatingError::StarsOutOfRange(bad));
        }
        let ok = Rating::new(
            UserId::new(1),
            CourseId::new(1),
            5,
            Some("  ".into()),
            fixed_now(),
        )
        .unwrap();
        assert_eq!(ok.feedback(), None);
    }

    #[test]
    fn long_feedback_is_rejected() {
        let err = Rating::new(
            UserId::new(1),
            CourseId::new(1),
            4,
            Some("x".repeat(MAX_FEEDBACK_CHARS + 1)),
            fixed_now(),
        )
        .unwrap_err();
        assert_eq!(err, RatingError::FeedbackTooLong);
    }

    #[test]
    fn summary_rounds_to_one_decimal() {
        let s = RatingSummary::from_stars([5, 4, 4]);
        assert_eq!(s.count, 3);
        assert!((s.average - 4.3).abs() < f64::EPSILON);
        assert_eq!(s.distribution, [0, 0, 0, 2, 1]);

        let empty = RatingSummary::from_stars([]);
        assert_eq!(empty.count, 0);
        assert!(empty.average.abs() < f64::EPSILON);
    }
}
