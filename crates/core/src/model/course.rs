use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{CourseId, UserId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CourseError {
    #[error("course title cannot be empty")]
    EmptyTitle,

    #[error("course description cannot be empty")]
    EmptyDescription,

    #[error("course category cannot be empty")]
    EmptyCategory,

    #[error("invalid course level: {0}")]
    InvalidLevel(String),
}

//
// ─── LEVEL ─────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CourseLevel {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
}

impl CourseLevel {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            CourseLevel::Beginner => "beginner",
            CourseLevel::Intermediate => "intermediate",
            CourseLevel::Advanced => "advanced",
        }
    }

    /// Parses the storage/wire spelling of a level.
    ///
    /// # Errors
    ///
    /// Returns `CourseError::InvalidLevel` for unknown values.
    pub fn parse(raw: &str) -> Result<Self, CourseError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "beginner" => Ok(Self::Beginner),
            "intermediate" => Ok(Self::Intermediate),
            "advanced" => Ok(Self::Advanced),
            _ => Err(CourseError::InvalidLevel(raw.to_owned())),
        }
    }
}

//
// ─── COURSE ────────────────────────────────────────────────────────────────────
//

/// A course authored by an instructor. Lessons reference the course by id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Course {
    id: CourseId,
    title: String,
    description: String,
    instructor: UserId,
    category: String,
    level: CourseLevel,
    price_cents: u32,
    published: bool,
    created_at: DateTime<Utc>,
}

/// A course before the store assigns its id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCourse {
    pub title: String,
    pub description: String,
    pub instructor: UserId,
    pub category: String,
    pub level: CourseLevel,
    pub price_cents: u32,
    pub published: bool,
    pub created_at: DateTime<Utc>,
}

impl NewCourse {
    /// Trims title and category and rejects blank fields.
    ///
    /// # Errors
    ///
    /// Returns `CourseError` if title, description, or category are blank.
    pub fn validated(mut self) -> Result<Self, CourseError> {
        self.title = self.title.trim().to_owned();
        if self.title.is_empty() {
            return Err(CourseError::EmptyTitle);
        }
        if self.description.trim().is_empty() {
            return Err(CourseError::EmptyDescription);
        }
        self.category = self.category.trim().to_owned();
        if self.category.is_empty() {
            return Err(CourseError::EmptyCategory);
        }
        Ok(self)
    }

    #[must_use]
    pub fn assign_id(self, id: CourseId) -> Course {
        Course {
            id,
            title: self.title,
            description: self.description,
            instructor: self.instructor,
            category: self.category,
            level: self.level,
            price_cents: self.price_cents,
            published: self.published,
            created_at: self.created_at,
        }
    }
}

/// Instructor edits to a course. Absent fields keep their value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CoursePatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub level: Option<CourseLevel>,
    pub price_cents: Option<u32>,
    pub published: Option<bool>,
}

impl Course {
    /// Creates a validated course.
    ///
    /// # Errors
    ///
    /// Returns `CourseError` if title, description, or category are blank.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: CourseId,
        title: impl Into<String>,
        description: impl Into<String>,
        instructor: UserId,
        category: impl Into<String>,
        level: CourseLevel,
        price_cents: u32,
        published: bool,
        created_at: DateTime<Utc>,
    ) -> Result<Self, CourseError> {
        let draft = NewCourse {
            title: title.into(),
            description: description.into(),
            instructor,
            category: category.into(),
            level,
            price_cents,
            published,
            created_at,
        };
        Ok(draft.validated()?.assign_id(id))
    }

    /// The course with `patch` applied. Id, instructor and creation time never
    /// change.
    ///
    /// # Errors
    ///
    /// Returns `CourseError` if the patched course would be invalid.
    pub fn patched(&self, patch: CoursePatch) -> Result<Self, CourseError> {
        let draft = NewCourse {
            title: patch.title.unwrap_or_else(|| self.title.clone()),
            description: patch
                .description
                .unwrap_or_else(|| self.description.clone()),
            instructor: self.instructor,
            category: patch.category.unwrap_or_else(|| self.category.clone()),
            level: patch.level.unwrap_or(self.level),
            price_cents: patch.price_cents.unwrap_or(self.price_cents),
            published: patch.published.unwrap_or(self.published),
            created_at: self.created_at,
        };
        Ok(draft.validated()?.assign_id(self.id))
    }

    #[must_use]
    pub fn id(&self) -> CourseId {
        self.id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    #[must_use]
    pub fn instructor(&self) -> UserId {
        self.instructor
    }

    #[must_use]
    pub fn category(&self) -> &str {
        &self.category
    }

    #[must_use]
    pub fn level(&self) -> CourseLevel {
        self.level
    }

    #[must_use]
    pub fn price_cents(&self) -> u32 {
        self.price_cents
    }

    #[must_use]
    pub fn is_free(&self) -> bool {
        self.price_cents == 0
    }

    #[must_use]
    pub fn is_published(&self) -> bool {
        self.published
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    fn build(title: &str) -> Result<Course, CourseError> {
        Course::new(
            CourseId::new(1),
            title,
            "Intro",
            UserId::new(9),
            "Programming",
            CourseLevel::Beginner,
            0,
            true,
            fixed_now(),
        )
    }

    #[test]
    fn blank_title_is_rejected() {
        assert_eq!(build("   ").unwrap_err(), CourseError::EmptyTitle);
    }

    #[test]
    fn title_is_trimmed_and_free_is_derived() {
        let course = build("  Rust 101 ").unwrap();
        assert_eq!(course.title(), "Rust 101");
        assert!(course.is_free());
    }

    #[test]
    fn patch_keeps_identity_and_revalidates() {
        let course = build("Rust 101").unwrap();
        let patched = course
            .patched(CoursePatch {
                title: Some(" Rust 102 ".into()),
                price_cents: Some(4_900),
                ..CoursePatch::default()
            })
            .unwrap();
        assert_eq!(patched.id(), course.id());
        assert_eq!(patched.instructor(), course.instructor());
        assert_eq!(patched.title(), "Rust 102");
        assert!(!patched.is_free());
        assert_eq!(patched.description(), "Intro");

        let err = course
            .patched(CoursePatch {
                category: Some(" ".into()),
                ..CoursePatch::default()
            })
            .unwrap_err();
        assert_eq!(err, CourseError::EmptyCategory);
    }

    #[test]
    fn level_parse_is_case_insensitive() {
        assert_eq!(CourseLevel::parse("Advanced").unwrap(), CourseLevel::Advanced);
        assert!(CourseLevel::parse("expert").is_err());
    }
}
