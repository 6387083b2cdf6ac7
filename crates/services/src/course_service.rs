use std::sync::Arc;

use lms_core::model::{
    Course, CourseId, CoursePatch, Lesson, LessonId, LessonPatch, NewCourse, NewLesson, UserId,
};
use storage::repository::{CourseRepository, LessonRepository};
use tracing::info;

use crate::Clock;
use crate::error::CourseServiceError;
use crate::rating_service::page_window;
use crate::wire::{CourseDetail, CourseInfo, CoursePage, CourseRequest, LessonInfo, LessonRequest};

/// Catalog browsing plus course and lesson authoring.
///
/// Only a course's instructor may change it or its lessons.
#[derive(Clone)]
pub struct CourseService {
    clock: Clock,
    courses: Arc<dyn CourseRepository>,
    lessons: Arc<dyn LessonRepository>,
}

impl CourseService {
    #[must_use]
    pub fn new(
        clock: Clock,
        courses: Arc<dyn CourseRepository>,
        lessons: Arc<dyn LessonRepository>,
    ) -> Self {
        Self {
            clock,
            courses,
            lessons,
        }
    }

    /// One page of published courses, newest first.
    ///
    /// # Errors
    ///
    /// Returns `CourseServiceError::Storage` if repository access fails.
    pub async fn list_published(
        &self,
        page: Option<u32>,
        limit: Option<u32>,
    ) -> Result<CoursePage, CourseServiceError> {
        let (page, limit) = page_window(page, limit);
        let mut published: Vec<Course> = self
            .courses
            .list_courses()
            .await?
            .into_iter()
            .filter(Course::is_published)
            .collect();
        published.sort_by(|a, b| {
            b.created_at()
                .cmp(&a.created_at())
                .then_with(|| b.id().cmp(&a.id()))
        });
        let total = published.len();
        let offset = (page as usize - 1) * limit as usize;
        let courses = published
            .iter()
            .skip(offset)
            .take(limit as usize)
            .map(CourseInfo::from)
            .collect();
        Ok(CoursePage {
            courses,
            page,
            limit,
            total,
        })
    }

    /// # Errors
    ///
    /// Returns `CourseNotFound`, or `Storage` if repository access fails.
    pub async fn course(&self, course_id: CourseId) -> Result<Course, CourseServiceError> {
        self.courses
            .get_course(course_id)
            .await?
            .ok_or(CourseServiceError::CourseNotFound(course_id))
    }

    /// A course with its lessons in display order.
    ///
    /// # Errors
    ///
    /// Returns `CourseNotFound`, or `Storage` if repository access fails.
    pub async fn detail(&self, course_id: CourseId) -> Result<CourseDetail, CourseServiceError> {
        let course = self.course(course_id).await?;
        let lessons = self.lessons.lessons_for_course(course_id).await?;
        Ok(CourseDetail {
            course: CourseInfo::from(&course),
            lessons: lessons.iter().map(LessonInfo::from).collect(),
        })
    }

    /// Create a course taught by `instructor`.
    ///
    /// # Errors
    ///
    /// Returns `Course` for invalid fields, or `Storage` if repository access
    /// fails.
    pub async fn create_course(
        &self,
        instructor: UserId,
        request: CourseRequest,
    ) -> Result<Course, CourseServiceError> {
        let draft = NewCourse {
            title: request.title,
            description: request.description,
            instructor,
            category: request.category,
            level: request.level,
            price_cents: request.price_cents,
            published: request.published,
            created_at: self.clock.now(),
        }
        .validated()?;
        let course = self.courses.create_course(draft).await?;
        info!(course = %course.id(), instructor = %instructor, "course created");
        Ok(course)
    }

    /// # Errors
    ///
    /// Returns `CourseNotFound`, `NotInstructor`, `Course` for invalid
    /// fields, or `Storage` if repository access fails.
    pub async fn update_course(
        &self,
        user_id: UserId,
        course_id: CourseId,
        patch: CoursePatch,
    ) -> Result<Course, CourseServiceError> {
        let course = self.owned_course(user_id, course_id).await?;
        let updated = course.patched(patch)?;
        self.courses.upsert_course(&updated).await?;
        info!(course = %course_id, "course updated");
        Ok(updated)
    }

    /// Delete a course together with its lessons.
    ///
    /// # Errors
    ///
    /// Returns `CourseNotFound`, `NotInstructor`, or `Storage` if repository
    /// access fails.
    pub async fn delete_course(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<(), CourseServiceError> {
        self.owned_course(user_id, course_id).await?;
        if !self.courses.delete_course(course_id).await? {
            return Err(CourseServiceError::CourseNotFound(course_id));
        }
        info!(course = %course_id, "course deleted");
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `CourseNotFound`, or `Storage` if repository access fails.
    pub async fn lessons(&self, course_id: CourseId) -> Result<Vec<Lesson>, CourseServiceError> {
        self.course(course_id).await?;
        Ok(self.lessons.lessons_for_course(course_id).await?)
    }

    /// # Errors
    ///
    /// Returns `LessonNotFound`, or `Storage` if repository access fails.
    pub async fn lesson(&self, lesson_id: LessonId) -> Result<Lesson, CourseServiceError> {
        self.lessons
            .get_lesson(lesson_id)
            .await?
            .ok_or(CourseServiceError::LessonNotFound(lesson_id))
    }

    /// Add a lesson to a course. Without an explicit order it goes last.
    ///
    /// # Errors
    ///
    /// Returns `CourseNotFound`, `NotInstructor`, `Lesson` for invalid
    /// content, or `Storage` if repository access fails.
    pub async fn create_lesson(
        &self,
        user_id: UserId,
        course_id: CourseId,
        request: LessonRequest,
    ) -> Result<Lesson, CourseServiceError> {
        self.owned_course(user_id, course_id).await?;
        let order = match request.order {
            Some(order) => order,
            None => self
                .lessons
                .lessons_for_course(course_id)
                .await?
                .iter()
                .map(Lesson::order)
                .max()
                .map_or(1, |last| last.saturating_add(1)),
        };
        let draft = NewLesson {
            course_id,
            title: request.title,
            order,
            duration_minutes: request.duration,
            preview: request.is_preview,
            kind: request.content,
        }
        .validated()?;
        let lesson = self.lessons.create_lesson(draft).await?;
        info!(
            course = %course_id,
            lesson = %lesson.id(),
            kind = lesson.kind().as_str(),
            "lesson created"
        );
        Ok(lesson)
    }

    /// # Errors
    ///
    /// Returns `LessonNotFound`, `NotInstructor`, `Lesson` for invalid
    /// content, or `Storage` if repository access fails.
    pub async fn update_lesson(
        &self,
        user_id: UserId,
        lesson_id: LessonId,
        patch: LessonPatch,
    ) -> Result<Lesson, CourseServiceError> {
        let lesson = self.lesson(lesson_id).await?;
        self.owned_course(user_id, lesson.course_id()).await?;
        let updated = lesson.patched(patch)?;
        self.lessons.upsert_lesson(&updated).await?;
        info!(lesson = %lesson_id, "lesson updated");
        Ok(updated)
    }

    /// # Errors
    ///
    /// Returns `LessonNotFound`, `NotInstructor`, or `Storage` if repository
    /// access fails.
    pub async fn delete_lesson(
        &self,
        user_id: UserId,
        lesson_id: LessonId,
    ) -> Result<(), CourseServiceError> {
        let lesson = self.lesson(lesson_id).await?;
        self.owned_course(user_id, lesson.course_id()).await?;
        if !self.lessons.delete_lesson(lesson_id).await? {
            return Err(CourseServiceError::LessonNotFound(lesson_id));
        }
        info!(lesson = %lesson_id, "lesson deleted");
        Ok(())
    }

    /// The course, provided `user_id` teaches it.
    pub(crate) async fn owned_course(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<Course, CourseServiceError> {
        let course = self.course(course_id).await?;
        if course.instructor() == user_id {
            Ok(course)
        } else {
            Err(CourseServiceError::NotInstructor(course_id))
        }
    }
}
