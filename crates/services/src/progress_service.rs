use std::sync::Arc;

use chrono::{DateTime, Utc};
use lms_core::model::{
    Certificate, CourseId, EnrollmentProgress, Lesson, LessonId, LessonUpdate, ProgressStatus,
    UpdateOutcome, UserId,
};
use storage::repository::{
    CourseRepository, EnrollmentRepository, Inserted, LessonRepository, ProgressRepository,
};
use tracing::{debug, info};

use crate::Clock;
use crate::certificate_service::CertificateService;
use crate::error::ProgressServiceError;
use crate::wire::QuickProgress;

/// Result of a progress mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressChange {
    pub progress: EnrollmentProgress,
    pub outcome: UpdateOutcome,
    /// Present once the course is completed; `created` is true only on the
    /// call that issued it.
    pub certificate: Option<Inserted<Certificate>>,
}

/// Result of `ProgressService::complete_lesson`.
#[derive(Debug, Clone, PartialEq)]
pub struct LessonCompletion {
    pub lesson_id: LessonId,
    pub already_completed: bool,
    pub change: ProgressChange,
}

/// Server-side owner of `EnrollmentProgress` documents.
#[derive(Clone)]
pub struct ProgressService {
    clock: Clock,
    courses: Arc<dyn CourseRepository>,
    lessons: Arc<dyn LessonRepository>,
    enrollments: Arc<dyn EnrollmentRepository>,
    progress: Arc<dyn ProgressRepository>,
    certificates: CertificateService,
}

impl ProgressService {
    #[must_use]
    pub fn new(
        clock: Clock,
        courses: Arc<dyn CourseRepository>,
        lessons: Arc<dyn LessonRepository>,
        enrollments: Arc<dyn EnrollmentRepository>,
        progress: Arc<dyn ProgressRepository>,
        certificates: CertificateService,
    ) -> Self {
        Self {
            clock,
            courses,
            lessons,
            enrollments,
            progress,
            certificates,
        }
    }

    /// Progress of `user_id` in `course_id`, with the percentage derived from
    /// the course's current lessons.
    ///
    /// A user without a record gets a not-started skeleton; nothing is stored.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::CourseNotFound` for unknown courses or
    /// `Storage` if repository access fails.
    pub async fn course_progress(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<EnrollmentProgress, ProgressServiceError> {
        let lesson_ids = self.course_lesson_ids(course_id).await?;
        let now = self.clock.now();
        let mut progress = self
            .progress
            .get_progress(user_id, course_id)
            .await?
            .unwrap_or_else(|| EnrollmentProgress::new(user_id, course_id, now));
        if !progress.lessons().is_empty() {
            progress.recompute(&lesson_ids, now);
        }
        Ok(progress)
    }

    /// # Errors
    ///
    /// Same as [`ProgressService::course_progress`].
    pub async fn quick_progress(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<QuickProgress, ProgressServiceError> {
        let progress = self.course_progress(user_id, course_id).await?;
        let accessed = progress.status() != ProgressStatus::NotStarted;
        Ok(QuickProgress {
            progress: progress.percent(),
            status: progress.status(),
            last_accessed_at: accessed.then_some(progress.last_accessed_at),
            last_accessed_lesson: progress.last_accessed_lesson,
        })
    }

    /// All progress records of a user, most recently accessed first.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` if repository access fails.
    pub async fn list_progress(
        &self,
        user_id: UserId,
    ) -> Result<Vec<EnrollmentProgress>, ProgressServiceError> {
        Ok(self.progress.progress_for_user(user_id).await?)
    }

    /// Apply a client update to one lesson of a course.
    ///
    /// The record is created on first access. `completed: false` never
    /// reverts a completed lesson.
    ///
    /// # Errors
    ///
    /// Returns `CourseNotFound`, `LessonNotInCourse`, or `NotEnrolled` when the
    /// request does not fit the catalog, or `Storage` on repository failures.
    pub async fn update_lesson_progress(
        &self,
        user_id: UserId,
        course_id: CourseId,
        lesson_id: LessonId,
        update: LessonUpdate,
    ) -> Result<ProgressChange, ProgressServiceError> {
        self.mutate(user_id, course_id, lesson_id, |progress, ids, now| {
            progress.apply_update(lesson_id, update, ids, now)
        })
        .await
    }

    /// Mark a lesson completed. Repeat calls report `already_completed`.
    ///
    /// # Errors
    ///
    /// Returns `LessonNotFound` for unknown lessons, `NotEnrolled` when the
    /// user has no enrollment, or `Storage` on repository failures.
    pub async fn complete_lesson(
        &self,
        user_id: UserId,
        lesson_id: LessonId,
    ) -> Result<LessonCompletion, ProgressServiceError> {
        let lesson = self.lesson(lesson_id).await?;
        let update = LessonUpdate {
            completed: Some(true),
            ..LessonUpdate::default()
        };
        let change = self
            .update_lesson_progress(user_id, lesson.course_id(), lesson_id, update)
            .await?;
        let already_completed = !change.outcome.lesson_newly_completed;
        if already_completed {
            debug!(user = %user_id, lesson = %lesson_id, "lesson already completed");
        }
        Ok(LessonCompletion {
            lesson_id,
            already_completed,
            change,
        })
    }

    /// Record a graded quiz attempt against the lesson's course progress.
    pub(crate) async fn record_quiz_attempt(
        &self,
        user_id: UserId,
        lesson: &Lesson,
        score: u8,
    ) -> Result<ProgressChange, ProgressServiceError> {
        let lesson_id = lesson.id();
        self.mutate(user_id, lesson.course_id(), lesson_id, |progress, ids, now| {
            progress.apply_quiz_attempt(lesson_id, score, ids, now)
        })
        .await
    }

    /// # Errors
    ///
    /// Returns `NotEnrolled` when the user has no enrollment in the course.
    pub async fn ensure_enrolled(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<(), ProgressServiceError> {
        match self.enrollments.get_enrollment(user_id, course_id).await? {
            Some(_) => Ok(()),
            None => Err(ProgressServiceError::NotEnrolled(course_id)),
        }
    }

    pub(crate) async fn lesson(&self, lesson_id: LessonId) -> Result<Lesson, ProgressServiceError> {
        self.lessons
            .get_lesson(lesson_id)
            .await?
            .ok_or(ProgressServiceError::LessonNotFound(lesson_id))
    }

    async fn course_lesson_ids(
        &self,
        course_id: CourseId,
    ) -> Result<Vec<LessonId>, ProgressServiceError> {
        if self.courses.get_course(course_id).await?.is_none() {
            return Err(ProgressServiceError::CourseNotFound(course_id));
        }
        Ok(self
            .lessons
            .lessons_for_course(course_id)
            .await?
            .iter()
            .map(Lesson::id)
            .collect())
    }

    async fn mutate<F>(
        &self,
        user_id: UserId,
        course_id: CourseId,
        lesson_id: LessonId,
        apply: F,
    ) -> Result<ProgressChange, ProgressServiceError>
    where
        F: FnOnce(&mut EnrollmentProgress, &[LessonId], DateTime<Utc>) -> UpdateOutcome + Send,
    {
        let lesson_ids = self.course_lesson_ids(course_id).await?;
        if !lesson_ids.contains(&lesson_id) {
            return Err(ProgressServiceError::LessonNotInCourse {
                lesson: lesson_id,
                course: course_id,
            });
        }
        self.ensure_enrolled(user_id, course_id).await?;

        let now = self.clock.now();
        let mut progress = self
            .progress
            .get_progress(user_id, course_id)
            .await?
            .unwrap_or_else(|| EnrollmentProgress::new(user_id, course_id, now));
        let outcome = apply(&mut progress, &lesson_ids, now);
        self.progress.upsert_progress(&progress).await?;

        if outcome.lesson_newly_completed {
            info!(user = %user_id, course = %course_id, lesson = %lesson_id, "lesson completed");
        }
        let certificate = if progress.status() == ProgressStatus::Completed {
            if outcome.course_newly_completed {
                info!(user = %user_id, course = %course_id, "course completed");
            }
            Some(self.certificates.issue_completed(user_id, course_id).await?)
        } else {
            None
        };

        Ok(ProgressChange {
            progress,
            outcome,
            certificate,
        })
    }
}
