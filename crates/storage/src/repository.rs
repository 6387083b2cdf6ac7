use async_trait::async_trait;
use lms_core::model::{
    Certificate, CertificateId, Course, CourseId, Enrollment, EnrollmentProgress, Lesson,
    LessonId, NewCertificate, NewCourse, NewLesson, Rating, UserId,
};
use lms_core::quiz::QuizAttempt;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Outcome of an idempotent insert: the stored row, and whether this call
/// created it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inserted<T> {
    pub value: T,
    pub created: bool,
}

//
// ─── CATALOG ───────────────────────────────────────────────────────────────────
//

#[async_trait]
pub trait CourseRepository: Send + Sync {
    /// Persist or update a course.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the course cannot be stored.
    async fn upsert_course(&self, course: &Course) -> Result<(), StorageError>;

    /// Store a new course under the next free ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the course cannot be stored.
    async fn create_course(&self, draft: NewCourse) -> Result<Course, StorageError>;

    /// Fetch a course by ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn get_course(&self, id: CourseId) -> Result<Option<Course>, StorageError>;

    /// Remove a course with its lessons, enrollments and ratings. Returns
    /// false when no such course exists.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn delete_course(&self, id: CourseId) -> Result<bool, StorageError>;

    /// List courses ordered by ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn list_courses(&self) -> Result<Vec<Course>, StorageError>;
}

#[async_trait]
pub trait LessonRepository: Send + Sync {
    /// Persist or update a lesson.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the course does not exist, or other
    /// storage errors.
    async fn upsert_lesson(&self, lesson: &Lesson) -> Result<(), StorageError>;

    /// Store a new lesson under the next free ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the course does not exist, or other
    /// storage errors.
    async fn create_lesson(&self, draft: NewLesson) -> Result<Lesson, StorageError>;

    /// Returns false when no such lesson exists.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn delete_lesson(&self, id: LessonId) -> Result<bool, StorageError>;

    /// Fetch a lesson by ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn get_lesson(&self, id: LessonId) -> Result<Option<Lesson>, StorageError>;

    /// Lessons of a course in display order (`order`, then ID).
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn lessons_for_course(&self, course_id: CourseId) -> Result<Vec<Lesson>, StorageError>;
}

//
// ─── LEARNER STATE ─────────────────────────────────────────────────────────────
//

#[async_trait]
pub trait EnrollmentRepository: Send + Sync {
    /// Insert the enrollment unless one already exists for (user, course).
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn insert_enrollment(
        &self,
        enrollment: &Enrollment,
    ) -> Result<Inserted<Enrollment>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn get_enrollment(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<Option<Enrollment>, StorageError>;

    /// Every enrollment of a course, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn enrollments_for_course(
        &self,
        course_id: CourseId,
    ) -> Result<Vec<Enrollment>, StorageError>;
}

#[async_trait]
pub trait ProgressRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures or malformed rows.
    async fn get_progress(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<Option<EnrollmentProgress>, StorageError>;

    /// Replace the whole progress document for (user, course).
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the record cannot be stored.
    async fn upsert_progress(&self, progress: &EnrollmentProgress) -> Result<(), StorageError>;

    /// All progress records of a user, most recently accessed first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures or malformed rows.
    async fn progress_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<EnrollmentProgress>, StorageError>;

    /// Progress records of every learner in a course, most recently accessed
    /// first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures or malformed rows.
    async fn progress_for_course(
        &self,
        course_id: CourseId,
    ) -> Result<Vec<EnrollmentProgress>, StorageError>;
}

#[async_trait]
pub trait QuizResultRepository: Send + Sync {
    /// Append a graded attempt. Attempts are never updated.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the attempt cannot be stored.
    async fn append_attempt(&self, attempt: &QuizAttempt) -> Result<(), StorageError>;

    /// Attempts for (user, lesson), newest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures or malformed rows.
    async fn attempts_for_lesson(
        &self,
        user_id: UserId,
        lesson_id: LessonId,
    ) -> Result<Vec<QuizAttempt>, StorageError>;
}

#[async_trait]
pub trait CertificateRepository: Send + Sync {
    /// Insert the certificate unless one already exists for (user, course).
    ///
    /// When one exists, it is returned unchanged with `created == false`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn insert_certificate(
        &self,
        draft: NewCertificate,
    ) -> Result<Inserted<Certificate>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn get_certificate(&self, id: CertificateId) -> Result<Option<Certificate>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn certificate_for_course(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<Option<Certificate>, StorageError>;

    /// Certificates of a user, newest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn certificates_for_user(&self, user_id: UserId)
    -> Result<Vec<Certificate>, StorageError>;
}

#[async_trait]
pub trait RatingRepository: Send + Sync {
    /// Insert or replace the rating for (user, course). Returns true when an
    /// earlier rating was replaced.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the rating cannot be stored.
    async fn upsert_rating(&self, rating: &Rating) -> Result<bool, StorageError>;

    /// One page of ratings, newest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn list_ratings(
        &self,
        course_id: CourseId,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Rating>, StorageError>;

    /// Star values of every rating for a course.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn rating_stars(&self, course_id: CourseId) -> Result<Vec<u8>, StorageError>;
}

//
// ─── IN-MEMORY ─────────────────────────────────────────────────────────────────
//

type Key = (UserId, CourseId);

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    courses: Arc<Mutex<HashMap<CourseId, Course>>>,
    lessons: Arc<Mutex<HashMap<LessonId, Lesson>>>,
    enrollments: Arc<Mutex<HashMap<Key, Enrollment>>>,
    progress: Arc<Mutex<HashMap<Key, EnrollmentProgress>>>,
    attempts: Arc<Mutex<Vec<QuizAttempt>>>,
    certificates: Arc<Mutex<Vec<Certificate>>>,
    ratings: Arc<Mutex<HashMap<Key, Rating>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn lock<T>(m: &Mutex<T>) -> Result<MutexGuard<'_, T>, StorageError> {
    m.lock().map_err(|e| StorageError::Connection(e.to_string()))
}

#[async_trait]
impl CourseRepository for InMemoryRepository {
    async fn upsert_course(&self, course: &Course) -> Result<(), StorageError> {
        lock(&self.courses)?.insert(course.id(), course.clone());
        Ok(())
    }

    async fn create_course(&self, draft: NewCourse) -> Result<Course, StorageError> {
        let mut guard = lock(&self.courses)?;
        let next = guard.keys().map(|id| id.value()).max().unwrap_or(0) + 1;
        let course = draft.assign_id(CourseId::new(next));
        guard.insert(course.id(), course.clone());
        Ok(course)
    }

    async fn get_course(&self, id: CourseId) -> Result<Option<Course>, StorageError> {
        Ok(lock(&self.courses)?.get(&id).cloned())
    }

    async fn delete_course(&self, id: CourseId) -> Result<bool, StorageError> {
        if lock(&self.courses)?.remove(&id).is_none() {
            return Ok(false);
        }
        // Same cascade as the SQL schema.
        lock(&self.lessons)?.retain(|_, l| l.course_id() != id);
        lock(&self.enrollments)?.retain(|(_, course), _| *course != id);
        lock(&self.ratings)?.retain(|(_, course), _| *course != id);
        Ok(true)
    }

    async fn list_courses(&self) -> Result<Vec<Course>, StorageError> {
        let mut out: Vec<Course> = lock(&self.courses)?.values().cloned().collect();
        out.sort_by_key(Course::id);
        Ok(out)
    }
}

#[async_trait]
impl LessonRepository for InMemoryRepository {
    async fn upsert_lesson(&self, lesson: &Lesson) -> Result<(), StorageError> {
        if !lock(&self.courses)?.contains_key(&lesson.course_id()) {
            return Err(StorageError::NotFound);
        }
        lock(&self.lessons)?.insert(lesson.id(), lesson.clone());
        Ok(())
    }

    async fn create_lesson(&self, draft: NewLesson) -> Result<Lesson, StorageError> {
        if !lock(&self.courses)?.contains_key(&draft.course_id) {
            return Err(StorageError::NotFound);
        }
        let mut guard = lock(&self.lessons)?;
        let next = guard.keys().map(|id| id.value()).max().unwrap_or(0) + 1;
        let lesson = draft.assign_id(LessonId::new(next));
        guard.insert(lesson.id(), lesson.clone());
        Ok(lesson)
    }

    async fn delete_lesson(&self, id: LessonId) -> Result<bool, StorageError> {
        Ok(lock(&self.lessons)?.remove(&id).is_some())
    }

    async fn get_lesson(&self, id: LessonId) -> Result<Option<Lesson>, StorageError> {
        Ok(lock(&self.lessons)?.get(&id).cloned())
    }

    async fn lessons_for_course(&self, course_id: CourseId) -> Result<Vec<Lesson>, StorageError> {
        let mut out: Vec<Lesson> = lock(&self.lessons)?
            .values()
            .filter(|l| l.course_id() == course_id)
            .cloned()
            .collect();
        out.sort_by_key(|l| (l.order(), l.id()));
        Ok(out)
    }
}

#[async_trait]
impl EnrollmentRepository for InMemoryRepository {
    async fn insert_enrollment(
        &self,
        enrollment: &Enrollment,
    ) -> Result<Inserted<Enrollment>, StorageError> {
        let mut guard = lock(&self.enrollments)?;
        let key = (enrollment.user_id, enrollment.course_id);
        if let Some(existing) = guard.get(&key) {
            return Ok(Inserted {
                value: existing.clone(),
                created: false,
            });
        }
        guard.insert(key, enrollment.clone());
        Ok(Inserted {
            value: enrollment.clone(),
            created: true,
        })
    }

    async fn get_enrollment(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<Option<Enrollment>, StorageError> {
        Ok(lock(&self.enrollments)?.get(&(user_id, course_id)).cloned())
    }

    async fn enrollments_for_course(
        &self,
        course_id: CourseId,
    ) -> Result<Vec<Enrollment>, StorageError> {
        let mut out: Vec<Enrollment> = lock(&self.enrollments)?
            .values()
            .filter(|e| e.course_id == course_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| {
            a.enrolled_at
                .cmp(&b.enrolled_at)
                .then_with(|| a.user_id.cmp(&b.user_id))
        });
        Ok(out)
    }
}

#[async_trait]
impl ProgressRepository for InMemoryRepository {
    async fn get_progress(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<Option<EnrollmentProgress>, StorageError> {
        Ok(lock(&self.progress)?.get(&(user_id, course_id)).cloned())
    }

    async fn upsert_progress(&self, progress: &EnrollmentProgress) -> Result<(), StorageError> {
        lock(&self.progress)?.insert((progress.user_id, progress.course_id), progress.clone());
        Ok(())
    }

    async fn progress_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<EnrollmentProgress>, StorageError> {
        let mut out: Vec<EnrollmentProgress> = lock(&self.progress)?
            .values()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| {
            b.last_accessed_at
                .cmp(&a.last_accessed_at)
                .then_with(|| a.course_id.cmp(&b.course_id))
        });
        Ok(out)
    }

    async fn progress_for_course(
        &self,
        course_id: CourseId,
    ) -> Result<Vec<EnrollmentProgress>, StorageError> {
        let mut out: Vec<EnrollmentProgress> = lock(&self.progress)?
            .values()
            .filter(|p| p.course_id == course_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| {
            b.last_accessed_at
                .cmp(&a.last_accessed_at)
                .then_with(|| a.user_id.cmp(&b.user_id))
        });
        Ok(out)
    }
}

#[async_trait]
impl QuizResultRepository for InMemoryRepository {
    async fn append_attempt(&self, attempt: &QuizAttempt) -> Result<(), StorageError> {
        lock(&self.attempts)?.push(attempt.clone());
        Ok(())
    }

    async fn attempts_for_lesson(
        &self,
        user_id: UserId,
        lesson_id: LessonId,
    ) -> Result<Vec<QuizAttempt>, StorageError> {
        // Insertion order breaks ties between equal timestamps.
        Ok(lock(&self.attempts)?
            .iter()
            .rev()
            .filter(|a| a.user_id == user_id && a.lesson_id == lesson_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl CertificateRepository for InMemoryRepository {
    async fn insert_certificate(
        &self,
        draft: NewCertificate,
    ) -> Result<Inserted<Certificate>, StorageError> {
        let mut guard = lock(&self.certificates)?;
        if let Some(existing) = guard
            .iter()
            .find(|c| c.user_id == draft.user_id && c.course_id == draft.course_id)
        {
            return Ok(Inserted {
                value: existing.clone(),
                created: false,
            });
        }
        let next = guard.iter().map(|c| c.id.value()).max().unwrap_or(0) + 1;
        let cert = draft.assign_id(CertificateId::new(next));
        guard.push(cert.clone());
        Ok(Inserted {
            value: cert,
            created: true,
        })
    }

    async fn get_certificate(&self, id: CertificateId) -> Result<Option<Certificate>, StorageError> {
        Ok(lock(&self.certificates)?
            .iter()
            .find(|c| c.id == id)
            .cloned())
    }

    async fn certificate_for_course(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<Option<Certificate>, StorageError> {
        Ok(lock(&self.certificates)?
            .iter()
            .find(|c| c.user_id == user_id && c.course_id == course_id)
            .cloned())
    }

    async fn certificates_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<Certificate>, StorageError> {
        let mut out: Vec<Certificate> = lock(&self.certificates)?
            .iter()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| b.issued_at.cmp(&a.issued_at).then_with(|| b.id.cmp(&a.id)));
        Ok(out)
    }
}

#[async_trait]
impl RatingRepository for InMemoryRepository {
    async fn upsert_rating(&self, rating: &Rating) -> Result<bool, StorageError> {
        let previous =
            lock(&self.ratings)?.insert((rating.user_id(), rating.course_id()), rating.clone());
        Ok(previous.is_some())
    }

    async fn list_ratings(
        &self,
        course_id: CourseId,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Rating>, StorageError> {
        let mut out: Vec<Rating> = lock(&self.ratings)?
            .values()
            .filter(|r| r.course_id() == course_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| {
            b.rated_at()
                .cmp(&a.rated_at())
                .then_with(|| a.user_id().cmp(&b.user_id()))
        });
        Ok(out
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }

    async fn rating_stars(&self, course_id: CourseId) -> Result<Vec<u8>, StorageError> {
        Ok(lock(&self.ratings)?
            .values()
            .filter(|r| r.course_id() == course_id)
            .map(Rating::stars)
            .collect())
    }
}

//
// ─── AGGREGATE ─────────────────────────────────────────────────────────────────
//

/// Aggregates repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub courses: Arc<dyn CourseRepository>,
    pub lessons: Arc<dyn LessonRepository>,
    pub enrollments: Arc<dyn EnrollmentRepository>,
    pub progress: Arc<dyn ProgressRepository>,
    pub quiz_results: Arc<dyn QuizResultRepository>,
    pub certificates: Arc<dyn CertificateRepository>,
    pub ratings: Arc<dyn RatingRepository>,
}

impl Storage {
    /// Wires every repository to clones of one backend.
    pub fn from_backend<R>(repo: R) -> Self
    where
        R: CourseRepository
            + LessonRepository
            + EnrollmentRepository
            + ProgressRepository
            + QuizResultRepository
            + CertificateRepository
            + RatingRepository
            + Clone
            + 'static,
    {
        Self {
            courses: Arc::new(repo.clone()),
            lessons: Arc::new(repo.clone()),
            enrollments: Arc::new(repo.clone()),
            progress: Arc::new(repo.clone()),
            quiz_results: Arc::new(repo.clone()),
            certificates: Arc::new(repo.clone()),
            ratings: Arc::new(repo),
        }
    }

    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_backend(InMemoryRepository::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lms_core::model::{CourseLevel, LessonKind, LessonUpdate};
    use lms_core::time::fixed_now;

    fn course(id: u64) -> Course {
        Course::new(
            CourseId::new(id),
            "Rust",
            "Ownership and more",
            UserId::new(99),
            "programming",
            CourseLevel::Beginner,
            0,
            true,
            fixed_now(),
        )
        .unwrap()
    }

    fn article(id: u64, course_id: CourseId, order: u32) -> Lesson {
        Lesson::new(
            LessonId::new(id),
            course_id,
            format!("Lesson {id}"),
            order,
            5,
            LessonKind::Article { body: "text".into() },
        )
        .unwrap()
    }

    #[tokio::test]
    async fn lessons_come_back_in_display_order() {
        let repo = InMemoryRepository::new();
        let c = course(1);
        repo.upsert_course(&c).await.unwrap();
        repo.upsert_lesson(&article(10, c.id(), 2)).await.unwrap();
        repo.upsert_lesson(&article(11, c.id(), 1)).await.unwrap();

        let ids: Vec<LessonId> = repo
            .lessons_for_course(c.id())
            .await
            .unwrap()
            .iter()
            .map(Lesson::id)
            .collect();
        assert_eq!(ids, vec![LessonId::new(11), LessonId::new(10)]);
    }

    #[tokio::test]
    async fn lesson_requires_existing_course() {
        let repo = InMemoryRepository::new();
        let err = repo
            .upsert_lesson(&article(1, CourseId::new(7), 1))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound));
    }

    fn draft(title: &str) -> NewCourse {
        NewCourse {
            title: title.into(),
            description: "About".into(),
            instructor: UserId::new(5),
            category: "design".into(),
            level: CourseLevel::Intermediate,
            price_cents: 1_000,
            published: false,
            created_at: fixed_now(),
        }
    }

    #[tokio::test]
    async fn created_courses_get_increasing_ids() {
        let repo = InMemoryRepository::new();
        repo.upsert_course(&course(4)).await.unwrap();
        let created = repo.create_course(draft("Typography")).await.unwrap();
        assert_eq!(created.id(), CourseId::new(5));
        assert_eq!(
            repo.get_course(created.id()).await.unwrap().as_ref(),
            Some(&created)
        );
    }

    #[tokio::test]
    async fn deleting_a_course_removes_its_lessons_and_enrollments() {
        let repo = InMemoryRepository::new();
        let c = course(1);
        repo.upsert_course(&c).await.unwrap();
        repo.upsert_lesson(&article(10, c.id(), 1)).await.unwrap();
        repo.insert_enrollment(&Enrollment::for_course(UserId::new(3), &c, fixed_now()))
            .await
            .unwrap();

        assert!(repo.delete_course(c.id()).await.unwrap());
        assert!(!repo.delete_course(c.id()).await.unwrap());
        assert!(repo.get_lesson(LessonId::new(10)).await.unwrap().is_none());
        assert!(repo.enrollments_for_course(c.id()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn created_lesson_requires_existing_course() {
        let repo = InMemoryRepository::new();
        let lesson = NewLesson {
            course_id: CourseId::new(2),
            title: "Kerning".into(),
            order: 1,
            duration_minutes: 3,
            preview: false,
            kind: LessonKind::Article { body: "text".into() },
        };
        let err = repo.create_lesson(lesson.clone()).await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound));

        repo.upsert_course(&course(2)).await.unwrap();
        let created = repo.create_lesson(lesson).await.unwrap();
        assert_eq!(created.id(), LessonId::new(1));
        assert!(repo.delete_lesson(created.id()).await.unwrap());
        assert!(repo.lessons_for_course(CourseId::new(2)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn second_certificate_insert_returns_first() {
        let repo = InMemoryRepository::new();
        let first = repo
            .insert_certificate(NewCertificate::issue(
                UserId::new(1),
                CourseId::new(1),
                fixed_now(),
            ))
            .await
            .unwrap();
        assert!(first.created);

        let second = repo
            .insert_certificate(NewCertificate::issue(
                UserId::new(1),
                CourseId::new(1),
                fixed_now(),
            ))
            .await
            .unwrap();
        assert!(!second.created);
        assert_eq!(second.value, first.value);
    }

    #[tokio::test]
    async fn progress_round_trips() {
        let repo = InMemoryRepository::new();
        let lessons = [LessonId::new(1), LessonId::new(2)];
        let mut p = EnrollmentProgress::new(UserId::new(1), CourseId::new(1), fixed_now());
        p.apply_update(
            LessonId::new(1),
            LessonUpdate {
                completed: Some(true),
                ..LessonUpdate::default()
            },
            &lessons,
            fixed_now(),
        );
        repo.upsert_progress(&p).await.unwrap();

        let fetched = repo
            .get_progress(UserId::new(1), CourseId::new(1))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fetched.percent(), 50);
        assert_eq!(fetched, p);
    }
}
