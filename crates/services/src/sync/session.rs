use std::future::Future;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use lms_core::model::{CourseId, LessonId, ProgressStatus};
use lms_core::quiz::QuizAnswers;
use lms_core::reconcile::{LessonView, LocalCourseCache, MergeResult, merge};
use lms_core::scheduler::{RemoteFailure, SavePolicy, SaveRequest};

use crate::Clock;
use crate::error::SessionError;
use crate::sync::api::ProgressApi;
use crate::sync::cache::LocalCache;
use crate::sync::scheduler::{SaveIndicator, SaveOutcome, SaveScheduler, SyncPhase};
use crate::wire::{IssuedCertificate, QuizGrade, QuizSubmitRequest};

/// A learner's open course: the merged progress view plus the save pipeline.
pub struct CourseSession {
    course_id: CourseId,
    lessons: Vec<LessonId>,
    api: Arc<dyn ProgressApi>,
    cache: Arc<dyn LocalCache>,
    scheduler: SaveScheduler,
    view: MergeResult,
    current: Option<LessonId>,
}

impl CourseSession {
    /// Open a course and reconcile remote progress with the local cache.
    ///
    /// Never fails: an unreachable server or unreadable cache yields a view
    /// built from whatever is available.
    pub async fn open(
        course_id: CourseId,
        lessons: Vec<LessonId>,
        api: Arc<dyn ProgressApi>,
        cache: Arc<dyn LocalCache>,
        policy: SavePolicy,
        clock: Clock,
    ) -> Self {
        let scheduler = SaveScheduler::new(
            course_id,
            Arc::clone(&api),
            Arc::clone(&cache),
            policy,
            clock,
        );
        let view = merge(None, &LocalCourseCache::new(), &lessons);
        let mut session = Self {
            course_id,
            lessons,
            api,
            cache,
            scheduler,
            view,
            current: None,
        };
        session.reconcile().await;
        session
    }

    /// Rebuild the view from the server and the local cache. Remote saves
    /// are re-enabled unless the server still reports the feature missing.
    /// A fetch that outlasts the manual save timeout counts as a timeout.
    pub async fn reconcile(&mut self) {
        self.scheduler.reset_remote();
        let fetch = self.api.fetch_progress(self.course_id);
        let remote = match self.bounded(fetch).await {
            Ok(snapshot) => Some(snapshot),
            Err(failure) => {
                self.absorb_fetch_failure(&failure);
                None
            }
        };
        let local = self.cache.load(self.course_id).unwrap_or_else(|err| {
            warn!(course = %self.course_id, error = %err, "local progress cache unreadable");
            LocalCourseCache::new()
        });
        self.view = merge(remote.as_ref(), &local, &self.lessons);
        self.current = self
            .view
            .last_accessed_lesson
            .filter(|l| self.lessons.contains(l))
            .or_else(|| self.lessons.first().copied());
        info!(
            course = %self.course_id,
            progress = self.view.progress,
            status = self.view.status.as_str(),
            "progress reconciled"
        );
    }

    fn absorb_fetch_failure(&self, failure: &RemoteFailure) {
        match failure {
            RemoteFailure::NotFound => {
                self.scheduler.disable_remote();
                debug!(course = %self.course_id, "progress endpoint missing, tracking offline");
            }
            RemoteFailure::Timeout => {
                debug!(course = %self.course_id, "progress fetch timed out, using local cache");
            }
            _ => warn!(course = %self.course_id, error = %failure, "progress fetch failed"),
        }
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, RemoteFailure>>,
    ) -> Result<T, RemoteFailure> {
        tokio::time::timeout(self.scheduler.policy().manual_timeout, call)
            .await
            .unwrap_or(Err(RemoteFailure::Timeout))
    }

    #[must_use]
    pub fn course_id(&self) -> CourseId {
        self.course_id
    }

    #[must_use]
    pub fn view(&self) -> &MergeResult {
        &self.view
    }

    #[must_use]
    pub fn progress(&self) -> u8 {
        self.view.progress
    }

    #[must_use]
    pub fn status(&self) -> ProgressStatus {
        self.view.status
    }

    #[must_use]
    pub fn lesson_view(&self, lesson_id: LessonId) -> Option<LessonView> {
        self.view.view.get(&lesson_id).copied()
    }

    #[must_use]
    pub fn current_lesson(&self) -> Option<LessonId> {
        self.current
    }

    /// Switch to `lesson_id` and record the visit with a debounced save.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::UnknownLesson` for lessons outside the course.
    pub async fn open_lesson(&mut self, lesson_id: LessonId) -> Result<LessonView, SessionError> {
        self.require_lesson(lesson_id)?;
        self.current = Some(lesson_id);
        let resume_offset = self
            .lesson_view(lesson_id)
            .map_or(0.0, |v| v.resume_offset);
        self.save(SaveRequest::position(lesson_id, resume_offset))
            .await?;
        Ok(self.lesson_view(lesson_id).unwrap_or(LessonView {
            completed: false,
            resume_offset,
        }))
    }

    /// Record progress locally, update the view, then hand the write to the
    /// scheduler. Remote failures are reported in the outcome, not as errors.
    ///
    /// # Errors
    ///
    /// Returns `NoCurrentLesson` when the request names no lesson and none is
    /// open, or `UnknownLesson` for lessons outside the course.
    pub async fn save(&mut self, request: SaveRequest) -> Result<SaveOutcome, SessionError> {
        let lesson_id = request
            .lesson_id
            .or(self.current)
            .ok_or(SessionError::NoCurrentLesson)?;
        self.require_lesson(lesson_id)?;

        let already_completed = self.lesson_view(lesson_id).is_some_and(|v| v.completed);
        let write = self.scheduler.write_local(
            lesson_id,
            request.completed || already_completed,
            request.video_timestamp,
        );
        self.view.apply_local(lesson_id, &write.entry, &self.lessons);

        let mode = self.scheduler.policy().mode(&request);
        Ok(self.scheduler.dispatch(write, mode).await)
    }

    /// Mark a lesson completed right away, keeping its resume position.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Remote` when the server rejects the completion;
    /// the local record stays completed. Timeouts and a missing endpoint are
    /// absorbed.
    pub async fn complete_lesson(
        &mut self,
        lesson_id: LessonId,
    ) -> Result<SaveOutcome, SessionError> {
        let resume_offset = self
            .lesson_view(lesson_id)
            .map_or(0.0, |v| v.resume_offset);
        let request = SaveRequest {
            video_timestamp: resume_offset,
            ..SaveRequest::complete(lesson_id)
        };
        let outcome = self.save(request).await?;
        match &outcome.failure {
            Some(failure) if failure.is_user_visible() => Err(failure.clone().into()),
            _ => Ok(outcome),
        }
    }

    /// Have the server grade a quiz. A passing grade marks the lesson
    /// completed locally; the server has already recorded it, so no progress
    /// save is sent.
    ///
    /// # Errors
    ///
    /// Returns `UnknownLesson` for lessons outside the course and `Remote`
    /// for every failed submission, timeouts included.
    pub async fn submit_quiz(
        &mut self,
        lesson_id: LessonId,
        answers: QuizAnswers,
        time_taken_secs: u32,
    ) -> Result<QuizGrade, SessionError> {
        self.require_lesson(lesson_id)?;
        let body = QuizSubmitRequest {
            answers,
            time_taken: time_taken_secs,
        };
        let grade = self.bounded(self.api.submit_quiz(lesson_id, &body)).await?;
        info!(
            course = %self.course_id,
            lesson = %lesson_id,
            score = grade.score,
            passed = grade.passed,
            "quiz graded"
        );
        if grade.passed {
            let resume_offset = self
                .lesson_view(lesson_id)
                .map_or(0.0, |v| v.resume_offset);
            let write = self.scheduler.write_local(lesson_id, true, resume_offset);
            self.view.apply_local(lesson_id, &write.entry, &self.lessons);
            self.scheduler.acknowledge(&write);
        }
        Ok(grade)
    }

    /// Ask the server for this course's certificate. Repeated requests return
    /// the certificate issued the first time.
    ///
    /// # Errors
    ///
    /// Returns `Remote` when the server refuses, typically because the course
    /// is not completed yet, or does not answer in time.
    pub async fn request_certificate(&self) -> Result<IssuedCertificate, SessionError> {
        let issued = self
            .bounded(self.api.issue_certificate(self.course_id))
            .await?;
        info!(
            course = %self.course_id,
            certificate = %issued.certificate.code,
            created = issued.created,
            "certificate received"
        );
        Ok(issued)
    }

    /// Send any debounced write now, e.g. before leaving the course.
    pub async fn flush(&self) -> Option<SaveOutcome> {
        self.scheduler.flush().await
    }

    pub fn cancel_pending(&self) {
        self.scheduler.cancel();
    }

    #[must_use]
    pub fn indicator(&self) -> watch::Receiver<SaveIndicator> {
        self.scheduler.subscribe()
    }

    #[must_use]
    pub fn sync_phase(&self, lesson_id: LessonId) -> Option<SyncPhase> {
        self.scheduler.phase(lesson_id)
    }

    #[must_use]
    pub fn remote_enabled(&self) -> bool {
        self.scheduler.remote_enabled()
    }

    fn require_lesson(&self, lesson_id: LessonId) -> Result<(), SessionError> {
        if self.lessons.contains(&lesson_id) {
            Ok(())
        } else {
            Err(SessionError::UnknownLesson(lesson_id))
        }
    }
}

#[cfg(test)]
mod tests {
    use lms_core::reconcile::{LessonSnapshot, LocalCacheEntry, ProgressSnapshot};
    use lms_core::scheduler::DEBOUNCE_WINDOW;
    use lms_core::time::{fixed_clock, fixed_now};

    use lms_core::model::{Certificate, CertificateId, NewCertificate, UserId};

    use super::*;
    use crate::sync::cache::{FileLocalCache, MemoryLocalCache};
    use crate::sync::scheduler::tests::RecordingApi;

    fn course() -> CourseId {
        CourseId::new(7)
    }

    fn lessons() -> Vec<LessonId> {
        (1..=4).map(LessonId::new).collect()
    }

    fn remote_with_first_two_done() -> ProgressSnapshot {
        let done = |id| LessonSnapshot {
            lesson_id: LessonId::new(id),
            completed: true,
            video_timestamp: 0.0,
            quiz_score: None,
            last_accessed_at: Some(fixed_now()),
        };
        ProgressSnapshot {
            progress: 50,
            status: ProgressStatus::InProgress,
            lessons: vec![done(1), done(2)],
            last_accessed_lesson: Some(LessonId::new(2)),
        }
    }

    async fn open(api: Arc<RecordingApi>, cache: Arc<dyn LocalCache>) -> CourseSession {
        CourseSession::open(
            course(),
            lessons(),
            api,
            cache,
            SavePolicy::default(),
            fixed_clock(),
        )
        .await
    }

    #[tokio::test(start_paused = true)]
    async fn local_entries_win_over_remote() {
        let api = Arc::new(RecordingApi::default());
        *api.snapshot.lock().unwrap() = Some(remote_with_first_two_done());
        let cache = Arc::new(MemoryLocalCache::new());
        cache
            .store(
                course(),
                LessonId::new(3),
                LocalCacheEntry {
                    completed: true,
                    video_timestamp: 95.0,
                    last_accessed_at: fixed_now(),
                    saved_at: fixed_now(),
                },
            )
            .unwrap();

        let session = open(api, cache).await;
        assert_eq!(session.progress(), 75);
        assert_eq!(session.status(), ProgressStatus::InProgress);
        assert_eq!(session.current_lesson(), Some(LessonId::new(2)));
        let third = session.lesson_view(LessonId::new(3)).unwrap();
        assert!(third.completed);
        assert!((third.resume_offset - 95.0).abs() < f64::EPSILON);
    }

    #[tokio::test(start_paused = true)]
    async fn position_ticks_never_uncomplete_a_lesson() {
        let api = Arc::new(RecordingApi::default());
        *api.snapshot.lock().unwrap() = Some(remote_with_first_two_done());
        let mut session = open(Arc::clone(&api), Arc::new(MemoryLocalCache::new())).await;

        session
            .save(SaveRequest::position(LessonId::new(1), 12.0))
            .await
            .unwrap();
        assert!(session.lesson_view(LessonId::new(1)).unwrap().completed);
        assert_eq!(session.sync_phase(LessonId::new(1)), Some(SyncPhase::Pending));

        tokio::time::sleep(DEBOUNCE_WINDOW).await;
        tokio::task::yield_now().await;
        assert_eq!(api.saves()[0].1.completed, Some(true));
        assert_eq!(session.sync_phase(LessonId::new(1)), Some(SyncPhase::Confirmed));
    }

    #[tokio::test(start_paused = true)]
    async fn completing_the_last_lessons_completes_the_view() {
        let api = Arc::new(RecordingApi::default());
        *api.snapshot.lock().unwrap() = Some(remote_with_first_two_done());
        let mut session = open(Arc::clone(&api), Arc::new(MemoryLocalCache::new())).await;

        session.complete_lesson(LessonId::new(3)).await.unwrap();
        assert_eq!(session.progress(), 75);
        session.complete_lesson(LessonId::new(4)).await.unwrap();
        assert_eq!(session.progress(), 100);
        assert_eq!(session.status(), ProgressStatus::Completed);
        assert_eq!(api.saves().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_endpoint_tracks_offline_until_reconcile() {
        let api = Arc::new(RecordingApi::default());
        api.fail_with(Some(RemoteFailure::NotFound));
        let cache = Arc::new(MemoryLocalCache::new());
        let mut session = open(Arc::clone(&api), cache.clone()).await;
        assert!(!session.remote_enabled());
        assert_eq!(session.current_lesson(), Some(LessonId::new(1)));

        let outcome = session.complete_lesson(LessonId::new(1)).await.unwrap();
        assert_eq!(outcome.phase, SyncPhase::LocalOnly);
        assert!(api.saves().is_empty());
        assert_eq!(*session.indicator().borrow(), SaveIndicator::Offline);

        api.fail_with(None);
        session.reconcile().await;
        assert!(session.remote_enabled());
        assert!(session.lesson_view(LessonId::new(1)).unwrap().completed);
        assert_eq!(session.progress(), 25);
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_completion_surfaces_but_keeps_local_state() {
        let api = Arc::new(RecordingApi::default());
        let mut session = open(Arc::clone(&api), Arc::new(MemoryLocalCache::new())).await;
        api.fail_with(Some(RemoteFailure::from_status(400, "not enrolled")));

        let err = session.complete_lesson(LessonId::new(2)).await.unwrap_err();
        assert!(matches!(err, SessionError::Remote(RemoteFailure::Validation { .. })));
        assert!(session.lesson_view(LessonId::new(2)).unwrap().completed);
        assert_eq!(session.sync_phase(LessonId::new(2)), Some(SyncPhase::LocalOnly));
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_lessons_are_rejected() {
        let api = Arc::new(RecordingApi::default());
        let mut session = open(api, Arc::new(MemoryLocalCache::new())).await;
        let err = session.open_lesson(LessonId::new(99)).await.unwrap_err();
        assert!(matches!(err, SessionError::UnknownLesson(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn unanswered_fetch_falls_back_to_the_local_cache() {
        let api = Arc::new(RecordingApi {
            hang_fetch: true,
            ..RecordingApi::default()
        });
        let cache = Arc::new(MemoryLocalCache::new());
        cache
            .store(
                course(),
                LessonId::new(2),
                LocalCacheEntry {
                    completed: true,
                    video_timestamp: 0.0,
                    last_accessed_at: fixed_now(),
                    saved_at: fixed_now(),
                },
            )
            .unwrap();

        let session = open(api, cache).await;
        assert!(session.remote_enabled());
        assert_eq!(session.progress(), 25);
        assert!(session.lesson_view(LessonId::new(2)).unwrap().completed);
    }

    #[tokio::test(start_paused = true)]
    async fn non_finite_positions_keep_the_file_cache_readable() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Arc::new(FileLocalCache::new(dir.path()));
        let api = Arc::new(RecordingApi::default());
        api.fail_with(Some(RemoteFailure::NotFound));
        let mut session = open(api, cache.clone()).await;

        session.complete_lesson(LessonId::new(1)).await.unwrap();
        session
            .save(SaveRequest::position(LessonId::new(2), f64::NAN))
            .await
            .unwrap();

        let local = cache.load(course()).unwrap();
        assert!(local[&LessonId::new(1)].completed);
        assert!(local[&LessonId::new(2)].video_timestamp.abs() < f64::EPSILON);
        let second = session.lesson_view(LessonId::new(2)).unwrap();
        assert!(second.resume_offset.abs() < f64::EPSILON);
    }

    #[tokio::test(start_paused = true)]
    async fn position_ticks_follow_the_open_lesson() {
        let api = Arc::new(RecordingApi::default());
        let mut session = open(Arc::clone(&api), Arc::new(MemoryLocalCache::new())).await;

        let first = session.save(SaveRequest::current(3.0)).await.unwrap();
        assert_eq!(first.phase, SyncPhase::Pending);
        assert_eq!(session.current_lesson(), Some(LessonId::new(1)));

        session.open_lesson(LessonId::new(3)).await.unwrap();
        session.save(SaveRequest::current(42.0)).await.unwrap();
        let third = session.lesson_view(LessonId::new(3)).unwrap();
        assert!((third.resume_offset - 42.0).abs() < f64::EPSILON);

        tokio::time::sleep(DEBOUNCE_WINDOW).await;
        tokio::task::yield_now().await;
        let (lesson, body) = *api.saves().last().unwrap();
        assert_eq!(lesson, LessonId::new(3));
        assert_eq!(body.video_timestamp, Some(42.0));
    }

    fn graded(passed: bool) -> QuizGrade {
        QuizGrade {
            score: if passed { 80 } else { 40 },
            passed,
            total_questions: 5,
            correct_answers: if passed { 4 } else { 2 },
            answers: Vec::new(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn passing_quiz_completes_the_lesson_without_a_save() {
        let api = Arc::new(RecordingApi::default());
        *api.snapshot.lock().unwrap() = Some(remote_with_first_two_done());
        let mut session = open(Arc::clone(&api), Arc::new(MemoryLocalCache::new())).await;

        *api.grade.lock().unwrap() = Some(graded(false));
        let failed = session
            .submit_quiz(LessonId::new(3), QuizAnswers::new().with(0, 1), 30)
            .await
            .unwrap();
        assert!(!failed.passed);
        assert!(!session.lesson_view(LessonId::new(3)).unwrap().completed);

        *api.grade.lock().unwrap() = Some(graded(true));
        let grade = session
            .submit_quiz(LessonId::new(3), QuizAnswers::new().with(0, 2), 25)
            .await
            .unwrap();
        assert_eq!(grade.score, 80);
        assert!(session.lesson_view(LessonId::new(3)).unwrap().completed);
        assert_eq!(session.progress(), 75);
        assert_eq!(session.sync_phase(LessonId::new(3)), Some(SyncPhase::Confirmed));
        assert!(api.saves().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn quiz_failures_are_errors() {
        let api = Arc::new(RecordingApi::default());
        let mut session = open(Arc::clone(&api), Arc::new(MemoryLocalCache::new())).await;

        let err = session
            .submit_quiz(LessonId::new(9), QuizAnswers::new(), 0)
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::UnknownLesson(_)));

        api.fail_with(Some(RemoteFailure::from_status(400, "lesson is not a quiz")));
        let err = session
            .submit_quiz(LessonId::new(1), QuizAnswers::new(), 0)
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Remote(RemoteFailure::Validation { .. })));
        assert!(!session.lesson_view(LessonId::new(1)).unwrap().completed);
    }

    #[tokio::test(start_paused = true)]
    async fn certificate_follows_course_completion() {
        let api = Arc::new(RecordingApi::default());
        *api.snapshot.lock().unwrap() = Some(remote_with_first_two_done());
        let mut session = open(Arc::clone(&api), Arc::new(MemoryLocalCache::new())).await;

        let err = session.request_certificate().await.unwrap_err();
        assert!(matches!(err, SessionError::Remote(RemoteFailure::Validation { .. })));

        session.complete_lesson(LessonId::new(3)).await.unwrap();
        session.complete_lesson(LessonId::new(4)).await.unwrap();
        assert_eq!(session.status(), ProgressStatus::Completed);

        let certificate: Certificate =
            NewCertificate::issue(UserId::new(1), course(), fixed_now())
                .assign_id(CertificateId::new(1));
        *api.certificate.lock().unwrap() = Some(IssuedCertificate {
            certificate: certificate.clone(),
            created: true,
        });
        let issued = session.request_certificate().await.unwrap();
        assert_eq!(issued.certificate, certificate);
        assert!(issued.created);
    }
}
