use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::ids::{CourseId, LessonId, UserId};
use crate::quiz::is_passing;

//
// ─── STATUS ────────────────────────────────────────────────────────────────────
//

/// Lifecycle of a learner's progress through a whole course.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProgressStatus {
    #[default]
    NotStarted,
    InProgress,
    Completed,
}

impl ProgressStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ProgressStatus::NotStarted => "not-started",
            ProgressStatus::InProgress => "in-progress",
            ProgressStatus::Completed => "completed",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "not-started" => Some(Self::NotStarted),
            "in-progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }
}

/// Per-lesson completion state, derived from a `LessonProgress` entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LessonState {
    NotStarted,
    InProgress,
    Completed,
}

/// Whether a completion request changed anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Newly,
    Already,
}

//
// ─── PERCENTAGE ────────────────────────────────────────────────────────────────
//

/// `round(100 * completed / total)`, half away from zero, clamped to 100.
///
/// Zero lessons yields 0.
#[must_use]
pub fn completion_percent(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let completed = completed.min(total) as u64;
    let total = total as u64;
    let pct = (200 * completed + total) / (2 * total);
    u8::try_from(pct.min(100)).unwrap_or(100)
}

/// Resume offset for a reported video position: non-finite or negative
/// values become 0.
#[must_use]
pub fn clamp_video_timestamp(ts: f64) -> f64 {
    if ts.is_finite() { ts.max(0.0) } else { 0.0 }
}

//
// ─── LESSON PROGRESS ───────────────────────────────────────────────────────────
//

/// One learner's state for one lesson.
#[derive(Debug, Clone, PartialEq)]
pub struct LessonProgress {
    pub lesson_id: LessonId,
    pub completed: bool,
    /// Set on the first transition to completed and never rewritten.
    pub completed_at: Option<DateTime<Utc>>,
    pub last_accessed_at: DateTime<Utc>,
    /// Seconds into the video to resume from.
    pub video_timestamp: f64,
    /// Score of the most recent quiz attempt.
    pub quiz_score: Option<u8>,
    pub quiz_attempts: u32,
}

impl LessonProgress {
    #[must_use]
    pub fn accessed(lesson_id: LessonId, now: DateTime<Utc>) -> Self {
        Self {
            lesson_id,
            completed: false,
            completed_at: None,
            last_accessed_at: now,
            video_timestamp: 0.0,
            quiz_score: None,
            quiz_attempts: 0,
        }
    }

    #[must_use]
    pub fn state(&self) -> LessonState {
        if self.completed {
            LessonState::Completed
        } else {
            LessonState::InProgress
        }
    }

    /// Moves the lesson to completed. Repeat calls are no-ops.
    pub fn mark_completed(&mut self, now: DateTime<Utc>) -> Completion {
        if self.completed {
            return Completion::Already;
        }
        self.completed = true;
        if self.completed_at.is_none() {
            self.completed_at = Some(now);
        }
        Completion::Newly
    }

    /// Records a quiz attempt; a passing score completes the lesson.
    ///
    /// A failing retake after completion keeps the lesson completed.
    pub fn record_quiz_attempt(&mut self, score: u8, now: DateTime<Utc>) -> Option<Completion> {
        self.quiz_score = Some(score);
        self.quiz_attempts = self.quiz_attempts.saturating_add(1);
        self.last_accessed_at = now;
        is_passing(score).then(|| self.mark_completed(now))
    }
}

/// Fields a client may send for one lesson. Absent fields are left untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LessonUpdate {
    pub completed: Option<bool>,
    pub video_timestamp: Option<f64>,
    pub quiz_score: Option<u8>,
    /// Seconds spent since the previous update, added to the course total.
    pub time_spent_secs: Option<u64>,
}

/// Result of applying a lesson update to a course record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UpdateOutcome {
    pub lesson_newly_completed: bool,
    pub course_newly_completed: bool,
}

//
// ─── ENROLLMENT PROGRESS ───────────────────────────────────────────────────────
//

/// Authoritative progress record for one (user, course) pair.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrollmentProgress {
    pub user_id: UserId,
    pub course_id: CourseId,
    percent: u8,
    status: ProgressStatus,
    pub started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    pub last_accessed_at: DateTime<Utc>,
    pub last_accessed_lesson: Option<LessonId>,
    lessons: Vec<LessonProgress>,
    pub total_time_spent_secs: u64,
}

impl EnrollmentProgress {
    #[must_use]
    pub fn new(user_id: UserId, course_id: CourseId, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            course_id,
            percent: 0,
            status: ProgressStatus::NotStarted,
            started_at: now,
            completed_at: None,
            last_accessed_at: now,
            last_accessed_lesson: None,
            lessons: Vec::new(),
            total_time_spent_secs: 0,
        }
    }

    /// Rehydrate a record from storage without re-deriving anything.
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn from_persisted(
        user_id: UserId,
        course_id: CourseId,
        percent: u8,
        status: ProgressStatus,
        started_at: DateTime<Utc>,
        completed_at: Option<DateTime<Utc>>,
        last_accessed_at: DateTime<Utc>,
        last_accessed_lesson: Option<LessonId>,
        lessons: Vec<LessonProgress>,
        total_time_spent_secs: u64,
    ) -> Self {
        Self {
            user_id,
            course_id,
            percent: percent.min(100),
            status,
            started_at,
            completed_at,
            last_accessed_at,
            last_accessed_lesson,
            lessons,
            total_time_spent_secs,
        }
    }

    #[must_use]
    pub fn percent(&self) -> u8 {
        self.percent
    }

    #[must_use]
    pub fn status(&self) -> ProgressStatus {
        self.status
    }

    #[must_use]
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    #[must_use]
    pub fn lessons(&self) -> &[LessonProgress] {
        &self.lessons
    }

    #[must_use]
    pub fn lesson(&self, lesson_id: LessonId) -> Option<&LessonProgress> {
        self.lessons.iter().find(|l| l.lesson_id == lesson_id)
    }

    #[must_use]
    pub fn lesson_state(&self, lesson_id: LessonId) -> LessonState {
        self.lesson(lesson_id)
            .map_or(LessonState::NotStarted, LessonProgress::state)
    }

    /// Registers a view of `lesson_id`, creating its entry on first access.
    pub fn record_access(&mut self, lesson_id: LessonId, now: DateTime<Utc>) -> &mut LessonProgress {
        if self.status == ProgressStatus::NotStarted {
            self.status = ProgressStatus::InProgress;
        }
        self.last_accessed_at = now;
        self.last_accessed_lesson = Some(lesson_id);

        let idx = match self.lessons.iter().position(|l| l.lesson_id == lesson_id) {
            Some(idx) => {
                self.lessons[idx].last_accessed_at = now;
                idx
            }
            None => {
                self.lessons.push(LessonProgress::accessed(lesson_id, now));
                self.lessons.len() - 1
            }
        };
        &mut self.lessons[idx]
    }

    /// Applies a client update and re-derives the course percentage against
    /// `course_lessons`.
    ///
    /// `completed: Some(false)` never reverts a completed lesson.
    pub fn apply_update(
        &mut self,
        lesson_id: LessonId,
        update: LessonUpdate,
        course_lessons: &[LessonId],
        now: DateTime<Utc>,
    ) -> UpdateOutcome {
        if let Some(secs) = update.time_spent_secs {
            self.add_time_spent(secs);
        }
        let entry = self.record_access(lesson_id, now);
        if let Some(ts) = update.video_timestamp {
            entry.video_timestamp = clamp_video_timestamp(ts);
        }
        if let Some(score) = update.quiz_score {
            entry.quiz_score = Some(score.min(100));
        }
        let lesson_newly_completed =
            update.completed == Some(true) && entry.mark_completed(now) == Completion::Newly;

        let course_newly_completed = self.recompute(course_lessons, now);
        UpdateOutcome {
            lesson_newly_completed,
            course_newly_completed,
        }
    }

    /// Records a graded quiz attempt for `lesson_id`.
    pub fn apply_quiz_attempt(
        &mut self,
        lesson_id: LessonId,
        score: u8,
        course_lessons: &[LessonId],
        now: DateTime<Utc>,
    ) -> UpdateOutcome {
        let entry = self.record_access(lesson_id, now);
        let lesson_newly_completed =
            entry.record_quiz_attempt(score, now) == Some(Completion::Newly);
        let course_newly_completed = self.recompute(course_lessons, now);
        UpdateOutcome {
            lesson_newly_completed,
            course_newly_completed,
        }
    }

    pub fn add_time_spent(&mut self, secs: u64) {
        self.total_time_spent_secs = self.total_time_spent_secs.saturating_add(secs);
    }

    /// Completed entries that belong to `course_lessons`.
    #[must_use]
    pub fn completed_count(&self, course_lessons: &[LessonId]) -> usize {
        let wanted: BTreeSet<LessonId> = course_lessons.iter().copied().collect();
        self.lessons
            .iter()
            .filter(|l| l.completed && wanted.contains(&l.lesson_id))
            .count()
    }

    /// Re-derives the percentage and status. Returns true on the transition
    /// into `Completed`; completed stays terminal.
    pub fn recompute(&mut self, course_lessons: &[LessonId], now: DateTime<Utc>) -> bool {
        let total = course_lessons.iter().collect::<BTreeSet<_>>().len();
        let completed = self.completed_count(course_lessons);
        self.percent = completion_percent(completed, total);

        if self.status == ProgressStatus::Completed {
            return false;
        }
        if total > 0 && completed == total {
            self.status = ProgressStatus::Completed;
            self.completed_at = Some(now);
            return true;
        }
        if !self.lessons.is_empty() {
            self.status = ProgressStatus::InProgress;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;
    use chrono::Duration;

    fn ids(n: u64) -> Vec<LessonId> {
        (1..=n).map(LessonId::new).collect()
    }

    fn complete() -> LessonUpdate {
        LessonUpdate {
            completed: Some(true),
            ..LessonUpdate::default()
        }
    }

    #[test]
    fn percent_rounds_to_nearest() {
        assert_eq!(completion_percent(0, 0), 0);
        assert_eq!(completion_percent(1, 3), 33);
        assert_eq!(completion_percent(2, 3), 67);
        assert_eq!(completion_percent(1, 8), 13);
        assert_eq!(completion_percent(3, 4), 75);
        assert_eq!(completion_percent(5, 4), 100);
    }

    #[test]
    fn video_positions_are_clamped() {
        assert!((clamp_video_timestamp(42.5) - 42.5).abs() < f64::EPSILON);
        assert!(clamp_video_timestamp(-3.0).abs() < f64::EPSILON);
        assert!(clamp_video_timestamp(f64::NAN).abs() < f64::EPSILON);
        assert!(clamp_video_timestamp(f64::INFINITY).abs() < f64::EPSILON);
    }

    #[test]
    fn first_access_moves_to_in_progress() {
        let now = fixed_now();
        let mut p = EnrollmentProgress::new(UserId::new(1), CourseId::new(1), now);
        assert_eq!(p.status(), ProgressStatus::NotStarted);
        assert_eq!(p.lesson_state(LessonId::new(1)), LessonState::NotStarted);

        p.record_access(LessonId::new(1), now);
        assert_eq!(p.status(), ProgressStatus::InProgress);
        assert_eq!(p.lesson_state(LessonId::new(1)), LessonState::InProgress);
        assert_eq!(p.last_accessed_lesson, Some(LessonId::new(1)));
    }

    #[test]
    fn four_lessons_three_then_four_completed() {
        let now = fixed_now();
        let lessons = ids(4);
        let mut p = EnrollmentProgress::new(UserId::new(1), CourseId::new(1), now);

        for id in 1..=3 {
            let out = p.apply_update(LessonId::new(id), complete(), &lessons, now);
            assert!(out.lesson_newly_completed);
            assert!(!out.course_newly_completed);
        }
        assert_eq!(p.percent(), 75);
        assert_eq!(p.status(), ProgressStatus::InProgress);

        let out = p.apply_update(LessonId::new(4), complete(), &lessons, now);
        assert!(out.course_newly_completed);
        assert_eq!(p.percent(), 100);
        assert_eq!(p.status(), ProgressStatus::Completed);
        assert_eq!(p.completed_at(), Some(now));

        let again = p.apply_update(LessonId::new(4), complete(), &lessons, now);
        assert_eq!(again, UpdateOutcome::default());
    }

    #[test]
    fn completion_timestamp_is_immutable_and_state_is_sticky() {
        let now = fixed_now();
        let later = now + Duration::hours(2);
        let lessons = ids(2);
        let mut p = EnrollmentProgress::new(UserId::new(1), CourseId::new(1), now);
        p.apply_update(LessonId::new(1), complete(), &lessons, now);

        let revert = LessonUpdate {
            completed: Some(false),
            video_timestamp: Some(42.5),
            ..LessonUpdate::default()
        };
        p.apply_update(LessonId::new(1), revert, &lessons, later);
        p.apply_update(LessonId::new(1), complete(), &lessons, later);

        let entry = p.lesson(LessonId::new(1)).unwrap();
        assert!(entry.completed);
        assert_eq!(entry.completed_at, Some(now));
        assert_eq!(entry.last_accessed_at, later);
        assert!((entry.video_timestamp - 42.5).abs() < f64::EPSILON);
    }

    #[test]
    fn failing_retake_after_pass_keeps_completion_but_records_score() {
        let now = fixed_now();
        let lessons = ids(2);
        let mut p = EnrollmentProgress::new(UserId::new(1), CourseId::new(1), now);

        let out = p.apply_quiz_attempt(LessonId::new(2), 69, &lessons, now);
        assert!(!out.lesson_newly_completed);
        assert_eq!(p.lesson_state(LessonId::new(2)), LessonState::InProgress);

        let out = p.apply_quiz_attempt(LessonId::new(2), 70, &lessons, now);
        assert!(out.lesson_newly_completed);

        let out = p.apply_quiz_attempt(LessonId::new(2), 10, &lessons, now);
        assert!(!out.lesson_newly_completed);
        let entry = p.lesson(LessonId::new(2)).unwrap();
        assert!(entry.completed);
        assert_eq!(entry.quiz_score, Some(10));
        assert_eq!(entry.quiz_attempts, 3);
    }

    #[test]
    fn completed_course_stays_completed_when_lessons_are_added() {
        let now = fixed_now();
        let mut p = EnrollmentProgress::new(UserId::new(1), CourseId::new(1), now);
        p.apply_update(LessonId::new(1), complete(), &ids(1), now);
        assert_eq!(p.status(), ProgressStatus::Completed);

        assert!(!p.recompute(&ids(2), now));
        assert_eq!(p.percent(), 50);
        assert_eq!(p.status(), ProgressStatus::Completed);
    }

    #[test]
    fn entries_outside_the_lesson_list_are_not_counted() {
        let now = fixed_now();
        let mut p = EnrollmentProgress::new(UserId::new(1), CourseId::new(1), now);
        p.apply_update(LessonId::new(99), complete(), &ids(2), now);
        assert_eq!(p.percent(), 0);
        assert_eq!(p.status(), ProgressStatus::InProgress);
    }
}
