use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use lms_core::model::{
    Course, CourseId, Enrollment, EnrollmentProgress, Lesson, ProgressStatus, RatingSummary,
    UserId, completion_percent,
};
use storage::repository::{
    CourseRepository, EnrollmentRepository, LessonRepository, ProgressRepository,
    RatingRepository,
};

use crate::Clock;
use crate::course_service::CourseService;
use crate::error::CourseServiceError;
use crate::wire::{
    CourseAnalytics, CoursePerformance, InstructorOverview, LessonCompletionStat,
    StudentProgressRow,
};

/// Days a learner counts as active on the per-course report.
pub const COURSE_ACTIVE_DAYS: i64 = 7;
/// Days a learner counts as active on the instructor overview.
pub const OVERVIEW_ACTIVE_DAYS: i64 = 30;

/// Enrollment and progress reports for instructors.
#[derive(Clone)]
pub struct AnalyticsService {
    clock: Clock,
    catalog: CourseService,
    courses: Arc<dyn CourseRepository>,
    lessons: Arc<dyn LessonRepository>,
    enrollments: Arc<dyn EnrollmentRepository>,
    progress: Arc<dyn ProgressRepository>,
    ratings: Arc<dyn RatingRepository>,
}

impl AnalyticsService {
    #[must_use]
    pub fn new(
        clock: Clock,
        catalog: CourseService,
        courses: Arc<dyn CourseRepository>,
        lessons: Arc<dyn LessonRepository>,
        enrollments: Arc<dyn EnrollmentRepository>,
        progress: Arc<dyn ProgressRepository>,
        ratings: Arc<dyn RatingRepository>,
    ) -> Self {
        Self {
            clock,
            catalog,
            courses,
            lessons,
            enrollments,
            progress,
            ratings,
        }
    }

    /// Report for one course taught by `user_id`.
    ///
    /// # Errors
    ///
    /// Returns `CourseNotFound`, `NotInstructor`, or `Storage` if repository
    /// access fails.
    pub async fn course(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<CourseAnalytics, CourseServiceError> {
        let course = self.catalog.owned_course(user_id, course_id).await?;
        let lessons = self.lessons.lessons_for_course(course_id).await?;
        let enrollments = self.enrollments.enrollments_for_course(course_id).await?;
        let progress = self.progress.progress_for_course(course_id).await?;
        Ok(course_analytics(
            &course,
            &lessons,
            &enrollments,
            &progress,
            self.clock.now(),
        ))
    }

    /// Totals across every course taught by `user_id`.
    ///
    /// # Errors
    ///
    /// Returns `CourseServiceError::Storage` if repository access fails.
    pub async fn overview(&self, user_id: UserId) -> Result<InstructorOverview, CourseServiceError> {
        let since = self.clock.now() - Duration::days(OVERVIEW_ACTIVE_DAYS);
        let taught = self.taught_by(user_id).await?;

        let mut students = HashSet::new();
        let mut active = HashSet::new();
        let mut total_revenue_cents = 0;
        let mut course_performance = Vec::with_capacity(taught.len());
        for course in &taught {
            let enrollments = self.enrollments.enrollments_for_course(course.id()).await?;
            let progress = enrolled_progress(
                &enrollments,
                self.progress.progress_for_course(course.id()).await?,
            );
            let stars = self.ratings.rating_stars(course.id()).await?;

            students.extend(enrollments.iter().map(|e| e.user_id));
            active.extend(
                progress
                    .iter()
                    .filter(|p| p.last_accessed_at >= since)
                    .map(|p| p.user_id),
            );
            let completed = completed_count(&progress);
            let revenue_cents = revenue(course, enrollments.len());
            total_revenue_cents += revenue_cents;
            course_performance.push(CoursePerformance {
                course_id: course.id(),
                title: course.title().to_owned(),
                enrolled: enrollments.len(),
                completed,
                completion_rate: completion_percent(completed, enrollments.len()),
                revenue_cents,
                average_rating: RatingSummary::from_stars(stars).average,
            });
        }

        Ok(InstructorOverview {
            total_courses: taught.len(),
            total_students: students.len(),
            active_students: active.len(),
            total_revenue_cents,
            course_performance,
        })
    }

    /// Every learner's progress in courses taught by `user_id`, most recently
    /// active first.
    ///
    /// # Errors
    ///
    /// Returns `CourseServiceError::Storage` if repository access fails.
    pub async fn students_progress(
        &self,
        user_id: UserId,
    ) -> Result<Vec<StudentProgressRow>, CourseServiceError> {
        let mut rows = Vec::new();
        for course in self.taught_by(user_id).await? {
            for p in self.progress.progress_for_course(course.id()).await? {
                rows.push(StudentProgressRow {
                    user_id: p.user_id,
                    course_id: course.id(),
                    course_title: course.title().to_owned(),
                    progress: p.percent(),
                    status: p.status(),
                    last_accessed_at: p.last_accessed_at,
                    total_time_spent: p.total_time_spent_secs,
                });
            }
        }
        rows.sort_by(|a, b| {
            b.last_accessed_at
                .cmp(&a.last_accessed_at)
                .then_with(|| a.course_id.cmp(&b.course_id))
                .then_with(|| a.user_id.cmp(&b.user_id))
        });
        Ok(rows)
    }

    async fn taught_by(&self, user_id: UserId) -> Result<Vec<Course>, CourseServiceError> {
        Ok(self
            .courses
            .list_courses()
            .await?
            .into_iter()
            .filter(|c| c.instructor() == user_id)
            .collect())
    }
}

/// Progress records of learners who are still enrolled.
fn enrolled_progress(
    enrollments: &[Enrollment],
    progress: Vec<EnrollmentProgress>,
) -> Vec<EnrollmentProgress> {
    let enrolled: HashSet<UserId> = enrollments.iter().map(|e| e.user_id).collect();
    progress
        .into_iter()
        .filter(|p| enrolled.contains(&p.user_id))
        .collect()
}

fn completed_count(progress: &[EnrollmentProgress]) -> usize {
    progress
        .iter()
        .filter(|p| p.status() == ProgressStatus::Completed)
        .count()
}

/// List price times enrolled learners; payment state is not tracked here.
fn revenue(course: &Course, enrolled: usize) -> u64 {
    u64::from(course.price_cents()) * enrolled as u64
}

/// `total / count` in tenths, rounded half up.
fn tenths(total: u64, count: u64) -> f64 {
    if count == 0 {
        return 0.0;
    }
    let tenths = (20 * total + count) / (2 * count);
    tenths as f64 / 10.0
}

fn course_analytics(
    course: &Course,
    lessons: &[Lesson],
    enrollments: &[Enrollment],
    progress: &[EnrollmentProgress],
    now: DateTime<Utc>,
) -> CourseAnalytics {
    let progress = enrolled_progress(enrollments, progress.to_vec());
    let total_students = enrollments.len();
    let students = total_students as u64;
    let since = now - Duration::days(COURSE_ACTIVE_DAYS);

    let percent_sum: u64 = progress.iter().map(|p| u64::from(p.percent())).sum();
    let time_sum: u64 = progress.iter().map(|p| p.total_time_spent_secs).sum();
    let average_time_spent = if students == 0 {
        0
    } else {
        (2 * time_sum + students) / (2 * students)
    };
    let quiz_scores: Vec<u64> = progress
        .iter()
        .flat_map(|p| p.lessons().iter().filter_map(|l| l.quiz_score))
        .map(u64::from)
        .collect();
    let average_quiz_score = (!quiz_scores.is_empty())
        .then(|| tenths(quiz_scores.iter().sum(), quiz_scores.len() as u64));

    let lesson_completion = lessons
        .iter()
        .map(|lesson| {
            let completed_count = progress
                .iter()
                .filter(|p| p.lesson(lesson.id()).is_some_and(|l| l.completed))
                .count();
            LessonCompletionStat {
                lesson_id: lesson.id(),
                lesson_title: lesson.title().to_owned(),
                completed_count,
                completion_rate: completion_percent(completed_count, total_students),
            }
        })
        .collect();

    CourseAnalytics {
        course_id: course.id(),
        title: course.title().to_owned(),
        total_students,
        completed_students: completed_count(&progress),
        active_students: progress.iter().filter(|p| p.last_accessed_at >= since).count(),
        average_completion_rate: tenths(percent_sum, students),
        average_time_spent,
        average_quiz_score,
        total_revenue_cents: revenue(course, total_students),
        lesson_completion,
    }
}

#[cfg(test)]
mod tests {
    use lms_core::model::{CourseLevel, LessonId, LessonKind, LessonUpdate};
    use lms_core::time::fixed_now;

    use super::*;

    fn course() -> Course {
        Course::new(
            CourseId::new(1),
            "Sketching",
            "Lines and shading",
            UserId::new(50),
            "art",
            CourseLevel::Beginner,
            2_500,
            true,
            fixed_now(),
        )
        .unwrap()
    }

    fn lessons() -> Vec<Lesson> {
        (1..=2)
            .map(|id| {
                Lesson::new(
                    LessonId::new(id),
                    CourseId::new(1),
                    format!("Part {id}"),
                    u32::try_from(id).unwrap(),
                    5,
                    LessonKind::Article { body: "text".into() },
                )
                .unwrap()
            })
            .collect()
    }

    fn learner(
        user: u64,
        completed: &[u64],
        quiz_score: Option<u8>,
        last_seen: DateTime<Utc>,
    ) -> (Enrollment, EnrollmentProgress) {
        let ids = [LessonId::new(1), LessonId::new(2)];
        let user_id = UserId::new(user);
        let enrollment = Enrollment::for_course(user_id, &course(), fixed_now());
        let mut p = EnrollmentProgress::new(user_id, CourseId::new(1), fixed_now());
        for &lesson in completed {
            p.apply_update(
                LessonId::new(lesson),
                LessonUpdate {
                    completed: Some(true),
                    quiz_score,
                    time_spent_secs: Some(60),
                    ..LessonUpdate::default()
                },
                &ids,
                last_seen,
            );
        }
        (enrollment, p)
    }

    #[test]
    fn course_report_counts_completion_and_activity() {
        let now = fixed_now() + Duration::days(20);
        let (e1, p1) = learner(1, &[1, 2], Some(90), now - Duration::days(1));
        let (e2, p2) = learner(2, &[1], Some(70), now - Duration::days(10));
        let (e3, _) = learner(3, &[], None, now);

        let report = course_analytics(
            &course(),
            &lessons(),
            &[e1, e2, e3],
            &[p1, p2],
            now,
        );
        assert_eq!(report.total_students, 3);
        assert_eq!(report.completed_students, 1);
        assert_eq!(report.active_students, 1);
        // (100 + 50 + 0) / 3
        assert!((report.average_completion_rate - 50.0).abs() < f64::EPSILON);
        // 180 seconds over 3 learners
        assert_eq!(report.average_time_spent, 60);
        assert_eq!(report.average_quiz_score, Some(83.3));
        assert_eq!(report.total_revenue_cents, 7_500);
        assert_eq!(report.lesson_completion[0].completed_count, 2);
        assert_eq!(report.lesson_completion[0].completion_rate, 67);
        assert_eq!(report.lesson_completion[1].completion_rate, 33);
    }

    #[test]
    fn empty_course_reports_zeros() {
        let report = course_analytics(&course(), &lessons(), &[], &[], fixed_now());
        assert_eq!(report.total_students, 0);
        assert!(report.average_completion_rate.abs() < f64::EPSILON);
        assert_eq!(report.average_quiz_score, None);
        assert_eq!(report.lesson_completion[1].completion_rate, 0);
    }

    #[test]
    fn tenths_round_half_up() {
        assert!((tenths(250, 3) - 83.3).abs() < f64::EPSILON);
        assert!((tenths(1, 20) - 0.1).abs() < f64::EPSILON);
        assert!(tenths(5, 0).abs() < f64::EPSILON);
    }
}
