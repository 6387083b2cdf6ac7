use std::sync::Arc;

use lms_core::model::{LessonId, QuizQuestion, UserId};
use lms_core::quiz::{QuizAnswers, QuizAttempt, QuizGrade, grade};
use storage::repository::QuizResultRepository;
use tracing::info;

use crate::Clock;
use crate::error::QuizServiceError;
use crate::progress_service::{ProgressChange, ProgressService};

/// A graded submission together with its effect on course progress.
#[derive(Debug, Clone, PartialEq)]
pub struct QuizSubmission {
    pub grade: QuizGrade,
    pub change: ProgressChange,
}

/// Grades quiz submissions and keeps the attempt history.
#[derive(Clone)]
pub struct QuizService {
    clock: Clock,
    results: Arc<dyn QuizResultRepository>,
    progress: ProgressService,
}

impl QuizService {
    #[must_use]
    pub fn new(
        clock: Clock,
        results: Arc<dyn QuizResultRepository>,
        progress: ProgressService,
    ) -> Self {
        Self {
            clock,
            results,
            progress,
        }
    }

    /// Grade and store a submission. A passing score completes the lesson.
    ///
    /// # Errors
    ///
    /// Returns `LessonNotFound`, `NotAQuiz`, or `NoQuestions` when the lesson
    /// cannot be graded, `UnknownQuestion`/`UnknownOption` for answers outside
    /// the question bank, `Progress` when the user is not enrolled, or
    /// `Storage` on repository failures.
    pub async fn submit(
        &self,
        user_id: UserId,
        lesson_id: LessonId,
        answers: QuizAnswers,
        time_taken_secs: u32,
    ) -> Result<QuizSubmission, QuizServiceError> {
        let lesson = self.progress.lesson(lesson_id).await.map_err(|e| match e {
            crate::error::ProgressServiceError::LessonNotFound(id) => {
                QuizServiceError::LessonNotFound(id)
            }
            other => QuizServiceError::Progress(other),
        })?;
        let questions = lesson
            .quiz_questions()
            .ok_or(QuizServiceError::NotAQuiz(lesson_id))?;
        if questions.is_empty() {
            return Err(QuizServiceError::NoQuestions(lesson_id));
        }
        validate_answers(questions, &answers)?;
        self.progress
            .ensure_enrolled(user_id, lesson.course_id())
            .await?;

        let graded = grade(questions, &answers);
        let attempt = QuizAttempt::from_grade(
            user_id,
            lesson_id,
            answers,
            &graded,
            time_taken_secs,
            self.clock.now(),
        );
        self.results.append_attempt(&attempt).await?;
        info!(
            user = %user_id,
            lesson = %lesson_id,
            score = graded.score,
            passed = graded.passed,
            "quiz submitted"
        );

        let change = self
            .progress
            .record_quiz_attempt(user_id, &lesson, graded.score)
            .await?;
        Ok(QuizSubmission {
            grade: graded,
            change,
        })
    }

    /// Attempts for (user, lesson), newest first.
    ///
    /// # Errors
    ///
    /// Returns `QuizServiceError::Storage` if repository access fails.
    pub async fn results(
        &self,
        user_id: UserId,
        lesson_id: LessonId,
    ) -> Result<Vec<QuizAttempt>, QuizServiceError> {
        Ok(self.results.attempts_for_lesson(user_id, lesson_id).await?)
    }

    /// Highest-scoring attempt; the newest wins a tie.
    ///
    /// # Errors
    ///
    /// Returns `QuizServiceError::Storage` if repository access fails.
    pub async fn best_result(
        &self,
        user_id: UserId,
        lesson_id: LessonId,
    ) -> Result<Option<QuizAttempt>, QuizServiceError> {
        let attempts = self.results(user_id, lesson_id).await?;
        Ok(best_of(attempts))
    }
}

fn best_of(newest_first: Vec<QuizAttempt>) -> Option<QuizAttempt> {
    let mut best: Option<QuizAttempt> = None;
    for attempt in newest_first {
        if best.as_ref().is_none_or(|b| attempt.score > b.score) {
            best = Some(attempt);
        }
    }
    best
}

fn validate_answers(
    questions: &[QuizQuestion],
    answers: &QuizAnswers,
) -> Result<(), QuizServiceError> {
    for index in answers.question_indices() {
        let question = questions
            .get(index)
            .ok_or(QuizServiceError::UnknownQuestion { index })?;
        if let Some(option) = answers.get(index)
            && option >= question.options.len()
        {
            return Err(QuizServiceError::UnknownOption { index, option });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lms_core::time::fixed_now;

    fn attempt(score: u8, minute: i64) -> QuizAttempt {
        QuizAttempt {
            user_id: UserId::new(1),
            lesson_id: LessonId::new(1),
            answers: QuizAnswers::new(),
            score,
            passed: score >= 70,
            total_questions: 2,
            correct_answers: 0,
            time_taken_secs: 0,
            submitted_at: fixed_now() + chrono::Duration::minutes(minute),
        }
    }

    #[test]
    fn best_prefers_score_then_newest() {
        let newest_first = vec![attempt(80, 3), attempt(90, 2), attempt(90, 1)];
        let best = best_of(newest_first).unwrap();
        assert_eq!(best.score, 90);
        assert_eq!(best.submitted_at, fixed_now() + chrono::Duration::minutes(2));
        assert!(best_of(Vec::new()).is_none());
    }

    #[test]
    fn answers_must_point_into_the_bank() {
        let bank = vec![QuizQuestion::new(
            "q",
            vec!["a".into(), "b".into()],
            0,
            None,
        )];
        assert!(validate_answers(&bank, &QuizAnswers::new().with(0, 1)).is_ok());
        assert!(matches!(
            validate_answers(&bank, &QuizAnswers::new().with(1, 0)),
            Err(QuizServiceError::UnknownQuestion { index: 1 })
        ));
        assert!(matches!(
            validate_answers(&bank, &QuizAnswers::new().with(0, 2)),
            Err(QuizServiceError::UnknownOption { index: 0, option: 2 })
        ));
    }
}
