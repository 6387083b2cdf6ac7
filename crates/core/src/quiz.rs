//! Quiz grading.
//!
//! Score is the point-weighted share of correctly answered questions,
//! `round(100 * earned / total)`. Unanswered questions earn nothing.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{LessonId, QuizQuestion, UserId};

/// Minimum score that passes a quiz.
pub const PASSING_SCORE: u8 = 70;

#[must_use]
pub fn is_passing(score: u8) -> bool {
    score >= PASSING_SCORE
}

/// Selected option per question index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuizAnswers(BTreeMap<usize, usize>);

impl QuizAnswers {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, question: usize, option: usize) -> Self {
        self.0.insert(question, option);
        self
    }

    #[must_use]
    pub fn get(&self, question: usize) -> Option<usize> {
        self.0.get(&question).copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn question_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.0.keys().copied()
    }
}

impl FromIterator<(usize, usize)> for QuizAnswers {
    fn from_iter<T: IntoIterator<Item = (usize, usize)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Per-question breakdown for the review screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionReview {
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: usize,
    pub user_answer: Option<usize>,
    pub is_correct: bool,
    pub points: u32,
}

/// Outcome of grading one submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizGrade {
    pub score: u8,
    pub passed: bool,
    pub total_questions: usize,
    pub correct_answers: usize,
    pub answers: Vec<QuestionReview>,
}

/// Grades `answers` against `questions`.
#[must_use]
pub fn grade(questions: &[QuizQuestion], answers: &QuizAnswers) -> QuizGrade {
    let mut total_points = 0_u64;
    let mut earned_points = 0_u64;
    let mut correct_answers = 0_usize;
    let mut reviews = Vec::with_capacity(questions.len());

    for (index, question) in questions.iter().enumerate() {
        let user_answer = answers.get(index);
        let is_correct = user_answer == Some(question.correct_answer);
        total_points += u64::from(question.points);
        if is_correct {
            earned_points += u64::from(question.points);
            correct_answers += 1;
        }
        reviews.push(QuestionReview {
            question: question.question.clone(),
            options: question.options.clone(),
            correct_answer: question.correct_answer,
            user_answer,
            is_correct,
            points: question.points,
        });
    }

    let score = weighted_score(earned_points, total_points);
    QuizGrade {
        score,
        passed: is_passing(score),
        total_questions: questions.len(),
        correct_answers,
        answers: reviews,
    }
}

fn weighted_score(earned: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    let pct = (200 * earned.min(total) + total) / (2 * total);
    u8::try_from(pct).unwrap_or(100)
}

/// A persisted quiz submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizAttempt {
    pub user_id: UserId,
    pub lesson_id: LessonId,
    pub answers: QuizAnswers,
    pub score: u8,
    pub passed: bool,
    pub total_questions: usize,
    pub correct_answers: usize,
    pub time_taken_secs: u32,
    pub submitted_at: DateTime<Utc>,
}

impl QuizAttempt {
    #[must_use]
    pub fn from_grade(
        user_id: UserId,
        lesson_id: LessonId,
        answers: QuizAnswers,
        grade: &QuizGrade,
        time_taken_secs: u32,
        submitted_at: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id,
            lesson_id,
            answers,
            score: grade.score,
            passed: grade.passed,
            total_questions: grade.total_questions,
            correct_answers: grade.correct_answers,
            time_taken_secs,
            submitted_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bank(weights: &[u32], correct: &[usize]) -> Vec<QuizQuestion> {
        weights
            .iter()
            .zip(correct)
            .enumerate()
            .map(|(i, (w, c))| {
                QuizQuestion::new(
                    format!("Q{i}"),
                    vec!["a".into(), "b".into(), "c".into()],
                    *c,
                    Some(*w),
                )
            })
            .collect()
    }

    #[test]
    fn weighted_scenarios() {
        let questions = bank(&[1, 3], &[0, 1]);

        let all = grade(&questions, &QuizAnswers::new().with(0, 0).with(1, 1));
        assert_eq!((all.score, all.passed), (100, true));
        assert_eq!(all.correct_answers, 2);

        let heavy_only = grade(&questions, &QuizAnswers::new().with(0, 1).with(1, 1));
        assert_eq!((heavy_only.score, heavy_only.passed), (75, true));

        let none = grade(&questions, &QuizAnswers::new());
        assert_eq!((none.score, none.passed), (0, false));
        assert_eq!(none.total_questions, 2);
    }

    #[test]
    fn passing_boundary_is_seventy() {
        assert!(is_passing(70));
        assert!(!is_passing(69));
    }

    #[test]
    fn score_of_sixty_nine_and_seventy_from_weights() {
        // 69 of 100 points vs 70 of 100 points.
        let mut weights = vec![69, 31];
        let questions = bank(&weights, &[0, 0]);
        let g = grade(&questions, &QuizAnswers::new().with(0, 0));
        assert_eq!((g.score, g.passed), (69, false));

        weights = vec![70, 30];
        let questions = bank(&weights, &[0, 0]);
        let g = grade(&questions, &QuizAnswers::new().with(0, 0));
        assert_eq!((g.score, g.passed), (70, true));
    }

    #[test]
    fn empty_bank_scores_zero() {
        let g = grade(&[], &QuizAnswers::new().with(0, 0));
        assert_eq!(g.score, 0);
        assert!(!g.passed);
    }

    #[test]
    fn review_reports_user_choice_and_unanswered() {
        let questions = bank(&[1, 1], &[2, 0]);
        let g = grade(&questions, &QuizAnswers::new().with(0, 2));
        assert!(g.answers[0].is_correct);
        assert_eq!(g.answers[0].user_answer, Some(2));
        assert!(!g.answers[1].is_correct);
        assert_eq!(g.answers[1].user_answer, None);
        assert_eq!(g.score, 50);
    }

    #[test]
    fn answers_deserialize_from_string_keyed_object() {
        let answers: QuizAnswers = serde_json::from_str(r#"{"0":1,"3":2}"#).unwrap();
        assert_eq!(answers.get(0), Some(1));
        assert_eq!(answers.get(3), Some(2));
        assert_eq!(answers.len(), 2);
    }
}
