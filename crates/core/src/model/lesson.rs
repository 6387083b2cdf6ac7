use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::model::ids::{CourseId, LessonId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum LessonError {
    #[error("lesson title cannot be empty")]
    EmptyTitle,

    #[error("lesson duration must be at least one minute")]
    InvalidDuration,

    #[error("video url is invalid: {0}")]
    InvalidVideoUrl(String),

    #[error("article body cannot be empty")]
    EmptyArticle,

    #[error("question {index} has empty text")]
    EmptyQuestion { index: usize },

    #[error("question {index} needs at least two options")]
    TooFewOptions { index: usize },

    #[error("question {index} has an empty option")]
    EmptyOption { index: usize },

    #[error("question {index} correct answer {correct} is out of range")]
    CorrectAnswerOutOfRange { index: usize, correct: usize },

    #[error("question {index} must be worth at least one point")]
    InvalidPoints { index: usize },
}

//
// ─── QUIZ QUESTIONS ────────────────────────────────────────────────────────────
//

const fn default_points() -> u32 {
    1
}

/// A multiple-choice question inside a quiz lesson.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizQuestion {
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: usize,
    #[serde(default = "default_points")]
    pub points: u32,
}

impl QuizQuestion {
    /// Builds a question; `points` falls back to 1 when unspecified.
    #[must_use]
    pub fn new(
        question: impl Into<String>,
        options: Vec<String>,
        correct_answer: usize,
        points: Option<u32>,
    ) -> Self {
        Self {
            question: question.into(),
            options,
            correct_answer,
            points: points.unwrap_or_else(default_points),
        }
    }

    fn validate(&self, index: usize) -> Result<(), LessonError> {
        if self.question.trim().is_empty() {
            return Err(LessonError::EmptyQuestion { index });
        }
        if self.options.len() < 2 {
            return Err(LessonError::TooFewOptions { index });
        }
        if self.options.iter().any(|o| o.trim().is_empty()) {
            return Err(LessonError::EmptyOption { index });
        }
        if self.correct_answer >= self.options.len() {
            return Err(LessonError::CorrectAnswerOutOfRange {
                index,
                correct: self.correct_answer,
            });
        }
        if self.points == 0 {
            return Err(LessonError::InvalidPoints { index });
        }
        Ok(())
    }
}

//
// ─── LESSON KIND ───────────────────────────────────────────────────────────────
//

/// Content payload of a lesson.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LessonKind {
    Video { url: String },
    Article { body: String },
    Quiz { questions: Vec<QuizQuestion> },
}

impl LessonKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            LessonKind::Video { .. } => "video",
            LessonKind::Article { .. } => "article",
            LessonKind::Quiz { .. } => "quiz",
        }
    }

    #[must_use]
    pub fn is_quiz(&self) -> bool {
        matches!(self, LessonKind::Quiz { .. })
    }

    fn validate(&self) -> Result<(), LessonError> {
        match self {
            LessonKind::Video { url } => {
                let parsed =
                    Url::parse(url).map_err(|e| LessonError::InvalidVideoUrl(e.to_string()))?;
                if !matches!(parsed.scheme(), "http" | "https") {
                    return Err(LessonError::InvalidVideoUrl(format!(
                        "unsupported scheme {}",
                        parsed.scheme()
                    )));
                }
                Ok(())
            }
            LessonKind::Article { body } => {
                if body.trim().is_empty() {
                    Err(LessonError::EmptyArticle)
                } else {
                    Ok(())
                }
            }
            // An empty question bank is allowed at authoring time; submission rejects it.
            LessonKind::Quiz { questions } => questions
                .iter()
                .enumerate()
                .try_for_each(|(index, q)| q.validate(index)),
        }
    }
}

//
// ─── LESSON ────────────────────────────────────────────────────────────────────
//

/// An atomic unit of course content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lesson {
    id: LessonId,
    course_id: CourseId,
    title: String,
    order: u32,
    duration_minutes: u32,
    preview: bool,
    kind: LessonKind,
}

/// A lesson before the store assigns its id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLesson {
    pub course_id: CourseId,
    pub title: String,
    pub order: u32,
    pub duration_minutes: u32,
    pub preview: bool,
    pub kind: LessonKind,
}

impl NewLesson {
    /// Trims the title and checks the duration and content payload.
    ///
    /// # Errors
    ///
    /// Returns `LessonError` if the title is blank, the duration is zero, or
    /// the content payload fails validation.
    pub fn validated(mut self) -> Result<Self, LessonError> {
        self.title = self.title.trim().to_owned();
        if self.title.is_empty() {
            return Err(LessonError::EmptyTitle);
        }
        if self.duration_minutes == 0 {
            return Err(LessonError::InvalidDuration);
        }
        self.kind.validate()?;
        Ok(self)
    }

    #[must_use]
    pub fn assign_id(self, id: LessonId) -> Lesson {
        Lesson {
            id,
            course_id: self.course_id,
            title: self.title,
            order: self.order,
            duration_minutes: self.duration_minutes,
            preview: self.preview,
            kind: self.kind,
        }
    }
}

/// Instructor edits to a lesson. The owning course cannot change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LessonPatch {
    pub title: Option<String>,
    pub order: Option<u32>,
    pub duration: Option<u32>,
    pub is_preview: Option<bool>,
    pub content: Option<LessonKind>,
}

impl Lesson {
    /// Creates a validated lesson.
    ///
    /// # Errors
    ///
    /// Returns `LessonError` if the title is blank, the duration is zero, or the
    /// content payload fails validation.
    pub fn new(
        id: LessonId,
        course_id: CourseId,
        title: impl Into<String>,
        order: u32,
        duration_minutes: u32,
        kind: LessonKind,
    ) -> Result<Self, LessonError> {
        let draft = NewLesson {
            course_id,
            title: title.into(),
            order,
            duration_minutes,
            preview: false,
            kind,
        };
        Ok(draft.validated()?.assign_id(id))
    }

    /// The lesson with `patch` applied.
    ///
    /// # Errors
    ///
    /// Returns `LessonError` if the patched lesson would be invalid.
    pub fn patched(&self, patch: LessonPatch) -> Result<Self, LessonError> {
        let draft = NewLesson {
            course_id: self.course_id,
            title: patch.title.unwrap_or_else(|| self.title.clone()),
            order: patch.order.unwrap_or(self.order),
            duration_minutes: patch.duration.unwrap_or(self.duration_minutes),
            preview: patch.is_preview.unwrap_or(self.preview),
            kind: patch.content.unwrap_or_else(|| self.kind.clone()),
        };
        Ok(draft.validated()?.assign_id(self.id))
    }

    /// Marks the lesson as viewable without enrollment.
    #[must_use]
    pub fn with_preview(mut self, preview: bool) -> Self {
        self.preview = preview;
        self
    }

    #[must_use]
    pub fn id(&self) -> LessonId {
        self.id
    }

    #[must_use]
    pub fn course_id(&self) -> CourseId {
        self.course_id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn order(&self) -> u32 {
        self.order
    }

    #[must_use]
    pub fn duration_minutes(&self) -> u32 {
        self.duration_minutes
    }

    #[must_use]
    pub fn is_preview(&self) -> bool {
        self.preview
    }

    #[must_use]
    pub fn kind(&self) -> &LessonKind {
        &self.kind
    }

    /// Question bank when this is a quiz lesson.
    #[must_use]
    pub fn quiz_questions(&self) -> Option<&[QuizQuestion]> {
        match &self.kind {
            LessonKind::Quiz { questions } => Some(questions),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| (*s).to_owned()).collect()
    }

    #[test]
    fn video_lesson_requires_http_url() {
        let err = Lesson::new(
            LessonId::new(1),
            CourseId::new(1),
            "Intro",
            1,
            5,
            LessonKind::Video {
                url: "ftp://example.com/a.mp4".into(),
            },
        )
        .unwrap_err();
        assert!(matches!(err, LessonError::InvalidVideoUrl(_)));
    }

    #[test]
    fn zero_duration_is_rejected() {
        let err = Lesson::new(
            LessonId::new(1),
            CourseId::new(1),
            "Intro",
            1,
            0,
            LessonKind::Article { body: "x".into() },
        )
        .unwrap_err();
        assert_eq!(err, LessonError::InvalidDuration);
    }

    #[test]
    fn quiz_question_correct_index_must_be_in_range() {
        let q = QuizQuestion::new("2+2?", opts(&["3", "4"]), 2, None);
        let err = Lesson::new(
            LessonId::new(2),
            CourseId::new(1),
            "Check",
            2,
            3,
            LessonKind::Quiz { questions: vec![q] },
        )
        .unwrap_err();
        assert_eq!(
            err,
            LessonError::CorrectAnswerOutOfRange {
                index: 0,
                correct: 2
            }
        );
    }

    #[test]
    fn points_default_to_one_when_missing_from_json() {
        let q: QuizQuestion =
            serde_json::from_str(r#"{"question":"q","options":["a","b"],"correctAnswer":1}"#)
                .unwrap();
        assert_eq!(q.points, 1);
        assert_eq!(QuizQuestion::new("q", opts(&["a", "b"]), 0, None).points, 1);
    }

    #[test]
    fn patch_swaps_content_and_revalidates() {
        let lesson = Lesson::new(
            LessonId::new(3),
            CourseId::new(1),
            "Read",
            1,
            4,
            LessonKind::Article { body: "x".into() },
        )
        .unwrap();
        let patch: LessonPatch = serde_json::from_str(
            r#"{"isPreview":true,"content":{"type":"video","url":"https://cdn.example.com/a.mp4"}}"#,
        )
        .unwrap();
        let patched = lesson.patched(patch).unwrap();
        assert_eq!(patched.id(), lesson.id());
        assert!(patched.is_preview());
        assert_eq!(patched.kind().as_str(), "video");
        assert_eq!(patched.title(), "Read");

        let err = lesson
            .patched(LessonPatch {
                duration: Some(0),
                ..LessonPatch::default()
            })
            .unwrap_err();
        assert_eq!(err, LessonError::InvalidDuration);
    }

    #[test]
    fn kind_round_trips_with_type_tag() {
        let kind = LessonKind::Article { body: "hi".into() };
        let json = serde_json::to_string(&kind).unwrap();
        assert_eq!(json, r#"{"type":"article","body":"hi"}"#);
    }
}
