//! Timing policy for progress saves.
//!
//! Completions and explicitly immediate saves go out right away. Everything
//! else (video position ticks, lesson switches) is debounced so a burst of
//! updates collapses into one remote write carrying the latest payload.

use std::time::Duration;

use thiserror::Error;

use crate::model::LessonId;

/// Quiet period before a debounced save is flushed.
pub const DEBOUNCE_WINDOW: Duration = Duration::from_millis(3_000);

/// Remote timeout for saves the learner explicitly triggered.
pub const MANUAL_SAVE_TIMEOUT: Duration = Duration::from_secs(10);

/// Remote timeout for debounced background saves.
pub const AUTO_SAVE_TIMEOUT: Duration = Duration::from_secs(5);

/// How a save is delivered to the remote service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveMode {
    Immediate,
    Debounced,
}

/// One progress write as requested by the lesson view.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SaveRequest {
    /// `None` targets the lesson currently open.
    pub lesson_id: Option<LessonId>,
    pub completed: bool,
    pub video_timestamp: f64,
    pub immediate: bool,
}

impl SaveRequest {
    /// Explicit completion of a lesson.
    #[must_use]
    pub fn complete(lesson_id: LessonId) -> Self {
        Self {
            lesson_id: Some(lesson_id),
            completed: true,
            video_timestamp: 0.0,
            immediate: true,
        }
    }

    /// Periodic video position update.
    #[must_use]
    pub fn position(lesson_id: LessonId, video_timestamp: f64) -> Self {
        Self {
            lesson_id: Some(lesson_id),
            completed: false,
            video_timestamp,
            immediate: false,
        }
    }

    /// Position update for whatever lesson is open.
    #[must_use]
    pub fn current(video_timestamp: f64) -> Self {
        Self {
            lesson_id: None,
            completed: false,
            video_timestamp,
            immediate: false,
        }
    }
}

/// Debounce window and timeouts for one client session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SavePolicy {
    pub debounce: Duration,
    pub manual_timeout: Duration,
    pub auto_timeout: Duration,
}

impl Default for SavePolicy {
    fn default() -> Self {
        Self {
            debounce: DEBOUNCE_WINDOW,
            manual_timeout: MANUAL_SAVE_TIMEOUT,
            auto_timeout: AUTO_SAVE_TIMEOUT,
        }
    }
}

impl SavePolicy {
    #[must_use]
    pub fn mode(&self, request: &SaveRequest) -> SaveMode {
        if request.completed || request.immediate {
            SaveMode::Immediate
        } else {
            SaveMode::Debounced
        }
    }

    #[must_use]
    pub fn timeout(&self, mode: SaveMode) -> Duration {
        match mode {
            SaveMode::Immediate => self.manual_timeout,
            SaveMode::Debounced => self.auto_timeout,
        }
    }
}

/// Classified reason a remote save did not land.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum RemoteFailure {
    #[error("remote save timed out")]
    Timeout,

    #[error("progress endpoint not available")]
    NotFound,

    #[error("remote rejected the request ({status}): {message}")]
    Validation { status: u16, message: String },

    #[error("remote save failed: {0}")]
    Unexpected(String),
}

impl RemoteFailure {
    /// Classifies an HTTP status that is not a success.
    #[must_use]
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        match status {
            404 => Self::NotFound,
            408 | 504 => Self::Timeout,
            400..=499 => Self::Validation {
                status,
                message: message.into(),
            },
            _ => Self::Unexpected(format!("status {status}: {}", message.into())),
        }
    }

    /// Not-found means the feature is off; stop trying until the next
    /// reconciliation.
    #[must_use]
    pub fn disables_remote(&self) -> bool {
        matches!(self, Self::NotFound)
    }

    /// Failures the learner should hear about on a manual save.
    #[must_use]
    pub fn is_user_visible(&self) -> bool {
        matches!(self, Self::Validation { .. } | Self::Unexpected(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completions_and_immediate_hints_skip_debounce() {
        let policy = SavePolicy::default();
        assert_eq!(
            policy.mode(&SaveRequest::complete(LessonId::new(1))),
            SaveMode::Immediate
        );
        let mut hinted = SaveRequest::position(LessonId::new(1), 3.0);
        hinted.immediate = true;
        assert_eq!(policy.mode(&hinted), SaveMode::Immediate);
        assert_eq!(
            policy.mode(&SaveRequest::position(LessonId::new(1), 3.0)),
            SaveMode::Debounced
        );
    }

    #[test]
    fn timeouts_follow_mode() {
        let policy = SavePolicy::default();
        assert_eq!(policy.timeout(SaveMode::Immediate), Duration::from_secs(10));
        assert_eq!(policy.timeout(SaveMode::Debounced), Duration::from_secs(5));
        assert_eq!(policy.debounce, Duration::from_millis(3_000));
    }

    #[test]
    fn status_classification() {
        assert_eq!(RemoteFailure::from_status(404, ""), RemoteFailure::NotFound);
        assert_eq!(RemoteFailure::from_status(504, ""), RemoteFailure::Timeout);
        assert!(matches!(
            RemoteFailure::from_status(422, "bad"),
            RemoteFailure::Validation { status: 422, .. }
        ));
        assert!(matches!(
            RemoteFailure::from_status(500, "boom"),
            RemoteFailure::Unexpected(_)
        ));
        assert!(RemoteFailure::NotFound.disables_remote());
        assert!(!RemoteFailure::Timeout.disables_remote());
    }
}
