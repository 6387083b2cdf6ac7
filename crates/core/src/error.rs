use thiserror::Error;

use crate::model::{CourseError, LessonError, ParseIdError, RatingError};
use crate::scheduler::RemoteFailure;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Course(#[from] CourseError),
    #[error(transparent)]
    Lesson(#[from] LessonError),
    #[error(transparent)]
    Rating(#[from] RatingError),
    #[error(transparent)]
    ParseId(#[from] ParseIdError),
    #[error(transparent)]
    Remote(#[from] RemoteFailure),
}
