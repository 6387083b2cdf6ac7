mod certificate;
mod course;
mod enrollment;
mod ids;
mod lesson;
mod progress;
mod rating;

pub use ids::{CertificateId, CourseId, LessonId, ParseIdError, UserId};

pub use certificate::{Certificate, NewCertificate};
pub use course::{Course, CourseError, CourseLevel, CoursePatch, NewCourse};
pub use enrollment::{Enrollment, PaymentStatus};
pub use lesson::{Lesson, LessonError, LessonKind, LessonPatch, NewLesson, QuizQuestion};
pub use progress::{
    Completion, EnrollmentProgress, LessonProgress, LessonState, LessonUpdate, ProgressStatus,
    UpdateOutcome, clamp_video_timestamp, completion_percent,
};
pub use rating::{MAX_FEEDBACK_CHARS, Rating, RatingError, RatingSummary};
