//! Client-side progress tracking: the remote API, the on-device cache, the
//! save scheduler and the course session that ties them together.

pub mod api;
pub mod cache;
pub mod scheduler;
pub mod session;

pub use api::{HttpProgressApi, ProgressApi, ProgressApiConfig};
pub use cache::{FileLocalCache, LocalCache, MemoryLocalCache};
pub use scheduler::{LocalWrite, SaveIndicator, SaveOutcome, SaveScheduler, SyncPhase};
pub use session::CourseSession;
