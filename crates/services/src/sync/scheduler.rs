use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use lms_core::model::{CourseId, LessonId, clamp_video_timestamp};
use lms_core::reconcile::LocalCacheEntry;
use lms_core::scheduler::{RemoteFailure, SaveMode, SavePolicy};

use crate::Clock;
use crate::sync::api::ProgressApi;
use crate::sync::cache::LocalCache;
use crate::wire::{LessonProgressRequest, LessonProgressResponse};

/// What the learner sees next to the lesson player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveIndicator {
    Idle,
    Saving,
    Saved { at: DateTime<Utc> },
    /// Progress is kept on this device only.
    Offline,
}

/// Confirmation state of the latest local write for one lesson.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    /// Written locally, remote write not yet acknowledged.
    Pending,
    Confirmed,
    /// The remote write failed or was skipped.
    LocalOnly,
}

/// A write recorded in the local cache, ready to be sent.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalWrite {
    pub lesson_id: LessonId,
    pub entry: LocalCacheEntry,
    revision: u64,
}

/// Result of handing a write to the scheduler.
#[derive(Debug, Clone, PartialEq)]
pub struct SaveOutcome {
    pub phase: SyncPhase,
    pub failure: Option<RemoteFailure>,
    pub response: Option<LessonProgressResponse>,
}

impl SaveOutcome {
    fn pending() -> Self {
        Self {
            phase: SyncPhase::Pending,
            failure: None,
            response: None,
        }
    }
}

/// Buffers and delivers progress writes for one course.
///
/// Every write lands in the local cache first. Debounced writes wait for a
/// quiet period and only the newest payload is sent; immediate writes cancel
/// the pending timer and go out right away. An in-flight request is never
/// cancelled.
pub struct SaveScheduler {
    inner: Arc<Inner>,
}

struct Inner {
    course_id: CourseId,
    policy: SavePolicy,
    clock: Clock,
    api: Arc<dyn ProgressApi>,
    cache: Arc<dyn LocalCache>,
    indicator: watch::Sender<SaveIndicator>,
    state: Mutex<SchedulerState>,
}

struct SchedulerState {
    remote_enabled: bool,
    next_revision: u64,
    lessons: BTreeMap<LessonId, LessonSync>,
    pending: Option<PendingSave>,
}

#[derive(Clone, Copy)]
struct LessonSync {
    phase: SyncPhase,
    revision: u64,
}

struct PendingSave {
    write: LocalWrite,
    body: LessonProgressRequest,
    task: Option<JoinHandle<()>>,
}

impl SaveScheduler {
    #[must_use]
    pub fn new(
        course_id: CourseId,
        api: Arc<dyn ProgressApi>,
        cache: Arc<dyn LocalCache>,
        policy: SavePolicy,
        clock: Clock,
    ) -> Self {
        let (indicator, _) = watch::channel(SaveIndicator::Idle);
        Self {
            inner: Arc::new(Inner {
                course_id,
                policy,
                clock,
                api,
                cache,
                indicator,
                state: Mutex::new(SchedulerState {
                    remote_enabled: true,
                    next_revision: 0,
                    lessons: BTreeMap::new(),
                    pending: None,
                }),
            }),
        }
    }

    #[must_use]
    pub fn course_id(&self) -> CourseId {
        self.inner.course_id
    }

    #[must_use]
    pub fn policy(&self) -> SavePolicy {
        self.inner.policy
    }

    /// Record a write in the local cache and mark the lesson `Pending`.
    ///
    /// Positions that are not finite are stored as 0. Cache failures are
    /// logged; the write still proceeds to the remote.
    pub fn write_local(
        &self,
        lesson_id: LessonId,
        completed: bool,
        video_timestamp: f64,
    ) -> LocalWrite {
        let now = self.inner.clock.now();
        let entry = LocalCacheEntry {
            completed,
            video_timestamp: clamp_video_timestamp(video_timestamp),
            last_accessed_at: now,
            saved_at: now,
        };
        let course_id = self.inner.course_id;
        if let Err(err) = self.inner.cache.store(course_id, lesson_id, entry.clone()) {
            warn!(
                course = %course_id,
                lesson = %lesson_id,
                error = %err,
                "local progress cache write failed"
            );
        }

        let mut state = self.inner.lock();
        state.next_revision += 1;
        let revision = state.next_revision;
        state.lessons.insert(
            lesson_id,
            LessonSync {
                phase: SyncPhase::Pending,
                revision,
            },
        );
        LocalWrite {
            lesson_id,
            entry,
            revision,
        }
    }

    /// Send a recorded write. Debounced writes return `Pending` at once;
    /// immediate ones resolve after the remote answers or times out.
    pub async fn dispatch(&self, write: LocalWrite, mode: SaveMode) -> SaveOutcome {
        let body = LessonProgressRequest {
            completed: Some(write.entry.completed),
            video_timestamp: Some(write.entry.video_timestamp),
            ..LessonProgressRequest::default()
        };
        match mode {
            SaveMode::Debounced => {
                self.schedule(write, body);
                SaveOutcome::pending()
            }
            SaveMode::Immediate => {
                if let Some(previous) = self.inner.take_pending(None) {
                    if previous.write.lesson_id == write.lesson_id {
                        debug!(lesson = %write.lesson_id, "pending save superseded");
                    } else {
                        spawn_delivery(&self.inner, previous, SaveMode::Debounced);
                    }
                }
                self.inner.deliver(write, body, mode).await
            }
        }
    }

    /// `write_local` followed by `dispatch`.
    pub async fn save(
        &self,
        lesson_id: LessonId,
        completed: bool,
        video_timestamp: f64,
        mode: SaveMode,
    ) -> SaveOutcome {
        let write = self.write_local(lesson_id, completed, video_timestamp);
        self.dispatch(write, mode).await
    }

    /// Mark a write as already confirmed by another endpoint, e.g. a graded
    /// quiz that completed the lesson on the server. Nothing is sent, and a
    /// pending save for the same lesson is dropped.
    pub fn acknowledge(&self, write: &LocalWrite) {
        if let Some(pending) = self.inner.take_pending(None) {
            if pending.write.lesson_id == write.lesson_id {
                debug!(lesson = %write.lesson_id, "pending save superseded");
            } else {
                spawn_delivery(&self.inner, pending, SaveMode::Debounced);
            }
        }
        self.inner.settle(write, SyncPhase::Confirmed);
        self.inner.indicator.send_replace(SaveIndicator::Saved {
            at: self.inner.clock.now(),
        });
    }

    /// Send the pending debounced write now instead of waiting.
    pub async fn flush(&self) -> Option<SaveOutcome> {
        let pending = self.inner.take_pending(None)?;
        Some(
            self.inner
                .deliver(pending.write, pending.body, SaveMode::Debounced)
                .await,
        )
    }

    /// Drop the pending debounced write. It stays in the local cache.
    pub fn cancel(&self) {
        if let Some(pending) = self.inner.take_pending(None) {
            debug!(lesson = %pending.write.lesson_id, "pending save cancelled");
        }
    }

    /// Allow remote writes again after a reconciliation.
    pub fn reset_remote(&self) {
        self.inner.lock().remote_enabled = true;
    }

    /// Turn remote writes off, e.g. when the progress endpoint is missing.
    pub fn disable_remote(&self) {
        self.inner.lock().remote_enabled = false;
    }

    #[must_use]
    pub fn remote_enabled(&self) -> bool {
        self.inner.lock().remote_enabled
    }

    #[must_use]
    pub fn has_pending(&self) -> bool {
        self.inner.lock().pending.is_some()
    }

    #[must_use]
    pub fn phase(&self, lesson_id: LessonId) -> Option<SyncPhase> {
        self.inner.lock().lessons.get(&lesson_id).map(|s| s.phase)
    }

    #[must_use]
    pub fn indicator(&self) -> SaveIndicator {
        *self.inner.indicator.borrow()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SaveIndicator> {
        self.inner.indicator.subscribe()
    }

    fn schedule(&self, write: LocalWrite, body: LessonProgressRequest) {
        if let Some(previous) = self.inner.take_pending(None)
            && previous.write.lesson_id != write.lesson_id
        {
            spawn_delivery(&self.inner, previous, SaveMode::Debounced);
        }

        let revision = write.revision;
        let mut state = self.inner.lock();
        let inner = Arc::clone(&self.inner);
        let debounce = self.inner.policy.debounce;
        // The task cannot take the payload before this guard is released.
        let task = tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            if let Some(pending) = inner.take_pending(Some(revision)) {
                inner
                    .deliver(pending.write, pending.body, SaveMode::Debounced)
                    .await;
            }
        });
        state.pending = Some(PendingSave {
            write,
            body,
            task: Some(task),
        });
    }
}

impl Drop for SaveScheduler {
    fn drop(&mut self) {
        self.cancel();
    }
}

fn spawn_delivery(inner: &Arc<Inner>, pending: PendingSave, mode: SaveMode) {
    let inner = Arc::clone(inner);
    tokio::spawn(async move {
        inner.deliver(pending.write, pending.body, mode).await;
    });
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, SchedulerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Removes the pending save. With `Some(revision)` only a matching one is
    /// taken, which is how the timer task claims its own payload.
    fn take_pending(&self, revision: Option<u64>) -> Option<PendingSave> {
        let mut state = self.lock();
        let matches = state
            .pending
            .as_ref()
            .is_some_and(|p| revision.is_none_or(|r| p.write.revision == r));
        if !matches {
            return None;
        }
        let mut pending = state.pending.take()?;
        if revision.is_none()
            && let Some(task) = pending.task.take()
        {
            task.abort();
        }
        Some(pending)
    }

    async fn deliver(
        &self,
        write: LocalWrite,
        body: LessonProgressRequest,
        mode: SaveMode,
    ) -> SaveOutcome {
        if !self.lock().remote_enabled {
            debug!(
                course = %self.course_id,
                lesson = %write.lesson_id,
                "remote progress disabled, kept locally"
            );
            self.settle(&write, SyncPhase::LocalOnly);
            self.indicator.send_replace(SaveIndicator::Offline);
            return SaveOutcome {
                phase: SyncPhase::LocalOnly,
                failure: None,
                response: None,
            };
        }

        self.indicator.send_replace(SaveIndicator::Saving);
        let timeout = self.policy.timeout(mode);
        let result = match tokio::time::timeout(
            timeout,
            self.api.save_lesson(self.course_id, write.lesson_id, &body),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(RemoteFailure::Timeout),
        };

        match result {
            Ok(response) => {
                self.settle(&write, SyncPhase::Confirmed);
                self.indicator.send_replace(SaveIndicator::Saved {
                    at: self.clock.now(),
                });
                SaveOutcome {
                    phase: SyncPhase::Confirmed,
                    failure: None,
                    response: Some(response),
                }
            }
            Err(failure) => {
                if failure.disables_remote() {
                    self.lock().remote_enabled = false;
                }
                match failure {
                    RemoteFailure::Timeout | RemoteFailure::NotFound => {
                        debug!(
                            course = %self.course_id,
                            lesson = %write.lesson_id,
                            error = %failure,
                            "remote save absorbed"
                        );
                        self.indicator.send_replace(SaveIndicator::Offline);
                    }
                    _ => {
                        warn!(
                            course = %self.course_id,
                            lesson = %write.lesson_id,
                            error = %failure,
                            "remote save failed"
                        );
                        self.indicator.send_replace(SaveIndicator::Idle);
                    }
                }
                self.settle(&write, SyncPhase::LocalOnly);
                SaveOutcome {
                    phase: SyncPhase::LocalOnly,
                    failure: Some(failure),
                    response: None,
                }
            }
        }
    }

    /// Applies a delivery result unless a newer write has replaced it.
    fn settle(&self, write: &LocalWrite, phase: SyncPhase) {
        let mut state = self.lock();
        if let Some(sync) = state.lessons.get_mut(&write.lesson_id)
            && sync.revision == write.revision
        {
            sync.phase = phase;
        }
    }
}
