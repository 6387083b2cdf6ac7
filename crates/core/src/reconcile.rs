//! Merging server progress with the learner's local cache.
//!
//! `merge` is pure: the same remote record, local cache and lesson list always
//! produce the same `MergeResult`. Local entries win for the fields they carry
//! (`completed`, `videoTimestamp`, `lastAccessedAt`); remote-only fields such
//! as quiz scores survive the merge.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{EnrollmentProgress, LessonId, ProgressStatus, completion_percent};

//
// ─── SNAPSHOTS ─────────────────────────────────────────────────────────────────
//

/// One lesson as reported by the progress endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonSnapshot {
    pub lesson_id: LessonId,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub video_timestamp: f64,
    #[serde(default)]
    pub quiz_score: Option<u8>,
    #[serde(default)]
    pub last_accessed_at: Option<DateTime<Utc>>,
}

/// Course progress as reported by `GET /progress/courses/{courseId}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSnapshot {
    pub progress: u8,
    pub status: ProgressStatus,
    #[serde(default)]
    pub lessons: Vec<LessonSnapshot>,
    #[serde(default)]
    pub last_accessed_lesson: Option<LessonId>,
}

impl ProgressSnapshot {
    /// Placeholder used when the server has no record: 0%, in progress.
    #[must_use]
    pub fn skeleton() -> Self {
        Self {
            progress: 0,
            status: ProgressStatus::InProgress,
            lessons: Vec::new(),
            last_accessed_lesson: None,
        }
    }
}

impl EnrollmentProgress {
    #[must_use]
    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            progress: self.percent(),
            status: self.status(),
            lessons: self
                .lessons()
                .iter()
                .map(|l| LessonSnapshot {
                    lesson_id: l.lesson_id,
                    completed: l.completed,
                    video_timestamp: l.video_timestamp,
                    quiz_score: l.quiz_score,
                    last_accessed_at: Some(l.last_accessed_at),
                })
                .collect(),
            last_accessed_lesson: self.last_accessed_lesson,
        }
    }
}

//
// ─── LOCAL CACHE ───────────────────────────────────────────────────────────────
//

/// Locally persisted mirror of one lesson's progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalCacheEntry {
    pub completed: bool,
    pub video_timestamp: f64,
    pub last_accessed_at: DateTime<Utc>,
    pub saved_at: DateTime<Utc>,
}

/// Local cache contents for one course, keyed by lesson.
pub type LocalCourseCache = BTreeMap<LessonId, LocalCacheEntry>;

//
// ─── MERGE ─────────────────────────────────────────────────────────────────────
//

/// What the lesson view needs to render one lesson.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LessonView {
    pub completed: bool,
    pub resume_offset: f64,
}

/// Progress view computed when a course is opened. Never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeResult {
    pub progress: u8,
    pub status: ProgressStatus,
    pub lessons: Vec<LessonSnapshot>,
    pub last_accessed_lesson: Option<LessonId>,
    pub view: BTreeMap<LessonId, LessonView>,
}

impl MergeResult {
    #[must_use]
    pub fn lesson(&self, lesson_id: LessonId) -> Option<&LessonSnapshot> {
        self.lessons.iter().find(|l| l.lesson_id == lesson_id)
    }

    /// Applies an optimistic local write to the view and re-derives the
    /// percentage against `course_lessons`.
    pub fn apply_local(
        &mut self,
        lesson_id: LessonId,
        entry: &LocalCacheEntry,
        course_lessons: &[LessonId],
    ) {
        upsert_local(&mut self.lessons, lesson_id, entry);
        self.last_accessed_lesson = Some(lesson_id);
        let remote_completed = self.status == ProgressStatus::Completed;
        let (progress, status) = derive(&self.lessons, course_lessons, remote_completed);
        self.progress = progress;
        self.status = status;
        self.view = view_of(&self.lessons);
    }
}

/// Merges `remote` (if any) with `local`, recomputing the percentage over
/// `course_lessons`.
#[must_use]
pub fn merge(
    remote: Option<&ProgressSnapshot>,
    local: &LocalCourseCache,
    course_lessons: &[LessonId],
) -> MergeResult {
    let base = remote.cloned().unwrap_or_else(ProgressSnapshot::skeleton);
    let remote_completed = base.status == ProgressStatus::Completed;

    let mut lessons = base.lessons;
    for (lesson_id, entry) in local {
        upsert_local(&mut lessons, *lesson_id, entry);
    }

    let last_accessed_lesson = base.last_accessed_lesson.or_else(|| {
        local
            .iter()
            .max_by(|a, b| {
                a.1.last_accessed_at
                    .cmp(&b.1.last_accessed_at)
                    .then_with(|| b.0.cmp(a.0))
            })
            .map(|(id, _)| *id)
    });

    let (progress, status) = derive(&lessons, course_lessons, remote_completed);
    let view = view_of(&lessons);

    MergeResult {
        progress,
        status,
        lessons,
        last_accessed_lesson,
        view,
    }
}

fn upsert_local(lessons: &mut Vec<LessonSnapshot>, lesson_id: LessonId, entry: &LocalCacheEntry) {
    match lessons.iter_mut().find(|l| l.lesson_id == lesson_id) {
        Some(existing) => {
            existing.completed = entry.completed;
            existing.video_timestamp = entry.video_timestamp;
            existing.last_accessed_at = Some(entry.last_accessed_at);
        }
        None => lessons.push(LessonSnapshot {
            lesson_id,
            completed: entry.completed,
            video_timestamp: entry.video_timestamp,
            quiz_score: None,
            last_accessed_at: Some(entry.last_accessed_at),
        }),
    }
}

fn derive(
    lessons: &[LessonSnapshot],
    course_lessons: &[LessonId],
    remote_completed: bool,
) -> (u8, ProgressStatus) {
    let wanted: BTreeSet<LessonId> = course_lessons.iter().copied().collect();
    let completed: BTreeSet<LessonId> = lessons
        .iter()
        .filter(|l| l.completed && wanted.contains(&l.lesson_id))
        .map(|l| l.lesson_id)
        .collect();

    let progress = completion_percent(completed.len(), wanted.len());
    let all_done = !wanted.is_empty() && completed.len() == wanted.len();
    let status = if remote_completed || all_done {
        ProgressStatus::Completed
    } else {
        ProgressStatus::InProgress
    };
    (progress, status)
}

fn view_of(lessons: &[LessonSnapshot]) -> BTreeMap<LessonId, LessonView> {
    lessons
        .iter()
        .map(|l| {
            (
                l.lesson_id,
                LessonView {
                    completed: l.completed,
                    resume_offset: l.video_timestamp,
                },
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;
    use chrono::Duration;

    fn ids(n: u64) -> Vec<LessonId> {
        (1..=n).map(LessonId::new).collect()
    }

    fn local_entry(completed: bool, ts: f64, minutes: i64) -> LocalCacheEntry {
        let at = fixed_now() + Duration::minutes(minutes);
        LocalCacheEntry {
            completed,
            video_timestamp: ts,
            last_accessed_at: at,
            saved_at: at,
        }
    }

    fn remote() -> ProgressSnapshot {
        ProgressSnapshot {
            progress: 25,
            status: ProgressStatus::InProgress,
            lessons: vec![
                LessonSnapshot {
                    lesson_id: LessonId::new(1),
                    completed: true,
                    video_timestamp: 10.0,
                    quiz_score: None,
                    last_accessed_at: Some(fixed_now()),
                },
                LessonSnapshot {
                    lesson_id: LessonId::new(3),
                    completed: false,
                    video_timestamp: 0.0,
                    quiz_score: Some(40),
                    last_accessed_at: Some(fixed_now()),
                },
            ],
            last_accessed_lesson: Some(LessonId::new(3)),
        }
    }

    #[test]
    fn missing_remote_starts_from_skeleton() {
        let merged = merge(None, &LocalCourseCache::new(), &ids(4));
        assert_eq!(merged.progress, 0);
        assert_eq!(merged.status, ProgressStatus::InProgress);
        assert!(merged.lessons.is_empty());
        assert!(merged.view.is_empty());
    }

    #[test]
    fn local_fields_win_and_remote_only_fields_survive() {
        let mut local = LocalCourseCache::new();
        local.insert(LessonId::new(3), local_entry(true, 88.0, 5));
        local.insert(LessonId::new(2), local_entry(false, 12.5, 1));

        let merged = merge(Some(&remote()), &local, &ids(4));

        for (id, entry) in &local {
            let l = merged.lesson(*id).unwrap();
            assert_eq!(l.completed, entry.completed);
            assert!((l.video_timestamp - entry.video_timestamp).abs() < f64::EPSILON);
            assert_eq!(l.last_accessed_at, Some(entry.last_accessed_at));
        }
        assert_eq!(merged.lesson(LessonId::new(3)).unwrap().quiz_score, Some(40));
        assert_eq!(merged.progress, 50);
        assert_eq!(merged.view[&LessonId::new(2)].resume_offset, 12.5);
    }

    #[test]
    fn local_incomplete_overrides_remote_completion() {
        let mut local = LocalCourseCache::new();
        local.insert(LessonId::new(1), local_entry(false, 3.0, 0));
        let merged = merge(Some(&remote()), &local, &ids(4));
        assert!(!merged.view[&LessonId::new(1)].completed);
        assert_eq!(merged.progress, 0);
    }

    #[test]
    fn merge_is_deterministic() {
        let mut local = LocalCourseCache::new();
        local.insert(LessonId::new(4), local_entry(true, 0.0, 2));
        local.insert(LessonId::new(2), local_entry(true, 0.0, 2));
        let a = merge(Some(&remote()), &local, &ids(4));
        let b = merge(Some(&remote()), &local, &ids(4));
        assert_eq!(a, b);
    }

    #[test]
    fn percentage_ignores_lesson_order() {
        let mut local = LocalCourseCache::new();
        local.insert(LessonId::new(2), local_entry(true, 0.0, 0));
        let forward = merge(Some(&remote()), &local, &ids(3));
        let mut reversed = ids(3);
        reversed.reverse();
        let backward = merge(Some(&remote()), &local, &reversed);
        assert_eq!(forward.progress, 67);
        assert_eq!(forward.progress, backward.progress);
    }

    #[test]
    fn three_of_four_then_all_completes() {
        let mut local = LocalCourseCache::new();
        for id in 1..=3 {
            local.insert(LessonId::new(id), local_entry(true, 0.0, 0));
        }
        let mut merged = merge(None, &local, &ids(4));
        assert_eq!(merged.progress, 75);
        assert_eq!(merged.status, ProgressStatus::InProgress);

        merged.apply_local(LessonId::new(4), &local_entry(true, 0.0, 1), &ids(4));
        assert_eq!(merged.progress, 100);
        assert_eq!(merged.status, ProgressStatus::Completed);
        assert_eq!(merged.last_accessed_lesson, Some(LessonId::new(4)));
    }

    #[test]
    fn latest_local_access_fills_missing_last_lesson() {
        let mut local = LocalCourseCache::new();
        local.insert(LessonId::new(1), local_entry(false, 0.0, 1));
        local.insert(LessonId::new(2), local_entry(false, 0.0, 9));
        let merged = merge(None, &local, &ids(2));
        assert_eq!(merged.last_accessed_lesson, Some(LessonId::new(2)));
    }

    #[test]
    fn snapshot_parses_documented_shape() {
        let json = r#"{
            "progress": 50,
            "status": "in-progress",
            "lessons": [{"lessonId": 1, "completed": true, "videoTimestamp": 0, "quizScore": null, "lastAccessedAt": "2023-11-14T22:13:20Z"}],
            "lastAccessedLesson": 1
        }"#;
        let snap: ProgressSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(snap.lessons[0].lesson_id, LessonId::new(1));
        assert_eq!(snap.status, ProgressStatus::InProgress);
    }
}
