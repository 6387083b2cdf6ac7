use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use lms_core::model::{CourseId, LessonId};
use lms_core::reconcile::{LocalCacheEntry, LocalCourseCache};
use tracing::warn;

use crate::error::CacheError;

/// Durable per-course mirror of lesson progress on the learner's device.
pub trait LocalCache: Send + Sync {
    /// Cached entries for a course; empty when nothing was stored yet.
    ///
    /// # Errors
    ///
    /// Returns `CacheError` when the stored data cannot be read.
    fn load(&self, course_id: CourseId) -> Result<LocalCourseCache, CacheError>;

    /// Replace the entry for one lesson. A document that can no longer be
    /// parsed is started over rather than blocking every later write.
    ///
    /// # Errors
    ///
    /// Returns `CacheError` when the entry cannot be written.
    fn store(
        &self,
        course_id: CourseId,
        lesson_id: LessonId,
        entry: LocalCacheEntry,
    ) -> Result<(), CacheError>;
}

/// One JSON document per course, `progress_{courseId}.json`, in `dir`.
#[derive(Debug)]
pub struct FileLocalCache {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl FileLocalCache {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn path_for(&self, course_id: CourseId) -> PathBuf {
        self.dir.join(format!("progress_{course_id}.json"))
    }

    fn read(path: &Path) -> Result<LocalCourseCache, CacheError> {
        match fs::read(path) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(LocalCourseCache::new()),
            Err(err) => Err(err.into()),
        }
    }
}

impl LocalCache for FileLocalCache {
    fn load(&self, course_id: CourseId) -> Result<LocalCourseCache, CacheError> {
        Self::read(&self.path_for(course_id))
    }

    fn store(
        &self,
        course_id: CourseId,
        lesson_id: LessonId,
        entry: LocalCacheEntry,
    ) -> Result<(), CacheError> {
        let _guard = self.write_lock.lock().map_err(|_| CacheError::Poisoned)?;
        let path = self.path_for(course_id);
        let mut entries = match Self::read(&path) {
            Ok(entries) => entries,
            Err(CacheError::Json(err)) => {
                warn!(
                    course = %course_id,
                    path = %path.display(),
                    error = %err,
                    "replacing unreadable progress cache"
                );
                LocalCourseCache::new()
            }
            Err(err) => return Err(err),
        };
        entries.insert(lesson_id, entry);

        fs::create_dir_all(&self.dir)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec(&entries)?)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}

/// Process-local cache, for tests and environments without a writable disk.
#[derive(Debug, Default)]
pub struct MemoryLocalCache {
    courses: Mutex<HashMap<CourseId, LocalCourseCache>>,
}

impl MemoryLocalCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl LocalCache for MemoryLocalCache {
    fn load(&self, course_id: CourseId) -> Result<LocalCourseCache, CacheError> {
        let courses = self.courses.lock().map_err(|_| CacheError::Poisoned)?;
        Ok(courses.get(&course_id).cloned().unwrap_or_default())
    }

    fn store(
        &self,
        course_id: CourseId,
        lesson_id: LessonId,
        entry: LocalCacheEntry,
    ) -> Result<(), CacheError> {
        let mut courses = self.courses.lock().map_err(|_| CacheError::Poisoned)?;
        courses.entry(course_id).or_default().insert(lesson_id, entry);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lms_core::time::fixed_now;

    fn entry(completed: bool, ts: f64) -> LocalCacheEntry {
        LocalCacheEntry {
            completed,
            video_timestamp: ts,
            last_accessed_at: fixed_now(),
            saved_at: fixed_now(),
        }
    }

    #[test]
    fn file_cache_uses_course_named_document() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileLocalCache::new(dir.path());
        let course = CourseId::new(12);

        assert!(cache.load(course).unwrap().is_empty());
        cache.store(course, LessonId::new(1), entry(true, 0.0)).unwrap();
        cache.store(course, LessonId::new(2), entry(false, 42.5)).unwrap();
        cache.store(course, LessonId::new(2), entry(false, 60.0)).unwrap();

        let path = dir.path().join("progress_12.json");
        let raw: serde_json::Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        assert_eq!(raw["1"]["completed"], true);
        assert_eq!(raw["2"]["videoTimestamp"], 60.0);
        assert!(raw["2"].get("savedAt").is_some());

        let loaded = cache.load(course).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[&LessonId::new(2)], entry(false, 60.0));
        assert!(cache.load(CourseId::new(13)).unwrap().is_empty());
    }

    #[test]
    fn corrupt_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileLocalCache::new(dir.path());
        fs::write(cache.path_for(CourseId::new(1)), b"not json").unwrap();
        assert!(matches!(cache.load(CourseId::new(1)), Err(CacheError::Json(_))));
    }

    #[test]
    fn store_starts_over_when_document_is_unreadable() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileLocalCache::new(dir.path());
        let course = CourseId::new(3);
        fs::write(cache.path_for(course), br#"{"1":{"completed":true,"videoTimestamp":null}}"#)
            .unwrap();
        assert!(cache.load(course).is_err());

        cache.store(course, LessonId::new(2), entry(true, 8.0)).unwrap();
        let loaded = cache.load(course).unwrap();
        assert_eq!(loaded.len(), 1);
        assert!(loaded[&LessonId::new(2)].completed);
    }

    #[test]
    fn memory_cache_keeps_courses_apart() {
        let cache = MemoryLocalCache::new();
        cache
            .store(CourseId::new(1), LessonId::new(1), entry(true, 0.0))
            .unwrap();
        assert_eq!(cache.load(CourseId::new(1)).unwrap().len(), 1);
        assert!(cache.load(CourseId::new(2)).unwrap().is_empty());
    }
}
