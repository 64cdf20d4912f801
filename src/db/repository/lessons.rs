//! Lesson repository trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::error::RepositoryResult;
use crate::api::{Cancellation, Lesson, LessonId, LessonStatus, NewLesson, StudentId};

/// Repository trait for lesson storage.
///
/// Lessons are never deleted; status transitions and reschedule moves go
/// through the conditional update methods, which take the status the caller
/// last observed and refuse to write when it changed underneath them.
#[async_trait]
pub trait LessonRepository: Send + Sync {
    /// Persist a new lesson, assigning its id and creation timestamp.
    async fn insert_lesson(&self, lesson: NewLesson) -> RepositoryResult<Lesson>;

    /// Fetch a lesson by id.
    async fn get_lesson(&self, id: LessonId) -> RepositoryResult<Option<Lesson>>;

    /// All lessons of one student, ordered by start time.
    async fn list_lessons_for_student(&self, student: StudentId) -> RepositoryResult<Vec<Lesson>>;

    /// All lessons overlapping `[from, to]`, ordered by start time. Used by
    /// the admin calendar view.
    async fn list_lessons_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> RepositoryResult<Vec<Lesson>>;

    /// The earliest non-cancelled lesson of `student` whose span touches
    /// `[window_start, window_end]` (inclusive on both bounds, matching the
    /// collision semantics of the booking engine). `ignore` excludes the
    /// lesson currently being rescheduled from its own check.
    async fn find_colliding_lesson(
        &self,
        student: StudentId,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
        ignore: Option<LessonId>,
    ) -> RepositoryResult<Option<Lesson>>;

    /// Move a lesson to a new time window, provided its status still equals
    /// `expected_status`.
    ///
    /// # Returns
    /// * `Ok(Some(lesson))` - the updated lesson
    /// * `Ok(None)` - the status changed concurrently; nothing written
    /// * `Err(NotFound)` - no lesson with this id
    async fn update_lesson_times(
        &self,
        id: LessonId,
        expected_status: LessonStatus,
        starts_at: DateTime<Utc>,
        ends_at: DateTime<Utc>,
    ) -> RepositoryResult<Option<Lesson>>;

    /// Transition a lesson from `expected_status` to `new_status`, replacing
    /// the cancellation metadata wholesale (transitions out of Cancelled
    /// pass `None` to clear it).
    ///
    /// # Returns
    /// * `Ok(Some(lesson))` - the updated lesson
    /// * `Ok(None)` - the status changed concurrently; nothing written
    /// * `Err(NotFound)` - no lesson with this id
    async fn update_lesson_status(
        &self,
        id: LessonId,
        expected_status: LessonStatus,
        new_status: LessonStatus,
        cancellation: Option<Cancellation>,
    ) -> RepositoryResult<Option<Lesson>>;
}
