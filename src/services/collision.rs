//! Buffer-aware collision detection.
//!
//! A student can hold at most one lesson per time window, padded on both
//! sides by the configured buffer. The check mirrors the store query used
//! for it: inclusive bounds, cancelled lessons ignored, optionally ignoring
//! the lesson currently being rescheduled.

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use log::debug;

use crate::api::{LessonId, StudentId};
use crate::db::repository::FullRepository;
use crate::error::{BookingError, BookingResult};

/// Ensure no other lesson of `student` overlaps the given window.
///
/// The window is expanded by `buffer_min` minutes on both sides before the
/// lookup, so two lessons must be separated by at least the buffer. A hit on
/// the exact expanded boundary counts as a conflict (inclusive comparison).
///
/// # Arguments
/// * `ignore` - Lesson excluded from the check (the one being moved)
/// * `tz` - Timezone used to render the conflicting window in the error
///
/// # Returns
/// * `Ok(())` when the window is free
/// * `Err(BookingError::Collision)` naming the conflicting slot otherwise
pub async fn ensure_no_collision(
    repo: &dyn FullRepository,
    student: StudentId,
    starts_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
    buffer_min: u32,
    ignore: Option<LessonId>,
    tz: Tz,
) -> BookingResult<()> {
    let buffer = Duration::minutes(i64::from(buffer_min));
    let window_start = starts_at - buffer;
    let window_end = ends_at + buffer;

    let clash = repo
        .find_colliding_lesson(student, window_start, window_end, ignore)
        .await?;

    if let Some(lesson) = clash {
        debug!(
            "Collision for student {}: lesson {} occupies {} - {}",
            student, lesson.id, lesson.starts_at, lesson.ends_at
        );

        let start_local = lesson.starts_at.with_timezone(&tz);
        let end_local = lesson.ends_at.with_timezone(&tz);
        let formatted = format!(
            "{} {}-{}",
            start_local.format("%d.%m."),
            start_local.format("%H:%M"),
            end_local.format("%H:%M")
        );
        let buffer_suffix = if buffer_min > 0 {
            format!(" (incl. {} min buffer)", buffer_min)
        } else {
            String::new()
        };

        return Err(BookingError::Collision(format!(
            "The time window collides{} with {}.",
            buffer_suffix, formatted
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{LessonStatus, NewLesson, APPLICATION_TIMEZONE};
    use crate::db::repository::LessonRepository;
    use crate::db::LocalRepository;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 9, 7, h, m, 0).single().unwrap()
    }

    async fn seed_lesson(repo: &LocalRepository, student: StudentId) -> LessonId {
        let lesson = repo
            .insert_lesson(NewLesson {
                student_id: student,
                package_id: None,
                starts_at: at(10, 0),
                ends_at: at(10, 45),
                status: LessonStatus::Booked,
            })
            .await
            .unwrap();
        lesson.id
    }

    #[tokio::test]
    async fn detects_overlap_within_buffer() {
        let repo = LocalRepository::new();
        let student = StudentId::generate();
        seed_lesson(&repo, student).await;

        // 11:00 starts 15 minutes after the lesson ends; a 30 min buffer
        // still spans it.
        let result = ensure_no_collision(
            &repo,
            student,
            at(11, 0),
            at(11, 45),
            30,
            None,
            APPLICATION_TIMEZONE,
        )
        .await;
        assert!(matches!(result, Err(BookingError::Collision(_))));
    }

    #[tokio::test]
    async fn accepts_window_beyond_buffer() {
        let repo = LocalRepository::new();
        let student = StudentId::generate();
        seed_lesson(&repo, student).await;

        let result = ensure_no_collision(
            &repo,
            student,
            at(12, 0),
            at(12, 45),
            30,
            None,
            APPLICATION_TIMEZONE,
        )
        .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn boundary_touch_counts_as_conflict() {
        let repo = LocalRepository::new();
        let student = StudentId::generate();
        seed_lesson(&repo, student).await;

        // Expanded window end == existing lesson start: inclusive bounds.
        let result = ensure_no_collision(
            &repo,
            student,
            at(9, 0),
            at(9, 30),
            30,
            None,
            APPLICATION_TIMEZONE,
        )
        .await;
        assert!(matches!(result, Err(BookingError::Collision(_))));
    }

    #[tokio::test]
    async fn ignores_the_lesson_being_moved() {
        let repo = LocalRepository::new();
        let student = StudentId::generate();
        let lesson_id = seed_lesson(&repo, student).await;

        let result = ensure_no_collision(
            &repo,
            student,
            at(10, 0),
            at(10, 45),
            30,
            Some(lesson_id),
            APPLICATION_TIMEZONE,
        )
        .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn other_students_do_not_conflict() {
        let repo = LocalRepository::new();
        let student = StudentId::generate();
        seed_lesson(&repo, student).await;

        let result = ensure_no_collision(
            &repo,
            StudentId::generate(),
            at(10, 0),
            at(10, 45),
            30,
            None,
            APPLICATION_TIMEZONE,
        )
        .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn zero_buffer_message_has_no_suffix() {
        let repo = LocalRepository::new();
        let student = StudentId::generate();
        seed_lesson(&repo, student).await;

        let err = ensure_no_collision(
            &repo,
            student,
            at(10, 0),
            at(10, 45),
            0,
            None,
            APPLICATION_TIMEZONE,
        )
        .await
        .unwrap_err();
        let message = err.to_string();
        assert!(!message.contains("buffer"));
        // 10:00 UTC is 12:00 in Zurich during CEST.
        assert!(message.contains("12:00"), "message: {}", message);
    }
}
