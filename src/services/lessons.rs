//! Lesson lifecycle transitions and their ledger side effects.
//!
//! Statuses split into credit-consumed (Booked, Completed, NoShowCharged)
//! and credit-refunded (Cancelled, NoShowRefunded) groups. Crossing from one
//! group to the other moves exactly one credit on the lesson's package; every
//! status write is conditional on the status just read, so concurrent
//! transitions cannot double-move credits.

use chrono::{DateTime, Duration, Utc};
use log::{info, warn};

use crate::api::{
    Actor, AdminSettings, Cancellation, Lesson, LessonId, LessonStatus, StudentId,
};
use crate::db::repository::FullRepository;
use crate::error::{BookingError, BookingResult};
use crate::models::window::BookingWindow;
use crate::services::{collision, ledger};

/// Reason recorded when the tutor cancels without giving one.
const DEFAULT_ADMIN_CANCEL_REASON: &str = "Cancelled by admin.";

/// Longest stored cancellation reason.
const MAX_REASON_LENGTH: usize = 500;

/// Who is cancelling. Students must prove ownership; the tutor may cancel
/// anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelActor {
    Student(StudentId),
    Admin,
}

async fn fetch_lesson(
    repo: &dyn FullRepository,
    lesson_id: LessonId,
) -> BookingResult<Lesson> {
    repo.get_lesson(lesson_id)
        .await?
        .ok_or_else(|| BookingError::not_found("Lesson not found."))
}

/// Cancel a booked lesson.
///
/// Students must own the lesson, give a non-empty reason, and act at least
/// `cancel_window_hours` before the start. The tutor has no time restriction
/// and a blank reason is defaulted. On success one credit flows back to the
/// lesson's package, if it holds one.
pub async fn cancel_lesson(
    repo: &dyn FullRepository,
    settings: &AdminSettings,
    now: DateTime<Utc>,
    lesson_id: LessonId,
    actor: CancelActor,
    reason: &str,
) -> BookingResult<Lesson> {
    let lesson = fetch_lesson(repo, lesson_id).await?;

    if lesson.status == LessonStatus::Cancelled {
        return Err(BookingError::validation("Lesson is already cancelled."));
    }
    if lesson.status != LessonStatus::Booked {
        return Err(BookingError::validation(
            "Only booked lessons can be cancelled.",
        ));
    }

    let trimmed = reason.trim();
    let (cancelled_by, reason) = match actor {
        CancelActor::Student(student_id) => {
            if lesson.student_id != student_id {
                return Err(BookingError::NotAuthorized);
            }
            if trimmed.is_empty() {
                return Err(BookingError::validation(
                    "A reason is required to cancel the lesson.",
                ));
            }
            let window = settings.cancel_window_hours;
            if lesson.starts_at - now < Duration::hours(window) {
                return Err(BookingError::CancellationWindow { hours: window });
            }
            (Actor::Student, trimmed.to_string())
        }
        CancelActor::Admin => {
            let reason = if trimmed.is_empty() {
                DEFAULT_ADMIN_CANCEL_REASON.to_string()
            } else {
                trimmed.to_string()
            };
            (Actor::Admin, reason)
        }
    };

    let cancellation = Cancellation {
        reason: reason.chars().take(MAX_REASON_LENGTH).collect(),
        cancelled_at: now,
        cancelled_by,
    };

    let cancelled = repo
        .update_lesson_status(
            lesson_id,
            LessonStatus::Booked,
            LessonStatus::Cancelled,
            Some(cancellation),
        )
        .await?
        .ok_or(BookingError::AlreadyResolved)?;

    if let Some(package_id) = cancelled.package_id {
        ledger::refund_credit(repo, package_id).await?;
    }

    info!(
        "Lesson {} cancelled by {:?}, student {}",
        cancelled.id, cancelled_by, cancelled.student_id
    );
    Ok(cancelled)
}

/// Admin toggle between Booked and Completed.
///
/// A no-op when the lesson already has the target status. Leaving a refunded
/// state (Cancelled, NoShowRefunded) re-charges one credit first and can
/// fail with `NoCreditsAvailable`; cancellation metadata is cleared on the
/// way out. The charge is handed back if the conditional write loses a race.
pub async fn set_lesson_status(
    repo: &dyn FullRepository,
    lesson_id: LessonId,
    target: LessonStatus,
) -> BookingResult<Lesson> {
    if !matches!(target, LessonStatus::Booked | LessonStatus::Completed) {
        return Err(BookingError::validation("Unsupported target status."));
    }

    let lesson = fetch_lesson(repo, lesson_id).await?;
    if lesson.status == target {
        return Ok(lesson);
    }

    let recharge = lesson.status.is_refunded();
    if recharge {
        if let Some(package_id) = lesson.package_id {
            ledger::charge_credit(repo, package_id).await?;
        }
    }

    let updated = repo
        .update_lesson_status(lesson_id, lesson.status, target, None)
        .await?;

    match updated {
        Some(updated) => {
            info!("Lesson {} set to {}", updated.id, updated.status);
            Ok(updated)
        }
        None => {
            // Another writer changed the status under us; undo the charge.
            if recharge {
                if let Some(package_id) = lesson.package_id {
                    if let Err(err) = ledger::refund_credit(repo, package_id).await {
                        warn!(
                            "Could not compensate charge on package {}: {}",
                            package_id, err
                        );
                    }
                }
            }
            Err(BookingError::AlreadyResolved)
        }
    }
}

/// Record a no-show, keeping or refunding the consumed credit.
///
/// A no-op when the lesson already carries the requested no-show status.
/// Moving to NoShowRefunded from a consumed state refunds one credit; moving
/// to NoShowCharged from a refunded state re-charges first and surfaces
/// `NoCreditsAvailable` without touching the status when the package is
/// exhausted.
pub async fn register_no_show(
    repo: &dyn FullRepository,
    lesson_id: LessonId,
    refund_credit: bool,
) -> BookingResult<Lesson> {
    let target = if refund_credit {
        LessonStatus::NoShowRefunded
    } else {
        LessonStatus::NoShowCharged
    };

    let lesson = fetch_lesson(repo, lesson_id).await?;
    if lesson.status == target {
        return Ok(lesson);
    }

    let recharge = !target.is_refunded() && lesson.status.is_refunded();
    if recharge {
        if let Some(package_id) = lesson.package_id {
            ledger::charge_credit(repo, package_id).await?;
        }
    }

    let updated = repo
        .update_lesson_status(lesson_id, lesson.status, target, None)
        .await?;

    let updated = match updated {
        Some(updated) => updated,
        None => {
            if recharge {
                if let Some(package_id) = lesson.package_id {
                    if let Err(err) = ledger::refund_credit(repo, package_id).await {
                        warn!(
                            "Could not compensate charge on package {}: {}",
                            package_id, err
                        );
                    }
                }
            }
            return Err(BookingError::AlreadyResolved);
        }
    };

    if target.is_refunded() && !lesson.status.is_refunded() {
        if let Some(package_id) = updated.package_id {
            ledger::refund_credit(repo, package_id).await?;
        }
    }

    info!("Lesson {} marked {}", updated.id, updated.status);
    Ok(updated)
}

/// Direct admin move of a booked lesson, bypassing the request flow.
///
/// No lead-time requirement; the collision check ignores the lesson itself.
pub async fn reschedule_lesson(
    repo: &dyn FullRepository,
    settings: &AdminSettings,
    lesson_id: LessonId,
    starts_at: DateTime<Utc>,
    ends_at: Option<DateTime<Utc>>,
) -> BookingResult<Lesson> {
    let lesson = fetch_lesson(repo, lesson_id).await?;

    if lesson.status != LessonStatus::Booked {
        return Err(BookingError::validation(
            "Only booked lessons can be moved.",
        ));
    }

    let window = BookingWindow::normalize(starts_at, ends_at, settings.default_duration_min)?;

    collision::ensure_no_collision(
        repo,
        lesson.student_id,
        window.start(),
        window.end(),
        settings.buffer_min,
        Some(lesson_id),
        settings.timezone,
    )
    .await?;

    let moved = repo
        .update_lesson_times(lesson_id, LessonStatus::Booked, window.start(), window.end())
        .await?
        .ok_or(BookingError::AlreadyResolved)?;

    info!("Lesson {} moved to {}", moved.id, moved.starts_at);
    Ok(moved)
}
