//! Booking request negotiation.
//!
//! Requests travel between student and tutor in one of two directions and
//! resolve exactly once: pending -> accepted or pending -> declined. A
//! counter-proposal declines the original and opens a new pending request in
//! the opposite direction, so a negotiation chain has exactly one pending
//! request at any time.

use chrono::{DateTime, Utc};
use log::{info, warn};

use crate::api::{
    Actor, BookingRequest, Direction, Lesson, LessonId, LessonStatus, NewBookingRequest,
    NewLesson, RequestId, RequestKind, RequestStatus, StudentId, AdminSettings,
};
use crate::db::repository::FullRepository;
use crate::error::{BookingError, BookingResult};
use crate::models::window::BookingWindow;
use crate::models::availability::is_slot_within_availability;
use crate::services::{collision, ledger};

/// Longest stored request message; anything longer is cut off.
const MAX_MESSAGE_LENGTH: usize = 500;

/// Input for a new booking or reschedule request.
#[derive(Debug, Clone)]
pub struct SubmitRequest {
    pub student_id: StudentId,
    /// Who is proposing the window; determines the request direction.
    pub actor: Actor,
    pub kind: RequestKind,
    /// Target lesson, required for reschedules.
    pub lesson_id: Option<LessonId>,
    pub starts_at: DateTime<Utc>,
    /// Defaults to start + configured lesson duration.
    pub ends_at: Option<DateTime<Utc>>,
    pub message: Option<String>,
}

/// Result of accepting a request: the resolved request and the lesson it
/// created or moved.
#[derive(Debug, Clone)]
pub struct AcceptOutcome {
    pub request: BookingRequest,
    pub lesson: Lesson,
}

fn direction_for(actor: Actor) -> Direction {
    match actor {
        Actor::Student => Direction::StudentToAdmin,
        Actor::Admin => Direction::AdminToStudent,
    }
}

/// The direction whose requests `actor` is allowed to resolve: one always
/// acts on requests addressed to oneself.
fn inbound_direction(actor: Actor) -> Direction {
    direction_for(actor.opposite())
}

fn normalize_message(message: Option<String>) -> Option<String> {
    message
        .map(|m| m.trim().chars().take(MAX_MESSAGE_LENGTH).collect::<String>())
        .filter(|m| !m.is_empty())
}

/// Validate a proposed window against every booking rule.
///
/// `skip_pending_check` is set on the counter path, where the pending
/// reschedule being replaced would otherwise trip its own uniqueness check.
async fn validate_window(
    repo: &dyn FullRepository,
    settings: &AdminSettings,
    now: DateTime<Utc>,
    submit: &SubmitRequest,
    skip_pending_check: bool,
) -> BookingResult<BookingWindow> {
    if submit.kind == RequestKind::Reschedule {
        let lesson_id = submit
            .lesson_id
            .ok_or_else(|| BookingError::validation("A reschedule needs a target lesson."))?;

        let lesson = repo
            .get_lesson(lesson_id)
            .await?
            .ok_or_else(|| BookingError::not_found("Lesson not found."))?;

        if lesson.student_id != submit.student_id {
            return Err(BookingError::NotAuthorized);
        }

        if lesson.status != LessonStatus::Booked {
            return Err(BookingError::validation(
                "Only booked lessons can be rescheduled.",
            ));
        }

        if !skip_pending_check && repo.has_pending_reschedule(lesson_id).await? {
            return Err(BookingError::validation(
                "A reschedule request for this lesson is already pending.",
            ));
        }
    }

    let window = BookingWindow::normalize(
        submit.starts_at,
        submit.ends_at,
        settings.default_duration_min,
    )?;

    // Reschedules of an already-committed lesson are exempt from lead time.
    if submit.kind == RequestKind::Booking {
        window.enforce_lead_time(now, settings.lead_time_hours)?;
    }

    if !is_slot_within_availability(
        window.start(),
        window.end(),
        &settings.weekly_availability,
        settings.timezone,
    ) {
        return Err(BookingError::OutsideAvailability);
    }

    if submit.actor == Actor::Student && submit.kind == RequestKind::Booking {
        let package = repo.find_active_package(submit.student_id).await?;
        let has_credits = package.map(|p| p.lessons_left() > 0).unwrap_or(false);
        if !has_credits {
            return Err(BookingError::NoActivePackage);
        }
    }

    let ignore = if submit.kind == RequestKind::Reschedule {
        submit.lesson_id
    } else {
        None
    };
    collision::ensure_no_collision(
        repo,
        submit.student_id,
        window.start(),
        window.end(),
        settings.buffer_min,
        ignore,
        settings.timezone,
    )
    .await?;

    Ok(window)
}

/// Submit a new booking or reschedule request.
///
/// Validation order: reschedule prerequisites, window ordering, lead time
/// (bookings only), availability containment, active package with credits
/// (student bookings only), collision. Any failure prevents persistence.
pub async fn submit_request(
    repo: &dyn FullRepository,
    settings: &AdminSettings,
    now: DateTime<Utc>,
    submit: SubmitRequest,
) -> BookingResult<BookingRequest> {
    let window = validate_window(repo, settings, now, &submit, false).await?;

    let request = repo
        .insert_request(NewBookingRequest {
            student_id: submit.student_id,
            requester: Some(submit.actor),
            direction: direction_for(submit.actor),
            kind: submit.kind,
            proposed_starts_at: window.start(),
            proposed_ends_at: window.end(),
            message: normalize_message(submit.message),
            lesson_id: submit.lesson_id,
            counter_of: None,
        })
        .await
        .map_err(|err| {
            // The store's uniqueness guard catches a concurrent duplicate
            // that slipped past the pre-insert check.
            if err.is_conflict() {
                BookingError::validation("A reschedule request for this lesson is already pending.")
            } else {
                err.into()
            }
        })?;

    info!(
        "Request {} submitted: {:?} {:?} for student {}",
        request.id, request.kind, request.direction, request.student_id
    );
    Ok(request)
}

/// Look up the pending request `actor` may act on, enforcing ownership for
/// students.
async fn fetch_actionable_request(
    repo: &dyn FullRepository,
    request_id: RequestId,
    actor: Actor,
    student_id: Option<StudentId>,
) -> BookingResult<BookingRequest> {
    let request = repo
        .find_pending_request(request_id, inbound_direction(actor))
        .await?
        .ok_or_else(|| BookingError::not_found("Request not found or already handled."))?;

    if actor == Actor::Student && student_id != Some(request.student_id) {
        return Err(BookingError::NotAuthorized);
    }

    Ok(request)
}

/// Accept a pending request addressed to `actor`.
///
/// The collision check re-runs at accept time; the request is then claimed
/// with a conditional pending -> accepted write (`AlreadyResolved` when a
/// concurrent resolver won). A booking charges one credit from the student's
/// current active package, claims the request (refunding the credit if the
/// claim loses), then creates the lesson; a reschedule moves the target
/// lesson in place, touching neither status nor credits.
pub async fn accept_request(
    repo: &dyn FullRepository,
    settings: &AdminSettings,
    request_id: RequestId,
    actor: Actor,
    student_id: Option<StudentId>,
) -> BookingResult<AcceptOutcome> {
    let request = fetch_actionable_request(repo, request_id, actor, student_id).await?;

    match request.kind {
        RequestKind::Booking => {
            collision::ensure_no_collision(
                repo,
                request.student_id,
                request.proposed_starts_at,
                request.proposed_ends_at,
                settings.buffer_min,
                None,
                settings.timezone,
            )
            .await?;

            let package = repo.find_active_package(request.student_id).await?;

            // Take the credit before claiming the request: a failed charge
            // then leaves the request pending with nothing to unwind.
            if let Some(package) = package.as_ref() {
                ledger::charge_credit(repo, package.id).await?;
            }

            let accepted = match repo
                .resolve_request(request.id, RequestStatus::Accepted)
                .await?
            {
                Some(accepted) => accepted,
                None => {
                    // A concurrent resolver claimed the request first; hand
                    // the credit back.
                    if let Some(package) = package.as_ref() {
                        if let Err(err) = ledger::refund_credit(repo, package.id).await {
                            warn!(
                                "Could not compensate charge on package {}: {}",
                                package.id, err
                            );
                        }
                    }
                    return Err(BookingError::AlreadyResolved);
                }
            };

            let lesson = repo
                .insert_lesson(NewLesson {
                    student_id: request.student_id,
                    package_id: package.as_ref().map(|p| p.id),
                    starts_at: request.proposed_starts_at,
                    ends_at: request.proposed_ends_at,
                    status: LessonStatus::Booked,
                })
                .await?;

            info!(
                "Request {} accepted, lesson {} booked for student {}",
                accepted.id, lesson.id, lesson.student_id
            );
            Ok(AcceptOutcome {
                request: accepted,
                lesson,
            })
        }
        RequestKind::Reschedule => {
            let lesson_id = request
                .lesson_id
                .ok_or_else(|| BookingError::validation("Proposal has no target lesson."))?;

            let lesson = repo
                .get_lesson(lesson_id)
                .await?
                .ok_or_else(|| BookingError::not_found("Lesson not found."))?;

            if lesson.student_id != request.student_id {
                return Err(BookingError::validation(
                    "Lesson does not belong to this student.",
                ));
            }

            collision::ensure_no_collision(
                repo,
                request.student_id,
                request.proposed_starts_at,
                request.proposed_ends_at,
                settings.buffer_min,
                Some(lesson_id),
                settings.timezone,
            )
            .await?;

            let accepted = repo
                .resolve_request(request.id, RequestStatus::Accepted)
                .await?
                .ok_or(BookingError::AlreadyResolved)?;

            let moved = repo
                .update_lesson_times(
                    lesson_id,
                    LessonStatus::Booked,
                    request.proposed_starts_at,
                    request.proposed_ends_at,
                )
                .await?
                .ok_or(BookingError::AlreadyResolved)?;

            info!(
                "Request {} accepted, lesson {} moved to {}",
                accepted.id, moved.id, moved.starts_at
            );
            Ok(AcceptOutcome {
                request: accepted,
                lesson: moved,
            })
        }
    }
}

/// Decline a pending request addressed to `actor`. No side effects beyond
/// the status flip.
pub async fn decline_request(
    repo: &dyn FullRepository,
    request_id: RequestId,
    actor: Actor,
    student_id: Option<StudentId>,
) -> BookingResult<BookingRequest> {
    let request = fetch_actionable_request(repo, request_id, actor, student_id).await?;

    let declined = repo
        .resolve_request(request.id, RequestStatus::Declined)
        .await?
        .ok_or(BookingError::AlreadyResolved)?;

    info!("Request {} declined by {:?}", declined.id, actor);
    Ok(declined)
}

/// Counter a pending request with a different window.
///
/// The replacement window passes the full submission validation first; only
/// then is the original declined and the new pending request stored in the
/// opposite direction, carrying over kind and target lesson with
/// `counter_of` pointing back at the original.
pub async fn counter_request(
    repo: &dyn FullRepository,
    settings: &AdminSettings,
    now: DateTime<Utc>,
    request_id: RequestId,
    actor: Actor,
    student_id: Option<StudentId>,
    starts_at: DateTime<Utc>,
    ends_at: Option<DateTime<Utc>>,
    message: Option<String>,
) -> BookingResult<BookingRequest> {
    let original = fetch_actionable_request(repo, request_id, actor, student_id).await?;

    let submit = SubmitRequest {
        student_id: original.student_id,
        actor,
        kind: original.kind,
        lesson_id: original.lesson_id,
        starts_at,
        ends_at,
        message: None,
    };
    let window = validate_window(repo, settings, now, &submit, true).await?;

    repo.resolve_request(original.id, RequestStatus::Declined)
        .await?
        .ok_or(BookingError::AlreadyResolved)?;

    let counter = repo
        .insert_request(NewBookingRequest {
            student_id: original.student_id,
            requester: Some(actor),
            direction: original.direction.opposite(),
            kind: original.kind,
            proposed_starts_at: window.start(),
            proposed_ends_at: window.end(),
            message: normalize_message(message),
            lesson_id: original.lesson_id,
            counter_of: Some(original.id),
        })
        .await
        .map_err(|err| {
            if err.is_conflict() {
                BookingError::validation("A reschedule request for this lesson is already pending.")
            } else {
                err.into()
            }
        })?;

    info!(
        "Request {} countered by {:?} with request {}",
        original.id, actor, counter.id
    );
    Ok(counter)
}
