mod support;

use chrono::Duration;

use support::{insert_booked_lesson, settings, test_now};
use tutorbook::api::{
    Actor, Direction, LessonStatus, NewBookingRequest, NewStudentPackage, PackageStatus,
    RequestKind, RequestStatus, StudentId,
};
use tutorbook::db::repositories::LocalRepository;
use tutorbook::db::repository::{
    BookingRequestRepository, PackageRepository, RequestFilter,
};
use tutorbook::services::{
    accept_request, counter_request, decline_request, grant_package, submit_request,
    SubmitRequest,
};
use tutorbook::BookingError;

fn booking(student: StudentId, starts_at: chrono::DateTime<chrono::Utc>) -> SubmitRequest {
    SubmitRequest {
        student_id: student,
        actor: Actor::Student,
        kind: RequestKind::Booking,
        lesson_id: None,
        starts_at,
        ends_at: None,
        message: None,
    }
}

#[tokio::test]
async fn test_submit_booking_creates_pending_request() {
    let repo = LocalRepository::new();
    let student = StudentId::generate();
    grant_package(&repo, student, 10).await.unwrap();

    let starts_at = test_now() + Duration::days(2);
    let request = submit_request(&repo, &settings(), test_now(), booking(student, starts_at))
        .await
        .unwrap();

    assert_eq!(request.status, RequestStatus::Pending);
    assert_eq!(request.direction, Direction::StudentToAdmin);
    assert_eq!(request.requester, Some(Actor::Student));
    assert_eq!(request.proposed_starts_at, starts_at);
    // End defaults to start + configured duration.
    assert_eq!(request.proposed_ends_at, starts_at + Duration::minutes(45));
}

#[tokio::test]
async fn test_submit_rejects_short_lead_time() {
    let repo = LocalRepository::new();
    let student = StudentId::generate();
    grant_package(&repo, student, 10).await.unwrap();

    let starts_at = test_now() + Duration::hours(2);
    let result = submit_request(&repo, &settings(), test_now(), booking(student, starts_at)).await;

    assert!(matches!(result, Err(BookingError::LeadTime { hours: 6 })));
}

#[tokio::test]
async fn test_submit_rejects_slot_outside_open_hours() {
    let repo = LocalRepository::new();
    let student = StudentId::generate();
    grant_package(&repo, student, 10).await.unwrap();

    // 03:00 UTC is 05:00 in Zurich, before the default 07:00 opening.
    let starts_at = test_now() + Duration::days(2) - Duration::hours(5);
    let result = submit_request(&repo, &settings(), test_now(), booking(student, starts_at)).await;

    assert!(matches!(result, Err(BookingError::OutsideAvailability)));
}

#[tokio::test]
async fn test_student_booking_requires_active_package() {
    let repo = LocalRepository::new();
    let student = StudentId::generate();

    let starts_at = test_now() + Duration::days(2);
    let result = submit_request(&repo, &settings(), test_now(), booking(student, starts_at)).await;

    assert!(matches!(result, Err(BookingError::NoActivePackage)));
}

#[tokio::test]
async fn test_admin_proposal_needs_no_package() {
    let repo = LocalRepository::new();
    let student = StudentId::generate();

    let starts_at = test_now() + Duration::days(2);
    let request = submit_request(
        &repo,
        &settings(),
        test_now(),
        SubmitRequest {
            actor: Actor::Admin,
            ..booking(student, starts_at)
        },
    )
    .await
    .unwrap();

    assert_eq!(request.direction, Direction::AdminToStudent);
}

#[tokio::test]
async fn test_accept_creates_lesson_and_charges_one_credit() {
    let repo = LocalRepository::new();
    let student = StudentId::generate();
    let package = grant_package(&repo, student, 10).await.unwrap();

    let starts_at = test_now() + Duration::days(2);
    let request = submit_request(&repo, &settings(), test_now(), booking(student, starts_at))
        .await
        .unwrap();

    let outcome = accept_request(&repo, &settings(), request.id, Actor::Admin, None)
        .await
        .unwrap();

    assert_eq!(outcome.request.status, RequestStatus::Accepted);
    assert_eq!(outcome.lesson.status, LessonStatus::Booked);
    assert_eq!(outcome.lesson.student_id, student);
    assert_eq!(outcome.lesson.package_id, Some(package.id));
    assert_eq!(outcome.lesson.starts_at, starts_at);
    assert_eq!(repo.lesson_count(), 1);

    let charged = repo.get_package(package.id).await.unwrap().unwrap();
    assert_eq!(charged.lessons_used, 1);
}

#[tokio::test]
async fn test_accept_twice_fails() {
    let repo = LocalRepository::new();
    let student = StudentId::generate();
    grant_package(&repo, student, 10).await.unwrap();

    let request = submit_request(
        &repo,
        &settings(),
        test_now(),
        booking(student, test_now() + Duration::days(2)),
    )
    .await
    .unwrap();

    accept_request(&repo, &settings(), request.id, Actor::Admin, None)
        .await
        .unwrap();
    let second = accept_request(&repo, &settings(), request.id, Actor::Admin, None).await;

    // The pending lookup no longer finds it.
    assert!(matches!(second, Err(BookingError::NotFound(_))));
    assert_eq!(repo.lesson_count(), 1);
}

#[tokio::test]
async fn test_decline_creates_no_lesson() {
    let repo = LocalRepository::new();
    let student = StudentId::generate();
    let package = grant_package(&repo, student, 10).await.unwrap();

    let request = submit_request(
        &repo,
        &settings(),
        test_now(),
        booking(student, test_now() + Duration::days(2)),
    )
    .await
    .unwrap();

    let declined = decline_request(&repo, request.id, Actor::Admin, None)
        .await
        .unwrap();

    assert_eq!(declined.status, RequestStatus::Declined);
    assert_eq!(repo.lesson_count(), 0);

    let untouched = repo.get_package(package.id).await.unwrap().unwrap();
    assert_eq!(untouched.lessons_used, 0);
}

#[tokio::test]
async fn test_submit_rejects_window_inside_buffer() {
    let repo = LocalRepository::new();
    let student = StudentId::generate();
    grant_package(&repo, student, 10).await.unwrap();

    let booked_start = test_now() + Duration::days(2);
    insert_booked_lesson(&repo, student, None, booked_start).await;

    // Existing lesson ends 45 min after start; one hour later is still
    // inside the 30 min buffer on each side.
    let result = submit_request(
        &repo,
        &settings(),
        test_now(),
        booking(student, booked_start + Duration::hours(1)),
    )
    .await;

    assert!(matches!(result, Err(BookingError::Collision(_))));
}

#[tokio::test]
async fn test_submit_accepts_window_beyond_buffer() {
    let repo = LocalRepository::new();
    let student = StudentId::generate();
    grant_package(&repo, student, 10).await.unwrap();

    let booked_start = test_now() + Duration::days(2);
    insert_booked_lesson(&repo, student, None, booked_start).await;

    let result = submit_request(
        &repo,
        &settings(),
        test_now(),
        booking(student, booked_start + Duration::minutes(90)),
    )
    .await;

    assert!(result.is_ok());
}

#[tokio::test]
async fn test_other_students_lessons_do_not_collide() {
    let repo = LocalRepository::new();
    let student = StudentId::generate();
    let other = StudentId::generate();
    grant_package(&repo, student, 10).await.unwrap();

    let booked_start = test_now() + Duration::days(2);
    insert_booked_lesson(&repo, other, None, booked_start).await;

    let result =
        submit_request(&repo, &settings(), test_now(), booking(student, booked_start)).await;

    assert!(result.is_ok());
}

#[tokio::test]
async fn test_student_cannot_resolve_another_students_request() {
    let repo = LocalRepository::new();
    let student = StudentId::generate();
    let intruder = StudentId::generate();

    let request = submit_request(
        &repo,
        &settings(),
        test_now(),
        SubmitRequest {
            actor: Actor::Admin,
            ..booking(student, test_now() + Duration::days(2))
        },
    )
    .await
    .unwrap();

    let result =
        accept_request(&repo, &settings(), request.id, Actor::Student, Some(intruder)).await;

    assert!(matches!(result, Err(BookingError::NotAuthorized)));
}

#[tokio::test]
async fn test_counter_declines_original_and_opens_opposite_pending() {
    let repo = LocalRepository::new();
    let student = StudentId::generate();
    grant_package(&repo, student, 10).await.unwrap();

    let original = submit_request(
        &repo,
        &settings(),
        test_now(),
        booking(student, test_now() + Duration::days(2)),
    )
    .await
    .unwrap();

    let counter = counter_request(
        &repo,
        &settings(),
        test_now(),
        original.id,
        Actor::Admin,
        None,
        test_now() + Duration::days(3),
        None,
        Some("Does the day after work instead?".to_string()),
    )
    .await
    .unwrap();

    assert_eq!(counter.status, RequestStatus::Pending);
    assert_eq!(counter.direction, Direction::AdminToStudent);
    assert_eq!(counter.kind, RequestKind::Booking);
    assert_eq!(counter.counter_of, Some(original.id));

    let resolved = repo.get_request(original.id).await.unwrap().unwrap();
    assert_eq!(resolved.status, RequestStatus::Declined);

    // Exactly one request in the chain is still actionable.
    let pending = repo
        .list_requests(RequestFilter {
            student_id: Some(student),
            status: Some(RequestStatus::Pending),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, counter.id);

    // The student can accept the counter to complete the booking.
    let outcome = accept_request(&repo, &settings(), counter.id, Actor::Student, Some(student))
        .await
        .unwrap();
    assert_eq!(outcome.lesson.starts_at, test_now() + Duration::days(3));
}

#[tokio::test]
async fn test_reschedule_request_moves_lesson_without_new_charge() {
    let repo = LocalRepository::new();
    let student = StudentId::generate();
    let package = grant_package(&repo, student, 10).await.unwrap();

    let booked = submit_request(
        &repo,
        &settings(),
        test_now(),
        booking(student, test_now() + Duration::days(2)),
    )
    .await
    .unwrap();
    let outcome = accept_request(&repo, &settings(), booked.id, Actor::Admin, None)
        .await
        .unwrap();

    let new_start = test_now() + Duration::days(4);
    let reschedule = submit_request(
        &repo,
        &settings(),
        test_now(),
        SubmitRequest {
            kind: RequestKind::Reschedule,
            lesson_id: Some(outcome.lesson.id),
            starts_at: new_start,
            ..booking(student, new_start)
        },
    )
    .await
    .unwrap();
    assert_eq!(reschedule.kind, RequestKind::Reschedule);

    let moved = accept_request(&repo, &settings(), reschedule.id, Actor::Admin, None)
        .await
        .unwrap();

    assert_eq!(moved.lesson.id, outcome.lesson.id);
    assert_eq!(moved.lesson.starts_at, new_start);
    assert_eq!(repo.lesson_count(), 1);

    let charged = repo.get_package(package.id).await.unwrap().unwrap();
    assert_eq!(charged.lessons_used, 1);
}

#[tokio::test]
async fn test_duplicate_pending_reschedule_rejected() {
    let repo = LocalRepository::new();
    let student = StudentId::generate();
    grant_package(&repo, student, 10).await.unwrap();

    let booked = submit_request(
        &repo,
        &settings(),
        test_now(),
        booking(student, test_now() + Duration::days(2)),
    )
    .await
    .unwrap();
    let outcome = accept_request(&repo, &settings(), booked.id, Actor::Admin, None)
        .await
        .unwrap();

    let reschedule = SubmitRequest {
        kind: RequestKind::Reschedule,
        lesson_id: Some(outcome.lesson.id),
        starts_at: test_now() + Duration::days(4),
        ..booking(student, test_now() + Duration::days(4))
    };

    submit_request(&repo, &settings(), test_now(), reschedule.clone())
        .await
        .unwrap();
    let second = submit_request(
        &repo,
        &settings(),
        test_now(),
        SubmitRequest {
            starts_at: test_now() + Duration::days(5),
            ..reschedule
        },
    )
    .await;

    assert!(matches!(second, Err(BookingError::Validation(_))));
}

#[tokio::test]
async fn test_store_rejects_second_pending_reschedule_for_lesson() {
    let repo = LocalRepository::new();
    let student = StudentId::generate();
    let lesson = insert_booked_lesson(&repo, student, None, test_now() + Duration::days(2)).await;

    // The store itself enforces the one-pending-reschedule guard, so two
    // writers racing past the service-level check cannot both land.
    let reschedule = NewBookingRequest {
        student_id: student,
        requester: Some(Actor::Student),
        direction: Direction::StudentToAdmin,
        kind: RequestKind::Reschedule,
        proposed_starts_at: test_now() + Duration::days(4),
        proposed_ends_at: test_now() + Duration::days(4) + Duration::minutes(45),
        message: None,
        lesson_id: Some(lesson.id),
        counter_of: None,
    };

    repo.insert_request(reschedule.clone()).await.unwrap();
    let err = repo
        .insert_request(NewBookingRequest {
            proposed_starts_at: test_now() + Duration::days(5),
            proposed_ends_at: test_now() + Duration::days(5) + Duration::minutes(45),
            ..reschedule
        })
        .await
        .unwrap_err();

    assert!(err.is_conflict());
    assert_eq!(repo.request_count(), 1);
}

#[tokio::test]
async fn test_store_rejects_second_active_package() {
    let repo = LocalRepository::new();
    let student = StudentId::generate();

    repo.insert_package(NewStudentPackage {
        student_id: student,
        lessons_total: 5,
    })
    .await
    .unwrap();
    let err = repo
        .insert_package(NewStudentPackage {
            student_id: student,
            lessons_total: 3,
        })
        .await
        .unwrap_err();

    assert!(err.is_conflict());
}

#[tokio::test]
async fn test_failed_charge_leaves_request_pending() {
    let repo = LocalRepository::new();
    let student = StudentId::generate();
    let package = grant_package(&repo, student, 1).await.unwrap();

    let request = submit_request(
        &repo,
        &settings(),
        test_now(),
        booking(student, test_now() + Duration::days(2)),
    )
    .await
    .unwrap();

    // Drain the package behind the request's back, keeping it Active so the
    // accept path still picks it up.
    repo.update_package_credits(package.id, 0, 1, PackageStatus::Active)
        .await
        .unwrap()
        .unwrap();

    let result = accept_request(&repo, &settings(), request.id, Actor::Admin, None).await;
    assert!(matches!(result, Err(BookingError::NoCreditsAvailable)));

    // The failed charge must not leave an accepted request or a booked
    // lesson behind.
    let untouched = repo.get_request(request.id).await.unwrap().unwrap();
    assert_eq!(untouched.status, RequestStatus::Pending);
    assert_eq!(repo.lesson_count(), 0);

    let drained = repo.get_package(package.id).await.unwrap().unwrap();
    assert_eq!(drained.lessons_used, 1);
}

#[tokio::test]
async fn test_counter_chain_keeps_single_pending_request() {
    let repo = LocalRepository::new();
    let student = StudentId::generate();
    grant_package(&repo, student, 10).await.unwrap();

    let first = submit_request(
        &repo,
        &settings(),
        test_now(),
        booking(student, test_now() + Duration::days(2)),
    )
    .await
    .unwrap();

    let second = counter_request(
        &repo,
        &settings(),
        test_now(),
        first.id,
        Actor::Admin,
        None,
        test_now() + Duration::days(3),
        None,
        None,
    )
    .await
    .unwrap();

    let third = counter_request(
        &repo,
        &settings(),
        test_now(),
        second.id,
        Actor::Student,
        Some(student),
        test_now() + Duration::days(4),
        None,
        None,
    )
    .await
    .unwrap();

    assert_ne!(first.id, second.id);
    assert_ne!(second.id, third.id);
    assert_ne!(first.id, third.id);

    // Back-references walk the chain without revisiting an id.
    assert_eq!(third.counter_of, Some(second.id));
    assert_eq!(second.counter_of, Some(first.id));
    assert_eq!(first.counter_of, None);

    let first_stored = repo.get_request(first.id).await.unwrap().unwrap();
    let second_stored = repo.get_request(second.id).await.unwrap().unwrap();
    assert_eq!(first_stored.status, RequestStatus::Declined);
    assert_eq!(second_stored.status, RequestStatus::Declined);

    // Only the newest hop is actionable.
    let pending = repo
        .list_requests(RequestFilter {
            student_id: Some(student),
            status: Some(RequestStatus::Pending),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, third.id);
    assert_eq!(pending[0].direction, Direction::StudentToAdmin);
}

#[tokio::test]
async fn test_message_is_truncated() {
    let repo = LocalRepository::new();
    let student = StudentId::generate();
    grant_package(&repo, student, 10).await.unwrap();

    let request = submit_request(
        &repo,
        &settings(),
        test_now(),
        SubmitRequest {
            message: Some("x".repeat(600)),
            ..booking(student, test_now() + Duration::days(2))
        },
    )
    .await
    .unwrap();

    assert_eq!(request.message.as_ref().map(String::len), Some(500));
}
