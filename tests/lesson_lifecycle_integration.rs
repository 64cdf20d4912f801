mod support;

use chrono::Duration;

use support::{insert_booked_lesson, settings, test_now};
use tutorbook::api::{Actor, LessonStatus, PackageStatus, StudentId};
use tutorbook::db::repositories::LocalRepository;
use tutorbook::db::repository::{LessonRepository, PackageRepository};
use tutorbook::services::{
    accept_request, cancel_lesson, charge_credit, grant_package, register_no_show,
    reschedule_lesson, set_lesson_status, submit_request, CancelActor, SubmitRequest,
};
use tutorbook::BookingError;

#[tokio::test]
async fn test_admin_cancel_refunds_credit_and_defaults_reason() {
    let repo = LocalRepository::new();
    let student = StudentId::generate();
    let package = grant_package(&repo, student, 10).await.unwrap();
    charge_credit(&repo, package.id).await.unwrap();

    let lesson = insert_booked_lesson(
        &repo,
        student,
        Some(package.id),
        test_now() + Duration::days(2),
    )
    .await;

    let cancelled = cancel_lesson(
        &repo,
        &settings(),
        test_now(),
        lesson.id,
        CancelActor::Admin,
        "  ",
    )
    .await
    .unwrap();

    assert_eq!(cancelled.status, LessonStatus::Cancelled);
    let meta = cancelled.cancellation.unwrap();
    assert_eq!(meta.reason, "Cancelled by admin.");
    assert_eq!(meta.cancelled_by, Actor::Admin);
    assert_eq!(meta.cancelled_at, test_now());

    let refunded = repo.get_package(package.id).await.unwrap().unwrap();
    assert_eq!(refunded.lessons_used, 0);
    assert_eq!(refunded.status, PackageStatus::Active);
}

#[tokio::test]
async fn test_cancel_reactivates_completed_package() {
    let repo = LocalRepository::new();
    let student = StudentId::generate();
    let package = grant_package(&repo, student, 1).await.unwrap();
    let charged = charge_credit(&repo, package.id).await.unwrap();
    assert_eq!(charged.status, PackageStatus::Completed);

    let lesson = insert_booked_lesson(
        &repo,
        student,
        Some(package.id),
        test_now() + Duration::days(2),
    )
    .await;

    cancel_lesson(
        &repo,
        &settings(),
        test_now(),
        lesson.id,
        CancelActor::Admin,
        "",
    )
    .await
    .unwrap();

    let refunded = repo.get_package(package.id).await.unwrap().unwrap();
    assert_eq!(refunded.lessons_used, 0);
    assert_eq!(refunded.status, PackageStatus::Active);
}

#[tokio::test]
async fn test_cancel_twice_rejected() {
    let repo = LocalRepository::new();
    let student = StudentId::generate();
    let lesson = insert_booked_lesson(&repo, student, None, test_now() + Duration::days(2)).await;

    cancel_lesson(
        &repo,
        &settings(),
        test_now(),
        lesson.id,
        CancelActor::Admin,
        "",
    )
    .await
    .unwrap();

    let second = cancel_lesson(
        &repo,
        &settings(),
        test_now(),
        lesson.id,
        CancelActor::Admin,
        "",
    )
    .await;

    assert!(matches!(second, Err(BookingError::Validation(_))));
}

#[tokio::test]
async fn test_student_cancel_inside_notice_window_rejected() {
    let repo = LocalRepository::new();
    let student = StudentId::generate();
    let lesson = insert_booked_lesson(&repo, student, None, test_now() + Duration::hours(10)).await;

    let result = cancel_lesson(
        &repo,
        &settings(),
        test_now(),
        lesson.id,
        CancelActor::Student(student),
        "cannot make it",
    )
    .await;

    assert!(matches!(
        result,
        Err(BookingError::CancellationWindow { hours: 24 })
    ));
}

#[tokio::test]
async fn test_student_cancel_requires_reason() {
    let repo = LocalRepository::new();
    let student = StudentId::generate();
    let lesson = insert_booked_lesson(&repo, student, None, test_now() + Duration::days(3)).await;

    let result = cancel_lesson(
        &repo,
        &settings(),
        test_now(),
        lesson.id,
        CancelActor::Student(student),
        "   ",
    )
    .await;

    assert!(matches!(result, Err(BookingError::Validation(_))));
}

#[tokio::test]
async fn test_student_cannot_cancel_foreign_lesson() {
    let repo = LocalRepository::new();
    let student = StudentId::generate();
    let intruder = StudentId::generate();
    let lesson = insert_booked_lesson(&repo, student, None, test_now() + Duration::days(3)).await;

    let result = cancel_lesson(
        &repo,
        &settings(),
        test_now(),
        lesson.id,
        CancelActor::Student(intruder),
        "not mine",
    )
    .await;

    assert!(matches!(result, Err(BookingError::NotAuthorized)));
}

#[tokio::test]
async fn test_student_cancel_with_notice_succeeds() {
    let repo = LocalRepository::new();
    let student = StudentId::generate();
    let lesson = insert_booked_lesson(&repo, student, None, test_now() + Duration::days(3)).await;

    let cancelled = cancel_lesson(
        &repo,
        &settings(),
        test_now(),
        lesson.id,
        CancelActor::Student(student),
        "family emergency",
    )
    .await
    .unwrap();

    assert_eq!(cancelled.status, LessonStatus::Cancelled);
    let meta = cancelled.cancellation.unwrap();
    assert_eq!(meta.reason, "family emergency");
    assert_eq!(meta.cancelled_by, Actor::Student);
}

#[tokio::test]
async fn test_set_status_is_a_noop_on_equal_status() {
    let repo = LocalRepository::new();
    let student = StudentId::generate();
    let lesson = insert_booked_lesson(&repo, student, None, test_now() + Duration::days(2)).await;

    let unchanged = set_lesson_status(&repo, lesson.id, LessonStatus::Booked)
        .await
        .unwrap();

    assert_eq!(unchanged.status, LessonStatus::Booked);
}

#[tokio::test]
async fn test_set_status_rejects_unsupported_target() {
    let repo = LocalRepository::new();
    let student = StudentId::generate();
    let lesson = insert_booked_lesson(&repo, student, None, test_now() + Duration::days(2)).await;

    let result = set_lesson_status(&repo, lesson.id, LessonStatus::Cancelled).await;

    assert!(matches!(result, Err(BookingError::Validation(_))));
}

#[tokio::test]
async fn test_complete_and_reopen_lesson() {
    let repo = LocalRepository::new();
    let student = StudentId::generate();
    let lesson = insert_booked_lesson(&repo, student, None, test_now() + Duration::days(2)).await;

    let completed = set_lesson_status(&repo, lesson.id, LessonStatus::Completed)
        .await
        .unwrap();
    assert_eq!(completed.status, LessonStatus::Completed);

    let reopened = set_lesson_status(&repo, lesson.id, LessonStatus::Booked)
        .await
        .unwrap();
    assert_eq!(reopened.status, LessonStatus::Booked);
}

#[tokio::test]
async fn test_reopening_cancelled_lesson_recharges_credit() {
    let repo = LocalRepository::new();
    let student = StudentId::generate();
    let package = grant_package(&repo, student, 10).await.unwrap();
    charge_credit(&repo, package.id).await.unwrap();

    let lesson = insert_booked_lesson(
        &repo,
        student,
        Some(package.id),
        test_now() + Duration::days(2),
    )
    .await;

    // Cancel refunds the credit.
    cancel_lesson(
        &repo,
        &settings(),
        test_now(),
        lesson.id,
        CancelActor::Admin,
        "",
    )
    .await
    .unwrap();
    assert_eq!(
        repo.get_package(package.id)
            .await
            .unwrap()
            .unwrap()
            .lessons_used,
        0
    );

    // Putting the lesson back into play charges it again and drops the
    // cancellation metadata.
    let reopened = set_lesson_status(&repo, lesson.id, LessonStatus::Booked)
        .await
        .unwrap();
    assert_eq!(reopened.status, LessonStatus::Booked);
    assert!(reopened.cancellation.is_none());
    assert_eq!(
        repo.get_package(package.id)
            .await
            .unwrap()
            .unwrap()
            .lessons_used,
        1
    );
}

#[tokio::test]
async fn test_no_show_refund_and_recharge() {
    let repo = LocalRepository::new();
    let student = StudentId::generate();
    let package = grant_package(&repo, student, 10).await.unwrap();
    charge_credit(&repo, package.id).await.unwrap();

    let lesson = insert_booked_lesson(
        &repo,
        student,
        Some(package.id),
        test_now() + Duration::days(2),
    )
    .await;

    let refunded = register_no_show(&repo, lesson.id, true).await.unwrap();
    assert_eq!(refunded.status, LessonStatus::NoShowRefunded);
    assert_eq!(
        repo.get_package(package.id)
            .await
            .unwrap()
            .unwrap()
            .lessons_used,
        0
    );

    // Same outcome again is a no-op.
    let again = register_no_show(&repo, lesson.id, true).await.unwrap();
    assert_eq!(again.status, LessonStatus::NoShowRefunded);
    assert_eq!(
        repo.get_package(package.id)
            .await
            .unwrap()
            .unwrap()
            .lessons_used,
        0
    );

    // Switching the verdict to "charged" takes the credit back.
    let charged = register_no_show(&repo, lesson.id, false).await.unwrap();
    assert_eq!(charged.status, LessonStatus::NoShowCharged);
    assert_eq!(
        repo.get_package(package.id)
            .await
            .unwrap()
            .unwrap()
            .lessons_used,
        1
    );
}

#[tokio::test]
async fn test_no_show_recharge_fails_when_credit_was_taken() {
    let repo = LocalRepository::new();
    let student = StudentId::generate();
    let package = grant_package(&repo, student, 1).await.unwrap();
    charge_credit(&repo, package.id).await.unwrap();

    let lesson = insert_booked_lesson(
        &repo,
        student,
        Some(package.id),
        test_now() + Duration::days(2),
    )
    .await;

    register_no_show(&repo, lesson.id, true).await.unwrap();

    // The freed credit is consumed elsewhere, exhausting the package.
    charge_credit(&repo, package.id).await.unwrap();

    let result = register_no_show(&repo, lesson.id, false).await;
    assert!(matches!(result, Err(BookingError::NoCreditsAvailable)));

    // The lesson keeps its refunded state when the recharge fails.
    let unchanged = repo
        .get_lesson(lesson.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(unchanged.status, LessonStatus::NoShowRefunded);
}

#[tokio::test]
async fn test_reschedule_moves_booked_lesson() {
    let repo = LocalRepository::new();
    let student = StudentId::generate();
    let lesson = insert_booked_lesson(&repo, student, None, test_now() + Duration::days(2)).await;

    let new_start = test_now() + Duration::days(2) + Duration::hours(3);
    let moved = reschedule_lesson(&repo, &settings(), lesson.id, new_start, None)
        .await
        .unwrap();

    assert_eq!(moved.starts_at, new_start);
    assert_eq!(moved.ends_at, new_start + Duration::minutes(45));
}

#[tokio::test]
async fn test_reschedule_rejects_non_booked_lesson() {
    let repo = LocalRepository::new();
    let student = StudentId::generate();
    let lesson = insert_booked_lesson(&repo, student, None, test_now() + Duration::days(2)).await;
    set_lesson_status(&repo, lesson.id, LessonStatus::Completed)
        .await
        .unwrap();

    let result = reschedule_lesson(
        &repo,
        &settings(),
        lesson.id,
        test_now() + Duration::days(3),
        None,
    )
    .await;

    assert!(matches!(result, Err(BookingError::Validation(_))));
}

#[tokio::test]
async fn test_reschedule_checks_collisions_but_ignores_itself() {
    let repo = LocalRepository::new();
    let student = StudentId::generate();
    let first = insert_booked_lesson(&repo, student, None, test_now() + Duration::days(2)).await;
    insert_booked_lesson(
        &repo,
        student,
        None,
        test_now() + Duration::days(2) + Duration::hours(4),
    )
    .await;

    // Shifting within its own slot is fine.
    let nudged = reschedule_lesson(
        &repo,
        &settings(),
        first.id,
        first.starts_at + Duration::minutes(15),
        None,
    )
    .await
    .unwrap();
    assert_eq!(nudged.starts_at, first.starts_at + Duration::minutes(15));

    // Moving onto the other lesson is not.
    let result = reschedule_lesson(
        &repo,
        &settings(),
        first.id,
        test_now() + Duration::days(2) + Duration::hours(4),
        None,
    )
    .await;
    assert!(matches!(result, Err(BookingError::Collision(_))));
}

#[tokio::test]
async fn test_package_runs_out_after_all_credits_are_used() {
    let repo = LocalRepository::new();
    let student = StudentId::generate();
    let package = grant_package(&repo, student, 10).await.unwrap();

    for day in 0..10 {
        let request = submit_request(
            &repo,
            &settings(),
            test_now(),
            SubmitRequest {
                student_id: student,
                actor: Actor::Student,
                kind: tutorbook::api::RequestKind::Booking,
                lesson_id: None,
                starts_at: test_now() + Duration::days(2 + day),
                ends_at: None,
                message: None,
            },
        )
        .await
        .unwrap();
        accept_request(&repo, &settings(), request.id, Actor::Admin, None)
            .await
            .unwrap();
    }

    let spent = repo.get_package(package.id).await.unwrap().unwrap();
    assert_eq!(spent.lessons_used, 10);
    assert_eq!(spent.status, PackageStatus::Completed);

    // The eleventh booking has nothing left to draw on.
    let result = submit_request(
        &repo,
        &settings(),
        test_now(),
        SubmitRequest {
            student_id: student,
            actor: Actor::Student,
            kind: tutorbook::api::RequestKind::Booking,
            lesson_id: None,
            starts_at: test_now() + Duration::days(20),
            ends_at: None,
            message: None,
        },
    )
    .await;
    assert!(matches!(result, Err(BookingError::NoActivePackage)));
}
