use chrono::{DateTime, Duration, TimeZone, Utc};

use tutorbook::api::{AdminSettings, Lesson, LessonStatus, NewLesson, PackageId, StudentId};
use tutorbook::db::repositories::LocalRepository;
use tutorbook::db::repository::LessonRepository;

/// A fixed "now" so lead-time and cancellation-window checks are deterministic:
/// Tuesday 2026-09-01 08:00 UTC, which is 10:00 in Europe/Zurich (CEST).
pub fn test_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 9, 1, 8, 0, 0).single().unwrap()
}

/// Default settings: 45 min lessons, 30 min buffer, 24 h cancel window,
/// 6 h lead time, open 07:00-21:00 local every day.
pub fn settings() -> AdminSettings {
    AdminSettings::default()
}

/// Insert a booked lesson directly, bypassing the request flow.
pub async fn insert_booked_lesson(
    repo: &LocalRepository,
    student: StudentId,
    package: Option<PackageId>,
    starts_at: DateTime<Utc>,
) -> Lesson {
    repo.insert_lesson(NewLesson {
        student_id: student,
        package_id: package,
        starts_at,
        ends_at: starts_at + Duration::minutes(45),
        status: LessonStatus::Booked,
    })
    .await
    .unwrap()
}
