use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde_json::Value;
use uuid::Uuid;

use super::schema::{admin_settings, booking_requests, lessons, student_packages};
use crate::api::{
    Actor, AdminSettings, BookingRequest, Cancellation, Direction, Lesson, LessonId,
    LessonStatus, PackageId, PackageStatus, RequestId, RequestKind, RequestStatus, StudentId,
    StudentPackage, APPLICATION_TIMEZONE,
};
use crate::db::repository::{RepositoryError, RepositoryResult};
use crate::models::availability::WeeklyAvailability;

fn parse_enum<T>(value: &str, what: &str) -> RepositoryResult<T>
where
    T: std::str::FromStr<Err = String>,
{
    value
        .parse()
        .map_err(|e| RepositoryError::internal(format!("Corrupt {} column: {}", what, e)))
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = lessons)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct LessonRow {
    pub id: Uuid,
    pub student_id: Uuid,
    pub package_id: Option<Uuid>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub status: String,
    pub cancellation_reason: Option<String>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancelled_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl LessonRow {
    pub fn into_lesson(self) -> RepositoryResult<Lesson> {
        let cancellation = match (self.cancellation_reason, self.cancelled_at, self.cancelled_by)
        {
            (Some(reason), Some(cancelled_at), Some(by)) => Some(Cancellation {
                reason,
                cancelled_at,
                cancelled_by: parse_enum::<Actor>(&by, "cancelled_by")?,
            }),
            _ => None,
        };

        Ok(Lesson {
            id: LessonId::new(self.id),
            student_id: StudentId::new(self.student_id),
            package_id: self.package_id.map(PackageId::new),
            starts_at: self.starts_at,
            ends_at: self.ends_at,
            status: parse_enum::<LessonStatus>(&self.status, "lesson status")?,
            cancellation,
            created_at: self.created_at,
        })
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = lessons)]
pub struct NewLessonRow {
    pub student_id: Uuid,
    pub package_id: Option<Uuid>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub status: String,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = booking_requests)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct BookingRequestRow {
    pub id: Uuid,
    pub student_id: Uuid,
    pub requester: Option<String>,
    pub direction: String,
    pub kind: String,
    pub status: String,
    pub proposed_starts_at: DateTime<Utc>,
    pub proposed_ends_at: DateTime<Utc>,
    pub message: Option<String>,
    pub lesson_id: Option<Uuid>,
    pub counter_of: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl BookingRequestRow {
    pub fn into_request(self) -> RepositoryResult<BookingRequest> {
        let requester = self
            .requester
            .map(|r| parse_enum::<Actor>(&r, "requester"))
            .transpose()?;

        Ok(BookingRequest {
            id: RequestId::new(self.id),
            student_id: StudentId::new(self.student_id),
            requester,
            direction: parse_enum::<Direction>(&self.direction, "direction")?,
            kind: parse_enum::<RequestKind>(&self.kind, "kind")?,
            status: parse_enum::<RequestStatus>(&self.status, "request status")?,
            proposed_starts_at: self.proposed_starts_at,
            proposed_ends_at: self.proposed_ends_at,
            message: self.message,
            lesson_id: self.lesson_id.map(LessonId::new),
            counter_of: self.counter_of.map(RequestId::new),
            created_at: self.created_at,
        })
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = booking_requests)]
pub struct NewBookingRequestRow {
    pub student_id: Uuid,
    pub requester: Option<String>,
    pub direction: String,
    pub kind: String,
    pub status: String,
    pub proposed_starts_at: DateTime<Utc>,
    pub proposed_ends_at: DateTime<Utc>,
    pub message: Option<String>,
    pub lesson_id: Option<Uuid>,
    pub counter_of: Option<Uuid>,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = student_packages)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct StudentPackageRow {
    pub id: Uuid,
    pub student_id: Uuid,
    pub lessons_total: i32,
    pub lessons_used: i32,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl StudentPackageRow {
    pub fn into_package(self) -> RepositoryResult<StudentPackage> {
        Ok(StudentPackage {
            id: PackageId::new(self.id),
            student_id: StudentId::new(self.student_id),
            lessons_total: self.lessons_total.max(0) as u32,
            lessons_used: self.lessons_used.max(0) as u32,
            status: parse_enum::<PackageStatus>(&self.status, "package status")?,
            created_at: self.created_at,
        })
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = student_packages)]
pub struct NewStudentPackageRow {
    pub student_id: Uuid,
    pub lessons_total: i32,
    pub lessons_used: i32,
    pub status: String,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = admin_settings)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct AdminSettingsRow {
    pub id: i16,
    pub default_duration_min: i32,
    pub buffer_min: i32,
    pub cancel_window_hours: i64,
    pub lead_time_hours: i64,
    pub weekly_availability: Value,
    pub timezone: String,
    pub updated_at: Option<DateTime<Utc>>,
}

impl AdminSettingsRow {
    pub fn into_settings(self) -> RepositoryResult<AdminSettings> {
        let weekly_availability: WeeklyAvailability =
            serde_json::from_value(self.weekly_availability).map_err(|e| {
                RepositoryError::internal(format!("Corrupt weekly_availability column: {}", e))
            })?;
        let timezone = self.timezone.parse().unwrap_or(APPLICATION_TIMEZONE);

        Ok(AdminSettings {
            default_duration_min: self.default_duration_min.max(0) as u32,
            buffer_min: self.buffer_min.max(0) as u32,
            cancel_window_hours: self.cancel_window_hours,
            lead_time_hours: self.lead_time_hours,
            weekly_availability,
            timezone,
            updated_at: self.updated_at,
        })
    }
}
