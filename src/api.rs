//! Public API surface for the booking engine.
//!
//! This file consolidates the domain entity types shared across the service,
//! repository and HTTP layers. All types derive Serialize/Deserialize for
//! JSON serialization; status fields are explicit tagged enums rather than
//! free-form strings, so invalid transitions are rejected at the boundary.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::models::availability::WeeklyAvailability;

crate::define_id_type!(LessonId);
crate::define_id_type!(RequestId);
crate::define_id_type!(PackageId);
crate::define_id_type!(StudentId);

/// Fixed application timezone used for all availability math.
pub const APPLICATION_TIMEZONE: Tz = chrono_tz::Europe::Zurich;

/// Default lesson length when a request omits the end instant.
pub const DEFAULT_LESSON_DURATION_MINUTES: u32 = 45;
/// Default idle time required between two lessons of the same student.
pub const DEFAULT_LESSON_BUFFER_MINUTES: u32 = 30;
/// Default minimum notice between submission and proposed start.
pub const DEFAULT_LEAD_TIME_HOURS: i64 = 6;
/// Default cancellation notice window for students.
pub const DEFAULT_CANCEL_WINDOW_HOURS: i64 = 24;

/// Lesson life-cycle status.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LessonStatus {
    Booked,
    Completed,
    Cancelled,
    NoShowCharged,
    NoShowRefunded,
}

impl LessonStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Booked => "booked",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::NoShowCharged => "no_show_charged",
            Self::NoShowRefunded => "no_show_refunded",
        }
    }

    /// True for states where the consumed credit has been handed back.
    pub fn is_refunded(&self) -> bool {
        matches!(self, Self::Cancelled | Self::NoShowRefunded)
    }
}

impl std::str::FromStr for LessonStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "booked" => Ok(Self::Booked),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            "no_show_charged" => Ok(Self::NoShowCharged),
            "no_show_refunded" => Ok(Self::NoShowRefunded),
            other => Err(format!("Unknown lesson status: {}", other)),
        }
    }
}

impl std::fmt::Display for LessonStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who performed an action: the student who owns the record, or the tutor.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Actor {
    Student,
    Admin,
}

impl Actor {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Student => "student",
            Self::Admin => "admin",
        }
    }

    /// The party on the other side of a negotiation.
    pub fn opposite(&self) -> Actor {
        match self {
            Self::Student => Self::Admin,
            Self::Admin => Self::Student,
        }
    }
}

impl std::str::FromStr for Actor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "student" => Ok(Self::Student),
            "admin" => Ok(Self::Admin),
            other => Err(format!("Unknown actor: {}", other)),
        }
    }
}

/// Cancellation metadata recorded on a cancelled lesson.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cancellation {
    pub reason: String,
    pub cancelled_at: DateTime<Utc>,
    pub cancelled_by: Actor,
}

/// A scheduled or past one-on-one session between tutor and student.
///
/// Lessons are created on request acceptance and never physically deleted;
/// all later mutations are status transitions plus reschedule time moves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lesson {
    pub id: LessonId,
    pub student_id: StudentId,
    /// The package credit this lesson consumed, if the student had one.
    pub package_id: Option<PackageId>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub status: LessonStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancellation: Option<Cancellation>,
    pub created_at: DateTime<Utc>,
}

/// Insert payload for a lesson; the repository assigns id and created_at.
#[derive(Debug, Clone)]
pub struct NewLesson {
    pub student_id: StudentId,
    pub package_id: Option<PackageId>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub status: LessonStatus,
}

/// Which party proposed the time window.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    StudentToAdmin,
    AdminToStudent,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StudentToAdmin => "student_to_admin",
            Self::AdminToStudent => "admin_to_student",
        }
    }

    pub fn opposite(&self) -> Direction {
        match self {
            Self::StudentToAdmin => Self::AdminToStudent,
            Self::AdminToStudent => Self::StudentToAdmin,
        }
    }
}

impl std::str::FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "student_to_admin" => Ok(Self::StudentToAdmin),
            "admin_to_student" => Ok(Self::AdminToStudent),
            other => Err(format!("Unknown direction: {}", other)),
        }
    }
}

/// Whether a request proposes a brand-new lesson or moves an existing one.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    Booking,
    Reschedule,
}

impl RequestKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Booking => "booking",
            Self::Reschedule => "reschedule",
        }
    }
}

impl std::str::FromStr for RequestKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "booking" => Ok(Self::Booking),
            "reschedule" => Ok(Self::Reschedule),
            other => Err(format!("Unknown request kind: {}", other)),
        }
    }
}

/// Booking request status. Pending is the only non-terminal state.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Accepted,
    Declined,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Declined => "declined",
        }
    }
}

impl std::str::FromStr for RequestStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "accepted" => Ok(Self::Accepted),
            "declined" => Ok(Self::Declined),
            other => Err(format!("Unknown request status: {}", other)),
        }
    }
}

/// A proposed time window awaiting acceptance by the other party.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingRequest {
    pub id: RequestId,
    pub student_id: StudentId,
    /// Who proposed the window; None for system-initiated requests.
    pub requester: Option<Actor>,
    pub direction: Direction,
    pub kind: RequestKind,
    pub status: RequestStatus,
    pub proposed_starts_at: DateTime<Utc>,
    pub proposed_ends_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// The lesson this request would reschedule; required for reschedules.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lesson_id: Option<LessonId>,
    /// Back-reference to the request this one counters, forming a chain.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub counter_of: Option<RequestId>,
    pub created_at: DateTime<Utc>,
}

/// Insert payload for a booking request; always persisted as Pending.
#[derive(Debug, Clone)]
pub struct NewBookingRequest {
    pub student_id: StudentId,
    pub requester: Option<Actor>,
    pub direction: Direction,
    pub kind: RequestKind,
    pub proposed_starts_at: DateTime<Utc>,
    pub proposed_ends_at: DateTime<Utc>,
    pub message: Option<String>,
    pub lesson_id: Option<LessonId>,
    pub counter_of: Option<RequestId>,
}

/// Prepaid package status.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackageStatus {
    Active,
    Completed,
    Inactive,
}

impl PackageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Inactive => "inactive",
        }
    }
}

impl std::str::FromStr for PackageStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "completed" => Ok(Self::Completed),
            "inactive" => Ok(Self::Inactive),
            other => Err(format!("Unknown package status: {}", other)),
        }
    }
}

/// A prepaid bundle of lesson credits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentPackage {
    pub id: PackageId,
    pub student_id: StudentId,
    pub lessons_total: u32,
    pub lessons_used: u32,
    pub status: PackageStatus,
    pub created_at: DateTime<Utc>,
}

impl StudentPackage {
    /// Remaining credits, floored at zero.
    pub fn lessons_left(&self) -> u32 {
        self.lessons_total.saturating_sub(self.lessons_used)
    }

    /// Status as derived from the counters. Completed exactly when a finite
    /// package is used up; the counters are the source of truth, never the
    /// stored status on its own.
    pub fn derived_status(lessons_used: u32, lessons_total: u32) -> PackageStatus {
        if lessons_total > 0 && lessons_used >= lessons_total {
            PackageStatus::Completed
        } else {
            PackageStatus::Active
        }
    }
}

/// Insert payload for a package; persisted as Active.
#[derive(Debug, Clone)]
pub struct NewStudentPackage {
    pub student_id: StudentId,
    pub lessons_total: u32,
}

/// Tutor-wide configuration, consumed (not owned) by the booking core.
///
/// Fetched per operation and passed explicitly into every validation call;
/// the core holds no process-wide settings state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminSettings {
    pub default_duration_min: u32,
    pub buffer_min: u32,
    pub cancel_window_hours: i64,
    pub lead_time_hours: i64,
    pub weekly_availability: WeeklyAvailability,
    pub timezone: Tz,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Default for AdminSettings {
    fn default() -> Self {
        Self {
            default_duration_min: DEFAULT_LESSON_DURATION_MINUTES,
            buffer_min: DEFAULT_LESSON_BUFFER_MINUTES,
            cancel_window_hours: DEFAULT_CANCEL_WINDOW_HOURS,
            lead_time_hours: DEFAULT_LEAD_TIME_HOURS,
            weekly_availability: WeeklyAvailability::default(),
            timezone: APPLICATION_TIMEZONE,
            updated_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trips() {
        for status in [
            LessonStatus::Booked,
            LessonStatus::Completed,
            LessonStatus::Cancelled,
            LessonStatus::NoShowCharged,
            LessonStatus::NoShowRefunded,
        ] {
            assert_eq!(status.as_str().parse(), Ok(status));
        }
        assert!("gone".parse::<LessonStatus>().is_err());
    }

    #[test]
    fn test_lessons_left_floors_at_zero() {
        let pkg = StudentPackage {
            id: PackageId::new(uuid::Uuid::new_v4()),
            student_id: StudentId::new(uuid::Uuid::new_v4()),
            lessons_total: 5,
            lessons_used: 7,
            status: PackageStatus::Completed,
            created_at: Utc::now(),
        };
        assert_eq!(pkg.lessons_left(), 0);
    }

    #[test]
    fn test_derived_status() {
        assert_eq!(StudentPackage::derived_status(9, 10), PackageStatus::Active);
        assert_eq!(
            StudentPackage::derived_status(10, 10),
            PackageStatus::Completed
        );
        // An unlimited (total = 0) package never completes on its own.
        assert_eq!(StudentPackage::derived_status(3, 0), PackageStatus::Active);
    }

    #[test]
    fn test_direction_opposite() {
        assert_eq!(
            Direction::StudentToAdmin.opposite(),
            Direction::AdminToStudent
        );
        assert_eq!(
            Direction::AdminToStudent.opposite(),
            Direction::StudentToAdmin
        );
    }

    #[test]
    fn test_lesson_status_serde_snake_case() {
        let json = serde_json::to_string(&LessonStatus::NoShowRefunded).unwrap();
        assert_eq!(json, "\"no_show_refunded\"");
    }
}
