//! Data Transfer Objects for the HTTP API.
//!
//! Entities already derive Serialize/Deserialize and go out on the wire
//! as-is; this module holds the request bodies and query/envelope types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// Entities reused directly as response payloads.
pub use crate::api::{
    Actor, AdminSettings, BookingRequest, Direction, Lesson, LessonStatus, RequestKind,
    RequestStatus, StudentPackage,
};

/// Response for the health endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub database: String,
}

/// Body for PUT /v1/settings; absent fields keep their current value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateSettingsRequest {
    pub default_duration_min: Option<u32>,
    pub buffer_min: Option<u32>,
    pub cancel_window_hours: Option<i64>,
    pub lead_time_hours: Option<i64>,
    /// Raw weekly availability; sanitized server-side.
    pub weekly_availability: Option<serde_json::Value>,
}

/// Body for POST /v1/requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitRequestBody {
    pub student_id: uuid::Uuid,
    pub actor: Actor,
    pub kind: RequestKind,
    pub lesson_id: Option<uuid::Uuid>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: Option<DateTime<Utc>>,
    pub message: Option<String>,
}

/// Query for GET /v1/requests; all filters conjunctive.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RequestListQuery {
    pub student_id: Option<uuid::Uuid>,
    pub direction: Option<Direction>,
    pub status: Option<RequestStatus>,
    pub kind: Option<RequestKind>,
}

/// Response envelope for request listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestListResponse {
    pub requests: Vec<BookingRequest>,
    pub total: usize,
}

/// Body for accept/decline: who is acting, and for students, as whom.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolveRequestBody {
    pub actor: Actor,
    pub student_id: Option<uuid::Uuid>,
}

/// Response for a successful accept.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcceptResponse {
    pub request: BookingRequest,
    pub lesson: Lesson,
}

/// Body for POST /v1/requests/{id}/counter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CounterRequestBody {
    pub actor: Actor,
    pub student_id: Option<uuid::Uuid>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: Option<DateTime<Utc>>,
    pub message: Option<String>,
}

/// Query for GET /v1/lessons.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LessonListQuery {
    pub student_id: Option<uuid::Uuid>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

/// Response envelope for lesson listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LessonListResponse {
    pub lessons: Vec<Lesson>,
    pub total: usize,
}

/// Body for POST /v1/lessons/{id}/cancel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelLessonBody {
    pub actor: Actor,
    pub student_id: Option<uuid::Uuid>,
    #[serde(default)]
    pub reason: String,
}

/// Body for PUT /v1/lessons/{id}/status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetLessonStatusBody {
    pub status: LessonStatus,
}

/// Body for POST /v1/lessons/{id}/no-show.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoShowBody {
    pub refund_credit: bool,
}

/// Body for PUT /v1/lessons/{id}/time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateLessonTimeBody {
    pub starts_at: DateTime<Utc>,
    pub ends_at: Option<DateTime<Utc>>,
}

/// Body for POST /v1/students/{id}/package.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrantPackageBody {
    pub lessons_total: u32,
}
