//! HTTP handlers for the REST API.
//!
//! Each handler corresponds to an API endpoint and delegates to the service
//! layer for business logic. Settings are loaded per request so validations
//! always see the current configuration.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::Utc;

use super::dto::{
    AcceptResponse, CancelLessonBody, CounterRequestBody, GrantPackageBody, HealthResponse,
    LessonListQuery, LessonListResponse, NoShowBody, RequestListQuery, RequestListResponse,
    ResolveRequestBody, SetLessonStatusBody, SubmitRequestBody, UpdateLessonTimeBody,
    UpdateSettingsRequest,
};
use super::error::AppError;
use super::state::AppState;
use crate::api::{
    Actor, AdminSettings, BookingRequest, Lesson, LessonId, RequestId, StudentId, StudentPackage,
};
use crate::db::repository::{
    BookingRequestRepository, LessonRepository, PackageRepository, RequestFilter,
};
use crate::services;
use crate::services::lessons::CancelActor;
use crate::services::requests::SubmitRequest;
use crate::services::settings::SettingsUpdate;

/// Result type for handlers.
pub type HandlerResult<T> = Result<Json<T>, AppError>;

fn student_actor_id(actor: Actor, student_id: Option<uuid::Uuid>) -> Option<StudentId> {
    match actor {
        Actor::Student => student_id.map(StudentId::new),
        Actor::Admin => None,
    }
}

// =============================================================================
// Health Check
// =============================================================================

/// GET /health
///
/// Health check endpoint to verify the service is running and the database
/// is accessible.
pub async fn health_check(State(state): State<AppState>) -> HandlerResult<HealthResponse> {
    let db_status = match services::health_check(state.repository.as_ref()).await {
        Ok(true) => "connected".to_string(),
        Ok(false) => "disconnected".to_string(),
        Err(e) => format!("error: {}", e),
    };

    Ok(Json(HealthResponse {
        status: "ok".to_string(),
        version: "v1".to_string(),
        database: db_status,
    }))
}

// =============================================================================
// Settings
// =============================================================================

/// GET /v1/settings
pub async fn get_settings(State(state): State<AppState>) -> HandlerResult<AdminSettings> {
    let settings = services::load_settings(state.repository.as_ref()).await?;
    Ok(Json(settings))
}

/// PUT /v1/settings
pub async fn put_settings(
    State(state): State<AppState>,
    Json(body): Json<UpdateSettingsRequest>,
) -> HandlerResult<AdminSettings> {
    let update = SettingsUpdate {
        default_duration_min: body.default_duration_min,
        buffer_min: body.buffer_min,
        cancel_window_hours: body.cancel_window_hours,
        lead_time_hours: body.lead_time_hours,
        weekly_availability: body.weekly_availability,
    };
    let stored = services::save_settings(state.repository.as_ref(), update, Utc::now()).await?;
    Ok(Json(stored))
}

// =============================================================================
// Booking Requests
// =============================================================================

/// POST /v1/requests
///
/// Submit a booking or reschedule request in either direction.
pub async fn submit_request(
    State(state): State<AppState>,
    Json(body): Json<SubmitRequestBody>,
) -> HandlerResult<BookingRequest> {
    let repo = state.repository.as_ref();
    let settings = services::load_settings(repo).await?;

    let request = services::submit_request(
        repo,
        &settings,
        Utc::now(),
        SubmitRequest {
            student_id: StudentId::new(body.student_id),
            actor: body.actor,
            kind: body.kind,
            lesson_id: body.lesson_id.map(LessonId::new),
            starts_at: body.starts_at,
            ends_at: body.ends_at,
            message: body.message,
        },
    )
    .await?;

    Ok(Json(request))
}

/// GET /v1/requests
pub async fn list_requests(
    State(state): State<AppState>,
    Query(query): Query<RequestListQuery>,
) -> HandlerResult<RequestListResponse> {
    let filter = RequestFilter {
        student_id: query.student_id.map(StudentId::new),
        direction: query.direction,
        status: query.status,
        kind: query.kind,
    };
    let requests = state.repository.list_requests(filter).await.map_err(AppError::from)?;
    let total = requests.len();

    Ok(Json(RequestListResponse { requests, total }))
}

/// POST /v1/requests/{id}/accept
pub async fn accept_request(
    State(state): State<AppState>,
    Path(id): Path<uuid::Uuid>,
    Json(body): Json<ResolveRequestBody>,
) -> HandlerResult<AcceptResponse> {
    let repo = state.repository.as_ref();
    let settings = services::load_settings(repo).await?;

    let outcome = services::accept_request(
        repo,
        &settings,
        RequestId::new(id),
        body.actor,
        student_actor_id(body.actor, body.student_id),
    )
    .await?;

    Ok(Json(AcceptResponse {
        request: outcome.request,
        lesson: outcome.lesson,
    }))
}

/// POST /v1/requests/{id}/decline
pub async fn decline_request(
    State(state): State<AppState>,
    Path(id): Path<uuid::Uuid>,
    Json(body): Json<ResolveRequestBody>,
) -> HandlerResult<BookingRequest> {
    let declined = services::decline_request(
        state.repository.as_ref(),
        RequestId::new(id),
        body.actor,
        student_actor_id(body.actor, body.student_id),
    )
    .await?;

    Ok(Json(declined))
}

/// POST /v1/requests/{id}/counter
pub async fn counter_request(
    State(state): State<AppState>,
    Path(id): Path<uuid::Uuid>,
    Json(body): Json<CounterRequestBody>,
) -> HandlerResult<BookingRequest> {
    let repo = state.repository.as_ref();
    let settings = services::load_settings(repo).await?;

    let counter = services::counter_request(
        repo,
        &settings,
        Utc::now(),
        RequestId::new(id),
        body.actor,
        student_actor_id(body.actor, body.student_id),
        body.starts_at,
        body.ends_at,
        body.message,
    )
    .await?;

    Ok(Json(counter))
}

// =============================================================================
// Lessons
// =============================================================================

/// GET /v1/lessons
///
/// List lessons by student and/or a time range; at least one filter is
/// required.
pub async fn list_lessons(
    State(state): State<AppState>,
    Query(query): Query<LessonListQuery>,
) -> HandlerResult<LessonListResponse> {
    let repo = state.repository.as_ref();

    let lessons = match (query.student_id, query.from, query.to) {
        (Some(student), from, to) => {
            let mut lessons = repo
                .list_lessons_for_student(StudentId::new(student))
                .await
                .map_err(AppError::from)?;
            if let Some(from) = from {
                lessons.retain(|l| l.ends_at >= from);
            }
            if let Some(to) = to {
                lessons.retain(|l| l.starts_at <= to);
            }
            lessons
        }
        (None, Some(from), Some(to)) => repo
            .list_lessons_between(from, to)
            .await
            .map_err(AppError::from)?,
        _ => {
            return Err(AppError::BadRequest(
                "Provide student_id or a from/to time range.".to_string(),
            ))
        }
    };

    let total = lessons.len();
    Ok(Json(LessonListResponse { lessons, total }))
}

/// POST /v1/lessons/{id}/cancel
pub async fn cancel_lesson(
    State(state): State<AppState>,
    Path(id): Path<uuid::Uuid>,
    Json(body): Json<CancelLessonBody>,
) -> HandlerResult<Lesson> {
    let repo = state.repository.as_ref();
    let settings = services::load_settings(repo).await?;

    let actor = match body.actor {
        Actor::Admin => CancelActor::Admin,
        Actor::Student => {
            let student_id = body.student_id.ok_or_else(|| {
                AppError::BadRequest("student_id is required for student cancellations.".into())
            })?;
            CancelActor::Student(StudentId::new(student_id))
        }
    };

    let cancelled = services::cancel_lesson(
        repo,
        &settings,
        Utc::now(),
        LessonId::new(id),
        actor,
        &body.reason,
    )
    .await?;

    Ok(Json(cancelled))
}

/// PUT /v1/lessons/{id}/status
pub async fn set_lesson_status(
    State(state): State<AppState>,
    Path(id): Path<uuid::Uuid>,
    Json(body): Json<SetLessonStatusBody>,
) -> HandlerResult<Lesson> {
    let updated =
        services::set_lesson_status(state.repository.as_ref(), LessonId::new(id), body.status)
            .await?;
    Ok(Json(updated))
}

/// POST /v1/lessons/{id}/no-show
pub async fn register_no_show(
    State(state): State<AppState>,
    Path(id): Path<uuid::Uuid>,
    Json(body): Json<NoShowBody>,
) -> HandlerResult<Lesson> {
    let updated = services::register_no_show(
        state.repository.as_ref(),
        LessonId::new(id),
        body.refund_credit,
    )
    .await?;
    Ok(Json(updated))
}

/// PUT /v1/lessons/{id}/time
pub async fn update_lesson_time(
    State(state): State<AppState>,
    Path(id): Path<uuid::Uuid>,
    Json(body): Json<UpdateLessonTimeBody>,
) -> HandlerResult<Lesson> {
    let repo = state.repository.as_ref();
    let settings = services::load_settings(repo).await?;

    let moved = services::reschedule_lesson(
        repo,
        &settings,
        LessonId::new(id),
        body.starts_at,
        body.ends_at,
    )
    .await?;

    Ok(Json(moved))
}

// =============================================================================
// Packages
// =============================================================================

/// GET /v1/students/{id}/package
///
/// The student's current active package.
pub async fn get_active_package(
    State(state): State<AppState>,
    Path(id): Path<uuid::Uuid>,
) -> HandlerResult<StudentPackage> {
    let package = state
        .repository
        .find_active_package(StudentId::new(id))
        .await
        .map_err(AppError::from)?
        .ok_or_else(|| {
            AppError::Booking(crate::error::BookingError::not_found(
                "The student has no active package right now.",
            ))
        })?;

    Ok(Json(package))
}

/// POST /v1/students/{id}/package
pub async fn grant_package(
    State(state): State<AppState>,
    Path(id): Path<uuid::Uuid>,
    Json(body): Json<GrantPackageBody>,
) -> HandlerResult<StudentPackage> {
    let package = services::grant_package(
        state.repository.as_ref(),
        StudentId::new(id),
        body.lessons_total,
    )
    .await?;
    Ok(Json(package))
}

/// DELETE /v1/students/{id}/package
pub async fn remove_package(
    State(state): State<AppState>,
    Path(id): Path<uuid::Uuid>,
) -> HandlerResult<StudentPackage> {
    let removed =
        services::remove_package(state.repository.as_ref(), StudentId::new(id)).await?;
    Ok(Json(removed))
}
