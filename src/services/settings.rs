//! Tutor configuration.
//!
//! A single settings row drives every validation: lesson duration, buffer,
//! cancellation window, lead time and the weekly open hours. Callers load it
//! once per operation and pass it into the service functions explicitly.

use chrono::{DateTime, Utc};
use log::info;

use crate::api::AdminSettings;
use crate::db::repository::FullRepository;
use crate::error::{BookingError, BookingResult};
use crate::models::availability::WeeklyAvailability;

/// Partial settings update; `None` fields keep their current value.
#[derive(Debug, Clone, Default)]
pub struct SettingsUpdate {
    pub default_duration_min: Option<u32>,
    pub buffer_min: Option<u32>,
    pub cancel_window_hours: Option<i64>,
    pub lead_time_hours: Option<i64>,
    /// Raw availability as submitted; sanitized before storing.
    pub weekly_availability: Option<serde_json::Value>,
}

/// The stored settings row, or defaults when none has been saved yet.
pub async fn load_settings(repo: &dyn FullRepository) -> BookingResult<AdminSettings> {
    Ok(repo.get_settings().await?.unwrap_or_default())
}

/// Validate and store a settings update, returning the new effective row.
///
/// Weekly availability is sanitized on write: malformed intervals dropped,
/// overlaps merged, per-day lists sorted.
pub async fn save_settings(
    repo: &dyn FullRepository,
    update: SettingsUpdate,
    now: DateTime<Utc>,
) -> BookingResult<AdminSettings> {
    let mut settings = load_settings(repo).await?;

    if let Some(duration) = update.default_duration_min {
        if duration == 0 {
            return Err(BookingError::validation(
                "Lesson duration must be positive.",
            ));
        }
        settings.default_duration_min = duration;
    }

    if let Some(buffer) = update.buffer_min {
        settings.buffer_min = buffer;
    }

    if let Some(hours) = update.cancel_window_hours {
        if hours < 0 {
            return Err(BookingError::validation(
                "Cancellation window cannot be negative.",
            ));
        }
        settings.cancel_window_hours = hours;
    }

    if let Some(hours) = update.lead_time_hours {
        if hours < 0 {
            return Err(BookingError::validation("Lead time cannot be negative."));
        }
        settings.lead_time_hours = hours;
    }

    if let Some(raw) = &update.weekly_availability {
        settings.weekly_availability = WeeklyAvailability::sanitize(raw);
    }

    settings.updated_at = Some(now);

    let stored = repo.put_settings(settings).await?;
    info!(
        "Settings saved: duration {} min, buffer {} min, cancel window {} h, lead time {} h",
        stored.default_duration_min,
        stored.buffer_min,
        stored.cancel_window_hours,
        stored.lead_time_hours
    );
    Ok(stored)
}
