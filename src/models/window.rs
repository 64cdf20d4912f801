//! Booking window normalization.
//!
//! A window is a `[start, end)` pair of UTC instants. When a proposal omits
//! the end, it defaults to start plus the configured lesson duration. Lead
//! time is validated here as well, since it is a pure property of the window
//! against the submission instant.

use chrono::{DateTime, Duration, Utc};

use crate::error::{BookingError, BookingResult};

/// A validated lesson time window. Invariant: `end > start`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct BookingWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl BookingWindow {
    /// Normalize a proposed window. A missing end is derived from the
    /// default duration; an end at or before the start is rejected.
    pub fn normalize(
        start: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
        default_duration_min: u32,
    ) -> BookingResult<Self> {
        let end =
            end.unwrap_or_else(|| start + Duration::minutes(i64::from(default_duration_min)));

        if end <= start {
            return Err(BookingError::validation("The end must be after the start."));
        }

        Ok(Self { start, end })
    }

    /// Reject windows starting closer than `lead_time_hours` from `now`.
    pub fn enforce_lead_time(&self, now: DateTime<Utc>, lead_time_hours: i64) -> BookingResult<()> {
        if self.start - now < Duration::hours(lead_time_hours) {
            return Err(BookingError::LeadTime {
                hours: lead_time_hours,
            });
        }
        Ok(())
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }
}
