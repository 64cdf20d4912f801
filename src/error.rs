//! Booking engine error type.
//!
//! Every validation or conflict failure is a [`BookingError`] carrying a
//! human-readable message that the calling layer surfaces directly to the
//! end user. Persistence failures travel in the distinct `Repository`
//! variant: they are unexpected, logged, and shown as a generic failure.

use crate::db::repository::RepositoryError;

/// Result type for booking operations.
pub type BookingResult<T> = Result<T, BookingError>;

/// Caller-recoverable booking failures plus wrapped persistence errors.
#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    /// Malformed input: invalid window ordering, empty reason, bad status.
    #[error("{0}")]
    Validation(String),

    /// Proposed start is closer than the configured lead time.
    #[error("Lessons must be requested at least {hours} hours in advance.")]
    LeadTime { hours: i64 },

    /// The window is outside the tutor's configured open hours.
    #[error("The selected time is outside the available slots.")]
    OutsideAvailability,

    /// The window overlaps another lesson of the same student.
    #[error("{0}")]
    Collision(String),

    /// Student-initiated bookings need an active package with credits left.
    #[error("An active package with available credits is required to request a lesson.")]
    NoActivePackage,

    /// The package has no credits left to charge.
    #[error("No credits left in the package. A new package must be activated.")]
    NoCreditsAvailable,

    /// Student cancellation attempted inside the notice window.
    #[error("Cancellations are only possible up to {hours} hour(s) before the lesson starts.")]
    CancellationWindow { hours: i64 },

    /// Entity missing, wrong direction, or filtered by the pending lookup.
    #[error("{0}")]
    NotFound(String),

    /// The acting party does not own the record.
    #[error("Not authorized for this request.")]
    NotAuthorized,

    /// A concurrent caller resolved the request or lesson first.
    #[error("The request was already resolved.")]
    AlreadyResolved,

    /// Unexpected persistence failure; not retried by the core.
    #[error("Storage error: {0}")]
    Repository(#[from] RepositoryError),
}

impl BookingError {
    /// True for expected, user-facing failures whose message may be shown
    /// verbatim; false for persistence errors that get a generic message.
    pub fn is_user_error(&self) -> bool {
        !matches!(self, Self::Repository(_))
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }
}
