//! Repository trait definitions.
//!
//! Each entity gets its own trait so backends can be tested and composed
//! per concern; [`FullRepository`] aggregates them for the application.
//!
//! Conditional updates are the concurrency primitive of the store: a write
//! names the state it expects and returns `Ok(None)` when a concurrent
//! writer got there first, letting the service layer translate lost races
//! into typed errors instead of clobbering the row.

mod error;
mod lessons;
mod packages;
mod requests;
mod settings;

pub use error::{ErrorContext, RepositoryError, RepositoryResult};
pub use lessons::LessonRepository;
pub use packages::PackageRepository;
pub use requests::{BookingRequestRepository, RequestFilter};
pub use settings::SettingsRepository;

use async_trait::async_trait;

/// Aggregate repository interface covering every entity the booking engine
/// touches. Implementations must be `Send + Sync` to work with async Rust.
#[async_trait]
pub trait FullRepository:
    LessonRepository + BookingRequestRepository + PackageRepository + SettingsRepository
{
    /// Verify the backend is reachable and answering queries.
    async fn health_check(&self) -> RepositoryResult<bool>;
}
