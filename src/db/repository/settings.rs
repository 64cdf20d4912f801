//! Admin settings repository trait.

use async_trait::async_trait;

use super::error::RepositoryResult;
use crate::api::AdminSettings;

/// Repository trait for the single tutor-wide settings row.
#[async_trait]
pub trait SettingsRepository: Send + Sync {
    /// Fetch the stored settings, if any have been saved.
    async fn get_settings(&self) -> RepositoryResult<Option<AdminSettings>>;

    /// Insert or replace the settings row, returning the stored value.
    async fn put_settings(&self, settings: AdminSettings) -> RepositoryResult<AdminSettings>;
}
