//! Business logic layer.
//!
//! Repository-agnostic booking operations that work with any implementation
//! of the storage traits. Each function takes `&dyn FullRepository` plus the
//! current `AdminSettings` where validation depends on configuration; nothing
//! in here reads global state, which keeps the rules testable against the
//! in-memory backend.
//!
//! Modules map to the core components:
//! - `collision`: buffer-aware overlap detection per student
//! - `ledger`: prepaid credit charge/refund/revoke bookkeeping
//! - `requests`: the pending/accepted/declined negotiation state machine
//! - `lessons`: lesson status transitions and their ledger side effects
//! - `settings`: tutor configuration load/validate/store

pub mod collision;
pub mod ledger;
pub mod lessons;
pub mod requests;
pub mod settings;

pub use collision::ensure_no_collision;
pub use ledger::{charge_credit, grant_package, refund_credit, remove_package};
pub use lessons::{
    cancel_lesson, register_no_show, reschedule_lesson, set_lesson_status, CancelActor,
};
pub use requests::{
    accept_request, counter_request, decline_request, submit_request, AcceptOutcome,
    SubmitRequest,
};
pub use settings::{load_settings, save_settings, SettingsUpdate};

use crate::db::repository::{FullRepository, RepositoryResult};

/// Check if the storage backend is reachable.
pub async fn health_check(repo: &dyn FullRepository) -> RepositoryResult<bool> {
    repo.health_check().await
}
