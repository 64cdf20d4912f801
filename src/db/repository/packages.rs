//! Student package repository trait.

use async_trait::async_trait;

use super::error::RepositoryResult;
use crate::api::{NewStudentPackage, PackageId, PackageStatus, StudentId, StudentPackage};

/// Repository trait for prepaid package storage.
///
/// Credit counters are only ever written through the conditional update,
/// keyed on the previously observed `lessons_used`; concurrent charges and
/// refunds therefore serialize instead of losing increments.
#[async_trait]
pub trait PackageRepository: Send + Sync {
    /// Persist a new package in Active state, assigning id and timestamp.
    async fn insert_package(
        &self,
        package: NewStudentPackage,
    ) -> RepositoryResult<StudentPackage>;

    /// Fetch a package by id.
    async fn get_package(&self, id: PackageId) -> RepositoryResult<Option<StudentPackage>>;

    /// The student's current Active package (most recently created when
    /// several exist, which the invariants forbid but the store tolerates).
    async fn find_active_package(
        &self,
        student: StudentId,
    ) -> RepositoryResult<Option<StudentPackage>>;

    /// All packages of a student, newest first.
    async fn list_packages_for_student(
        &self,
        student: StudentId,
    ) -> RepositoryResult<Vec<StudentPackage>>;

    /// Write new counters and status, provided `lessons_used` still equals
    /// `expected_used`.
    ///
    /// # Returns
    /// * `Ok(Some(package))` - the updated package
    /// * `Ok(None)` - counters changed concurrently; nothing written
    /// * `Err(NotFound)` - no package with this id
    async fn update_package_credits(
        &self,
        id: PackageId,
        expected_used: u32,
        lessons_used: u32,
        status: PackageStatus,
    ) -> RepositoryResult<Option<StudentPackage>>;
}
