//! Prepaid credit ledger.
//!
//! Packages carry a `lessons_used` counter against `lessons_total`; status is
//! always derived from those two numbers, never stored independently. All
//! writes are optimistic conditional updates keyed on the expected prior
//! counter and retried a bounded number of times when a concurrent writer
//! got there first.

use log::{info, warn};

use crate::api::{
    NewStudentPackage, PackageId, PackageStatus, StudentId, StudentPackage,
};
use crate::db::repository::FullRepository;
use crate::error::{BookingError, BookingResult};

/// Attempts before a contended counter update gives up.
const MAX_LEDGER_RETRIES: u32 = 3;

/// Consume one credit from the package.
///
/// Fails with `NoCreditsAvailable` when the package is already exhausted
/// (`total > 0 && used >= total`). A zero-total package charges freely and
/// stays Active; the status flips to Completed exactly when the last credit
/// of a bounded package is used.
pub async fn charge_credit(
    repo: &dyn FullRepository,
    package_id: PackageId,
) -> BookingResult<StudentPackage> {
    for _ in 0..MAX_LEDGER_RETRIES {
        let package = repo
            .get_package(package_id)
            .await?
            .ok_or_else(|| BookingError::not_found("Package not found."))?;

        if package.lessons_total > 0 && package.lessons_used >= package.lessons_total {
            return Err(BookingError::NoCreditsAvailable);
        }

        let used = package.lessons_used + 1;
        let status = StudentPackage::derived_status(used, package.lessons_total);

        if let Some(updated) = repo
            .update_package_credits(package_id, package.lessons_used, used, status)
            .await?
        {
            info!(
                "Charged credit on package {}: {}/{} used",
                package_id, updated.lessons_used, updated.lessons_total
            );
            return Ok(updated);
        }

        warn!("Charge on package {} lost a race, retrying", package_id);
    }

    Err(BookingError::AlreadyResolved)
}

/// Hand one credit back to the package.
///
/// `used` is floored at zero. The status becomes Active again unless the
/// counter still covers the total; in that case the stored status is kept
/// (a revoked package stays Completed).
pub async fn refund_credit(
    repo: &dyn FullRepository,
    package_id: PackageId,
) -> BookingResult<StudentPackage> {
    for _ in 0..MAX_LEDGER_RETRIES {
        let package = repo
            .get_package(package_id)
            .await?
            .ok_or_else(|| BookingError::not_found("Package not found."))?;

        let used = package.lessons_used.saturating_sub(1);
        let status = if used >= package.lessons_total {
            package.status
        } else {
            PackageStatus::Active
        };

        if let Some(updated) = repo
            .update_package_credits(package_id, package.lessons_used, used, status)
            .await?
        {
            info!(
                "Refunded credit on package {}: {}/{} used",
                package_id, updated.lessons_used, updated.lessons_total
            );
            return Ok(updated);
        }

        warn!("Refund on package {} lost a race, retrying", package_id);
    }

    Err(BookingError::AlreadyResolved)
}

/// Administrative revoke: force the student's active package to Completed
/// with all credits consumed.
pub async fn remove_package(
    repo: &dyn FullRepository,
    student_id: StudentId,
) -> BookingResult<StudentPackage> {
    for _ in 0..MAX_LEDGER_RETRIES {
        let package = repo
            .find_active_package(student_id)
            .await?
            .ok_or_else(|| {
                BookingError::not_found("The student has no active package right now.")
            })?;

        if let Some(updated) = repo
            .update_package_credits(
                package.id,
                package.lessons_used,
                package.lessons_total,
                PackageStatus::Completed,
            )
            .await?
        {
            info!("Revoked package {} for student {}", package.id, student_id);
            return Ok(updated);
        }

        warn!(
            "Revoke of package {} lost a race, retrying",
            package.id
        );
    }

    Err(BookingError::AlreadyResolved)
}

/// Grant a fresh credit package to the student.
///
/// Rejects while an active package still has credits left; an exhausted
/// active package (possible only with `total == 0` bookkeeping drift) is
/// completed first so the one-active-package invariant holds.
pub async fn grant_package(
    repo: &dyn FullRepository,
    student_id: StudentId,
    lessons_total: u32,
) -> BookingResult<StudentPackage> {
    if lessons_total == 0 {
        return Err(BookingError::validation(
            "A package must contain at least one lesson.",
        ));
    }

    if let Some(active) = repo.find_active_package(student_id).await? {
        if active.lessons_left() > 0 {
            return Err(BookingError::validation(
                "An active package already exists. Use up its credits first.",
            ));
        }

        // Exhausted but still Active: close it out before granting the next.
        if repo
            .update_package_credits(
                active.id,
                active.lessons_used,
                active.lessons_used,
                PackageStatus::Completed,
            )
            .await?
            .is_none()
        {
            warn!("Could not complete drained package {}", active.id);
        }
    }

    let package = repo
        .insert_package(NewStudentPackage {
            student_id,
            lessons_total,
        })
        .await
        .map_err(|err| {
            // The store's uniqueness guard catches a concurrent grant that
            // slipped past the pre-insert check.
            if err.is_conflict() {
                BookingError::validation(
                    "An active package already exists. Use up its credits first.",
                )
            } else {
                err.into()
            }
        })?;

    info!(
        "Granted package {} ({} lessons) to student {}",
        package.id, lessons_total, student_id
    );
    Ok(package)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::LocalRepository;

    async fn seed_package(repo: &LocalRepository, total: u32) -> StudentPackage {
        use crate::db::repository::PackageRepository;
        repo.insert_package(NewStudentPackage {
            student_id: StudentId::generate(),
            lessons_total: total,
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn charge_increments_and_completes_on_last_credit() {
        let repo = LocalRepository::new();
        let package = seed_package(&repo, 2).await;

        let after_first = charge_credit(&repo, package.id).await.unwrap();
        assert_eq!(after_first.lessons_used, 1);
        assert_eq!(after_first.status, PackageStatus::Active);

        let after_second = charge_credit(&repo, package.id).await.unwrap();
        assert_eq!(after_second.lessons_used, 2);
        assert_eq!(after_second.status, PackageStatus::Completed);
    }

    #[tokio::test]
    async fn charge_on_exhausted_package_fails() {
        let repo = LocalRepository::new();
        let package = seed_package(&repo, 1).await;

        charge_credit(&repo, package.id).await.unwrap();
        let err = charge_credit(&repo, package.id).await.unwrap_err();
        assert!(matches!(err, BookingError::NoCreditsAvailable));
    }

    #[tokio::test]
    async fn refund_reactivates_completed_package() {
        let repo = LocalRepository::new();
        let package = seed_package(&repo, 1).await;
        charge_credit(&repo, package.id).await.unwrap();

        let refunded = refund_credit(&repo, package.id).await.unwrap();
        assert_eq!(refunded.lessons_used, 0);
        assert_eq!(refunded.status, PackageStatus::Active);
    }

    #[tokio::test]
    async fn refund_floors_at_zero() {
        let repo = LocalRepository::new();
        let package = seed_package(&repo, 5).await;

        let refunded = refund_credit(&repo, package.id).await.unwrap();
        assert_eq!(refunded.lessons_used, 0);
    }

    #[tokio::test]
    async fn remove_package_consumes_everything() {
        let repo = LocalRepository::new();
        let package = seed_package(&repo, 10).await;

        let removed = remove_package(&repo, package.student_id).await.unwrap();
        assert_eq!(removed.lessons_used, 10);
        assert_eq!(removed.status, PackageStatus::Completed);

        let err = remove_package(&repo, package.student_id).await.unwrap_err();
        assert!(matches!(err, BookingError::NotFound(_)));
    }

    #[tokio::test]
    async fn grant_rejects_while_credits_remain() {
        let repo = LocalRepository::new();
        let package = seed_package(&repo, 2).await;

        let err = grant_package(&repo, package.student_id, 5)
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::Validation(_)));
    }

    #[tokio::test]
    async fn grant_after_exhaustion_creates_fresh_active_package() {
        let repo = LocalRepository::new();
        let package = seed_package(&repo, 1).await;
        charge_credit(&repo, package.id).await.unwrap();

        let fresh = grant_package(&repo, package.student_id, 8).await.unwrap();
        assert_eq!(fresh.lessons_total, 8);
        assert_eq!(fresh.lessons_used, 0);
        assert_eq!(fresh.status, PackageStatus::Active);
        assert_ne!(fresh.id, package.id);
    }

    #[tokio::test]
    async fn grant_rejects_zero_total() {
        let repo = LocalRepository::new();
        let err = grant_package(&repo, StudentId::generate(), 0)
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::Validation(_)));
    }
}
