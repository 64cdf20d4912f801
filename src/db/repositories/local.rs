//! In-memory repository implementation.
//!
//! Backs unit and integration tests and local development. All maps live
//! behind a single `parking_lot::RwLock`, so every conditional update is
//! atomic with respect to the state it checks; that is exactly the
//! serialization guarantee the booking engine requires from a real store.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::api::{
    AdminSettings, BookingRequest, Cancellation, Direction, Lesson, LessonId, LessonStatus,
    NewBookingRequest, NewLesson, NewStudentPackage, PackageId, PackageStatus, RequestId,
    RequestKind, RequestStatus, StudentId, StudentPackage,
};
use crate::db::repository::{
    BookingRequestRepository, FullRepository, LessonRepository, PackageRepository,
    RepositoryError, RepositoryResult, RequestFilter, SettingsRepository,
};

#[derive(Default)]
struct Store {
    lessons: HashMap<LessonId, Lesson>,
    requests: HashMap<RequestId, BookingRequest>,
    packages: HashMap<PackageId, StudentPackage>,
    settings: Option<AdminSettings>,
}

/// In-memory implementation of all repository traits.
#[derive(Default)]
pub struct LocalRepository {
    store: RwLock<Store>,
}

impl LocalRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored lessons; test helper.
    pub fn lesson_count(&self) -> usize {
        self.store.read().lessons.len()
    }

    /// Number of stored requests; test helper.
    pub fn request_count(&self) -> usize {
        self.store.read().requests.len()
    }
}

fn lesson_not_found(id: LessonId) -> RepositoryError {
    RepositoryError::not_found(format!("Lesson {} not found", id))
}

fn request_not_found(id: RequestId) -> RepositoryError {
    RepositoryError::not_found(format!("Booking request {} not found", id))
}

fn package_not_found(id: PackageId) -> RepositoryError {
    RepositoryError::not_found(format!("Package {} not found", id))
}

#[async_trait]
impl LessonRepository for LocalRepository {
    async fn insert_lesson(&self, lesson: NewLesson) -> RepositoryResult<Lesson> {
        let stored = Lesson {
            id: LessonId::generate(),
            student_id: lesson.student_id,
            package_id: lesson.package_id,
            starts_at: lesson.starts_at,
            ends_at: lesson.ends_at,
            status: lesson.status,
            cancellation: None,
            created_at: Utc::now(),
        };
        self.store.write().lessons.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn get_lesson(&self, id: LessonId) -> RepositoryResult<Option<Lesson>> {
        Ok(self.store.read().lessons.get(&id).cloned())
    }

    async fn list_lessons_for_student(&self, student: StudentId) -> RepositoryResult<Vec<Lesson>> {
        let mut lessons: Vec<Lesson> = self
            .store
            .read()
            .lessons
            .values()
            .filter(|lesson| lesson.student_id == student)
            .cloned()
            .collect();
        lessons.sort_by_key(|lesson| lesson.starts_at);
        Ok(lessons)
    }

    async fn list_lessons_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> RepositoryResult<Vec<Lesson>> {
        let mut lessons: Vec<Lesson> = self
            .store
            .read()
            .lessons
            .values()
            .filter(|lesson| lesson.starts_at <= to && lesson.ends_at >= from)
            .cloned()
            .collect();
        lessons.sort_by_key(|lesson| lesson.starts_at);
        Ok(lessons)
    }

    async fn find_colliding_lesson(
        &self,
        student: StudentId,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
        ignore: Option<LessonId>,
    ) -> RepositoryResult<Option<Lesson>> {
        let store = self.store.read();
        let mut candidates: Vec<&Lesson> = store
            .lessons
            .values()
            .filter(|lesson| {
                lesson.student_id == student
                    && lesson.status != LessonStatus::Cancelled
                    && Some(lesson.id) != ignore
                    && lesson.starts_at <= window_end
                    && lesson.ends_at >= window_start
            })
            .collect();
        candidates.sort_by_key(|lesson| lesson.starts_at);
        Ok(candidates.first().map(|lesson| (*lesson).clone()))
    }

    async fn update_lesson_times(
        &self,
        id: LessonId,
        expected_status: LessonStatus,
        starts_at: DateTime<Utc>,
        ends_at: DateTime<Utc>,
    ) -> RepositoryResult<Option<Lesson>> {
        let mut store = self.store.write();
        let lesson = store.lessons.get_mut(&id).ok_or_else(|| lesson_not_found(id))?;

        if lesson.status != expected_status {
            return Ok(None);
        }

        lesson.starts_at = starts_at;
        lesson.ends_at = ends_at;
        Ok(Some(lesson.clone()))
    }

    async fn update_lesson_status(
        &self,
        id: LessonId,
        expected_status: LessonStatus,
        new_status: LessonStatus,
        cancellation: Option<Cancellation>,
    ) -> RepositoryResult<Option<Lesson>> {
        let mut store = self.store.write();
        let lesson = store.lessons.get_mut(&id).ok_or_else(|| lesson_not_found(id))?;

        if lesson.status != expected_status {
            return Ok(None);
        }

        lesson.status = new_status;
        lesson.cancellation = cancellation;
        Ok(Some(lesson.clone()))
    }
}

#[async_trait]
impl BookingRequestRepository for LocalRepository {
    async fn insert_request(
        &self,
        request: NewBookingRequest,
    ) -> RepositoryResult<BookingRequest> {
        let stored = BookingRequest {
            id: RequestId::generate(),
            student_id: request.student_id,
            requester: request.requester,
            direction: request.direction,
            kind: request.kind,
            status: RequestStatus::Pending,
            proposed_starts_at: request.proposed_starts_at,
            proposed_ends_at: request.proposed_ends_at,
            message: request.message,
            lesson_id: request.lesson_id,
            counter_of: request.counter_of,
            created_at: Utc::now(),
        };
        let mut store = self.store.write();
        if stored.kind == RequestKind::Reschedule {
            if let Some(lesson_id) = stored.lesson_id {
                let duplicate = store.requests.values().any(|existing| {
                    existing.kind == RequestKind::Reschedule
                        && existing.status == RequestStatus::Pending
                        && existing.lesson_id == Some(lesson_id)
                });
                if duplicate {
                    return Err(RepositoryError::conflict(format!(
                        "A pending reschedule request already exists for lesson {}",
                        lesson_id
                    )));
                }
            }
        }
        store.requests.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn get_request(&self, id: RequestId) -> RepositoryResult<Option<BookingRequest>> {
        Ok(self.store.read().requests.get(&id).cloned())
    }

    async fn find_pending_request(
        &self,
        id: RequestId,
        direction: Direction,
    ) -> RepositoryResult<Option<BookingRequest>> {
        Ok(self
            .store
            .read()
            .requests
            .get(&id)
            .filter(|request| {
                request.status == RequestStatus::Pending && request.direction == direction
            })
            .cloned())
    }

    async fn has_pending_reschedule(&self, lesson: LessonId) -> RepositoryResult<bool> {
        Ok(self.store.read().requests.values().any(|request| {
            request.kind == RequestKind::Reschedule
                && request.status == RequestStatus::Pending
                && request.lesson_id == Some(lesson)
        }))
    }

    async fn resolve_request(
        &self,
        id: RequestId,
        new_status: RequestStatus,
    ) -> RepositoryResult<Option<BookingRequest>> {
        let mut store = self.store.write();
        let request = store
            .requests
            .get_mut(&id)
            .ok_or_else(|| request_not_found(id))?;

        if request.status != RequestStatus::Pending {
            return Ok(None);
        }

        request.status = new_status;
        Ok(Some(request.clone()))
    }

    async fn list_requests(
        &self,
        filter: RequestFilter,
    ) -> RepositoryResult<Vec<BookingRequest>> {
        let mut requests: Vec<BookingRequest> = self
            .store
            .read()
            .requests
            .values()
            .filter(|request| {
                filter
                    .student_id
                    .is_none_or(|student| request.student_id == student)
                    && filter
                        .direction
                        .is_none_or(|direction| request.direction == direction)
                    && filter.status.is_none_or(|status| request.status == status)
                    && filter.kind.is_none_or(|kind| request.kind == kind)
            })
            .cloned()
            .collect();
        requests.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(requests)
    }
}

#[async_trait]
impl PackageRepository for LocalRepository {
    async fn insert_package(
        &self,
        package: NewStudentPackage,
    ) -> RepositoryResult<StudentPackage> {
        let stored = StudentPackage {
            id: PackageId::generate(),
            student_id: package.student_id,
            lessons_total: package.lessons_total,
            lessons_used: 0,
            status: PackageStatus::Active,
            created_at: Utc::now(),
        };
        let mut store = self.store.write();
        let duplicate = store.packages.values().any(|existing| {
            existing.student_id == stored.student_id && existing.status == PackageStatus::Active
        });
        if duplicate {
            return Err(RepositoryError::conflict(format!(
                "An active package already exists for student {}",
                stored.student_id
            )));
        }
        store.packages.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn get_package(&self, id: PackageId) -> RepositoryResult<Option<StudentPackage>> {
        Ok(self.store.read().packages.get(&id).cloned())
    }

    async fn find_active_package(
        &self,
        student: StudentId,
    ) -> RepositoryResult<Option<StudentPackage>> {
        Ok(self
            .store
            .read()
            .packages
            .values()
            .filter(|package| {
                package.student_id == student && package.status == PackageStatus::Active
            })
            .max_by_key(|package| package.created_at)
            .cloned())
    }

    async fn list_packages_for_student(
        &self,
        student: StudentId,
    ) -> RepositoryResult<Vec<StudentPackage>> {
        let mut packages: Vec<StudentPackage> = self
            .store
            .read()
            .packages
            .values()
            .filter(|package| package.student_id == student)
            .cloned()
            .collect();
        packages.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(packages)
    }

    async fn update_package_credits(
        &self,
        id: PackageId,
        expected_used: u32,
        lessons_used: u32,
        status: PackageStatus,
    ) -> RepositoryResult<Option<StudentPackage>> {
        let mut store = self.store.write();
        let package = store
            .packages
            .get_mut(&id)
            .ok_or_else(|| package_not_found(id))?;

        if package.lessons_used != expected_used {
            return Ok(None);
        }

        package.lessons_used = lessons_used;
        package.status = status;
        Ok(Some(package.clone()))
    }
}

#[async_trait]
impl SettingsRepository for LocalRepository {
    async fn get_settings(&self) -> RepositoryResult<Option<AdminSettings>> {
        Ok(self.store.read().settings.clone())
    }

    async fn put_settings(&self, settings: AdminSettings) -> RepositoryResult<AdminSettings> {
        self.store.write().settings = Some(settings.clone());
        Ok(settings)
    }
}

#[async_trait]
impl FullRepository for LocalRepository {
    async fn health_check(&self) -> RepositoryResult<bool> {
        Ok(true)
    }
}
