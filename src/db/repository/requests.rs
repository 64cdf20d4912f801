//! Booking request repository trait.

use async_trait::async_trait;

use super::error::RepositoryResult;
use crate::api::{
    BookingRequest, Direction, LessonId, NewBookingRequest, RequestId, RequestKind, RequestStatus,
    StudentId,
};

/// Filter for request listings. All fields are conjunctive; `None` matches
/// everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestFilter {
    pub student_id: Option<StudentId>,
    pub direction: Option<Direction>,
    pub status: Option<RequestStatus>,
    pub kind: Option<RequestKind>,
}

/// Repository trait for booking request storage.
#[async_trait]
pub trait BookingRequestRepository: Send + Sync {
    /// Persist a new request in Pending state, assigning id and timestamp.
    async fn insert_request(&self, request: NewBookingRequest)
        -> RepositoryResult<BookingRequest>;

    /// Fetch a request by id, regardless of status.
    async fn get_request(&self, id: RequestId) -> RepositoryResult<Option<BookingRequest>>;

    /// Fetch a request only when it is still pending and flows in the given
    /// direction. Resolved requests and direction mismatches yield `None`.
    async fn find_pending_request(
        &self,
        id: RequestId,
        direction: Direction,
    ) -> RepositoryResult<Option<BookingRequest>>;

    /// Whether a pending reschedule request already targets this lesson.
    /// Backs the at-most-one-pending-reschedule-per-lesson invariant.
    async fn has_pending_reschedule(&self, lesson: LessonId) -> RepositoryResult<bool>;

    /// Transition a request out of Pending, exactly once.
    ///
    /// # Returns
    /// * `Ok(Some(request))` - the resolved request
    /// * `Ok(None)` - the request was no longer pending; nothing written
    /// * `Err(NotFound)` - no request with this id
    async fn resolve_request(
        &self,
        id: RequestId,
        new_status: RequestStatus,
    ) -> RepositoryResult<Option<BookingRequest>>;

    /// List requests matching the filter, newest first.
    async fn list_requests(&self, filter: RequestFilter)
        -> RepositoryResult<Vec<BookingRequest>>;
}
