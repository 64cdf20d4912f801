//! Postgres repository implementation using Diesel.
//!
//! This module implements the repository traits against a Postgres database.
//!
//! ## Features
//!
//! - Connection pooling with r2d2
//! - Automatic retry for transient failures
//! - Connection health monitoring
//! - Automatic migration execution
//!
//! ## Configuration
//!
//! Environment variables:
//! - `DATABASE_URL` or `PG_DATABASE_URL`: Connection string (required)
//! - `PG_POOL_MAX`: Maximum pool size (default: 10)
//! - `PG_POOL_MIN`: Minimum pool size (default: 1)
//! - `PG_CONN_TIMEOUT_SEC`: Connection timeout in seconds (default: 30)
//! - `PG_IDLE_TIMEOUT_SEC`: Idle connection timeout in seconds (default: 600)
//! - `PG_MAX_RETRIES`: Maximum retry attempts for transient failures (default: 3)
//! - `PG_RETRY_DELAY_MS`: Initial retry delay in milliseconds (default: 100)

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::sql_query;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::task;

use crate::api::{
    AdminSettings, BookingRequest, Cancellation, Direction, Lesson, LessonId, LessonStatus,
    NewBookingRequest, NewLesson, NewStudentPackage, PackageId, PackageStatus, RequestId,
    RequestKind, RequestStatus, StudentId, StudentPackage,
};
use crate::db::repository::{
    BookingRequestRepository, ErrorContext, FullRepository, LessonRepository, PackageRepository,
    RepositoryError, RepositoryResult, RequestFilter, SettingsRepository,
};

mod models;
mod schema;

use models::*;
use schema::*;

type PgPool = Pool<ConnectionManager<PgConnection>>;

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("src/db/repositories/postgres/migrations");

/// Configuration for connecting to Postgres.
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    /// Database connection URL
    pub database_url: String,
    /// Maximum number of connections in the pool
    pub max_pool_size: u32,
    /// Minimum number of connections in the pool
    pub min_pool_size: u32,
    /// Connection timeout in seconds
    pub connection_timeout_sec: u64,
    /// Idle connection timeout in seconds
    pub idle_timeout_sec: u64,
    /// Maximum number of retry attempts for transient failures
    pub max_retries: u32,
    /// Initial retry delay in milliseconds (doubles with each retry)
    pub retry_delay_ms: u64,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            database_url: String::new(),
            max_pool_size: 10,
            min_pool_size: 1,
            connection_timeout_sec: 30,
            idle_timeout_sec: 600,
            max_retries: 3,
            retry_delay_ms: 100,
        }
    }
}

impl PostgresConfig {
    /// Create configuration from environment variables.
    pub fn from_env() -> Result<Self, String> {
        let database_url = std::env::var("DATABASE_URL")
            .or_else(|_| std::env::var("PG_DATABASE_URL"))
            .map_err(|_| "DATABASE_URL or PG_DATABASE_URL must be set".to_string())?;

        let max_pool_size = std::env::var("PG_POOL_MAX")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(10);

        let min_pool_size = std::env::var("PG_POOL_MIN")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(1);

        let connection_timeout_sec = std::env::var("PG_CONN_TIMEOUT_SEC")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(30);

        let idle_timeout_sec = std::env::var("PG_IDLE_TIMEOUT_SEC")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(600);

        let max_retries = std::env::var("PG_MAX_RETRIES")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(3);

        let retry_delay_ms = std::env::var("PG_RETRY_DELAY_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(100);

        Ok(Self {
            database_url,
            max_pool_size,
            min_pool_size,
            connection_timeout_sec,
            idle_timeout_sec,
            max_retries,
            retry_delay_ms,
        })
    }

    /// Create a new configuration with a database URL.
    pub fn with_url(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            ..Default::default()
        }
    }
}

/// Pool health statistics.
#[derive(Debug, Clone, Default)]
pub struct PoolStats {
    /// Number of connections currently in use
    pub connections_in_use: u32,
    /// Number of idle connections
    pub idle_connections: u32,
    /// Total number of connections in the pool
    pub total_connections: u32,
    /// Maximum pool size
    pub max_size: u32,
    /// Total successful queries executed
    pub total_queries: u64,
    /// Total failed queries
    pub failed_queries: u64,
    /// Total retried operations
    pub retried_operations: u64,
}

/// Diesel-backed repository for Postgres.
///
/// This repository implementation provides:
/// - Connection pooling with configurable limits
/// - Automatic retry for transient failures
/// - Health monitoring and statistics
/// - Automatic schema migrations
#[derive(Clone, Debug)]
pub struct PostgresRepository {
    pool: PgPool,
    config: PostgresConfig,
    // Metrics counters
    total_queries: std::sync::Arc<AtomicU64>,
    failed_queries: std::sync::Arc<AtomicU64>,
    retried_operations: std::sync::Arc<AtomicU64>,
}

impl PostgresRepository {
    /// Create a new repository and run pending migrations.
    pub fn new(config: PostgresConfig) -> RepositoryResult<Self> {
        let manager = ConnectionManager::<PgConnection>::new(&config.database_url);

        let pool = Pool::builder()
            .max_size(config.max_pool_size)
            .min_idle(Some(config.min_pool_size))
            .connection_timeout(Duration::from_secs(config.connection_timeout_sec))
            .idle_timeout(Some(Duration::from_secs(config.idle_timeout_sec)))
            .test_on_check_out(true) // Validate connections before use
            .build(manager)
            .map_err(|e| {
                RepositoryError::connection_with_context(
                    e.to_string(),
                    ErrorContext::new("create_pool")
                        .with_details(format!("max_size={}", config.max_pool_size)),
                )
            })?;

        // Run migrations once during initialization
        {
            let mut conn = pool.get().map_err(|e| {
                RepositoryError::connection_with_context(
                    e.to_string(),
                    ErrorContext::new("get_connection_for_migrations"),
                )
            })?;
            Self::run_migrations(&mut conn)?;
        }

        Ok(Self {
            pool,
            config,
            total_queries: std::sync::Arc::new(AtomicU64::new(0)),
            failed_queries: std::sync::Arc::new(AtomicU64::new(0)),
            retried_operations: std::sync::Arc::new(AtomicU64::new(0)),
        })
    }

    /// Run pending database migrations.
    fn run_migrations(conn: &mut PgConnection) -> RepositoryResult<()> {
        conn.run_pending_migrations(MIGRATIONS).map_err(|e| {
            RepositoryError::internal_with_context(
                format!("Migration failed: {}", e),
                ErrorContext::new("run_migrations"),
            )
        })?;

        Ok(())
    }

    /// Execute a database operation with automatic retry for transient failures.
    ///
    /// This method will retry the operation up to `max_retries` times if a
    /// retryable error occurs (connection errors, timeouts, serialization failures).
    async fn with_conn<T, F>(&self, f: F) -> RepositoryResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut PgConnection) -> RepositoryResult<T> + Send + 'static + Clone,
    {
        let pool = self.pool.clone();
        let max_retries = self.config.max_retries;
        let retry_delay_ms = self.config.retry_delay_ms;
        let total_queries = self.total_queries.clone();
        let failed_queries = self.failed_queries.clone();
        let retried_operations = self.retried_operations.clone();

        task::spawn_blocking(move || {
            let mut last_error = None;
            let mut retry_delay = Duration::from_millis(retry_delay_ms);

            for attempt in 0..=max_retries {
                if attempt > 0 {
                    retried_operations.fetch_add(1, Ordering::Relaxed);
                    std::thread::sleep(retry_delay);
                    retry_delay *= 2; // Exponential backoff
                }

                // Get connection
                let mut conn = match pool.get() {
                    Ok(c) => c,
                    Err(e) => {
                        let err = RepositoryError::connection_with_context(
                            e.to_string(),
                            ErrorContext::new("get_connection")
                                .with_details(format!("attempt={}", attempt + 1))
                                .retryable(),
                        );
                        if attempt < max_retries {
                            last_error = Some(err);
                            continue;
                        }
                        failed_queries.fetch_add(1, Ordering::Relaxed);
                        return Err(err);
                    }
                };

                // Execute the operation
                total_queries.fetch_add(1, Ordering::Relaxed);
                match f.clone()(&mut conn) {
                    Ok(result) => return Ok(result),
                    Err(e) if e.is_retryable() && attempt < max_retries => {
                        last_error = Some(e);
                        continue;
                    }
                    Err(e) => {
                        failed_queries.fetch_add(1, Ordering::Relaxed);
                        return Err(e);
                    }
                }
            }

            failed_queries.fetch_add(1, Ordering::Relaxed);
            Err(last_error.unwrap_or_else(|| {
                RepositoryError::internal("Max retries exceeded with no error captured")
            }))
        })
        .await
        .map_err(|e| {
            RepositoryError::internal_with_context(
                format!("Task join error: {}", e),
                ErrorContext::new("spawn_blocking"),
            )
        })?
    }

    /// Get pool health statistics.
    pub fn get_pool_stats(&self) -> PoolStats {
        let state = self.pool.state();
        PoolStats {
            connections_in_use: state.connections - state.idle_connections,
            idle_connections: state.idle_connections,
            total_connections: state.connections,
            max_size: self.config.max_pool_size,
            total_queries: self.total_queries.load(Ordering::Relaxed),
            failed_queries: self.failed_queries.load(Ordering::Relaxed),
            retried_operations: self.retried_operations.load(Ordering::Relaxed),
        }
    }

    /// Check if the database connection is healthy.
    pub async fn is_healthy(&self) -> bool {
        self.health_check().await.unwrap_or(false)
    }

    /// Get detailed health information.
    ///
    /// Returns a tuple of (is_healthy, latency_ms, error_message).
    pub async fn health_check_detailed(&self) -> (bool, Option<u64>, Option<String>) {
        let start = Instant::now();
        match self.health_check().await {
            Ok(true) => (true, Some(start.elapsed().as_millis() as u64), None),
            Ok(false) => (
                false,
                Some(start.elapsed().as_millis() as u64),
                Some("Health check returned false".to_string()),
            ),
            Err(e) => (
                false,
                Some(start.elapsed().as_millis() as u64),
                Some(e.to_string()),
            ),
        }
    }
}

fn map_diesel_error(err: diesel::result::Error) -> RepositoryError {
    RepositoryError::from(err)
}

/// Distinguish a lost conditional write from a missing row: `None` means the
/// row exists but its guarded column changed; a missing row is `NotFound`.
fn check_row_exists(exists: bool, entity: &str, id: impl std::fmt::Display) -> RepositoryResult<()> {
    if exists {
        Ok(())
    } else {
        Err(RepositoryError::not_found(format!(
            "{} {} not found",
            entity, id
        )))
    }
}

#[async_trait]
impl LessonRepository for PostgresRepository {
    async fn insert_lesson(&self, lesson: NewLesson) -> RepositoryResult<Lesson> {
        self.with_conn(move |conn| {
            let row = NewLessonRow {
                student_id: lesson.student_id.value(),
                package_id: lesson.package_id.map(|p| p.value()),
                starts_at: lesson.starts_at,
                ends_at: lesson.ends_at,
                status: lesson.status.to_string(),
            };

            let inserted: LessonRow = diesel::insert_into(lessons::table)
                .values(&row)
                .returning(LessonRow::as_returning())
                .get_result(conn)
                .map_err(map_diesel_error)?;

            inserted.into_lesson()
        })
        .await
    }

    async fn get_lesson(&self, id: LessonId) -> RepositoryResult<Option<Lesson>> {
        self.with_conn(move |conn| {
            lessons::table
                .filter(lessons::id.eq(id.value()))
                .select(LessonRow::as_select())
                .first::<LessonRow>(conn)
                .optional()
                .map_err(map_diesel_error)?
                .map(LessonRow::into_lesson)
                .transpose()
        })
        .await
    }

    async fn list_lessons_for_student(&self, student: StudentId) -> RepositoryResult<Vec<Lesson>> {
        self.with_conn(move |conn| {
            let rows = lessons::table
                .filter(lessons::student_id.eq(student.value()))
                .order(lessons::starts_at.asc())
                .select(LessonRow::as_select())
                .load::<LessonRow>(conn)
                .map_err(map_diesel_error)?;

            rows.into_iter().map(LessonRow::into_lesson).collect()
        })
        .await
    }

    async fn list_lessons_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> RepositoryResult<Vec<Lesson>> {
        self.with_conn(move |conn| {
            let rows = lessons::table
                .filter(lessons::starts_at.le(to))
                .filter(lessons::ends_at.ge(from))
                .order(lessons::starts_at.asc())
                .select(LessonRow::as_select())
                .load::<LessonRow>(conn)
                .map_err(map_diesel_error)?;

            rows.into_iter().map(LessonRow::into_lesson).collect()
        })
        .await
    }

    async fn find_colliding_lesson(
        &self,
        student: StudentId,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
        ignore: Option<LessonId>,
    ) -> RepositoryResult<Option<Lesson>> {
        self.with_conn(move |conn| {
            let mut query = lessons::table
                .select(LessonRow::as_select())
                .filter(lessons::student_id.eq(student.value()))
                .filter(lessons::status.ne(LessonStatus::Cancelled.as_str()))
                .filter(lessons::starts_at.le(window_end))
                .filter(lessons::ends_at.ge(window_start))
                .into_boxed();

            if let Some(ignore) = ignore {
                query = query.filter(lessons::id.ne(ignore.value()));
            }

            query
                .order(lessons::starts_at.asc())
                .first::<LessonRow>(conn)
                .optional()
                .map_err(map_diesel_error)?
                .map(LessonRow::into_lesson)
                .transpose()
        })
        .await
    }

    async fn update_lesson_times(
        &self,
        id: LessonId,
        expected_status: LessonStatus,
        starts_at: DateTime<Utc>,
        ends_at: DateTime<Utc>,
    ) -> RepositoryResult<Option<Lesson>> {
        self.with_conn(move |conn| {
            let updated: Option<LessonRow> = diesel::update(
                lessons::table
                    .filter(lessons::id.eq(id.value()))
                    .filter(lessons::status.eq(expected_status.as_str())),
            )
            .set((lessons::starts_at.eq(starts_at), lessons::ends_at.eq(ends_at)))
            .returning(LessonRow::as_returning())
            .get_result(conn)
            .optional()
            .map_err(map_diesel_error)?;

            match updated {
                Some(row) => row.into_lesson().map(Some),
                None => {
                    let exists = diesel::select(diesel::dsl::exists(
                        lessons::table.filter(lessons::id.eq(id.value())),
                    ))
                    .get_result::<bool>(conn)
                    .map_err(map_diesel_error)?;
                    check_row_exists(exists, "Lesson", id)?;
                    Ok(None)
                }
            }
        })
        .await
    }

    async fn update_lesson_status(
        &self,
        id: LessonId,
        expected_status: LessonStatus,
        new_status: LessonStatus,
        cancellation: Option<Cancellation>,
    ) -> RepositoryResult<Option<Lesson>> {
        self.with_conn(move |conn| {
            let (reason, cancelled_at, cancelled_by) = match &cancellation {
                Some(c) => (
                    Some(c.reason.clone()),
                    Some(c.cancelled_at),
                    Some(c.cancelled_by.as_str().to_string()),
                ),
                None => (None, None, None),
            };

            let updated: Option<LessonRow> = diesel::update(
                lessons::table
                    .filter(lessons::id.eq(id.value()))
                    .filter(lessons::status.eq(expected_status.as_str())),
            )
            .set((
                lessons::status.eq(new_status.as_str()),
                lessons::cancellation_reason.eq(reason),
                lessons::cancelled_at.eq(cancelled_at),
                lessons::cancelled_by.eq(cancelled_by),
            ))
            .returning(LessonRow::as_returning())
            .get_result(conn)
            .optional()
            .map_err(map_diesel_error)?;

            match updated {
                Some(row) => row.into_lesson().map(Some),
                None => {
                    let exists = diesel::select(diesel::dsl::exists(
                        lessons::table.filter(lessons::id.eq(id.value())),
                    ))
                    .get_result::<bool>(conn)
                    .map_err(map_diesel_error)?;
                    check_row_exists(exists, "Lesson", id)?;
                    Ok(None)
                }
            }
        })
        .await
    }
}

#[async_trait]
impl BookingRequestRepository for PostgresRepository {
    async fn insert_request(
        &self,
        request: NewBookingRequest,
    ) -> RepositoryResult<BookingRequest> {
        self.with_conn(move |conn| {
            let row = NewBookingRequestRow {
                student_id: request.student_id.value(),
                requester: request.requester.map(|r| r.as_str().to_string()),
                direction: request.direction.as_str().to_string(),
                kind: request.kind.as_str().to_string(),
                status: RequestStatus::Pending.as_str().to_string(),
                proposed_starts_at: request.proposed_starts_at,
                proposed_ends_at: request.proposed_ends_at,
                message: request.message.clone(),
                lesson_id: request.lesson_id.map(|l| l.value()),
                counter_of: request.counter_of.map(|r| r.value()),
            };

            let inserted: BookingRequestRow = diesel::insert_into(booking_requests::table)
                .values(&row)
                .returning(BookingRequestRow::as_returning())
                .get_result(conn)
                .map_err(map_diesel_error)?;

            inserted.into_request()
        })
        .await
    }

    async fn get_request(&self, id: RequestId) -> RepositoryResult<Option<BookingRequest>> {
        self.with_conn(move |conn| {
            booking_requests::table
                .filter(booking_requests::id.eq(id.value()))
                .select(BookingRequestRow::as_select())
                .first::<BookingRequestRow>(conn)
                .optional()
                .map_err(map_diesel_error)?
                .map(BookingRequestRow::into_request)
                .transpose()
        })
        .await
    }

    async fn find_pending_request(
        &self,
        id: RequestId,
        direction: Direction,
    ) -> RepositoryResult<Option<BookingRequest>> {
        self.with_conn(move |conn| {
            booking_requests::table
                .filter(booking_requests::id.eq(id.value()))
                .filter(booking_requests::status.eq(RequestStatus::Pending.as_str()))
                .filter(booking_requests::direction.eq(direction.as_str()))
                .select(BookingRequestRow::as_select())
                .first::<BookingRequestRow>(conn)
                .optional()
                .map_err(map_diesel_error)?
                .map(BookingRequestRow::into_request)
                .transpose()
        })
        .await
    }

    async fn has_pending_reschedule(&self, lesson: LessonId) -> RepositoryResult<bool> {
        self.with_conn(move |conn| {
            diesel::select(diesel::dsl::exists(
                booking_requests::table
                    .filter(booking_requests::lesson_id.eq(lesson.value()))
                    .filter(booking_requests::kind.eq(RequestKind::Reschedule.as_str()))
                    .filter(booking_requests::status.eq(RequestStatus::Pending.as_str())),
            ))
            .get_result::<bool>(conn)
            .map_err(map_diesel_error)
        })
        .await
    }

    async fn resolve_request(
        &self,
        id: RequestId,
        new_status: RequestStatus,
    ) -> RepositoryResult<Option<BookingRequest>> {
        self.with_conn(move |conn| {
            let updated: Option<BookingRequestRow> = diesel::update(
                booking_requests::table
                    .filter(booking_requests::id.eq(id.value()))
                    .filter(booking_requests::status.eq(RequestStatus::Pending.as_str())),
            )
            .set(booking_requests::status.eq(new_status.as_str()))
            .returning(BookingRequestRow::as_returning())
            .get_result(conn)
            .optional()
            .map_err(map_diesel_error)?;

            match updated {
                Some(row) => row.into_request().map(Some),
                None => {
                    let exists = diesel::select(diesel::dsl::exists(
                        booking_requests::table.filter(booking_requests::id.eq(id.value())),
                    ))
                    .get_result::<bool>(conn)
                    .map_err(map_diesel_error)?;
                    check_row_exists(exists, "Booking request", id)?;
                    Ok(None)
                }
            }
        })
        .await
    }

    async fn list_requests(
        &self,
        filter: RequestFilter,
    ) -> RepositoryResult<Vec<BookingRequest>> {
        self.with_conn(move |conn| {
            let mut query = booking_requests::table
                .select(BookingRequestRow::as_select())
                .into_boxed();

            if let Some(student) = filter.student_id {
                query = query.filter(booking_requests::student_id.eq(student.value()));
            }
            if let Some(direction) = filter.direction {
                query = query.filter(booking_requests::direction.eq(direction.as_str()));
            }
            if let Some(status) = filter.status {
                query = query.filter(booking_requests::status.eq(status.as_str()));
            }
            if let Some(kind) = filter.kind {
                query = query.filter(booking_requests::kind.eq(kind.as_str()));
            }

            let rows = query
                .order(booking_requests::created_at.desc())
                .load::<BookingRequestRow>(conn)
                .map_err(map_diesel_error)?;

            rows.into_iter().map(BookingRequestRow::into_request).collect()
        })
        .await
    }
}

#[async_trait]
impl PackageRepository for PostgresRepository {
    async fn insert_package(
        &self,
        package: NewStudentPackage,
    ) -> RepositoryResult<StudentPackage> {
        self.with_conn(move |conn| {
            let row = NewStudentPackageRow {
                student_id: package.student_id.value(),
                lessons_total: package.lessons_total as i32,
                lessons_used: 0,
                status: PackageStatus::Active.as_str().to_string(),
            };

            let inserted: StudentPackageRow = diesel::insert_into(student_packages::table)
                .values(&row)
                .returning(StudentPackageRow::as_returning())
                .get_result(conn)
                .map_err(map_diesel_error)?;

            inserted.into_package()
        })
        .await
    }

    async fn get_package(&self, id: PackageId) -> RepositoryResult<Option<StudentPackage>> {
        self.with_conn(move |conn| {
            student_packages::table
                .filter(student_packages::id.eq(id.value()))
                .select(StudentPackageRow::as_select())
                .first::<StudentPackageRow>(conn)
                .optional()
                .map_err(map_diesel_error)?
                .map(StudentPackageRow::into_package)
                .transpose()
        })
        .await
    }

    async fn find_active_package(
        &self,
        student: StudentId,
    ) -> RepositoryResult<Option<StudentPackage>> {
        self.with_conn(move |conn| {
            student_packages::table
                .filter(student_packages::student_id.eq(student.value()))
                .filter(student_packages::status.eq(PackageStatus::Active.as_str()))
                .order(student_packages::created_at.desc())
                .select(StudentPackageRow::as_select())
                .first::<StudentPackageRow>(conn)
                .optional()
                .map_err(map_diesel_error)?
                .map(StudentPackageRow::into_package)
                .transpose()
        })
        .await
    }

    async fn list_packages_for_student(
        &self,
        student: StudentId,
    ) -> RepositoryResult<Vec<StudentPackage>> {
        self.with_conn(move |conn| {
            let rows = student_packages::table
                .filter(student_packages::student_id.eq(student.value()))
                .order(student_packages::created_at.desc())
                .select(StudentPackageRow::as_select())
                .load::<StudentPackageRow>(conn)
                .map_err(map_diesel_error)?;

            rows.into_iter().map(StudentPackageRow::into_package).collect()
        })
        .await
    }

    async fn update_package_credits(
        &self,
        id: PackageId,
        expected_used: u32,
        lessons_used: u32,
        status: PackageStatus,
    ) -> RepositoryResult<Option<StudentPackage>> {
        self.with_conn(move |conn| {
            let updated: Option<StudentPackageRow> = diesel::update(
                student_packages::table
                    .filter(student_packages::id.eq(id.value()))
                    .filter(student_packages::lessons_used.eq(expected_used as i32)),
            )
            .set((
                student_packages::lessons_used.eq(lessons_used as i32),
                student_packages::status.eq(status.as_str()),
            ))
            .returning(StudentPackageRow::as_returning())
            .get_result(conn)
            .optional()
            .map_err(map_diesel_error)?;

            match updated {
                Some(row) => row.into_package().map(Some),
                None => {
                    let exists = diesel::select(diesel::dsl::exists(
                        student_packages::table.filter(student_packages::id.eq(id.value())),
                    ))
                    .get_result::<bool>(conn)
                    .map_err(map_diesel_error)?;
                    check_row_exists(exists, "Package", id)?;
                    Ok(None)
                }
            }
        })
        .await
    }
}

#[async_trait]
impl SettingsRepository for PostgresRepository {
    async fn get_settings(&self) -> RepositoryResult<Option<AdminSettings>> {
        self.with_conn(move |conn| {
            admin_settings::table
                .filter(admin_settings::id.eq(1_i16))
                .select(AdminSettingsRow::as_select())
                .first::<AdminSettingsRow>(conn)
                .optional()
                .map_err(map_diesel_error)?
                .map(AdminSettingsRow::into_settings)
                .transpose()
        })
        .await
    }

    async fn put_settings(&self, settings: AdminSettings) -> RepositoryResult<AdminSettings> {
        self.with_conn(move |conn| {
            let availability = serde_json::to_value(&settings.weekly_availability)
                .map_err(|e| {
                    RepositoryError::internal(format!(
                        "Could not serialize weekly availability: {}",
                        e
                    ))
                })?;

            let values = (
                admin_settings::id.eq(1_i16),
                admin_settings::default_duration_min.eq(settings.default_duration_min as i32),
                admin_settings::buffer_min.eq(settings.buffer_min as i32),
                admin_settings::cancel_window_hours.eq(settings.cancel_window_hours),
                admin_settings::lead_time_hours.eq(settings.lead_time_hours),
                admin_settings::weekly_availability.eq(availability),
                admin_settings::timezone.eq(settings.timezone.name().to_string()),
                admin_settings::updated_at.eq(settings.updated_at),
            );

            let stored: AdminSettingsRow = diesel::insert_into(admin_settings::table)
                .values(values.clone())
                .on_conflict(admin_settings::id)
                .do_update()
                .set(values)
                .returning(AdminSettingsRow::as_returning())
                .get_result(conn)
                .map_err(map_diesel_error)?;

            stored.into_settings()
        })
        .await
    }
}

#[async_trait]
impl FullRepository for PostgresRepository {
    async fn health_check(&self) -> RepositoryResult<bool> {
        self.with_conn(|conn| {
            sql_query("SELECT 1")
                .execute(conn)
                .map(|_| true)
                .map_err(map_diesel_error)
        })
        .await
    }
}
