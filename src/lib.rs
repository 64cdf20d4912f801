//! # Tutorbook Backend
//!
//! Lesson-booking engine for a single tutor and their students.
//!
//! This crate implements the scheduling core of a tutoring platform: students
//! request, cancel and reschedule lessons against a prepaid credit package;
//! the tutor accepts, declines, counter-proposes, or mutates bookings
//! directly. The backend exposes a REST API via Axum.
//!
//! ## Features
//!
//! - **Availability**: recurring weekly open hours with containment checks
//! - **Collision Detection**: buffer-aware per-student overlap checks
//! - **Credit Ledger**: charge/refund/revoke of prepaid lesson credits
//! - **Request Negotiation**: bidirectional pending/accepted/declined state
//!   machine with counter-proposals
//! - **Lesson Lifecycle**: booked/completed/cancelled/no-show transitions
//!   with their ledger side effects
//! - **HTTP API**: RESTful endpoints behind the `http-server` feature
//!
//! ## Architecture
//!
//! The crate is organized into several logical modules:
//!
//! - [`api`]: Domain entities shared across layers
//! - [`models`]: Value types and pure booking logic (availability, windows)
//! - [`error`]: The caller-facing `BookingError`
//! - [`db`]: Database operations, repository pattern, and persistence layer
//! - [`services`]: High-level business logic over the repository traits
//! - [`http`]: Axum-based HTTP server and request handlers

// Allow large error types - RepositoryError contains rich context for debugging
#![allow(clippy::result_large_err)]

pub mod api;

pub mod db;
pub mod error;
pub mod models;

pub mod services;

#[cfg(feature = "http-server")]
pub mod http;

pub use error::{BookingError, BookingResult};
