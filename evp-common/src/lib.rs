//! # EVP Common Library
//!
//! Shared code for the EVP evaluation-process service:
//! - Domain vocabulary (form kinds, statuses, role tiers)
//! - JWT claim verification and role checks
//! - Configuration loading
//! - Common error types

pub mod auth;
pub mod config;
pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{
    EnrollmentStatus, FormKind, NotificationKind, NotificationStatus, SessionStatus,
    SubmissionStatus,
};
