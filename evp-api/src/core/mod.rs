//! Evaluation-process core
//!
//! The non-CRUD heart of the service: the scoring aggregator, the status
//! derivation engine, and notification enqueueing. All side effects are
//! explicit function calls invoked inside the submission-write transaction
//! so the control flow is visible and testable in isolation.

pub mod notify;
pub mod progress;
pub mod scoring;
