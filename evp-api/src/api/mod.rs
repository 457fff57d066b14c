//! HTTP API handlers

pub mod auth;
pub mod forms;
pub mod health;
pub mod notifications;
pub mod sessions;
pub mod webhook;
