//! Database access layer for evp-api
//!
//! TEXT UUID keys, RFC3339 TEXT timestamps, JSON columns via
//! `sqlx::types::Json`. Functions that participate in a multi-step write
//! take `&mut SqliteConnection` so they compose inside one transaction.

use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;

use crate::error::ApiResult;

pub mod contractors;
pub mod enrollments;
pub mod init;
pub mod notifications;
pub mod sessions;
pub mod submissions;

/// Connect to the database, creating the file if missing.
///
/// In-memory databases are pinned to a single connection: every pooled
/// connection to `sqlite::memory:` would otherwise see its own empty
/// database.
pub async fn connect(database_url: &str) -> ApiResult<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true);

    let max_connections = if database_url.contains(":memory:") {
        1
    } else {
        5
    };

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await?;

    Ok(pool)
}
