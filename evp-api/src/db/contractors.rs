//! Contractor registry lookups
//!
//! Contractor CRUD lives outside this service; enrollment and notification
//! code only needs tenant-scoped reads (contact and supervisor details).

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::error::ApiResult;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ContractorRow {
    pub id: String,
    pub tenant_id: String,
    pub name: String,
    pub contact_person: String,
    pub contact_email: String,
    pub supervisor_name: Option<String>,
    pub supervisor_email: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Get a contractor within the given tenant, None if missing or foreign
pub async fn get_in_tenant(
    conn: &mut SqliteConnection,
    contractor_id: &str,
    tenant_id: &str,
) -> ApiResult<Option<ContractorRow>> {
    let row = sqlx::query_as::<_, ContractorRow>(
        "SELECT * FROM contractors WHERE id = ? AND tenant_id = ?",
    )
    .bind(contractor_id)
    .bind(tenant_id)
    .fetch_optional(conn)
    .await?;
    Ok(row)
}

/// Get a contractor by id regardless of tenant (webhook path, where the
/// submission row itself establishes scope)
pub async fn get(
    conn: &mut SqliteConnection,
    contractor_id: &str,
) -> ApiResult<Option<ContractorRow>> {
    let row = sqlx::query_as::<_, ContractorRow>("SELECT * FROM contractors WHERE id = ?")
        .bind(contractor_id)
        .fetch_optional(conn)
        .await?;
    Ok(row)
}

/// Seed a contractor record. Used by tests and provisioning tooling.
#[allow(clippy::too_many_arguments)]
pub async fn insert(
    pool: &SqlitePool,
    tenant_id: &str,
    name: &str,
    contact_person: &str,
    contact_email: &str,
    supervisor_name: Option<&str>,
    supervisor_email: Option<&str>,
) -> ApiResult<String> {
    let id = Uuid::new_v4().to_string();
    sqlx::query(
        r#"
        INSERT INTO contractors
            (id, tenant_id, name, contact_person, contact_email,
             supervisor_name, supervisor_email, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(tenant_id)
    .bind(name)
    .bind(contact_person)
    .bind(contact_email)
    .bind(supervisor_name)
    .bind(supervisor_email)
    .bind(Utc::now())
    .execute(pool)
    .await?;
    Ok(id)
}
