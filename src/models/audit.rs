use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgExecutor};
use utoipa::ToSchema;

/// Append-only record of shift mutations. Shifts are never hard-deleted, so
/// entries stay resolvable.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct AuditLogEntry {
    pub id: i32,
    pub shift_id: Option<i32>,
    pub volunteer_id: Option<i32>,
    pub admin_identity: Option<String>,
    pub action: String,
    pub details: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl AuditLogEntry {
    pub async fn record(
        executor: impl PgExecutor<'_>,
        shift_id: Option<i32>,
        volunteer_id: Option<i32>,
        admin_identity: Option<&str>,
        action: &str,
        details: &str,
    ) -> sqlx::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO "AuditLog" (shift_id, volunteer_id, admin_identity, action, details)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(shift_id)
        .bind(volunteer_id)
        .bind(admin_identity)
        .bind(action)
        .bind(details)
        .execute(executor)
        .await?;

        Ok(())
    }
}
