use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};

use crate::{AppResult, AppState};

#[derive(Debug, Deserialize, IntoParams)]
pub struct GetAuditQuery {
    #[serde(rename = "shiftId")]
    pub shift_id: Option<i32>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize, FromRow, ToSchema)]
pub struct AuditEntryWithNames {
    pub id: i32,
    pub shift_id: Option<i32>,
    pub volunteer_id: Option<i32>,
    pub volunteer_name: Option<String>,
    pub admin_identity: Option<String>,
    pub action: String,
    pub details: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// GET /api/audit?shiftId=&limit= - audit trail, newest first
#[utoipa::path(
    get,
    path = "/api/audit",
    params(GetAuditQuery),
    responses(
        (status = 200, description = "Audit entries with volunteer names", body = Vec<AuditEntryWithNames>)
    ),
    tag = "audit",
    security(("admin_key" = []))
)]
pub async fn get_audit(
    State(state): State<Arc<AppState>>,
    Query(query): Query<GetAuditQuery>,
) -> AppResult<Json<Vec<AuditEntryWithNames>>> {
    let limit = query.limit.unwrap_or(200).clamp(1, 1000);

    let mut sql = r#"
        SELECT a.id, a.shift_id, a.volunteer_id, v.name AS volunteer_name,
               a.admin_identity, a.action, a.details, a.created_at
        FROM "AuditLog" a
        LEFT JOIN "Volunteers" v ON a.volunteer_id = v.id
        WHERE 1=1
    "#
    .to_string();

    if query.shift_id.is_some() {
        sql.push_str(" AND a.shift_id = $2");
    }
    sql.push_str(" ORDER BY a.created_at DESC LIMIT $1");

    let mut query_builder = sqlx::query_as::<_, AuditEntryWithNames>(&sql).bind(limit);
    if let Some(shift_id) = query.shift_id {
        query_builder = query_builder.bind(shift_id);
    }

    let entries = query_builder.fetch_all(&state.db).await?;

    tracing::debug!(count = entries.len(), "Fetched audit entries");
    Ok(Json(entries))
}
