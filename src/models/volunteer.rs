use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Volunteer {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub is_active: bool,
    /// Backup-eligible volunteers are the first escalation audience when a
    /// shift reopens close to start time.
    pub is_backup: bool,
    pub created_at: DateTime<Utc>,
}
