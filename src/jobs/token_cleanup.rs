use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::AppResult;

/// Deletes tokens that can never be presented again: expired, or already
/// consumed. Returns the number removed.
pub async fn cleanup_expired_tokens(db: &PgPool, now: DateTime<Utc>) -> AppResult<u64> {
    let removed = sqlx::query(
        r#"DELETE FROM "ActionTokens" WHERE expires_at < $1 OR used_at IS NOT NULL"#,
    )
    .bind(now)
    .execute(db)
    .await?
    .rows_affected();

    if removed > 0 {
        tracing::info!(removed, "Cleaned up expired action tokens");
    }

    Ok(removed)
}
