//! Single-use action tokens. A token is an opaque capability tied to one
//! (shift, volunteer, action) tuple; consuming it must commit in the same
//! transaction as the shift mutation it authorizes.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use sqlx::{PgExecutor, PgPool};

use crate::models::{ActionToken, TokenAction};
use crate::{AppConfig, AppError, AppResult};

/// Cancel links ride along with the 24-hour reminder, so they get a short
/// fuse instead of the configured default.
pub const CANCEL_TOKEN_TTL_DAYS: i64 = 1;

/// 32 random bytes, URL-safe base64 without padding: 43 characters,
/// 256 bits of entropy.
pub fn new_token_string() -> String {
    let mut bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Deterministic URL construction; no side effects.
pub fn build_action_url(base_url: &str, token: &str) -> String {
    format!("{}/action/{}", base_url.trim_end_matches('/'), token)
}

/// Creates and persists a token. TTL defaults to the configured day count.
/// Collisions on the token string are vanishingly unlikely; regenerate and
/// retry if the unique index ever objects.
pub async fn issue(
    db: &PgPool,
    config: &AppConfig,
    shift_id: i32,
    volunteer_id: i32,
    action: TokenAction,
    ttl_days: Option<i64>,
    now: DateTime<Utc>,
) -> AppResult<ActionToken> {
    let days = ttl_days.unwrap_or(config.token_expiration_days);
    let expires_at = now + Duration::days(days);

    for _ in 0..3 {
        let token = new_token_string();
        let inserted = sqlx::query_as::<_, ActionToken>(
            r#"
            INSERT INTO "ActionTokens" (token, shift_id, volunteer_id, action, expires_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, token, shift_id, volunteer_id, action, expires_at, used_at, created_at
            "#,
        )
        .bind(&token)
        .bind(shift_id)
        .bind(volunteer_id)
        .bind(action)
        .bind(expires_at)
        .bind(now)
        .fetch_one(db)
        .await;

        match inserted {
            Ok(token) => return Ok(token),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                tracing::warn!(shift_id, volunteer_id, "action token collision, regenerating");
                continue;
            }
            Err(e) => return Err(e.into()),
        }
    }

    Err(AppError::Internal(
        "could not generate a unique action token".to_string(),
    ))
}

/// Exact-match lookup; the caller applies the validity check order
/// (exists, unused, unexpired).
pub async fn resolve(
    executor: impl PgExecutor<'_>,
    token: &str,
) -> AppResult<Option<ActionToken>> {
    let found = sqlx::query_as::<_, ActionToken>(
        r#"
        SELECT id, token, shift_id, volunteer_id, action, expires_at, used_at, created_at
        FROM "ActionTokens"
        WHERE token = $1
        "#,
    )
    .bind(token)
    .fetch_optional(executor)
    .await?;

    Ok(found)
}

/// Marks the token used. Must run inside the transaction that applies the
/// authorized shift mutation; a concurrent consumer loses the conditional
/// update and gets the already-used rejection.
pub async fn consume(
    executor: impl PgExecutor<'_>,
    token_id: i32,
    now: DateTime<Utc>,
) -> AppResult<()> {
    let result = sqlx::query(
        r#"UPDATE "ActionTokens" SET used_at = $1 WHERE id = $2 AND used_at IS NULL"#,
    )
    .bind(now)
    .bind(token_id)
    .execute(executor)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::LinkUsed("an earlier visit".to_string()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_strings_are_url_safe_and_long_enough() {
        let token = new_token_string();
        assert_eq!(token.len(), 43);
        assert!(token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn token_strings_do_not_repeat() {
        let a = new_token_string();
        let b = new_token_string();
        assert_ne!(a, b);
    }

    #[test]
    fn action_url_from_base() {
        assert_eq!(
            build_action_url("https://shifts.example.org", "abc123"),
            "https://shifts.example.org/action/abc123"
        );
    }

    #[test]
    fn action_url_trims_trailing_slash() {
        assert_eq!(
            build_action_url("https://shifts.example.org/", "abc123"),
            "https://shifts.example.org/action/abc123"
        );
    }
}
