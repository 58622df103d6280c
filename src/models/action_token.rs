use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema,
)]
#[sqlx(type_name = "token_action", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TokenAction {
    Confirm,
    Decline,
    Cancel,
    Request,
}

/// A capability granting one unauthenticated state change on one shift,
/// for one volunteer.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct ActionToken {
    pub id: i32,
    pub token: String,
    pub shift_id: i32,
    pub volunteer_id: i32,
    pub action: TokenAction,
    pub expires_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl ActionToken {
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.used_at.is_none() && self.expires_at > now
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn token(expires_at: DateTime<Utc>, used_at: Option<DateTime<Utc>>) -> ActionToken {
        ActionToken {
            id: 1,
            token: "t".to_string(),
            shift_id: 1,
            volunteer_id: 1,
            action: TokenAction::Confirm,
            expires_at,
            used_at,
            created_at: Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn valid_when_unused_and_unexpired() {
        let now = Utc.with_ymd_and_hms(2026, 2, 10, 12, 0, 0).unwrap();
        let expires = Utc.with_ymd_and_hms(2026, 2, 15, 0, 0, 0).unwrap();
        assert!(token(expires, None).is_valid_at(now));
    }

    #[test]
    fn invalid_once_used_or_expired() {
        let now = Utc.with_ymd_and_hms(2026, 2, 10, 12, 0, 0).unwrap();
        let expires = Utc.with_ymd_and_hms(2026, 2, 15, 0, 0, 0).unwrap();

        assert!(!token(expires, Some(now)).is_valid_at(now));
        assert!(!token(now, None).is_valid_at(now));
    }
}
