use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;

use crate::{
    models::{ActionToken, AuditLogEntry, Shift, ShiftStatus, TokenAction},
    notify,
    shifts::{self, ShiftAction},
    tokens, AppError, AppResult, AppState,
};

#[derive(Debug, Serialize, ToSchema)]
pub struct ActionDescription {
    pub action: TokenAction,
    pub title: String,
    pub description: String,
    pub button_text: String,
    pub volunteer_name: String,
    pub shift_id: i32,
    pub shift_date: chrono::NaiveDate,
    pub slot_label: String,
    pub start_time: chrono::NaiveTime,
    pub role: crate::models::ShiftRole,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ActionOutcome {
    pub success: bool,
    pub title: String,
    pub message: String,
}

/// Validity check order is part of the contract: exists, then unused, then
/// unexpired, so a used-and-expired link still reads "already completed".
fn check_validity(token: &ActionToken, now: DateTime<Utc>) -> AppResult<()> {
    if let Some(used_at) = token.used_at {
        return Err(AppError::LinkUsed(
            used_at.format("%B %-d, %Y at %-I:%M %p").to_string(),
        ));
    }
    if token.expires_at <= now {
        return Err(AppError::LinkExpired);
    }
    Ok(())
}

fn action_copy(action: TokenAction) -> (&'static str, &'static str, &'static str) {
    match action {
        TokenAction::Confirm => (
            "Confirm Your Shift",
            "Please confirm that you will be able to work the shift below.",
            "Confirm Shift",
        ),
        TokenAction::Decline => (
            "Decline Shift",
            "If you cannot work this shift, please decline it so we can find coverage.",
            "Decline Shift",
        ),
        TokenAction::Cancel => (
            "Cancel Shift",
            "If you need to cancel your confirmed shift, we'll find a replacement.",
            "Cancel Shift",
        ),
        TokenAction::Request => (
            "Request Shift",
            "Request to volunteer for this open shift.",
            "Request Shift",
        ),
    }
}

/// GET /action/{token} - describe the pending action behind an emailed link
#[utoipa::path(
    get,
    path = "/action/{token}",
    params(("token" = String, Path, description = "Opaque action token")),
    responses(
        (status = 200, description = "Pending action details", body = ActionDescription),
        (status = 404, description = "Invalid link"),
        (status = 409, description = "Action already completed"),
        (status = 410, description = "Link expired")
    ),
    tag = "actions"
)]
pub async fn describe_action(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
) -> AppResult<Json<ActionDescription>> {
    let now = Utc::now();

    let token = tokens::resolve(&state.db, &token)
        .await?
        .ok_or(AppError::InvalidLink)?;
    check_validity(&token, now)?;

    let notice = notify::load_shift_notice(&state.db, token.shift_id).await?;
    let volunteer_name: String =
        sqlx::query_scalar(r#"SELECT name FROM "Volunteers" WHERE id = $1"#)
            .bind(token.volunteer_id)
            .fetch_one(&state.db)
            .await?;

    let (title, description, button_text) = action_copy(token.action);

    Ok(Json(ActionDescription {
        action: token.action,
        title: title.to_string(),
        description: description.to_string(),
        button_text: button_text.to_string(),
        volunteer_name,
        shift_id: notice.shift_id,
        shift_date: notice.date,
        slot_label: notice.slot_label,
        start_time: notice.start_time,
        role: notice.role,
    }))
}

/// POST /action/{token} - execute the pending action
///
/// Token consumption and the shift mutation it authorizes commit in one
/// transaction; a crash or conflict rolls back both.
#[utoipa::path(
    post,
    path = "/action/{token}",
    params(("token" = String, Path, description = "Opaque action token")),
    responses(
        (status = 200, description = "Action executed", body = ActionOutcome),
        (status = 404, description = "Invalid link"),
        (status = 409, description = "Already completed or shift state conflict"),
        (status = 410, description = "Link expired")
    ),
    tag = "actions"
)]
pub async fn execute_action(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
) -> AppResult<Json<ActionOutcome>> {
    let now = Utc::now();
    let mut tx = state.db.begin().await?;

    let token = tokens::resolve(&mut *tx, &token)
        .await?
        .ok_or(AppError::InvalidLink)?;
    check_validity(&token, now)?;

    // The shift row lock serializes concurrent actors; a double submit
    // queues here and the loser re-reads a token that is already used.
    let shift = sqlx::query_as::<_, Shift>(
        r#"
        SELECT id, date, time_slot_id, role, status, volunteer_id,
               backup1_volunteer_id, backup2_volunteer_id, assigned_at,
               confirmed_at, month_published_at, reminder_sent_7_days,
               reminder_sent_24_hours
        FROM "Shifts" WHERE id = $1 FOR UPDATE
        "#,
    )
    .bind(token.shift_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(AppError::InvalidLink)?;

    let volunteer_name: String =
        sqlx::query_scalar(r#"SELECT name FROM "Volunteers" WHERE id = $1"#)
            .bind(token.volunteer_id)
            .fetch_one(&mut *tx)
            .await?;

    let (title, message) = match token.action {
        TokenAction::Confirm => {
            shifts::apply(
                &shift,
                &ShiftAction::Confirm {
                    volunteer_id: token.volunteer_id,
                },
                now,
            )?;

            let result = sqlx::query(
                r#"
                UPDATE "Shifts" SET status = 'confirmed', confirmed_at = $1
                WHERE id = $2 AND status = 'assigned' AND volunteer_id = $3
                "#,
            )
            .bind(now)
            .bind(shift.id)
            .bind(token.volunteer_id)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                return Err(AppError::Conflict(
                    "This shift has been reassigned or is no longer available.".to_string(),
                ));
            }

            (
                "Shift Confirmed",
                "Thank you! Your shift has been confirmed. We'll send you a reminder 24 hours before.",
            )
        }

        TokenAction::Decline | TokenAction::Cancel => {
            shifts::apply(
                &shift,
                &ShiftAction::Decline {
                    volunteer_id: token.volunteer_id,
                },
                now,
            )?;

            let result = sqlx::query(
                r#"
                UPDATE "Shifts"
                SET status = 'open', volunteer_id = NULL, assigned_at = NULL, confirmed_at = NULL
                WHERE id = $1 AND volunteer_id = $2
                "#,
            )
            .bind(shift.id)
            .bind(token.volunteer_id)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                return Err(AppError::Conflict(
                    "This shift has already been reassigned.".to_string(),
                ));
            }

            if token.action == TokenAction::Decline {
                (
                    "Shift Declined",
                    "The shift has been released. Thank you for letting us know.",
                )
            } else {
                (
                    "Shift Cancelled",
                    "Your shift has been cancelled. We'll find a replacement.",
                )
            }
        }

        TokenAction::Request => {
            if shift.status != ShiftStatus::Open {
                return Err(AppError::Conflict(
                    "This slot is no longer available.".to_string(),
                ));
            }

            let inserted = sqlx::query(
                r#"
                INSERT INTO "ShiftRequests" (shift_id, volunteer_id, requested_slot, status, requested_at)
                VALUES ($1, $2, 'primary', 'pending', $3)
                "#,
            )
            .bind(shift.id)
            .bind(token.volunteer_id)
            .bind(now)
            .execute(&mut *tx)
            .await;

            match inserted {
                Ok(_) => {}
                Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                    return Err(AppError::Conflict(
                        "You have already requested this slot.".to_string(),
                    ));
                }
                Err(e) => return Err(e.into()),
            }

            (
                "Request Submitted",
                "Your request has been submitted for review.",
            )
        }
    };

    // Consumed only after the authorized mutation succeeded; both commit
    // together or the transaction rolls back both.
    tokens::consume(&mut *tx, token.id, now).await?;

    AuditLogEntry::record(
        &mut *tx,
        Some(shift.id),
        Some(token.volunteer_id),
        None,
        &format!("Token Action: {:?}", token.action),
        &format!(
            "{} used {:?} token for {}",
            volunteer_name,
            token.action,
            shift.date.format("%b %-d")
        ),
    )
    .await?;

    tx.commit().await?;

    tracing::info!(
        shift_id = shift.id,
        volunteer_id = token.volunteer_id,
        action = ?token.action,
        "token action executed"
    );

    Ok(Json(ActionOutcome {
        success: true,
        title: title.to_string(),
        message: message.to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn token_at(
        used_at: Option<DateTime<Utc>>,
        expires_at: DateTime<Utc>,
    ) -> ActionToken {
        ActionToken {
            id: 1,
            token: "tok".to_string(),
            shift_id: 1,
            volunteer_id: 1,
            action: TokenAction::Confirm,
            expires_at,
            used_at,
            created_at: Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn validity_passes_for_live_token() {
        let now = Utc.with_ymd_and_hms(2026, 2, 10, 0, 0, 0).unwrap();
        let expires = Utc.with_ymd_and_hms(2026, 2, 20, 0, 0, 0).unwrap();
        assert!(check_validity(&token_at(None, expires), now).is_ok());
    }

    #[test]
    fn used_is_reported_before_expired() {
        let now = Utc.with_ymd_and_hms(2026, 2, 10, 0, 0, 0).unwrap();
        let expired = Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap();
        let used = Utc.with_ymd_and_hms(2026, 1, 30, 9, 30, 0).unwrap();

        let err = check_validity(&token_at(Some(used), expired), now).unwrap_err();
        assert!(matches!(err, AppError::LinkUsed(_)));
    }

    #[test]
    fn expired_reported_for_unused_token() {
        let now = Utc.with_ymd_and_hms(2026, 2, 10, 0, 0, 0).unwrap();
        let expired = Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap();

        let err = check_validity(&token_at(None, expired), now).unwrap_err();
        assert!(matches!(err, AppError::LinkExpired));
    }

    #[test]
    fn copy_is_action_specific() {
        let (title, _, button) = action_copy(TokenAction::Cancel);
        assert_eq!(title, "Cancel Shift");
        assert_eq!(button, "Cancel Shift");
        let (title, _, _) = action_copy(TokenAction::Confirm);
        assert_eq!(title, "Confirm Your Shift");
    }
}
