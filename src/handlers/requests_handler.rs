use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{NaiveDate, NaiveTime, Utc};
use serde::Deserialize;
use sqlx::FromRow;
use std::sync::Arc;
use utoipa::IntoParams;

use crate::{
    models::{
        AuditLogEntry, RequestMutationResponse, RequestStatus, ResolveRequestInput, Shift,
        ShiftRequest, ShiftRequestWithDetails, ShiftRole, SlotType, SubmitShiftRequestInput,
        TokenAction, Volunteer,
    },
    notify::{self, ApprovalNotice, ConfirmActions},
    shifts::{self, ShiftAction, TransitionError},
    tokens, AppError, AppResult, AppState,
};

const SHIFT_COLUMNS: &str = r#"
    id, date, time_slot_id, role, status, volunteer_id,
    backup1_volunteer_id, backup2_volunteer_id, assigned_at, confirmed_at,
    month_published_at, reminder_sent_7_days, reminder_sent_24_hours
"#;

fn validate_email(email: &str) -> AppResult<()> {
    let trimmed = email.trim();
    let valid = trimmed.len() >= 5
        && trimmed.split_once('@').is_some_and(|(local, domain)| {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.')
        })
        && !trimmed.contains(char::is_whitespace);

    if valid {
        Ok(())
    } else {
        Err(AppError::Validation(format!(
            "'{trimmed}' is not a valid email address"
        )))
    }
}

/// Find the target shift, creating it lazily for a known (date, time slot)
/// pair. Shifts come into existence either by bulk generation or on first
/// volunteer interaction; this is the second path.
async fn resolve_target_shift(
    db: &sqlx::PgPool,
    input: &SubmitShiftRequestInput,
) -> AppResult<Shift> {
    if let Some(shift_id) = input.shift_id {
        let shift = sqlx::query_as::<_, Shift>(&format!(
            r#"SELECT {SHIFT_COLUMNS} FROM "Shifts" WHERE id = $1"#
        ))
        .bind(shift_id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Shift {shift_id} not found")))?;
        return Ok(shift);
    }

    let (date, time_slot_id) = match (input.date, input.time_slot_id) {
        (Some(date), Some(slot)) => (date, slot),
        _ => {
            return Err(AppError::BadRequest(
                "Provide shift_id, or date and time_slot_id".to_string(),
            ))
        }
    };

    let slot_exists: bool =
        sqlx::query_scalar(r#"SELECT EXISTS(SELECT 1 FROM "TimeSlots" WHERE id = $1)"#)
            .bind(time_slot_id)
            .fetch_one(db)
            .await?;
    if !slot_exists {
        return Err(AppError::NotFound(format!(
            "Time slot {time_slot_id} not found"
        )));
    }

    // Two racing submitters can both attempt the insert; the unique
    // (date, time_slot_id) constraint lets exactly one win and the other
    // falls through to the select.
    let inserted = sqlx::query_as::<_, Shift>(&format!(
        r#"
        INSERT INTO "Shifts" (date, time_slot_id, role, status)
        VALUES ($1, $2, 'in_person', 'open')
        ON CONFLICT (date, time_slot_id) DO NOTHING
        RETURNING {SHIFT_COLUMNS}
        "#
    ))
    .bind(date)
    .bind(time_slot_id)
    .fetch_optional(db)
    .await?;

    if let Some(shift) = inserted {
        tracing::debug!(shift_id = shift.id, %date, time_slot_id, "created shift lazily");
        return Ok(shift);
    }

    let shift = sqlx::query_as::<_, Shift>(&format!(
        r#"SELECT {SHIFT_COLUMNS} FROM "Shifts" WHERE date = $1 AND time_slot_id = $2"#
    ))
    .bind(date)
    .bind(time_slot_id)
    .fetch_one(db)
    .await?;

    Ok(shift)
}

/// Resolve-or-create a volunteer by case-insensitive email, refreshing
/// name/phone when supplied.
async fn resolve_volunteer(
    db: &sqlx::PgPool,
    name: &str,
    email: &str,
    phone: Option<&str>,
) -> AppResult<Volunteer> {
    let existing = sqlx::query_as::<_, Volunteer>(
        r#"
        SELECT id, name, email, phone, is_active, is_backup, created_at
        FROM "Volunteers" WHERE LOWER(email) = LOWER($1)
        "#,
    )
    .bind(email)
    .fetch_optional(db)
    .await?;

    if let Some(volunteer) = existing {
        let updated = sqlx::query_as::<_, Volunteer>(
            r#"
            UPDATE "Volunteers"
            SET name = COALESCE(NULLIF($2, ''), name),
                phone = COALESCE($3, phone)
            WHERE id = $1
            RETURNING id, name, email, phone, is_active, is_backup, created_at
            "#,
        )
        .bind(volunteer.id)
        .bind(name)
        .bind(phone)
        .fetch_one(db)
        .await?;
        return Ok(updated);
    }

    let inserted = sqlx::query_as::<_, Volunteer>(
        r#"
        INSERT INTO "Volunteers" (name, email, phone)
        VALUES ($1, $2, $3)
        RETURNING id, name, email, phone, is_active, is_backup, created_at
        "#,
    )
    .bind(name)
    .bind(email)
    .bind(phone)
    .fetch_one(db)
    .await;

    match inserted {
        Ok(volunteer) => Ok(volunteer),
        // Lost a race with a concurrent first-time submission; the row
        // exists now.
        Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
            let volunteer = sqlx::query_as::<_, Volunteer>(
                r#"
                SELECT id, name, email, phone, is_active, is_backup, created_at
                FROM "Volunteers" WHERE LOWER(email) = LOWER($1)
                "#,
            )
            .bind(email)
            .fetch_one(db)
            .await?;
            Ok(volunteer)
        }
        Err(e) => Err(e.into()),
    }
}

/// POST /api/requests - volunteer self-service request for a slot
#[utoipa::path(
    post,
    path = "/api/requests",
    request_body = SubmitShiftRequestInput,
    responses(
        (status = 200, description = "Pending request created", body = RequestMutationResponse),
        (status = 404, description = "Shift or time slot not found"),
        (status = 409, description = "Slot occupied or duplicate pending request"),
        (status = 422, description = "Invalid volunteer details")
    ),
    tag = "requests"
)]
pub async fn submit_request(
    State(state): State<Arc<AppState>>,
    Json(input): Json<SubmitShiftRequestInput>,
) -> AppResult<Json<RequestMutationResponse>> {
    let now = Utc::now();

    if input.name.trim().is_empty() {
        return Err(AppError::Validation("Name is required".to_string()));
    }
    validate_email(&input.email)?;

    let shift = resolve_target_shift(&state.db, &input).await?;

    // Checked against current state, not a cached page view.
    if !shift.slot_is_free(input.slot) {
        return Err(AppError::Conflict(
            "This slot is no longer available.".to_string(),
        ));
    }

    let volunteer = resolve_volunteer(
        &state.db,
        input.name.trim(),
        input.email.trim(),
        input.phone.as_deref(),
    )
    .await?;

    if shift.holds_volunteer(volunteer.id) {
        return Err(AppError::Conflict(
            "This volunteer already holds a slot on this shift.".to_string(),
        ));
    }

    // Friendly duplicate check; the pending partial unique index is the
    // authoritative guard below.
    let already_pending: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM "ShiftRequests"
            WHERE shift_id = $1 AND volunteer_id = $2 AND requested_slot = $3
              AND status = 'pending'
        )
        "#,
    )
    .bind(shift.id)
    .bind(volunteer.id)
    .bind(input.slot)
    .fetch_one(&state.db)
    .await?;

    if already_pending {
        return Err(AppError::Conflict(
            "You have already requested this slot.".to_string(),
        ));
    }

    let mut tx = state.db.begin().await?;

    let request_id: i32 = match sqlx::query_scalar::<_, i32>(
        r#"
        INSERT INTO "ShiftRequests" (shift_id, volunteer_id, requested_slot, status, requested_at)
        VALUES ($1, $2, $3, 'pending', $4)
        RETURNING id
        "#,
    )
    .bind(shift.id)
    .bind(volunteer.id)
    .bind(input.slot)
    .bind(now)
    .fetch_one(&mut *tx)
    .await
    {
        Ok(id) => id,
        Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
            return Err(AppError::Conflict(
                "You have already requested this slot.".to_string(),
            ));
        }
        Err(e) => return Err(e.into()),
    };

    AuditLogEntry::record(
        &mut *tx,
        Some(shift.id),
        Some(volunteer.id),
        None,
        "Shift Requested",
        &format!(
            "{} requested {} slot on {}",
            volunteer.name,
            input.slot.label(),
            shift.date.format("%b %-d")
        ),
    )
    .await?;

    tx.commit().await?;

    tracing::info!(
        request_id,
        shift_id = shift.id,
        volunteer_id = volunteer.id,
        slot = ?input.slot,
        "shift request submitted"
    );

    // Best-effort courtesy email; the request stands even if it fails.
    let notification_sent = match notify::load_shift_notice(&state.db, shift.id).await {
        Ok(notice) => match state.notifier.send_request_received(&volunteer, &notice).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, email = %volunteer.email, "request-received email failed");
                false
            }
        },
        Err(e) => {
            tracing::warn!(error = %e, shift_id = shift.id, "could not build notice for request-received email");
            false
        }
    };

    Ok(Json(RequestMutationResponse {
        success: true,
        request_id: Some(request_id),
        message: Some("Request submitted for review.".to_string()),
        notification_sent: Some(notification_sent),
    }))
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct GetRequestsQuery {
    pub status: Option<RequestStatus>,
}

#[derive(Debug, FromRow)]
struct RequestRow {
    id: i32,
    shift_id: i32,
    volunteer_id: i32,
    requested_slot: SlotType,
    status: RequestStatus,
    requested_at: chrono::DateTime<Utc>,
    resolved_at: Option<chrono::DateTime<Utc>>,
    resolved_by: Option<String>,
    shift_date: NaiveDate,
    slot_label: String,
    start_time: NaiveTime,
    role: ShiftRole,
    volunteer_name: String,
    volunteer_email: String,
}

fn row_to_details(row: RequestRow) -> ShiftRequestWithDetails {
    ShiftRequestWithDetails {
        request: ShiftRequest {
            id: row.id,
            shift_id: row.shift_id,
            volunteer_id: row.volunteer_id,
            requested_slot: row.requested_slot,
            status: row.status,
            requested_at: row.requested_at,
            resolved_at: row.resolved_at,
            resolved_by: row.resolved_by,
        },
        shift_date: row.shift_date,
        slot_label: row.slot_label,
        start_time: row.start_time,
        role: row.role,
        volunteer_name: row.volunteer_name,
        volunteer_email: row.volunteer_email,
    }
}

/// GET /api/requests?status= - admin triage listing (defaults to pending)
#[utoipa::path(
    get,
    path = "/api/requests",
    params(GetRequestsQuery),
    responses(
        (status = 200, description = "Requests with shift and volunteer context", body = Vec<ShiftRequestWithDetails>)
    ),
    tag = "requests",
    security(("admin_key" = []))
)]
pub async fn get_requests(
    State(state): State<Arc<AppState>>,
    Query(query): Query<GetRequestsQuery>,
) -> AppResult<Json<Vec<ShiftRequestWithDetails>>> {
    let status = query.status.unwrap_or(RequestStatus::Pending);

    let rows = sqlx::query_as::<_, RequestRow>(
        r#"
        SELECT sr.id, sr.shift_id, sr.volunteer_id, sr.requested_slot, sr.status,
               sr.requested_at, sr.resolved_at, sr.resolved_by,
               s.date AS shift_date, t.label AS slot_label, t.start_time, s.role,
               v.name AS volunteer_name, v.email AS volunteer_email
        FROM "ShiftRequests" sr
        INNER JOIN "Shifts" s ON sr.shift_id = s.id
        INNER JOIN "TimeSlots" t ON s.time_slot_id = t.id
        INNER JOIN "Volunteers" v ON sr.volunteer_id = v.id
        WHERE sr.status = $1
        ORDER BY sr.requested_at DESC
        "#,
    )
    .bind(status)
    .fetch_all(&state.db)
    .await
    .map_err(|e| {
        tracing::error!(error = %e, "Failed to fetch shift requests");
        e
    })?;

    tracing::debug!(count = rows.len(), ?status, "Fetched shift requests");
    Ok(Json(rows.into_iter().map(row_to_details).collect()))
}

/// POST /api/requests/{id}/resolve - approve or reject a pending request
///
/// Approval re-validates slot availability inside the transaction; a slot
/// taken since submission fails with a conflict and the request stays
/// Pending for manual re-triage.
#[utoipa::path(
    post,
    path = "/api/requests/{id}/resolve",
    params(("id" = i32, Path, description = "Shift request ID")),
    request_body = ResolveRequestInput,
    responses(
        (status = 200, description = "Request resolved", body = RequestMutationResponse),
        (status = 404, description = "Request not found"),
        (status = 409, description = "Request already resolved or slot no longer available")
    ),
    tag = "requests",
    security(("admin_key" = []))
)]
pub async fn resolve_request(
    State(state): State<Arc<AppState>>,
    Path(request_id): Path<i32>,
    Json(input): Json<ResolveRequestInput>,
) -> AppResult<Json<RequestMutationResponse>> {
    let now = Utc::now();
    let admin = input.resolved_by.as_deref();

    let mut tx = state.db.begin().await?;

    let request = sqlx::query_as::<_, ShiftRequest>(
        r#"
        SELECT id, shift_id, volunteer_id, requested_slot, status, requested_at,
               resolved_at, resolved_by
        FROM "ShiftRequests" WHERE id = $1 FOR UPDATE
        "#,
    )
    .bind(request_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Request {request_id} not found")))?;

    if request.status != RequestStatus::Pending {
        return Err(AppError::Conflict(
            "This request has already been resolved.".to_string(),
        ));
    }

    let volunteer = sqlx::query_as::<_, Volunteer>(
        r#"
        SELECT id, name, email, phone, is_active, is_backup, created_at
        FROM "Volunteers" WHERE id = $1
        "#,
    )
    .bind(request.volunteer_id)
    .fetch_one(&mut *tx)
    .await?;

    if input.approve {
        let shift = sqlx::query_as::<_, Shift>(&format!(
            r#"SELECT {SHIFT_COLUMNS} FROM "Shifts" WHERE id = $1 FOR UPDATE"#
        ))
        .bind(request.shift_id)
        .fetch_one(&mut *tx)
        .await?;

        shifts::apply(
            &shift,
            &ShiftAction::Assign {
                volunteer_id: request.volunteer_id,
                slot: request.requested_slot,
            },
            now,
        )
        .map_err(|err| match err {
            TransitionError::SlotUnavailable => {
                AppError::Conflict("This slot is no longer available.".to_string())
            }
            other => other.into(),
        })?;

        // Commit-time re-check: the predicate re-asserts availability and
        // slot distinctness, so a race with another approval or a manual
        // assignment leaves rows_affected at zero.
        let result = match request.requested_slot {
            SlotType::Primary => {
                sqlx::query(
                    r#"
                    UPDATE "Shifts"
                    SET volunteer_id = $1, status = 'assigned', assigned_at = $2
                    WHERE id = $3 AND volunteer_id IS NULL AND status = 'open'
                      AND backup1_volunteer_id IS DISTINCT FROM $1
                      AND backup2_volunteer_id IS DISTINCT FROM $1
                    "#,
                )
                .bind(request.volunteer_id)
                .bind(now)
                .bind(request.shift_id)
                .execute(&mut *tx)
                .await?
            }
            SlotType::Backup1 => {
                sqlx::query(
                    r#"
                    UPDATE "Shifts"
                    SET backup1_volunteer_id = $1
                    WHERE id = $2 AND backup1_volunteer_id IS NULL
                      AND volunteer_id IS DISTINCT FROM $1
                      AND backup2_volunteer_id IS DISTINCT FROM $1
                    "#,
                )
                .bind(request.volunteer_id)
                .bind(request.shift_id)
                .execute(&mut *tx)
                .await?
            }
            SlotType::Backup2 => {
                sqlx::query(
                    r#"
                    UPDATE "Shifts"
                    SET backup2_volunteer_id = $1
                    WHERE id = $2 AND backup2_volunteer_id IS NULL
                      AND volunteer_id IS DISTINCT FROM $1
                      AND backup1_volunteer_id IS DISTINCT FROM $1
                    "#,
                )
                .bind(request.volunteer_id)
                .bind(request.shift_id)
                .execute(&mut *tx)
                .await?
            }
        };

        if result.rows_affected() == 0 {
            return Err(AppError::Conflict(
                "This slot is no longer available.".to_string(),
            ));
        }

        sqlx::query(
            r#"
            UPDATE "ShiftRequests"
            SET status = 'approved', resolved_at = $1, resolved_by = $2
            WHERE id = $3
            "#,
        )
        .bind(now)
        .bind(admin)
        .bind(request_id)
        .execute(&mut *tx)
        .await?;

        AuditLogEntry::record(
            &mut *tx,
            Some(request.shift_id),
            Some(request.volunteer_id),
            admin,
            "Shift Request Approved",
            &format!(
                "Approved {} request from {} for {}",
                request.requested_slot.label(),
                volunteer.name,
                shift.date.format("%b %-d")
            ),
        )
        .await?;
    } else {
        sqlx::query(
            r#"
            UPDATE "ShiftRequests"
            SET status = 'rejected', resolved_at = $1, resolved_by = $2
            WHERE id = $3
            "#,
        )
        .bind(now)
        .bind(admin)
        .bind(request_id)
        .execute(&mut *tx)
        .await?;

        AuditLogEntry::record(
            &mut *tx,
            Some(request.shift_id),
            Some(request.volunteer_id),
            admin,
            "Shift Request Rejected",
            &format!("Rejected request from {}", volunteer.name),
        )
        .await?;
    }

    tx.commit().await?;

    tracing::info!(
        request_id,
        shift_id = request.shift_id,
        volunteer_id = request.volunteer_id,
        approve = input.approve,
        "shift request resolved"
    );

    // The decision is durable; the email is a courtesy.
    let notification_sent =
        notify_resolution(&state, &volunteer, &request, input.approve, now).await;

    let message = if input.approve {
        format!(
            "Request approved. {} has been assigned as {}.",
            volunteer.name,
            request.requested_slot.label()
        )
    } else {
        "Request rejected.".to_string()
    };

    Ok(Json(RequestMutationResponse {
        success: true,
        request_id: Some(request_id),
        message: Some(message),
        notification_sent: Some(notification_sent),
    }))
}

async fn notify_resolution(
    state: &AppState,
    volunteer: &Volunteer,
    request: &ShiftRequest,
    approved: bool,
    now: chrono::DateTime<Utc>,
) -> bool {
    let notice = match notify::load_shift_notice(&state.db, request.shift_id).await {
        Ok(notice) => notice,
        Err(e) => {
            tracing::warn!(error = %e, shift_id = request.shift_id, "could not build resolution notice");
            return false;
        }
    };

    let sent = if approved {
        let actions = if request.requested_slot == SlotType::Primary {
            match issue_confirm_decline(state, request.shift_id, volunteer.id, now).await {
                Ok(actions) => Some(actions),
                Err(e) => {
                    tracing::warn!(error = %e, "could not issue confirm/decline tokens");
                    None
                }
            }
        } else {
            None
        };

        let approval = ApprovalNotice {
            shift: notice,
            slot_label: request.requested_slot.label().to_string(),
            actions,
        };
        state.notifier.send_request_approved(volunteer, &approval).await
    } else {
        state.notifier.send_request_rejected(volunteer, &notice).await
    };

    match sent {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(
                error = %e,
                email = %volunteer.email,
                approved,
                "resolution email failed, but the decision stands"
            );
            false
        }
    }
}

async fn issue_confirm_decline(
    state: &AppState,
    shift_id: i32,
    volunteer_id: i32,
    now: chrono::DateTime<Utc>,
) -> AppResult<ConfirmActions> {
    let confirm = tokens::issue(
        &state.db,
        &state.config,
        shift_id,
        volunteer_id,
        TokenAction::Confirm,
        None,
        now,
    )
    .await?;
    let decline = tokens::issue(
        &state.db,
        &state.config,
        shift_id,
        volunteer_id,
        TokenAction::Decline,
        None,
        now,
    )
    .await?;

    Ok(ConfirmActions {
        confirm_url: tokens::build_action_url(&state.config.base_url, &confirm.token),
        decline_url: tokens::build_action_url(&state.config.base_url, &decline.token),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_ordinary_emails() {
        assert!(validate_email("pat@example.org").is_ok());
        assert!(validate_email(" pat.doe+shifts@mail.example.org ").is_ok());
    }

    #[test]
    fn rejects_malformed_emails() {
        assert!(validate_email("").is_err());
        assert!(validate_email("pat").is_err());
        assert!(validate_email("pat@").is_err());
        assert!(validate_email("@example.org").is_err());
        assert!(validate_email("pat@nodot").is_err());
        assert!(validate_email("pat doe@example.org").is_err());
    }
}
