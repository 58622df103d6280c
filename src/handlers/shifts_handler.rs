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
    jobs,
    models::{
        AssignShiftInput, AuditLogEntry, OpenShiftSlot, PublishMonthInput, PublishMonthResponse,
        ReleaseShiftInput, Shift, ShiftMutationResponse, ShiftRole, ShiftStatus, ShiftWithSlot,
        SlotType,
    },
    shifts::{self, ShiftAction},
    AppError, AppResult, AppState,
};

const SHIFT_COLUMNS: &str = r#"
    id, date, time_slot_id, role, status, volunteer_id,
    backup1_volunteer_id, backup2_volunteer_id, assigned_at, confirmed_at,
    month_published_at, reminder_sent_7_days, reminder_sent_24_hours
"#;

#[derive(Debug, Deserialize, IntoParams)]
pub struct GetOpenShiftsQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

#[derive(Debug, FromRow)]
struct OpenShiftRow {
    shift_id: i32,
    date: NaiveDate,
    time_slot_id: i32,
    slot_label: String,
    start_time: NaiveTime,
    role: ShiftRole,
    status: ShiftStatus,
    volunteer_id: Option<i32>,
    backup1_volunteer_id: Option<i32>,
    backup2_volunteer_id: Option<i32>,
}

/// GET /api/shifts/open?from=&to= - shifts with at least one free slot
#[utoipa::path(
    get,
    path = "/api/shifts/open",
    params(GetOpenShiftsQuery),
    responses(
        (status = 200, description = "Shifts with free slots in the window", body = Vec<OpenShiftSlot>)
    ),
    tag = "shifts"
)]
pub async fn get_open_shifts(
    State(state): State<Arc<AppState>>,
    Query(query): Query<GetOpenShiftsQuery>,
) -> AppResult<Json<Vec<OpenShiftSlot>>> {
    let today = Utc::now().date_naive();
    let from = query.from.unwrap_or(today).max(today);
    let to = query.to.unwrap_or(from + chrono::Duration::days(60));

    let rows = sqlx::query_as::<_, OpenShiftRow>(
        r#"
        SELECT s.id AS shift_id, s.date, s.time_slot_id, t.label AS slot_label,
               t.start_time, s.role, s.status, s.volunteer_id,
               s.backup1_volunteer_id, s.backup2_volunteer_id
        FROM "Shifts" s
        INNER JOIN "TimeSlots" t ON s.time_slot_id = t.id
        WHERE s.date >= $1 AND s.date <= $2 AND t.is_active
          AND (s.volunteer_id IS NULL
               OR s.backup1_volunteer_id IS NULL
               OR s.backup2_volunteer_id IS NULL)
        ORDER BY s.date, t.sort_order
        "#,
    )
    .bind(from)
    .bind(to)
    .fetch_all(&state.db)
    .await?;

    let listings = rows
        .into_iter()
        .map(|row| {
            let mut open_slots = Vec::new();
            if row.volunteer_id.is_none() {
                open_slots.push(SlotType::Primary);
            }
            if row.backup1_volunteer_id.is_none() {
                open_slots.push(SlotType::Backup1);
            }
            if row.backup2_volunteer_id.is_none() {
                open_slots.push(SlotType::Backup2);
            }
            OpenShiftSlot {
                shift_id: row.shift_id,
                date: row.date,
                time_slot_id: row.time_slot_id,
                slot_label: row.slot_label,
                start_time: row.start_time,
                role: row.role,
                status: row.status,
                open_slots,
            }
        })
        .collect();

    Ok(Json(listings))
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct GetShiftsQuery {
    pub year: i32,
    pub month: u32,
}

#[derive(Debug, FromRow)]
struct ShiftWithSlotRow {
    id: i32,
    date: NaiveDate,
    time_slot_id: i32,
    role: ShiftRole,
    status: ShiftStatus,
    volunteer_id: Option<i32>,
    backup1_volunteer_id: Option<i32>,
    backup2_volunteer_id: Option<i32>,
    assigned_at: Option<chrono::DateTime<Utc>>,
    confirmed_at: Option<chrono::DateTime<Utc>>,
    month_published_at: Option<chrono::DateTime<Utc>>,
    reminder_sent_7_days: bool,
    reminder_sent_24_hours: bool,
    slot_label: String,
    start_time: NaiveTime,
    duration_minutes: i32,
    volunteer_name: Option<String>,
    backup1_name: Option<String>,
    backup2_name: Option<String>,
}

/// GET /api/shifts?year=&month= - admin month view
#[utoipa::path(
    get,
    path = "/api/shifts",
    params(GetShiftsQuery),
    responses(
        (status = 200, description = "Shifts for the month with slot and volunteer context", body = Vec<ShiftWithSlot>),
        (status = 400, description = "Invalid month")
    ),
    tag = "shifts",
    security(("admin_key" = []))
)]
pub async fn get_shifts_for_month(
    State(state): State<Arc<AppState>>,
    Query(query): Query<GetShiftsQuery>,
) -> AppResult<Json<Vec<ShiftWithSlot>>> {
    let first_day = NaiveDate::from_ymd_opt(query.year, query.month, 1)
        .ok_or_else(|| AppError::BadRequest(format!("Invalid month {}-{}", query.year, query.month)))?;
    let last_day = first_day + chrono::Months::new(1) - chrono::Duration::days(1);

    let rows = sqlx::query_as::<_, ShiftWithSlotRow>(
        r#"
        SELECT s.id, s.date, s.time_slot_id, s.role, s.status, s.volunteer_id,
               s.backup1_volunteer_id, s.backup2_volunteer_id, s.assigned_at,
               s.confirmed_at, s.month_published_at, s.reminder_sent_7_days,
               s.reminder_sent_24_hours,
               t.label AS slot_label, t.start_time, t.duration_minutes,
               v.name AS volunteer_name,
               b1.name AS backup1_name,
               b2.name AS backup2_name
        FROM "Shifts" s
        INNER JOIN "TimeSlots" t ON s.time_slot_id = t.id
        LEFT JOIN "Volunteers" v ON s.volunteer_id = v.id
        LEFT JOIN "Volunteers" b1 ON s.backup1_volunteer_id = b1.id
        LEFT JOIN "Volunteers" b2 ON s.backup2_volunteer_id = b2.id
        WHERE s.date >= $1 AND s.date <= $2
        ORDER BY s.date, t.sort_order
        "#,
    )
    .bind(first_day)
    .bind(last_day)
    .fetch_all(&state.db)
    .await?;

    let shifts = rows
        .into_iter()
        .map(|row| ShiftWithSlot {
            shift: Shift {
                id: row.id,
                date: row.date,
                time_slot_id: row.time_slot_id,
                role: row.role,
                status: row.status,
                volunteer_id: row.volunteer_id,
                backup1_volunteer_id: row.backup1_volunteer_id,
                backup2_volunteer_id: row.backup2_volunteer_id,
                assigned_at: row.assigned_at,
                confirmed_at: row.confirmed_at,
                month_published_at: row.month_published_at,
                reminder_sent_7_days: row.reminder_sent_7_days,
                reminder_sent_24_hours: row.reminder_sent_24_hours,
            },
            slot_label: row.slot_label,
            start_time: row.start_time,
            duration_minutes: row.duration_minutes,
            volunteer_name: row.volunteer_name,
            backup1_name: row.backup1_name,
            backup2_name: row.backup2_name,
        })
        .collect();

    Ok(Json(shifts))
}

/// POST /api/shifts/{id}/assign - admin places a volunteer in a slot
#[utoipa::path(
    post,
    path = "/api/shifts/{id}/assign",
    params(("id" = i32, Path, description = "Shift ID")),
    request_body = AssignShiftInput,
    responses(
        (status = 200, description = "Volunteer assigned", body = ShiftMutationResponse),
        (status = 404, description = "Shift or volunteer not found"),
        (status = 409, description = "Slot occupied or volunteer already on shift")
    ),
    tag = "shifts",
    security(("admin_key" = []))
)]
pub async fn assign_shift(
    State(state): State<Arc<AppState>>,
    Path(shift_id): Path<i32>,
    Json(input): Json<AssignShiftInput>,
) -> AppResult<Json<ShiftMutationResponse>> {
    let now = Utc::now();
    let mut tx = state.db.begin().await?;

    let shift = sqlx::query_as::<_, Shift>(&format!(
        r#"SELECT {SHIFT_COLUMNS} FROM "Shifts" WHERE id = $1 FOR UPDATE"#
    ))
    .bind(shift_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Shift {shift_id} not found")))?;

    let volunteer_name: Option<String> =
        sqlx::query_scalar(r#"SELECT name FROM "Volunteers" WHERE id = $1"#)
            .bind(input.volunteer_id)
            .fetch_optional(&mut *tx)
            .await?;
    let volunteer_name = volunteer_name
        .ok_or_else(|| AppError::NotFound(format!("Volunteer {} not found", input.volunteer_id)))?;

    shifts::apply(
        &shift,
        &ShiftAction::Assign {
            volunteer_id: input.volunteer_id,
            slot: input.slot,
        },
        now,
    )?;

    let result = match input.slot {
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
            .bind(input.volunteer_id)
            .bind(now)
            .bind(shift_id)
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
            .bind(input.volunteer_id)
            .bind(shift_id)
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
            .bind(input.volunteer_id)
            .bind(shift_id)
            .execute(&mut *tx)
            .await?
        }
    };

    if result.rows_affected() == 0 {
        return Err(AppError::Conflict(
            "This slot is no longer available.".to_string(),
        ));
    }

    AuditLogEntry::record(
        &mut *tx,
        Some(shift_id),
        Some(input.volunteer_id),
        input.admin.as_deref(),
        "Volunteer Assigned",
        &format!(
            "{} assigned as {} for {}",
            volunteer_name,
            input.slot.label(),
            shift.date.format("%b %-d")
        ),
    )
    .await?;

    tx.commit().await?;

    tracing::info!(
        shift_id,
        volunteer_id = input.volunteer_id,
        slot = ?input.slot,
        "volunteer assigned by admin"
    );

    Ok(Json(ShiftMutationResponse {
        success: true,
        shift_id: Some(shift_id),
        message: Some(format!(
            "{} assigned as {}.",
            volunteer_name,
            input.slot.label()
        )),
    }))
}

/// POST /api/shifts/{id}/release - admin vacates the primary slot
#[utoipa::path(
    post,
    path = "/api/shifts/{id}/release",
    params(("id" = i32, Path, description = "Shift ID")),
    request_body = ReleaseShiftInput,
    responses(
        (status = 200, description = "Primary slot vacated", body = ShiftMutationResponse),
        (status = 404, description = "Shift not found"),
        (status = 409, description = "Shift has no assigned volunteer")
    ),
    tag = "shifts",
    security(("admin_key" = []))
)]
pub async fn release_shift(
    State(state): State<Arc<AppState>>,
    Path(shift_id): Path<i32>,
    Json(input): Json<ReleaseShiftInput>,
) -> AppResult<Json<ShiftMutationResponse>> {
    let mut tx = state.db.begin().await?;

    let shift = sqlx::query_as::<_, Shift>(&format!(
        r#"SELECT {SHIFT_COLUMNS} FROM "Shifts" WHERE id = $1 FOR UPDATE"#
    ))
    .bind(shift_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Shift {shift_id} not found")))?;

    let previous = shift.volunteer_id.ok_or_else(|| {
        AppError::Conflict("This shift has no assigned volunteer.".to_string())
    })?;

    shifts::apply(
        &shift,
        &ShiftAction::Decline {
            volunteer_id: previous,
        },
        Utc::now(),
    )?;

    let result = sqlx::query(
        r#"
        UPDATE "Shifts"
        SET status = 'open', volunteer_id = NULL, assigned_at = NULL, confirmed_at = NULL
        WHERE id = $1 AND volunteer_id = $2
        "#,
    )
    .bind(shift_id)
    .bind(previous)
    .execute(&mut *tx)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::Conflict(
            "This shift has already been reassigned.".to_string(),
        ));
    }

    AuditLogEntry::record(
        &mut *tx,
        Some(shift_id),
        Some(previous),
        input.admin.as_deref(),
        "Shift Released",
        &format!(
            "Primary slot vacated by admin for {}",
            shift.date.format("%b %-d")
        ),
    )
    .await?;

    tx.commit().await?;

    tracing::info!(shift_id, previous_volunteer = previous, "shift released by admin");

    Ok(Json(ShiftMutationResponse {
        success: true,
        shift_id: Some(shift_id),
        message: Some("Shift released.".to_string()),
    }))
}

/// POST /api/months/publish - stamp publication and email assignments
#[utoipa::path(
    post,
    path = "/api/months/publish",
    request_body = PublishMonthInput,
    responses(
        (status = 200, description = "Month published, assignment emails sent", body = PublishMonthResponse),
        (status = 400, description = "Invalid month")
    ),
    tag = "shifts",
    security(("admin_key" = []))
)]
pub async fn publish_month(
    State(state): State<Arc<AppState>>,
    Json(input): Json<PublishMonthInput>,
) -> AppResult<Json<PublishMonthResponse>> {
    let now = Utc::now();
    let outcome = jobs::publish::publish_month(
        &state.db,
        state.notifier.as_ref(),
        &state.config,
        input.year,
        input.month,
        now,
    )
    .await?;

    Ok(Json(PublishMonthResponse {
        success: true,
        shifts_published: outcome.shifts_published,
        volunteers_notified: outcome.volunteers_notified,
        notification_failures: outcome.notification_failures,
    }))
}
