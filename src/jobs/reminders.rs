//! The reminder and escalation sweep: three independent, idempotent,
//! time-windowed operations. Idempotency comes from the per-shift flags and
//! status each query filters on; an overlapping or repeated run simply finds
//! nothing left to do.

use chrono::{DateTime, Duration, Utc};
use metrics::counter;
use sqlx::PgPool;

use super::{assignment_notices, group_by_volunteer, AssignedShiftRow, ASSIGNED_SHIFT_SELECT};
use crate::models::{AuditLogEntry, TokenAction, Volunteer};
use crate::notify::Notifier;
use crate::{tokens, AppConfig, AppResult};

/// Shift starts within 23-25 hours of now: the 24-hour reminder window.
pub(crate) fn within_next_day_window(start: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    start >= now + Duration::hours(23) && start <= now + Duration::hours(25)
}

/// Shift starts within 24 hours and has not already started: the
/// auto-reopen window.
pub(crate) fn due_for_reopen(start: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    start > now && start <= now + Duration::hours(24)
}

/// Sends one consolidated reminder per volunteer for Assigned shifts whose
/// month was published at least 7 days ago. Returns the number of
/// volunteers reminded.
pub async fn send_seven_day_reminders(
    db: &PgPool,
    notifier: &dyn Notifier,
    config: &AppConfig,
    now: DateTime<Utc>,
) -> AppResult<u64> {
    tracing::info!("Starting 7-day reminder job");

    let seven_days_ago = now - Duration::days(7);
    let today = now.date_naive();

    let sql = format!(
        r#"
        {ASSIGNED_SHIFT_SELECT}
        WHERE s.status = 'assigned'
          AND s.month_published_at IS NOT NULL
          AND s.month_published_at <= $1
          AND NOT s.reminder_sent_7_days
          AND s.date >= $2
        ORDER BY v.id, s.date
        "#
    );

    let rows = sqlx::query_as::<_, AssignedShiftRow>(&sql)
        .bind(seven_days_ago)
        .bind(today)
        .fetch_all(db)
        .await?;

    let mut reminded = 0u64;

    for (volunteer, shifts) in group_by_volunteer(rows) {
        let notices = match assignment_notices(db, config, &shifts, now).await {
            Ok(notices) => notices,
            Err(e) => {
                tracing::error!(error = %e, volunteer_id = volunteer.id, "could not issue reminder tokens");
                continue;
            }
        };

        if let Err(e) = notifier.send_seven_day_reminder(&volunteer, &notices).await {
            tracing::error!(error = %e, email = %volunteer.email, "Failed to send 7-day reminder");
            continue;
        }

        // Flags are set only after the send succeeds, so a failed recipient
        // is retried on the next run.
        let shift_ids: Vec<i32> = shifts.iter().map(|s| s.shift_id).collect();
        sqlx::query(r#"UPDATE "Shifts" SET reminder_sent_7_days = TRUE WHERE id = ANY($1)"#)
            .bind(&shift_ids)
            .execute(db)
            .await?;

        tracing::info!(
            email = %volunteer.email,
            count = shifts.len(),
            "Sent 7-day reminder"
        );
        counter!("sweep_seven_day_reminders_total").increment(1);
        reminded += 1;
    }

    tracing::info!(reminded, "Completed 7-day reminder job");
    Ok(reminded)
}

/// Sends a per-shift reminder, with a short-lived cancel link, for Confirmed
/// shifts starting in roughly 24 hours. Returns the number of reminders sent.
pub async fn send_twenty_four_hour_reminders(
    db: &PgPool,
    notifier: &dyn Notifier,
    config: &AppConfig,
    now: DateTime<Utc>,
) -> AppResult<u64> {
    tracing::info!("Starting 24-hour reminder job");

    let today = now.date_naive();
    let tomorrow = today + Duration::days(1);

    let sql = format!(
        r#"
        {ASSIGNED_SHIFT_SELECT}
        WHERE s.status = 'confirmed'
          AND NOT s.reminder_sent_24_hours
          AND s.date >= $1 AND s.date <= $2
        ORDER BY s.date, t.sort_order
        "#
    );

    let rows = sqlx::query_as::<_, AssignedShiftRow>(&sql)
        .bind(today)
        .bind(tomorrow)
        .fetch_all(db)
        .await?;

    let mut sent = 0u64;

    // Not batched: each reminder embeds a shift-specific cancel token.
    for row in rows
        .into_iter()
        .filter(|row| within_next_day_window(row.start(), now))
    {
        let volunteer = row.volunteer();

        let cancel = match tokens::issue(
            db,
            config,
            row.shift_id,
            row.volunteer_id,
            TokenAction::Cancel,
            Some(tokens::CANCEL_TOKEN_TTL_DAYS),
            now,
        )
        .await
        {
            Ok(token) => token,
            Err(e) => {
                tracing::error!(error = %e, shift_id = row.shift_id, "could not issue cancel token");
                continue;
            }
        };
        let cancel_url = tokens::build_action_url(&config.base_url, &cancel.token);

        if let Err(e) = notifier
            .send_twenty_four_hour_reminder(&volunteer, &row.notice(), &cancel_url)
            .await
        {
            tracing::error!(error = %e, email = %volunteer.email, "Failed to send 24-hour reminder");
            continue;
        }

        sqlx::query(r#"UPDATE "Shifts" SET reminder_sent_24_hours = TRUE WHERE id = $1"#)
            .bind(row.shift_id)
            .execute(db)
            .await?;

        tracing::info!(email = %volunteer.email, date = %row.date, "Sent 24-hour reminder");
        counter!("sweep_twenty_four_hour_reminders_total").increment(1);
        sent += 1;
    }

    tracing::info!(sent, "Completed 24-hour reminder job");
    Ok(sent)
}

/// Reopens Assigned-but-unconfirmed shifts starting within 24 hours,
/// notifies admins, and escalates to backup volunteers. Once reopened a
/// shift no longer matches the query, so overlapping runs cannot double
/// process it. Returns the number of shifts reopened.
pub async fn auto_reopen_unconfirmed_shifts(
    db: &PgPool,
    notifier: &dyn Notifier,
    config: &AppConfig,
    now: DateTime<Utc>,
) -> AppResult<u64> {
    tracing::info!("Starting auto-reopen job");

    let today = now.date_naive();
    let tomorrow = today + Duration::days(1);

    let sql = format!(
        r#"
        {ASSIGNED_SHIFT_SELECT}
        WHERE s.status = 'assigned'
          AND s.date >= $1 AND s.date <= $2
        ORDER BY s.date, t.sort_order
        "#
    );

    let rows = sqlx::query_as::<_, AssignedShiftRow>(&sql)
        .bind(today)
        .bind(tomorrow)
        .fetch_all(db)
        .await?;

    let mut reopened = 0u64;

    for row in rows
        .into_iter()
        .filter(|row| due_for_reopen(row.start(), now))
    {
        let mut tx = db.begin().await?;

        // The predicate re-asserts the state: a volunteer confirming (or an
        // admin reassigning) in the meantime wins and we skip the shift.
        let result = sqlx::query(
            r#"
            UPDATE "Shifts"
            SET status = 'open', volunteer_id = NULL, assigned_at = NULL, confirmed_at = NULL
            WHERE id = $1 AND status = 'assigned' AND volunteer_id = $2
            "#,
        )
        .bind(row.shift_id)
        .bind(row.volunteer_id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tracing::debug!(shift_id = row.shift_id, "shift changed under auto-reopen, skipping");
            continue;
        }

        AuditLogEntry::record(
            &mut *tx,
            Some(row.shift_id),
            Some(row.volunteer_id),
            None,
            "Auto-Reopened",
            &format!(
                "Shift auto-reopened due to no confirmation from {}",
                row.volunteer_name
            ),
        )
        .await?;

        tx.commit().await?;

        tracing::warn!(
            shift_id = row.shift_id,
            date = %row.date,
            volunteer = %row.volunteer_name,
            "Auto-reopened unconfirmed shift"
        );
        counter!("sweep_shifts_reopened_total").increment(1);
        reopened += 1;

        let notice = row.notice();

        if let Err(e) = notifier.send_reopened_to_admins(&notice).await {
            tracing::error!(error = %e, shift_id = row.shift_id, "Failed to send reopen notification");
        }

        if let Err(e) = escalate(db, notifier, config, &row).await {
            tracing::error!(error = %e, shift_id = row.shift_id, "Failed to escalate reopened shift");
        }
    }

    tracing::info!(reopened, "Completed auto-reopen job");
    Ok(reopened)
}

/// Invites backup-eligible volunteers to claim a reopened slot; when none
/// are registered, widens the appeal to every active volunteer.
async fn escalate(
    db: &PgPool,
    notifier: &dyn Notifier,
    config: &AppConfig,
    row: &AssignedShiftRow,
) -> AppResult<()> {
    let request_url = format!("{}/shifts/request/{}", config.base_url, row.shift_id);
    let notice = row.notice();

    let backups = sqlx::query_as::<_, Volunteer>(
        r#"
        SELECT id, name, email, phone, is_active, is_backup, created_at
        FROM "Volunteers" WHERE is_backup AND is_active
        ORDER BY name
        "#,
    )
    .fetch_all(db)
    .await?;

    if !backups.is_empty() {
        notifier
            .send_escalation_to_backups(&notice, &request_url, &backups)
            .await
            .map_err(|e| crate::AppError::Internal(e.to_string()))?;
        tracing::info!(
            shift_id = row.shift_id,
            count = backups.len(),
            "Sent escalation to backup volunteers"
        );
        return Ok(());
    }

    let everyone = sqlx::query_as::<_, Volunteer>(
        r#"
        SELECT id, name, email, phone, is_active, is_backup, created_at
        FROM "Volunteers" WHERE is_active
        ORDER BY name
        "#,
    )
    .fetch_all(db)
    .await?;

    if everyone.is_empty() {
        return Ok(());
    }

    notifier
        .send_escalation_to_all(&notice, &request_url, &everyone)
        .await
        .map_err(|e| crate::AppError::Internal(e.to_string()))?;
    tracing::info!(
        shift_id = row.shift_id,
        count = everyone.len(),
        "No backups registered, escalated to all active volunteers"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, h, m, 0).unwrap()
    }

    #[test]
    fn next_day_window_covers_23_to_25_hours() {
        let now = at(9, 0);

        assert!(within_next_day_window(now + Duration::hours(23), now));
        assert!(within_next_day_window(now + Duration::hours(24), now));
        assert!(within_next_day_window(now + Duration::hours(25), now));

        assert!(!within_next_day_window(now + Duration::hours(22), now));
        assert!(!within_next_day_window(
            now + Duration::hours(25) + Duration::minutes(1),
            now
        ));
    }

    #[test]
    fn reopen_window_is_at_most_24_hours_and_still_future() {
        let now = at(9, 0);

        assert!(due_for_reopen(now + Duration::hours(1), now));
        assert!(due_for_reopen(now + Duration::hours(10), now));
        assert!(due_for_reopen(now + Duration::hours(24), now));

        // Already started or already past: not reopened.
        assert!(!due_for_reopen(now, now));
        assert!(!due_for_reopen(now - Duration::hours(1), now));
        // Still comfortably ahead of the deadline: left alone.
        assert!(!due_for_reopen(now + Duration::hours(25), now));
    }

    #[test]
    fn shift_twelve_hours_out_is_reopened_not_reminded() {
        // An Assigned shift 12 hours from start belongs to the reopen sweep
        // and must not match the 24-hour reminder window.
        let now = at(9, 0);
        let start = now + Duration::hours(12);

        assert!(due_for_reopen(start, now));
        assert!(!within_next_day_window(start, now));
    }
}
