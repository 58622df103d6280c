//! Month publication: stamps the publication timestamp the 7-day reminder
//! window is measured from, then emails each volunteer one consolidated list
//! of their assignments with confirm/decline links.

use chrono::{DateTime, Duration, Months, NaiveDate, Utc};
use sqlx::PgPool;

use super::{assignment_notices, group_by_volunteer, AssignedShiftRow, ASSIGNED_SHIFT_SELECT};
use crate::notify::Notifier;
use crate::{AppConfig, AppError, AppResult};

#[derive(Debug)]
pub struct PublishOutcome {
    pub shifts_published: u64,
    pub volunteers_notified: u64,
    pub notification_failures: u64,
}

pub async fn publish_month(
    db: &PgPool,
    notifier: &dyn Notifier,
    config: &AppConfig,
    year: i32,
    month: u32,
    now: DateTime<Utc>,
) -> AppResult<PublishOutcome> {
    let first_day = NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| AppError::BadRequest(format!("Invalid month {year}-{month}")))?;
    let last_day = first_day + Months::new(1) - Duration::days(1);

    tracing::info!(year, month, "Publishing month");

    let stamped = sqlx::query(
        r#"
        UPDATE "Shifts" SET month_published_at = $1
        WHERE date >= $2 AND date <= $3 AND month_published_at IS NULL
        "#,
    )
    .bind(now)
    .bind(first_day)
    .bind(last_day)
    .execute(db)
    .await?
    .rows_affected();

    let sql = format!(
        r#"
        {ASSIGNED_SHIFT_SELECT}
        WHERE s.date >= $1 AND s.date <= $2 AND s.status <> 'open'
        ORDER BY v.id, s.date, t.sort_order
        "#
    );

    let rows = sqlx::query_as::<_, AssignedShiftRow>(&sql)
        .bind(first_day)
        .bind(last_day)
        .fetch_all(db)
        .await?;

    let mut notified = 0u64;
    let mut failures = 0u64;

    for (volunteer, shifts) in group_by_volunteer(rows) {
        let notices = match assignment_notices(db, config, &shifts, now).await {
            Ok(notices) => notices,
            Err(e) => {
                tracing::error!(error = %e, volunteer_id = volunteer.id, "could not issue assignment tokens");
                failures += 1;
                continue;
            }
        };

        match notifier.send_monthly_assignments(&volunteer, &notices).await {
            Ok(()) => {
                tracing::info!(
                    email = %volunteer.email,
                    count = shifts.len(),
                    "Sent monthly assignment email"
                );
                notified += 1;
            }
            Err(e) => {
                tracing::error!(error = %e, email = %volunteer.email, "Failed to send monthly assignment email");
                failures += 1;
            }
        }
    }

    tracing::info!(
        year,
        month,
        shifts_published = stamped,
        notified,
        failures,
        "Completed month publication"
    );

    Ok(PublishOutcome {
        shifts_published: stamped,
        volunteers_notified: notified,
        notification_failures: failures,
    })
}
