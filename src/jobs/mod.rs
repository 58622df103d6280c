//! Background jobs: time-windowed reminder/escalation sweeps, month
//! publication and token cleanup. Each operation takes a `now` snapshot from
//! its caller so every window comparison within one run agrees, and so tests
//! can pin the clock.

pub mod publish;
pub mod reminders;
pub mod scheduler;
pub mod token_cleanup;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use sqlx::{FromRow, PgPool};
use std::collections::BTreeMap;

use crate::models::{start_datetime, ShiftRole, TokenAction, Volunteer};
use crate::notify::{AssignmentNotice, ShiftNotice};
use crate::{tokens, AppConfig, AppResult};

/// A shift joined with its time slot and assigned volunteer, as the sweeps
/// and month publication load them.
#[derive(Debug, Clone, FromRow)]
pub(crate) struct AssignedShiftRow {
    pub shift_id: i32,
    pub date: NaiveDate,
    pub role: ShiftRole,
    pub slot_label: String,
    pub start_time: NaiveTime,
    pub duration_minutes: i32,
    pub volunteer_id: i32,
    pub volunteer_name: String,
    pub volunteer_email: String,
    pub volunteer_phone: Option<String>,
    pub volunteer_is_active: bool,
    pub volunteer_is_backup: bool,
    pub volunteer_created_at: DateTime<Utc>,
}

impl AssignedShiftRow {
    pub fn start(&self) -> DateTime<Utc> {
        start_datetime(self.date, self.start_time)
    }

    pub fn notice(&self) -> ShiftNotice {
        ShiftNotice {
            shift_id: self.shift_id,
            date: self.date,
            slot_label: self.slot_label.clone(),
            start_time: self.start_time,
            end_time: self.start_time + chrono::Duration::minutes(self.duration_minutes as i64),
            role: self.role,
        }
    }

    pub fn volunteer(&self) -> Volunteer {
        Volunteer {
            id: self.volunteer_id,
            name: self.volunteer_name.clone(),
            email: self.volunteer_email.clone(),
            phone: self.volunteer_phone.clone(),
            is_active: self.volunteer_is_active,
            is_backup: self.volunteer_is_backup,
            created_at: self.volunteer_created_at,
        }
    }
}

pub(crate) const ASSIGNED_SHIFT_SELECT: &str = r#"
    SELECT s.id AS shift_id, s.date, s.role, t.label AS slot_label,
           t.start_time, t.duration_minutes,
           v.id AS volunteer_id, v.name AS volunteer_name,
           v.email AS volunteer_email, v.phone AS volunteer_phone,
           v.is_active AS volunteer_is_active, v.is_backup AS volunteer_is_backup,
           v.created_at AS volunteer_created_at
    FROM "Shifts" s
    INNER JOIN "TimeSlots" t ON s.time_slot_id = t.id
    INNER JOIN "Volunteers" v ON s.volunteer_id = v.id
"#;

/// Consolidates rows per volunteer, preserving date order within each group.
pub(crate) fn group_by_volunteer(
    rows: Vec<AssignedShiftRow>,
) -> Vec<(Volunteer, Vec<AssignedShiftRow>)> {
    let mut grouped: BTreeMap<i32, (Volunteer, Vec<AssignedShiftRow>)> = BTreeMap::new();
    for row in rows {
        grouped
            .entry(row.volunteer_id)
            .or_insert_with(|| (row.volunteer(), Vec::new()))
            .1
            .push(row);
    }
    grouped.into_values().collect()
}

/// Issues a confirm/decline token pair per shift and assembles the notices a
/// consolidated assignments email needs.
pub(crate) async fn assignment_notices(
    db: &PgPool,
    config: &AppConfig,
    rows: &[AssignedShiftRow],
    now: DateTime<Utc>,
) -> AppResult<Vec<AssignmentNotice>> {
    let mut notices = Vec::with_capacity(rows.len());
    for row in rows {
        let confirm = tokens::issue(
            db,
            config,
            row.shift_id,
            row.volunteer_id,
            TokenAction::Confirm,
            None,
            now,
        )
        .await?;
        let decline = tokens::issue(
            db,
            config,
            row.shift_id,
            row.volunteer_id,
            TokenAction::Decline,
            None,
            now,
        )
        .await?;

        notices.push(AssignmentNotice {
            shift: row.notice(),
            confirm_url: tokens::build_action_url(&config.base_url, &confirm.token),
            decline_url: tokens::build_action_url(&config.base_url, &decline.token),
        });
    }
    Ok(notices)
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use chrono::TimeZone;

    pub fn row(shift_id: i32, volunteer_id: i32, date: NaiveDate) -> AssignedShiftRow {
        AssignedShiftRow {
            shift_id,
            date,
            role: ShiftRole::Phone,
            slot_label: "Morning".to_string(),
            start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            duration_minutes: 180,
            volunteer_id,
            volunteer_name: format!("Volunteer {volunteer_id}"),
            volunteer_email: format!("v{volunteer_id}@example.org"),
            volunteer_phone: None,
            volunteer_is_active: true,
            volunteer_is_backup: false,
            volunteer_created_at: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::row;
    use super::*;

    #[test]
    fn grouping_consolidates_per_volunteer() {
        let d1 = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let d2 = NaiveDate::from_ymd_opt(2026, 3, 8).unwrap();
        let rows = vec![row(1, 10, d1), row(2, 11, d1), row(3, 10, d2)];

        let grouped = group_by_volunteer(rows);
        assert_eq!(grouped.len(), 2);

        let (volunteer, shifts) = &grouped[0];
        assert_eq!(volunteer.id, 10);
        assert_eq!(shifts.len(), 2);
        assert_eq!(shifts[0].shift_id, 1);
        assert_eq!(shifts[1].shift_id, 3);

        let (volunteer, shifts) = &grouped[1];
        assert_eq!(volunteer.id, 11);
        assert_eq!(shifts.len(), 1);
    }

    #[test]
    fn row_start_combines_date_and_slot_time() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let start = row(1, 1, date).start();
        assert_eq!(start.to_rfc3339(), "2026-03-01T09:00:00+00:00");
    }
}
