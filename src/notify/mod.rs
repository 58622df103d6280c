//! Outbound notification contracts. The core hands implementations
//! fully-resolved data: shift summaries with slot labels and times, plus any
//! action URLs already built, so a notifier performs no lookups of its own.
//! Every send may fail independently; callers treat failures as non-fatal
//! and log them, since the state change they accompany has already
//! committed.

pub mod resend;

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, NaiveTime};
use sqlx::PgExecutor;

use crate::models::{ShiftRole, Volunteer};
use crate::{AppError, AppResult};

pub use resend::ResendNotifier;

/// Everything an email template needs to describe one shift.
#[derive(Debug, Clone)]
pub struct ShiftNotice {
    pub shift_id: i32,
    pub date: NaiveDate,
    pub slot_label: String,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub role: ShiftRole,
}

impl ShiftNotice {
    pub fn date_long(&self) -> String {
        self.date.format("%A, %B %-d, %Y").to_string()
    }

    pub fn date_short(&self) -> String {
        self.date.format("%b %-d").to_string()
    }

    pub fn start_display(&self) -> String {
        self.start_time.format("%-I:%M %p").to_string()
    }

    pub fn end_display(&self) -> String {
        self.end_time.format("%-I:%M %p").to_string()
    }
}

/// A shift plus the confirm/decline links for its assigned volunteer.
#[derive(Debug, Clone)]
pub struct AssignmentNotice {
    pub shift: ShiftNotice,
    pub confirm_url: String,
    pub decline_url: String,
}

/// Outcome of an approved request. Primary approvals carry confirm/decline
/// links; backup approvals have no shift to confirm, so `actions` is None.
#[derive(Debug, Clone)]
pub struct ApprovalNotice {
    pub shift: ShiftNotice,
    pub slot_label: String,
    pub actions: Option<ConfirmActions>,
}

#[derive(Debug, Clone)]
pub struct ConfirmActions {
    pub confirm_url: String,
    pub decline_url: String,
}

/// Resolves the summary the notifier contracts expect. The core calls this
/// before notifying so implementations never touch the datastore.
pub async fn load_shift_notice(
    executor: impl PgExecutor<'_>,
    shift_id: i32,
) -> AppResult<ShiftNotice> {
    #[derive(sqlx::FromRow)]
    struct NoticeRow {
        shift_id: i32,
        date: NaiveDate,
        role: ShiftRole,
        slot_label: String,
        start_time: NaiveTime,
        duration_minutes: i32,
    }

    let row = sqlx::query_as::<_, NoticeRow>(
        r#"
        SELECT s.id AS shift_id, s.date, s.role, t.label AS slot_label,
               t.start_time, t.duration_minutes
        FROM "Shifts" s
        INNER JOIN "TimeSlots" t ON s.time_slot_id = t.id
        WHERE s.id = $1
        "#,
    )
    .bind(shift_id)
    .fetch_optional(executor)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Shift {shift_id} not found")))?;

    Ok(ShiftNotice {
        shift_id: row.shift_id,
        date: row.date,
        slot_label: row.slot_label,
        start_time: row.start_time,
        end_time: row.start_time + Duration::minutes(row.duration_minutes as i64),
        role: row.role,
    })
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("email request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("email provider rejected the message: status {0}")]
    Api(u16),
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_monthly_assignments(
        &self,
        volunteer: &Volunteer,
        shifts: &[AssignmentNotice],
    ) -> Result<(), NotifyError>;

    async fn send_seven_day_reminder(
        &self,
        volunteer: &Volunteer,
        shifts: &[AssignmentNotice],
    ) -> Result<(), NotifyError>;

    async fn send_twenty_four_hour_reminder(
        &self,
        volunteer: &Volunteer,
        shift: &ShiftNotice,
        cancel_url: &str,
    ) -> Result<(), NotifyError>;

    async fn send_request_received(
        &self,
        volunteer: &Volunteer,
        shift: &ShiftNotice,
    ) -> Result<(), NotifyError>;

    async fn send_request_approved(
        &self,
        volunteer: &Volunteer,
        notice: &ApprovalNotice,
    ) -> Result<(), NotifyError>;

    async fn send_request_rejected(
        &self,
        volunteer: &Volunteer,
        shift: &ShiftNotice,
    ) -> Result<(), NotifyError>;

    async fn send_reopened_to_admins(&self, shift: &ShiftNotice) -> Result<(), NotifyError>;

    async fn send_escalation_to_backups(
        &self,
        shift: &ShiftNotice,
        request_url: &str,
        backups: &[Volunteer],
    ) -> Result<(), NotifyError>;

    async fn send_escalation_to_all(
        &self,
        shift: &ShiftNotice,
        request_url: &str,
        volunteers: &[Volunteer],
    ) -> Result<(), NotifyError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn notice_display_formats() {
        let notice = ShiftNotice {
            shift_id: 1,
            date: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            slot_label: "Morning".to_string(),
            start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
            role: ShiftRole::Phone,
        };

        assert_eq!(notice.date_long(), "Sunday, March 1, 2026");
        assert_eq!(notice.date_short(), "Mar 1");
        assert_eq!(notice.start_display(), "9:00 AM");
        assert_eq!(notice.end_display(), "12:00 PM");
    }
}
