use async_trait::async_trait;
use serde_json::json;
use std::fmt::Write as _;

use super::{ApprovalNotice, AssignmentNotice, Notifier, NotifyError, ShiftNotice};
use crate::models::{ShiftRole, Volunteer};
use crate::AppConfig;

const RESEND_API_URL: &str = "https://api.resend.com/emails";

/// Delivers HTML email through the Resend API.
pub struct ResendNotifier {
    client: reqwest::Client,
    api_key: String,
    from: String,
    admin_emails: Vec<String>,
}

impl ResendNotifier {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: config.resend_api_key.clone(),
            from: format!("{} <{}>", config.email_from_name, config.email_from_address),
            admin_emails: config.admin_notification_emails.clone(),
        }
    }

    async fn send_email(&self, to: &str, subject: &str, html: &str) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(RESEND_API_URL)
            .bearer_auth(&self.api_key)
            .json(&json!({
                "from": self.from,
                "to": [to],
                "subject": subject,
                "html": html,
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(to, status = status.as_u16(), "email provider rejected message");
            return Err(NotifyError::Api(status.as_u16()));
        }

        tracing::debug!(to, subject, "email sent");
        Ok(())
    }
}

fn shift_panel(shift: &ShiftNotice, background: &str) -> String {
    format!(
        "<div style='background-color: {background}; padding: 15px; margin: 15px 0;'>\
         <strong>{}</strong><br/>\
         {}: {} - {}<br/>\
         Role: {}</div>",
        shift.date_long(),
        shift.slot_label,
        shift.start_display(),
        shift.end_display(),
        shift.role.label(),
    )
}

fn assignments_table(shifts: &[AssignmentNotice]) -> String {
    let mut body = String::new();
    body.push_str("<table style='border-collapse: collapse; width: 100%;'>");
    body.push_str(
        "<tr style='background-color: #f0f0f0;'>\
         <th style='padding: 10px; text-align: left;'>Date</th>\
         <th style='padding: 10px; text-align: left;'>Time</th>\
         <th style='padding: 10px; text-align: left;'>Role</th>\
         <th style='padding: 10px; text-align: left;'>Actions</th></tr>",
    );
    for notice in shifts {
        let shift = &notice.shift;
        let _ = write!(
            body,
            "<tr>\
             <td style='padding: 10px; border-bottom: 1px solid #ddd;'>{}</td>\
             <td style='padding: 10px; border-bottom: 1px solid #ddd;'>{} ({})</td>\
             <td style='padding: 10px; border-bottom: 1px solid #ddd;'>{}</td>\
             <td style='padding: 10px; border-bottom: 1px solid #ddd;'>\
             <a href='{}' style='color: green; margin-right: 10px;'>Confirm</a>\
             <a href='{}' style='color: orange;'>Decline</a></td></tr>",
            shift.date_long(),
            shift.slot_label,
            shift.start_display(),
            shift.role.label(),
            notice.confirm_url,
            notice.decline_url,
        );
    }
    body.push_str("</table>");
    body
}

fn monthly_assignments_body(volunteer: &Volunteer, shifts: &[AssignmentNotice]) -> String {
    let month_year = shifts[0].shift.date.format("%B %Y");
    let mut body = format!(
        "<h2>Hello {},</h2>\
         <p>Here are your volunteer shifts for {month_year}:</p>",
        volunteer.name
    );
    body.push_str(&assignments_table(shifts));
    body.push_str(
        "<p style='margin-top: 20px;'>Please confirm your shifts as soon as possible.</p>\
         <p>If you cannot work a shift, please decline it so we can find coverage.</p>\
         <p style='color: #666; font-size: 12px;'>Questions? Contact the office.</p>",
    );
    body
}

fn seven_day_reminder_body(volunteer: &Volunteer, shifts: &[AssignmentNotice]) -> String {
    let mut body = format!(
        "<h2>Hello {},</h2>\
         <p>You have unconfirmed shifts coming up. Please confirm or decline:</p><ul>",
        volunteer.name
    );
    for notice in shifts {
        let shift = &notice.shift;
        let _ = write!(
            body,
            "<li><strong>{}</strong> - {} ({})\
             <br/><a href='{}'>Confirm</a> | <a href='{}'>Decline</a></li>",
            shift.date_long(),
            shift.slot_label,
            shift.role.label(),
            notice.confirm_url,
            notice.decline_url,
        );
    }
    body.push_str(
        "</ul><p>Shifts not confirmed may be reassigned 24 hours before they start.</p>",
    );
    body
}

fn twenty_four_hour_body(volunteer: &Volunteer, shift: &ShiftNotice, cancel_url: &str) -> String {
    let mut body = format!(
        "<h2>Hello {},</h2>\
         <p>This is a reminder that you have a volunteer shift tomorrow:</p>{}",
        volunteer.name,
        shift_panel(shift, "#f0f0f0"),
    );
    match shift.role {
        ShiftRole::Phone => {
            body.push_str("<p>Calls will be forwarded to your phone during your shift.</p>")
        }
        ShiftRole::InPerson => {
            body.push_str("<p>Please arrive at the office on time.</p>")
        }
    }
    let _ = write!(
        body,
        "<p>If you can no longer work this shift, <a href='{cancel_url}'>click here to cancel</a>.</p>"
    );
    body
}

fn request_received_body(volunteer: &Volunteer, shift: &ShiftNotice) -> String {
    format!(
        "<h2>Hello {},</h2>\
         <p>Thank you for volunteering! Your request for the following shift has been received:</p>{}\
         <p>An administrator will review your request and you'll receive an email once it's approved.</p>",
        volunteer.name,
        shift_panel(shift, "#f0f0f0"),
    )
}

fn request_approved_body(volunteer: &Volunteer, notice: &ApprovalNotice) -> String {
    let mut body = format!(
        "<h2>Hello {},</h2>\
         <p>Great news! Your request has been approved. You are signed up as {}:</p>{}",
        volunteer.name,
        notice.slot_label,
        shift_panel(&notice.shift, "#d4edda"),
    );
    match &notice.actions {
        Some(actions) => {
            let _ = write!(
                body,
                "<p><a href='{}' style='background-color: green; color: white; padding: 10px 20px; text-decoration: none;'>Confirm This Shift</a></p>\
                 <p>Can't make it? <a href='{}'>Decline this shift</a></p>",
                actions.confirm_url, actions.decline_url,
            );
        }
        None => {
            body.push_str(
                "<p>As a backup you may be called on if the primary volunteer cannot serve. \
                 We'll reach out if coverage is needed.</p>",
            );
        }
    }
    body
}

fn request_rejected_body(volunteer: &Volunteer, shift: &ShiftNotice) -> String {
    format!(
        "<h2>Hello {},</h2>\
         <p>Thank you for your interest in volunteering. Unfortunately, we were unable to \
         accommodate your request for the following shift:</p>{}\
         <p>This slot may have already been filled. Please check the open shifts listing for \
         other volunteer opportunities.</p>\
         <p>Thank you for your willingness to serve!</p>",
        volunteer.name,
        shift_panel(shift, "#f8d7da"),
    )
}

fn reopened_body(shift: &ShiftNotice) -> String {
    format!(
        "<h2>Shift Coverage Needed</h2>\
         <p>The following shift has been automatically reopened because it was not confirmed:</p>{}\
         <p>Please review and take action to find coverage.</p>",
        shift_panel(shift, "#f8d7da"),
    )
}

fn escalation_body(volunteer: &Volunteer, shift: &ShiftNotice, request_url: &str) -> String {
    format!(
        "<h2>Hello {},</h2>\
         <p>We need coverage for an open shift. As a backup volunteer, you're being contacted first:</p>{}\
         <p><a href='{request_url}' style='background-color: #007bff; color: white; padding: 10px 20px; text-decoration: none;'>Request This Shift</a></p>",
        volunteer.name,
        shift_panel(shift, "#fff3cd"),
    )
}

fn urgent_escalation_body(volunteer: &Volunteer, shift: &ShiftNotice, request_url: &str) -> String {
    format!(
        "<h2>Hello {},</h2>\
         <p><strong>We urgently need coverage for an open shift:</strong></p>{}\
         <p><a href='{request_url}' style='background-color: #dc3545; color: white; padding: 10px 20px; text-decoration: none;'>I Can Help - Request This Shift</a></p>",
        volunteer.name,
        shift_panel(shift, "#f8d7da"),
    )
}

#[async_trait]
impl Notifier for ResendNotifier {
    async fn send_monthly_assignments(
        &self,
        volunteer: &Volunteer,
        shifts: &[AssignmentNotice],
    ) -> Result<(), NotifyError> {
        if shifts.is_empty() {
            return Ok(());
        }
        let subject = format!(
            "Your {} Volunteer Shifts",
            shifts[0].shift.date.format("%B %Y")
        );
        self.send_email(
            &volunteer.email,
            &subject,
            &monthly_assignments_body(volunteer, shifts),
        )
        .await
    }

    async fn send_seven_day_reminder(
        &self,
        volunteer: &Volunteer,
        shifts: &[AssignmentNotice],
    ) -> Result<(), NotifyError> {
        if shifts.is_empty() {
            return Ok(());
        }
        self.send_email(
            &volunteer.email,
            "Reminder: Please Confirm Your Volunteer Shifts",
            &seven_day_reminder_body(volunteer, shifts),
        )
        .await
    }

    async fn send_twenty_four_hour_reminder(
        &self,
        volunteer: &Volunteer,
        shift: &ShiftNotice,
        cancel_url: &str,
    ) -> Result<(), NotifyError> {
        let subject = format!("Reminder: Volunteer Shift Tomorrow at {}", shift.start_display());
        self.send_email(
            &volunteer.email,
            &subject,
            &twenty_four_hour_body(volunteer, shift, cancel_url),
        )
        .await
    }

    async fn send_request_received(
        &self,
        volunteer: &Volunteer,
        shift: &ShiftNotice,
    ) -> Result<(), NotifyError> {
        self.send_email(
            &volunteer.email,
            "Your Shift Request Has Been Received",
            &request_received_body(volunteer, shift),
        )
        .await
    }

    async fn send_request_approved(
        &self,
        volunteer: &Volunteer,
        notice: &ApprovalNotice,
    ) -> Result<(), NotifyError> {
        let subject = format!(
            "Shift Approved: {} at {}",
            notice.shift.date_short(),
            notice.shift.start_display()
        );
        self.send_email(
            &volunteer.email,
            &subject,
            &request_approved_body(volunteer, notice),
        )
        .await
    }

    async fn send_request_rejected(
        &self,
        volunteer: &Volunteer,
        shift: &ShiftNotice,
    ) -> Result<(), NotifyError> {
        let subject = format!("Shift Request Update: {}", shift.date_short());
        self.send_email(
            &volunteer.email,
            &subject,
            &request_rejected_body(volunteer, shift),
        )
        .await
    }

    async fn send_reopened_to_admins(&self, shift: &ShiftNotice) -> Result<(), NotifyError> {
        if self.admin_emails.is_empty() {
            return Ok(());
        }
        let subject = format!("Shift Reopened: {} - {}", shift.date_short(), shift.slot_label);
        let body = reopened_body(shift);
        for email in &self.admin_emails {
            self.send_email(email, &subject, &body).await?;
        }
        Ok(())
    }

    async fn send_escalation_to_backups(
        &self,
        shift: &ShiftNotice,
        request_url: &str,
        backups: &[Volunteer],
    ) -> Result<(), NotifyError> {
        let subject = format!(
            "Volunteer Needed: {} at {}",
            shift.date_short(),
            shift.start_display()
        );
        for volunteer in backups {
            self.send_email(
                &volunteer.email,
                &subject,
                &escalation_body(volunteer, shift, request_url),
            )
            .await?;
        }
        Ok(())
    }

    async fn send_escalation_to_all(
        &self,
        shift: &ShiftNotice,
        request_url: &str,
        volunteers: &[Volunteer],
    ) -> Result<(), NotifyError> {
        let subject = format!(
            "URGENT: Volunteer Needed {} at {}",
            shift.date_short(),
            shift.start_display()
        );
        for volunteer in volunteers {
            self.send_email(
                &volunteer.email,
                &subject,
                &urgent_escalation_body(volunteer, shift, request_url),
            )
            .await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime, Utc};

    fn volunteer() -> Volunteer {
        Volunteer {
            id: 1,
            name: "Pat Doe".to_string(),
            email: "pat@example.org".to_string(),
            phone: None,
            is_active: true,
            is_backup: false,
            created_at: Utc::now(),
        }
    }

    fn notice() -> ShiftNotice {
        ShiftNotice {
            shift_id: 42,
            date: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            slot_label: "Morning".to_string(),
            start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
            role: ShiftRole::Phone,
        }
    }

    fn assignment() -> AssignmentNotice {
        AssignmentNotice {
            shift: notice(),
            confirm_url: "https://x.org/action/confirm-tok".to_string(),
            decline_url: "https://x.org/action/decline-tok".to_string(),
        }
    }

    #[test]
    fn monthly_body_lists_action_links() {
        let body = monthly_assignments_body(&volunteer(), &[assignment()]);
        assert!(body.contains("Pat Doe"));
        assert!(body.contains("https://x.org/action/confirm-tok"));
        assert!(body.contains("https://x.org/action/decline-tok"));
        assert!(body.contains("Sunday, March 1, 2026"));
    }

    #[test]
    fn twenty_four_hour_body_embeds_cancel_link_and_role_copy() {
        let body = twenty_four_hour_body(&volunteer(), &notice(), "https://x.org/action/cancel-tok");
        assert!(body.contains("https://x.org/action/cancel-tok"));
        assert!(body.contains("forwarded to your phone"));

        let mut in_person = notice();
        in_person.role = ShiftRole::InPerson;
        let body = twenty_four_hour_body(&volunteer(), &in_person, "u");
        assert!(body.contains("arrive at the office"));
    }

    #[test]
    fn escalation_bodies_link_to_the_request_page() {
        let url = "https://x.org/shifts/request/42";
        assert!(escalation_body(&volunteer(), &notice(), url).contains(url));
        assert!(urgent_escalation_body(&volunteer(), &notice(), url).contains(url));
    }

    #[test]
    fn approved_primary_body_offers_confirm_and_decline() {
        let approval = ApprovalNotice {
            shift: notice(),
            slot_label: "Primary".to_string(),
            actions: Some(super::super::ConfirmActions {
                confirm_url: "https://x.org/action/confirm-tok".to_string(),
                decline_url: "https://x.org/action/decline-tok".to_string(),
            }),
        };
        let body = request_approved_body(&volunteer(), &approval);
        assert!(body.contains("Confirm This Shift"));
        assert!(body.contains("Decline this shift"));
    }

    #[test]
    fn approved_backup_body_has_no_confirm_link() {
        let approval = ApprovalNotice {
            shift: notice(),
            slot_label: "Backup 1".to_string(),
            actions: None,
        };
        let body = request_approved_body(&volunteer(), &approval);
        assert!(body.contains("Backup 1"));
        assert!(!body.contains("Confirm This Shift"));
    }
}
