use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::shift::{ShiftRole, SlotType};
use super::shift_request::ShiftRequest;

/// Self-service request submission. Targets either an existing shift by id,
/// or a (date, time_slot_id) pair for a shift that may not exist yet.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SubmitShiftRequestInput {
    pub shift_id: Option<i32>,
    pub date: Option<NaiveDate>,
    pub time_slot_id: Option<i32>,
    #[serde(default = "default_slot")]
    pub slot: SlotType,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
}

fn default_slot() -> SlotType {
    SlotType::Primary
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ResolveRequestInput {
    pub approve: bool,
    /// Label of the acting admin, recorded on the request and audit trail.
    pub resolved_by: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RequestMutationResponse {
    pub success: bool,
    pub request_id: Option<i32>,
    pub message: Option<String>,
    /// False when the decision committed but the courtesy email did not send.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification_sent: Option<bool>,
}

/// Admin listing row: a request enriched with shift and volunteer context.
#[derive(Debug, Serialize, ToSchema)]
pub struct ShiftRequestWithDetails {
    #[serde(flatten)]
    pub request: ShiftRequest,
    pub shift_date: NaiveDate,
    pub slot_label: String,
    pub start_time: NaiveTime,
    pub role: ShiftRole,
    pub volunteer_name: String,
    pub volunteer_email: String,
}
