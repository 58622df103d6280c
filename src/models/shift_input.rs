use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::shift::{Shift, ShiftRole, ShiftStatus, SlotType};

#[derive(Debug, Deserialize, ToSchema)]
pub struct AssignShiftInput {
    pub volunteer_id: i32,
    #[serde(default = "default_slot")]
    pub slot: SlotType,
    /// Label of the acting admin for the audit trail.
    pub admin: Option<String>,
}

fn default_slot() -> SlotType {
    SlotType::Primary
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ReleaseShiftInput {
    pub admin: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PublishMonthInput {
    pub year: i32,
    pub month: u32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PublishMonthResponse {
    pub success: bool,
    pub shifts_published: u64,
    pub volunteers_notified: u64,
    pub notification_failures: u64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ShiftMutationResponse {
    pub success: bool,
    pub shift_id: Option<i32>,
    pub message: Option<String>,
}

/// Admin month-view row: a shift enriched with slot and volunteer context.
#[derive(Debug, Serialize, ToSchema)]
pub struct ShiftWithSlot {
    #[serde(flatten)]
    pub shift: Shift,
    pub slot_label: String,
    pub start_time: NaiveTime,
    pub duration_minutes: i32,
    pub volunteer_name: Option<String>,
    pub backup1_name: Option<String>,
    pub backup2_name: Option<String>,
}

/// Public open-slot listing row.
#[derive(Debug, Serialize, ToSchema)]
pub struct OpenShiftSlot {
    pub shift_id: i32,
    pub date: NaiveDate,
    pub time_slot_id: i32,
    pub slot_label: String,
    pub start_time: NaiveTime,
    pub role: ShiftRole,
    pub status: ShiftStatus,
    pub open_slots: Vec<SlotType>,
}
