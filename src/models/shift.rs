use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema,
)]
#[sqlx(type_name = "shift_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ShiftStatus {
    Open,
    Assigned,
    Confirmed,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema,
)]
#[sqlx(type_name = "shift_role", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ShiftRole {
    InPerson,
    Phone,
}

impl ShiftRole {
    pub fn label(&self) -> &'static str {
        match self {
            ShiftRole::InPerson => "In Person",
            ShiftRole::Phone => "Phone",
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema,
)]
#[sqlx(type_name = "slot_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SlotType {
    Primary,
    Backup1,
    Backup2,
}

impl SlotType {
    pub fn label(&self) -> &'static str {
        match self {
            SlotType::Primary => "Primary",
            SlotType::Backup1 => "Backup 1",
            SlotType::Backup2 => "Backup 2",
        }
    }

    /// Column holding this slot's occupant. Used to build conditional
    /// UPDATE predicates; never interpolates user input.
    pub fn column(&self) -> &'static str {
        match self {
            SlotType::Primary => "volunteer_id",
            SlotType::Backup1 => "backup1_volunteer_id",
            SlotType::Backup2 => "backup2_volunteer_id",
        }
    }
}

/// A bookable unit of volunteer coverage: one (date, time slot) pair.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Shift {
    pub id: i32,
    pub date: NaiveDate,
    pub time_slot_id: i32,
    pub role: ShiftRole,
    pub status: ShiftStatus,
    pub volunteer_id: Option<i32>,
    pub backup1_volunteer_id: Option<i32>,
    pub backup2_volunteer_id: Option<i32>,
    pub assigned_at: Option<DateTime<Utc>>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub month_published_at: Option<DateTime<Utc>>,
    pub reminder_sent_7_days: bool,
    pub reminder_sent_24_hours: bool,
}

impl Shift {
    pub fn occupant(&self, slot: SlotType) -> Option<i32> {
        match slot {
            SlotType::Primary => self.volunteer_id,
            SlotType::Backup1 => self.backup1_volunteer_id,
            SlotType::Backup2 => self.backup2_volunteer_id,
        }
    }

    pub fn slot_is_free(&self, slot: SlotType) -> bool {
        self.occupant(slot).is_none()
    }

    /// True if the volunteer already occupies any slot on this shift.
    pub fn holds_volunteer(&self, volunteer_id: i32) -> bool {
        self.volunteer_id == Some(volunteer_id)
            || self.backup1_volunteer_id == Some(volunteer_id)
            || self.backup2_volunteer_id == Some(volunteer_id)
    }

    /// Status is Open iff the primary slot is vacant.
    pub fn status_matches_primary(&self) -> bool {
        (self.status == ShiftStatus::Open) == self.volunteer_id.is_none()
    }

    /// Primary and backups are pairwise distinct whenever set.
    pub fn slots_pairwise_distinct(&self) -> bool {
        let mut seen = Vec::with_capacity(3);
        for occupant in [
            self.volunteer_id,
            self.backup1_volunteer_id,
            self.backup2_volunteer_id,
        ]
        .into_iter()
        .flatten()
        {
            if seen.contains(&occupant) {
                return false;
            }
            seen.push(occupant);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_shift() -> Shift {
        Shift {
            id: 1,
            date: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            time_slot_id: 1,
            role: ShiftRole::Phone,
            status: ShiftStatus::Open,
            volunteer_id: None,
            backup1_volunteer_id: None,
            backup2_volunteer_id: None,
            assigned_at: None,
            confirmed_at: None,
            month_published_at: None,
            reminder_sent_7_days: false,
            reminder_sent_24_hours: false,
        }
    }

    #[test]
    fn occupant_tracks_each_slot() {
        let mut shift = open_shift();
        shift.backup1_volunteer_id = Some(7);
        assert_eq!(shift.occupant(SlotType::Primary), None);
        assert_eq!(shift.occupant(SlotType::Backup1), Some(7));
        assert!(shift.slot_is_free(SlotType::Backup2));
        assert!(shift.holds_volunteer(7));
        assert!(!shift.holds_volunteer(8));
    }

    #[test]
    fn status_primary_coupling() {
        let mut shift = open_shift();
        assert!(shift.status_matches_primary());

        shift.volunteer_id = Some(3);
        assert!(!shift.status_matches_primary());

        shift.status = ShiftStatus::Assigned;
        assert!(shift.status_matches_primary());
    }

    #[test]
    fn pairwise_distinct_slots() {
        let mut shift = open_shift();
        shift.volunteer_id = Some(1);
        shift.backup1_volunteer_id = Some(2);
        shift.backup2_volunteer_id = Some(3);
        assert!(shift.slots_pairwise_distinct());

        shift.backup2_volunteer_id = Some(2);
        assert!(!shift.slots_pairwise_distinct());

        shift.backup1_volunteer_id = None;
        shift.backup2_volunteer_id = Some(1);
        assert!(!shift.slots_pairwise_distinct());
    }
}
