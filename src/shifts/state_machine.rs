//! Pure shift transition logic. Callers persist an accepted transition with
//! a conditional UPDATE that re-asserts the precondition, so a racing writer
//! observes zero affected rows and reports a conflict instead of clobbering.

use chrono::{DateTime, Utc};

use crate::models::{Shift, ShiftStatus, SlotType};
use crate::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShiftAction {
    /// Fill an empty slot. Filling Primary moves the shift to Assigned;
    /// backup slots never touch shift status.
    Assign { volunteer_id: i32, slot: SlotType },
    /// Primary volunteer confirms an Assigned shift.
    Confirm { volunteer_id: i32 },
    /// Primary volunteer releases the shift, any status.
    Decline { volunteer_id: i32 },
    /// Same transition as Decline, initiated from a 24-hour cancel link.
    Cancel { volunteer_id: i32 },
    /// Same transition as Decline, initiated by the sweep. The time-window
    /// check belongs to the sweep's query, not to this state machine.
    AutoReopen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("slot unavailable")]
    SlotUnavailable,
    #[error("volunteer already holds a slot on this shift")]
    AlreadyOnShift,
    #[error("shift is not awaiting confirmation")]
    NotAwaitingConfirmation,
    #[error("volunteer is not assigned to this shift")]
    NotAssignedVolunteer,
    #[error("shift has no assigned volunteer to reopen")]
    NothingToReopen,
    #[error("transition would violate shift invariants")]
    InvariantViolation,
}

impl From<TransitionError> for AppError {
    fn from(err: TransitionError) -> Self {
        match err {
            TransitionError::SlotUnavailable => {
                AppError::Conflict("This slot is no longer available.".to_string())
            }
            TransitionError::AlreadyOnShift => AppError::Conflict(
                "This volunteer already holds a slot on this shift.".to_string(),
            ),
            TransitionError::NotAwaitingConfirmation => AppError::Conflict(
                "This shift has been reassigned or is no longer available.".to_string(),
            ),
            TransitionError::NotAssignedVolunteer => {
                AppError::Conflict("This shift has already been reassigned.".to_string())
            }
            TransitionError::NothingToReopen => {
                AppError::Conflict("This shift is not awaiting confirmation.".to_string())
            }
            TransitionError::InvariantViolation => {
                AppError::Internal("shift invariant violation".to_string())
            }
        }
    }
}

/// Computes the next shift state for an action, or rejects without any
/// mutation. The input shift is left untouched either way.
pub fn apply(
    shift: &Shift,
    action: &ShiftAction,
    now: DateTime<Utc>,
) -> Result<Shift, TransitionError> {
    let mut next = shift.clone();

    match *action {
        ShiftAction::Assign { volunteer_id, slot } => {
            if !shift.slot_is_free(slot) {
                return Err(TransitionError::SlotUnavailable);
            }
            if shift.holds_volunteer(volunteer_id) {
                return Err(TransitionError::AlreadyOnShift);
            }
            match slot {
                SlotType::Primary => {
                    next.volunteer_id = Some(volunteer_id);
                    next.status = ShiftStatus::Assigned;
                    next.assigned_at = Some(now);
                }
                SlotType::Backup1 => next.backup1_volunteer_id = Some(volunteer_id),
                SlotType::Backup2 => next.backup2_volunteer_id = Some(volunteer_id),
            }
        }

        ShiftAction::Confirm { volunteer_id } => {
            if shift.volunteer_id != Some(volunteer_id) {
                return Err(TransitionError::NotAssignedVolunteer);
            }
            if shift.status != ShiftStatus::Assigned {
                return Err(TransitionError::NotAwaitingConfirmation);
            }
            next.status = ShiftStatus::Confirmed;
            next.confirmed_at = Some(now);
        }

        ShiftAction::Decline { volunteer_id } | ShiftAction::Cancel { volunteer_id } => {
            if shift.volunteer_id != Some(volunteer_id) {
                return Err(TransitionError::NotAssignedVolunteer);
            }
            vacate_primary(&mut next);
        }

        ShiftAction::AutoReopen => {
            if shift.status != ShiftStatus::Assigned {
                return Err(TransitionError::NothingToReopen);
            }
            vacate_primary(&mut next);
        }
    }

    if !next.status_matches_primary() || !next.slots_pairwise_distinct() {
        return Err(TransitionError::InvariantViolation);
    }

    Ok(next)
}

/// Decline, Cancel and AutoReopen share one effect: the primary slot is
/// vacated and both lifecycle timestamps reset. Backups stay in place; they
/// are never promoted automatically, re-escalation handles the refill.
fn vacate_primary(shift: &mut Shift) {
    shift.status = ShiftStatus::Open;
    shift.volunteer_id = None;
    shift.assigned_at = None;
    shift.confirmed_at = None;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 20, 12, 0, 0).unwrap()
    }

    fn open_shift() -> Shift {
        Shift {
            id: 1,
            date: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            time_slot_id: 1,
            role: crate::models::ShiftRole::Phone,
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

    fn assigned_shift(volunteer_id: i32) -> Shift {
        let shift = open_shift();
        apply(
            &shift,
            &ShiftAction::Assign {
                volunteer_id,
                slot: SlotType::Primary,
            },
            now(),
        )
        .unwrap()
    }

    #[test]
    fn assign_primary_moves_open_to_assigned() {
        let next = assigned_shift(5);
        assert_eq!(next.status, ShiftStatus::Assigned);
        assert_eq!(next.volunteer_id, Some(5));
        assert_eq!(next.assigned_at, Some(now()));
        assert_eq!(next.confirmed_at, None);
    }

    #[test]
    fn assign_backup_leaves_status_alone() {
        let shift = open_shift();
        let next = apply(
            &shift,
            &ShiftAction::Assign {
                volunteer_id: 5,
                slot: SlotType::Backup1,
            },
            now(),
        )
        .unwrap();

        assert_eq!(next.status, ShiftStatus::Open);
        assert_eq!(next.backup1_volunteer_id, Some(5));
        assert_eq!(next.assigned_at, None);
    }

    #[test]
    fn assign_occupied_slot_is_rejected() {
        let shift = assigned_shift(5);
        let err = apply(
            &shift,
            &ShiftAction::Assign {
                volunteer_id: 6,
                slot: SlotType::Primary,
            },
            now(),
        )
        .unwrap_err();
        assert_eq!(err, TransitionError::SlotUnavailable);
    }

    #[test]
    fn volunteer_cannot_hold_two_slots() {
        let shift = assigned_shift(5);
        let err = apply(
            &shift,
            &ShiftAction::Assign {
                volunteer_id: 5,
                slot: SlotType::Backup1,
            },
            now(),
        )
        .unwrap_err();
        assert_eq!(err, TransitionError::AlreadyOnShift);
    }

    #[test]
    fn confirm_by_primary() {
        let shift = assigned_shift(5);
        let next = apply(&shift, &ShiftAction::Confirm { volunteer_id: 5 }, now()).unwrap();
        assert_eq!(next.status, ShiftStatus::Confirmed);
        assert_eq!(next.confirmed_at, Some(now()));
    }

    #[test]
    fn confirm_by_someone_else_is_rejected() {
        let shift = assigned_shift(5);
        let err = apply(&shift, &ShiftAction::Confirm { volunteer_id: 6 }, now()).unwrap_err();
        assert_eq!(err, TransitionError::NotAssignedVolunteer);
    }

    #[test]
    fn confirm_twice_is_rejected() {
        let shift = assigned_shift(5);
        let confirmed = apply(&shift, &ShiftAction::Confirm { volunteer_id: 5 }, now()).unwrap();
        let err =
            apply(&confirmed, &ShiftAction::Confirm { volunteer_id: 5 }, now()).unwrap_err();
        assert_eq!(err, TransitionError::NotAwaitingConfirmation);
    }

    #[test]
    fn decline_vacates_primary_and_resets_timestamps() {
        let shift = assigned_shift(5);
        let next = apply(&shift, &ShiftAction::Decline { volunteer_id: 5 }, now()).unwrap();

        assert_eq!(next.status, ShiftStatus::Open);
        assert_eq!(next.volunteer_id, None);
        assert_eq!(next.assigned_at, None);
        assert_eq!(next.confirmed_at, None);
    }

    #[test]
    fn cancel_works_on_confirmed_shift() {
        let shift = assigned_shift(5);
        let confirmed = apply(&shift, &ShiftAction::Confirm { volunteer_id: 5 }, now()).unwrap();
        let next = apply(&confirmed, &ShiftAction::Cancel { volunteer_id: 5 }, now()).unwrap();

        assert_eq!(next.status, ShiftStatus::Open);
        assert_eq!(next.volunteer_id, None);
        assert_eq!(next.confirmed_at, None);
    }

    #[test]
    fn decline_keeps_backups_in_place() {
        let mut shift = assigned_shift(5);
        shift.backup1_volunteer_id = Some(7);
        shift.backup2_volunteer_id = Some(8);

        let next = apply(&shift, &ShiftAction::Decline { volunteer_id: 5 }, now()).unwrap();

        // Backups are not promoted and not cleared.
        assert_eq!(next.volunteer_id, None);
        assert_eq!(next.backup1_volunteer_id, Some(7));
        assert_eq!(next.backup2_volunteer_id, Some(8));
    }

    #[test]
    fn decline_by_non_primary_is_rejected() {
        let shift = assigned_shift(5);
        let err = apply(&shift, &ShiftAction::Decline { volunteer_id: 9 }, now()).unwrap_err();
        assert_eq!(err, TransitionError::NotAssignedVolunteer);

        // Rejection mutates nothing.
        assert_eq!(shift.volunteer_id, Some(5));
        assert_eq!(shift.status, ShiftStatus::Assigned);
    }

    #[test]
    fn auto_reopen_matches_decline_effect() {
        let shift = assigned_shift(5);
        let next = apply(&shift, &ShiftAction::AutoReopen, now()).unwrap();

        assert_eq!(next.status, ShiftStatus::Open);
        assert_eq!(next.volunteer_id, None);
        assert_eq!(next.assigned_at, None);
        assert_eq!(next.confirmed_at, None);
    }

    #[test]
    fn auto_reopen_skips_confirmed_and_open_shifts() {
        let shift = assigned_shift(5);
        let confirmed = apply(&shift, &ShiftAction::Confirm { volunteer_id: 5 }, now()).unwrap();
        assert_eq!(
            apply(&confirmed, &ShiftAction::AutoReopen, now()).unwrap_err(),
            TransitionError::NothingToReopen
        );
        assert_eq!(
            apply(&open_shift(), &ShiftAction::AutoReopen, now()).unwrap_err(),
            TransitionError::NothingToReopen
        );
    }

    #[test]
    fn reminder_flags_survive_reopen() {
        let mut shift = assigned_shift(5);
        shift.reminder_sent_7_days = true;

        let next = apply(&shift, &ShiftAction::AutoReopen, now()).unwrap();
        assert!(next.reminder_sent_7_days);
    }
}
