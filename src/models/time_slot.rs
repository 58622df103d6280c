use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct TimeSlot {
    pub id: i32,
    pub label: String,
    pub start_time: NaiveTime,
    pub duration_minutes: i32,
    pub is_active: bool,
    pub sort_order: i32,
}

/// Shift start instants are stored as date + slot start time, interpreted
/// as UTC.
pub fn start_datetime(date: NaiveDate, start_time: NaiveTime) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(start_time))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_datetime_combines_date_and_slot_time() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let start = start_datetime(date, NaiveTime::from_hms_opt(9, 0, 0).unwrap());
        assert_eq!(start.to_rfc3339(), "2026-03-01T09:00:00+00:00");
    }
}
