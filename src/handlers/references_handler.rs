use axum::{extract::State, Json};
use std::sync::Arc;

use crate::{models::TimeSlot, AppResult, AppState};

/// GET /api/time-slots - active time slots, for the self-service request form
#[utoipa::path(
    get,
    path = "/api/time-slots",
    responses(
        (status = 200, description = "Active time slots in display order", body = Vec<TimeSlot>)
    ),
    tag = "references"
)]
pub async fn get_time_slots(
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<Vec<TimeSlot>>> {
    let slots = sqlx::query_as::<_, TimeSlot>(
        r#"
        SELECT id, label, start_time, duration_minutes, is_active, sort_order
        FROM "TimeSlots"
        WHERE is_active
        ORDER BY sort_order, start_time
        "#,
    )
    .fetch_all(&state.db)
    .await?;

    Ok(Json(slots))
}
