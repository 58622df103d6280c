use chrono::{NaiveDate, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;

use super::{reminders, token_cleanup};
use crate::AppState;

/// Spawns the periodic sweep loop. The 24-hour reminder and auto-reopen run
/// every tick; the 7-day reminder and token cleanup run on the first tick of
/// each day. Every operation is idempotent, so a missed tick self-heals on
/// the next run.
pub fn spawn(state: Arc<AppState>) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(3600));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut last_daily_run: Option<NaiveDate> = None;

        loop {
            ticker.tick().await;

            // One snapshot per tick; every window comparison in this run
            // agrees on "now".
            let now = Utc::now();

            if let Err(e) = reminders::send_twenty_four_hour_reminders(
                &state.db,
                state.notifier.as_ref(),
                &state.config,
                now,
            )
            .await
            {
                tracing::error!(error = %e, "24-hour reminder job failed");
            }

            if let Err(e) = reminders::auto_reopen_unconfirmed_shifts(
                &state.db,
                state.notifier.as_ref(),
                &state.config,
                now,
            )
            .await
            {
                tracing::error!(error = %e, "auto-reopen job failed");
            }

            let today = now.date_naive();
            if last_daily_run != Some(today) {
                if let Err(e) = reminders::send_seven_day_reminders(
                    &state.db,
                    state.notifier.as_ref(),
                    &state.config,
                    now,
                )
                .await
                {
                    tracing::error!(error = %e, "7-day reminder job failed");
                }

                if let Err(e) = token_cleanup::cleanup_expired_tokens(&state.db, now).await {
                    tracing::error!(error = %e, "token cleanup job failed");
                }

                last_daily_run = Some(today);
            }
        }
    });
}
