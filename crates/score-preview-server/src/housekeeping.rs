//! Scheduled cache clearing.
//!
//! Sleeps until the next weekly slot, drops every cached preview, and repeats
//! until shutdown is signalled.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Datelike, NaiveTime, Utc};
use tokio::sync::Notify;

use score_preview::PreviewCache;

use crate::config::ClearSchedule;

/// The first slot matching `schedule` strictly after `now`.
pub fn next_run_after(now: DateTime<Utc>, schedule: ClearSchedule) -> DateTime<Utc> {
    let time = NaiveTime::from_hms_opt(schedule.hour, 0, 0).unwrap_or_default();
    let days_ahead = (7 + schedule.weekday.num_days_from_monday()
        - now.weekday().num_days_from_monday())
        % 7;

    let candidate = (now.date_naive() + chrono::Days::new(u64::from(days_ahead)))
        .and_time(time)
        .and_utc();

    if candidate > now {
        candidate
    } else {
        candidate + chrono::Duration::days(7)
    }
}

/// Spawn the clearing loop. It exits when `shutdown` is notified.
pub fn spawn(
    cache: Arc<PreviewCache>,
    schedule: ClearSchedule,
    shutdown: Arc<Notify>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        tracing::info!(
            "housekeeping loop started: clear every {} at {:02}:00 UTC",
            schedule.weekday,
            schedule.hour
        );

        loop {
            let now = Utc::now();
            let next = next_run_after(now, schedule);
            let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
            tracing::debug!("next cache clear at {next}");

            tokio::select! {
                _ = shutdown.notified() => {
                    tracing::info!("housekeeping loop stopping");
                    break;
                }
                _ = tokio::time::sleep(wait) => {
                    let removed = cache.clear_all().await;
                    tracing::info!("scheduled cache clear removed {removed} entries");
                }
            }
        }
    })
}
