//! Trigger loop for the daemon mode of the binary.
//!
//! Fire times are computed in the service time zone; the loop sleeps until
//! the earliest one, runs every task due at that instant in trigger order,
//! and repeats until Ctrl+C.

use std::future::Future;

use chrono::{DateTime, Days, NaiveDate, NaiveTime, TimeZone, Utc};
use tokio::time::sleep;

use crate::core::{SERVICE_TZ, YearMonth, service_date};

/// When a task fires, in service-local time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Daily { at: NaiveTime },
    /// `day` of every month (1-28).
    Monthly { day: u32, at: NaiveTime },
}

/// First fire instant strictly after `now`.
pub fn next_fire_after(trigger: Trigger, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let today = service_date(now);
    match trigger {
        Trigger::Daily { at } => {
            let candidate = local_instant(today, at)?;
            if candidate > now {
                Some(candidate)
            } else {
                local_instant(today.checked_add_days(Days::new(1))?, at)
            }
        }
        Trigger::Monthly { day, at } => {
            let this_month = YearMonth::containing(today);
            let candidate = local_instant(month_day(this_month, day)?, at)?;
            if candidate > now {
                Some(candidate)
            } else {
                local_instant(month_day(this_month.next(), day)?, at)
            }
        }
    }
}

fn month_day(month: YearMonth, day: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(month.year(), month.month(), day)
}

fn local_instant(date: NaiveDate, at: NaiveTime) -> Option<DateTime<Utc>> {
    SERVICE_TZ
        .from_local_datetime(&date.and_time(at))
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Earliest fire instant after `now` and every task due at it, in
/// trigger order.
pub fn next_due<T: Copy>(
    triggers: &[(T, Trigger)],
    now: DateTime<Utc>,
) -> Option<(DateTime<Utc>, Vec<T>)> {
    let fires: Vec<(T, DateTime<Utc>)> = triggers
        .iter()
        .filter_map(|(task, trigger)| next_fire_after(*trigger, now).map(|at| (*task, at)))
        .collect();
    let at = fires.iter().map(|(_, at)| *at).min()?;
    let tasks = fires
        .into_iter()
        .filter(|(_, fire)| *fire == at)
        .map(|(task, _)| task)
        .collect();
    Some((at, tasks))
}

/// Run `on_fire` for each task whenever its trigger comes due.
///
/// Returns when Ctrl+C is received, or immediately if no trigger can fire.
pub async fn run_triggers<T, F, Fut>(triggers: &[(T, Trigger)], mut on_fire: F)
where
    T: Copy + std::fmt::Debug,
    F: FnMut(T, DateTime<Utc>) -> Fut,
    Fut: Future<Output = ()>,
{
    info!("Scheduler started with {} triggers", triggers.len());

    loop {
        let now = Utc::now();
        let Some((at, tasks)) = next_due(triggers, now) else {
            warn!("No trigger can fire, stopping scheduler");
            return;
        };

        let wait = (at - now).to_std().unwrap_or_default();
        info!("Next tasks {:?} at {} (in {}s)", tasks, at, wait.as_secs());

        tokio::select! {
            _ = sleep(wait) => {}
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, stopping scheduler");
                return;
            }
        }

        for task in tasks {
            on_fire(task, at).await;
        }
    }
}
