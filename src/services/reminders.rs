use chrono::{DateTime, Duration, Utc};
use futures::future;
use sqlx::SqlitePool;
use tokio_cron_scheduler::{Job, JobScheduler};

use crate::{
    db::{
        models::{NotificationKind, Prescription},
        notifications::{self, NewNotification},
        prescriptions,
    },
    utils::format_date,
};

pub const REMINDER_TITLE: &str = "Refill Reminder";

/// Schedules the refill reminder job.
///
/// The job runs on `cron` (six fields, seconds first) and notifies every
/// customer whose refill falls due within `window_days`. The scheduler is
/// started on its own task; the returned handle can be used to shut it down.
pub async fn schedule_refill_reminders(
    pool: SqlitePool,
    cron: &str,
    window_days: i64,
) -> Result<JobScheduler, Box<dyn std::error::Error + Send + Sync>> {
    let sched = JobScheduler::new().await?;

    let job = Job::new_async(cron, move |_uuid, _l| {
        let pool = pool.clone();
        Box::pin(async move {
            log::info!("Running refill reminder job");
            match send_due_refill_reminders(&pool, Utc::now(), window_days).await {
                Ok(sent) => log::info!("Refill reminder job finished, {} reminders sent", sent),
                Err(e) => log::error!("Refill reminder job failed: {}", e),
            }
        })
    })
    .map_err(|e| {
        log::error!("Failed to create refill reminder job: {}", e);
        e
    })?;

    sched.add(job).await.map_err(|e| {
        log::error!("Failed to add refill reminder job to scheduler: {}", e);
        e
    })?;

    sched.start().await?;

    log::info!("Refill reminder scheduler started ({})", cron);
    Ok(sched)
}

/// Notifies customers about prescriptions due on or before `now + window_days`.
///
/// A reminder identical to one sent in the last 24 hours is skipped. Failures
/// for one prescription are logged and do not stop the others. Returns how
/// many reminders were created.
pub async fn send_due_refill_reminders(
    pool: &SqlitePool,
    now: DateTime<Utc>,
    window_days: i64,
) -> Result<usize, sqlx::Error> {
    let due = prescriptions::due_before(pool, now + Duration::days(window_days)).await?;
    let since = now - Duration::hours(24);

    let results = future::join_all(due.iter().map(|p| remind(pool, p, since))).await;

    let mut sent = 0;
    for (prescription, result) in due.iter().zip(results) {
        match result {
            Ok(true) => sent += 1,
            Ok(false) => {}
            Err(e) => log::error!(
                "Failed to send refill reminder for prescription {}: {}",
                prescription.id,
                e
            ),
        }
    }
    Ok(sent)
}

pub fn reminder_message(prescription: &Prescription) -> String {
    format!(
        "Friendly reminder: Your refill for {} is due by {}.",
        prescription.medicine_name,
        format_date(prescription.next_refill_date.date_naive())
    )
}

async fn remind(pool: &SqlitePool, prescription: &Prescription, since: DateTime<Utc>) -> Result<bool, sqlx::Error> {
    let message = reminder_message(prescription);

    if notifications::exists_since(pool, prescription.customer_id, REMINDER_TITLE, &message, since).await? {
        return Ok(false);
    }

    notifications::insert(
        pool,
        NewNotification {
            user_id: prescription.customer_id,
            title: REMINDER_TITLE.to_string(),
            message,
            kind: NotificationKind::Warning,
        },
    )
    .await?;
    Ok(true)
}
