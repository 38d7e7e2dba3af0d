use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::Utc;
use sqlx::SqlitePool;
use tokio::task::JoinHandle;
use tracing::info;

use crate::mailer::Mailer;
use crate::services::reminder::ReminderService;
use crate::settings::SettingsStore;

/// Drives the reminder scan on a fixed interval, one tick at a time.
///
/// The scheduler is a plain handle with its own lifecycle, so tests can run
/// several independent instances. Ticks are strictly sequential: the loop
/// awaits each scan before sleeping again, and nothing persists across
/// restarts, so the first tick after startup comes one full interval in.
pub struct ReminderScheduler {
    service: ReminderService,
    interval: Duration,
    started: AtomicBool,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ReminderScheduler {
    pub fn new(
        db: SqlitePool,
        mailer: Arc<dyn Mailer>,
        settings: Arc<dyn SettingsStore>,
        interval_secs: u64,
    ) -> Arc<Self> {
        Arc::new(Self {
            service: ReminderService::new(db, mailer, settings),
            interval: Duration::from_secs(interval_secs),
            started: AtomicBool::new(false),
            task: Mutex::new(None),
        })
    }

    /// Spawns the tick loop. Calling this on an already-started scheduler
    /// is a no-op, not an error.
    pub fn start(self: &Arc<Self>) {
        if self.started.swap(true, Ordering::SeqCst) {
            info!("reminder scheduler already running");
            return;
        }

        info!(
            "reminder scheduler started (interval: {:?}), checking for upcoming classes",
            self.interval
        );

        let scheduler = Arc::clone(self);
        let handle = tokio::spawn(async move {
            loop {
                tokio::time::sleep(scheduler.interval).await;

                match scheduler.service.send_due_reminders(Utc::now()).await {
                    Ok(stats) => {
                        if stats.bookings_matched > 0 {
                            info!(
                                "tick matched {} booking(s): {} sent, {} failed",
                                stats.bookings_matched, stats.emails_sent, stats.emails_failed
                            );
                        }
                    }
                    Err(err) => {
                        // A failed scan never stops the cadence.
                        tracing::warn!("reminder tick failed: {:?}", err);
                    }
                }
            }
        });

        if let Ok(mut task) = self.task.lock() {
            *task = Some(handle);
        }
    }

    /// Aborts the tick loop. Safe to call on a never-started scheduler.
    pub fn stop(&self) {
        if let Ok(mut task) = self.task.lock() {
            if let Some(handle) = task.take() {
                handle.abort();
                info!("reminder scheduler stopped");
            }
        }
        self.started.store(false, Ordering::SeqCst);
    }
}
