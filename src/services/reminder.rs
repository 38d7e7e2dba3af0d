use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::db::repository;
use crate::error::AppError;
use crate::mailer::Mailer;
use crate::settings::SettingsStore;

/// One tick of the reminder scan: reads the configured lead time, matches
/// bookings starting inside the one-minute window, and sends one email per
/// enrolled student. Enrollment, not attendance, gates eligibility.
pub struct ReminderService {
    db: SqlitePool,
    mailer: Arc<dyn Mailer>,
    settings: Arc<dyn SettingsStore>,
}

#[derive(Debug, Serialize)]
pub struct ReminderStats {
    pub bookings_matched: usize,
    pub emails_sent: usize,
    pub emails_failed: usize,
}

impl ReminderService {
    pub fn new(
        db: SqlitePool,
        mailer: Arc<dyn Mailer>,
        settings: Arc<dyn SettingsStore>,
    ) -> Self {
        Self {
            db,
            mailer,
            settings,
        }
    }

    /// Scans bookings with `start_time` in `[now + lead, now + lead + 1min)`.
    ///
    /// The window is exactly as wide as the tick interval, which is the
    /// sole deduplication mechanism: each booking falls into one tick's
    /// window over its lifetime. A lead-time change between ticks or a
    /// delayed tick can miss or double-match a booking; known limitation.
    pub async fn send_due_reminders(
        &self,
        now: DateTime<Utc>,
    ) -> Result<ReminderStats, AppError> {
        let minutes_before = self.settings.reminder_lead_minutes().await;

        let window_start = now + Duration::minutes(minutes_before as i64);
        let window_end = window_start + Duration::minutes(1);

        let upcoming =
            repository::fetch_bookings_starting_between(&self.db, window_start, window_end)
                .await?;

        let mut stats = ReminderStats {
            bookings_matched: upcoming.len(),
            emails_sent: 0,
            emails_failed: 0,
        };

        for booking in &upcoming {
            for enrollment in &booking.students {
                let student = &enrollment.student;
                info!(
                    "sending reminder for booking {} to {}",
                    booking.id, student.email
                );

                // Each send stands alone; one failure never blocks the rest.
                match self
                    .mailer
                    .send_class_reminder(
                        &student.email,
                        &student.display_name(),
                        &booking.title,
                        booking.start_time,
                        minutes_before,
                    )
                    .await
                {
                    Ok(()) => stats.emails_sent += 1,
                    Err(err) => {
                        warn!(
                            "reminder to {} for booking {} failed: {}",
                            student.email, booking.id, err
                        );
                        stats.emails_failed += 1;
                    }
                }
            }
        }

        if stats.emails_sent > 0 || stats.emails_failed > 0 {
            info!(
                "sent {} reminder email(s) for {} booking(s), {} failed",
                stats.emails_sent, stats.bookings_matched, stats.emails_failed
            );
        }

        Ok(stats)
    }
}
