use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;

use studenthub_backend::db::repository;
use studenthub_backend::error::AppError;
use studenthub_backend::mailer::{Mailer, NoopMailer};
use studenthub_backend::models::{NewBookingRequest, NewStudentRequest};
use studenthub_backend::services::{ReminderScheduler, ReminderService};
use studenthub_backend::settings::{SettingsStore, StaticSettingsStore};

/// Records every send attempt instead of delivering anything.
#[derive(Default)]
struct RecordingMailer {
    sent: Mutex<Vec<(String, String)>>,
    fail_for: Option<String>,
}

impl RecordingMailer {
    fn failing_for(email: &str) -> Self {
        RecordingMailer {
            sent: Mutex::new(Vec::new()),
            fail_for: Some(email.to_string()),
        }
    }

    fn sent_emails(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|(email, _)| email.clone())
            .collect()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send_class_reminder(
        &self,
        to_email: &str,
        _student_name: &str,
        class_title: &str,
        _start_time: DateTime<Utc>,
        _minutes_before: u32,
    ) -> Result<(), AppError> {
        self.sent
            .lock()
            .unwrap()
            .push((to_email.to_string(), class_title.to_string()));
        if self.fail_for.as_deref() == Some(to_email) {
            return Err(AppError::Mail("simulated delivery failure".to_string()));
        }
        Ok(())
    }
}

/// Counts settings reads, which happen exactly once per tick.
struct CountingSettings {
    minutes: u32,
    reads: AtomicUsize,
}

impl CountingSettings {
    fn new(minutes: u32) -> Self {
        CountingSettings {
            minutes,
            reads: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl SettingsStore for CountingSettings {
    async fn reminder_lead_minutes(&self) -> u32 {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.minutes
    }

    async fn set_reminder_lead_minutes(&self, _minutes: u32) -> Result<(), AppError> {
        Ok(())
    }
}

async fn setup_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    pool
}

async fn create_student(pool: &SqlitePool, name: &str) -> String {
    let student = repository::insert_student(
        pool,
        NewStudentRequest {
            first_name: name.to_string(),
            last_name: "Test".to_string(),
            email: format!("{}@example.com", name.to_lowercase()),
            phone: None,
            private_rate: None,
            group_rate: None,
        },
    )
    .await
    .expect("Failed to insert student");
    student.id
}

async fn create_booking_at(
    pool: &SqlitePool,
    title: &str,
    start: DateTime<Utc>,
    student_ids: Vec<String>,
) {
    repository::insert_booking(
        pool,
        NewBookingRequest {
            title: title.to_string(),
            start_time: start,
            end_time: start + Duration::minutes(45),
            notes: None,
            student_ids,
        },
    )
    .await
    .expect("Failed to insert booking");
}

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap()
}

#[tokio::test]
async fn window_is_half_open_and_one_minute_wide() {
    let pool = setup_pool().await;
    let anna = create_student(&pool, "Anna").await;
    let bjorn = create_student(&pool, "Bjorn").await;
    let cleo = create_student(&pool, "Cleo").await;
    let dana = create_student(&pool, "Dana").await;

    let now = t0();
    // Lead time 2 minutes: window is [now+2:00, now+3:00).
    create_booking_at(&pool, "matches", now + Duration::seconds(150), vec![anna]).await;
    create_booking_at(&pool, "too late", now + Duration::seconds(181), vec![bjorn]).await;
    create_booking_at(&pool, "too soon", now + Duration::seconds(119), vec![cleo]).await;
    create_booking_at(&pool, "lower edge", now + Duration::seconds(120), vec![dana]).await;

    let mailer = Arc::new(RecordingMailer::default());
    let service = ReminderService::new(
        pool,
        mailer.clone(),
        Arc::new(StaticSettingsStore::new(2)),
    );

    let stats = service.send_due_reminders(now).await.unwrap();
    assert_eq!(stats.bookings_matched, 2);
    assert_eq!(stats.emails_sent, 2);

    let mut emails = mailer.sent_emails();
    emails.sort();
    assert_eq!(emails, vec!["anna@example.com", "dana@example.com"]);
}

#[tokio::test]
async fn upper_window_edge_is_exclusive() {
    let pool = setup_pool().await;
    let anna = create_student(&pool, "Anna").await;

    let now = t0();
    create_booking_at(&pool, "at end", now + Duration::seconds(180), vec![anna]).await;

    let mailer = Arc::new(RecordingMailer::default());
    let service = ReminderService::new(
        pool,
        mailer.clone(),
        Arc::new(StaticSettingsStore::new(2)),
    );

    let stats = service.send_due_reminders(now).await.unwrap();
    assert_eq!(stats.bookings_matched, 0);
    assert!(mailer.sent_emails().is_empty());
}

#[tokio::test]
async fn every_enrolled_student_gets_one_email_regardless_of_attendance() {
    let pool = setup_pool().await;
    let anna = create_student(&pool, "Anna").await;
    let bjorn = create_student(&pool, "Bjorn").await;
    let cleo = create_student(&pool, "Cleo").await;

    let now = t0();
    // Nobody is marked attended; reminders go out on enrollment alone.
    create_booking_at(
        &pool,
        "group class",
        now + Duration::seconds(150),
        vec![anna, bjorn, cleo],
    )
    .await;

    let mailer = Arc::new(RecordingMailer::default());
    let service = ReminderService::new(
        pool,
        mailer.clone(),
        Arc::new(StaticSettingsStore::new(2)),
    );

    let stats = service.send_due_reminders(now).await.unwrap();
    assert_eq!(stats.bookings_matched, 1);
    assert_eq!(stats.emails_sent, 3);

    let mut emails = mailer.sent_emails();
    emails.sort();
    assert_eq!(
        emails,
        vec![
            "anna@example.com",
            "bjorn@example.com",
            "cleo@example.com"
        ]
    );
}

#[tokio::test]
async fn one_failed_send_does_not_block_the_rest() {
    let pool = setup_pool().await;
    let anna = create_student(&pool, "Anna").await;
    let bjorn = create_student(&pool, "Bjorn").await;
    let cleo = create_student(&pool, "Cleo").await;

    let now = t0();
    create_booking_at(
        &pool,
        "group class",
        now + Duration::seconds(150),
        vec![anna, bjorn, cleo],
    )
    .await;

    let mailer = Arc::new(RecordingMailer::failing_for("bjorn@example.com"));
    let service = ReminderService::new(
        pool,
        mailer.clone(),
        Arc::new(StaticSettingsStore::new(2)),
    );

    let stats = service.send_due_reminders(now).await.unwrap();
    assert_eq!(stats.emails_sent, 2);
    assert_eq!(stats.emails_failed, 1);
    // All three were attempted.
    assert_eq!(mailer.sent_emails().len(), 3);
}

#[tokio::test]
async fn lead_time_setting_moves_the_window() {
    let pool = setup_pool().await;
    let anna = create_student(&pool, "Anna").await;
    let bjorn = create_student(&pool, "Bjorn").await;

    let now = t0();
    create_booking_at(&pool, "in ten", now + Duration::seconds(630), vec![anna]).await;
    create_booking_at(&pool, "in two", now + Duration::seconds(150), vec![bjorn]).await;

    let mailer = Arc::new(RecordingMailer::default());
    let service = ReminderService::new(
        pool,
        mailer.clone(),
        Arc::new(StaticSettingsStore::new(10)),
    );

    let stats = service.send_due_reminders(now).await.unwrap();
    assert_eq!(stats.bookings_matched, 1);
    assert_eq!(mailer.sent_emails(), vec!["anna@example.com"]);
}

#[tokio::test]
async fn starting_the_scheduler_twice_keeps_a_single_timer() {
    let pool = setup_pool().await;

    let settings = Arc::new(CountingSettings::new(2));
    let scheduler = ReminderScheduler::new(pool, Arc::new(NoopMailer), settings.clone(), 1);

    // Second start is a silent no-op; a doubled timer would roughly
    // double the tick count below.
    scheduler.start();
    scheduler.start();

    tokio::time::sleep(StdDuration::from_millis(3500)).await;
    scheduler.stop();

    let ticks = settings.reads.load(Ordering::SeqCst);
    assert!(
        (2..=4).contains(&ticks),
        "expected about 3 ticks from a single timer, got {}",
        ticks
    );
}

#[tokio::test]
async fn stopped_scheduler_stops_ticking() {
    let pool = setup_pool().await;

    let settings = Arc::new(CountingSettings::new(2));
    let scheduler = ReminderScheduler::new(pool, Arc::new(NoopMailer), settings.clone(), 1);

    scheduler.start();
    tokio::time::sleep(StdDuration::from_millis(1500)).await;
    scheduler.stop();

    let ticks_at_stop = settings.reads.load(Ordering::SeqCst);
    tokio::time::sleep(StdDuration::from_millis(1500)).await;
    assert_eq!(settings.reads.load(Ordering::SeqCst), ticks_at_stop);
}
