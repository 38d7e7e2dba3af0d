use std::net::SocketAddr;
use std::sync::Arc;

use sqlx::sqlite::SqlitePoolOptions;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use studenthub_backend::mailer::{HttpMailer, Mailer, MailerConfig, NoopMailer};
use studenthub_backend::routes::router;
use studenthub_backend::services::ReminderScheduler;
use studenthub_backend::settings::FileSettingsStore;
use studenthub_backend::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "studenthub_backend=debug".to_string()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://studenthub.db".to_string());

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    let mailer: Arc<dyn Mailer> = match MailerConfig::new_from_env() {
        Ok(config) => Arc::new(HttpMailer::new(config)?),
        Err(err) => {
            warn!("mail not configured ({}), reminders will be dropped", err);
            Arc::new(NoopMailer)
        }
    };

    let settings_path = std::env::var("EMAIL_SETTINGS_FILE")
        .unwrap_or_else(|_| "email-settings.json".to_string());
    let settings = Arc::new(FileSettingsStore::new(settings_path));

    // Reminder scan runs once per minute for the whole process lifetime.
    let scheduler = ReminderScheduler::new(pool.clone(), mailer, settings.clone(), 60);
    scheduler.start();

    let state = AppState {
        db: pool.clone(),
        settings,
    };

    let app = router(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], 3000));
    info!("listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
