use std::sync::Arc;

use sqlx::SqlitePool;

use crate::settings::SettingsStore;

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub settings: Arc<dyn SettingsStore>,
}
