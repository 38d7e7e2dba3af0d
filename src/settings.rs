use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::AppError;

pub const DEFAULT_LEAD_MINUTES: u32 = 2;
pub const MIN_LEAD_MINUTES: u32 = 1;
pub const MAX_LEAD_MINUTES: u32 = 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailSettings {
    #[serde(rename = "minutesBefore")]
    pub minutes_before: u32,
}

impl Default for EmailSettings {
    fn default() -> Self {
        EmailSettings {
            minutes_before: DEFAULT_LEAD_MINUTES,
        }
    }
}

/// Key-value configuration the reminder scheduler reads on every tick.
/// Abstracted so tests can swap in an in-memory store.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Reminder lead time in minutes. Falls back to the default when the
    /// setting is absent, unreadable, or out of the 1..=60 contract.
    async fn reminder_lead_minutes(&self) -> u32;

    async fn set_reminder_lead_minutes(&self, minutes: u32) -> Result<(), AppError>;
}

/// JSON-file-backed settings, the same `email-settings.json` the admin UI
/// edits. Read fresh on each access so out-of-band edits are picked up.
pub struct FileSettingsStore {
    path: PathBuf,
}

impl FileSettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileSettingsStore { path: path.into() }
    }

    fn read(&self) -> Option<EmailSettings> {
        let data = std::fs::read_to_string(&self.path).ok()?;
        match serde_json::from_str::<EmailSettings>(&data) {
            Ok(settings) => Some(settings),
            Err(err) => {
                warn!("unreadable settings file {:?}: {}", self.path, err);
                None
            }
        }
    }
}

#[async_trait]
impl SettingsStore for FileSettingsStore {
    async fn reminder_lead_minutes(&self) -> u32 {
        match self.read() {
            Some(settings)
                if (MIN_LEAD_MINUTES..=MAX_LEAD_MINUTES).contains(&settings.minutes_before) =>
            {
                settings.minutes_before
            }
            Some(settings) => {
                warn!(
                    "minutesBefore {} outside 1..=60, using default",
                    settings.minutes_before
                );
                DEFAULT_LEAD_MINUTES
            }
            None => DEFAULT_LEAD_MINUTES,
        }
    }

    async fn set_reminder_lead_minutes(&self, minutes: u32) -> Result<(), AppError> {
        if !(MIN_LEAD_MINUTES..=MAX_LEAD_MINUTES).contains(&minutes) {
            return Err(AppError::BadRequest(
                "minutesBefore must be between 1 and 60".to_string(),
            ));
        }
        let settings = EmailSettings {
            minutes_before: minutes,
        };
        let data = serde_json::to_string_pretty(&settings)
            .map_err(|_| AppError::InternalServerError)?;
        std::fs::write(&self.path, data).map_err(|err| {
            warn!("failed to write settings file {:?}: {}", self.path, err);
            AppError::InternalServerError
        })
    }
}

/// Fixed-value store for tests and for running without a settings file.
pub struct StaticSettingsStore {
    minutes_before: u32,
}

impl StaticSettingsStore {
    pub fn new(minutes_before: u32) -> Self {
        StaticSettingsStore { minutes_before }
    }
}

#[async_trait]
impl SettingsStore for StaticSettingsStore {
    async fn reminder_lead_minutes(&self) -> u32 {
        self.minutes_before
    }

    async fn set_reminder_lead_minutes(&self, _minutes: u32) -> Result<(), AppError> {
        Ok(())
    }
}
