use std::env;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Serialize;
use tracing::info;

use crate::error::AppError;

#[derive(Clone, Debug)]
pub struct MailerConfig {
    pub api_url: String,
    pub api_token: String,
    pub from_address: String,
}

impl MailerConfig {
    pub fn new_from_env() -> Result<Self, AppError> {
        let api_token = env::var("MAIL_API_TOKEN")
            .map_err(|_| AppError::BadRequest("MAIL_API_TOKEN is not set".to_string()))?;
        let from_address = env::var("MAIL_FROM")
            .map_err(|_| AppError::BadRequest("MAIL_FROM is not set".to_string()))?;
        let api_url = env::var("MAIL_API_URL")
            .unwrap_or_else(|_| "https://api.resend.com/emails".to_string());

        Ok(Self {
            api_url,
            api_token,
            from_address,
        })
    }
}

/// Outbound email. One send per call, success or failure, no retries.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_class_reminder(
        &self,
        to_email: &str,
        student_name: &str,
        class_title: &str,
        start_time: DateTime<Utc>,
        minutes_before: u32,
    ) -> Result<(), AppError>;
}

#[derive(Serialize)]
struct SendEmailRequest {
    from: String,
    to: Vec<String>,
    subject: String,
    html: String,
}

pub struct HttpMailer {
    client: Client,
    config: MailerConfig,
}

impl HttpMailer {
    pub fn new(config: MailerConfig) -> Result<Self, AppError> {
        // A hung mail API must not stall the reminder cadence.
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .map_err(|e| AppError::Mail(format!("Failed to build http client: {}", e)))?;
        Ok(Self { client, config })
    }
}

fn lead_time_text(minutes_before: u32) -> String {
    if minutes_before == 1 {
        "1 minute".to_string()
    } else {
        format!("{} minutes", minutes_before)
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send_class_reminder(
        &self,
        to_email: &str,
        student_name: &str,
        class_title: &str,
        start_time: DateTime<Utc>,
        minutes_before: u32,
    ) -> Result<(), AppError> {
        let time_text = lead_time_text(minutes_before);

        let request_body = SendEmailRequest {
            from: format!("StudentHub <{}>", self.config.from_address),
            to: vec![to_email.to_string()],
            subject: format!(
                "Reminder: Class starting in {} - {}",
                time_text, class_title
            ),
            html: format!(
                "<div style=\"font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto;\">\
                 <h2>Class Reminder</h2>\
                 <p>Hi {},</p>\
                 <p>This is a friendly reminder that your class is starting in {}!</p>\
                 <h3>{}</h3>\
                 <p><strong>Start Time:</strong> {}</p>\
                 <p>Please be ready to join your lesson.</p>\
                 <p style=\"color: #666; font-size: 0.9em;\">This is an automated reminder from StudentHub.</p>\
                 </div>",
                student_name,
                time_text,
                class_title,
                start_time.format("%Y-%m-%d %H:%M"),
            ),
        };

        let response = self
            .client
            .post(&self.config.api_url)
            .header(
                "Authorization",
                format!("Bearer {}", self.config.api_token),
            )
            .json(&request_body)
            .send()
            .await
            .map_err(|e| AppError::Mail(format!("send failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Mail(format!("mail API error {}: {}", status, body)));
        }

        info!("reminder email sent to {}", to_email);
        Ok(())
    }
}

/// Drops every email on the floor. Used when mail credentials are not
/// configured and by tests that do not care about delivery.
pub struct NoopMailer;

#[async_trait]
impl Mailer for NoopMailer {
    async fn send_class_reminder(
        &self,
        to_email: &str,
        _student_name: &str,
        class_title: &str,
        _start_time: DateTime<Utc>,
        _minutes_before: u32,
    ) -> Result<(), AppError> {
        info!(
            "noop mailer: skipping reminder to {} for {}",
            to_email, class_title
        );
        Ok(())
    }
}
