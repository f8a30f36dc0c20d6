use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

use crate::templates::EmailTemplate;
use crate::{Notification, NotificationChannel, NotificationConfig, NotificationError};

const RESEND_URL: &str = "https://api.resend.com/emails";

#[derive(Debug, Serialize)]
struct ResendEmail<'a> {
    from: &'a str,
    to: &'a [String],
    subject: &'a str,
    html: String,
}

/// Email delivery through the Resend HTTP API.
pub struct ResendNotifier {
    client: reqwest::Client,
    api_key: String,
    from: String,
    to: Vec<String>,
}

impl ResendNotifier {
    pub fn new(config: &NotificationConfig) -> Result<Self, NotificationError> {
        let api_key = config
            .resend_api_key
            .clone()
            .ok_or_else(|| NotificationError::Config("RESEND_API_KEY not set".into()))?;
        let from = config
            .sender()
            .ok_or_else(|| NotificationError::Config("FROM_EMAIL not set".into()))?;
        if config.to.is_empty() {
            return Err(NotificationError::Config("EMAIL has no recipients".into()));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| NotificationError::Resend(e.to_string()))?;

        Ok(Self {
            client,
            api_key,
            from,
            to: config.to.clone(),
        })
    }
}

#[async_trait]
impl NotificationChannel for ResendNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotificationError> {
        let email = ResendEmail {
            from: &self.from,
            to: &self.to,
            subject: &notification.subject,
            html: EmailTemplate::render(notification),
        };

        let response = self
            .client
            .post(RESEND_URL)
            .bearer_auth(&self.api_key)
            .json(&email)
            .send()
            .await
            .map_err(|e| NotificationError::Resend(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(NotificationError::Resend(format!("{}: {}", status, error_text)));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| NotificationError::Resend(e.to_string()))?;
        tracing::info!("Email sent - id: {}", body["id"]);
        Ok(())
    }

    fn name(&self) -> &str {
        "resend"
    }
}
