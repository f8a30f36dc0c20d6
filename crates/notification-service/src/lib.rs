mod resend;
mod smtp;
mod templates;

pub use resend::ResendNotifier;
pub use smtp::SmtpNotifier;
pub use templates::{format_nok, EmailTemplate};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use portfolio_core::InvestmentSummary;
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;

/// What a notification reports on.
#[derive(Debug, Clone, Serialize)]
pub enum NotificationKind {
    /// Asset-class rebalance rows for the whole portfolio.
    PortfolioSummary {
        rows: Vec<InvestmentSummary>,
        total_value: Decimal,
        since_last: Decimal,
    },
    /// Per-holding rows for a single account.
    AccountSummary {
        account_name: String,
        rows: Vec<InvestmentSummary>,
        total_value: Decimal,
        since_last: Decimal,
    },
    AccessKeyExpiring {
        account_name: String,
        expires_at: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub subject: String,
    pub timestamp: DateTime<Utc>,
}

impl Notification {
    pub fn new(kind: NotificationKind, subject: impl Into<String>) -> Self {
        Self {
            kind,
            subject: subject.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn portfolio_summary(rows: Vec<InvestmentSummary>, total_value: Decimal, since_last: Decimal) -> Self {
        Self::new(
            NotificationKind::PortfolioSummary {
                rows,
                total_value,
                since_last,
            },
            "📈 Porteføljeoppdatering",
        )
    }

    pub fn account_summary(
        account_name: &str,
        rows: Vec<InvestmentSummary>,
        total_value: Decimal,
        since_last: Decimal,
    ) -> Self {
        Self::new(
            NotificationKind::AccountSummary {
                account_name: account_name.to_string(),
                rows,
                total_value,
                since_last,
            },
            format!("{} oppdatering", account_name),
        )
    }

    pub fn access_key_expiring(account_name: &str, expires_at: DateTime<Utc>) -> Self {
        Self::new(
            NotificationKind::AccessKeyExpiring {
                account_name: account_name.to_string(),
                expires_at,
            },
            format!("{} - Access key expiring soon", account_name),
        )
    }
}

/// Trait for notification channels.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    async fn send(&self, notification: &Notification) -> Result<(), NotificationError>;
    fn name(&self) -> &str;
}

#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("SMTP error: {0}")]
    Smtp(String),
    #[error("Resend error: {0}")]
    Resend(String),
    #[error("Configuration error: {0}")]
    Config(String),
}

#[derive(Debug, Clone)]
pub struct NotificationConfig {
    pub enabled: bool,
    pub from: Option<String>,
    pub to: Vec<String>,
    pub resend_api_key: Option<String>,
    pub smtp_host: Option<String>,
    pub smtp_port: u16,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    pub smtp_tls: SmtpTls,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum SmtpTls {
    #[default]
    StartTls,
    Tls,
    None,
}

fn non_empty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|s| !s.trim().is_empty())
}

/// Comma-separated address list.
fn parse_recipients(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            from: None,
            to: Vec::new(),
            resend_api_key: None,
            smtp_host: None,
            smtp_port: 587,
            smtp_username: None,
            smtp_password: None,
            smtp_tls: SmtpTls::default(),
        }
    }
}

impl NotificationConfig {
    /// Load from environment variables.
    pub fn from_env() -> Self {
        let smtp_tls = match std::env::var("SMTP_TLS").unwrap_or_default().as_str() {
            "tls" => SmtpTls::Tls,
            "none" => SmtpTls::None,
            _ => SmtpTls::StartTls,
        };

        Self {
            enabled: std::env::var("EMAIL_ENABLED")
                .map(|v| v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            from: non_empty("FROM_EMAIL"),
            to: parse_recipients(&std::env::var("EMAIL").unwrap_or_default()),
            resend_api_key: non_empty("RESEND_API_KEY"),
            smtp_host: non_empty("SMTP_HOST"),
            smtp_port: std::env::var("SMTP_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(587),
            smtp_username: non_empty("SMTP_USERNAME"),
            smtp_password: non_empty("SMTP_PASSWORD"),
            smtp_tls,
        }
    }

    /// Sender formatted as `Portfolio <address>`.
    pub fn sender(&self) -> Option<String> {
        self.from.as_ref().map(|from| format!("Portfolio <{}>", from))
    }
}

/// Dispatches notifications to every configured channel.
pub struct NotificationService {
    enabled: bool,
    channels: Arc<Vec<Box<dyn NotificationChannel>>>,
}

impl NotificationService {
    pub fn new(config: &NotificationConfig) -> Self {
        let mut channels: Vec<Box<dyn NotificationChannel>> = Vec::new();

        if !config.enabled {
            tracing::info!("Email disabled (set EMAIL_ENABLED=true to deliver notifications)");
            return Self::with_channels(false, channels);
        }

        if config.resend_api_key.is_some() {
            match ResendNotifier::new(config) {
                Ok(notifier) => {
                    tracing::info!("Resend notifications enabled -> {} recipients", config.to.len());
                    channels.push(Box::new(notifier));
                }
                Err(e) => tracing::warn!("Failed to initialize Resend notifier: {}", e),
            }
        }

        if config.smtp_host.is_some() {
            match SmtpNotifier::new(config) {
                Ok(notifier) => {
                    tracing::info!("SMTP notifications enabled -> {} recipients", config.to.len());
                    channels.push(Box::new(notifier));
                }
                Err(e) => tracing::warn!("Failed to initialize SMTP notifier: {}", e),
            }
        }

        if channels.is_empty() {
            tracing::warn!("Email enabled but no channel configured (set RESEND_API_KEY or SMTP_HOST)");
        }

        Self::with_channels(true, channels)
    }

    pub fn with_channels(enabled: bool, channels: Vec<Box<dyn NotificationChannel>>) -> Self {
        Self {
            enabled,
            channels: Arc::new(channels),
        }
    }

    pub fn disabled() -> Self {
        Self::with_channels(false, Vec::new())
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Fire-and-forget delivery on a spawned task.
    pub fn send(&self, notification: Notification) {
        if !self.enabled {
            tracing::info!("Email disabled, skipping \"{}\"", notification.subject);
            return;
        }
        let channels = self.channels.clone();
        tokio::spawn(async move {
            deliver(&channels, &notification).await;
        });
    }

    /// Deliver to all channels and return how many accepted it.
    pub async fn send_async(&self, notification: &Notification) -> usize {
        if !self.enabled {
            tracing::info!("Email disabled, skipping \"{}\"", notification.subject);
            return 0;
        }
        deliver(&self.channels, notification).await
    }
}

async fn deliver(channels: &[Box<dyn NotificationChannel>], notification: &Notification) -> usize {
    let mut delivered = 0;
    for channel in channels.iter() {
        match channel.send(notification).await {
            Ok(()) => {
                delivered += 1;
                tracing::debug!("Sent \"{}\" via {}", notification.subject, channel.name());
            }
            Err(e) => {
                tracing::warn!("Failed to send notification via {}: {}", channel.name(), e)
            }
        }
    }
    delivered
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting {
        sent: Arc<AtomicUsize>,
        fail: bool,
    }

    #[async_trait]
    impl NotificationChannel for Counting {
        async fn send(&self, _notification: &Notification) -> Result<(), NotificationError> {
            if self.fail {
                return Err(NotificationError::Resend("429".into()));
            }
            self.sent.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn name(&self) -> &str {
            "counting"
        }
    }

    fn expiring() -> Notification {
        Notification::access_key_expiring("Kron", Utc::now())
    }

    #[tokio::test]
    async fn test_disabled_service_skips_delivery() {
        let sent = Arc::new(AtomicUsize::new(0));
        let service = NotificationService::with_channels(
            false,
            vec![Box::new(Counting {
                sent: sent.clone(),
                fail: false,
            })],
        );
        assert_eq!(service.send_async(&expiring()).await, 0);
        assert_eq!(sent.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failing_channel_does_not_block_others() {
        let sent = Arc::new(AtomicUsize::new(0));
        let service = NotificationService::with_channels(
            true,
            vec![
                Box::new(Counting {
                    sent: sent.clone(),
                    fail: true,
                }),
                Box::new(Counting {
                    sent: sent.clone(),
                    fail: false,
                }),
            ],
        );
        assert_eq!(service.send_async(&expiring()).await, 1);
        assert_eq!(sent.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_config_defaults_to_disabled() {
        let config = NotificationConfig::default();
        assert!(!config.enabled);
        assert_eq!(config.smtp_port, 587);
        assert!(!NotificationService::new(&config).is_enabled());
    }

    #[test]
    fn test_recipients_and_sender() {
        assert_eq!(
            parse_recipients(" a@example.com, ,b@example.com"),
            vec!["a@example.com", "b@example.com"]
        );
        let config = NotificationConfig {
            from: Some("bot@example.com".into()),
            ..Default::default()
        };
        assert_eq!(config.sender().as_deref(), Some("Portfolio <bot@example.com>"));
    }

    #[test]
    fn test_subjects() {
        let summary = Notification::account_summary("Kron", vec![], Decimal::ZERO, Decimal::ZERO);
        assert_eq!(summary.subject, "Kron oppdatering");
        assert_eq!(expiring().subject, "Kron - Access key expiring soon");
    }
}
