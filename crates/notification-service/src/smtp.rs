use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use crate::templates::EmailTemplate;
use crate::{Notification, NotificationChannel, NotificationConfig, NotificationError, SmtpTls};

/// Email delivery over SMTP. Every recipient is addressed on a single
/// message.
pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Vec<Mailbox>,
}

fn parse_mailbox(address: &str) -> Result<Mailbox, NotificationError> {
    address
        .parse()
        .map_err(|e| NotificationError::Config(format!("Invalid address '{}': {}", address, e)))
}

/// Sender and recipients from config. A malformed recipient is a config
/// error rather than a silently shorter list.
fn mailboxes(config: &NotificationConfig) -> Result<(Mailbox, Vec<Mailbox>), NotificationError> {
    let sender = config
        .sender()
        .ok_or_else(|| NotificationError::Config("FROM_EMAIL not set".into()))?;
    let from = parse_mailbox(&sender)?;

    if config.to.is_empty() {
        return Err(NotificationError::Config("EMAIL has no recipients".into()));
    }
    let to = config
        .to
        .iter()
        .map(|addr| parse_mailbox(addr))
        .collect::<Result<Vec<_>, _>>()?;
    Ok((from, to))
}

fn transport(
    config: &NotificationConfig,
    host: &str,
) -> Result<AsyncSmtpTransport<Tokio1Executor>, NotificationError> {
    let builder = match config.smtp_tls {
        SmtpTls::Tls => AsyncSmtpTransport::<Tokio1Executor>::relay(host),
        SmtpTls::StartTls => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host),
        SmtpTls::None => Ok(AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host)),
    }
    .map_err(|e| NotificationError::Smtp(format!("Cannot reach {}: {}", host, e)))?
    .port(config.smtp_port);

    let builder = match (&config.smtp_username, &config.smtp_password) {
        (Some(user), Some(pass)) => builder.credentials(Credentials::new(user.clone(), pass.clone())),
        _ => builder,
    };
    Ok(builder.build())
}

/// Render a notification into one HTML message for all recipients.
pub(crate) fn build_message(
    from: &Mailbox,
    to: &[Mailbox],
    notification: &Notification,
) -> Result<Message, NotificationError> {
    let builder = to
        .iter()
        .fold(Message::builder().from(from.clone()), |builder, mailbox| {
            builder.to(mailbox.clone())
        });

    builder
        .subject(notification.subject.as_str())
        .header(ContentType::TEXT_HTML)
        .body(EmailTemplate::render(notification))
        .map_err(|e| NotificationError::Smtp(format!("Cannot build '{}': {}", notification.subject, e)))
}

impl SmtpNotifier {
    pub fn new(config: &NotificationConfig) -> Result<Self, NotificationError> {
        let host = config
            .smtp_host
            .as_deref()
            .ok_or_else(|| NotificationError::Config("SMTP_HOST not set".into()))?;
        let (from, to) = mailboxes(config)?;

        Ok(Self {
            transport: transport(config, host)?,
            from,
            to,
        })
    }
}

#[async_trait]
impl NotificationChannel for SmtpNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotificationError> {
        let message = build_message(&self.from, &self.to, notification)?;
        self.transport
            .send(message)
            .await
            .map_err(|e| NotificationError::Smtp(e.to_string()))?;
        tracing::debug!("Sent '{}' to {} recipients over SMTP", notification.subject, self.to.len());
        Ok(())
    }

    fn name(&self) -> &str {
        "smtp"
    }
}
