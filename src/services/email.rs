//! Outgoing mail
//!
//! `SmtpMailer` sends through lettre's async SMTP transport; `NoopMailer`
//! stands in when mail is disabled and only logs.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use lettre::{
    message::header::ContentType, transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use crate::config::MailConfig;
use crate::models::User;

#[async_trait]
pub trait Mailer: Send + Sync {
    /// Send a plain-text message
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()>;

    async fn send_welcome(&self, user: &User) -> Result<()> {
        let (subject, body) = welcome_message(user);
        self.send(&user.email, &subject, &body).await
    }
}

pub type DynMailer = Arc<dyn Mailer>;

/// Build the mailer selected by configuration
pub fn from_config(config: &MailConfig) -> Result<DynMailer> {
    if config.enabled {
        Ok(Arc::new(SmtpMailer::new(config)?))
    } else {
        Ok(Arc::new(NoopMailer))
    }
}

pub fn welcome_message(user: &User) -> (String, String) {
    let name = user.full_name.as_deref().unwrap_or(&user.username);
    let subject = "Welcome to Keel".to_string();
    let body = format!(
        "Hi {},\n\nYour account '{}' has been created.\n\nIf you did not sign up, please ignore this email.\n",
        name, user.username
    );
    (subject, body)
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
}

impl SmtpMailer {
    pub fn new(config: &MailConfig) -> Result<Self> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
            .map_err(|e| anyhow!("Failed to create SMTP transport: {}", e))?
            .port(config.smtp_port);
        if !config.username.is_empty() {
            builder = builder.credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ));
        }

        // Reject a bad sender at startup rather than on the first send
        config
            .from
            .parse::<lettre::message::Mailbox>()
            .map_err(|e| anyhow!("Invalid mail.from address: {}", e))?;

        Ok(Self {
            transport: builder.build(),
            from: config.from.clone(),
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        let email = Message::builder()
            .from(self.from.parse().map_err(|e| anyhow!("Invalid from address: {}", e))?)
            .to(to.parse().map_err(|e| anyhow!("Invalid to address: {}", e))?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| anyhow!("Failed to build email: {}", e))?;

        self.transport
            .send(email)
            .await
            .map_err(|e| anyhow!("Failed to send email: {}", e))?;
        Ok(())
    }
}

/// Mailer used when `mail.enabled` is false
pub struct NoopMailer;

#[async_trait]
impl Mailer for NoopMailer {
    async fn send(&self, to: &str, subject: &str, _body: &str) -> Result<()> {
        tracing::debug!(to, subject, "Mail disabled, not sending");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserRole;

    fn user(full_name: Option<&str>) -> User {
        User::new(
            "alice".to_string(),
            "alice@example.com".to_string(),
            "hash".to_string(),
            full_name.map(str::to_string),
            UserRole::User,
        )
    }

    #[test]
    fn test_welcome_message_uses_full_name() {
        let (subject, body) = welcome_message(&user(Some("Alice Liddell")));
        assert_eq!(subject, "Welcome to Keel");
        assert!(body.starts_with("Hi Alice Liddell,"));
        assert!(body.contains("'alice'"));

        let (_, body) = welcome_message(&user(None));
        assert!(body.starts_with("Hi alice,"));
    }

    #[tokio::test]
    async fn test_noop_mailer_succeeds() {
        NoopMailer.send_welcome(&user(None)).await.unwrap();
    }

    #[test]
    fn test_from_config_disabled_is_noop() {
        assert!(from_config(&MailConfig::default()).is_ok());
    }

    #[tokio::test]
    async fn test_smtp_mailer_rejects_bad_sender() {
        let config = MailConfig {
            enabled: true,
            smtp_host: "smtp.example.com".to_string(),
            from: "not an address".to_string(),
            ..Default::default()
        };
        assert!(SmtpMailer::new(&config).is_err());
    }
}
