//! SMTP delivery behind a trait seam, so the alerter and daemon can be
//! exercised with a mock transport.

use crate::config::SmtpCfg;
use crate::error::{PoolwatchError, PoolwatchResult};
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use log::{info, warn};
use std::time::Duration;

/// Abstraction over e-mail delivery.
pub trait MailTransport {
    /// Deliver one plain-text message to every recipient. Implementations
    /// handle their own connection management and failover.
    fn send(&self, recipients: &[String], subject: &str, body: &str) -> PoolwatchResult<()>;
}

/// Production transport: tries each configured SMTP host in order until one
/// accepts the message.
pub struct SmtpMailer {
    config: SmtpCfg,
}

impl SmtpMailer {
    pub fn new(config: SmtpCfg) -> Self {
        Self { config }
    }

    fn build_message(
        &self,
        recipients: &[String],
        subject: &str,
        body: &str,
    ) -> PoolwatchResult<Message> {
        let from = self
            .config
            .from_address
            .parse()
            .map_err(|err| PoolwatchError::Mail(format!("invalid from address: {err}")))?;

        let mut builder = Message::builder()
            .from(from)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN);

        for recipient in recipients {
            let mailbox = recipient.parse().map_err(|err| {
                PoolwatchError::Mail(format!("invalid recipient '{recipient}': {err}"))
            })?;
            builder = builder.to(mailbox);
        }

        builder
            .body(body.to_string())
            .map_err(|err| PoolwatchError::Mail(format!("failed to build message: {err}")))
    }

    fn build_transport(&self, host: &str) -> PoolwatchResult<SmtpTransport> {
        let mut builder = if self.config.starttls {
            SmtpTransport::starttls_relay(host).map_err(|err| {
                PoolwatchError::Mail(format!("failed to prepare STARTTLS relay for {host}: {err}"))
            })?
        } else {
            SmtpTransport::builder_dangerous(host)
        };

        builder = builder
            .port(self.config.port)
            .timeout(Some(Duration::from_secs(self.config.timeout_secs)));

        if let (Some(username), Some(password)) = (&self.config.username, &self.config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(builder.build())
    }
}

impl MailTransport for SmtpMailer {
    fn send(&self, recipients: &[String], subject: &str, body: &str) -> PoolwatchResult<()> {
        if self.config.hosts.is_empty() {
            return Err(PoolwatchError::Mail(
                "no SMTP hosts configured".to_string(),
            ));
        }

        let message = self.build_message(recipients, subject, body)?;

        let mut last_error = None;
        for host in &self.config.hosts {
            let transport = match self.build_transport(host) {
                Ok(transport) => transport,
                Err(err) => {
                    warn!("{err}");
                    last_error = Some(err);
                    continue;
                }
            };

            match transport.send(&message) {
                Ok(_) => {
                    info!(
                        "delivered mail '{subject}' via {host} to {} recipients",
                        recipients.len()
                    );
                    return Ok(());
                }
                Err(err) => {
                    warn!("SMTP host {host} refused delivery: {err}");
                    last_error = Some(PoolwatchError::Mail(format!(
                        "delivery via {host} failed: {err}"
                    )));
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            PoolwatchError::Mail("all SMTP hosts failed".to_string())
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn smtp_config() -> SmtpCfg {
        SmtpCfg {
            hosts: vec!["mail.example.com".to_string()],
            from_address: "zfs@example.com".to_string(),
            ..SmtpCfg::default()
        }
    }

    #[test]
    fn message_building_validates_addresses() {
        let mailer = SmtpMailer::new(smtp_config());
        assert!(mailer
            .build_message(&["ops@example.com".to_string()], "subject", "body")
            .is_ok());

        assert!(matches!(
            mailer.build_message(&["not an address".to_string()], "subject", "body"),
            Err(PoolwatchError::Mail(_))
        ));

        let mut config = smtp_config();
        config.from_address = "broken".to_string();
        let mailer = SmtpMailer::new(config);
        assert!(matches!(
            mailer.build_message(&["ops@example.com".to_string()], "subject", "body"),
            Err(PoolwatchError::Mail(_))
        ));
    }

    #[test]
    fn empty_host_list_is_an_error() {
        let mut config = smtp_config();
        config.hosts.clear();
        let mailer = SmtpMailer::new(config);
        assert!(matches!(
            mailer.send(&["ops@example.com".to_string()], "subject", "body"),
            Err(PoolwatchError::Mail(_))
        ));
    }
}
