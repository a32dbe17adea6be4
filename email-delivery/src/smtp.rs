use async_trait::async_trait;
use interfaces::defs::{DeliveryError, MailTransport, OutgoingMail};
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::time::Duration;
use tracing::{debug, info};

/// Port on which the server expects TLS from the first byte.
pub const IMPLICIT_TLS_PORT: u16 = 465;

#[derive(Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    /// `From` address; falls back to `username` when empty.
    pub sender: String,
    pub timeout: Duration,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 587,
            username: String::new(),
            password: String::new(),
            sender: String::new(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl std::fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"***")
            .field("sender", &self.sender)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl SmtpConfig {
    pub fn is_complete(&self) -> bool {
        !self.host.is_empty() && !self.sender_address().is_empty()
    }

    fn sender_address(&self) -> &str {
        if self.sender.is_empty() {
            &self.username
        } else {
            &self.sender
        }
    }
}

/// [`MailTransport`] over SMTP. Port 465 uses implicit TLS, every other port
/// STARTTLS.
pub struct SmtpMailer {
    from: Mailbox,
    transport: AsyncSmtpTransport<Tokio1Executor>,
    config: SmtpConfig,
}

impl SmtpMailer {
    pub fn new(config: SmtpConfig) -> Result<Self, DeliveryError> {
        let from = parse_mailbox(config.sender_address())?;

        let builder = if config.port == IMPLICIT_TLS_PORT {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
        }
        .map_err(|e| DeliveryError::Transport(e.to_string()))?;

        let mut builder = builder.port(config.port).timeout(Some(config.timeout));
        if !config.username.is_empty() {
            builder = builder.credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ));
        }

        Ok(Self {
            from,
            transport: builder.build(),
            config,
        })
    }

    /// Builds the multipart/alternative message. With no `to` addresses the
    /// sender is shown as `To` so strict MTAs accept the header; the envelope
    /// still reaches cc and bcc. Whether anyone should receive the message at
    /// all is the caller's call.
    pub fn build_message(&self, mail: &OutgoingMail) -> Result<Message, DeliveryError> {
        let mut builder = Message::builder()
            .from(self.from.clone())
            .subject(mail.subject.as_str());

        if mail.recipients.to.is_empty() {
            builder = builder.to(self.from.clone());
        }
        for address in &mail.recipients.to {
            builder = builder.to(parse_mailbox(address)?);
        }
        for address in &mail.recipients.cc {
            builder = builder.cc(parse_mailbox(address)?);
        }
        for address in &mail.recipients.bcc {
            builder = builder.bcc(parse_mailbox(address)?);
        }

        let text_body = if mail.text_body.is_empty() {
            "See HTML body for details.".to_string()
        } else {
            mail.text_body.clone()
        };

        builder
            .multipart(MultiPart::alternative_plain_html(text_body, mail.html_body.clone()))
            .map_err(|e| DeliveryError::Build(e.to_string()))
    }
}

#[async_trait]
impl MailTransport for SmtpMailer {
    async fn send(&self, mail: &OutgoingMail) -> Result<(), DeliveryError> {
        let message = self.build_message(mail)?;

        debug!("Connecting to {}:{}", self.config.host, self.config.port);
        self.transport
            .send(message)
            .await
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;

        info!(
            to = ?mail.recipients.to,
            subject = %mail.subject,
            "Email sent successfully"
        );
        Ok(())
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, DeliveryError> {
    address
        .parse::<Mailbox>()
        .map_err(|e| DeliveryError::InvalidAddress {
            address: address.to_string(),
            reason: e.to_string(),
        })
}
