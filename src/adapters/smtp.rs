use crate::domain::model::{OutgoingMail, SenderCredentials};
use crate::domain::ports::Mailer;
use crate::utils::error::DispatchError;
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SmtpSecurity {
    /// Implicit TLS, usually port 465.
    #[default]
    Tls,
    /// STARTTLS upgrade, usually port 587.
    Starttls,
}

#[derive(Debug, Clone)]
pub struct SmtpSettings {
    pub server: String,
    pub port: u16,
    pub security: SmtpSecurity,
    pub timeout: Duration,
}

impl Default for SmtpSettings {
    fn default() -> Self {
        Self {
            server: "smtp.gmail.com".to_string(),
            port: 465,
            security: SmtpSecurity::Tls,
            timeout: Duration::from_secs(30),
        }
    }
}

pub struct SmtpMailer {
    settings: SmtpSettings,
    credentials: SenderCredentials,
    transport: Option<AsyncSmtpTransport<Tokio1Executor>>,
}

impl SmtpMailer {
    pub fn new(settings: SmtpSettings, credentials: SenderCredentials) -> Self {
        Self {
            settings,
            credentials,
            transport: None,
        }
    }

    fn build_transport(&self) -> Result<AsyncSmtpTransport<Tokio1Executor>, DispatchError> {
        let builder = match self.settings.security {
            SmtpSecurity::Tls => AsyncSmtpTransport::<Tokio1Executor>::relay(&self.settings.server),
            SmtpSecurity::Starttls => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.settings.server),
        }
        .map_err(|e| DispatchError::Session {
            reason: format!("cannot configure {}: {}", self.settings.server, e),
        })?;

        Ok(builder
            .port(self.settings.port)
            .credentials(Credentials::new(
                self.credentials.address.clone(),
                self.credentials.secret.clone(),
            ))
            .timeout(Some(self.settings.timeout))
            .build())
    }

    fn build_message(&self, mail: &OutgoingMail) -> Result<Message, DispatchError> {
        let from: Mailbox = self.credentials.address.parse().map_err(|e: lettre::address::AddressError| {
            DispatchError::Session {
                reason: format!("sender address '{}' is invalid: {}", self.credentials.address, e),
            }
        })?;
        let to: Mailbox = mail
            .to
            .parse()
            .map_err(|e: lettre::address::AddressError| DispatchError::InvalidAddress {
                address: mail.to.clone(),
                reason: e.to_string(),
            })?;
        let pdf = ContentType::parse("application/pdf").map_err(|e| DispatchError::Message {
            reason: e.to_string(),
        })?;

        Message::builder()
            .from(from)
            .to(to)
            .subject(mail.subject.clone())
            .multipart(
                MultiPart::mixed()
                    .singlepart(SinglePart::plain(mail.body.clone()))
                    .singlepart(Attachment::new(mail.attachment_name.clone()).body(mail.attachment.clone(), pdf)),
            )
            .map_err(|e| DispatchError::Message {
                reason: e.to_string(),
            })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn authenticate(&mut self) -> Result<(), DispatchError> {
        let transport = self.build_transport()?;
        tracing::debug!(
            "Connecting to {}:{} as {}",
            self.settings.server,
            self.settings.port,
            self.credentials.address
        );

        match transport.test_connection().await {
            Ok(true) => {
                self.transport = Some(transport);
                Ok(())
            }
            Ok(false) => Err(DispatchError::Session {
                reason: format!("{} refused the connection", self.settings.server),
            }),
            Err(e) => Err(DispatchError::Session { reason: e.to_string() }),
        }
    }

    async fn send(&mut self, mail: &OutgoingMail) -> Result<(), DispatchError> {
        let message = self.build_message(mail)?;
        let transport = self.transport.as_ref().ok_or_else(|| DispatchError::Session {
            reason: "send attempted before authentication".to_string(),
        })?;

        let seconds = self.settings.timeout.as_secs();
        transport
            .send(message)
            .await
            .map(|_| ())
            .map_err(|e| classify_smtp_error(e, seconds))
    }
}

// 530/534/535 代表帳密或授權問題，整個批次都無法繼續
fn classify_smtp_error(e: lettre::transport::smtp::Error, timeout_seconds: u64) -> DispatchError {
    let code = e.status().map(|c| c.to_string());
    match code.as_deref() {
        Some("530") | Some("534") | Some("535") => DispatchError::Session { reason: e.to_string() },
        _ if e.is_timeout() => DispatchError::Timeout {
            seconds: timeout_seconds,
        },
        _ => DispatchError::Transport { reason: e.to_string() },
    }
}
