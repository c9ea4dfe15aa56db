use crate::domain::model::{EventContext, OutgoingMail, ParticipantRecord, RecordStatus};
use crate::domain::ports::Mailer;
use crate::utils::error::DispatchError;
use crate::utils::text::fill_placeholders;
use std::time::Duration;

pub const DEFAULT_SUBJECT: &str = "Your Certificate is here";

#[derive(Debug, Clone)]
pub struct DispatchSettings {
    pub send_timeout: Duration,
    /// Pause after every successful send.
    pub send_interval: Duration,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            send_timeout: Duration::from_secs(30),
            send_interval: Duration::from_millis(500),
        }
    }
}

/// Emails rendered certificates. Authenticates on the first send and reuses the session.
pub struct DispatchEngine {
    mailer: Box<dyn Mailer>,
    settings: DispatchSettings,
    authenticated: bool,
}

impl DispatchEngine {
    pub fn new(mailer: Box<dyn Mailer>, settings: DispatchSettings) -> Self {
        Self {
            mailer,
            settings,
            authenticated: false,
        }
    }

    /// Subject from the event's template (`{name}` and `{code}` are filled in), or the default.
    pub fn subject_for(event: &EventContext, record: &ParticipantRecord) -> String {
        let template = event.subject_template.as_deref().unwrap_or(DEFAULT_SUBJECT);
        fill_placeholders(template, &record.name, &record.code)
    }

    pub fn body_for(record: &ParticipantRecord) -> String {
        format!(
            "Dear {},\n\nPlease find your certificate attached.\n\nVerification code: {}\n",
            record.name, record.code
        )
    }

    pub fn is_eligible(record: &ParticipantRecord) -> Result<(), DispatchError> {
        if record.email_missing || record.email.trim().is_empty() {
            return Err(DispatchError::MissingAddress);
        }
        if record.status() != RecordStatus::Rendered {
            return Err(DispatchError::Ineligible {
                reason: format!("status is {:?}, expected Rendered", record.status()),
            });
        }
        Ok(())
    }

    async fn ensure_session(&mut self) -> Result<(), DispatchError> {
        if self.authenticated {
            return Ok(());
        }

        let seconds = self.settings.send_timeout.as_secs();
        match tokio::time::timeout(self.settings.send_timeout, self.mailer.authenticate()).await {
            Ok(Ok(())) => {
                tracing::info!("🔐 Mail session authenticated");
                self.authenticated = true;
                Ok(())
            }
            // 登入失敗影響整個批次
            Ok(Err(e)) => Err(DispatchError::Session {
                reason: e.to_string(),
            }),
            Err(_) => Err(DispatchError::Session {
                reason: format!("authentication timed out after {}s", seconds),
            }),
        }
    }

    pub async fn dispatch(
        &mut self,
        event: &EventContext,
        record: &ParticipantRecord,
        file_name: &str,
        document: &[u8],
    ) -> Result<(), DispatchError> {
        Self::is_eligible(record)?;
        self.ensure_session().await?;

        let mail = OutgoingMail {
            to: record.email.trim().to_string(),
            subject: Self::subject_for(event, record),
            body: Self::body_for(record),
            attachment_name: file_name.to_string(),
            attachment: document.to_vec(),
        };

        let seconds = self.settings.send_timeout.as_secs();
        match tokio::time::timeout(self.settings.send_timeout, self.mailer.send(&mail)).await {
            Ok(Ok(())) => {
                if !self.settings.send_interval.is_zero() {
                    tokio::time::sleep(self.settings.send_interval).await;
                }
                Ok(())
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(DispatchError::Timeout { seconds }),
        }
    }
}
