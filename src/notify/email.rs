//! SMTP transport.

use super::settings::EmailSettings;
use super::{EmailMessage, EmailTransport, NotifyError};
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};

pub const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

const STARTTLS_PORT: u16 = 587;
const DEFAULT_ATTACHMENT_NAME: &str = "usage_report.xlsx";

pub struct SmtpMailer {
    transport: SmtpTransport,
}

impl SmtpMailer {
    /// Implicit TLS on every port except 587, which upgrades with STARTTLS.
    pub fn new(settings: &EmailSettings) -> Result<Self, NotifyError> {
        let builder = if settings.smtp_port == STARTTLS_PORT {
            SmtpTransport::starttls_relay(&settings.smtp_host)
        } else {
            SmtpTransport::relay(&settings.smtp_host)
        }
        .map_err(|e| NotifyError::Transport(format!("{}: {}", settings.smtp_host, e)))?;

        let credentials = Credentials::new(settings.sender.clone(), settings.password.clone());
        Ok(Self {
            transport: builder
                .port(settings.smtp_port)
                .credentials(credentials)
                .build(),
        })
    }
}

impl EmailTransport for SmtpMailer {
    fn send_email(&self, message: &EmailMessage) -> Result<(), NotifyError> {
        let email = build_message(message)?;
        self.transport
            .send(&email)
            .map(|_| ())
            .map_err(|e| NotifyError::Transport(e.to_string()))
    }
}

fn mailbox(address: &str) -> Result<Mailbox, NotifyError> {
    address
        .parse()
        .map_err(|e| NotifyError::Build(format!("invalid address '{}': {}", address, e)))
}

/// Assembles the MIME message, reading the attachment from disk.
pub fn build_message(message: &EmailMessage) -> Result<Message, NotifyError> {
    let mut builder = Message::builder()
        .from(mailbox(&message.sender)?)
        .subject(message.subject.as_str());
    for recipient in &message.recipients {
        builder = builder.to(mailbox(recipient)?);
    }

    let text = SinglePart::plain(message.body.clone());
    let email = match &message.attachment {
        Some(path) => {
            let content = std::fs::read(path)
                .map_err(|e| NotifyError::Attachment(format!("{}: {}", path.display(), e)))?;
            let filename = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| DEFAULT_ATTACHMENT_NAME.to_string());
            let content_type = ContentType::parse(XLSX_CONTENT_TYPE)
                .map_err(|e| NotifyError::Build(format!("{:?}", e)))?;
            builder.multipart(
                MultiPart::mixed()
                    .singlepart(text)
                    .singlepart(Attachment::new(filename).body(content, content_type)),
            )
        }
        None => builder.singlepart(text),
    };

    email.map_err(|e| NotifyError::Build(e.to_string()))
}

#[cfg(test)]
#[path = "tests/email_tests.rs"]
mod tests;
