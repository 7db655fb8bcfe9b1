//! SMTP notifier (implicit TLS, `lettre`)

use crate::error::{RemoteError, Result};
use crate::notify::{validate_email_syntax, Delivery, Notification, Notifier};
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::Path;
use std::time::Duration;

fn default_port() -> u16 {
    465
}

/// SMTP account used to send reports
#[derive(Clone, Deserialize)]
pub struct SmtpSettings {
    /// From address; also the BCC target when `bcc_self` is set
    pub sender: String,
    pub server: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Defaults to `sender`
    #[serde(default)]
    pub username: Option<String>,
    pub password: String,
}

impl SmtpSettings {
    pub fn destination(&self) -> String {
        format!("smtps://{}:{}", self.server, self.port)
    }
}

impl fmt::Debug for SmtpSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpSettings")
            .field("sender", &self.sender)
            .field("server", &self.server)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Sends notifications through one SMTP relay
pub struct SmtpNotifier {
    settings: SmtpSettings,
}

impl SmtpNotifier {
    pub fn new(settings: SmtpSettings) -> Self {
        Self { settings }
    }

    fn send_err(&self, message: impl ToString) -> RemoteError {
        RemoteError::Send {
            destination: self.settings.destination(),
            message: message.to_string(),
        }
    }

    /// Assemble the MIME message without sending it.
    pub fn build_message(&self, notification: &Notification) -> Result<(Message, bool)> {
        validate_email_syntax(&notification.to)?;
        validate_email_syntax(&[self.settings.sender.as_str()])?;

        let from: Mailbox = parse_mailbox(&self.settings.sender)?;
        let mut builder = Message::builder()
            .from(from.clone())
            .subject(notification.subject.clone());
        for to in &notification.to {
            builder = builder.to(parse_mailbox(to)?);
        }
        if notification.bcc_self {
            builder = builder.bcc(from);
        }

        let mut body = MultiPart::mixed().singlepart(SinglePart::html(notification.html_body.clone()));
        let mut attached = false;
        if let Some(path) = notification.attachment.as_deref() {
            if path.is_file() {
                body = body.singlepart(attachment_part(path)?);
                attached = true;
            } else {
                tracing::warn!(path = %path.display(), "Attachment not found, sending without it");
            }
        }

        let message = builder.multipart(body).map_err(|e| self.send_err(e))?;
        Ok((message, attached))
    }
}

impl Notifier for SmtpNotifier {
    fn send(&self, notification: &Notification) -> Result<Delivery> {
        let (message, attached) = self.build_message(notification)?;

        let username = self
            .settings
            .username
            .clone()
            .unwrap_or_else(|| self.settings.sender.clone());
        let transport = SmtpTransport::relay(&self.settings.server)
            .map_err(|e| RemoteError::Connect {
                destination: self.settings.destination(),
                message: e.to_string(),
            })?
            .port(self.settings.port)
            .timeout(Some(Duration::from_secs(60)))
            .credentials(Credentials::new(username, self.settings.password.clone()))
            .build();

        let response = transport.send(&message).map_err(|e| self.send_err(e))?;
        let lines: Vec<String> = response.message().map(|line| line.to_string()).collect();
        let diagnostics = format!("{} {}", response.code(), lines.join(" "));

        tracing::info!(
            destination = %self.settings.destination(),
            recipients = %notification.to.join(", "),
            attached,
            "Notification sent"
        );

        Ok(Delivery {
            recipients: notification.to.clone(),
            attached,
            diagnostics,
        })
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox> {
    address
        .trim()
        .parse::<Mailbox>()
        .map_err(|_| RemoteError::InvalidAddress(address.to_string()))
}

fn attachment_part(path: &Path) -> Result<SinglePart> {
    let content = fs::read(path).map_err(|e| RemoteError::local(path, e))?;
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "attachment".to_string());
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    let content_type = ContentType::parse(mime.essence_str())
        .unwrap_or(ContentType::TEXT_PLAIN);
    Ok(Attachment::new(filename).body(content, content_type))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn notifier() -> SmtpNotifier {
        SmtpNotifier::new(SmtpSettings {
            sender: "reports@example.com".to_string(),
            server: "smtp.example.com".to_string(),
            port: 465,
            username: None,
            password: "hunter2".to_string(),
        })
    }

    fn notification(attachment: Option<std::path::PathBuf>) -> Notification {
        Notification {
            to: vec!["ops@example.com".to_string()],
            subject: "Inventory differences".to_string(),
            html_body: "<p>2 differences</p>".to_string(),
            attachment,
            bcc_self: true,
        }
    }

    #[test]
    fn test_build_message_with_attachment() {
        let tmp = TempDir::new().unwrap();
        let report = tmp.path().join("report.html");
        fs::write(&report, "<html></html>").unwrap();

        let (message, attached) = notifier().build_message(&notification(Some(report))).unwrap();
        assert!(attached);

        let raw = String::from_utf8(message.formatted()).unwrap();
        assert!(raw.contains("Subject: Inventory differences"));
        assert!(raw.contains("To: ops@example.com"));
        assert!(raw.contains("report.html"));
        assert!(raw.contains("text/html"));
        assert!(!raw.contains("hunter2"));
    }

    #[test]
    fn test_missing_attachment_is_skipped() {
        let tmp = TempDir::new().unwrap();
        let (_, attached) = notifier()
            .build_message(&notification(Some(tmp.path().join("gone.html"))))
            .unwrap();
        assert!(!attached);
    }

    #[test]
    fn test_invalid_recipient_rejected_before_connect() {
        let mut n = notification(None);
        n.to = vec!["not-an-address".to_string()];
        let err = notifier().send(&n).unwrap_err();
        assert!(matches!(err, RemoteError::InvalidAddress(_)));
    }
}
