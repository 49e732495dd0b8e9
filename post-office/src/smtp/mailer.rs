//! Outgoing message delivery
//!
//! The queue hands fully rendered messages to a [`Mailer`]. [`SmtpMailer`]
//! builds the MIME message and relays it through [`SmtpClient`].

use crate::config::SmtpConfig;
use crate::error::{MailError, Result};
use crate::smtp::SmtpClient;
use crate::utils::email::extract_address;
use async_trait::async_trait;
use mail_builder::headers::address::Address;
use mail_builder::headers::raw::Raw;
use mail_builder::MessageBuilder;
use std::collections::BTreeMap;
use tracing::debug;

/// Attachment content ready to be encoded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingAttachment {
    pub name: String,
    pub content_type: String,
    pub content: Vec<u8>,
}

/// A rendered email as handed to the transport
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub from: String,
    pub to: Vec<String>,
    pub cc: Vec<String>,
    /// Envelope only, never written to the headers
    pub bcc: Vec<String>,
    pub subject: String,
    pub message: String,
    pub html_message: String,
    pub headers: BTreeMap<String, String>,
    pub attachments: Vec<OutgoingAttachment>,
}

impl OutgoingMessage {
    /// Bare addresses of every envelope recipient
    pub fn recipients(&self) -> Vec<&str> {
        self.to
            .iter()
            .chain(&self.cc)
            .chain(&self.bcc)
            .map(|recipient| extract_address(recipient))
            .collect()
    }

    /// RFC 5322 message bytes
    pub fn to_mime(&self) -> Result<Vec<u8>> {
        let mut builder = MessageBuilder::new()
            .from(address(&self.from))
            .subject(self.subject.as_str());

        if !self.to.is_empty() {
            builder = builder.to(addresses(&self.to));
        }
        if !self.cc.is_empty() {
            builder = builder.cc(addresses(&self.cc));
        }

        for (name, value) in &self.headers {
            builder = builder.header(name.as_str(), Raw::new(value.as_str()));
        }

        builder = builder.text_body(self.message.as_str());
        if !self.html_message.is_empty() {
            builder = builder.html_body(self.html_message.as_str());
        }

        for attachment in &self.attachments {
            builder = builder.attachment(
                attachment.content_type.as_str(),
                attachment.name.as_str(),
                attachment.content.as_slice(),
            );
        }

        builder
            .write_to_vec()
            .map_err(|e| MailError::Transport(format!("Cannot build message: {}", e)))
    }
}

fn address(value: &str) -> Address<'_> {
    let bare = extract_address(value);
    let name = value.trim();
    match name.rfind('<') {
        Some(start) if bare != name => {
            let display = name[..start].trim().trim_matches('"');
            if display.is_empty() {
                bare.into()
            } else {
                (display, bare).into()
            }
        }
        _ => bare.into(),
    }
}

fn addresses(values: &[String]) -> Address<'_> {
    values.iter().map(|value| address(value)).collect::<Vec<_>>().into()
}

/// Delivers rendered messages
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &OutgoingMessage) -> Result<()>;
}

/// Mailer relaying through the configured SMTP server
#[derive(Debug, Clone)]
pub struct SmtpMailer {
    client: SmtpClient,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> Self {
        Self {
            client: SmtpClient::new(config.relay_addr.clone(), config.hello_name.clone()),
        }
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, message: &OutgoingMessage) -> Result<()> {
        let data = message.to_mime()?;
        debug!("Built message of {} bytes for {}", data.len(), message.subject);

        self.client
            .send_mail(extract_address(&message.from), &message.recipients(), &data)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message() -> OutgoingMessage {
        OutgoingMessage {
            from: "Shop <shop@example.com>".to_string(),
            to: vec!["alice@example.com".to_string()],
            cc: vec!["Bob <bob@example.com>".to_string()],
            bcc: vec!["audit@example.com".to_string()],
            subject: "Your order".to_string(),
            message: "Thanks".to_string(),
            html_message: "<p>Thanks</p>".to_string(),
            headers: BTreeMap::from([("X-Order".to_string(), "42".to_string())]),
            attachments: vec![OutgoingAttachment {
                name: "invoice.txt".to_string(),
                content_type: "text/plain".to_string(),
                content: b"total: 10".to_vec(),
            }],
        }
    }

    #[test]
    fn test_recipients_include_bcc() {
        assert_eq!(
            message().recipients(),
            vec!["alice@example.com", "bob@example.com", "audit@example.com"]
        );
    }

    #[test]
    fn test_mime_output() {
        let mime = String::from_utf8(message().to_mime().unwrap()).unwrap();

        assert!(mime.contains("Subject: Your order"));
        assert!(mime.contains("X-Order: 42"));
        assert!(mime.contains("shop@example.com"));
        assert!(mime.contains("bob@example.com"));
        assert!(mime.contains("invoice.txt"));
        assert!(mime.contains("multipart/"));
        assert!(!mime.contains("audit@example.com"));
    }

    #[tokio::test]
    async fn test_mock_mailer() {
        let mut mailer = MockMailer::new();
        mailer
            .expect_send()
            .withf(|message| message.subject == "Your order")
            .times(1)
            .returning(|_| Ok(()));

        mailer.send(&message()).await.unwrap();
    }
}
