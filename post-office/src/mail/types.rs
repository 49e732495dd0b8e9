//! Email, attachment and delivery log records

use crate::error::{MailError, Result};
use crate::templates::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Number of characters kept by [`Log::message_preview`]
const LOG_PREVIEW_CHARS: usize = 25;

/// Delivery priority
///
/// `Now` bypasses the queue: the email is sent while it is being created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low = 0,
    Medium = 1,
    High = 2,
    Now = 3,
}

impl Priority {
    /// Convert to database value
    pub fn to_db_value(self) -> i64 {
        self as i64
    }

    /// Parse from database value
    pub fn from_db_value(value: i64) -> Option<Self> {
        match value {
            0 => Some(Priority::Low),
            1 => Some(Priority::Medium),
            2 => Some(Priority::High),
            3 => Some(Priority::Now),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Now => "now",
        }
    }
}

impl FromStr for Priority {
    type Err = MailError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            "now" => Ok(Priority::Now),
            other => Err(MailError::InvalidPriority(other.to_string())),
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Email status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmailStatus {
    Queued,
    Sent,
    Failed,
    /// Marked for another attempt by an operator
    Requeued,
}

impl EmailStatus {
    /// Convert to database string
    pub fn to_db_string(self) -> &'static str {
        match self {
            EmailStatus::Queued => "queued",
            EmailStatus::Sent => "sent",
            EmailStatus::Failed => "failed",
            EmailStatus::Requeued => "requeued",
        }
    }

    /// Parse from database string
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "queued" => Some(EmailStatus::Queued),
            "sent" => Some(EmailStatus::Sent),
            "failed" => Some(EmailStatus::Failed),
            "requeued" => Some(EmailStatus::Requeued),
            _ => None,
        }
    }

    /// Whether `from -> to` is a legal transition.
    ///
    /// `None` is the state of a priority-now email that is being sent inline.
    /// Operators may requeue anything that left the queue and mark anything
    /// not yet sent as sent.
    pub fn can_transition(from: Option<EmailStatus>, to: EmailStatus) -> bool {
        use EmailStatus::*;

        matches!(
            (from, to),
            (None | Some(Queued), Sent | Failed)
                | (Some(Failed | Sent), Requeued)
                | (Some(Failed | Sent | Requeued), Queued)
                | (Some(Failed | Requeued), Sent)
        )
    }

    /// Every state `to` can be reached from
    pub fn sources(to: EmailStatus) -> Vec<Option<EmailStatus>> {
        use EmailStatus::*;

        [None, Some(Queued), Some(Sent), Some(Failed), Some(Requeued)]
            .into_iter()
            .filter(|from| EmailStatus::can_transition(*from, to))
            .collect()
    }
}

/// Reference from an email to the template it is rendered with
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateRef {
    pub name: String,
    /// Language of the template that was found, empty for the base template
    pub language: String,
}

/// A queued outbound email
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Email {
    pub id: i64,
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub bcc: Vec<String>,
    pub from_email: String,
    pub subject: String,
    /// Plain text body
    pub message: String,
    pub html_message: String,
    /// When set, subject and bodies are rendered from the template at send time
    pub template: Option<TemplateRef>,
    /// Language active while rendering, even when the template fell back to its base
    pub language: Option<String>,
    pub context: Option<Context>,
    pub priority: Priority,
    /// `None` only while a priority-now email is being sent inline
    pub status: Option<EmailStatus>,
    pub scheduled_time: Option<DateTime<Utc>>,
    pub headers: BTreeMap<String, String>,
    pub created: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

/// Email about to be persisted
#[derive(Debug, Clone, Default)]
pub struct NewEmail {
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub bcc: Vec<String>,
    pub from_email: String,
    pub subject: String,
    pub message: String,
    pub html_message: String,
    pub template: Option<TemplateRef>,
    pub language: Option<String>,
    pub context: Option<Context>,
    pub priority: Option<Priority>,
    pub scheduled_time: Option<DateTime<Utc>>,
    pub headers: BTreeMap<String, String>,
    /// Stored attachments linked when the row is created, in order
    pub attachments: Vec<i64>,
}

impl NewEmail {
    pub fn priority(&self) -> Priority {
        self.priority.unwrap_or(Priority::Medium)
    }

    /// Status the row is created with
    pub fn initial_status(&self) -> Option<EmailStatus> {
        match self.priority() {
            Priority::Now => None,
            _ => Some(EmailStatus::Queued),
        }
    }
}

/// A stored attachment, possibly shared by several emails and templates
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: i64,
    pub name: String,
    /// Blob key inside the attachment storage
    pub file: String,
    pub mimetype: Option<String>,
}

impl Attachment {
    /// Explicit mimetype, or one guessed from the file name
    pub fn content_type(&self) -> String {
        self.mimetype.clone().unwrap_or_else(|| {
            mime_guess::from_path(&self.name)
                .first_or_octet_stream()
                .essence_str()
                .to_string()
        })
    }
}

/// Outcome recorded for one dispatch attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogStatus {
    Sent,
    Failed,
}

impl LogStatus {
    pub fn to_db_string(self) -> &'static str {
        match self {
            LogStatus::Sent => "sent",
            LogStatus::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "sent" => Some(LogStatus::Sent),
            "failed" => Some(LogStatus::Failed),
            _ => None,
        }
    }
}

impl From<LogStatus> for EmailStatus {
    fn from(status: LogStatus) -> Self {
        match status {
            LogStatus::Sent => EmailStatus::Sent,
            LogStatus::Failed => EmailStatus::Failed,
        }
    }
}

/// Append-only delivery log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Log {
    pub id: i64,
    pub email_id: i64,
    pub date: DateTime<Utc>,
    pub status: LogStatus,
    pub message: String,
}

impl Log {
    /// Message shortened for list views
    pub fn message_preview(&self) -> String {
        if self.message.chars().count() > LOG_PREVIEW_CHARS {
            let head: String = self.message.chars().take(LOG_PREVIEW_CHARS).collect();
            format!("{}...", head)
        } else {
            self.message.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_parse() {
        assert_eq!("now".parse::<Priority>().unwrap(), Priority::Now);
        assert_eq!("low".parse::<Priority>().unwrap(), Priority::Low);
        assert!(matches!(
            "urgent".parse::<Priority>(),
            Err(MailError::InvalidPriority(_))
        ));
    }

    #[test]
    fn test_priority_ordering() {
        assert!(Priority::High > Priority::Medium);
        assert!(Priority::Medium > Priority::Low);
        assert_eq!(Priority::from_db_value(2), Some(Priority::High));
        assert_eq!(Priority::from_db_value(7), None);
    }

    #[test]
    fn test_status_transitions() {
        use EmailStatus::*;

        assert!(EmailStatus::can_transition(Some(Queued), Sent));
        assert!(EmailStatus::can_transition(Some(Queued), Failed));
        assert!(EmailStatus::can_transition(None, Sent));
        assert!(EmailStatus::can_transition(Some(Failed), Requeued));
        assert!(EmailStatus::can_transition(Some(Requeued), Queued));
        assert!(EmailStatus::can_transition(Some(Sent), Queued));
        assert!(EmailStatus::can_transition(Some(Failed), Sent));
        assert!(!EmailStatus::can_transition(Some(Sent), Failed));
        assert!(!EmailStatus::can_transition(Some(Sent), Sent));
        assert!(!EmailStatus::can_transition(Some(Requeued), Failed));
        assert!(!EmailStatus::can_transition(None, Queued));
    }

    #[test]
    fn test_status_sources() {
        use EmailStatus::*;

        assert_eq!(EmailStatus::sources(Failed), vec![None, Some(Queued)]);
        assert_eq!(
            EmailStatus::sources(Queued),
            vec![Some(Sent), Some(Failed), Some(Requeued)]
        );
        assert_eq!(
            EmailStatus::sources(Sent),
            vec![None, Some(Queued), Some(Failed), Some(Requeued)]
        );
    }

    #[test]
    fn test_now_priority_is_never_queued() {
        let email = NewEmail {
            priority: Some(Priority::Now),
            ..NewEmail::default()
        };
        assert_eq!(email.initial_status(), None);

        let email = NewEmail::default();
        assert_eq!(email.priority(), Priority::Medium);
        assert_eq!(email.initial_status(), Some(EmailStatus::Queued));
    }

    #[test]
    fn test_log_preview() {
        let mut log = Log {
            id: 1,
            email_id: 1,
            date: Utc::now(),
            status: LogStatus::Failed,
            message: "short".to_string(),
        };
        assert_eq!(log.message_preview(), "short");

        log.message = "Connection refused by relay at 127.0.0.1".to_string();
        assert_eq!(log.message_preview(), "Connection refused by rel...");
    }

    #[test]
    fn test_attachment_content_type() {
        let mut attachment = Attachment {
            id: 1,
            name: "report.pdf".to_string(),
            file: "abc".to_string(),
            mimetype: None,
        };
        assert_eq!(attachment.content_type(), "application/pdf");

        attachment.mimetype = Some("text/csv".to_string());
        assert_eq!(attachment.content_type(), "text/csv");

        attachment.name = "blob".to_string();
        attachment.mimetype = None;
        assert_eq!(attachment.content_type(), "application/octet-stream");
    }
}
