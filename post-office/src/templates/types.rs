//! Template types and data structures

use crate::mail::Attachment;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Variables available to a template while it is rendered
pub type Context = serde_json::Map<String, serde_json::Value>;

/// Email template with subject, plain and HTML content
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailTemplate {
    pub id: i64,
    /// Template name, unique together with the language
    pub name: String,
    pub description: String,
    pub subject: String,
    /// Plain content, also injected into `html_content` as `content`
    pub content: String,
    pub html_content: String,
    pub kind: TemplateKind,
    /// Attachments sent when the caller supplies none, in order
    pub attachments: Vec<Attachment>,
    pub created: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

/// Base template or a translation of one
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TemplateKind {
    Base,
    Localized { base_id: i64, language: String },
}

impl EmailTemplate {
    /// Language tag, empty for base templates
    pub fn language(&self) -> &str {
        match &self.kind {
            TemplateKind::Base => "",
            TemplateKind::Localized { language, .. } => language,
        }
    }

    /// Subtemplates are hidden from the primary listing
    pub fn is_subtemplate(&self) -> bool {
        matches!(self.kind, TemplateKind::Localized { .. })
    }

    pub fn base_id(&self) -> Option<i64> {
        match self.kind {
            TemplateKind::Base => None,
            TemplateKind::Localized { base_id, .. } => Some(base_id),
        }
    }
}

/// Request to create a new template
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateTemplateRequest {
    pub name: String,
    pub description: String,
    pub subject: String,
    pub content: String,
    pub html_content: String,
    /// Base template this one translates
    pub base_id: Option<i64>,
    pub language: Option<String>,
}

/// Subject and bodies produced from a template
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RenderedEmail {
    pub subject: String,
    pub message: String,
    pub html_message: String,
}
