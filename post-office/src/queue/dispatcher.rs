use crate::error::{MailError, Result};
use crate::mail::{Email, LogStatus};
use crate::smtp::{Mailer, OutgoingAttachment, OutgoingMessage};
use crate::storage::BlobStorage;
use crate::store::Store;
use crate::templates::{Context, RenderedEmail, TemplateRenderer, TemplateStore};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Result of one dispatch attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Sent,
    Failed,
    /// Another worker holds the email, it is no longer queued, or the claim
    /// was released before the outcome could be recorded
    Skipped,
}

/// Sends a single email: claim, render, load attachments, deliver, log
#[derive(Clone)]
pub struct Dispatcher {
    store: Arc<dyn Store>,
    templates: TemplateStore,
    renderer: Arc<TemplateRenderer>,
    blobs: BlobStorage,
    mailer: Arc<dyn Mailer>,
}

impl Dispatcher {
    pub fn new(
        store: Arc<dyn Store>,
        templates: TemplateStore,
        renderer: Arc<TemplateRenderer>,
        blobs: BlobStorage,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        Self {
            store,
            templates,
            renderer,
            blobs,
            mailer,
        }
    }

    /// Dispatch the email `id`
    ///
    /// Delivery problems end up as a `failed` status and a log entry; only
    /// store errors are returned.
    pub async fn dispatch(&self, id: i64) -> Result<DispatchOutcome> {
        let worker = Uuid::new_v4().to_string();

        if !self.store.claim_email(id, &worker).await? {
            debug!("Email {} already claimed or not queued", id);
            return Ok(DispatchOutcome::Skipped);
        }

        let Some(email) = self.store.get_email(id).await? else {
            return Ok(DispatchOutcome::Skipped);
        };

        let delivery = match self.build_message(&email).await {
            Ok(message) => self.mailer.send(&message).await,
            Err(e) => Err(e),
        };

        let (status, message, outcome) = match delivery {
            Ok(()) => (LogStatus::Sent, String::new(), DispatchOutcome::Sent),
            Err(e) => {
                error!("Email {} failed: {}", id, e);
                (LogStatus::Failed, e.to_string(), DispatchOutcome::Failed)
            }
        };

        let recorded = self
            .store
            .complete_dispatch(id, &worker, status, &message)
            .await?;
        if recorded.is_none() {
            return Ok(DispatchOutcome::Skipped);
        }

        if outcome == DispatchOutcome::Sent {
            info!("Email {} sent to {:?}", id, email.to);
        }
        Ok(outcome)
    }

    async fn build_message(&self, email: &Email) -> Result<OutgoingMessage> {
        let rendered = self.render(email).await?;

        let mut attachments = Vec::new();
        for attachment in self.store.email_attachments(email.id).await? {
            attachments.push(OutgoingAttachment {
                content: self.blobs.read(&attachment.file).await?,
                content_type: attachment.content_type(),
                name: attachment.name,
            });
        }

        Ok(OutgoingMessage {
            from: email.from_email.clone(),
            to: email.to.clone(),
            cc: email.cc.clone(),
            bcc: email.bcc.clone(),
            subject: rendered.subject,
            message: rendered.message,
            html_message: rendered.html_message,
            headers: email.headers.clone(),
            attachments,
        })
    }

    /// Rendered content, or the stored literal content when there is no template
    async fn render(&self, email: &Email) -> Result<RenderedEmail> {
        let literal = || RenderedEmail {
            subject: email.subject.clone(),
            message: email.message.clone(),
            html_message: email.html_message.clone(),
        };

        let Some(template_ref) = &email.template else {
            return Ok(literal());
        };

        let template = match self
            .templates
            .get(&template_ref.name, &template_ref.language)
            .await
        {
            Ok(template) => template,
            Err(MailError::TemplateNotFound { name, language }) => {
                warn!(
                    "Template {} ({:?}) of email {} is gone, sending stored content",
                    name, language, email.id
                );
                return Ok(literal());
            }
            Err(e) => return Err(e),
        };

        let context = email.context.clone().unwrap_or_else(Context::new);
        let language = email
            .language
            .as_deref()
            .or(Some(template_ref.language.as_str()))
            .filter(|l| !l.is_empty());

        Ok(self.renderer.render_template(&template, &context, language))
    }
}
