use crate::attachments::{AttachmentBundle, AttachmentSpec};
use crate::config::DefaultsConfig;
use crate::error::{MailError, Result};
use crate::mail::{Email, NewEmail, Priority, TemplateRef};
use crate::queue::Dispatcher;
use crate::smtp::Mailer;
use crate::storage::BlobStorage;
use crate::store::Store;
use crate::templates::{extract_variables, Context, EmailTemplate, TemplateRenderer, TemplateStore};
use crate::utils::email::{parse_emails, validate_email};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Same literal message to many recipients, one email each
#[derive(Debug, Clone, Default)]
pub struct EnqueueRequest {
    pub subject: String,
    pub message: String,
    /// Defaults to the configured sender
    pub from_email: Option<String>,
    pub recipients: Vec<String>,
    pub html_message: String,
    pub scheduled_time: Option<DateTime<Utc>>,
    pub headers: BTreeMap<String, String>,
    /// `low`, `medium`, `high` or `now`; the configured default when unset
    pub priority: Option<String>,
}

/// A single email with literal content or a template reference
#[derive(Debug, Default)]
pub struct EmailRequest {
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub bcc: Vec<String>,
    pub from_email: Option<String>,
    pub subject: String,
    pub message: String,
    pub html_message: String,
    /// Template name; the translation for `language` is used when it exists
    pub template: Option<String>,
    pub language: Option<String>,
    pub context: Option<Context>,
    /// Named attachments; the template's defaults are used when empty
    pub attachments: Vec<(String, AttachmentSpec)>,
    pub priority: Option<String>,
    pub scheduled_time: Option<DateTime<Utc>>,
    pub headers: BTreeMap<String, String>,
}

/// Templated email with a file-template fallback
#[derive(Debug, Default)]
pub struct TemplatedEmailRequest {
    pub to: Vec<String>,
    pub from_email: Option<String>,
    pub context: Context,
    /// File templates rendered when `template` is unset or missing
    pub subject_template: String,
    pub body_template: String,
    pub template: Option<String>,
    pub language: Option<String>,
    pub attachments: Vec<(String, AttachmentSpec)>,
    /// Configured `defaults.bcc` when unset
    pub bcc: Option<Vec<String>>,
    pub priority: Option<String>,
}

/// Entry point for queueing mail and operator actions
#[derive(Clone)]
pub struct Outbox {
    store: Arc<dyn Store>,
    templates: TemplateStore,
    renderer: Arc<TemplateRenderer>,
    blobs: BlobStorage,
    attachments: AttachmentBundle,
    dispatcher: Arc<Dispatcher>,
    defaults: DefaultsConfig,
}

impl Outbox {
    pub fn new(
        store: Arc<dyn Store>,
        templates: TemplateStore,
        renderer: Arc<TemplateRenderer>,
        blobs: BlobStorage,
        mailer: Arc<dyn Mailer>,
        defaults: DefaultsConfig,
    ) -> Self {
        let dispatcher = Arc::new(Dispatcher::new(
            Arc::clone(&store),
            templates.clone(),
            Arc::clone(&renderer),
            blobs.clone(),
            mailer,
        ));

        Self {
            attachments: AttachmentBundle::new(Arc::clone(&store), blobs.clone()),
            store,
            templates,
            renderer,
            blobs,
            dispatcher,
            defaults,
        }
    }

    /// Dispatcher shared with the scheduler
    pub fn dispatcher(&self) -> Arc<Dispatcher> {
        Arc::clone(&self.dispatcher)
    }

    /// Queue one email per recipient
    ///
    /// Everything is validated before the first row is written. With priority
    /// `now` every email is sent before this returns; a store error on one of
    /// them does not stop the others and the first one is returned.
    pub async fn enqueue(&self, request: EnqueueRequest) -> Result<Vec<Email>> {
        let recipients = parse_emails(request.recipients)?;
        let from_email = self.sender(request.from_email)?;
        let priority = self.parse_priority(request.priority.as_deref())?;

        let mut emails = Vec::with_capacity(recipients.len());
        for recipient in recipients {
            let email = self
                .store
                .insert_email(&NewEmail {
                    to: vec![recipient],
                    from_email: from_email.clone(),
                    subject: request.subject.clone(),
                    message: request.message.clone(),
                    html_message: request.html_message.clone(),
                    priority: Some(priority),
                    scheduled_time: request.scheduled_time,
                    headers: request.headers.clone(),
                    ..NewEmail::default()
                })
                .await?;
            emails.push(email);
        }

        if priority == Priority::Now {
            let mut sent = Vec::with_capacity(emails.len());
            let mut first_error = None;
            for email in emails {
                match self.dispatch_now(email.id).await {
                    Ok(email) => sent.push(email),
                    Err(e) => {
                        error!("Inline dispatch of email {} failed: {}", email.id, e);
                        first_error.get_or_insert(e);
                    }
                }
            }
            return match first_error {
                Some(e) => Err(e),
                None => Ok(sent),
            };
        }

        info!("Queued {} emails", emails.len());
        Ok(emails)
    }

    /// Create a single email
    ///
    /// Attachments are stored before the email becomes visible to the
    /// scheduler. A path attachment that cannot be read leaves the email
    /// `failed`.
    pub async fn send(&self, request: EmailRequest) -> Result<Email> {
        let to = parse_emails(request.to)?;
        let cc = parse_emails(request.cc)?;
        let bcc = parse_emails(request.bcc)?;
        let from_email = self.sender(request.from_email)?;
        let priority = self.parse_priority(request.priority.as_deref())?;

        let template = match &request.template {
            Some(name) => Some(
                self.templates
                    .get_localized(name, request.language.as_deref())
                    .await?,
            ),
            None => None,
        };

        let mut new_email = NewEmail {
            to,
            cc,
            bcc,
            from_email,
            subject: request.subject,
            message: request.message,
            html_message: request.html_message,
            template: template.as_ref().map(|template| TemplateRef {
                name: template.name.clone(),
                language: template.language().to_string(),
            }),
            language: template.as_ref().and(request.language),
            context: request.context,
            priority: Some(priority),
            scheduled_time: request.scheduled_time,
            headers: request.headers,
            attachments: Vec::new(),
        };

        let defaults = template
            .as_ref()
            .map(|template| template.attachments.as_slice())
            .unwrap_or_default();

        match self.attachments.resolve(request.attachments, defaults).await {
            Ok(attachments) => {
                new_email.attachments = attachments.iter().map(|attachment| attachment.id).collect();
            }
            Err(e @ MailError::AttachmentSource { .. }) => {
                let email = self
                    .store
                    .insert_failed_email(&new_email, &e.to_string())
                    .await?;
                warn!("Email {} cannot be sent: {}", email.id, e);
                return Ok(email);
            }
            Err(e) => return Err(e),
        }

        let email = self.store.insert_email(&new_email).await?;

        if priority == Priority::Now {
            return self.dispatch_now(email.id).await;
        }

        info!("Queued email {} with priority {}", email.id, priority);
        Ok(email)
    }

    /// Send with a stored template, or the subject/body file templates when
    /// it does not exist
    ///
    /// Returns `None` when there is no recipient.
    pub async fn send_templated(&self, request: TemplatedEmailRequest) -> Result<Option<Email>> {
        if request.to.is_empty() {
            warn!("Not sending templated email: no recipient");
            return Ok(None);
        }

        let bcc = request.bcc.unwrap_or_else(|| self.defaults.bcc.clone());
        let language = request.language.as_deref();

        if let Some(name) = &request.template {
            match self.templates.get_localized(name, language).await {
                Ok(template) => {
                    let email = self
                        .send(EmailRequest {
                            to: request.to,
                            bcc,
                            from_email: request.from_email,
                            template: Some(template.name.clone()),
                            language: request.language,
                            context: Some(request.context),
                            attachments: request.attachments,
                            priority: request.priority,
                            ..EmailRequest::default()
                        })
                        .await?;
                    return Ok(Some(email));
                }
                Err(MailError::TemplateNotFound { .. }) => {
                    warn!("Email template {} not found, using file templates", name);
                }
                Err(e) => return Err(e),
            }
        }

        let (subject, body) = self.renderer.render_file_pair(
            &request.subject_template,
            &request.body_template,
            &request.context,
            language,
        );

        let email = self
            .send(EmailRequest {
                to: request.to,
                bcc,
                from_email: request.from_email,
                subject,
                html_message: body,
                attachments: request.attachments,
                priority: request.priority,
                ..EmailRequest::default()
            })
            .await?;
        Ok(Some(email))
    }

    /// Put failed or sent emails back in the queue; nothing is sent here
    pub async fn requeue(&self, ids: &[i64]) -> Result<u64> {
        self.store.requeue(ids).await
    }

    pub async fn mark_as_sent(&self, ids: &[i64]) -> Result<u64> {
        self.store.mark_as_sent(ids).await
    }

    /// Delete an email, its logs, and the blobs nothing else references
    pub async fn delete(&self, id: i64) -> Result<()> {
        for attachment in self.store.delete_email(id).await? {
            self.blobs.remove(&attachment.file).await?;
        }
        info!("Deleted email {}", id);
        Ok(())
    }

    /// Placeholder names of `content`, for building preview forms
    pub fn variables(&self, content: &str) -> Vec<String> {
        extract_variables(content)
    }

    pub fn preview(&self, template: &EmailTemplate) -> String {
        self.renderer.preview(template)
    }

    fn parse_priority(&self, priority: Option<&str>) -> Result<Priority> {
        match priority {
            Some(priority) => priority.parse(),
            None => Ok(self.defaults.priority),
        }
    }

    fn sender(&self, from_email: Option<String>) -> Result<String> {
        let from_email = from_email.unwrap_or_else(|| self.defaults.from_email.clone());
        validate_email(&from_email)?;
        Ok(from_email)
    }

    async fn dispatch_now(&self, id: i64) -> Result<Email> {
        self.dispatcher.dispatch(id).await?;
        self.reload(id).await
    }

    async fn reload(&self, id: i64) -> Result<Email> {
        self.store
            .get_email(id)
            .await?
            .ok_or_else(|| MailError::NotFound(format!("Email {} not found", id)))
    }
}
