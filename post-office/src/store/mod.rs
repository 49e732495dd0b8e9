//! Persistence seam
//!
//! The queue core only talks to these traits. [`SqliteStore`] is the bundled
//! implementation.

pub mod sqlite;

pub use sqlite::SqliteStore;

use crate::error::Result;
use crate::mail::{Attachment, Email, Log, LogStatus, NewEmail};
use crate::templates::EmailTemplate;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Read access to stored templates
#[async_trait]
pub trait TemplateRepository: Send + Sync {
    /// Template with exactly this name and language ("" for base templates)
    async fn find_template(&self, name: &str, language: &str) -> Result<Option<EmailTemplate>>;
}

/// Emails, attachments and delivery logs
#[async_trait]
pub trait Store: Send + Sync {
    /// Insert the email together with its attachment links
    async fn insert_email(&self, email: &NewEmail) -> Result<Email>;

    /// Insert an email that could not be prepared, already `failed` with a log entry
    async fn insert_failed_email(&self, email: &NewEmail, message: &str) -> Result<Email>;

    async fn get_email(&self, id: i64) -> Result<Option<Email>>;

    /// Unclaimed queued emails due at `now`, highest priority first, then by id
    async fn due_emails(&self, now: DateTime<Utc>, limit: Option<i64>) -> Result<Vec<Email>>;

    /// Atomically mark the email as taken by `worker`
    ///
    /// Succeeds only while the email is queued (or awaiting its inline send)
    /// and nobody else holds it. Returns `false` when another worker won.
    async fn claim_email(&self, id: i64, worker: &str) -> Result<bool>;

    /// Record the outcome of a dispatch attempt in one transaction: set the
    /// status, release the claim and append the log entry.
    ///
    /// Nothing is written and `None` is returned when `worker` no longer holds
    /// the claim.
    async fn complete_dispatch(
        &self,
        id: i64,
        worker: &str,
        status: LogStatus,
        message: &str,
    ) -> Result<Option<Log>>;

    /// Put failed or sent emails back in the queue, returns rows changed
    async fn requeue(&self, ids: &[i64]) -> Result<u64>;

    /// Mark emails as sent without sending them, returns rows changed
    async fn mark_as_sent(&self, ids: &[i64]) -> Result<u64>;

    /// Release claims taken before `claimed_before` by workers that died
    async fn release_stale_claims(&self, claimed_before: DateTime<Utc>) -> Result<u64>;

    /// Delete an email with its logs; returns attachments nothing references anymore
    async fn delete_email(&self, id: i64) -> Result<Vec<Attachment>>;

    async fn insert_attachment(
        &self,
        name: &str,
        file: &str,
        mimetype: Option<&str>,
    ) -> Result<Attachment>;

    /// Remove an attachment row and its links; the blob is left to the caller
    async fn delete_attachment(&self, id: i64) -> Result<()>;

    /// Attach existing attachments to an email, keeping the given order
    async fn link_attachments(&self, email_id: i64, attachment_ids: &[i64]) -> Result<()>;

    async fn email_attachments(&self, email_id: i64) -> Result<Vec<Attachment>>;

    async fn email_logs(&self, email_id: i64) -> Result<Vec<Log>>;
}
