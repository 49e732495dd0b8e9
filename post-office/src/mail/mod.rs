//! Queued email model and the public queueing API
//!
//! - [`types`]: emails, attachments, logs, priorities and statuses
//! - [`outbox`]: enqueue, send and operator actions

pub mod outbox;
pub mod types;

pub use outbox::{EmailRequest, EnqueueRequest, Outbox, TemplatedEmailRequest};
pub use types::{
    Attachment, Email, EmailStatus, Log, LogStatus, NewEmail, Priority, TemplateRef,
};
