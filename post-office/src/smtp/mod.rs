//! Outgoing mail transport
//!
//! - [`client`]: SMTP client relaying to a single server
//! - [`mailer`]: the [`Mailer`] seam and its SMTP implementation

pub mod client;
pub mod mailer;

pub use client::SmtpClient;
pub use mailer::{Mailer, OutgoingAttachment, OutgoingMessage, SmtpMailer};
