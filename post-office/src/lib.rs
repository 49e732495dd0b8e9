//! post-office: templated transactional email queue
//!
//! Callers queue emails (literal content or a stored template with a
//! context); a scheduler renders and relays them, recording a delivery log
//! for every attempt.
//!
//! # Features
//!
//! - **Priorities**: `low`, `medium`, `high`, and `now` which sends inline
//! - **Scheduling**: emails wait until their scheduled time
//! - **Templates**: minijinja templates with translations, inline styles and
//!   a cached lookup
//! - **Attachments**: bytes, readers or files, shared with template defaults
//! - **Delivery**: each email is claimed by exactly one worker
//!
//! # Example
//!
//! ```no_run
//! use post_office::config::Config;
//! use post_office::mail::EnqueueRequest;
//! use post_office::PostOffice;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     let post_office = PostOffice::from_config(&config).await?;
//!
//!     post_office
//!         .outbox
//!         .enqueue(EnqueueRequest {
//!             subject: "Welcome".to_string(),
//!             message: "Hello!".to_string(),
//!             recipients: vec!["user@example.com".to_string()],
//!             ..EnqueueRequest::default()
//!         })
//!         .await?;
//!
//!     post_office.scheduler.run_once().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! - [`config`]: Configuration management
//! - [`error`]: Error types and handling
//! - [`mail`]: Email model and the queueing API
//! - [`queue`]: Dispatcher and scheduler
//! - [`templates`]: Template lookup and rendering
//! - [`attachments`]: Attachment resolution
//! - [`smtp`]: Outgoing transport
//! - [`storage`]: Attachment blobs
//! - [`store`]: Persistence
//! - [`utils`]: Utility functions (validation, etc.)

pub mod app;
pub mod attachments;
pub mod config;
pub mod error;
pub mod mail;
pub mod queue;
pub mod smtp;
pub mod storage;
pub mod store;
pub mod templates;
pub mod utils;

// Re-export commonly used types
pub use app::PostOffice;
pub use config::Config;
pub use error::{MailError, Result};
