//! Attachment inputs and their persistence

pub mod bundle;

pub use bundle::{AttachmentBundle, AttachmentSource, AttachmentSpec};
