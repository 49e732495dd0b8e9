//! Utility modules
//!
//! - [`email`]: Email address validation

pub mod email;

pub use email::{parse_emails, validate_email};
