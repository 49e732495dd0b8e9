//! Attachment storage
//!
//! - [`blob`]: flat directory of blobs written with atomic renames

pub mod blob;

pub use blob::BlobStorage;
