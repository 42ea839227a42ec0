//! Cloudflare R2 storage client for transcoded deliverables.

pub mod client;
pub mod error;

pub use client::{content_type_for, R2Client, R2Config, UploadProgress};
pub use error::{StorageError, StorageResult};
