//! Client for the platform's internal data API.
//!
//! The CRUD application owns submission, deliverable, and campaign rows; this
//! crate exposes the slice of that data the pipeline needs behind store
//! traits, with an HTTP implementation for production and an in-memory
//! implementation for tests and local development.

pub mod error;
pub mod http;
pub mod memory;
mod metrics;
pub mod retry;
pub mod store;

pub use error::{PlatformError, PlatformResult};
pub use http::{PlatformClient, PlatformConfig};
pub use memory::MemoryStore;
pub use store::{CampaignStore, DeliverableStore, StatusFilter, SubmissionStore};
